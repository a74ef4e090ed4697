//! Per-user launchd agent that starts bluesnooze at login.

use std::env;
use std::fs::{self, File};
use std::io::{self, Write};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use clap::Subcommand;
use nix::unistd::getuid;
use tracing::{debug, info};

const LAUNCHCTL_PATH: &str = "/bin/launchctl";
pub const AGENT_LABEL: &str = "com.bluesnooze.agent";

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceCommands {
    /// Install the per-user launchd agent (launch at login)
    Install,
    /// Uninstall the per-user launchd agent
    Uninstall,
    /// Start (or bootstrap) the agent
    Start,
    /// Stop (or bootout/kill) the agent
    Stop,
    /// Restart the agent (kickstart -k)
    Restart,
    /// Report whether launch at login is enabled
    Status,
}

pub fn handle_service_command(cmd: &ServiceCommands) -> Result<String, String> {
    let agent = LaunchAgent::for_current_user()
        .map_err(|e| format!("Failed to locate launch agent: {}", e))?;
    match cmd {
        ServiceCommands::Install => agent
            .install()
            .map(|_| "Service installed.".to_string())
            .map_err(|e| format!("Failed to install service: {}", e)),
        ServiceCommands::Uninstall => agent
            .uninstall()
            .map(|_| "Service uninstalled.".to_string())
            .map_err(|e| format!("Failed to uninstall service: {}", e)),
        ServiceCommands::Start => agent
            .start()
            .map(|_| "Service started.".to_string())
            .map_err(|e| format!("Failed to start service: {}", e)),
        ServiceCommands::Stop => agent
            .stop()
            .map(|_| "Service stopped.".to_string())
            .map_err(|e| format!("Failed to stop service: {}", e)),
        ServiceCommands::Restart => agent
            .restart()
            .map(|_| "Service restarted.".to_string())
            .map_err(|e| format!("Failed to restart service: {}", e)),
        ServiceCommands::Status => Ok(format!(
            "Launch at login: {}\nAgent running: {}\nPlist: {}",
            if agent.is_installed() { "enabled" } else { "disabled" },
            if agent.is_running() { "yes" } else { "no" },
            agent.plist_path().display()
        )),
    }
}

fn default_plist_path() -> io::Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| io::Error::other("HOME not set"))?;
    Ok(home.join("Library").join("LaunchAgents").join(format!("{AGENT_LABEL}.plist")))
}

fn current_executable() -> io::Result<PathBuf> {
    let exe = env::current_exe()
        .map_err(|_| io::Error::other("unable to retrieve path of current executable"))?;
    Ok(fs::canonicalize(&exe).unwrap_or(exe))
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Runs `/bin/launchctl`.
pub trait Launchctl {
    /// Waits for completion and returns the exit code.
    fn run(&self, args: &[&str], suppress_output: bool) -> io::Result<i32>;
    /// Starts without waiting and with all output discarded.
    fn spawn(&self, args: &[&str]) -> io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLaunchctl;

impl Launchctl for SystemLaunchctl {
    fn run(&self, args: &[&str], suppress_output: bool) -> io::Result<i32> {
        run_launchctl(args, suppress_output)
    }

    fn spawn(&self, args: &[&str]) -> io::Result<()> { spawn_launchctl(args) }
}

#[derive(Debug, Clone)]
pub struct LaunchAgent<L = SystemLaunchctl> {
    label: String,
    plist_path: PathBuf,
    program: PathBuf,
    launchctl: L,
}

impl LaunchAgent {
    pub fn new(label: impl Into<String>, plist_path: PathBuf, program: PathBuf) -> Self {
        Self::with_launchctl(label, plist_path, program, SystemLaunchctl)
    }

    pub fn for_current_user() -> io::Result<Self> {
        Ok(Self::new(AGENT_LABEL, default_plist_path()?, current_executable()?))
    }
}

impl<L: Launchctl> LaunchAgent<L> {
    pub fn with_launchctl(
        label: impl Into<String>,
        plist_path: PathBuf,
        program: PathBuf,
        launchctl: L,
    ) -> Self {
        Self { label: label.into(), plist_path, program, launchctl }
    }

    pub fn plist_path(&self) -> &Path { &self.plist_path }

    pub fn is_installed(&self) -> bool { self.plist_path.is_file() }

    pub fn plist_contents(&self) -> io::Result<String> {
        let program = self
            .program
            .to_str()
            .ok_or_else(|| io::Error::other("non-UTF8 executable path"))?;
        let user = env::var("USER").unwrap_or_else(|_| getuid().to_string());

        let plist = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>{program}</string>
    </array>
    <key>EnvironmentVariables</key>
    <dict>
        <key>RUST_LOG</key>
        <string>warn,bluesnooze=info</string>
    </dict>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <dict>
        <key>SuccessfulExit</key>
        <false/>
    </dict>
    <key>StandardOutPath</key>
    <string>/tmp/bluesnooze_{user}.out.log</string>
    <key>StandardErrorPath</key>
    <string>/tmp/bluesnooze_{user}.err.log</string>
    <key>ProcessType</key>
    <string>Interactive</string>
    <key>LimitLoadToSessionType</key>
    <string>Aqua</string>
</dict>
</plist>
"#,
            label = xml_escape(&self.label),
            program = xml_escape(program),
            user = xml_escape(&user),
        );

        Ok(plist)
    }

    /// Writes the plist, replacing any existing one.
    pub fn write_plist(&self) -> io::Result<()> {
        let plist = self.plist_contents()?;
        write_file(&self.plist_path, &plist)?;
        debug!(path = %self.plist_path.display(), "wrote launch agent plist");
        Ok(())
    }

    pub fn remove_plist(&self) -> io::Result<()> {
        match fs::remove_file(&self.plist_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn install(&self) -> io::Result<()> {
        if self.is_installed() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("service file '{}' is already installed", self.plist_path.display()),
            ));
        }
        self.write_plist()
    }

    pub fn uninstall(&self) -> io::Result<()> {
        self.require_installed()?;
        if self.is_running() {
            return Err(io::Error::other(
                "service is still running; stop it first with `bluesnooze service stop` before uninstalling",
            ));
        }
        fs::remove_file(&self.plist_path)
    }

    pub fn is_running(&self) -> bool {
        matches!(self.launchctl.run(&["print", &self.service_target()], true), Ok(0))
    }

    pub fn start(&self) -> io::Result<()> {
        if !self.is_installed() {
            self.write_plist().map_err(|e| {
                io::Error::new(
                    e.kind(),
                    format!(
                        "service file '{}' could not be installed: {}",
                        self.plist_path.display(),
                        e
                    ),
                )
            })?;
        }

        let service_target = self.service_target();
        if !self.is_running() {
            let _ = self.launchctl.run(&["enable", &service_target], true);
            let _ = self.launchctl.spawn(&["bootstrap", &domain_target(), self.plist_arg()?]);
            std::thread::sleep(std::time::Duration::from_millis(150));
            check_exit(
                self.launchctl.run(&["kickstart", &service_target], false)?,
                "kickstart after bootstrap",
            )
        } else {
            check_exit(self.launchctl.run(&["kickstart", &service_target], false)?, "kickstart")
        }
    }

    /// Kills and relaunches a loaded agent. An agent that is not loaded is
    /// started from its plist.
    pub fn restart(&self) -> io::Result<()> {
        if self.is_running() {
            return check_exit(
                self.launchctl.run(&["kickstart", "-k", &self.service_target()], false)?,
                "kickstart -k",
            );
        }
        self.require_installed()?;
        self.start()
    }

    /// Unloads the agent by label, so it works after the plist is gone.
    pub fn stop(&self) -> io::Result<()> {
        if !self.is_running() {
            return Err(io::Error::other("service is not running"));
        }

        let service_target = self.service_target();
        let bootout = self.launchctl.run(&["bootout", &service_target], false)?;
        let disable = self.launchctl.run(&["disable", &service_target], false)?;
        if bootout == 0 && disable == 0 {
            Ok(())
        } else {
            Err(io::Error::other(format!(
                "bootout exit {}, disable exit {}",
                bootout, disable
            )))
        }
    }

    /// Clears a `disable` left by `stop` so launchd loads the plist at login.
    fn enable(&self) {
        match self.launchctl.run(&["enable", &self.service_target()], true) {
            Ok(0) => {}
            Ok(code) => debug!(code, "launchctl enable failed"),
            Err(e) => debug!("launchctl enable failed: {e}"),
        }
    }

    fn require_installed(&self) -> io::Result<()> {
        if self.is_installed() {
            Ok(())
        } else {
            Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("service file '{}' is not installed", self.plist_path.display()),
            ))
        }
    }

    fn service_target(&self) -> String { format!("gui/{}/{}", getuid(), self.label) }

    fn plist_arg(&self) -> io::Result<&str> {
        self.plist_path.to_str().ok_or_else(|| io::Error::other("non-UTF8 plist path"))
    }
}

/// The launch-at-login preference. Enabled means the agent plist exists;
/// toggling only writes or removes the plist, so a running instance is left
/// alone and the change applies at the next login. `LaunchAgent::stop` still
/// reaches an agent whose plist was removed here.
#[derive(Debug, Clone)]
pub struct LaunchAtLogin<L = SystemLaunchctl> {
    agent: LaunchAgent<L>,
}

impl LaunchAtLogin {
    pub fn for_current_user() -> io::Result<Self> {
        LaunchAgent::for_current_user().map(Self::new)
    }
}

impl<L: Launchctl> LaunchAtLogin<L> {
    pub fn new(agent: LaunchAgent<L>) -> Self { Self { agent } }

    pub fn is_enabled(&self) -> bool { self.agent.is_installed() }

    pub fn set_enabled(&self, enabled: bool) -> io::Result<()> {
        if enabled {
            self.agent.write_plist()?;
            self.agent.enable();
        } else {
            self.agent.remove_plist()?;
        }
        info!(enabled, "launch at login updated");
        Ok(())
    }

    /// Flips the preference and returns the new state.
    pub fn toggle(&self) -> io::Result<bool> {
        let enabled = !self.is_enabled();
        self.set_enabled(enabled)?;
        Ok(enabled)
    }
}

fn domain_target() -> String { format!("gui/{}", getuid()) }

fn check_exit(code: i32, what: &str) -> io::Result<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(io::Error::other(format!("{} failed (exit {})", what, code)))
    }
}

fn write_file(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut f = File::create(path)?;
    f.write_all(contents.as_bytes())?;
    Ok(())
}

fn run_launchctl(args: &[&str], suppress_output: bool) -> io::Result<i32> {
    let mut cmd = Command::new(LAUNCHCTL_PATH);
    cmd.args(args);
    if suppress_output {
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
    }
    let status = cmd.status()?;

    if let Some(code) = status.code() {
        Ok(code)
    } else {
        let sig = status.signal().unwrap_or_default();
        Err(io::Error::other(format!("launchctl terminated by signal {}", sig)))
    }
}

fn spawn_launchctl(args: &[&str]) -> io::Result<()> {
    let mut cmd = Command::new(LAUNCHCTL_PATH);
    cmd.args(args);
    cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());
    let _child = cmd.spawn()?;
    Ok(())
}
