use std::path::PathBuf;
use std::process;

use bluesnooze::common::config::{Config, config_file};
use bluesnooze::common::log;
use bluesnooze::sys::service::{ServiceCommands, handle_service_command};
use clap::{Parser, Subcommand};

#[cfg(target_os = "macos")]
embed_plist::embed_info_plist!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/Info.plist"));

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Run without a status bar icon (overrides the config file).
    #[arg(long)]
    hide_icon: bool,

    /// Check whether the config file can be loaded, then exit.
    #[arg(long)]
    validate: bool,

    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the launchd agent that starts bluesnooze at login
    Service {
        #[command(subcommand)]
        service: ServiceCommands,
    },
}

fn main() {
    sigpipe::reset();
    let opt = Cli::parse();

    if let Some(Commands::Service { service }) = &opt.command {
        match handle_service_command(service) {
            Ok(msg) => {
                println!("{}", msg);
                process::exit(0);
            }
            Err(e) => {
                eprintln!("{}", e);
                process::exit(1);
            }
        }
    }

    log::init_logging();
    install_panic_hook();

    let Some(config_path) = opt.config.clone().or_else(config_file) else {
        eprintln!("Could not determine the home directory; pass --config explicitly");
        process::exit(1);
    };

    if opt.validate {
        match Config::read_or_default(&config_path) {
            Ok(_) => println!("Config validation passed"),
            Err(e) => {
                eprintln!("{}: {:#}", config_path.display(), e);
                process::exit(1);
            }
        }
        return;
    }

    let mut config = match Config::read_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {:#}", config_path.display(), e);
            process::exit(1);
        }
    };
    config.settings.hide_icon |= opt.hide_icon;

    run(config);
}

#[cfg(target_os = "macos")]
fn run(config: Config) {
    use std::cell::RefCell;
    use std::rc::Rc;

    use bluesnooze::guardian::PowerStateGuardian;
    use bluesnooze::retry::ThreadSleeper;
    use bluesnooze::sys::bluetooth::SystemBluetooth;
    use bluesnooze::sys::lifecycle::{SleepSubscription, UnlockSubscription};
    use bluesnooze::sys::service::LaunchAtLogin;
    use bluesnooze::sys::wifi::SystemWifi;
    use bluesnooze::ui::menu_bar::StatusMenu;
    use objc2::MainThreadMarker;
    use objc2_app_kit::{NSApplication, NSApplicationActivationPolicy};
    use tracing::{info, warn};

    let Some(mtm) = MainThreadMarker::new() else {
        eprintln!("bluesnooze must be started on the main thread");
        process::exit(1);
    };
    let app = NSApplication::sharedApplication(mtm);
    let _ = app.setActivationPolicy(NSApplicationActivationPolicy::Accessory);

    let guardian = Rc::new(RefCell::new(PowerStateGuardian::new(
        SystemBluetooth,
        SystemWifi,
        ThreadSleeper,
    )));
    let _sleep = SleepSubscription::register(mtm, guardian.clone());
    let _unlock = UnlockSubscription::register(mtm, guardian);

    let _status_menu = if config.settings.hide_icon {
        info!("status bar icon hidden");
        None
    } else {
        match LaunchAtLogin::for_current_user() {
            Ok(launch_at_login) => Some(StatusMenu::new(mtm, launch_at_login)),
            Err(e) => {
                warn!("status menu unavailable: {e}");
                None
            }
        }
    };

    if let Err(e) = ctrlc::set_handler(|| {
        info!("interrupted; exiting");
        process::exit(0);
    }) {
        warn!("failed to install Ctrl+C handler: {e}");
    }

    info!("watching for sleep and unlock");
    app.run();
}

#[cfg(not(target_os = "macos"))]
fn run(_config: Config) {
    eprintln!("bluesnooze only runs on macOS");
    process::exit(1);
}

#[cfg(panic = "unwind")]
fn install_panic_hook() {
    // Abort on panic instead of unwinding into AppKit callbacks.
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        original_hook(info);
        std::process::abort();
    }));
}

#[cfg(not(panic = "unwind"))]
fn install_panic_hook() {}
