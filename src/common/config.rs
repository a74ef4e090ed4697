use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use serde::Deserialize;

const DEFAULT_CONFIG: &str = include_str!("../../bluesnooze.default.toml");

pub fn config_file() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("bluesnooze").join("config.toml"))
}

#[derive(Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Run without a status bar item.
    #[serde(default = "no")]
    pub hide_icon: bool,
}

#[derive(Deserialize, Debug, PartialEq, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
}

fn no() -> bool { false }

impl Config {
    pub fn read(path: &Path) -> anyhow::Result<Config> {
        let buf = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&buf)
    }

    /// Reads `path` if it exists, otherwise falls back to the bundled defaults.
    pub fn read_or_default(path: &Path) -> anyhow::Result<Config> {
        if path.exists() { Self::read(path) } else { Self::bundled() }
    }

    pub fn bundled() -> anyhow::Result<Config> { Self::parse(DEFAULT_CONFIG) }

    fn parse(buf: &str) -> anyhow::Result<Config> {
        match toml::from_str::<Config>(buf) {
            Ok(config) => Ok(config),
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("unknown field") {
                    bail!("{msg}\nThe only supported setting is `settings.hide_icon`.");
                }
                bail!("{msg}");
            }
        }
    }
}
