use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    // path to database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Seconds to sleep between fully successful poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_sec: u64,
}

fn default_db_path() -> PathBuf { "/var/lib/playlist-notifier/notifier.db".into() }
fn default_log_dir() -> PathBuf { "/var/log/playlist-notifier".into() }
fn default_poll_interval() -> u64 { 3600 }

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }
}
