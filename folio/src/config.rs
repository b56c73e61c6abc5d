use std::io::Read;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use folio_store::alert::DEFAULT_ALERT_QUEUE;
use folio_store::RemoteDescription;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    pub account: AccountConfig,
    #[serde(default)]
    pub session: SessionConfig,
    /// The remote the in-memory transport serves.
    pub remote: RemoteDescription,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AccountConfig {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionConfig {
    /// Enable quick resynchronization right after login, when the
    /// remote supports it.
    #[serde(default)]
    pub quick_resync: bool,
    #[serde(default = "default_alert_queue")]
    pub alert_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            quick_resync: false,
            alert_queue: default_alert_queue(),
        }
    }
}

impl Config {
    /// The account of the built-in demo remote.
    pub fn dev() -> Self {
        Self {
            account: AccountConfig {
                username: "alice".into(),
                password: "hunter2".into(),
            },
            session: SessionConfig::default(),
            remote: RemoteDescription::demo(),
        }
    }
}

pub fn read_config(config_file: PathBuf) -> Result<Config> {
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .open(config_file.as_path())?;

    let mut config = String::new();
    file.read_to_string(&mut config)?;

    Ok(toml::from_str(&config)?)
}

fn default_alert_queue() -> usize {
    DEFAULT_ALERT_QUEUE
}
