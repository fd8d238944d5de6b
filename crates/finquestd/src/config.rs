//! Configuration for finquestd.
//!
//! Loads settings from /etc/finquest/config.toml or uses defaults. Policy
//! values (skill unlock threshold, practice queue sizing) live here so they
//! are explicit and overridable rather than buried as literals.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/finquest/config.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Bind address for the HTTP server
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// SQLite database file
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Completed lessons required in a skill before the next skill in the
    /// path unlocks. A policy constant, deliberately not derived from the
    /// skill's actual lesson count.
    #[serde(default = "default_skill_unlock_threshold")]
    pub skill_unlock_threshold: i64,

    /// Maximum exercises in a practice queue
    #[serde(default = "default_practice_queue_size")]
    pub practice_queue_size: usize,

    /// How many recent incorrect attempts feed queue selection
    #[serde(default = "default_miss_window")]
    pub practice_miss_window: usize,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8340".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/finquest/finquest.db")
}

fn default_skill_unlock_threshold() -> i64 {
    6
}

fn default_practice_queue_size() -> usize {
    10
}

fn default_miss_window() -> usize {
    20
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            db_path: default_db_path(),
            skill_unlock_threshold: default_skill_unlock_threshold(),
            practice_queue_size: default_practice_queue_size(),
            practice_miss_window: default_miss_window(),
        }
    }
}

impl Config {
    /// Load from the given path, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    warn!("Failed to parse {}: {} - using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }
}
