//! Application configuration loaded from `config.toml` and `ZWS_*` variables.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

/// Directory under the user's config directory owned by this tool.
pub const APP_DIR: &str = "zws";

/// Public calendar page listing the guest world rotation.
pub const DEFAULT_SCHEDULE_URL: &str = "https://zwiftinsider.com/schedule/";

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

const DEFAULT_CONFIG: &str = r#"# zws configuration. Every key is optional; values shown are examples.
# Environment variables prefixed with ZWS_ (e.g. ZWS_SCHEDULE_URL) override this file.

# schedule_url = "https://zwiftinsider.com/schedule/"
# fetch_timeout_secs = 30
# world_element = "WORLD"
# pointer_path = "/home/me/.config/zws/last_prefs_path"
# prefs_candidates = ["/home/me/Documents/Zwift/prefs.xml"]
"#;

/// Runtime settings for the preferences store and schedule resolver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Default `prefs.xml` locations, probed in order.
    pub prefs_candidates: Vec<PathBuf>,
    /// File remembering the last explicitly selected `prefs.xml`.
    pub pointer_path: PathBuf,
    /// Direct child of the document root holding the world id.
    pub world_element: String,
    /// Page scraped for the daily rotation.
    pub schedule_url: String,
    /// Upper bound for the schedule request.
    pub fetch_timeout_secs: u64,
    /// User agent sent with the schedule request.
    pub user_agent: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prefs_candidates: default_prefs_candidates(),
            pointer_path: app_dir().join("last_prefs_path"),
            world_element: "WORLD".to_string(),
            schedule_url: DEFAULT_SCHEDULE_URL.to_string(),
            fetch_timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the default config file plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (optional on disk) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = Config::builder()
            .add_source(
                File::from(path.to_path_buf())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("ZWS"))
            .build()
            .with_context(|| format!("failed to load config {}", path.display()))?;
        settings
            .try_deserialize()
            .with_context(|| format!("invalid config {}", path.display()))
    }

    /// Schedule request timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// Path of the config file under the user's config directory.
pub fn config_path() -> PathBuf {
    app_dir().join("config.toml")
}

/// Write a commented template config if none exists yet.
pub fn ensure_default_config() -> Result<()> {
    let path = config_path();
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write default config {}", path.display()))
}

fn app_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

/// Windows, macOS and Linux install locations, in that order.
fn default_prefs_candidates() -> Vec<PathBuf> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    vec![
        home.join("Documents").join("Zwift").join("prefs.xml"),
        home.join("Library")
            .join("Application Support")
            .join("Zwift")
            .join("prefs.xml"),
        home.join(".local")
            .join("share")
            .join("Zwift")
            .join("prefs.xml"),
    ]
}
