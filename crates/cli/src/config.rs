use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::eyre::{eyre, Result};
use fnos_proxy_core::{PathRewriter, PathRule};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "FNOS_PROXY";
pub const DEFAULT_PORT: u16 = 8080;

/// Path rules as written by the operator: either the legacy
/// `{"from": "to"}` object or an ordered list of `{from, to}` rules.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PathReplace {
    Rules(Vec<PathRule>),
    Map(BTreeMap<String, String>),
}

impl Default for PathReplace {
    fn default() -> Self {
        PathReplace::Rules(Vec::new())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub fnos_base_url: String,
    #[serde(default)]
    pub immich_url: String,
    #[serde(default)]
    pub immich_api_key: String,
    #[serde(default)]
    pub path_replace: PathReplace,
    #[serde(default)]
    pub sqlite_db_path: PathBuf,
    #[serde(default)]
    pub automate_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_pipeline_deadline_secs")]
    pub pipeline_deadline_secs: u64,
    #[serde(default)]
    pub login_fallback: bool,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_pipeline_deadline_secs() -> u64 {
    60
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline_deadline_secs)
    }

    pub fn rewriter(&self) -> Result<PathRewriter> {
        let rewriter = match &self.path_replace {
            PathReplace::Rules(rules) => PathRewriter::new(rules.clone()),
            PathReplace::Map(map) => PathRewriter::from_map(map.clone()),
        };
        rewriter.map_err(|e| eyre!("path_replace: {e}"))
    }

    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("fnos_base_url", &self.fnos_base_url),
            ("immich_url", &self.immich_url),
            ("automate_url", &self.automate_url),
        ] {
            if value.trim().is_empty() {
                return Err(eyre!("{key} must be set"));
            }
            let parsed = url::Url::parse(value).map_err(|e| eyre!("{key}: {e}"))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(eyre!("{key}: unsupported scheme {}", parsed.scheme()));
            }
        }
        if self.sqlite_db_path.as_os_str().is_empty() {
            return Err(eyre!("sqlite_db_path must be set"));
        }
        if self.request_timeout_secs == 0 {
            return Err(eyre!("request_timeout_secs must be positive"));
        }
        if self.pipeline_deadline_secs == 0 {
            return Err(eyre!("pipeline_deadline_secs must be positive"));
        }
        self.rewriter()?;
        Ok(())
    }
}

/// File settings layered under `FNOS_PROXY__*` environment overrides.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "config file not found; continuing with env overrides only"
        );
    }
    let cfg = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
        .build()
        .map_err(|e| eyre!("config load error: {}", e))?;
    cfg.try_deserialize()
        .map_err(|e| eyre!("config parse error: {}", e))
}
