// src/config/mod.rs
//! Configuration loading: file (TOML or JSON) with env overrides.

pub mod collector;
pub mod sources;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub use collector::CollectorConfig;
pub use sources::SourcesConfig;

pub const ENV_CONFIG_PATH: &str = "COLLECTOR_CONFIG_PATH";
pub const DEFAULT_TOML_PATH: &str = "config/collector.toml";
pub const DEFAULT_JSON_PATH: &str = "config/collector.json";

/// Top-level file layout: collector options at the root, adapter
/// endpoints under `[sources]`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(flatten)]
    pub collector: CollectorConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

impl AppConfig {
    /// Load from an explicit path. Format is chosen by extension, with a
    /// content sniff fallback.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading collector config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let mut cfg = parse(&content, ext.as_str())
            .with_context(|| format!("parsing collector config {}", path.display()))?;
        cfg.collector.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $COLLECTOR_CONFIG_PATH
    /// 2) config/collector.toml
    /// 3) config/collector.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_TOML_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_TOML_PATH))?
        } else if Path::new(DEFAULT_JSON_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_JSON_PATH))?
        } else {
            Self::default()
        };
        cfg.collector.apply_env_overrides();
        cfg.collector.sanitize();
        Ok(cfg)
    }
}

fn parse(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => {
            if s.trim_start().starts_with('{') {
                Ok(serde_json::from_str(s)?)
            } else {
                Ok(toml::from_str(s)?)
            }
        }
    }
}
