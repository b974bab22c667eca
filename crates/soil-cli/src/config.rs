use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use soil_engine::EngineConfig;
use soil_rules::RulesConfig;
use tracing::debug;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "soil.toml";

/// Everything a `soil.toml` can set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilConfig {
    pub engine: EngineConfig,
    pub rules: RulesConfig,
}

impl SoilConfig {
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text).context("parsing soil config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or `soil.toml` if present, or the defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path: PathBuf = match path {
            Some(path) => path.to_path_buf(),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => PathBuf::from(DEFAULT_CONFIG_FILE),
            None => {
                debug!("no config file, using defaults");
                return Ok(Self::default());
            }
        };
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading config {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("rendering soil config")
    }

    /// The engine and the rules must agree on the names they share.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.engine.identity_type != self.rules.identity_type {
            bail!(
                "engine.identity_type {:?} differs from rules.identity_type {:?}",
                self.engine.identity_type,
                self.rules.identity_type
            );
        }
        if self.engine.remote_request_field != self.rules.remote_request_field {
            bail!(
                "engine.remote_request_field {:?} differs from rules.remote_request_field {:?}",
                self.engine.remote_request_field,
                self.rules.remote_request_field
            );
        }
        self.rules.validate()?;
        Ok(())
    }
}
