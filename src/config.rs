use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

/// Names a YAML file to load the configuration from.
pub const CONFIG_ENV: &str = "RAWHTTP_CONFIG";
/// Overrides the configured port.
pub const PORT_ENV: &str = "RAWHTTP_PORT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 42069,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads the file named by `RAWHTTP_CONFIG` (or the defaults), then
    /// applies `RAWHTTP_PORT` on top.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            cfg.port = port
                .parse()
                .with_context(|| format!("{} is not a valid port: {}", PORT_ENV, port))?;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(content).context("parsing config")?;
        cfg.log_level()?;
        Ok(cfg)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn log_level(&self) -> anyhow::Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown log level: {}", self.log_level))
    }
}
