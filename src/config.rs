
use {
    crate::{ifs::wp_fifo_manager_v1::FIFO_MANAGER_VERSION, utils::errorfmt::ErrorFmt},
    serde::Deserialize,
    std::{io, path::Path, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read {0}")]
    Read(String, #[source] io::Error),
    #[error("Could not parse the config")]
    Parse(#[source] toml::de::Error),
    #[error("The fallback interval must not be zero")]
    ZeroFallbackInterval,
    #[error("At least one commit must be allowed to be queued")]
    ZeroMaxQueuedCommits,
    #[error("Version {0} of wp_fifo_manager_v1 is not supported")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub fifo: FifoConfig,
    pub simulate: SimulateConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct FifoConfig {
    /// The version of the advertised global.
    pub version: u32,
    /// The cadence of the fallback timer for surfaces without an output.
    pub fallback_interval_ms: u64,
    pub max_queued_commits: usize,
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            version: FIFO_MANAGER_VERSION,
            fallback_interval_ms: 25,
            max_queued_commits: 1024,
        }
    }
}

impl FifoConfig {
    pub fn fallback_interval(&self) -> Duration {
        Duration::from_millis(self.fallback_interval_ms)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct SimulateConfig {
    pub refresh_rate: f64,
    pub client_rate: f64,
}

impl Default for SimulateConfig {
    fn default() -> Self {
        Self {
            refresh_rate: 60.0,
            client_rate: 144.0,
        }
    }
}

impl Config {
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(s).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let s = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => return Err(ConfigError::Read(path.display().to_string(), e)),
        };
        Self::parse(&s)
    }

    /// Loads the config at `path` or returns the default config if there is no path.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        match Self::load(path) {
            Ok(c) => {
                log::info!("Loaded config from {}", path.display());
                c
            }
            Err(e) => {
                log::warn!("Using the default config: {}", ErrorFmt(e));
                Self::default()
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let fifo = &self.fifo;
        if fifo.fallback_interval_ms == 0 {
            return Err(ConfigError::ZeroFallbackInterval);
        }
        if fifo.max_queued_commits == 0 {
            return Err(ConfigError::ZeroMaxQueuedCommits);
        }
        if fifo.version == 0 || fifo.version > FIFO_MANAGER_VERSION {
            return Err(ConfigError::UnsupportedVersion(fifo.version));
        }
        Ok(())
    }
}
