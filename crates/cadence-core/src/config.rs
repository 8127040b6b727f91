use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// File merged under the defaults when present in the working directory.
pub const CONFIG_FILE: &str = "cadence.toml";
/// Prefix of environment overrides, e.g. `CADENCE_DATABASE_PATH`.
pub const ENV_PREFIX: &str = "CADENCE_";

/// Settings for the storage layer and the occurrence projector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Path of the SQLite database file
    pub database_path: String,
    /// Upper bound of the connection pool
    pub max_connections: u32,
    /// Optional cap on the occurrences a single expansion returns
    pub max_occurrences: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: "cadence.db".to_string(),
            max_connections: 5,
            max_occurrences: None,
        }
    }
}

impl EngineConfig {
    /// Defaults, then `cadence.toml`, then `CADENCE_*` variables.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load() -> Result<Self, CoreError> {
        Ok(Self::figment().extract()?)
    }
}
