use cadence_core::config::{EngineConfig, CONFIG_FILE, ENV_PREFIX};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    #[serde(flatten)]
    pub engine: EngineConfig,
    /// Length of the window `expand` and `calendar` show when `--to` is absent
    pub default_window_days: i64,
    /// Timezone stored on new series when `--timezone` is absent
    pub default_timezone: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            default_window_days: 30,
            default_timezone: "UTC".to_string(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self, figment::Error> {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_and_environment_layer_over_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                default_window_days = 7
                max_occurrences = 20
                "#,
            )?;
            jail.set_env("CADENCE_DATABASE_PATH", "/tmp/elsewhere.db");

            let config = Config::new()?;
            assert_eq!(config.default_window_days, 7);
            assert_eq!(config.engine.max_occurrences, Some(20));
            assert_eq!(config.engine.database_path, "/tmp/elsewhere.db");
            assert_eq!(config.default_timezone, "UTC");
            Ok(())
        });
    }
}
