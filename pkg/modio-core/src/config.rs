//! Host-supplied runtime configuration. Grounded on the teacher's
//! `common::args`/preference-struct style: a plain `serde`-deserializable
//! struct rather than scattered globals, so a host can load it from a
//! TOML/JSON file. This doubles as the template `SessionData` (§3) is
//! built from.

use serde::Deserialize;

use modio_http::Environment;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_key: String,
    pub game_id: u64,
    #[serde(default = "default_portal")]
    pub portal: String,
    #[serde(default)]
    pub environment: ConfigEnvironment,
    #[serde(default = "default_locale")]
    pub locale: String,
    pub platform_override: Option<String>,
    pub environment_override_host: Option<String>,
    pub root_path: String,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigEnvironment {
    #[default]
    Live,
    Test,
}

impl From<ConfigEnvironment> for Environment {
    fn from(value: ConfigEnvironment) -> Self {
        match value {
            ConfigEnvironment::Live => Environment::Live,
            ConfigEnvironment::Test => Environment::Test,
        }
    }
}

fn default_portal() -> String {
    "none".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let json = r#"{"api_key":"k","game_id":42,"root_path":"/tmp/modio"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.portal, "none");
        assert_eq!(config.locale, "en");
        assert!(matches!(config.environment, ConfigEnvironment::Live));
    }
}
