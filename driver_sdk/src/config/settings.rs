use crate::drivers::traits::DriverConfig;
use crate::tags::engine::ValidateOn;
use crate::tags::structures::Tag;
use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct EngineSettings {
    #[serde(default)]
    pub validate_on: ValidateOn,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ApiSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_credential")]
    pub username: String,
    #[serde(default = "default_credential")]
    pub password: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_credential() -> String {
    "admin".to_string()
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            bind: default_bind(),
            username: default_credential(),
            password: default_credential(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub devices: Vec<DriverConfig>, // A list of device configurations
    #[serde(default)] // Make tags optional in the config file
    pub tags: Vec<Tag>, // A list of tag configurations
}

impl Settings {
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::from(config_path))
            .build()?;

        // Deserialize the entire configuration
        s.try_deserialize()
    }

    pub fn save(&self, config_path: &Path) -> io::Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        fs::write(config_path, toml_string)
    }

    /// Tags whose device is not configured.
    pub fn orphan_tags(&self) -> Vec<&Tag> {
        self.tags
            .iter()
            .filter(|tag| !self.devices.iter().any(|d| d.id == tag.device_id))
            .collect()
    }
}
