use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use crate::error::{Result, TimetableError};
use crate::models::{Domain, GaParameters};

pub const CONFIG_ENV: &str = "TIMETABLE_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "timetable.toml";

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            allowed_origin: "http://localhost:3000".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| TimetableError::InvalidAddress(format!("{}:{}", self.host, self.port)))
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub search: GaParameters,
    pub domain: Domain,
}

impl AppConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        config.search.validate()?;
        config.domain.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Reads the file named by `TIMETABLE_CONFIG`, then `timetable.toml`,
    /// and falls back to built-in defaults when neither exists.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            log::info!("Loading config from {}", path);
            return Self::load(Path::new(&path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            log::info!("Loading config from {}", DEFAULT_CONFIG_FILE);
            return Self::load(default_path);
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }
}
