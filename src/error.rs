use thiserror::Error;

#[derive(Error, Debug)]
pub enum TimetableError {
    #[error("Invalid domain: {0}")]
    InvalidDomain(String),

    #[error("Invalid search parameters: {0}")]
    InvalidParameters(String),

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TimetableError>;
