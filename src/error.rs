use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("repo {path}: {message}")]
    Repo { path: String, message: String },
    #[error("config error: {0}")]
    Config(String),
    #[error("cache error: {0}")]
    Cache(String),
    #[error("invalid date: {0}")]
    InvalidDate(String),
    #[error("invalid period: {0}")]
    InvalidPeriod(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("config parse error: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("config write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Wrap a failure with the repository path it belongs to, so callers can
    /// display it without further context.
    pub fn repo(path: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Error::Repo {
            path: path.into(),
            message: message.to_string(),
        }
    }
}
