use thiserror::Error;

pub type Result<T> = std::result::Result<T, CypherpunkError>;

#[derive(Error, Debug)]
pub enum CypherpunkError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("chain is not enabled: {0}")]
    ChainNotEnabled(String),

    #[error("connection refused: {url}: {reason}")]
    ConnectionRefused { url: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("state file write error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl CypherpunkError {
    pub fn chain_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "chain",
            id: id.into(),
        }
    }

    pub fn app_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: "app",
            id: id.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }
}
