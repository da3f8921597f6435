//! Error types for Conexia

use thiserror::Error;

/// Result type alias using Conexia's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Conexia error types with helpful messages and suggestions
///
/// Every error is scoped to the single user action that triggered it;
/// none of them is fatal to the process.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors (E001-E099), raised before any network call
    #[error("No company identity in the current session. Sign in before changing data.")]
    MissingIdentity,

    #[error("A project named '{0}' already exists. Please choose another name.")]
    DuplicateName(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("The {0} list is not loaded yet. Refresh it before making changes.")]
    NotLoaded(&'static str),

    // Gateway errors (E100-E199)
    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Subscription error: {0}")]
    Subscription(String),

    #[error("Malformed {kind} record: {reason}")]
    MalformedRecord { kind: &'static str, reason: String },

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Preference storage error: {0}")]
    Preference(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingIdentity => "E001",
            Self::DuplicateName(_) => "E002",
            Self::InvalidInput(_) => "E003",
            Self::NotLoaded(_) => "E004",
            Self::Gateway(_) => "E100",
            Self::Subscription(_) => "E101",
            Self::MalformedRecord { .. } => "E102",
            Self::ConfigError(_) => "E600",
            Self::Preference(_) => "E601",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::MissingIdentity => {
                Some("pass --company or set the CONEXIA_COMPANY env var".to_string())
            }
            Self::DuplicateName(_) | Self::NotLoaded(_) => {
                Some("conexia projects list".to_string())
            }
            Self::Gateway(_) => Some("conexia config get gateway.url".to_string()),
            Self::ConfigError(_) => Some("conexia config list".to_string()),
            _ => None,
        }
    }

    /// Whether the error was raised by local validation, before any request left the client
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingIdentity
                | Self::DuplicateName(_)
                | Self::InvalidInput(_)
                | Self::NotLoaded(_)
        )
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Gateway(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(format!("JSON error: {}", err))
    }
}
