use marketdesk_core::{ConfigError, DeskError, ProviderError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no API token: pass --token or set MARKETDESK_API_TOKEN")]
    NotLoggedIn,

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<DeskError> for CliError {
    fn from(error: DeskError) -> Self {
        match error {
            DeskError::Validation(error) => Self::Validation(error),
            DeskError::Provider(error) => Self::Provider(error),
            DeskError::NotAuthenticated => Self::NotLoggedIn,
            DeskError::Disconnected => {
                Self::Provider(ProviderError::transport("API connection is not available"))
            }
            DeskError::NoQuote => Self::Provider(ProviderError::not_found("no quote loaded")),
        }
    }
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Provider(_) => 3,
            Self::Config(_) | Self::NotLoggedIn => 4,
            Self::Serialization(_) => 5,
            Self::Io(_) => 10,
        }
    }
}
