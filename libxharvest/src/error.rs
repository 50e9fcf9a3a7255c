//! Error types for xharvest

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Session setup failed: {0}")]
    Session(String),

    #[error("Could not find user @{handle} after {attempts} attempts")]
    Resolution { handle: String, attempts: u32 },

    #[error("Fetching posts for {account} failed after {attempts} attempts: {source}")]
    Fetch {
        account: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl HarvestError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            HarvestError::InvalidInput(_) => 3,
            HarvestError::Session(_) => 2,
            HarvestError::Fetch {
                source: ProviderError::Authentication(_),
                ..
            } => 2,
            HarvestError::Resolution { .. } => 1,
            HarvestError::Fetch { .. } => 1,
            HarvestError::Config(_) => 1,
            HarvestError::Export(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to access session store {path}: {message}")]
    Io { path: String, message: String },

    #[error("Session store {path} is malformed: {message}")]
    Format { path: String, message: String },
}

impl From<StoreError> for ProviderError {
    fn from(error: StoreError) -> Self {
        ProviderError::Storage(error.to_string())
    }
}

/// Errors raised by a session provider while talking to the platform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected response shape: {0}")]
    Parse(String),

    #[error("Server returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Session store error: {0}")]
    Storage(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = HarvestError::InvalidInput("bad timestamp".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_session_error() {
        let error = HarvestError::Session("No accounts found after adding".to_string());
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_fetch_auth_failure() {
        let error = HarvestError::Fetch {
            account: "42".to_string(),
            attempts: 3,
            source: ProviderError::Authentication("cookie expired".to_string()),
        };
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_fetch_network_failure() {
        let error = HarvestError::Fetch {
            account: "42".to_string(),
            attempts: 3,
            source: ProviderError::Network("connection reset".to_string()),
        };
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_exit_code_resolution_and_config() {
        let resolution = HarvestError::Resolution {
            handle: "nobody".to_string(),
            attempts: 3,
        };
        assert_eq!(resolution.exit_code(), 1);

        let config = HarvestError::Config(ConfigError::MissingField("session.username".to_string()));
        assert_eq!(config.exit_code(), 1);
    }

    #[test]
    fn test_resolution_message_names_attempts() {
        let error = HarvestError::Resolution {
            handle: "rustlang".to_string(),
            attempts: 3,
        };
        assert_eq!(
            error.to_string(),
            "Could not find user @rustlang after 3 attempts"
        );
    }

    #[test]
    fn test_fetch_message_includes_last_error() {
        let error = HarvestError::Fetch {
            account: "@rustlang".to_string(),
            attempts: 2,
            source: ProviderError::RateLimit("429 Too Many Requests".to_string()),
        };
        let message = error.to_string();
        assert!(message.contains("@rustlang"));
        assert!(message.contains("2 attempts"));
        assert!(message.contains("Rate limit exceeded: 429 Too Many Requests"));
    }

    #[test]
    fn test_config_error_conversion() {
        let harvest_error: HarvestError = ConfigError::MissingField("test".to_string()).into();
        match harvest_error {
            HarvestError::Config(_) => {}
            _ => panic!("Expected HarvestError::Config"),
        }
    }

    #[test]
    fn test_export_error_formatting() {
        let error = ExportError::Io {
            path: "/readonly/out.json".to_string(),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let message = HarvestError::from(error).to_string();
        assert!(message.starts_with("Export error: Failed to write /readonly/out.json"));
    }

    #[test]
    fn test_store_error_maps_to_storage() {
        let error = StoreError::Format {
            path: "accounts.toml".to_string(),
            message: "expected table".to_string(),
        };
        let provider_error: ProviderError = error.into();
        assert!(matches!(provider_error, ProviderError::Storage(_)));
    }

    #[test]
    fn test_provider_error_clone() {
        let original = ProviderError::Network("Connection failed".to_string());
        assert_eq!(original.clone(), original);
    }
}
