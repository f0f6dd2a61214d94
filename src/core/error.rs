//! Typed error handling for the specification engine
//!
//! Every fallible operation returns [`SpecResult`]. Errors are never
//! recovered locally: a translator or combinator error describes a
//! specification the engine cannot process and must reach the caller.
//!
//! # Error Categories
//!
//! - [`SpecError::UnsupportedOperation`]: a condition-tree node with no lowering
//! - [`SpecError::UnsupportedSpecification`]: an artifact the specification cannot produce
//! - [`SpecError::InvalidArgument`]: invalid input rejected at the boundary
//! - [`SpecError::Factory`]: a result-cache factory failed
//! - [`SpecError::Cache`]: the shared cache tier failed
//! - [`ConfigError`]: configuration loading and parsing
//!
//! # Example
//!
//! ```rust,ignore
//! match translator.translate(&predicate) {
//!     Ok(text) => execute(&text.sql, &text.parameters),
//!     Err(SpecError::UnsupportedOperation { operation }) => {
//!         eprintln!("cannot lower {}", operation);
//!     }
//!     Err(e) => return Err(e),
//! }
//! ```

use thiserror::Error;

/// The main error type of the engine
#[derive(Debug, Error)]
pub enum SpecError {
    /// The condition tree used a construct with no textual or compiled form
    #[error("Unsupported operation: {operation}")]
    UnsupportedOperation { operation: String },

    /// The specification cannot produce the requested artifact
    #[error("Specification '{specification}' is not supported: {message}")]
    UnsupportedSpecification {
        specification: String,
        message: String,
    },

    /// Invalid input rejected before any state was touched
    #[error("Invalid argument '{argument}': {message}")]
    InvalidArgument { argument: String, message: String },

    /// A result-cache factory failed; nothing was stored
    #[error("Cache factory failed: {0}")]
    Factory(#[source] anyhow::Error),

    /// The shared cache tier failed
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// Failed to encode or decode a value
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SpecError {
    /// Shorthand for [`SpecError::UnsupportedOperation`]
    pub fn unsupported(operation: impl Into<String>) -> Self {
        SpecError::UnsupportedOperation {
            operation: operation.into(),
        }
    }

    /// Shorthand for [`SpecError::InvalidArgument`]
    pub fn invalid(argument: impl Into<String>, message: impl Into<String>) -> Self {
        SpecError::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    /// Get the error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            SpecError::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            SpecError::UnsupportedSpecification { .. } => "UNSUPPORTED_SPECIFICATION",
            SpecError::InvalidArgument { .. } => "INVALID_ARGUMENT",
            SpecError::Factory(_) => "CACHE_FACTORY_FAILED",
            SpecError::Cache { .. } => "CACHE_ERROR",
            SpecError::Serialization { .. } => "SERIALIZATION_ERROR",
            SpecError::Config(e) => e.error_code(),
        }
    }
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors related to configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration{}: {message}", .file.as_deref().map(|f| format!(" '{}'", f)).unwrap_or_default())]
    ParseError {
        file: Option<String>,
        message: String,
    },

    /// IO error while reading configuration
    #[error("IO error: {message}")]
    IoError { message: String },
}

impl ConfigError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ConfigError::FileNotFound { .. } => "CONFIG_FILE_NOT_FOUND",
            ConfigError::ParseError { .. } => "CONFIG_PARSE_ERROR",
            ConfigError::IoError { .. } => "CONFIG_IO_ERROR",
        }
    }
}

// =============================================================================
// Conversions from external errors
// =============================================================================

impl From<serde_json::Error> for SpecError {
    fn from(err: serde_json::Error) -> Self {
        SpecError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for SpecError {
    fn from(err: serde_yaml::Error) -> Self {
        SpecError::Config(ConfigError::ParseError {
            file: None,
            message: err.to_string(),
        })
    }
}

impl From<std::io::Error> for SpecError {
    fn from(err: std::io::Error) -> Self {
        SpecError::Config(ConfigError::IoError {
            message: err.to_string(),
        })
    }
}

/// A specialized Result type for engine operations
pub type SpecResult<T> = Result<T, SpecError>;
