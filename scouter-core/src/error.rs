//! Unified error handling for infrastructure failures
//!
//! Provides structured error types with context and recovery suggestions.
//! Domain outcomes (forbidden, rate limited, ...) live in the application layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type ScouterResult<T> = Result<T, ScouterError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main infrastructure error type
#[derive(Error, Debug)]
pub enum ScouterError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl ScouterError {
    /// Configuration error without an underlying cause
    pub fn config<S: Into<String>>(message: S, component: &str) -> Self {
        ScouterError::Config {
            message: message.into(),
            source: None,
            context: ErrorContext::new(component)
                .with_suggestion("Check your configuration file and SCOUTER__ environment"),
        }
    }

    /// Storage error wrapping a backend failure
    pub fn storage<S, E>(message: S, component: &str, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        ScouterError::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(component),
        }
    }

    /// Network error wrapping a transport failure
    pub fn network<S, E>(message: S, component: &str, source: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        ScouterError::Network {
            message: message.into(),
            source: Some(Box::new(source)),
            context: ErrorContext::new(component),
        }
    }

    /// Validation error on a named field
    pub fn validation<S: Into<String>>(message: S, field: &str, component: &str) -> Self {
        ScouterError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
            context: ErrorContext::new(component)
                .with_suggestion("Check the field value and format"),
        }
    }

    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ScouterError::Config { context, .. } => Some(context),
            ScouterError::Storage { context, .. } => Some(context),
            ScouterError::Network { context, .. } => Some(context),
            ScouterError::Validation { context, .. } => Some(context),
            ScouterError::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ScouterError::Network { .. } | ScouterError::Storage { .. })
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            ScouterError::Network { .. } | ScouterError::Storage { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Backend error (may be recoverable)"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_builder() {
        let context = ErrorContext::new("ratelimit")
            .with_operation("incr")
            .with_metadata("key", "login:abc")
            .with_suggestion("retry later");

        assert_eq!(context.component, "ratelimit");
        assert_eq!(context.operation.as_deref(), Some("incr"));
        assert_eq!(context.metadata.get("key").map(String::as_str), Some("login:abc"));
        assert_eq!(context.recovery_suggestions.len(), 1);
        assert!(!context.error_id.is_empty());
    }

    #[test]
    fn test_recoverable_classification() {
        let storage = ScouterError::storage(
            "counter write failed",
            "ratelimit",
            std::io::Error::new(std::io::ErrorKind::Other, "disk"),
        );
        assert!(storage.is_recoverable());
        assert!(storage.context().is_some());

        let config = ScouterError::config("secret_key is empty", "config");
        assert!(!config.is_recoverable());
        assert!(config.to_string().contains("secret_key is empty"));
    }
}
