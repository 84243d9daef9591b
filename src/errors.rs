//! Unified error types and result handling.
//!
//! Every fallible operation in the crate returns [`Result`]. Delivery failures reported
//! by the chat platform are classified so that best-effort cleanup can tell a missing
//! message or a missing permission apart from a real outage.

use poise::serenity_prelude as serenity;
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed.
    #[error("Configuration error: {message}")]
    Config {
        /// Human readable description
        message: String,
    },

    /// The backing store returned an error.
    #[error("Database error: {0}")]
    Database(String),

    /// The backing store is not connected.
    #[error("The database is not connected")]
    NotConnected,

    /// The platform reported that the target (message, emoji, user) does not exist.
    #[error("Not found: {message}")]
    NotFound {
        /// Platform response text
        message: String,
    },

    /// The platform refused the request because the bot lacks a permission.
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Platform response text
        message: String,
    },

    /// Any other platform or gateway failure.
    #[error("Discord error: {0}")]
    Discord(Box<serenity::Error>),

    /// A second wait was started on a message that already has one outstanding.
    #[error("A reaction wait is already pending on message {message_id}")]
    WaitAlreadyPending {
        /// The watched message
        message_id: u64,
    },

    /// More command completions were reported than command starts.
    #[error("Command counter underflow: a completion was reported without a matching start")]
    CounterUnderflow,

    /// A prefix was rejected before reaching the store.
    #[error("Invalid prefix: {reason}")]
    InvalidPrefix {
        /// Why the prefix was rejected
        reason: String,
    },

    /// I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A required environment variable is missing or malformed.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Returns `true` for the failures that best-effort cleanup swallows: the target
    /// no longer exists, or the bot is not allowed to touch it.
    #[must_use]
    pub const fn is_cleanup_tolerable(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::Forbidden { .. })
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(value: sea_orm::DbErr) -> Self {
        Self::Database(value.to_string())
    }
}

impl From<serenity::Error> for Error {
    fn from(value: serenity::Error) -> Self {
        if let serenity::Error::Http(serenity::HttpError::UnsuccessfulRequest(response)) = &value {
            let message = response.error.message.clone();
            match response.status_code.as_u16() {
                404 => return Self::NotFound { message },
                403 => return Self::Forbidden { message },
                _ => {}
            }
        }
        Self::Discord(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_tolerable_classification() {
        assert!(
            Error::NotFound {
                message: "Unknown Message".to_string()
            }
            .is_cleanup_tolerable()
        );
        assert!(
            Error::Forbidden {
                message: "Missing Permissions".to_string()
            }
            .is_cleanup_tolerable()
        );
        assert!(!Error::NotConnected.is_cleanup_tolerable());
        assert!(!Error::CounterUnderflow.is_cleanup_tolerable());
    }

    #[test]
    fn test_db_error_conversion() {
        let error: Error = sea_orm::DbErr::Custom("boom".to_string()).into();
        assert!(matches!(error, Error::Database(message) if message.contains("boom")));
    }
}
