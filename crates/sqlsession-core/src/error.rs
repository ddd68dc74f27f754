//! Error types
//!
//! Three categories are kept apart:
//!
//! - [`ConfigError`]: an invalid or missing option, raised while building a
//!   [`SessionConfig`](crate::config::SessionConfig). Fatal at startup.
//! - [`StoreError`]: anything the persistence layer reports. Duplicate keys
//!   and vanished rows get their own variants, every other backend failure is
//!   folded into [`StoreError::Storage`].
//! - [`SessionError`]: what the request-scoped API returns. It wraps the two
//!   above and adds the few failures that belong to the handle itself.
//!
//! Expired sessions and fingerprint mismatches are not errors. They are
//! ordinary lifecycle transitions, see [`Rejection`](crate::lifecycle::Rejection).

use thiserror::Error;

/// Configuration errors
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
	#[error("Invalid value for '{key}': {message}")]
	InvalidValue { key: String, message: String },

	#[error("Missing required field: {0}")]
	MissingRequired(String),

	#[error("Failed to parse configuration: {0}")]
	Parse(String),
}

impl ConfigError {
	pub(crate) fn invalid(key: &str, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			key: key.to_string(),
			message: message.into(),
		}
	}
}

/// Session store errors
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
	/// A row with this identifier already exists
	#[error("Session already exists: {0}")]
	Conflict(String),
	/// No row with this identifier exists
	#[error("Session not found: {0}")]
	NotFound(String),
	/// Connection, query or constraint failure in the backend
	#[error("Storage error: {0}")]
	Storage(String),
}

/// Errors surfaced by the request-scoped session API
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error(transparent)]
	Store(#[from] StoreError),

	/// The operating system's secure random source failed
	#[error("Secure random source unavailable: {0}")]
	Entropy(String),

	#[error("Serialization error: {0}")]
	Serialization(String),

	/// The handle has not run its lifecycle yet
	#[error("Session has not been started")]
	NotStarted,

	/// The session was destroyed earlier in this request
	#[error("Session has been destroyed")]
	Destroyed,
}

impl From<serde_json::Error> for SessionError {
	fn from(error: serde_json::Error) -> Self {
		Self::Serialization(error.to_string())
	}
}
