//! Session event reporting
//!
//! A [`SessionManager`](crate::manager::SessionManager) can be given a
//! [`SessionAnalytics`] implementation to observe what happens to sessions.
//! Without one, only the crate's own `tracing` diagnostics are emitted.
//!
//! ## Available Backends
//!
//! - [`LoggerAnalytics`]: log events using `tracing`
//! - [`CompositeAnalytics`]: fan events out to several backends
//!
//! Identifiers in events are shortened to an 8-character prefix so that
//! event sinks never hold a usable session token.
//!
//! ## Example
//!
//! ```rust
//! use sqlsession_core::analytics::{CompositeAnalytics, LoggerAnalytics};
//! use sqlsession_core::config::SessionSettings;
//! use sqlsession_core::manager::SessionManager;
//! use sqlsession_core::store::InMemorySessionStore;
//!
//! let config = SessionSettings::new("s3cr3t").build().unwrap();
//! let mut analytics = CompositeAnalytics::new();
//! analytics.add(LoggerAnalytics::new());
//!
//! let manager = SessionManager::new(config, InMemorySessionStore::new())
//!     .unwrap()
//!     .with_analytics(analytics);
//! ```

use crate::lifecycle::{CreateReason, Rejection};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

mod logger;
pub use logger::LoggerAnalytics;

/// Something that happened to a session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
	/// A new session row was inserted
	Created {
		session_key: String,
		reason: CreateReason,
		timestamp: DateTime<Utc>,
	},
	/// A stored session was accepted unchanged
	Resumed {
		session_key: String,
		timestamp: DateTime<Utc>,
	},
	/// A session moved to a new identifier
	Renewed {
		session_key: String,
		previous: String,
		timestamp: DateTime<Utc>,
	},
	/// A stored session failed validation and will be destroyed
	Rejected {
		session_key: String,
		rejection: Rejection,
		timestamp: DateTime<Utc>,
	},
	Destroyed {
		session_key: String,
		timestamp: DateTime<Utc>,
	},
	/// The payload was written back at the end of a request
	Written {
		session_key: String,
		size_bytes: usize,
		timestamp: DateTime<Utc>,
	},
	/// Expired rows were swept
	Swept {
		deleted: u64,
		timestamp: DateTime<Utc>,
	},
	/// A sweep failed; the request carried on
	SweepFailed {
		error: String,
		timestamp: DateTime<Utc>,
	},
}

impl SessionEvent {
	pub fn timestamp(&self) -> DateTime<Utc> {
		match self {
			Self::Created { timestamp, .. }
			| Self::Resumed { timestamp, .. }
			| Self::Renewed { timestamp, .. }
			| Self::Rejected { timestamp, .. }
			| Self::Destroyed { timestamp, .. }
			| Self::Written { timestamp, .. }
			| Self::Swept { timestamp, .. }
			| Self::SweepFailed { timestamp, .. } => *timestamp,
		}
	}
}

/// Session analytics capability
///
/// Implement this trait to route session events to your own sink.
///
/// # Example
///
/// ```rust
/// use sqlsession_core::analytics::{SessionAnalytics, SessionEvent};
/// use async_trait::async_trait;
///
/// struct AuditLog;
///
/// #[async_trait]
/// impl SessionAnalytics for AuditLog {
///     async fn record_event(&self, event: SessionEvent) {
///         if let SessionEvent::Rejected { rejection, .. } = event {
///             eprintln!("session rejected: {}", rejection);
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait SessionAnalytics: Send + Sync {
	async fn record_event(&self, event: SessionEvent);
}

/// Composite analytics backend
///
/// Records every event to each added backend, in insertion order.
#[derive(Clone, Default)]
pub struct CompositeAnalytics {
	backends: Vec<Arc<dyn SessionAnalytics>>,
}

impl CompositeAnalytics {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add<A: SessionAnalytics + 'static>(&mut self, analytics: A) {
		self.backends.push(Arc::new(analytics));
	}

	pub fn len(&self) -> usize {
		self.backends.len()
	}

	pub fn is_empty(&self) -> bool {
		self.backends.is_empty()
	}
}

impl std::fmt::Debug for CompositeAnalytics {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CompositeAnalytics")
			.field("backends", &self.backends.len())
			.finish()
	}
}

#[async_trait]
impl SessionAnalytics for CompositeAnalytics {
	async fn record_event(&self, event: SessionEvent) {
		for backend in &self.backends {
			backend.record_event(event.clone()).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use tokio::sync::Mutex;

	#[derive(Default)]
	struct Recorder {
		events: Mutex<Vec<SessionEvent>>,
	}

	#[async_trait]
	impl SessionAnalytics for Arc<Recorder> {
		async fn record_event(&self, event: SessionEvent) {
			self.events.lock().await.push(event);
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_composite_fans_out_to_every_backend() {
		// Arrange
		let first = Arc::new(Recorder::default());
		let second = Arc::new(Recorder::default());
		let mut composite = CompositeAnalytics::new();
		composite.add(Arc::clone(&first));
		composite.add(Arc::clone(&second));
		let event = SessionEvent::Swept {
			deleted: 3,
			timestamp: Utc::now(),
		};

		// Act
		composite.record_event(event.clone()).await;

		// Assert
		assert_eq!(composite.len(), 2);
		assert_eq!(*first.events.lock().await, vec![event.clone()]);
		assert_eq!(*second.events.lock().await, vec![event]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_empty_composite_is_a_no_op() {
		let composite = CompositeAnalytics::new();

		composite
			.record_event(SessionEvent::Destroyed {
				session_key: "abcdef01".to_string(),
				timestamp: Utc::now(),
			})
			.await;

		assert!(composite.is_empty());
	}

	#[rstest]
	fn test_event_timestamp() {
		let timestamp = Utc::now();
		let event = SessionEvent::Written {
			session_key: "abcdef01".to_string(),
			size_bytes: 12,
			timestamp,
		};

		assert_eq!(event.timestamp(), timestamp);
	}
}
