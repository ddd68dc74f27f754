//! Tracing-based logger analytics

use super::{SessionAnalytics, SessionEvent};
use async_trait::async_trait;

/// Logs session events with `tracing`
///
/// Routine events go to `debug`, lifecycle changes to `info` and failed
/// sweeps to `warn`.
#[derive(Debug, Clone, Default)]
pub struct LoggerAnalytics;

impl LoggerAnalytics {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl SessionAnalytics for LoggerAnalytics {
	async fn record_event(&self, event: SessionEvent) {
		match event {
			SessionEvent::Created {
				session_key,
				reason,
				timestamp,
			} => {
				tracing::info!(
					session_key = %session_key,
					reason = ?reason,
					timestamp = %timestamp,
					"Session created"
				);
			}
			SessionEvent::Resumed {
				session_key,
				timestamp,
			} => {
				tracing::debug!(
					session_key = %session_key,
					timestamp = %timestamp,
					"Session resumed"
				);
			}
			SessionEvent::Renewed {
				session_key,
				previous,
				timestamp,
			} => {
				tracing::info!(
					session_key = %session_key,
					previous = %previous,
					timestamp = %timestamp,
					"Session renewed"
				);
			}
			SessionEvent::Rejected {
				session_key,
				rejection,
				timestamp,
			} => {
				tracing::info!(
					session_key = %session_key,
					rejection = %rejection,
					timestamp = %timestamp,
					"Session rejected"
				);
			}
			SessionEvent::Destroyed {
				session_key,
				timestamp,
			} => {
				tracing::info!(
					session_key = %session_key,
					timestamp = %timestamp,
					"Session destroyed"
				);
			}
			SessionEvent::Written {
				session_key,
				size_bytes,
				timestamp,
			} => {
				tracing::debug!(
					session_key = %session_key,
					size_bytes = size_bytes,
					timestamp = %timestamp,
					"Session written"
				);
			}
			SessionEvent::Swept { deleted, timestamp } => {
				tracing::debug!(
					deleted = deleted,
					timestamp = %timestamp,
					"Expired sessions swept"
				);
			}
			SessionEvent::SweepFailed { error, timestamp } => {
				tracing::warn!(
					error = %error,
					timestamp = %timestamp,
					"Expired session sweep failed"
				);
			}
		}
	}
}
