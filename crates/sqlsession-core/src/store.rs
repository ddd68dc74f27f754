//! Session persistence
//!
//! A [`SessionStore`] owns one logical table of session rows keyed by
//! identifier. The payload column is opaque to the store: encoding and
//! decoding happen in [`record`](crate::record).
//!
//! ## Available Stores
//!
//! - [`InMemorySessionStore`]: process-local map, for development and tests
//! - [`DatabaseSessionStore`]: relational table through sqlx (feature: `database`)

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;
pub use memory::InMemorySessionStore;

#[cfg(feature = "database")]
pub mod database;
#[cfg(feature = "database")]
pub use database::{DatabaseSessionStore, SqlDialect};

/// One persisted session row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
	pub session_id: String,
	/// Encoded [`SessionPayload`](crate::record::SessionPayload)
	pub payload: Option<String>,
	/// User agent fingerprint
	pub user_agent: Option<String>,
	pub ip_address: Option<String>,
	/// Last creation or renewal
	pub updated_at: Option<DateTime<Utc>>,
}

/// Persistence boundary for session rows
///
/// Every backend failure other than a duplicate key or a missing row must be
/// reported as [`StoreError::Storage`].
#[async_trait]
pub trait SessionStore: Send + Sync {
	/// Point lookup by identifier
	async fn find_by_id(&self, session_id: &str) -> Result<Option<StoredSession>, StoreError>;

	/// Create a new row
	///
	/// Fails with [`StoreError::Conflict`] when the identifier is taken. An
	/// existing row is never overwritten.
	async fn insert(&self, session: &StoredSession) -> Result<(), StoreError>;

	/// Replace the payload column, leaving `updated_at` untouched
	async fn update_payload(&self, session_id: &str, payload: &str) -> Result<(), StoreError>;

	/// Move a row from `old_id` to `new_id` and set its `updated_at` to `now`
	///
	/// Must be atomic. Fails with [`StoreError::NotFound`] when `old_id` no
	/// longer exists.
	async fn renew(&self, old_id: &str, new_id: &str, now: DateTime<Utc>)
	-> Result<(), StoreError>;

	/// Delete a row. Deleting a missing row succeeds.
	async fn delete(&self, session_id: &str) -> Result<(), StoreError>;

	/// Delete every row last updated before `cutoff`, returning how many went
	async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}
