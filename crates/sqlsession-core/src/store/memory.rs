//! In-memory session store
//!
//! Rows live in a process-local map and are lost on restart. Useful for
//! development and for exercising the lifecycle without a database.
//!
//! ## Example
//!
//! ```rust
//! use sqlsession_core::store::{InMemorySessionStore, SessionStore, StoredSession};
//! use chrono::Utc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = InMemorySessionStore::new();
//! let id = "a".repeat(64);
//!
//! store
//!     .insert(&StoredSession {
//!         session_id: id.clone(),
//!         payload: None,
//!         user_agent: None,
//!         ip_address: None,
//!         updated_at: Some(Utc::now()),
//!     })
//!     .await
//!     .unwrap();
//!
//! assert!(store.find_by_id(&id).await.unwrap().is_some());
//! # }
//! ```

use super::{SessionStore, StoredSession};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Process-local session store
///
/// Clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
	sessions: Arc<Mutex<HashMap<String, StoredSession>>>,
}

impl InMemorySessionStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of stored rows
	pub async fn len(&self) -> usize {
		self.sessions.lock().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.sessions.lock().await.is_empty()
	}
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
	async fn find_by_id(&self, session_id: &str) -> Result<Option<StoredSession>, StoreError> {
		let sessions = self.sessions.lock().await;
		Ok(sessions.get(session_id).cloned())
	}

	async fn insert(&self, session: &StoredSession) -> Result<(), StoreError> {
		let mut sessions = self.sessions.lock().await;
		match sessions.entry(session.session_id.clone()) {
			Entry::Occupied(_) => Err(StoreError::Conflict(session.session_id.clone())),
			Entry::Vacant(slot) => {
				slot.insert(session.clone());
				Ok(())
			}
		}
	}

	async fn update_payload(&self, session_id: &str, payload: &str) -> Result<(), StoreError> {
		let mut sessions = self.sessions.lock().await;
		if let Some(session) = sessions.get_mut(session_id) {
			session.payload = Some(payload.to_string());
		}
		Ok(())
	}

	async fn renew(
		&self,
		old_id: &str,
		new_id: &str,
		now: DateTime<Utc>,
	) -> Result<(), StoreError> {
		let mut sessions = self.sessions.lock().await;
		if sessions.contains_key(new_id) {
			return Err(StoreError::Conflict(new_id.to_string()));
		}
		let mut session = sessions
			.remove(old_id)
			.ok_or_else(|| StoreError::NotFound(old_id.to_string()))?;
		session.session_id = new_id.to_string();
		session.updated_at = Some(now);
		sessions.insert(new_id.to_string(), session);
		Ok(())
	}

	async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
		let mut sessions = self.sessions.lock().await;
		sessions.remove(session_id);
		Ok(())
	}

	async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
		let mut sessions = self.sessions.lock().await;
		let before = sessions.len();
		sessions.retain(|_, session| session.updated_at.is_none_or(|updated| updated >= cutoff));
		Ok((before - sessions.len()) as u64)
	}
}
