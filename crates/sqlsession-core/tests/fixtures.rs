//! Shared test fixtures for sqlsession-core integration tests
//!
//! Fixtures are rstest-compatible. Every fixture builds its own store, so
//! tests never share session rows.

// Not every helper is used by every test file.
#![allow(dead_code)]
#![allow(unreachable_pub)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rstest::fixture;
use sqlsession_core::analytics::{SessionAnalytics, SessionEvent};
use sqlsession_core::config::SessionSettings;
use sqlsession_core::cookie::SetCookie;
use sqlsession_core::error::StoreError;
use sqlsession_core::lifecycle::{CreateReason, Outcome};
use sqlsession_core::manager::SessionManager;
use sqlsession_core::request::{RequestContext, ResponseContext};
use sqlsession_core::store::{InMemorySessionStore, SessionStore, StoredSession};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

pub const SALT: &str = "s3cr3t";
pub const CLIENT_IP: &str = "203.0.113.7";
pub const CLIENT_UA: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

// ============================================================================
// Settings and managers
// ============================================================================

/// Settings used by most scenarios: 7200 s lifetime, 300 s renewal, no sweeping
#[fixture]
pub fn settings() -> SessionSettings {
	SessionSettings::new(SALT)
		.with_seconds_until_expiration(7200)
		.with_renewal_time(300)
		.with_secure_cookie(false)
		.with_sweep_divisor(0)
}

#[fixture]
pub fn memory_manager(settings: SessionSettings) -> SessionManager<InMemorySessionStore> {
	manager_with(settings, InMemorySessionStore::new())
}

pub fn manager_with<S: SessionStore>(settings: SessionSettings, store: S) -> SessionManager<S> {
	SessionManager::new(settings.build().unwrap(), store).unwrap()
}

/// Fixed reference time so that scenarios are reproducible
pub fn t0() -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

pub fn at(seconds: i64) -> DateTime<Utc> {
	t0() + Duration::seconds(seconds)
}

// ============================================================================
// Request helpers
// ============================================================================

/// Request from the standard test client, without a cookie
pub fn client_request() -> RequestContext {
	RequestContext::new()
		.with_remote_addr(CLIENT_IP.parse().unwrap())
		.with_user_agent(CLIENT_UA)
}

/// Request from the standard test client presenting `cookie`
pub fn request_with(cookie: &SetCookie) -> RequestContext {
	client_request().with_cookie(cookie.name.clone(), cookie.value.clone())
}

pub fn request_with_id(session_id: &str) -> RequestContext {
	client_request().with_cookie("session", session_id)
}

pub fn cookie_of(response: &ResponseContext) -> SetCookie {
	response
		.session_cookie()
		.cloned()
		.expect("response should carry a session cookie")
}

pub fn assert_created(outcome: Outcome) {
	assert!(
		matches!(outcome, Outcome::Created(_)),
		"expected a new session, got {:?}",
		outcome
	);
}

pub fn assert_created_because(outcome: Outcome, reason: CreateReason) {
	assert_eq!(outcome, Outcome::Created(reason));
}

/// A stored row for the standard test client
pub fn stored_row(session_id: &str, updated_at: DateTime<Utc>, payload: &str) -> StoredSession {
	StoredSession {
		session_id: session_id.to_string(),
		payload: Some(payload.to_string()),
		user_agent: Some(sqlsession_core::identifier::fingerprint_user_agent(CLIENT_UA)),
		ip_address: Some(CLIENT_IP.to_string()),
		updated_at: Some(updated_at),
	}
}

// ============================================================================
// Analytics
// ============================================================================

/// Collects every event it receives
#[derive(Debug, Clone, Default)]
pub struct RecordingAnalytics {
	events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl RecordingAnalytics {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn events(&self) -> Vec<SessionEvent> {
		self.events.lock().await.clone()
	}

	/// Variant names of the recorded events, in order
	pub async fn kinds(&self) -> Vec<&'static str> {
		self.events
			.lock()
			.await
			.iter()
			.map(|event| match event {
				SessionEvent::Created { .. } => "created",
				SessionEvent::Resumed { .. } => "resumed",
				SessionEvent::Renewed { .. } => "renewed",
				SessionEvent::Rejected { .. } => "rejected",
				SessionEvent::Destroyed { .. } => "destroyed",
				SessionEvent::Written { .. } => "written",
				SessionEvent::Swept { .. } => "swept",
				SessionEvent::SweepFailed { .. } => "sweep_failed",
			})
			.collect()
	}
}

#[async_trait]
impl SessionAnalytics for RecordingAnalytics {
	async fn record_event(&self, event: SessionEvent) {
		self.events.lock().await.push(event);
	}
}

// ============================================================================
// Faulty stores
// ============================================================================

/// Which store operation a [`FaultyStore`] should break
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
	/// `insert` reports a duplicate key
	InsertConflict,
	/// `renew` reports that the old row is gone, as after a concurrent destroy
	RenewNotFound,
	/// `update_payload` fails with a storage error
	WriteFailure,
	/// `delete_expired` fails with a storage error
	SweepFailure,
}

/// In-memory store that fails one operation on demand
#[derive(Debug, Clone)]
pub struct FaultyStore {
	pub inner: InMemorySessionStore,
	fault: Fault,
	armed: Arc<AtomicBool>,
}

impl FaultyStore {
	pub fn new(fault: Fault) -> Self {
		Self {
			inner: InMemorySessionStore::new(),
			fault,
			armed: Arc::new(AtomicBool::new(true)),
		}
	}

	pub fn disarm(&self) {
		self.armed.store(false, Ordering::SeqCst);
	}

	fn fails(&self, fault: Fault) -> bool {
		self.fault == fault && self.armed.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl SessionStore for FaultyStore {
	async fn find_by_id(&self, session_id: &str) -> Result<Option<StoredSession>, StoreError> {
		self.inner.find_by_id(session_id).await
	}

	async fn insert(&self, session: &StoredSession) -> Result<(), StoreError> {
		if self.fails(Fault::InsertConflict) {
			return Err(StoreError::Conflict(session.session_id.clone()));
		}
		self.inner.insert(session).await
	}

	async fn update_payload(&self, session_id: &str, payload: &str) -> Result<(), StoreError> {
		if self.fails(Fault::WriteFailure) {
			return Err(StoreError::Storage("connection lost".to_string()));
		}
		self.inner.update_payload(session_id, payload).await
	}

	async fn renew(
		&self,
		old_id: &str,
		new_id: &str,
		now: DateTime<Utc>,
	) -> Result<(), StoreError> {
		if self.fails(Fault::RenewNotFound) {
			self.inner.delete(old_id).await?;
		}
		self.inner.renew(old_id, new_id, now).await
	}

	async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
		self.inner.delete(session_id).await
	}

	async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
		if self.fails(Fault::SweepFailure) {
			return Err(StoreError::Storage("lock timeout".to_string()));
		}
		self.inner.delete_expired(cutoff).await
	}
}

// ============================================================================
// Database
// ============================================================================

/// Fresh SQLite in-memory store with the session table created
///
/// A single pooled connection, since every SQLite in-memory connection is a
/// separate database.
#[cfg(feature = "database")]
pub async fn sqlite_store() -> sqlsession_core::store::DatabaseSessionStore {
	use sqlsession_core::store::{DatabaseSessionStore, SqlDialect};
	use sqlx::any::AnyPoolOptions;

	sqlx::any::install_default_drivers();
	let pool = AnyPoolOptions::new()
		.max_connections(1)
		.connect("sqlite::memory:")
		.await
		.unwrap();
	let store = DatabaseSessionStore::from_pool(pool, SqlDialect::Sqlite, "session");
	store.create_table().await.unwrap();
	store
}
