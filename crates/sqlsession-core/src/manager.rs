//! Session manager
//!
//! [`SessionManager`] is built once at startup and shared by every request.
//! It owns the validated configuration, the store, the identifier generator,
//! the cookie binder and the janitor, and hands out one [`Session`] per
//! request.
//!
//! ## Example
//!
//! ```rust
//! use sqlsession_core::config::SessionSettings;
//! use sqlsession_core::manager::SessionManager;
//! use sqlsession_core::request::RequestContext;
//! use sqlsession_core::store::InMemorySessionStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), sqlsession_core::error::SessionError> {
//! let config = SessionSettings::new("s3cr3t").with_secure_cookie(false).build()?;
//! let manager = SessionManager::new(config, InMemorySessionStore::new())?;
//!
//! let request = RequestContext::new().with_remote_addr("203.0.113.7".parse().unwrap());
//! let ((), response) = manager
//!     .with_session(&request, async |session| {
//!         session.set_one("user_id", 42).unwrap();
//!     })
//!     .await?;
//!
//! assert!(response.session_cookie().is_some());
//! # Ok(())
//! # }
//! ```

use crate::analytics::{SessionAnalytics, SessionEvent};
use crate::config::SessionConfig;
use crate::cookie::CookieBinder;
use crate::error::{ConfigError, SessionError};
use crate::identifier::IdentifierGenerator;
use crate::janitor::Janitor;
use crate::request::{RequestContext, ResponseContext};
use crate::session::Session;
use crate::store::SessionStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Shared entry point for request-scoped sessions
pub struct SessionManager<S: SessionStore> {
	config: SessionConfig,
	store: S,
	generator: IdentifierGenerator,
	binder: CookieBinder,
	janitor: Janitor,
	analytics: Option<Arc<dyn SessionAnalytics>>,
}

impl<S: SessionStore> SessionManager<S> {
	/// Create a manager over `store`
	///
	/// The store is used as given; connection setup stays with the caller.
	pub fn new(config: SessionConfig, store: S) -> Result<Self, ConfigError> {
		let generator = IdentifierGenerator::new(config.salt())?;
		let binder = CookieBinder::new(&config);
		let janitor = Janitor::from_config(&config);
		Ok(Self {
			config,
			store,
			generator,
			binder,
			janitor,
			analytics: None,
		})
	}

	/// Report session events to `analytics`
	pub fn with_analytics<A: SessionAnalytics + 'static>(mut self, analytics: A) -> Self {
		self.analytics = Some(Arc::new(analytics));
		self
	}

	pub fn config(&self) -> &SessionConfig {
		&self.config
	}

	pub fn store(&self) -> &S {
		&self.store
	}

	pub fn janitor(&self) -> &Janitor {
		&self.janitor
	}

	pub(crate) fn generator(&self) -> &IdentifierGenerator {
		&self.generator
	}

	pub(crate) fn binder(&self) -> &CookieBinder {
		&self.binder
	}

	pub(crate) async fn emit(&self, event: SessionEvent) {
		if let Some(analytics) = &self.analytics {
			analytics.record_event(event).await;
		}
	}

	/// A session handle that has not run yet
	///
	/// Call [`Session::run`] before touching its data.
	pub fn session(&self, request: &RequestContext) -> Session<'_, S> {
		self.session_at(request, Utc::now())
	}

	/// Like [`session`](Self::session), with an explicit request time
	pub fn session_at(&self, request: &RequestContext, now: DateTime<Utc>) -> Session<'_, S> {
		Session::new(self, request, now)
	}

	/// Start a session for `request`
	///
	/// Runs the lifecycle immediately when `auto_run_session` is enabled;
	/// otherwise the handle is returned un-run.
	pub async fn start(&self, request: &RequestContext) -> Result<Session<'_, S>, SessionError> {
		self.start_at(request, Utc::now()).await
	}

	/// Like [`start`](Self::start), with an explicit request time
	///
	/// `now` is used for every expiry and renewal decision of the request.
	pub async fn start_at(
		&self,
		request: &RequestContext,
		now: DateTime<Utc>,
	) -> Result<Session<'_, S>, SessionError> {
		let mut session = self.session_at(request, now);
		if self.config.auto_run_session() {
			session.run().await?;
		}
		Ok(session)
	}

	/// Run `f` inside a session and always write the session back afterwards
	///
	/// The session is started as by [`start`](Self::start) and closed once
	/// `f` returns, whatever `f` returns. The returned [`ResponseContext`]
	/// carries the cookie to send.
	pub async fn with_session<'m, F, T>(
		&'m self,
		request: &RequestContext,
		f: F,
	) -> Result<(T, ResponseContext), SessionError>
	where
		F: AsyncFnOnce(&mut Session<'m, S>) -> T,
	{
		let mut session = self.start(request).await?;
		let value = f(&mut session).await;
		let response = session.close().await?;
		Ok((value, response))
	}
}

impl<S: SessionStore + std::fmt::Debug> std::fmt::Debug for SessionManager<S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionManager")
			.field("config", &self.config)
			.field("store", &self.store)
			.field("janitor", &self.janitor)
			.field("analytics", &self.analytics.is_some())
			.finish()
	}
}
