//! # SQLSession
//!
//! Server-side HTTP session management for Rust.
//!
//! A signed, opaque session identifier travels in a cookie; all session state
//! lives in a relational table keyed by that identifier. Each request loads
//! its session once, validates it against the expiry, renewal and binding
//! rules, lets the application read and change it, and writes it back once.
//!
//! ## Feature Flags
//!
//! - `database` (default) - sqlx-backed store for PostgreSQL, MySQL and SQLite
//!
//! Without `database`, only the in-memory store is available.
//!
//! ## Quick Start
//!
//! ```rust
//! use sqlsession::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionSettings::new("s3cr3t")
//!     .with_seconds_until_expiration(7200)
//!     .with_renewal_time(300)
//!     .build()?;
//! let manager = SessionManager::new(config, InMemorySessionStore::new())?;
//!
//! let request = RequestContext::new().with_user_agent("Mozilla/5.0");
//! let (greeting, response) = manager
//!     .with_session(&request, async |session| {
//!         session.set_flash_one("notice", "Welcome back").unwrap();
//!         "hello"
//!     })
//!     .await?;
//!
//! let mut headers = http::HeaderMap::new();
//! response.apply_to(&mut headers);
//! assert_eq!(greeting, "hello");
//! assert!(headers.contains_key("set-cookie"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Database Store
//!
//! ```rust,no_run
//! # #[cfg(feature = "database")]
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! use sqlsession::prelude::*;
//!
//! let config = SessionSettings::from_toml_str(r#"salt = "s3cr3t""#)?.build()?;
//! let store = DatabaseSessionStore::connect("postgres://localhost/app", config.table_name()).await?;
//! store.create_table().await?;
//!
//! let manager = SessionManager::new(config, store)?;
//! # let _ = manager;
//! # Ok(())
//! # }
//! ```

pub use sqlsession_core::{
	analytics, config, cookie, error, identifier, janitor, lifecycle, manager, record, request,
	session, store,
};

pub use sqlsession_core::{
	CompositeAnalytics, ConfigError, CookieBinder, CookieExpiry, CreateReason, DataMap,
	IdentifierGenerator, InMemorySessionStore, Janitor, LoggerAnalytics, Outcome, Rejection,
	RequestContext, ResponseContext, Session, SessionAnalytics, SessionConfig,
	SessionError, SessionEvent, SessionManager, SessionPayload, SessionRecord, SessionSettings,
	SessionState, SessionStore, SetCookie, StoreError, StoredSession, SweepOutcome,
};

#[cfg(feature = "database")]
pub use sqlsession_core::{DatabaseSessionStore, SqlDialect};

/// Convenience re-exports for application code
pub mod prelude {
	pub use crate::{
		ConfigError, DataMap, InMemorySessionStore, Outcome, RequestContext, ResponseContext,
		Session, SessionError, SessionManager, SessionSettings, SessionState, SessionStore,
		StoreError,
	};

	#[cfg(feature = "database")]
	pub use crate::DatabaseSessionStore;
}
