//! # SQLSession Core
//!
//! Server-side HTTP sessions backed by a relational table.
//!
//! The client only ever holds an opaque, unguessable identifier in a cookie.
//! Everything else lives in the store, keyed by that identifier, and is
//! loaded, validated and written back once per request.
//!
//! ## Features
//!
//! - **Signed Identifiers**: HMAC-SHA256 over OS randomness, keyed with a secret salt
//! - **Lifecycle Rules**: expiry, renewal, optional IP address and user agent binding
//! - **Flash Data**: values that survive exactly one following request
//! - **In-Memory Store** (always available): for development and tests
//! - **Database Store** (feature: `database`): PostgreSQL, MySQL or SQLite through sqlx
//! - **Janitor**: probabilistic cleanup of expired rows
//! - **Session Analytics**: observe lifecycle events, log them with `tracing`
//!
//! ## Quick Start
//!
//! ```rust
//! use sqlsession_core::config::SessionSettings;
//! use sqlsession_core::manager::SessionManager;
//! use sqlsession_core::request::RequestContext;
//! use sqlsession_core::store::InMemorySessionStore;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionSettings::new("s3cr3t").with_secure_cookie(false).build()?;
//! let manager = SessionManager::new(config, InMemorySessionStore::new())?;
//!
//! // First request: no cookie, a session is created
//! let mut session = manager.start(&RequestContext::new()).await?;
//! session.set_one("user_id", 42)?;
//! let response = session.close().await?;
//! let cookie = response.session_cookie().unwrap();
//!
//! // Second request presents the cookie and sees the data
//! let request = RequestContext::new().with_cookie(cookie.name.clone(), cookie.value.clone());
//! let session = manager.start(&request).await?;
//! assert_eq!(session.get_one::<u64>("user_id")?, Some(42));
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

pub mod analytics;
pub mod config;
pub mod cookie;
pub mod error;
pub mod identifier;
pub mod janitor;
pub mod lifecycle;
pub mod manager;
pub mod record;
pub mod request;
pub mod session;
pub mod store;

// Re-export common types
pub use analytics::{CompositeAnalytics, LoggerAnalytics, SessionAnalytics, SessionEvent};
pub use config::{SessionConfig, SessionSettings};
pub use cookie::{CookieBinder, CookieExpiry, SetCookie};
pub use error::{ConfigError, SessionError, StoreError};
pub use identifier::IdentifierGenerator;
pub use janitor::{Janitor, SweepOutcome};
pub use lifecycle::{CreateReason, Outcome, Rejection, SessionState};
pub use manager::SessionManager;
pub use record::{DataMap, SessionPayload, SessionRecord};
pub use request::{RequestContext, ResponseContext};
pub use session::Session;
pub use store::{InMemorySessionStore, SessionStore, StoredSession};

#[cfg(feature = "database")]
pub use store::{DatabaseSessionStore, SqlDialect};
