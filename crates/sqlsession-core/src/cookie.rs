//! Session cookie directives
//!
//! [`CookieBinder`] turns lifecycle decisions into [`SetCookie`] directives.
//! Every directive is `HttpOnly`, `Path=/` and `SameSite=Lax`; only `Secure`
//! and the expiry follow the configuration.
//!
//! ## Example
//!
//! ```rust
//! use sqlsession_core::config::SessionSettings;
//! use sqlsession_core::cookie::{CookieBinder, CookieExpiry};
//! use chrono::{Duration, Utc};
//!
//! let config = SessionSettings::new("s3cr3t").build().unwrap();
//! let binder = CookieBinder::new(&config);
//! let now = Utc::now();
//!
//! let cookie = binder.bind(&"a".repeat(64), now);
//! assert_eq!(cookie.expiry, CookieExpiry::At(now + Duration::seconds(7200)));
//!
//! let cleared = binder.clear();
//! assert!(cleared.value.is_empty());
//! assert!(cleared.is_removal());
//! ```

use crate::config::SessionConfig;
use chrono::{DateTime, Duration, Utc};
use std::time::SystemTime;

/// When the client should drop the cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieExpiry {
	/// Dropped when the browser closes
	Session,
	At(DateTime<Utc>),
}

/// One `Set-Cookie` directive for the session cookie
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
	pub name: String,
	/// Session identifier, empty when the cookie is being removed
	pub value: String,
	pub expiry: CookieExpiry,
	pub secure: bool,
	pub path: String,
}

impl SetCookie {
	/// Session cookies cannot be read from scripts
	pub fn http_only(&self) -> bool {
		true
	}

	/// `SameSite` attribute, fixed for session cookies
	pub fn same_site(&self) -> &'static str {
		"Lax"
	}

	/// Whether this directive tells the client to delete the cookie
	pub fn is_removal(&self) -> bool {
		matches!(self.expiry, CookieExpiry::At(at) if at <= DateTime::<Utc>::UNIX_EPOCH)
	}

	/// Render the `Set-Cookie` header value
	///
	/// # Examples
	///
	/// ```rust
	/// use sqlsession_core::cookie::{CookieExpiry, SetCookie};
	/// use chrono::{DateTime, Utc};
	///
	/// let cookie = SetCookie {
	///     name: "session".to_string(),
	///     value: String::new(),
	///     expiry: CookieExpiry::At(DateTime::<Utc>::UNIX_EPOCH),
	///     secure: true,
	///     path: "/".to_string(),
	/// };
	///
	/// assert_eq!(
	///     cookie.to_header_value(),
	///     "session=; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; SameSite=Lax; Secure"
	/// );
	/// ```
	pub fn to_header_value(&self) -> String {
		let mut parts = vec![format!("{}={}", self.name, self.value)];

		parts.push(format!("Path={}", self.path));

		if let CookieExpiry::At(at) = self.expiry {
			parts.push(format!(
				"Expires={}",
				httpdate::fmt_http_date(SystemTime::from(at))
			));
		}

		if self.http_only() {
			parts.push("HttpOnly".to_string());
		}

		parts.push(format!("SameSite={}", self.same_site()));

		if self.secure {
			parts.push("Secure".to_string());
		}

		parts.join("; ")
	}
}

/// Builds session cookie directives from the configuration
#[derive(Debug, Clone)]
pub struct CookieBinder {
	cookie_name: String,
	secure: bool,
	expire_on_close: bool,
	expiration: Duration,
}

impl CookieBinder {
	pub fn new(config: &SessionConfig) -> Self {
		Self {
			cookie_name: config.cookie_name().to_string(),
			secure: config.secure_cookie(),
			expire_on_close: config.expire_on_close(),
			expiration: config.expiration(),
		}
	}

	pub fn cookie_name(&self) -> &str {
		&self.cookie_name
	}

	/// Directive pointing the client at `session_id`
	///
	/// Expires `expiration` seconds after `now`, or with the browser session
	/// when `expire_on_close` is set.
	pub fn bind(&self, session_id: &str, now: DateTime<Utc>) -> SetCookie {
		let expiry = if self.expire_on_close {
			CookieExpiry::Session
		} else {
			CookieExpiry::At(now + self.expiration)
		};
		self.directive(session_id.to_string(), expiry)
	}

	/// Directive that removes the cookie from the client
	pub fn clear(&self) -> SetCookie {
		self.directive(String::new(), CookieExpiry::At(DateTime::<Utc>::UNIX_EPOCH))
	}

	fn directive(&self, value: String, expiry: CookieExpiry) -> SetCookie {
		SetCookie {
			name: self.cookie_name.clone(),
			value,
			expiry,
			secure: self.secure,
			path: "/".to_string(),
		}
	}
}
