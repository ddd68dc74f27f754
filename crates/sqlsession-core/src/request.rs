//! Inbound and outbound request context
//!
//! The session never reads process-wide state. Everything it needs from the
//! request is passed in as a [`RequestContext`], and the cookie it wants sent
//! back is handed out as a [`ResponseContext`].

use crate::cookie::SetCookie;
use http::header::{COOKIE, HeaderMap, HeaderValue, SET_COOKIE, USER_AGENT};
use std::collections::HashMap;
use std::net::IpAddr;

/// What the session needs to know about the inbound request
///
/// # Examples
///
/// ```rust
/// use sqlsession_core::request::RequestContext;
/// use http::HeaderMap;
/// use std::net::IpAddr;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("cookie", "theme=dark; session=abc123".parse().unwrap());
/// headers.insert("user-agent", "curl/8.5.0".parse().unwrap());
/// let addr: IpAddr = "203.0.113.7".parse().unwrap();
///
/// let request = RequestContext::from_headers(&headers, Some(addr));
/// assert_eq!(request.cookie("session"), Some("abc123"));
/// assert_eq!(request.user_agent(), Some("curl/8.5.0"));
/// assert_eq!(request.ip_address().as_deref(), Some("203.0.113.7"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
	cookies: HashMap<String, String>,
	remote_addr: Option<IpAddr>,
	user_agent: Option<String>,
}

impl RequestContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a context from HTTP request headers and the peer address
	///
	/// Every `Cookie` header is parsed. When a name appears more than once the
	/// first value wins. Headers that are not valid visible ASCII are ignored.
	pub fn from_headers(headers: &HeaderMap, remote_addr: Option<IpAddr>) -> Self {
		let mut cookies = HashMap::new();
		for header in headers.get_all(COOKIE) {
			let Ok(header) = header.to_str() else {
				continue;
			};
			for cookie in header.split(';') {
				let parts: Vec<&str> = cookie.trim().splitn(2, '=').collect();
				if parts.len() == 2 && !parts[0].is_empty() {
					cookies
						.entry(parts[0].to_string())
						.or_insert_with(|| parts[1].to_string());
				}
			}
		}

		let user_agent = headers
			.get(USER_AGENT)
			.and_then(|value| value.to_str().ok())
			.map(str::to_string);

		Self {
			cookies,
			remote_addr,
			user_agent,
		}
	}

	pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.cookies.insert(name.into(), value.into());
		self
	}

	pub fn with_remote_addr(mut self, remote_addr: IpAddr) -> Self {
		self.remote_addr = Some(remote_addr);
		self
	}

	pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());
		self
	}

	pub fn cookie(&self, name: &str) -> Option<&str> {
		self.cookies.get(name).map(String::as_str)
	}

	pub fn remote_addr(&self) -> Option<IpAddr> {
		self.remote_addr
	}

	/// Peer address in the textual form stored with the session
	pub fn ip_address(&self) -> Option<String> {
		self.remote_addr.map(|addr| addr.to_string())
	}

	pub fn user_agent(&self) -> Option<&str> {
		self.user_agent.as_deref()
	}
}

/// What the session wants sent back to the client
///
/// Holds at most one session cookie. Binding again replaces the earlier
/// directive, so a renewal supersedes the cookie set on creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseContext {
	session_cookie: Option<SetCookie>,
}

impl ResponseContext {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn bind(&mut self, cookie: SetCookie) {
		self.session_cookie = Some(cookie);
	}

	pub fn session_cookie(&self) -> Option<&SetCookie> {
		self.session_cookie.as_ref()
	}

	pub fn into_session_cookie(self) -> Option<SetCookie> {
		self.session_cookie
	}

	/// Append the `Set-Cookie` header to `headers`
	///
	/// A cookie that cannot be encoded as a header value is logged and
	/// skipped; the session itself is already persisted.
	///
	/// # Examples
	///
	/// ```rust
	/// use sqlsession_core::config::SessionSettings;
	/// use sqlsession_core::cookie::CookieBinder;
	/// use sqlsession_core::request::ResponseContext;
	/// use http::HeaderMap;
	///
	/// let config = SessionSettings::new("s3cr3t").build().unwrap();
	/// let mut response = ResponseContext::new();
	/// response.bind(CookieBinder::new(&config).clear());
	///
	/// let mut headers = HeaderMap::new();
	/// response.apply_to(&mut headers);
	/// assert!(headers["set-cookie"].to_str().unwrap().starts_with("session=;"));
	/// ```
	pub fn apply_to(&self, headers: &mut HeaderMap) {
		let Some(cookie) = &self.session_cookie else {
			return;
		};
		match HeaderValue::from_str(&cookie.to_header_value()) {
			Ok(value) => {
				headers.append(SET_COOKIE, value);
			}
			Err(e) => {
				tracing::warn!(cookie = %cookie.name, error = %e, "Failed to encode session cookie");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cookie::CookieExpiry;
	use rstest::rstest;

	fn cookie(name: &str, value: &str) -> SetCookie {
		SetCookie {
			name: name.to_string(),
			value: value.to_string(),
			expiry: CookieExpiry::Session,
			secure: false,
			path: "/".to_string(),
		}
	}

	#[rstest]
	#[case("session=abc", Some("abc"))]
	#[case("a=1; session=abc; b=2", Some("abc"))]
	#[case("  session=abc  ", Some("abc"))]
	#[case("session=", Some(""))]
	#[case("session", None)]
	#[case("sessions=abc", None)]
	#[case("", None)]
	fn test_from_headers_finds_cookie(#[case] header: &str, #[case] expected: Option<&str>) {
		// Arrange
		let mut headers = HeaderMap::new();
		headers.insert(COOKIE, HeaderValue::from_str(header).unwrap());

		// Act
		let request = RequestContext::from_headers(&headers, None);

		// Assert
		assert_eq!(request.cookie("session"), expected);
	}

	#[rstest]
	fn test_from_headers_first_value_wins_across_headers() {
		let mut headers = HeaderMap::new();
		headers.append(COOKIE, HeaderValue::from_static("session=first"));
		headers.append(COOKIE, HeaderValue::from_static("session=second; other=x"));

		let request = RequestContext::from_headers(&headers, None);

		assert_eq!(request.cookie("session"), Some("first"));
		assert_eq!(request.cookie("other"), Some("x"));
	}

	#[rstest]
	fn test_builder_sets_fields() {
		let request = RequestContext::new()
			.with_cookie("session", "abc")
			.with_remote_addr("2001:db8::1".parse().unwrap())
			.with_user_agent("Mozilla/5.0");

		assert_eq!(request.cookie("session"), Some("abc"));
		assert_eq!(request.ip_address().as_deref(), Some("2001:db8::1"));
		assert_eq!(request.user_agent(), Some("Mozilla/5.0"));
	}

	#[rstest]
	fn test_bind_replaces_previous_cookie() {
		// Arrange
		let mut response = ResponseContext::new();

		// Act
		response.bind(cookie("session", "first"));
		response.bind(cookie("session", "second"));
		let mut headers = HeaderMap::new();
		response.apply_to(&mut headers);

		// Assert
		assert_eq!(response.session_cookie().unwrap().value, "second");
		assert_eq!(headers.get_all(SET_COOKIE).iter().count(), 1);
	}

	#[rstest]
	fn test_apply_to_without_cookie_leaves_headers_alone() {
		let response = ResponseContext::new();
		let mut headers = HeaderMap::new();

		response.apply_to(&mut headers);

		assert!(headers.is_empty());
	}

	#[rstest]
	fn test_apply_to_skips_unencodable_cookie() {
		let mut response = ResponseContext::new();
		response.bind(cookie("session", "bad\nvalue"));
		let mut headers = HeaderMap::new();

		response.apply_to(&mut headers);

		assert!(headers.get(SET_COOKIE).is_none());
	}
}
