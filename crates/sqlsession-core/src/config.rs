//! Session configuration
//!
//! [`SessionSettings`] is the raw option map. It deserializes from any serde
//! source (TOML helper included) or is assembled with the `with_*` builder
//! methods. [`SessionSettings::build`] validates every option and produces the
//! immutable [`SessionConfig`] the rest of the crate reads from.
//!
//! ## Example
//!
//! ```rust
//! use sqlsession_core::config::SessionSettings;
//!
//! let config = SessionSettings::new("s3cr3t")
//!     .with_seconds_until_expiration(7200)
//!     .with_renewal_time(300)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.cookie_name(), "session");
//! assert!(config.secure_cookie());
//! ```

use crate::error::ConfigError;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;

/// Upper bound for both durations (100 years), which keeps every
/// `now ± duration` computation inside chrono's range.
const MAX_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Raw session options
///
/// Keys use snake_case. Unknown keys are rejected so that a typo in a
/// configuration file fails at startup instead of silently falling back to a
/// default.
///
/// # Examples
///
/// ```rust
/// use sqlsession_core::config::SessionSettings;
///
/// let settings = SessionSettings::from_toml_str(
///     r#"
///     salt = "s3cr3t"
///     cookie_name = "app"
///     secure_cookie = false
///     "#,
/// )
/// .unwrap();
///
/// let config = settings.build().unwrap();
/// assert_eq!(config.cookie_name(), "app");
/// assert!(!config.secure_cookie());
/// ```
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
	/// Name of the session cookie (ASCII alphanumeric)
	pub cookie_name: String,
	/// Name of the session table
	pub table_name: String,
	/// Lifetime of a session since its last creation or renewal
	pub seconds_until_expiration: u64,
	/// Age after which the identifier is replaced
	pub renewal_time: u64,
	/// Issue a browser-session cookie and skip server-side expiry checks
	pub expire_on_close: bool,
	/// Reject sessions presented from a different network address
	pub check_ip_address: bool,
	/// Reject sessions presented with a different user agent
	pub check_user_agent: bool,
	/// Mark the cookie `Secure`
	pub secure_cookie: bool,
	/// Secret mixed into every identifier
	pub salt: Option<String>,
	/// Run the lifecycle as soon as a session handle is started
	pub auto_run_session: bool,
	/// Sweep expired rows on roughly one request in N. Zero disables sweeping.
	pub sweep_divisor: u32,
}

impl SessionSettings {
	/// Settings with every default and the given salt
	pub fn new(salt: impl Into<String>) -> Self {
		Self {
			salt: Some(salt.into()),
			..Self::default()
		}
	}

	/// Parse settings from a TOML document
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))
	}

	pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
		self.cookie_name = cookie_name.into();
		self
	}

	pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
		self.table_name = table_name.into();
		self
	}

	pub fn with_seconds_until_expiration(mut self, seconds: u64) -> Self {
		self.seconds_until_expiration = seconds;
		self
	}

	pub fn with_renewal_time(mut self, seconds: u64) -> Self {
		self.renewal_time = seconds;
		self
	}

	pub fn with_expire_on_close(mut self, expire_on_close: bool) -> Self {
		self.expire_on_close = expire_on_close;
		self
	}

	pub fn with_check_ip_address(mut self, check: bool) -> Self {
		self.check_ip_address = check;
		self
	}

	pub fn with_check_user_agent(mut self, check: bool) -> Self {
		self.check_user_agent = check;
		self
	}

	pub fn with_secure_cookie(mut self, secure: bool) -> Self {
		self.secure_cookie = secure;
		self
	}

	pub fn with_auto_run_session(mut self, auto_run: bool) -> Self {
		self.auto_run_session = auto_run;
		self
	}

	pub fn with_sweep_divisor(mut self, divisor: u32) -> Self {
		self.sweep_divisor = divisor;
		self
	}

	/// Validate the options and freeze them into a [`SessionConfig`]
	///
	/// The first invalid option is reported.
	pub fn build(self) -> Result<SessionConfig, ConfigError> {
		validate_cookie_name(&self.cookie_name)?;
		validate_table_name(&self.table_name)?;

		if self.seconds_until_expiration == 0 {
			return Err(ConfigError::invalid(
				"seconds_until_expiration",
				"must be a positive integer",
			));
		}
		if self.renewal_time == 0 {
			return Err(ConfigError::invalid(
				"renewal_time",
				"must be a positive integer",
			));
		}
		if self.seconds_until_expiration > MAX_SECONDS {
			return Err(ConfigError::invalid(
				"seconds_until_expiration",
				format!("must not exceed {} seconds", MAX_SECONDS),
			));
		}
		if self.renewal_time > MAX_SECONDS {
			return Err(ConfigError::invalid(
				"renewal_time",
				format!("must not exceed {} seconds", MAX_SECONDS),
			));
		}

		let salt = match self.salt {
			Some(salt) if !salt.is_empty() => salt,
			Some(_) => return Err(ConfigError::invalid("salt", "must not be empty")),
			None => return Err(ConfigError::MissingRequired("salt".to_string())),
		};

		Ok(SessionConfig {
			cookie_name: self.cookie_name,
			table_name: self.table_name,
			seconds_until_expiration: self.seconds_until_expiration,
			renewal_time: self.renewal_time,
			expire_on_close: self.expire_on_close,
			check_ip_address: self.check_ip_address,
			check_user_agent: self.check_user_agent,
			secure_cookie: self.secure_cookie,
			salt: SecretString::from(salt),
			auto_run_session: self.auto_run_session,
			sweep_divisor: self.sweep_divisor,
		})
	}
}

impl Default for SessionSettings {
	fn default() -> Self {
		Self {
			cookie_name: "session".to_string(),
			table_name: "session".to_string(),
			seconds_until_expiration: 7200,
			renewal_time: 300,
			expire_on_close: false,
			check_ip_address: false,
			check_user_agent: false,
			secure_cookie: true,
			salt: None,
			auto_run_session: true,
			sweep_divisor: 100,
		}
	}
}

impl fmt::Debug for SessionSettings {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionSettings")
			.field("cookie_name", &self.cookie_name)
			.field("table_name", &self.table_name)
			.field("seconds_until_expiration", &self.seconds_until_expiration)
			.field("renewal_time", &self.renewal_time)
			.field("expire_on_close", &self.expire_on_close)
			.field("check_ip_address", &self.check_ip_address)
			.field("check_user_agent", &self.check_user_agent)
			.field("secure_cookie", &self.secure_cookie)
			.field("salt", &self.salt.as_ref().map(|_| "[REDACTED]"))
			.field("auto_run_session", &self.auto_run_session)
			.field("sweep_divisor", &self.sweep_divisor)
			.finish()
	}
}

fn validate_cookie_name(name: &str) -> Result<(), ConfigError> {
	if name.is_empty() {
		return Err(ConfigError::invalid("cookie_name", "must not be empty"));
	}
	if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
		return Err(ConfigError::invalid(
			"cookie_name",
			"must contain only ASCII letters and digits",
		));
	}
	Ok(())
}

fn validate_table_name(name: &str) -> Result<(), ConfigError> {
	let mut chars = name.chars();
	match chars.next() {
		None => Err(ConfigError::invalid("table_name", "must not be empty")),
		Some(first) if first.is_ascii_digit() => Err(ConfigError::invalid(
			"table_name",
			"must not start with a digit",
		)),
		Some(_) if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') => Err(
			ConfigError::invalid("table_name", "must contain only ASCII letters, digits and '_'"),
		),
		Some(_) => Ok(()),
	}
}

/// Validated, immutable session configuration
///
/// Built through [`SessionSettings::build`]. The salt is kept in a
/// [`SecretString`] and redacted from `Debug` output.
#[derive(Debug)]
pub struct SessionConfig {
	cookie_name: String,
	table_name: String,
	seconds_until_expiration: u64,
	renewal_time: u64,
	expire_on_close: bool,
	check_ip_address: bool,
	check_user_agent: bool,
	secure_cookie: bool,
	salt: SecretString,
	auto_run_session: bool,
	sweep_divisor: u32,
}

impl SessionConfig {
	pub fn cookie_name(&self) -> &str {
		&self.cookie_name
	}

	pub fn table_name(&self) -> &str {
		&self.table_name
	}

	pub fn seconds_until_expiration(&self) -> u64 {
		self.seconds_until_expiration
	}

	pub fn renewal_time(&self) -> u64 {
		self.renewal_time
	}

	pub fn expire_on_close(&self) -> bool {
		self.expire_on_close
	}

	pub fn check_ip_address(&self) -> bool {
		self.check_ip_address
	}

	pub fn check_user_agent(&self) -> bool {
		self.check_user_agent
	}

	pub fn secure_cookie(&self) -> bool {
		self.secure_cookie
	}

	pub fn auto_run_session(&self) -> bool {
		self.auto_run_session
	}

	pub fn sweep_divisor(&self) -> u32 {
		self.sweep_divisor
	}

	/// Expiration window as a signed duration
	pub fn expiration(&self) -> chrono::Duration {
		// Bounded by MAX_SECONDS in `SessionSettings::build`
		chrono::Duration::seconds(self.seconds_until_expiration as i64)
	}

	/// Renewal window as a signed duration
	pub fn renewal(&self) -> chrono::Duration {
		chrono::Duration::seconds(self.renewal_time as i64)
	}

	pub(crate) fn salt(&self) -> &[u8] {
		self.salt.expose_secret().as_bytes()
	}
}
