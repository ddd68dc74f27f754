//! Session lifecycle rules
//!
//! A stored row presented by a client is judged by [`evaluate`], which applies
//! the validation rules in a fixed order and returns a [`Verdict`]:
//!
//! 1. expired (unless the cookie lives only for the browser session)
//! 2. IP address mismatch, when enabled
//! 3. user agent mismatch, when enabled
//! 4. older than the renewal interval
//!
//! The first two cases of the full state machine (no identifier, unknown
//! identifier) are decided before a row exists and never reach this module.
//! Acting on the verdict is the job of [`Session`](crate::session::Session).
//!
//! ## State Machine
//!
//! ```text
//! NoSession ──► Pending ──► Valid
//!                  │
//!                  ├──► Expired ──┐
//!                  ├──► Invalid ──┼──► Destroyed ──► (create) ──► Valid
//!                  └──► Renewed   │
//! Valid ──► (destroy) ────────────┘
//! ```

use crate::config::SessionConfig;
use crate::identifier::fingerprints_match;
use crate::store::StoredSession;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Where a session handle stands in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
	/// No usable identifier has been seen yet
	NoSession,
	/// An identifier was presented but not validated
	Pending,
	Valid,
	Expired,
	/// A fingerprint check failed or the payload was unreadable
	Invalid,
	/// The identifier was replaced during this request
	Renewed,
	Destroyed,
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Self::NoSession => "no_session",
			Self::Pending => "pending",
			Self::Valid => "valid",
			Self::Expired => "expired",
			Self::Invalid => "invalid",
			Self::Renewed => "renewed",
			Self::Destroyed => "destroyed",
		};
		f.write_str(name)
	}
}

/// Why a stored session was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
	Expired,
	IpMismatch,
	UserAgentMismatch,
	/// The payload column could not be decoded
	CorruptPayload,
}

impl Rejection {
	/// State the session passes through before it is destroyed
	pub fn state(self) -> SessionState {
		match self {
			Self::Expired => SessionState::Expired,
			Self::IpMismatch | Self::UserAgentMismatch | Self::CorruptPayload => {
				SessionState::Invalid
			}
		}
	}
}

impl fmt::Display for Rejection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let reason = match self {
			Self::Expired => "expired",
			Self::IpMismatch => "ip address mismatch",
			Self::UserAgentMismatch => "user agent mismatch",
			Self::CorruptPayload => "corrupt payload",
		};
		f.write_str(reason)
	}
}

/// Why a fresh session was created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateReason {
	/// The request carried no session cookie
	NoIdentifier,
	/// The cookie named a session the store does not have
	UnknownIdentifier,
	/// The stored session was refused and destroyed
	Rejected(Rejection),
}

/// What happened when a session handle ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
	Created(CreateReason),
	Resumed,
	Renewed,
}

impl Outcome {
	pub fn is_new(&self) -> bool {
		matches!(self, Self::Created(_))
	}
}

/// Decision for a stored row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
	Reject(Rejection),
	Renew,
	Resume,
}

/// Client attributes a session is bound to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFingerprint {
	pub ip_address: Option<String>,
	/// Fingerprint of the user agent, see
	/// [`fingerprint_user_agent`](crate::identifier::fingerprint_user_agent)
	pub user_agent_hash: Option<String>,
}

/// Whole Unix seconds between `updated_at` and `now`, saturating at zero for
/// clock skew
///
/// Both instants are reduced to Unix seconds first, the resolution of the
/// `time_updated` column. A row without a timestamp is treated as infinitely
/// old.
fn age_seconds(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
	match updated_at {
		Some(updated_at) => u64::try_from(now.timestamp() - updated_at.timestamp()).unwrap_or(0),
		None => u64::MAX,
	}
}

/// Judge a stored row against the configuration and the current client
///
/// All comparisons use the single `now` captured when the request started.
///
/// # Examples
///
/// ```rust
/// use sqlsession_core::config::SessionSettings;
/// use sqlsession_core::lifecycle::{evaluate, ClientFingerprint, Rejection, Verdict};
/// use sqlsession_core::store::StoredSession;
/// use chrono::{Duration, Utc};
///
/// let config = SessionSettings::new("s3cr3t").build().unwrap();
/// let now = Utc::now();
/// let row = StoredSession {
///     session_id: "a".repeat(64),
///     payload: None,
///     user_agent: None,
///     ip_address: None,
///     updated_at: Some(now - Duration::seconds(7201)),
/// };
///
/// let verdict = evaluate(&config, &row, &ClientFingerprint::default(), now);
/// assert_eq!(verdict, Verdict::Reject(Rejection::Expired));
/// ```
pub fn evaluate(
	config: &SessionConfig,
	row: &StoredSession,
	client: &ClientFingerprint,
	now: DateTime<Utc>,
) -> Verdict {
	let age = age_seconds(row.updated_at, now);

	if !config.expire_on_close() && age > config.seconds_until_expiration() {
		return Verdict::Reject(Rejection::Expired);
	}

	if config.check_ip_address() && row.ip_address != client.ip_address {
		return Verdict::Reject(Rejection::IpMismatch);
	}

	if config.check_user_agent()
		&& !fingerprints_match(row.user_agent.as_deref(), client.user_agent_hash.as_deref())
	{
		return Verdict::Reject(Rejection::UserAgentMismatch);
	}

	if age > config.renewal_time() {
		return Verdict::Renew;
	}

	Verdict::Resume
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::SessionSettings;
	use chrono::{Duration, TimeZone};
	use rstest::{fixture, rstest};

	fn row_aged(now: DateTime<Utc>, seconds: i64) -> StoredSession {
		StoredSession {
			session_id: "a".repeat(64),
			payload: None,
			user_agent: Some("b".repeat(64)),
			ip_address: Some("192.0.2.1".to_string()),
			updated_at: Some(now - Duration::seconds(seconds)),
		}
	}

	fn matching_client() -> ClientFingerprint {
		ClientFingerprint {
			ip_address: Some("192.0.2.1".to_string()),
			user_agent_hash: Some("b".repeat(64)),
		}
	}

	#[fixture]
	fn settings() -> SessionSettings {
		SessionSettings::new("s3cr3t")
			.with_seconds_until_expiration(7200)
			.with_renewal_time(300)
	}

	#[rstest]
	#[case(0, Verdict::Resume)]
	#[case(300, Verdict::Resume)]
	#[case(301, Verdict::Renew)]
	#[case(7200, Verdict::Renew)]
	#[case(7201, Verdict::Reject(Rejection::Expired))]
	fn test_age_thresholds(
		settings: SessionSettings,
		#[case] age: i64,
		#[case] expected: Verdict,
	) {
		// Arrange
		let config = settings.build().unwrap();
		let now = Utc::now();

		// Act
		let verdict = evaluate(&config, &row_aged(now, age), &matching_client(), now);

		// Assert
		assert_eq!(verdict, expected);
	}

	#[rstest]
	#[case(900, 301_500, Verdict::Renew)]
	#[case(900, 300_100, Verdict::Resume)]
	#[case(100, 300_900, Verdict::Resume)]
	#[case(999, 7_201_000, Verdict::Reject(Rejection::Expired))]
	fn test_age_counts_whole_seconds(
		settings: SessionSettings,
		#[case] updated_millis: i64,
		#[case] now_millis: i64,
		#[case] expected: Verdict,
	) {
		// Arrange
		let config = settings.build().unwrap();
		let base = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
		let mut row = row_aged(base, 0);
		row.updated_at = Some(base + Duration::milliseconds(updated_millis));
		let now = base + Duration::milliseconds(now_millis);

		// Act
		let verdict = evaluate(&config, &row, &matching_client(), now);

		// Assert
		assert_eq!(verdict, expected);
	}

	#[rstest]
	fn test_expire_on_close_skips_expiry_but_still_renews(settings: SessionSettings) {
		let config = settings.with_expire_on_close(true).build().unwrap();
		let now = Utc::now();

		let verdict = evaluate(&config, &row_aged(now, 86_400), &matching_client(), now);

		assert_eq!(verdict, Verdict::Renew);
	}

	#[rstest]
	fn test_ip_mismatch_only_when_enabled(settings: SessionSettings) {
		// Arrange
		let now = Utc::now();
		let row = row_aged(now, 1);
		let client = ClientFingerprint {
			ip_address: Some("198.51.100.9".to_string()),
			..matching_client()
		};
		let relaxed = settings.clone().build().unwrap();
		let strict = settings.with_check_ip_address(true).build().unwrap();

		// Act & Assert
		assert_eq!(evaluate(&relaxed, &row, &client, now), Verdict::Resume);
		assert_eq!(
			evaluate(&strict, &row, &client, now),
			Verdict::Reject(Rejection::IpMismatch)
		);
	}

	#[rstest]
	fn test_user_agent_mismatch_only_when_enabled(settings: SessionSettings) {
		let now = Utc::now();
		let row = row_aged(now, 1);
		let client = ClientFingerprint {
			user_agent_hash: Some("c".repeat(64)),
			..matching_client()
		};
		let relaxed = settings.clone().build().unwrap();
		let strict = settings.with_check_user_agent(true).build().unwrap();

		assert_eq!(evaluate(&relaxed, &row, &client, now), Verdict::Resume);
		assert_eq!(
			evaluate(&strict, &row, &client, now),
			Verdict::Reject(Rejection::UserAgentMismatch)
		);
	}

	#[rstest]
	fn test_expiry_is_checked_before_fingerprints(settings: SessionSettings) {
		// Arrange
		let config = settings
			.with_check_ip_address(true)
			.with_check_user_agent(true)
			.build()
			.unwrap();
		let now = Utc::now();

		// Act
		let verdict = evaluate(
			&config,
			&row_aged(now, 9000),
			&ClientFingerprint::default(),
			now,
		);

		// Assert
		assert_eq!(verdict, Verdict::Reject(Rejection::Expired));
	}

	#[rstest]
	fn test_fingerprint_is_checked_before_renewal(settings: SessionSettings) {
		let config = settings.with_check_ip_address(true).build().unwrap();
		let now = Utc::now();

		let verdict = evaluate(
			&config,
			&row_aged(now, 600),
			&ClientFingerprint::default(),
			now,
		);

		assert_eq!(verdict, Verdict::Reject(Rejection::IpMismatch));
	}

	#[rstest]
	fn test_missing_timestamp_is_treated_as_expired(settings: SessionSettings) {
		let config = settings.build().unwrap();
		let now = Utc::now();
		let mut row = row_aged(now, 0);
		row.updated_at = None;

		let verdict = evaluate(&config, &row, &matching_client(), now);

		assert_eq!(verdict, Verdict::Reject(Rejection::Expired));
	}

	#[rstest]
	fn test_future_timestamp_resumes(settings: SessionSettings) {
		let config = settings.build().unwrap();
		let now = Utc::now();

		let verdict = evaluate(&config, &row_aged(now, -60), &matching_client(), now);

		assert_eq!(verdict, Verdict::Resume);
	}

	#[rstest]
	#[case(Rejection::Expired, SessionState::Expired)]
	#[case(Rejection::IpMismatch, SessionState::Invalid)]
	#[case(Rejection::UserAgentMismatch, SessionState::Invalid)]
	#[case(Rejection::CorruptPayload, SessionState::Invalid)]
	fn test_rejection_state(#[case] rejection: Rejection, #[case] expected: SessionState) {
		assert_eq!(rejection.state(), expected);
	}
}
