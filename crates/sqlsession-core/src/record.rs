//! In-memory session record and its persisted payload

use crate::error::SessionError;
use crate::store::StoredSession;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key/value map holding session data
pub type DataMap = serde_json::Map<String, serde_json::Value>;

/// Document stored in the session table's payload column
///
/// Only durable data and the flash data staged for the next request are
/// persisted. Flash data read during the current request is never written
/// back.
///
/// # Examples
///
/// ```rust
/// use sqlsession_core::record::SessionPayload;
///
/// let payload = SessionPayload::decode(Some(r#"{"data":{"k":"v"},"flash":{}}"#)).unwrap();
/// assert_eq!(payload.data["k"], "v");
///
/// // Missing or empty payloads decode to an empty document
/// assert!(SessionPayload::decode(None).unwrap().data.is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
	#[serde(default)]
	pub data: DataMap,
	#[serde(default)]
	pub flash: DataMap,
}

impl SessionPayload {
	/// Decode a stored payload column
	pub fn decode(raw: Option<&str>) -> Result<Self, serde_json::Error> {
		match raw.map(str::trim) {
			None | Some("") => Ok(Self::default()),
			Some(raw) => serde_json::from_str(raw),
		}
	}

	pub fn encode(&self) -> Result<String, SessionError> {
		Ok(serde_json::to_string(self)?)
	}
}

/// State of one session for the duration of a request
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
	pub session_id: String,
	pub user_agent_hash: Option<String>,
	pub ip_address: Option<String>,
	/// Last creation or renewal, not the last write
	pub updated_at: DateTime<Utc>,
	/// Durable user data
	pub data: DataMap,
	/// Flash data carried over from the previous request
	pub flash_in: DataMap,
	/// Flash data staged for the next request
	pub flash_out: DataMap,
}

impl SessionRecord {
	/// Empty record for a newly created session
	pub fn new(
		session_id: String,
		user_agent_hash: Option<String>,
		ip_address: Option<String>,
		updated_at: DateTime<Utc>,
	) -> Self {
		Self {
			session_id,
			user_agent_hash,
			ip_address,
			updated_at,
			data: DataMap::new(),
			flash_in: DataMap::new(),
			flash_out: DataMap::new(),
		}
	}

	/// Rebuild a record from a stored row and its decoded payload
	///
	/// The stored flash data becomes this request's incoming flash data.
	/// A row without a timestamp takes `fallback_time`.
	pub fn from_stored(
		row: StoredSession,
		payload: SessionPayload,
		fallback_time: DateTime<Utc>,
	) -> Self {
		Self {
			session_id: row.session_id,
			user_agent_hash: row.user_agent,
			ip_address: row.ip_address,
			updated_at: row.updated_at.unwrap_or(fallback_time),
			data: payload.data,
			flash_in: payload.flash,
			flash_out: DataMap::new(),
		}
	}

	/// Payload to persist at the end of the request
	pub fn outgoing_payload(&self) -> SessionPayload {
		SessionPayload {
			data: self.data.clone(),
			flash: self.flash_out.clone(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	#[case(None)]
	#[case(Some(""))]
	#[case(Some("   "))]
	#[case(Some("{}"))]
	fn test_decode_empty_payloads(#[case] raw: Option<&str>) {
		let payload = SessionPayload::decode(raw).unwrap();

		assert_eq!(payload, SessionPayload::default());
	}

	#[rstest]
	fn test_decode_rejects_garbage() {
		assert!(SessionPayload::decode(Some("not json")).is_err());
		assert!(SessionPayload::decode(Some("[1,2,3]")).is_err());
	}

	#[rstest]
	fn test_from_stored_moves_flash_to_incoming() {
		// Arrange
		let updated_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
		let row = StoredSession {
			session_id: "a".repeat(64),
			payload: None,
			user_agent: Some("b".repeat(64)),
			ip_address: Some("192.0.2.1".to_string()),
			updated_at: Some(updated_at),
		};
		let payload = SessionPayload::decode(Some(
			r#"{"data":{"user_id":42},"flash":{"msg":"saved"}}"#,
		))
		.unwrap();

		// Act
		let record = SessionRecord::from_stored(row, payload, Utc::now());

		// Assert
		assert_eq!(record.data["user_id"], json!(42));
		assert_eq!(record.flash_in["msg"], json!("saved"));
		assert!(record.flash_out.is_empty());
		assert_eq!(record.updated_at, updated_at);
		assert_eq!(record.ip_address.as_deref(), Some("192.0.2.1"));
	}

	#[rstest]
	fn test_outgoing_payload_drops_incoming_flash() {
		// Arrange
		let mut record = SessionRecord::new("a".repeat(64), None, None, Utc::now());
		record.data.insert("k".to_string(), json!("v"));
		record.flash_in.insert("old".to_string(), json!(1));
		record.flash_out.insert("new".to_string(), json!(2));

		// Act
		let encoded = record.outgoing_payload().encode().unwrap();
		let decoded = SessionPayload::decode(Some(&encoded)).unwrap();

		// Assert
		assert_eq!(decoded.data["k"], json!("v"));
		assert_eq!(decoded.flash.get("new"), Some(&json!(2)));
		assert!(!decoded.flash.contains_key("old"));
	}
}
