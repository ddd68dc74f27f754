//! Session identifier generation and client fingerprinting
//!
//! Identifiers are HMAC-SHA256 digests keyed with the configured salt over
//! 32 bytes from the operating system's random source and the client's
//! network address. The result is 64 lowercase hex characters, which is also
//! the only shape accepted back from a cookie.

use crate::error::{ConfigError, SessionError};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of an identifier in characters
pub const IDENTIFIER_LEN: usize = 64;

const NONCE_LEN: usize = 32;

/// Produces unguessable session identifiers
///
/// # Examples
///
/// ```rust
/// use sqlsession_core::identifier::{IdentifierGenerator, is_well_formed};
///
/// let generator = IdentifierGenerator::new(b"s3cr3t").unwrap();
/// let id = generator.generate(Some("203.0.113.7")).unwrap();
///
/// assert!(is_well_formed(&id));
/// assert_ne!(id, generator.generate(Some("203.0.113.7")).unwrap());
/// ```
#[derive(Clone)]
pub struct IdentifierGenerator {
	mac: HmacSha256,
}

impl IdentifierGenerator {
	/// Create a generator keyed with `salt`
	pub fn new(salt: &[u8]) -> Result<Self, ConfigError> {
		if salt.is_empty() {
			return Err(ConfigError::invalid("salt", "must not be empty"));
		}
		let mac = HmacSha256::new_from_slice(salt)
			.map_err(|e| ConfigError::invalid("salt", e.to_string()))?;
		Ok(Self { mac })
	}

	/// Generate a fresh identifier for a client at `ip_address`
	///
	/// Fails with [`SessionError::Entropy`] when the secure random source
	/// cannot be read. There is no fallback to a weaker source.
	pub fn generate(&self, ip_address: Option<&str>) -> Result<String, SessionError> {
		let mut nonce = [0u8; NONCE_LEN];
		OsRng
			.try_fill_bytes(&mut nonce)
			.map_err(|e| SessionError::Entropy(e.to_string()))?;

		let mut mac = self.mac.clone();
		mac.update(&nonce);
		mac.update(ip_address.unwrap_or_default().as_bytes());
		Ok(hex::encode(mac.finalize().into_bytes()))
	}
}

impl std::fmt::Debug for IdentifierGenerator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IdentifierGenerator").finish_non_exhaustive()
	}
}

/// Whether `candidate` has the shape of a generated identifier
pub fn is_well_formed(candidate: &str) -> bool {
	candidate.len() == IDENTIFIER_LEN
		&& candidate
			.bytes()
			.all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Fixed-length fingerprint of a user agent string
pub fn fingerprint_user_agent(user_agent: &str) -> String {
	hex::encode(Sha256::digest(user_agent.as_bytes()))
}

/// Constant-time comparison of two optional fingerprints
pub fn fingerprints_match(stored: Option<&str>, current: Option<&str>) -> bool {
	match (stored, current) {
		(Some(stored), Some(current)) => stored.as_bytes().ct_eq(current.as_bytes()).into(),
		(None, None) => true,
		_ => false,
	}
}

/// Shortened identifier for log output
pub(crate) fn redact(id: &str) -> &str {
	id.get(..8).unwrap_or(id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::collections::HashSet;

	#[rstest]
	fn test_generated_identifiers_are_well_formed() {
		let generator = IdentifierGenerator::new(b"s3cr3t").unwrap();

		let id = generator.generate(Some("192.0.2.1")).unwrap();

		assert_eq!(id.len(), IDENTIFIER_LEN);
		assert!(is_well_formed(&id));
	}

	#[rstest]
	fn test_generated_identifiers_are_unique() {
		// Arrange
		let generator = IdentifierGenerator::new(b"s3cr3t").unwrap();

		// Act
		let ids: HashSet<String> = (0..500)
			.map(|_| generator.generate(None).unwrap())
			.collect();

		// Assert
		assert_eq!(ids.len(), 500);
	}

	#[rstest]
	fn test_empty_salt_is_rejected() {
		assert!(IdentifierGenerator::new(b"").is_err());
	}

	#[rstest]
	#[case("", false)]
	#[case("abc", false)]
	#[case(&"a".repeat(64), true)]
	#[case(&"0123456789abcdef".repeat(4), true)]
	#[case(&"A".repeat(64), false)]
	#[case(&"g".repeat(64), false)]
	#[case(&"a".repeat(65), false)]
	#[case(&format!("{}' OR '1'='1", "a".repeat(53)), false)]
	fn test_is_well_formed(#[case] candidate: &str, #[case] expected: bool) {
		assert_eq!(is_well_formed(candidate), expected);
	}

	#[rstest]
	fn test_user_agent_fingerprint_is_stable_and_fixed_length() {
		let first = fingerprint_user_agent("Mozilla/5.0 (X11; Linux x86_64)");
		let second = fingerprint_user_agent("Mozilla/5.0 (X11; Linux x86_64)");
		let other = fingerprint_user_agent("curl/8.5.0");

		assert_eq!(first, second);
		assert_ne!(first, other);
		assert_eq!(first.len(), 64);
	}

	#[rstest]
	#[case(Some("abc"), Some("abc"), true)]
	#[case(Some("abc"), Some("abd"), false)]
	#[case(Some("abc"), None, false)]
	#[case(None, Some("abc"), false)]
	#[case(None, None, true)]
	fn test_fingerprints_match(
		#[case] stored: Option<&str>,
		#[case] current: Option<&str>,
		#[case] expected: bool,
	) {
		assert_eq!(fingerprints_match(stored, current), expected);
	}

	#[rstest]
	fn test_redact_keeps_prefix_only() {
		assert_eq!(redact(&"f".repeat(64)), "ffffffff");
		assert_eq!(redact("abc"), "abc");
	}
}
