//! Expired session cleanup
//!
//! Expired rows are already refused when they are read, so removing them is
//! housekeeping only. The [`Janitor`] does it opportunistically: each request
//! has a 1-in-N chance of sweeping the whole table, and a failed sweep is
//! logged and forgotten.
//!
//! For cron-style cleanup, call [`Janitor::sweep`] directly.
//!
//! ## Example
//!
//! ```rust
//! use sqlsession_core::janitor::Janitor;
//! use sqlsession_core::store::InMemorySessionStore;
//! use chrono::{Duration, Utc};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = InMemorySessionStore::new();
//! let janitor = Janitor::new(100, Duration::seconds(7200));
//!
//! let removed = janitor.sweep(&store, Utc::now()).await.unwrap();
//! assert_eq!(removed, 0);
//! # }
//! ```

use crate::config::SessionConfig;
use crate::error::StoreError;
use crate::store::SessionStore;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Result of a probabilistic sweep
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
	/// The random trigger did not fire
	Skipped,
	Swept(u64),
	/// The store reported an error, which was logged
	Failed(String),
}

/// Probabilistic sweeper of expired session rows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Janitor {
	divisor: u32,
	expiration: Duration,
}

impl Janitor {
	/// Sweep with probability `1 / divisor`. A divisor of 0 never sweeps.
	pub fn new(divisor: u32, expiration: Duration) -> Self {
		Self {
			divisor,
			expiration,
		}
	}

	pub fn from_config(config: &SessionConfig) -> Self {
		Self::new(config.sweep_divisor(), config.expiration())
	}

	pub fn divisor(&self) -> u32 {
		self.divisor
	}

	/// Rows last updated before this instant are expired
	pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
		now - self.expiration
	}

	/// Roll the random trigger
	pub fn should_sweep<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
		match self.divisor {
			0 => false,
			1 => true,
			n => rng.gen_ratio(1, n),
		}
	}

	/// Delete every expired row now
	pub async fn sweep<S>(&self, store: &S, now: DateTime<Utc>) -> Result<u64, StoreError>
	where
		S: SessionStore + ?Sized,
	{
		let deleted = store.delete_expired(self.cutoff(now)).await?;
		tracing::debug!(deleted, "Swept expired sessions");
		Ok(deleted)
	}

	/// Sweep if the random trigger fires, never failing the caller
	pub async fn maybe_sweep<S>(&self, store: &S, now: DateTime<Utc>) -> SweepOutcome
	where
		S: SessionStore + ?Sized,
	{
		let triggered = self.should_sweep(&mut rand::thread_rng());
		if !triggered {
			return SweepOutcome::Skipped;
		}

		match self.sweep(store, now).await {
			Ok(deleted) => SweepOutcome::Swept(deleted),
			Err(e) => {
				tracing::warn!(error = %e, "Expired session sweep failed");
				SweepOutcome::Failed(e.to_string())
			}
		}
	}
}
