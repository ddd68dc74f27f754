//! Request-scoped session handle
//!
//! A [`Session`] is created for one request by the
//! [`SessionManager`](crate::manager::SessionManager), owned exclusively by
//! that request, and consumed by [`Session::close`] at the end of it.
//!
//! ## Lifecycle
//!
//! [`Session::run`] resolves the inbound cookie to a session:
//!
//! 1. no cookie, or a cookie that is not a well-formed identifier: create
//! 2. no row for the identifier: create
//! 3. the row fails validation ([`evaluate`]): destroy, then create
//! 4. the row is older than the renewal interval: move it to a new identifier
//! 5. otherwise: resume it as is
//!
//! Changes are kept in memory and written back once, by [`Session::close`].
//! Flash data set during a request is readable only during the next one.
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
//! let config = SessionSettings::new("s3cr3t").build()?;
//! let manager = SessionManager::new(config, InMemorySessionStore::new())?;
//!
//! let mut session = manager.start(&RequestContext::new()).await?;
//! session.set_one("cart_items", 3)?;
//! session.set_flash_one("notice", "Item added")?;
//! assert_eq!(session.get_one::<u32>("cart_items")?, Some(3));
//! assert!(session.get_flash_data()?.is_empty());
//!
//! let response = session.close().await?;
//! assert!(response.session_cookie().is_some());
//! # Ok(())
//! # }
//! ```

use crate::analytics::SessionEvent;
use crate::error::{SessionError, StoreError};
use crate::identifier::{fingerprint_user_agent, is_well_formed, redact};
use crate::janitor::SweepOutcome;
use crate::lifecycle::{
	ClientFingerprint, CreateReason, Outcome, Rejection, SessionState, Verdict, evaluate,
};
use crate::manager::SessionManager;
use crate::record::{DataMap, SessionPayload, SessionRecord};
use crate::request::{RequestContext, ResponseContext};
use crate::store::{SessionStore, StoredSession};
use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::mem;

/// One request's view of its session
pub struct Session<'m, S: SessionStore> {
	manager: &'m SessionManager<S>,
	now: DateTime<Utc>,
	inbound_id: Option<String>,
	client: ClientFingerprint,
	state: SessionState,
	outcome: Option<Outcome>,
	record: Option<SessionRecord>,
	response: ResponseContext,
	closed: bool,
}

impl<'m, S: SessionStore> Session<'m, S> {
	pub(crate) fn new(
		manager: &'m SessionManager<S>,
		request: &RequestContext,
		now: DateTime<Utc>,
	) -> Self {
		let inbound_id = request
			.cookie(manager.config().cookie_name())
			.filter(|value| !value.is_empty())
			.map(str::to_string);
		let client = ClientFingerprint {
			ip_address: request.ip_address(),
			user_agent_hash: request.user_agent().map(fingerprint_user_agent),
		};
		let state = if inbound_id.is_some() {
			SessionState::Pending
		} else {
			SessionState::NoSession
		};

		Self {
			manager,
			// Stored timestamps have whole-second resolution
			now: now.trunc_subsecs(0),
			inbound_id,
			client,
			state,
			outcome: None,
			record: None,
			response: ResponseContext::new(),
			closed: false,
		}
	}

	/// Resolve the inbound identifier to a usable session
	///
	/// Returns how the session was obtained. Running an already running
	/// session returns the first outcome again without touching the store.
	pub async fn run(&mut self) -> Result<Outcome, SessionError> {
		if self.state == SessionState::Destroyed {
			return Err(SessionError::Destroyed);
		}
		if let Some(outcome) = self.outcome {
			return Ok(outcome);
		}

		let outcome = match self.inbound_id.clone() {
			None => self.create(CreateReason::NoIdentifier).await?,
			Some(id) if !is_well_formed(&id) => {
				tracing::debug!("Ignoring malformed session identifier");
				self.create(CreateReason::UnknownIdentifier).await?
			}
			Some(id) => match self.manager.store().find_by_id(&id).await? {
				None => {
					tracing::debug!(session_key = %redact(&id), "Unknown session identifier");
					self.create(CreateReason::UnknownIdentifier).await?
				}
				Some(row) => self.resolve(row).await?,
			},
		};

		self.outcome = Some(outcome);
		Ok(outcome)
	}

	async fn resolve(&mut self, row: StoredSession) -> Result<Outcome, SessionError> {
		let verdict = evaluate(self.manager.config(), &row, &self.client, self.now);
		let payload = match verdict {
			Verdict::Reject(rejection) => return self.reject(row, rejection).await,
			Verdict::Renew | Verdict::Resume => {
				match SessionPayload::decode(row.payload.as_deref()) {
					Ok(payload) => payload,
					Err(e) => {
						tracing::warn!(
							session_key = %redact(&row.session_id),
							error = %e,
							"Stored session payload is unreadable"
						);
						return self.reject(row, Rejection::CorruptPayload).await;
					}
				}
			}
		};

		let record = SessionRecord::from_stored(row, payload, self.now);
		if verdict == Verdict::Renew {
			return self.renew(record).await;
		}

		tracing::debug!(session_key = %redact(&record.session_id), "Session resumed");
		self.manager
			.emit(SessionEvent::Resumed {
				session_key: redact(&record.session_id).to_string(),
				timestamp: self.now,
			})
			.await;
		self.bind_cookie(&record.session_id);
		self.record = Some(record);
		self.state = SessionState::Valid;
		Ok(Outcome::Resumed)
	}

	async fn reject(
		&mut self,
		row: StoredSession,
		rejection: Rejection,
	) -> Result<Outcome, SessionError> {
		self.state = rejection.state();
		tracing::debug!(
			session_key = %redact(&row.session_id),
			rejection = %rejection,
			"Session rejected"
		);
		self.manager
			.emit(SessionEvent::Rejected {
				session_key: redact(&row.session_id).to_string(),
				rejection,
				timestamp: self.now,
			})
			.await;

		self.manager.store().delete(&row.session_id).await?;
		self.response.bind(self.manager.binder().clear());
		self.manager
			.emit(SessionEvent::Destroyed {
				session_key: redact(&row.session_id).to_string(),
				timestamp: self.now,
			})
			.await;

		self.create(CreateReason::Rejected(rejection)).await
	}

	async fn renew(&mut self, mut record: SessionRecord) -> Result<Outcome, SessionError> {
		let previous = record.session_id.clone();
		let session_id = self
			.manager
			.generator()
			.generate(self.client.ip_address.as_deref())?;

		match self
			.manager
			.store()
			.renew(&previous, &session_id, self.now)
			.await
		{
			Ok(()) => {}
			Err(StoreError::NotFound(_)) => {
				// Destroyed by a concurrent request between lookup and renewal
				tracing::debug!(session_key = %redact(&previous), "Session vanished before renewal");
				return self.create(CreateReason::UnknownIdentifier).await;
			}
			Err(e) => return Err(e.into()),
		}

		tracing::debug!(
			session_key = %redact(&session_id),
			previous = %redact(&previous),
			"Session renewed"
		);
		self.manager
			.emit(SessionEvent::Renewed {
				session_key: redact(&session_id).to_string(),
				previous: redact(&previous).to_string(),
				timestamp: self.now,
			})
			.await;

		record.session_id = session_id;
		record.updated_at = self.now;
		self.bind_cookie(&record.session_id);
		self.record = Some(record);
		self.state = SessionState::Renewed;
		Ok(Outcome::Renewed)
	}

	async fn create(&mut self, reason: CreateReason) -> Result<Outcome, SessionError> {
		let session_id = self
			.manager
			.generator()
			.generate(self.client.ip_address.as_deref())?;
		let record = SessionRecord::new(
			session_id,
			self.client.user_agent_hash.clone(),
			self.client.ip_address.clone(),
			self.now,
		);

		self.manager
			.store()
			.insert(&StoredSession {
				session_id: record.session_id.clone(),
				payload: Some(record.outgoing_payload().encode()?),
				user_agent: record.user_agent_hash.clone(),
				ip_address: record.ip_address.clone(),
				updated_at: Some(self.now),
			})
			.await?;

		tracing::debug!(
			session_key = %redact(&record.session_id),
			reason = ?reason,
			"Session created"
		);
		self.manager
			.emit(SessionEvent::Created {
				session_key: redact(&record.session_id).to_string(),
				reason,
				timestamp: self.now,
			})
			.await;

		self.bind_cookie(&record.session_id);
		self.record = Some(record);
		self.state = SessionState::Valid;
		Ok(Outcome::Created(reason))
	}

	fn bind_cookie(&mut self, session_id: &str) {
		self.response
			.bind(self.manager.binder().bind(session_id, self.now));
	}

	fn record(&self) -> Result<&SessionRecord, SessionError> {
		if self.state == SessionState::Destroyed {
			return Err(SessionError::Destroyed);
		}
		self.record.as_ref().ok_or(SessionError::NotStarted)
	}

	fn record_mut(&mut self) -> Result<&mut SessionRecord, SessionError> {
		if self.state == SessionState::Destroyed {
			return Err(SessionError::Destroyed);
		}
		self.record.as_mut().ok_or(SessionError::NotStarted)
	}

	pub fn state(&self) -> SessionState {
		self.state
	}

	/// How [`run`](Self::run) obtained the session, if it has run
	pub fn outcome(&self) -> Option<Outcome> {
		self.outcome
	}

	/// Current identifier, once the session has run and until it is destroyed
	pub fn session_id(&self) -> Option<&str> {
		self.record().ok().map(|record| record.session_id.as_str())
	}

	/// Request time used for every lifecycle decision
	pub fn now(&self) -> DateTime<Utc> {
		self.now
	}

	pub fn set_one<V: Serialize>(
		&mut self,
		key: impl Into<String>,
		value: V,
	) -> Result<(), SessionError> {
		let value = serde_json::to_value(value)?;
		self.record_mut()?.data.insert(key.into(), value);
		Ok(())
	}

	/// Merge `values` into the session data, replacing existing keys
	pub fn set_many(&mut self, values: DataMap) -> Result<(), SessionError> {
		self.record_mut()?.data.extend(values);
		Ok(())
	}

	pub fn get_data(&self) -> Result<&DataMap, SessionError> {
		Ok(&self.record()?.data)
	}

	/// Read one value, deserialized into `T`
	///
	/// Returns `Ok(None)` when the key is absent and an error when the stored
	/// value does not fit `T`.
	pub fn get_one<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, SessionError> {
		self.record()?
			.data
			.get(key)
			.map(|value| serde_json::from_value(value.clone()))
			.transpose()
			.map_err(Into::into)
	}

	/// Remove one key, returning its value
	pub fn unset_one(&mut self, key: &str) -> Result<Option<Value>, SessionError> {
		Ok(self.record_mut()?.data.remove(key))
	}

	pub fn unset_all(&mut self) -> Result<(), SessionError> {
		self.record_mut()?.data.clear();
		Ok(())
	}

	/// Stage a flash value for the next request
	pub fn set_flash_one<V: Serialize>(
		&mut self,
		key: impl Into<String>,
		value: V,
	) -> Result<(), SessionError> {
		let value = serde_json::to_value(value)?;
		self.record_mut()?.flash_out.insert(key.into(), value);
		Ok(())
	}

	pub fn set_flash_many(&mut self, values: DataMap) -> Result<(), SessionError> {
		self.record_mut()?.flash_out.extend(values);
		Ok(())
	}

	/// Flash data staged by the previous request
	pub fn get_flash_data(&self) -> Result<&DataMap, SessionError> {
		Ok(&self.record()?.flash_in)
	}

	pub fn get_flash_one<T: DeserializeOwned>(
		&self,
		key: &str,
	) -> Result<Option<T>, SessionError> {
		self.record()?
			.flash_in
			.get(key)
			.map(|value| serde_json::from_value(value.clone()))
			.transpose()
			.map_err(Into::into)
	}

	/// Move the session to a fresh identifier, keeping its data
	///
	/// Call after a privilege change such as login so that an identifier
	/// seen before the change stops working.
	pub async fn regenerate_id(&mut self) -> Result<(), SessionError> {
		let previous = self.record()?.session_id.clone();
		let session_id = self
			.manager
			.generator()
			.generate(self.client.ip_address.as_deref())?;
		self.manager
			.store()
			.renew(&previous, &session_id, self.now)
			.await?;

		tracing::debug!(
			session_key = %redact(&session_id),
			previous = %redact(&previous),
			"Session identifier regenerated"
		);
		self.manager
			.emit(SessionEvent::Renewed {
				session_key: redact(&session_id).to_string(),
				previous: redact(&previous).to_string(),
				timestamp: self.now,
			})
			.await;

		self.bind_cookie(&session_id);
		let now = self.now;
		let record = self.record_mut()?;
		record.session_id = session_id;
		record.updated_at = now;
		self.state = SessionState::Renewed;
		Ok(())
	}

	/// Delete the session and tell the client to drop its cookie
	///
	/// Nothing is written back for a destroyed session, and its data can no
	/// longer be used during this request. Destroying twice is a no-op.
	pub async fn destroy(&mut self) -> Result<(), SessionError> {
		if self.state == SessionState::Destroyed {
			return Ok(());
		}

		let session_id = match self.record.take() {
			Some(record) => Some(record.session_id),
			None => self.inbound_id.take().filter(|id| is_well_formed(id)),
		};
		if let Some(session_id) = &session_id {
			self.manager.store().delete(session_id).await?;
		}

		self.response.bind(self.manager.binder().clear());
		self.state = SessionState::Destroyed;

		if let Some(session_id) = session_id {
			tracing::debug!(session_key = %redact(&session_id), "Session destroyed");
			self.manager
				.emit(SessionEvent::Destroyed {
					session_key: redact(&session_id).to_string(),
					timestamp: self.now,
				})
				.await;
		}
		Ok(())
	}

	/// Cookie directive accumulated so far
	pub fn response(&self) -> &ResponseContext {
		&self.response
	}

	/// Write the session back and hand out the response context
	///
	/// The payload is written even when nothing changed. A destroyed session
	/// writes nothing. Afterwards the janitor may sweep expired rows; a failed
	/// sweep does not fail the close.
	pub async fn close(mut self) -> Result<ResponseContext, SessionError> {
		self.closed = true;
		let response = mem::take(&mut self.response);

		if self.state != SessionState::Destroyed
			&& let Some(record) = &self.record
		{
			let payload = record.outgoing_payload().encode()?;
			self.manager
				.store()
				.update_payload(&record.session_id, &payload)
				.await?;
			self.manager
				.emit(SessionEvent::Written {
					session_key: redact(&record.session_id).to_string(),
					size_bytes: payload.len(),
					timestamp: self.now,
				})
				.await;
		}

		if self.outcome.is_some() || self.state == SessionState::Destroyed {
			self.sweep().await;
		}

		Ok(response)
	}

	async fn sweep(&self) {
		let event = match self
			.manager
			.janitor()
			.maybe_sweep(self.manager.store(), self.now)
			.await
		{
			SweepOutcome::Skipped => return,
			SweepOutcome::Swept(deleted) => SessionEvent::Swept {
				deleted,
				timestamp: self.now,
			},
			SweepOutcome::Failed(error) => SessionEvent::SweepFailed {
				error,
				timestamp: self.now,
			},
		};
		self.manager.emit(event).await;
	}
}

impl<S: SessionStore> Drop for Session<'_, S> {
	fn drop(&mut self) {
		if self.closed || self.state == SessionState::Destroyed {
			return;
		}
		if let Some(record) = &self.record {
			tracing::warn!(
				session_key = %redact(&record.session_id),
				"Session dropped without close; changes were not written"
			);
		}
	}
}

impl<S: SessionStore> std::fmt::Debug for Session<'_, S> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field(
				"session_key",
				&self.record.as_ref().map(|r| redact(&r.session_id)),
			)
			.field("state", &self.state)
			.field("outcome", &self.outcome)
			.field("now", &self.now)
			.finish_non_exhaustive()
	}
}
