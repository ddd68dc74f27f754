//! Database-backed session store
//!
//! Rows are kept in a relational table through sqlx's `Any` driver, so the
//! same store serves PostgreSQL, MySQL and SQLite. Statements are built with
//! sea-query for the configured [`SqlDialect`].
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE session (
//!     session_id   CHAR(64) PRIMARY KEY,
//!     data         TEXT,
//!     user_agent   CHAR(64) NULL,
//!     ip_address   VARCHAR(46) NULL,
//!     time_updated BIGINT NULL
//! );
//! CREATE INDEX idx_session_time_updated ON session(time_updated);
//! ```
//!
//! `time_updated` holds Unix seconds.
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlsession_core::store::{DatabaseSessionStore, SessionStore};
//! use chrono::{Duration, Utc};
//!
//! # async fn example() {
//! let store = DatabaseSessionStore::connect("sqlite::memory:", "session")
//!     .await
//!     .unwrap();
//! store.create_table().await.unwrap();
//!
//! let removed = store
//!     .delete_expired(Utc::now() - Duration::hours(2))
//!     .await
//!     .unwrap();
//! assert_eq!(removed, 0);
//! # }
//! # tokio::runtime::Runtime::new().unwrap().block_on(example());
//! ```

use super::{SessionStore, StoredSession};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_query::{
	Alias, ColumnDef, Expr, ExprTrait, Index, MysqlQueryBuilder, PostgresQueryBuilder, Query,
	SqliteQueryBuilder, Table,
};
use sqlx::{AnyPool, Row};

const COL_SESSION_ID: &str = "session_id";
const COL_DATA: &str = "data";
const COL_USER_AGENT: &str = "user_agent";
const COL_IP_ADDRESS: &str = "ip_address";
const COL_TIME_UPDATED: &str = "time_updated";

/// SQL flavour used when rendering statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
	Postgres,
	MySql,
	Sqlite,
}

impl SqlDialect {
	/// Infer the dialect from a database URL scheme
	///
	/// # Examples
	///
	/// ```rust
	/// use sqlsession_core::store::SqlDialect;
	///
	/// assert_eq!(SqlDialect::from_url("postgres://localhost/app").unwrap(), SqlDialect::Postgres);
	/// assert_eq!(SqlDialect::from_url("sqlite::memory:").unwrap(), SqlDialect::Sqlite);
	/// assert!(SqlDialect::from_url("redis://localhost").is_err());
	/// ```
	pub fn from_url(database_url: &str) -> Result<Self, StoreError> {
		let scheme = database_url
			.split(':')
			.next()
			.unwrap_or_default()
			.to_ascii_lowercase();
		match scheme.as_str() {
			"postgres" | "postgresql" => Ok(Self::Postgres),
			"mysql" => Ok(Self::MySql),
			"sqlite" => Ok(Self::Sqlite),
			other => Err(StoreError::Storage(format!(
				"Unsupported database scheme: {}",
				other
			))),
		}
	}
}

/// Relational session store
///
/// Borrows a pool owned by the caller; cloning the store clones the pool
/// handle, not the connections.
#[derive(Debug, Clone)]
pub struct DatabaseSessionStore {
	pool: AnyPool,
	dialect: SqlDialect,
	table: String,
}

impl DatabaseSessionStore {
	/// Connect to `database_url` and use `table` for session rows
	///
	/// Supported schemes: `postgres://`, `mysql://`, `sqlite:`.
	pub async fn connect(database_url: &str, table: impl Into<String>) -> Result<Self, StoreError> {
		let dialect = SqlDialect::from_url(database_url)?;
		sqlx::any::install_default_drivers();
		let pool = AnyPool::connect(database_url)
			.await
			.map_err(|e| storage_error("Database connection error", e))?;

		Ok(Self::from_pool(pool, dialect, table))
	}

	/// Use an existing pool
	///
	/// The caller is responsible for having installed the `Any` drivers.
	pub fn from_pool(pool: AnyPool, dialect: SqlDialect, table: impl Into<String>) -> Self {
		Self {
			pool,
			dialect,
			table: table.into(),
		}
	}

	pub fn pool(&self) -> &AnyPool {
		&self.pool
	}

	pub fn dialect(&self) -> SqlDialect {
		self.dialect
	}

	pub fn table(&self) -> &str {
		&self.table
	}

	fn build_sql<T>(&self, statement: T) -> String
	where
		T: sea_query::QueryStatementWriter,
	{
		match self.dialect {
			SqlDialect::Postgres => statement.to_string(PostgresQueryBuilder),
			SqlDialect::MySql => statement.to_string(MysqlQueryBuilder),
			SqlDialect::Sqlite => statement.to_string(SqliteQueryBuilder),
		}
	}

	fn build_schema_sql<T>(&self, statement: &T) -> String
	where
		T: sea_query::SchemaStatementBuilder,
	{
		match self.dialect {
			SqlDialect::Postgres => statement.to_string(PostgresQueryBuilder),
			SqlDialect::MySql => statement.to_string(MysqlQueryBuilder),
			SqlDialect::Sqlite => statement.to_string(SqliteQueryBuilder),
		}
	}

	/// Create the session table and its `time_updated` index
	///
	/// Intended for tests and first-run setup; production schemas usually
	/// come from migrations.
	pub async fn create_table(&self) -> Result<(), StoreError> {
		let stmt = Table::create()
			.table(Alias::new(&self.table))
			.if_not_exists()
			.col(
				ColumnDef::new(Alias::new(COL_SESSION_ID))
					.char_len(64)
					.not_null()
					.primary_key(),
			)
			.col(ColumnDef::new(Alias::new(COL_DATA)).text())
			.col(ColumnDef::new(Alias::new(COL_USER_AGENT)).char_len(64).null())
			.col(ColumnDef::new(Alias::new(COL_IP_ADDRESS)).string_len(46).null())
			.col(ColumnDef::new(Alias::new(COL_TIME_UPDATED)).big_integer().null())
			.to_owned();

		let sql = self.build_schema_sql(&stmt);
		sqlx::query(&sql)
			.execute(&self.pool)
			.await
			.map_err(|e| storage_error("Failed to create session table", e))?;

		let index = Index::create()
			.if_not_exists()
			.name(format!("idx_{}_time_updated", self.table))
			.table(Alias::new(&self.table))
			.col(Alias::new(COL_TIME_UPDATED))
			.to_owned();

		let sql = self.build_schema_sql(&index);
		sqlx::query(&sql)
			.execute(&self.pool)
			.await
			.map_err(|e| storage_error("Failed to create session index", e))?;

		Ok(())
	}
}

fn storage_error(context: &str, error: sqlx::Error) -> StoreError {
	StoreError::Storage(format!("{}: {}", context, error))
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
	matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl SessionStore for DatabaseSessionStore {
	async fn find_by_id(&self, session_id: &str) -> Result<Option<StoredSession>, StoreError> {
		let stmt = Query::select()
			.columns([
				Alias::new(COL_SESSION_ID),
				Alias::new(COL_DATA),
				Alias::new(COL_USER_AGENT),
				Alias::new(COL_IP_ADDRESS),
				Alias::new(COL_TIME_UPDATED),
			])
			.from(Alias::new(&self.table))
			.and_where(Expr::col(Alias::new(COL_SESSION_ID)).eq(session_id))
			.to_owned();

		let sql = self.build_sql(stmt);
		let row = sqlx::query(&sql)
			.fetch_optional(&self.pool)
			.await
			.map_err(|e| storage_error("Failed to load session", e))?;

		let Some(row) = row else {
			return Ok(None);
		};

		let time_updated: Option<i64> = row
			.try_get(COL_TIME_UPDATED)
			.map_err(|e| storage_error("Invalid time_updated", e))?;

		Ok(Some(StoredSession {
			session_id: row
				.try_get::<String, _>(COL_SESSION_ID)
				.map_err(|e| storage_error("Invalid session_id", e))?
				.trim_end()
				.to_string(),
			payload: row
				.try_get(COL_DATA)
				.map_err(|e| storage_error("Invalid data", e))?,
			user_agent: row
				.try_get::<Option<String>, _>(COL_USER_AGENT)
				.map_err(|e| storage_error("Invalid user_agent", e))?
				.map(|ua| ua.trim_end().to_string()),
			ip_address: row
				.try_get(COL_IP_ADDRESS)
				.map_err(|e| storage_error("Invalid ip_address", e))?,
			updated_at: time_updated.and_then(|secs| DateTime::from_timestamp(secs, 0)),
		}))
	}

	async fn insert(&self, session: &StoredSession) -> Result<(), StoreError> {
		let stmt = Query::insert()
			.into_table(Alias::new(&self.table))
			.columns([
				Alias::new(COL_SESSION_ID),
				Alias::new(COL_DATA),
				Alias::new(COL_USER_AGENT),
				Alias::new(COL_IP_ADDRESS),
				Alias::new(COL_TIME_UPDATED),
			])
			.values_panic([
				session.session_id.clone().into(),
				session.payload.clone().into(),
				session.user_agent.clone().into(),
				session.ip_address.clone().into(),
				session.updated_at.map(|t| t.timestamp()).into(),
			])
			.to_owned();

		let sql = self.build_sql(stmt);
		sqlx::query(&sql)
			.execute(&self.pool)
			.await
			.map_err(|e| {
				if is_unique_violation(&e) {
					StoreError::Conflict(session.session_id.clone())
				} else {
					storage_error("Failed to insert session", e)
				}
			})?;

		Ok(())
	}

	async fn update_payload(&self, session_id: &str, payload: &str) -> Result<(), StoreError> {
		let stmt = Query::update()
			.table(Alias::new(&self.table))
			.value(Alias::new(COL_DATA), payload)
			.and_where(Expr::col(Alias::new(COL_SESSION_ID)).eq(session_id))
			.to_owned();

		let sql = self.build_sql(stmt);
		sqlx::query(&sql)
			.execute(&self.pool)
			.await
			.map_err(|e| storage_error("Failed to write session", e))?;

		Ok(())
	}

	async fn renew(
		&self,
		old_id: &str,
		new_id: &str,
		now: DateTime<Utc>,
	) -> Result<(), StoreError> {
		// A single UPDATE re-keys the row, so concurrent renewals of the same
		// identifier cannot both succeed.
		let stmt = Query::update()
			.table(Alias::new(&self.table))
			.value(Alias::new(COL_SESSION_ID), new_id)
			.value(Alias::new(COL_TIME_UPDATED), now.timestamp())
			.and_where(Expr::col(Alias::new(COL_SESSION_ID)).eq(old_id))
			.to_owned();

		let sql = self.build_sql(stmt);
		let result = sqlx::query(&sql)
			.execute(&self.pool)
			.await
			.map_err(|e| {
				if is_unique_violation(&e) {
					StoreError::Conflict(new_id.to_string())
				} else {
					storage_error("Failed to renew session", e)
				}
			})?;

		if result.rows_affected() == 0 {
			return Err(StoreError::NotFound(old_id.to_string()));
		}
		Ok(())
	}

	async fn delete(&self, session_id: &str) -> Result<(), StoreError> {
		let stmt = Query::delete()
			.from_table(Alias::new(&self.table))
			.and_where(Expr::col(Alias::new(COL_SESSION_ID)).eq(session_id))
			.to_owned();

		let sql = self.build_sql(stmt);
		sqlx::query(&sql)
			.execute(&self.pool)
			.await
			.map_err(|e| storage_error("Failed to delete session", e))?;

		Ok(())
	}

	async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
		let stmt = Query::delete()
			.from_table(Alias::new(&self.table))
			.and_where(Expr::col(Alias::new(COL_TIME_UPDATED)).lt(cutoff.timestamp()))
			.to_owned();

		let sql = self.build_sql(stmt);
		let result = sqlx::query(&sql)
			.execute(&self.pool)
			.await
			.map_err(|e| storage_error("Failed to delete expired sessions", e))?;

		Ok(result.rows_affected())
	}
}
