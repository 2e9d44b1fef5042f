use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// A user account, mirroring `app.models.User` in the upstream service.
#[derive(Debug, Clone)]
pub struct User {
	pub id: i64,
	pub username: String,
	pub password: String,
	pub token: Uuid,
	pub token_expiry: Option<DateTime<Utc>>,
	pub is_active: bool,
	pub is_admin: bool,
}

impl User {
	/// A token is valid as long as the user is active and the token either
	/// never expires or has not yet expired. `is_admin` is intentionally not
	/// considered here: admin status only short-circuits the user/tenant CRUD
	/// surface, never the proxy rewriter.
	fn token_is_live(&self, now: DateTime<Utc>) -> bool {
		self.is_active && self.token_expiry.is_none_or(|expiry| expiry > now)
	}
}

/// Looks up users by bearer token and resolves their tenant membership.
///
/// Inactive users and expired tokens are indistinguishable from unknown
/// tokens to callers of `resolve` — all three collapse to `None`, matching
/// the upstream service's "invalid token" / "inactive user" / "expired
/// token" responses, which differ only in message, not effect.
#[async_trait]
pub trait IdentityStore: Send + Sync {
	async fn resolve(&self, token: Uuid) -> Result<Option<User>, sqlx::Error>;
	async fn tenants_of(&self, user_id: i64) -> Result<HashSet<Uuid>, sqlx::Error>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
	id: i64,
	username: String,
	password: String,
	token: Uuid,
	token_expiry: Option<DateTime<Utc>>,
	is_active: bool,
	is_admin: bool,
}

impl From<UserRow> for User {
	fn from(row: UserRow) -> Self {
		User {
			id: row.id,
			username: row.username,
			password: row.password,
			token: row.token,
			token_expiry: row.token_expiry,
			is_active: row.is_active,
			is_admin: row.is_admin,
		}
	}
}

pub struct PgIdentityStore {
	pool: PgPool,
}

impl PgIdentityStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl IdentityStore for PgIdentityStore {
	async fn resolve(&self, token: Uuid) -> Result<Option<User>, sqlx::Error> {
		let row = sqlx::query_as::<_, UserRow>(
			r#"
			SELECT id, username, password, token, token_expiry, is_active, is_admin
			FROM "user"
			WHERE token = $1
			"#,
		)
		.bind(token)
		.fetch_optional(&self.pool)
		.await?;
		let now = Utc::now();
		Ok(row.map(User::from).filter(|u| u.token_is_live(now)))
	}

	async fn tenants_of(&self, user_id: i64) -> Result<HashSet<Uuid>, sqlx::Error> {
		let rows: Vec<(Uuid,)> =
			sqlx::query_as(r#"SELECT tenant_id FROM user_tenant WHERE user_id = $1"#)
				.bind(user_id)
				.fetch_all(&self.pool)
				.await?;
		Ok(rows.into_iter().map(|(id,)| id).collect())
	}
}
