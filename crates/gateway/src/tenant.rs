use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// A tenant, mirroring `app.models.Tenant` in the upstream service. `id` is
/// the authority on tenancy throughout the rewriter; `slug` is display only.
#[derive(Debug, Clone)]
pub struct Tenant {
	pub id: Uuid,
	pub slug: String,
}

#[async_trait]
pub trait TenantStore: Send + Sync {
	async fn exists(&self, id: Uuid) -> Result<bool, sqlx::Error>;
}

pub struct PgTenantStore {
	pool: PgPool,
}

impl PgTenantStore {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}

#[async_trait]
impl TenantStore for PgTenantStore {
	async fn exists(&self, id: Uuid) -> Result<bool, sqlx::Error> {
		let row: Option<(Uuid,)> = sqlx::query_as(r#"SELECT id FROM tenant WHERE id = $1"#)
			.bind(id)
			.fetch_optional(&self.pool)
			.await?;
		Ok(row.is_some())
	}
}
