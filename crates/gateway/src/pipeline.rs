use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::cache::{self, MembershipCache};
use crate::config::NEGATIVE_ORACLE_TTL;
use crate::error::ProxyError;
use crate::gql::{self, Operation};
use crate::identity::IdentityStore;
use crate::oracle::Oracle;
use crate::tenant::TenantStore;
use crate::upstream::{UpstreamClient, UpstreamResponse};

/// Everything the request pipeline needs, shared across every request via an
/// `Arc`. Stores and the oracle are trait objects so tests can swap in
/// in-memory fakes without touching a real database or upstream.
#[derive(Clone)]
pub struct AppState {
	pub identity: Arc<dyn IdentityStore>,
	pub tenants: Arc<dyn TenantStore>,
	pub cache: MembershipCache,
	pub oracle: Arc<dyn Oracle>,
	pub upstream: UpstreamClient,
}

#[derive(Deserialize)]
struct RawOperation {
	query: String,
	#[serde(default)]
	variables: JsonValue,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RequestBody {
	Batch(Vec<RawOperation>),
	Single(RawOperation),
}

/// Runs the full authenticate-authorize-rewrite-forward-filter pipeline for
/// one `/proxy` call and returns the upstream response to relay back to the
/// caller: status and headers verbatim, body filtered only if the batch
/// contained a tenant-query operation.
pub async fn handle(state: &AppState, body: &[u8], tenant_header: Option<&str>, bearer_token: Option<&str>) -> Result<UpstreamResponse, ProxyError> {
	let token = bearer_token.and_then(|t| Uuid::parse_str(t).ok()).ok_or(ProxyError::InvalidToken)?;
	let user = state.identity.resolve(token).await?.ok_or(ProxyError::InvalidToken)?;

	let parsed: RequestBody = serde_json::from_slice(body).map_err(|_| ProxyError::InvalidJson)?;
	let is_batch = matches!(parsed, RequestBody::Batch(_));
	let raw_operations = match parsed {
		RequestBody::Batch(ops) => ops,
		RequestBody::Single(op) => vec![op],
	};

	let tenant_header = tenant_header.ok_or(ProxyError::MissingTenant)?;
	let tenant = Uuid::parse_str(tenant_header).map_err(|_| ProxyError::UnknownTenant(tenant_header.to_string()))?;
	ensure_tenant_exists(state, tenant).await?;
	ensure_user_belongs_to_tenant(state, user.id, tenant).await?;

	let operations: Vec<Operation> = raw_operations.into_iter().map(|op| Operation::new(op.query, op.variables)).collect();

	let (allowed, rewritten) = gql::rewrite(operations, tenant, state.oracle.as_ref()).await?;
	if !allowed {
		return Err(ProxyError::AccessDenied);
	}

	let request_body = if is_batch {
		JsonValue::Array(
			rewritten
				.iter()
				.map(|op| serde_json::json!({ "query": op.query, "variables": op.variables }))
				.collect(),
		)
	} else {
		serde_json::json!({ "query": rewritten[0].query, "variables": rewritten[0].variables })
	};
	let response = state.upstream.forward(&request_body).await?;

	let caller_tenants = user_tenants(state, user.id).await?;
	Ok(crate::response_filter::apply(&rewritten, response, &caller_tenants))
}

async fn ensure_tenant_exists(state: &AppState, tenant: Uuid) -> Result<(), ProxyError> {
	let key = cache::tenant_exists_key(tenant);
	if let Some(cached) = state.cache.get(&key).await {
		return if &*cached == "true" { Ok(()) } else { Err(ProxyError::UnknownTenant(tenant.to_string())) };
	}
	let exists = state.tenants.exists(tenant).await?;
	let (value, ttl) = if exists { ("true", state.cache.default_ttl()) } else { ("false", NEGATIVE_ORACLE_TTL) };
	state.cache.set_with_ttl(key, value, ttl).await;
	if exists { Ok(()) } else { Err(ProxyError::UnknownTenant(tenant.to_string())) }
}

async fn ensure_user_belongs_to_tenant(state: &AppState, user_id: i64, tenant: Uuid) -> Result<(), ProxyError> {
	let tenants = user_tenants(state, user_id).await?;
	if tenants.contains(&tenant) {
		Ok(())
	} else {
		Err(ProxyError::AccessDenied)
	}
}

async fn user_tenants(state: &AppState, user_id: i64) -> Result<std::collections::HashSet<Uuid>, ProxyError> {
	let key = cache::user_tenants_key(user_id);
	if let Some(cached) = state.cache.get(&key).await {
		return Ok(cache::decode_tenant_set(&cached));
	}
	let tenants = state.identity.tenants_of(user_id).await?;
	state.cache.set(key, cache::encode_tenant_set(&tenants)).await;
	Ok(tenants)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::CacheConfig;
	use crate::identity::User;
	use assert_matches::assert_matches;
	use async_trait::async_trait;
	use chrono::{DateTime, Utc};
	use std::collections::HashSet;
	use std::time::Duration;

	struct FakeIdentity {
		user: Option<User>,
		tenants: HashSet<Uuid>,
	}

	#[async_trait]
	impl IdentityStore for FakeIdentity {
		async fn resolve(&self, _token: Uuid) -> Result<Option<User>, sqlx::Error> {
			Ok(self.user.clone())
		}
		async fn tenants_of(&self, _user_id: i64) -> Result<HashSet<Uuid>, sqlx::Error> {
			Ok(self.tenants.clone())
		}
	}

	struct FakeTenants {
		known: HashSet<Uuid>,
	}

	#[async_trait]
	impl TenantStore for FakeTenants {
		async fn exists(&self, id: Uuid) -> Result<bool, sqlx::Error> {
			Ok(self.known.contains(&id))
		}
	}

	struct AllowAllOracle;

	#[async_trait]
	impl Oracle for AllowAllOracle {
		async fn belongs(&self, _entity: &str, _id: &str, _tenant: Uuid) -> Result<bool, ProxyError> {
			Ok(true)
		}
	}

	fn state(user: Option<User>, member_of: Uuid, known_tenants: &[Uuid]) -> AppState {
		let mut tenants = HashSet::new();
		tenants.insert(member_of);
		let known = known_tenants.iter().copied().collect();
		AppState {
			identity: Arc::new(FakeIdentity { user, tenants }),
			tenants: Arc::new(FakeTenants { known }),
			cache: MembershipCache::new(&CacheConfig {
				enabled: true,
				redis_url: None,
				default_timeout: Duration::from_secs(60),
			}),
			oracle: Arc::new(AllowAllOracle),
			upstream: UpstreamClient::new("http://127.0.0.1:0", Duration::from_millis(50)).unwrap(),
		}
	}

	fn user(id: i64) -> User {
		User {
			id,
			username: "alice".into(),
			password: String::new(),
			token: Uuid::new_v4(),
			token_expiry: None::<DateTime<Utc>>,
			is_active: true,
			is_admin: false,
		}
	}

	#[tokio::test]
	async fn missing_tenant_header_is_rejected() {
		let tenant = Uuid::new_v4();
		let state = state(Some(user(1)), tenant, &[tenant]);
		let token = Uuid::new_v4().to_string();
		let err = handle(&state, b"{\"query\": \"query { hello }\"}", None, Some(&token)).await.unwrap_err();
		assert_matches!(err, ProxyError::MissingTenant);
	}

	#[tokio::test]
	async fn unknown_tenant_is_rejected() {
		let tenant = Uuid::new_v4();
		let state = state(Some(user(1)), tenant, &[tenant]);
		let other = Uuid::new_v4().to_string();
		let token = Uuid::new_v4().to_string();
		let err = handle(&state, b"{\"query\": \"query { hello }\"}", Some(&other), Some(&token)).await.unwrap_err();
		assert_matches!(err, ProxyError::UnknownTenant(_));
	}

	#[tokio::test]
	async fn invalid_token_is_rejected() {
		let tenant = Uuid::new_v4();
		let state = state(None, tenant, &[tenant]);
		let token = Uuid::new_v4().to_string();
		let err = handle(&state, b"{\"query\": \"query { hello }\"}", Some(&tenant.to_string()), Some(&token)).await.unwrap_err();
		assert_matches!(err, ProxyError::InvalidToken);
	}

	#[tokio::test]
	async fn user_outside_tenant_is_denied() {
		let tenant = Uuid::new_v4();
		let foreign_tenant = Uuid::new_v4();
		let state = state(Some(user(1)), tenant, &[tenant, foreign_tenant]);
		let token = Uuid::new_v4().to_string();
		let err = handle(&state, b"{\"query\": \"query { hello }\"}", Some(&foreign_tenant.to_string()), Some(&token)).await.unwrap_err();
		assert_matches!(err, ProxyError::AccessDenied);
	}

	#[tokio::test]
	async fn invalid_token_is_checked_before_the_body_is_parsed() {
		let tenant = Uuid::new_v4();
		let state = state(None, tenant, &[tenant]);
		let err = handle(&state, b"not json at all", None, Some("not-a-uuid")).await.unwrap_err();
		assert_matches!(err, ProxyError::InvalidToken);
	}
}
