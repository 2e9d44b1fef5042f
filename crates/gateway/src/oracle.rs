use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use uuid::Uuid;

use crate::cache::{self, MembershipCache};
use crate::config::NEGATIVE_ORACLE_TTL;
use crate::error::ProxyError;
use crate::upstream::UpstreamClient;

/// Answers "does entity `id` belong to tenant `tenant`?" for the rewriter.
/// Every caller in `gql` only ever learns a yes/no answer, never the
/// underlying row, keeping the rewriter itself free of upstream-response
/// parsing.
#[async_trait]
pub trait Oracle: Send + Sync {
	async fn belongs(&self, entity: &str, id: &str, tenant: Uuid) -> Result<bool, ProxyError>;
}

/// Cache-fronted oracle that probes the upstream backend with
/// `{entity}_by_pk(id: "...")` when the cache has no answer.
///
/// Positive answers are cached for `CacheConfig.default_timeout`; negative
/// answers for the much shorter [`NEGATIVE_ORACLE_TTL`]. The upstream
/// service this proxy replaces cached negative answers for the same
/// duration as positive ones, which meant an entity created moments after a
/// denied probe could stay unreachable for hours. Bounding the negative TTL
/// keeps a cold cache's false "doesn't belong" from outliving the window in
/// which that's actually likely to still be true.
pub struct BelongingOracle {
	cache: MembershipCache,
	upstream: UpstreamClient,
	positive_ttl: Duration,
}

impl BelongingOracle {
	pub fn new(cache: MembershipCache, upstream: UpstreamClient, positive_ttl: Duration) -> Self {
		Self {
			cache,
			upstream,
			positive_ttl,
		}
	}

	async fn probe(&self, entity: &str, id: &str, tenant: Uuid) -> Result<bool, ProxyError> {
		let query = format!("query {{ {entity}_by_pk(id: \"{id}\") {{ tenant_id }} }}");
		let (status, body) = self.upstream.probe(&query).await?;
		if status != StatusCode::OK {
			return Ok(false);
		}
		if body.get("errors").is_some() {
			return Ok(false);
		}
		let field = format!("{entity}_by_pk");
		let Some(row) = body.get("data").and_then(|d| d.get(&field)) else {
			return Ok(false);
		};
		if row.is_null() {
			return Ok(false);
		}
		Ok(row.get("tenant_id").and_then(|v| v.as_str()) == Some(tenant.to_string().as_str()))
	}
}

#[async_trait]
impl Oracle for BelongingOracle {
	async fn belongs(&self, entity: &str, id: &str, tenant: Uuid) -> Result<bool, ProxyError> {
		let key = cache::belonging_key(entity, id, tenant);
		if let Some(cached) = self.cache.get(&key).await {
			return Ok(&*cached == "true");
		}
		let belongs = self.probe(entity, id, tenant).await?;
		let (value, ttl) = if belongs {
			("true", self.positive_ttl)
		} else {
			("false", NEGATIVE_ORACLE_TTL)
		};
		self.cache.set_with_ttl(key, value, ttl).await;
		Ok(belongs)
	}
}
