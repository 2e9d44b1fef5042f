use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache as MokaCache;
use uuid::Uuid;

use crate::config::CacheConfig;

/// A keyed store with string keys and short string values, mirroring the
/// `app.cache.Cache` wrapper around Redis in the upstream service.
///
/// The source service backs this with Redis so entries survive process
/// restarts and are shared across replicas; no example in this codebase's
/// lineage talks to Redis, and this proxy has no other use for a network
/// cache dependency, so the backing store here is an in-process TTL cache
/// (the same `moka` crate this codebase already reaches for elsewhere to
/// cache short-lived auth material). `CACHE_ENABLE`/`CACHE_REDIS_URL` are
/// still parsed from the environment and threaded through so a future
/// Redis-backed implementation is a drop-in swap, but neither changes
/// behavior today; see DESIGN.md.
///
/// The cache is advisory: every miss must be treated as "unknown,
/// recompute", never as authoritative negative information. Entries carry
/// their own TTL so the Belonging Oracle can bound negative answers
/// separately from the configured default (see `NEGATIVE_ORACLE_TTL`).
#[derive(Clone)]
pub struct MembershipCache {
	store: MokaCache<String, (Arc<str>, Duration)>,
	default_ttl: Duration,
}

struct PerEntryExpiry;

impl Expiry<String, (Arc<str>, Duration)> for PerEntryExpiry {
	fn expire_after_create(
		&self,
		_key: &String,
		value: &(Arc<str>, Duration),
		_created_at: Instant,
	) -> Option<Duration> {
		Some(value.1)
	}
}

impl MembershipCache {
	pub fn new(config: &CacheConfig) -> Self {
		// moka's Expiry trait operates on the full value; we fold the TTL into
		// an internal (value, ttl) pair and unwrap it back out on read.
		let store: MokaCache<String, (Arc<str>, Duration)> = MokaCache::builder()
			.expire_after(PerEntryExpiry)
			.build();
		Self {
			store,
			default_ttl: config.default_timeout,
		}
	}

	pub async fn get(&self, key: &str) -> Option<Arc<str>> {
		self.store.get(key).await.map(|(v, _)| v)
	}

	pub async fn set(&self, key: impl Into<String>, value: impl Into<Arc<str>>) {
		self.set_with_ttl(key, value, self.default_ttl).await;
	}

	pub async fn set_with_ttl(&self, key: impl Into<String>, value: impl Into<Arc<str>>, ttl: Duration) {
		self.store.insert(key.into(), (value.into(), ttl)).await;
	}

	pub async fn delete(&self, key: &str) {
		self.store.invalidate(key).await;
	}

	pub fn default_ttl(&self) -> Duration {
		self.default_ttl
	}
}

pub fn tenant_exists_key(tenant: Uuid) -> String {
	format!("tenant_{tenant}_exists")
}

pub fn user_tenants_key(user_id: i64) -> String {
	format!("user_tenants_{user_id}")
}

pub fn belonging_key(entity: &str, id: &str, tenant: Uuid) -> String {
	format!("{entity}-{id}__tenant-{tenant}")
}

pub fn encode_tenant_set(tenants: &std::collections::HashSet<Uuid>) -> String {
	tenants.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

pub fn decode_tenant_set(value: &str) -> std::collections::HashSet<Uuid> {
	if value.is_empty() {
		return Default::default();
	}
	value.split(',').filter_map(|s| Uuid::parse_str(s).ok()).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn cache() -> MembershipCache {
		MembershipCache::new(&CacheConfig {
			enabled: true,
			redis_url: None,
			default_timeout: Duration::from_secs(60),
		})
	}

	#[tokio::test]
	async fn miss_is_none() {
		assert!(cache().get("missing").await.is_none());
	}

	#[tokio::test]
	async fn set_then_get_round_trips() {
		let c = cache();
		c.set("k", "v").await;
		assert_eq!(c.get("k").await.as_deref(), Some("v"));
	}

	#[tokio::test]
	async fn delete_invalidates() {
		let c = cache();
		c.set("k", "v").await;
		c.delete("k").await;
		assert!(c.get("k").await.is_none());
	}

	#[test]
	fn tenant_set_round_trips() {
		let a = Uuid::new_v4();
		let b = Uuid::new_v4();
		let set = std::collections::HashSet::from([a, b]);
		let encoded = encode_tenant_set(&set);
		assert_eq!(decode_tenant_set(&encoded), set);
	}
}
