use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tenant_graphql_proxy::config::Config;
use tenant_graphql_proxy::identity::PgIdentityStore;
use tenant_graphql_proxy::oracle::BelongingOracle;
use tenant_graphql_proxy::tenant::PgTenantStore;
use tenant_graphql_proxy::upstream::UpstreamClient;
use tenant_graphql_proxy::{cache::MembershipCache, pipeline::AppState, server};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	proxy_core::telemetry::init();

	let config = Config::from_env()?;

	let pool = PgPoolOptions::new()
		.connect(&config.database_url)
		.await
		.context("connecting to database")?;

	let cache = MembershipCache::new(&config.cache);
	let upstream = UpstreamClient::new(config.prefect_api_url.clone(), config.requests_default_timeout)?;
	let oracle = BelongingOracle::new(cache.clone(), upstream.clone(), config.cache.default_timeout);

	let state = AppState {
		identity: Arc::new(PgIdentityStore::new(pool.clone())),
		tenants: Arc::new(PgTenantStore::new(pool)),
		cache,
		oracle: Arc::new(oracle),
		upstream,
	};

	let app = server::router(state, &config.cors);

	let port: u16 = std::env::var("PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8000);
	let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
	info!(%port, upstream = %config.prefect_api_url, "tenant-graphql-proxy listening");

	axum::serve(listener, app).await?;
	Ok(())
}
