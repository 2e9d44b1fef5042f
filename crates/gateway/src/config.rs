use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Runtime configuration, read once at startup from the process environment.
///
/// Mirrors the `app/config` module of the upstream service this proxy sits in
/// front of: plain environment variables, no config file format.
#[derive(Debug, Clone)]
pub struct Config {
	pub database_url: String,
	pub prefect_api_url: String,
	pub cache: CacheConfig,
	pub requests_default_timeout: Duration,
	pub cors: CorsConfig,
	pub password_hash_algorithm: String,
	pub password_hash_iterations: u32,
	/// Kept for parity with the source service; timestamp comparisons in this
	/// crate are done on UTC instants, which are timezone-independent, so this
	/// only matters if a future surface needs to render a localized timestamp.
	pub timezone: String,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
	pub enabled: bool,
	pub redis_url: Option<String>,
	pub default_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct CorsConfig {
	pub allowed_origins: Vec<String>,
	pub allowed_methods: Vec<String>,
	pub allowed_headers: Vec<String>,
	pub allow_credentials: bool,
}

fn getenv_or(key: &str, default: &str) -> String {
	env::var(key).unwrap_or_else(|_| default.to_string())
}

fn getenv_required(key: &str) -> Result<String> {
	env::var(key).with_context(|| format!("missing required environment variable {key}"))
}

fn getenv_parsed<T: FromStr>(key: &str, default: T) -> T {
	env::var(key)
		.ok()
		.and_then(|v| v.parse().ok())
		.unwrap_or(default)
}

fn getenv_list(key: &str) -> Vec<String> {
	env::var(key)
		.ok()
		.map(|v| {
			v.split(',')
				.map(str::trim)
				.filter(|s| !s.is_empty())
				.map(str::to_string)
				.collect()
		})
		.unwrap_or_default()
}

fn getenv_bool(key: &str, default: bool) -> bool {
	env::var(key)
		.map(|v| matches!(v.as_str(), "true" | "True" | "TRUE" | "1"))
		.unwrap_or(default)
}

impl Config {
	pub fn from_env() -> Result<Self> {
		Ok(Self {
			database_url: getenv_required("DATABASE_URL")?,
			prefect_api_url: getenv_required("PREFECT_API_URL")?,
			cache: CacheConfig {
				enabled: getenv_bool("CACHE_ENABLE", false),
				redis_url: env::var("CACHE_REDIS_URL").ok(),
				default_timeout: Duration::from_secs(getenv_parsed("CACHE_DEFAULT_TIMEOUT", 43200)),
			},
			requests_default_timeout: Duration::from_secs(getenv_parsed(
				"REQUESTS_DEFAULT_TIMEOUT",
				30,
			)),
			cors: CorsConfig {
				allowed_origins: getenv_list("ALLOWED_ORIGINS"),
				allowed_methods: getenv_list("ALLOWED_METHODS"),
				allowed_headers: getenv_list("ALLOWED_HEADERS"),
				allow_credentials: getenv_bool("ALLOW_CREDENTIALS", false),
			},
			password_hash_algorithm: getenv_or("PASSWORD_HASH_ALGORITHM", "pbkdf2_sha256"),
			password_hash_iterations: getenv_parsed("PASSWORD_HASH_NUMBER_OF_ITERATIONS", 60_000),
			timezone: getenv_or("TIMEZONE", "America/Sao_Paulo"),
		})
	}
}

/// The bounded TTL applied to *negative* belonging-oracle answers.
///
/// The source service caches negative `_by_pk` lookups with the same
/// unbounded lifetime as positive ones. A tenant whose entity was deleted (or
/// simply mistyped once) would then be denied forever even after the
/// underlying data changed. We bound negative entries to a short TTL instead;
/// positive entries keep the configured `CACHE_DEFAULT_TIMEOUT`.
pub const NEGATIVE_ORACLE_TTL: Duration = Duration::from_secs(60);
