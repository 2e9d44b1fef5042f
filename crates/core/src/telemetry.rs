use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initializes the global tracing subscriber. Controlled by `RUST_LOG`,
/// defaulting to `info` for this crate and `warn` for dependencies.
pub fn init() {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

	let registry = tracing_subscriber::registry().with(filter);

	if std::env::var("LOG_FORMAT").as_deref() == Ok("json") {
		registry.with(tracing_subscriber::fmt::layer().json()).init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}
}
