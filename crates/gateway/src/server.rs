use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use bytes::Bytes;
use tower_http::cors::CorsLayer;

use crate::config::CorsConfig;
use crate::pipeline::{self, AppState};

const TENANT_HEADER: &str = "x-prefect-tenant-id";

/// Builds the `/proxy` router: POST drives the full pipeline, OPTIONS is
/// forwarded unauthenticated so CORS preflights never need a bearer token.
pub fn router(state: AppState, cors: &CorsConfig) -> Router {
	Router::new()
		.route("/proxy", post(proxy).options(preflight))
		.route("/proxy/", post(proxy).options(preflight))
		.layer(cors_layer(cors))
		.with_state(state)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
	use axum::http::{HeaderName, HeaderValue, Method};

	let mut layer = CorsLayer::new().allow_credentials(cors.allow_credentials);

	layer = if cors.allowed_origins.iter().any(|o| o == "*") {
		layer.allow_origin(tower_http::cors::Any)
	} else {
		let origins: Vec<HeaderValue> = cors
			.allowed_origins
			.iter()
			.filter_map(|o| HeaderValue::from_str(o).ok())
			.collect();
		layer.allow_origin(origins)
	};

	let methods: Vec<Method> = cors.allowed_methods.iter().filter_map(|m| m.parse().ok()).collect();
	if !methods.is_empty() {
		layer = layer.allow_methods(methods);
	}

	let headers: Vec<HeaderName> = cors.allowed_headers.iter().filter_map(|h| HeaderName::try_from(h.as_str()).ok()).collect();
	if !headers.is_empty() {
		layer = layer.allow_headers(headers);
	}

	layer
}

/// Forwards a CORS preflight to the upstream unauthenticated: OPTIONS
/// requests never carry a bearer token, so there is nothing to check here.
async fn preflight(State(state): State<AppState>) -> Response {
	match state.upstream.forward_options().await {
		Ok((status, headers)) => (status, headers).into_response(),
		Err(err) => err.into_response(),
	}
}

async fn proxy(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
	let tenant_header = header_str(&headers, TENANT_HEADER).filter(|v| *v != "null");
	let bearer = header_str(&headers, "authorization").and_then(|v| v.strip_prefix("Bearer ")).map(str::trim);

	match pipeline::handle(&state, &body, tenant_header, bearer).await {
		Ok(response) => (response.status, response.headers, response.body).into_response(),
		Err(err) => err.into_response(),
	}
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
	headers.get(name).and_then(|v| v.to_str().ok())
}
