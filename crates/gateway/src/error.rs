use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors surfaced across the `/proxy` request path.
///
/// Each variant carries enough information for logging but maps to one of
/// a small number of wire-visible outcomes: 400, 401, 403 or 502. The
/// taxonomy matches the one used throughout `app/dependencies.py` and
/// `app/routers/proxy.py` in the upstream service, just expressed as a typed
/// Rust enum instead of ad-hoc `HTTPException`s.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
	#[error("invalid JSON body")]
	InvalidJson,

	#[error("invalid GraphQL query: {0}")]
	InvalidQuery(String),

	#[error("missing tenant ID header")]
	MissingTenant,

	#[error("unknown tenant ID {0}")]
	UnknownTenant(String),

	/// Covers an unknown token, an inactive user, and an expired token alike:
	/// `IdentityStore::resolve` collapses all three to `None` by contract, so
	/// the proxy cannot tell them apart and, for the same reason the upstream
	/// service does not either, should not try to.
	#[error("invalid token")]
	InvalidToken,

	#[error("access denied")]
	AccessDenied,

	#[error("upstream request failed: {0}")]
	Upstream(#[from] reqwest::Error),

	#[error(transparent)]
	Database(#[from] sqlx::Error),
}

impl ProxyError {
	fn status(&self) -> StatusCode {
		match self {
			ProxyError::InvalidJson | ProxyError::InvalidQuery(_) | ProxyError::MissingTenant | ProxyError::UnknownTenant(_) => StatusCode::BAD_REQUEST,
			ProxyError::InvalidToken => StatusCode::UNAUTHORIZED,
			ProxyError::AccessDenied => StatusCode::FORBIDDEN,
			ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
			ProxyError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}
}

impl IntoResponse for ProxyError {
	fn into_response(self) -> Response {
		let status = self.status();
		tracing::error!(error = %self, %status, "request failed");
		match &self {
			ProxyError::InvalidJson => (status, "Invalid JSON").into_response(),
			ProxyError::InvalidQuery(_) => (status, "Invalid GraphQL query").into_response(),
			ProxyError::MissingTenant => (status, Json(json!({"error": "Please provide tenant ID"}))).into_response(),
			ProxyError::UnknownTenant(_) => (status, Json(json!({"error": "Invalid tenant ID"}))).into_response(),
			ProxyError::InvalidToken => (status, "Invalid token").into_response(),
			ProxyError::AccessDenied => (status, Json(json!({"error": "Access denied"}))).into_response(),
			ProxyError::Upstream(_) => (status, "Upstream request failed").into_response(),
			ProxyError::Database(_) => (status, "Internal error").into_response(),
		}
	}
}
