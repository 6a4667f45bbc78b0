//! HTTP handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/v1/login` | Certificate login; returns a credential grant |
//! | `POST` | `/v1/renew` | Clamp a lease extension |
//! | `GET` | `/v1/map/{namespace}` | List mapped ids (admin) |
//! | `GET` `PUT` `DELETE` | `/v1/map/{namespace}/{id}` | Policy mapping (admin) |
//! | `GET` | `/v1/certs` | List trusted certificates (admin) |
//! | `GET` `PUT` `DELETE` | `/v1/certs/{name}` | Trusted certificate (admin) |
//! | `GET` | `/health` | Liveness |
//!
//! ## Admin Authentication
//!
//! `/v1/map` and `/v1/certs` require `Authorization: Bearer <admin_token>`
//! where `admin_token` is `admin.bearer_token` from config. If no admin token
//! is configured, those endpoints return `503 Service Unavailable`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;

use crate::auth_backend::AuthBackend;
use crate::config::{ServerConfig, humantime_serde};
use crate::login::Lease;
use crate::pki::{delete_trusted_cert, list_trusted_certs, read_trusted_cert, write_trusted_cert};
use crate::policy::{PolicyList, PolicyMap};
use crate::Error;

/// Shared application state
pub struct AppState {
    /// Login backend
    pub backend: Arc<AuthBackend>,
    /// Resolved admin bearer token; `None` disables the admin API
    pub admin_token: Option<String>,
}

// ── Request / Response types ───────────────────────────────────────────────

/// `POST /v1/renew` body.
#[derive(Debug, Default, Deserialize)]
pub struct RenewRequest {
    /// Requested extension in seconds; 0 or absent means one step.
    #[serde(default)]
    pub increment_secs: u64,
    /// Lease returned by the login being renewed.
    #[serde(default)]
    pub lease: Option<Lease>,
}

/// `POST /v1/renew` response.
#[derive(Debug, Serialize)]
pub struct RenewResponse {
    /// Granted extension.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

/// `PUT /v1/map/{namespace}/{id}` body.
#[derive(Debug, Deserialize)]
pub struct MappingBody {
    /// List or comma-separated string
    pub policies: PolicyList,
}

/// `PUT /v1/certs/{name}` body.
#[derive(Debug, Deserialize)]
pub struct CertificateBody {
    /// PEM bundle
    pub certificate: String,
}

// ── Route builder ─────────────────────────────────────────────────────────

/// Create the router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/login", post(login_handler))
        .route("/v1/renew", post(renew_handler))
        .route("/v1/map/{namespace}", get(list_mappings))
        .route(
            "/v1/map/{namespace}/{id}",
            get(read_mapping).put(write_mapping).delete(delete_mapping),
        )
        .route("/v1/certs", get(list_certs))
        .route(
            "/v1/certs/{name}",
            get(read_cert).put(write_cert).delete(delete_cert),
        )
        .layer(DefaultBodyLimit::max(config.max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    config.request_timeout,
                ))
                .layer(CatchPanicLayer::new()),
        )
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `POST /v1/login`: named string fields `certificate` and `key`.
async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(fields): Json<HashMap<String, String>>,
) -> Response {
    match state.backend.login(&fields).await {
        Ok(grant) => (StatusCode::OK, Json(grant)).into_response(),
        Err(e) => error_into_response(&e),
    }
}

/// `POST /v1/renew`
async fn renew_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RenewRequest>,
) -> Response {
    let requested = Duration::from_secs(body.increment_secs);
    match state.backend.renew(body.lease.as_ref(), requested) {
        Ok(ttl) => (StatusCode::OK, Json(RenewResponse { ttl })).into_response(),
        Err(e) => error_into_response(&e),
    }
}

async fn list_mappings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(namespace): Path<String>,
) -> Response {
    let map = match admin_namespace(&state, &headers, &namespace) {
        Ok(map) => map,
        Err(response) => return response,
    };
    match map.list(state.backend.storage()).await {
        Ok(ids) => Json(json!({"namespace": map.name(), "keys": ids})).into_response(),
        Err(e) => error_into_response(&e),
    }
}

async fn read_mapping(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((namespace, id)): Path<(String, String)>,
) -> Response {
    let map = match admin_namespace(&state, &headers, &namespace) {
        Ok(map) => map,
        Err(response) => return response,
    };
    match map.get(state.backend.storage(), &id).await {
        Ok(Some(entry)) => Json(json!({"id": id, "policies": entry.policies})).into_response(),
        Ok(None) => error_into_response(&Error::NotFound(format!("{}/{id}", map.name()))),
        Err(e) => error_into_response(&Error::from(e)),
    }
}

async fn write_mapping(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((namespace, id)): Path<(String, String)>,
    Json(body): Json<MappingBody>,
) -> Response {
    let map = match admin_namespace(&state, &headers, &namespace) {
        Ok(map) => map,
        Err(response) => return response,
    };
    match map.put(state.backend.storage(), &id, body.policies).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_into_response(&e),
    }
}

async fn delete_mapping(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((namespace, id)): Path<(String, String)>,
) -> Response {
    let map = match admin_namespace(&state, &headers, &namespace) {
        Ok(map) => map,
        Err(response) => return response,
    };
    match map.delete(state.backend.storage(), &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_into_response(&e),
    }
}

async fn list_certs(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = check_admin_auth(&state, &headers) {
        return response;
    }
    match list_trusted_certs(state.backend.storage()).await {
        Ok(names) => Json(json!({"keys": names})).into_response(),
        Err(e) => error_into_response(&e),
    }
}

async fn read_cert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    if let Err(response) = check_admin_auth(&state, &headers) {
        return response;
    }
    match read_trusted_cert(state.backend.storage(), &name).await {
        Ok(entry) => Json(entry).into_response(),
        Err(e) => error_into_response(&e),
    }
}

async fn write_cert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
    Json(body): Json<CertificateBody>,
) -> Response {
    if let Err(response) = check_admin_auth(&state, &headers) {
        return response;
    }
    match write_trusted_cert(state.backend.storage(), &name, &body.certificate).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_into_response(&e),
    }
}

async fn delete_cert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Response {
    if let Err(response) = check_admin_auth(&state, &headers) {
        return response;
    }
    match delete_trusted_cert(state.backend.storage(), &name).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_into_response(&e),
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────

/// Authorize an admin request and look up the namespace it targets.
#[allow(clippy::result_large_err)]
fn admin_namespace<'a>(
    state: &'a AppState,
    headers: &HeaderMap,
    namespace: &str,
) -> Result<&'a PolicyMap, Response> {
    check_admin_auth(state, headers)?;
    state.backend.namespace(namespace).ok_or_else(|| {
        error_response(
            StatusCode::NOT_FOUND,
            "unknown_namespace",
            &format!("unknown namespace '{namespace}' (expected apps, workspaces or orgs)"),
        )
    })
}

/// Check the `Authorization: Bearer <token>` header against the configured
/// admin token. Returns `Err(response)` if auth fails.
#[allow(clippy::result_large_err)]
fn check_admin_auth(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    use subtle::ConstantTimeEq;

    let Some(ref admin_token) = state.admin_token else {
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "admin_not_configured",
            "Admin token not configured; administrative endpoints disabled",
        ));
    };

    let provided = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")));

    let matches = provided.is_some_and(|p| p.as_bytes().ct_eq(admin_token.as_bytes()).into());

    if matches {
        Ok(())
    } else {
        warn!("Admin request with missing or invalid bearer token");
        Err(error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Valid admin bearer token required",
        ))
    }
}

/// HTTP status for an error kind.
pub(crate) fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Decode(_)
        | Error::InsufficientChain { .. }
        | Error::MalformedIdentity(_)
        | Error::InvalidRequest(_)
        | Error::MissingAuthContext
        | Error::LeaseExpired => StatusCode::BAD_REQUEST,
        Error::ChainValidation(_) | Error::KeyMismatch | Error::UnsupportedKeyAlgorithm(_) => {
            StatusCode::UNAUTHORIZED
        }
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::NamespaceLookup { .. }
        | Error::Storage(_)
        | Error::Config(_)
        | Error::Io(_)
        | Error::Json(_)
        | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_into_response(error: &Error) -> Response {
    error_response(status_for(error), error.kind(), &error.to_string())
}

fn error_response(status: StatusCode, error: &str, message: &str) -> Response {
    (status, Json(json!({"error": error, "message": message}))).into_response()
}
