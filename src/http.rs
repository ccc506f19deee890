use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Settings;
use crate::service::{PredictError, PredictionService};
use crate::types::{ErrorBody, PassengerQuery, PredictionResult, UsageHint};

const INDEX_HTML: &str = include_str!("../static/index.html");

// ---------- Server state ----------

#[derive(Clone)]
pub struct AppState {
    pub service: PredictionService,
    pub settings: Arc<Settings>,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, msg: impl Into<String>) -> ApiError {
    (status, Json(ErrorBody::new(msg)))
}

pub fn router(state: AppState) -> Router {
    let hosts = Arc::new(HostPolicy::new(
        &state.settings.allowed_hosts,
        state.settings.debug,
    ));
    let cors = cors_layer(&state.settings.cors_allowed_origins);

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/predict", get(usage).post(predict))
        .route("/predict/", get(usage).post(predict))
        .layer(middleware::from_fn_with_state(hosts, check_host))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------- Handlers ----------

async fn home() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn usage() -> Json<UsageHint> {
    Json(UsageHint::default())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "model": state.service.describe_model() }))
}

async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PassengerQuery>, JsonRejection>,
) -> Result<Json<PredictionResult>, ApiError> {
    let Json(query) = payload.map_err(|rej| {
        tracing::debug!("rejected body: {}", rej.body_text());
        api_error(StatusCode::BAD_REQUEST, rej.body_text())
    })?;

    match state.service.predict(&query) {
        Ok(result) => Ok(Json(result)),
        Err(PredictError::Validation(e)) => {
            tracing::debug!("validation failed: {}", e);
            Err(api_error(StatusCode::BAD_REQUEST, e.to_string()))
        }
        Err(PredictError::Inference(e)) => {
            tracing::error!("prediction failed: {}", e);
            let msg = if state.settings.debug {
                format!("prediction failed: {}", e)
            } else {
                "prediction failed".to_string()
            };
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, msg))
        }
    }
}

// ---------- Host header check ----------

/// Allowed `Host` values. `*` matches anything; a leading dot matches the
/// domain and all of its subdomains.
#[derive(Debug, Clone)]
pub struct HostPolicy {
    patterns: Vec<String>,
}

impl HostPolicy {
    pub fn new(allowed: &[String], debug: bool) -> Self {
        let mut patterns: Vec<String> = allowed
            .iter()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        if patterns.is_empty() && debug {
            patterns = [".localhost", "127.0.0.1", "[::1]"]
                .into_iter()
                .map(String::from)
                .collect();
        }
        Self { patterns }
    }

    pub fn allows(&self, host: &str) -> bool {
        let host = strip_port(host.trim())
            .trim_end_matches('.')
            .to_ascii_lowercase();
        if host.is_empty() {
            return false;
        }
        self.patterns.iter().any(|p| {
            p == "*"
                || *p == host
                || (p.starts_with('.') && (host.ends_with(p.as_str()) || host == p[1..]))
        })
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, _)) => name,
        None => host,
    }
}

async fn check_host(State(policy): State<Arc<HostPolicy>>, req: Request, next: Next) -> Response {
    let host = req
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .or_else(|| req.uri().host().map(str::to_string))
        .unwrap_or_default();

    if policy.allows(&host) {
        next.run(req).await
    } else {
        tracing::warn!("rejected request with host {:?}", host);
        api_error(StatusCode::BAD_REQUEST, "invalid host header").into_response()
    }
}

// ---------- CORS ----------

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = if origins.is_empty() || origins.iter().any(|o| o.trim() == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins = origins
            .iter()
            .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
            .collect::<Vec<_>>();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    cors.allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
}
