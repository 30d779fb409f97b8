use actix_web::{web, HttpRequest, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::config::RateLimitSettings;
use crate::models::requests::split_list;
use crate::models::{
    CheckQuery, CheckRequest, ErrorResponse, HealthResponse, IngestRequest, IngestResponse,
    RateLimitedResponse,
};
use crate::services::{AvailabilityService, BulkIngestor, RateDecision, RateLimiter};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AvailabilityService>,
    pub ingestor: Arc<BulkIngestor>,
    pub limiter: RateLimiter,
    pub rate_limit: RateLimitSettings,
    /// Credential for the paid dataset, if configured
    pub ingest_credential: Option<String>,
}

/// Configure all domain-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/check", web::get().to(check_get))
        .route("/check", web::post().to(check_post))
        .route("/stats", web::get().to(stats))
        .route("/ingest", web::post().to(ingest));
}

/// Liveness only
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "domain-availability".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Caller identity used for rate limiting
///
/// The TCP peer address, unless a trusted proxy header is configured and
/// present. Client-supplied `X-Forwarded-For`/`Forwarded` are ignored.
fn client_key(req: &HttpRequest, trusted_header: Option<&str>) -> String {
    if let Some(header) = trusted_header {
        let forwarded = req
            .headers()
            .get(header)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    req.peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Count the call against the caller's window; `Some` holds the 429 answer
async fn enforce_rate_limit(state: &AppState, req: &HttpRequest) -> Option<HttpResponse> {
    let client = client_key(req, state.rate_limit.client_ip_header.as_deref());
    let decision = state
        .limiter
        .check(&client, state.rate_limit.max_requests, state.rate_limit.window_ms)
        .await;

    match decision {
        RateDecision::Allowed => None,
        RateDecision::Limited { retry_after_secs } => {
            tracing::info!("Rate limit exceeded for {} on {}", client, req.path());
            Some(
                HttpResponse::TooManyRequests()
                    .insert_header(("Retry-After", retry_after_secs.to_string()))
                    .json(RateLimitedResponse {
                        error: "Rate limit exceeded".to_string(),
                        message: format!("Try again in {} seconds", retry_after_secs),
                        retry_after_seconds: retry_after_secs,
                    }),
            )
        }
    }
}

fn bad_request(error: &str, message: impl Into<String>) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse {
        error: error.to_string(),
        message: message.into(),
        status_code: 400,
    })
}

async fn run_check(state: &AppState, request: CheckRequest) -> HttpResponse {
    if let Err(errors) = request.validate() {
        tracing::info!("Validation failed for check request: {}", errors);
        return bad_request("Validation failed", format!("names must hold 1 to 100 entries: {}", errors));
    }

    match state.service.check(request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => bad_request("Validation failed", e.to_string()),
    }
}

/// Check names
///
/// POST /check
///
/// Request body:
/// ```json
/// {
///   "names": ["example", "newbrand"],
///   "suffixes": ["com", "io"],
///   "filters": { "minLength": 3, "includeHyphens": false, "excludeDigits": true }
/// }
/// ```
async fn check_post(
    state: web::Data<AppState>,
    req: web::Json<CheckRequest>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Some(limited) = enforce_rate_limit(&state, &http_req).await {
        return limited;
    }

    run_check(&state, req.into_inner()).await
}

/// Check names from query parameters
///
/// GET /check?names=example,newbrand&suffixes=com&minLength=3
async fn check_get(
    state: web::Data<AppState>,
    query: web::Query<Vec<(String, String)>>,
    http_req: HttpRequest,
) -> impl Responder {
    if let Some(limited) = enforce_rate_limit(&state, &http_req).await {
        return limited;
    }

    let query = match CheckQuery::from_pairs(&query) {
        Ok(query) => query,
        Err(message) => return bad_request("Invalid query", message),
    };

    run_check(&state, query.into_request()).await
}

/// Per-suffix counts and ingestion progress
///
/// GET /stats?suffixes=com,net
async fn stats(
    state: web::Data<AppState>,
    query: web::Query<Vec<(String, String)>>,
) -> impl Responder {
    let mut suffixes: Vec<String> = query
        .iter()
        .filter(|(key, _)| matches!(key.trim_end_matches("[]"), "suffixes" | "tlds"))
        .flat_map(|(_, value)| split_list(value))
        .map(|s| s.trim_start_matches('.').to_lowercase())
        .collect();

    if suffixes.is_empty() {
        suffixes.push("com".to_string());
    }

    HttpResponse::Ok().json(state.service.stats(&suffixes).await)
}

/// Trigger a bulk ingestion run
///
/// POST /ingest
///
/// Request body (optional, defaults to the free dataset):
/// ```json
/// { "source": "free" | "paid" }
/// ```
async fn ingest(
    state: web::Data<AppState>,
    body: web::Bytes,
    http_req: HttpRequest,
) -> impl Responder {
    if let Some(limited) = enforce_rate_limit(&state, &http_req).await {
        return limited;
    }

    let request = if body.iter().all(u8::is_ascii_whitespace) {
        IngestRequest::default()
    } else {
        match serde_json::from_slice::<IngestRequest>(&body) {
            Ok(request) => request,
            Err(e) => return bad_request("Invalid ingest request", e.to_string()),
        }
    };

    let source = request.source;
    let credential = if source.requires_credential() {
        state.ingest_credential.as_deref()
    } else {
        None
    };

    let report = state.ingestor.ingest(source, credential).await;

    if report.is_success() {
        HttpResponse::Ok().json(IngestResponse {
            success: true,
            message: format!(
                "Bulk ingestion from {} completed: {} domains processed, {} errors",
                source, report.processed, report.errors
            ),
            stats: report,
        })
    } else {
        HttpResponse::InternalServerError().json(IngestResponse {
            success: false,
            message: format!(
                "Bulk ingestion from {} failed: {}",
                source,
                report.failure.as_deref().unwrap_or("unknown error")
            ),
            stats: report,
        })
    }
}
