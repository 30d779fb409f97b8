use actix_cors::Cors;
use actix_web::{error, http::StatusCode, middleware, web, App, HttpResponse, HttpServer};
use domain_availability::config::{LoggingSettings, Settings};
use domain_availability::models::DatasetSource;
use domain_availability::routes::{self, AppState};
use domain_availability::services::{
    AvailabilityChecker, AvailabilityService, BulkIngestor, CacheManager, CheckStore,
    DatasetUrls, EphemeralCache, Ip2WhoisClient, KvStore, MemoryKv, PostgresStore, RateLimiter,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

fn init_logging(logging: &LoggingSettings) {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&logging.level))
        .with_target(false)
        .with_level(true);

    if logging.is_pretty() {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

/// Run the free-dataset ingestion on a fixed interval
fn spawn_scheduled_ingestion(ingestor: Arc<BulkIngestor>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            interval.tick().await;
            info!("Running scheduled bulk ingestion");
            let report = ingestor.ingest(DatasetSource::Free, None).await;
            if report.is_success() {
                info!(
                    "Scheduled ingestion finished: {} processed, {} errors",
                    report.processed, report.errors
                );
            } else {
                warn!("Scheduled ingestion failed (non-fatal): {:?}", report.failure);
            }
        }
    });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let loaded = Settings::load();
    let logging = loaded
        .as_ref()
        .map(|settings| settings.logging.clone())
        .unwrap_or_default()
        .with_env_overrides();
    init_logging(&logging);

    info!("Starting domain availability service...");

    let settings = loaded.unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        panic!("Configuration error: {}", e);
    });

    info!("Configuration loaded successfully");

    // Ephemeral tier: Redis with an in-process L1, or in-process only when Redis is down
    let l1_size = settings.cache.l1_cache_size.unwrap_or(10_000);
    let l1_ttl = settings.cache.l1_ttl_secs.unwrap_or(30);
    let kv: Arc<dyn KvStore> = match CacheManager::new(&settings.cache.redis_url, l1_size, l1_ttl).await {
        Ok(cache) => {
            info!("Cache manager initialized (L1: {} entries, L1 TTL: {}s)", l1_size, l1_ttl);
            Arc::new(cache)
        }
        Err(e) => {
            error!("Failed to connect to Redis ({}), falling back to in-process cache", e);
            Arc::new(MemoryKv::new(l1_size))
        }
    };
    let cache = EphemeralCache::new(kv.clone());

    let store: Arc<dyn CheckStore> = Arc::new(
        PostgresStore::from_settings(
            &settings.database.url,
            settings.database.max_connections,
            settings.database.min_connections,
            settings.database.acquire_timeout_secs,
            settings.database.idle_timeout_secs,
        )
        .await
        .map_err(|e| {
            error!("Failed to connect to PostgreSQL: {}", e);
            std::io::Error::other(e.to_string())
        })?,
    );

    info!("PostgreSQL store initialized");

    let lookup = Ip2WhoisClient::new(settings.lookup.endpoint.clone(), settings.lookup.api_key.clone())
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    let checker = AvailabilityChecker::new(
        Arc::new(lookup),
        Duration::from_millis(settings.lookup.timeout_ms),
        settings.lookup.batch_size,
        Duration::from_millis(settings.lookup.batch_delay_ms),
    );

    let service = Arc::new(AvailabilityService::new(
        cache.clone(),
        store.clone(),
        checker,
        settings.tiers.clone(),
    ));

    let ingestor = Arc::new(
        BulkIngestor::new(
            store,
            cache,
            DatasetUrls {
                free: settings.ingest.free_url.clone(),
                paid: settings.ingest.paid_url.clone(),
            },
            settings.ingest.batch_size,
            settings.ingest.progress_ttl_secs,
        )
        .map_err(|e| std::io::Error::other(e.to_string()))?,
    );

    match settings.ingest.schedule_interval_secs {
        Some(secs) if secs > 0 => {
            info!("Scheduled ingestion enabled every {}s", secs);
            spawn_scheduled_ingestion(ingestor.clone(), secs);
        }
        _ => info!("Scheduled ingestion disabled"),
    }

    let app_state = AppState {
        service,
        ingestor,
        limiter: RateLimiter::new(kv),
        rate_limit: settings.rate_limit.clone(),
        ingest_credential: settings.ingest.api_key.clone(),
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
