// Route exports
pub mod domains;

use actix_web::web;

pub use domains::AppState;

/// Mount every route at the root and again under `/api`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(domains::configure)
        .service(web::scope("/api").configure(domains::configure));
}
