use actix_web::{Scope, web};

use editlock_api::{HEALTH_PATH, LOCKS_PATH};

use super::lock;
use crate::model::response::{json_error_handler, query_error_handler};

pub fn routes() -> Scope {
    web::scope(LOCKS_PATH)
        .route("", web::get().to(lock::list))
        .route("/acquire", web::post().to(lock::acquire))
        .route("/renew", web::post().to(lock::renew))
        .route("/release", web::post().to(lock::release))
        .route("/status", web::get().to(lock::status))
        .route("/settings", web::get().to(lock::settings))
}

/// Register extractor error handlers plus every lock and health route
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .service(routes())
        .route(HEALTH_PATH, web::get().to(lock::health));
}
