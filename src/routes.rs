use actix_web::web;
use crate::error::AppError;
use crate::handlers;

/// Registers every public endpoint. Services are injected by the caller as app data.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/health")
            .route(web::get().to(handlers::health::health_check))
    );

    cfg.service(handlers::analyze_handlers::analyze_prompt)
        .service(handlers::song_handlers::generate_song)
        .service(handlers::history_handlers::get_history);
}

/// Malformed or oversized JSON bodies come back as a 400 with the usual error body
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(256 * 1024)
        .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into())
}
