use actix_web::{web, App, HttpServer, middleware::Logger};
use actix_cors::Cors;
use dotenv::dotenv;
use std::net::TcpListener;
use std::sync::Arc;

use green_roast::clients::suno_client::SunoClient;
use green_roast::clients::MusicGenerator;
use green_roast::config::init_config;
use green_roast::routes::{configure_routes, json_config};
use green_roast::services::{AnalysisService, HistoryStore, SongService};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // Services log through tracing; route those events to stdout as well
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        log::warn!("Tracing subscriber already installed: {}", e);
    }

    // Load application settings
    let app_settings = match init_config() {
        Ok(settings) => settings,
        Err(e) => {
            log::error!("Failed to load application settings: {}", e);
            log::error!("Cannot start server without valid settings");
            std::process::exit(1);
        }
    };

    let history_store = HistoryStore::from_config(&app_settings.history).map(Arc::new);
    match &history_store {
        Some(store) => log::info!("Recording analysis history in {}", store.path().display()),
        None => log::info!("Analysis history disabled"),
    }

    let analysis_service = match AnalysisService::from_settings(&app_settings, history_store.clone()) {
        Ok(service) => {
            log::info!("Analysis service initialized successfully");
            web::Data::new(service)
        }
        Err(e) => {
            log::error!("Failed to initialize analysis service: {}", e);
            std::process::exit(1);
        }
    };

    let song_service = match SunoClient::from_config(&app_settings.song) {
        Ok(Some(client)) => {
            log::info!("Song generation enabled (style: {})", app_settings.song.default_style);
            let generator: Arc<dyn MusicGenerator> = Arc::new(client);
            Some(web::Data::new(SongService::from_config(generator, &app_settings.song)))
        }
        Ok(None) => {
            log::warn!("SUNO_API_KEY not set; /song will answer 503");
            None
        }
        Err(e) => {
            log::error!("Failed to initialize song client: {}", e);
            std::process::exit(1);
        }
    };
    let history_data: Option<web::Data<HistoryStore>> = history_store.map(web::Data::from);

    // Get server host and port from settings
    let host = &app_settings.server.host;
    let port = app_settings.server.port;

    log::info!("Starting server at http://{}:{}", host, port);

    let server_addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(server_addr)?;
    let cors_origins = app_settings.server.cors_origins.clone();

    HttpServer::new(move || {
        // Configure CORS using actix-cors
        let mut cors = Cors::default();

        // Add allowed origins based on configuration
        if cors_origins.iter().any(|origin| origin == "*") {
            cors = cors.allow_any_origin();
        } else {
            for origin in &cors_origins {
                cors = cors.allowed_origin(origin);
            }
        }

        // Common CORS settings for all origins
        cors = cors
            .allow_any_method()
            .allow_any_header();

        let mut app = App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .app_data(json_config())
            .app_data(analysis_service.clone());

        if let Some(song_service) = &song_service {
            app = app.app_data(song_service.clone());
        }
        if let Some(history) = &history_data {
            app = app.app_data(history.clone());
        }

        app.configure(configure_routes)
    })
    .listen(listener)?
    .run()
    .await
}
