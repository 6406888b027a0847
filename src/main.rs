use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

mod api;
mod cache;
mod config;
mod constants;
mod controller;
mod handlers;
mod models;
mod nfc;
mod utils;
mod view;

use api::ApiClient;
use cache::TagCache;
use config::Config;
use controller::{ControllerConfig, TagController};
use handlers::station::{self, AppState, VERSION};
use nfc::NfcBridge;

#[tokio::main]
async fn main() {
    // Initialize tracing with environment-based filtering
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            "tag_station=info,tower_http=warn".to_string()
        } else {
            "tag_station=warn,tower_http=error".to_string()
        }
    });

    std::env::set_var("RUST_LOG", &log_level);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("🚀 Starting Tag Station v{}", VERSION);

    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::from_env().expect("Failed to load configuration");

    info!(
        "Server configured to run on {}:{}",
        config.server_host, config.server_port
    );
    info!("CORS origins: {}", config.cors_origins);
    info!("Display timezone: {}", config.display_tz);
    match config.cache_ttl {
        Some(ttl) => info!("Tag cache TTL: {}s", ttl.as_secs()),
        None => info!("Tag cache TTL: disabled (refresh on demand only)"),
    }

    let api = ApiClient::new(config.api_url.clone(), config.http_timeout)
        .expect("Failed to build the tag service client");
    let controller = TagController::new(
        api,
        TagCache::new(config.cache_ttl),
        ControllerConfig {
            offer_deregister: config.offer_deregister,
            close_after_save: config.close_after_save,
        },
    );

    // No reader driver is compiled into this build; a station with
    // hardware hands its ReaderPort in here and the buttons light up.
    let bridge = NfcBridge::new(None, config.nfc_read_timeout);
    if bridge.available() {
        info!("✅ NFC reader attached");
    } else {
        warn!("⚠️  No NFC reader in this build; NFC buttons are disabled");
    }

    let state = AppState {
        controller: Arc::new(Mutex::new(controller)),
        nfc: Arc::new(bridge),
        display_tz: config.display_tz,
    };

    let cors = if config.cors_origins == "*" {
        warn!("⚠️  CORS is configured with wildcard (*) - this is only acceptable for development!");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        info!("🔒 CORS configured for specific origins: {}", config.cors_origins);
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();

        if origins.is_empty() {
            warn!("⚠️  No valid CORS origins found in CORS_ORIGINS, falling back to localhost only");
            CorsLayer::new()
                .allow_origin("http://localhost:4410".parse::<HeaderValue>().unwrap())
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
        } else {
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE])
        }
    };

    let app = station::create_station_routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&format!(
        "{}:{}",
        config.server_host, config.server_port
    ))
    .await
    .expect("Failed to bind to address");

    info!(
        "🎯 Tag Station started successfully on http://{}:{}",
        config.server_host, config.server_port
    );
    info!(
        "🔧 JSON endpoints available at http://{}:{}/api/",
        config.server_host, config.server_port
    );

    axum::serve(listener, app)
        .await
        .expect("Server failed to start");
}
