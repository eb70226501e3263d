// src/main.rs
mod config;
mod db;
mod error;
mod handlers;
mod models;
mod poll;
mod routes;

use std::time::Duration;

use axum::{extract::Request, ServiceExt};
use axum_server::Handle;
use http::{header::CONTENT_TYPE, HeaderValue, Method};
use tokio::signal;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::Config;
use error::{AppError, AppResult};

const DEFAULT_LOG_FILTER: &str = "polls_backend=info,tower_http=info";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok(); // Load environment variables from .env file

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run().await {
        error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config = Config::load()?;
    let addr = config.socket_addr()?;

    let pool = db::create_pool(&config).await?;

    let router = routes::create_routes(pool.clone())
        .layer(cors_layer(&config)?)
        .layer(TraceLayer::new_for_http());
    let app = routes::trim_trailing_slash(router);

    let handle = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone()));

    info!("Server running on {addr}");
    axum_server::bind(addr)
        .handle(handle)
        .serve(ServiceExt::<Request>::into_make_service(app))
        .await?;

    pool.close().await;
    info!("Server stopped");
    Ok(())
}

fn cors_layer(config: &Config) -> AppResult<CorsLayer> {
    let origin = match &config.cors_origin {
        Some(origin) => {
            let value = origin
                .parse::<HeaderValue>()
                .map_err(|e| AppError::Config(format!("invalid CORS_ORIGIN {origin:?}: {e}")))?;
            AllowOrigin::exact(value)
        }
        None => AllowOrigin::any(),
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60)))
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    handle.graceful_shutdown(Some(Duration::from_secs(10)));
}
