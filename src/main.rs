use axum::http::{header, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::CorsLayer;

use timetable_ga::config::AppConfig;
use timetable_ga::error::TimetableError;
use timetable_ga::{router, AppState};

#[tokio::main]
async fn main() -> Result<(), TimetableError> {
    env_logger::init();

    let config = AppConfig::from_env()?;
    let addr = config.server.socket_addr()?;
    let origin = config
        .server
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|_| TimetableError::InvalidAddress(config.server.allowed_origin.clone()))?;

    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let app = router(AppState::new(config)).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Server running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
