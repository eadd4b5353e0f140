use axum::routing::post;
use axum::Router;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use nl2sql_engine::config::Config;
use nl2sql_engine::{handlers, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    tracing_subscriber::registry().with(log_filter).with(tracing_subscriber::fmt::layer()).init();

    tracing::info!("nl2sql-engine starting up");
    tracing::info!("configuration loaded successfully");

    let app_state = AppState::build(&config).await?;
    tracing::info!("pipeline services initialized");

    let health_routes = Router::new().route("/health", axum::routing::get(health_check)).route("/ready", axum::routing::get(ready_check));

    let api_routes = Router::new()
        .route("/api/query", post(handlers::query::run_query))
        .route("/api/query/describe", post(handlers::describe::describe_result))
        .with_state(app_state);

    let app = Router::new()
        .merge(health_routes)
        .merge(api_routes)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ready_check() -> &'static str {
    "READY"
}
