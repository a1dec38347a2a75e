use std::net::SocketAddr;

use mongodb::Client;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use cryptowatch::{config, routes, services::db_init, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::load();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Mongo connection
    let client = Client::with_uri_str(&settings.mongodb_uri).await?;
    let db = client.database(&settings.mongodb_db);

    if let Err(e) = db_init::ensure_indexes(&db).await {
        tracing::warn!(error = %e, "could not ensure indexes");
    }

    let state = AppState::build(settings.clone(), db)?;

    if settings.alert_monitor_autostart {
        state.monitor.start();
    } else {
        tracing::info!("alert monitor autostart disabled; start it via POST /api/monitor/alerts");
    }

    if !state.telegram.is_configured() {
        tracing::warn!("TELEGRAM_BOT_TOKEN is not set; alert notifications will fail");
    }

    let monitor = state.monitor.clone();
    let app = routes::app(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from((settings.host.parse::<std::net::IpAddr>()?, settings.port));
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    monitor.stop();
    Ok(())
}
