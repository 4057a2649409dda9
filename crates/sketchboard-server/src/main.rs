use sketchboard_server::{ServerConfig, ServerError};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sketchboard_server=info,tower_http=info".into()),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let app = sketchboard_server::app(&config);

    info!("Sketchboard relay server listening on {}", config.bind_addr);
    info!(
        "WebSocket endpoint: ws://{}/ws?room=<name> (default room: {})",
        config.bind_addr, config.default_room
    );
    info!("Room state is kept in memory only and is lost when the server stops");

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
