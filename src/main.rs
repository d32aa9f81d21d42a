//! Service binary: `CONFIG_PATH` (default `config/default.json`), `BIND_ADDR` (default `0.0.0.0:8000`).

use crossdb_admin::{apply_env_overrides, initialize, load_from_path, with_method_override};
use std::net::SocketAddr;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("crossdb_admin=info,tower_http=info")),
        )
        .init();

    let config_path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.json".into());
    let mut config = match load_from_path(&config_path).await {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            return Err(e.into());
        }
    };
    apply_env_overrides(&mut config);

    let app = match initialize(config).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "startup failed");
            return Err(e.into());
        }
    };
    let service = with_method_override(app.router);

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".into());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!("listening on http://{}", listener.local_addr()?);
    axum::serve(listener, service.into_make_service_with_connect_info::<SocketAddr>()).await?;
    app.state.databases.close().await;
    Ok(())
}
