//! Serve command - starts the HTTP relay server.

use crate::config::Config;
use crate::server::{app_router, AppState};
use anyhow::Result;

/// Execute the serve command
pub async fn execute(host: &str, port: u16) -> Result<()> {
    let config = Config::load().await?;
    let state = AppState::from_config(&config);
    let router = app_router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    println!("Listening on http://{}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await?;

    Ok(())
}
