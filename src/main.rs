//! # Chat System
//!
//! Chat and message ingestion service.
//!
//! This is the application entry point that initializes:
//! - Tracing/logging subsystem
//! - Configuration loading
//! - PostgreSQL, Redis and search store clients
//! - Background dispatcher and reconciler
//! - HTTP server

use anyhow::Result;
use tracing::info;

use chat_system::config::Settings;
use chat_system::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    chat_system::telemetry::init_tracing();

    info!("Starting Chat System...");

    let settings = Settings::load()?;
    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        write_serialization = ?settings.worker.write_serialization,
        max_in_flight = settings.worker.max_in_flight,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    info!("Shutdown complete");
    Ok(())
}
