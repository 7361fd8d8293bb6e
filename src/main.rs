//! Server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use contact_mailer::config::{AppConfig, DeliveryConfig};
use contact_mailer::dispatch::MailDispatcher;
use contact_mailer::journal::Journal;
use contact_mailer::server::{self, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let app_config = AppConfig::from_env()?;

    // Fail closed on incomplete delivery settings: the server still
    // serves the endpoint but refuses every submission until restarted
    // with a complete environment.
    let dispatcher = match DeliveryConfig::from_env() {
        Ok(delivery) => Some(Arc::new(MailDispatcher::new(delivery, app_config.transport)?)),
        Err(err) => {
            tracing::error!(error = %err, "delivery not configured; submissions will be refused");
            None
        }
    };

    let journal = Arc::new(Journal::new(
        app_config.journal_path.clone(),
        app_config.log_personal_data,
    ));

    let app = server::router(AppState { dispatcher, journal }, &app_config)?;
    let listener = tokio::net::TcpListener::bind(app_config.bind_addr).await?;
    tracing::info!(addr = %app_config.bind_addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
