use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hash_service::{Application, Cli, Config, metrics};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting Hash Service v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from(Cli::load());
    info!(
        port = config.listen_port,
        delay_secs = config.processing_delay_secs,
        "Configuration loaded"
    );

    let mut app = Application::new(config);
    if let Some(handle) = metrics::try_init_metrics() {
        app = app.with_metrics(handle);
    }

    match app.start().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Server exited with error");
            ExitCode::FAILURE
        }
    }
}
