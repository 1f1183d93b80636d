use clap::Parser;
use code_runner_server::{create_app, Server, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::parse();
    config.validate()?;

    info!(
        script = %config.execute_script.display(),
        delivery = %config.delivery,
        timeout_secs = config.timeout_secs,
        max_concurrent = config.max_concurrent,
        "Code runner configured"
    );

    let app = create_app(config.build_service(), config.max_body_bytes);
    let server = Server::bind(config.addr(), app).await?;
    info!("Serving at port {}", server.local_addr()?.port());

    server.run_until(shutdown_signal()).await?;

    info!("Code runner stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
