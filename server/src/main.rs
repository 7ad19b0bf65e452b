use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use tts_core::{device::select_device, Device, PiperGenerator, SpeechGenerator};

use server::{build_router, config::ServerConfig, cors_layer, AppState};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    info!("Starting speech generation server...");

    // Environment is mutated only here, before any runtime thread exists
    let config = ServerConfig::from_env();
    config.export_env();
    info!(
        "Model cache: {} (token {})",
        config.cache_dir.display(),
        if config.hf_token.is_some() { "set" } else { "not set" }
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?
        .block_on(async_main(config))
}

async fn async_main(config: ServerConfig) -> anyhow::Result<()> {
    // Nothing is served until the model is loaded; any failure here is fatal
    let (generator, device) = tokio::task::spawn_blocking({
        let config = config.clone();
        move || load_generator(&config)
    })
    .await
    .context("model loading task failed")??;

    let state = AppState::new(generator, device);
    let app = build_router(state).layer(cors_layer(&config));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr} (device={device})");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

fn load_generator(config: &ServerConfig) -> anyhow::Result<(Arc<dyn SpeechGenerator>, Device)> {
    // Selected choice; the loaded generator reports the backend it was bound to
    let device = select_device(config.device).context("no usable compute backend")?;
    info!("Using device: {device}");

    let files = config.model_source().resolve()?;
    info!("Loading voice '{}'...", config.voice);
    let piper = PiperGenerator::load(&files, device)?;
    let bound = piper.device();
    let generator: Arc<dyn SpeechGenerator> = Arc::new(piper);

    Ok((generator, bound))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
