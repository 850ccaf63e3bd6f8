//! facematch HTTP server entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;

use facematch::{
    DirectoryScratch, EmbeddingScorer, PixelEmbedder, RustfaceDetector, SimilarityScorer,
    Verifier,
};
use facematch_server::config::ServerConfig;
use facematch_server::gateway::{create_router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ServerConfig::from_env()?;
    config.validate()?;
    let addr: SocketAddr = config.socket_addr().parse()?;

    tracing::info!(
        bind_addr = %config.bind_addr,
        port = config.port,
        threshold = config.threshold,
        polarity = %config.polarity,
        "facematch starting"
    );

    let verifier = build_verifier(&config)?;
    let state = AppState::new(Arc::new(verifier), config.max_body_bytes);
    let app = create_router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("facematch shutdown complete");
    Ok(())
}

fn build_verifier(config: &ServerConfig) -> anyhow::Result<Verifier> {
    let detector_path = config
        .detector_model
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("FACEMATCH_DETECTOR_MODEL is not set"))?;
    let detector =
        RustfaceDetector::from_path(detector_path)?.min_face_size(config.min_face_size);

    let scratch = DirectoryScratch::new(&config.scratch_dir)?;
    tracing::info!(path = %config.scratch_dir.display(), "Scratch storage ready");

    Ok(Verifier::new(Arc::new(detector), build_scorer(config)?, Arc::new(scratch))
        .threshold(config.threshold)
        .polarity(config.polarity)
        .min_face_size(config.min_face_size)
        .persist_crops(config.persist_crops))
}

#[cfg(feature = "onnx")]
fn build_scorer(config: &ServerConfig) -> anyhow::Result<Arc<dyn SimilarityScorer>> {
    match &config.embedder_model {
        Some(path) => {
            let embedder = facematch::OnnxEmbedder::from_path(path)?;
            Ok(Arc::new(EmbeddingScorer::new(embedder)))
        }
        None => {
            tracing::warn!("No FACEMATCH_EMBEDDER_MODEL configured, using pixel embedder");
            Ok(Arc::new(EmbeddingScorer::new(PixelEmbedder::new())))
        }
    }
}

#[cfg(not(feature = "onnx"))]
fn build_scorer(config: &ServerConfig) -> anyhow::Result<Arc<dyn SimilarityScorer>> {
    if config.embedder_model.is_some() {
        tracing::warn!(
            "FACEMATCH_EMBEDDER_MODEL is set but this build lacks the `onnx` feature; ignoring it"
        );
    }
    Ok(Arc::new(EmbeddingScorer::new(PixelEmbedder::new())))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
