use spudnig::adapters::local::{http, TokioProcessLauncher, TracingProgressSink};
use spudnig::domain::transcode::OutputTranscoder;
use spudnig::{AppConfig, JobOrchestrator};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let transcoder = match OutputTranscoder::load(&config.template, &config.author).await {
        Ok(transcoder) => transcoder,
        Err(e) => {
            tracing::error!(template = %config.template.display(), "Failed to load annotation template: {}", e);
            std::process::exit(1);
        }
    };

    let orchestrator = Arc::new(JobOrchestrator::new(
        TokioProcessLauncher::new(),
        config.orchestrator_settings(),
        transcoder,
        Arc::new(TracingProgressSink::new()),
    ));

    let app = http::router(orchestrator.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .expect("Failed to bind TCP listener");
    tracing::info!(
        output_dir = %config.output_dir.display(),
        "Listening at {}",
        config.bind_address()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl-c: {}", e);
            }
        })
        .await
        .expect("Server failed to start");

    orchestrator.shutdown().await;
}
