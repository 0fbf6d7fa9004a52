mod bus;
mod config;
mod error;
mod gates;
mod pipeline;
mod provider;
mod stats;
mod types;

use bus::MqttBus;
use config::Config;
use pipeline::Pipeline;
use provider::{EchoProvider, HttpChatProvider, TranslationProvider};
use stats::Stats;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .init();

    tracing::info!(translator_name = %config.translator_name, "starting flicker-relay");

    let provider: Arc<dyn TranslationProvider> = match config.translation_provider.as_str() {
        "echo" => Arc::new(EchoProvider),
        "http" => Arc::new(HttpChatProvider::new(
            config.translategemma_endpoint.clone(),
            config.translategemma_model.clone(),
            config.translategemma_max_tokens,
        )),
        other => {
            tracing::warn!(provider = other, "unknown translation provider, falling back to echo");
            Arc::new(EchoProvider)
        }
    };

    let languages: Vec<&str> = config::EU_LANGUAGES.to_vec();
    let (bus, eventloop) = MqttBus::new(&config, &languages);
    let bus = Arc::new(bus);

    let stats = Stats::new();
    let pipeline = Pipeline::new(&config, provider, bus.clone(), stats.clone());
    let stats_handle = stats::spawn_reporter(stats);

    let bus_for_run = bus.clone();
    let pipeline_for_run = pipeline.clone();
    let run_handle = tokio::spawn(async move { bus_for_run.run(eventloop, pipeline_for_run).await });

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received, draining pipeline");

    pipeline.stop().await;
    // The event loop task must still be polling to drain the client's
    // internal request channel, so publish the offline status and
    // disconnect before aborting it.
    bus.shutdown().await;
    run_handle.abort();
    stats_handle.abort();

    tracing::info!("flicker-relay stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
