//! bootchain agent entry point.
//!
//! Initialises tracing, loads configuration from `BOOTCHAIN_AGENT_*`
//! environment variables, connects to the coordination store and runs the
//! bootstrap sequence for one container until shutdown.

use anyhow::{Context, Result};
use bootchain_agent::application::{AgentOptions, AgentPorts, ShutdownSignal, run_agent};
use bootchain_agent::infra::{LocalFs, SystemProbe, TokioCommandRunner};
use bootchain_common::{AgentConfig, RetryingStore, ValkeyStore};
use tracing::Instrument;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!(error = %format!("{e:#}"), "agent failed");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // 1. Initialise tracing with RUST_LOG env filter.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load configuration from BOOTCHAIN_AGENT_* env vars.
    let config: AgentConfig = envy::prefixed("BOOTCHAIN_AGENT_").from_env().context(
        "failed to load config from BOOTCHAIN_AGENT_* env vars \
         (BOOTCHAIN_AGENT_APP and BOOTCHAIN_AGENT_CONTAINER are required)",
    )?;

    let span = tracing::info_span!("agent", app = %config.app, container = %config.container);
    async move {
        tracing::info!(host = %config.host, "bootchain-agent starting");

        // 3. Connect; every operation retries through connection loss.
        let valkey = ValkeyStore::connect(&config.store_url)
            .await
            .context("failed to connect to the coordination store")?;
        let store = RetryingStore::new(valkey, config.retry_policy());

        // 4. Signals and the store's shutdown node share one latch.
        let shutdown = ShutdownSignal::new();
        tokio::spawn(forward_signals(shutdown.clone()));

        let runner = TokioCommandRunner;
        let probe = SystemProbe::new(TokioCommandRunner);
        let opts = AgentOptions {
            app: config.app.clone(),
            container: config.container.clone(),
            host: config.host.clone(),
        };
        let ports = AgentPorts {
            store: &store,
            runner: &runner,
            probe: &probe,
            files: &LocalFs,
        };

        let outcome = run_agent(ports, &opts, &shutdown).await?;
        tracing::info!(?outcome, "bootchain-agent finished");
        outcome.into_result(&config.container)?;
        Ok(())
    }
    .instrument(span)
    .await
}

/// Trip `shutdown` on SIGINT or SIGTERM.
async fn forward_signals(shutdown: ShutdownSignal) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("received shutdown signal");
    shutdown.trigger();
}
