//! The agent's bootstrap sequence for one container.
//!
//! 1. Read the published application description and pick this container.
//! 2. Publish this container's descriptor and `not_running`.
//! 3. Wait until every dependency's descriptor is processed, then resolve
//!    the environment and substitute configuration files.
//! 4. Wait until every dependency is initialized.
//! 5. Run the process group, publishing `running` and `initialized`.
//! 6. Supervise until shutdown is requested or main exits.
//! 7. Run the stop sequence, restore files, and withdraw this container's
//!    nodes after a clean shutdown.
//!
//! A dependency reaching `failed`, or this container's group aborting,
//! publishes `failed` and leaves the nodes in place for `bootchain status`.

use anyhow::{Context, Result};
use bootchain_common::{
    AppDescription, CoordinationStore, Descriptor, RunStatus, StoreError, store_keys,
};
use tokio::task::JoinHandle;

use crate::application::executor::ProcessGroupExecutor;
use crate::application::files::{self, SubstitutedFiles};
use crate::application::ports::{
    CommandRunner, ConfigFiles, Exit, ReadinessProbe, StatusSink,
};
use crate::application::shutdown::ShutdownSignal;
use crate::application::tracker::{ReadinessTracker, WaitOutcome};
use crate::domain::{AgentError, EnvironmentMap, resolve};

/// Identity of the container this agent runs.
#[derive(Debug, Clone)]
pub struct AgentOptions {
    pub app: String,
    pub container: String,
    pub host: String,
}

/// The ports the bootstrap sequence drives.
pub struct AgentPorts<'a, S, R, P, F> {
    pub store: &'a S,
    pub runner: &'a R,
    pub probe: &'a P,
    pub files: &'a F,
}

/// How an agent run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentOutcome {
    /// Shutdown after the group started; everything was stopped cleanly.
    Stopped,
    /// Shutdown arrived while still waiting for dependencies.
    ShutdownBeforeStart,
    DependencyFailed(String),
    GroupFailed,
    MainExited(Exit),
}

impl AgentOutcome {
    /// Map failure outcomes to the error `main` reports.
    pub fn into_result(self, container: &str) -> Result<(), AgentError> {
        match self {
            Self::Stopped | Self::ShutdownBeforeStart => Ok(()),
            Self::DependencyFailed(dependency) => Err(AgentError::DependencyFailed(dependency)),
            Self::GroupFailed => Err(AgentError::GroupFailed(container.to_string())),
            Self::MainExited(_) => Err(AgentError::MainExited(container.to_string())),
        }
    }
}

/// Publishes run state to this container's status node.
pub struct StoreStatusSink<'a, S> {
    store: &'a S,
    path: String,
}

impl<'a, S: CoordinationStore> StoreStatusSink<'a, S> {
    pub fn new(store: &'a S, app: &str, container: &str) -> Self {
        Self {
            store,
            path: store_keys::status_path(app, container),
        }
    }
}

impl<S: CoordinationStore> StatusSink for StoreStatusSink<'_, S> {
    async fn publish(&self, status: RunStatus) -> Result<()> {
        self.store
            .upsert(&self.path, status.as_str().as_bytes())
            .await
            .with_context(|| format!("publishing run state {status}"))?;
        tracing::info!(%status, "run state published");
        Ok(())
    }
}

/// Aborts the wrapped task when dropped.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Run the full bootstrap sequence until shutdown or failure.
pub async fn run_agent<S, R, P, F>(
    ports: AgentPorts<'_, S, R, P, F>,
    opts: &AgentOptions,
    shutdown: &ShutdownSignal,
) -> Result<AgentOutcome>
where
    S: CoordinationStore,
    R: CommandRunner,
    P: ReadinessProbe,
    F: ConfigFiles,
{
    let AgentPorts {
        store,
        runner,
        probe,
        files: fs,
    } = ports;

    // ── Description ──────────────────────────────────────────────────────────
    let raw = store
        .read_optional(&store_keys::description_path(&opts.app))
        .await
        .context("reading application description")?
        .ok_or_else(|| AgentError::NotDeployed(opts.app.clone()))?;
    let description =
        AppDescription::from_json_slice(&raw).context("parsing application description")?;
    let spec = description
        .container(&opts.container)
        .cloned()
        .ok_or_else(|| AgentError::UnknownContainer {
            app: opts.app.clone(),
            container: opts.container.clone(),
        })?;
    tracing::info!(kind = %spec.kind, requires = ?spec.requires, "container selected");

    // ── Publication ──────────────────────────────────────────────────────────
    let status = StoreStatusSink::new(store, &opts.app, &opts.container);
    let descriptor = Descriptor::new(spec.clone(), &opts.host)
        .to_json()
        .context("encoding descriptor")?;
    store
        .upsert(
            &store_keys::descriptor_path(&opts.app, &opts.container),
            &descriptor,
        )
        .await
        .context("publishing descriptor")?;
    status.publish(RunStatus::NotRunning).await?;

    let _shutdown_watch = watch_shutdown_node(store, &opts.app, shutdown).await?;
    let tracker = ReadinessTracker::start(store, &opts.app, &spec.requires).await?;

    // ── Configuration ────────────────────────────────────────────────────────
    match tracker.wait_processed(shutdown).await {
        WaitOutcome::Ready => {}
        WaitOutcome::DependencyFailed(dependency) => {
            return fail_before_start(&status, dependency, SubstitutedFiles::default(), fs).await;
        }
        WaitOutcome::ShutdownRequested => {
            withdraw(store, opts).await;
            return Ok(AgentOutcome::ShutdownBeforeStart);
        }
    }

    let snapshot = tracker.snapshot();
    let resolution = resolve(&spec, &snapshot.dependency_specs());
    for unresolved in &resolution.unresolved {
        tracing::warn!(alias = %unresolved.alias, target = %unresolved.target, "alias target not found, skipped");
    }
    let env = resolution.env.overlaid_with(&base_environment(opts));
    tracing::info!(variables = env.len(), "environment resolved");

    let substituted = match files::apply(fs, &spec.files, &env) {
        Ok(substituted) => substituted,
        Err(e) => {
            publish_failed(&status).await;
            return Err(e);
        }
    };

    // ── Start ────────────────────────────────────────────────────────────────
    match tracker.wait_initialized(shutdown).await {
        WaitOutcome::Ready => {}
        WaitOutcome::DependencyFailed(dependency) => {
            return fail_before_start(&status, dependency, substituted, fs).await;
        }
        WaitOutcome::ShutdownRequested => {
            restore(substituted, fs);
            withdraw(store, opts).await;
            return Ok(AgentOutcome::ShutdownBeforeStart);
        }
    }
    tracing::info!("dependencies initialized, starting process group");

    let mut executor = ProcessGroupExecutor::new(runner, probe, &spec, env);
    let started = match executor.run_group(&status).await {
        Ok(started) => started,
        Err(e) => {
            publish_failed(&status).await;
            executor.stop().await;
            restore(substituted, fs);
            return Err(e);
        }
    };
    if !started {
        publish_failed(&status).await;
        executor.stop().await;
        restore(substituted, fs);
        return Ok(AgentOutcome::GroupFailed);
    }

    // ── Supervision ──────────────────────────────────────────────────────────
    let outcome = tokio::select! {
        () = shutdown.wait() => AgentOutcome::Stopped,
        exit = executor.wait_main_exit() => {
            tracing::error!(%exit, "main process exited");
            AgentOutcome::MainExited(exit)
        }
    };
    if outcome != AgentOutcome::Stopped {
        publish_failed(&status).await;
    }

    tracing::info!("stopping process group");
    executor.stop().await;
    restore(substituted, fs);
    if outcome == AgentOutcome::Stopped {
        withdraw(store, opts).await;
    }
    Ok(outcome)
}

/// Variables every command sees, on top of the resolved environment.
fn base_environment(opts: &AgentOptions) -> EnvironmentMap {
    [
        ("BOOTCHAIN_APP", opts.app.as_str()),
        ("BOOTCHAIN_CONTAINER", opts.container.as_str()),
    ]
    .into_iter()
    .collect()
}

/// Trip `shutdown` once the application's shutdown node exists.
async fn watch_shutdown_node(
    store: &impl CoordinationStore,
    app: &str,
    shutdown: &ShutdownSignal,
) -> Result<AbortOnDrop> {
    let path = store_keys::shutdown_path(app);
    let mut watch = store
        .watch(&path)
        .await
        .context("watching shutdown node")?;
    if store.read_optional(&path).await?.is_some() && shutdown.trigger() {
        tracing::info!("shutdown already requested");
    }
    let shutdown = shutdown.clone();
    Ok(AbortOnDrop(tokio::spawn(async move {
        while let Some(event) = watch.next().await {
            if event.data().is_some() {
                if shutdown.trigger() {
                    tracing::info!("shutdown requested through the store");
                }
                break;
            }
        }
    })))
}

async fn fail_before_start(
    status: &impl StatusSink,
    dependency: String,
    substituted: SubstitutedFiles,
    fs: &impl ConfigFiles,
) -> Result<AgentOutcome> {
    tracing::error!(%dependency, "dependency failed, not starting");
    publish_failed(status).await;
    restore(substituted, fs);
    Ok(AgentOutcome::DependencyFailed(dependency))
}

async fn publish_failed(status: &impl StatusSink) {
    if let Err(e) = status.publish(RunStatus::Failed).await {
        tracing::error!(error = %format!("{e:#}"), "cannot publish failed run state");
    }
}

fn restore(substituted: SubstitutedFiles, fs: &impl ConfigFiles) {
    let pending = substituted.pending_restores();
    if pending > 0 {
        tracing::info!(files = pending, "restoring configuration files");
    }
    if let Err(e) = substituted.restore(fs) {
        tracing::warn!(error = %format!("{e:#}"), "file restore incomplete");
    }
}

/// Delete this container's status and descriptor nodes.
async fn withdraw(store: &impl CoordinationStore, opts: &AgentOptions) {
    let paths = [
        store_keys::status_path(&opts.app, &opts.container),
        store_keys::descriptor_path(&opts.app, &opts.container),
    ];
    for path in paths {
        match store.delete(&path).await {
            Ok(()) | Err(StoreError::NoNode(_)) => {}
            Err(e) => tracing::warn!(%path, error = %e, "cannot withdraw node"),
        }
    }
}
