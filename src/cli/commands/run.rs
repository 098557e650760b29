//! `forager run`: wire up the agent and run it until interrupted.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::domain::models::AgentConfig;
use crate::domain::ports::{Coordinator, CredentialStore, Credentials};
use crate::infrastructure::coordinator::HttpCoordinator;
use crate::infrastructure::sandbox::ScratchSandboxFactory;
use crate::services::builtin_handlers::register_probe_handlers;
use crate::services::{
    AgentRuntime, CircuitBreaker, ExecutionDispatcher, HealthReporter, Metrics,
};

pub async fn execute(config: AgentConfig) -> Result<()> {
    if config.coordinator.token.is_empty() {
        warn!("coordinator token is empty, registration will likely be rejected");
    }

    let metrics = Arc::new(Metrics::new());
    let credentials = Arc::new(CredentialStore::new(Credentials::new(
        config.coordinator.token.clone(),
    )));
    let coordinator: Arc<dyn Coordinator> = Arc::new(HttpCoordinator::new(&config.coordinator)?);
    let breaker = Arc::new(CircuitBreaker::new(config.breaker.clone()));

    let mut dispatcher = ExecutionDispatcher::new(
        Arc::new(ScratchSandboxFactory::new()),
        config.runtime.task_timeout(),
    );
    register_probe_handlers(&mut dispatcher);
    let dispatcher = Arc::new(dispatcher);

    let runtime = AgentRuntime::new(
        config.clone(),
        Arc::clone(&coordinator),
        Arc::clone(&breaker),
        dispatcher,
        Arc::clone(&metrics),
        Arc::clone(&credentials),
    );
    let status_rx = runtime.subscribe_status();
    let active_count = runtime.active_tasks();

    let reporter = HealthReporter::new(
        config.agent_id.clone(),
        config.health.heartbeat_interval(),
        coordinator,
        breaker,
        credentials,
        metrics,
        status_rx,
        active_count,
    );

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runtime_handle = tokio::spawn(runtime.run(shutdown_rx));
    let reporter_handle = tokio::spawn(reporter.run());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for interrupt signal")?;
    info!("interrupt received, shutting down");
    let _ = shutdown_tx.send(());

    runtime_handle
        .await
        .context("runtime task panicked")??;
    reporter_handle
        .await
        .context("health reporter task panicked")?;

    Ok(())
}
