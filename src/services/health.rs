//! Periodic health reporting and shutdown observation.
//!
//! Emits a heartbeat on a fixed interval carrying the agent's status, the
//! in-flight task count, a resource snapshot, and accumulated metrics. The
//! reporter never drives control decisions; it observes the runtime's
//! status channel and exits after the final `Stopped` beat.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::domain::models::{AgentHealth, AgentStatus, Heartbeat, ResourceSnapshot};
use crate::domain::ports::{Coordinator, CredentialStore};
use crate::services::circuit_breaker::{BreakerError, CircuitBreaker};
use crate::services::metrics::Metrics;

/// Samples process-level resource usage for heartbeats.
struct ResourceSampler {
    system: System,
}

impl ResourceSampler {
    fn new() -> Self {
        let refresh = RefreshKind::new()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::everything());
        Self {
            system: System::new_with_specifics(refresh),
        }
    }

    fn sample(&mut self) -> ResourceSnapshot {
        self.system.refresh_cpu();
        self.system.refresh_memory();
        ResourceSnapshot {
            cpu_percent: self.system.global_cpu_info().cpu_usage(),
            memory_mb: self.system.used_memory() / (1024 * 1024),
        }
    }
}

/// Emits liveness heartbeats through the shared coordinator breaker.
pub struct HealthReporter {
    agent_id: String,
    interval: Duration,
    coordinator: Arc<dyn Coordinator>,
    breaker: Arc<CircuitBreaker>,
    credentials: Arc<CredentialStore>,
    metrics: Arc<Metrics>,
    status_rx: watch::Receiver<AgentStatus>,
    active_count: Arc<AtomicUsize>,
    sampler: ResourceSampler,
}

impl HealthReporter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent_id: impl Into<String>,
        interval: Duration,
        coordinator: Arc<dyn Coordinator>,
        breaker: Arc<CircuitBreaker>,
        credentials: Arc<CredentialStore>,
        metrics: Arc<Metrics>,
        status_rx: watch::Receiver<AgentStatus>,
        active_count: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            interval,
            coordinator,
            breaker,
            credentials,
            metrics,
            status_rx,
            active_count,
            sampler: ResourceSampler::new(),
        }
    }

    /// Build the current heartbeat payload.
    pub fn snapshot(&mut self) -> Heartbeat {
        let status = *self.status_rx.borrow();
        Heartbeat {
            agent_id: self.agent_id.clone(),
            health: AgentHealth {
                status,
                last_heartbeat_at: Utc::now(),
                active_task_count: self.active_count.load(Ordering::SeqCst),
                resources: self.sampler.sample(),
            },
            metrics: self.metrics.snapshot(),
        }
    }

    /// Heartbeat loop. Exits after emitting a final beat once the runtime
    /// publishes `Stopped`.
    pub async fn run(mut self) {
        let mut status_rx = self.status_rx.clone();
        let mut beat = tokio::time::interval(self.interval);
        beat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            agent_id = %self.agent_id,
            interval_secs = self.interval.as_secs(),
            "health reporter started"
        );

        loop {
            tokio::select! {
                _ = beat.tick() => {
                    self.emit().await;
                }
                changed = status_rx.changed() => {
                    if changed.is_err() {
                        // Runtime dropped its status channel; nothing left
                        // to observe.
                        break;
                    }
                    let status = *status_rx.borrow_and_update();
                    debug!(status = %status, "agent status changed");
                    if status == AgentStatus::Stopped {
                        self.emit().await;
                        break;
                    }
                }
            }
        }

        info!("health reporter stopped");
    }

    async fn emit(&mut self) {
        let Some(creds) = self.credentials.get() else {
            debug!("skipping heartbeat, no credentials");
            return;
        };
        let heartbeat = self.snapshot();
        let coordinator = Arc::clone(&self.coordinator);

        match self
            .breaker
            .execute(|| coordinator.send_heartbeat(&heartbeat, &creds))
            .await
        {
            Ok(()) => {
                debug!(
                    status = %heartbeat.health.status,
                    active = heartbeat.health.active_task_count,
                    "heartbeat sent"
                );
            }
            Err(BreakerError::Open { .. }) => {
                debug!("coordinator circuit open, skipping heartbeat");
            }
            Err(BreakerError::Inner(e)) => {
                warn!(error = %e, "heartbeat delivery failed");
            }
        }
    }
}
