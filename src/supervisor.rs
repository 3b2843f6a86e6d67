//! Keeps a long-lived event channel connected.
//!
//! ```text
//! Disconnected -> Connecting(1) -> Running
//!                      |              |  transport error
//!                      v              v
//!                 Backoff(n) <--------+
//!                      |  delay
//!                      v
//!                 Connecting(n+1) -> Running | Backoff(n+1)
//! ```
//!
//! Every (re)connect sends the full subscription again before entering
//! `Running`. The supervisor never gives up on its own: `Stopped` is only
//! reached through [`SupervisorHandle::stop`].

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::{
    config::{BackoffConfig, EslConfig},
    error::EslError,
    event::Subscription,
    events::EventChannel,
    handler::HandlerRegistry,
};

/// Observable supervisor state
#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorState {
    Disconnected,
    /// Dialing, authenticating and subscribing; `attempt` counts from 1
    Connecting { attempt: u32 },
    /// Subscribed and dispatching events
    Running,
    /// Waiting `delay` after failed attempt number `attempt`
    Backoff { attempt: u32, delay: Duration },
    Stopped,
}

/// Delay before reconnect attempts: fixed or capped exponential.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    initial: Duration,
    max: Duration,
    multiplier: f64,
}

impl BackoffPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            multiplier: 1.0,
        }
    }

    /// `initial * multiplier^(attempt-1)`, never above `max`.
    /// Multipliers below 1.0 are treated as 1.0.
    pub fn exponential(initial: Duration, max: Duration, multiplier: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            multiplier: if multiplier.is_finite() {
                multiplier.max(1.0)
            } else {
                1.0
            },
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::exponential(
            Duration::from_millis(config.initial_ms),
            Duration::from_millis(config.max_ms),
            config.multiplier,
        )
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(scaled)
    }
}

/// Owns the event channel's connection lifecycle.
pub struct Supervisor {
    config: Arc<EslConfig>,
    subscription: Subscription,
    registry: HandlerRegistry,
    policy: BackoffPolicy,
}

impl Supervisor {
    /// Backoff comes from `config.backoff`; see [`Supervisor::with_backoff`].
    pub fn new(config: Arc<EslConfig>, subscription: Subscription, registry: HandlerRegistry) -> Self {
        let policy = BackoffPolicy::from_config(&config.backoff);
        Self {
            config,
            subscription,
            registry,
            policy,
        }
    }

    pub fn with_backoff(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Start the supervision loop on the current tokio runtime.
    pub fn spawn(self) -> SupervisorHandle {
        let (state_tx, state_rx) = watch::channel(SupervisorState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let registry = self
            .registry
            .clone();
        let task = tokio::spawn(self.run(state_tx, shutdown_rx));
        SupervisorHandle {
            state: state_rx,
            shutdown: shutdown_tx,
            registry,
            task,
        }
    }

    async fn run(self, state: watch::Sender<SupervisorState>, mut shutdown: watch::Receiver<bool>) {
        let mut attempt: u32 = 0;
        loop {
            state.send_replace(SupervisorState::Connecting {
                attempt: attempt + 1,
            });
            let connected = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                result = EventChannel::connect(
                    &self.config,
                    self.subscription.clone(),
                    self.registry.clone(),
                ) => result,
            };

            match connected {
                Ok(channel) => {
                    attempt = 0;
                    state.send_replace(SupervisorState::Running);
                    info!("Event channel running with subscription: {}", self.subscription);
                    let lost = tokio::select! {
                        _ = shutdown_requested(&mut shutdown) => break,
                        cause = channel.run() => cause,
                    };
                    warn!("Event channel lost: {}", lost);
                }
                Err(e @ EslError::AuthenticationFailed { .. }) => {
                    error!("Event channel cannot authenticate, will keep retrying: {}", e);
                }
                Err(e) => warn!("Event channel connect failed: {}", e),
            }

            attempt = attempt.saturating_add(1);
            let delay = self
                .policy
                .delay(attempt);
            warn!("Reconnecting event channel in {:?} (attempt {})", delay, attempt);
            state.send_replace(SupervisorState::Backoff { attempt, delay });
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Event supervisor stopped");
        state.send_replace(SupervisorState::Stopped);
    }
}

/// Resolves once `stop()` was requested. If the handle is dropped instead,
/// never resolves: the supervisor keeps running detached.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown
            .changed()
            .await
            .is_err()
        {
            std::future::pending::<()>().await;
        }
    }
}

/// Handle to a spawned [`Supervisor`].
pub struct SupervisorHandle {
    state: watch::Receiver<SupervisorState>,
    shutdown: watch::Sender<bool>,
    registry: HandlerRegistry,
    task: JoinHandle<()>,
}

impl SupervisorHandle {
    pub fn state(&self) -> SupervisorState {
        self.state
            .borrow()
            .clone()
    }

    /// Receiver notified on every state transition
    pub fn watch_state(&self) -> watch::Receiver<SupervisorState> {
        self.state
            .clone()
    }

    /// Registry the supervised channel dispatches to; handlers added here
    /// apply from the next event on.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Request shutdown and wait for the loop to reach `Stopped`.
    pub async fn stop(self) {
        let _ = self
            .shutdown
            .send(true);
        if let Err(e) = self.task.await {
            error!("Event supervisor task failed: {}", e);
        }
    }
}
