//! High-level client: the command and event surface other services use

use std::sync::Arc;
use std::time::Duration;

use crate::{
    command::CommandChannel,
    commands::{ApiCommand, ReloadAcl, ReloadXml, Rescan, Sofia, SofiaProfile, Status},
    config::EslConfig,
    error::EslResult,
    event::{EslEvent, Subscription},
    handler::{HandlerRegistry, HandlerResult},
    supervisor::{Supervisor, SupervisorHandle},
};

/// FreeSWITCH control-plane client.
///
/// Commands run on short-lived connections, so any number of tasks can
/// call into a shared (cloned) client at once. Event subscriptions run on
/// their own supervised connection.
#[derive(Clone)]
pub struct EslClient {
    config: Arc<EslConfig>,
    commands: CommandChannel,
}

impl EslClient {
    pub fn new(config: EslConfig) -> Self {
        let config = Arc::new(config);
        Self {
            commands: CommandChannel::new(config.clone()),
            config,
        }
    }

    pub fn config(&self) -> &EslConfig {
        &self.config
    }

    /// Run an arbitrary `api` command and return the response body.
    pub async fn execute_command(&self, command: &str) -> EslResult<String> {
        self.commands
            .execute(command)
            .await
    }

    /// Like [`EslClient::execute_command`] with an explicit deadline.
    pub async fn execute_command_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> EslResult<String> {
        self.commands
            .execute_with_timeout(command, timeout)
            .await
    }

    /// Run a typed command builder.
    pub async fn run<C>(&self, command: &C) -> EslResult<String>
    where
        C: ApiCommand + ?Sized,
    {
        self.commands
            .run(command)
            .await
    }

    pub async fn reload_xml(&self) -> EslResult<String> {
        self.run(&ReloadXml)
            .await
    }

    pub async fn reload_acl(&self) -> EslResult<String> {
        self.run(&ReloadAcl)
            .await
    }

    pub async fn rescan(&self) -> EslResult<String> {
        self.run(&Rescan)
            .await
    }

    pub async fn status(&self) -> EslResult<String> {
        self.run(&Status)
            .await
    }

    /// `sofia <profile> <command>`
    pub async fn sofia(&self, profile: &str, command: &str) -> EslResult<String> {
        self.run(&Sofia {
            profile: profile.to_string(),
            command: command.to_string(),
        })
        .await
    }

    pub async fn sofia_profile_restart(&self, profile: &str) -> EslResult<String> {
        self.run(&SofiaProfile::restart(profile))
            .await
    }

    pub async fn sofia_profile_rescan(&self, profile: &str) -> EslResult<String> {
        self.run(&SofiaProfile::rescan(profile))
            .await
    }

    /// Drop a gateway from the `external` profile so the next rescan
    /// re-reads its definition.
    pub async fn kill_gateway(&self, gateway: &str) -> EslResult<String> {
        self.run(&SofiaProfile::kill_gateway("external", gateway))
            .await
    }

    /// Subscribe to `names` and call `handler` for each event, reconnecting
    /// as needed until the returned handle is stopped.
    pub fn subscribe_events<I, S, F>(&self, names: I, handler: F) -> EslResult<SupervisorHandle>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: Fn(&EslEvent) -> HandlerResult + Send + Sync + 'static,
    {
        let subscription = Subscription::new(names)?;
        let registry = HandlerRegistry::new();
        registry.on_any(handler);
        Ok(self.supervise(subscription, registry))
    }

    /// Subscribe to the configured `events` set, dispatching to `registry`.
    pub fn subscribe_configured(&self, registry: HandlerRegistry) -> EslResult<SupervisorHandle> {
        let subscription = Subscription::new(
            self.config
                .events
                .iter()
                .cloned(),
        )?;
        Ok(self.supervise(subscription, registry))
    }

    /// Start a supervised event channel for an explicit subscription and registry.
    pub fn supervise(&self, subscription: Subscription, registry: HandlerRegistry) -> SupervisorHandle {
        Supervisor::new(self.config.clone(), subscription, registry).spawn()
    }
}
