//! Administrative `api` command execution.
//!
//! ESL replies carry no correlation id, so the only safe way to let many
//! callers issue commands at once is to never share a connection between
//! two in-flight commands. [`CommandChannel`] dials a fresh connection per
//! call: unrelated commands never queue behind each other, and a command
//! that times out takes only its own connection down with it.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    commands::ApiCommand,
    config::EslConfig,
    connection::{EslConnection, PendingCommand},
    error::EslResult,
    protocol::encode_command,
};

/// Runs `api` commands, one short-lived connection per call.
///
/// Cheap to clone; clones share the configuration only.
#[derive(Clone)]
pub struct CommandChannel {
    config: Arc<EslConfig>,
}

impl CommandChannel {
    pub fn new(config: Arc<EslConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EslConfig {
        &self.config
    }

    /// Run `command` with the configured command timeout.
    ///
    /// Returns the `api/response` body. FreeSWITCH reports command-level
    /// failures inside the body (`-ERR ...`, `-USAGE: ...`), so those come
    /// back as `Ok` for the caller to interpret. Never retried.
    pub async fn execute(&self, command: &str) -> EslResult<String> {
        self.execute_with_timeout(command, self.config.command_timeout())
            .await
    }

    /// Run `command`, failing with `CommandTimeout` if no reply arrives
    /// within `timeout` of it being sent.
    pub async fn execute_with_timeout(&self, command: &str, timeout: Duration) -> EslResult<String> {
        // Reject unframeable text before opening a socket
        encode_command(command)?;

        let mut conn = EslConnection::connect(&self.config).await?;
        let pending = PendingCommand::new(command, timeout);

        match conn
            .api(pending)
            .await
        {
            Ok(frame) => {
                conn.close();
                let body = frame
                    .body_text()
                    .map(|b| b.into_owned())
                    .unwrap_or_default();
                debug!("Command executed: {}, response: {}", command, body.trim_end());
                Ok(body)
            }
            Err(e) => {
                warn!("Failed to execute command '{}': {}", command, e);
                Err(e)
            }
        }
    }

    /// Validate and run a typed command.
    pub async fn run<C>(&self, command: &C) -> EslResult<String>
    where
        C: ApiCommand + ?Sized,
    {
        command.validate()?;
        self.execute(&command.to_string())
            .await
    }
}
