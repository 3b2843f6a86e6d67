//! Event subscription and dispatch loop.
//!
//! One connection, one `event plain ...` subscription, one loop: receive a
//! frame, decode it, run the handlers, then receive the next one. Handlers
//! finish (or hand the work off themselves) before the next read, so events
//! reach them in exactly the order FreeSWITCH sent them and a slow handler
//! pushes back on the socket instead of growing an in-memory queue.

use std::time::Duration;
use tracing::{debug, info, trace, warn};

use crate::{
    config::EslConfig,
    connection::{ConnectionState, EslConnection},
    error::{EslError, EslResult},
    event::{EslEvent, Subscription},
    handler::HandlerRegistry,
    protocol::ContentType,
};

/// A subscribed connection feeding a [`HandlerRegistry`].
pub struct EventChannel {
    conn: EslConnection,
    subscription: Subscription,
    registry: HandlerRegistry,
}

impl EventChannel {
    /// Connect, authenticate and subscribe in one go.
    pub async fn connect(
        config: &EslConfig,
        subscription: Subscription,
        registry: HandlerRegistry,
    ) -> EslResult<Self> {
        let conn = EslConnection::connect(config).await?;
        Self::subscribe(conn, subscription, registry, config.connect_timeout()).await
    }

    /// Send `event plain <names>` on an authenticated connection and wait
    /// up to `reply_timeout` for the `+OK`.
    pub async fn subscribe(
        mut conn: EslConnection,
        subscription: Subscription,
        registry: HandlerRegistry,
        reply_timeout: Duration,
    ) -> EslResult<Self> {
        if subscription.is_empty() {
            return Err(EslError::InvalidArgument {
                name: "subscription",
                value: String::new(),
            });
        }

        conn.send(&subscription.to_command())
            .await?;
        loop {
            let frame = conn
                .receive(Some(reply_timeout))
                .await?;
            match frame.content_type() {
                ContentType::CommandReply if frame.is_reply_ok() => break,
                ContentType::CommandReply => {
                    return Err(EslError::CommandRejected {
                        reply_text: frame
                            .reply_text()
                            .unwrap_or("-ERR")
                            .to_string(),
                    });
                }
                other => debug!("Ignoring {} frame while waiting for subscription reply", other),
            }
        }

        info!("Subscribed to events: {}", subscription);
        Ok(Self {
            conn,
            subscription,
            registry,
        })
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.conn
            .state()
    }

    /// Next event from the server.
    ///
    /// Frames of other content types and event payloads that fail to decode
    /// are logged and skipped; only transport and framing errors end the
    /// stream.
    pub async fn next_event(&mut self) -> EslResult<EslEvent> {
        loop {
            let frame = self
                .conn
                .receive(None)
                .await?;
            match frame.content_type() {
                ContentType::EventPlain => match EslEvent::from_frame(&frame) {
                    Ok(event) => {
                        if self
                            .subscription
                            .contains(event.event_name())
                        {
                            return Ok(event);
                        }
                        trace!("Dropping unsubscribed event {}", event.event_name());
                    }
                    Err(e) => warn!("Dropping undecodable event: {}", e),
                },
                other => warn!("Unexpected {} frame on event channel", other),
            }
        }
    }

    /// Dispatch events until the connection fails; returns the cause.
    ///
    /// Cancel-safe between events: dropping the future mid-handler only
    /// abandons that handler.
    pub async fn run(mut self) -> EslError {
        loop {
            let event = match self
                .next_event()
                .await
            {
                Ok(event) => event,
                Err(e) => return e,
            };
            trace!("Dispatching {}", event.event_name());
            self.registry
                .dispatch(event)
                .await;
        }
    }
}
