//! FreeSWITCH Event Socket (ESL) control-plane client
//!
//! This crate turns the plain-text ESL protocol into two capabilities:
//! synchronous administrative commands (`api reloadxml`, `api sofia ...`)
//! and a supervised subscription to call-lifecycle events.
//!
//! # Architecture
//!
//! - [`FrameCodec`]: resumable decoder for the header-block + body framing
//! - [`EslConnection`]: one authenticated TCP connection
//! - [`CommandChannel`]: one fresh connection per `api` call, so concurrent
//!   callers never share a connection (replies carry no correlation id)
//! - [`EventChannel`]: `event plain ...` subscription feeding a
//!   [`HandlerRegistry`], one event at a time, in server order
//! - [`Supervisor`]: reconnects and resubscribes the event channel with
//!   backoff until told to stop
//! - [`EslClient`]: the facade tying these together
//!
//! # Examples
//!
//! ## Commands
//!
//! ```rust,no_run
//! use freeswitch_esl_control::{EslClient, EslConfig, EslError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), EslError> {
//!     let client = EslClient::new(EslConfig::new("localhost", 8021, "ClueCon"));
//!
//!     let status = client.status().await?;
//!     println!("{}", status);
//!
//!     client.reload_xml().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Event Subscription
//!
//! ```rust,no_run
//! use freeswitch_esl_control::{CallRecord, EslClient, EslConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = EslClient::new(EslConfig::new("localhost", 8021, "ClueCon"));
//!
//!     let handle = client.subscribe_events(["CHANNEL_ANSWER", "CHANNEL_HANGUP_COMPLETE"], |event| {
//!         if let Some(record) = CallRecord::from_event(event) {
//!             println!("{}", record.to_json()?);
//!         }
//!         Ok(())
//!     })?;
//!
//!     tokio::time::sleep(Duration::from_secs(3600)).await;
//!     handle.stop().await;
//!     Ok(())
//! }
//! ```

pub mod call;
pub mod client;
pub mod command;
pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod events;
pub mod handler;
pub mod protocol;
pub mod supervisor;

pub(crate) mod buffer;
pub(crate) mod constants;

pub use call::{CallAnswer, CallBridge, CallEnd, CallOutgoing, CallRecord, CallStart};
pub use client::EslClient;
pub use command::CommandChannel;
pub use commands::{
    ApiCommand, ProfileAction, ReloadAcl, ReloadXml, Rescan, Sofia, SofiaProfile, Status,
};
pub use config::{BackoffConfig, EslConfig};
pub use connection::{ConnectionState, EslConnection, PendingCommand};
pub use constants::{DEFAULT_CALL_EVENTS, DEFAULT_ESL_PORT};
pub use error::{EslError, EslResult};
pub use event::{EslEvent, Subscription};
pub use events::EventChannel;
pub use handler::{DispatchReport, EventHandler, HandlerError, HandlerRegistry, HandlerResult};
pub use protocol::{encode_command, ContentType, Decoded, Frame, FrameCodec, Headers};
pub use supervisor::{BackoffPolicy, Supervisor, SupervisorHandle, SupervisorState};
