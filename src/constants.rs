//! Protocol constants and configuration defaults

/// Default FreeSWITCH ESL port for inbound connections
pub const DEFAULT_ESL_PORT: u16 = 8021;

/// Default ESL shared secret shipped with FreeSWITCH
pub const DEFAULT_ESL_PASSWORD: &str = "ClueCon";

/// Socket read chunk size (64KB) - standard TCP receive window
pub const SOCKET_BUF_SIZE: usize = 65536;

/// Buffer allocation size (64KB) - used for both initial allocation and growth increments
pub const BUF_CHUNK: usize = 64 * 1024;

/// Default maximum frame size (8MB), header block plus body.
/// No legitimate ESL message should exceed this (largest is sofia status ~1-2MB)
pub const MAX_FRAME_SIZE: usize = 8 * 1024 * 1024;

/// Outbound command terminator (the blank line closing a command)
pub const COMMAND_TERMINATOR: &str = "\n\n";

/// Content-Type header values
pub const CONTENT_TYPE_AUTH_REQUEST: &str = "auth/request";
pub const CONTENT_TYPE_COMMAND_REPLY: &str = "command/reply";
pub const CONTENT_TYPE_API_RESPONSE: &str = "api/response";
pub const CONTENT_TYPE_TEXT_EVENT_PLAIN: &str = "text/event-plain";
pub const CONTENT_TYPE_DISCONNECT_NOTICE: &str = "text/disconnect-notice";

/// Header names
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CONTENT_LENGTH: &str = "Content-Length";
pub const HEADER_REPLY_TEXT: &str = "Reply-Text";
pub const HEADER_EVENT_NAME: &str = "Event-Name";
pub const HEADER_EVENT_SUBCLASS: &str = "Event-Subclass";
pub const HEADER_UNIQUE_ID: &str = "Unique-ID";
pub const HEADER_CALLER_UUID: &str = "Caller-Unique-ID";

/// Reply-Text prefix FreeSWITCH uses for a successful command/reply
pub const REPLY_OK_PREFIX: &str = "+OK";

/// Event name that subscribes to every event
pub const EVENT_ALL: &str = "ALL";

/// Registry key for handlers that receive every dispatched event
pub const WILDCARD_HANDLER: &str = "*";

/// TCP connect + authentication timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2000;

/// Per-command reply deadline in milliseconds
pub const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5000;

/// Reconnect backoff defaults: first retry after 3s, doubling up to 30s
pub const DEFAULT_BACKOFF_INITIAL_MS: u64 = 3000;
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Call-lifecycle event names
pub const EVENT_CHANNEL_CREATE: &str = "CHANNEL_CREATE";
pub const EVENT_CHANNEL_ANSWER: &str = "CHANNEL_ANSWER";
pub const EVENT_CHANNEL_BRIDGE: &str = "CHANNEL_BRIDGE";
pub const EVENT_CHANNEL_OUTGOING: &str = "CHANNEL_OUTGOING";
pub const EVENT_CHANNEL_HANGUP_COMPLETE: &str = "CHANNEL_HANGUP_COMPLETE";

/// Default subscription: the call-lifecycle events
pub const DEFAULT_CALL_EVENTS: &[&str] = &[
    EVENT_CHANNEL_CREATE,
    EVENT_CHANNEL_BRIDGE,
    EVENT_CHANNEL_ANSWER,
    EVENT_CHANNEL_HANGUP_COMPLETE,
    EVENT_CHANNEL_OUTGOING,
];
