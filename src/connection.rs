//! One authenticated TCP connection to the FreeSWITCH ESL listener

use bytes::Bytes;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::{
    config::EslConfig,
    error::{EslError, EslResult},
    protocol::{encode_command, ContentType, Decoded, Frame, FrameCodec},
};

/// Lifecycle of a transport connection.
///
/// `Connecting -> AuthPending -> Ready -> Closing` in order; any socket or
/// framing error from any state moves to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AuthPending,
    Ready,
    Closing,
    Failed,
}

/// An `api` invocation waiting for its reply.
///
/// The protocol has no correlation id between a command and its reply, so
/// a connection holds at most one of these. Requiring `&mut EslConnection`
/// to send one makes a second concurrent command on the same connection
/// impossible to express.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    command: String,
    deadline: Instant,
    timeout: Duration,
}

impl PendingCommand {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            deadline: deadline_after(timeout),
            timeout,
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left before the deadline, zero once it has passed
    pub fn remaining(&self) -> Duration {
        self.deadline
            .saturating_duration_since(Instant::now())
    }

    fn timed_out(&self) -> EslError {
        EslError::CommandTimeout {
            command: self
                .command
                .clone(),
            timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Roughly 30 years; stands in for deadlines too far out to represent
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// Authenticated ESL connection (inbound mode: we dial FreeSWITCH).
pub struct EslConnection {
    stream: TcpStream,
    codec: FrameCodec,
    state: ConnectionState,
    read_buffer: Vec<u8>,
    peer: String,
}

impl EslConnection {
    /// Dial, wait for `auth/request`, answer with `auth <password>`.
    ///
    /// The whole handshake is bounded by the configured connect timeout.
    /// A reply other than `+OK` fails with `AuthenticationFailed`.
    pub async fn connect(config: &EslConfig) -> EslResult<Self> {
        let peer = format!("{}:{}", config.host, config.port);
        let connect_timeout = config.connect_timeout();
        let timeout_ms = config.connect_timeout_ms;
        info!("Connecting to FreeSWITCH at {}", peer);

        debug!("[CONNECT] Starting TCP connect with {}ms timeout", timeout_ms);
        let stream = match timeout(
            connect_timeout,
            TcpStream::connect((config.host.as_str(), config.port)),
        )
        .await
        {
            Ok(Ok(s)) => s,
            Ok(Err(e)) => {
                warn!("[CONNECT] TCP connect to {} failed: {}", peer, e);
                return Err(EslError::Io(e));
            }
            Err(_) => {
                warn!("[CONNECT] TCP connect to {} timed out after {}ms", peer, timeout_ms);
                return Err(EslError::ConnectTimeout { timeout_ms });
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!("[CONNECT] Could not set TCP_NODELAY: {}", e);
        }

        let mut conn = Self {
            stream,
            codec: FrameCodec::with_max_frame_size(config.max_frame_size),
            state: ConnectionState::Connecting,
            read_buffer: vec![0u8; crate::constants::SOCKET_BUF_SIZE],
            peer,
        };

        let handshake = timeout(connect_timeout, conn.authenticate(&config.password)).await;
        match handshake {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                conn.state = ConnectionState::Failed;
                return Err(e);
            }
            Err(_) => {
                conn.state = ConnectionState::Failed;
                warn!("[AUTH] Handshake with {} timed out after {}ms", conn.peer, timeout_ms);
                return Err(EslError::ConnectTimeout { timeout_ms });
            }
        }

        info!("Connected and authenticated to FreeSWITCH at {}", conn.peer);
        Ok(conn)
    }

    async fn authenticate(&mut self, password: &str) -> EslResult<()> {
        self.state = ConnectionState::AuthPending;

        debug!("[AUTH] Waiting for auth request from FreeSWITCH");
        let greeting = self
            .read_frame()
            .await?;
        if greeting.content_type() != &ContentType::AuthRequest {
            return Err(EslError::malformed(format!(
                "expected auth/request, got {}",
                greeting.content_type()
            )));
        }

        debug!("[AUTH] Sending auth command");
        self.write_bytes(encode_command(&format!("auth {}", password))?)
            .await?;

        let reply = loop {
            let frame = self
                .read_frame()
                .await?;
            match frame.content_type() {
                ContentType::CommandReply => break frame,
                other => debug!("[AUTH] Ignoring {} frame while waiting for auth reply", other),
            }
        };

        if !reply.is_reply_ok() {
            let reason = reply
                .reply_text()
                .map(str::to_string)
                .or_else(|| {
                    reply
                        .body_text()
                        .map(|b| {
                            b.trim()
                                .to_string()
                        })
                })
                .unwrap_or_else(|| "authentication rejected".to_string());
            warn!("[AUTH] FreeSWITCH at {} rejected credentials: {}", self.peer, reason);
            return Err(EslError::auth_failed(reason));
        }

        self.state = ConnectionState::Ready;
        debug!("[AUTH] Authentication successful");
        Ok(())
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// `host:port` this connection was dialed to
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Send one command line; only allowed once authenticated.
    pub async fn send(&mut self, command: &str) -> EslResult<()> {
        if self.state != ConnectionState::Ready {
            return Err(self.not_ready());
        }
        let bytes = encode_command(command)?;
        debug!("[SEND] {}", command);
        self.write_bytes(bytes)
            .await
    }

    /// Wait for the next complete frame.
    ///
    /// With `Some(limit)`, gives up after `limit` with `Timeout`; the
    /// connection stays usable because partially read data remains in the
    /// codec. EOF, socket errors and disconnect notices fail with
    /// `ConnectionLost`, and every later call fails the same way.
    pub async fn receive(&mut self, limit: Option<Duration>) -> EslResult<Frame> {
        match self.state {
            ConnectionState::Ready | ConnectionState::AuthPending => {}
            _ => return Err(self.not_ready()),
        }
        match limit {
            Some(limit) => match timeout(limit, self.read_frame()).await {
                Ok(result) => result,
                Err(_) => Err(EslError::Timeout {
                    timeout_ms: limit.as_millis() as u64,
                }),
            },
            None => {
                self.read_frame()
                    .await
            }
        }
    }

    /// Run one `api` command to completion on this connection.
    ///
    /// Frames that are not `api/response` (stray events on a subscribed
    /// connection) are skipped. If the deadline passes the connection is
    /// marked `Failed`: a reply arriving later must never be read as the
    /// answer to a different command.
    pub async fn api(&mut self, pending: PendingCommand) -> EslResult<Frame> {
        self.send(&format!("api {}", pending.command()))
            .await?;

        let wait = async {
            loop {
                let frame = self
                    .read_frame()
                    .await?;
                match frame.content_type() {
                    ContentType::ApiResponse => return Ok(frame),
                    ContentType::CommandReply if !frame.is_reply_ok() => {
                        return Err(EslError::CommandRejected {
                            reply_text: frame
                                .reply_text()
                                .unwrap_or("-ERR")
                                .to_string(),
                        });
                    }
                    other => {
                        debug!(
                            "Ignoring {} frame while waiting for reply to '{}'",
                            other,
                            pending.command()
                        );
                    }
                }
            }
        };

        let outcome = timeout(pending.remaining(), wait).await;
        match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "Command '{}' on {} timed out, discarding connection",
                    pending.command(),
                    self.peer
                );
                self.state = ConnectionState::Failed;
                Err(pending.timed_out())
            }
        }
    }

    /// Close the connection; the socket is dropped without a shutdown handshake.
    pub fn close(mut self) {
        if self.state == ConnectionState::Ready {
            self.state = ConnectionState::Closing;
            debug!("Closing connection to {}", self.peer);
        }
    }

    async fn write_bytes(&mut self, bytes: Bytes) -> EslResult<()> {
        if let Err(e) = self
            .stream
            .write_all(&bytes)
            .await
        {
            self.state = ConnectionState::Failed;
            return Err(EslError::connection_lost(format!("write failed: {}", e)));
        }
        Ok(())
    }

    async fn read_frame(&mut self) -> EslResult<Frame> {
        loop {
            match self
                .codec
                .decode()
            {
                Ok(Decoded::Frame(frame)) => {
                    trace!("[RECV] Decoded {} frame", frame.content_type());
                    if frame.content_type() == &ContentType::DisconnectNotice {
                        let notice = frame
                            .body_text()
                            .map(|b| {
                                b.trim()
                                    .to_string()
                            })
                            .unwrap_or_default();
                        warn!("Received disconnect notice from {}: {}", self.peer, notice);
                        self.state = ConnectionState::Closing;
                        return Err(EslError::connection_lost(format!(
                            "disconnect notice: {}",
                            notice
                        )));
                    }
                    return Ok(frame);
                }
                Ok(Decoded::NeedMoreData) => {}
                Err(e) => {
                    warn!("Framing error from {}: {}", self.peer, e);
                    self.state = ConnectionState::Failed;
                    return Err(e);
                }
            }

            trace!("[RECV] Reading from socket");
            let n = match self
                .stream
                .read(&mut self.read_buffer)
                .await
            {
                Ok(n) => n,
                Err(e) => {
                    self.state = ConnectionState::Failed;
                    return Err(EslError::connection_lost(format!("read failed: {}", e)));
                }
            };
            if n == 0 {
                self.state = ConnectionState::Failed;
                return Err(EslError::connection_lost("connection closed by FreeSWITCH"));
            }
            trace!("[RECV] Read {} bytes", n);
            self.codec
                .feed(&self.read_buffer[..n]);
        }
    }

    fn not_ready(&self) -> EslError {
        match self.state {
            ConnectionState::Failed | ConnectionState::Closing | ConnectionState::Disconnected => {
                EslError::connection_lost(format!("connection to {} is {:?}", self.peer, self.state))
            }
            state => EslError::NotReady { state },
        }
    }
}

impl Drop for EslConnection {
    fn drop(&mut self) {
        if self.state == ConnectionState::Ready {
            debug!("EslConnection to {} dropped - socket will be closed", self.peer);
        }
    }
}
