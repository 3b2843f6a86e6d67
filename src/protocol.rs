//! ESL wire framing: header block plus optional length-prefixed body.
//!
//! Every inbound message is a block of `Name: Value` lines closed by a blank
//! line. When a `Content-Length` header is present, exactly that many bytes
//! of body follow. The codec is transport-independent: bytes go in through
//! [`FrameCodec::feed`], frames come out of [`FrameCodec::decode`].

use crate::{
    buffer::EslBuffer,
    constants::*,
    error::{EslError, EslResult},
};
use bytes::{BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use std::borrow::Cow;
use std::fmt;

/// Ordered, case-preserving header map
pub type Headers = IndexMap<String, String>;

/// Frame content types this client understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    /// Unsolicited greeting asking for `auth <password>`
    AuthRequest,
    /// Reply to a non-api command (`auth`, `event`, ...)
    CommandReply,
    /// Reply to an `api` command, result in the body
    ApiResponse,
    /// Event serialized in plain format
    EventPlain,
    /// Server is about to close the socket
    DisconnectNotice,
    /// Anything else; carried through so channels can log it
    Other(String),
}

impl ContentType {
    pub fn from_header(value: &str) -> Self {
        match value {
            CONTENT_TYPE_AUTH_REQUEST => ContentType::AuthRequest,
            CONTENT_TYPE_COMMAND_REPLY => ContentType::CommandReply,
            CONTENT_TYPE_API_RESPONSE => ContentType::ApiResponse,
            CONTENT_TYPE_TEXT_EVENT_PLAIN => ContentType::EventPlain,
            CONTENT_TYPE_DISCONNECT_NOTICE => ContentType::DisconnectNotice,
            other => ContentType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ContentType::AuthRequest => CONTENT_TYPE_AUTH_REQUEST,
            ContentType::CommandReply => CONTENT_TYPE_COMMAND_REPLY,
            ContentType::ApiResponse => CONTENT_TYPE_API_RESPONSE,
            ContentType::EventPlain => CONTENT_TYPE_TEXT_EVENT_PLAIN,
            ContentType::DisconnectNotice => CONTENT_TYPE_DISCONNECT_NOTICE,
            ContentType::Other(s) => s,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One decoded protocol message.
///
/// `body` is present exactly when the header block carried `Content-Length`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    content_type: ContentType,
    headers: Headers,
    body: Option<Bytes>,
}

impl Frame {
    /// Frame with only a `Content-Type` header
    pub fn new(content_type: ContentType) -> Self {
        let mut headers = Headers::new();
        headers.insert(
            HEADER_CONTENT_TYPE.to_string(),
            content_type
                .as_str()
                .to_string(),
        );
        Self {
            content_type,
            headers,
            body: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_string(), value.to_string());
        self
    }

    /// Attach a body, setting `Content-Length` to its byte length
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.headers
            .insert(HEADER_CONTENT_LENGTH.to_string(), body.len().to_string());
        self.body = Some(body);
        self
    }

    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .map(String::as_str)
    }

    /// Raw body bytes
    pub fn body(&self) -> Option<&[u8]> {
        self.body
            .as_deref()
    }

    /// Body as text; invalid UTF-8 sequences are replaced
    pub fn body_text(&self) -> Option<Cow<'_, str>> {
        self.body
            .as_deref()
            .map(String::from_utf8_lossy)
    }

    pub fn reply_text(&self) -> Option<&str> {
        self.header(HEADER_REPLY_TEXT)
    }

    /// `true` when a command/reply reports `+OK`.
    ///
    /// Checks `Reply-Text` first and falls back to the body for servers that
    /// put the reply text there.
    pub fn is_reply_ok(&self) -> bool {
        match self.reply_text() {
            Some(text) => text.starts_with(REPLY_OK_PREFIX),
            None => self
                .body_text()
                .map(|body| {
                    body.trim_start()
                        .starts_with(REPLY_OK_PREFIX)
                })
                .unwrap_or(false),
        }
    }

    /// Serialize back to wire bytes: headers in stored order, blank line, body
    pub fn to_bytes(&self) -> Bytes {
        let body_len = self
            .body
            .as_ref()
            .map_or(0, Bytes::len);
        let mut out = BytesMut::with_capacity(256 + body_len);
        for (name, value) in &self.headers {
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_u8(b'\n');
        }
        out.put_u8(b'\n');
        if let Some(body) = &self.body {
            out.put_slice(body);
        }
        out.freeze()
    }
}

/// Outcome of a decode attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Frame(Frame),
    /// Buffered bytes do not yet hold a complete frame
    NeedMoreData,
}

/// Parser state carried between decode calls
#[derive(Debug)]
enum ParseState {
    WaitingForHeaders,
    WaitingForBody {
        content_type: ContentType,
        headers: Headers,
        body_length: usize,
    },
    /// A framing error was seen; the stream cannot be resynchronized
    Poisoned(String),
}

/// Resumable ESL frame decoder.
///
/// Partially received frames stay buffered across calls: a header block is
/// parsed once, then the codec waits for the body without re-reading it.
pub struct FrameCodec {
    buffer: EslBuffer,
    state: ParseState,
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: EslBuffer::new(),
            state: ParseState::WaitingForHeaders,
            max_frame_size,
        }
    }

    /// Append bytes read from the transport
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer
            .extend_from_slice(data);
    }

    /// Bytes buffered but not yet decoded
    pub fn buffered_len(&self) -> usize {
        self.buffer
            .len()
    }

    /// `true` after a framing error; every further decode fails
    pub fn is_poisoned(&self) -> bool {
        matches!(self.state, ParseState::Poisoned(_))
    }

    /// Try to decode one frame from buffered data.
    ///
    /// A `MalformedFrame` error is sticky: the codec refuses to decode
    /// anything after it instead of hunting for the next frame boundary.
    pub fn decode(&mut self) -> EslResult<Decoded> {
        match self.try_decode() {
            Err(EslError::MalformedFrame { message }) => {
                if !self.is_poisoned() {
                    self.state = ParseState::Poisoned(message.clone());
                }
                Err(EslError::MalformedFrame { message })
            }
            other => other,
        }
    }

    fn try_decode(&mut self) -> EslResult<Decoded> {
        loop {
            match &self.state {
                ParseState::Poisoned(message) => {
                    return Err(EslError::malformed(format!(
                        "stream unusable after earlier error: {}",
                        message
                    )));
                }
                ParseState::WaitingForHeaders => {
                    let end = match self
                        .buffer
                        .find_header_end()
                    {
                        Some(end) => end,
                        None => {
                            self.buffer
                                .check_size_limits(self.max_frame_size)?;
                            return Ok(Decoded::NeedMoreData);
                        }
                    };

                    let header_len = end.block_len + end.terminator_len;
                    let block = self
                        .buffer
                        .extract_bytes(end.block_len)
                        .ok_or_else(|| EslError::malformed("header block vanished"))?;
                    self.buffer
                        .advance(end.terminator_len)?;

                    let text = std::str::from_utf8(&block)
                        .map_err(|_| EslError::malformed("invalid UTF-8 in header block"))?;
                    let headers = parse_header_block(text)?;

                    let content_type = headers
                        .get(HEADER_CONTENT_TYPE)
                        .map(|v| ContentType::from_header(v))
                        .ok_or_else(|| EslError::malformed("missing Content-Type header"))?;

                    match headers.get(HEADER_CONTENT_LENGTH) {
                        Some(raw) => {
                            let body_length = parse_content_length(raw)?;
                            if header_len.saturating_add(body_length) > self.max_frame_size {
                                return Err(EslError::malformed(format!(
                                    "frame of {} header and {} body bytes exceeds maximum frame size {}",
                                    header_len, body_length, self.max_frame_size
                                )));
                            }
                            self.state = ParseState::WaitingForBody {
                                content_type,
                                headers,
                                body_length,
                            };
                        }
                        None => {
                            return Ok(Decoded::Frame(Frame {
                                content_type,
                                headers,
                                body: None,
                            }));
                        }
                    }
                }
                ParseState::WaitingForBody { body_length, .. } => {
                    let body = match self
                        .buffer
                        .extract_bytes(*body_length)
                    {
                        Some(body) => body,
                        None => return Ok(Decoded::NeedMoreData),
                    };
                    let state = std::mem::replace(&mut self.state, ParseState::WaitingForHeaders);
                    if let ParseState::WaitingForBody {
                        content_type,
                        headers,
                        ..
                    } = state
                    {
                        return Ok(Decoded::Frame(Frame {
                            content_type,
                            headers,
                            body: Some(body),
                        }));
                    }
                }
            }
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_content_length(raw: &str) -> EslResult<usize> {
    raw.trim()
        .parse()
        .map_err(|_| EslError::malformed(format!("unparseable Content-Length: {:?}", raw)))
}

/// Parse `Name: Value` lines. Lines may end in LF or CRLF.
///
/// A line without a colon, an empty name, or a repeated name is malformed.
pub(crate) fn parse_header_block(text: &str) -> EslResult<Headers> {
    let mut headers = Headers::new();
    for line in text.split('\n') {
        let line = line
            .strip_suffix('\r')
            .unwrap_or(line);
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| EslError::malformed(format!("header line without colon: {:?}", line)))?;
        if name.is_empty() {
            return Err(EslError::malformed(format!("empty header name: {:?}", line)));
        }
        // One separator space; further leading whitespace belongs to the value
        let value = value
            .strip_prefix(' ')
            .unwrap_or(value);
        if headers
            .insert(name.to_string(), value.to_string())
            .is_some()
        {
            return Err(EslError::malformed(format!("duplicate header: {}", name)));
        }
    }
    Ok(headers)
}

/// Frame an outbound command: the command line followed by one blank line.
///
/// Command text containing a line break would let the caller inject extra
/// commands into the stream, so it is rejected.
pub fn encode_command(command: &str) -> EslResult<Bytes> {
    if command
        .trim()
        .is_empty()
        || command.contains(['\r', '\n'])
    {
        return Err(EslError::InvalidCommand {
            command: command.to_string(),
        });
    }
    let mut out = BytesMut::with_capacity(command.len() + COMMAND_TERMINATOR.len());
    out.put_slice(command.as_bytes());
    out.put_slice(COMMAND_TERMINATOR.as_bytes());
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut FrameCodec) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Decoded::Frame(frame) = codec
            .decode()
            .unwrap()
        {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_parse_auth_request() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Content-Type: auth/request\r\n\r\n");

        let frame = match codec
            .decode()
            .unwrap()
        {
            Decoded::Frame(frame) => frame,
            Decoded::NeedMoreData => panic!("expected a frame"),
        };
        assert_eq!(frame.content_type(), &ContentType::AuthRequest);
        assert!(frame
            .body()
            .is_none());
    }

    #[test]
    fn test_parse_api_response() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Content-Type: api/response\nContent-Length: 2\n\nOK");

        let frames = decode_all(&mut codec);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].content_type(), &ContentType::ApiResponse);
        assert_eq!(frames[0].body(), Some(&b"OK"[..]));
        assert_eq!(codec.buffered_len(), 0);
    }

    #[test]
    fn test_content_length_zero_has_empty_body() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Content-Type: api/response\nContent-Length: 0\n\n");

        let frames = decode_all(&mut codec);
        assert_eq!(frames[0].body(), Some(&b""[..]));
    }

    #[test]
    fn test_need_more_data_until_body_complete() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Content-Type: api/response\nContent-Length: 40\n\n");
        codec.feed(&[b'a'; 10]);
        assert_eq!(codec.decode().unwrap(), Decoded::NeedMoreData);

        codec.feed(&[b'b'; 20]);
        assert_eq!(codec.decode().unwrap(), Decoded::NeedMoreData);

        codec.feed(&[b'c'; 10]);
        let frames = decode_all(&mut codec);
        assert_eq!(frames.len(), 1);
        let body = frames[0]
            .body()
            .unwrap();
        assert_eq!(body.len(), 40);
        assert_eq!(&body[..10], &[b'a'; 10]);
        assert_eq!(&body[30..], &[b'c'; 10]);
    }

    #[test]
    fn test_headers_split_across_feeds() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Content-Type: command/re");
        assert_eq!(codec.decode().unwrap(), Decoded::NeedMoreData);
        codec.feed(b"ply\r\nReply-Text: +OK accepted\r\n");
        assert_eq!(codec.decode().unwrap(), Decoded::NeedMoreData);
        codec.feed(b"\r\n");

        let frames = decode_all(&mut codec);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].reply_text(), Some("+OK accepted"));
        assert!(frames[0].is_reply_ok());
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut codec = FrameCodec::new();
        codec.feed(
            b"Content-Type: api/response\nContent-Length: 3\n\none\
              Content-Type: api/response\nContent-Length: 3\n\ntwo",
        );

        let frames = decode_all(&mut codec);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].body(), Some(&b"one"[..]));
        assert_eq!(frames[1].body(), Some(&b"two"[..]));
    }

    #[test]
    fn test_missing_colon_is_malformed_and_sticky() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Content-Type: api/response\nGarbage line\n\n");
        assert!(matches!(
            codec.decode(),
            Err(EslError::MalformedFrame { .. })
        ));
        assert!(codec.is_poisoned());

        codec.feed(b"Content-Type: api/response\nContent-Length: 2\n\nOK");
        assert!(matches!(
            codec.decode(),
            Err(EslError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_unparseable_content_length() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Content-Type: api/response\nContent-Length: forty\n\n");
        assert!(matches!(
            codec.decode(),
            Err(EslError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_content_length_over_limit() {
        let mut codec = FrameCodec::with_max_frame_size(16);
        codec.feed(b"Content-Type: api/response\nContent-Length: 17\n\n");
        assert!(matches!(
            codec.decode(),
            Err(EslError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_unterminated_header_block_over_limit() {
        let mut codec = FrameCodec::with_max_frame_size(32);
        codec.feed(b"Content-Type: api/response\nX-Filler: ");
        codec.feed(&[b'z'; 64]);
        assert!(matches!(
            codec.decode(),
            Err(EslError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_duplicate_header_rejected() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Content-Type: api/response\nContent-Type: api/response\n\n");
        assert!(matches!(
            codec.decode(),
            Err(EslError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_missing_content_type_rejected() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Reply-Text: +OK\n\n");
        assert!(matches!(
            codec.decode(),
            Err(EslError::MalformedFrame { .. })
        ));
    }

    #[test]
    fn test_header_case_and_order_preserved() {
        let headers = parse_header_block("Content-Type: text/event-plain\r\nx-Custom-HDR: a: b").unwrap();
        let names: Vec<&str> = headers
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(names, vec!["Content-Type", "x-Custom-HDR"]);
        assert_eq!(headers["x-Custom-HDR"], "a: b");
    }

    #[test]
    fn test_frame_round_trip() {
        let original = Frame::new(ContentType::ApiResponse)
            .with_header("X-Trace", "abc")
            .with_body(&b"+OK line one\nline two\n"[..]);

        let mut codec = FrameCodec::new();
        codec.feed(&original.to_bytes());
        let frames = decode_all(&mut codec);

        assert_eq!(frames, vec![original]);
    }

    #[test]
    fn test_header_value_whitespace_round_trip() {
        let original = Frame::new(ContentType::ApiResponse)
            .with_header("X-Pad", "  padded")
            .with_header("X-Trailing", "tail ")
            .with_body(&b"ok"[..]);

        let mut codec = FrameCodec::new();
        codec.feed(&original.to_bytes());
        let frames = decode_all(&mut codec);

        assert_eq!(frames[0].header("X-Pad"), Some("  padded"));
        assert_eq!(frames, vec![original]);
    }

    #[test]
    fn test_value_without_separator_space() {
        let headers = parse_header_block("Content-Type:api/response\nX-Empty:").unwrap();
        assert_eq!(headers["Content-Type"], "api/response");
        assert_eq!(headers["X-Empty"], "");
    }

    #[test]
    fn test_frame_size_counts_header_block() {
        // 47 header bytes plus a 10 byte body
        let wire = b"Content-Type: api/response\nContent-Length: 10\n\n0123456789";
        let mut codec = FrameCodec::with_max_frame_size(50);
        codec.feed(wire);
        assert!(matches!(
            codec.decode(),
            Err(EslError::MalformedFrame { .. })
        ));

        let mut codec = FrameCodec::with_max_frame_size(wire.len());
        codec.feed(wire);
        assert_eq!(decode_all(&mut codec).len(), 1);
    }

    #[test]
    fn test_unknown_content_type_passes_through() {
        let mut codec = FrameCodec::new();
        codec.feed(b"Content-Type: log/data\nContent-Length: 4\n\nlog\n");
        let frames = decode_all(&mut codec);
        assert_eq!(
            frames[0].content_type(),
            &ContentType::Other("log/data".to_string())
        );
    }

    #[test]
    fn test_reply_ok_falls_back_to_body() {
        let ok = Frame::new(ContentType::CommandReply).with_body(&b"+OK accepted"[..]);
        assert!(ok.is_reply_ok());
        let err = Frame::new(ContentType::CommandReply).with_header(HEADER_REPLY_TEXT, "-ERR invalid");
        assert!(!err.is_reply_ok());
        assert!(!Frame::new(ContentType::CommandReply).is_reply_ok());
    }

    #[test]
    fn test_encode_command() {
        assert_eq!(&encode_command("api status").unwrap()[..], b"api status\n\n");
        assert_eq!(&encode_command("auth ClueCon").unwrap()[..], b"auth ClueCon\n\n");
        assert!(matches!(
            encode_command("api status\n\napi shutdown"),
            Err(EslError::InvalidCommand { .. })
        ));
        assert!(encode_command("  ").is_err());
    }
}
