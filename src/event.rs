//! ESL events and event subscriptions

use crate::{
    constants::*,
    error::{EslError, EslResult},
    protocol::{parse_header_block, ContentType, Frame, Headers},
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};
use std::collections::BTreeSet;
use std::fmt;

/// An event decoded from a `text/event-plain` frame.
///
/// The frame body carries the event as its own header block with
/// percent-encoded values, optionally followed by an inner
/// `Content-Length` body (e.g. `BACKGROUND_JOB` results). Events are
/// immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct EslEvent {
    event_name: String,
    headers: Headers,
    body: Option<String>,
}

impl EslEvent {
    /// Decode the event carried by a frame.
    pub fn from_frame(frame: &Frame) -> EslResult<Self> {
        if frame.content_type() != &ContentType::EventPlain {
            return Err(EslError::malformed(format!(
                "expected {} frame, got {}",
                CONTENT_TYPE_TEXT_EVENT_PLAIN,
                frame.content_type()
            )));
        }
        let payload = frame
            .body()
            .ok_or_else(|| EslError::malformed("event frame without body"))?;
        let text = std::str::from_utf8(payload)
            .map_err(|_| EslError::malformed("invalid UTF-8 in event body"))?;

        let (block, rest) = split_header_block(text);
        let mut headers = parse_header_block(block)?;
        for value in headers.values_mut() {
            if value.contains('%') {
                *value = percent_decode_str(value)
                    .decode_utf8_lossy()
                    .into_owned();
            }
        }

        let body = match headers.get(HEADER_CONTENT_LENGTH) {
            Some(raw) => {
                let length: usize = raw
                    .trim()
                    .parse()
                    .map_err(|_| {
                        EslError::malformed(format!("unparseable event Content-Length: {:?}", raw))
                    })?;
                let inner = rest
                    .get(..length)
                    .ok_or_else(|| {
                        EslError::malformed(format!(
                            "event body shorter than Content-Length {}",
                            length
                        ))
                    })?;
                Some(inner.to_string())
            }
            None => None,
        };

        let event_name = headers
            .get(HEADER_EVENT_NAME)
            .cloned()
            .ok_or_else(|| EslError::malformed("event without Event-Name header"))?;

        Ok(Self {
            event_name,
            headers,
            body,
        })
    }

    /// Build an event from headers; `Event-Name` must be among them.
    pub fn new(headers: Headers, body: Option<String>) -> EslResult<Self> {
        let event_name = headers
            .get(HEADER_EVENT_NAME)
            .cloned()
            .ok_or_else(|| EslError::malformed("event without Event-Name header"))?;
        Ok(Self {
            event_name,
            headers,
            body,
        })
    }

    /// Value of the `Event-Name` header, e.g. `CHANNEL_ANSWER`
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// All headers in wire order, values percent-decoded
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .map(String::as_str)
    }

    pub fn body(&self) -> Option<&str> {
        self.body
            .as_deref()
    }

    /// Channel UUID the event refers to
    pub fn unique_id(&self) -> Option<&str> {
        self.header(HEADER_UNIQUE_ID)
            .or_else(|| self.header(HEADER_CALLER_UUID))
    }

    /// Subclass of a `CUSTOM` event, e.g. `sofia::register`
    pub fn event_subclass(&self) -> Option<&str> {
        self.header(HEADER_EVENT_SUBCLASS)
    }

    /// Serialize into the frame FreeSWITCH would send for this event
    pub fn to_frame(&self) -> Frame {
        let mut payload = String::new();
        for (name, value) in &self.headers {
            if name == HEADER_CONTENT_LENGTH {
                continue;
            }
            payload.push_str(name);
            payload.push_str(": ");
            payload.extend(utf8_percent_encode(value, NON_ALPHANUMERIC));
            payload.push('\n');
        }
        match &self.body {
            Some(body) => {
                payload.push_str(&format!("{}: {}\n\n", HEADER_CONTENT_LENGTH, body.len()));
                payload.push_str(body);
            }
            None => payload.push('\n'),
        }
        Frame::new(ContentType::EventPlain).with_body(payload.into_bytes())
    }
}

/// Split an event payload into its header block and whatever follows the
/// blank line. A payload without a blank line is all headers.
fn split_header_block(text: &str) -> (&str, &str) {
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        let end = start + line.len();
        if start > 0
            && line
                .trim_end_matches(['\r', '\n'])
                .is_empty()
        {
            return (text[..start].trim_end_matches(['\r', '\n']), &text[end..]);
        }
        start = end;
    }
    (text.trim_end_matches(['\r', '\n']), "")
}

/// Set of event names requested with `event plain ...`.
///
/// The filter lives on the server side of one connection, so the same set
/// has to be sent again after every reconnect.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subscription {
    names: BTreeSet<String>,
}

impl Subscription {
    /// Subscription to the given event names.
    ///
    /// Names containing whitespace are rejected since they would be split
    /// into separate names on the wire.
    pub fn new<I, S>(names: I) -> EslResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut set = BTreeSet::new();
        for name in names {
            let name: String = name.into();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(EslError::InvalidArgument {
                    name: "event name",
                    value: name,
                });
            }
            set.insert(name);
        }
        Ok(Self { names: set })
    }

    /// The call-lifecycle events: create, bridge, answer, hangup complete, outgoing
    pub fn call_events() -> Self {
        Self {
            names: DEFAULT_CALL_EVENTS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names
            .iter()
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.names
            .is_empty()
    }

    /// Whether the server will deliver events named `event_name`
    pub fn contains(&self, event_name: &str) -> bool {
        self.names
            .contains(EVENT_ALL)
            || self
                .names
                .contains(event_name)
    }

    /// The `event plain ...` command line for this set
    pub fn to_command(&self) -> String {
        format!("event plain {}", self)
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self
            .names
            .contains(EVENT_ALL)
        {
            return f.write_str(EVENT_ALL);
        }
        let mut first = true;
        for name in &self.names {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}
