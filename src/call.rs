//! Call-lifecycle records extracted from channel event headers.
//!
//! Each of the five call-lifecycle events maps to a flat record holding the
//! handful of headers worth forwarding (to a webhook, a CDR store, a log
//! line). Every field is optional: FreeSWITCH omits headers that do not
//! apply to the channel.

use serde::Serialize;

use crate::{constants::*, event::EslEvent};

/// A new channel: `CHANNEL_CREATE`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CallStart {
    pub unique_id: Option<String>,
    pub caller_id_number: Option<String>,
    pub caller_id_name: Option<String>,
    pub destination_number: Option<String>,
    pub call_direction: Option<String>,
    pub called_context: Option<String>,
    pub fs_hostname: Option<String>,
}

/// Channel answered: `CHANNEL_ANSWER`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CallAnswer {
    pub unique_id: Option<String>,
    pub caller_id_number: Option<String>,
    pub caller_id_name: Option<String>,
    pub destination_number: Option<String>,
    pub variable_sip_to_user: Option<String>,
    pub answer_state: Option<String>,
    pub caller_channel_answered_time: Option<String>,
}

/// Two legs bridged: `CHANNEL_BRIDGE`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CallBridge {
    pub unique_id: Option<String>,
    pub caller_id_number: Option<String>,
    pub caller_id_name: Option<String>,
    /// Number dialed on the A leg, e.g. a ring group extension.
    pub group_destination_number: Option<String>,
    pub other_leg_destination_number: Option<String>,
    pub other_leg_callee_number: Option<String>,
    pub caller_callee_id_number: Option<String>,
}

/// Outbound leg created: `CHANNEL_OUTGOING`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CallOutgoing {
    pub unique_id: Option<String>,
    pub caller_id_number: Option<String>,
    pub caller_id_name: Option<String>,
    pub destination_number: Option<String>,
    pub variable_originate_disposition: Option<String>,
    pub other_leg_caller_id_number: Option<String>,
}

/// Channel gone, with billing counters: `CHANNEL_HANGUP_COMPLETE`.
///
/// Durations are seconds, passed through as FreeSWITCH formats them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CallEnd {
    pub unique_id: Option<String>,
    pub caller_id_number: Option<String>,
    pub caller_id_name: Option<String>,
    pub destination_number: Option<String>,
    pub variable_sip_to_user: Option<String>,
    pub hangup_cause: Option<String>,
    pub variable_duration: Option<String>,
    pub variable_billsec: Option<String>,
    pub variable_answersec: Option<String>,
}

/// One call-lifecycle record, tagged with the event it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum CallRecord {
    #[serde(rename = "CHANNEL_CREATE")]
    Start(CallStart),
    #[serde(rename = "CHANNEL_ANSWER")]
    Answer(CallAnswer),
    #[serde(rename = "CHANNEL_BRIDGE")]
    Bridge(CallBridge),
    #[serde(rename = "CHANNEL_OUTGOING")]
    Outgoing(CallOutgoing),
    #[serde(rename = "CHANNEL_HANGUP_COMPLETE")]
    End(CallEnd),
}

impl CallRecord {
    /// Extract the record for a call-lifecycle event; `None` for any other event.
    pub fn from_event(event: &EslEvent) -> Option<Self> {
        let h = |name: &str| {
            event
                .header(name)
                .map(str::to_string)
        };

        let record = match event.event_name() {
            EVENT_CHANNEL_CREATE => CallRecord::Start(CallStart {
                unique_id: h("Unique-ID"),
                caller_id_number: h("Caller-Caller-ID-Number"),
                caller_id_name: h("Caller-Caller-ID-Name"),
                destination_number: h("Caller-Destination-Number"),
                call_direction: h("Call-Direction"),
                called_context: h("Caller-Context"),
                fs_hostname: h("FreeSWITCH-Hostname"),
            }),
            EVENT_CHANNEL_ANSWER => CallRecord::Answer(CallAnswer {
                unique_id: h("Unique-ID"),
                caller_id_number: h("Caller-Caller-ID-Number"),
                caller_id_name: h("Caller-Caller-ID-Name"),
                destination_number: h("Caller-Destination-Number"),
                variable_sip_to_user: h("variable_sip_to_user"),
                answer_state: h("Answer-State"),
                caller_channel_answered_time: h("Caller-Channel-Answered-Time"),
            }),
            EVENT_CHANNEL_BRIDGE => CallRecord::Bridge(CallBridge {
                unique_id: h("Unique-ID"),
                caller_id_number: h("Caller-Caller-ID-Number"),
                caller_id_name: h("Caller-Caller-ID-Name"),
                group_destination_number: h("Caller-Destination-Number"),
                other_leg_destination_number: h("Other-Leg-Destination-Number"),
                other_leg_callee_number: h("Other-Leg-Callee-ID-Number"),
                caller_callee_id_number: h("Caller-Callee-ID-Number"),
            }),
            EVENT_CHANNEL_OUTGOING => CallRecord::Outgoing(CallOutgoing {
                unique_id: h("Unique-ID"),
                caller_id_number: h("Caller-Caller-ID-Number"),
                caller_id_name: h("Caller-Caller-ID-Name"),
                destination_number: h("Caller-Destination-Number"),
                variable_originate_disposition: h("variable_originate_disposition"),
                other_leg_caller_id_number: h("Caller-Orig-Caller-ID-Number"),
            }),
            EVENT_CHANNEL_HANGUP_COMPLETE => CallRecord::End(CallEnd {
                unique_id: h("Unique-ID"),
                caller_id_number: h("Caller-Caller-ID-Number"),
                caller_id_name: h("Caller-Caller-ID-Name"),
                destination_number: h("Caller-Destination-Number"),
                variable_sip_to_user: h("variable_sip_to_user"),
                hangup_cause: h("Hangup-Cause"),
                variable_duration: h("variable_duration"),
                variable_billsec: h("variable_billsec"),
                variable_answersec: h("variable_answersec"),
            }),
            _ => return None,
        };
        Some(record)
    }

    /// Channel UUID of the record
    pub fn unique_id(&self) -> Option<&str> {
        match self {
            CallRecord::Start(r) => r.unique_id.as_deref(),
            CallRecord::Answer(r) => r.unique_id.as_deref(),
            CallRecord::Bridge(r) => r.unique_id.as_deref(),
            CallRecord::Outgoing(r) => r.unique_id.as_deref(),
            CallRecord::End(r) => r.unique_id.as_deref(),
        }
    }

    /// JSON payload, e.g. `{"event":"CHANNEL_ANSWER","unique_id":"...",...}`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
