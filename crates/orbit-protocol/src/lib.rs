#![forbid(unsafe_code)]

mod notifications;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use notifications::{parse_notification, ChangeNotification};

/// Current notification envelope version.
pub const PROTOCOL_VERSION: u16 = 1;
/// Maximum allowed notification payload bytes.
pub const MAX_EVENT_BYTES: usize = 16 * 1024;

/// Versioned change notification envelope, `{ v, t, d }` on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope<T> {
    pub v: u16,
    pub t: EventType,
    pub d: T,
}

/// The closed set of change notifications a planet publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RoleChanged,
    NodeChanged,
    MembershipChanged,
    ChannelChanged,
    RoleOrderChanged,
}

impl EventType {
    pub const ALL: [Self; 5] = [
        Self::RoleChanged,
        Self::NodeChanged,
        Self::MembershipChanged,
        Self::ChannelChanged,
        Self::RoleOrderChanged,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RoleChanged => "role_changed",
            Self::NodeChanged => "node_changed",
            Self::MembershipChanged => "membership_changed",
            Self::ChannelChanged => "channel_changed",
            Self::RoleOrderChanged => "role_order_changed",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ProtocolError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|event_type| event_type.as_str() == value)
            .ok_or_else(|| ProtocolError::UnknownEventType(value.to_owned()))
    }
}

// The event type is read as a plain string first so an unknown kind is
// reported as such instead of as malformed json.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEnvelope {
    v: u16,
    t: String,
    d: serde_json::Value,
}

/// Parse and validate an incoming envelope at the network boundary.
///
/// # Errors
/// Returns [`ProtocolError`] if the payload exceeds limits, is malformed JSON,
/// carries an unsupported version or names an unknown event type.
pub fn parse_envelope(input: &[u8]) -> Result<Envelope<serde_json::Value>, ProtocolError> {
    if input.len() > MAX_EVENT_BYTES {
        return Err(ProtocolError::OversizedPayload {
            max: MAX_EVENT_BYTES,
            actual: input.len(),
        });
    }

    let raw: RawEnvelope = serde_json::from_slice(input)?;
    if raw.v != PROTOCOL_VERSION {
        return Err(ProtocolError::UnsupportedVersion {
            expected: PROTOCOL_VERSION,
            actual: raw.v,
        });
    }

    Ok(Envelope {
        v: raw.v,
        t: raw.t.parse()?,
        d: raw.d,
    })
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("payload exceeds max size: max={max} bytes actual={actual} bytes")]
    OversizedPayload { max: usize, actual: usize },
    #[error("unsupported envelope version: expected={expected} actual={actual}")]
    UnsupportedVersion { expected: u16, actual: u16 },
    #[error("unknown event type: {0}")]
    UnknownEventType(String),
    #[error("invalid json payload")]
    InvalidJson,
}

impl From<serde_json::Error> for ProtocolError {
    fn from(_: serde_json::Error) -> Self {
        Self::InvalidJson
    }
}
