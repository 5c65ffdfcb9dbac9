//! Change notifications exchanged with the storage and fan-out layers.
//!
//! Delivery is at-least-once and unordered across distinct ids, so every
//! notification only names what changed, never the new value.

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{parse_envelope, Envelope, EventType, ProtocolError, PROTOCOL_VERSION};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeNotification {
    /// Base bits, admin flag or existence of a role changed.
    RoleChanged { role_id: String },
    NodeChanged {
        role_id: String,
        channel_id: String,
        target_kind: String,
    },
    MembershipChanged { member_id: String },
    /// Parent, inheritance flag or kind of a channel changed.
    ChannelChanged { channel_id: String },
    RoleOrderChanged { planet_id: String },
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RolePayload {
    role_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NodePayload {
    role_id: String,
    channel_id: String,
    target_kind: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MemberPayload {
    member_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChannelPayload {
    channel_id: String,
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PlanetPayload {
    planet_id: String,
}

impl ChangeNotification {
    #[must_use]
    pub const fn event_type(&self) -> EventType {
        match self {
            Self::RoleChanged { .. } => EventType::RoleChanged,
            Self::NodeChanged { .. } => EventType::NodeChanged,
            Self::MembershipChanged { .. } => EventType::MembershipChanged,
            Self::ChannelChanged { .. } => EventType::ChannelChanged,
            Self::RoleOrderChanged { .. } => EventType::RoleOrderChanged,
        }
    }

    /// # Errors
    /// Returns [`ProtocolError::InvalidJson`] if the payload cannot be encoded.
    pub fn to_envelope(&self) -> Result<Envelope<serde_json::Value>, ProtocolError> {
        let d = match self {
            Self::RoleChanged { role_id } => serde_json::to_value(RolePayload {
                role_id: role_id.clone(),
            })?,
            Self::NodeChanged {
                role_id,
                channel_id,
                target_kind,
            } => serde_json::to_value(NodePayload {
                role_id: role_id.clone(),
                channel_id: channel_id.clone(),
                target_kind: target_kind.clone(),
            })?,
            Self::MembershipChanged { member_id } => serde_json::to_value(MemberPayload {
                member_id: member_id.clone(),
            })?,
            Self::ChannelChanged { channel_id } => serde_json::to_value(ChannelPayload {
                channel_id: channel_id.clone(),
            })?,
            Self::RoleOrderChanged { planet_id } => serde_json::to_value(PlanetPayload {
                planet_id: planet_id.clone(),
            })?,
        };
        Ok(Envelope {
            v: PROTOCOL_VERSION,
            t: self.event_type(),
            d,
        })
    }

    /// # Errors
    /// Returns [`ProtocolError::InvalidJson`] if the envelope cannot be encoded.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(serde_json::to_vec(&self.to_envelope()?)?)
    }

    /// # Errors
    /// Returns [`ProtocolError::InvalidJson`] for payloads that do not match
    /// their event type.
    pub fn from_envelope(envelope: Envelope<serde_json::Value>) -> Result<Self, ProtocolError> {
        let Envelope { t, d, .. } = envelope;
        match t {
            EventType::RoleChanged => {
                let RolePayload { role_id } = payload(d)?;
                Ok(Self::RoleChanged { role_id })
            }
            EventType::NodeChanged => {
                let NodePayload {
                    role_id,
                    channel_id,
                    target_kind,
                } = payload(d)?;
                Ok(Self::NodeChanged {
                    role_id,
                    channel_id,
                    target_kind,
                })
            }
            EventType::MembershipChanged => {
                let MemberPayload { member_id } = payload(d)?;
                Ok(Self::MembershipChanged { member_id })
            }
            EventType::ChannelChanged => {
                let ChannelPayload { channel_id } = payload(d)?;
                Ok(Self::ChannelChanged { channel_id })
            }
            EventType::RoleOrderChanged => {
                let PlanetPayload { planet_id } = payload(d)?;
                Ok(Self::RoleOrderChanged { planet_id })
            }
        }
    }
}

fn payload<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ProtocolError> {
    Ok(serde_json::from_value(value)?)
}

/// Parse a raw notification envelope.
///
/// # Errors
/// Any [`ProtocolError`] raised by [`parse_envelope`] or
/// [`ChangeNotification::from_envelope`].
pub fn parse_notification(input: &[u8]) -> Result<ChangeNotification, ProtocolError> {
    ChangeNotification::from_envelope(parse_envelope(input)?)
}

#[cfg(test)]
mod tests {
    use super::{parse_notification, ChangeNotification};
    use crate::ProtocolError;

    #[test]
    fn node_changed_is_parsed_from_its_envelope() {
        let payload = br#"{"v":1,"t":"node_changed","d":{"role_id":"r","channel_id":"c","target_kind":"chat"}}"#;
        assert_eq!(
            parse_notification(payload).unwrap(),
            ChangeNotification::NodeChanged {
                role_id: String::from("r"),
                channel_id: String::from("c"),
                target_kind: String::from("chat"),
            }
        );
    }

    #[test]
    fn encoded_notifications_parse_back() {
        let notification = ChangeNotification::RoleOrderChanged {
            planet_id: String::from("01J0000000000000000000000A"),
        };
        let bytes = notification.encode().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(r#""t":"role_order_changed""#));
        assert_eq!(parse_notification(&bytes).unwrap(), notification);
    }

    #[test]
    fn unknown_event_types_are_rejected() {
        let payload = br#"{"v":1,"t":"message_create","d":{}}"#;
        assert_eq!(
            parse_notification(payload).unwrap_err(),
            ProtocolError::UnknownEventType(String::from("message_create"))
        );
    }

    #[test]
    fn payload_must_match_event_type() {
        let payload = br#"{"v":1,"t":"role_changed","d":{"member_id":"m"}}"#;
        assert_eq!(
            parse_notification(payload).unwrap_err(),
            ProtocolError::InvalidJson
        );
    }
}
