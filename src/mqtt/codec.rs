//! Decoding of raw broker messages into typed domain events.
//!
//! The firmware publishes loosely shaped JSON objects; this codec is the one
//! place that turns a `(topic, payload)` pair into a closed set of event
//! variants. Everything downstream works on [`InboundEvent`] values, never
//! on raw dictionaries. Undecodable messages are dropped by the caller with
//! a log line; MQTT gives us no way to ask for a redelivery.

use serde::Deserialize;
use thiserror::Error;

use crate::door::DoorPhase;

/// Payload value the firmware sends when the PIR sensor trips.
pub const MOTION_ALERT: &str = "MOTION_DETECTED";

/// Typed event decoded from one broker message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Motion sensor report from `…/motion`.
    Motion { detected: bool },
    /// Authoritative door status from `…/status`.
    DoorStatus { phase: DoorPhase, manual: bool },
    /// Message on a topic this client has no handler for. Forwarded so the
    /// consumer can log it; produces no state change.
    Unrecognized { topic: String, raw: String },
}

/// Reasons a broker message could not be decoded.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed payload on {topic}: {reason}")]
    MalformedPayload { topic: String, reason: String },

    #[error("payload on {topic} is missing the `{field}` field")]
    MissingField { topic: String, field: &'static str },
}

/// Superset of all fields the firmware may put into a payload. Which ones
/// are required is decided per topic.
#[derive(Debug, Deserialize)]
struct RawPayload {
    alert: Option<String>,
    door: Option<String>,
    manual: Option<bool>,
}

/// Decode one `(topic, payload)` pair into a typed event.
pub fn decode(topic: &str, payload: &[u8]) -> Result<InboundEvent, DecodeError> {
    if topic.ends_with("/motion") {
        let raw = parse(topic, payload)?;
        // Any other alert value, or no alert field at all, means "clear".
        let detected = raw.alert.as_deref() == Some(MOTION_ALERT);
        Ok(InboundEvent::Motion { detected })
    } else if topic.ends_with("/status") {
        let raw = parse(topic, payload)?;
        let door = raw.door.ok_or_else(|| DecodeError::MissingField {
            topic: topic.to_string(),
            field: "door",
        })?;
        let phase = match door.as_str() {
            "OPEN" => DoorPhase::Open,
            "CLOSED" => DoorPhase::Closed,
            other => {
                return Err(DecodeError::MalformedPayload {
                    topic: topic.to_string(),
                    reason: format!("unknown door state `{other}`"),
                })
            }
        };
        Ok(InboundEvent::DoorStatus {
            phase,
            manual: raw.manual.unwrap_or(false),
        })
    } else {
        Ok(InboundEvent::Unrecognized {
            topic: topic.to_string(),
            raw: String::from_utf8_lossy(payload).into_owned(),
        })
    }
}

fn parse(topic: &str, payload: &[u8]) -> Result<RawPayload, DecodeError> {
    serde_json::from_slice(payload).map_err(|err| DecodeError::MalformedPayload {
        topic: topic.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn motion_alert_decodes_as_detected() {
        let event = decode("datacenter/motion", br#"{"alert":"MOTION_DETECTED"}"#);
        assert_eq!(event.unwrap(), InboundEvent::Motion { detected: true });
    }

    #[test]
    fn motion_without_alert_field_is_clear() {
        let event = decode("datacenter/motion", b"{}");
        assert_eq!(event.unwrap(), InboundEvent::Motion { detected: false });
    }

    #[test]
    fn motion_with_other_alert_value_is_clear() {
        let event = decode("datacenter/motion", br#"{"alert":"ALL_CLEAR"}"#);
        assert_eq!(event.unwrap(), InboundEvent::Motion { detected: false });
    }

    #[test]
    fn status_decodes_door_and_manual() {
        let event = decode("datacenter/status", br#"{"door":"OPEN","manual":true}"#);
        assert_eq!(
            event.unwrap(),
            InboundEvent::DoorStatus {
                phase: DoorPhase::Open,
                manual: true,
            }
        );
    }

    #[test]
    fn status_manual_defaults_to_false() {
        let event = decode("datacenter/status", br#"{"door":"CLOSED"}"#);
        assert_eq!(
            event.unwrap(),
            InboundEvent::DoorStatus {
                phase: DoorPhase::Closed,
                manual: false,
            }
        );
    }

    #[test]
    fn status_without_door_field_is_rejected() {
        let err = decode("datacenter/status", b"{}").unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { field: "door", .. }));
    }

    #[test]
    fn status_with_unknown_door_state_is_rejected() {
        let err = decode("datacenter/status", br#"{"door":"AJAR"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload { .. }));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = decode("datacenter/motion", b"not json").unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload { .. }));
    }

    #[test]
    fn unknown_topic_is_forwarded_as_unrecognized() {
        let event = decode("datacenter/firmware", br#"{"version":"1.1.0"}"#).unwrap();
        match event {
            InboundEvent::Unrecognized { topic, raw } => {
                assert_eq!(topic, "datacenter/firmware");
                assert!(raw.contains("1.1.0"));
            }
            other => panic!("expected Unrecognized, got {other:?}"),
        }
    }
}
