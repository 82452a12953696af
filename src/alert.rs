//! Alert dispatch policy and the notification capability.
//!
//! The policy decides which classified state transitions must reach a human.
//! It fires when a sensor's severity enters an alert-worthy level and keeps
//! the condition "live" by refiring after a configurable minimum interval,
//! so a sensor that stays critical is not silently forgotten but also does
//! not spam a notification on every broker message.
//!
//! Delivery itself is behind the [`NotificationSink`] trait; the shipped
//! implementation writes to the log. Push delivery is a platform concern
//! and not part of this core.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Local};
use tracing::info;

use crate::door::DoorPhase;
use crate::sensors::{SensorKind, SensorStatus, SensorValue, Severity, StatusLabel};

/// Capability for delivering a user-facing alert.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, title: &str, body: &str, metadata: &HashMap<String, String>);
}

/// Sink that writes alerts to the application log.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn notify(&self, title: &str, body: &str, metadata: &HashMap<String, String>) {
        info!(title, body, ?metadata, "ALERT");
    }
}

/// Source a fired alert is attributed to and de-duplicated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertKey {
    Sensor(SensorKind),
    Door(DoorPhase),
}

impl std::fmt::Display for AlertKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKey::Sensor(kind) => write!(f, "{kind}"),
            AlertKey::Door(phase) => write!(f, "door:{phase}"),
        }
    }
}

/// Everything the sink needs to render a human message.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPayload {
    pub key: AlertKey,
    pub label: StatusLabel,
    pub severity: Severity,
    pub value: SensorValue,
    pub at: DateTime<Local>,
}

impl AlertPayload {
    pub fn title(&self) -> String {
        match self.key {
            AlertKey::Sensor(SensorKind::Motion) => "Motion Detected!".to_string(),
            AlertKey::Sensor(SensorKind::Gas) => "Gas Level Warning!".to_string(),
            AlertKey::Sensor(SensorKind::Temperature) => "Temperature Alert!".to_string(),
            AlertKey::Sensor(SensorKind::Humidity) => "Humidity Alert!".to_string(),
            AlertKey::Door(_) => "Door Alert!".to_string(),
        }
    }

    pub fn body(&self) -> String {
        match self.key {
            AlertKey::Sensor(SensorKind::Motion) => {
                "Unauthorized movement detected in datacenter".to_string()
            }
            AlertKey::Sensor(SensorKind::Gas) => format!(
                "Gas concentration at {}{} - Check datacenter immediately",
                self.value,
                SensorKind::Gas.unit()
            ),
            AlertKey::Sensor(kind) => format!(
                "Datacenter {} at {}{} - Outside optimal range",
                kind,
                self.value,
                kind.unit()
            ),
            AlertKey::Door(phase) => format!("Door reported {phase}"),
        }
    }

    pub fn metadata(&self) -> HashMap<String, String> {
        HashMap::from([
            ("kind".to_string(), self.key.to_string()),
            ("severity".to_string(), format!("{:?}", self.severity)),
            ("value".to_string(), self.value.to_string()),
        ])
    }
}

/// De-duplication bookkeeping for one alert source. Ephemeral, rebuilt from
/// scratch on every process start.
#[derive(Debug, Clone)]
struct AlertRecord {
    last_severity: Severity,
    last_sent_at: Option<DateTime<Local>>,
}

/// Decides which classified transitions turn into notifications.
pub struct AlertPolicy {
    min_interval: Duration,
    records: HashMap<AlertKey, AlertRecord>,
}

impl AlertPolicy {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            records: HashMap::new(),
        }
    }

    /// Evaluate one classified reading.
    ///
    /// Fires when the severity transitions into `Critical` or `Detected`
    /// from a different severity, or when the severity holds there and at
    /// least `min_interval` has passed since the last fire for this key.
    /// Transitions into `Normal` or `Warning` never fire.
    pub fn evaluate(
        &mut self,
        key: AlertKey,
        status: SensorStatus,
        value: SensorValue,
        now: DateTime<Local>,
    ) -> Option<AlertPayload> {
        let alerting = matches!(status.severity, Severity::Critical | Severity::Detected);

        let record = self.records.entry(key).or_insert(AlertRecord {
            last_severity: Severity::Normal,
            last_sent_at: None,
        });

        let transitioned = record.last_severity != status.severity;
        record.last_severity = status.severity;

        if !alerting {
            return None;
        }

        let due = match record.last_sent_at {
            Some(sent_at) => now - sent_at >= self.min_interval,
            None => true,
        };
        if !transitioned && !due {
            return None;
        }

        record.last_sent_at = Some(now);
        Some(AlertPayload {
            key,
            label: status.label,
            severity: status.severity,
            value,
            at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::classify;

    fn policy() -> AlertPolicy {
        AlertPolicy::new(Duration::seconds(60))
    }

    fn gas(v: f64) -> (SensorStatus, SensorValue) {
        let value = SensorValue::Number(v);
        (classify(SensorKind::Gas, value), value)
    }

    #[test]
    fn fires_on_transition_into_critical() {
        let mut policy = policy();
        let now = Local::now();
        let (status, value) = gas(1200.0);
        let alert = policy.evaluate(AlertKey::Sensor(SensorKind::Gas), status, value, now);
        assert!(alert.is_some());
    }

    #[test]
    fn repeated_critical_within_interval_is_deduplicated() {
        let mut policy = policy();
        let t0 = Local::now();
        let (status, value) = gas(1200.0);
        let key = AlertKey::Sensor(SensorKind::Gas);

        assert!(policy.evaluate(key, status, value, t0).is_some());
        assert!(policy
            .evaluate(key, status, value, t0 + Duration::seconds(5))
            .is_none());
        assert!(policy
            .evaluate(key, status, value, t0 + Duration::seconds(61))
            .is_some());
    }

    #[test]
    fn recovery_and_relapse_fires_again() {
        let mut policy = policy();
        let t0 = Local::now();
        let key = AlertKey::Sensor(SensorKind::Gas);

        let (critical, high) = gas(1200.0);
        let (safe, low) = gas(150.0);

        assert!(policy.evaluate(key, critical, high, t0).is_some());
        assert!(policy
            .evaluate(key, safe, low, t0 + Duration::seconds(1))
            .is_none());
        // Back to critical within the interval: the severity transitioned,
        // so the alert fires again.
        assert!(policy
            .evaluate(key, critical, high, t0 + Duration::seconds(2))
            .is_some());
    }

    #[test]
    fn warning_severity_never_fires() {
        let mut policy = policy();
        let now = Local::now();
        let (status, value) = gas(700.0);
        assert_eq!(status.severity, Severity::Warning);
        assert!(policy
            .evaluate(AlertKey::Sensor(SensorKind::Gas), status, value, now)
            .is_none());
    }

    #[test]
    fn keys_are_deduplicated_independently() {
        let mut policy = policy();
        let now = Local::now();
        let (status, value) = gas(1200.0);
        let motion_value = SensorValue::Bool(true);
        let motion_status = classify(SensorKind::Motion, motion_value);

        assert!(policy
            .evaluate(AlertKey::Sensor(SensorKind::Gas), status, value, now)
            .is_some());
        assert!(policy
            .evaluate(
                AlertKey::Sensor(SensorKind::Motion),
                motion_status,
                motion_value,
                now
            )
            .is_some());
    }

    #[test]
    fn motion_payload_uses_the_dashboard_copy() {
        let mut policy = policy();
        let now = Local::now();
        let value = SensorValue::Bool(true);
        let status = classify(SensorKind::Motion, value);
        let alert = policy
            .evaluate(AlertKey::Sensor(SensorKind::Motion), status, value, now)
            .expect("motion detection should alert");

        assert_eq!(alert.title(), "Motion Detected!");
        assert_eq!(alert.body(), "Unauthorized movement detected in datacenter");
        assert_eq!(alert.metadata().get("kind").map(String::as_str), Some("motion"));
    }
}
