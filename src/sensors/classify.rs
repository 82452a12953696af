//! Threshold classification for sensor readings.
//!
//! Pure and total: every `(kind, value)` pair maps to a status, including
//! value shapes that do not match the sensor (a boolean on a numeric sensor
//! classifies as `UNKNOWN`). Thresholds are strict comparisons; a value
//! sitting exactly on a boundary is in the normal band.

use super::{SensorKind, SensorValue};

/// Ordinal severity of a classified reading, driving the alert policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Normal,
    Warning,
    Critical,
    Detected,
}

/// Human-facing status label, matching the strings the dashboard renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLabel {
    Optimal,
    Low,
    High,
    Safe,
    Warning,
    Critical,
    Detected,
    Clear,
    Unknown,
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            StatusLabel::Optimal => "OPTIMAL",
            StatusLabel::Low => "LOW",
            StatusLabel::High => "HIGH",
            StatusLabel::Safe => "SAFE",
            StatusLabel::Warning => "WARNING",
            StatusLabel::Critical => "CRITICAL",
            StatusLabel::Detected => "DETECTED",
            StatusLabel::Clear => "CLEAR",
            StatusLabel::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Classification result. Derived from the current reading on demand,
/// never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorStatus {
    pub label: StatusLabel,
    pub severity: Severity,
}

impl SensorStatus {
    fn new(label: StatusLabel, severity: Severity) -> Self {
        Self { label, severity }
    }
}

/// Classify a raw reading against the datacenter thresholds.
///
/// Temperature and humidity have a low-warning and high-critical band, gas
/// escalates through warning to critical, motion is a plain detection flag.
pub fn classify(kind: SensorKind, value: SensorValue) -> SensorStatus {
    match (kind, value) {
        (SensorKind::Temperature, SensorValue::Number(v)) => {
            if v < 18.0 {
                SensorStatus::new(StatusLabel::Low, Severity::Warning)
            } else if v > 27.0 {
                SensorStatus::new(StatusLabel::High, Severity::Critical)
            } else {
                SensorStatus::new(StatusLabel::Optimal, Severity::Normal)
            }
        }
        (SensorKind::Humidity, SensorValue::Number(v)) => {
            if v < 30.0 {
                SensorStatus::new(StatusLabel::Low, Severity::Warning)
            } else if v > 60.0 {
                SensorStatus::new(StatusLabel::High, Severity::Critical)
            } else {
                SensorStatus::new(StatusLabel::Optimal, Severity::Normal)
            }
        }
        (SensorKind::Gas, SensorValue::Number(v)) => {
            if v > 1000.0 {
                SensorStatus::new(StatusLabel::Critical, Severity::Critical)
            } else if v > 500.0 {
                SensorStatus::new(StatusLabel::Warning, Severity::Warning)
            } else {
                SensorStatus::new(StatusLabel::Safe, Severity::Normal)
            }
        }
        (SensorKind::Motion, SensorValue::Bool(detected)) => {
            if detected {
                SensorStatus::new(StatusLabel::Detected, Severity::Detected)
            } else {
                SensorStatus::new(StatusLabel::Clear, Severity::Normal)
            }
        }
        // Value shape does not match the sensor kind
        _ => SensorStatus::new(StatusLabel::Unknown, Severity::Normal),
    }
}
