//! Sensor domain model for the datacenter installation
//!
//! Defines the fixed set of monitored sensor kinds, the reading value model,
//! and the threshold classification rules:
//!
//! 1. [`classify`] - Pure threshold classification of a single reading
//!
//! Readings are value objects: a new event replaces the whole reading, it is
//! never updated in place. A reading whose `observed_at` is `None` has never
//! been received from the installation.

pub mod classify;

pub use classify::{classify, SensorStatus, Severity, StatusLabel};

use chrono::{DateTime, Local};

/// Sensor kinds wired into the datacenter installation.
///
/// Extending the set means adding a variant here plus a rule in
/// [`classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Temperature,
    Humidity,
    Motion,
    Gas,
}

impl SensorKind {
    /// Wire/display name, matching the topic segment the firmware publishes on.
    pub fn name(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
            SensorKind::Motion => "motion",
            SensorKind::Gas => "gas",
        }
    }

    /// Measurement unit suffix used in human-facing alert text.
    pub fn unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Humidity => "%",
            SensorKind::Motion => "",
            SensorKind::Gas => " ppm",
        }
    }
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Raw value carried by a sensor reading. Motion reports a boolean, the
/// environmental sensors report numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorValue {
    Number(f64),
    Bool(bool),
}

impl std::fmt::Display for SensorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorValue::Number(v) => write!(f, "{}", v),
            SensorValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// A single sensor reading. Replaced wholesale when a new event arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub value: SensorValue,
    /// `None` until the first event for this sensor arrives.
    pub observed_at: Option<DateTime<Local>>,
}

impl SensorReading {
    pub fn observed(value: SensorValue, at: DateTime<Local>) -> Self {
        Self {
            value,
            observed_at: Some(at),
        }
    }

    pub fn never(value: SensorValue) -> Self {
        Self {
            value,
            observed_at: None,
        }
    }
}

/// The live reading per sensor kind. Owned exclusively by the monitor task;
/// everyone else sees cloned snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReadings {
    pub temperature: SensorReading,
    pub humidity: SensorReading,
    pub motion: SensorReading,
    pub gas: SensorReading,
}

impl SensorReadings {
    /// Dashboard seed values used until live data arrives. Motion starts as
    /// "never received".
    pub fn seed(now: DateTime<Local>) -> Self {
        Self {
            temperature: SensorReading::observed(SensorValue::Number(22.0), now),
            humidity: SensorReading::observed(SensorValue::Number(45.0), now),
            motion: SensorReading::never(SensorValue::Bool(false)),
            gas: SensorReading::observed(SensorValue::Number(150.0), now),
        }
    }

    pub fn get(&self, kind: SensorKind) -> &SensorReading {
        match kind {
            SensorKind::Temperature => &self.temperature,
            SensorKind::Humidity => &self.humidity,
            SensorKind::Motion => &self.motion,
            SensorKind::Gas => &self.gas,
        }
    }

    pub fn replace(&mut self, kind: SensorKind, reading: SensorReading) {
        match kind {
            SensorKind::Temperature => self.temperature = reading,
            SensorKind::Humidity => self.humidity = reading,
            SensorKind::Motion => self.motion = reading,
            SensorKind::Gas => self.gas = reading,
        }
    }

    /// Status derived from the current reading. Always recomputed, never
    /// cached.
    pub fn status(&self, kind: SensorKind) -> SensorStatus {
        classify(kind, self.get(kind).value)
    }
}
