//! Door access state with optimistic local control.
//!
//! The app can request the door to open before the firmware confirms it, so
//! the UI reacts immediately despite network latency. The remote actuator is
//! the single source of truth: whenever an authoritative status event
//! arrives, it overwrites whatever the local intent set.

/// Physical door position as far as this client knows.
///
/// `Unknown` only exists before the first authoritative status event; once
/// the firmware has reported, the phase never reverts to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DoorPhase {
    Open,
    Closed,
    #[default]
    Unknown,
}

impl std::fmt::Display for DoorPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            DoorPhase::Open => "OPEN",
            DoorPhase::Closed => "CLOSED",
            DoorPhase::Unknown => "UNKNOWN",
        })
    }
}

/// Whether the door was last driven by a manual command or by the
/// installation's own automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoorMode {
    Manual,
    #[default]
    Automatic,
}

/// Reconciles locally issued door commands with authoritative firmware
/// status events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DoorState {
    pub phase: DoorPhase,
    pub mode: DoorMode,
}

impl DoorState {
    /// Optimistic local transition for an "open door" command: the phase
    /// flips to `Open` in manual mode before any confirmation arrives.
    pub fn request_open(&mut self) {
        self.phase = DoorPhase::Open;
        self.mode = DoorMode::Manual;
    }

    /// Apply a status event reported by the firmware. Always wins over any
    /// optimistic local state, regardless of arrival order.
    pub fn apply_authoritative(&mut self, phase: DoorPhase, manual: bool) {
        self.phase = phase;
        self.mode = if manual {
            DoorMode::Manual
        } else {
            DoorMode::Automatic
        };
    }
}
