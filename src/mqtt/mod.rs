//! # MQTT Integration Module
//!
//! Everything that touches the broker lives here: connection supervision,
//! message decoding, and the outbound command path. The rest of the
//! application only ever sees typed [`codec::InboundEvent`] values and the
//! [`supervisor::ConnectionState`] watch channel.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs      - Broker address, credentials, topics, retry budget
//! ├── codec.rs       - (topic, payload) -> typed InboundEvent
//! └── supervisor.rs  - Connection state machine and lifecycle
//! ```
//!
//! ## Design Philosophy
//!
//! - **One connection per process**: the supervisor is explicitly
//!   constructed and owned, never a hidden global.
//! - **Channel architecture**: decoded events flow forward over an mpsc
//!   channel, connectivity over a watch channel; nothing holds a reference
//!   back into the supervisor's state.
//! - **Fail-soft transport**: every transport error is retried or surfaced
//!   as `Disconnected`; none of them can crash the process.

pub mod codec;
pub mod config;
pub mod supervisor;

pub use codec::{DecodeError, InboundEvent};
pub use config::{MqttConfig, CONTROL_TOPIC, OPEN_DOOR_COMMAND};
pub use supervisor::{ConnectionState, MqttSupervisor, TransportError};

/// A command queued for publication to the broker.
///
/// Kept as raw topic/payload so the monitor does not need to know transport
/// details beyond the firmware's control-verb contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundCommand {
    pub topic: String,
    pub payload: String,
}

impl OutboundCommand {
    /// The door-open command understood by the installation firmware.
    pub fn open_door() -> Self {
        Self {
            topic: CONTROL_TOPIC.to_string(),
            payload: OPEN_DOOR_COMMAND.to_string(),
        }
    }
}
