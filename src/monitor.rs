//! Monitor orchestration - wires the broker events into domain state.
//!
//! One background task owns the live sensor readings and the door state and
//! is the only writer of both. It consumes decoded broker events and local
//! door commands from channels, so a `request_open` can never interleave
//! with a concurrent authoritative status event. Observers pull an owned
//! [`MonitorSnapshot`] out of a shared cell; nothing pushes state at the
//! presentation layer.

use std::sync::{Arc, RwLock};

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::alert::{AlertKey, AlertPolicy, NotificationSink};
use crate::door::DoorState;
use crate::mqtt::{ConnectionState, InboundEvent, OutboundCommand};
use crate::sensors::{SensorKind, SensorReading, SensorReadings, SensorStatus, SensorValue};

/// Orchestrator tuning, split out of the broker config.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// When false the client is a monitor-only variant: door status events
    /// are ignored and open requests are refused.
    pub door_control: bool,
    /// Minimum interval between repeated alerts for the same source.
    pub alert_min_interval: chrono::Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            door_control: true,
            alert_min_interval: chrono::Duration::seconds(60),
        }
    }
}

/// Owned copy of the full device state, handed to the presentation layer
/// on demand.
#[derive(Debug, Clone)]
pub struct MonitorSnapshot {
    pub connection: ConnectionState,
    pub sensors: SensorReadings,
    pub door: DoorState,
}

impl MonitorSnapshot {
    /// Status of one sensor, derived from the reading in this snapshot.
    pub fn status(&self, kind: SensorKind) -> SensorStatus {
        self.sensors.status(kind)
    }
}

/// Failures of the command path between a caller and the monitor task.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor is not running")]
    Closed,

    #[error("monitor command queue is full")]
    Busy,
}

enum MonitorCommand {
    OpenDoor,
}

/// Caller-facing handle: snapshot reads and door commands.
#[derive(Clone)]
pub struct MonitorHandle {
    command_tx: mpsc::Sender<MonitorCommand>,
    snapshot: Arc<RwLock<MonitorSnapshot>>,
}

impl MonitorHandle {
    /// Owned copy of the current device state. Never blocks beyond the
    /// clone under the lock.
    pub fn snapshot(&self) -> MonitorSnapshot {
        match self.snapshot.read() {
            Ok(cell) => cell.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Queue an "open door" request. Applied optimistically by the monitor
    /// task; the firmware's status event reconciles it later.
    pub fn request_open(&self) -> Result<(), MonitorError> {
        self.command_tx
            .try_send(MonitorCommand::OpenDoor)
            .map_err(|err| match err {
                mpsc::error::TrySendError::Full(_) => MonitorError::Busy,
                mpsc::error::TrySendError::Closed(_) => MonitorError::Closed,
            })
    }
}

/// The single writer of sensor readings and door state.
pub struct Monitor {
    settings: MonitorSettings,
    outbound_tx: mpsc::Sender<OutboundCommand>,
    state_rx: watch::Receiver<ConnectionState>,
    snapshot: Arc<RwLock<MonitorSnapshot>>,
    policy: AlertPolicy,
    sink: Arc<dyn NotificationSink>,
    sensors: SensorReadings,
    door: DoorState,
}

impl Monitor {
    /// Spawn the monitor task and return its handle.
    pub fn spawn(
        settings: MonitorSettings,
        inbound_rx: mpsc::Receiver<InboundEvent>,
        outbound_tx: mpsc::Sender<OutboundCommand>,
        state_rx: watch::Receiver<ConnectionState>,
        sink: Arc<dyn NotificationSink>,
    ) -> MonitorHandle {
        let (command_tx, command_rx) = mpsc::channel(16);
        let mut monitor = Monitor::new(settings, outbound_tx, state_rx, sink);
        let handle = MonitorHandle {
            command_tx,
            snapshot: monitor.snapshot.clone(),
        };

        tokio::spawn(async move {
            monitor.run(inbound_rx, command_rx).await;
        });

        handle
    }

    fn new(
        settings: MonitorSettings,
        outbound_tx: mpsc::Sender<OutboundCommand>,
        state_rx: watch::Receiver<ConnectionState>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let now = Local::now();
        let sensors = SensorReadings::seed(now);
        let door = DoorState::default();
        let snapshot = Arc::new(RwLock::new(MonitorSnapshot {
            connection: state_rx.borrow().clone(),
            sensors: sensors.clone(),
            door,
        }));

        Self {
            policy: AlertPolicy::new(settings.alert_min_interval),
            settings,
            outbound_tx,
            state_rx,
            snapshot,
            sink,
            sensors,
            door,
        }
    }

    async fn run(
        &mut self,
        mut inbound_rx: mpsc::Receiver<InboundEvent>,
        mut command_rx: mpsc::Receiver<MonitorCommand>,
    ) {
        info!(door_control = self.settings.door_control, "monitor started");
        let mut state_changes = self.state_rx.clone();

        loop {
            tokio::select! {
                event = inbound_rx.recv() => match event {
                    Some(event) => self.apply_event(event, Local::now()),
                    None => {
                        debug!("event source closed, monitor exiting");
                        break;
                    }
                },
                command = command_rx.recv() => match command {
                    Some(MonitorCommand::OpenDoor) => self.apply_open_request(),
                    None => {
                        debug!("all monitor handles dropped, monitor exiting");
                        break;
                    }
                },
                changed = state_changes.changed() => {
                    if changed.is_err() {
                        debug!("connection state source closed, monitor exiting");
                        break;
                    }
                    self.publish_snapshot();
                }
            }
        }
    }

    /// Apply one decoded broker event to the domain state.
    fn apply_event(&mut self, event: InboundEvent, now: DateTime<Local>) {
        match event {
            InboundEvent::Motion { detected } => {
                let value = SensorValue::Bool(detected);
                self.sensors
                    .replace(SensorKind::Motion, SensorReading::observed(value, now));

                let status = self.sensors.status(SensorKind::Motion);
                if let Some(alert) =
                    self.policy
                        .evaluate(AlertKey::Sensor(SensorKind::Motion), status, value, now)
                {
                    info!(key = %alert.key, label = %alert.label, "dispatching alert");
                    self.sink
                        .notify(&alert.title(), &alert.body(), &alert.metadata());
                }
            }
            InboundEvent::DoorStatus { phase, manual } => {
                if self.settings.door_control {
                    debug!(%phase, manual, "applying authoritative door status");
                    self.door.apply_authoritative(phase, manual);
                } else {
                    debug!("door control disabled, ignoring status event");
                }
            }
            InboundEvent::Unrecognized { topic, .. } => {
                debug!(topic = %topic, "message on unhandled topic");
            }
        }
        self.publish_snapshot();
    }

    /// Optimistically open the door and queue the firmware command.
    fn apply_open_request(&mut self) {
        if !self.settings.door_control {
            warn!("door control disabled, open request refused");
            return;
        }

        self.door.request_open();
        if let Err(err) = self.outbound_tx.try_send(OutboundCommand::open_door()) {
            warn!(error = %err, "failed to queue door-open command");
        }
        self.publish_snapshot();
    }

    fn publish_snapshot(&self) {
        let snapshot = MonitorSnapshot {
            connection: self.state_rx.borrow().clone(),
            sensors: self.sensors.clone(),
            door: self.door,
        };
        match self.snapshot.write() {
            Ok(mut cell) => *cell = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}
