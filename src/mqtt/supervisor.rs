//! Connection supervisor for the single broker link.
//!
//! Owns the rumqttc client and its event loop, drives the connection state
//! machine, and forwards decoded events to the monitor. The life of one
//! connection is a background task: poll the event loop, subscribe on
//! connect, decode publishes, and on any transport error sleep a fixed
//! interval and let the event loop dial again - up to a configured attempt
//! budget, after which the supervisor gives up and surfaces `Disconnected`.
//!
//! `stop()` cancels the task through a [`CancellationToken`] that is checked
//! before every poll and every retry sleep, so a stopped supervisor can
//! never resurrect a connection.

use std::sync::Arc;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::codec::{self, InboundEvent};
use super::config::MqttConfig;

/// Connectivity of the broker link, readable at any time without blocking.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Transport-level failures. None of these are fatal to the process; the
/// connection state is the error surface.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("supervisor is not running")]
    NotRunning,

    #[error("publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("subscription to {topic} failed: {reason}")]
    Subscribe { topic: String, reason: String },
}

/// Live connection owned by a started supervisor.
struct Running {
    cancel: CancellationToken,
    client: AsyncClient,
    task: JoinHandle<()>,
}

/// Supervises exactly one broker connection per process.
///
/// Explicitly constructed and owned; lifecycle is `start`/`stop`. Decoded
/// events go out the channel handed to [`MqttSupervisor::new`] exactly once,
/// in arrival order.
pub struct MqttSupervisor {
    config: MqttConfig,
    event_tx: mpsc::Sender<InboundEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    state_rx: watch::Receiver<ConnectionState>,
    running: Mutex<Option<Running>>,
}

impl MqttSupervisor {
    pub fn new(config: MqttConfig, event_tx: mpsc::Sender<InboundEvent>) -> Self {
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            event_tx,
            state_tx: Arc::new(state_tx),
            state_rx,
            running: Mutex::new(None),
        }
    }

    /// Spawn the connection task. Idempotent: calling while a connection
    /// task is alive is a no-op and returns `false`.
    pub async fn start(&self) -> bool {
        let mut slot = self.running.lock().await;
        if let Some(running) = slot.as_ref() {
            if !running.task.is_finished() {
                debug!("supervisor already running, start ignored");
                return false;
            }
        }

        let (host, port) = self.config.host_and_port();
        info!(host = %host, port, client_id = %self.config.client_id, "connecting to broker");

        let mut options = MqttOptions::new(self.config.client_id.clone(), host, port);
        options
            .set_keep_alive(self.config.keep_alive())
            .set_clean_session(true);
        if !self.config.user.is_empty() {
            options.set_credentials(self.config.user.clone(), self.config.pw.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 100);
        let cancel = CancellationToken::new();

        self.state_tx.send_replace(ConnectionState::Connecting);

        let task = tokio::spawn(run_connection(
            eventloop,
            client.clone(),
            self.config.clone(),
            self.event_tx.clone(),
            self.state_tx.clone(),
            cancel.clone(),
        ));

        *slot = Some(Running {
            cancel,
            client,
            task,
        });
        true
    }

    /// Tear the connection down and cancel any pending reconnect timer.
    /// Safe to call when already stopped.
    pub async fn stop(&self) {
        let mut slot = self.running.lock().await;
        let Some(running) = slot.take() else {
            debug!("stop on a supervisor that is not running");
            return;
        };

        running.cancel.cancel();
        // Best effort: the broker gets a clean DISCONNECT if the socket is
        // still up, otherwise dropping the event loop closes it.
        let _ = running.client.try_disconnect();
        if let Err(err) = running.task.await {
            warn!(error = %err, "connection task did not shut down cleanly");
        }
        self.state_tx.send_replace(ConnectionState::Disconnected);
        info!("supervisor stopped");
    }

    /// Non-blocking snapshot of the connectivity state.
    pub fn current_state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Watch channel for observers (connectivity indicator, monitor).
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Queue a publish without waiting on the network. Fails when the
    /// supervisor is stopped or the client's request queue is full.
    pub async fn try_publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        let slot = self.running.lock().await;
        let Some(running) = slot.as_ref() else {
            return Err(TransportError::NotRunning);
        };
        running
            .client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|err| TransportError::Publish {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }
}

/// One poll-loop step outcome.
enum Step {
    Event(Result<Event, rumqttc::ConnectionError>),
    TimedOut,
}

/// Drive one connection until cancellation or an exhausted retry budget.
async fn run_connection(
    mut eventloop: EventLoop,
    client: AsyncClient,
    config: MqttConfig,
    event_tx: mpsc::Sender<InboundEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
) {
    let mut attempts: u32 = 0;
    let mut ever_connected = false;

    loop {
        let connected = *state_tx.borrow() == ConnectionState::Connected;
        let step = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            step = poll_step(&mut eventloop, connected, &config) => step,
        };

        match step {
            Step::Event(Ok(Event::Incoming(Packet::ConnAck(ack)))) => {
                info!(code = ?ack.code, "connected to broker");
                attempts = 0;
                ever_connected = true;
                state_tx.send_replace(ConnectionState::Connected);
                subscribe_all(&client, &config.topics).await;
            }
            Step::Event(Ok(Event::Incoming(Packet::Publish(publish)))) => {
                match codec::decode(&publish.topic, &publish.payload) {
                    Ok(event) => {
                        if event_tx.send(event).await.is_err() {
                            warn!("event consumer dropped, shutting connection down");
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(topic = %publish.topic, error = %err, "dropping undecodable message");
                    }
                }
            }
            Step::Event(Ok(_)) => {
                // Pings, acks, outgoing echoes
            }
            Step::Event(Err(err)) => {
                warn!(error = %err, attempt = attempts, "broker connection error");
                if !retry_delay(&mut attempts, ever_connected, &config, &state_tx, &cancel).await {
                    break;
                }
            }
            Step::TimedOut => {
                warn!(
                    timeout_secs = config.connect_timeout_secs,
                    attempt = attempts,
                    "connect attempt timed out"
                );
                if !retry_delay(&mut attempts, ever_connected, &config, &state_tx, &cancel).await {
                    break;
                }
            }
        }
    }

    state_tx.send_replace(ConnectionState::Disconnected);
    debug!("connection task exiting");
}

/// Poll the event loop. While not yet connected the poll is bounded by the
/// connect timeout; a timeout counts as a failed attempt like any transport
/// error.
async fn poll_step(eventloop: &mut EventLoop, connected: bool, config: &MqttConfig) -> Step {
    if connected {
        Step::Event(eventloop.poll().await)
    } else {
        match tokio::time::timeout(config.connect_timeout(), eventloop.poll()).await {
            Ok(result) => Step::Event(result),
            Err(_) => Step::TimedOut,
        }
    }
}

/// Book a failed attempt and sleep the fixed retry interval.
///
/// Returns `false` when the budget is exhausted or the supervisor was
/// stopped while waiting.
async fn retry_delay(
    attempts: &mut u32,
    ever_connected: bool,
    config: &MqttConfig,
    state_tx: &watch::Sender<ConnectionState>,
    cancel: &CancellationToken,
) -> bool {
    *attempts += 1;
    if *attempts >= config.max_connect_attempts {
        error!(
            attempts = *attempts,
            "connect attempt budget exhausted, giving up"
        );
        return false;
    }

    let next = if ever_connected {
        ConnectionState::Reconnecting
    } else {
        ConnectionState::Connecting
    };
    state_tx.send_replace(next);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(config.retry_interval()) => true,
    }
}

/// Subscribe every configured topic. A failing topic is logged and skipped;
/// partial subscription does not abort the connection.
async fn subscribe_all(client: &AsyncClient, topics: &[String]) {
    for topic in topics {
        match client.subscribe(topic.clone(), QoS::AtMostOnce).await {
            Ok(()) => info!(topic = %topic, "subscribed"),
            Err(err) => {
                let err = TransportError::Subscribe {
                    topic: topic.clone(),
                    reason: err.to_string(),
                };
                warn!(error = %err, "continuing with partial subscription");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn unreachable_config() -> MqttConfig {
        MqttConfig {
            // Nothing listens on port 1; connection attempts fail fast.
            url: "127.0.0.1:1".to_string(),
            retry_interval_secs: 1,
            connect_timeout_secs: 1,
            max_connect_attempts: 3,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn start_is_idempotent_while_running() {
        let (event_tx, _event_rx) = mpsc::channel(16);
        let supervisor = MqttSupervisor::new(unreachable_config(), event_tx);

        assert!(supervisor.start().await);
        assert!(!supervisor.start().await);
        assert_ne!(supervisor.current_state(), ConnectionState::Disconnected);

        supervisor.stop().await;
        assert_eq!(supervisor.current_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn stop_when_stopped_is_a_no_op() {
        let (event_tx, _event_rx) = mpsc::channel(16);
        let supervisor = MqttSupervisor::new(unreachable_config(), event_tx);

        supervisor.stop().await;
        supervisor.stop().await;
        assert_eq!(supervisor.current_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn supervisor_can_be_restarted_after_stop() {
        let (event_tx, _event_rx) = mpsc::channel(16);
        let supervisor = MqttSupervisor::new(unreachable_config(), event_tx);

        assert!(supervisor.start().await);
        supervisor.stop().await;
        assert!(supervisor.start().await);
        supervisor.stop().await;
    }

    #[tokio::test]
    async fn publish_without_start_reports_not_running() {
        let (event_tx, _event_rx) = mpsc::channel(16);
        let supervisor = MqttSupervisor::new(unreachable_config(), event_tx);

        let err = supervisor.try_publish("datacenter/control", "OPEN_DOOR").await;
        assert!(matches!(err, Err(TransportError::NotRunning)));
    }

    #[tokio::test]
    async fn retry_delay_gives_up_at_the_budget() {
        let config = MqttConfig {
            retry_interval_secs: 0,
            max_connect_attempts: 2,
            ..unreachable_config()
        };
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();

        let mut attempts = 0;
        assert!(retry_delay(&mut attempts, false, &config, &state_tx, &cancel).await);
        assert!(!retry_delay(&mut attempts, false, &config, &state_tx, &cancel).await);
    }

    #[tokio::test]
    async fn retry_delay_labels_reconnecting_after_a_successful_connect() {
        let config = MqttConfig {
            retry_interval_secs: 0,
            max_connect_attempts: 10,
            ..unreachable_config()
        };
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connected);
        let cancel = CancellationToken::new();

        let mut attempts = 0;
        assert!(retry_delay(&mut attempts, true, &config, &state_tx, &cancel).await);
        assert_eq!(*state_rx.borrow(), ConnectionState::Reconnecting);

        assert!(retry_delay(&mut attempts, false, &config, &state_tx, &cancel).await);
        assert_eq!(*state_rx.borrow(), ConnectionState::Connecting);
    }

    #[tokio::test]
    async fn retry_delay_aborts_when_cancelled() {
        let config = MqttConfig {
            retry_interval_secs: 60,
            max_connect_attempts: 10,
            ..unreachable_config()
        };
        let (state_tx, _state_rx) = watch::channel(ConnectionState::Connecting);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut attempts = 0;
        let resumed =
            tokio::time::timeout(Duration::from_secs(1), async {
                retry_delay(&mut attempts, false, &config, &state_tx, &cancel).await
            })
            .await
            .expect("cancelled retry must return immediately");
        assert!(!resumed);
    }
}
