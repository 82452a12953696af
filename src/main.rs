use std::sync::Arc;
use std::time::Duration;

use color_eyre::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use dcwatch::alert::LogSink;
use dcwatch::config::AppConfig;
use dcwatch::monitor::Monitor;
use dcwatch::mqtt::{ConnectionState, MqttSupervisor};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load();
    info!(
        broker = %config.mqtt.url,
        door_control = config.door_control,
        "starting dcwatch"
    );

    let (inbound_tx, inbound_rx) = mpsc::channel(100);
    let (outbound_tx, mut outbound_rx) = mpsc::channel(16);

    let supervisor = Arc::new(MqttSupervisor::new(config.effective_mqtt(), inbound_tx));
    let monitor = Monitor::spawn(
        config.monitor_settings(),
        inbound_rx,
        outbound_tx,
        supervisor.watch_state(),
        Arc::new(LogSink),
    );

    supervisor.start().await;

    // Outbound command queue -> broker
    let publisher = supervisor.clone();
    tokio::spawn(async move {
        while let Some(command) = outbound_rx.recv().await {
            if let Err(err) = publisher
                .try_publish(&command.topic, &command.payload)
                .await
            {
                warn!(error = %err, topic = %command.topic, "dropping outbound command");
            }
        }
    });

    // Connectivity indicator: the presentation layer shows OFFLINE whenever
    // the link is not Connected; the headless build logs the transitions.
    let mut state_rx = supervisor.watch_state();
    tokio::spawn(async move {
        while state_rx.changed().await.is_ok() {
            let state = state_rx.borrow_and_update().clone();
            if state == ConnectionState::Connected {
                info!("broker link ONLINE");
            } else {
                info!(state = ?state, "broker link OFFLINE");
            }
        }
    });

    // Manual door control, the way the dashboard button drives it: a line
    // reading "open" on stdin requests the door to open.
    let door = monitor.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().eq_ignore_ascii_case("open") {
                if let Err(err) = door.request_open() {
                    warn!(error = %err, "door-open request rejected");
                }
            }
        }
    });

    // Pull-model snapshot surface for the (out of tree) presentation layer.
    let dashboard = monitor.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(30));
        loop {
            tick.tick().await;
            debug!(snapshot = ?dashboard.snapshot(), "monitor snapshot");
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    supervisor.stop().await;

    Ok(())
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    AppConfig::ensure_default_config()?;
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
