//! Engine process/IPC manager
//!
//! **Responsibilities:**
//! - Spawn and supervise the engine subprocess
//! - Connect to its IPC socket with fixed-backoff retry while the process
//!   remains alive
//! - Queue commands issued before the channel connects; flush FIFO on
//!   connection
//! - Subscribe to the fixed observed-property set on connection
//! - Translate inbound JSON into typed `EngineEvent`s
//! - Emit exactly one `Exited` event per process, clean or crashed

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::process::{Child, Command as ProcessCommand};
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::channel::IpcChannel;
use crate::error::{Error, Result};
use crate::protocol::{Command, EngineMessage, ObservedProperty, WireValue};

/// Interval between IPC connection attempts after spawn
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// How long to wait for a clean engine exit after sending quit
const QUIT_GRACE: Duration = Duration::from_millis(500);

/// Typed events out of the IPC manager
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// IPC channel connected and properties subscribed
    Connected,
    /// One of the observed properties changed
    Property {
        property: ObservedProperty,
        data: Option<WireValue>,
    },
    /// The engine reached end of media
    EndFile,
    /// Message from an engine-side script extension
    ScriptMessage(Vec<String>),
    /// The engine process exited; emitted exactly once per spawn
    Exited { clean: bool },
}

/// Launch parameters for one engine spawn
#[derive(Debug, Clone)]
pub struct EngineLaunch {
    /// Engine binary path
    pub binary: PathBuf,
    /// Extra arguments ahead of the media URL
    pub args: Vec<String>,
    /// Media URL, passed as the final argument
    pub media_url: String,
    /// IPC socket path override (a temp path is generated when None)
    pub socket_path: Option<PathBuf>,
}

/// Owns one engine subprocess and its IPC channel
pub struct EngineManager {
    command_tx: mpsc::UnboundedSender<Command>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
    socket_path: PathBuf,
}

impl EngineManager {
    /// Spawn the engine and begin connecting to its IPC socket.
    ///
    /// The returned receiver was created before the supervisor task, so
    /// no event can be lost to subscription timing, including the exit
    /// of an engine that dies immediately.
    pub fn start(launch: EngineLaunch) -> Result<(Self, broadcast::Receiver<EngineEvent>)> {
        let socket_path = launch.socket_path.clone().unwrap_or_else(|| {
            std::env::temp_dir().join(format!("vireo-engine-{}.sock", Uuid::new_v4()))
        });

        let mut process = ProcessCommand::new(&launch.binary);
        process
            .args(&launch.args)
            .arg(format!("--input-ipc-server={}", socket_path.display()))
            .arg(&launch.media_url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let child = process.spawn().map_err(|e| {
            Error::Engine(format!(
                "failed to spawn engine {}: {}",
                launch.binary.display(),
                e
            ))
        })?;
        info!(
            "engine spawned: {} (socket {})",
            launch.binary.display(),
            socket_path.display()
        );

        let (event_tx, event_rx) = broadcast::channel(256);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let running = Arc::new(AtomicBool::new(true));
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(supervise(
            child,
            socket_path.clone(),
            command_rx,
            event_tx,
            Arc::clone(&running),
            Arc::clone(&shutdown),
        ));

        Ok((
            Self {
                command_tx,
                running,
                shutdown,
                socket_path,
            },
            event_rx,
        ))
    }

    /// Submit a command
    ///
    /// Commands sent before the channel connects are queued and flushed in
    /// submission order on connection. Commands sent after the process
    /// exits are dropped with a warning.
    pub fn send(&self, tokens: Vec<WireValue>) {
        if !self.is_running() {
            warn!("dropping engine command, process not running");
            return;
        }
        if self.command_tx.send(Command::new(tokens)).is_err() {
            warn!("dropping engine command, channel closed");
        }
    }

    /// Whether the engine process is still alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request shutdown: quit command first, kill after a grace period
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    /// Path of the IPC socket for this spawn
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }
}

/// How often the supervisor rechecks process liveness
const LIVENESS_TICK: Duration = Duration::from_millis(250);

/// Supervisor task: connection retry, IO loop, exit handling
///
/// The child is only ever touched from branch handlers, never from the
/// polled futures, so liveness is observed on a short tick.
async fn supervise(
    mut child: Child,
    socket_path: PathBuf,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: broadcast::Sender<EngineEvent>,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
) {
    // Phase 1: connect while the process is alive. Gives up only when the
    // process exits or shutdown is requested.
    let channel = loop {
        match IpcChannel::connect(&socket_path).await {
            Ok(channel) => break channel,
            Err(_) => {
                if let Ok(Some(status)) = child.try_wait() {
                    warn!("engine exited before IPC connection (clean={})", status.success());
                    finish(&running, &mut command_rx, &event_tx, status.success(), &socket_path);
                    return;
                }
                tokio::select! {
                    _ = shutdown.notified() => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        finish(&running, &mut command_rx, &event_tx, true, &socket_path);
                        return;
                    }
                    _ = sleep(CONNECT_RETRY_INTERVAL) => {}
                }
            }
        }
    };

    let (mut reader, mut writer) = channel.split();
    debug!("IPC channel connected: {}", socket_path.display());

    // Subscribe the fixed property set before anything else so no change
    // notification can be missed.
    for property in ObservedProperty::ALL {
        if writer.send(&property.observe_command()).await.is_err() {
            warn!("failed to subscribe engine properties");
        }
    }

    // Flush commands queued while disconnected, in submission order.
    while let Ok(queued) = command_rx.try_recv() {
        if let Err(e) = writer.send(&queued).await {
            warn!("failed to flush queued engine command: {}", e);
        }
    }

    let _ = event_tx.send(EngineEvent::Connected);

    // Phase 2: duplex IO until exit
    let mut quit_deadline: Option<tokio::time::Instant> = None;
    let mut channel_open = true;
    let clean = loop {
        if let Ok(Some(status)) = child.try_wait() {
            break status.success();
        }
        if let Some(deadline) = quit_deadline {
            if tokio::time::Instant::now() >= deadline {
                let _ = child.start_kill();
                let _ = child.wait().await;
                // A requested shutdown is a clean stop even when the
                // engine needed a kill.
                break true;
            }
        }

        tokio::select! {
            _ = shutdown.notified() => {
                let _ = writer.send(&Command::new(vec![WireValue::from("quit")])).await;
                quit_deadline = Some(tokio::time::Instant::now() + QUIT_GRACE);
            }
            maybe_command = command_rx.recv() => {
                match maybe_command {
                    Some(command) => {
                        if let Err(e) = writer.send(&command).await {
                            warn!("engine command write failed: {}", e);
                        }
                    }
                    None => {
                        // Manager dropped; treat like a shutdown request
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        break true;
                    }
                }
            }
            message = reader.next_message(), if channel_open => {
                match message {
                    Ok(Some(msg)) => route_message(msg, &event_tx),
                    Ok(None) | Err(_) => {
                        // Channel closed under us; the process is exiting
                        // and the liveness tick will observe it
                        channel_open = false;
                    }
                }
            }
            _ = sleep(LIVENESS_TICK) => {}
        }
    };

    finish(&running, &mut command_rx, &event_tx, clean, &socket_path);
}

/// Route one inbound message to the typed event stream
fn route_message(message: EngineMessage, event_tx: &broadcast::Sender<EngineEvent>) {
    match message {
        EngineMessage::PropertyChange { name, data } => {
            match ObservedProperty::from_name(&name) {
                Some(property) => {
                    let _ = event_tx.send(EngineEvent::Property { property, data });
                }
                None => debug!("change for unobserved property {}", name),
            }
        }
        EngineMessage::EndFile => {
            let _ = event_tx.send(EngineEvent::EndFile);
        }
        EngineMessage::ClientMessage { args } => {
            let _ = event_tx.send(EngineEvent::ScriptMessage(args));
        }
        EngineMessage::Other => {}
    }
}

/// Final transition: mark not running, clear the queue, emit one Exited
fn finish(
    running: &AtomicBool,
    command_rx: &mut mpsc::UnboundedReceiver<Command>,
    event_tx: &broadcast::Sender<EngineEvent>,
    clean: bool,
    socket_path: &PathBuf,
) {
    running.store(false, Ordering::Release);
    let mut dropped = 0usize;
    while command_rx.try_recv().is_ok() {
        dropped += 1;
    }
    if dropped > 0 {
        debug!("cleared {} queued engine commands on exit", dropped);
    }
    let _ = std::fs::remove_file(socket_path);
    info!("engine exited (clean={})", clean);
    let _ = event_tx.send(EngineEvent::Exited { clean });
}
