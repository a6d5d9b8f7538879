//! Reconnect supervision and the public sync handle.
//!
//! The supervisor owns the connection lifecycle: it spawns one stream
//! session at a time, subscribes the registry snapshot when a session
//! opens, forwards subscription changes while it is open, and schedules
//! a delayed reconnect when it fails. A user-initiated shutdown stops
//! the loop for good.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use skbridge_core::{AccessoryId, BridgeConfig, BusPath, DeviceDescriptor};

use crate::accessory::{unwire_accessory, wire_accessory};
use crate::registry::{read_registry, shared_registry, SharedRegistry};
use crate::router::{CharacteristicWriter, UpdateRouter};
use crate::stream::{self, CloseReason, ConnectionState, StreamCommand, StreamEvent};

/// Control messages from the accessory lifecycle into the supervisor.
#[derive(Debug)]
enum CtrlMsg {
    PathsAdded(Vec<BusPath>),
    PathsRemoved(Vec<BusPath>),
    Shutdown,
}

/// Handle for wiring accessories in and out of the running sync loop.
#[derive(Clone)]
pub struct SyncHandle {
    registry: SharedRegistry,
    ctrl_tx: mpsc::Sender<CtrlMsg>,
    state_rx: watch::Receiver<ConnectionState>,
}

impl SyncHandle {
    /// Register an accessory's characteristics and subscribe the stream
    /// to any paths not already covered.
    pub async fn add_accessory(&self, descriptor: &DeviceDescriptor, config: &BridgeConfig) {
        let new_paths = wire_accessory(&self.registry, descriptor, config);
        if !new_paths.is_empty() {
            let _ = self.ctrl_tx.send(CtrlMsg::PathsAdded(new_paths)).await;
        }
    }

    /// Drop an accessory's subscriptions and unsubscribe paths nothing
    /// listens to anymore.
    pub async fn remove_accessory(&self, owner: AccessoryId) {
        let removed = unwire_accessory(&self.registry, owner);
        if !removed.is_empty() {
            let _ = self.ctrl_tx.send(CtrlMsg::PathsRemoved(removed)).await;
        }
    }

    /// Stop the sync loop. The current session closes and no reconnect
    /// is scheduled.
    pub async fn shutdown(&self) {
        let _ = self.ctrl_tx.send(CtrlMsg::Shutdown).await;
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }
}

/// Paths already subscribed in the current session. Incremental changes
/// are deduped against what was sent: the registry can gain a path
/// between the snapshot read and a queued control message, which would
/// otherwise subscribe it twice.
#[derive(Default)]
struct SessionPaths {
    subscribed: HashSet<BusPath>,
}

impl SessionPaths {
    fn snapshot(&mut self, paths: Vec<BusPath>) -> Vec<BusPath> {
        self.subscribed = paths.iter().cloned().collect();
        paths
    }

    fn added(&mut self, paths: Vec<BusPath>) -> Vec<BusPath> {
        paths
            .into_iter()
            .filter(|p| self.subscribed.insert(p.clone()))
            .collect()
    }

    fn removed(&mut self, paths: Vec<BusPath>) -> Vec<BusPath> {
        for path in &paths {
            self.subscribed.remove(path);
        }
        paths
    }
}

/// Keeps one stream session alive against the configured upstream.
pub struct ReconnectSupervisor {
    stream_url: String,
    token: Option<String>,
    reconnect_delay: Duration,
    registry: SharedRegistry,
    router: UpdateRouter,
    ctrl_rx: mpsc::Receiver<CtrlMsg>,
    state_tx: watch::Sender<ConnectionState>,
}

impl ReconnectSupervisor {
    pub fn new(
        config: &BridgeConfig,
        writer: Arc<dyn CharacteristicWriter>,
    ) -> (Self, SyncHandle) {
        let registry = shared_registry();
        let router = UpdateRouter::new(registry.clone(), writer);
        let (ctrl_tx, ctrl_rx) = mpsc::channel(64);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);

        let supervisor = Self {
            stream_url: config.stream_url(),
            token: config.security_token.clone(),
            reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            registry: registry.clone(),
            router,
            ctrl_rx,
            state_tx,
        };
        let handle = SyncHandle {
            registry,
            ctrl_tx,
            state_rx,
        };
        (supervisor, handle)
    }

    /// Run until shutdown. Each iteration is one session attempt.
    pub async fn run(mut self) {
        loop {
            self.state_tx.send_replace(ConnectionState::Connecting);

            let (cmd_tx, cmd_rx) = mpsc::channel(32);
            let (event_tx, mut event_rx) = mpsc::channel(32);
            let session = tokio::spawn(stream::run_session(
                self.stream_url.clone(),
                self.token.clone(),
                self.router.clone(),
                cmd_rx,
                event_tx,
            ));

            // Dropping cmd_tx at the end of the iteration ends a session
            // that is still alive
            let reason = self.drive_session(&cmd_tx, &mut event_rx, &session).await;
            drop(cmd_tx);

            match reason {
                CloseReason::UserInitiated => {
                    self.state_tx.send_replace(ConnectionState::Closed);
                    info!("stream sync stopped");
                    return;
                }
                CloseReason::Error(err) => {
                    warn!(%err, delay = ?self.reconnect_delay, "stream closed, reconnecting");
                    self.state_tx.send_replace(ConnectionState::Reconnecting);
                    if !self.backoff().await {
                        self.state_tx.send_replace(ConnectionState::Closed);
                        info!("stream sync stopped during reconnect wait");
                        return;
                    }
                }
            }
        }
    }

    /// Drive one session until it closes, forwarding subscription
    /// changes while the connection is open.
    async fn drive_session(
        &mut self,
        cmd_tx: &mpsc::Sender<StreamCommand>,
        event_rx: &mut mpsc::Receiver<StreamEvent>,
        session: &tokio::task::JoinHandle<()>,
    ) -> CloseReason {
        let mut session_open = false;
        let mut closing = false;
        let mut sent = SessionPaths::default();

        loop {
            tokio::select! {
                event = event_rx.recv() => match event {
                    Some(StreamEvent::Opened) => {
                        session_open = true;
                        self.state_tx.send_replace(ConnectionState::Open);
                        // One subscribe frame covering the whole registry
                        let paths = sent.snapshot(read_registry(&self.registry).all_paths());
                        debug!(count = paths.len(), "subscribing registry snapshot");
                        if cmd_tx.send(StreamCommand::Subscribe(paths)).await.is_err() {
                            return CloseReason::Error("session ended before subscribe".to_string());
                        }
                    }
                    Some(StreamEvent::Closed(reason)) => {
                        return if closing { CloseReason::UserInitiated } else { reason };
                    }
                    None => {
                        return if closing {
                            CloseReason::UserInitiated
                        } else {
                            CloseReason::Error("session task ended".to_string())
                        };
                    }
                },

                msg = self.ctrl_rx.recv(), if !closing => match msg {
                    Some(CtrlMsg::PathsAdded(paths)) if session_open => {
                        // Paths already in the snapshot were subscribed on open
                        let paths = sent.added(paths);
                        if !paths.is_empty() {
                            let _ = cmd_tx.send(StreamCommand::Subscribe(paths)).await;
                        }
                    }
                    Some(CtrlMsg::PathsRemoved(paths)) if session_open => {
                        let _ = cmd_tx.send(StreamCommand::Unsubscribe(sent.removed(paths))).await;
                    }
                    Some(CtrlMsg::PathsAdded(_) | CtrlMsg::PathsRemoved(_)) => {
                        // Not open yet: the snapshot subscribe on open covers it
                    }
                    Some(CtrlMsg::Shutdown) | None => {
                        if session_open {
                            closing = true;
                            let _ = cmd_tx.send(StreamCommand::Close).await;
                        } else {
                            // Still in the handshake; the session cannot
                            // read commands yet. Drop it along with the
                            // pending socket instead of waiting it out.
                            session.abort();
                            return CloseReason::UserInitiated;
                        }
                    }
                },
            }
        }
    }

    /// Wait out the reconnect delay. Returns false when shutdown arrives
    /// during the wait.
    async fn backoff(&mut self) -> bool {
        let sleep = tokio::time::sleep(self.reconnect_delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = &mut sleep => return true,
                msg = self.ctrl_rx.recv() => match msg {
                    Some(CtrlMsg::Shutdown) | None => return false,
                    // Registry already updated; the next session
                    // subscribes from the snapshot
                    Some(_) => {}
                },
            }
        }
    }
}
