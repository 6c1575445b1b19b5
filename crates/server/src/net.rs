//! TCP transport: accept loop, per-connection tasks and the engine task.
//!
//! Connection tasks never touch the world. They push decoded inputs into the
//! shared [`ActionQueue`] and report joins and leaves over a channel; the
//! engine task owns the [`TickEngine`] and serializes those with ticks.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use furrow_common::PlayerId;
use furrow_stream::TickPayload;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::config::ServerConfig;
use crate::engine::TickEngine;
use crate::framing::{FrameConfig, FrameError, read_frame, write_frame};
use crate::protocol::Outbound;
use crate::queue::ActionQueue;

/// An encoded frame payload, shared between recipients of the same message.
type Frame = Arc<[u8]>;

const SESSION_BACKLOG: usize = 256;

/// Connection lifecycle notifications for the engine task.
#[derive(Debug)]
enum SessionEvent {
    Joined {
        id: PlayerId,
        outbox: mpsc::Sender<Frame>,
    },
    Left {
        id: PlayerId,
    },
}

/// Authoritative game server: one engine task plus one task per client.
pub struct GameServer {
    config: ServerConfig,
    frame: FrameConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl GameServer {
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            config,
            frame: FrameConfig::default(),
            shutdown_tx,
            shutdown_rx,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind to the configured address and serve until [`shutdown`](Self::shutdown).
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "server listening");
        self.run_with_listener(listener).await
    }

    /// Serve on a pre-bound listener.
    pub async fn run_with_listener(&self, listener: TcpListener) -> std::io::Result<()> {
        let engine = TickEngine::from_config(&self.config);
        let queue = engine.queue();
        let (sessions_tx, sessions_rx) = mpsc::channel(SESSION_BACKLOG);
        let engine_task = tokio::spawn(drive(engine, sessions_rx, self.shutdown_rx.clone()));

        let slots = Arc::new(Semaphore::new(self.config.max_connections));
        let mut shutdown_rx = self.shutdown_rx.clone();
        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let Ok(permit) = Arc::clone(&slots).try_acquire_owned() else {
                        tracing::warn!(%peer, "connection limit reached, rejecting");
                        continue;
                    };
                    let connection = Connection {
                        peer,
                        sessions: sessions_tx.clone(),
                        queue: Arc::clone(&queue),
                        frame: self.frame.clone(),
                        outbox_capacity: self.config.outbox_capacity,
                        shutdown: self.shutdown_rx.clone(),
                    };
                    tokio::spawn(async move {
                        connection.run(stream).await;
                        drop(permit);
                    });
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::info!("server shutting down");
                        break;
                    }
                }
            }
        }

        drop(sessions_tx);
        if let Err(e) = engine_task.await {
            tracing::warn!(error = %e, "engine task failed");
        }
        Ok(())
    }

    /// Signal the accept loop, the engine and every connection to stop.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// The engine task: ticks on a fixed period and applies joins and leaves
/// between ticks.
async fn drive(
    mut engine: TickEngine,
    mut sessions: mpsc::Receiver<SessionEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut clients: HashMap<PlayerId, mpsc::Sender<Frame>> = HashMap::new();
    let mut ticker = tokio::time::interval(engine.timer().period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick fires immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = engine.tick();
                deliver(&clients, &report.broadcast);
            }
            Some(event) = sessions.recv() => match event {
                SessionEvent::Joined { id, outbox } => {
                    let init = engine.join(id);
                    match Outbound::Init(&init).encode() {
                        Ok(bytes) => {
                            if outbox.try_send(bytes.into()).is_err() {
                                tracing::warn!(%id, "could not queue init frame");
                            }
                        }
                        Err(e) => tracing::warn!(%id, error = %e, "failed to encode init"),
                    }
                    clients.insert(id, outbox);
                }
                SessionEvent::Left { id } => {
                    clients.remove(&id);
                    engine.leave(id);
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!(
        tick = engine.world().tick(),
        players = engine.world().players().len(),
        "engine stopped"
    );
}

/// Push one tick's payloads into client outboxes without waiting.
///
/// Recipients sharing a payload share one encoding. A full outbox loses this
/// frame; the next tick carries the complete state again.
fn deliver(
    clients: &HashMap<PlayerId, mpsc::Sender<Frame>>,
    broadcast: &[(PlayerId, Arc<TickPayload>)],
) {
    let mut cached: Option<(&Arc<TickPayload>, Frame)> = None;
    for (id, payload) in broadcast {
        let Some(outbox) = clients.get(id) else {
            continue;
        };
        let reused = cached
            .as_ref()
            .filter(|(shared, _)| Arc::ptr_eq(shared, payload))
            .map(|(_, frame)| Arc::clone(frame));
        let frame = match reused {
            Some(frame) => frame,
            None => match Outbound::Tick(payload.as_ref()).encode() {
                Ok(bytes) => {
                    let frame: Frame = bytes.into();
                    cached = Some((payload, Arc::clone(&frame)));
                    frame
                }
                Err(e) => {
                    tracing::warn!(%id, error = %e, "failed to encode tick");
                    continue;
                }
            },
        };
        match outbox.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(%id, "client outbox full, dropping tick");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::trace!(%id, "client writer gone");
            }
        }
    }
}

/// Everything a connection task needs besides its socket.
struct Connection {
    peer: SocketAddr,
    sessions: mpsc::Sender<SessionEvent>,
    queue: Arc<ActionQueue>,
    frame: FrameConfig,
    outbox_capacity: usize,
    shutdown: watch::Receiver<bool>,
}

impl Connection {
    async fn run(mut self, stream: TcpStream) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %self.peer, error = %e, "set_nodelay failed");
        }
        let id = PlayerId::new();
        let (reader, writer) = stream.into_split();
        let (outbox_tx, outbox_rx) = mpsc::channel(self.outbox_capacity);
        tokio::spawn(write_loop(id, writer, outbox_rx, self.frame.clone()));

        tracing::info!(%id, peer = %self.peer, "client connected");
        if self
            .sessions
            .send(SessionEvent::Joined { id, outbox: outbox_tx })
            .await
            .is_err()
        {
            return;
        }

        self.read_loop(id, reader).await;

        let _ = self.sessions.send(SessionEvent::Left { id }).await;
        tracing::info!(%id, peer = %self.peer, "client disconnected");
    }

    async fn read_loop(&mut self, id: PlayerId, mut reader: OwnedReadHalf) {
        loop {
            tokio::select! {
                result = read_frame(&mut reader, &self.frame) => match result {
                    Ok(bytes) if bytes.is_empty() => {}
                    Ok(bytes) => match furrow_input::decode(&bytes) {
                        Ok(input) => {
                            if !self.queue.enqueue(id, input) {
                                tracing::debug!(%id, ?input, "input dropped, one already pending");
                            }
                        }
                        Err(e) => tracing::debug!(%id, error = %e, "ignoring malformed input"),
                    },
                    Err(FrameError::ConnectionClosed) => break,
                    Err(e) => {
                        tracing::debug!(%id, error = %e, "read failed");
                        break;
                    }
                },
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

/// Drains a client's outbox onto its socket until the engine drops the sender.
async fn write_loop(
    id: PlayerId,
    mut writer: OwnedWriteHalf,
    mut outbox: mpsc::Receiver<Frame>,
    frame: FrameConfig,
) {
    while let Some(bytes) = outbox.recv().await {
        if let Err(e) = write_frame(&mut writer, &bytes, &frame).await {
            tracing::debug!(%id, error = %e, "write failed");
            break;
        }
    }
}
