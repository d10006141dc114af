pub mod protocol;
pub mod transfer;

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::world::tile::Direction;
use protocol::{Message, PlayerId, FIRST_CLIENT_ID, HOST_ID};
use transfer::{ChunkAssembler, MAX_LINE_LEN};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Client,
}

/// What the network layer hands to the game loop. Connection tasks never
/// touch game state directly.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    PeerJoined {
        id: PlayerId,
    },
    PeerLeft {
        id: PlayerId,
    },
    PlayerAssigned {
        id: PlayerId,
        spawn_x: i32,
        spawn_y: i32,
        seed: u64,
    },
    WorldSeed(u64),
    RemoteUpdate {
        id: PlayerId,
        x: f64,
        y: f64,
        direction: Direction,
    },
    /// A complete, reassembled world snapshot in text form.
    WorldTransfer(String),
    Pong {
        from: PlayerId,
    },
}

/// Traffic from connection tasks to the owning session.
#[derive(Debug)]
enum Inbound {
    Connected {
        id: PlayerId,
        outbound: mpsc::UnboundedSender<String>,
    },
    Message {
        from: PlayerId,
        message: Message,
    },
    Transfer {
        from: PlayerId,
        text: String,
    },
    Closed {
        id: PlayerId,
    },
}

/// A multiplayer session, either hosting or joined to a host.
///
/// Each connection gets a reader task and a writer task. The session itself
/// is polled from the game loop: `poll_events` drains whatever the readers
/// produced since the last tick, and sends only enqueue lines for the writers.
pub struct Session {
    role: Role,
    local_id: Option<PlayerId>,
    addr: SocketAddr,
    peers: HashMap<PlayerId, mpsc::UnboundedSender<String>>,
    connected: BTreeSet<PlayerId>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    shutdown: watch::Sender<bool>,
}

impl Session {
    /// Binds the listener and starts accepting clients.
    pub async fn host<A: ToSocketAddrs>(addr: A) -> io::Result<Session> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(accept_loop(listener, inbound_tx, shutdown_rx));
        info!(%addr, "Hosting session");

        Ok(Session {
            role: Role::Host,
            local_id: Some(HOST_ID),
            addr,
            peers: HashMap::new(),
            connected: BTreeSet::new(),
            inbound: inbound_rx,
            shutdown: shutdown_tx,
        })
    }

    /// Connects to a host. The local id stays unknown until PLAYER_ASSIGN.
    pub async fn join<A: ToSocketAddrs>(addr: A) -> io::Result<Session> {
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(addr))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        let addr = stream.peer_addr()?;
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let outbound = spawn_connection(HOST_ID, stream, inbound_tx, shutdown_rx);
        info!(%addr, "Joined session");

        let mut peers = HashMap::new();
        peers.insert(HOST_ID, outbound);
        Ok(Session {
            role: Role::Client,
            local_id: None,
            addr,
            peers,
            connected: BTreeSet::from([HOST_ID]),
            inbound: inbound_rx,
            shutdown: shutdown_tx,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_host(&self) -> bool {
        self.role == Role::Host
    }

    pub fn local_id(&self) -> Option<PlayerId> {
        self.local_id
    }

    /// Listening address for a host, the host's address for a client.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn peer_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.connected.iter().copied()
    }

    pub fn peer_count(&self) -> usize {
        self.connected.len()
    }

    /// Drains everything received since the last call. Never blocks.
    pub fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(inbound) = self.inbound.try_recv() {
            match inbound {
                Inbound::Connected { id, outbound } => {
                    self.peers.insert(id, outbound);
                    self.connected.insert(id);
                    events.push(SessionEvent::PeerJoined { id });
                }
                Inbound::Closed { id } => {
                    self.peers.remove(&id);
                    if self.connected.remove(&id) {
                        info!(player_id = id, "Peer disconnected");
                        if self.is_host() {
                            // clients only know each other through relayed updates
                            self.broadcast(&Message::PlayerLeave { id });
                        }
                        events.push(SessionEvent::PeerLeft { id });
                    }
                }
                Inbound::Transfer { from, text } => {
                    if self.is_host() {
                        warn!(player_id = from, "Ignoring world transfer from a client");
                    } else {
                        events.push(SessionEvent::WorldTransfer(text));
                    }
                }
                Inbound::Message { from, message } => self.route(from, message, &mut events),
            }
        }
        events
    }

    fn route(&mut self, from: PlayerId, message: Message, events: &mut Vec<SessionEvent>) {
        match (self.role, message) {
            (
                Role::Client,
                Message::PlayerAssign {
                    id,
                    spawn_x,
                    spawn_y,
                    seed,
                },
            ) => {
                self.local_id = Some(id);
                events.push(SessionEvent::PlayerAssigned {
                    id,
                    spawn_x,
                    spawn_y,
                    seed,
                });
            }
            (Role::Client, Message::WorldSeed(seed)) => events.push(SessionEvent::WorldSeed(seed)),
            (Role::Client, Message::PlayerUpdate { id, x, y, direction }) => {
                events.push(SessionEvent::RemoteUpdate { id, x, y, direction });
            }
            (Role::Host, Message::PlayerUpdate { x, y, direction, .. }) => {
                // the connection decides who moved, not the claimed id
                let relayed = Message::PlayerUpdate {
                    id: from,
                    x,
                    y,
                    direction,
                };
                self.send_where(&relayed, |id| id != from);
                events.push(SessionEvent::RemoteUpdate {
                    id: from,
                    x,
                    y,
                    direction,
                });
            }
            (Role::Client, Message::PlayerLeave { id }) => {
                if id != HOST_ID && Some(id) != self.local_id {
                    events.push(SessionEvent::PeerLeft { id });
                }
            }
            (_, Message::Pong) => events.push(SessionEvent::Pong { from }),
            (role, other) => {
                debug!(player_id = from, ?role, kind = other.kind(), "Ignoring message");
            }
        }
    }

    /// Queues `message` for every peer. Peers whose writer has gone away
    /// are pruned. Returns how many peers it was queued for.
    pub fn broadcast(&mut self, message: &Message) -> usize {
        self.send_where(message, |_| true)
    }

    fn send_where(&mut self, message: &Message, include: impl Fn(PlayerId) -> bool) -> usize {
        let line = message.encode();
        let mut sent = 0;
        self.peers.retain(|&id, outbound| {
            if !include(id) {
                return true;
            }
            let alive = outbound.send(line.clone()).is_ok();
            sent += alive as usize;
            alive
        });
        sent
    }

    pub fn send_to(&mut self, id: PlayerId, message: &Message) -> bool {
        let Some(outbound) = self.peers.get(&id) else {
            return false;
        };
        if outbound.send(message.encode()).is_err() {
            self.peers.remove(&id);
            return false;
        }
        true
    }

    /// Closes every connection and stops accepting. Peers see the sockets
    /// close; a host then tells the other clients with PLAYER_LEAVE.
    pub fn disconnect(self) {
        let _ = self.shutdown.send(true);
        info!(addr = %self.addr, role = ?self.role, "Session closed");
    }
}

async fn accept_loop(
    listener: TcpListener,
    inbound: mpsc::UnboundedSender<Inbound>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut next_id = FIRST_CLIENT_ID;
    loop {
        let accepted = tokio::select! {
            _ = shutdown.changed() => break,
            accepted = listener.accept() => accepted,
        };
        let (stream, peer) = match accepted {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };
        let id = next_id;
        next_id += 1;
        info!(%peer, player_id = id, "Client connected");

        // Connected must reach the session before anything the reader sends.
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        if inbound
            .send(Inbound::Connected {
                id,
                outbound: outbound_tx.clone(),
            })
            .is_err()
        {
            break;
        }
        start_tasks(id, stream, outbound_tx, outbound_rx, inbound.clone(), shutdown.clone());
    }
    debug!("Accept loop stopped");
}

fn spawn_connection(
    id: PlayerId,
    stream: TcpStream,
    inbound: mpsc::UnboundedSender<Inbound>,
    shutdown: watch::Receiver<bool>,
) -> mpsc::UnboundedSender<String> {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    start_tasks(id, stream, outbound_tx.clone(), outbound_rx, inbound, shutdown);
    outbound_tx
}

fn start_tasks(
    id: PlayerId,
    stream: TcpStream,
    outbound_tx: mpsc::UnboundedSender<String>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<Inbound>,
    shutdown: watch::Receiver<bool>,
) {
    let _ = stream.set_nodelay(true);
    let (reader, writer) = stream.into_split();
    tokio::spawn(write_loop(id, writer, outbound_rx, shutdown.clone()));
    tokio::spawn(read_loop(id, reader, outbound_tx, inbound, shutdown));
}

enum LineRead {
    Line(String),
    Oversized,
    Closed,
}

/// Reads one line of at most `MAX_LINE_LEN` bytes. A longer line is
/// consumed up to its newline in bounded steps and reported as `Oversized`.
async fn read_bounded_line(
    reader: &mut BufReader<OwnedReadHalf>,
    buf: &mut Vec<u8>,
) -> io::Result<LineRead> {
    let limit = MAX_LINE_LEN as u64 + 1;
    buf.clear();
    let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if n == 0 {
        return Ok(LineRead::Closed);
    }
    if buf.last() != Some(&b'\n') && n as u64 == limit {
        loop {
            buf.clear();
            let n = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
            if n == 0 {
                return Ok(LineRead::Closed);
            }
            if buf.last() == Some(&b'\n') {
                buf.clear();
                return Ok(LineRead::Oversized);
            }
        }
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    Ok(LineRead::Line(String::from_utf8_lossy(buf).into_owned()))
}

/// Reads lines until the peer closes or the session shuts down. PING is
/// answered here; save chunks are collected here and only a complete
/// transfer is passed on.
async fn read_loop(
    id: PlayerId,
    reader: OwnedReadHalf,
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedSender<Inbound>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut assembler = ChunkAssembler::new();

    loop {
        let read = tokio::select! {
            _ = shutdown.changed() => break,
            read = read_bounded_line(&mut reader, &mut buf) => read,
        };
        let line = match read {
            Ok(LineRead::Line(line)) => line,
            Ok(LineRead::Oversized) => {
                warn!(player_id = id, limit = MAX_LINE_LEN, "Dropping oversized line");
                continue;
            }
            Ok(LineRead::Closed) => break,
            Err(e) => {
                debug!(player_id = id, error = %e, "Read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let message = match Message::parse(&line) {
            Ok(message) => message,
            Err(e) => {
                warn!(player_id = id, error = %e, "Dropping malformed message");
                continue;
            }
        };

        match message {
            Message::Ping => {
                let _ = outbound.send(Message::Pong.encode());
            }
            Message::WorldSaveStart { chunks } => {
                debug!(player_id = id, chunks, "World transfer started");
                if let Err(e) = assembler.start(chunks) {
                    warn!(player_id = id, error = %e, "Refusing world transfer");
                }
            }
            Message::WorldSaveChunk { index, data } => {
                if let Err(e) = assembler.accept(index, data) {
                    warn!(player_id = id, error = %e, "Dropping save chunk");
                }
            }
            Message::WorldSaveEnd => match assembler.finish() {
                Ok(text) => {
                    if inbound.send(Inbound::Transfer { from: id, text }).is_err() {
                        break;
                    }
                }
                Err(e) => warn!(player_id = id, error = %e, "Discarding world transfer"),
            },
            message => {
                if inbound.send(Inbound::Message { from: id, message }).is_err() {
                    break;
                }
            }
        }
    }

    let _ = inbound.send(Inbound::Closed { id });
}

async fn write_loop(
    id: PlayerId,
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let line = tokio::select! {
            _ = shutdown.changed() => break,
            line = outbound.recv() => match line {
                Some(line) => line,
                None => break,
            },
        };
        let mut bytes = line.into_bytes();
        bytes.push(b'\n');
        if let Err(e) = writer.write_all(&bytes).await {
            debug!(player_id = id, error = %e, "Write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}
