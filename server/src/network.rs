//! Server network layer: TCP connection tasks and the simulation/broadcast loop

use crate::broadcaster::Broadcaster;
use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::game::Game;
use log::{debug, error, info, warn};
use shared::{
    decode_packet, read_frame, write_packet, ConnectionId, MonotonicClock, Packet, ProtocolError,
};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum ServerMessage {
    Accepted {
        stream: TcpStream,
        addr: SocketAddr,
    },
    PacketReceived {
        client_id: ConnectionId,
        packet: Packet,
    },
    /// A frame arrived intact but did not decode; the connection stays up.
    MalformedPacket {
        client_id: ConnectionId,
        error: ProtocolError,
    },
    ConnectionClosed {
        client_id: ConnectionId,
    },
    Shutdown,
}

/// Stops a running [`Server`] from another task.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    server_tx: mpsc::UnboundedSender<ServerMessage>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        if self.server_tx.send(ServerMessage::Shutdown).is_err() {
            debug!("Server loop already stopped");
        }
    }
}

/// Main server coordinating networking and the authoritative simulation
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    config: ServerConfig,
    game: Game,
    clients: ClientManager,
    broadcaster: Broadcaster,
    /// Source of snapshot timestamps; starts at bind.
    clock: MonotonicClock,

    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ProtocolError> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!(
            "Server listening on {} ({} Hz sim, {} Hz snapshots, {} movement, {} drain)",
            local_addr,
            config.tick_rate,
            config.broadcast_rate,
            config.movement_policy,
            config.drain_policy
        );

        let (server_tx, server_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            game: Game::new(&config),
            clients: ClientManager::new(config.max_clients),
            broadcaster: Broadcaster::new(),
            clock: MonotonicClock::new(),
            config,
            server_tx,
            server_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            server_tx: self.server_tx.clone(),
        }
    }

    /// Main server loop; returns after a shutdown request.
    pub async fn run(mut self) -> Result<(), ProtocolError> {
        let listener = self.listener.take().ok_or_else(|| {
            ProtocolError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "listener already consumed",
            ))
        })?;
        let acceptor = tokio::spawn(Self::accept_loop(listener, self.server_tx.clone()));

        let mut sim_interval = interval(self.config.tick_duration());
        sim_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut broadcast_interval = interval(self.config.broadcast_interval());
        broadcast_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_sim = Instant::now();

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::Accepted { stream, addr }) => {
                            self.handle_accept(stream, addr);
                        }
                        Some(ServerMessage::PacketReceived { client_id, packet }) => {
                            self.handle_packet(client_id, packet);
                        }
                        Some(ServerMessage::MalformedPacket { client_id, error }) => {
                            warn!("Dropped malformed message from client {}: {}", client_id, error);
                        }
                        Some(ServerMessage::ConnectionClosed { client_id }) => {
                            self.drop_client(client_id);
                        }
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            self.clients.broadcast(&Packet::Disconnect);
                            break;
                        }
                    }
                }

                _ = sim_interval.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last_sim);
                    last_sim = now;
                    self.game.advance(elapsed);
                }

                _ = broadcast_interval.tick() => {
                    self.broadcaster.broadcast(&self.game, &self.clients, self.clock.now_ms());
                }
            }
        }

        acceptor.abort();
        Ok(())
    }

    async fn accept_loop(listener: TcpListener, server_tx: mpsc::UnboundedSender<ServerMessage>) {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    if server_tx
                        .send(ServerMessage::Accepted { stream, addr })
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
            }
        }
    }

    fn handle_accept(&mut self, stream: TcpStream, addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let Some(client_id) = self.clients.add_client(addr, outbound_tx) else {
            tokio::spawn(Self::reject(stream, "Server full".to_string()));
            return;
        };

        self.game.add_entity(client_id);
        let join_ack = self.game.join_ack(client_id, self.clock.now_ms());
        self.clients.send_to(client_id, join_ack);

        let (reader, writer) = stream.into_split();
        tokio::spawn(Self::write_loop(client_id, writer, outbound_rx));
        tokio::spawn(Self::read_loop(client_id, reader, self.server_tx.clone()));
    }

    async fn reject(mut stream: TcpStream, reason: String) {
        if let Err(e) = write_packet(&mut stream, &Packet::Rejected { reason }).await {
            debug!("Failed to send rejection: {}", e);
        }
    }

    /// Owns the write half; ends when the client is removed from the roster.
    async fn write_loop(
        client_id: ConnectionId,
        mut writer: OwnedWriteHalf,
        mut outbound_rx: mpsc::UnboundedReceiver<Packet>,
    ) {
        while let Some(packet) = outbound_rx.recv().await {
            if let Err(e) = write_packet(&mut writer, &packet).await {
                warn!("Failed to send {} to client {}: {}", packet.kind(), client_id, e);
                break;
            }
        }
        debug!("Writer for client {} finished", client_id);
    }

    async fn read_loop(
        client_id: ConnectionId,
        mut reader: OwnedReadHalf,
        server_tx: mpsc::UnboundedSender<ServerMessage>,
    ) {
        loop {
            let message = match read_frame(&mut reader).await {
                Ok(Some(payload)) => match decode_packet(&payload) {
                    Ok(packet) => ServerMessage::PacketReceived { client_id, packet },
                    Err(error) => ServerMessage::MalformedPacket { client_id, error },
                },
                Ok(None) => break,
                Err(e) => {
                    warn!("Closing connection to client {}: {}", client_id, e);
                    break;
                }
            };

            if server_tx.send(message).is_err() {
                return;
            }
        }

        let _ = server_tx.send(ServerMessage::ConnectionClosed { client_id });
    }

    fn handle_packet(&mut self, client_id: ConnectionId, packet: Packet) {
        if !self.clients.contains(client_id) {
            debug!("Ignoring {} from departed client {}", packet.kind(), client_id);
            return;
        }

        match packet {
            Packet::ClientUpdate { commands } => {
                for command in commands {
                    let sequence = command.sequence;
                    if let Err(e) = self.game.enqueue(client_id, command) {
                        warn!(
                            "Discarding command {} from client {}: {}",
                            sequence, client_id, e
                        );
                    }
                }
            }

            Packet::Ping { origin_timestamp } => {
                self.clients
                    .send_to(client_id, Packet::Ping { origin_timestamp });
            }

            Packet::Disconnect => {
                info!("Client {} left", client_id);
                self.drop_client(client_id);
            }

            other => {
                warn!("Unexpected {} packet from client {}", other.kind(), client_id);
            }
        }
    }

    fn drop_client(&mut self, client_id: ConnectionId) {
        let removed_client = self.clients.remove_client(client_id);
        let removed_entity = self.game.remove_entity(client_id);
        if removed_client || removed_entity {
            debug!("Cleaned up client {}", client_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use shared::{encode_frame, Command, MovementFlags};
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;
    use tokio::time::timeout;

    fn test_config() -> ServerConfig {
        ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            ..ServerConfig::default()
        }
    }

    async fn next_packet(stream: &mut TcpStream) -> Packet {
        let payload = timeout(Duration::from_secs(2), read_frame(stream))
            .await
            .expect("timed out waiting for packet")
            .unwrap()
            .unwrap();
        decode_packet(&payload).unwrap()
    }

    #[tokio::test]
    async fn test_join_ack_on_connect() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        match next_packet(&mut stream).await {
            Packet::JoinAck {
                connection_id,
                tick_rate,
                snapshot,
                ..
            } => {
                assert_eq!(connection_id, 1);
                assert_eq!(tick_rate, 60);
                assert!(snapshot.entity(connection_id).is_some());
            }
            other => panic!("Unexpected packet type: {:?}", other),
        }

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_server_full_rejects() {
        let config = ServerConfig {
            max_clients: 1,
            ..test_config()
        };
        let server = Server::bind(config).await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let mut first = TcpStream::connect(addr).await.unwrap();
        assert!(matches!(next_packet(&mut first).await, Packet::JoinAck { .. }));

        let mut second = TcpStream::connect(addr).await.unwrap();
        match next_packet(&mut second).await {
            Packet::Rejected { reason } => assert_eq!(reason, "Server full"),
            other => panic!("Unexpected packet type: {:?}", other),
        }

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_ping_is_echoed() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        next_packet(&mut stream).await;

        write_packet(&mut stream, &Packet::Ping { origin_timestamp: 4242 })
            .await
            .unwrap();
        loop {
            if let Packet::Ping { origin_timestamp } = next_packet(&mut stream).await {
                assert_eq!(origin_timestamp, 4242);
                break;
            }
        }

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frame_keeps_connection() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let connection_id = match next_packet(&mut stream).await {
            Packet::JoinAck { connection_id, .. } => connection_id,
            other => panic!("Unexpected packet type: {:?}", other),
        };

        stream.write_all(&2u32.to_be_bytes()).await.unwrap();
        stream.write_all(&[0xFF, 0xFF]).await.unwrap();

        let command = Command::new(1, Vec3::NEG_Z, Vec3::Y, MovementFlags::FORWARD);
        let frame = encode_frame(&Packet::ClientUpdate {
            commands: vec![command],
        })
        .unwrap();
        stream.write_all(&frame).await.unwrap();

        loop {
            if let Packet::ServerUpdate { snapshot } = next_packet(&mut stream).await {
                let own = snapshot.entity(connection_id).unwrap();
                if own.last_acked_sequence == 1 {
                    assert!(own.position.z < 0.0);
                    break;
                }
            }
        }

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_timestamps_count_from_bind() {
        let server = Server::bind(test_config()).await.unwrap();
        let addr = server.local_addr();
        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run());

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let mut timestamps = Vec::new();
        while timestamps.len() < 6 {
            match next_packet(&mut stream).await {
                Packet::JoinAck { snapshot, .. } | Packet::ServerUpdate { snapshot } => {
                    timestamps.push(snapshot.server_timestamp)
                }
                _ => {}
            }
        }

        // milliseconds since bind, not since the epoch
        assert!(timestamps[0] < 60_000);
        assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(timestamps.last() > timestamps.first());

        handle.shutdown();
        task.await.unwrap().unwrap();
    }
}
