//! Connection roster for the state synchronization server
//!
//! Each accepted stream gets a [`Client`] entry holding its identity, peer
//! address and the sending half of its outbound queue. The per-connection
//! writer task owns the socket; everything else talks to it through here.

use log::{debug, info, warn};
use shared::{ConnectionId, Packet};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::sync::mpsc;

/// A connected peer and the channel feeding its writer task.
#[derive(Debug)]
pub struct Client {
    pub id: ConnectionId,
    pub addr: SocketAddr,
    pub connected_at: Instant,
    outbound: mpsc::UnboundedSender<Packet>,
}

impl Client {
    pub fn new(id: ConnectionId, addr: SocketAddr, outbound: mpsc::UnboundedSender<Packet>) -> Self {
        Self {
            id,
            addr,
            connected_at: Instant::now(),
            outbound,
        }
    }

    /// Queues a packet for this client. Fails once the writer task is gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.outbound.send(packet).is_ok()
    }
}

/// Tracks live connections and hands out identities.
///
/// Identities start at 1 and are never reused while the server runs, so a
/// late message from a closed connection can never touch a newer entity.
pub struct ClientManager {
    clients: HashMap<ConnectionId, Client>,
    next_client_id: ConnectionId,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a new connection.
    ///
    /// Returns `None` when the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        outbound: mpsc::UnboundedSender<Packet>,
    ) -> Option<ConnectionId> {
        if self.is_full() {
            warn!("Rejecting {}: server full ({} clients)", addr, self.max_clients);
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id = self.next_client_id.wrapping_add(1).max(1);

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, outbound));
        Some(client_id)
    }

    pub fn remove_client(&mut self, client_id: ConnectionId) -> bool {
        match self.clients.remove(&client_id) {
            Some(client) => {
                info!(
                    "Client {} disconnected after {:.1}s",
                    client.id,
                    client.connected_at.elapsed().as_secs_f32()
                );
                true
            }
            None => false,
        }
    }

    pub fn send_to(&self, client_id: ConnectionId, packet: Packet) -> bool {
        match self.clients.get(&client_id) {
            Some(client) => client.send(packet),
            None => false,
        }
    }

    /// Queues a packet for every client and returns how many accepted it.
    pub fn broadcast(&self, packet: &Packet) -> usize {
        let mut delivered = 0;
        for client in self.clients.values() {
            if client.send(packet.clone()) {
                delivered += 1;
            } else {
                debug!("Writer for client {} already closed", client.id);
            }
        }
        delivered
    }

    pub fn contains(&self, client_id: ConnectionId) -> bool {
        self.clients.contains_key(&client_id)
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.clients.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
