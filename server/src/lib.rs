//! # State Synchronization Server
//!
//! Authoritative half of the protocol. The server owns the canonical state of
//! every connected entity, applies client commands at a fixed simulation rate
//! and broadcasts snapshots so clients can reconcile and interpolate.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! Commands are never applied on arrival. Network tasks only queue them; the
//! fixed-step loop in [`game::Game`] drains each connection's queue according
//! to its [`command_queue::DrainPolicy`] and runs every command through the
//! same movement model the client uses for prediction. Each applied command
//! advances that entity's acknowledged sequence number, and a command at or
//! below it is skipped, so duplicates never move an entity twice.
//!
//! ### Connection Lifecycle
//! Every accepted stream gets a fresh identity (never reused), an entity at
//! the origin and a `JoinAck` carrying the tick rate, the movement policy and
//! an initial snapshot. Closing the stream or sending `Disconnect` removes the
//! entity; commands still queued for it are dropped on the next tick.
//!
//! ### State Broadcasting
//! At the broadcast rate (30 Hz by default, independent of the 60 Hz
//! simulation) the whole world is sent to every client as one snapshot.
//!
//! ## Module Organization
//!
//! - `config`: runtime settings
//! - `entity_store`: entity table keyed by connection
//! - `command_queue`: per-connection buffering and drain policies
//! - `game`: fixed-step simulation, snapshots and join acks
//! - `client_manager`: connection roster and outbound queues
//! - `broadcaster`: snapshot fan-out
//! - `network`: TCP tasks and the main select loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod broadcaster;
pub mod client_manager;
pub mod command_queue;
pub mod config;
pub mod entity_store;
pub mod game;
pub mod network;
