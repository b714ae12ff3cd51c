//! # State Synchronization Client
//!
//! Client half of the protocol. It never waits for the server before moving
//! its own entity, and it draws everyone else slightly in the past so there
//! are always two snapshots to blend between.
//!
//! ## Client-Side Prediction
//! Each input step becomes a sequence-numbered command that is applied to the
//! local entity immediately, through the same movement model and fixed `dt`
//! the server uses, and kept in a pending history.
//!
//! ## Server Reconciliation
//! When a snapshot arrives the local entity snaps to the server's state, every
//! pending command the server has acknowledged is dropped, and the rest are
//! replayed in order. With identical movement code on both ends the replay
//! lands where the prediction already was unless the server disagreed.
//!
//! ## Interpolation
//! Snapshots go into a bounded ring buffer. Remote entities are rendered at
//! the estimated server time minus a render delay (200 ms by default),
//! linearly blended between the two snapshots that bracket it. When nothing
//! brackets the target the newest snapshot is used as-is.
//!
//! ## Module Organization
//!
//! - `input`: mouse-look controller and input sources
//! - `predictor`, `reconciler`: local entity prediction and correction
//! - `interpolation`: snapshot buffer and remote entity blending
//! - `game`: ties the above together per connection
//! - `stats`: ping, update rate and server clock estimate
//! - `batching`, `latency`: outgoing batches and simulated ping
//! - `render`: render collaborator interface
//! - `network`: TCP connection and the run loop
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::input::ScriptedInput;
//! use client::network::Client;
//! use client::render::LogRenderer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect(
//!         ClientConfig::default(),
//!         Box::new(ScriptedInput::default()),
//!         Box::new(LogRenderer::default()),
//!     )
//!     .await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod batching;
pub mod config;
pub mod game;
pub mod input;
pub mod interpolation;
pub mod latency;
pub mod network;
pub mod predictor;
pub mod reconciler;
pub mod render;
pub mod stats;
