//! Wire messages and their length-prefixed framing
//!
//! Every message travels as one frame: a 4-byte big-endian length followed by
//! a bincode-encoded [`Packet`]. The transport underneath is a reliable,
//! ordered byte stream.

use crate::command::Command;
use crate::entity::ConnectionId;
use crate::error::ProtocolError;
use crate::movement::MovementPolicy;
use crate::snapshot::Snapshot;
use bincode::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest accepted frame payload.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    /// Sent once to a newly accepted connection.
    JoinAck {
        connection_id: ConnectionId,
        tick_rate: u32,
        movement_policy: MovementPolicy,
        snapshot: Snapshot,
    },
    /// One or more commands, oldest first.
    ClientUpdate { commands: Vec<Command> },
    /// Broadcast every snapshot tick.
    ServerUpdate { snapshot: Snapshot },
    /// Client sends its clock reading; the server echoes it untouched.
    Ping { origin_timestamp: u64 },
    /// Graceful leave.
    Disconnect,
    /// Connection refused, e.g. server full.
    Rejected { reason: String },
}

impl Packet {
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::JoinAck { .. } => "join-ack",
            Packet::ClientUpdate { .. } => "client-update",
            Packet::ServerUpdate { .. } => "server-update",
            Packet::Ping { .. } => "ping",
            Packet::Disconnect => "disconnect",
            Packet::Rejected { .. } => "rejected",
        }
    }
}

/// Serializes a packet into a complete frame, length prefix included.
pub fn encode_frame(packet: &Packet) -> Result<Vec<u8>, ProtocolError> {
    let payload = serialize(packet).map_err(ProtocolError::Encode)?;
    if payload.len() > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

pub fn decode_packet(payload: &[u8]) -> Result<Packet, ProtocolError> {
    deserialize(payload).map_err(ProtocolError::Decode)
}

/// Reads one frame payload.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_LEN {
        return Err(ProtocolError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(packet)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
