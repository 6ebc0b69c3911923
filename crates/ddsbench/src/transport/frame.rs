// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Datagram framing.
//!
//! ```text
//!  0       4   5   6       8              12             16
//!  +-------+---+---+-------+--------------+--------------+---------...
//!  | DBNC  |ver|kind| rsvd | topic hash   | sequence     | payload
//!  +-------+---+---+-------+--------------+--------------+---------...
//! ```
//!
//! All integers are little-endian. The topic hash (FNV-1a, 32-bit) lets
//! receivers on a shared multicast port ignore other topics cheaply.

/// Frame magic.
pub const MAGIC: [u8; 4] = *b"DBNC";
/// Wire version.
pub const VERSION: u8 = 1;
/// Header length in bytes.
pub const HEADER_LEN: usize = 16;
/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM: usize = 65_507;
/// Largest benchmark payload that fits in one datagram.
pub const MAX_PAYLOAD: usize = MAX_DATAGRAM - HEADER_LEN;

/// Frame kind byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Data sample.
    Data = 0,
    /// Instance disposed.
    Disposed = 1,
    /// Writer unregistered.
    Unregistered = 2,
}

impl FrameKind {
    fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(FrameKind::Data),
            1 => Some(FrameKind::Disposed),
            2 => Some(FrameKind::Unregistered),
            _ => None,
        }
    }
}

/// Borrowed view of a decoded datagram.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Frame kind.
    pub kind: FrameKind,
    /// FNV-1a hash of the topic name.
    pub topic_hash: u32,
    /// Writer sequence number (wraps).
    pub sequence: u32,
    /// Payload bytes.
    pub payload: &'a [u8],
}

/// FNV-1a 32-bit hash of a topic name.
pub fn topic_hash(topic: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;
    topic
        .bytes()
        .fold(OFFSET, |h, b| (h ^ u32::from(b)).wrapping_mul(PRIME))
}

/// Write header + payload into `buf`, replacing its contents.
pub fn encode_into(
    buf: &mut Vec<u8>,
    kind: FrameKind,
    topic_hash: u32,
    sequence: u32,
    payload: &[u8],
) {
    buf.clear();
    buf.reserve(HEADER_LEN + payload.len());
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.push(kind as u8);
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&topic_hash.to_le_bytes());
    buf.extend_from_slice(&sequence.to_le_bytes());
    buf.extend_from_slice(payload);
}

/// Parse a datagram. `None` for foreign or malformed packets.
pub fn decode(datagram: &[u8]) -> Option<Frame<'_>> {
    if datagram.len() < HEADER_LEN || datagram[0..4] != MAGIC || datagram[4] != VERSION {
        return None;
    }
    let kind = FrameKind::from_u8(datagram[5])?;
    let topic_hash = u32::from_le_bytes([datagram[8], datagram[9], datagram[10], datagram[11]]);
    let sequence = u32::from_le_bytes([datagram[12], datagram[13], datagram[14], datagram[15]]);
    Some(Frame {
        kind,
        topic_hash,
        sequence,
        payload: &datagram[HEADER_LEN..],
    })
}
