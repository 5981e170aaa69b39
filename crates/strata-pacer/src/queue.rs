//! # Packet Queues
//!
//! Descriptor FIFOs that refuse duplicates. A packet that is already waiting
//! is not queued twice, so a retransmission request racing the original
//! enqueue cannot produce two sends.

use std::collections::{HashSet, VecDeque};

// ─── Priority ────────────────────────────────────────────────────────────────

/// Pacing priority class.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Priority {
    /// Retransmissions and audio. Drained first, force-sent under starvation.
    High = 0,
    /// Regular media. Force-sent under starvation.
    #[default]
    Normal = 1,
    /// Bulk traffic. Only sent when the media budget allows.
    Low = 2,
}

impl Priority {
    /// Number of priority classes.
    pub const COUNT: usize = 3;

    /// Index into a rank-ordered queue array (0 = drained first).
    pub fn rank(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

// ─── PacketDescriptor ────────────────────────────────────────────────────────

/// A packet waiting for its turn on the wire. The payload stays with the
/// producer; the pacer only tracks what it needs to schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketDescriptor {
    /// Owning stream (SSRC).
    pub stream_id: u32,
    /// Per-stream sequence number.
    pub sequence: u16,
    /// When the payload was captured, in clock milliseconds.
    pub capture_time_ms: i64,
    /// Size on the wire.
    pub bytes: usize,
    pub priority: Priority,
}

impl PacketDescriptor {
    fn key(&self) -> (u32, u16) {
        (self.stream_id, self.sequence)
    }
}

// ─── PacketQueue ─────────────────────────────────────────────────────────────

/// FIFO of descriptors, de-duplicated on `(stream_id, sequence)`.
#[derive(Debug, Default)]
pub struct PacketQueue {
    packets: VecDeque<PacketDescriptor>,
    resident: HashSet<(u32, u16)>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a descriptor. Returns `false` if the same packet is already
    /// waiting, in which case the queue is unchanged.
    pub fn push_back(&mut self, packet: PacketDescriptor) -> bool {
        if !self.resident.insert(packet.key()) {
            return false;
        }
        self.packets.push_back(packet);
        true
    }

    /// Remove the oldest descriptor.
    pub fn pop_front(&mut self) -> Option<PacketDescriptor> {
        let packet = self.packets.pop_front()?;
        self.resident.remove(&packet.key());
        Some(packet)
    }

    pub fn front(&self) -> Option<&PacketDescriptor> {
        self.packets.front()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }
}
