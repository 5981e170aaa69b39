//! # Packet History
//!
//! The pacer only schedules descriptors; payloads wait here until the sink
//! is told to send them. Slab-backed so insert and take are O(1) with no
//! allocation churn once warmed up.

use std::collections::HashMap;

use bytes::Bytes;
use slab::Slab;

/// Bounded payload store keyed by `(stream_id, sequence)`.
pub struct PacketHistory {
    entries: Slab<Bytes>,
    index: HashMap<(u32, u16), usize>,
    capacity: usize,
}

impl PacketHistory {
    pub fn new(capacity: usize) -> Self {
        PacketHistory {
            entries: Slab::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
            capacity,
        }
    }

    /// Store a payload. Returns `false` if the history is full. A payload
    /// already stored under the same key is replaced.
    pub fn insert(&mut self, stream_id: u32, sequence: u16, payload: Bytes) -> bool {
        if let Some(&key) = self.index.get(&(stream_id, sequence)) {
            if let Some(entry) = self.entries.get_mut(key) {
                *entry = payload;
                return true;
            }
        }
        if self.entries.len() >= self.capacity {
            return false;
        }
        let key = self.entries.insert(payload);
        self.index.insert((stream_id, sequence), key);
        true
    }

    /// Remove and return the payload for a packet.
    pub fn take(&mut self, stream_id: u32, sequence: u16) -> Option<Bytes> {
        let key = self.index.remove(&(stream_id, sequence))?;
        self.entries.try_remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
