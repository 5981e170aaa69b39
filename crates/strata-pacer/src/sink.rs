use std::sync::Arc;

/// Transmit side of the pacer.
///
/// Called from `Pacer::tick()` with the pacer lock released, so
/// implementations may call back into the pacer's submission and control
/// methods. They must not call `tick()` and must not block for long: a slow
/// sink stalls the pacing thread.
pub trait PacketSink: Send + Sync {
    /// Put the identified packet on the wire now.
    fn send_now(&self, stream_id: u32, sequence: u16, capture_time_ms: i64);

    /// Emit up to `max_bytes` of padding. Returns the bytes actually sent,
    /// which may be anything from zero to `max_bytes`.
    fn produce_padding(&self, max_bytes: usize) -> usize;
}

impl<S: PacketSink + ?Sized> PacketSink for Arc<S> {
    fn send_now(&self, stream_id: u32, sequence: u16, capture_time_ms: i64) {
        (**self).send_now(stream_id, sequence, capture_time_ms)
    }

    fn produce_padding(&self, max_bytes: usize) -> usize {
        (**self).produce_padding(max_bytes)
    }
}
