//! UDP transmit path for the pacer.
//!
//! [`UdpSink`] keeps outbound payloads in a [`PacketHistory`] until the pacer
//! releases them, then writes them to a connected UDP socket. Padding is sent
//! as zero-filled datagrams.

use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::history::PacketHistory;
use crate::sink::PacketSink;

/// Largest padding datagram by default.
pub const DEFAULT_MAX_PADDING_PACKET: usize = 224;

/// Bind a UDP socket on `ip`. With `min_port == max_port == 0` the OS picks
/// the port; otherwise the first free port in `min_port..=max_port` is used.
pub fn bind_udp(ip: IpAddr, min_port: u16, max_port: u16) -> io::Result<UdpSocket> {
    if min_port == 0 && max_port == 0 {
        return UdpSocket::bind(SocketAddr::new(ip, 0));
    }
    if min_port > max_port {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("empty port range {min_port}..={max_port}"),
        ));
    }

    let mut last_err = None;
    for port in min_port..=max_port {
        match UdpSocket::bind(SocketAddr::new(ip, port)) {
            Ok(socket) => {
                debug!(%ip, port, "udp socket bound");
                return Ok(socket);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::AddrInUse, "no free port")))
}

/// [`PacketSink`] writing to a connected UDP socket.
pub struct UdpSink {
    socket: UdpSocket,
    history: Mutex<PacketHistory>,
    padding: Bytes,
}

impl UdpSink {
    /// Wrap a socket that has already been `connect`ed to the peer.
    pub fn new(socket: UdpSocket, history_capacity: usize) -> Self {
        UdpSink {
            socket,
            history: Mutex::new(PacketHistory::new(history_capacity)),
            padding: Bytes::from(vec![0u8; DEFAULT_MAX_PADDING_PACKET]),
        }
    }

    pub fn with_max_padding_packet(mut self, max_bytes: usize) -> Self {
        self.padding = Bytes::from(vec![0u8; max_bytes.max(1)]);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    fn history(&self) -> MutexGuard<'_, PacketHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Hold a payload until it is released. Store before offering the packet
    /// to the pacer. Returns `false` if the history is full.
    pub fn store(&self, stream_id: u32, sequence: u16, payload: Bytes) -> bool {
        self.history().insert(stream_id, sequence, payload)
    }

    /// Send a stored payload and forget it. Returns the bytes written, zero
    /// if the packet was unknown or the write failed.
    pub fn send_stored(&self, stream_id: u32, sequence: u16) -> usize {
        let Some(payload) = self.history().take(stream_id, sequence) else {
            warn!(stream_id, sequence, "no stored payload for released packet");
            return 0;
        };
        match self.socket.send(&payload) {
            Ok(n) => n,
            Err(e) => {
                warn!(stream_id, sequence, error = %e, "udp send failed");
                0
            }
        }
    }

    pub fn stored(&self) -> usize {
        self.history().len()
    }
}

impl PacketSink for UdpSink {
    fn send_now(&self, stream_id: u32, sequence: u16, _capture_time_ms: i64) {
        self.send_stored(stream_id, sequence);
    }

    fn produce_padding(&self, max_bytes: usize) -> usize {
        let mut sent = 0;
        while sent < max_bytes {
            let chunk = (max_bytes - sent).min(self.padding.len());
            match self.socket.send(&self.padding[..chunk]) {
                Ok(n) => sent += n,
                Err(e) => {
                    warn!(error = %e, "udp padding send failed");
                    break;
                }
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::time::Duration;

    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn connected_pair() -> (UdpSink, UdpSocket) {
        let receiver = bind_udp(LOCALHOST, 0, 0).unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let socket = bind_udp(LOCALHOST, 0, 0).unwrap();
        socket.connect(receiver.local_addr().unwrap()).unwrap();
        (UdpSink::new(socket, 16), receiver)
    }

    #[test]
    fn bind_in_range_fails_when_every_port_is_taken() {
        let taken = bind_udp(LOCALHOST, 0, 0).unwrap();
        let port = taken.local_addr().unwrap().port();
        assert!(bind_udp(LOCALHOST, port, port).is_err());
    }

    #[test]
    fn bind_rejects_inverted_range() {
        let err = bind_udp(LOCALHOST, 5000, 4000).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn send_now_writes_stored_payload() {
        let (sink, receiver) = connected_pair();
        assert!(sink.store(1, 42, Bytes::from_static(b"media")));
        sink.send_now(1, 42, 0);

        let mut buf = [0u8; 64];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"media");
        assert_eq!(sink.stored(), 0);
    }

    #[test]
    fn unknown_packet_sends_nothing() {
        let (sink, _receiver) = connected_pair();
        assert_eq!(sink.send_stored(1, 1), 0);
    }

    #[test]
    fn padding_is_split_into_datagrams() {
        let (sink, receiver) = connected_pair();
        let sink = sink.with_max_padding_packet(100);
        assert_eq!(sink.produce_padding(250), 250);

        let mut sizes = Vec::new();
        let mut buf = [0u8; 256];
        for _ in 0..3 {
            sizes.push(receiver.recv(&mut buf).unwrap());
        }
        assert_eq!(sizes, vec![100, 100, 50]);
    }
}
