//! # strata-pacer
//!
//! Packet pacing for real-time media senders.
//!
//! Smooths bursts from the packetiser into a rate-limited stream over 5 ms
//! slices, drains retransmissions and audio ahead of bulk video, and asks
//! the transmit path for padding when the queues run dry so bandwidth
//! probing keeps running.
//!
//! ## Crate structure
//!
//! - [`budget`] — Byte budgets with debt carry-over and a debt floor
//! - [`queue`] — Priority classes and duplicate-free descriptor FIFOs
//! - [`pacer`] — The scheduler: submission, tick, drain and padding
//! - [`sink`] — Transmit-side callback contract
//! - [`clock`] — Monotonic and manual millisecond clocks
//! - [`config`] — Pacer policy and TOML loading
//! - [`stats`] — Counters for export
//! - [`runtime`] — Background thread driving `tick()`
//! - [`history`] — Payload store for sinks that send by sequence number
//! - [`net`] — UDP sink and socket binding

pub mod budget;
pub mod clock;
pub mod config;
pub mod history;
pub mod net;
pub mod pacer;
pub mod queue;
pub mod runtime;
pub mod sink;
pub mod stats;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, PacerConfig};
pub use pacer::{BudgetSnapshot, Pacer};
pub use queue::Priority;
pub use runtime::PacerRuntime;
pub use sink::PacketSink;
pub use stats::PacerStats;
