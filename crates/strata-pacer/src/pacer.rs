//! # Paced Sender
//!
//! Sits between the packetiser and the socket. Producers offer every outbound
//! packet through [`Pacer::enqueue_or_send_now`]; a single driver calls
//! [`Pacer::tick`] every few milliseconds to release queued packets at the
//! media rate and to top the link up with padding when nothing is queued.
//!
//! ## Budgets
//!
//! | Budget      | Rate                          | Debited by            |
//! |-------------|-------------------------------|-----------------------|
//! | media       | target × pace multiplier      | media, padding        |
//! | padding cap | `max_padding_kbps` (fixed)    | padding               |
//! | pad-up-to   | caller's pad-up-to rate       | media, padding        |
//!
//! ## Drain order
//!
//! With media budget left, queues drain High → Normal → Low. With the budget
//! spent, nothing is sent until `max_queue_time_without_send` has passed since
//! the last send; then the front High or Normal packet is forced out. Low
//! packets are never forced.
//!
//! ## Locking
//!
//! All state lives behind one mutex. `tick()` drops the guard around each
//! sink call, so the sink may re-enter the submission and control methods.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, trace};

use crate::budget::IntervalBudget;
use crate::clock::{Clock, MonotonicClock};
use crate::config::PacerConfig;
use crate::queue::{PacketDescriptor, PacketQueue, Priority};
use crate::sink::PacketSink;
use crate::stats::PacerStats;

// ─── Budget Snapshot ────────────────────────────────────────────────────────

/// Balances of the three budgets at one instant, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSnapshot {
    pub media: i64,
    pub padding: i64,
    pub pad_up_to: i64,
}

// ─── State ──────────────────────────────────────────────────────────────────

struct Dispatch {
    packet: PacketDescriptor,
    forced: bool,
    /// No later packet with the same capture time is still queued behind it.
    last_of_capture: bool,
}

struct PacerState {
    enabled: bool,
    paused: bool,
    /// Indexed by `Priority::rank()`.
    queues: [PacketQueue; Priority::COUNT],
    media_budget: IntervalBudget,
    padding_budget: IntervalBudget,
    pad_up_to_budget: IntervalBudget,
    last_tick_ms: i64,
    /// `None` until the first send; counts as long ago.
    last_send_ms: Option<i64>,
    last_queued_capture_ms: i64,
    last_sent_capture_ms: i64,
    stats: PacerStats,
}

impl PacerState {
    fn grow_budgets(&mut self, elapsed_ms: i64) {
        self.media_budget.grow(elapsed_ms);
        self.padding_budget.grow(elapsed_ms);
        self.pad_up_to_budget.grow(elapsed_ms);
    }

    fn record_media_sent(&mut self, bytes: usize, now_ms: i64) {
        self.last_send_ms = Some(now_ms);
        self.media_budget.spend(bytes as i64);
        self.pad_up_to_budget.spend(bytes as i64);
    }

    fn queues_empty(&self) -> bool {
        self.queues.iter().all(PacketQueue::is_empty)
    }

    fn starved(&self, now_ms: i64, limit_ms: i64) -> bool {
        self.last_send_ms
            .map_or(true, |last| now_ms - last > limit_ms)
    }

    /// Pop the next packet allowed out right now, if any.
    fn next_packet(&mut self, now_ms: i64, starvation_limit_ms: i64) -> Option<Dispatch> {
        let (eligible, forced) = if self.media_budget.remaining() > 0 {
            (Priority::COUNT, false)
        } else if self.starved(now_ms, starvation_limit_ms) {
            // High and Normal only.
            (Priority::Low.rank(), true)
        } else {
            return None;
        };

        let queue = self.queues[..eligible].iter_mut().find(|q| !q.is_empty())?;
        let packet = queue.pop_front()?;
        let last_of_capture = queue
            .front()
            .map_or(true, |next| next.capture_time_ms > packet.capture_time_ms);
        Some(Dispatch {
            packet,
            forced,
            last_of_capture,
        })
    }

    fn enqueue(&mut self, queue: Priority, packet: PacketDescriptor) {
        if packet.priority == Priority::Normal
            && packet.capture_time_ms > self.last_queued_capture_ms
        {
            self.last_queued_capture_ms = packet.capture_time_ms;
            trace!(
                capture_time_ms = packet.capture_time_ms,
                "pacing begin"
            );
        }
        if self.queues[queue.rank()].push_back(packet) {
            self.stats.packets_queued += 1;
        } else {
            self.stats.duplicates_suppressed += 1;
            trace!(
                stream_id = packet.stream_id,
                sequence = packet.sequence,
                "duplicate packet ignored"
            );
        }
    }
}

// ─── Pacer ──────────────────────────────────────────────────────────────────

/// Packet pacer. Shareable across threads (`Arc<Pacer<..>>`).
pub struct Pacer<S, C = MonotonicClock> {
    sink: S,
    clock: C,
    config: PacerConfig,
    state: Mutex<PacerState>,
}

impl<S: PacketSink> Pacer<S> {
    /// Create a disabled pacer on the monotonic clock.
    pub fn new(sink: S, config: PacerConfig) -> Self {
        Self::with_clock(sink, MonotonicClock::new(), config)
    }
}

impl<S: PacketSink, C: Clock> Pacer<S, C> {
    /// Create a disabled pacer on the given clock.
    pub fn with_clock(sink: S, clock: C, config: PacerConfig) -> Self {
        let now_ms = clock.now_ms();
        let state = PacerState {
            enabled: false,
            paused: false,
            queues: Default::default(),
            media_budget: IntervalBudget::new(config.paced_rate_kbps(config.initial_target_kbps)),
            padding_budget: IntervalBudget::new(config.max_padding_kbps as i64),
            // No padding until the first rate update.
            pad_up_to_budget: IntervalBudget::new(0),
            last_tick_ms: now_ms,
            last_send_ms: None,
            last_queued_capture_ms: 0,
            last_sent_capture_ms: 0,
            stats: PacerStats::default(),
        };
        Pacer {
            sink,
            clock,
            config,
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PacerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ─── Control ────────────────────────────────────────────────────────

    /// Turn pacing on or off. While off, every packet is released at once.
    pub fn set_enabled(&self, enabled: bool) {
        self.lock().enabled = enabled;
        debug!(enabled, "pacer status changed");
    }

    pub fn is_enabled(&self) -> bool {
        self.lock().enabled
    }

    /// Hold all traffic in the queues until [`Pacer::resume`].
    pub fn pause(&self) {
        self.lock().paused = true;
        debug!("pacer paused");
    }

    pub fn resume(&self) {
        self.lock().paused = false;
        debug!("pacer resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.lock().paused
    }

    /// Apply new rates from the congestion controller.
    pub fn update_rates(&self, target_kbps: u32, pad_up_to_kbps: u32) {
        let media_kbps = self.config.paced_rate_kbps(target_kbps);
        let mut state = self.lock();
        state.media_budget.set_target_rate_kbps(media_kbps);
        state.pad_up_to_budget.set_target_rate_kbps(pad_up_to_kbps as i64);
        drop(state);
        debug!(target_kbps, media_kbps, pad_up_to_kbps, "pacer rates updated");
    }

    // ─── Submission ─────────────────────────────────────────────────────

    /// Offer a packet. Returns `true` if the caller should send it right
    /// away; `false` means it was queued and will reach the sink from a
    /// later `tick()`.
    ///
    /// A negative `capture_time_ms` is replaced with the current time.
    pub fn enqueue_or_send_now(
        &self,
        priority: Priority,
        stream_id: u32,
        sequence: u16,
        capture_time_ms: i64,
        bytes: usize,
    ) -> bool {
        let now_ms = self.clock.now_ms();
        let mut state = self.lock();

        if !state.enabled {
            state.record_media_sent(bytes, now_ms);
            state.stats.packets_bypassed += 1;
            return true;
        }

        let packet = PacketDescriptor {
            stream_id,
            sequence,
            capture_time_ms: if capture_time_ms < 0 {
                now_ms
            } else {
                capture_time_ms
            },
            bytes,
            priority,
        };

        if state.paused {
            // Low shares the Normal queue while paused.
            let queue = match priority {
                Priority::High => Priority::High,
                Priority::Normal | Priority::Low => Priority::Normal,
            };
            state.enqueue(queue, packet);
            return false;
        }

        if state.queues[priority.rank()].is_empty() && state.media_budget.remaining() > 0 {
            state.record_media_sent(bytes, now_ms);
            state.stats.packets_sent_immediately += 1;
            return true;
        }

        state.enqueue(priority, packet);
        false
    }

    // ─── Driving ────────────────────────────────────────────────────────

    /// How long the driver may wait before the next `tick()`.
    pub fn time_until_next_tick(&self) -> Duration {
        let now_ms = self.clock.now_ms();
        let elapsed_ms = now_ms - self.lock().last_tick_ms;
        let interval_ms = self.config.min_tick_interval_ms();
        let wait_ms = if elapsed_ms <= 0 {
            interval_ms
        } else if elapsed_ms >= interval_ms {
            0
        } else {
            interval_ms - elapsed_ms
        };
        Duration::from_millis(wait_ms as u64)
    }

    /// Grow budgets, release whatever the budgets allow, then pad if idle.
    ///
    /// Must be called from one driver at a time, and never from the sink.
    pub fn tick(&self) {
        let now_ms = self.clock.now_ms();
        let mut state = self.lock();
        let elapsed_ms = now_ms - state.last_tick_ms;
        state.last_tick_ms = now_ms;
        if elapsed_ms <= 0 {
            return;
        }

        state.grow_budgets(elapsed_ms.min(self.config.max_tick_elapsed_ms()));
        if state.paused {
            return;
        }

        let starvation_limit_ms = self.config.max_queue_time_without_send_ms();
        while let Some(dispatch) = state.next_packet(self.clock.now_ms(), starvation_limit_ms) {
            let packet = dispatch.packet;
            if packet.priority == Priority::Normal {
                if packet.capture_time_ms > state.last_sent_capture_ms {
                    state.last_sent_capture_ms = packet.capture_time_ms;
                }
                if dispatch.last_of_capture {
                    trace!(
                        capture_time_ms = packet.capture_time_ms,
                        pacing_ms = self.clock.now_ms() - packet.capture_time_ms,
                        "pacing end"
                    );
                }
            }

            drop(state);
            self.sink
                .send_now(packet.stream_id, packet.sequence, packet.capture_time_ms);
            state = self.lock();

            state.record_media_sent(packet.bytes, self.clock.now_ms());
            state.stats.packets_paced += 1;
            state.stats.bytes_paced += packet.bytes as u64;
            if dispatch.forced {
                state.stats.packets_forced += 1;
            }
            trace!(
                stream_id = packet.stream_id,
                sequence = packet.sequence,
                priority = packet.priority.as_str(),
                forced = dispatch.forced,
                "paced packet sent"
            );
        }

        if state.queues_empty()
            && state.padding_budget.remaining() > 0
            && state.pad_up_to_budget.remaining() > 0
        {
            let padding_needed = state
                .padding_budget
                .remaining()
                .min(state.pad_up_to_budget.remaining()) as usize;
            state.stats.padding_bytes_requested += padding_needed as u64;

            drop(state);
            let produced = self.sink.produce_padding(padding_needed).min(padding_needed);
            state = self.lock();

            state.media_budget.spend(produced as i64);
            state.padding_budget.spend(produced as i64);
            state.pad_up_to_budget.spend(produced as i64);
            state.stats.padding_bytes_sent += produced as u64;
            trace!(requested = padding_needed, produced, "padding sent");
        }
    }

    // ─── Introspection ──────────────────────────────────────────────────

    /// Age of the oldest queued packet, measured from its capture time.
    pub fn queuing_delay_ms(&self) -> i64 {
        let now_ms = self.clock.now_ms();
        let state = self.lock();
        state
            .queues
            .iter()
            .filter_map(|q| q.front().map(|p| p.capture_time_ms))
            .min()
            .map_or(0, |oldest| (now_ms - oldest).max(0))
    }

    /// Total packets waiting across all queues.
    pub fn queue_len(&self) -> usize {
        self.lock().queues.iter().map(PacketQueue::len).sum()
    }

    /// Packets waiting in the queue for one priority class.
    pub fn queued(&self, priority: Priority) -> usize {
        self.lock().queues[priority.rank()].len()
    }

    pub fn budgets(&self) -> BudgetSnapshot {
        let state = self.lock();
        BudgetSnapshot {
            media: state.media_budget.remaining(),
            padding: state.padding_budget.remaining(),
            pad_up_to: state.pad_up_to_budget.remaining(),
        }
    }

    pub fn stats(&self) -> PacerStats {
        self.lock().stats.clone()
    }
}
