//! # Pacer Statistics
//!
//! Counters maintained under the pacer lock. Snapshots are plain values
//! suitable for JSON export.

use serde::Serialize;

/// Aggregate pacer statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PacerStats {
    /// Packets released straight back to the caller with spare budget.
    pub packets_sent_immediately: u64,
    /// Packets released because pacing was disabled.
    pub packets_bypassed: u64,
    /// Packets placed in a queue.
    pub packets_queued: u64,
    /// Submissions ignored because the packet was already queued.
    pub duplicates_suppressed: u64,
    /// Queued packets handed to the sink by `tick()`.
    pub packets_paced: u64,
    /// Of `packets_paced`, those sent with an exhausted budget.
    pub packets_forced: u64,
    /// Bytes handed to the sink by `tick()`.
    pub bytes_paced: u64,
    /// Padding bytes asked of the sink.
    pub padding_bytes_requested: u64,
    /// Padding bytes the sink reported producing.
    pub padding_bytes_sent: u64,
}

impl PacerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of paced packets that needed the starvation override.
    pub fn forced_ratio(&self) -> f64 {
        if self.packets_paced == 0 {
            0.0
        } else {
            self.packets_forced as f64 / self.packets_paced as f64
        }
    }

    /// How much of the requested padding the sink actually delivered.
    pub fn padding_fill_ratio(&self) -> f64 {
        if self.padding_bytes_requested == 0 {
            0.0
        } else {
            self.padding_bytes_sent as f64 / self.padding_bytes_requested as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratios_handle_zero_denominators() {
        let stats = PacerStats::new();
        assert_eq!(stats.forced_ratio(), 0.0);
        assert_eq!(stats.padding_fill_ratio(), 0.0);
    }

    #[test]
    fn ratios_compute() {
        let stats = PacerStats {
            packets_paced: 4,
            packets_forced: 1,
            padding_bytes_requested: 300,
            padding_bytes_sent: 150,
            ..Default::default()
        };
        assert!((stats.forced_ratio() - 0.25).abs() < f64::EPSILON);
        assert!((stats.padding_fill_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_to_json() {
        let stats = PacerStats {
            packets_queued: 3,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["packets_queued"], 3);
        assert_eq!(json["padding_bytes_sent"], 0);
    }
}
