//! # Interval Budget
//!
//! Token bucket measured in bytes. Grows by `rate × elapsed` on every tick and
//! is debited for every byte put on the wire. Overuse carries over as debt;
//! underuse does not carry over as credit.
//!
//! ```text
//!   remaining ≥ 0  ──grow(Δ)──▶  remaining = rate·Δ/8          (surplus forfeited)
//!   remaining < 0  ──grow(Δ)──▶  remaining = remaining + rate·Δ/8  (debt repaid)
//!   spend(n)       ──────────▶  remaining = max(remaining - n, -rate·100/8)
//! ```

/// Debt is bounded to this many milliseconds of target-rate bytes.
pub const MAX_DEBT_MS: i64 = 100;

/// Byte budget for one traffic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalBudget {
    /// Target rate in kbit/s.
    target_rate_kbps: i64,
    /// Signed byte balance. Negative means debt.
    bytes_remaining: i64,
}

impl IntervalBudget {
    /// Create a budget with the given rate and an empty balance.
    pub fn new(initial_target_rate_kbps: i64) -> Self {
        IntervalBudget {
            target_rate_kbps: initial_target_rate_kbps,
            bytes_remaining: 0,
        }
    }

    /// Change the rate used by future growth. The current balance is kept.
    pub fn set_target_rate_kbps(&mut self, target_rate_kbps: i64) {
        self.target_rate_kbps = target_rate_kbps;
    }

    pub fn target_rate_kbps(&self) -> i64 {
        self.target_rate_kbps
    }

    /// Accrue `elapsed_ms` worth of bytes at the target rate.
    pub fn grow(&mut self, elapsed_ms: i64) {
        let bytes = self.target_rate_kbps * elapsed_ms / 8;
        if self.bytes_remaining < 0 {
            // Overused last interval, pay it back.
            self.bytes_remaining += bytes;
        } else {
            self.bytes_remaining = bytes;
        }
    }

    /// Debit `bytes`, never going below the debt floor.
    pub fn spend(&mut self, bytes: i64) {
        self.bytes_remaining = (self.bytes_remaining - bytes).max(self.debt_floor());
    }

    /// Current signed balance in bytes.
    pub fn remaining(&self) -> i64 {
        self.bytes_remaining
    }

    /// Lowest balance the budget can reach.
    pub fn debt_floor(&self) -> i64 {
        -MAX_DEBT_MS * self.target_rate_kbps / 8
    }
}
