//! Throughput — rate-limited recomputation of per-second rates.
//!
//!   rate = (current_total - previous_total) * 1000.0 / interval_ms
//!
//! Unforced updates wait for the configured minimum interval. A minimum
//! of 0 disables unforced updates entirely.

/// Cumulative I/O counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    pub read_bytes: u64,
    pub written_bytes: u64,
    pub read_messages: u64,
    pub written_messages: u64,
}

/// Per-second rates from the last calculation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ThroughputRates {
    pub read_bytes: f64,
    pub written_bytes: f64,
    pub read_messages: f64,
    pub written_messages: f64,
}

#[derive(Debug)]
pub struct Throughput {
    rates: ThroughputRates,
    baseline: Totals,
    last_calculation: u64,
}

impl Throughput {
    pub fn new(now: u64) -> Self {
        Self {
            rates: ThroughputRates::default(),
            baseline: Totals::default(),
            last_calculation: now,
        }
    }

    /// Recompute if due (or forced). Returns true if rates were updated.
    pub fn update(&mut self, totals: Totals, now: u64, min_interval: u64, force: bool) -> bool {
        let interval = now.saturating_sub(self.last_calculation);
        if (min_interval == 0 || interval < min_interval) && !force {
            return false;
        }
        // Forced with no elapsed time: nothing meaningful to divide by.
        if interval == 0 {
            return false;
        }

        let per_sec = |current: u64, previous: u64| {
            current.saturating_sub(previous) as f64 * 1000.0 / interval as f64
        };
        self.rates = ThroughputRates {
            read_bytes: per_sec(totals.read_bytes, self.baseline.read_bytes),
            written_bytes: per_sec(totals.written_bytes, self.baseline.written_bytes),
            read_messages: per_sec(totals.read_messages, self.baseline.read_messages),
            written_messages: per_sec(totals.written_messages, self.baseline.written_messages),
        };
        self.baseline = totals;
        self.last_calculation = now;
        true
    }

    pub fn rates(&self) -> ThroughputRates {
        self.rates
    }

    pub fn last_calculation(&self) -> u64 {
        self.last_calculation
    }

    /// Zero the rates. The baseline stays so a later update stays correct.
    pub fn reset_rates(&mut self) {
        self.rates = ThroughputRates::default();
    }
}
