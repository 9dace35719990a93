use std::collections::VecDeque;

use chrono::NaiveDate;

use common::{GeneratorStatus, Signal};

/// Number of signals kept in memory.
pub const HISTORY_CAPACITY: usize = 100;

/// Bounded signal history plus the counters reported by status queries.
///
/// Insertion order is creation order. Once full, every push evicts the
/// oldest entry.
#[derive(Debug, Clone)]
pub struct SignalStore {
    signals: VecDeque<Signal>,
    capacity: usize,
    status: GeneratorStatus,
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }
}

impl SignalStore {
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "signal history capacity must be > 0");
        Self {
            signals: VecDeque::with_capacity(capacity),
            capacity,
            status: GeneratorStatus::default(),
        }
    }

    /// Append a freshly generated signal and update the counters.
    pub fn push(&mut self, signal: Signal) {
        self.status.last_signal_time = Some(signal.created_at);
        self.status.total_signals_generated += 1;
        self.signals.push_back(signal);
        while self.signals.len() > self.capacity {
            self.signals.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn status(&self) -> GeneratorStatus {
        self.status.clone()
    }

    /// Copy of the last `limit` signals, oldest of the slice first.
    pub fn recent(&self, limit: usize) -> Vec<Signal> {
        let skip = self.signals.len().saturating_sub(limit);
        self.signals.iter().skip(skip).cloned().collect()
    }

    /// Copy of every retained signal created on the given local calendar day.
    pub fn on_day(&self, day: NaiveDate) -> Vec<Signal> {
        self.signals
            .iter()
            .filter(|s| s.created_at.date_naive() == day)
            .cloned()
            .collect()
    }
}
