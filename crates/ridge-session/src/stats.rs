//! Service-wide I/O statistics.
//!
//! An optional sink shared by every session of one service. Sessions
//! mirror each counter change into it; nothing here is required for a
//! session to work.

use std::sync::atomic::{AtomicU64, Ordering};

/// Subtract without going below zero. Returns the amount actually removed.
pub(crate) fn saturating_sub(counter: &AtomicU64, n: u64) -> u64 {
    let prev = counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| Some(v.saturating_sub(n)))
        .unwrap_or_else(|v| v);
    prev.min(n)
}

/// Keep the later of the stored timestamp and `now`.
pub(crate) fn store_latest(slot: &AtomicU64, now: u64) {
    slot.fetch_max(now, Ordering::AcqRel);
}

#[derive(Debug, Default)]
pub struct IoStatistics {
    read_bytes: AtomicU64,
    written_bytes: AtomicU64,
    read_messages: AtomicU64,
    written_messages: AtomicU64,
    scheduled_write_bytes: AtomicU64,
    scheduled_write_messages: AtomicU64,
    last_read_time: AtomicU64,
    last_write_time: AtomicU64,
}

impl IoStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increase_read_bytes(&self, n: u64, now: u64) {
        self.read_bytes.fetch_add(n, Ordering::Relaxed);
        store_latest(&self.last_read_time, now);
    }

    pub fn increase_read_messages(&self, now: u64) {
        self.read_messages.fetch_add(1, Ordering::Relaxed);
        store_latest(&self.last_read_time, now);
    }

    pub fn increase_written_bytes(&self, n: u64, now: u64) {
        self.written_bytes.fetch_add(n, Ordering::Relaxed);
        store_latest(&self.last_write_time, now);
    }

    pub fn increase_written_messages(&self, now: u64) {
        self.written_messages.fetch_add(1, Ordering::Relaxed);
        store_latest(&self.last_write_time, now);
    }

    pub fn increase_scheduled_write_bytes(&self, n: u64) {
        self.scheduled_write_bytes.fetch_add(n, Ordering::Relaxed);
    }

    pub fn decrease_scheduled_write_bytes(&self, n: u64) {
        saturating_sub(&self.scheduled_write_bytes, n);
    }

    pub fn increase_scheduled_write_messages(&self) {
        self.scheduled_write_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decrease_scheduled_write_messages(&self, n: u64) {
        saturating_sub(&self.scheduled_write_messages, n);
    }

    pub fn read_bytes(&self) -> u64 {
        self.read_bytes.load(Ordering::Relaxed)
    }

    pub fn written_bytes(&self) -> u64 {
        self.written_bytes.load(Ordering::Relaxed)
    }

    pub fn read_messages(&self) -> u64 {
        self.read_messages.load(Ordering::Relaxed)
    }

    pub fn written_messages(&self) -> u64 {
        self.written_messages.load(Ordering::Relaxed)
    }

    pub fn scheduled_write_bytes(&self) -> u64 {
        self.scheduled_write_bytes.load(Ordering::Relaxed)
    }

    pub fn scheduled_write_messages(&self) -> u64 {
        self.scheduled_write_messages.load(Ordering::Relaxed)
    }

    pub fn last_read_time(&self) -> u64 {
        self.last_read_time.load(Ordering::Relaxed)
    }

    pub fn last_write_time(&self) -> u64 {
        self.last_write_time.load(Ordering::Relaxed)
    }
}
