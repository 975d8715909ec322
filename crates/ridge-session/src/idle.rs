//! Idle and write-timeout detection.
//!
//! Stateless: an external scheduler calls `notify_idle_session` once per
//! session per tick with the current time. Each category fires once per
//! full threshold of continued inactivity, measured from the later of
//! its last relevant I/O and its own last firing, so the three
//! categories keep independent cadences.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use ridge_core::{IdleStatus, WriteError};

use crate::session::Session;

#[derive(Debug, Default)]
struct IdleSlot {
    count: AtomicU32,
    last_idle_time: AtomicU64,
}

/// Per-category idle counts and last firing times.
#[derive(Debug, Default)]
pub(crate) struct IdleTracker {
    slots: [IdleSlot; 3],
}

impl IdleTracker {
    pub(crate) fn new(now: u64) -> Self {
        let tracker = Self::default();
        for slot in &tracker.slots {
            slot.last_idle_time.store(now, Ordering::Relaxed);
        }
        tracker
    }

    fn slot(&self, status: IdleStatus) -> &IdleSlot {
        &self.slots[status.index()]
    }

    pub(crate) fn count(&self, status: IdleStatus) -> u32 {
        self.slot(status).count.load(Ordering::Acquire)
    }

    pub(crate) fn last_idle_time(&self, status: IdleStatus) -> u64 {
        self.slot(status).last_idle_time.load(Ordering::Acquire)
    }

    pub(crate) fn increase(&self, status: IdleStatus, now: u64) -> u32 {
        let slot = self.slot(status);
        slot.last_idle_time.store(now, Ordering::Release);
        slot.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset(&self, status: IdleStatus) {
        self.slot(status).count.store(0, Ordering::Release);
    }

    pub(crate) fn on_read(&self) {
        for status in IdleStatus::ALL.into_iter().filter(|s| s.tracks_reads()) {
            self.reset(status);
        }
    }

    pub(crate) fn on_write(&self) {
        for status in IdleStatus::ALL.into_iter().filter(|s| s.tracks_writes()) {
            self.reset(status);
        }
    }
}

/// Run idle and write-timeout checks over every session.
pub fn notify_idleness<'a, I>(sessions: I, now: u64)
where
    I: IntoIterator<Item = &'a Session>,
{
    for session in sessions {
        notify_idle_session(session, now);
    }
}

/// Fire whichever idle categories are due and enforce the write timeout.
pub fn notify_idle_session(session: &Session, now: u64) {
    for status in IdleStatus::ALL {
        let last_io = match status {
            IdleStatus::BothIdle => session.last_io_time(),
            IdleStatus::ReaderIdle => session.last_read_time(),
            IdleStatus::WriterIdle => session.last_write_time(),
        };
        let since = last_io.max(session.last_idle_time(status));
        notify_idle_status(session, now, status, since);
    }
    notify_write_timeout(session, now);
}

fn notify_idle_status(session: &Session, now: u64, status: IdleStatus, since: u64) {
    let idle_time = session.config().idle_time_ms(status);
    if idle_time == 0 || now.saturating_sub(since) < idle_time {
        return;
    }
    let count = session.increase_idle_count(status, now);
    tracing::trace!(session = session.id(), %status, count, "session idle");
    session.filter_chain().fire_session_idle(session, status);
}

fn notify_write_timeout(session: &Session, now: u64) {
    let timeout_ms = session.config().write.timeout_ms;
    if timeout_ms == 0
        || now.saturating_sub(session.last_write_time()) < timeout_ms
        || session.write_queue_is_empty()
    {
        return;
    }
    let Some(request) = session.take_current_write_request() else {
        return;
    };

    tracing::warn!(session = session.id(), timeout_ms, "write timed out, closing session");
    let cause = WriteError::Timeout { timeout_ms };
    session.decrease_scheduled_bytes_and_messages(&request);
    request.future().set_exception(cause.clone());
    session.filter_chain().fire_exception_caught(session, &cause);
    session.close(true);
}
