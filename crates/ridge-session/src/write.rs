//! Write requests and the injected write-request queue.
//!
//! A request tracks two things beyond its payload:
//!   - flush progress, advanced by the processor as bytes leave the socket
//!   - its own share of the session's backpressure counters
//!
//! The second part is what keeps the session counters exact: a request can
//! only ever release what it added, no matter how often the processor
//! reports progress or discards it.

use std::collections::VecDeque;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use ridge_core::{AnyMessage, FileRegion, WriteFuture};

use crate::session::Session;

/// A prepared outbound payload.
#[derive(Clone)]
pub enum Payload {
    Buffer(Bytes),
    Region(FileRegion),
    Object(AnyMessage),
}

impl Payload {
    /// Byte length. Objects have none until encoded.
    pub fn len(&self) -> u64 {
        match self {
            Payload::Buffer(b) => b.len() as u64,
            Payload::Region(r) => r.length(),
            Payload::Object(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Buffer(b) => f.debug_tuple("Buffer").field(&b.len()).finish(),
            Payload::Region(r) => f.debug_tuple("Region").field(&r.length()).finish(),
            Payload::Object(_) => f.write_str("Object(..)"),
        }
    }
}

struct CloseMarker;

/// One queued write.
pub struct WriteRequest {
    payload: Payload,
    future: WriteFuture,
    destination: Option<SocketAddr>,
    sentinel: bool,
    flushed: AtomicU64,
    scheduled_bytes: AtomicU64,
    scheduled_message: AtomicBool,
    ever_scheduled: AtomicBool,
    counted: AtomicBool,
}

impl WriteRequest {
    pub fn new(payload: Payload, future: WriteFuture, destination: Option<SocketAddr>) -> Self {
        Self {
            payload,
            future,
            destination,
            sentinel: false,
            flushed: AtomicU64::new(0),
            scheduled_bytes: AtomicU64::new(0),
            scheduled_message: AtomicBool::new(false),
            ever_scheduled: AtomicBool::new(false),
            counted: AtomicBool::new(false),
        }
    }

    /// The reserved request that closes the session once dequeued.
    pub(crate) fn close_sentinel() -> Arc<Self> {
        let mut request = Self::new(Payload::Object(Arc::new(CloseMarker)), WriteFuture::new(), None);
        request.sentinel = true;
        Arc::new(request)
    }

    pub(crate) fn is_close_sentinel(&self) -> bool {
        self.sentinel
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn future(&self) -> &WriteFuture {
        &self.future
    }

    pub fn destination(&self) -> Option<SocketAddr> {
        self.destination
    }

    /// Bytes confirmed flushed so far.
    pub fn flushed(&self) -> u64 {
        self.flushed.load(Ordering::Acquire)
    }

    /// Bytes still to be flushed.
    pub fn remaining(&self) -> u64 {
        self.payload.len().saturating_sub(self.flushed())
    }

    pub fn is_fully_flushed(&self) -> bool {
        self.remaining() == 0
    }

    /// Record `n` flushed bytes, capped at the payload length.
    /// Returns how many bytes actually advanced.
    pub(crate) fn advance(&self, n: u64) -> u64 {
        let len = self.payload.len();
        let prev = self
            .flushed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |f| {
                Some(f.saturating_add(n).min(len))
            })
            .unwrap_or_else(|f| f);
        prev.saturating_add(n).min(len) - prev
    }

    /// Claim this request's share of backpressure. Returns the bytes to add,
    /// or None if the request was already scheduled once.
    pub(crate) fn mark_scheduled(&self) -> Option<u64> {
        if self.ever_scheduled.swap(true, Ordering::AcqRel) {
            return None;
        }
        let bytes = self.remaining();
        self.scheduled_bytes.store(bytes, Ordering::Release);
        self.scheduled_message.store(true, Ordering::Release);
        Some(bytes)
    }

    /// Release up to `n` of the scheduled bytes. Returns the amount released.
    pub(crate) fn release_bytes(&self, n: u64) -> u64 {
        let prev = self
            .scheduled_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |b| Some(b.saturating_sub(n)))
            .unwrap_or_else(|b| b);
        prev.min(n)
    }

    /// Release the scheduled message slot. True only for the first caller.
    pub(crate) fn release_message(&self) -> bool {
        self.scheduled_message.swap(false, Ordering::AcqRel)
    }

    /// Release everything still scheduled: (bytes, message slot).
    pub(crate) fn release_all(&self) -> (u64, bool) {
        let bytes = self.scheduled_bytes.swap(0, Ordering::AcqRel);
        (bytes, self.release_message())
    }

    /// True only the first time a fully flushed request is counted as written.
    pub(crate) fn mark_counted(&self) -> bool {
        !self.counted.swap(true, Ordering::AcqRel)
    }
}

impl fmt::Debug for WriteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sentinel {
            return f.write_str("WriteRequest(CLOSE)");
        }
        f.debug_struct("WriteRequest")
            .field("payload", &self.payload)
            .field("destination", &self.destination)
            .field("flushed", &self.flushed())
            .finish()
    }
}

/// FIFO of pending requests, injected per session by the transport.
pub trait WriteRequestQueue: Send + Sync {
    fn offer(&self, request: Arc<WriteRequest>);
    fn poll(&self) -> Option<Arc<WriteRequest>>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn clear(&self);
    /// Called once the session has closed. Requests still queued must stay
    /// pollable so the session can fail them.
    fn dispose(&self);
}

/// Default in-memory queue.
#[derive(Default)]
pub struct FifoWriteQueue {
    requests: Mutex<VecDeque<Arc<WriteRequest>>>,
}

impl FifoWriteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Arc<WriteRequest>>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WriteRequestQueue for FifoWriteQueue {
    fn offer(&self, request: Arc<WriteRequest>) {
        self.lock().push_back(request);
    }

    fn poll(&self) -> Option<Arc<WriteRequest>> {
        self.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    fn dispose(&self) {}
}

/// Decorator that turns the close sentinel into an actual close.
pub(crate) struct CloseAwareWriteQueue {
    inner: Box<dyn WriteRequestQueue>,
}

impl CloseAwareWriteQueue {
    pub(crate) fn new(inner: Box<dyn WriteRequestQueue>) -> Self {
        Self { inner }
    }

    /// Next request to flush. Dequeuing the sentinel closes `session`,
    /// fails every request queued behind it, disposes the inner queue and
    /// yields None.
    pub(crate) fn poll(&self, session: &Session) -> Option<Arc<WriteRequest>> {
        let request = self.inner.poll()?;
        if request.is_close_sentinel() {
            tracing::debug!(session = session.id(), "close sentinel reached");
            session.close(true);
            session.fail_pending_writes();
            self.inner.dispose();
            return None;
        }
        Some(request)
    }

    /// Dequeue without sentinel handling, for draining after close.
    pub(crate) fn poll_raw(&self) -> Option<Arc<WriteRequest>> {
        self.inner.poll()
    }

    pub(crate) fn offer(&self, request: Arc<WriteRequest>) {
        self.inner.offer(request);
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
