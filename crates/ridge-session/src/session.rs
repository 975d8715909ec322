//! Session — per-connection state shared by the I/O processor, the idle
//! scanner and application threads.
//!
//! Every field is either immutable after construction, atomic, or behind
//! a short-lived lock. No lock is held while calling the processor, the
//! filter chain or a future listener.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use ridge_core::attribute::ATTACHMENT_KEY;
use ridge_core::{
    monitor, AnyMessage, AttributeKey, AttributeMap, AttributeValue, CloseFuture, FileRegion,
    IdleStatus, Message, ReadFailure, ReadFuture, ReadOutcome, RidgeConfig, SessionError,
    WriteError, WriteFuture,
};

use crate::idle::IdleTracker;
use crate::read::ReadFutures;
use crate::service::{FilterChain, Processor, SessionRole, TransportMetadata};
use crate::stats::{saturating_sub, store_latest, IoStatistics};
use crate::throughput::{Throughput, ThroughputRates, Totals};
use crate::write::{CloseAwareWriteQueue, Payload, WriteRequest, WriteRequestQueue};

const OPEN: u8 = 0;
const CLOSING_ON_FLUSH: u8 = 1;
const CLOSING: u8 = 2;

/// Traffic counters. Shared with the close listener, which resets the
/// scheduled counters and rates once the session is gone.
#[derive(Debug)]
struct Traffic {
    read_bytes: AtomicU64,
    written_bytes: AtomicU64,
    read_messages: AtomicU64,
    written_messages: AtomicU64,
    last_read_time: AtomicU64,
    last_write_time: AtomicU64,
    scheduled_write_bytes: AtomicU64,
    scheduled_write_messages: AtomicU64,
    throughput: Mutex<Throughput>,
}

impl Traffic {
    fn new(now: u64) -> Self {
        Self {
            read_bytes: AtomicU64::new(0),
            written_bytes: AtomicU64::new(0),
            read_messages: AtomicU64::new(0),
            written_messages: AtomicU64::new(0),
            last_read_time: AtomicU64::new(now),
            last_write_time: AtomicU64::new(now),
            scheduled_write_bytes: AtomicU64::new(0),
            scheduled_write_messages: AtomicU64::new(0),
            throughput: Mutex::new(Throughput::new(now)),
        }
    }

    fn totals(&self) -> Totals {
        Totals {
            read_bytes: self.read_bytes.load(Ordering::Acquire),
            written_bytes: self.written_bytes.load(Ordering::Acquire),
            read_messages: self.read_messages.load(Ordering::Acquire),
            written_messages: self.written_messages.load(Ordering::Acquire),
        }
    }

    fn throughput(&self) -> MutexGuard<'_, Throughput> {
        self.throughput.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset_on_close(&self, statistics: Option<&IoStatistics>) {
        let bytes = self.scheduled_write_bytes.swap(0, Ordering::AcqRel);
        let messages = self.scheduled_write_messages.swap(0, Ordering::AcqRel);
        if let Some(stats) = statistics {
            stats.decrease_scheduled_write_bytes(bytes);
            stats.decrease_scheduled_write_messages(messages);
        }
        self.throughput().reset_rates();
    }
}

/// Everything a session needs at construction. Filled in by
/// [`SessionBuilder`](crate::factory::SessionBuilder).
pub(crate) struct SessionParts {
    pub id: u64,
    pub created_at: u64,
    pub role: SessionRole,
    pub local_addr: Option<SocketAddr>,
    pub remote_addr: Option<SocketAddr>,
    pub transport: TransportMetadata,
    pub config: Arc<RidgeConfig>,
    pub processor: Arc<dyn Processor>,
    pub filter_chain: Arc<dyn FilterChain>,
    pub statistics: Option<Arc<IoStatistics>>,
    pub write_queue: Box<dyn WriteRequestQueue>,
}

/// One logical connection.
pub struct Session {
    id: u64,
    created_at: u64,
    role: SessionRole,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    transport: TransportMetadata,
    config: Arc<RidgeConfig>,
    processor: Arc<dyn Processor>,
    filter_chain: Arc<dyn FilterChain>,
    statistics: Option<Arc<IoStatistics>>,

    state: AtomicU8,
    close_future: CloseFuture,
    scheduled_for_flush: AtomicBool,
    read_suspended: AtomicBool,
    write_suspended: AtomicBool,

    attributes: AttributeMap,
    write_queue: CloseAwareWriteQueue,
    current_write: Mutex<Option<Arc<WriteRequest>>>,
    read_futures: Option<ReadFutures>,

    traffic: Arc<Traffic>,
    idle: IdleTracker,
    read_buffer_size: AtomicUsize,
    defer_decrease_read_buffer: AtomicBool,
}

/// Sessions by id, shared between the acceptor and the idle scanner.
pub type SessionTable = Arc<DashMap<u64, Arc<Session>>>;

/// Create a new empty session table.
pub fn new_session_table() -> SessionTable {
    Arc::new(DashMap::new())
}

impl Session {
    pub(crate) fn new(parts: SessionParts) -> Self {
        let traffic = Arc::new(Traffic::new(parts.created_at));
        let close_future = CloseFuture::new();
        {
            let traffic = Arc::clone(&traffic);
            let statistics = parts.statistics.clone();
            close_future.add_listener(move || traffic.reset_on_close(statistics.as_deref()));
        }
        let read_futures = parts.config.read.use_read_operation.then(ReadFutures::new);
        let read_buffer_size = AtomicUsize::new(parts.config.read.buffer_size);

        Self {
            id: parts.id,
            created_at: parts.created_at,
            role: parts.role,
            local_addr: parts.local_addr,
            remote_addr: parts.remote_addr,
            transport: parts.transport,
            config: parts.config,
            processor: parts.processor,
            filter_chain: parts.filter_chain,
            statistics: parts.statistics,
            state: AtomicU8::new(OPEN),
            close_future,
            scheduled_for_flush: AtomicBool::new(false),
            read_suspended: AtomicBool::new(false),
            write_suspended: AtomicBool::new(false),
            attributes: AttributeMap::new(),
            write_queue: CloseAwareWriteQueue::new(parts.write_queue),
            current_write: Mutex::new(None),
            read_futures,
            traffic,
            idle: IdleTracker::new(parts.created_at),
            read_buffer_size,
            defer_decrease_read_buffer: AtomicBool::new(true),
        }
    }

    // ── Identity ──────────────────────────────────────────────────────────────

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn creation_time(&self) -> u64 {
        self.created_at
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// The address the owning service is bound to: local for servers,
    /// remote for clients.
    pub fn service_address(&self) -> Option<SocketAddr> {
        match self.role {
            SessionRole::Server => self.local_addr,
            SessionRole::Client => self.remote_addr,
        }
    }

    pub fn transport(&self) -> &TransportMetadata {
        &self.transport
    }

    pub fn config(&self) -> &RidgeConfig {
        &self.config
    }

    pub fn processor(&self) -> &Arc<dyn Processor> {
        &self.processor
    }

    pub fn filter_chain(&self) -> &Arc<dyn FilterChain> {
        &self.filter_chain
    }

    pub fn statistics(&self) -> Option<&Arc<IoStatistics>> {
        self.statistics.as_ref()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    pub fn is_connected(&self) -> bool {
        !self.close_future.is_closed()
    }

    /// True once any close has been requested or the session is closed.
    pub fn is_closing(&self) -> bool {
        self.state.load(Ordering::Acquire) != OPEN || self.close_future.is_closed()
    }

    pub fn close_future(&self) -> CloseFuture {
        self.close_future.clone()
    }

    /// Request a close. `immediate` fires the close now and discards
    /// queued writes; otherwise the session closes after every write
    /// queued before this call has been flushed.
    pub fn close(&self, immediate: bool) -> CloseFuture {
        if immediate {
            self.close_now()
        } else {
            self.close_on_flush()
        }
    }

    fn close_now(&self) -> CloseFuture {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            if state == CLOSING {
                return self.close_future();
            }
            match self
                .state
                .compare_exchange_weak(state, CLOSING, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => state = actual,
            }
        }
        if self.close_future.is_closed() {
            return self.close_future();
        }
        tracing::debug!(session = self.id, "closing session");
        self.filter_chain.fire_filter_close(self);
        self.close_future()
    }

    fn close_on_flush(&self) -> CloseFuture {
        if self.close_future.is_closed() {
            return self.close_future();
        }
        if self
            .state
            .compare_exchange(OPEN, CLOSING_ON_FLUSH, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            tracing::debug!(session = self.id, "closing session once queued writes flush");
            self.write_queue.offer(WriteRequest::close_sentinel());
            self.processor.flush(self);
        }
        self.close_future()
    }

    pub fn is_scheduled_for_flush(&self) -> bool {
        self.scheduled_for_flush.load(Ordering::Acquire)
    }

    /// Scheduling succeeds only for the first caller; clearing always succeeds.
    pub fn set_scheduled_for_flush(&self, schedule: bool) -> bool {
        if schedule {
            self.scheduled_for_flush
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        } else {
            self.scheduled_for_flush.store(false, Ordering::Release);
            true
        }
    }

    // ── Read path ─────────────────────────────────────────────────────────────

    /// Pull-style read. Pairs with the next offered message in FIFO order.
    pub fn read(&self) -> Result<ReadFuture, SessionError> {
        self.read_futures
            .as_ref()
            .map(ReadFutures::read)
            .ok_or(SessionError::ReadOperationDisabled)
    }

    pub fn offer_read_future(&self, message: AnyMessage) {
        self.offer_read(ReadOutcome::Message(message));
    }

    pub fn offer_failed_read_future(&self, cause: ReadFailure) {
        self.offer_read(ReadOutcome::Failed(cause));
    }

    pub fn offer_closed_read_future(&self) {
        self.offer_read(ReadOutcome::Closed);
    }

    fn offer_read(&self, outcome: ReadOutcome) {
        match &self.read_futures {
            Some(reads) => reads.offer(outcome),
            None => tracing::trace!(session = self.id, "read operation disabled, outcome dropped"),
        }
    }

    // ── Write path ────────────────────────────────────────────────────────────

    pub fn write(&self, message: impl Into<Message>) -> Result<WriteFuture, SessionError> {
        self.write_to(message, None)
    }

    /// Submit a message. Argument errors come back as `Err`; a closed
    /// session or an unreadable file yields an already-failed future.
    pub fn write_to(
        &self,
        message: impl Into<Message>,
        destination: Option<SocketAddr>,
    ) -> Result<WriteFuture, SessionError> {
        let message = message.into();
        if destination.is_some() && !self.transport.connectionless {
            return Err(SessionError::UnsupportedDestination);
        }
        if message.is_empty_buffer() {
            return Err(SessionError::EmptyMessage);
        }
        if self.is_closing() {
            tracing::trace!(session = self.id, "write refused, session is closing");
            return Ok(WriteFuture::not_written(WriteError::ClosedSession));
        }

        let payload = match prepare_payload(message) {
            Ok(payload) => payload,
            Err(e) => {
                monitor::exception_caught("failed to prepare outbound file", &e);
                return Ok(WriteFuture::not_written(e.into()));
            }
        };

        let future = WriteFuture::new();
        let request = Arc::new(WriteRequest::new(payload, future.clone(), destination));
        self.filter_chain.fire_filter_write(self, request);
        Ok(future)
    }

    /// Terminal step of the filter chain: account and queue the request,
    /// then ask the processor to flush unless writes are suspended.
    ///
    /// A request that reaches the end of the chain after the session has
    /// closed, or after an immediate close fired, fails with
    /// `ClosedSession` and is never scheduled.
    pub fn enqueue_write_request(&self, request: Arc<WriteRequest>) {
        if self.is_closed_for_writes() {
            tracing::trace!(session = self.id, "late write request failed, session closed");
            self.decrease_scheduled_bytes_and_messages(&request);
            request.future().set_exception(WriteError::ClosedSession);
            return;
        }
        if let Some(bytes) = request.mark_scheduled() {
            self.increase_scheduled_write_bytes(bytes);
            self.increase_scheduled_write_messages();
        }
        self.write_queue.offer(request);
        // A close that fired while offering may already have drained the queue.
        if self.is_closed_for_writes() {
            self.fail_pending_writes();
            return;
        }
        if !self.is_write_suspended() {
            self.processor.flush(self);
        }
    }

    fn is_closed_for_writes(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLOSING || self.close_future.is_closed()
    }

    /// Next request for the processor. Reaching a pending close-on-flush
    /// closes the session and returns None.
    pub fn poll_write_request(&self) -> Option<Arc<WriteRequest>> {
        self.write_queue.poll(self)
    }

    pub fn write_queue_len(&self) -> usize {
        self.write_queue.len()
    }

    pub fn write_queue_is_empty(&self) -> bool {
        self.write_queue.is_empty()
    }

    /// Fail every queued request with `ClosedSession` and release its
    /// backpressure share. Returns how many were failed.
    pub fn fail_pending_writes(&self) -> usize {
        let mut failed = 0;
        while let Some(request) = self.write_queue.poll_raw() {
            if request.is_close_sentinel() {
                continue;
            }
            self.decrease_scheduled_bytes_and_messages(&request);
            request.future().set_exception(WriteError::ClosedSession);
            failed += 1;
        }
        if failed > 0 {
            tracing::debug!(session = self.id, failed, "failed pending writes");
        }
        failed
    }

    fn current_write(&self) -> MutexGuard<'_, Option<Arc<WriteRequest>>> {
        self.current_write.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn current_write_request(&self) -> Option<Arc<WriteRequest>> {
        self.current_write().clone()
    }

    pub fn current_write_message(&self) -> Option<Payload> {
        self.current_write().as_ref().map(|r| r.payload().clone())
    }

    pub fn set_current_write_request(&self, request: Option<Arc<WriteRequest>>) {
        *self.current_write() = request;
    }

    pub fn take_current_write_request(&self) -> Option<Arc<WriteRequest>> {
        self.current_write().take()
    }

    // ── Attributes ────────────────────────────────────────────────────────────

    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    pub fn attribute(&self, key: &AttributeKey) -> Option<AttributeValue> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&self, key: AttributeKey, value: AttributeValue) -> Option<AttributeValue> {
        self.attributes.set(key, value)
    }

    pub fn set_attribute_if_absent(
        &self,
        key: AttributeKey,
        value: AttributeValue,
    ) -> Option<AttributeValue> {
        self.attributes.set_if_absent(key, value)
    }

    pub fn remove_attribute(&self, key: &AttributeKey) -> Option<AttributeValue> {
        self.attributes.remove(key)
    }

    pub fn remove_attribute_if(&self, key: &AttributeKey, expected: &AttributeValue) -> bool {
        self.attributes.remove_if(key, expected)
    }

    pub fn replace_attribute(
        &self,
        key: &AttributeKey,
        expected: &AttributeValue,
        new: AttributeValue,
    ) -> bool {
        self.attributes.replace(key, expected, new)
    }

    pub fn contains_attribute(&self, key: &AttributeKey) -> bool {
        self.attributes.contains(key)
    }

    pub fn attribute_keys(&self) -> Vec<AttributeKey> {
        self.attributes.keys()
    }

    pub fn attachment(&self) -> Option<AttributeValue> {
        self.attributes.get(&ATTACHMENT_KEY)
    }

    pub fn set_attachment(&self, value: AttributeValue) -> Option<AttributeValue> {
        self.attributes.set(ATTACHMENT_KEY, value)
    }

    // ── Traffic control ───────────────────────────────────────────────────────

    pub fn suspend_read(&self) {
        self.read_suspended.store(true, Ordering::Release);
        self.update_traffic_control();
    }

    pub fn resume_read(&self) {
        self.read_suspended.store(false, Ordering::Release);
        self.update_traffic_control();
    }

    pub fn suspend_write(&self) {
        self.write_suspended.store(true, Ordering::Release);
        self.update_traffic_control();
    }

    pub fn resume_write(&self) {
        self.write_suspended.store(false, Ordering::Release);
        self.update_traffic_control();
    }

    pub fn is_read_suspended(&self) -> bool {
        self.read_suspended.load(Ordering::Acquire)
    }

    pub fn is_write_suspended(&self) -> bool {
        self.write_suspended.load(Ordering::Acquire)
    }

    fn update_traffic_control(&self) {
        if self.is_closing() {
            return;
        }
        self.processor.update_traffic_control(self);
    }

    // ── Counters ──────────────────────────────────────────────────────────────

    pub fn read_bytes(&self) -> u64 {
        self.traffic.read_bytes.load(Ordering::Acquire)
    }

    pub fn written_bytes(&self) -> u64 {
        self.traffic.written_bytes.load(Ordering::Acquire)
    }

    pub fn read_messages(&self) -> u64 {
        self.traffic.read_messages.load(Ordering::Acquire)
    }

    pub fn written_messages(&self) -> u64 {
        self.traffic.written_messages.load(Ordering::Acquire)
    }

    pub fn scheduled_write_bytes(&self) -> u64 {
        self.traffic.scheduled_write_bytes.load(Ordering::Acquire)
    }

    pub fn scheduled_write_messages(&self) -> u64 {
        self.traffic.scheduled_write_messages.load(Ordering::Acquire)
    }

    pub fn throughput(&self) -> ThroughputRates {
        self.traffic.throughput().rates()
    }

    pub fn last_throughput_calculation_time(&self) -> u64 {
        self.traffic.throughput().last_calculation()
    }

    /// Recompute rates if the configured interval has passed, or always
    /// when `force` is set. Returns whether rates changed.
    pub fn update_throughput(&self, now: u64, force: bool) -> bool {
        let totals = self.traffic.totals();
        let interval = self.config.throughput.interval_ms;
        self.traffic.throughput().update(totals, now, interval, force)
    }

    pub fn increase_read_bytes(&self, n: u64, now: u64) {
        if n == 0 {
            return;
        }
        self.traffic.read_bytes.fetch_add(n, Ordering::AcqRel);
        store_latest(&self.traffic.last_read_time, now);
        self.idle.on_read();
        if let Some(stats) = &self.statistics {
            stats.increase_read_bytes(n, now);
        }
    }

    pub fn increase_read_messages(&self, now: u64) {
        self.traffic.read_messages.fetch_add(1, Ordering::AcqRel);
        store_latest(&self.traffic.last_read_time, now);
        self.idle.on_read();
        if let Some(stats) = &self.statistics {
            stats.increase_read_messages(now);
        }
    }

    /// Record `n` bytes of `request` leaving the socket. Progress past the
    /// payload length is ignored. Returns the bytes actually counted.
    pub fn increase_written_bytes(&self, request: &WriteRequest, n: u64, now: u64) -> u64 {
        if n == 0 {
            return 0;
        }
        let advanced = request.advance(n);
        if advanced == 0 {
            return 0;
        }
        self.traffic.written_bytes.fetch_add(advanced, Ordering::AcqRel);
        store_latest(&self.traffic.last_write_time, now);
        self.idle.on_write();
        if let Some(stats) = &self.statistics {
            stats.increase_written_bytes(advanced, now);
        }
        let released = request.release_bytes(advanced);
        self.release_scheduled_bytes(released);
        advanced
    }

    /// Count `request` as a written message. Only a fully flushed request
    /// counts, and only once.
    pub fn increase_written_messages(&self, request: &WriteRequest, now: u64) -> bool {
        if !request.is_fully_flushed() || !request.mark_counted() {
            return false;
        }
        self.traffic.written_messages.fetch_add(1, Ordering::AcqRel);
        store_latest(&self.traffic.last_write_time, now);
        self.idle.on_write();
        if let Some(stats) = &self.statistics {
            stats.increase_written_messages(now);
        }
        if request.release_message() {
            self.release_scheduled_messages(1);
        }
        true
    }

    pub fn increase_scheduled_write_bytes(&self, n: u64) {
        self.traffic.scheduled_write_bytes.fetch_add(n, Ordering::AcqRel);
        if let Some(stats) = &self.statistics {
            stats.increase_scheduled_write_bytes(n);
        }
    }

    pub fn increase_scheduled_write_messages(&self) {
        self.traffic.scheduled_write_messages.fetch_add(1, Ordering::AcqRel);
        if let Some(stats) = &self.statistics {
            stats.increase_scheduled_write_messages();
        }
    }

    /// Release whatever `request` still holds of the backpressure
    /// counters. Used when a request is dropped without being flushed.
    pub fn decrease_scheduled_bytes_and_messages(&self, request: &WriteRequest) {
        let (bytes, message) = request.release_all();
        self.release_scheduled_bytes(bytes);
        if message {
            self.release_scheduled_messages(1);
        }
    }

    fn release_scheduled_bytes(&self, n: u64) {
        let removed = saturating_sub(&self.traffic.scheduled_write_bytes, n);
        match &self.statistics {
            Some(stats) if removed > 0 => stats.decrease_scheduled_write_bytes(removed),
            _ => {}
        }
    }

    fn release_scheduled_messages(&self, n: u64) {
        let removed = saturating_sub(&self.traffic.scheduled_write_messages, n);
        match &self.statistics {
            Some(stats) if removed > 0 => stats.decrease_scheduled_write_messages(removed),
            _ => {}
        }
    }

    // ── Idleness ──────────────────────────────────────────────────────────────

    pub fn last_read_time(&self) -> u64 {
        self.traffic.last_read_time.load(Ordering::Acquire)
    }

    pub fn last_write_time(&self) -> u64 {
        self.traffic.last_write_time.load(Ordering::Acquire)
    }

    pub fn last_io_time(&self) -> u64 {
        self.last_read_time().max(self.last_write_time())
    }

    pub fn is_idle(&self, status: IdleStatus) -> bool {
        self.idle_count(status) > 0
    }

    /// Consecutive idle notifications for `status` since the last
    /// relevant I/O. Always 0 while that threshold is disabled.
    pub fn idle_count(&self, status: IdleStatus) -> u32 {
        if self.config.idle_time_ms(status) == 0 {
            self.idle.reset(status);
            return 0;
        }
        self.idle.count(status)
    }

    pub fn last_idle_time(&self, status: IdleStatus) -> u64 {
        self.idle.last_idle_time(status)
    }

    pub fn increase_idle_count(&self, status: IdleStatus, now: u64) -> u32 {
        self.idle.increase(status, now)
    }

    // ── Read buffer sizing ────────────────────────────────────────────────────

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size.load(Ordering::Acquire)
    }

    /// Double the read buffer, capped at the configured maximum. The next
    /// decrease request is skipped.
    pub fn increase_read_buffer_size(&self) {
        let max = self.config.read.max_buffer_size;
        let _ = self
            .read_buffer_size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |size| {
                Some(size.saturating_mul(2).min(max))
            });
        self.defer_decrease_read_buffer.store(true, Ordering::Release);
    }

    /// Halve the read buffer, floored at the configured minimum. Every
    /// other request is skipped so a single short read does not shrink it.
    pub fn decrease_read_buffer_size(&self) {
        if self.defer_decrease_read_buffer.swap(false, Ordering::AcqRel) {
            return;
        }
        let min = self.config.read.min_buffer_size;
        let _ = self
            .read_buffer_size
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |size| {
                (size > min).then(|| (size / 2).max(min))
            });
        self.defer_decrease_read_buffer.store(true, Ordering::Release);
    }
}

fn prepare_payload(message: Message) -> io::Result<Payload> {
    Ok(match message {
        Message::Buffer(bytes) => Payload::Buffer(bytes),
        Message::Object(object) => Payload::Object(object),
        Message::Region(region) => Payload::Region(region),
        Message::File(file) => Payload::Region(FileRegion::whole(file)?),
        Message::Path(path) => Payload::Region(FileRegion::open(path)?),
    })
}

fn fmt_addr(addr: Option<SocketAddr>) -> String {
    addr.map_or_else(|| "unbound".to_string(), |a| a.to_string())
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = format!("0x{:08X}", self.id);
        let local = fmt_addr(self.local_addr);
        let remote = fmt_addr(self.remote_addr);
        if self.is_connected() || self.state.load(Ordering::Acquire) != OPEN {
            let service = self.transport.service_name();
            match self.role {
                SessionRole::Server => write!(f, "({id}: {service}, server, {remote} => {local})"),
                SessionRole::Client => write!(f, "({id}: {service}, client, {local} => {remote})"),
            }
        } else {
            write!(f, "Session disconnected ({id}: {remote} => {local})")
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state.load(Ordering::Relaxed))
            .field("closed", &self.close_future.is_closed())
            .field("queued", &self.write_queue.len())
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.close_future.is_closed() {
            return;
        }
        tracing::debug!(session = self.id, "session dropped while open");
        if let Some(request) = self.take_current_write_request() {
            self.decrease_scheduled_bytes_and_messages(&request);
            request.future().set_exception(WriteError::ClosedSession);
        }
        self.fail_pending_writes();
        if let Some(reads) = &self.read_futures {
            reads.close();
        }
        self.close_future.set_closed();
    }
}
