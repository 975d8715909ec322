//! Session construction.
//!
//! A factory owns the id counter and the clock epoch for every session of
//! one service, so ids are unique and timestamps comparable across them.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ridge_core::RidgeConfig;

use crate::service::{FilterChain, Processor, SessionRole, TransportMetadata};
use crate::session::{Session, SessionParts};
use crate::stats::IoStatistics;
use crate::write::{FifoWriteQueue, WriteRequestQueue};

#[derive(Debug)]
pub struct SessionFactory {
    next_id: AtomicU64,
    epoch: Instant,
    config: Arc<RidgeConfig>,
    transport: TransportMetadata,
    statistics: Option<Arc<IoStatistics>>,
}

impl SessionFactory {
    pub fn new(config: Arc<RidgeConfig>, transport: TransportMetadata) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            epoch: Instant::now(),
            config,
            transport,
            statistics: None,
        }
    }

    /// Mirror every session's counters into a shared sink.
    pub fn with_statistics(mut self, statistics: Arc<IoStatistics>) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Milliseconds since this factory was created. Sessions, the idle
    /// scanner and processors all read time through here.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    pub fn config(&self) -> &Arc<RidgeConfig> {
        &self.config
    }

    pub fn transport(&self) -> &TransportMetadata {
        &self.transport
    }

    pub fn statistics(&self) -> Option<&Arc<IoStatistics>> {
        self.statistics.as_ref()
    }

    pub fn builder(
        &self,
        processor: Arc<dyn Processor>,
        filter_chain: Arc<dyn FilterChain>,
    ) -> SessionBuilder<'_> {
        SessionBuilder {
            factory: self,
            processor,
            filter_chain,
            write_queue: None,
            role: SessionRole::Server,
            local_addr: None,
            remote_addr: None,
            created_at: None,
        }
    }
}

pub struct SessionBuilder<'a> {
    factory: &'a SessionFactory,
    processor: Arc<dyn Processor>,
    filter_chain: Arc<dyn FilterChain>,
    write_queue: Option<Box<dyn WriteRequestQueue>>,
    role: SessionRole,
    local_addr: Option<SocketAddr>,
    remote_addr: Option<SocketAddr>,
    created_at: Option<u64>,
}

impl SessionBuilder<'_> {
    /// Replace the default FIFO queue.
    pub fn write_queue(mut self, queue: Box<dyn WriteRequestQueue>) -> Self {
        self.write_queue = Some(queue);
        self
    }

    pub fn role(mut self, role: SessionRole) -> Self {
        self.role = role;
        self
    }

    pub fn local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Override the creation timestamp. Defaults to the factory clock.
    pub fn created_at(mut self, now: u64) -> Self {
        self.created_at = Some(now);
        self
    }

    pub fn build(self) -> Arc<Session> {
        let factory = self.factory;
        let id = factory.next_id.fetch_add(1, Ordering::Relaxed);
        let created_at = self.created_at.unwrap_or_else(|| factory.now_ms());
        let session = Session::new(SessionParts {
            id,
            created_at,
            role: self.role,
            local_addr: self.local_addr,
            remote_addr: self.remote_addr,
            transport: factory.transport.clone(),
            config: Arc::clone(&factory.config),
            processor: self.processor,
            filter_chain: self.filter_chain,
            statistics: factory.statistics.clone(),
            write_queue: self
                .write_queue
                .unwrap_or_else(|| Box::new(FifoWriteQueue::new())),
        });
        tracing::debug!(session = id, role = ?session.role(), "session created");
        Arc::new(session)
    }
}
