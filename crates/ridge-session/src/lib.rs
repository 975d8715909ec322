//! ridge-session — the per-connection session core.
//!
//! A transport creates sessions through a [`SessionFactory`], hands each
//! one its [`Processor`] and [`FilterChain`], and drives them from its I/O
//! loop. The [`IdleScanner`] runs idle and write-timeout checks in the
//! background.

pub mod factory;
pub mod idle;
pub mod read;
pub mod scanner;
pub mod service;
pub mod session;
pub mod stats;
pub mod throughput;
pub mod write;

pub use factory::{SessionBuilder, SessionFactory};
pub use idle::{notify_idle_session, notify_idleness};
pub use scanner::IdleScanner;
pub use service::{FilterChain, Processor, SessionRole, TransportMetadata};
pub use session::{new_session_table, Session, SessionTable};
pub use stats::IoStatistics;
pub use throughput::ThroughputRates;
pub use write::{FifoWriteQueue, Payload, WriteRequest, WriteRequestQueue};
