//! ridge-core — shared types for the ridge session layer.
//!
//! Configuration, the error taxonomy, one-shot futures, the attribute
//! store and outbound message forms. `ridge-session` builds on these.

pub mod attribute;
pub mod config;
pub mod error;
pub mod future;
pub mod idle;
pub mod message;
pub mod monitor;

pub use attribute::{AttributeKey, AttributeMap, AttributeValue};
pub use config::RidgeConfig;
pub use error::{ReadFailure, SessionError, WriteError};
pub use future::{CloseFuture, ReadFuture, ReadOutcome, WriteFuture};
pub use idle::IdleStatus;
pub use message::{AnyMessage, FileRegion, Message};
