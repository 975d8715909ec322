//! Collaborator traits a transport supplies to its sessions.
//!
//! The session never touches sockets or codecs. It drives two handles:
//! the processor that performs actual I/O, and the filter chain that
//! carries events to the protocol layers and the application. Dispatch
//! inside the chain belongs to the transport.

use std::error::Error;
use std::sync::Arc;

use ridge_core::IdleStatus;

use crate::session::Session;
use crate::write::WriteRequest;

/// The I/O side: owns the socket a session is bound to.
pub trait Processor: Send + Sync {
    /// Drain the session's write queue as soon as the socket allows.
    fn flush(&self, session: &Session);

    /// Re-read the session's suspend flags and adjust interest accordingly.
    fn update_traffic_control(&self, session: &Session);
}

/// The notification surface a session drives.
pub trait FilterChain: Send + Sync {
    /// Run close handling. The transport completes the close future once
    /// the connection is actually released.
    fn fire_filter_close(&self, session: &Session);

    /// Pass an outbound request down the chain. The head of the chain ends
    /// with `Session::enqueue_write_request`.
    fn fire_filter_write(&self, session: &Session, request: Arc<WriteRequest>);

    fn fire_session_idle(&self, session: &Session, status: IdleStatus);

    fn fire_exception_caught(&self, session: &Session, error: &(dyn Error + Send + Sync));
}

/// Static description of the transport a session runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMetadata {
    /// Implementation family, e.g. "nio".
    pub provider_name: String,
    /// Transport name, e.g. "socket" or "datagram".
    pub name: String,
    /// Connectionless transports accept a destination per write.
    pub connectionless: bool,
}

impl TransportMetadata {
    pub fn new(provider_name: impl Into<String>, name: impl Into<String>, connectionless: bool) -> Self {
        Self {
            provider_name: provider_name.into(),
            name: name.into(),
            connectionless,
        }
    }

    /// "provider name", as shown in session descriptions.
    pub fn service_name(&self) -> String {
        format!("{} {}", self.provider_name, self.name)
    }
}

/// Which side opened the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Accepted by a listening service.
    Server,
    /// Established by a connector.
    Client,
}
