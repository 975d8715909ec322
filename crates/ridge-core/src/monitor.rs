//! Process-wide exception monitor.
//!
//! Failures that have no caller to return to (a panicking future listener,
//! an I/O error while preparing a payload) end up here. They are logged
//! under the `ridge::monitor` target so a subscriber can route them.

use std::fmt::Display;

pub fn exception_caught(context: &str, error: &dyn Display) {
    tracing::error!(target: "ridge::monitor", error = %error, "{context}");
}
