//! One-shot completion futures.
//!
//! An `IoFuture` completes exactly once. Listeners added before completion
//! run on the completing thread, after the internal lock is released.
//! Listeners added afterwards run immediately on the caller's thread.
//! Async callers can `wait()`; nothing here ever blocks a thread.
//!
//! A panicking listener is reported to the exception monitor and does not
//! stop the remaining listeners.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::error::{ReadFailure, WriteError};
use crate::message::AnyMessage;

type Listener<T> = Box<dyn FnOnce(&T) + Send + 'static>;

struct State<T> {
    value: Option<T>,
    listeners: Vec<Listener<T>>,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    notify: Notify,
}

/// Shared handle to a value that arrives later. Clones observe the same value.
pub struct IoFuture<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for IoFuture<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Default for IoFuture<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> IoFuture<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    value: None,
                    listeners: Vec::new(),
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// A future that is already complete.
    pub fn completed(value: T) -> Self {
        let future = Self::new();
        future.complete(value);
        future
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_done(&self) -> bool {
        self.lock().value.is_some()
    }

    pub fn value(&self) -> Option<T> {
        self.lock().value.clone()
    }

    /// Complete the future. Returns false if it was already complete,
    /// in which case `value` is discarded and no listener runs again.
    pub fn complete(&self, value: T) -> bool {
        let listeners = {
            let mut state = self.lock();
            if state.value.is_some() {
                return false;
            }
            state.value = Some(value.clone());
            std::mem::take(&mut state.listeners)
        };
        self.inner.notify.notify_waiters();
        for listener in listeners {
            run_listener(listener, &value);
        }
        true
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce(&T) + Send + 'static,
    {
        let value = {
            let mut state = self.lock();
            match &state.value {
                Some(v) => v.clone(),
                None => {
                    state.listeners.push(Box::new(listener));
                    return;
                }
            }
        };
        run_listener(Box::new(listener), &value);
    }

    /// Resolve once the future completes.
    pub async fn wait(&self) -> T {
        loop {
            // Register before checking so a completion in between is not lost.
            let notified = self.inner.notify.notified();
            if let Some(v) = self.value() {
                return v;
            }
            notified.await;
        }
    }

    /// True if both handles refer to the same future.
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> fmt::Debug for IoFuture<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let done = self
            .inner
            .state
            .lock()
            .map(|s| s.value.is_some())
            .unwrap_or(false);
        f.debug_struct("IoFuture").field("done", &done).finish()
    }
}

fn run_listener<T>(listener: Listener<T>, value: &T) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| listener(value))) {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        crate::monitor::exception_caught("future listener panicked", &reason);
    }
}

// ── Close ─────────────────────────────────────────────────────────────────────

/// Completes when the session is fully closed.
#[derive(Clone, Debug, Default)]
pub struct CloseFuture(IoFuture<()>);

impl CloseFuture {
    pub fn new() -> Self {
        Self(IoFuture::new())
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_done()
    }

    /// Mark closed. Only the first call has any effect.
    pub fn set_closed(&self) -> bool {
        self.0.complete(())
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.0.add_listener(move |_| listener());
    }

    pub async fn wait(&self) {
        self.0.wait().await
    }

    pub fn same(&self, other: &CloseFuture) -> bool {
        self.0.same(&other.0)
    }
}

// ── Write ─────────────────────────────────────────────────────────────────────

/// Completes when a write request is flushed or fails.
#[derive(Clone, Debug, Default)]
pub struct WriteFuture(IoFuture<Result<(), WriteError>>);

impl WriteFuture {
    pub fn new() -> Self {
        Self(IoFuture::new())
    }

    /// A future that already failed, for writes that never reach a queue.
    pub fn not_written(error: WriteError) -> Self {
        Self(IoFuture::completed(Err(error)))
    }

    pub fn is_done(&self) -> bool {
        self.0.is_done()
    }

    pub fn is_written(&self) -> bool {
        matches!(self.0.value(), Some(Ok(())))
    }

    pub fn exception(&self) -> Option<WriteError> {
        self.0.value().and_then(Result::err)
    }

    pub fn set_written(&self) -> bool {
        self.0.complete(Ok(()))
    }

    pub fn set_exception(&self, error: WriteError) -> bool {
        self.0.complete(Err(error))
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce(&Result<(), WriteError>) + Send + 'static,
    {
        self.0.add_listener(listener);
    }

    pub async fn wait(&self) -> Result<(), WriteError> {
        self.0.wait().await
    }
}

// ── Read ──────────────────────────────────────────────────────────────────────

/// What a reader eventually gets.
#[derive(Clone)]
pub enum ReadOutcome {
    Message(AnyMessage),
    Failed(ReadFailure),
    Closed,
}

impl fmt::Debug for ReadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadOutcome::Message(_) => f.write_str("Message(..)"),
            ReadOutcome::Failed(e) => f.debug_tuple("Failed").field(&e.to_string()).finish(),
            ReadOutcome::Closed => f.write_str("Closed"),
        }
    }
}

/// Completes when the processor delivers a message, an error, or the
/// end of the session.
#[derive(Clone, Debug, Default)]
pub struct ReadFuture(IoFuture<ReadOutcome>);

impl ReadFuture {
    pub fn new() -> Self {
        Self(IoFuture::new())
    }

    pub fn completed(outcome: ReadOutcome) -> Self {
        Self(IoFuture::completed(outcome))
    }

    pub fn is_done(&self) -> bool {
        self.0.is_done()
    }

    pub fn is_read(&self) -> bool {
        matches!(self.0.value(), Some(ReadOutcome::Message(_)))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.0.value(), Some(ReadOutcome::Closed))
    }

    pub fn outcome(&self) -> Option<ReadOutcome> {
        self.0.value()
    }

    pub fn message(&self) -> Option<AnyMessage> {
        match self.0.value() {
            Some(ReadOutcome::Message(m)) => Some(m),
            _ => None,
        }
    }

    pub fn exception(&self) -> Option<ReadFailure> {
        match self.0.value() {
            Some(ReadOutcome::Failed(e)) => Some(e),
            _ => None,
        }
    }

    pub fn complete(&self, outcome: ReadOutcome) -> bool {
        self.0.complete(outcome)
    }

    pub fn add_listener<F>(&self, listener: F)
    where
        F: FnOnce(&ReadOutcome) + Send + 'static,
    {
        self.0.add_listener(listener);
    }

    pub async fn wait(&self) -> ReadOutcome {
        self.0.wait().await
    }

    pub fn same(&self, other: &ReadFuture) -> bool {
        self.0.same(&other.0)
    }
}
