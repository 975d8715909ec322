//! Read future pairing — synchronous-style reads over asynchronous delivery.
//!
//! Two queues meet here. `ready` holds results the processor produced
//! before anyone asked; `waiting` holds futures handed to readers before
//! any result arrived. A new result always goes to the oldest waiter first.
//!
//! A closed result is sticky: once the session ends, every later `read()`
//! observes it instead of waiting forever.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use ridge_core::{ReadFuture, ReadOutcome};

#[derive(Default)]
struct Queues {
    ready: VecDeque<ReadFuture>,
    waiting: VecDeque<ReadFuture>,
}

#[derive(Default)]
pub struct ReadFutures {
    queues: Mutex<Queues>,
}

impl ReadFutures {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next result, or a pending future for it.
    pub fn read(&self) -> ReadFuture {
        let mut queues = self.lock();
        match queues.ready.pop_front() {
            Some(future) => {
                if future.is_closed() {
                    queues.ready.push_back(future.clone());
                }
                future
            }
            None => {
                let future = ReadFuture::new();
                queues.waiting.push_back(future.clone());
                future
            }
        }
    }

    /// Deliver one result. Futures are completed outside the lock so their
    /// listeners may call back into `read()`.
    pub fn offer(&self, outcome: ReadOutcome) {
        let waiter = {
            let mut queues = self.lock();
            match queues.waiting.pop_front() {
                Some(waiter) => waiter,
                None => {
                    // Nobody can observe this future before it is complete.
                    queues.ready.push_back(ReadFuture::completed(outcome));
                    return;
                }
            }
        };
        waiter.complete(outcome);
    }

    /// Complete every waiting reader as closed and leave a sticky closed
    /// marker for later ones.
    pub fn close(&self) {
        let waiters: Vec<ReadFuture> = {
            let mut queues = self.lock();
            let waiters = queues.waiting.drain(..).collect();
            queues.ready.push_back(ReadFuture::completed(ReadOutcome::Closed));
            waiters
        };
        for waiter in waiters {
            waiter.complete(ReadOutcome::Closed);
        }
    }

    pub fn ready_len(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn waiting_len(&self) -> usize {
        self.lock().waiting.len()
    }
}
