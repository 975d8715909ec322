//! Idle scanner — periodically runs throughput and idle checks over the
//! session table and drops sessions that have closed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::factory::SessionFactory;
use crate::idle::notify_idle_session;
use crate::session::{Session, SessionTable};

pub struct IdleScanner {
    sessions: SessionTable,
    factory: Arc<SessionFactory>,
    period: Duration,
    shutdown: broadcast::Receiver<()>,
}

impl IdleScanner {
    /// Period comes from `idle.scan_interval_ms`, floored at 1 ms.
    pub fn new(
        sessions: SessionTable,
        factory: Arc<SessionFactory>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        let period = Duration::from_millis(factory.config().idle.scan_interval_ms.max(1));
        Self {
            sessions,
            factory,
            period,
            shutdown,
        }
    }

    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tracing::info!(period_ms = self.period.as_millis() as u64, "idle scanner started");

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::info!("idle scanner shutting down");
                    return Ok(());
                }

                _ = interval.tick() => {
                    self.scan(self.factory.now_ms());
                }
            }
        }
    }

    /// One pass at `now`. Returns how many closed sessions were pruned.
    pub fn scan(&self, now: u64) -> usize {
        // Snapshot first so no shard lock is held across filter-chain calls.
        let sessions: Vec<Arc<Session>> =
            self.sessions.iter().map(|entry| Arc::clone(entry.value())).collect();

        for session in &sessions {
            if !session.is_connected() {
                continue;
            }
            session.update_throughput(now, false);
            notify_idle_session(session, now);
        }

        let before = self.sessions.len();
        self.sessions.retain(|_, session| session.is_connected());
        let pruned = before.saturating_sub(self.sessions.len());
        if pruned > 0 {
            tracing::debug!(pruned, remaining = self.sessions.len(), "pruned closed sessions");
        }
        pruned
    }
}
