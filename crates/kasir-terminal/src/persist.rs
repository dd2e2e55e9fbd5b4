//! # Persist Writer
//!
//! Background task that writes state changes to the store, one at a time,
//! in the order the terminal produced them.
//!
//! ## Writer Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Persist Writer                                  │
//! │                                                                         │
//! │  Terminal ──submit()──► unbounded mpsc ──► WriterTask                   │
//! │                                              │                          │
//! │                                              ▼                          │
//! │                                   store.apply(change)                   │
//! │                                     │            │                      │
//! │                                    Ok          Err (transient)          │
//! │                                     │            │                      │
//! │                                 written += 1   backoff, retry           │
//! │                                                  │                      │
//! │                                         budget exhausted / permanent    │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │                                   park change, error!, health.failed    │
//! │                                   later changes wait in the backlog     │
//! │                                                  │                      │
//! │                                          retry_failed()                 │
//! │                                                  │                      │
//! │                                   parked change, then backlog, in order │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock levels and point balances are written as absolute values, so a
//! later change must never reach the store before an earlier one. Holding
//! the backlog behind a parked change keeps that order.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::config::PersistSection;
use crate::error::{TerminalError, TerminalResult};
use kasir_core::StateChange;
use kasir_db::{DbError, StateStore};

// =============================================================================
// Health
// =============================================================================

/// A change the writer gave up on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistFailure {
    /// `StateChange::kind()` of the parked change.
    pub change: &'static str,
    pub error: String,
    pub attempts: u32,
    pub at: DateTime<Utc>,
}

/// What the writer has done so far. Published after every step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistHealth {
    pub written: u64,
    pub retries: u64,
    pub failed: Option<PersistFailure>,
    /// Changes waiting behind the parked one.
    pub backlog: usize,
}

impl PersistHealth {
    pub fn is_healthy(&self) -> bool {
        self.failed.is_none()
    }
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct PersistSettings {
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl From<&PersistSection> for PersistSettings {
    fn from(section: &PersistSection) -> Self {
        PersistSettings {
            max_retries: section.max_retries,
            initial_backoff: section.initial_backoff(),
            max_backoff: section.max_backoff(),
        }
    }
}

impl Default for PersistSettings {
    fn default() -> Self {
        PersistSettings::from(&PersistSection::default())
    }
}

// =============================================================================
// Handle
// =============================================================================

enum Command {
    Apply(Box<StateChange>),
    RetryFailed,
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the writer task. Cheap to clone.
#[derive(Clone)]
pub struct PersistWriter {
    tx: mpsc::UnboundedSender<Command>,
    health: watch::Receiver<PersistHealth>,
}

impl PersistWriter {
    /// Starts the writer on the current tokio runtime.
    pub fn spawn(store: Arc<dyn StateStore>, settings: PersistSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (health_tx, health_rx) = watch::channel(PersistHealth::default());

        let task = WriterTask {
            store,
            settings,
            rx,
            health: health_tx,
            parked: None,
            backlog: VecDeque::new(),
        };
        tokio::spawn(task.run());

        PersistWriter {
            tx,
            health: health_rx,
        }
    }

    /// Queues a change. Never blocks.
    pub fn submit(&self, change: StateChange) -> TerminalResult<()> {
        self.send(Command::Apply(Box::new(change)))
    }

    pub fn submit_all(&self, changes: impl IntoIterator<Item = StateChange>) -> TerminalResult<()> {
        changes.into_iter().try_for_each(|change| self.submit(change))
    }

    /// Retries the parked change, then drains the backlog.
    pub fn retry_failed(&self) -> TerminalResult<()> {
        self.send(Command::RetryFailed)
    }

    /// Waits until everything queued before this call has been processed.
    /// Fails if a change is parked at that point.
    pub async fn flush(&self) -> TerminalResult<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Flush(ack))?;
        done.await.map_err(|_| stopped())?;

        match self.health().failed {
            Some(failure) => Err(TerminalError::PersistFailed(format!(
                "{} change parked after {} attempts: {}",
                failure.change, failure.attempts, failure.error
            ))),
            None => Ok(()),
        }
    }

    pub fn health(&self) -> PersistHealth {
        self.health.borrow().clone()
    }

    /// Receiver that observes every health update.
    pub fn subscribe(&self) -> watch::Receiver<PersistHealth> {
        self.health.clone()
    }

    /// Processes what is already queued, then stops the task.
    pub async fn shutdown(&self) -> TerminalResult<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Shutdown(ack))?;
        done.await.map_err(|_| stopped())
    }

    fn send(&self, command: Command) -> TerminalResult<()> {
        self.tx.send(command).map_err(|_| stopped())
    }
}

fn stopped() -> TerminalError {
    TerminalError::PersistFailed("persist writer has stopped".into())
}

// =============================================================================
// Writer Task
// =============================================================================

struct WriterTask {
    store: Arc<dyn StateStore>,
    settings: PersistSettings,
    rx: mpsc::UnboundedReceiver<Command>,
    health: watch::Sender<PersistHealth>,
    parked: Option<StateChange>,
    backlog: VecDeque<StateChange>,
}

impl WriterTask {
    async fn run(mut self) {
        info!(max_retries = self.settings.max_retries, "Persist writer started");

        while let Some(command) = self.rx.recv().await {
            match command {
                Command::Apply(change) => {
                    if self.parked.is_some() {
                        debug!(kind = change.kind(), "Writer is blocked, queueing behind parked change");
                        self.backlog.push_back(*change);
                        self.publish_backlog();
                    } else if let Err(failure) = self.write(&change).await {
                        self.park(*change, failure);
                    }
                }
                Command::RetryFailed => self.retry_parked().await,
                Command::Flush(ack) => {
                    let _ = ack.send(());
                }
                Command::Shutdown(ack) => {
                    if self.parked.is_some() {
                        warn!(backlog = self.backlog.len(), "Shutting down with an unwritten change");
                    }
                    let _ = ack.send(());
                    break;
                }
            }
        }

        info!("Persist writer stopped");
    }

    async fn retry_parked(&mut self) {
        let Some(change) = self.parked.take() else {
            debug!("Nothing parked to retry");
            return;
        };
        info!(kind = change.kind(), backlog = self.backlog.len(), "Retrying parked change");

        if let Err(failure) = self.write(&change).await {
            self.park(change, failure);
            return;
        }
        self.health.send_modify(|h| h.failed = None);

        while let Some(change) = self.backlog.pop_front() {
            if let Err(failure) = self.write(&change).await {
                self.park(change, failure);
                return;
            }
        }
        self.publish_backlog();
    }

    /// One change, retried with exponential backoff while the error is
    /// transient and the budget lasts.
    async fn write(&mut self, change: &StateChange) -> Result<(), PersistFailure> {
        let mut backoff = self.create_backoff();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.store.apply(change).await {
                Ok(()) => {
                    debug!(kind = change.kind(), attempts, "State change written");
                    self.health.send_modify(|h| h.written += 1);
                    return Ok(());
                }
                Err(err) if attempts <= self.settings.max_retries && err.is_transient() => {
                    let delay = backoff.next_backoff().unwrap_or(self.settings.max_backoff);
                    warn!(
                        kind = change.kind(),
                        attempts,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Persist attempt failed, retrying"
                    );
                    self.health.send_modify(|h| h.retries += 1);
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(failure(change, &err, attempts)),
            }
        }
    }

    fn park(&mut self, change: StateChange, failure: PersistFailure) {
        error!(
            kind = failure.change,
            attempts = failure.attempts,
            error = %failure.error,
            backlog = self.backlog.len(),
            "Persisting state change failed, holding later changes until retry"
        );
        self.parked = Some(change);
        let backlog = self.backlog.len();
        self.health.send_modify(|h| {
            h.failed = Some(failure);
            h.backlog = backlog;
        });
    }

    fn publish_backlog(&self) {
        let backlog = self.backlog.len();
        self.health.send_modify(|h| h.backlog = backlog);
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.settings.initial_backoff,
            max_interval: self.settings.max_backoff,
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }
}

fn failure(change: &StateChange, err: &DbError, attempts: u32) -> PersistFailure {
    PersistFailure {
        change: change.kind(),
        error: err.to_string(),
        attempts,
        at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Fails the first `failures` calls, then records what it receives.
    struct FlakyStore {
        failures: AtomicU32,
        error: fn() -> DbError,
        applied: Mutex<Vec<String>>,
    }

    impl FlakyStore {
        fn new(failures: u32, error: fn() -> DbError) -> Arc<Self> {
            Arc::new(FlakyStore {
                failures: AtomicU32::new(failures),
                error,
                applied: Mutex::new(Vec::new()),
            })
        }

        fn applied(&self) -> Vec<String> {
            self.applied.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StateStore for FlakyStore {
        async fn apply(&self, change: &StateChange) -> kasir_db::DbResult<()> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err((self.error)());
            }
            if let StateChange::HeldCartDeleted(id) = change {
                self.applied.lock().unwrap().push(id.clone());
            }
            Ok(())
        }
    }

    fn settings(max_retries: u32) -> PersistSettings {
        PersistSettings {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        }
    }

    fn deleted(id: &str) -> StateChange {
        StateChange::HeldCartDeleted(id.to_string())
    }

    fn locked() -> DbError {
        DbError::QueryFailed("database is locked".into())
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let store = FlakyStore::new(2, locked);
        let writer = PersistWriter::spawn(store.clone(), settings(3));

        writer.submit(deleted("a")).unwrap();
        writer.flush().await.unwrap();

        let health = writer.health();
        assert_eq!(health.written, 1);
        assert_eq!(health.retries, 2);
        assert_eq!(store.applied(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_exhausted_change_blocks_later_ones() {
        let store = FlakyStore::new(4, locked);
        let writer = PersistWriter::spawn(store.clone(), settings(1));

        writer.submit(deleted("a")).unwrap();
        writer.submit(deleted("b")).unwrap();
        writer.submit(deleted("c")).unwrap();
        assert!(matches!(writer.flush().await, Err(TerminalError::PersistFailed(_))));

        let health = writer.health();
        assert_eq!(health.failed.as_ref().map(|f| f.change), Some("held_cart_deleted"));
        assert_eq!(health.failed.as_ref().map(|f| f.attempts), Some(2));
        assert_eq!(health.backlog, 2);
        assert!(store.applied().is_empty());

        // Two failures are left in the store, so the first retry parks again.
        writer.retry_failed().unwrap();
        assert!(writer.flush().await.is_err());

        writer.retry_failed().unwrap();
        writer.flush().await.unwrap();
        assert_eq!(store.applied(), vec!["a", "b", "c"]);
        assert_eq!(writer.health().backlog, 0);
        assert!(writer.health().is_healthy());
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let store = FlakyStore::new(1, || DbError::Serialization("bad payload".into()));
        let writer = PersistWriter::spawn(store.clone(), settings(5));

        writer.submit(deleted("a")).unwrap();
        assert!(writer.flush().await.is_err());
        let health = writer.health();
        assert_eq!(health.retries, 0);
        assert_eq!(health.failed.map(|f| f.attempts), Some(1));
    }

    #[tokio::test]
    async fn test_shutdown_stops_writer() {
        let writer = PersistWriter::spawn(FlakyStore::new(0, locked), settings(1));
        writer.shutdown().await.unwrap();
        assert!(writer.flush().await.is_err());
    }
}
