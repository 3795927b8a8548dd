//! Bounded-concurrency task scheduler with a two-phase retry drain.
//!
//! The scheduler holds a primary FIFO queue of [`Task`]s and runs up to
//! `limit` of them in flight at once, launching a replacement the instant any
//! in-flight task completes. Failed tasks move to a secondary retry queue.
//! Once the primary queue drains to quiescence (nothing queued, nothing in
//! flight), the scheduler checkpoints, cools down, and applies the same
//! admission discipline to the retry queue - in waves, until the retry queue
//! is empty at quiescence.
//!
//! # Concurrency model
//!
//! A single coordinator loop owns both queues and drives admission; spawned
//! tasks report back through a [`tokio::task::JoinSet`]. Queue and counter
//! mutation therefore never races: the only shared state is the read-only
//! tally snapshot in [`SchedulerStats`], published through atomics for
//! status output.
//!
//! # Retry policy
//!
//! Retries are unbounded: a task that keeps failing is re-queued on every
//! wave and the run does not finish until the retry queue empties. In
//! particular, a task that fails during the very last retry wave re-enters
//! the queue and triggers another wave after a short re-check delay, rather
//! than stalling with a non-empty queue and no admission loop running.
//!
//! # Example
//!
//! ```no_run
//! use imgshrink_core::scheduler::{Scheduler, task};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut scheduler = Scheduler::new(4)?;
//! scheduler.submit(task(|| async { Ok(()) }));
//! let report = scheduler.run(|| Ok(())).await?;
//! println!("success: {}, failure: {}", report.success, report.failure);
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::cache::CacheError;

/// Minimum allowed concurrency limit.
const MIN_LIMIT: usize = 1;

/// Maximum allowed concurrency limit.
const MAX_LIMIT: usize = 100;

/// Default concurrency limit.
pub const DEFAULT_CONCURRENCY: usize = 15;

/// Cool-down between primary quiescence and the first retry wave.
pub const RETRY_COOLDOWN: Duration = Duration::from_secs(10);

/// Delay before re-invoking the retry drain when quiescence is reached with
/// a non-empty retry queue.
pub const RETRY_RECHECK_DELAY: Duration = Duration::from_secs(3);

/// Boxed future produced by invoking a [`Task`].
pub type TaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

/// An opaque, re-invokable unit of deferred work.
///
/// A task is a closure over whatever context it needs (typically a file
/// path); the scheduler is agnostic to its content. It must be re-invokable
/// because a failed task is retried by calling it again.
pub type Task = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// Wraps an async closure into a [`Task`].
pub fn task<F, Fut>(f: F) -> Task
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// A task failure, carrying enough context to diagnose without halting the
/// batch: which task failed and why.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{label}: {reason}")]
pub struct TaskError {
    label: String,
    reason: String,
}

impl TaskError {
    /// Creates a task error with a task label (e.g. a file path) and reason.
    pub fn new(label: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            reason: reason.into(),
        }
    }

    /// Returns the label identifying the failed task.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the failure reason.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Error type for scheduler operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Invalid concurrency limit provided.
    #[error("invalid concurrency limit {value}: must be between {MIN_LIMIT} and {MAX_LIMIT}")]
    InvalidLimit {
        /// The invalid value that was provided.
        value: usize,
    },

    /// A quiescence checkpoint (cache persist) failed.
    ///
    /// This is fatal: a silently lost checkpoint would make every task
    /// completed this run invisible to future runs.
    #[error("checkpoint failed: {0}")]
    Checkpoint(#[from] CacheError),
}

/// Running success/failure tallies, readable while the scheduler runs.
///
/// Mutation happens only on the coordinator loop; atomics are used so status
/// output (or a task sampling its own view of the world) can read without
/// locking. `failure` reflects "currently believed failed": admitting a task
/// from the retry queue speculatively reverses its earlier failure tally,
/// and a re-failure counts it again.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    success: AtomicUsize,
    failure: AtomicUsize,
    in_flight: AtomicUsize,
}

impl SchedulerStats {
    /// Returns the number of tasks that have succeeded.
    #[must_use]
    pub fn success(&self) -> usize {
        self.success.load(Ordering::SeqCst)
    }

    /// Returns the number of tasks currently believed failed.
    #[must_use]
    pub fn failure(&self) -> usize {
        self.failure.load(Ordering::SeqCst)
    }

    /// Returns the number of tasks currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Final tallies from a completed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Tasks that completed successfully.
    pub success: usize,
    /// Tasks still counted as failed when the run ended. Zero whenever the
    /// retry queue drained; non-zero only if a task was lost to a panic.
    pub failure: usize,
}

/// Which queue a drain pass is admitting from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Primary,
    Retry,
}

/// A finished task reporting back to the coordinator. Carries the task
/// itself so a failure can be re-queued for retry.
struct Completion {
    task: Task,
    outcome: Result<(), TaskError>,
}

/// Bounded-concurrency scheduler with primary and retry queues.
///
/// Tasks are submitted up front with [`Scheduler::submit`], then
/// [`Scheduler::run`] consumes the scheduler and drives both drain phases to
/// completion. Consuming `self` makes "submit after the run has started" a
/// compile error rather than a documented precondition.
pub struct Scheduler {
    /// Concurrency ceiling: at most this many tasks in flight.
    limit: usize,
    /// Cool-down before the first retry wave.
    retry_cooldown: Duration,
    /// Delay between retry waves when failures remain.
    retry_recheck: Duration,
    /// Primary FIFO queue of pending tasks.
    pending: VecDeque<Task>,
    /// Secondary FIFO queue of failed tasks eligible for retry.
    retry: VecDeque<Task>,
    /// Shared tallies for status output.
    stats: Arc<SchedulerStats>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("limit", &self.limit)
            .field("pending", &self.pending.len())
            .field("retry", &self.retry.len())
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler with the given concurrency limit and default
    /// cool-down delays.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidLimit`] if the value is outside the
    /// valid range (1-100).
    pub fn new(limit: usize) -> Result<Self, SchedulerError> {
        Self::with_cooldowns(limit, RETRY_COOLDOWN, RETRY_RECHECK_DELAY)
    }

    /// Creates a scheduler with explicit cool-down delays.
    ///
    /// `retry_cooldown` separates primary quiescence from the first retry
    /// wave; `retry_recheck` spaces successive retry waves when failures
    /// remain.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidLimit`] if the limit is outside the
    /// valid range (1-100).
    pub fn with_cooldowns(
        limit: usize,
        retry_cooldown: Duration,
        retry_recheck: Duration,
    ) -> Result<Self, SchedulerError> {
        if !(MIN_LIMIT..=MAX_LIMIT).contains(&limit) {
            return Err(SchedulerError::InvalidLimit { value: limit });
        }

        debug!(
            limit,
            retry_cooldown_ms = retry_cooldown.as_millis(),
            retry_recheck_ms = retry_recheck.as_millis(),
            "creating scheduler"
        );

        Ok(Self {
            limit,
            retry_cooldown,
            retry_recheck,
            pending: VecDeque::new(),
            retry: VecDeque::new(),
            stats: Arc::new(SchedulerStats::default()),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of tasks waiting in the primary queue.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Returns a handle to the running tallies, usable as a status
    /// reporting sink while [`Scheduler::run`] is in progress.
    #[must_use]
    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    /// Appends a task to the primary queue.
    pub fn submit(&mut self, task: Task) {
        self.pending.push_back(task);
    }

    /// Runs the full primary + retry state machine to completion.
    ///
    /// `checkpoint` is invoked at each quiescence point (after the primary
    /// drain, and after the retry queue finally empties) and is where the
    /// orchestrator persists the dedup cache. A checkpoint error aborts the
    /// run.
    ///
    /// Phases:
    /// 1. Drain the primary queue, keeping `min(limit, queued)` tasks in
    ///    flight. Failures move to the retry queue.
    /// 2. At primary quiescence: report tallies, checkpoint. Done if the
    ///    retry queue is empty.
    /// 3. Otherwise wait out the cool-down, then drain the retry queue in
    ///    waves until it is empty at quiescence, checkpoint, report.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::Checkpoint`] if a checkpoint fails.
    #[instrument(skip(self, checkpoint), fields(queued = self.pending.len(), limit = self.limit))]
    pub async fn run<C>(mut self, mut checkpoint: C) -> Result<RunReport, SchedulerError>
    where
        C: FnMut() -> Result<(), CacheError>,
    {
        info!(queued = self.pending.len(), "starting primary pass");

        let mut wave = std::mem::take(&mut self.pending);
        self.drain(&mut wave, Phase::Primary).await;

        info!(
            success = self.stats.success(),
            failure = self.stats.failure(),
            "primary pass complete"
        );
        checkpoint()?;

        if self.retry.is_empty() {
            return Ok(self.report());
        }

        info!(
            queued = self.retry.len(),
            cooldown_ms = self.retry_cooldown.as_millis(),
            "retrying failed tasks after cool-down"
        );
        tokio::time::sleep(self.retry_cooldown).await;

        loop {
            let mut wave = std::mem::take(&mut self.retry);
            self.drain(&mut wave, Phase::Retry).await;

            // Quiescent: nothing in flight. If re-failures re-entered the
            // retry queue (including a task that failed during the very last
            // wave), go around again instead of ending the run with work
            // still queued.
            if self.retry.is_empty() {
                break;
            }
            debug!(
                queued = self.retry.len(),
                recheck_ms = self.retry_recheck.as_millis(),
                "retry queue still has failures, draining again"
            );
            tokio::time::sleep(self.retry_recheck).await;
        }

        checkpoint()?;
        info!(success = self.stats.success(), "retry pass complete");

        Ok(self.report())
    }

    /// Drains one wave of tasks to quiescence under the concurrency limit.
    ///
    /// Admission keeps firing while a slot is free and the wave is
    /// non-empty; otherwise the coordinator waits for one completion,
    /// settles it, and loops. The wave is quiescent when nothing is queued
    /// and nothing is in flight. Failures are pushed onto `self.retry` for
    /// a later wave.
    async fn drain(&mut self, wave: &mut VecDeque<Task>, phase: Phase) {
        let mut in_flight: JoinSet<Completion> = JoinSet::new();

        loop {
            while in_flight.len() < self.limit {
                let Some(task) = wave.pop_front() else { break };

                if phase == Phase::Retry {
                    // The failure tally reflects "currently believed
                    // failed"; admitting a retry reverses the earlier count
                    // until the attempt resolves.
                    self.stats.failure.fetch_sub(1, Ordering::SeqCst);
                }
                self.stats.in_flight.fetch_add(1, Ordering::SeqCst);

                let run = Arc::clone(&task);
                in_flight.spawn(async move {
                    let outcome = run().await;
                    Completion { task, outcome }
                });
            }

            let Some(joined) = in_flight.join_next().await else {
                // Nothing in flight, and admission found the wave empty.
                break;
            };
            self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);

            match joined {
                Ok(Completion {
                    outcome: Ok(()), ..
                }) => {
                    self.stats.success.fetch_add(1, Ordering::SeqCst);
                }
                Ok(Completion {
                    outcome: Err(error),
                    task,
                }) => {
                    warn!(
                        task = error.label(),
                        error = error.reason(),
                        "task failed, queued for retry"
                    );
                    self.stats.failure.fetch_add(1, Ordering::SeqCst);
                    self.retry.push_back(task);
                }
                Err(join_error) => {
                    // A panicked task cannot be re-queued; count it failed
                    // so the report is honest about the loss.
                    warn!(error = %join_error, "task panicked, dropping it");
                    self.stats.failure.fetch_add(1, Ordering::SeqCst);
                }
            }
        }
    }

    fn report(&self) -> RunReport {
        RunReport {
            success: self.stats.success(),
            failure: self.stats.failure(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fast_scheduler(limit: usize) -> Scheduler {
        Scheduler::with_cooldowns(limit, Duration::ZERO, Duration::ZERO).unwrap()
    }

    #[test]
    fn test_scheduler_new_valid_limits() {
        assert_eq!(Scheduler::new(1).unwrap().limit(), 1);
        assert_eq!(Scheduler::new(15).unwrap().limit(), 15);
        assert_eq!(Scheduler::new(100).unwrap().limit(), 100);
    }

    #[test]
    fn test_scheduler_new_invalid_limit_zero() {
        let result = Scheduler::new(0);
        assert!(matches!(
            result,
            Err(SchedulerError::InvalidLimit { value: 0 })
        ));
    }

    #[test]
    fn test_scheduler_new_invalid_limit_too_high() {
        let result = Scheduler::new(101);
        assert!(matches!(
            result,
            Err(SchedulerError::InvalidLimit { value: 101 })
        ));
    }

    #[test]
    fn test_submit_grows_pending_queue() {
        let mut scheduler = fast_scheduler(2);
        assert_eq!(scheduler.pending(), 0);
        scheduler.submit(task(|| async { Ok(()) }));
        scheduler.submit(task(|| async { Ok(()) }));
        assert_eq!(scheduler.pending(), 2);
    }

    #[test]
    fn test_task_error_carries_context() {
        let error = TaskError::new("photos/a.png", "HTTP 500");
        assert_eq!(error.label(), "photos/a.png");
        assert_eq!(error.reason(), "HTTP 500");
        assert_eq!(error.to_string(), "photos/a.png: HTTP 500");
    }

    #[test]
    fn test_default_concurrency_constant() {
        assert_eq!(DEFAULT_CONCURRENCY, 15);
    }

    #[tokio::test]
    async fn test_run_with_no_tasks_checkpoints_once() {
        let scheduler = fast_scheduler(2);
        let mut checkpoints = 0;
        let report = scheduler
            .run(|| {
                checkpoints += 1;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(report, RunReport {
            success: 0,
            failure: 0
        });
        assert_eq!(checkpoints, 1, "primary quiescence still checkpoints");
    }

    #[tokio::test]
    async fn test_run_all_successes_skips_retry_phase() {
        let mut scheduler = fast_scheduler(3);
        for _ in 0..8 {
            scheduler.submit(task(|| async { Ok(()) }));
        }
        let mut checkpoints = 0;
        let report = scheduler
            .run(|| {
                checkpoints += 1;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(report.success, 8);
        assert_eq!(report.failure, 0);
        assert_eq!(checkpoints, 1, "no retry phase means no second checkpoint");
    }

    #[test]
    fn test_checkpoint_error_propagates() {
        let scheduler = fast_scheduler(2);
        let result = tokio_test::block_on(scheduler.run(|| {
            Err(CacheError::io(
                "/nope",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            ))
        }));
        assert!(matches!(result, Err(SchedulerError::Checkpoint(_))));
    }
}
