//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Validating submissions before any state is created
//! - Inserting into the job store and trigger queue as a pair
//! - Waking at the earliest fire time, re-armed on every new submission
//! - Applying the misfire policy to late entries
//! - Fanning handler invocations onto a bounded worker pool
//! - Recording outcomes and emitting lifecycle events

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::task::JoinHandle;

use crate::core::clock::{Clock, SystemClock};
use crate::core::handler::JobHandler;
use crate::core::job::JobSpec;
use crate::core::trigger::{MisfirePolicy, Trigger};
use crate::core::types::JobId;
use crate::events::{Event, EventBus};
use crate::store::{EntryFailure, EntryState, JobStore, ScheduledEntry, StoreError};

use super::handle::{SchedulerHandle, COMMAND_CHANNEL_BUFFER};
use super::queue::TriggerQueue;
use super::types::{SchedulerCommand, SchedulerError, SchedulerState};

/// Default misfire threshold: how far past its fire time an entry may be
/// observed before the misfire policy applies.
const DEFAULT_MISFIRE_THRESHOLD: Duration = Duration::from_secs(60);

/// Default bound on concurrently running handler invocations.
const DEFAULT_MAX_IN_FLIGHT: usize = 4;

/// Main scheduler for single-shot job execution.
pub struct Scheduler<S: JobStore> {
    /// Store backend.
    store: Arc<S>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Registered handlers, keyed by job group.
    handlers: HashMap<String, Arc<dyn JobHandler>>,
    /// Event bus for emitting lifecycle events.
    event_bus: Arc<EventBus>,
    /// Lag beyond which the misfire policy applies.
    misfire_threshold: Duration,
    /// Worker pool bound for handler invocations.
    max_in_flight: usize,
    /// Graceful shutdown timeout.
    shutdown_timeout: Duration,
}

impl<S: JobStore + 'static> Scheduler<S> {
    /// Create a new scheduler with the given store.
    pub fn new(store: S) -> Self {
        Self::with_store(Arc::new(store))
    }

    /// Create a new scheduler with shared store (useful for tests that
    /// inspect the store directly).
    pub fn with_store(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            handlers: HashMap::new(),
            event_bus: Arc::new(EventBus::new()),
            misfire_threshold: DEFAULT_MISFIRE_THRESHOLD,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            shutdown_timeout: Duration::from_secs(30),
        }
    }

    /// Set the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set the event bus.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Arc::new(event_bus);
        self
    }

    /// Set the misfire threshold.
    pub fn with_misfire_threshold(mut self, threshold: Duration) -> Self {
        self.misfire_threshold = threshold;
        self
    }

    /// Set the worker pool bound.
    ///
    /// # Panics
    ///
    /// Panics if `max` is zero.
    pub fn with_max_in_flight(mut self, max: usize) -> Self {
        assert!(max > 0, "max_in_flight cannot be zero");
        self.max_in_flight = max;
        self
    }

    /// Set the graceful shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Register a handler for a job group.
    ///
    /// Submissions whose group has no registered handler are rejected at
    /// schedule time, so dispatch never sees an unroutable entry.
    pub fn register_handler<H>(mut self, group: impl Into<String>, handler: H) -> Self
    where
        H: JobHandler + 'static,
    {
        self.handlers.insert(group.into(), Arc::new(handler));
        self
    }

    /// Get the event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Start the scheduler and return a handle for controlling it.
    pub fn start(self) -> (SchedulerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let state = Arc::new(RwLock::new(SchedulerState::Running));

        let handle = SchedulerHandle {
            command_tx,
            state: Arc::clone(&state),
        };

        let scheduler_task = tokio::spawn(async move {
            self.run(command_rx, state).await;
        });

        (handle, scheduler_task)
    }

    /// Main dispatch loop.
    ///
    /// Blocks on the command channel and on a sleep until the earliest
    /// fire time. Because every schedule command lands here before the
    /// deadline is recomputed, an insertion with an earlier fire time
    /// re-arms the wait immediately; there is no fixed polling interval.
    async fn run(
        self,
        mut command_rx: mpsc::Receiver<SchedulerCommand>,
        state: Arc<RwLock<SchedulerState>>,
    ) {
        let mut queue = TriggerQueue::new();
        let mut in_flight: HashMap<JobId, JoinHandle<()>> = HashMap::new();
        let pool = Arc::new(Semaphore::new(self.max_in_flight));

        loop {
            in_flight.retain(|_, handle| !handle.is_finished());
            let next_due = queue.peek_earliest().map(|(_, fire_at)| fire_at);

            tokio::select! {
                maybe_command = command_rx.recv() => {
                    match maybe_command {
                        Some(SchedulerCommand::Schedule { spec, trigger, response }) => {
                            let result = self.handle_schedule(&mut queue, spec, trigger).await;
                            let _ = response.send(result);
                        }
                        Some(SchedulerCommand::Cancel { job_id, response }) => {
                            let result = self.handle_cancel(&mut queue, job_id).await;
                            let _ = response.send(result);
                        }
                        Some(SchedulerCommand::Get { job_id, response }) => {
                            let result = self.store.get(&job_id).await.map_err(map_store_error);
                            let _ = response.send(result);
                        }
                        Some(SchedulerCommand::Shutdown { response }) => {
                            *state.write().await = SchedulerState::Stopped;
                            self.await_in_flight(&mut in_flight).await;
                            let _ = response.send(());
                            break;
                        }
                        None => {
                            // All handles dropped; stop.
                            *state.write().await = SchedulerState::Stopped;
                            self.await_in_flight(&mut in_flight).await;
                            break;
                        }
                    }
                }

                _ = wait_for_due(next_due, self.clock.as_ref()) => {
                    self.dispatch_due(&mut queue, &mut in_flight, &pool).await;
                }
            }
        }
    }

    /// Validate a submission and insert it into store and queue.
    ///
    /// Checks run before any state is created; an error here leaves the
    /// store and queue untouched.
    async fn handle_schedule(
        &self,
        queue: &mut TriggerQueue,
        spec: JobSpec,
        trigger: Trigger,
    ) -> Result<JobId, SchedulerError> {
        if spec.job_id().is_empty() {
            return Err(SchedulerError::InvalidSpec("job id must not be empty".into()));
        }
        if spec.group().is_empty() {
            return Err(SchedulerError::InvalidSpec("job group must not be empty".into()));
        }
        if trigger.job_id() != spec.job_id() {
            return Err(SchedulerError::InvalidSpec(format!(
                "trigger references job '{}' but spec is '{}'",
                trigger.job_id(),
                spec.job_id()
            )));
        }

        let handler = self.handlers.get(spec.group()).ok_or_else(|| {
            SchedulerError::InvalidSpec(format!(
                "no handler registered for group '{}'",
                spec.group()
            ))
        })?;
        for key in handler.required_keys() {
            if !spec.payload().contains_key(*key) {
                return Err(SchedulerError::InvalidSpec(format!(
                    "payload missing required key '{}'",
                    key
                )));
            }
        }

        let now = self.clock.now();
        if trigger.fire_at() <= now {
            return Err(SchedulerError::InvalidTime(format!(
                "fire time {} must be after current time {}",
                trigger.fire_at(),
                now
            )));
        }

        let job_id = spec.job_id().clone();
        let fire_at = trigger.fire_at();
        let entry = ScheduledEntry::new(spec, trigger, now);

        self.store.insert(entry).await.map_err(map_store_error)?;
        queue.push(job_id.clone(), fire_at);

        tracing::info!(job_id = %job_id, fire_at = %fire_at, "Job scheduled");
        self.event_bus
            .emit(Event::EntryScheduled {
                job_id: job_id.clone(),
                fire_at,
            })
            .await;

        Ok(job_id)
    }

    /// Remove a scheduled entry from queue and store.
    async fn handle_cancel(
        &self,
        queue: &mut TriggerQueue,
        job_id: JobId,
    ) -> Result<(), SchedulerError> {
        let entry = self.store.get(&job_id).await.map_err(map_store_error)?;
        if entry.state != EntryState::Scheduled {
            return Err(SchedulerError::AlreadyFired(job_id));
        }

        queue.remove(&job_id);
        self.store.remove(&job_id).await.map_err(map_store_error)?;

        tracing::info!(job_id = %job_id, "Job cancelled");
        self.event_bus
            .emit(Event::EntryCancelled {
                job_id: job_id.clone(),
            })
            .await;

        Ok(())
    }

    /// Pop every due entry, apply the misfire policy, and hand the
    /// survivors to the worker pool.
    async fn dispatch_due(
        &self,
        queue: &mut TriggerQueue,
        in_flight: &mut HashMap<JobId, JoinHandle<()>>,
        pool: &Arc<Semaphore>,
    ) {
        let now = self.clock.now();

        for job_id in queue.pop_due(now) {
            let entry = match self.store.get(&job_id).await {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "Due entry missing from store");
                    continue;
                }
            };

            if let Err(e) = self.store.update_state(&job_id, EntryState::Firing).await {
                tracing::warn!(job_id = %job_id, error = %e, "Entry cannot enter firing state");
                continue;
            }

            let lag = (now - entry.fire_at())
                .to_std()
                .unwrap_or(Duration::ZERO);

            if lag > self.misfire_threshold {
                let policy = entry.trigger.misfire_policy();
                self.event_bus
                    .emit(Event::EntryMisfired {
                        job_id: job_id.clone(),
                        policy,
                        lag,
                    })
                    .await;

                match policy {
                    MisfirePolicy::FireNowIfMissed => {
                        tracing::warn!(job_id = %job_id, lag = ?lag, "Misfired, firing now");
                    }
                    MisfirePolicy::SkipIfMissed => {
                        tracing::warn!(job_id = %job_id, lag = ?lag, "Misfired, skipping");
                        if let Err(e) = self
                            .store
                            .update_state(&job_id, EntryState::MisfireSkipped)
                            .await
                        {
                            tracing::warn!(job_id = %job_id, error = %e, "Failed to mark entry skipped");
                        }
                        continue;
                    }
                    MisfirePolicy::ErrorIfMissed => {
                        tracing::warn!(job_id = %job_id, lag = ?lag, "Misfired, failing");
                        if let Err(e) = self
                            .store
                            .record_failure(&job_id, EntryFailure::Misfired)
                            .await
                        {
                            tracing::warn!(job_id = %job_id, error = %e, "Failed to mark entry misfired");
                        }
                        self.event_bus
                            .emit(Event::EntryFailed {
                                job_id: job_id.clone(),
                                error: EntryFailure::Misfired.to_string(),
                            })
                            .await;
                        continue;
                    }
                }
            }

            let handler = match self.handlers.get(entry.spec.group()) {
                Some(handler) => Arc::clone(handler),
                None => {
                    // Schedule-time validation makes this unreachable, but a
                    // dangling entry must not take the loop down.
                    tracing::warn!(job_id = %job_id, group = %entry.spec.group(), "No handler for group");
                    let failure = EntryFailure::Handler("no handler registered".into());
                    if let Err(e) = self.store.record_failure(&job_id, failure).await {
                        tracing::warn!(job_id = %job_id, error = %e, "Failed to mark entry failed");
                    }
                    continue;
                }
            };

            let task = self.spawn_invocation(entry, handler, lag, Arc::clone(pool));
            in_flight.insert(job_id, task);
        }
    }

    /// Run one handler invocation on the pool and record its outcome.
    fn spawn_invocation(
        &self,
        entry: ScheduledEntry,
        handler: Arc<dyn JobHandler>,
        lag: Duration,
        pool: Arc<Semaphore>,
    ) -> JoinHandle<()> {
        let store = Arc::clone(&self.store);
        let event_bus = Arc::clone(&self.event_bus);

        tokio::spawn(async move {
            // The pool bounds concurrency; the permit is acquired here so a
            // saturated pool never blocks the dispatch loop itself.
            let _permit = match pool.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let job_id = entry.job_id().clone();
            event_bus
                .emit(Event::EntryFired {
                    job_id: job_id.clone(),
                    lag,
                })
                .await;

            let start = std::time::Instant::now();
            match handler.execute(entry.job_id(), entry.spec.payload()).await {
                Ok(()) => {
                    if let Err(e) = store.update_state(&job_id, EntryState::Completed).await {
                        tracing::warn!(job_id = %job_id, error = %e, "Failed to mark entry completed");
                    }
                    tracing::info!(job_id = %job_id, duration = ?start.elapsed(), "Job completed");
                    event_bus
                        .emit(Event::EntryCompleted {
                            job_id,
                            duration: start.elapsed(),
                        })
                        .await;
                }
                Err(err) => {
                    let message = err.to_string();
                    tracing::warn!(job_id = %job_id, error = %message, "Handler failed");
                    if let Err(e) = store
                        .record_failure(&job_id, EntryFailure::Handler(message.clone()))
                        .await
                    {
                        tracing::warn!(job_id = %job_id, error = %e, "Failed to mark entry failed");
                    }
                    event_bus
                        .emit(Event::EntryFailed {
                            job_id,
                            error: message,
                        })
                        .await;
                }
            }
        })
    }

    /// Wait for in-flight handler invocations with a timeout.
    async fn await_in_flight(&self, in_flight: &mut HashMap<JobId, JoinHandle<()>>) {
        in_flight.retain(|_, handle| !handle.is_finished());
        if in_flight.is_empty() {
            return;
        }

        tracing::info!(
            "Graceful shutdown: waiting for {} in-flight handler(s) (timeout: {:?})",
            in_flight.len(),
            self.shutdown_timeout
        );

        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        loop {
            in_flight.retain(|_, handle| !handle.is_finished());
            if in_flight.is_empty() {
                tracing::info!("All in-flight handlers completed");
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    "Shutdown timeout exceeded with {} handler(s) still running",
                    in_flight.len()
                );
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

/// Sleep until the given fire time according to `clock`, or forever when
/// there is nothing pending.
async fn wait_for_due(next: Option<DateTime<Utc>>, clock: &dyn Clock) {
    match next {
        Some(fire_at) => {
            let delta = (fire_at - clock.now()).to_std().unwrap_or(Duration::ZERO);
            if !delta.is_zero() {
                tokio::time::sleep(delta).await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

fn map_store_error(e: StoreError) -> SchedulerError {
    match e {
        StoreError::NotFound(id) => SchedulerError::NotFound(id),
        StoreError::DuplicateJob(id) => SchedulerError::DuplicateJob(id),
        other => SchedulerError::Store(other),
    }
}
