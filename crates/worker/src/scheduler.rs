//! Interval scheduler for background jobs.
//!
//! A single dispatcher task owns the clock. Each registered job gets a
//! dedicated worker task fed through a bounded channel, plus an in-flight
//! flag: a trigger is accepted only while the job is idle, otherwise it is
//! skipped and counted. Timer ticks and manual triggers share that gate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// A named unit of recurring work.
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Runs once. The returned string summarises the run for status and logs.
    async fn run(&self) -> anyhow::Result<String>;
}

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("unknown job '{0}'")]
    UnknownJob(String),

    #[error("scheduler is shutting down")]
    ShuttingDown,

    #[error("job '{0}' needs a non-zero interval")]
    ZeroInterval(String),

    #[error("job '{0}' is already registered")]
    DuplicateJob(String),
}

/// Result of asking a job to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerResult {
    Accepted,
    /// The job was already running; this trigger was dropped.
    AlreadyRunning,
}

/// How the last run of a job ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded { summary: String },
    Failed { error: String },
    Panicked { message: String },
}

/// Point-in-time view of one job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub name: String,
    pub interval_secs: u64,
    pub running: bool,
    pub runs: u64,
    pub failures: u64,
    pub skipped_overlaps: u64,
    pub last_outcome: Option<JobOutcome>,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_finished_at: Option<DateTime<Utc>>,
}

struct JobSlot {
    name: String,
    interval: Duration,
    running: AtomicBool,
    status: Mutex<JobStatus>,
    tx: mpsc::Sender<()>,
}

impl JobSlot {
    /// Claims the in-flight flag and signals the worker.
    fn trigger(&self) -> Result<TriggerResult, SchedulerError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.status.lock().skipped_overlaps += 1;
            telemetry::metrics().job_skipped_overlaps.inc();
            debug!(job = %self.name, "Job still running, trigger skipped");
            return Ok(TriggerResult::AlreadyRunning);
        }

        // The flag was idle, so the capacity-1 channel is empty
        if self.tx.try_send(()).is_err() {
            self.running.store(false, Ordering::Release);
            return Err(SchedulerError::ShuttingDown);
        }
        // `status.running` is owned by the worker; setting it here could land
        // after a fast run has already finished and cleared it
        Ok(TriggerResult::Accepted)
    }
}

/// Collects jobs before the scheduler starts.
#[derive(Default)]
pub struct Scheduler {
    jobs: Vec<(Arc<dyn Job>, Duration)>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `job` to run every `interval`, first after one interval.
    ///
    /// A zero interval would make the dispatcher fire back-to-back, so it is
    /// rejected along with a second job under an existing name.
    pub fn register(
        mut self,
        job: impl Job,
        interval: Duration,
    ) -> Result<Self, SchedulerError> {
        if interval.is_zero() {
            return Err(SchedulerError::ZeroInterval(job.name().to_string()));
        }
        if self.jobs.iter().any(|(existing, _)| existing.name() == job.name()) {
            return Err(SchedulerError::DuplicateJob(job.name().to_string()));
        }
        self.jobs.push((Arc::new(job), interval));
        Ok(self)
    }

    pub fn job_names(&self) -> Vec<String> {
        self.jobs.iter().map(|(job, _)| job.name().to_string()).collect()
    }

    /// Spawns the dispatcher and one worker per job.
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut slots = Vec::with_capacity(self.jobs.len());
        let mut tasks = Vec::with_capacity(self.jobs.len() + 1);

        for (job, interval) in self.jobs {
            let (tx, rx) = mpsc::channel(1);
            let slot = Arc::new(JobSlot {
                name: job.name().to_string(),
                interval,
                running: AtomicBool::new(false),
                status: Mutex::new(JobStatus {
                    name: job.name().to_string(),
                    interval_secs: interval.as_secs(),
                    running: false,
                    runs: 0,
                    failures: 0,
                    skipped_overlaps: 0,
                    last_outcome: None,
                    last_started_at: None,
                    last_finished_at: None,
                }),
                tx,
            });
            tasks.push(tokio::spawn(job_worker(
                job,
                slot.clone(),
                rx,
                shutdown_rx.clone(),
            )));
            info!(job = %slot.name, interval_secs = interval.as_secs(), "Registered job");
            slots.push(slot);
        }

        tasks.push(tokio::spawn(dispatcher(slots.clone(), shutdown_rx)));

        SchedulerHandle {
            inner: Arc::new(HandleInner {
                slots: slots
                    .into_iter()
                    .map(|slot| (slot.name.clone(), slot))
                    .collect(),
                shutdown: shutdown_tx,
                tasks: Mutex::new(tasks),
            }),
        }
    }
}

struct HandleInner {
    slots: HashMap<String, Arc<JobSlot>>,
    shutdown: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Cheap to clone; shared by the binary and the HTTP API.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Arc<HandleInner>,
}

impl SchedulerHandle {
    /// Requests a run of `name` through the same gate as the timer.
    pub fn trigger(&self, name: &str) -> Result<TriggerResult, SchedulerError> {
        if *self.inner.shutdown.borrow() {
            return Err(SchedulerError::ShuttingDown);
        }
        self.inner
            .slots
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?
            .trigger()
    }

    /// Status of every job, ordered by name.
    pub fn statuses(&self) -> Vec<JobStatus> {
        let mut statuses: Vec<JobStatus> = self
            .inner
            .slots
            .values()
            .map(|slot| slot.status.lock().clone())
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn status(&self, name: &str) -> Option<JobStatus> {
        self.inner
            .slots
            .get(name)
            .map(|slot| slot.status.lock().clone())
    }

    /// Stops the dispatcher and waits for in-flight runs to finish.
    pub async fn shutdown(&self) {
        self.inner.shutdown.send_replace(true);
        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                error!("Scheduler task ended abnormally: {}", e);
            }
        }
        info!("Scheduler stopped");
    }
}

async fn dispatcher(slots: Vec<Arc<JobSlot>>, mut shutdown: watch::Receiver<bool>) {
    if slots.is_empty() {
        return;
    }

    let start = Instant::now();
    let mut next_due: Vec<Instant> = slots.iter().map(|s| start + s.interval).collect();

    loop {
        let Some(wake_at) = next_due.iter().min().copied() else {
            return;
        };

        tokio::select! {
            _ = tokio::time::sleep_until(wake_at) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("Dispatcher stopping");
                    return;
                }
                continue;
            }
        }

        let now = Instant::now();
        for (slot, due) in slots.iter().zip(next_due.iter_mut()) {
            if *due > now {
                continue;
            }
            if let Err(e) = slot.trigger() {
                warn!(job = %slot.name, error = %e, "Scheduled trigger failed");
            }
            // Skip missed ticks instead of bursting
            *due += slot.interval;
            if *due <= now {
                *due = now + slot.interval;
            }
        }
    }
}

async fn job_worker(
    job: Arc<dyn Job>,
    slot: Arc<JobSlot>,
    mut rx: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return;
                }
            }
            signal = rx.recv() => {
                if signal.is_none() {
                    return;
                }
                run_once(&job, &slot).await;
            }
        }
    }
}

/// Runs the job in its own task so a panic stays at the job boundary.
async fn run_once(job: &Arc<dyn Job>, slot: &JobSlot) {
    let metrics = telemetry::metrics();
    let started = Instant::now();
    {
        let mut status = slot.status.lock();
        status.running = true;
        status.last_started_at = Some(Utc::now());
    }
    metrics.job_runs.inc();
    metrics.jobs_running.inc();

    let span = info_span!("job", name = %slot.name);
    let body = {
        let job = job.clone();
        tokio::spawn(async move { job.run().await }.instrument(span.clone()))
    };

    let outcome = match body.await {
        Ok(Ok(summary)) => {
            span.in_scope(|| info!(elapsed_ms = started.elapsed().as_millis() as u64, %summary, "Job finished"));
            JobOutcome::Succeeded { summary }
        }
        Ok(Err(e)) => {
            span.in_scope(|| error!(error = %format!("{:#}", e), "Job failed"));
            JobOutcome::Failed {
                error: format!("{:#}", e),
            }
        }
        Err(join_err) => {
            let message = if join_err.is_panic() {
                panic_message(join_err.into_panic())
            } else {
                "job task cancelled".to_string()
            };
            span.in_scope(|| error!(%message, "Job panicked"));
            JobOutcome::Panicked { message }
        }
    };

    metrics.jobs_running.dec();
    metrics
        .job_duration_ms
        .observe(started.elapsed().as_millis() as u64);
    if !matches!(outcome, JobOutcome::Succeeded { .. }) {
        metrics.job_failures.inc();
    }

    {
        let mut status = slot.status.lock();
        status.runs += 1;
        if !matches!(outcome, JobOutcome::Succeeded { .. }) {
            status.failures += 1;
        }
        status.running = false;
        status.last_outcome = Some(outcome);
        status.last_finished_at = Some(Utc::now());
        // Released under the status lock so a racing trigger marks running after us
        slot.running.store(false, Ordering::Release);
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
