//! # Job Scheduler
//!
//! Runs registered jobs on tokio timers. A job has exactly one schedule:
//!
//! - `cron`: a cron expression. Five-field expressions get a leading
//!   seconds field of `0`.
//! - `interval`: fixed period, first run one period after scheduling.
//! - `afterDelay`: a single run, after which the job removes itself.
//!
//! A `singleton` job skips a tick while its previous run is still in flight.
//! Different jobs never block each other.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures::future::BoxFuture;
use futures::FutureExt;
use keel_compiler::{JobDescriptor, JobProps};
use tokio::task::JoinHandle;

use crate::context::AppContext;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job `{0}` sets more than one of cron, interval and afterDelay")]
    ConflictingSchedule(String),

    #[error("job `{0}` sets none of cron, interval and afterDelay")]
    MissingSchedule(String),

    #[error("job id `{0}` is already scheduled")]
    DuplicateId(String),

    #[error("job `{id}` has an invalid cron expression `{expression}`: {message}")]
    InvalidCron {
        id: String,
        expression: String,
        message: String,
    },
}

pub type JobFn = Arc<dyn Fn(Arc<AppContext>) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wraps an async function as a [`JobFn`].
pub fn job<F, Fut>(f: F) -> JobFn
where
    F: Fn(Arc<AppContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

#[derive(Clone)]
pub struct JobRegistration {
    /// Module base name, the fallback id.
    pub name: String,
    pub props: JobProps,
    pub job: JobFn,
}

impl fmt::Debug for JobRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRegistration")
            .field("name", &self.name)
            .field("props", &self.props)
            .finish()
    }
}

impl JobRegistration {
    pub fn new(name: impl Into<String>, props: JobProps, job: JobFn) -> Self {
        Self {
            name: name.into(),
            props,
            job,
        }
    }

    pub fn id(&self) -> &str {
        if self.props.id.is_empty() {
            &self.name
        } else {
            &self.props.id
        }
    }

    pub fn apply_descriptor(&mut self, descriptor: &JobDescriptor) {
        self.props = descriptor.job.clone();
    }
}

/// When a job runs.
#[derive(Debug, Clone)]
pub enum Schedule {
    Cron(Box<cron::Schedule>),
    Interval(Duration),
    AfterDelay(Duration),
}

impl Schedule {
    pub fn from_props(id: &str, props: &JobProps) -> Result<Self, JobError> {
        let set = [props.cron.is_some(), props.interval_ms.is_some(), props.after_delay_ms.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if set > 1 {
            return Err(JobError::ConflictingSchedule(id.to_string()));
        }

        if let Some(expression) = &props.cron {
            return parse_cron(expression)
                .map(|schedule| Schedule::Cron(Box::new(schedule)))
                .map_err(|message| JobError::InvalidCron {
                    id: id.to_string(),
                    expression: expression.clone(),
                    message,
                });
        }
        if let Some(ms) = props.interval_ms {
            return Ok(Schedule::Interval(Duration::from_millis(ms.max(1))));
        }
        if let Some(ms) = props.after_delay_ms {
            return Ok(Schedule::AfterDelay(Duration::from_millis(ms)));
        }
        Err(JobError::MissingSchedule(id.to_string()))
    }
}

fn parse_cron(expression: &str) -> Result<cron::Schedule, String> {
    let fields = expression.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {}", expression)
    } else {
        expression.to_string()
    };
    cron::Schedule::from_str(&normalized).map_err(|e| e.to_string())
}

struct ScheduledJob {
    task: JoinHandle<()>,
}

/// Owns the timer task of every scheduled job.
#[derive(Clone)]
pub struct JobScheduler {
    ctx: Arc<AppContext>,
    jobs: Arc<Mutex<HashMap<String, ScheduledJob>>>,
}

impl fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobScheduler").field("jobs", &self.job_ids()).finish()
    }
}

impl JobScheduler {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            ctx,
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Starts the timer for a job. Must be called inside a tokio runtime.
    pub fn schedule(&self, registration: JobRegistration) -> Result<(), JobError> {
        let id = registration.id().to_string();
        let schedule = Schedule::from_props(&id, &registration.props)?;

        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if jobs.contains_key(&id) {
            return Err(JobError::DuplicateId(id));
        }

        let runner = JobRunner {
            id: id.clone(),
            job: registration.job,
            singleton: registration.props.singleton,
            running: Arc::new(AtomicBool::new(false)),
            ctx: Arc::clone(&self.ctx),
        };
        let task = match schedule.clone() {
            Schedule::Cron(cron) => tokio::spawn(run_cron(runner, cron)),
            Schedule::Interval(period) => tokio::spawn(run_interval(runner, period)),
            Schedule::AfterDelay(delay) => tokio::spawn(run_after_delay(runner, delay, Arc::clone(&self.jobs))),
        };
        jobs.insert(id.clone(), ScheduledJob { task });

        tracing::info!(job = %id, schedule = ?schedule, "job scheduled");
        Ok(())
    }

    pub fn is_scheduled(&self, id: &str) -> bool {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).contains_key(id)
    }

    pub fn job_ids(&self) -> Vec<String> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = jobs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Stops every timer. Runs already in flight finish on their own.
    pub fn shutdown(&self) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, job) in jobs.drain() {
            job.task.abort();
        }
    }
}

#[derive(Clone)]
struct JobRunner {
    id: String,
    job: JobFn,
    singleton: bool,
    running: Arc<AtomicBool>,
    ctx: Arc<AppContext>,
}

impl JobRunner {
    /// Starts one run in the background.
    fn fire(&self) {
        if self.singleton && self.running.swap(true, Ordering::SeqCst) {
            tracing::warn!(job = %self.id, "previous run still in flight, skipping");
            return;
        }
        let runner = self.clone();
        tokio::spawn(async move {
            runner.run().await;
        });
    }

    async fn run(&self) {
        tracing::debug!(job = %self.id, "job started");
        match (self.job)(Arc::clone(&self.ctx)).await {
            Ok(()) => tracing::debug!(job = %self.id, "job finished"),
            Err(err) => tracing::error!(job = %self.id, error = %err, "job failed"),
        }
        self.running.store(false, Ordering::SeqCst);
    }
}

async fn run_cron(runner: JobRunner, schedule: Box<cron::Schedule>) {
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            tracing::info!(job = %runner.id, "cron schedule has no upcoming runs");
            return;
        };
        let wait = (next - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(wait).await;
        runner.fire();
    }
}

async fn run_interval(runner: JobRunner, period: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        ticker.tick().await;
        runner.fire();
    }
}

async fn run_after_delay(runner: JobRunner, delay: Duration, jobs: Arc<Mutex<HashMap<String, ScheduledJob>>>) {
    tokio::time::sleep(delay).await;
    runner.running.store(true, Ordering::SeqCst);
    runner.run().await;
    jobs.lock().unwrap_or_else(PoisonError::into_inner).remove(&runner.id);
    tracing::debug!(job = %runner.id, "one-shot job removed");
}
