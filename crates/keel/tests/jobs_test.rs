//! Job scheduling through the app.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use keel::{job, App, AppOptions, Environment, Error, JobError, JobFn, JobProps, JobRegistration, Registry};

fn options() -> AppOptions {
    AppOptions {
        environment: Environment::Test,
        disable_http_server: true,
        ..AppOptions::new("jobs")
    }
}

fn counting(counter: &Arc<AtomicUsize>) -> JobFn {
    let counter = Arc::clone(counter);
    job(move |_| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    })
}

fn after_delay(id: &str, ms: u64) -> JobProps {
    JobProps {
        id: id.to_string(),
        after_delay_ms: Some(ms),
        ..JobProps::default()
    }
}

#[tokio::test(start_paused = true)]
async fn test_after_delay_runs_exactly_once() {
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = Registry::new().job(JobRegistration::new("Warmup", after_delay("warmup", 5_000), counting(&counter)));
    let mut app = App::new(options(), registry);
    app.start().await.unwrap();

    let scheduler = app.scheduler().unwrap().clone();
    assert!(scheduler.is_scheduled("warmup"));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(!scheduler.is_scheduled("warmup"));
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_job_id_is_not_scheduled() {
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));
    let registry = Registry::new()
        .job(JobRegistration::new("Cleanup", after_delay("cleanup", 1_000), counting(&first)))
        .job(JobRegistration::new("CleanupAgain", after_delay("cleanup", 1_000), counting(&second)));
    let mut app = App::new(options(), registry);
    app.start().await.unwrap();

    assert_eq!(app.scheduler().unwrap().job_ids(), vec!["cleanup"]);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_conflicting_schedule_fails_startup() {
    let mut props = after_delay("both", 1_000);
    props.interval_ms = Some(1_000);
    let registry = Registry::new().job(JobRegistration::new("Both", props, job(|_| async { Ok(()) })));

    let err = App::new(options(), registry).start().await.unwrap_err();
    assert!(matches!(err, Error::Job(JobError::ConflictingSchedule(id)) if id == "both"));
}

#[tokio::test]
async fn test_scheduling_can_be_disabled() {
    let mut options = options();
    options.disable_scheduling = true;
    let registry = Registry::new().job(JobRegistration::new("Warmup", after_delay("warmup", 10), job(|_| async { Ok(()) })));
    let mut app = App::new(options, registry);
    app.start().await.unwrap();
    assert!(app.scheduler().is_none());
}
