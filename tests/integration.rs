//! Integration tests exercising the scheduler, trigger, and job-info
//! subsystems as integrated components.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chronform::{AnyTrigger, Scheduler};

const EVERY_SECOND: &str = "* * * * * ?";

#[tokio::test]
async fn job_fires_repeatedly_once_started() {
    let scheduler: Scheduler<&'static str> = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&counter);

    scheduler
        .schedule_job(
            "tick",
            move |_ctx| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            vec![AnyTrigger::create(EVERY_SECOND).unwrap()],
        )
        .unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert!(counter.load(Ordering::SeqCst) >= 2, "expected at least two fires");

    scheduler.dispose().await.unwrap();
}

#[tokio::test]
async fn pause_stops_firing_and_resume_restarts_it_without_replaying_backlog() {
    let scheduler: Scheduler<&'static str> = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&counter);

    scheduler
        .schedule_job(
            "tick",
            move |_ctx| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            vec![AnyTrigger::create(EVERY_SECOND).unwrap()],
        )
        .unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(counter.load(Ordering::SeqCst) >= 1);

    let info = scheduler.job_info(&"tick").unwrap();
    info.pause().await.unwrap();
    assert!(info.is_paused());

    let observed_at_pause = counter.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(
        counter.load(Ordering::SeqCst),
        observed_at_pause,
        "a paused job must not fire, even after missing several occurrences"
    );

    info.resume().await.unwrap();
    assert!(!info.is_paused());
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(
        counter.load(Ordering::SeqCst) > observed_at_pause,
        "resuming must re-arm the timer against the next occurrence, not replay missed ones"
    );

    scheduler.dispose().await.unwrap();
}

#[tokio::test]
async fn callback_error_is_published_to_subscribers_and_the_job_keeps_running() {
    let scheduler: Scheduler<&'static str> = Scheduler::new();
    let mut errors = scheduler.subscribe_errors();

    scheduler
        .schedule_job(
            "flaky",
            |_ctx| Err(Box::<dyn std::error::Error + Send + Sync>::from("boom")),
            vec![AnyTrigger::create(EVERY_SECOND).unwrap()],
        )
        .unwrap();

    scheduler.start().unwrap();

    let exception = tokio::time::timeout(Duration::from_secs(3), errors.recv())
        .await
        .expect("timed out waiting for a job exception")
        .unwrap();

    assert_eq!(exception.data, "flaky");
    assert_eq!(exception.error.to_string(), "boom");

    // The job is not removed or paused by a callback error.
    let info = scheduler.job_info(&"flaky").unwrap();
    assert!(!info.is_paused());

    scheduler.dispose().await.unwrap();
}

#[tokio::test]
async fn unschedule_removes_the_job() {
    let scheduler: Scheduler<&'static str> = Scheduler::new();
    scheduler
        .schedule_job("once", |_ctx| Ok(()), vec![AnyTrigger::create("now").unwrap()])
        .unwrap();

    assert!(scheduler.job_info(&"once").is_ok());
    scheduler.unschedule_job(&"once").unwrap();
    assert!(scheduler.job_info(&"once").is_err());
    assert!(scheduler.unschedule_job(&"once").is_err());
}

#[tokio::test]
async fn scheduling_a_duplicate_key_is_rejected() {
    let scheduler: Scheduler<&'static str> = Scheduler::new();
    scheduler
        .schedule_job("dup", |_ctx| Ok(()), vec![AnyTrigger::create("manual").unwrap()])
        .unwrap();

    let result = scheduler.schedule_job("dup", |_ctx| Ok(()), vec![AnyTrigger::create("manual").unwrap()]);
    assert!(result.is_err());
}

#[tokio::test]
async fn start_and_stop_are_idempotent() {
    let scheduler: Scheduler<&'static str> = Scheduler::new();
    assert!(!scheduler.is_running());
    scheduler.start().unwrap();
    assert!(scheduler.is_running());
    scheduler.start().unwrap();
    assert!(scheduler.is_running());
    scheduler.stop().await.unwrap();
    assert!(!scheduler.is_running());
    scheduler.stop().await.unwrap();
    assert!(!scheduler.is_running());
}

#[tokio::test]
async fn dispose_rejects_further_operations() {
    let scheduler: Scheduler<&'static str> = Scheduler::new();
    scheduler
        .schedule_job("job", |_ctx| Ok(()), vec![AnyTrigger::create("manual").unwrap()])
        .unwrap();
    scheduler.dispose().await.unwrap();

    assert!(scheduler.job_info(&"job").is_err());
    assert!(scheduler
        .schedule_job("another", |_ctx| Ok(()), vec![AnyTrigger::create("manual").unwrap()])
        .is_err());
    assert!(scheduler.start().is_err());
}

#[tokio::test]
async fn adding_a_trigger_can_resurrect_an_otherwise_exhausted_job() {
    let scheduler: Scheduler<&'static str> = Scheduler::new();
    let counter = Arc::new(AtomicU32::new(0));
    let c = Arc::clone(&counter);

    scheduler
        .schedule_job(
            "one-shot",
            move |_ctx| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            vec![AnyTrigger::create("now").unwrap()],
        )
        .unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let info = scheduler.job_info(&"one-shot").unwrap();
    assert!(info.scheduled_fire_time().is_none(), "a fired now-trigger has nothing left to schedule");

    info.add_trigger(AnyTrigger::create(EVERY_SECOND).unwrap()).await;
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(counter.load(Ordering::SeqCst) >= 2);

    scheduler.dispose().await.unwrap();
}
