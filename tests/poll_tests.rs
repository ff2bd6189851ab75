//! Integration-level tests of the poll/progress runtime's public surface:
//! scheduling, logging, and cancellation semantics together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rfseeker::poll::{run, ManualFrames, PollStep, SchedulerKind};

#[tokio::test]
async fn manual_scheduler_advances_only_on_tick() {
    let frames = ManualFrames::new();
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_for_pred = counter.clone();

    let (_, fut) = run(SchedulerKind::Manual(frames.clone()), move |_progress| {
        let counter = counter_for_pred.clone();
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n >= 3 {
                Ok(PollStep::Done(n))
            } else {
                Ok(PollStep::Continue)
            }
        }
    })
    .await;

    let driver = tokio::spawn(async move {
        for _ in 0..6 {
            frames.tick();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    });

    let result = fut.await.unwrap();
    assert_eq!(result, 3);
    driver.await.unwrap();
}

#[tokio::test]
async fn progress_logs_are_drained_incrementally() {
    let (handle, fut) = run(SchedulerKind::Manual(ManualFrames::new()), |progress| async move {
        progress.log("looking for element").await;
        Ok::<_, rfseeker::Error>(PollStep::Done(()))
    })
    .await;

    fut.await.unwrap();
    let logs = handle.take_last_logs().await;
    assert_eq!(logs, vec!["looking for element".to_string()]);
}

#[tokio::test]
async fn cancel_before_completion_leaves_the_future_pending_forever() {
    let (handle, fut) = run(SchedulerKind::Manual(ManualFrames::new()), |_progress| async move {
        Ok::<_, rfseeker::Error>(PollStep::<()>::Continue)
    })
    .await;

    handle.cancel();
    assert!(handle.progress().is_aborted());

    let outcome = tokio::time::timeout(Duration::from_millis(50), fut).await;
    assert!(outcome.is_err(), "a cancelled poll must never resolve, not even with an error");
}

#[tokio::test]
async fn interval_scheduler_actually_waits_between_ticks() {
    let started = std::time::Instant::now();
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_for_pred = counter.clone();

    let (_, fut) = run(SchedulerKind::Interval(Duration::from_millis(20)), move |_progress| {
        let counter = counter_for_pred.clone();
        async move {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n >= 2 {
                Ok(PollStep::Done(()))
            } else {
                Ok(PollStep::Continue)
            }
        }
    })
    .await;

    fut.await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(40));
}
