//! Component D — the cooperative poll/progress runtime.
//!
//! A [`Poll`] drives a predicate on a schedule until it reports [`PollStep::Done`],
//! is cancelled, or fails. [`Progress`] is the protocol-level log stream the
//! caller can drain incrementally while the poll is in flight — distinct
//! from the ambient `log::debug!`/`log::warn!` calls elsewhere in this
//! crate, which are a host-process-local diagnostic channel and never cross
//! this boundary.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tokio::time::sleep;

use crate::error::Result;

/// What a poll predicate returns each tick.
#[derive(Debug, Clone)]
pub enum PollStep<T> {
    Continue,
    Done(T),
}

struct ProgressInner {
    logs: Vec<String>,
    last_log: Option<String>,
    last_intermediate: Option<String>,
    finished: bool,
    waiter: Option<oneshot::Sender<()>>,
}

/// Accumulates advisory log lines for a single in-flight poll and exposes
/// them to the host incrementally via [`Poll::take_next_logs`]/
/// [`Poll::take_last_logs`].
pub struct Progress {
    aborted: AtomicBool,
    inner: Mutex<ProgressInner>,
}

impl Progress {
    fn new() -> Arc<Self> {
        Arc::new(Progress {
            aborted: AtomicBool::new(false),
            inner: Mutex::new(ProgressInner { logs: Vec::new(), last_log: None, last_intermediate: None, finished: false, waiter: None }),
        })
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub async fn log(&self, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.inner.lock().await;
        inner.logs.push(message.clone());
        inner.last_log = Some(message);
        if let Some(waiter) = inner.waiter.take() {
            let _ = waiter.send(());
        }
    }

    /// Like [`Progress::log`], but suppressed if the last emitted message is
    /// identical (invariant 6 — log monotonicity).
    pub async fn log_repeating(&self, message: impl Into<String>) {
        let message = message.into();
        let mut inner = self.inner.lock().await;
        if inner.last_log.as_deref() == Some(message.as_str()) {
            return;
        }
        inner.logs.push(message.clone());
        inner.last_log = Some(message);
        if let Some(waiter) = inner.waiter.take() {
            let _ = waiter.send(());
        }
    }

    /// Publishes the current best-effort received value for an in-progress
    /// assertion; suppressed if unchanged from the last call.
    pub async fn set_intermediate_result(&self, value: impl Into<String>) {
        let value = value.into();
        let mut inner = self.inner.lock().await;
        if inner.last_intermediate.as_deref() == Some(value.as_str()) {
            return;
        }
        let message = format!("  - intermediate value: {value}");
        inner.last_intermediate = Some(value);
        inner.logs.push(message.clone());
        inner.last_log = Some(message);
        if let Some(waiter) = inner.waiter.take() {
            let _ = waiter.send(());
        }
    }

    async fn mark_finished(&self) {
        let mut inner = self.inner.lock().await;
        inner.finished = true;
        if let Some(waiter) = inner.waiter.take() {
            let _ = waiter.send(());
        }
    }
}

/// Frame/tick source driving poll cadence.
pub enum FrameScheduler {
    /// Stands in for a real animation frame (this crate's host process has
    /// no compositor); always a 16ms timer regardless of
    /// `CoreConfig::replace_raf_with_timeout`, which only changes the
    /// diagnostic label below.
    Raf { replace_raf_with_timeout: bool },
    Interval(Duration),
    /// 100ms, 250ms, 500ms, then 1000ms repeating.
    LogScale,
    /// Caller-driven ticks for deterministic tests — see [`ManualFrames`].
    Manual(ManualFrames),
}

impl FrameScheduler {
    pub fn label(&self) -> &'static str {
        match self {
            FrameScheduler::Raf { replace_raf_with_timeout: false } => "raf",
            FrameScheduler::Raf { replace_raf_with_timeout: true } => "timeout",
            FrameScheduler::Interval(_) => "interval",
            FrameScheduler::LogScale => "log-scale",
            FrameScheduler::Manual(_) => "manual",
        }
    }
}

/// `FrameScheduler::LogScale` needs per-call state (which step it's on), so
/// it's modeled as its own small driver rather than folded into the enum
/// match above.
struct LogScaleState {
    step: usize,
}

impl LogScaleState {
    const STEPS_MS: [u64; 4] = [100, 250, 500, 1000];

    fn new() -> Self {
        LogScaleState { step: 0 }
    }

    async fn wait_tick(&mut self) {
        let ms = Self::STEPS_MS[self.step.min(Self::STEPS_MS.len() - 1)];
        if self.step < Self::STEPS_MS.len() - 1 {
            self.step += 1;
        }
        sleep(Duration::from_millis(ms)).await;
    }
}

/// A `Notify`-backed frame source a test can drive synchronously, for
/// deterministic frame-count control (e.g. the stability-wait tests).
#[derive(Clone)]
pub struct ManualFrames {
    notify: Arc<tokio::sync::Notify>,
}

impl ManualFrames {
    pub fn new() -> Self {
        ManualFrames { notify: Arc::new(tokio::sync::Notify::new()) }
    }

    /// Releases exactly one pending `wait_tick`.
    pub fn tick(&self) {
        self.notify.notify_one();
    }

    async fn wait(&self) {
        self.notify.notified().await;
    }
}

impl Default for ManualFrames {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to a running poll. `cancel()` sets `progress.aborted`; the next
/// scheduled tick returns without resuming the predicate, and the poll's
/// `run()` future becomes permanently pending rather than settling (see
/// invariant 5).
pub struct PollHandle {
    progress: Arc<Progress>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.progress.aborted.store(true, Ordering::SeqCst);
    }

    pub fn progress(&self) -> Arc<Progress> {
        self.progress.clone()
    }

    /// Blocks until a new log entry arrives or the poll finishes, whichever
    /// comes first. Only one waiter is honored at a time; a new call's
    /// internal oneshot supersedes any prior waiter. After the poll has
    /// finished, resolves immediately with the remaining buffered logs
    /// (possibly empty).
    pub async fn take_next_logs(&self) -> Vec<String> {
        let rx = {
            let mut inner = self.progress.inner.lock().await;
            if inner.finished || !inner.logs.is_empty() {
                return std::mem::take(&mut inner.logs);
            }
            let (tx, rx) = oneshot::channel();
            inner.waiter = Some(tx);
            rx
        };
        let _ = rx.await;
        let mut inner = self.progress.inner.lock().await;
        std::mem::take(&mut inner.logs)
    }

    /// Non-blocking drain of whatever logs have accumulated so far.
    pub async fn take_last_logs(&self) -> Vec<String> {
        let mut inner = self.progress.inner.lock().await;
        std::mem::take(&mut inner.logs)
    }
}

/// Runs `predicate` to completion under `scheduler`. `predicate` receives a
/// handle to the shared [`Progress`] each tick.
///
/// If the poll is cancelled via the returned [`PollHandle`] before this
/// future resolves, the future never resolves — callers must drop it
/// themselves, mirroring a promise that is never settled.
pub async fn run<T, F, Fut>(scheduler_kind: SchedulerKind, mut predicate: F) -> (PollHandle, impl Future<Output = Result<T>>)
where
    F: FnMut(Arc<Progress>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<PollStep<T>>> + Send,
    T: Send + 'static,
{
    let progress = Progress::new();
    let handle = PollHandle { progress: progress.clone() };
    let task_progress = progress.clone();

    let fut = async move {
        let mut log_scale = LogScaleState::new();
        loop {
            if task_progress.is_aborted() {
                std::future::pending::<()>().await;
                unreachable!();
            }
            let step = predicate(task_progress.clone()).await;
            match step {
                Ok(PollStep::Done(value)) => {
                    task_progress.mark_finished().await;
                    return Ok(value);
                }
                Ok(PollStep::Continue) => {
                    if task_progress.is_aborted() {
                        std::future::pending::<()>().await;
                        unreachable!();
                    }
                    match &scheduler_kind {
                        SchedulerKind::LogScale => log_scale.wait_tick().await,
                        SchedulerKind::Raf { .. } => sleep(Duration::from_millis(16)).await,
                        SchedulerKind::Interval(d) => sleep(*d).await,
                        SchedulerKind::Manual(frames) => frames.wait().await,
                    }
                }
                Err(e) => {
                    task_progress.log(format!("  {e}")).await;
                    task_progress.mark_finished().await;
                    return Err(e);
                }
            }
        }
    };

    (handle, fut)
}

/// Picklable description of which scheduler to drive a poll with; kept
/// separate from [`FrameScheduler`] so `run` doesn't need to own a `&mut`
/// scheduler across an `async move` boundary.
pub enum SchedulerKind {
    Raf { replace_raf_with_timeout: bool },
    Interval(Duration),
    LogScale,
    Manual(ManualFrames),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_on_done() {
        let (_, fut) = run(SchedulerKind::Manual(ManualFrames::new()), |_progress| async move { Ok(PollStep::Done(42)) }).await;
        let result: Result<i32> = fut.await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn retries_until_done() {
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let frames = ManualFrames::new();
        let frames_for_driver = frames.clone();
        let counter_for_pred = counter.clone();

        let (_, fut) = run(SchedulerKind::Manual(frames), move |_progress| {
            let counter = counter_for_pred.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n >= 2 {
                    Ok(PollStep::Done(n))
                } else {
                    Ok(PollStep::Continue)
                }
            }
        })
        .await;

        let driver = tokio::spawn(async move {
            for _ in 0..5 {
                frames_for_driver.tick();
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        });

        let result = fut.await.unwrap();
        assert_eq!(result, 2);
        driver.await.unwrap();
    }

    #[tokio::test]
    async fn log_repeating_suppresses_duplicates() {
        let progress = Progress::new();
        progress.log_repeating("waiting").await;
        progress.log_repeating("waiting").await;
        progress.log_repeating("ready").await;
        let mut inner = progress.inner.lock().await;
        assert_eq!(inner.logs.len(), 2);
        inner.logs.clear();
    }

    #[tokio::test]
    async fn set_intermediate_result_suppresses_unchanged() {
        let progress = Progress::new();
        progress.set_intermediate_result("a").await;
        progress.set_intermediate_result("a").await;
        progress.set_intermediate_result("b").await;
        let inner = progress.inner.lock().await;
        assert_eq!(inner.logs.len(), 2);
    }

    #[tokio::test]
    async fn cancellation_leaves_future_pending() {
        let (handle, fut) = run(SchedulerKind::Manual(ManualFrames::new()), |_progress| async move {
            Ok::<_, crate::error::Error>(PollStep::<()>::Continue)
        })
        .await;
        handle.cancel();
        let timed_out = tokio::time::timeout(Duration::from_millis(50), fut).await;
        assert!(timed_out.is_err(), "cancelled poll must never resolve");
    }
}
