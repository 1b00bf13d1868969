//! Bounded worker pool for the steps of one phase.
//!
//! The pool owns a fixed set of long-lived threads, created once per run and
//! reused for every phase. Each step is handed to a worker as a job; the job
//! runs the step through the [`RetryPolicy`] and sends the finished
//! [`StepResult`] back over a channel. Only the calling thread (the
//! aggregator) writes into the result slots, so collection is deterministic:
//! results come back in declaration order regardless of completion order.
//!
//! Every attempt runs on its own short-lived thread so the worker can enforce
//! a per-attempt timeout and the cancellation grace period without blocking
//! sibling workers. A timed-out attempt is cancelled and joined before the
//! next one starts, so one step never has two attempts alive at once.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use crate::error::{PipelineError, Result};
use crate::steps::{
    OperationContext, OperationError, OperationOutcome, Step, StepResult, StepStatus, DRY_RUN_KEY,
};

use super::cancel::CancellationToken;
use super::retry::RetryPolicy;

/// How often a waiting worker checks for timeout and cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Run-wide settings every step of a phase is executed with.
#[derive(Debug, Clone)]
pub struct StepContext {
    /// Identifier of the pipeline run.
    pub run_id: String,
    /// Phase whose steps are being run.
    pub phase_id: String,
    /// Replace `execute` with `probe`.
    pub dry_run: bool,
    /// Retry policy applied to every step.
    pub retry: RetryPolicy,
    /// Per-attempt timeout for steps that do not set their own.
    pub default_timeout: Option<Duration>,
    /// How long an in-flight attempt may keep running after cancellation.
    pub grace_period: Duration,
    /// Global run cancellation.
    pub cancel: CancellationToken,
}

/// A fixed-size pool of worker threads.
pub struct WorkerPool {
    size: usize,
    sender: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    completed: Arc<AtomicUsize>,
}

impl WorkerPool {
    /// Spawn `size` worker threads.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(PipelineError::ConfigValidationError {
                message: "worker pool needs at least one thread".to_string(),
            });
        }

        let (sender, receiver) = mpsc::channel::<Job>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let receiver = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("phaseline-worker-{}", index))
                .spawn(move || worker_loop(receiver))?;
            workers.push(handle);
        }

        debug!(size, "Worker pool started");

        Ok(Self {
            size,
            sender: Some(sender),
            workers,
            completed: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Steps finished by this pool so far, across all phases.
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Run the steps of one phase with at most `concurrency_limit` in flight.
    ///
    /// The limit is clamped to `1..=size`; `None` means the pool size.
    /// Steps marked `skip` are recorded as Skipped without being dispatched.
    /// Once `ctx.cancel` fires no new step is dispatched and undispatched
    /// steps are recorded as cancelled. `on_result` is called on the calling
    /// thread as each result arrives, in completion order; the returned
    /// vector is in declaration order.
    pub fn run_phase_steps<F>(
        &self,
        steps: &[Step],
        concurrency_limit: Option<usize>,
        ctx: &StepContext,
        mut on_result: F,
    ) -> Vec<StepResult>
    where
        F: FnMut(&StepResult),
    {
        let limit = concurrency_limit.unwrap_or(self.size).clamp(1, self.size);
        let mut slots: Vec<Option<StepResult>> = vec![None; steps.len()];
        let (tx, rx) = mpsc::channel::<(usize, StepResult)>();

        let mut next = 0;
        let mut in_flight = 0;

        loop {
            while in_flight < limit && next < steps.len() {
                let index = next;
                next += 1;
                let step = &steps[index];

                let immediate = if step.skip {
                    debug!(phase = %ctx.phase_id, step = %step.id, "Step skipped");
                    Some(StepResult::skipped(&step.id))
                } else if ctx.cancel.is_cancelled() {
                    Some(
                        StepResult::not_started(
                            &step.id,
                            OperationError::cancelled("run cancelled before the step started"),
                        )
                        .with_idempotent(step.idempotent),
                    )
                } else {
                    match self.dispatch(index, step, ctx, &tx) {
                        Ok(()) => {
                            in_flight += 1;
                            None
                        }
                        Err(err) => Some(
                            StepResult::not_started(&step.id, err)
                                .with_idempotent(step.idempotent),
                        ),
                    }
                };

                if let Some(result) = immediate {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    on_result(&result);
                    slots[index] = Some(result);
                }
            }

            if in_flight == 0 {
                break;
            }

            match rx.recv() {
                Ok((index, result)) => {
                    in_flight -= 1;
                    on_result(&result);
                    slots[index] = Some(result);
                }
                Err(_) => break,
            }
        }

        slots
            .into_iter()
            .zip(steps)
            .map(|(slot, step)| {
                slot.unwrap_or_else(|| {
                    StepResult::not_started(
                        &step.id,
                        OperationError::fatal("worker exited without reporting a result"),
                    )
                })
            })
            .collect()
    }

    fn dispatch(
        &self,
        index: usize,
        step: &Step,
        ctx: &StepContext,
        results: &Sender<(usize, StepResult)>,
    ) -> std::result::Result<(), OperationError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| OperationError::fatal("worker pool is shut down"))?;

        let step = step.clone();
        let ctx = ctx.clone();
        let results = results.clone();
        let completed = Arc::clone(&self.completed);

        debug!(phase = %ctx.phase_id, step = %step.id, "Dispatching step");

        let job: Job = Box::new(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| run_step(&step, &ctx)))
                .unwrap_or_else(|_| {
                    StepResult::not_started(
                        &step.id,
                        OperationError::fatal("step panicked outside its operation"),
                    )
                    .with_idempotent(step.idempotent)
                });
            completed.fetch_add(1, Ordering::SeqCst);
            let _ = results.send((index, result));
        });

        sender
            .send(job)
            .map_err(|_| OperationError::fatal("worker pool is shut down"))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel ends every worker loop.
        drop(self.sender.take());
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("completed", &self.completed())
            .finish()
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Job>>>) {
    loop {
        let job = {
            let guard = receiver.lock().unwrap_or_else(|p| p.into_inner());
            guard.recv()
        };
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

/// Run one step to completion through the retry policy.
fn run_step(step: &Step, ctx: &StepContext) -> StepResult {
    let timeout = step.timeout.or(ctx.default_timeout);
    let result = ctx
        .retry
        .execute(&step.id, step.retryable, &ctx.cancel, |attempt| {
            run_attempt(step, ctx, attempt, timeout)
        })
        .with_idempotent(step.idempotent);

    if result.status() == StepStatus::Failed {
        if let Some(err) = result.error() {
            error!(
                phase = %ctx.phase_id,
                step = %step.id,
                attempts = result.attempts(),
                "Step failed: {}",
                err
            );
        }
    }

    result
}

/// Run a single attempt on its own thread, enforcing timeout and grace period.
fn run_attempt(
    step: &Step,
    ctx: &StepContext,
    attempt: u32,
    timeout: Option<Duration>,
) -> OperationOutcome {
    if ctx.cancel.is_cancelled() {
        return Err(OperationError::cancelled(format!(
            "run cancelled before attempt {}",
            attempt
        )));
    }

    let attempt_cancel = CancellationToken::new();
    let op_ctx = OperationContext {
        run_id: ctx.run_id.clone(),
        phase_id: ctx.phase_id.clone(),
        step_id: step.id.clone(),
        attempt,
        dry_run: ctx.dry_run,
        params: step.params.clone(),
        cancel: attempt_cancel.clone(),
    };
    let operation = Arc::clone(&step.operation);
    let dry_run = ctx.dry_run;
    let (tx, rx) = mpsc::channel::<OperationOutcome>();

    let spawned = thread::Builder::new()
        .name(format!("phaseline-step-{}", step.id))
        .spawn(move || {
            let outcome = if dry_run {
                operation.probe(&op_ctx)
            } else {
                operation.execute(&op_ctx)
            };
            let _ = tx.send(outcome);
        });

    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            return Err(OperationError::fatal(format!(
                "failed to start attempt thread: {}",
                e
            )));
        }
    };

    let started = Instant::now();
    let mut cancelled_at: Option<Instant> = None;

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(outcome) => {
                let _ = handle.join();
                return outcome.map(|mut metrics| {
                    if dry_run {
                        metrics.insert(DRY_RUN_KEY.to_string(), true.into());
                    }
                    metrics
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                return Err(OperationError::fatal("operation panicked"));
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        if let Some(limit) = timeout {
            if started.elapsed() >= limit {
                attempt_cancel.cancel();
                warn!(
                    phase = %ctx.phase_id,
                    step = %step.id,
                    attempt,
                    timeout_secs = limit.as_secs_f64(),
                    "Attempt timed out"
                );
                let error = OperationError::timeout(limit);
                return wait_for_stop(handle, &rx, ctx.grace_period, error);
            }
        }

        if ctx.cancel.is_cancelled() {
            let since = *cancelled_at.get_or_insert_with(Instant::now);
            if since.elapsed() >= ctx.grace_period {
                attempt_cancel.cancel();
                return Err(OperationError::cancelled(format!(
                    "run cancelled; step did not finish within the {}s grace period",
                    ctx.grace_period.as_secs()
                )));
            }
        }
    }
}

/// Wait up to `grace` for a cancelled attempt's thread to stop.
///
/// If it stops in time the attempt fails with `error`. If it is still running
/// it is abandoned and the failure becomes fatal, so the step is never
/// retried while an earlier attempt is alive.
fn wait_for_stop(
    handle: JoinHandle<()>,
    rx: &Receiver<OperationOutcome>,
    grace: Duration,
    error: OperationError,
) -> OperationOutcome {
    match rx.recv_timeout(grace) {
        Ok(_) | Err(RecvTimeoutError::Disconnected) => {
            let _ = handle.join();
            Err(error)
        }
        Err(RecvTimeoutError::Timeout) => {
            warn!(
                grace_ms = grace.as_millis() as u64,
                "Attempt ignored cancellation; abandoning it"
            );
            Err(OperationError::fatal(format!(
                "{}; still running after the {}ms grace period",
                error.message,
                grace.as_millis()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{from_fn, ErrorKind, Metrics};

    fn context() -> StepContext {
        StepContext {
            run_id: "run_test".to_string(),
            phase_id: "export".to_string(),
            dry_run: false,
            retry: RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2))
                .with_jitter(false),
            default_timeout: None,
            grace_period: Duration::from_millis(50),
            cancel: CancellationToken::new(),
        }
    }

    fn sleeping(id: &str, millis: u64) -> Step {
        Step::new(
            id,
            from_fn("sleep", move |_: &OperationContext| {
                thread::sleep(Duration::from_millis(millis));
                Ok(Metrics::new())
            }),
        )
    }

    /// A step that waits up to `millis` but stops as soon as its attempt is cancelled.
    fn cooperative(
        id: &str,
        millis: u64,
        active: &Arc<AtomicUsize>,
        peak: &Arc<AtomicUsize>,
    ) -> Step {
        let active = Arc::clone(active);
        let peak = Arc::clone(peak);
        Step::new(
            id,
            from_fn("wait", move |ctx: &OperationContext| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                ctx.cancel.wait_timeout(Duration::from_millis(millis));
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(Metrics::new())
            }),
        )
    }

    fn counters() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)))
    }

    #[test]
    fn zero_size_pool_is_rejected() {
        assert!(WorkerPool::new(0).is_err());
    }

    #[test]
    fn results_follow_declaration_order() {
        let pool = WorkerPool::new(4).unwrap();
        let steps = vec![
            sleeping("slow", 120),
            sleeping("fast", 1),
            sleeping("medium", 40),
        ];

        let mut seen = Vec::new();
        let results = pool.run_phase_steps(&steps, None, &context(), |r| {
            seen.push(r.step_id().to_string())
        });

        let ids: Vec<&str> = results.iter().map(|r| r.step_id()).collect();
        assert_eq!(ids, vec!["slow", "fast", "medium"]);
        assert_eq!(seen.first().map(String::as_str), Some("fast"));
        assert_eq!(pool.completed(), 3);
    }

    #[test]
    fn concurrency_limit_is_respected() {
        let pool = WorkerPool::new(4).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let steps: Vec<Step> = (0..6)
            .map(|i| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                Step::new(
                    format!("s{}", i),
                    from_fn("track", move |_: &OperationContext| {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(Metrics::new())
                    }),
                )
            })
            .collect();

        let results = pool.run_phase_steps(&steps, Some(2), &context(), |_| {});
        assert_eq!(results.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn failure_does_not_cancel_siblings() {
        let pool = WorkerPool::new(2).unwrap();
        let steps = vec![
            Step::new(
                "broken",
                from_fn("fail", |_: &OperationContext| {
                    Err(OperationError::fatal("bad schema"))
                }),
            ),
            sleeping("healthy", 30),
        ];

        let results = pool.run_phase_steps(&steps, None, &context(), |_| {});
        assert_eq!(results[0].status(), StepStatus::Failed);
        assert_eq!(results[1].status(), StepStatus::Succeeded);
    }

    #[test]
    fn skipped_steps_are_not_dispatched() {
        let pool = WorkerPool::new(2).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let steps = vec![Step::new(
            "summary_tables",
            from_fn("count", move |_: &OperationContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Metrics::new())
            }),
        )
        .skipped()];

        let results = pool.run_phase_steps(&steps, None, &context(), |_| {});
        assert_eq!(results[0].status(), StepStatus::Skipped);
        assert_eq!(results[0].attempts(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn timeout_fails_attempt_without_blocking_others() {
        let pool = WorkerPool::new(2).unwrap();
        let mut ctx = context();
        ctx.retry = RetryPolicy::no_retry();

        let (active, peak) = counters();
        let steps = vec![
            cooperative("hung", 2_000, &active, &peak).with_timeout(Duration::from_millis(50)),
            sleeping("quick", 1),
        ];

        let start = Instant::now();
        let results = pool.run_phase_steps(&steps, None, &ctx, |_| {});

        assert!(start.elapsed() < Duration::from_millis(1_500));
        assert_eq!(results[0].status(), StepStatus::Failed);
        assert_eq!(results[0].error().unwrap().kind, ErrorKind::Timeout);
        assert_eq!(results[1].status(), StepStatus::Succeeded);
    }

    #[test]
    fn results_carry_idempotent_flag() {
        let pool = WorkerPool::new(1).unwrap();
        let steps = vec![
            Step::new(
                "reload",
                from_fn("fail", |_: &OperationContext| {
                    Err(OperationError::fatal("locked"))
                }),
            )
            .idempotent(true),
            sleeping("append", 1),
        ];

        let results = pool.run_phase_steps(&steps, None, &context(), |_| {});
        assert!(results[0].is_idempotent());
        assert!(!results[1].is_idempotent());
    }

    #[test]
    fn timeout_consumes_one_attempt() {
        let pool = WorkerPool::new(1).unwrap();
        let (active, peak) = counters();
        let steps =
            vec![cooperative("hung", 500, &active, &peak).with_timeout(Duration::from_millis(30))];

        let results = pool.run_phase_steps(&steps, None, &context(), |_| {});
        assert_eq!(results[0].attempts(), 3);
        assert_eq!(results[0].error().unwrap().kind, ErrorKind::Timeout);
    }

    #[test]
    fn timed_out_attempts_never_overlap() {
        let pool = WorkerPool::new(1).unwrap();
        let (active, peak) = counters();
        let steps =
            vec![cooperative("hung", 300, &active, &peak).with_timeout(Duration::from_millis(40))];

        let results = pool.run_phase_steps(&steps, None, &context(), |_| {});
        assert_eq!(results[0].attempts(), 3);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn attempt_ignoring_cancellation_is_not_retried() {
        let pool = WorkerPool::new(1).unwrap();
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let steps = vec![Step::new(
            "stubborn",
            from_fn("sleep", move |_: &OperationContext| {
                let now = a.fetch_add(1, Ordering::SeqCst) + 1;
                p.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(300));
                a.fetch_sub(1, Ordering::SeqCst);
                Ok(Metrics::new())
            }),
        )
        .with_timeout(Duration::from_millis(40))];

        let results = pool.run_phase_steps(&steps, None, &context(), |_| {});
        let error = results[0].error().unwrap();
        assert_eq!(results[0].attempts(), 1);
        assert_eq!(error.kind, ErrorKind::Fatal);
        assert!(error.message.contains("grace period"));
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dry_run_probes_instead_of_executing() {
        let pool = WorkerPool::new(2).unwrap();
        let mut ctx = context();
        ctx.dry_run = true;

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let steps = vec![Step::new(
            "export",
            from_fn("count", move |_: &OperationContext| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Metrics::new())
            }),
        )];

        let results = pool.run_phase_steps(&steps, None, &ctx, |_| {});
        assert_eq!(results[0].status(), StepStatus::Succeeded);
        assert!(results[0].is_dry_run());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_run_dispatches_nothing() {
        let pool = WorkerPool::new(2).unwrap();
        let ctx = context();
        ctx.cancel.cancel();

        let steps = vec![sleeping("a", 1), sleeping("b", 1)];
        let results = pool.run_phase_steps(&steps, None, &ctx, |_| {});

        for result in &results {
            assert_eq!(result.attempts(), 0);
            assert_eq!(result.error().unwrap().kind, ErrorKind::Cancelled);
        }
    }

    #[test]
    fn in_flight_step_stopped_after_grace_period() {
        let pool = WorkerPool::new(1).unwrap();
        let ctx = context();
        let cancel = ctx.cancel.clone();

        let steps = vec![sleeping("long", 2_000)];
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            cancel.cancel();
        });

        let start = Instant::now();
        let results = pool.run_phase_steps(&steps, None, &ctx, |_| {});
        canceller.join().unwrap();

        assert!(start.elapsed() < Duration::from_millis(1_500));
        assert_eq!(results[0].error().unwrap().kind, ErrorKind::Cancelled);
    }

    #[test]
    fn panicking_operation_is_a_fatal_failure() {
        let pool = WorkerPool::new(1).unwrap();
        let steps = vec![Step::new(
            "boom",
            from_fn("panic", |_: &OperationContext| -> OperationOutcome {
                panic!("operation blew up")
            }),
        )];

        let results = pool.run_phase_steps(&steps, None, &context(), |_| {});
        assert_eq!(results[0].status(), StepStatus::Failed);
        assert_eq!(results[0].error().unwrap().kind, ErrorKind::Fatal);

        // Pool still usable afterwards.
        let again = pool.run_phase_steps(&[sleeping("ok", 1)], None, &context(), |_| {});
        assert_eq!(again[0].status(), StepStatus::Succeeded);
    }
}
