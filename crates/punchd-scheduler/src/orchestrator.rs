//! One day's sign-in/sign-out cycle as an explicit state machine.
//!
//! The orchestrator owns `{ state, scheduled_event }` for the current
//! cycle. It never self-reschedules across days: the daemon initiates a new
//! cycle on the next eligible day, and the calendar check re-runs each time.

use std::sync::Arc;

use chrono::{Datelike, Duration, Local, NaiveDateTime};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use punchd_core::action::TimesheetActions;
use punchd_core::notify::Notifier;
use punchd_core::types::{ActionResult, EventKind, RetryPolicy, ScheduledEvent, TimeWindow};

use crate::calendar;
use crate::error::SchedulerError;
use crate::jitter::{self, RandomSource, ThreadRngSource, WaitOutcome};
use crate::retry::{run_with_retry, RetryOutcome};

/// Lifecycle of one day cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayState {
    Idle,
    AwaitingSignInWindow,
    SigningIn,
    AwaitingSignOutWindow,
    SigningOut,
    Done,
    Skipped,
    Failed,
    Aborted,
}

/// Terminal outcome of [`Orchestrator::run_day`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOutcome {
    /// Both actions confirmed.
    Completed,
    /// The day was outside the policy window at evaluation time.
    Skipped,
    /// Retries exhausted (or a policy violation) on either action.
    Failed,
    /// Shutdown was signalled mid-cycle.
    Aborted,
}

/// Wall-clock source, injectable for tests. Production uses local time.
pub type Clock = Box<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub struct Orchestrator {
    window: TimeWindow,
    jitter_minutes: u32,
    min_work: Duration,
    retry: RetryPolicy,
    actions: Arc<dyn TimesheetActions>,
    notifier: Arc<dyn Notifier>,
    rng: Box<dyn RandomSource>,
    clock: Clock,
    state: DayState,
    event: Option<ScheduledEvent>,
}

impl Orchestrator {
    pub fn new(
        window: TimeWindow,
        jitter_minutes: u32,
        min_work: Duration,
        retry: RetryPolicy,
        actions: Arc<dyn TimesheetActions>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            window,
            jitter_minutes,
            min_work,
            retry,
            actions,
            notifier,
            rng: Box::new(ThreadRngSource),
            clock: Box::new(|| Local::now().naive_local()),
            state: DayState::Idle,
            event: None,
        }
    }

    /// Replace the randomness source (tests pin the jitter offset).
    pub fn with_rng(mut self, rng: Box<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    /// Replace the wall-clock source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> DayState {
        self.state
    }

    /// The event currently scheduled (or last consumed) in this cycle.
    pub fn scheduled_event(&self) -> Option<&ScheduledEvent> {
        self.event.as_ref()
    }

    /// Execute one calendar-day cycle to a terminal state.
    pub async fn run_day(&mut self, shutdown: &mut watch::Receiver<bool>) -> DayOutcome {
        self.transition(DayState::Idle);
        self.event = None;

        let now = (self.clock)();
        if !calendar::is_within_active_window(now, &self.window) {
            info!(
                weekday = %now.weekday(),
                time = %now.time(),
                "outside the active window — skipping this day"
            );
            self.transition(DayState::Skipped);
            return DayOutcome::Skipped;
        }

        // Sign-in: a randomized instant inside the jitter window, based at
        // the window start, or at "now" when launched mid-window.
        let base = now.max(now.date().and_time(self.window.start));
        let target = jitter::pick_instant_in_window(base, self.jitter_minutes, self.rng.as_mut());
        self.event = Some(ScheduledEvent {
            kind: EventKind::SignIn,
            target,
        });
        self.transition(DayState::AwaitingSignInWindow);
        info!(target = %target, "sign-in scheduled");

        if self.wait_for(target, shutdown).await == WaitOutcome::Cancelled {
            return self.abort();
        }

        let result = match self.attempt(EventKind::SignIn, shutdown).await {
            Ok(result) => result,
            Err(outcome) => return outcome,
        };
        if !result.is_success() {
            return self.give_up(EventKind::SignIn, &result).await;
        }

        let signed_in_at = (self.clock)();
        info!(at = %signed_in_at, "sign-in confirmed");
        self.notify_result(EventKind::SignIn, signed_in_at, &result).await;

        // Only a confirmed sign-in gets a sign-out scheduled.
        let target = self.sign_out_target(signed_in_at);
        self.event = Some(ScheduledEvent {
            kind: EventKind::SignOut,
            target,
        });
        self.transition(DayState::AwaitingSignOutWindow);
        info!(target = %target, "sign-out scheduled");

        if self.wait_for(target, shutdown).await == WaitOutcome::Cancelled {
            return self.abort();
        }

        let result = match self.attempt(EventKind::SignOut, shutdown).await {
            Ok(result) => result,
            Err(outcome) => return outcome,
        };
        if !result.is_success() {
            return self.give_up(EventKind::SignOut, &result).await;
        }

        let signed_out_at = (self.clock)();
        info!(at = %signed_out_at, "sign-out confirmed");
        self.notify_result(EventKind::SignOut, signed_out_at, &result).await;

        self.transition(DayState::Done);
        DayOutcome::Completed
    }

    // --- private helpers ---------------------------------------------------

    /// Sign-out target: minimum work duration after the confirmed sign-in,
    /// jittered, never past the window end.
    ///
    /// When the minimum duration does not fit before the window closes, the
    /// sign-in is kept as-is and the sign-out clamps to a random instant in
    /// `[max(sign_in, end - jitter), end]`: a shorter day, never a punch
    /// outside the window.
    fn sign_out_target(&mut self, signed_in_at: NaiveDateTime) -> NaiveDateTime {
        let earliest = signed_in_at + self.min_work;
        let latest = signed_in_at.date().and_time(self.window.end);

        if earliest <= latest {
            let headroom = (latest - earliest).num_minutes().max(0) as u32;
            let bound = headroom.min(self.jitter_minutes);
            jitter::pick_instant_in_window(earliest, bound, self.rng.as_mut())
        } else {
            warn!(
                %earliest,
                window_end = %latest,
                "minimum work duration exceeds the window end — clamping sign-out"
            );
            let lower = signed_in_at.max(latest - Duration::minutes(self.jitter_minutes as i64));
            let span = (latest - lower).num_minutes().max(0) as u32;
            jitter::pick_instant_in_window(lower, span, self.rng.as_mut())
        }
    }

    async fn wait_for(
        &self,
        target: NaiveDateTime,
        shutdown: &mut watch::Receiver<bool>,
    ) -> WaitOutcome {
        let delay = jitter::delay_until(target, (self.clock)());
        jitter::wait_until_cancellable(delay, shutdown).await
    }

    /// Run one action through the retry runner, with a policy re-check
    /// first. `Err` carries the terminal outcome (violation or shutdown).
    async fn attempt(
        &mut self,
        kind: EventKind,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ActionResult, DayOutcome> {
        self.transition(match kind {
            EventKind::SignIn => DayState::SigningIn,
            EventKind::SignOut => DayState::SigningOut,
        });

        let now = (self.clock)();
        if !self.action_permitted(kind, now) {
            let err = SchedulerError::PolicyViolation { event: kind, at: now };
            error!(%err, "refusing to run an action outside its window");
            self.notifier
                .notify("punchd: policy violation", &err.to_string())
                .await;
            self.transition(DayState::Failed);
            return Err(DayOutcome::Failed);
        }

        let actions = Arc::clone(&self.actions);
        let outcome = match kind {
            EventKind::SignIn => {
                run_with_retry(
                    || {
                        let actions = Arc::clone(&actions);
                        async move { actions.sign_in().await }
                    },
                    &self.retry,
                    shutdown,
                )
                .await
            }
            EventKind::SignOut => {
                run_with_retry(
                    || {
                        let actions = Arc::clone(&actions);
                        async move { actions.sign_out().await }
                    },
                    &self.retry,
                    shutdown,
                )
                .await
            }
        };

        match outcome {
            RetryOutcome::Finished(result) => Ok(result),
            RetryOutcome::Cancelled => Err(self.abort()),
        }
    }

    /// Sign-in re-checks the full active window. Sign-out only enforces the
    /// weekday and the lower bound: the clamp may target the window end
    /// exactly, and retry backoff may run slightly past it. Refusing to
    /// punch out then would strand a confirmed sign-in.
    fn action_permitted(&self, kind: EventKind, now: NaiveDateTime) -> bool {
        match kind {
            EventKind::SignIn => calendar::is_within_active_window(now, &self.window),
            EventKind::SignOut => {
                self.window.weekdays.contains(&now.weekday()) && now.time() >= self.window.start
            }
        }
    }

    async fn notify_result(&self, kind: EventKind, at: NaiveDateTime, result: &ActionResult) {
        let subject = match kind {
            EventKind::SignIn => "punchd: signed in",
            EventKind::SignOut => "punchd: signed out",
        };
        let body = match result.detail.as_deref() {
            Some(detail) => format!("{kind} confirmed at {at} ({detail})"),
            None => format!("{kind} confirmed at {at}"),
        };
        self.notifier.notify(subject, &body).await;
    }

    async fn give_up(&mut self, kind: EventKind, result: &ActionResult) -> DayOutcome {
        let detail = result.detail.as_deref().unwrap_or("no detail");
        error!(
            kind = %kind,
            attempts = self.retry.max_attempts,
            detail,
            "retries exhausted — giving up for today"
        );
        self.notifier
            .notify(
                &format!("punchd: {kind} failed"),
                &format!(
                    "All {} attempts failed: {detail}",
                    self.retry.max_attempts
                ),
            )
            .await;
        self.transition(DayState::Failed);
        DayOutcome::Failed
    }

    fn abort(&mut self) -> DayOutcome {
        info!("shutdown requested — aborting the current cycle");
        self.transition(DayState::Aborted);
        DayOutcome::Aborted
    }

    fn transition(&mut self, next: DayState) {
        debug!(from = ?self.state, to = ?next, "state transition");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration as StdDuration;

    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime, Weekday};

    use crate::jitter::FixedSource;

    struct ScriptedActions {
        sign_in_results: Mutex<VecDeque<ActionResult>>,
        sign_out_results: Mutex<VecDeque<ActionResult>>,
        sign_in_calls: AtomicU32,
        sign_out_calls: AtomicU32,
    }

    impl ScriptedActions {
        fn new(sign_in: Vec<ActionResult>, sign_out: Vec<ActionResult>) -> Arc<Self> {
            Arc::new(Self {
                sign_in_results: Mutex::new(sign_in.into()),
                sign_out_results: Mutex::new(sign_out.into()),
                sign_in_calls: AtomicU32::new(0),
                sign_out_calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl TimesheetActions for ScriptedActions {
        async fn sign_in(&self) -> ActionResult {
            self.sign_in_calls.fetch_add(1, Ordering::SeqCst);
            self.sign_in_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ActionResult::failure("script exhausted"))
        }

        async fn sign_out(&self) -> ActionResult {
            self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
            self.sign_out_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ActionResult::failure("script exhausted"))
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, subject: &str, body: &str) {
            self.messages
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string()));
        }
    }

    fn weekday_window() -> TimeWindow {
        TimeWindow {
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            weekdays: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
        }
    }

    fn at(d: u32, h: u32, min: u32) -> NaiveDateTime {
        // June 2025: the 2nd is a Monday, the 7th a Saturday.
        NaiveDate::from_ymd_opt(2025, 6, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    /// Clock that starts at `start` and moves with (paused) tokio time, so
    /// scheduler waits advance the wall clock the orchestrator observes.
    fn advancing_clock(start: NaiveDateTime) -> Clock {
        let t0 = tokio::time::Instant::now();
        Box::new(move || start + Duration::from_std(t0.elapsed()).unwrap())
    }

    fn orchestrator(
        actions: Arc<ScriptedActions>,
        notifier: Arc<RecordingNotifier>,
        min_work_minutes: i64,
        max_attempts: u32,
    ) -> Orchestrator {
        Orchestrator::new(
            weekday_window(),
            30,
            Duration::minutes(min_work_minutes),
            RetryPolicy {
                max_attempts,
                backoff: StdDuration::from_secs(60),
            },
            actions,
            notifier,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn full_day_completes_with_minimum_duration_respected() {
        let actions = ScriptedActions::new(
            vec![ActionResult::success_with("as Jane")],
            vec![ActionResult::success()],
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let (_tx, mut rx) = watch::channel(false);

        let mut orch = orchestrator(Arc::clone(&actions), Arc::clone(&notifier), 480, 3)
            .with_rng(Box::new(FixedSource(0)))
            .with_clock(advancing_clock(at(2, 9, 5)));

        let outcome = orch.run_day(&mut rx).await;

        assert_eq!(outcome, DayOutcome::Completed);
        assert_eq!(orch.state(), DayState::Done);
        assert_eq!(actions.sign_in_calls.load(Ordering::SeqCst), 1);
        assert_eq!(actions.sign_out_calls.load(Ordering::SeqCst), 1);

        // Sign-in fired at 09:05 (zero jitter); sign-out 8h later at 17:05.
        let event = orch.scheduled_event().unwrap();
        assert_eq!(event.kind, EventKind::SignOut);
        assert_eq!(event.target, at(2, 17, 5));

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, "punchd: signed in");
        assert_eq!(messages[1].0, "punchd: signed out");
    }

    #[tokio::test(start_paused = true)]
    async fn sign_out_clamps_to_window_end_when_minimum_does_not_fit() {
        let actions = ScriptedActions::new(
            vec![ActionResult::success()],
            vec![ActionResult::success()],
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let (_tx, mut rx) = watch::channel(false);

        // Sign-in at 09:10 + 9h minimum = 18:10, past the 18:00 window end.
        let mut orch = orchestrator(Arc::clone(&actions), Arc::clone(&notifier), 540, 3)
            .with_rng(Box::new(FixedSource(0)))
            .with_clock(advancing_clock(at(2, 9, 10)));

        let outcome = orch.run_day(&mut rx).await;

        assert_eq!(outcome, DayOutcome::Completed);
        let event = orch.scheduled_event().unwrap();
        assert_eq!(event.kind, EventKind::SignOut);
        // Clamped into [17:30, 18:00]; zero jitter picks the lower bound.
        assert_eq!(event.target, at(2, 17, 30));
        assert!(event.target <= at(2, 18, 0));
    }

    #[tokio::test(start_paused = true)]
    async fn weekend_is_skipped_without_touching_the_portal() {
        let actions = ScriptedActions::new(vec![], vec![]);
        let notifier = Arc::new(RecordingNotifier::default());
        let (_tx, mut rx) = watch::channel(false);

        let mut orch = orchestrator(Arc::clone(&actions), Arc::clone(&notifier), 480, 3)
            .with_clock(advancing_clock(at(7, 10, 0)));

        let outcome = orch.run_day(&mut rx).await;

        assert_eq!(outcome, DayOutcome::Skipped);
        assert_eq!(orch.state(), DayState::Skipped);
        assert_eq!(actions.sign_in_calls.load(Ordering::SeqCst), 0);
        assert!(notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_sign_in_retries_fail_the_day_and_notify() {
        let actions = ScriptedActions::new(
            vec![
                ActionResult::failure("portal down"),
                ActionResult::failure("portal down"),
            ],
            vec![],
        );
        let notifier = Arc::new(RecordingNotifier::default());
        let (_tx, mut rx) = watch::channel(false);

        let mut orch = orchestrator(Arc::clone(&actions), Arc::clone(&notifier), 480, 2)
            .with_rng(Box::new(FixedSource(0)))
            .with_clock(advancing_clock(at(2, 9, 5)));

        let outcome = orch.run_day(&mut rx).await;

        assert_eq!(outcome, DayOutcome::Failed);
        assert_eq!(orch.state(), DayState::Failed);
        assert_eq!(actions.sign_in_calls.load(Ordering::SeqCst), 2);
        assert_eq!(actions.sign_out_calls.load(Ordering::SeqCst), 0);

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "punchd: sign-in failed");
        assert!(messages[0].1.contains("All 2 attempts failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_during_the_wait_aborts_immediately() {
        let actions = ScriptedActions::new(vec![], vec![]);
        let notifier = Arc::new(RecordingNotifier::default());
        let (tx, mut rx) = watch::channel(false);

        let mut orch = orchestrator(Arc::clone(&actions), Arc::clone(&notifier), 480, 3)
            .with_rng(Box::new(FixedSource(20)))
            .with_clock(advancing_clock(at(2, 9, 5)));

        // Shutdown is already signalled: the 20-minute wait must not elapse.
        tx.send(true).unwrap();
        let before = tokio::time::Instant::now();
        let outcome = orch.run_day(&mut rx).await;

        assert_eq!(outcome, DayOutcome::Aborted);
        assert_eq!(orch.state(), DayState::Aborted);
        assert_eq!(before.elapsed(), StdDuration::ZERO);
        assert_eq!(actions.sign_in_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sign_in_drifting_past_the_window_is_a_policy_violation() {
        let actions = ScriptedActions::new(vec![ActionResult::success()], vec![]);
        let notifier = Arc::new(RecordingNotifier::default());
        let (_tx, mut rx) = watch::channel(false);

        // 17:50 + 30 minutes of jitter puts the sign-in target at 18:20,
        // past the window end by the time the wait elapses.
        let mut orch = orchestrator(Arc::clone(&actions), Arc::clone(&notifier), 480, 3)
            .with_rng(Box::new(FixedSource(30)))
            .with_clock(advancing_clock(at(2, 17, 50)));

        let outcome = orch.run_day(&mut rx).await;

        assert_eq!(outcome, DayOutcome::Failed);
        assert_eq!(actions.sign_in_calls.load(Ordering::SeqCst), 0);

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "punchd: policy violation");
    }
}
