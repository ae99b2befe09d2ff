// ── Poll scheduler ──
//
// Drives the sync lifecycle: initial login and load, three periodic
// timers (data poll, token refresh, device list) and the one-shot
// re-login armed when a poll hits a 401. Each timer is a spawned task
// owning a `CancellationToken`; `shutdown` cancels them all.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use strum::Display;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Schedule;
use crate::session::SessionManager;
use crate::sync::{PollReport, Synchronizer};

// ── SchedulerState ───────────────────────────────────────────────

/// Lifecycle state observable by consumers.
///
/// A pending re-login after a 401 is not a state of its own; see
/// [`PollScheduler::reauth_pending`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SchedulerState {
    Stopped,
    Authenticating,
    Ready,
}

// ── Timers ───────────────────────────────────────────────────────

struct TimerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Run `job` every `period`, first one period after arming. Each
    /// tick spawns the job and does not wait for earlier ones.
    fn periodic<F, Fut>(period: Duration, job: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            interval.tick().await; // consume the immediate first tick

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = interval.tick() => {
                        tokio::spawn(job());
                    }
                }
            }
        });
        Self { cancel, task }
    }

    /// Run `job` once after `delay` unless cancelled first. Once the
    /// delay has elapsed the job runs to completion.
    fn once<Fut>(delay: Duration, job: Fut) -> Self
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            job.await;
        });
        Self { cancel, task }
    }

    fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }
}

#[derive(Default)]
struct Timers {
    periodic: Vec<TimerHandle>,
    reauth: Option<TimerHandle>,
}

// ── PollScheduler ────────────────────────────────────────────────

/// Cheaply cloneable handle to the scheduler.
#[derive(Clone)]
pub struct PollScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    sync: Synchronizer,
    schedule: Schedule,
    state: watch::Sender<SchedulerState>,
    timers: Mutex<Timers>,
}

impl PollScheduler {
    pub fn new(sync: Synchronizer, schedule: Schedule) -> Self {
        let (state, _) = watch::channel(SchedulerState::Stopped);
        Self {
            inner: Arc::new(SchedulerInner {
                sync,
                schedule,
                state,
                timers: Mutex::new(Timers::default()),
            }),
        }
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.inner.sync
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        self.inner.sync.session()
    }

    pub fn schedule(&self) -> Schedule {
        self.inner.schedule
    }

    pub fn state(&self) -> SchedulerState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SchedulerState> {
        self.inner.state.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Log in, load devices and data once, then arm the timers.
    ///
    /// Without a session after the login attempt the scheduler stays
    /// [`Stopped`](SchedulerState::Stopped): no timers, no retry.
    pub async fn start(&self) -> SchedulerState {
        if self.state() != SchedulerState::Stopped {
            warn!(state = %self.state(), "scheduler already started");
            return self.state();
        }

        let session = self.session();
        session.disconnect();
        self.set_state(SchedulerState::Authenticating);

        // A session left over from an earlier run does not count.
        if !session.login().await || !session.has_token() {
            error!("no session after login, not polling");
            self.set_state(SchedulerState::Stopped);
            return SchedulerState::Stopped;
        }

        // Initial load
        self.inner.sync.get_device_list().await;
        self.poll_once().await;

        let mut timers = self.inner.timers.lock().await;
        if self.state() == SchedulerState::Stopped {
            debug!("shut down during startup, timers not armed");
            return SchedulerState::Stopped;
        }

        let schedule = self.inner.schedule;
        let poller = self.clone();
        timers.periodic.push(TimerHandle::periodic(schedule.poll_interval, move || {
            let poller = poller.clone();
            async move {
                poller.poll_once().await;
            }
        }));

        let refresher = Arc::clone(session);
        timers.periodic.push(TimerHandle::periodic(schedule.token_refresh, move || {
            let refresher = Arc::clone(&refresher);
            async move {
                refresher.refresh_token().await;
            }
        }));

        let sync = self.inner.sync.clone();
        timers.periodic.push(TimerHandle::periodic(schedule.device_refresh, move || {
            let sync = sync.clone();
            async move {
                sync.get_device_list().await;
            }
        }));

        self.set_state(SchedulerState::Ready);
        info!(
            interval_secs = schedule.poll_interval.as_secs_f64(),
            devices = self.inner.sync.registry().len(),
            "polling started"
        );
        SchedulerState::Ready
    }

    /// Cancel every timer, clear the connectivity flag and stop.
    ///
    /// Idempotent. Fetches already in flight are left to finish; a login
    /// still running no longer marks the session connected.
    pub async fn shutdown(&self) {
        let mut timers = self.inner.timers.lock().await;

        if let Some(reauth) = timers.reauth.take() {
            reauth.cancel();
        }
        for timer in &timers.periodic {
            timer.cancel();
        }
        for timer in timers.periodic.drain(..) {
            let _ = timer.task.await;
        }

        self.session().disconnect();
        self.set_state(SchedulerState::Stopped);
        debug!("scheduler stopped");
    }

    // ── Polling ──────────────────────────────────────────────────

    /// One data poll; a 401 arms the delayed re-login.
    pub async fn poll_once(&self) -> PollReport {
        let report = self.inner.sync.update_devices().await;
        if report.unauthorized {
            self.schedule_reauth().await;
        }
        report
    }

    /// Out-of-band poll, e.g. from the refresh button.
    pub fn trigger_refresh(&self) -> JoinHandle<PollReport> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.poll_once().await })
    }

    /// Arm the one-shot re-login, replacing any pending one.
    pub async fn schedule_reauth(&self) {
        let mut timers = self.inner.timers.lock().await;
        if self.state() == SchedulerState::Stopped {
            debug!("scheduler stopped, not arming re-login");
            return;
        }

        if let Some(previous) = timers.reauth.take() {
            previous.cancel();
        }

        let delay = self.inner.schedule.reauth_delay;
        info!(
            delay_secs = delay.as_secs(),
            "graph receive 401 error. Refresh Token in {} seconds",
            delay.as_secs()
        );
        let refresher = Arc::clone(self.session());
        timers.reauth = Some(TimerHandle::once(delay, async move {
            refresher.refresh_token().await;
        }));
    }

    /// Whether a re-login is armed and has not completed yet.
    pub async fn reauth_pending(&self) -> bool {
        self.inner
            .timers
            .lock()
            .await
            .reauth
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    fn set_state(&self, state: SchedulerState) {
        self.inner.state.send_replace(state);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{FakeApi, GraphBehavior, LoginBehavior, connection, credentials};

    fn scheduler(api: &Arc<FakeApi>, poll_minutes: f64) -> PollScheduler {
        let sync = Synchronizer::new(api.clone(), credentials(), Arc::new(MemoryStore::new()));
        PollScheduler::new(sync, Schedule::with_poll_minutes(poll_minutes))
    }

    fn api_with_device() -> Arc<FakeApi> {
        let api = FakeApi::new();
        api.set_connections(Some(vec![connection("p1", "Ada", "L")]));
        api
    }

    /// Let spawned jobs run without moving the clock.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn start_loads_once_and_becomes_ready() {
        let api = api_with_device();
        let scheduler = scheduler(&api, 5.0);

        assert_eq!(scheduler.start().await, SchedulerState::Ready);

        assert_eq!(api.login_count(), 1);
        assert_eq!(api.graph_count(), 1);
        assert!(scheduler.session().is_connected());
        assert_eq!(scheduler.synchronizer().registry().len(), 1);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_login_stays_stopped_without_timers() {
        let api = api_with_device();
        api.set_login(LoginBehavior::Rejected(2));
        let scheduler = scheduler(&api, 5.0);

        assert_eq!(scheduler.start().await, SchedulerState::Stopped);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        assert_eq!(api.login_count(), 1);
        assert_eq!(api.graph_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn data_timer_uses_clamped_interval() {
        let api = api_with_device();
        let scheduler = scheduler(&api, 0.1);
        scheduler.start().await;
        assert_eq!(api.graph_count(), 1);

        tokio::time::sleep(Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(api.graph_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(api.graph_count(), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(api.graph_count(), 3);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_poll_relogs_once_after_delay() {
        let api = api_with_device();
        api.set_graph(GraphBehavior::Unauthorized);
        let scheduler = scheduler(&api, 5.0);

        scheduler.start().await;
        assert!(scheduler.reauth_pending().await);
        assert_eq!(api.login_count(), 1);

        tokio::time::sleep(Duration::from_secs(59)).await;
        settle().await;
        assert_eq!(api.login_count(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(api.login_count(), 2);
        assert!(!scheduler.reauth_pending().await);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn second_unauthorized_replaces_pending_relogin() {
        let api = api_with_device();
        api.set_graph(GraphBehavior::Unauthorized);
        let scheduler = scheduler(&api, 5.0);
        scheduler.start().await;

        tokio::time::sleep(Duration::from_secs(30)).await;
        scheduler.poll_once().await;

        // The first re-login would have fired at 60 s.
        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(api.login_count(), 1);

        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(api.login_count(), 2);

        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;
        assert_eq!(api.login_count(), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn token_and_device_timers_fire() {
        let api = api_with_device();
        let scheduler = scheduler(&api, 600.0 * 60.0);
        scheduler.start().await;

        tokio::time::sleep(Duration::from_secs(22 * 3600 + 1)).await;
        settle().await;
        assert_eq!(api.login_count(), 2);

        api.set_connections(Some(vec![
            connection("p1", "Ada", "L"),
            connection("p2", "Bob", "K"),
        ]));
        tokio::time::sleep(Duration::from_secs(7200)).await;
        settle().await;
        assert_eq!(scheduler.synchronizer().registry().len(), 2);

        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_everything_and_is_idempotent() {
        let api = api_with_device();
        api.set_graph(GraphBehavior::Unauthorized);
        let scheduler = scheduler(&api, 1.0);
        scheduler.start().await;
        assert!(scheduler.reauth_pending().await);

        scheduler.shutdown().await;
        scheduler.shutdown().await;

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(!scheduler.session().is_connected());
        assert!(!scheduler.reauth_pending().await);

        tokio::time::sleep(Duration::from_secs(3600)).await;
        settle().await;
        assert_eq!(api.login_count(), 1);
        assert_eq!(api.graph_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_without_start_completes() {
        let api = FakeApi::new();
        let scheduler = scheduler(&api, 5.0);

        scheduler.shutdown().await;

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_scheduler_does_not_arm_relogin() {
        let api = api_with_device();
        let scheduler = scheduler(&api, 5.0);

        scheduler.schedule_reauth().await;

        assert!(!scheduler.reauth_pending().await);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_trigger_polls_immediately() {
        let api = api_with_device();
        let scheduler = scheduler(&api, 5.0);
        scheduler.start().await;

        let report = scheduler.trigger_refresh().await.unwrap();

        assert_eq!(report.updated, 1);
        assert_eq!(api.graph_count(), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn restart_with_rejected_login_stays_stopped() {
        let api = api_with_device();
        let scheduler = scheduler(&api, 5.0);
        assert_eq!(scheduler.start().await, SchedulerState::Ready);
        scheduler.shutdown().await;

        api.set_login(LoginBehavior::Rejected(2));
        assert_eq!(scheduler.start().await, SchedulerState::Stopped);

        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(!scheduler.session().is_connected());
        tokio::time::sleep(Duration::from_secs(3600)).await;
        settle().await;
        assert_eq!(api.graph_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn relogin_in_flight_at_shutdown_leaves_flag_cleared() {
        let api = api_with_device();
        api.set_graph(GraphBehavior::Unauthorized);
        let scheduler = scheduler(&api, 5.0);
        scheduler.start().await;

        // The re-login fires at 60 s and answers at 70 s.
        api.set_login_delay(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(api.login_count(), 2);

        scheduler.shutdown().await;
        assert!(!scheduler.session().is_connected());

        tokio::time::sleep(Duration::from_secs(20)).await;
        settle().await;
        assert_eq!(scheduler.state(), SchedulerState::Stopped);
        assert!(!scheduler.session().is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fetches_overlap_across_ticks() {
        let api = api_with_device();
        api.set_graph_delay(Duration::from_secs(45));
        let scheduler = scheduler(&api, 0.5);

        // The initial load waits for its fetch; timers arm at 45 s.
        scheduler.start().await;
        assert_eq!(api.graph_count(), 1);
        assert_eq!(api.graph_done_count(), 1);

        // Ticks at 75 s and 105 s; the first of them answers at 120 s.
        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(api.graph_count(), 2);

        tokio::time::sleep(Duration::from_secs(30)).await;
        settle().await;
        assert_eq!(api.graph_count(), 3);
        assert_eq!(api.graph_done_count(), 1);

        scheduler.shutdown().await;
    }
}
