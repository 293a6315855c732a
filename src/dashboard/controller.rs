//! Main dashboard controller for jobs and slaves.
//!
//! Owns the refresh cycle (slaves, then jobs), applies push events from the
//! bus, dispatches pause/resume/stop actions and answers the gating
//! predicates the UI uses to enable action buttons.

use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::JobAction;
use crate::context::AppContext;
use crate::model::{Job, JobState};
use crate::socket::PushEvent;
use crate::store::Collection;

/// Result of a pause/resume/stop request.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The server accepted the action; the returned job was merged.
    Applied(Job),
    /// The response arrived after a newer action on the same job.
    Superseded,
    /// Job or owning slave could not be resolved, or the server returned no job.
    Skipped,
    /// Another action is in flight.
    Busy,
    /// The request failed; the toast text.
    Failed(String),
}

pub struct MainController {
    ctx: Arc<AppContext>,
}

impl MainController {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    // ── Refresh ─────────────────────────────────────────────────────────

    /// Full refresh: slaves first, then jobs. Returns `true` if both calls
    /// succeeded. Failures are toasted, never propagated.
    pub async fn refresh(&self) -> bool {
        let slaves_ok = self.refresh_slaves().await;
        let jobs_ok = self.refresh_jobs().await;
        slaves_ok && jobs_ok
    }

    async fn refresh_slaves(&self) -> bool {
        let ticket = self.ctx.store.begin_refresh(Collection::Slaves).await;
        match self.ctx.api.list_slaves().await {
            Ok(slaves) => {
                self.ctx.store.apply_slaves(ticket, &slaves).await;
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to refresh slaves");
                self.ctx
                    .notifier
                    .error("Failed to refresh slaves", e.user_message());
                false
            }
        }
    }

    async fn refresh_jobs(&self) -> bool {
        let ticket = self.ctx.store.begin_refresh(Collection::Jobs).await;
        match self.ctx.api.list_jobs(&self.ctx.config.job_states).await {
            Ok(jobs) => {
                self.ctx.store.apply_jobs(ticket, &jobs).await;
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to refresh jobs");
                self.ctx
                    .notifier
                    .error("Failed to refresh jobs", e.user_message());
                false
            }
        }
    }

    // ── Push events ─────────────────────────────────────────────────────

    pub async fn handle_event(&self, event: PushEvent) {
        match event {
            PushEvent::JobUpdate(job) => {
                let result = self.ctx.store.merge_job(&job).await;
                debug!(job_id = %job.id, ?result, "Job update applied");
            }
            PushEvent::SlaveUpdate(slave) => {
                let result = self.ctx.store.merge_slave(&slave).await;
                debug!(slave_id = %slave.id, ?result, "Slave update applied");
            }
        }
    }

    /// Apply bus events until cancelled. Falling behind the bus triggers a
    /// full refresh, since the missed events are gone.
    pub fn spawn_event_listener(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let mut rx = this.ctx.bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = rx.recv() => match result {
                        Ok(event) => this.handle_event(event).await,
                        Err(RecvError::Lagged(n)) => {
                            warn!(missed = n, "Event listener lagged behind bus, refreshing");
                            this.refresh().await;
                        }
                        Err(RecvError::Closed) => {
                            debug!("Event bus closed");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Re-run [`refresh`](Self::refresh) every `config.refresh_interval`,
    /// independent of push channel health.
    pub fn spawn_refresh_timer(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let period = this.ctx.config.refresh_interval;
        tokio::spawn(async move {
            if period.is_zero() {
                error!("Refresh interval is zero, periodic refresh disabled");
                return;
            }
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {
                        debug!("Periodic refresh");
                        this.refresh().await;
                    }
                }
            }
        })
    }

    // ── Actions ─────────────────────────────────────────────────────────

    pub async fn pause_job(&self, job: &Job) -> ActionOutcome {
        self.dispatch(JobAction::Pause, job).await
    }

    pub async fn resume_job(&self, job: &Job) -> ActionOutcome {
        self.dispatch(JobAction::Resume, job).await
    }

    pub async fn stop_job(&self, job: &Job) -> ActionOutcome {
        self.dispatch(JobAction::Stop, job).await
    }

    async fn dispatch(&self, action: JobAction, job: &Job) -> ActionOutcome {
        let store = &self.ctx.store;

        if job.id.is_empty() {
            return ActionOutcome::Skipped;
        }
        let Some(slave_id) = store.owning_slave_id(job).await else {
            debug!(job_id = %job.id, %action, "No owning slave, skipping action");
            return ActionOutcome::Skipped;
        };
        let Some(_in_flight) = store.try_begin_action(action) else {
            debug!(job_id = %job.id, %action, "Another action is in flight");
            return ActionOutcome::Busy;
        };

        let ticket = store.begin_action(&job.id).await;
        info!(job_id = %job.id, slave_id = %slave_id, %action, "Dispatching job action");

        match self.ctx.api.job_action(action, &job.id, &slave_id).await {
            Ok(Some(updated)) => {
                if store.apply_action_result(&job.id, ticket, &updated).await {
                    info!(job_id = %job.id, %action, state = ?updated.state, "Job action applied");
                    ActionOutcome::Applied(updated)
                } else {
                    ActionOutcome::Superseded
                }
            }
            Ok(None) => {
                store.end_action(&job.id, ticket).await;
                warn!(job_id = %job.id, %action, "Job action returned no job");
                ActionOutcome::Skipped
            }
            Err(e) => {
                store.end_action(&job.id, ticket).await;
                error!(job_id = %job.id, %action, error = %e, "Job action failed");
                let message = e.user_message();
                self.ctx
                    .notifier
                    .error(format!("Failed to {action} job"), message.clone());
                ActionOutcome::Failed(message)
            }
        }
    }

    // ── Gating predicates ───────────────────────────────────────────────

    pub fn pausing(&self) -> bool {
        self.ctx.store.action_in_flight(JobAction::Pause)
    }

    pub fn resuming(&self) -> bool {
        self.ctx.store.action_in_flight(JobAction::Resume)
    }

    pub fn stopping(&self) -> bool {
        self.ctx.store.action_in_flight(JobAction::Stop)
    }

    pub fn is_pausable(&self, job: &Job) -> bool {
        self.gate(job, &[JobState::Running])
    }

    pub fn is_resumable(&self, job: &Job) -> bool {
        self.gate(job, &[JobState::Paused, JobState::Stopped])
    }

    pub fn is_stoppable(&self, job: &Job) -> bool {
        self.gate(job, &[JobState::Paused, JobState::Running])
    }

    // The busy-lock is global: any in-flight action disables every job.
    fn gate(&self, job: &Job, states: &[JobState]) -> bool {
        !self.ctx.store.any_action_in_flight() && job.state.is_some_and(|s| states.contains(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use crate::api::DashboardApi;
    use crate::config::DashboardConfig;
    use crate::error::ApiError;
    use crate::model::{Slave, Workflow};
    use crate::notify::ToastLevel;

    #[derive(Default)]
    struct StubApi {
        jobs: Vec<Job>,
        slaves: Vec<Slave>,
        fail_lists: bool,
        action_error: Option<String>,
        empty_action: bool,
        gate: Option<Arc<Notify>>,
        calls: Mutex<Vec<String>>,
    }

    impl StubApi {
        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DashboardApi for StubApi {
        async fn list_jobs(&self, _states: &[JobState]) -> Result<Vec<Job>, ApiError> {
            self.record("jobs".into());
            if self.fail_lists {
                return Err(ApiError::Request("connection refused".into()));
            }
            Ok(self.jobs.clone())
        }

        async fn job_action(
            &self,
            action: JobAction,
            job_id: &str,
            slave_id: &str,
        ) -> Result<Option<Job>, ApiError> {
            self.record(format!("{action}/{job_id}/{slave_id}"));
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(message) = &self.action_error {
                return Err(ApiError::Request(message.clone()));
            }
            if self.empty_action {
                return Ok(None);
            }
            let state = match action {
                JobAction::Pause => JobState::Paused,
                JobAction::Resume => JobState::Running,
                JobAction::Stop => JobState::Stopped,
            };
            Ok(Some(Job {
                id: job_id.into(),
                state: Some(state),
                slave_id: Some(slave_id.into()),
                ..Default::default()
            }))
        }

        async fn list_slaves(&self) -> Result<Vec<Slave>, ApiError> {
            self.record("slaves".into());
            if self.fail_lists {
                return Err(ApiError::Request("connection refused".into()));
            }
            Ok(self.slaves.clone())
        }

        async fn list_workflows(&self) -> Result<Vec<Workflow>, ApiError> {
            Ok(Vec::new())
        }
    }

    fn job(id: &str, slave: &str, state: JobState) -> Job {
        Job {
            id: id.into(),
            slave_id: Some(slave.into()),
            state: Some(state),
            ..Default::default()
        }
    }

    fn slave(id: &str) -> Slave {
        Slave {
            id: id.into(),
            ..Default::default()
        }
    }

    fn fixture(api: StubApi) -> (Arc<MainController>, Arc<StubApi>) {
        let api = Arc::new(api);
        let ctx = AppContext::new(DashboardConfig::default(), api.clone());
        (Arc::new(MainController::new(ctx)), api)
    }

    fn running_fixture(api: StubApi) -> (Arc<MainController>, Arc<StubApi>) {
        fixture(StubApi {
            slaves: vec![slave("s1")],
            jobs: vec![
                job("j1", "s1", JobState::Running),
                job("j2", "s1", JobState::Paused),
            ],
            ..api
        })
    }

    #[tokio::test]
    async fn refresh_loads_slaves_then_jobs() {
        let (controller, api) = fixture(StubApi {
            slaves: vec![slave("s1")],
            jobs: vec![
                Job {
                    id: "j1".into(),
                    slave_id: Some("s1".into()),
                    ..Default::default()
                },
                Job {
                    id: "j2".into(),
                    slave_id: Some("s2".into()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        });

        assert!(controller.refresh().await);
        assert_eq!(api.calls(), ["slaves", "jobs"]);

        let slaves = controller.context().store.slaves().await;
        assert_eq!(slaves[0].jobs.len(), 1);
        assert_eq!(slaves[0].jobs[0].id, "j1");
    }

    #[tokio::test]
    async fn refresh_failure_raises_toasts() {
        let (controller, _api) = fixture(StubApi {
            fail_lists: true,
            ..Default::default()
        });
        let mut toasts = controller.context().notifier.subscribe();

        assert!(!controller.refresh().await);

        let first = toasts.recv().await.unwrap();
        assert_eq!(first.title, "Failed to refresh slaves");
        assert_eq!(first.message, "connection refused");
        let second = toasts.recv().await.unwrap();
        assert_eq!(second.title, "Failed to refresh jobs");
    }

    #[tokio::test]
    async fn pause_applies_response() {
        let (controller, api) = running_fixture(StubApi::default());
        controller.refresh().await;

        let target = job("j1", "s1", JobState::Running);
        let outcome = controller.pause_job(&target).await;

        assert!(matches!(&outcome, ActionOutcome::Applied(j) if j.state == Some(JobState::Paused)));
        assert!(api.calls().contains(&"pause/j1/s1".to_string()));
        let stored = controller.context().store.job("j1").await.unwrap();
        assert_eq!(stored.state, Some(JobState::Paused));
        assert!(!controller.pausing());
    }

    #[tokio::test]
    async fn unresolved_slave_skips_silently() {
        let (controller, api) = running_fixture(StubApi::default());
        controller.refresh().await;

        let orphan = job("j9", "ghost", JobState::Running);
        assert_eq!(controller.stop_job(&orphan).await, ActionOutcome::Skipped);
        assert_eq!(controller.stop_job(&Job::default()).await, ActionOutcome::Skipped);
        assert!(!api.calls().iter().any(|c| c.starts_with("stop/")));
    }

    #[tokio::test]
    async fn failure_clears_flag_and_toasts() {
        let (controller, _api) = running_fixture(StubApi {
            action_error: Some(String::new()),
            ..Default::default()
        });
        controller.refresh().await;
        let mut toasts = controller.context().notifier.subscribe();

        let outcome = controller.resume_job(&job("j2", "s1", JobState::Paused)).await;
        assert_eq!(outcome, ActionOutcome::Failed("Cause unknown".into()));
        assert!(!controller.resuming());

        let toast = toasts.recv().await.unwrap();
        assert_eq!(toast.level, ToastLevel::Error);
        assert_eq!(toast.title, "Failed to resume job");
        assert_eq!(toast.message, "Cause unknown");
        assert_eq!(controller.context().store.pending_actions().await, 0);

        // State untouched by the failed call.
        let stored = controller.context().store.job("j2").await.unwrap();
        assert_eq!(stored.state, Some(JobState::Paused));
    }

    #[tokio::test]
    async fn empty_action_response_is_skipped() {
        let (controller, _api) = running_fixture(StubApi {
            empty_action: true,
            ..Default::default()
        });
        controller.refresh().await;

        let outcome = controller.stop_job(&job("j1", "s1", JobState::Running)).await;
        assert_eq!(outcome, ActionOutcome::Skipped);
        assert!(!controller.stopping());
        assert_eq!(controller.context().store.pending_actions().await, 0);
        let stored = controller.context().store.job("j1").await.unwrap();
        assert_eq!(stored.state, Some(JobState::Running));
    }

    #[tokio::test]
    async fn busy_lock_is_global_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let (controller, _api) = running_fixture(StubApi {
            gate: Some(gate.clone()),
            ..Default::default()
        });
        controller.refresh().await;

        let running = job("j1", "s1", JobState::Running);
        let paused = job("j2", "s1", JobState::Paused);
        assert!(controller.is_pausable(&running));
        assert!(controller.is_resumable(&paused));
        assert!(controller.is_stoppable(&paused));

        let task = {
            let controller = Arc::clone(&controller);
            let running = running.clone();
            tokio::spawn(async move { controller.pause_job(&running).await })
        };

        tokio::time::timeout(Duration::from_secs(2), async {
            while !controller.pausing() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("pause never went in flight");

        for j in [&running, &paused] {
            assert!(!controller.is_pausable(j));
            assert!(!controller.is_resumable(j));
            assert!(!controller.is_stoppable(j));
        }
        assert_eq!(controller.stop_job(&paused).await, ActionOutcome::Busy);

        gate.notify_one();
        let outcome = task.await.unwrap();
        assert!(matches!(outcome, ActionOutcome::Applied(_)));

        assert!(!controller.pausing());
        let now_paused = controller.context().store.job("j1").await.unwrap();
        assert!(!controller.is_pausable(&now_paused));
        assert!(controller.is_resumable(&now_paused));
        assert!(controller.is_stoppable(&paused));
    }

    #[test]
    fn predicates_follow_state() {
        let (controller, _api) = fixture(StubApi::default());
        let cases = [
            (JobState::New, false, false, false),
            (JobState::Claimed, false, false, false),
            (JobState::Queued, false, false, false),
            (JobState::Running, true, false, true),
            (JobState::Paused, false, true, true),
            (JobState::Stopped, false, true, false),
            (JobState::Success, false, false, false),
        ];
        for (state, pausable, resumable, stoppable) in cases {
            let j = job("j", "s", state);
            assert_eq!(controller.is_pausable(&j), pausable, "{state}");
            assert_eq!(controller.is_resumable(&j), resumable, "{state}");
            assert_eq!(controller.is_stoppable(&j), stoppable, "{state}");
        }
        assert!(!controller.is_stoppable(&Job::default()));
    }

    #[tokio::test]
    async fn push_events_flow_through_listener() {
        let (controller, _api) = running_fixture(StubApi::default());
        controller.refresh().await;

        let cancel = CancellationToken::new();
        let handle = controller.spawn_event_listener(cancel.clone());
        let mut changes = controller.context().store.subscribe();

        controller
            .context()
            .bus
            .publish(PushEvent::JobUpdate(job("j1", "s1", JobState::Success)));

        tokio::time::timeout(Duration::from_secs(2), changes.recv())
            .await
            .expect("no change notification")
            .unwrap();

        let slaves = controller.context().store.slaves().await;
        let ids: Vec<_> = slaves[0].jobs.iter().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, ["j2"]);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn lagging_listener_triggers_full_refresh() {
        let (controller, api) = running_fixture(StubApi::default());
        let cancel = CancellationToken::new();
        let handle = controller.spawn_event_listener(cancel.clone());

        // Overrun the bus before the listener gets to run.
        let bus = &controller.context().bus;
        for i in 0..300 {
            bus.publish(PushEvent::JobUpdate(job(&format!("j{i}"), "s1", JobState::Queued)));
        }

        tokio::time::timeout(Duration::from_secs(2), async {
            while !api.calls().contains(&"jobs".to_string()) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("lag did not trigger a refresh");
        assert_eq!(api.calls()[..2], ["slaves", "jobs"]);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn zero_refresh_interval_does_not_panic() {
        let api = Arc::new(StubApi::default());
        let config = DashboardConfig {
            refresh_interval: Duration::ZERO,
            ..Default::default()
        };
        let controller = Arc::new(MainController::new(AppContext::new(config, api.clone())));

        let handle = controller.spawn_refresh_timer(CancellationToken::new());
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("timer task did not exit")
            .unwrap();
        assert!(api.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_timer_fires_each_period() {
        let (controller, api) = fixture(StubApi::default());
        let cancel = CancellationToken::new();
        let handle = controller.spawn_refresh_timer(cancel.clone());

        tokio::time::sleep(Duration::from_secs(179)).await;
        assert!(api.calls().is_empty());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(api.calls(), ["slaves", "jobs"]);

        tokio::time::sleep(Duration::from_secs(180)).await;
        assert_eq!(api.calls().len(), 4);

        cancel.cancel();
        handle.await.unwrap();
    }
}
