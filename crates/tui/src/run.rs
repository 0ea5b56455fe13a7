//! Run lifecycle: the state machine of a single run as seen from the
//! dashboard, and the controller that owns the push subscription and the
//! timeline for that run.
//!
//! Phase transitions are total functions on [`LifecycleState`] with no I/O,
//! so the tricky cases (stop failure, double stop, channel death, the
//! finished/reconcile ordering) are testable without a backend. The
//! controller wraps that state with the things that do I/O side effects:
//! the channel handle and the timeline projection.

use tracing::{debug, warn};

use shopwatch_api_client::{ChannelEvent, EventChannel};
use shopwatch_api_types::{DynamicFilterMap, RunRecord, StartRunResponse};
use shopwatch_core::event::{AgentPhase, EventKind, EventPayload};
use shopwatch_core::normalize::{decompose_run, normalize};
use shopwatch_core::timeline::TimelineModel;

/// UI-side phase of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Starting,
    Live,
    Stopping,
    Completed,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            RunPhase::NotStarted => "idle",
            RunPhase::Starting => "starting",
            RunPhase::Live => "live",
            RunPhase::Stopping => "stopping",
            RunPhase::Completed => "completed",
            RunPhase::Failed => "failed",
        }
    }
}

/// Pure transition state. Only the controller mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleState {
    pub phase: RunPhase,
    /// Last status the backend reported, shown alongside the phase.
    pub agent_status: Option<AgentPhase>,
    /// Busy indicator for an in-flight stop request.
    pub stopping_busy: bool,
    /// Phase to restore if a stop call fails.
    pre_stop: Option<RunPhase>,
}

impl Default for LifecycleState {
    fn default() -> Self {
        Self {
            phase: RunPhase::NotStarted,
            agent_status: None,
            stopping_busy: false,
            pre_stop: None,
        }
    }
}

impl LifecycleState {
    pub fn start_issued(&mut self) {
        if self.phase == RunPhase::NotStarted {
            self.phase = RunPhase::Starting;
        }
    }

    pub fn start_succeeded(&mut self) {
        if self.phase == RunPhase::Starting {
            self.phase = RunPhase::Live;
        }
    }

    /// A failed start returns to idle; the task text stays in the form for
    /// resubmission.
    pub fn start_failed(&mut self) {
        if self.phase == RunPhase::Starting {
            self.phase = RunPhase::NotStarted;
        }
    }

    /// A status frame is recorded for display but never settles the phase;
    /// that is the finished signal's job.
    pub fn status_signal(&mut self, status: AgentPhase) {
        self.agent_status = Some(status);
    }

    /// The explicit terminal signal. Resolves to Failed only when the
    /// backend reported a failed status; otherwise Completed.
    pub fn finished_signal(&mut self) {
        self.phase = if self.agent_status == Some(AgentPhase::Failed) {
            RunPhase::Failed
        } else {
            RunPhase::Completed
        };
        self.stopping_busy = false;
        self.pre_stop = None;
    }

    /// Channel closure or error is never proof of completion; the phase is
    /// left alone until an explicit signal or snapshot settles it.
    pub fn connection_lost(&mut self) {}

    /// Returns false when the stop is a duplicate; a second stop while
    /// already stopping only re-arms the busy indicator.
    pub fn stop_issued(&mut self) -> bool {
        match self.phase {
            RunPhase::Live => {
                self.pre_stop = Some(self.phase);
                self.phase = RunPhase::Stopping;
                self.stopping_busy = true;
                true
            }
            RunPhase::Stopping => {
                self.stopping_busy = true;
                false
            }
            _ => false,
        }
    }

    pub fn stop_succeeded(&mut self) {
        // Remain Stopping until a terminal signal or snapshot settles it.
        self.stopping_busy = false;
    }

    /// A failed stop restores the pre-stop phase. Deliberately quiet at the
    /// UI level; the caller logs a diagnostic instead of showing a banner.
    pub fn stop_failed(&mut self) {
        if self.phase == RunPhase::Stopping {
            self.phase = self.pre_stop.take().unwrap_or(RunPhase::Live);
        }
        self.stopping_busy = false;
    }
}

/// What the app must do after the controller ingested a channel event.
#[derive(Debug, PartialEq, Eq)]
pub enum FollowUp {
    /// `agent_finished` arrived: fetch the persisted record and perform the
    /// one-time authoritative replace.
    Reconcile { run_id: String },
}

/// Owns everything scoped to one run view: lifecycle state, timeline,
/// filter map, and the push subscription handle. Discarded, not reused,
/// when the user navigates to a different run; dropping it closes the
/// channel on every exit path.
pub struct RunController {
    pub lifecycle: LifecycleState,
    pub run_id: Option<String>,
    pub client_id: Option<String>,
    pub task: String,
    pub dynamic_filters: DynamicFilterMap,
    pub timeline: TimelineModel,
    /// Artifact URLs surfaced once the run record carries them.
    pub history_gif_url: Option<String>,
    pub recording_url: Option<String>,
    /// Set once the post-finished authoritative replace has happened.
    pub reconciled: bool,
    channel: Option<EventChannel>,
}

impl Default for RunController {
    fn default() -> Self {
        Self::new()
    }
}

impl RunController {
    pub fn new() -> Self {
        Self {
            lifecycle: LifecycleState::default(),
            run_id: None,
            client_id: None,
            task: String::new(),
            dynamic_filters: DynamicFilterMap::new(),
            timeline: TimelineModel::new(),
            history_gif_url: None,
            recording_url: None,
            reconciled: false,
            channel: None,
        }
    }

    /// Record a successful start and adopt its identifiers.
    pub fn run_started(&mut self, response: &StartRunResponse) {
        self.lifecycle.start_succeeded();
        self.run_id = Some(response.run_id.clone());
        self.client_id = Some(response.client_id.clone());
        self.task = response.task.clone();
        self.dynamic_filters = response.dynamic_filters.clone();
    }

    /// Attach a push subscription. Any previous subscription is torn down
    /// first so a late frame from an old run can never land in this run's
    /// timeline.
    pub fn attach_channel(&mut self, channel: EventChannel) {
        self.close_channel();
        self.channel = Some(channel);
    }

    pub fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
    }

    pub fn channel_open(&self) -> bool {
        self.channel.is_some()
    }

    /// Drain everything the subscription has queued, in strict receipt
    /// order, and project it. Non-blocking; called from the dispatch loop.
    pub fn poll_channel(&mut self) -> Vec<FollowUp> {
        let mut follow_ups = Vec::new();
        loop {
            let Some(channel) = self.channel.as_mut() else {
                break;
            };
            let Some(event) = channel.try_recv() else {
                break;
            };
            if let Some(follow_up) = self.ingest(event) {
                follow_ups.push(follow_up);
            }
        }
        follow_ups
    }

    /// Fold one channel event into the run state.
    pub fn ingest(&mut self, event: ChannelEvent) -> Option<FollowUp> {
        match event {
            ChannelEvent::Open => {
                debug!("push channel established");
                None
            }
            ChannelEvent::Message(raw) => match normalize(&raw) {
                Ok(event) => self.project(event),
                Err(rejected) => {
                    // Rejections affect that frame only and are not
                    // user-visible; keep them observable in the logs.
                    debug!("dropped push frame: {rejected}");
                    None
                }
            },
            ChannelEvent::Error(reason) => {
                warn!("push channel error: {reason}");
                self.close_channel();
                self.lifecycle.connection_lost();
                None
            }
            ChannelEvent::Closed => {
                debug!("push channel closed");
                self.close_channel();
                self.lifecycle.connection_lost();
                None
            }
        }
    }

    fn project(&mut self, event: shopwatch_core::NormalizedEvent) -> Option<FollowUp> {
        let kind = event.kind();
        if let EventPayload::Status(status) = &event.payload {
            self.lifecycle.status_signal(status.status);
        }
        // The projector's bookkeeping sees Finished before the replace:
        // append first, then trigger reconciliation.
        self.timeline.append(event);

        if kind == EventKind::Finished {
            self.lifecycle.finished_signal();
            self.close_channel();
            return self.run_id.clone().map(|run_id| FollowUp::Reconcile { run_id });
        }
        None
    }

    /// Replace the timeline with the persisted record's decomposition. Used
    /// both for the eager fetch on mount and for the one-time authoritative
    /// reconciliation after `agent_finished`; `authoritative` marks the
    /// latter.
    pub fn apply_record(&mut self, record: &RunRecord, authoritative: bool) {
        if !record.task.is_empty() {
            self.task = record.task.clone();
        }
        if let Some(status) = record.status.as_deref().and_then(AgentPhase::parse) {
            self.lifecycle.status_signal(status);
            if authoritative && self.lifecycle.phase == RunPhase::Stopping {
                // Snapshot polling settles a stop that never saw a
                // finished frame.
                self.lifecycle.finished_signal();
            }
            // A record opened from history carries its terminal status;
            // there is no live channel to deliver a finished frame.
            if status.is_terminal() && self.lifecycle.phase == RunPhase::NotStarted {
                self.lifecycle.finished_signal();
            }
        }
        self.history_gif_url = record
            .history_gif_url
            .clone()
            .filter(|url| !url.trim().is_empty());
        self.recording_url = record
            .recording_url
            .clone()
            .filter(|url| !url.trim().is_empty());

        let events = decompose_run(record);
        if authoritative || !events.is_empty() {
            self.timeline.replace_all(events);
        }
        if authoritative {
            self.reconciled = true;
        }
    }
}

impl Drop for RunController {
    fn drop(&mut self) {
        // The one mandatory cleanup: the subscription never outlives the
        // run view, even on error paths.
        self.close_channel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shopwatch_core::normalize::RawPushMessage;
    use shopwatch_core::run::{AgentHistory, CurrentState, ModelOutput, StepRecord};

    fn frame(message_type: &str, data: serde_json::Value) -> ChannelEvent {
        ChannelEvent::Message(RawPushMessage {
            message_type: message_type.to_string(),
            data: Some(data),
            timestamp: Some(Utc::now()),
        })
    }

    fn live_controller() -> RunController {
        let mut controller = RunController::new();
        controller.lifecycle.start_issued();
        controller.run_started(&StartRunResponse {
            task: "find a laptop".to_string(),
            dynamic_filters: [("laptop".to_string(), vec!["tablet".to_string(), "phone".to_string()])]
                .into_iter()
                .collect(),
            client_id: "c1".to_string(),
            run_id: "r1".to_string(),
            message: String::new(),
            status: "running".to_string(),
        });
        controller
    }

    #[test]
    fn start_success_reaches_live_with_identifiers() {
        let controller = live_controller();
        assert_eq!(controller.lifecycle.phase, RunPhase::Live);
        assert_eq!(controller.client_id.as_deref(), Some("c1"));
        assert_eq!(controller.run_id.as_deref(), Some("r1"));
        assert_eq!(controller.dynamic_filters.len(), 1);
    }

    #[test]
    fn start_failure_returns_to_not_started() {
        let mut lifecycle = LifecycleState::default();
        lifecycle.start_issued();
        assert_eq!(lifecycle.phase, RunPhase::Starting);
        lifecycle.start_failed();
        assert_eq!(lifecycle.phase, RunPhase::NotStarted);
    }

    #[test]
    fn log_frame_lands_in_step_group() {
        let mut controller = live_controller();
        let follow_up = controller.ingest(frame(
            "agent_log",
            serde_json::json!({"prefix": "Summary", "content": "Starting search", "step": 0}),
        ));
        assert_eq!(follow_up, None);

        let groups = controller.timeline.group_by_step();
        assert_eq!(groups[&0].len(), 1);
        match &groups[&0][0].payload {
            EventPayload::Log(log) => assert_eq!(log.content, "Starting search"),
            other => panic!("expected log, got {other:?}"),
        }
    }

    #[test]
    fn status_frame_is_recorded_but_not_terminal() {
        let mut controller = live_controller();
        controller.ingest(frame("agent_status", serde_json::json!({"status": "completed"})));
        assert_eq!(controller.lifecycle.phase, RunPhase::Live);
        assert_eq!(
            controller.lifecycle.agent_status,
            Some(AgentPhase::Completed)
        );
    }

    #[test]
    fn finished_frame_settles_phase_and_requests_reconcile() {
        let mut controller = live_controller();
        controller.ingest(frame("agent_status", serde_json::json!({"status": "completed"})));
        let follow_up = controller.ingest(frame("agent_finished", serde_json::json!({})));

        assert_eq!(
            follow_up,
            Some(FollowUp::Reconcile {
                run_id: "r1".to_string()
            })
        );
        assert_eq!(controller.lifecycle.phase, RunPhase::Completed);
        assert!(!controller.channel_open());
        assert!(controller.timeline.has_finished());
    }

    #[test]
    fn finished_after_failed_status_is_failed() {
        let mut controller = live_controller();
        controller.ingest(frame("agent_status", serde_json::json!({"status": "failed"})));
        controller.ingest(frame("agent_finished", serde_json::json!({})));
        assert_eq!(controller.lifecycle.phase, RunPhase::Failed);
    }

    #[test]
    fn channel_death_never_settles_the_run() {
        let mut controller = live_controller();
        controller.ingest(ChannelEvent::Error("connection reset".to_string()));
        assert_eq!(controller.lifecycle.phase, RunPhase::Live);

        controller.ingest(ChannelEvent::Closed);
        assert_eq!(controller.lifecycle.phase, RunPhase::Live);
    }

    #[test]
    fn rejected_frames_do_not_disturb_the_timeline() {
        let mut controller = live_controller();
        controller.ingest(frame("agent_log", serde_json::json!({"prefix": "Summary"})));
        controller.ingest(frame("agent_heartbeat", serde_json::json!({})));
        assert!(controller.timeline.is_empty());

        controller.ingest(frame(
            "agent_log",
            serde_json::json!({"prefix": "Summary", "content": "still fine"}),
        ));
        assert_eq!(controller.timeline.len(), 1);
    }

    #[test]
    fn stop_keeps_stopping_until_settled_and_reverts_on_failure() {
        let mut lifecycle = LifecycleState::default();
        lifecycle.start_issued();
        lifecycle.start_succeeded();

        assert!(lifecycle.stop_issued());
        assert_eq!(lifecycle.phase, RunPhase::Stopping);
        assert!(lifecycle.stopping_busy);

        // Duplicate stop: no-op beyond the busy flag.
        assert!(!lifecycle.stop_issued());
        assert_eq!(lifecycle.phase, RunPhase::Stopping);

        lifecycle.stop_succeeded();
        assert_eq!(lifecycle.phase, RunPhase::Stopping);
        assert!(!lifecycle.stopping_busy);

        // A failed stop on a live run restores the pre-stop phase.
        let mut lifecycle = LifecycleState::default();
        lifecycle.start_issued();
        lifecycle.start_succeeded();
        assert!(lifecycle.stop_issued());
        lifecycle.stop_failed();
        assert_eq!(lifecycle.phase, RunPhase::Live);
        assert!(!lifecycle.stopping_busy);
    }

    fn two_step_record() -> RunRecord {
        RunRecord {
            task: "find a laptop".to_string(),
            status: Some("completed".to_string()),
            history_gif_url: Some("https://cdn.example.com/r1.gif".to_string()),
            agent_history: Some(AgentHistory {
                history: vec![
                    StepRecord {
                        model_output: Some(ModelOutput {
                            current_state: CurrentState {
                                summary: Some("step zero".to_string()),
                                ..CurrentState::default()
                            },
                            action: vec![serde_json::json!({"go_to_url": {"url": "https://x.com"}})],
                        }),
                        result: vec![],
                    },
                    StepRecord {
                        model_output: Some(ModelOutput {
                            current_state: CurrentState {
                                summary: Some("step one".to_string()),
                                ..CurrentState::default()
                            },
                            action: vec![serde_json::json!({"done": {"text": "ok"}})],
                        }),
                        result: vec![],
                    },
                ],
            }),
            ..RunRecord::default()
        }
    }

    #[test]
    fn authoritative_record_replaces_live_events() {
        let mut controller = live_controller();
        controller.ingest(frame(
            "agent_log",
            serde_json::json!({"prefix": "Summary", "content": "live noise", "step": 0}),
        ));
        controller.ingest(frame("agent_finished", serde_json::json!({})));

        controller.apply_record(&two_step_record(), true);

        assert!(controller.reconciled);
        let groups = controller.timeline.group_by_step();
        assert_eq!(groups.len(), 2);
        // Live events are gone; only the decomposed record remains.
        assert!(!controller.timeline.has_finished());
        assert!(controller.timeline.events().iter().all(|e| match &e.payload {
            EventPayload::Log(log) => log.content != "live noise",
            _ => true,
        }));
        assert_eq!(
            controller.history_gif_url.as_deref(),
            Some("https://cdn.example.com/r1.gif")
        );
    }

    #[test]
    fn mount_fetch_with_empty_history_keeps_live_timeline() {
        let mut controller = live_controller();
        controller.ingest(frame(
            "agent_log",
            serde_json::json!({"prefix": "Summary", "content": "live", "step": 0}),
        ));

        controller.apply_record(&RunRecord::default(), false);
        assert_eq!(controller.timeline.len(), 1);
        assert!(!controller.reconciled);
    }

    #[test]
    fn historical_record_settles_phase_on_a_fresh_controller() {
        // Opening a run from history skips the whole start/live path; the
        // record's own terminal status must settle the phase so artifact
        // links become reachable.
        let mut controller = RunController::new();
        controller.run_id = Some("r1".to_string());

        controller.apply_record(&two_step_record(), false);

        assert_eq!(controller.lifecycle.phase, RunPhase::Completed);
        assert!(controller.lifecycle.phase.is_terminal());
        assert_eq!(
            controller.history_gif_url.as_deref(),
            Some("https://cdn.example.com/r1.gif")
        );
    }

    #[test]
    fn mount_fetch_on_a_live_run_never_settles_phase() {
        let mut controller = live_controller();
        controller.apply_record(&two_step_record(), false);
        assert_eq!(controller.lifecycle.phase, RunPhase::Live);
    }

    #[test]
    fn snapshot_settles_a_stop_without_finished_frame() {
        let mut controller = live_controller();
        controller.lifecycle.stop_issued();
        controller.lifecycle.stop_succeeded();
        assert_eq!(controller.lifecycle.phase, RunPhase::Stopping);

        controller.apply_record(&two_step_record(), true);
        assert_eq!(controller.lifecycle.phase, RunPhase::Completed);
    }
}
