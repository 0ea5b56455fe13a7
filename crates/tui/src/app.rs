//! Application state and the dispatch logic behind the terminal loop.
//!
//! All state changes flow through three entry points the main loop calls in
//! order each frame: `handle_key` for user input, `handle_result` for
//! completed API calls, and `pump_channel` for push events. Each returns its
//! work as [`Effect`]s instead of performing I/O, so the transitions are
//! testable without a backend or a runtime; the main loop executes the
//! effects against the real world.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::{debug, warn};

use shopwatch_api_client::ApiError;
use shopwatch_api_types::{RunSummary, StartRunRequest};
use shopwatch_core::rewrite::{self, Segment};

use crate::async_ops::{AsyncCommand, CommandResult, FetchReason};
use crate::config::{self, AppConfig, MODEL_OPTIONS};
use crate::handoff::{self, Handoff};
use crate::run::{FollowUp, RunController, RunPhase};

/// Ready-made tasks shown on the launch form, selectable with F1..F3.
pub const SAMPLE_TASKS: &[&str] = &[
    "Find a wireless mouse under $30 with at least a 4-star rating and add it to the cart",
    "Compare prices for Sony WH-1000XM5 headphones across two stores and report the cheapest",
    "Find a red cotton t-shirt in size M, check delivery time, and add it to the cart",
];

const BANNER_TTL: Duration = Duration::from_secs(5);

/// Side effect requested by a state transition.
#[derive(Debug)]
pub enum Effect {
    Api(AsyncCommand),
    /// Attach a push subscription at this WebSocket URL to the controller.
    OpenChannel { url: String },
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    NewRun,
    Session,
    History,
}

/// Transient error surface; expires on its own.
#[derive(Debug, Clone)]
pub struct Banner {
    pub message: String,
    pub detail: Option<String>,
    shown_at: Instant,
}

impl Banner {
    fn new(message: impl Into<String>, detail: Option<String>) -> Self {
        Self {
            message: message.into(),
            detail,
            shown_at: Instant::now(),
        }
    }

    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= BANNER_TTL
    }
}

/// Cursor state of the prompt rewriter: which filter segment is selected
/// and which candidate replacement is up.
#[derive(Debug, Default)]
pub struct Rewriter {
    pub selected: Option<usize>,
    pub alternative: usize,
}

pub struct App {
    pub config: AppConfig,
    /// Where the hand-off slot and the saved config live; `None` disables
    /// both persistence paths.
    state_dir: Option<PathBuf>,
    pub view: View,
    pub controller: RunController,
    pub banner: Option<Banner>,

    // Launch form
    pub task_input: String,
    pub model_index: usize,

    // Session view
    pub rewriter: Rewriter,
    pub selected_step: Option<u32>,
    /// Rewritten task waiting for the current run's stop to be acknowledged.
    pending_relaunch: Option<String>,

    // History view
    pub history: Vec<RunSummary>,
    pub history_total: u64,
    pub history_page: u32,
    pub history_selected: usize,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        let model_index = MODEL_OPTIONS
            .iter()
            .position(|m| *m == config.agent.llm_model_name)
            .unwrap_or(0);
        Self {
            config,
            state_dir: config::config_dir(),
            view: View::NewRun,
            controller: RunController::new(),
            banner: None,
            task_input: String::new(),
            model_index,
            rewriter: Rewriter::default(),
            selected_step: None,
            pending_relaunch: None,
            history: Vec::new(),
            history_total: 0,
            history_page: 1,
            history_selected: 0,
        }
    }

    /// Resume a session left behind by a previous process, if the hand-off
    /// slot holds one.
    pub fn resume_from_handoff(&mut self) -> Vec<Effect> {
        let Some(dir) = self.state_dir.clone() else {
            return Vec::new();
        };
        let Some(Handoff {
            client_id,
            run_id,
            dynamic_filters,
            task,
        }) = handoff::take(&dir)
        else {
            return Vec::new();
        };

        debug!("resuming session for client {client_id}, run {run_id}");
        self.controller = RunController::new();
        self.controller.lifecycle.start_issued();
        self.controller.lifecycle.start_succeeded();
        self.controller.client_id = Some(client_id.clone());
        self.controller.run_id = Some(run_id.clone());
        self.controller.task = task;
        self.controller.dynamic_filters = dynamic_filters;
        self.view = View::Session;
        vec![
            Effect::OpenChannel {
                url: shopwatch_api_client::push_channel_url(&self.config.server.url, &client_id),
            },
            // Catch up on frames pushed while no process was subscribed.
            Effect::Api(AsyncCommand::FetchRun {
                run_id,
                reason: FetchReason::Mount,
            }),
        ]
    }

    /// Attach directly to a persisted run (read-only, no push channel).
    pub fn open_run(&mut self, run_id: &str) -> Vec<Effect> {
        self.controller = RunController::new();
        self.controller.run_id = Some(run_id.to_string());
        self.rewriter = Rewriter::default();
        self.selected_step = None;
        self.view = View::Session;
        vec![Effect::Api(AsyncCommand::FetchRun {
            run_id: run_id.to_string(),
            reason: FetchReason::Mount,
        })]
    }

    /// Start a run with the given task text.
    pub fn start_run(&mut self, task: String) -> Vec<Effect> {
        if task.trim().is_empty() {
            self.banner = Some(Banner::new("Enter a task first", None));
            return Vec::new();
        }
        self.controller = RunController::new();
        self.controller.lifecycle.start_issued();
        self.controller.task = task.clone();
        self.rewriter = Rewriter::default();
        self.selected_step = None;

        let mut settings = self.config.agent.clone();
        settings.llm_model_name = MODEL_OPTIONS[self.model_index].to_string();
        vec![Effect::Api(AsyncCommand::StartRun {
            request: StartRunRequest {
                task,
                user_id: self.config.identity.user_id.clone(),
                settings,
            },
        })]
    }

    /// Expire the banner. Called once per frame.
    pub fn tick(&mut self) {
        if self
            .banner
            .as_ref()
            .is_some_and(|b| b.expired(Instant::now()))
        {
            self.banner = None;
        }
    }

    // ─── Input ───────────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return vec![Effect::Quit];
        }
        // Esc dismisses an active banner before it navigates.
        if key.code == KeyCode::Esc && self.banner.take().is_some() {
            return Vec::new();
        }
        match self.view {
            View::NewRun => self.handle_new_run_key(key),
            View::Session => self.handle_session_key(key),
            View::History => self.handle_history_key(key),
        }
    }

    fn handle_new_run_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Enter => self.start_run(self.task_input.clone()),
            KeyCode::Backspace => {
                self.task_input.pop();
                Vec::new()
            }
            KeyCode::Tab => {
                self.model_index = (self.model_index + 1) % MODEL_OPTIONS.len();
                Vec::new()
            }
            KeyCode::F(n @ 1..=3) => {
                self.task_input = SAMPLE_TASKS[(n - 1) as usize].to_string();
                Vec::new()
            }
            KeyCode::Esc => vec![Effect::Quit],
            KeyCode::Char(c) => {
                self.task_input.push(c);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn handle_session_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Char('s') => self.request_stop(),
            KeyCode::Char('n') | KeyCode::Esc => {
                // Leaving the session drops the controller, which closes
                // any open channel.
                self.controller = RunController::new();
                self.rewriter = Rewriter::default();
                self.selected_step = None;
                self.view = View::NewRun;
                Vec::new()
            }
            KeyCode::Char('h') => self.goto_history(),
            KeyCode::Up => {
                self.move_step_selection(-1);
                Vec::new()
            }
            KeyCode::Down => {
                self.move_step_selection(1);
                Vec::new()
            }
            KeyCode::Char(' ') => {
                if let Some(step) = self.selected_step {
                    self.controller.timeline.toggle_step(step);
                }
                Vec::new()
            }
            KeyCode::Tab => {
                self.select_next_filter();
                Vec::new()
            }
            KeyCode::Left => {
                self.cycle_alternative(-1);
                Vec::new()
            }
            KeyCode::Right => {
                self.cycle_alternative(1);
                Vec::new()
            }
            KeyCode::Enter => self.apply_rewrite(),
            _ => Vec::new(),
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) -> Vec<Effect> {
        match key.code {
            KeyCode::Char('n') | KeyCode::Esc => {
                self.view = View::NewRun;
                Vec::new()
            }
            KeyCode::Up => {
                self.history_selected = self.history_selected.saturating_sub(1);
                Vec::new()
            }
            KeyCode::Down => {
                if self.history_selected + 1 < self.history.len() {
                    self.history_selected += 1;
                }
                Vec::new()
            }
            KeyCode::Left => self.goto_history_page(self.history_page.saturating_sub(1).max(1)),
            KeyCode::Right => {
                let last_page = self.last_history_page();
                self.goto_history_page((self.history_page + 1).min(last_page))
            }
            KeyCode::Enter => match self.history.get(self.history_selected) {
                Some(row) => {
                    let run_id = row.id.clone();
                    self.open_run(&run_id)
                }
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    pub fn goto_history(&mut self) -> Vec<Effect> {
        self.view = View::History;
        self.history_selected = 0;
        self.goto_history_page(1)
    }

    fn goto_history_page(&mut self, page: u32) -> Vec<Effect> {
        self.history_page = page;
        vec![Effect::Api(AsyncCommand::FetchHistory {
            user_id: self.config.identity.user_id.clone(),
            page,
        })]
    }

    fn last_history_page(&self) -> u32 {
        let per_page = u64::from(crate::async_ops::HISTORY_PAGE_SIZE);
        (self.history_total.div_ceil(per_page).max(1)) as u32
    }

    fn move_step_selection(&mut self, delta: i64) {
        let steps: Vec<u32> = self.controller.timeline.steps().collect();
        if steps.is_empty() {
            return;
        }
        let current = self
            .selected_step
            .and_then(|s| steps.iter().position(|&x| x == s))
            .unwrap_or(steps.len() - 1);
        let next = (current as i64 + delta).clamp(0, steps.len() as i64 - 1) as usize;
        self.selected_step = Some(steps[next]);
    }

    // ─── Rewriter ────────────────────────────────────────────────────────────

    /// The session task split into plain and filter segments.
    pub fn task_segments(&self) -> Vec<Segment> {
        rewrite::highlight(&self.controller.task, &self.controller.dynamic_filters)
    }

    fn filter_segment_indices(&self) -> Vec<usize> {
        self.task_segments()
            .iter()
            .enumerate()
            .filter(|(_, s)| matches!(s, Segment::Filter { .. }))
            .map(|(i, _)| i)
            .collect()
    }

    fn select_next_filter(&mut self) {
        let filters = self.filter_segment_indices();
        if filters.is_empty() {
            return;
        }
        self.rewriter.alternative = 0;
        self.rewriter.selected = Some(match self.rewriter.selected {
            Some(current) => {
                let pos = filters.iter().position(|&i| i == current).unwrap_or(0);
                filters[(pos + 1) % filters.len()]
            }
            None => filters[0],
        });
    }

    /// Candidate replacements for the currently selected filter segment.
    pub fn selected_alternatives(&self) -> Vec<String> {
        let Some(index) = self.rewriter.selected else {
            return Vec::new();
        };
        let segments = self.task_segments();
        let Some(Segment::Filter { key, .. }) = segments.get(index) else {
            return Vec::new();
        };
        self.controller
            .dynamic_filters
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    fn cycle_alternative(&mut self, delta: i64) {
        let count = self.selected_alternatives().len();
        if count == 0 {
            return;
        }
        let next = (self.rewriter.alternative as i64 + delta).rem_euclid(count as i64);
        self.rewriter.alternative = next as usize;
    }

    /// Apply the selected replacement: rewrite the task, stop the current
    /// run, and relaunch with the rewritten text once the stop resolves.
    fn apply_rewrite(&mut self) -> Vec<Effect> {
        let Some(index) = self.rewriter.selected else {
            return Vec::new();
        };
        let segments = self.task_segments();
        let Some(Segment::Filter { key, .. }) = segments.get(index) else {
            return Vec::new();
        };
        let alternatives = self.selected_alternatives();
        let Some(option) = alternatives.get(self.rewriter.alternative) else {
            return Vec::new();
        };
        let rewritten = rewrite::replace(&self.controller.task, key, option);

        if self.controller.lifecycle.phase == RunPhase::Live {
            self.pending_relaunch = Some(rewritten);
            self.request_stop()
        } else {
            // Nothing to stop; relaunch immediately.
            self.start_run(rewritten)
        }
    }

    fn request_stop(&mut self) -> Vec<Effect> {
        if self.controller.lifecycle.stop_issued() {
            vec![Effect::Api(AsyncCommand::StopRun)]
        } else {
            Vec::new()
        }
    }

    // ─── Async results ───────────────────────────────────────────────────────

    pub fn handle_result(&mut self, result: CommandResult) -> Vec<Effect> {
        match result {
            CommandResult::RunStarted(Ok(response)) => {
                self.controller.run_started(&response);
                self.task_input.clear();
                self.view = View::Session;

                // A model picked on the form becomes the new default.
                let chosen_model = MODEL_OPTIONS[self.model_index];
                if self.config.agent.llm_model_name != chosen_model {
                    self.config.agent.llm_model_name = chosen_model.to_string();
                    if let Some(dir) = self.state_dir.clone() {
                        if let Err(e) = config::save_config(&dir, &self.config) {
                            debug!("config save failed: {e}");
                        }
                    }
                }

                // Leave a trail so a restarted process can re-attach.
                if let Some(dir) = self.state_dir.clone() {
                    if let Err(e) = handoff::write(
                        &dir,
                        &Handoff {
                            client_id: response.client_id.clone(),
                            run_id: response.run_id.clone(),
                            dynamic_filters: response.dynamic_filters.clone(),
                            task: response.task.clone(),
                        },
                    ) {
                        debug!("handoff write failed: {e}");
                    }
                }

                let mut effects = vec![Effect::OpenChannel {
                    url: shopwatch_api_client::push_channel_url(
                        &self.config.server.url,
                        &response.client_id,
                    ),
                }];
                // Eager snapshot in case frames were pushed before we
                // subscribed.
                effects.push(Effect::Api(AsyncCommand::FetchRun {
                    run_id: response.run_id,
                    reason: FetchReason::Mount,
                }));
                effects
            }
            CommandResult::RunStarted(Err(ApiError::Validation { message, detail })) => {
                self.controller.lifecycle.start_failed();
                self.view = View::NewRun;
                // Backend wording verbatim; the task stays for editing.
                self.banner = Some(Banner::new(message, Some(detail)));
                Vec::new()
            }
            CommandResult::RunStarted(Err(err)) => {
                self.controller.lifecycle.start_failed();
                self.view = View::NewRun;
                warn!("start failed: {err}");
                self.banner = Some(Banner::new("Could not start the run", None));
                Vec::new()
            }
            CommandResult::RunStopped(Ok(())) => {
                self.controller.lifecycle.stop_succeeded();
                self.controller.close_channel();

                if let Some(task) = self.pending_relaunch.take() {
                    return self.start_run(task);
                }
                // No finished frame is coming; settle from the snapshot.
                match self.controller.run_id.clone() {
                    Some(run_id) => vec![Effect::Api(AsyncCommand::FetchRun {
                        run_id,
                        reason: FetchReason::Reconcile,
                    })],
                    None => Vec::new(),
                }
            }
            CommandResult::RunStopped(Err(err)) => {
                // Diagnostic only; the displayed status reverts, no banner.
                // The subscription is gone either way once a stop was issued.
                warn!("stop request failed: {err}");
                self.controller.close_channel();
                self.controller.lifecycle.stop_failed();
                self.pending_relaunch = None;
                Vec::new()
            }
            CommandResult::RunFetched {
                run_id,
                reason,
                result,
            } => {
                // A fetch issued for a run the app has since left (relaunch,
                // navigation) must not touch the current controller.
                if self.controller.run_id.as_deref() != Some(run_id.as_str()) {
                    debug!("dropping fetch result for superseded run {run_id}");
                    return Vec::new();
                }
                match result {
                    Ok(record) => {
                        self.controller
                            .apply_record(&record, reason == FetchReason::Reconcile);
                    }
                    Err(ApiError::NotFound) => {
                        self.banner = Some(Banner::new("Run not found", None));
                    }
                    Err(err) if reason == FetchReason::Reconcile => {
                        warn!("reconcile fetch failed: {err}");
                        self.banner =
                            Some(Banner::new("Could not load the final run record", None));
                    }
                    Err(err) => {
                        // The live stream still feeds the view.
                        debug!("mount fetch failed: {err}");
                    }
                }
                Vec::new()
            }
            CommandResult::HistoryFetched(Ok(list)) => {
                self.history = list.agent_runs;
                self.history_total = list.total;
                self.history_selected = self.history_selected.min(self.history.len().saturating_sub(1));
                Vec::new()
            }
            CommandResult::HistoryFetched(Err(err)) => {
                warn!("history fetch failed: {err}");
                self.banner = Some(Banner::new("Could not load run history", None));
                Vec::new()
            }
        }
    }

    // ─── Push channel ────────────────────────────────────────────────────────

    /// Drain the push subscription and turn follow-ups into effects.
    pub fn pump_channel(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        for follow_up in self.controller.poll_channel() {
            match follow_up {
                FollowUp::Reconcile { run_id } if !self.controller.reconciled => {
                    effects.push(Effect::Api(AsyncCommand::FetchRun {
                        run_id,
                        reason: FetchReason::Reconcile,
                    }));
                }
                FollowUp::Reconcile { .. } => {}
            }
        }
        effects
    }
}
