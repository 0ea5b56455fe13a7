//! Append-only projection of normalized events into a render-ready,
//! step-grouped timeline.
//!
//! The model is exclusively owned by one run view and discarded on
//! navigation. Events are never deduplicated; the single destructive
//! operation is [`TimelineModel::replace_all`], used when the persisted run
//! record becomes authoritative after `agent_finished`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::event::{AgentPhase, EventPayload, NormalizedEvent, ScreenshotSource, UpdatePayload};

#[derive(Debug, Default, Clone)]
pub struct TimelineModel {
    events: Vec<NormalizedEvent>,
    steps: BTreeSet<u32>,
    /// Manual expand/collapse choices, keyed by step. Cleared whenever a new
    /// step arrives, at which point the auto policy resumes.
    manual_collapse: HashMap<u32, bool>,
}

impl TimelineModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the model. Total; there is no error path because
    /// malformed input never gets past the normalizer.
    pub fn append(&mut self, event: NormalizedEvent) {
        let grew = self.steps.insert(event.step);
        if grew {
            // Auto-collapse re-evaluates: all but the numerically largest
            // step collapse, and manual overrides reset.
            self.manual_collapse.clear();
        }
        self.events.push(event);
    }

    /// Discard the current event sequence in favor of the authoritative
    /// persisted ordering. The swap is complete before this returns; no
    /// partially-replaced state is observable, and replaying the same
    /// snapshot is idempotent.
    pub fn replace_all(&mut self, events: Vec<NormalizedEvent>) {
        let steps = events.iter().map(|e| e.step).collect();
        self.events = events;
        self.steps = steps;
        self.manual_collapse.clear();
    }

    pub fn events(&self) -> &[NormalizedEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Distinct steps in ascending order.
    pub fn steps(&self) -> impl Iterator<Item = u32> + '_ {
        self.steps.iter().copied()
    }

    pub fn latest_step(&self) -> Option<u32> {
        self.steps.last().copied()
    }

    /// Partition of the event sequence by step: steps ascend, arrival order
    /// is preserved within a step.
    pub fn group_by_step(&self) -> BTreeMap<u32, Vec<&NormalizedEvent>> {
        let mut groups: BTreeMap<u32, Vec<&NormalizedEvent>> = BTreeMap::new();
        for event in &self.events {
            groups.entry(event.step).or_default().push(event);
        }
        groups
    }

    /// Whether a step renders collapsed. Manual toggles win until the next
    /// new step; otherwise every step but the largest is collapsed.
    pub fn is_collapsed(&self, step: u32) -> bool {
        if let Some(&manual) = self.manual_collapse.get(&step) {
            return manual;
        }
        match self.latest_step() {
            Some(latest) => step != latest,
            None => false,
        }
    }

    pub fn toggle_step(&mut self, step: u32) {
        let collapsed = self.is_collapsed(step);
        self.manual_collapse.insert(step, !collapsed);
    }

    /// Derived agent status: the most recent status-change event, if any.
    pub fn phase(&self) -> Option<AgentPhase> {
        self.events.iter().rev().find_map(|e| match &e.payload {
            EventPayload::Status(status) => Some(status.status),
            _ => None,
        })
    }

    /// Most recent screenshot frame, for the browser pane.
    pub fn latest_screenshot(&self) -> Option<&ScreenshotSource> {
        self.events.iter().rev().find_map(|e| match &e.payload {
            EventPayload::Screenshot(shot) => Some(&shot.image),
            _ => None,
        })
    }

    /// Most recent progress update, for the status sidebar.
    pub fn latest_update(&self) -> Option<(u32, &UpdatePayload)> {
        self.events.iter().rev().find_map(|e| match &e.payload {
            EventPayload::Update(update) => Some((e.step, update)),
            _ => None,
        })
    }

    /// Whether an `agent_finished` signal has been projected.
    pub fn has_finished(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e.payload, EventPayload::Finished))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::StatusPayload;
    use crate::testing;

    #[test]
    fn group_by_step_partitions_without_loss() {
        let mut model = TimelineModel::new();
        let events = vec![
            testing::log_event(2, "Summary", "late step first"),
            testing::log_event(0, "Summary", "start"),
            testing::update_event(0, "progressing"),
            testing::action_event(1, r#"{"go_to_url":{"url":"https://x.com"}}"#, 1, 1),
            testing::log_event(1, "Result", "found"),
            testing::log_event(0, "Result", "also step 0"),
        ];
        for event in events.clone() {
            model.append(event);
        }

        let groups = model.group_by_step();

        // Complete partition: re-sorting the group members by arrival index
        // reproduces the input sequence exactly.
        let mut recovered: Vec<NormalizedEvent> =
            groups.values().flatten().map(|e| (*e).clone()).collect();
        recovered.sort_by_key(|e| events.iter().position(|orig| orig == e).unwrap());
        assert_eq!(recovered, events);

        // Steps iterate ascending regardless of arrival order.
        let steps: Vec<u32> = groups.keys().copied().collect();
        assert_eq!(steps, vec![0, 1, 2]);

        // Arrival order is preserved within a step.
        let step0 = &groups[&0];
        assert_eq!(step0.len(), 3);
        assert_eq!(step0[0], &events[1]);
        assert_eq!(step0[2], &events[5]);
        assert_eq!(groups[&1].len(), 2);
    }

    #[test]
    fn new_step_collapses_all_but_largest() {
        let mut model = TimelineModel::new();
        model.append(testing::log_event(0, "Summary", "a"));
        assert!(!model.is_collapsed(0));

        model.append(testing::log_event(1, "Summary", "b"));
        assert!(model.is_collapsed(0));
        assert!(!model.is_collapsed(1));

        model.append(testing::log_event(2, "Summary", "c"));
        assert!(model.is_collapsed(0));
        assert!(model.is_collapsed(1));
        assert!(!model.is_collapsed(2));
    }

    #[test]
    fn manual_toggle_survives_events_in_known_steps() {
        let mut model = TimelineModel::new();
        model.append(testing::log_event(0, "Summary", "a"));
        model.append(testing::log_event(1, "Summary", "b"));

        model.toggle_step(0);
        assert!(!model.is_collapsed(0));

        // More events in already-known steps leave the override alone.
        model.append(testing::update_event(1, "still step 1"));
        assert!(!model.is_collapsed(0));
    }

    #[test]
    fn manual_toggle_resets_when_a_new_step_arrives() {
        let mut model = TimelineModel::new();
        model.append(testing::log_event(0, "Summary", "a"));
        model.append(testing::log_event(1, "Summary", "b"));
        model.toggle_step(0);
        assert!(!model.is_collapsed(0));

        model.append(testing::log_event(2, "Summary", "c"));
        assert!(model.is_collapsed(0));
        assert!(model.is_collapsed(1));
        assert!(!model.is_collapsed(2));
    }

    #[test]
    fn replace_all_discards_live_events() {
        let mut model = TimelineModel::new();
        model.append(testing::log_event(0, "Summary", "live"));
        model.append(testing::finished_event());

        let snapshot = vec![
            testing::log_event(0, "Summary", "authoritative"),
            testing::update_event(0, "done"),
            testing::log_event(1, "Result", "found it"),
        ];
        model.replace_all(snapshot.clone());

        assert_eq!(model.events(), snapshot.as_slice());
        assert!(!model.has_finished());
        assert_eq!(model.latest_step(), Some(1));
    }

    #[test]
    fn replace_all_is_idempotent() {
        let snapshot = vec![
            testing::log_event(0, "Summary", "a"),
            testing::log_event(1, "Result", "b"),
        ];

        let mut once = TimelineModel::new();
        once.append(testing::log_event(0, "Summary", "live noise"));
        once.replace_all(snapshot.clone());

        let mut twice = once.clone();
        twice.replace_all(snapshot.clone());

        assert_eq!(once.events(), twice.events());
        assert_eq!(
            once.group_by_step().keys().collect::<Vec<_>>(),
            twice.group_by_step().keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn phase_is_latest_status_change() {
        let mut model = TimelineModel::new();
        assert_eq!(model.phase(), None);

        model.append(testing::status_event(AgentPhase::Running));
        model.append(testing::log_event(0, "Summary", "working"));
        assert_eq!(model.phase(), Some(AgentPhase::Running));

        model.append(testing::status_event(AgentPhase::Completed));
        assert_eq!(model.phase(), Some(AgentPhase::Completed));
    }

    #[test]
    fn latest_screenshot_and_update_track_arrival_order() {
        let mut model = TimelineModel::new();
        model.append(testing::screenshot_event("aaaa"));
        model.append(testing::update_event(0, "first"));
        model.append(testing::screenshot_event("bbbb"));
        model.append(testing::update_event(1, "second"));

        assert_eq!(
            model.latest_screenshot(),
            Some(&ScreenshotSource::Inline("bbbb".to_string()))
        );
        let (step, update) = model.latest_update().unwrap();
        assert_eq!(step, 1);
        assert_eq!(update.task_progress, "second");
    }

    #[test]
    fn status_event_helper_round_trips() {
        let event = testing::status_event(AgentPhase::Failed);
        assert_eq!(
            event.payload,
            EventPayload::Status(StatusPayload {
                status: AgentPhase::Failed
            })
        );
    }
}
