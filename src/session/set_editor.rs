//! Set editor - draft values and completion toggle for one set
//!
//! Drafts are kept in the user's display unit; saving converts weight back
//! to kg. Completion is flipped before the server answers and reverted if
//! the write fails. Every save carries a revision so that a slow response
//! can never overwrite the result of a newer save.

use std::time::{Duration, Instant};

use tracing::{debug, error, warn};

use super::SessionError;
use crate::api::{ApiResult, WorkoutApi};
use crate::models::{Exercise, Id, SetPayload, TrackedMetric, WorkoutSet};
use crate::timer::Countdown;
use crate::units::UnitSystem;

/// Sets longer than this are run against the countdown
pub const TIMED_SET_THRESHOLD_SECS: u32 = 10;

/// How long a validation error stays highlighted
pub const ERROR_FLASH: Duration = Duration::from_secs(1);

/// Editable fields, weight in display units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetDraft {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub rpe: Option<f64>,
    pub tempo: Option<String>,
    pub duration_secs: Option<u32>,
}

/// Previous session's values for this exercise + set number (display units)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryHint {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
}

/// A save that has been applied locally and is waiting for the server
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSave {
    pub revision: u64,
    pub set_id: Option<Id>, // None = create
    pub payload: SetPayload,
}

#[derive(Debug, Clone)]
pub struct SetEditor {
    key: u64, // stable within the owning card, unlike set_number
    record: WorkoutSet,
    draft: SetDraft,
    metrics: Vec<TrackedMetric>,
    exercise_id: Id,
    units: UnitSystem,
    completed: bool,
    saved: bool,
    history: Option<HistoryHint>,
    history_requested: bool,
    error_until: Option<Instant>,
    missing: Vec<TrackedMetric>,
    issued_revision: u64,
}

impl SetEditor {
    pub fn new(record: WorkoutSet, exercise: Option<&Exercise>, exercise_id: Id, units: UnitSystem) -> Self {
        let draft = SetDraft {
            weight: record.weight_kg.filter(|w| *w != 0.0).map(|kg| units.to_display(kg)),
            reps: record.reps,
            rpe: record.rpe,
            tempo: record.tempo.clone(),
            duration_secs: record.duration_seconds,
        };
        let metrics = TrackedMetric::parse_list(exercise.and_then(|e| e.tracked_metrics.as_deref()));
        Self {
            key: 0,
            completed: record.completed,
            saved: record.is_persisted(),
            record,
            draft,
            metrics,
            exercise_id,
            units,
            history: None,
            history_requested: false,
            error_until: None,
            missing: Vec::new(),
            issued_revision: 0,
        }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub(crate) fn set_key(&mut self, key: u64) {
        self.key = key;
    }

    pub fn record(&self) -> &WorkoutSet {
        &self.record
    }

    /// Record as the exercise list should see it: local completion state included
    pub fn current(&self) -> WorkoutSet {
        WorkoutSet {
            completed: self.completed,
            ..self.record.clone()
        }
    }

    pub fn draft(&self) -> &SetDraft {
        &self.draft
    }

    pub fn set_number(&self) -> u32 {
        self.record.set_number
    }

    pub(crate) fn renumber(&mut self, set_number: u32) {
        self.record.set_number = set_number;
    }

    pub fn metrics(&self) -> &[TrackedMetric] {
        &self.metrics
    }

    pub fn shows(&self, metric: TrackedMetric) -> bool {
        self.metrics.contains(&metric)
    }

    /// Swap to another catalog exercise: recorded values stay, field set changes
    pub(crate) fn retarget(&mut self, exercise: &Exercise) {
        self.exercise_id = exercise.id;
        self.metrics = exercise.metrics();
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub fn is_persisted(&self) -> bool {
        self.record.is_persisted()
    }

    pub fn history(&self) -> Option<HistoryHint> {
        self.history
    }

    /// Run against a countdown rather than counted reps
    pub fn is_timed(&self) -> bool {
        self.draft.duration_secs.is_some_and(|d| d > TIMED_SET_THRESHOLD_SECS) || self.shows(TrackedMetric::Time)
    }

    // ---- draft edits ----

    pub fn set_weight(&mut self, weight: Option<f64>) {
        self.draft.weight = weight;
        self.touch();
    }

    pub fn set_reps(&mut self, reps: Option<u32>) {
        self.draft.reps = reps;
        self.touch();
    }

    pub fn set_duration(&mut self, duration_secs: Option<u32>) {
        self.draft.duration_secs = duration_secs;
        self.touch();
    }

    pub fn set_rpe(&mut self, rpe: Option<f64>) {
        self.draft.rpe = rpe;
        self.saved = false;
        self.completed = false;
    }

    pub fn set_tempo(&mut self, tempo: Option<String>) {
        self.draft.tempo = tempo.filter(|t| !t.trim().is_empty());
        self.saved = false;
    }

    /// Any edit to a main field reopens the set and clears the error flash
    fn touch(&mut self) {
        self.saved = false;
        self.completed = false;
        self.error_until = None;
        self.missing.clear();
    }

    /// Weight carried over from the previous set. Only fills an empty,
    /// still-open draft.
    pub fn forward_fill_weight(&mut self, weight_kg: f64) {
        if self.draft.weight.is_none() && !self.completed {
            self.draft.weight = Some(self.units.to_display(weight_kg));
        }
        if self.record.weight_kg.is_none_or(|w| w == 0.0) {
            self.record.weight_kg = Some(weight_kg);
        }
    }

    // ---- history hint ----

    /// Fetch last session's values the first time the set is shown.
    /// Failures just mean no hint.
    pub async fn load_history(&mut self, api: &dyn WorkoutApi, current_workout_id: Option<Id>) {
        if self.history_requested {
            return;
        }
        self.history_requested = true;
        if self.draft.weight.is_some() || self.completed {
            return;
        }

        match api.last_set(self.exercise_id, self.record.set_number, current_workout_id).await {
            Ok(Some(last)) => {
                let hint = HistoryHint {
                    weight: last.weight_kg.map(|kg| self.units.to_display(kg)),
                    reps: last.reps,
                };
                if self.draft.weight.is_none() {
                    self.draft.weight = hint.weight;
                }
                if self.draft.reps.is_none() {
                    self.draft.reps = hint.reps;
                }
                self.history = Some(hint);
            }
            Ok(None) => {}
            Err(e) => debug!("No history for exercise {} set {}: {}", self.exercise_id, self.record.set_number, e),
        }
    }

    // ---- validation ----

    /// Metrics that must be filled before the set can be saved
    pub fn missing_fields(&self) -> Vec<TrackedMetric> {
        let mut missing = Vec::new();
        if self.shows(TrackedMetric::Reps) && self.draft.reps.is_none() && !self.is_timed() {
            missing.push(TrackedMetric::Reps);
        }
        if self.shows(TrackedMetric::Time) && self.draft.duration_secs.is_none() {
            missing.push(TrackedMetric::Time);
        }
        missing
    }

    /// Fields currently flashing as invalid
    pub fn error_fields(&self, now: Instant) -> &[TrackedMetric] {
        match self.error_until {
            Some(until) if now < until => &self.missing,
            _ => &[],
        }
    }

    pub fn has_error(&self, now: Instant) -> bool {
        !self.error_fields(now).is_empty()
    }

    // ---- save ----

    /// Validate, flip completion locally and build the request.
    /// Nothing is sent when validation fails.
    pub fn begin_save(&mut self, now: Instant) -> Result<PendingSave, SessionError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            self.error_until = Some(now + ERROR_FLASH);
            self.missing = missing.clone();
            return Err(SessionError::Validation(missing));
        }

        self.completed = !self.completed;
        self.issued_revision += 1;

        let weight_kg = match self.draft.weight {
            Some(w) => Some(self.units.to_kg(w)),
            None if self.shows(TrackedMetric::Weight) => Some(0.0),
            None => None,
        };

        Ok(PendingSave {
            revision: self.issued_revision,
            set_id: self.record.is_persisted().then_some(self.record.id),
            payload: SetPayload {
                workout_exercise_id: self.record.workout_exercise_id,
                set_number: self.record.set_number,
                reps: self.draft.reps,
                weight_kg,
                rpe: self.draft.rpe,
                tempo: self.draft.tempo.clone(),
                duration_seconds: self.draft.duration_secs,
                completed: self.completed,
            },
        })
    }

    /// Apply the server's answer to a save. Answers to anything but the
    /// latest issued save are dropped. Returns the stored set when applied.
    pub fn finish_save(&mut self, pending: &PendingSave, result: ApiResult<WorkoutSet>) -> ApiResult<Option<WorkoutSet>> {
        if pending.revision != self.issued_revision {
            debug!(
                "Dropping stale save response for set {} (revision {} < {})",
                self.record.set_number, pending.revision, self.issued_revision
            );
            return Ok(None);
        }

        match result {
            Ok(stored) => {
                self.completed = stored.completed;
                self.saved = true;
                self.record = stored.clone();
                Ok(Some(stored))
            }
            Err(e) => {
                error!("Failed to save set {}: {}", self.record.set_number, e);
                self.completed = !pending.payload.completed;
                Err(e)
            }
        }
    }

    /// Toggle completion and persist: create on first save, update afterwards
    pub async fn save(&mut self, api: &dyn WorkoutApi, now: Instant) -> Result<Option<WorkoutSet>, SessionError> {
        let pending = self.begin_save(now)?;
        let result = match pending.set_id {
            Some(id) => api.update_set(id, &pending.payload).await,
            None => api.create_set(&pending.payload).await,
        };
        Ok(self.finish_save(&pending, result)?)
    }

    /// Countdown for a timed set, seeded from the draft duration
    pub fn countdown(&self) -> Countdown {
        Countdown::new(self.draft.duration_secs.unwrap_or(0))
    }

    /// Countdown finished: log the set unless it is already done
    pub async fn on_countdown_done(&mut self, api: &dyn WorkoutApi, now: Instant) -> Result<Option<WorkoutSet>, SessionError> {
        if self.completed {
            return Ok(None);
        }
        self.save(api, now).await
    }

    // ---- delete ----

    /// Remove the set on the server when it exists there. The caller drops
    /// the editor only after this succeeds.
    pub async fn delete_remote(&self, api: &dyn WorkoutApi) -> Result<(), SessionError> {
        if !self.record.is_persisted() {
            return Ok(());
        }
        if let Err(e) = api.delete_set(self.record.id).await {
            warn!("Failed to delete set {}: {}", self.record.id, e);
            return Err(e.into());
        }
        Ok(())
    }
}
