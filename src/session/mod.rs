//! Workout session - the in-gym state machine
//!
//! Owns the active workout for the lifetime of a session and keeps it
//! roughly in sync with the server, one best-effort call per mutation.
//!
//! ```text
//! Uninitialized --load--> NoActiveWorkout <--finish/discard-- Active
//!                               |                               ^
//!                               +---start empty / start day-----+
//! ```

pub mod card;
pub mod cursor;
pub mod set_editor;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::{ApiError, WorkoutApi};
use crate::models::{
    parse_rep_target, Exercise, Id, NewWorkout, RoutineDay, RoutineDayResponse, SetPayload,
    SuggestedWorkout, TemplateExercise, TrackedMetric, Workout, WorkoutExercise, WorkoutExercisePayload,
    WorkoutSummary,
};
use crate::units::UnitSystem;

pub use card::{ExerciseCard, SetSaved};
pub use cursor::{Cursor, AUTO_ADVANCE_DELAY};
pub use set_editor::{SetDraft, SetEditor};

/// Notes given to a workout started without a routine
pub const QUICK_WORKOUT_NOTES: &str = "Quick Workout";

/// Catalog exercises seeded into a quick workout
const QUICK_WORKOUT_EXERCISES: usize = 3;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("no workout in progress")]
    NoActiveWorkout,

    #[error("a workout is already in progress")]
    WorkoutInProgress,

    #[error("missing required fields: {}", join_metrics(.0))]
    Validation(Vec<TrackedMetric>),

    #[error("no exercise at position {0}")]
    UnknownExercise(usize),

    #[error("no workout exercise with id {0}")]
    UnknownWorkoutExercise(Id),

    #[error("no set at position {0}")]
    UnknownSet(usize),
}

fn join_metrics(metrics: &[TrackedMetric]) -> String {
    metrics.iter().map(|m| m.label()).collect::<Vec<_>>().join(", ")
}

/// Everything a session needs from outside: the server, who the user is,
/// and display preferences. Replaces ambient globals; dropped with the session.
#[derive(Clone)]
pub struct SessionContext {
    pub api: Arc<dyn WorkoutApi>,
    pub user_id: Id,
    pub units: UnitSystem,
    pub auto_advance_delay: Duration,
}

impl SessionContext {
    pub fn new(api: Arc<dyn WorkoutApi>, user_id: Id, units: UnitSystem) -> Self {
        Self {
            api,
            user_id,
            units,
            auto_advance_delay: AUTO_ADVANCE_DELAY,
        }
    }
}

/// Direction for moving the current exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Handle to one set that stays valid while exercises and sets move around
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetRef {
    pub workout_exercise_id: Id,
    pub key: u64,
}

/// The in-progress workout and everything shown about it
#[derive(Debug, Clone)]
pub struct ActiveWorkout {
    pub workout: Workout, // exercises live in `cards`
    pub cards: Vec<ExerciseCard>,
    pub cursor: Cursor,
    /// Editing an already finished workout; finishing only closes the view
    pub edit_mode: bool,
}

impl ActiveWorkout {
    fn new(mut workout: Workout, units: UnitSystem, edit_mode: bool, explicit_index: Option<usize>) -> Self {
        let mut exercises = std::mem::take(&mut workout.exercises);
        exercises.sort_by_key(|we| we.sequence);
        let cursor = match explicit_index {
            Some(index) => Cursor::at(index, exercises.len()),
            None if edit_mode => Cursor::new(),
            None => Cursor::resume(&exercises),
        };
        let cards = exercises.into_iter().map(|we| ExerciseCard::new(we, units)).collect();
        Self {
            workout,
            cards,
            cursor,
            edit_mode,
        }
    }

    pub fn id(&self) -> Id {
        self.workout.id
    }

    pub fn current_index(&self) -> usize {
        self.cursor.index()
    }

    pub fn current(&self) -> Option<&ExerciseCard> {
        self.cards.get(self.cursor.index())
    }

    pub fn is_last(&self) -> bool {
        self.cursor.index() + 1 >= self.cards.len()
    }

    pub fn position_of(&self, workout_exercise_id: Id) -> Option<usize> {
        self.cards.iter().position(|c| c.id() == workout_exercise_id)
    }

    pub fn set_ref(&self, exercise_index: usize, set_index: usize) -> Option<SetRef> {
        let card = self.cards.get(exercise_index)?;
        let editor = card.editor(set_index)?;
        Some(SetRef {
            workout_exercise_id: card.id(),
            key: editor.key(),
        })
    }

    /// Current (exercise, set) position of a set handle
    pub fn resolve(&self, target: SetRef) -> Option<(usize, usize)> {
        let exercise_index = self.position_of(target.workout_exercise_id)?;
        let set_index = self.cards[exercise_index].position_of_set(target.key)?;
        Some((exercise_index, set_index))
    }

    /// Renumber every slot to its list position (1-based)
    fn renumber(&mut self) {
        for (i, card) in self.cards.iter_mut().enumerate() {
            card.set_sequence(i as u32 + 1);
        }
    }

    fn order(&self) -> Vec<Id> {
        self.cards.iter().map(ExerciseCard::id).collect()
    }

    /// Full record with nested exercises and sets
    pub fn snapshot(&self) -> Workout {
        Workout {
            exercises: self.cards.iter().map(ExerciseCard::to_workout_exercise).collect(),
            ..self.workout.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub enum SessionState {
    #[default]
    Uninitialized,
    /// Nothing in progress; what could be started next
    NoActiveWorkout {
        suggestion: Option<SuggestedWorkout>,
        schedule: Vec<RoutineDayResponse>,
    },
    Active(ActiveWorkout),
}

pub struct WorkoutSession {
    ctx: SessionContext,
    state: SessionState,
}

impl WorkoutSession {
    pub fn new(ctx: SessionContext) -> Self {
        Self {
            ctx,
            state: SessionState::Uninitialized,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    pub fn active(&self) -> Option<&ActiveWorkout> {
        match &self.state {
            SessionState::Active(active) => Some(active),
            _ => None,
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveWorkout, SessionError> {
        match &mut self.state {
            SessionState::Active(active) => Ok(active),
            _ => Err(SessionError::NoActiveWorkout),
        }
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Active(_) => Err(SessionError::WorkoutInProgress),
            _ => Ok(()),
        }
    }

    // ---- loading ----

    /// Enter the session. With an id the workout is opened for editing;
    /// otherwise an unfinished workout is resumed, or the next suggestion and
    /// the routine schedule are fetched. Fetch failures are logged and leave
    /// the session with nothing to show.
    pub async fn load_session(&mut self, explicit_id: Option<Id>, explicit_index: Option<usize>) {
        if let Some(id) = explicit_id {
            match self.ctx.api.get_workout(id).await {
                Ok(workout) => {
                    info!("Editing workout {}", id);
                    self.state = SessionState::Active(ActiveWorkout::new(workout, self.ctx.units, true, explicit_index));
                }
                Err(e) => {
                    error!("Failed to load workout {}: {}", id, e);
                    self.state = SessionState::NoActiveWorkout {
                        suggestion: None,
                        schedule: Vec::new(),
                    };
                }
            }
            return;
        }

        match self.ctx.api.active_workout().await {
            Ok(Some(workout)) => {
                info!("Resuming workout {} from {}", workout.id, workout.date);
                self.state = SessionState::Active(ActiveWorkout::new(workout, self.ctx.units, false, explicit_index));
            }
            Ok(None) => self.show_options().await,
            Err(e) => {
                error!("Failed to check for an active workout: {}", e);
                self.state = SessionState::NoActiveWorkout {
                    suggestion: None,
                    schedule: Vec::new(),
                };
            }
        }
    }

    /// Fetch what can be started next and go idle
    async fn show_options(&mut self) {
        let suggestion = self.ctx.api.suggested_workout().await.unwrap_or_else(|e| {
            warn!("Failed to load suggested workout: {}", e);
            None
        });
        let schedule = self.ctx.api.active_schedule().await.unwrap_or_else(|e| {
            warn!("Failed to load routine schedule: {}", e);
            Vec::new()
        });
        self.state = SessionState::NoActiveWorkout { suggestion, schedule };
    }

    /// Reopen a finished workout so it becomes the active one again
    pub async fn reopen(&mut self, id: Id) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.ctx.api.reopen_workout(id).await?;
        let workout = self.ctx.api.get_workout(id).await?;
        info!("Reopened workout {}", id);
        self.state = SessionState::Active(ActiveWorkout::new(workout, self.ctx.units, false, None));
        Ok(())
    }

    // ---- starting ----

    async fn create_workout(&self, notes: String) -> Result<Workout, SessionError> {
        let now = Local::now();
        let request = NewWorkout {
            user_id: self.ctx.user_id,
            date: now.date_naive(),
            start_time: now.time(),
            notes,
        };
        Ok(self.ctx.api.create_workout(&request).await?)
    }

    /// Start a workout seeded from a routine day template.
    ///
    /// Exercises and sets are created one call at a time. If a call fails
    /// the workout keeps whatever was created so far and the error is returned.
    pub async fn start_from_routine_day(&mut self, day: &RoutineDay) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let mut workout = self.create_workout(day.workout_notes()).await?;
        info!("Started workout {} ({})", workout.id, day.day_name);

        let mut result = Ok(());
        for (i, template) in day.exercises.iter().enumerate() {
            match self.seed_exercise(&workout, i as u32 + 1, template).await {
                Ok(we) => workout.exercises.push(we),
                Err((partial, e)) => {
                    error!("Failed to seed {} into workout {}: {}", template.name, workout.id, e);
                    workout.exercises.extend(partial);
                    result = Err(e);
                    break;
                }
            }
        }

        self.state = SessionState::Active(ActiveWorkout::new(workout, self.ctx.units, false, Some(0)));
        result
    }

    /// Create one exercise slot and its prescribed sets. On failure returns
    /// the slot as far as it got.
    async fn seed_exercise(
        &self,
        workout: &Workout,
        sequence: u32,
        template: &TemplateExercise,
    ) -> Result<WorkoutExercise, (Option<WorkoutExercise>, SessionError)> {
        let payload = WorkoutExercisePayload {
            workout_id: workout.id,
            exercise_id: template.id,
            sequence,
        };
        let mut we = self
            .ctx
            .api
            .create_workout_exercise(&payload)
            .await
            .map_err(|e| (None, e.into()))?;

        let exercise = match self.ctx.api.get_exercise(template.id).await {
            Ok(exercise) => exercise,
            Err(e) => return Err((Some(we), e.into())),
        };

        let set_count = template.suggested_sets.or(exercise.default_sets).unwrap_or(0);
        let reps = template
            .suggested_reps
            .as_deref()
            .or(exercise.default_reps.as_deref())
            .and_then(parse_rep_target);
        let duration = template.suggested_time_seconds.or(exercise.default_time_seconds);
        let tempo = template.tempo.clone().or_else(|| exercise.default_tempo.clone());
        we.exercise = Some(exercise);

        for set_number in 1..=set_count {
            let payload = SetPayload {
                workout_exercise_id: we.id,
                set_number,
                reps,
                duration_seconds: duration,
                tempo: tempo.clone(),
                completed: false,
                ..Default::default()
            };
            match self.ctx.api.create_set(&payload).await {
                Ok(set) => we.sets.push(set),
                Err(e) => return Err((Some(we), e.into())),
            }
        }

        Ok(we)
    }

    /// Start a "Quick Workout" with the first catalog exercises and no sets
    pub async fn start_empty(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let mut workout = self.create_workout(QUICK_WORKOUT_NOTES.to_string()).await?;
        info!("Started quick workout {}", workout.id);

        let mut result = Ok(());
        match self.ctx.api.list_exercises().await {
            Ok(catalog) => {
                for (i, exercise) in catalog.into_iter().take(QUICK_WORKOUT_EXERCISES).enumerate() {
                    let payload = WorkoutExercisePayload {
                        workout_id: workout.id,
                        exercise_id: exercise.id,
                        sequence: i as u32 + 1,
                    };
                    match self.ctx.api.create_workout_exercise(&payload).await {
                        Ok(mut we) => {
                            we.exercise = Some(exercise);
                            we.sets.clear();
                            workout.exercises.push(we);
                        }
                        Err(e) => {
                            error!("Failed to add {} to quick workout: {}", exercise.name, e);
                            result = Err(e.into());
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to load exercise catalog: {}", e);
                result = Err(e.into());
            }
        }

        self.state = SessionState::Active(ActiveWorkout::new(workout, self.ctx.units, false, Some(0)));
        result
    }

    // ---- exercise list ----

    /// Append an exercise at the end and move the cursor to it
    pub async fn add_exercise(&mut self, exercise: Exercise) -> Result<usize, SessionError> {
        let api = Arc::clone(&self.ctx.api);
        let units = self.ctx.units;
        let active = self.active_mut()?;

        let sequence = active.cards.iter().map(ExerciseCard::sequence).max().unwrap_or(0) + 1;
        let payload = WorkoutExercisePayload {
            workout_id: active.id(),
            exercise_id: exercise.id,
            sequence,
        };
        let mut we = api.create_workout_exercise(&payload).await?;
        info!("Added {} to workout {} at {}", exercise.name, active.id(), sequence);
        we.exercise = Some(exercise);
        we.sets.clear();

        active.cards.push(ExerciseCard::new(we, units));
        let index = active.cards.len() - 1;
        active.cursor.follow(index, active.cards.len());
        Ok(index)
    }

    /// Perform a different catalog exercise in the same slot. Position and
    /// logged sets are untouched; only the local copy changes, and only once
    /// the server accepted the swap.
    pub async fn swap_exercise(&mut self, workout_exercise_id: Id, exercise: Exercise) -> Result<(), SessionError> {
        let api = Arc::clone(&self.ctx.api);
        let active = self.active_mut()?;
        let index = active
            .position_of(workout_exercise_id)
            .ok_or(SessionError::UnknownWorkoutExercise(workout_exercise_id))?;

        let payload = WorkoutExercisePayload {
            workout_id: active.id(),
            exercise_id: exercise.id,
            sequence: active.cards[index].sequence(),
        };
        let updated = api.update_workout_exercise(workout_exercise_id, &payload).await?;
        info!("Swapped {} for {}", active.cards[index].name(), exercise.name);
        active.cards[index].retarget(updated, exercise);
        Ok(())
    }

    /// Remove an exercise (the caller has already asked for confirmation).
    /// Local state changes only after the server delete succeeds; remaining
    /// slots are renumbered and the new order persisted.
    pub async fn remove_exercise(&mut self, workout_exercise_id: Id) -> Result<(), SessionError> {
        let api = Arc::clone(&self.ctx.api);
        let active = self.active_mut()?;
        let index = active
            .position_of(workout_exercise_id)
            .ok_or(SessionError::UnknownWorkoutExercise(workout_exercise_id))?;

        if let Err(e) = api.delete_workout_exercise(workout_exercise_id).await {
            error!("Failed to delete exercise {}: {}", workout_exercise_id, e);
            return Err(e.into());
        }

        let removed = active.cards.remove(index);
        info!("Removed {} from workout {}", removed.name(), active.id());
        active.cursor.cancel_advance();
        active.cursor.clamp(active.cards.len());

        let gapped = active.cards.iter().enumerate().any(|(i, c)| c.sequence() != i as u32 + 1);
        active.renumber();
        if gapped
            && let Err(e) = api.reorder_exercises(active.id(), &active.order()).await
        {
            error!("Failed to persist order after removal: {}", e);
        }
        Ok(())
    }

    /// Move the current exercise one place up or down. The local list and
    /// cursor change immediately; the new order is then sent in one call
    /// whose failure is only logged.
    pub async fn reorder_exercise(&mut self, direction: Direction) -> Result<bool, SessionError> {
        let api = Arc::clone(&self.ctx.api);
        let active = self.active_mut()?;
        let from = active.cursor.index();
        let to = match direction {
            Direction::Up if from > 0 => from - 1,
            Direction::Down if from + 1 < active.cards.len() => from + 1,
            _ => return Ok(false),
        };

        active.cards.swap(from, to);
        active.renumber();
        active.cursor.follow(to, active.cards.len());

        if let Err(e) = api.reorder_exercises(active.id(), &active.order()).await {
            error!("Failed to reorder workout {}: {}", active.id(), e);
        }
        Ok(true)
    }

    // ---- sets ----

    fn card_mut(&mut self, exercise_index: usize) -> Result<(&mut ExerciseCard, Id), SessionError> {
        let active = self.active_mut()?;
        let workout_id = active.id();
        let card = active
            .cards
            .get_mut(exercise_index)
            .ok_or(SessionError::UnknownExercise(exercise_index))?;
        Ok((card, workout_id))
    }

    pub fn editor_mut(&mut self, exercise_index: usize, set_index: usize) -> Result<&mut SetEditor, SessionError> {
        self.card_mut(exercise_index)?.0.editor_mut(set_index)
    }

    pub fn add_set(&mut self, exercise_index: usize) -> Result<usize, SessionError> {
        Ok(self.card_mut(exercise_index)?.0.add_set())
    }

    pub async fn delete_set(&mut self, exercise_index: usize, set_index: usize) -> Result<(), SessionError> {
        let api = Arc::clone(&self.ctx.api);
        let (card, _) = self.card_mut(exercise_index)?;
        card.delete_set(set_index, api.as_ref()).await
    }

    /// Fetch history hints for the sets of an exercise about to be shown
    pub async fn load_history(&mut self, exercise_index: usize) -> Result<(), SessionError> {
        let api = Arc::clone(&self.ctx.api);
        let (card, workout_id) = self.card_mut(exercise_index)?;
        card.load_history(api.as_ref(), workout_id).await;
        Ok(())
    }

    /// Toggle and persist a set. Completing the last open set of the current
    /// exercise queues a move to the next one.
    pub async fn save_set(
        &mut self,
        exercise_index: usize,
        set_index: usize,
        now: Instant,
    ) -> Result<Option<SetSaved>, SessionError> {
        let api = Arc::clone(&self.ctx.api);
        let (card, _) = self.card_mut(exercise_index)?;
        let saved = card.save_set(set_index, api.as_ref(), now).await?;
        self.after_set_saved(exercise_index, saved.as_ref(), now);
        Ok(saved)
    }

    /// A timed set's countdown reached zero. The set is looked up again by
    /// its handle; if it was removed meanwhile nothing is saved.
    pub async fn complete_timed_set(&mut self, target: SetRef, now: Instant) -> Result<Option<SetSaved>, SessionError> {
        let Some((exercise_index, set_index)) = self.active_mut()?.resolve(target) else {
            info!("Timed set of exercise {} is gone, nothing to log", target.workout_exercise_id);
            return Ok(None);
        };
        let api = Arc::clone(&self.ctx.api);
        let (card, _) = self.card_mut(exercise_index)?;
        let saved = card.complete_timed_set(set_index, api.as_ref(), now).await?;
        self.after_set_saved(exercise_index, saved.as_ref(), now);
        Ok(saved)
    }

    fn after_set_saved(&mut self, exercise_index: usize, saved: Option<&SetSaved>, now: Instant) {
        let delay = self.ctx.auto_advance_delay;
        let Some(saved) = saved else { return };
        let SessionState::Active(active) = &mut self.state else { return };
        if saved.exercise_complete && saved.set.completed && active.cursor.index() == exercise_index {
            active.cursor.schedule_advance(now, delay, active.cards.len());
        }
    }

    // ---- navigation ----

    /// Apply a due auto-advance; call from the UI tick
    pub fn tick(&mut self, now: Instant) -> bool {
        match &mut self.state {
            SessionState::Active(active) => active.cursor.poll(now, active.cards.len()),
            _ => false,
        }
    }

    pub fn next_exercise(&mut self) {
        if let SessionState::Active(active) = &mut self.state {
            active.cursor.next(active.cards.len());
        }
    }

    pub fn prev_exercise(&mut self) {
        if let SessionState::Active(active) = &mut self.state {
            active.cursor.prev();
        }
    }

    pub fn jump_to(&mut self, index: usize) {
        if let SessionState::Active(active) = &mut self.state {
            active.cursor.jump(index, active.cards.len());
        }
    }

    pub fn toggle_drawer(&mut self) {
        if let SessionState::Active(active) = &mut self.state {
            active.cursor.toggle_drawer();
        }
    }

    // ---- ending ----

    /// Finish the workout. In edit mode nothing is sent: edits were saved as
    /// they happened and this only closes the view.
    pub async fn finish(&mut self) -> Result<(), SessionError> {
        let active = self.active_mut()?;
        let id = active.id();

        if active.edit_mode {
            info!("Closed workout {} after editing", id);
            self.state = SessionState::NoActiveWorkout {
                suggestion: None,
                schedule: Vec::new(),
            };
            return Ok(());
        }

        if let Err(e) = self.ctx.api.finish_workout(id).await {
            error!("Failed to finish workout {}: {}", id, e);
            return Err(e.into());
        }
        info!("Finished workout {}", id);
        self.show_options().await;
        Ok(())
    }

    /// Delete the workout (the caller has already asked for confirmation).
    /// The session stays on the workout if the server refuses.
    pub async fn discard(&mut self) -> Result<(), SessionError> {
        let id = self.active_mut()?.id();
        if let Err(e) = self.ctx.api.delete_workout(id).await {
            error!("Failed to discard workout {}: {}", id, e);
            return Err(e.into());
        }
        info!("Discarded workout {}", id);
        self.show_options().await;
        Ok(())
    }
}

/// Past workouts, newest first
pub async fn list_history(api: &dyn WorkoutApi, limit: usize) -> Result<Vec<WorkoutSummary>, SessionError> {
    let mut workouts = api.list_workouts().await?;
    workouts.sort_by(|a, b| (b.date, b.start_time, b.id).cmp(&(a.date, a.start_time, a.id)));
    workouts.truncate(limit);
    Ok(workouts)
}
