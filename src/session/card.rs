//! Exercise card - the set editors of one workout exercise
//!
//! Owns the cross-set behaviour: new sets inherit the previous set's values,
//! a saved weight is carried into the next empty set, and set numbers stay
//! 1..N after a delete.

use std::time::Instant;

use tracing::info;

use super::set_editor::SetEditor;
use super::SessionError;
use crate::api::WorkoutApi;
use crate::models::{Exercise, Id, WorkoutExercise, WorkoutSet, LOCAL_ID};
use crate::units::UnitSystem;

/// Result of a set save as seen by the card
#[derive(Debug, Clone, PartialEq)]
pub struct SetSaved {
    pub set: WorkoutSet,
    /// Every set of the exercise is now completed
    pub exercise_complete: bool,
}

#[derive(Debug, Clone)]
pub struct ExerciseCard {
    slot: WorkoutExercise, // sets live in `editors`
    editors: Vec<SetEditor>,
    units: UnitSystem,
    next_key: u64,
}

impl ExerciseCard {
    pub fn new(mut slot: WorkoutExercise, units: UnitSystem) -> Self {
        let sets = std::mem::take(&mut slot.sets);
        let mut card = Self {
            editors: Vec::with_capacity(sets.len()),
            slot,
            units,
            next_key: 1,
        };
        for set in sets {
            card.push_editor(set);
        }
        card
    }

    fn push_editor(&mut self, set: WorkoutSet) {
        let mut editor = SetEditor::new(set, self.slot.exercise.as_ref(), self.slot.exercise_id, self.units);
        editor.set_key(self.next_key);
        self.next_key += 1;
        self.editors.push(editor);
    }

    pub fn id(&self) -> Id {
        self.slot.id
    }

    pub fn sequence(&self) -> u32 {
        self.slot.sequence
    }

    pub(crate) fn set_sequence(&mut self, sequence: u32) {
        self.slot.sequence = sequence;
    }

    pub fn exercise_id(&self) -> Id {
        self.slot.exercise_id
    }

    pub fn name(&self) -> &str {
        self.slot.name()
    }

    pub fn editors(&self) -> &[SetEditor] {
        &self.editors
    }

    pub fn editor(&self, index: usize) -> Option<&SetEditor> {
        self.editors.get(index)
    }

    /// Current position of the set with this key
    pub fn position_of_set(&self, key: u64) -> Option<usize> {
        self.editors.iter().position(|e| e.key() == key)
    }

    pub fn editor_mut(&mut self, index: usize) -> Result<&mut SetEditor, SessionError> {
        self.editors.get_mut(index).ok_or(SessionError::UnknownSet(index))
    }

    pub fn sets(&self) -> Vec<WorkoutSet> {
        self.editors.iter().map(SetEditor::current).collect()
    }

    /// At least one set and all of them completed
    pub fn is_complete(&self) -> bool {
        !self.editors.is_empty() && self.editors.iter().all(SetEditor::is_completed)
    }

    pub fn completed_sets(&self) -> usize {
        self.editors.iter().filter(|e| e.is_completed()).count()
    }

    /// The slot as a plain record, sets included
    pub fn to_workout_exercise(&self) -> WorkoutExercise {
        WorkoutExercise {
            sets: self.sets(),
            ..self.slot.clone()
        }
    }

    /// Swap the catalog exercise. Logged sets are kept as they are.
    pub(crate) fn retarget(&mut self, updated: WorkoutExercise, exercise: Exercise) {
        self.slot.exercise_id = exercise.id;
        self.slot.sequence = updated.sequence;
        for editor in &mut self.editors {
            editor.retarget(&exercise);
        }
        self.slot.exercise = Some(exercise);
    }

    /// Append a local set numbered N+1, inheriting weight, reps, duration
    /// and tempo from the set before it
    pub fn add_set(&mut self) -> usize {
        let previous = self.editors.last().map(SetEditor::record);
        let set = WorkoutSet {
            id: LOCAL_ID,
            workout_exercise_id: self.slot.id,
            set_number: self.editors.len() as u32 + 1,
            weight_kg: previous.and_then(|p| p.weight_kg),
            reps: previous.and_then(|p| p.reps),
            duration_seconds: previous.and_then(|p| p.duration_seconds),
            tempo: previous.and_then(|p| p.tempo.clone()),
            ..Default::default()
        };
        self.push_editor(set);
        self.editors.len() - 1
    }

    /// Fetch history hints for sets shown for the first time
    pub async fn load_history(&mut self, api: &dyn WorkoutApi, workout_id: Id) {
        for editor in &mut self.editors {
            editor.load_history(api, Some(workout_id)).await;
        }
    }

    /// Save one set, then carry its weight into the next set if that one
    /// has none yet (locally only; it stays a draft)
    pub async fn save_set(
        &mut self,
        index: usize,
        api: &dyn WorkoutApi,
        now: Instant,
    ) -> Result<Option<SetSaved>, SessionError> {
        let saved = self.editor_mut(index)?.save(api, now).await?;
        Ok(saved.map(|set| self.after_save(index, set)))
    }

    /// Countdown of a timed set reached zero
    pub async fn complete_timed_set(
        &mut self,
        index: usize,
        api: &dyn WorkoutApi,
        now: Instant,
    ) -> Result<Option<SetSaved>, SessionError> {
        let saved = self.editor_mut(index)?.on_countdown_done(api, now).await?;
        Ok(saved.map(|set| self.after_save(index, set)))
    }

    fn after_save(&mut self, index: usize, set: WorkoutSet) -> SetSaved {
        if let Some(weight) = set.weight_kg.filter(|w| *w != 0.0)
            && let Some(next) = self.editors.get_mut(index + 1)
            && next.record().weight_kg.is_none_or(|w| w == 0.0)
        {
            next.forward_fill_weight(weight);
        }
        SetSaved {
            set,
            exercise_complete: self.is_complete(),
        }
    }

    /// Delete a set. Persisted sets are removed on the server first and kept
    /// locally if that fails; the rest are renumbered 1..N.
    pub async fn delete_set(&mut self, index: usize, api: &dyn WorkoutApi) -> Result<(), SessionError> {
        let editor = self.editors.get(index).ok_or(SessionError::UnknownSet(index))?;
        editor.delete_remote(api).await?;

        let removed = self.editors.remove(index);
        info!("Deleted set {} of {}", removed.set_number(), self.name());
        for (i, editor) in self.editors.iter_mut().enumerate() {
            editor.renumber(i as u32 + 1);
        }
        Ok(())
    }
}
