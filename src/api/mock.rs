//! In-memory server used by the session tests

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Local;

use super::{ApiError, ApiResult, WorkoutApi};
use crate::grouping::group_exercises;
use crate::models::{
    Exercise, ExerciseSummary, HistoryEntry, Id, LastSet, NewWorkout, RoutineDayResponse, SetPayload, SetSummary,
    SuggestedWorkout, Workout, WorkoutExercise, WorkoutExercisePayload, WorkoutSet, WorkoutSummary,
};

#[derive(Default)]
struct MockState {
    next_id: Id,
    catalog: Vec<Exercise>,
    workouts: BTreeMap<Id, Workout>,
    workout_exercises: BTreeMap<Id, WorkoutExercise>,
    sets: BTreeMap<Id, WorkoutSet>,
    suggested: Option<SuggestedWorkout>,
    schedule: Vec<RoutineDayResponse>,
    last_sets: HashMap<(Id, u32), LastSet>,
    calls: Vec<(String, String)>, // (operation, argument)
    failing: HashSet<String>,
}

impl MockState {
    fn record(&mut self, op: &str, arg: impl ToString) -> ApiResult<()> {
        self.calls.push((op.to_string(), arg.to_string()));
        if self.failing.contains(op) {
            return Err(ApiError::Status {
                status: 500,
                detail: format!("{} failed", op),
            });
        }
        Ok(())
    }

    fn next_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn not_found(what: &str, id: Id) -> ApiError {
        ApiError::Status {
            status: 404,
            detail: format!("{} {} not found", what, id),
        }
    }

    /// Workout with nested exercises and sets, ordered like the server does
    fn assemble(&self, id: Id) -> Option<Workout> {
        let mut workout = self.workouts.get(&id)?.clone();
        let mut exercises: Vec<WorkoutExercise> = self
            .workout_exercises
            .values()
            .filter(|we| we.workout_id == id)
            .cloned()
            .collect();
        exercises.sort_by_key(|we| we.sequence);
        for we in &mut exercises {
            we.exercise = self.catalog.iter().find(|e| e.id == we.exercise_id).cloned();
            let mut sets: Vec<WorkoutSet> = self
                .sets
                .values()
                .filter(|s| s.workout_exercise_id == we.id)
                .cloned()
                .collect();
            sets.sort_by_key(|s| s.set_number);
            we.sets = sets;
        }
        workout.exercises = exercises;
        Some(workout)
    }

    /// List-endpoint shape: catalog ids, no slot ids, supersets nested
    fn summarize(&self, id: Id) -> Option<WorkoutSummary> {
        let workout = self.assemble(id)?;
        let summary = |we: &WorkoutExercise| ExerciseSummary {
            id: we.exercise_id,
            name: we.name().to_string(),
            muscle_group: we.exercise.as_ref().map(|e| e.muscle_group.clone()).unwrap_or_default(),
            sets: we
                .sets
                .iter()
                .map(|s| SetSummary {
                    id: Some(s.id),
                    set_number: Some(s.set_number),
                    reps: s.reps,
                    weight_kg: s.weight_kg,
                    duration_seconds: s.duration_seconds,
                    notes: s.notes.clone(),
                    completed: s.completed,
                    ..Default::default()
                })
                .collect(),
            group_name: we.group_name().map(str::to_string),
            tracked_metrics: we.exercise.as_ref().and_then(|e| e.tracked_metrics.clone()),
        };
        let exercises = group_exercises(&workout.exercises)
            .into_iter()
            .map(|group| {
                let mut members: Vec<ExerciseSummary> =
                    group.indices.iter().map(|&i| summary(&workout.exercises[i])).collect();
                if group.is_superset() {
                    HistoryEntry::Superset {
                        superset: members,
                        group_name: group.name,
                    }
                } else {
                    HistoryEntry::Exercise(members.remove(0))
                }
            })
            .collect();
        Some(WorkoutSummary {
            id: workout.id,
            user_id: workout.user_id,
            date: workout.date,
            start_time: workout.start_time,
            end_time: workout.end_time,
            notes: workout.notes,
            exercises,
        })
    }

    fn store_set(&mut self, id: Id, payload: &SetPayload) -> WorkoutSet {
        let set = WorkoutSet {
            id,
            workout_exercise_id: payload.workout_exercise_id,
            set_number: payload.set_number,
            weight_kg: payload.weight_kg,
            reps: payload.reps,
            rpe: payload.rpe,
            tempo: payload.tempo.clone(),
            notes: None,
            completed: payload.completed,
            duration_seconds: payload.duration_seconds,
        };
        self.sets.insert(id, set.clone());
        set
    }
}

/// Recording fake of the REST server
#[derive(Default)]
pub struct MockApi {
    state: Mutex<MockState>,
}

impl MockApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: Vec<Exercise>) -> Self {
        let api = Self::default();
        api.lock().catalog = catalog;
        api
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn set_suggested(&self, suggested: Option<SuggestedWorkout>) {
        self.lock().suggested = suggested;
    }

    pub fn set_schedule(&self, schedule: Vec<RoutineDayResponse>) {
        self.lock().schedule = schedule;
    }

    pub fn set_last_set(&self, exercise_id: Id, set_number: u32, last: LastSet) {
        self.lock().last_sets.insert((exercise_id, set_number), last);
    }

    /// Make every later call of `op` fail with a 500
    pub fn fail(&self, op: &str) {
        self.lock().failing.insert(op.to_string());
    }

    pub fn recover(&self, op: &str) {
        self.lock().failing.remove(op);
    }

    /// Seed a workout as if it was created in an earlier session
    pub fn insert_workout(&self, workout: Workout) {
        let mut state = self.lock();
        for we in &workout.exercises {
            for set in &we.sets {
                state.sets.insert(set.id, set.clone());
                state.next_id = state.next_id.max(set.id);
            }
            let mut flat = we.clone();
            flat.sets.clear();
            state.workout_exercises.insert(we.id, flat);
            state.next_id = state.next_id.max(we.id);
        }
        let mut flat = workout.clone();
        flat.exercises.clear();
        state.next_id = state.next_id.max(workout.id);
        state.workouts.insert(workout.id, flat);
    }

    pub fn workout(&self, id: Id) -> Option<Workout> {
        self.lock().assemble(id)
    }

    pub fn set_record(&self, id: Id) -> Option<WorkoutSet> {
        self.lock().sets.get(&id).cloned()
    }

    /// Number of calls made to `op`
    pub fn calls_to(&self, op: &str) -> usize {
        self.lock().calls.iter().filter(|(o, _)| o == op).count()
    }

    /// Arguments of every call made to `op`, in order
    pub fn args_of(&self, op: &str) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter(|(o, _)| o == op)
            .map(|(_, a)| a.clone())
            .collect()
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.len()
    }
}

#[async_trait]
impl WorkoutApi for MockApi {
    async fn active_workout(&self) -> ApiResult<Option<Workout>> {
        let mut state = self.lock();
        state.record("active_workout", "")?;
        let active = state
            .workouts
            .values()
            .filter(|w| w.end_time.is_none())
            .map(|w| w.id)
            .max();
        Ok(active.and_then(|id| state.assemble(id)))
    }

    async fn get_workout(&self, id: Id) -> ApiResult<Workout> {
        let mut state = self.lock();
        state.record("get_workout", id)?;
        state.assemble(id).ok_or_else(|| MockState::not_found("Workout", id))
    }

    async fn list_workouts(&self) -> ApiResult<Vec<WorkoutSummary>> {
        let mut state = self.lock();
        state.record("list_workouts", "")?;
        let ids: Vec<Id> = state.workouts.keys().rev().copied().collect();
        Ok(ids.into_iter().filter_map(|id| state.summarize(id)).collect())
    }

    async fn create_workout(&self, workout: &NewWorkout) -> ApiResult<Workout> {
        let mut state = self.lock();
        state.record("create_workout", &workout.notes)?;
        let id = state.next_id();
        let created = Workout {
            id,
            user_id: workout.user_id,
            date: workout.date,
            start_time: Some(workout.start_time),
            end_time: None,
            notes: Some(workout.notes.clone()),
            exercises: vec![],
        };
        state.workouts.insert(id, created.clone());
        Ok(created)
    }

    async fn finish_workout(&self, id: Id) -> ApiResult<Workout> {
        let mut state = self.lock();
        state.record("finish_workout", id)?;
        let workout = state.workouts.get_mut(&id).ok_or_else(|| MockState::not_found("Workout", id))?;
        workout.end_time = Some(Local::now().time());
        Ok(workout.clone())
    }

    async fn reopen_workout(&self, id: Id) -> ApiResult<Workout> {
        let mut state = self.lock();
        state.record("reopen_workout", id)?;
        let workout = state.workouts.get_mut(&id).ok_or_else(|| MockState::not_found("Workout", id))?;
        workout.end_time = None;
        Ok(workout.clone())
    }

    async fn delete_workout(&self, id: Id) -> ApiResult<()> {
        let mut state = self.lock();
        state.record("delete_workout", id)?;
        state.workouts.remove(&id).ok_or_else(|| MockState::not_found("Workout", id))?;
        let removed: Vec<Id> = state
            .workout_exercises
            .values()
            .filter(|we| we.workout_id == id)
            .map(|we| we.id)
            .collect();
        state.workout_exercises.retain(|_, we| we.workout_id != id);
        state.sets.retain(|_, s| !removed.contains(&s.workout_exercise_id));
        Ok(())
    }

    async fn reorder_exercises(&self, workout_id: Id, order: &[Id]) -> ApiResult<()> {
        let mut state = self.lock();
        state.record("reorder_exercises", format!("{:?}", order))?;
        for (index, id) in order.iter().enumerate() {
            if let Some(we) = state.workout_exercises.get_mut(id)
                && we.workout_id == workout_id
            {
                we.sequence = index as u32 + 1;
            }
        }
        Ok(())
    }

    async fn suggested_workout(&self) -> ApiResult<Option<SuggestedWorkout>> {
        let mut state = self.lock();
        state.record("suggested_workout", "")?;
        Ok(state.suggested.clone())
    }

    async fn active_schedule(&self) -> ApiResult<Vec<RoutineDayResponse>> {
        let mut state = self.lock();
        state.record("active_schedule", "")?;
        Ok(state.schedule.clone())
    }

    async fn create_workout_exercise(&self, payload: &WorkoutExercisePayload) -> ApiResult<WorkoutExercise> {
        let mut state = self.lock();
        state.record("create_workout_exercise", payload.exercise_id)?;
        let id = state.next_id();
        let created = WorkoutExercise {
            id,
            workout_id: payload.workout_id,
            exercise_id: payload.exercise_id,
            sequence: payload.sequence,
            exercise: None,
            sets: vec![],
        };
        state.workout_exercises.insert(id, created.clone());
        Ok(created)
    }

    async fn update_workout_exercise(&self, id: Id, payload: &WorkoutExercisePayload) -> ApiResult<WorkoutExercise> {
        let mut state = self.lock();
        state.record("update_workout_exercise", id)?;
        let we = state
            .workout_exercises
            .get_mut(&id)
            .ok_or_else(|| MockState::not_found("WorkoutExercise", id))?;
        we.exercise_id = payload.exercise_id;
        we.sequence = payload.sequence;
        Ok(we.clone())
    }

    async fn delete_workout_exercise(&self, id: Id) -> ApiResult<()> {
        let mut state = self.lock();
        state.record("delete_workout_exercise", id)?;
        state
            .workout_exercises
            .remove(&id)
            .ok_or_else(|| MockState::not_found("WorkoutExercise", id))?;
        state.sets.retain(|_, s| s.workout_exercise_id != id);
        Ok(())
    }

    async fn create_set(&self, payload: &SetPayload) -> ApiResult<WorkoutSet> {
        let mut state = self.lock();
        state.record("create_set", payload.set_number)?;
        let id = state.next_id();
        Ok(state.store_set(id, payload))
    }

    async fn update_set(&self, id: Id, payload: &SetPayload) -> ApiResult<WorkoutSet> {
        let mut state = self.lock();
        state.record("update_set", id)?;
        if !state.sets.contains_key(&id) {
            return Err(MockState::not_found("Set", id));
        }
        Ok(state.store_set(id, payload))
    }

    async fn delete_set(&self, id: Id) -> ApiResult<()> {
        let mut state = self.lock();
        state.record("delete_set", id)?;
        state.sets.remove(&id).ok_or_else(|| MockState::not_found("Set", id))?;
        Ok(())
    }

    async fn list_exercises(&self) -> ApiResult<Vec<Exercise>> {
        let mut state = self.lock();
        state.record("list_exercises", "")?;
        Ok(state.catalog.clone())
    }

    async fn get_exercise(&self, id: Id) -> ApiResult<Exercise> {
        let mut state = self.lock();
        state.record("get_exercise", id)?;
        state
            .catalog
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| MockState::not_found("Exercise", id))
    }

    async fn last_set(
        &self,
        exercise_id: Id,
        set_number: u32,
        _current_workout_id: Option<Id>,
    ) -> ApiResult<Option<LastSet>> {
        let mut state = self.lock();
        state.record("last_set", format!("{}/{}", exercise_id, set_number))?;
        Ok(state.last_sets.get(&(exercise_id, set_number)).copied())
    }
}
