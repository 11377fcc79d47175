//! API module - remote collaborator the workout session talks to
//!
//! Every mutation is a single best-effort call: no batching, no retries.

pub mod http;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Exercise, Id, LastSet, NewWorkout, RoutineDayResponse, SetPayload, SuggestedWorkout, Workout,
    WorkoutExercise, WorkoutExercisePayload, WorkoutSet, WorkoutSummary,
};

pub use http::HttpApi;

/// Errors from the REST layer. Callers only distinguish success from failure.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network, DNS, TLS or timeout failure
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response; `detail` is the server message when it sent one
    #[error("{detail}")]
    Status { status: u16, detail: String },

    /// Body did not match the expected shape
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Request(e) => e.status().map(|s| s.as_u16()),
            ApiError::Decode(_) => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Operations the workout session needs from the server
#[async_trait]
pub trait WorkoutApi: Send + Sync {
    /// GET /workouts/active
    async fn active_workout(&self) -> ApiResult<Option<Workout>>;
    /// GET /workouts/{id}
    async fn get_workout(&self, id: Id) -> ApiResult<Workout>;
    /// GET /workouts/
    async fn list_workouts(&self) -> ApiResult<Vec<WorkoutSummary>>;
    /// POST /workouts/
    async fn create_workout(&self, workout: &NewWorkout) -> ApiResult<Workout>;
    /// PUT /workouts/{id}/finish
    async fn finish_workout(&self, id: Id) -> ApiResult<Workout>;
    /// PUT /workouts/{id}/reopen
    async fn reopen_workout(&self, id: Id) -> ApiResult<Workout>;
    /// DELETE /workouts/{id}
    async fn delete_workout(&self, id: Id) -> ApiResult<()>;
    /// POST /workouts/{id}/reorder
    async fn reorder_exercises(&self, workout_id: Id, order: &[Id]) -> ApiResult<()>;
    /// GET /workouts/suggested
    async fn suggested_workout(&self) -> ApiResult<Option<SuggestedWorkout>>;
    /// GET /routines/active/schedule
    async fn active_schedule(&self) -> ApiResult<Vec<RoutineDayResponse>>;

    /// POST /workout_exercises/
    async fn create_workout_exercise(&self, payload: &WorkoutExercisePayload) -> ApiResult<WorkoutExercise>;
    /// PUT /workout_exercises/{id}
    async fn update_workout_exercise(&self, id: Id, payload: &WorkoutExercisePayload) -> ApiResult<WorkoutExercise>;
    /// DELETE /workout_exercises/{id}
    async fn delete_workout_exercise(&self, id: Id) -> ApiResult<()>;

    /// POST /workout_sets/
    async fn create_set(&self, payload: &SetPayload) -> ApiResult<WorkoutSet>;
    /// PUT /workout_sets/{id}
    async fn update_set(&self, id: Id, payload: &SetPayload) -> ApiResult<WorkoutSet>;
    /// DELETE /workout_sets/{id}
    async fn delete_set(&self, id: Id) -> ApiResult<()>;

    /// GET /exercises/
    async fn list_exercises(&self) -> ApiResult<Vec<Exercise>>;
    /// GET /exercises/{id}
    async fn get_exercise(&self, id: Id) -> ApiResult<Exercise>;
    /// GET /exercises/{id}/last_set?set_number=N
    async fn last_set(
        &self,
        exercise_id: Id,
        set_number: u32,
        current_workout_id: Option<Id>,
    ) -> ApiResult<Option<LastSet>>;
}
