//! HTTP implementation of [`WorkoutApi`] using [`reqwest`]

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{ApiError, ApiResult, WorkoutApi};
use crate::models::{
    Exercise, Id, LastSet, NewWorkout, ReorderRequest, RoutineDayResponse, SetPayload,
    SuggestedWorkout, Workout, WorkoutExercise, WorkoutExercisePayload, WorkoutSet, WorkoutSummary,
};

/// REST client for the liftlog server
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    /// `base_url` e.g. `http://localhost:8001`
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> ApiResult<T> {
        debug!("GET {}", endpoint);
        let response = self.client.get(self.url(endpoint)).send().await?;
        Self::parse_response(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, endpoint: &str, body: &B) -> ApiResult<T> {
        debug!("POST {}", endpoint);
        let response = self.client.post(self.url(endpoint)).json(body).send().await?;
        Self::parse_response(response).await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(&self, endpoint: &str, body: &B) -> ApiResult<T> {
        debug!("PUT {}", endpoint);
        let response = self.client.put(self.url(endpoint)).json(body).send().await?;
        Self::parse_response(response).await
    }

    async fn delete(&self, endpoint: &str) -> ApiResult<()> {
        debug!("DELETE {}", endpoint);
        let response = self.client.delete(self.url(endpoint)).send().await?;
        Self::ensure_success(response).await.map(|_| ())
    }

    /// Turn a non-2xx response into [`ApiError::Status`], preferring the
    /// server's `detail` field over the bare status text.
    async fn ensure_success(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| match v.get("detail") {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(other) if !other.is_null() => Some(other.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| format!("API Error: {}", status.canonical_reason().unwrap_or("Unknown")));

        Err(ApiError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
        let response = Self::ensure_success(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl WorkoutApi for HttpApi {
    async fn active_workout(&self) -> ApiResult<Option<Workout>> {
        self.get("/workouts/active").await
    }

    async fn get_workout(&self, id: Id) -> ApiResult<Workout> {
        self.get(&format!("/workouts/{}", id)).await
    }

    async fn list_workouts(&self) -> ApiResult<Vec<WorkoutSummary>> {
        self.get("/workouts/").await
    }

    async fn create_workout(&self, workout: &NewWorkout) -> ApiResult<Workout> {
        self.post("/workouts/", workout).await
    }

    async fn finish_workout(&self, id: Id) -> ApiResult<Workout> {
        self.put(&format!("/workouts/{}/finish", id), &serde_json::json!({})).await
    }

    async fn reopen_workout(&self, id: Id) -> ApiResult<Workout> {
        self.put(&format!("/workouts/{}/reopen", id), &serde_json::json!({})).await
    }

    async fn delete_workout(&self, id: Id) -> ApiResult<()> {
        self.delete(&format!("/workouts/{}", id)).await
    }

    async fn reorder_exercises(&self, workout_id: Id, order: &[Id]) -> ApiResult<()> {
        let body = ReorderRequest {
            workout_exercise_ids: order.to_vec(),
        };
        // Server answers with a status object we have no use for
        let _: serde_json::Value = self.post(&format!("/workouts/{}/reorder", workout_id), &body).await?;
        Ok(())
    }

    async fn suggested_workout(&self) -> ApiResult<Option<SuggestedWorkout>> {
        self.get("/workouts/suggested").await
    }

    async fn active_schedule(&self) -> ApiResult<Vec<RoutineDayResponse>> {
        let schedule: Option<Vec<RoutineDayResponse>> = self.get("/routines/active/schedule").await?;
        Ok(schedule.unwrap_or_default())
    }

    async fn create_workout_exercise(&self, payload: &WorkoutExercisePayload) -> ApiResult<WorkoutExercise> {
        self.post("/workout_exercises/", payload).await
    }

    async fn update_workout_exercise(&self, id: Id, payload: &WorkoutExercisePayload) -> ApiResult<WorkoutExercise> {
        self.put(&format!("/workout_exercises/{}", id), payload).await
    }

    async fn delete_workout_exercise(&self, id: Id) -> ApiResult<()> {
        self.delete(&format!("/workout_exercises/{}", id)).await
    }

    async fn create_set(&self, payload: &SetPayload) -> ApiResult<WorkoutSet> {
        self.post("/workout_sets/", payload).await
    }

    async fn update_set(&self, id: Id, payload: &SetPayload) -> ApiResult<WorkoutSet> {
        self.put(&format!("/workout_sets/{}", id), payload).await
    }

    async fn delete_set(&self, id: Id) -> ApiResult<()> {
        self.delete(&format!("/workout_sets/{}", id)).await
    }

    async fn list_exercises(&self) -> ApiResult<Vec<Exercise>> {
        self.get("/exercises/").await
    }

    async fn get_exercise(&self, id: Id) -> ApiResult<Exercise> {
        self.get(&format!("/exercises/{}", id)).await
    }

    async fn last_set(
        &self,
        exercise_id: Id,
        set_number: u32,
        current_workout_id: Option<Id>,
    ) -> ApiResult<Option<LastSet>> {
        let mut endpoint = format!("/exercises/{}/last_set?set_number={}", exercise_id, set_number);
        if let Some(workout_id) = current_workout_id {
            endpoint.push_str(&format!("&current_workout_id={}", workout_id));
        }
        self.get(&endpoint).await
    }
}
