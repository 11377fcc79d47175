//! Data model - client-side views of the records served by the liftlog API

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned identifier. `0` marks a record that only exists locally.
pub type Id = i64;

/// Identifier used for sets that were never persisted
pub const LOCAL_ID: Id = 0;

/// Metrics an exercise can track; controls which set fields are shown
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TrackedMetric {
    Reps,
    Weight,
    Distance,
    Time,
    Rpe,
    Tempo,
}

impl TrackedMetric {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "reps" => Some(TrackedMetric::Reps),
            "weight" => Some(TrackedMetric::Weight),
            "distance" => Some(TrackedMetric::Distance),
            "time" => Some(TrackedMetric::Time),
            "rpe" => Some(TrackedMetric::Rpe),
            "tempo" => Some(TrackedMetric::Tempo),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TrackedMetric::Reps => "reps",
            TrackedMetric::Weight => "weight",
            TrackedMetric::Distance => "distance",
            TrackedMetric::Time => "time",
            TrackedMetric::Rpe => "rpe",
            TrackedMetric::Tempo => "tempo",
        }
    }

    /// Parse the comma-separated catalog form (`"weight,reps"`).
    /// Missing or empty input means weight + reps.
    pub fn parse_list(raw: Option<&str>) -> Vec<TrackedMetric> {
        let parsed: Vec<TrackedMetric> = raw
            .unwrap_or_default()
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .filter_map(|t| {
                let metric = TrackedMetric::parse(t);
                if metric.is_none() {
                    tracing::debug!("Ignoring unknown tracked metric {:?}", t);
                }
                metric
            })
            .collect();

        if parsed.is_empty() {
            vec![TrackedMetric::Weight, TrackedMetric::Reps]
        } else {
            parsed
        }
    }
}

/// Exercise catalog entry
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Exercise {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub muscle_group: Vec<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub default_sets: Option<u32>,
    #[serde(default)]
    pub default_reps: Option<String>,
    #[serde(default)]
    pub default_rest_seconds: Option<u32>,
    #[serde(default)]
    pub default_weight_percent: Option<f64>,
    #[serde(default)]
    pub default_tempo: Option<String>,
    #[serde(default)]
    pub default_time_seconds: Option<u32>,
    #[serde(default)]
    pub tracked_metrics: Option<String>, // comma separated, e.g. "weight,reps"
}

impl Exercise {
    pub fn metrics(&self) -> Vec<TrackedMetric> {
        TrackedMetric::parse_list(self.tracked_metrics.as_deref())
    }
}

/// One logged set within a workout exercise
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: Id,
    pub workout_exercise_id: Id,
    pub set_number: u32,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub rpe: Option<f64>,
    #[serde(default)]
    pub tempo: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
}

impl WorkoutSet {
    pub fn is_persisted(&self) -> bool {
        self.id != LOCAL_ID
    }
}

/// One exercise slot within a workout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkoutExercise {
    pub id: Id,
    pub workout_id: Id,
    pub exercise_id: Id,
    pub sequence: u32,
    #[serde(default)]
    pub exercise: Option<Exercise>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sets: Vec<WorkoutSet>,
}

impl WorkoutExercise {
    /// At least one set and every set completed
    pub fn is_complete(&self) -> bool {
        !self.sets.is_empty() && self.sets.iter().all(|s| s.completed)
    }

    pub fn name(&self) -> &str {
        self.exercise.as_ref().map(|e| e.name.as_str()).unwrap_or("Unknown exercise")
    }

    pub fn group_name(&self) -> Option<&str> {
        self.exercise.as_ref().and_then(|e| e.group_name.as_deref())
    }
}

/// Workout session record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workout {
    pub id: Id,
    pub user_id: Id,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exercises: Vec<WorkoutExercise>,
}

impl Workout {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }
}

/// Set as it appears in the workout list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SetSummary {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default)]
    pub set_number: Option<u32>,
    #[serde(default)]
    pub reps: Option<u32>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub distance_m: Option<f64>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub completed: bool,
}

/// Exercise as it appears in the workout list; `id` is the catalog id
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExerciseSummary {
    pub id: Id,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub muscle_group: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sets: Vec<SetSummary>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub tracked_metrics: Option<String>,
}

/// Workout list entry: a single exercise or a run of grouped ones
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum HistoryEntry {
    Superset {
        superset: Vec<ExerciseSummary>,
        #[serde(default)]
        group_name: Option<String>,
    },
    Exercise(ExerciseSummary),
}

impl HistoryEntry {
    pub fn exercises(&self) -> &[ExerciseSummary] {
        match self {
            HistoryEntry::Superset { superset, .. } => superset,
            HistoryEntry::Exercise(exercise) => std::slice::from_ref(exercise),
        }
    }
}

/// Workout record returned by the list endpoint.
///
/// Unlike [`Workout`], exercises carry no slot ids and supersets come
/// back already grouped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSummary {
    pub id: Id,
    pub user_id: Id,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exercises: Vec<HistoryEntry>,
}

impl WorkoutSummary {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    /// Every exercise, supersets flattened in order
    pub fn all_exercises(&self) -> impl Iterator<Item = &ExerciseSummary> {
        self.exercises.iter().flat_map(HistoryEntry::exercises)
    }

    /// (completed, total) sets
    pub fn set_counts(&self) -> (usize, usize) {
        self.all_exercises()
            .flat_map(|e| &e.sets)
            .fold((0, 0), |(done, total), set| (done + set.completed as usize, total + 1))
    }
}

/// Exercise entry of a routine day template
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplateExercise {
    pub id: Id, // catalog exercise id
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub muscle_group: Vec<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub suggested_sets: Option<u32>,
    #[serde(default)]
    pub suggested_reps: Option<String>,
    #[serde(default)]
    pub suggested_weight_percent: Option<f64>,
    #[serde(default)]
    pub rest_period_seconds: Option<u32>,
    #[serde(default)]
    pub tempo: Option<String>,
    #[serde(default)]
    pub suggested_time_seconds: Option<u32>,
}

/// Next routine day suggested by the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SuggestedWorkout {
    pub routine_name: String,
    pub day_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exercises: Vec<TemplateExercise>,
}

/// One day of the active routine's schedule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutineDayResponse {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub day_of_week: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub exercises: Vec<TemplateExercise>,
}

/// Read-only template used to seed a new workout
#[derive(Debug, Clone, PartialEq)]
pub struct RoutineDay {
    pub routine_name: Option<String>,
    pub day_name: String,
    pub exercises: Vec<TemplateExercise>,
}

impl From<SuggestedWorkout> for RoutineDay {
    fn from(s: SuggestedWorkout) -> Self {
        Self {
            routine_name: Some(s.routine_name),
            day_name: s.day_name,
            exercises: s.exercises,
        }
    }
}

impl From<RoutineDayResponse> for RoutineDay {
    fn from(d: RoutineDayResponse) -> Self {
        Self {
            routine_name: None,
            day_name: d.name,
            exercises: d.exercises,
        }
    }
}

impl RoutineDay {
    /// Notes stored on a workout started from this day
    pub fn workout_notes(&self) -> String {
        format!(
            "Routine: {} - {}",
            self.routine_name.as_deref().unwrap_or("Active Routine"),
            self.day_name
        )
    }
}

/// Most recent logged values for an exercise + set number
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LastSet {
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub reps: Option<u32>,
}

/// Body of POST /workouts/
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewWorkout {
    pub user_id: Id,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub notes: String,
}

/// Body of POST/PUT /workout_exercises/
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WorkoutExercisePayload {
    pub workout_id: Id,
    pub exercise_id: Id,
    pub sequence: u32,
}

/// Body of POST/PUT /workout_sets/
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SetPayload {
    pub workout_exercise_id: Id,
    pub set_number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reps: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpe: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    pub completed: bool,
}

/// Body of POST /workouts/{id}/reorder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReorderRequest {
    pub workout_exercise_ids: Vec<Id>,
}

/// Leading integer of a rep prescription: `"8-12"` -> 8, `"10"` -> 10
pub fn parse_rep_target(raw: &str) -> Option<u32> {
    let digits: String = raw.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Treat an explicit JSON `null` like a missing field
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracked_metrics_default() {
        assert_eq!(
            TrackedMetric::parse_list(None),
            vec![TrackedMetric::Weight, TrackedMetric::Reps]
        );
        assert_eq!(
            TrackedMetric::parse_list(Some("")),
            vec![TrackedMetric::Weight, TrackedMetric::Reps]
        );
    }

    #[test]
    fn test_tracked_metrics_parse_ignores_unknown() {
        let metrics = TrackedMetric::parse_list(Some("reps, Time,height"));
        assert_eq!(metrics, vec![TrackedMetric::Reps, TrackedMetric::Time]);
    }

    #[test]
    fn test_parse_rep_target() {
        assert_eq!(parse_rep_target("8-12"), Some(8));
        assert_eq!(parse_rep_target(" 10 "), Some(10));
        assert_eq!(parse_rep_target("AMRAP"), None);
        assert_eq!(parse_rep_target(""), None);
    }

    #[test]
    fn test_workout_exercise_completion() {
        let mut we = WorkoutExercise::default();
        assert!(!we.is_complete()); // no sets

        we.sets = vec![
            WorkoutSet { set_number: 1, completed: true, ..Default::default() },
            WorkoutSet { set_number: 2, completed: false, ..Default::default() },
        ];
        assert!(!we.is_complete());

        we.sets[1].completed = true;
        assert!(we.is_complete());
    }

    #[test]
    fn test_deserialize_active_workout_with_nulls() {
        let json = r#"{
            "id": 7, "user_id": 1, "date": "2024-03-02",
            "start_time": "18:30:05.123456", "end_time": null, "notes": null,
            "exercises": [{
                "id": 11, "workout_id": 7, "exercise_id": 3, "sequence": 1,
                "exercise": {"id": 3, "name": "Squat", "muscle_group": null, "tracked_metrics": "reps,weight"},
                "sets": [{"id": 21, "workout_exercise_id": 11, "set_number": 1,
                          "weight_kg": 100.0, "reps": 5, "completed": null}]
            }]
        }"#;
        let workout: Workout = serde_json::from_str(json).unwrap();
        assert!(!workout.is_finished());
        assert_eq!(workout.exercises[0].name(), "Squat");
        assert!(workout.exercises[0].exercise.as_ref().unwrap().muscle_group.is_empty());
        assert!(!workout.exercises[0].sets[0].completed);
    }

    #[test]
    fn test_deserialize_workout_list_with_superset() {
        let json = r#"[{
            "id": 9, "user_id": 1, "date": "2024-03-04",
            "start_time": "07:00:00", "end_time": "08:05:00", "notes": "Routine: PPL - Push",
            "exercises": [
                {"id": 3, "name": "Bench Press", "muscle_group": ["chest"], "group_name": null,
                 "sets": [{"id": 40, "set_number": 1, "reps": 5, "weight_kg": 80.0, "completed": true}]},
                {"superset": [
                    {"id": 5, "name": "Curl", "muscle_group": [], "group_name": "A",
                     "sets": [{"set_number": 1, "reps": 12, "completed": false}]},
                    {"id": 6, "name": "Pushdown", "group_name": "A", "tracked_metrics": "reps", "sets": []}
                 ], "group_name": "A"}
            ]
        }]"#;
        let workouts: Vec<WorkoutSummary> = serde_json::from_str(json).unwrap();
        let w = &workouts[0];
        assert!(w.is_finished());
        assert_eq!(w.exercises.len(), 2);
        assert!(matches!(&w.exercises[0], HistoryEntry::Exercise(e) if e.id == 3));
        match &w.exercises[1] {
            HistoryEntry::Superset { superset, group_name } => {
                assert_eq!(group_name.as_deref(), Some("A"));
                assert_eq!(superset.len(), 2);
                assert_eq!(superset[0].sets[0].id, None);
            }
            other => panic!("expected superset, got {:?}", other),
        }
        let names: Vec<_> = w.all_exercises().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bench Press", "Curl", "Pushdown"]);
        assert_eq!(w.set_counts(), (1, 2));
    }

    #[test]
    fn test_set_payload_skips_empty_fields() {
        let payload = SetPayload {
            workout_exercise_id: 4,
            set_number: 2,
            reps: Some(8),
            ..Default::default()
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"workout_exercise_id": 4, "set_number": 2, "reps": 8, "completed": false})
        );
    }

    #[test]
    fn test_routine_day_notes() {
        let suggested = SuggestedWorkout {
            routine_name: "5/3/1".into(),
            day_name: "Squat Day".into(),
            exercises: vec![],
        };
        assert_eq!(RoutineDay::from(suggested).workout_notes(), "Routine: 5/3/1 - Squat Day");

        let day = RoutineDayResponse { id: 2, name: "Pull".into(), day_of_week: None, exercises: vec![] };
        assert_eq!(RoutineDay::from(day).workout_notes(), "Routine: Active Routine - Pull");
    }
}
