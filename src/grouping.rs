//! Superset grouping - contiguous exercises sharing a group name are shown together

use crate::models::WorkoutExercise;

/// A run of consecutive exercises, by index into the ordered list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseGroup {
    pub name: Option<String>, // None = standalone exercise
    pub indices: Vec<usize>,
}

impl ExerciseGroup {
    pub fn is_superset(&self) -> bool {
        self.name.is_some() && self.indices.len() > 1
    }
}

/// Group the ordered exercise list for display. Pure; nothing is stored.
pub fn group_exercises(exercises: &[WorkoutExercise]) -> Vec<ExerciseGroup> {
    let mut groups: Vec<ExerciseGroup> = Vec::new();

    for (index, we) in exercises.iter().enumerate() {
        let name = we.group_name().filter(|n| !n.trim().is_empty());
        if let Some(name) = name
            && let Some(last) = groups.last_mut()
            && last.name.as_deref() == Some(name)
        {
            last.indices.push(index);
            continue;
        }
        groups.push(ExerciseGroup {
            name: name.map(str::to_string),
            indices: vec![index],
        });
    }

    groups
}
