use serde::{Deserialize, Serialize};

use super::repo_types::{Workout, WorkoutEntry};

/// Partial update. An absent (or `null`) field keeps the stored value;
/// `entries`, when present, replaces the whole collection.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateWorkoutRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub calories_burned: Option<i32>,
    pub entries: Option<Vec<WorkoutEntry>>,
}

impl UpdateWorkoutRequest {
    /// Overwrites the supplied fields; returns whether entries were replaced.
    pub fn apply(self, workout: &mut Workout) -> bool {
        if let Some(title) = self.title {
            workout.title = title;
        }
        if let Some(description) = self.description {
            workout.description = description;
        }
        if let Some(duration_minutes) = self.duration_minutes {
            workout.duration_minutes = duration_minutes;
        }
        if let Some(calories_burned) = self.calories_burned {
            workout.calories_burned = calories_burned;
        }
        match self.entries {
            Some(entries) => {
                workout.entries = entries;
                true
            }
            None => false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WorkoutEnvelope {
    pub workout: Workout,
}
