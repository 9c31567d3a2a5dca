use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A workout together with its owned entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    #[serde(default)]
    pub id: i64,
    /// Owner reference; zero when the client leaves it out.
    #[serde(default)]
    pub user_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub duration_minutes: i32,
    #[serde(default)]
    pub calories_burned: i32,
    #[serde(default)]
    pub entries: Vec<WorkoutEntry>,
}

/// `reps`, `duration_seconds` and `weight` are `None` when not tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct WorkoutEntry {
    #[serde(default)]
    pub id: i64,
    pub exercise_name: String,
    #[serde(default)]
    pub sets: i32,
    pub reps: Option<i32>,
    pub duration_seconds: Option<i32>,
    pub weight: Option<f64>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub order_index: i32,
}

/// The `workouts` row alone.
#[derive(Debug, Clone, FromRow)]
pub struct WorkoutRow {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: i32,
    pub calories_burned: i32,
}

impl WorkoutRow {
    pub fn with_entries(self, entries: Vec<WorkoutEntry>) -> Workout {
        Workout {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            duration_minutes: self.duration_minutes,
            calories_burned: self.calories_burned,
            entries,
        }
    }
}

impl From<&Workout> for WorkoutRow {
    fn from(w: &Workout) -> Self {
        Self {
            id: w.id,
            user_id: w.user_id,
            title: w.title.clone(),
            description: w.description.clone(),
            duration_minutes: w.duration_minutes,
            calories_burned: w.calories_burned,
        }
    }
}
