use anyhow::Context;
use tracing::{error, info, warn};

use super::{
    dto::UpdateWorkoutRequest,
    repo::{WorkoutStore, WorkoutTx},
    repo_types::{Workout, WorkoutEntry},
};
use crate::error::AppError;

fn validate_entry(entry: &WorkoutEntry) -> Result<(), AppError> {
    let at = entry.order_index;
    if entry.exercise_name.trim().is_empty() {
        return Err(AppError::Validation(format!(
            "entry {}: exercise_name is required",
            at
        )));
    }
    if entry.sets < 0 {
        return Err(AppError::Validation(format!(
            "entry {}: sets cannot be negative",
            at
        )));
    }
    match (entry.reps, entry.duration_seconds) {
        (Some(_), Some(_)) | (None, None) => {
            return Err(AppError::Validation(format!(
                "entry {}: set exactly one of reps or duration_seconds \
                 (storage rule valid_workout_entry: an entry is counted in reps or timed, not both)",
                at
            )));
        }
        (Some(n), None) | (None, Some(n)) if n < 0 => {
            return Err(AppError::Validation(format!(
                "entry {}: reps and duration_seconds cannot be negative",
                at
            )));
        }
        _ => {}
    }
    if matches!(entry.weight, Some(w) if !w.is_finite() || w < 0.0) {
        return Err(AppError::Validation(format!(
            "entry {}: weight must be a non-negative number",
            at
        )));
    }
    Ok(())
}

fn validate_entries(entries: &[WorkoutEntry]) -> Result<(), AppError> {
    entries.iter().try_for_each(validate_entry)
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("title is required".into()));
    }
    Ok(())
}

fn validate_non_negative(field: &str, value: i32) -> Result<(), AppError> {
    if value < 0 {
        return Err(AppError::Validation(format!("{} cannot be negative", field)));
    }
    Ok(())
}

pub(crate) fn validate_workout(workout: &Workout) -> Result<(), AppError> {
    validate_title(&workout.title)?;
    validate_non_negative("duration_minutes", workout.duration_minutes)?;
    validate_non_negative("calories_burned", workout.calories_burned)?;
    validate_entries(&workout.entries)
}

fn validate_changes(changes: &UpdateWorkoutRequest) -> Result<(), AppError> {
    if let Some(title) = &changes.title {
        validate_title(title)?;
    }
    if let Some(v) = changes.duration_minutes {
        validate_non_negative("duration_minutes", v)?;
    }
    if let Some(v) = changes.calories_burned {
        validate_non_negative("calories_burned", v)?;
    }
    if let Some(entries) = &changes.entries {
        validate_entries(entries)?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Insert,
    /// Update the row; when `replace_entries` is set the stored entries are
    /// deleted and the workout's current entries inserted in their place.
    Update { replace_entries: bool },
}

/// Ids assigned by storage during one aggregate write.
struct Written {
    workout_id: i64,
    entry_ids: Option<Vec<i64>>,
}

impl Written {
    /// Fills in the ids and puts entries in the order a read returns them.
    fn assign_to(self, workout: &mut Workout) {
        workout.id = self.workout_id;
        if let Some(ids) = self.entry_ids {
            for (entry, id) in workout.entries.iter_mut().zip(ids) {
                entry.id = id;
            }
        }
        workout.entries.sort_by_key(|e| (e.order_index, e.id));
    }
}

async fn insert_entries(
    tx: &mut dyn WorkoutTx,
    workout_id: i64,
    entries: &[WorkoutEntry],
) -> Result<Vec<i64>, AppError> {
    let mut ids = Vec::with_capacity(entries.len());
    for entry in entries {
        ids.push(tx.insert_entry(workout_id, entry).await?);
    }
    Ok(ids)
}

async fn run_writes(
    tx: &mut dyn WorkoutTx,
    workout: &Workout,
    mode: WriteMode,
) -> Result<Written, AppError> {
    match mode {
        WriteMode::Insert => {
            let workout_id = tx.insert_workout(workout).await?;
            let entry_ids = insert_entries(tx, workout_id, &workout.entries).await?;
            Ok(Written {
                workout_id,
                entry_ids: Some(entry_ids),
            })
        }
        WriteMode::Update { replace_entries } => {
            if tx.update_workout(workout).await? == 0 {
                return Err(AppError::NotFound("workout"));
            }
            let entry_ids = if replace_entries {
                tx.delete_entries(workout.id).await?;
                Some(insert_entries(tx, workout.id, &workout.entries).await?)
            } else {
                None
            };
            Ok(Written {
                workout_id: workout.id,
                entry_ids,
            })
        }
    }
}

/// Writes the workout row and its entries in one transaction. Nothing is
/// committed unless every statement succeeds.
async fn write_aggregate(
    store: &dyn WorkoutStore,
    workout: &Workout,
    mode: WriteMode,
) -> Result<Written, AppError> {
    let mut tx = store.begin().await.context("begin workout write")?;
    let result = run_writes(tx.as_mut(), workout, mode).await;
    match result {
        Ok(written) => {
            tx.commit().await.context("commit workout write")?;
            Ok(written)
        }
        Err(e) => {
            if let Err(rb) = tx.rollback().await {
                warn!(error = %rb, workout_id = workout.id, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Persists a new workout and its entries, filling in the generated ids and
/// sorting entries by `order_index`. Ids already present on the input are
/// ignored.
pub async fn create_workout(store: &dyn WorkoutStore, workout: &mut Workout) -> Result<(), AppError> {
    validate_workout(workout)?;

    let written = write_aggregate(store, workout, WriteMode::Insert)
        .await
        .inspect_err(|e| error!(error = %e, user_id = workout.user_id, "create_workout failed"))?;
    written.assign_to(workout);

    info!(
        workout_id = workout.id,
        entries = workout.entries.len(),
        "workout created"
    );
    Ok(())
}

/// `Ok(None)` when no workout has this id.
pub async fn get_workout(store: &dyn WorkoutStore, id: i64) -> Result<Option<Workout>, AppError> {
    let Some(row) = store.find_workout(id).await? else {
        return Ok(None);
    };
    let entries = store.list_entries(id).await.inspect_err(|e| {
        error!(error = %e, workout_id = id, "loading workout entries failed");
    })?;
    Ok(Some(row.with_entries(entries)))
}

/// Merges the supplied fields into the stored workout and persists the
/// result. Supplied entries replace the stored ones outright.
pub async fn update_workout(
    store: &dyn WorkoutStore,
    id: i64,
    changes: UpdateWorkoutRequest,
) -> Result<Workout, AppError> {
    validate_changes(&changes)?;

    let mut workout = get_workout(store, id)
        .await?
        .ok_or(AppError::NotFound("workout"))?;
    let replace_entries = changes.apply(&mut workout);

    let written = write_aggregate(store, &workout, WriteMode::Update { replace_entries })
        .await
        .inspect_err(|e| error!(error = %e, workout_id = id, "update_workout failed"))?;
    written.assign_to(&mut workout);

    info!(workout_id = id, replace_entries, "workout updated");
    Ok(workout)
}

pub async fn delete_workout(store: &dyn WorkoutStore, id: i64) -> Result<(), AppError> {
    let deleted = store
        .delete_workout(id)
        .await
        .inspect_err(|e| error!(error = %e, workout_id = id, "delete_workout failed"))?;
    if deleted == 0 {
        return Err(AppError::NotFound("workout"));
    }
    info!(workout_id = id, "workout deleted");
    Ok(())
}
