use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::repo_types::{Workout, WorkoutEntry, WorkoutRow};

/// Read and delete operations, plus the entry point to the transactional
/// write path.
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    async fn begin(&self) -> anyhow::Result<Box<dyn WorkoutTx>>;
    async fn find_workout(&self, id: i64) -> anyhow::Result<Option<WorkoutRow>>;
    /// Entries of one workout in `order_index` order.
    async fn list_entries(&self, workout_id: i64) -> anyhow::Result<Vec<WorkoutEntry>>;
    /// Returns the number of workouts removed; entries go with them.
    async fn delete_workout(&self, id: i64) -> anyhow::Result<u64>;
}

/// One open transaction. Dropping it without `commit` discards every write.
#[async_trait]
pub trait WorkoutTx: Send {
    async fn insert_workout(&mut self, workout: &Workout) -> anyhow::Result<i64>;
    /// Returns the affected row count.
    async fn update_workout(&mut self, workout: &Workout) -> anyhow::Result<u64>;
    async fn delete_entries(&mut self, workout_id: i64) -> anyhow::Result<u64>;
    async fn insert_entry(&mut self, workout_id: i64, entry: &WorkoutEntry)
        -> anyhow::Result<i64>;
    async fn commit(self: Box<Self>) -> anyhow::Result<()>;
    async fn rollback(self: Box<Self>) -> anyhow::Result<()>;
}

#[derive(Clone)]
pub struct PgWorkoutStore {
    db: PgPool,
}

impl PgWorkoutStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

pub struct PgWorkoutTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl WorkoutStore for PgWorkoutStore {
    async fn begin(&self) -> anyhow::Result<Box<dyn WorkoutTx>> {
        let tx = self.db.begin().await.context("begin tx")?;
        Ok(Box::new(PgWorkoutTx { tx }))
    }

    async fn find_workout(&self, id: i64) -> anyhow::Result<Option<WorkoutRow>> {
        let row = sqlx::query_as::<_, WorkoutRow>(
            r#"
            SELECT id, user_id, title, description, duration_minutes, calories_burned
            FROM workouts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("select workout")?;
        Ok(row)
    }

    async fn list_entries(&self, workout_id: i64) -> anyhow::Result<Vec<WorkoutEntry>> {
        let rows = sqlx::query_as::<_, WorkoutEntry>(
            r#"
            SELECT id, exercise_name, sets, reps, duration_seconds, weight, notes, order_index
              FROM workout_entries
             WHERE workout_id = $1
             ORDER BY order_index ASC, id ASC
            "#,
        )
        .bind(workout_id)
        .fetch_all(&self.db)
        .await
        .context("list workout entries")?;
        Ok(rows)
    }

    async fn delete_workout(&self, id: i64) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM workouts WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete workout")?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl WorkoutTx for PgWorkoutTx {
    async fn insert_workout(&mut self, workout: &Workout) -> anyhow::Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO workouts (user_id, title, description, duration_minutes, calories_burned)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(workout.user_id)
        .bind(&workout.title)
        .bind(&workout.description)
        .bind(workout.duration_minutes)
        .bind(workout.calories_burned)
        .fetch_one(&mut *self.tx)
        .await
        .context("insert workout")?;
        Ok(id)
    }

    async fn update_workout(&mut self, workout: &Workout) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE workouts
            SET title = $1, description = $2, duration_minutes = $3, calories_burned = $4,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $5
            "#,
        )
        .bind(&workout.title)
        .bind(&workout.description)
        .bind(workout.duration_minutes)
        .bind(workout.calories_burned)
        .bind(workout.id)
        .execute(&mut *self.tx)
        .await
        .context("update workout")?;
        Ok(result.rows_affected())
    }

    async fn delete_entries(&mut self, workout_id: i64) -> anyhow::Result<u64> {
        let result = sqlx::query("DELETE FROM workout_entries WHERE workout_id = $1")
            .bind(workout_id)
            .execute(&mut *self.tx)
            .await
            .context("delete workout entries")?;
        Ok(result.rows_affected())
    }

    async fn insert_entry(
        &mut self,
        workout_id: i64,
        entry: &WorkoutEntry,
    ) -> anyhow::Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO workout_entries
                (workout_id, exercise_name, sets, reps, duration_seconds, weight, notes, order_index)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(workout_id)
        .bind(&entry.exercise_name)
        .bind(entry.sets)
        .bind(entry.reps) // Option<i32> → NULL allowed
        .bind(entry.duration_seconds)
        .bind(entry.weight)
        .bind(&entry.notes)
        .bind(entry.order_index)
        .fetch_one(&mut *self.tx)
        .await
        .with_context(|| format!("insert workout entry {}", entry.order_index))?;
        Ok(id)
    }

    async fn commit(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.commit().await.context("commit tx")
    }

    async fn rollback(self: Box<Self>) -> anyhow::Result<()> {
        self.tx.rollback().await.context("rollback tx")
    }
}
