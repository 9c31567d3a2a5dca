use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{UpdateWorkoutRequest, WorkoutEnvelope},
    repo_types::Workout,
    services,
};
use crate::{error::AppError, state::AppState};

pub fn workout_routes() -> Router<AppState> {
    Router::new()
        .route("/workouts", post(create_workout))
        .route(
            "/workouts/:id",
            get(get_workout).put(update_workout).delete(delete_workout),
        )
}

#[instrument(skip(state, payload))]
pub async fn create_workout(
    State(state): State<AppState>,
    payload: Result<Json<Workout>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<WorkoutEnvelope>), AppError> {
    let Json(mut workout) = payload?;
    services::create_workout(state.workouts.as_ref(), &mut workout).await?;

    let mut headers = HeaderMap::new();
    if let Ok(location) = HeaderValue::from_str(&format!("/api/v1/workouts/{}", workout.id)) {
        headers.insert(header::LOCATION, location);
    }
    Ok((StatusCode::CREATED, headers, Json(WorkoutEnvelope { workout })))
}

#[instrument(skip(state))]
pub async fn get_workout(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<WorkoutEnvelope>, AppError> {
    let Path(id) = id?;
    let workout = services::get_workout(state.workouts.as_ref(), id)
        .await?
        .ok_or(AppError::NotFound("workout"))?;
    Ok(Json(WorkoutEnvelope { workout }))
}

#[instrument(skip(state, payload))]
pub async fn update_workout(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateWorkoutRequest>, JsonRejection>,
) -> Result<Json<WorkoutEnvelope>, AppError> {
    let Path(id) = id?;
    let Json(changes) = payload?;
    let workout = services::update_workout(state.workouts.as_ref(), id, changes).await?;
    Ok(Json(WorkoutEnvelope { workout }))
}

#[instrument(skip(state))]
pub async fn delete_workout(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<StatusCode, AppError> {
    let Path(id) = id?;
    services::delete_workout(state.workouts.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
