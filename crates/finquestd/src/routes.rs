//! API routes for finquestd.
//!
//! Identity rides on the `x-user-id` header; the auth transport in front
//! of the daemon is expected to have validated it. Handlers stay thin and
//! delegate to the store, mapping domain errors onto HTTP statuses.

use crate::server::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use crate::store::{
    AttemptOutcome, ImportSummary, LessonCompletion, LessonDetail, MeView, PathDetail,
    PracticeCompletion, PracticeQueue, ProfileUpdate, SkillDetail, SubmissionOutcome,
};
use finquest_common::models::{
    ContentPack, LearningPath, Profile, Project, ProjectSubmission, User,
};
use finquest_common::FinquestError;

type AppStateArc = Arc<AppState>;

fn fail(e: FinquestError) -> (StatusCode, String) {
    let status = StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("Request failed: {e}");
    }
    (status, e.to_string())
}

/// Pull the caller identity off the request headers.
fn caller(headers: &HeaderMap) -> Result<String, (StatusCode, String)> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| fail(FinquestError::Unauthorized))
}

// ============================================================================
// User Routes
// ============================================================================

pub fn user_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/users", post(create_user))
        .route("/v1/me", get(me))
        .route("/v1/me/profile", put(update_profile))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    email: String,
    display_name: String,
}

async fn create_user(
    State(state): State<AppStateArc>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), (StatusCode, String)> {
    if req.email.trim().is_empty() || !req.email.contains('@') {
        return Err(fail(FinquestError::Validation(
            "a valid email is required".to_string(),
        )));
    }
    if req.display_name.trim().is_empty() {
        return Err(fail(FinquestError::Validation(
            "displayName must not be empty".to_string(),
        )));
    }

    let user = state
        .store
        .create_user(req.email.trim().to_string(), req.display_name.trim().to_string())
        .await
        .map_err(fail)?;
    info!("Created user {}", user.id);
    Ok((StatusCode::CREATED, Json(user)))
}

async fn me(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> Result<Json<MeView>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    let view = state.store.me(user_id).await.map_err(fail)?;
    Ok(Json(view))
}

async fn update_profile(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<Profile>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    if let Some(minutes) = req.daily_goal_minutes {
        if !(1..=240).contains(&minutes) {
            return Err(fail(FinquestError::Validation(
                "dailyGoalMinutes must be between 1 and 240".to_string(),
            )));
        }
    }
    let profile = state.store.update_profile(user_id, req).await.map_err(fail)?;
    Ok(Json(profile))
}

// ============================================================================
// Content Routes
// ============================================================================

pub fn content_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/paths", get(list_paths))
        .route("/v1/paths/:id", get(path_detail))
        .route("/v1/skills/:id", get(skill_detail))
        .route("/v1/lessons/:id", get(lesson_detail))
        .route("/v1/content/import", post(import_content))
}

async fn list_paths(
    State(state): State<AppStateArc>,
) -> Result<Json<Vec<LearningPath>>, (StatusCode, String)> {
    let paths = state.store.list_paths().await.map_err(fail)?;
    Ok(Json(paths))
}

async fn path_detail(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<PathDetail>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    let detail = state.store.path_detail(id, user_id).await.map_err(fail)?;
    Ok(Json(detail))
}

async fn skill_detail(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<SkillDetail>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    let detail = state.store.skill_detail(id, user_id).await.map_err(fail)?;
    Ok(Json(detail))
}

async fn lesson_detail(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LessonDetail>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    let detail = state.store.lesson_detail(id, user_id).await.map_err(fail)?;
    Ok(Json(detail))
}

async fn import_content(
    State(state): State<AppStateArc>,
    Json(pack): Json<ContentPack>,
) -> Result<Json<ImportSummary>, (StatusCode, String)> {
    let summary = state.store.import_content(pack).await.map_err(fail)?;
    Ok(Json(summary))
}

// ============================================================================
// Progression Routes
// ============================================================================

pub fn progression_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/attempts", post(submit_attempt))
        .route("/v1/lessons/:id/complete", post(complete_lesson))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptRequest {
    exercise_id: String,
    answer: Value,
}

async fn submit_attempt(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Json(req): Json<AttemptRequest>,
) -> Result<Json<AttemptOutcome>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    let outcome = state
        .store
        .grade_attempt(user_id, req.exercise_id, req.answer)
        .await
        .map_err(fail)?;
    Ok(Json(outcome))
}

async fn complete_lesson(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<LessonCompletion>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    let completion = state.store.complete_lesson(user_id, id).await.map_err(fail)?;
    Ok(Json(completion))
}

// ============================================================================
// Practice Routes
// ============================================================================

pub fn practice_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/practice/queue", get(practice_queue))
        .route("/v1/practice/complete", post(complete_practice))
}

async fn practice_queue(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> Result<Json<PracticeQueue>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    let queue = state.store.practice_queue(user_id).await.map_err(fail)?;
    Ok(Json(queue))
}

async fn complete_practice(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> Result<Json<PracticeCompletion>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    let completion = state.store.complete_practice(user_id).await.map_err(fail)?;
    Ok(Json(completion))
}

// ============================================================================
// Project Routes
// ============================================================================

pub fn project_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/v1/projects/:id", get(get_project))
        .route("/v1/projects/:id/submit", post(submit_project))
        .route("/v1/submissions", get(list_submissions))
}

async fn get_project(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
) -> Result<Json<Project>, (StatusCode, String)> {
    let project = state.store.get_project(id).await.map_err(fail)?;
    Ok(Json(project))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitProjectRequest {
    data: Value,
}

async fn submit_project(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<SubmitProjectRequest>,
) -> Result<(StatusCode, Json<SubmissionOutcome>), (StatusCode, String)> {
    let user_id = caller(&headers)?;
    if !req.data.is_object() {
        return Err(fail(FinquestError::Validation(
            "data must be a JSON object".to_string(),
        )));
    }
    let outcome = state
        .store
        .submit_project(user_id, id, req.data)
        .await
        .map_err(fail)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn list_submissions(
    State(state): State<AppStateArc>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProjectSubmission>>, (StatusCode, String)> {
    let user_id = caller(&headers)?;
    let submissions = state.store.list_submissions(user_id).await.map_err(fail)?;
    Ok(Json(submissions))
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/v1/health", get(health))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
