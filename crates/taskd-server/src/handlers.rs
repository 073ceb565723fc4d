use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Deserializer};
use serde_json::json;

use taskd_store::tasks::DEFAULT_PRIORITY;
use taskd_store::{TaskPatch, TaskRow};

use crate::error::{ApiError, FieldError};
use crate::server::AppState;

const TITLE_MAX: usize = 200;
const DESCRIPTION_MAX: usize = 1000;

/// POST /tasks body.
#[derive(Debug, Deserialize)]
pub struct CreateTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default = "default_priority")]
    pub priority: String,
}

/// PUT /tasks/{id} body. All fields required except `description`.
#[derive(Debug, Deserialize)]
pub struct ReplaceTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub completed: bool,
    pub priority: String,
}

/// PATCH /tasks/{id} body. Every field optional; for `description` the
/// double Option keeps "omitted" distinct from an explicit null.
#[derive(Debug, Default, Deserialize)]
pub struct PatchTask {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<String>,
}

fn default_priority() -> String {
    DEFAULT_PRIORITY.to_string()
}

/// Deserialize a present-but-possibly-null field as `Some(inner)`.
/// Absent fields fall back to the `None` default and are never seen here.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn check_title(title: &str, errors: &mut Vec<FieldError>) {
    if title.is_empty() {
        errors.push(FieldError::new("title", "must not be empty"));
    } else if title.chars().count() > TITLE_MAX {
        errors.push(FieldError::new(
            "title",
            format!("must be at most {TITLE_MAX} characters"),
        ));
    }
}

fn check_description(description: &str, errors: &mut Vec<FieldError>) {
    if description.chars().count() > DESCRIPTION_MAX {
        errors.push(FieldError::new(
            "description",
            format!("must be at most {DESCRIPTION_MAX} characters"),
        ));
    }
}

/// A body that failed extraction (malformed JSON, missing required field,
/// wrong type) is unprocessable input, same as a length violation.
fn reject_body(rejection: JsonRejection) -> ApiError {
    ApiError::validation("body", rejection.body_text())
}

/// A non-integer `{id}` segment is unprocessable input, not a missing route.
fn task_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    match path {
        Ok(Path(id)) => Ok(id),
        Err(_) => Err(ApiError::validation("id", "must be an integer")),
    }
}

/// GET /
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Welcome to Task Management API" }))
}

/// POST /tasks
pub async fn create_task(
    State(state): State<AppState>,
    body: Result<Json<CreateTask>, JsonRejection>,
) -> Result<(StatusCode, Json<TaskRow>), ApiError> {
    let Json(body) = body.map_err(reject_body)?;

    let mut errors = Vec::new();
    check_title(&body.title, &mut errors);
    if let Some(description) = &body.description {
        check_description(description, &mut errors);
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let task = state.tasks.insert(
        &body.title,
        body.description.as_deref(),
        body.completed,
        &body.priority,
    )?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /tasks
pub async fn list_tasks(State(state): State<AppState>) -> Result<Json<Vec<TaskRow>>, ApiError> {
    Ok(Json(state.tasks.list()?))
}

/// GET /tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<TaskRow>, ApiError> {
    let id = task_id(path)?;
    Ok(Json(state.tasks.get(id)?))
}

/// PUT /tasks/{id} — full replace; omitted `description` resets to null.
pub async fn replace_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<ReplaceTask>, JsonRejection>,
) -> Result<Json<TaskRow>, ApiError> {
    let id = task_id(path)?;
    let Json(body) = body.map_err(reject_body)?;

    let mut errors = Vec::new();
    check_title(&body.title, &mut errors);
    if let Some(description) = &body.description {
        check_description(description, &mut errors);
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let task = state.tasks.replace(
        id,
        &body.title,
        body.description.as_deref(),
        body.completed,
        &body.priority,
    )?;
    Ok(Json(task))
}

/// PATCH /tasks/{id} — merge only the supplied fields.
pub async fn patch_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    body: Result<Json<PatchTask>, JsonRejection>,
) -> Result<Json<TaskRow>, ApiError> {
    let id = task_id(path)?;
    let Json(body) = body.map_err(reject_body)?;

    let mut errors = Vec::new();
    if let Some(title) = &body.title {
        check_title(title, &mut errors);
    }
    if let Some(Some(description)) = &body.description {
        check_description(description, &mut errors);
    }
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let patch = TaskPatch {
        title: body.title,
        description: body.description,
        completed: body.completed,
        priority: body.priority,
    };
    Ok(Json(state.tasks.patch(id, &patch)?))
}

/// DELETE /tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = task_id(path)?;
    state.tasks.delete(id)?;
    Ok(Json(json!({
        "message": format!("Task {id} deleted successfully")
    })))
}
