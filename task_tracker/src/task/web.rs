use askama::Template;
use axum::{
    Form, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use std::sync::Arc;

use crate::task::form::{DEFAULT_COMPLETED, RawTaskFields, ValidationErrors, parse_checkbox};
use crate::task::handler::{TaskHandler, TaskOutcome};
use crate::task::{Task, TaskService};

/// Cookie carrying a one-shot message to the next rendered task list.
pub const FLASH_COOKIE: &str = "flash";

#[derive(Clone, Debug)]
pub struct TaskState {
    pub db: Arc<sea_orm::DatabaseConnection>,
}

/// Custom error type for task page handlers.
#[derive(Debug, thiserror::Error)]
enum TaskPageError {
    /// Represents an error during template rendering.
    #[error("Template rendering failed")]
    Template(#[from] askama::Error),
    /// Represents a database error.
    #[error("Database error")]
    Database(#[from] sea_orm::DbErr),
    /// Validation errors surfaced by an operation that takes no fields.
    #[error("Unexpected validation failure: {0}")]
    UnexpectedValidation(#[from] ValidationErrors),
}

impl IntoResponse for TaskPageError {
    fn into_response(self) -> Response {
        tracing::error!("Task page failed: {}", self);
        let user_facing_error_message =
            "An unexpected error occurred while processing your request. Please try again later.";

        let error_template = ErrorMessageTemplate::new(user_facing_error_message.to_string());
        let Ok(rendered) = error_template.render() else {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Html(rendered)).into_response()
    }
}

/// Values shown in the task form inputs.
#[derive(Debug, Default)]
struct TaskFormValues {
    title: String,
    description: String,
    completed: bool,
}

impl From<&RawTaskFields> for TaskFormValues {
    fn from(raw: &RawTaskFields) -> Self {
        Self {
            title: raw.title.clone().unwrap_or_default(),
            description: raw.description.clone().unwrap_or_default(),
            completed: raw
                .completed
                .as_deref()
                .map(parse_checkbox)
                .unwrap_or(DEFAULT_COMPLETED),
        }
    }
}

impl From<&Task> for TaskFormValues {
    fn from(task: &Task) -> Self {
        Self {
            title: task.title().to_string(),
            description: task.description().unwrap_or_default().to_string(),
            completed: task.completed(),
        }
    }
}

#[derive(Template)]
#[template(path = "tasks/task_list.html")]
struct TaskListTemplate {
    tasks: Vec<Task>,
    flash: Option<String>,
}

impl TaskListTemplate {
    pub fn new(tasks: Vec<Task>, flash: Option<String>) -> Self {
        Self { tasks, flash }
    }
}

#[derive(Template)]
#[template(path = "tasks/task_form.html")]
struct TaskFormTemplate {
    action: &'static str,
    form_action: String,
    cancel_url: String,
    values: TaskFormValues,
    errors: ValidationErrors,
}

impl TaskFormTemplate {
    pub fn for_create(values: TaskFormValues, errors: ValidationErrors) -> Self {
        Self {
            action: "Create",
            form_action: "/create".to_string(),
            cancel_url: "/".to_string(),
            values,
            errors,
        }
    }

    pub fn for_update(id: u32, values: TaskFormValues, errors: ValidationErrors) -> Self {
        Self {
            action: "Update",
            form_action: format!("/task/{}/update", id),
            cancel_url: format!("/task/{}", id),
            values,
            errors,
        }
    }
}

#[derive(Template)]
#[template(path = "tasks/task_detail.html")]
struct TaskDetailTemplate {
    task: Task,
}

#[derive(Template)]
#[template(path = "tasks/task_confirm_delete.html")]
struct TaskConfirmDeleteTemplate {
    task: Task,
}

#[derive(Template)]
#[template(path = "tasks/task_not_found.html")]
struct TaskNotFoundTemplate {
    id: u32,
}

#[derive(Template)]
#[template(path = "tasks/error_message.html")]
struct ErrorMessageTemplate {
    message: String,
}

impl ErrorMessageTemplate {
    pub fn new(message: String) -> Self {
        Self { message }
    }
}

fn with_flash(jar: CookieJar, message: String) -> CookieJar {
    jar.add(
        Cookie::build((FLASH_COOKIE, message))
            .path("/")
            .http_only(true),
    )
}

fn not_found_response(id: u32) -> Result<Response, TaskPageError> {
    let rendered = TaskNotFoundTemplate { id }.render()?;
    Ok((StatusCode::NOT_FOUND, Html(rendered)).into_response())
}

fn form_response(
    status: StatusCode,
    template: TaskFormTemplate,
) -> Result<Response, TaskPageError> {
    let rendered = template.render()?;
    Ok((status, Html(rendered)).into_response())
}

/// Handler for GET / that lists every task and consumes any pending flash message.
#[tracing::instrument(skip(state, jar))]
async fn task_list_handler(
    State(state): State<Arc<TaskState>>,
    jar: CookieJar,
) -> Result<Response, TaskPageError> {
    let handler = TaskHandler::new(TaskService::new(&state.db));
    let tasks = handler.handle_list().await?;

    let flash = jar.get(FLASH_COOKIE).map(|cookie| cookie.value().to_string());
    let jar = match flash {
        Some(_) => jar.remove(Cookie::build(FLASH_COOKIE).path("/")),
        None => jar,
    };

    let rendered = TaskListTemplate::new(tasks, flash).render()?;
    Ok((jar, Html(rendered)).into_response())
}

/// Handler for GET /create that serves an empty task form.
#[tracing::instrument]
async fn create_form_handler() -> Result<Response, TaskPageError> {
    form_response(
        StatusCode::OK,
        TaskFormTemplate::for_create(TaskFormValues::default(), ValidationErrors::default()),
    )
}

/// Handler for POST /create.
#[tracing::instrument(skip(state, jar))]
async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    jar: CookieJar,
    Form(raw): Form<RawTaskFields>,
) -> Result<Response, TaskPageError> {
    let handler = TaskHandler::new(TaskService::new(&state.db));

    match handler.handle_create(&raw).await? {
        TaskOutcome::Success(_) => {
            let jar = with_flash(jar, "Task created successfully!".to_string());
            Ok((jar, Redirect::to("/")).into_response())
        }
        TaskOutcome::Invalid(errors) => form_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            TaskFormTemplate::for_create(TaskFormValues::from(&raw), errors),
        ),
        TaskOutcome::NotFound(id) => not_found_response(id),
    }
}

/// Handler for GET /task/{id}.
#[tracing::instrument(skip(state))]
async fn task_detail_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<u32>,
) -> Result<Response, TaskPageError> {
    let handler = TaskHandler::new(TaskService::new(&state.db));

    match handler.handle_view(id).await? {
        TaskOutcome::Success(task) => {
            let rendered = TaskDetailTemplate { task }.render()?;
            Ok(Html(rendered).into_response())
        }
        TaskOutcome::NotFound(id) => not_found_response(id),
        TaskOutcome::Invalid(errors) => Err(TaskPageError::from(errors)),
    }
}

/// Handler for GET /task/{id}/update that serves the form pre-filled with the task.
#[tracing::instrument(skip(state))]
async fn update_form_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<u32>,
) -> Result<Response, TaskPageError> {
    let handler = TaskHandler::new(TaskService::new(&state.db));

    match handler.handle_view(id).await? {
        TaskOutcome::Success(task) => form_response(
            StatusCode::OK,
            TaskFormTemplate::for_update(
                id,
                TaskFormValues::from(&task),
                ValidationErrors::default(),
            ),
        ),
        TaskOutcome::NotFound(id) => not_found_response(id),
        TaskOutcome::Invalid(errors) => Err(TaskPageError::from(errors)),
    }
}

/// Handler for POST /task/{id}/update.
///
/// The page posts the whole record, and browsers omit unchecked checkboxes,
/// so a missing `completed` here means the box was cleared.
#[tracing::instrument(skip(state, jar))]
async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    jar: CookieJar,
    Path(id): Path<u32>,
    Form(raw): Form<RawTaskFields>,
) -> Result<Response, TaskPageError> {
    let handler = TaskHandler::new(TaskService::new(&state.db));
    let raw = RawTaskFields {
        completed: Some(raw.completed.unwrap_or_default()),
        ..raw
    };

    match handler.handle_update(id, &raw).await? {
        TaskOutcome::Success(_) => {
            let jar = with_flash(jar, "Task updated successfully!".to_string());
            Ok((jar, Redirect::to("/")).into_response())
        }
        TaskOutcome::Invalid(errors) => form_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            TaskFormTemplate::for_update(id, TaskFormValues::from(&raw), errors),
        ),
        TaskOutcome::NotFound(id) => not_found_response(id),
    }
}

/// Handler for GET /task/{id}/delete that asks for confirmation.
#[tracing::instrument(skip(state))]
async fn confirm_delete_handler(
    State(state): State<Arc<TaskState>>,
    Path(id): Path<u32>,
) -> Result<Response, TaskPageError> {
    let handler = TaskHandler::new(TaskService::new(&state.db));

    match handler.handle_view(id).await? {
        TaskOutcome::Success(task) => {
            let rendered = TaskConfirmDeleteTemplate { task }.render()?;
            Ok(Html(rendered).into_response())
        }
        TaskOutcome::NotFound(id) => not_found_response(id),
        TaskOutcome::Invalid(errors) => Err(TaskPageError::from(errors)),
    }
}

/// Handler for POST /task/{id}/delete.
#[tracing::instrument(skip(state, jar))]
async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    jar: CookieJar,
    Path(id): Path<u32>,
) -> Result<Response, TaskPageError> {
    let handler = TaskHandler::new(TaskService::new(&state.db));

    // Fetched first so the confirmation message can name the task.
    let task = match handler.handle_view(id).await? {
        TaskOutcome::Success(task) => task,
        TaskOutcome::NotFound(id) => return not_found_response(id),
        TaskOutcome::Invalid(errors) => return Err(TaskPageError::from(errors)),
    };

    match handler.handle_delete(id).await? {
        TaskOutcome::Success(()) => {
            let message = format!("Task \"{}\" deleted successfully!", task.title());
            Ok((with_flash(jar, message), Redirect::to("/")).into_response())
        }
        TaskOutcome::NotFound(id) => not_found_response(id),
        TaskOutcome::Invalid(errors) => Err(TaskPageError::from(errors)),
    }
}

/// Creates and returns the task router with all task page routes.
pub fn create_task_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/", get(task_list_handler))
        .route("/create", get(create_form_handler).post(create_task_handler))
        .route("/task/{id}", get(task_detail_handler))
        .route(
            "/task/{id}/update",
            get(update_form_handler).post(update_task_handler),
        )
        .route(
            "/task/{id}/delete",
            get(confirm_delete_handler).post(delete_task_handler),
        )
        .with_state(state)
}
