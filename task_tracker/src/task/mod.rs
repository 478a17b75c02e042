use crate::entities::*;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::*;
use std::fmt;

pub mod form;
pub mod handler;
pub mod web;

use form::{DEFAULT_COMPLETED, ValidationErrors, validate_title};

#[derive(Debug, PartialEq, Clone, Eq)]
pub struct Task {
    id: u32,
    title: String,
    description: Option<String>,
    completed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: u32,
        title: String,
        description: Option<String>,
        completed: bool,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            title,
            description,
            completed,
            created_at,
            updated_at,
        }
    }

    /// Returns the ID of the task.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the title of the task.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description, if one was given.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Task::new(
            model.id as u32,
            model.title,
            model.description,
            model.completed,
            model.created_at,
            model.updated_at,
        )
    }
}

/// Fields for a task that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    /// Falls back to `false` when `None`.
    pub completed: Option<bool>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            completed: None,
        }
    }
}

/// Changes to apply to an existing task. `None` leaves the stored value as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub completed: Option<bool>,
}

/// Ordering applied when listing tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TaskOrder {
    /// Most recently created first.
    #[default]
    NewestFirst,
    OldestFirst,
    /// Alphabetical by title.
    Title,
}

/// Error type for TaskStore operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskStoreError {
    /// The submitted fields broke a field constraint.
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    /// No task has the given ID.
    #[error("Task with ID {0} not found")]
    TaskNotFound(u32),
    /// The database itself failed.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Durable keyed storage of tasks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Persists a new task, assigning its ID and timestamps.
    async fn create(&self, new_task: NewTask) -> Result<Task, TaskStoreError>;

    async fn get(&self, id: u32) -> Result<Task, TaskStoreError>;

    async fn list(&self, order: TaskOrder) -> Result<Vec<Task>, TaskStoreError>;

    /// Applies `changes` to the task and refreshes its `updated_at`.
    async fn update(&self, id: u32, changes: TaskChanges) -> Result<Task, TaskStoreError>;

    async fn delete(&self, id: u32) -> Result<(), TaskStoreError>;
}

pub struct TaskService<'a> {
    db: &'a sea_orm::DatabaseConnection,
}

impl TaskService<'_> {
    pub fn new(db: &sea_orm::DatabaseConnection) -> TaskService<'_> {
        TaskService { db }
    }
}

#[async_trait]
impl<'a> TaskStore for TaskService<'a> {
    /// Creates a new task entry in the database.
    ///
    /// # Arguments
    ///
    /// * `new_task` - The title, description and completion flag of the task.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `Task`, or a validation or database error.
    #[tracing::instrument(skip(self))]
    async fn create(&self, new_task: NewTask) -> Result<Task, TaskStoreError> {
        validate_title(&new_task.title).map_err(ValidationErrors::from)?;

        let now = Utc::now();
        let active_model = task::ActiveModel {
            title: ActiveValue::Set(new_task.title),
            description: ActiveValue::Set(new_task.description),
            completed: ActiveValue::Set(new_task.completed.unwrap_or(DEFAULT_COMPLETED)),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        };
        let created_model = active_model.insert(self.db).await?;
        tracing::info!("Created task {}", created_model.id);
        Ok(Task::from(created_model))
    }

    /// Retrieves a task by its ID.
    #[tracing::instrument(skip(self))]
    async fn get(&self, id: u32) -> Result<Task, TaskStoreError> {
        let task_model = task::Entity::find_by_id(id as i32)
            .one(self.db)
            .await?
            .ok_or(TaskStoreError::TaskNotFound(id))?;
        Ok(Task::from(task_model))
    }

    /// Retrieves all tasks in the requested order.
    ///
    /// Ties on the ordering column are broken by ID in the same direction, so
    /// tasks created within the same instant still list deterministically.
    #[tracing::instrument(skip(self))]
    async fn list(&self, order: TaskOrder) -> Result<Vec<Task>, TaskStoreError> {
        let query = task::Entity::find();
        let query = match order {
            TaskOrder::NewestFirst => query
                .order_by_desc(task::Column::CreatedAt)
                .order_by_desc(task::Column::Id),
            TaskOrder::OldestFirst => query
                .order_by_asc(task::Column::CreatedAt)
                .order_by_asc(task::Column::Id),
            TaskOrder::Title => query
                .order_by_asc(task::Column::Title)
                .order_by_asc(task::Column::Id),
        };
        let tasks = query.all(self.db).await?.into_iter().map(Task::from).collect();
        Ok(tasks)
    }

    /// Edits a task by its ID.
    ///
    /// The lookup and the write share one transaction, so a concurrent
    /// writer never observes a half-applied change.
    ///
    /// # Arguments
    ///
    /// * `id` - The ID of the task to edit.
    /// * `changes` - The fields to overwrite.
    ///
    /// # Returns
    ///
    /// A `Result` containing the updated `Task`, or an error if the task is
    /// missing, the new title is invalid, or the database fails.
    #[tracing::instrument(skip(self))]
    async fn update(&self, id: u32, changes: TaskChanges) -> Result<Task, TaskStoreError> {
        let txn = self.db.begin().await?;

        let task_to_update = task::Entity::find_by_id(id as i32)
            .one(&txn)
            .await?
            .ok_or(TaskStoreError::TaskNotFound(id))?;

        if let Some(title) = &changes.title {
            validate_title(title).map_err(ValidationErrors::from)?;
        }

        // updated_at must never fall behind created_at, even if the clock moved backwards.
        let now = Utc::now().max(task_to_update.created_at);

        let mut active_model: task::ActiveModel = task_to_update.into();
        if let Some(title) = changes.title {
            active_model.title = ActiveValue::Set(title);
        }
        if let Some(description) = changes.description {
            active_model.description = ActiveValue::Set(Some(description));
        }
        if let Some(completed) = changes.completed {
            active_model.completed = ActiveValue::Set(completed);
        }
        active_model.updated_at = ActiveValue::Set(now);

        let updated_model = active_model.update(&txn).await?;
        txn.commit().await?;

        tracing::info!("Updated task {}", id);
        Ok(Task::from(updated_model))
    }

    /// Deletes a task by its ID.
    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: u32) -> Result<(), TaskStoreError> {
        let result = task::Entity::delete_by_id(id as i32).exec(self.db).await?;
        if result.rows_affected == 0 {
            return Err(TaskStoreError::TaskNotFound(id));
        }
        tracing::info!("Deleted task {}", id);
        Ok(())
    }
}
