//! Bridges untrusted task submissions to a [`TaskStore`].
//!
//! Operations that can be turned down return a [`TaskOutcome`] for the caller
//! to render. Only failures of the database itself come back as `Err`.
use sea_orm::DbErr;

use super::form::{RawTaskFields, ValidationErrors};
use super::{Task, TaskOrder, TaskStore, TaskStoreError};

/// Result of one handled task operation.
#[derive(Debug, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Success(T),
    /// The submission was rejected before anything was persisted.
    Invalid(ValidationErrors),
    /// No task has the given ID.
    NotFound(u32),
}

impl<T> TaskOutcome<T> {
    fn settle(result: Result<T, TaskStoreError>) -> Result<Self, DbErr> {
        match result {
            Ok(value) => Ok(TaskOutcome::Success(value)),
            Err(TaskStoreError::Validation(errors)) => Ok(TaskOutcome::Invalid(errors)),
            Err(TaskStoreError::TaskNotFound(id)) => Ok(TaskOutcome::NotFound(id)),
            Err(TaskStoreError::Database(err)) => Err(err),
        }
    }
}

pub struct TaskHandler<S> {
    store: S,
}

impl<S: TaskStore> TaskHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self))]
    pub async fn handle_create(&self, raw: &RawTaskFields) -> Result<TaskOutcome<Task>, DbErr> {
        let new_task = match raw.validate_new() {
            Ok(new_task) => new_task,
            Err(errors) => {
                tracing::debug!("Rejected new task: {}", errors);
                return Ok(TaskOutcome::Invalid(errors));
            }
        };
        TaskOutcome::settle(self.store.create(new_task).await)
    }

    /// Updates a task, checking that it exists before validating the submission.
    #[tracing::instrument(skip(self))]
    pub async fn handle_update(
        &self,
        id: u32,
        raw: &RawTaskFields,
    ) -> Result<TaskOutcome<Task>, DbErr> {
        match TaskOutcome::settle(self.store.get(id).await)? {
            TaskOutcome::Success(_) => {}
            TaskOutcome::NotFound(id) => return Ok(TaskOutcome::NotFound(id)),
            TaskOutcome::Invalid(errors) => return Ok(TaskOutcome::Invalid(errors)),
        }

        let changes = match raw.validate_changes() {
            Ok(changes) => changes,
            Err(errors) => {
                tracing::debug!("Rejected changes to task {}: {}", id, errors);
                return Ok(TaskOutcome::Invalid(errors));
            }
        };
        TaskOutcome::settle(self.store.update(id, changes).await)
    }

    #[tracing::instrument(skip(self))]
    pub async fn handle_delete(&self, id: u32) -> Result<TaskOutcome<()>, DbErr> {
        TaskOutcome::settle(self.store.delete(id).await)
    }

    #[tracing::instrument(skip(self))]
    pub async fn handle_view(&self, id: u32) -> Result<TaskOutcome<Task>, DbErr> {
        TaskOutcome::settle(self.store.get(id).await)
    }

    /// Lists every task, newest first. An empty list is still a success, so
    /// only a database failure can make this fail.
    #[tracing::instrument(skip(self))]
    pub async fn handle_list(&self) -> Result<Vec<Task>, DbErr> {
        match self.store.list(TaskOrder::NewestFirst).await {
            Ok(tasks) => Ok(tasks),
            Err(TaskStoreError::Database(err)) => Err(err),
            Err(err) => Err(DbErr::Custom(format!("Listing tasks failed: {}", err))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::form::FieldErrorReason;
    use crate::task::{MockTaskStore, NewTask, TaskChanges};
    use chrono::Utc;
    use mockall::predicate::eq;

    fn sample_task(id: u32, title: &str, completed: bool) -> Task {
        let now = Utc::now();
        Task::new(id, title.to_string(), None, completed, now, now)
    }

    fn raw(title: Option<&str>, completed: Option<&str>) -> RawTaskFields {
        RawTaskFields {
            title: title.map(str::to_string),
            description: None,
            completed: completed.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn can_create_task_with_default_completed() {
        let mut store = MockTaskStore::new();
        let expected = sample_task(1, "Buy milk", false);
        let returned = expected.clone();
        store
            .expect_create()
            .with(eq(NewTask {
                title: "Buy milk".to_string(),
                description: None,
                completed: Some(false),
            }))
            .times(1)
            .returning(move |_| Ok(returned.clone()));

        let handler = TaskHandler::new(store);
        let outcome = handler
            .handle_create(&raw(Some("Buy milk"), None))
            .await
            .expect("database should not fail");

        assert_eq!(outcome, TaskOutcome::Success(expected));
    }

    #[tokio::test]
    async fn can_reject_empty_title_without_touching_store() {
        let mut store = MockTaskStore::new();
        store.expect_create().never();

        let handler = TaskHandler::new(store);
        let outcome = handler
            .handle_create(&raw(Some(""), None))
            .await
            .expect("database should not fail");

        let errors = match outcome {
            TaskOutcome::Invalid(errors) => errors,
            other => panic!("expected invalid outcome, got {:?}", other),
        };
        assert_eq!(
            errors.for_field("title").map(|error| error.reason()),
            Some(FieldErrorReason::Required)
        );
    }

    #[tokio::test]
    async fn can_reject_overlong_title_without_touching_store() {
        let mut store = MockTaskStore::new();
        store.expect_create().never();

        let handler = TaskHandler::new(store);
        let title = "x".repeat(201);
        let outcome = handler
            .handle_create(&raw(Some(&title), None))
            .await
            .expect("database should not fail");

        let errors = match outcome {
            TaskOutcome::Invalid(errors) => errors,
            other => panic!("expected invalid outcome, got {:?}", other),
        };
        assert_eq!(
            errors.for_field("title").map(|error| error.reason().code()),
            Some("too_long")
        );
    }

    #[tokio::test]
    async fn can_report_not_found_before_validating_update() {
        let mut store = MockTaskStore::new();
        store
            .expect_get()
            .with(eq(42))
            .times(1)
            .returning(|id| Err(TaskStoreError::TaskNotFound(id)));
        store.expect_update().never();

        let handler = TaskHandler::new(store);
        // The title is invalid too, but the missing task wins.
        let outcome = handler
            .handle_update(42, &raw(Some(""), None))
            .await
            .expect("database should not fail");

        assert_eq!(outcome, TaskOutcome::NotFound(42));
    }

    #[tokio::test]
    async fn can_reject_invalid_update_without_mutating_store() {
        let mut store = MockTaskStore::new();
        let existing = sample_task(7, "Existing", false);
        store
            .expect_get()
            .with(eq(7))
            .returning(move |_| Ok(existing.clone()));
        store.expect_update().never();

        let handler = TaskHandler::new(store);
        let outcome = handler
            .handle_update(7, &raw(Some(""), Some("on")))
            .await
            .expect("database should not fail");

        assert!(matches!(outcome, TaskOutcome::Invalid(_)));
    }

    #[tokio::test]
    async fn can_update_task_with_submitted_fields() {
        let mut store = MockTaskStore::new();
        let existing = sample_task(1, "Buy milk", false);
        let updated = sample_task(1, "Buy milk", true);
        let returned = updated.clone();
        store
            .expect_get()
            .with(eq(1))
            .returning(move |_| Ok(existing.clone()));
        store
            .expect_update()
            .with(
                eq(1),
                eq(TaskChanges {
                    title: Some("Buy milk".to_string()),
                    description: None,
                    completed: Some(true),
                }),
            )
            .times(1)
            .returning(move |_, _| Ok(returned.clone()));

        let handler = TaskHandler::new(store);
        let outcome = handler
            .handle_update(1, &raw(Some("Buy milk"), Some("on")))
            .await
            .expect("database should not fail");

        assert_eq!(outcome, TaskOutcome::Success(updated));
    }

    #[tokio::test]
    async fn can_map_missing_task_on_delete_to_not_found() {
        let mut store = MockTaskStore::new();
        store
            .expect_delete()
            .with(eq(3))
            .returning(|id| Err(TaskStoreError::TaskNotFound(id)));

        let handler = TaskHandler::new(store);
        let outcome = handler.handle_delete(3).await.expect("database should not fail");

        assert_eq!(outcome, TaskOutcome::NotFound(3));
    }

    #[tokio::test]
    async fn can_view_existing_task() {
        let mut store = MockTaskStore::new();
        let existing = sample_task(5, "Read book", false);
        let returned = existing.clone();
        store
            .expect_get()
            .with(eq(5))
            .returning(move |_| Ok(returned.clone()));

        let handler = TaskHandler::new(store);
        let outcome = handler.handle_view(5).await.expect("database should not fail");

        assert_eq!(outcome, TaskOutcome::Success(existing));
    }

    #[tokio::test]
    async fn can_list_empty_store_as_success() {
        let mut store = MockTaskStore::new();
        store
            .expect_list()
            .with(eq(TaskOrder::NewestFirst))
            .returning(|_| Ok(Vec::new()));

        let handler = TaskHandler::new(store);
        let tasks = handler.handle_list().await.expect("database should not fail");

        assert!(tasks.is_empty());
    }

    #[tokio::test]
    async fn can_propagate_database_failure() {
        let mut store = MockTaskStore::new();
        store
            .expect_list()
            .returning(|_| Err(TaskStoreError::Database(DbErr::Custom("disk gone".into()))));

        let handler = TaskHandler::new(store);
        let result = handler.handle_list().await;

        assert!(matches!(result, Err(DbErr::Custom(message)) if message == "disk gone"));
    }
}
