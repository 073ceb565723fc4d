use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Priority assigned when a task is created without one.
pub const DEFAULT_PRIORITY: &str = "medium";

/// A stored task. `id` and `created_at` are assigned at insert and never
/// change afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TaskRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub priority: String,
    pub created_at: String,
}

/// Partial update. `None` means "leave untouched"; for `description` the
/// inner Option distinguishes "set to null" from a new value.
#[derive(Clone, Debug, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub priority: Option<String>,
}

#[derive(Clone)]
pub struct TaskRepo {
    db: Database,
}

impl TaskRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a new task, assigning its id and creation timestamp.
    #[instrument(skip(self, description))]
    pub fn insert(
        &self,
        title: &str,
        description: Option<&str>,
        completed: bool,
        priority: &str,
    ) -> Result<TaskRow, StoreError> {
        let now = Utc::now().to_rfc3339();

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO tasks (title, description, completed, priority, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![title, description, completed, priority, now],
            )?;
            let id = conn.last_insert_rowid();

            Ok(TaskRow {
                id,
                title: title.to_string(),
                description: description.map(str::to_string),
                completed,
                priority: priority.to_string(),
                created_at: now.clone(),
            })
        })
    }

    /// Get a task by id.
    #[instrument(skip(self), fields(task_id = id))]
    pub fn get(&self, id: i64) -> Result<TaskRow, StoreError> {
        self.db.with_conn(|conn| get_in_conn(conn, id))
    }

    /// List all tasks in insertion order. No pagination; the caller accepts
    /// an unbounded result.
    #[instrument(skip(self))]
    pub fn list(&self) -> Result<Vec<TaskRow>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, description, completed, priority, created_at
                 FROM tasks ORDER BY id",
            )?;
            let mut rows = stmt.query([])?;
            let mut results = Vec::new();
            while let Some(row) = rows.next()? {
                results.push(row_to_task(row)?);
            }
            Ok(results)
        })
    }

    /// Overwrite all mutable fields. An absent `description` becomes NULL,
    /// not "unchanged". `created_at` is never touched.
    #[instrument(skip(self), fields(task_id = id))]
    pub fn replace(
        &self,
        id: i64,
        title: &str,
        description: Option<&str>,
        completed: bool,
        priority: &str,
    ) -> Result<TaskRow, StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE tasks SET title = ?1, description = ?2, completed = ?3, priority = ?4
                 WHERE id = ?5",
                rusqlite::params![title, description, completed, priority, id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {id}")));
            }
            get_in_conn(conn, id)
        })
    }

    /// Overwrite only the fields present in the patch. Existence check,
    /// merge, and write happen under a single lock hold.
    #[instrument(skip(self, patch), fields(task_id = id))]
    pub fn patch(&self, id: i64, patch: &TaskPatch) -> Result<TaskRow, StoreError> {
        self.db.with_conn(|conn| {
            let mut task = get_in_conn(conn, id)?;

            if let Some(title) = &patch.title {
                task.title = title.clone();
            }
            if let Some(description) = &patch.description {
                task.description = description.clone();
            }
            if let Some(completed) = patch.completed {
                task.completed = completed;
            }
            if let Some(priority) = &patch.priority {
                task.priority = priority.clone();
            }

            conn.execute(
                "UPDATE tasks SET title = ?1, description = ?2, completed = ?3, priority = ?4
                 WHERE id = ?5",
                rusqlite::params![
                    task.title,
                    task.description,
                    task.completed,
                    task.priority,
                    id
                ],
            )?;
            Ok(task)
        })
    }

    /// Hard-delete a task.
    #[instrument(skip(self), fields(task_id = id))]
    pub fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("task {id}")));
            }
            Ok(())
        })
    }
}

fn get_in_conn(conn: &rusqlite::Connection, id: i64) -> Result<TaskRow, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, completed, priority, created_at
         FROM tasks WHERE id = ?1",
    )?;
    let mut rows = stmt.query([id])?;
    match rows.next()? {
        Some(row) => row_to_task(row),
        None => Err(StoreError::NotFound(format!("task {id}"))),
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> Result<TaskRow, StoreError> {
    Ok(TaskRow {
        id: row_helpers::get(row, 0, "tasks", "id")?,
        title: row_helpers::get(row, 1, "tasks", "title")?,
        description: row_helpers::get_opt(row, 2, "tasks", "description")?,
        completed: row_helpers::get(row, 3, "tasks", "completed")?,
        priority: row_helpers::get(row, 4, "tasks", "priority")?,
        created_at: row_helpers::get(row, 5, "tasks", "created_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> TaskRepo {
        TaskRepo::new(Database::in_memory().unwrap())
    }

    #[test]
    fn insert_assigns_id_and_timestamp() {
        let repo = setup();
        let task = repo
            .insert("Buy milk", None, false, DEFAULT_PRIORITY)
            .unwrap();
        assert_eq!(task.id, 1);
        assert_eq!(task.title, "Buy milk");
        assert!(task.description.is_none());
        assert!(!task.completed);
        assert_eq!(task.priority, "medium");
        assert!(!task.created_at.is_empty());
    }

    #[test]
    fn get_returns_inserted_values() {
        let repo = setup();
        let task = repo
            .insert("Write report", Some("quarterly numbers"), true, "high")
            .unwrap();
        let fetched = repo.get(task.id).unwrap();
        assert_eq!(fetched, task);
    }

    #[test]
    fn get_nonexistent_is_not_found() {
        let repo = setup();
        assert!(matches!(repo.get(999), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn list_empty() {
        let repo = setup();
        assert!(repo.list().unwrap().is_empty());
    }

    #[test]
    fn list_insertion_order() {
        let repo = setup();
        repo.insert("first", None, false, "low").unwrap();
        repo.insert("second", None, false, "high").unwrap();
        let all = repo.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "first");
        assert_eq!(all[1].title, "second");
    }

    #[test]
    fn replace_overwrites_all_mutable_fields() {
        let repo = setup();
        let task = repo
            .insert("old title", Some("old description"), false, "low")
            .unwrap();

        let updated = repo
            .replace(task.id, "new title", None, true, "high")
            .unwrap();
        assert_eq!(updated.title, "new title");
        // Absent description is a reset to NULL, not "keep"
        assert!(updated.description.is_none());
        assert!(updated.completed);
        assert_eq!(updated.priority, "high");
        assert_eq!(updated.created_at, task.created_at);
    }

    #[test]
    fn replace_nonexistent_is_not_found() {
        let repo = setup();
        let result = repo.replace(999, "title", None, false, "medium");
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn patch_single_field_leaves_others() {
        let repo = setup();
        let task = repo
            .insert("Buy milk", Some("2 litres"), false, "medium")
            .unwrap();

        let patch = TaskPatch {
            completed: Some(true),
            ..Default::default()
        };
        let updated = repo.patch(task.id, &patch).unwrap();
        assert!(updated.completed);
        assert_eq!(updated.title, "Buy milk");
        assert_eq!(updated.description.as_deref(), Some("2 litres"));
        assert_eq!(updated.priority, "medium");
    }

    #[test]
    fn patch_explicit_null_clears_description() {
        let repo = setup();
        let task = repo
            .insert("Buy milk", Some("2 litres"), false, "medium")
            .unwrap();

        let patch = TaskPatch {
            description: Some(None),
            ..Default::default()
        };
        let updated = repo.patch(task.id, &patch).unwrap();
        assert!(updated.description.is_none());
        assert_eq!(updated.title, "Buy milk");
    }

    #[test]
    fn patch_multiple_fields() {
        let repo = setup();
        let task = repo.insert("Buy milk", None, false, "medium").unwrap();

        let patch = TaskPatch {
            title: Some("Buy oat milk".into()),
            priority: Some("high".into()),
            ..Default::default()
        };
        let updated = repo.patch(task.id, &patch).unwrap();
        assert_eq!(updated.title, "Buy oat milk");
        assert_eq!(updated.priority, "high");
        assert!(!updated.completed);
    }

    #[test]
    fn patch_empty_is_a_no_op() {
        let repo = setup();
        let task = repo
            .insert("Buy milk", Some("2 litres"), true, "low")
            .unwrap();
        let updated = repo.patch(task.id, &TaskPatch::default()).unwrap();
        assert_eq!(updated, task);
    }

    #[test]
    fn patch_nonexistent_is_not_found() {
        let repo = setup();
        let result = repo.patch(999, &TaskPatch::default());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_removes_row() {
        let repo = setup();
        let task = repo.insert("Buy milk", None, false, "medium").unwrap();
        repo.delete(task.id).unwrap();
        assert!(matches!(repo.get(task.id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn delete_nonexistent_is_not_found() {
        let repo = setup();
        assert!(matches!(repo.delete(999), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let repo = setup();
        let first = repo.insert("first", None, false, "medium").unwrap();
        repo.delete(first.id).unwrap();
        let second = repo.insert("second", None, false, "medium").unwrap();
        assert!(second.id > first.id);
    }
}
