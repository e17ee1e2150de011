//! Write operations the loader performs against storage.

use crate::forest::RelationKind;
use anyhow::Result;
use rusqlite::{Connection, params};

#[derive(Debug, Clone)]
pub struct NewProject<'a> {
    pub owner_id: i64,
    pub parent_id: Option<i64>,
    pub title: &'a str,
    pub description: &'a str,
    pub hex_color: &'a str,
    pub archived: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub project_id: i64,
    pub bucket_id: Option<i64>,
    pub created_by: i64,
    pub title: &'a str,
    pub description: &'a str,
    pub done: bool,
    pub done_at: Option<i64>,
    pub due_date: Option<i64>,
    pub priority: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewAttachment<'a> {
    pub task_id: i64,
    pub file_id: &'a str,
    pub file_name: &'a str,
    pub mime_type: &'a str,
    pub size: i64,
    pub created_by: i64,
    pub created_at: i64,
}

/// Create/insert operations; each `create_*` returns the generated id.
///
/// Implementations perform no existence checks. Calling the same sequence
/// twice creates duplicate rows.
pub trait ImportStore {
    fn create_project(&mut self, project: &NewProject<'_>) -> Result<i64>;
    fn create_bucket(&mut self, project_id: i64, title: &str, created_at: i64) -> Result<i64>;
    fn create_label(&mut self, owner_id: i64, title: &str, hex_color: &str) -> Result<i64>;
    fn create_task(&mut self, task: &NewTask<'_>) -> Result<i64>;
    fn add_label_to_task(&mut self, task_id: i64, label_id: i64) -> Result<()>;
    fn create_attachment(&mut self, attachment: &NewAttachment<'_>) -> Result<i64>;
    fn set_task_cover(&mut self, task_id: i64, attachment_id: i64) -> Result<()>;
    fn create_comment(
        &mut self,
        task_id: i64,
        author_id: i64,
        text: &str,
        created_at: i64,
    ) -> Result<i64>;
    fn create_reminder(&mut self, task_id: i64, reminder: i64) -> Result<i64>;
    fn create_relation(
        &mut self,
        task_id: i64,
        kind: RelationKind,
        other_task_id: i64,
        created_by: i64,
    ) -> Result<i64>;
}

/// [`ImportStore`] over a SQLite connection, usually an open transaction.
pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn insert(&self, sql: &str, params: impl rusqlite::Params) -> Result<i64> {
        self.conn.execute(sql, params)?;
        Ok(self.conn.last_insert_rowid())
    }
}

impl ImportStore for SqliteStore<'_> {
    fn create_project(&mut self, project: &NewProject<'_>) -> Result<i64> {
        self.insert(
            "INSERT INTO projects
                 (owner_id, parent_project_id, title, description, hex_color, is_archived,
                  created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                project.owner_id,
                project.parent_id,
                project.title,
                project.description,
                project.hex_color,
                project.archived,
                project.created_at,
            ],
        )
    }

    fn create_bucket(&mut self, project_id: i64, title: &str, created_at: i64) -> Result<i64> {
        self.insert(
            "INSERT INTO buckets (project_id, title, created_at) VALUES (?1, ?2, ?3)",
            params![project_id, title, created_at],
        )
    }

    fn create_label(&mut self, owner_id: i64, title: &str, hex_color: &str) -> Result<i64> {
        self.insert(
            "INSERT INTO labels (owner_id, title, hex_color, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![owner_id, title, hex_color, super::now_ms()],
        )
    }

    fn create_task(&mut self, task: &NewTask<'_>) -> Result<i64> {
        self.insert(
            "INSERT INTO tasks
                 (project_id, bucket_id, created_by, title, description, done, done_at,
                  due_date, priority, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.project_id,
                task.bucket_id,
                task.created_by,
                task.title,
                task.description,
                task.done,
                task.done_at,
                task.due_date,
                task.priority,
                task.created_at,
            ],
        )
    }

    fn add_label_to_task(&mut self, task_id: i64, label_id: i64) -> Result<()> {
        // A task may list the same label twice; the link exists once.
        self.conn.execute(
            "INSERT OR IGNORE INTO label_tasks (task_id, label_id, created_at) VALUES (?1, ?2, ?3)",
            params![task_id, label_id, super::now_ms()],
        )?;
        Ok(())
    }

    fn create_attachment(&mut self, attachment: &NewAttachment<'_>) -> Result<i64> {
        self.insert(
            "INSERT INTO task_attachments
                 (task_id, file_id, file_name, mime_type, size, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                attachment.task_id,
                attachment.file_id,
                attachment.file_name,
                attachment.mime_type,
                attachment.size,
                attachment.created_by,
                attachment.created_at,
            ],
        )
    }

    fn set_task_cover(&mut self, task_id: i64, attachment_id: i64) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE tasks SET cover_image_attachment_id = ?1 WHERE id = ?2",
            params![attachment_id, task_id],
        )?;
        if updated == 0 {
            anyhow::bail!("task {} not found", task_id);
        }
        Ok(())
    }

    fn create_comment(
        &mut self,
        task_id: i64,
        author_id: i64,
        text: &str,
        created_at: i64,
    ) -> Result<i64> {
        self.insert(
            "INSERT INTO task_comments (task_id, author_id, comment, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![task_id, author_id, text, created_at],
        )
    }

    fn create_reminder(&mut self, task_id: i64, reminder: i64) -> Result<i64> {
        self.insert(
            "INSERT INTO task_reminders (task_id, reminder, created_at) VALUES (?1, ?2, ?3)",
            params![task_id, reminder, super::now_ms()],
        )
    }

    fn create_relation(
        &mut self,
        task_id: i64,
        kind: RelationKind,
        other_task_id: i64,
        created_by: i64,
    ) -> Result<i64> {
        self.insert(
            "INSERT INTO task_relations
                 (task_id, other_task_id, relation_kind, created_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                task_id,
                other_task_id,
                kind.as_str(),
                created_by,
                super::now_ms()
            ],
        )
    }
}
