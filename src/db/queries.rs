//! Read queries over imported data.

use super::Database;
use anyhow::Result;
use rusqlite::{Row, params};
use serde::Serialize;
use std::collections::BTreeMap;

/// Tables written by an import, in insertion-dependency order.
pub const IMPORT_TABLES: &[&str] = &[
    "projects",
    "buckets",
    "labels",
    "tasks",
    "label_tasks",
    "task_attachments",
    "task_comments",
    "task_reminders",
    "task_relations",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectRow {
    pub id: i64,
    pub parent_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub hex_color: String,
    pub archived: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketRow {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    pub id: i64,
    pub project_id: i64,
    pub bucket_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub done: bool,
    pub done_at: Option<i64>,
    pub due_date: Option<i64>,
    pub priority: Option<i64>,
    pub cover_image_attachment_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelRow {
    pub id: i64,
    pub title: String,
    pub hex_color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRow {
    pub id: i64,
    pub task_id: i64,
    pub file_id: String,
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRow {
    pub id: i64,
    pub author_id: i64,
    pub comment: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationRow {
    pub task_id: i64,
    pub other_task_id: i64,
    pub relation_kind: String,
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<TaskRow> {
    Ok(TaskRow {
        id: row.get(0)?,
        project_id: row.get(1)?,
        bucket_id: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        done: row.get(5)?,
        done_at: row.get(6)?,
        due_date: row.get(7)?,
        priority: row.get(8)?,
        cover_image_attachment_id: row.get(9)?,
    })
}

const TASK_COLUMNS: &str = "id, project_id, bucket_id, title, description, done, done_at, \
     due_date, priority, cover_image_attachment_id";

impl Database {
    /// Number of rows in every import table.
    pub fn row_counts(&self) -> Result<BTreeMap<String, usize>> {
        self.with_conn(|conn| {
            let mut counts = BTreeMap::new();
            for table in IMPORT_TABLES {
                let count: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
                counts.insert(table.to_string(), count as usize);
            }
            Ok(counts)
        })
    }

    /// Projects owned by a user, in creation order.
    pub fn projects_for_owner(&self, owner_id: i64) -> Result<Vec<ProjectRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, parent_project_id, title, description, hex_color, is_archived
                 FROM projects WHERE owner_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![owner_id], |row| {
                    Ok(ProjectRow {
                        id: row.get(0)?,
                        parent_id: row.get(1)?,
                        title: row.get(2)?,
                        description: row.get(3)?,
                        hex_color: row.get(4)?,
                        archived: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn buckets_in_project(&self, project_id: i64) -> Result<Vec<BucketRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, project_id, title FROM buckets WHERE project_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![project_id], |row| {
                    Ok(BucketRow {
                        id: row.get(0)?,
                        project_id: row.get(1)?,
                        title: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Tasks of a project, in creation order.
    pub fn tasks_in_project(&self, project_id: i64) -> Result<Vec<TaskRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE project_id = ?1 ORDER BY id",
                TASK_COLUMNS
            ))?;
            let rows = stmt
                .query_map(params![project_id], task_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn task_by_title(&self, title: &str) -> Result<Option<TaskRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM tasks WHERE title = ?1 ORDER BY id LIMIT 1",
                TASK_COLUMNS
            ))?;
            let mut rows = stmt.query_map(params![title], task_from_row)?;
            Ok(rows.next().transpose()?)
        })
    }

    pub fn labels_for_owner(&self, owner_id: i64) -> Result<Vec<LabelRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, hex_color FROM labels WHERE owner_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![owner_id], |row| {
                    Ok(LabelRow {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        hex_color: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn task_label_ids(&self, task_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT label_id FROM label_tasks WHERE task_id = ?1 ORDER BY label_id")?;
            let ids = stmt
                .query_map(params![task_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(ids)
        })
    }

    pub fn task_attachments(&self, task_id: i64) -> Result<Vec<AttachmentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, task_id, file_id, file_name, mime_type, size
                 FROM task_attachments WHERE task_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![task_id], |row| {
                    Ok(AttachmentRow {
                        id: row.get(0)?,
                        task_id: row.get(1)?,
                        file_id: row.get(2)?,
                        file_name: row.get(3)?,
                        mime_type: row.get(4)?,
                        size: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn task_comments(&self, task_id: i64) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, comment, created_at
                 FROM task_comments WHERE task_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map(params![task_id], |row| {
                    Ok(CommentRow {
                        id: row.get(0)?,
                        author_id: row.get(1)?,
                        comment: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn task_reminders(&self, task_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT reminder FROM task_reminders WHERE task_id = ?1 ORDER BY id")?;
            let rows = stmt
                .query_map(params![task_id], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(rows)
        })
    }

    /// Every stored task relation, ordered by insertion.
    pub fn relations(&self) -> Result<Vec<RelationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT task_id, other_task_id, relation_kind FROM task_relations ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(RelationRow {
                        task_id: row.get(0)?,
                        other_task_id: row.get(1)?,
                        relation_kind: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}
