//! Todoist sync API payload.

use super::{de_id, de_ids, de_opt_id};
use serde::Deserialize;

fn default_priority() -> i64 {
    1
}

/// Response of a full `sync` call plus the completed items it omits.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoistSync {
    #[serde(default)]
    pub projects: Vec<TodoistProject>,
    #[serde(default)]
    pub sections: Vec<TodoistSection>,
    #[serde(default)]
    pub items: Vec<TodoistItem>,
    #[serde(default)]
    pub labels: Vec<TodoistLabel>,
    #[serde(default)]
    pub notes: Vec<TodoistNote>,
    #[serde(default)]
    pub project_notes: Vec<TodoistProjectNote>,
    #[serde(default)]
    pub reminders: Vec<TodoistReminder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistProject {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistSection {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(deserialize_with = "de_id")]
    pub project_id: String,
    #[serde(default)]
    pub section_order: i64,
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistDue {
    pub date: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistItem {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub description: String,
    #[serde(deserialize_with = "de_id")]
    pub project_id: String,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub section_id: Option<String>,
    #[serde(default, deserialize_with = "de_opt_id")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub checked: bool,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(default)]
    pub added_at: Option<String>,
    #[serde(default)]
    pub due: Option<TodoistDue>,
    #[serde(default = "default_priority")]
    pub priority: i64,
    /// Label ids (older API) or label names (current API).
    #[serde(default, deserialize_with = "de_ids")]
    pub labels: Vec<String>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistLabel {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistFile {
    pub file_name: String,
    #[serde(default)]
    pub file_type: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub file_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistNote {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub item_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub posted_at: Option<String>,
    #[serde(default)]
    pub file_attachment: Option<TodoistFile>,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistProjectNote {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub project_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TodoistReminder {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(deserialize_with = "de_id")]
    pub item_id: String,
    /// Only absolute reminders carry a due date; relative and location
    /// reminders have none.
    #[serde(default)]
    pub due: Option<TodoistDue>,
    #[serde(default)]
    pub is_deleted: bool,
}
