//! Provider-neutral import forest.
//!
//! One forest holds everything migrated for one user in one run. Tasks and
//! labels live in flat arenas; projects and relations refer to them by index,
//! so two tasks sharing a label share the same [`LabelRef`] and a subtask link
//! is a pair of [`TaskRef`]s rather than a pointer.

use crate::error::{MigrationError, MigrationResult};
use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Timestamp already normalized into the service timezone.
pub type Timestamp = DateTime<FixedOffset>;

/// Placeholder id of the synthetic root project when a provider has no
/// top-level container of its own.
pub const ROOT_PLACEHOLDER_ID: i64 = 1;

/// Index of a task in [`ImportForest::tasks`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TaskRef(pub usize);

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of a label in [`ImportForest::labels`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct LabelRef(pub usize);

/// Directed edge kind between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    Subtask,
    #[serde(rename = "parenttask")]
    ParentTask,
    Related,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Subtask => "subtask",
            RelationKind::ParentTask => "parenttask",
            RelationKind::Related => "related",
        }
    }

    /// The kind recorded on the other end of the edge.
    pub fn inverse(&self) -> RelationKind {
        match self {
            RelationKind::Subtask => RelationKind::ParentTask,
            RelationKind::ParentTask => RelationKind::Subtask,
            RelationKind::Related => RelationKind::Related,
        }
    }

    pub fn parse(s: &str) -> Option<RelationKind> {
        match s {
            "subtask" => Some(RelationKind::Subtask),
            "parenttask" => Some(RelationKind::ParentTask),
            "related" => Some(RelationKind::Related),
            _ => None,
        }
    }
}

impl fmt::Display for RelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub title: String,
    pub color_hex: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportAttachment {
    pub file_name: String,
    pub mime_type: String,
    pub size_hint: u64,
    #[serde(skip)]
    pub raw_content: Vec<u8>,
    pub created_at: Option<Timestamp>,
    pub is_cover_image: bool,
}

/// A comment; the author is always the importing user.
#[derive(Debug, Clone, Serialize)]
pub struct ImportComment {
    pub text: String,
    pub posted_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportBucket {
    /// Unique only within the owning project.
    pub placeholder_id: i64,
    pub title: String,
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportTask {
    pub title: String,
    /// HTML.
    pub description: String,
    pub done: bool,
    pub done_at: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
    pub priority: Option<i64>,
    pub bucket_placeholder_id: Option<i64>,
    pub labels: Vec<LabelRef>,
    pub attachments: Vec<ImportAttachment>,
    pub comments: Vec<ImportComment>,
    pub reminders: Vec<Timestamp>,
    pub relations: BTreeMap<RelationKind, Vec<TaskRef>>,
    pub created_at: Option<Timestamp>,
}

impl ImportTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// The bucket this task goes into; a placeholder of 0 means none.
    pub fn bucket(&self) -> Option<i64> {
        self.bucket_placeholder_id.filter(|b| *b != 0)
    }

    /// Targets of this task's `subtask` edges, in insertion order.
    pub fn subtasks(&self) -> &[TaskRef] {
        self.relations
            .get(&RelationKind::Subtask)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportProject {
    pub placeholder_id: i64,
    pub parent_placeholder_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub color_hex: String,
    pub archived: bool,
    pub buckets: Vec<ImportBucket>,
    /// Top-level tasks only; subtasks are reachable through their parent.
    pub tasks: Vec<TaskRef>,
}

impl ImportProject {
    pub fn new(placeholder_id: i64, title: impl Into<String>) -> Self {
        Self {
            placeholder_id,
            title: title.into(),
            ..Default::default()
        }
    }

    /// Append a note to the description, newline separated, in call order.
    pub fn append_description(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !self.description.is_empty() {
            self.description.push('\n');
        }
        self.description.push_str(text);
    }

    pub fn has_bucket(&self, placeholder_id: i64) -> bool {
        self.buckets.iter().any(|b| b.placeholder_id == placeholder_id)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportForest {
    pub projects: Vec<ImportProject>,
    pub tasks: Vec<ImportTask>,
    pub labels: Vec<Label>,
}

impl ImportForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a project and return its index in `projects`.
    pub fn add_project(&mut self, project: ImportProject) -> usize {
        self.projects.push(project);
        self.projects.len() - 1
    }

    /// Add a task to the arena and list it top-level under `project`.
    pub fn add_task(&mut self, project: usize, task: ImportTask) -> TaskRef {
        let task_ref = TaskRef(self.tasks.len());
        self.tasks.push(task);
        self.projects[project].tasks.push(task_ref);
        task_ref
    }

    pub fn add_label(&mut self, label: Label) -> LabelRef {
        self.labels.push(label);
        LabelRef(self.labels.len() - 1)
    }

    pub fn task(&self, task: TaskRef) -> &ImportTask {
        &self.tasks[task.0]
    }

    pub fn task_mut(&mut self, task: TaskRef) -> &mut ImportTask {
        &mut self.tasks[task.0]
    }

    pub fn label(&self, label: LabelRef) -> &Label {
        &self.labels[label.0]
    }

    /// Record `from -[kind]-> to` once.
    pub fn add_relation(&mut self, from: TaskRef, kind: RelationKind, to: TaskRef) {
        let targets = self.tasks[from.0].relations.entry(kind).or_default();
        if !targets.contains(&to) {
            targets.push(to);
        }
    }

    /// Link `child` under `parent` in both directions.
    pub fn link_subtask(&mut self, parent: TaskRef, child: TaskRef) {
        self.add_relation(parent, RelationKind::Subtask, child);
        self.add_relation(child, RelationKind::ParentTask, parent);
    }

    /// Remove a task from the top-level list of `project`. Returns whether it was listed.
    pub fn detach_from_project(&mut self, project: usize, task: TaskRef) -> bool {
        let tasks = &mut self.projects[project].tasks;
        let before = tasks.len();
        tasks.retain(|t| *t != task);
        tasks.len() != before
    }

    /// Tasks owned by `project` in insertion order: each top-level task followed
    /// depth-first by its subtasks.
    pub fn project_tasks(&self, project: usize) -> Vec<TaskRef> {
        let mut ordered = Vec::new();
        let mut seen = HashSet::new();
        for &top in &self.projects[project].tasks {
            self.collect_subtree(top, &mut ordered, &mut seen);
        }
        ordered
    }

    fn collect_subtree(&self, task: TaskRef, out: &mut Vec<TaskRef>, seen: &mut HashSet<TaskRef>) {
        if task.0 >= self.tasks.len() || !seen.insert(task) {
            return;
        }
        out.push(task);
        for &child in self.tasks[task.0].subtasks() {
            self.collect_subtree(child, out, seen);
        }
    }

    /// Check the invariants the loader relies on.
    pub fn validate(&self) -> MigrationResult<()> {
        let mut project_ids = HashSet::new();
        for project in &self.projects {
            if project.placeholder_id < 1 {
                return Err(invalid(format!(
                    "project '{}' has non-positive placeholder id {}",
                    project.title, project.placeholder_id
                )));
            }
            if !project_ids.insert(project.placeholder_id) {
                return Err(invalid(format!(
                    "duplicate project placeholder id {}",
                    project.placeholder_id
                )));
            }
        }

        for project in &self.projects {
            if let Some(parent) = project.parent_placeholder_id {
                if !project_ids.contains(&parent) {
                    return Err(invalid(format!(
                        "project {} references missing parent {}",
                        project.placeholder_id, parent
                    )));
                }
                if parent >= project.placeholder_id {
                    return Err(invalid(format!(
                        "project {} has parent {} which is not created before it",
                        project.placeholder_id, parent
                    )));
                }
            }

            let mut bucket_ids = HashSet::new();
            for bucket in &project.buckets {
                if !bucket_ids.insert(bucket.placeholder_id) {
                    return Err(invalid(format!(
                        "project {} has duplicate bucket placeholder id {}",
                        project.placeholder_id, bucket.placeholder_id
                    )));
                }
            }
        }

        for (idx, task) in self.tasks.iter().enumerate() {
            if let Some(label) = task.labels.iter().find(|l| l.0 >= self.labels.len()) {
                return Err(invalid(format!(
                    "task #{} references missing label {}",
                    idx, label.0
                )));
            }
            for targets in task.relations.values() {
                if let Some(target) = targets.iter().find(|t| t.0 >= self.tasks.len()) {
                    return Err(invalid(format!(
                        "task #{} relates to missing task {}",
                        idx, target
                    )));
                }
            }
        }

        // Every task must belong to exactly one project, either top-level or
        // through a subtask chain.
        let mut owner: Vec<Option<usize>> = vec![None; self.tasks.len()];
        for (project_idx, project) in self.projects.iter().enumerate() {
            let mut stack: Vec<TaskRef> = project.tasks.iter().rev().copied().collect();
            while let Some(task) = stack.pop() {
                if task.0 >= self.tasks.len() {
                    return Err(invalid(format!(
                        "project {} lists missing task {}",
                        project.placeholder_id, task
                    )));
                }
                if let Some(existing) = owner[task.0] {
                    return Err(invalid(format!(
                        "task {} is reachable more than once (projects {} and {})",
                        task, self.projects[existing].placeholder_id, project.placeholder_id
                    )));
                }
                owner[task.0] = Some(project_idx);

                let data = &self.tasks[task.0];
                if let Some(bucket) = data.bucket() {
                    if !project.has_bucket(bucket) {
                        return Err(invalid(format!(
                            "task {} references bucket {} missing from project {}",
                            task, bucket, project.placeholder_id
                        )));
                    }
                }
                stack.extend(data.subtasks().iter().rev().copied());
            }
        }

        if let Some(orphan) = owner.iter().position(Option::is_none) {
            return Err(invalid(format!(
                "task #{} is not reachable from any project",
                orphan
            )));
        }

        Ok(())
    }
}

fn invalid(message: String) -> MigrationError {
    MigrationError::InvalidForest(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level_forest() -> (ImportForest, TaskRef, TaskRef) {
        let mut forest = ImportForest::new();
        forest.add_project(ImportProject::new(ROOT_PLACEHOLDER_ID, "Root"));
        let mut project = ImportProject::new(2, "Inbox");
        project.parent_placeholder_id = Some(ROOT_PLACEHOLDER_ID);
        let p = forest.add_project(project);
        let parent = forest.add_task(p, ImportTask::new("parent"));
        let child = forest.add_task(p, ImportTask::new("child"));
        (forest, parent, child)
    }

    #[test]
    fn relation_kind_inverse_round_trip() {
        for kind in [RelationKind::Subtask, RelationKind::ParentTask, RelationKind::Related] {
            assert_eq!(kind.inverse().inverse(), kind);
            assert_eq!(RelationKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn append_description_joins_with_newline() {
        let mut project = ImportProject::new(2, "p");
        project.append_description("first");
        project.append_description("");
        project.append_description("second");
        assert_eq!(project.description, "first\nsecond");
    }

    #[test]
    fn subtask_still_listed_top_level_is_rejected() {
        let (mut forest, parent, child) = two_level_forest();
        forest.link_subtask(parent, child);
        let err = forest.validate().unwrap_err();
        assert!(err.to_string().contains("reachable more than once"));

        assert!(forest.detach_from_project(1, child));
        forest.validate().unwrap();
        assert_eq!(forest.project_tasks(1), vec![parent, child]);
    }

    #[test]
    fn parent_must_precede_child() {
        let mut forest = ImportForest::new();
        let mut child = ImportProject::new(2, "child");
        child.parent_placeholder_id = Some(3);
        forest.add_project(child);
        forest.add_project(ImportProject::new(3, "parent"));
        let err = forest.validate().unwrap_err();
        assert!(err.to_string().contains("not created before"));
    }

    #[test]
    fn unknown_bucket_is_rejected() {
        let (mut forest, parent, _) = two_level_forest();
        forest.task_mut(parent).bucket_placeholder_id = Some(9);
        assert!(matches!(
            forest.validate(),
            Err(MigrationError::InvalidForest(_))
        ));
    }

    #[test]
    fn zero_bucket_means_no_bucket() {
        let (mut forest, parent, _) = two_level_forest();
        forest.task_mut(parent).bucket_placeholder_id = Some(0);
        forest.validate().unwrap();
        assert_eq!(forest.task(parent).bucket(), None);
    }

    #[test]
    fn orphan_task_is_rejected() {
        let (mut forest, _, child) = two_level_forest();
        forest.detach_from_project(1, child);
        let err = forest.validate().unwrap_err();
        assert!(err.to_string().contains("not reachable"));
    }

    #[test]
    fn add_relation_is_idempotent() {
        let (mut forest, parent, child) = two_level_forest();
        forest.add_relation(parent, RelationKind::Related, child);
        forest.add_relation(parent, RelationKind::Related, child);
        assert_eq!(forest.task(parent).relations[&RelationKind::Related], vec![child]);
    }
}
