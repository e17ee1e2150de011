//! Persists an [`ImportForest`] through an [`ImportStore`].
//!
//! Loading happens in two passes that share one [`IdMap`]:
//!
//! 1. Structural insert. Projects are created in placeholder order, so a
//!    parent always exists before its children. Each project's buckets and
//!    tasks follow, and each task's labels, attachments, comments and reminders
//!    are written with it. A subtask is written right after its parent.
//! 2. Relation wiring. Once every task has a real id, every relation edge is
//!    written together with its inverse, whether or not the forest carried one.
//!
//! The first failure stops the load. Callers wanting all-or-nothing behavior
//! run it inside [`Database::transact_import`](crate::db::Database::transact_import).

use crate::db::{ImportStore, NewAttachment, NewProject, NewTask, now_ms};
use crate::error::{EntityKind, MigrationError, MigrationResult};
use crate::files::{FileMeta, FileStore};
use crate::forest::{ImportForest, LabelRef, RelationKind, TaskRef, Timestamp};
use anyhow::anyhow;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Cooperative cancellation for a running migration.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Placeholder to real id lookups.
#[derive(Debug, Default)]
pub struct IdMap {
    projects: HashMap<i64, i64>,
    /// Keyed by (project placeholder, bucket placeholder).
    buckets: HashMap<(i64, i64), i64>,
    labels: HashMap<LabelRef, i64>,
    tasks: HashMap<TaskRef, i64>,
}

impl IdMap {
    pub fn project(&self, placeholder_id: i64) -> Option<i64> {
        self.projects.get(&placeholder_id).copied()
    }

    pub fn bucket(&self, project_placeholder: i64, bucket_placeholder: i64) -> Option<i64> {
        self.buckets
            .get(&(project_placeholder, bucket_placeholder))
            .copied()
    }

    pub fn label(&self, label: LabelRef) -> Option<i64> {
        self.labels.get(&label).copied()
    }

    pub fn task(&self, task: TaskRef) -> Option<i64> {
        self.tasks.get(&task).copied()
    }
}

/// What a load created.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadSummary {
    /// Rows (or stored files) created per entity kind.
    pub created: BTreeMap<EntityKind, usize>,
    /// Inverse relations the forest did not carry and the loader added.
    pub synthesized_inverses: usize,
}

impl LoadSummary {
    pub fn count(&self, kind: EntityKind) -> usize {
        self.created.get(&kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.created.values().sum()
    }

    fn record(&mut self, kind: EntityKind) {
        *self.created.entry(kind).or_insert(0) += 1;
    }
}

/// Load `forest` for `owner`.
///
/// Returns the first error encountered, naming the entity that failed. Rows
/// written before the failure are left to the caller's transaction.
pub fn load(
    forest: &ImportForest,
    owner: i64,
    store: &mut dyn ImportStore,
    files: &dyn FileStore,
    cancel: &CancelFlag,
) -> MigrationResult<(LoadSummary, IdMap)> {
    forest.validate()?;

    let mut loader = Loader {
        forest,
        owner,
        store,
        files,
        ids: IdMap::default(),
        summary: LoadSummary::default(),
    };

    loader.insert_structure(cancel)?;
    loader.wire_relations()?;
    let Loader { ids, summary, .. } = loader;

    info!(
        owner,
        projects = summary.count(EntityKind::Project),
        tasks = summary.count(EntityKind::Task),
        relations = summary.count(EntityKind::Relation),
        "Loaded import forest"
    );
    Ok((summary, ids))
}

struct Loader<'a> {
    forest: &'a ImportForest,
    owner: i64,
    store: &'a mut dyn ImportStore,
    files: &'a dyn FileStore,
    ids: IdMap,
    summary: LoadSummary,
}

fn millis(ts: &Timestamp) -> i64 {
    ts.timestamp_millis()
}

impl Loader<'_> {
    /// Pass 1.
    fn insert_structure(&mut self, cancel: &CancelFlag) -> MigrationResult<()> {
        let mut order: Vec<usize> = (0..self.forest.projects.len()).collect();
        order.sort_by_key(|&idx| self.forest.projects[idx].placeholder_id);

        for idx in order {
            if cancel.is_cancelled() {
                info!(
                    owner = self.owner,
                    projects_done = self.summary.count(EntityKind::Project),
                    "Load cancelled"
                );
                return Err(MigrationError::Cancelled);
            }
            self.insert_project(idx)?;
        }
        Ok(())
    }

    fn insert_project(&mut self, idx: usize) -> MigrationResult<()> {
        let forest = self.forest;
        let project = &forest.projects[idx];
        let placeholder = project.placeholder_id;
        let fail = |e| MigrationError::load(EntityKind::Project, placeholder, e);

        let parent_id = match project.parent_placeholder_id {
            Some(parent) => Some(
                self.ids
                    .project(parent)
                    .ok_or_else(|| fail(anyhow!("parent project {} was not created", parent)))?,
            ),
            None => None,
        };

        let project_id = self
            .store
            .create_project(&NewProject {
                owner_id: self.owner,
                parent_id,
                title: &project.title,
                description: &project.description,
                hex_color: &project.color_hex,
                archived: project.archived,
                created_at: now_ms(),
            })
            .map_err(fail)?;
        self.ids.projects.insert(placeholder, project_id);
        self.summary.record(EntityKind::Project);
        debug!(placeholder, project_id, title = %project.title, "Created project");

        for bucket in &project.buckets {
            let bucket_id = self
                .store
                .create_bucket(
                    project_id,
                    &bucket.title,
                    bucket.created_at.as_ref().map_or_else(now_ms, millis),
                )
                .map_err(|e| {
                    MigrationError::load(
                        EntityKind::Bucket,
                        format!("{} of project {}", bucket.placeholder_id, placeholder),
                        e,
                    )
                })?;
            self.ids
                .buckets
                .insert((placeholder, bucket.placeholder_id), bucket_id);
            self.summary.record(EntityKind::Bucket);
        }

        for task in forest.project_tasks(idx) {
            self.insert_task(task, placeholder, project_id)?;
        }
        Ok(())
    }

    fn ensure_label(&mut self, label: LabelRef) -> MigrationResult<i64> {
        if let Some(id) = self.ids.label(label) {
            return Ok(id);
        }
        let data = self.forest.label(label);
        let id = self
            .store
            .create_label(self.owner, &data.title, &data.color_hex)
            .map_err(|e| MigrationError::load(EntityKind::Label, format!("#{}", label.0), e))?;
        self.ids.labels.insert(label, id);
        self.summary.record(EntityKind::Label);
        debug!(label = label.0, label_id = id, "Created label");
        Ok(id)
    }

    fn insert_task(
        &mut self,
        task_ref: TaskRef,
        project_placeholder: i64,
        project_id: i64,
    ) -> MigrationResult<()> {
        let forest = self.forest;
        let task = forest.task(task_ref);
        let fail = |kind: EntityKind, e| MigrationError::load(kind, task_ref, e);

        let bucket_id = task
            .bucket()
            .and_then(|b| self.ids.bucket(project_placeholder, b));

        let mut label_ids = Vec::with_capacity(task.labels.len());
        for &label in &task.labels {
            label_ids.push(self.ensure_label(label)?);
        }

        let task_id = self
            .store
            .create_task(&NewTask {
                project_id,
                bucket_id,
                created_by: self.owner,
                title: &task.title,
                description: &task.description,
                done: task.done,
                done_at: task.done_at.as_ref().filter(|_| task.done).map(millis),
                due_date: task.due_date.as_ref().map(millis),
                priority: task.priority,
                created_at: task.created_at.as_ref().map_or_else(now_ms, millis),
            })
            .map_err(|e| fail(EntityKind::Task, e))?;
        self.ids.tasks.insert(task_ref, task_id);
        self.summary.record(EntityKind::Task);
        debug!(task = %task_ref, task_id, title = %task.title, "Created task");

        for label_id in label_ids {
            self.store
                .add_label_to_task(task_id, label_id)
                .map_err(|e| fail(EntityKind::Label, e))?;
        }

        for attachment in &task.attachments {
            let place = format!("'{}' on task {}", attachment.file_name, task_ref);
            let file_id = self
                .files
                .put(
                    &attachment.raw_content,
                    &FileMeta {
                        file_name: &attachment.file_name,
                        mime_type: &attachment.mime_type,
                        owner_id: self.owner,
                    },
                )
                .map_err(|e| MigrationError::load(EntityKind::File, &place, e))?;
            self.summary.record(EntityKind::File);

            let attachment_id = self
                .store
                .create_attachment(&NewAttachment {
                    task_id,
                    file_id: &file_id,
                    file_name: &attachment.file_name,
                    mime_type: &attachment.mime_type,
                    size: attachment.raw_content.len() as i64,
                    created_by: self.owner,
                    created_at: attachment.created_at.as_ref().map_or_else(now_ms, millis),
                })
                .map_err(|e| MigrationError::load(EntityKind::Attachment, &place, e))?;
            self.summary.record(EntityKind::Attachment);

            if attachment.is_cover_image {
                self.store
                    .set_task_cover(task_id, attachment_id)
                    .map_err(|e| MigrationError::load(EntityKind::Attachment, &place, e))?;
            }
        }

        for comment in &task.comments {
            self.store
                .create_comment(
                    task_id,
                    self.owner,
                    &comment.text,
                    comment.posted_at.as_ref().map_or_else(now_ms, millis),
                )
                .map_err(|e| fail(EntityKind::Comment, e))?;
            self.summary.record(EntityKind::Comment);
        }

        for reminder in &task.reminders {
            self.store
                .create_reminder(task_id, millis(reminder))
                .map_err(|e| fail(EntityKind::Reminder, e))?;
            self.summary.record(EntityKind::Reminder);
        }
        Ok(())
    }

    /// Pass 2. Runs to completion once started.
    fn wire_relations(&mut self) -> MigrationResult<()> {
        let forest = self.forest;
        let mut written: HashSet<(i64, RelationKind, i64)> = HashSet::new();

        for (idx, task) in forest.tasks.iter().enumerate() {
            let from = TaskRef(idx);
            for (&kind, targets) in &task.relations {
                for &to in targets {
                    let carries_inverse = forest
                        .task(to)
                        .relations
                        .get(&kind.inverse())
                        .is_some_and(|back| back.contains(&from));

                    self.write_relation(from, kind, to, &mut written)?;
                    if self.write_relation(to, kind.inverse(), from, &mut written)?
                        && !carries_inverse
                    {
                        self.summary.synthesized_inverses += 1;
                        debug!(
                            from = %to,
                            to = %from,
                            kind = %kind.inverse(),
                            "Synthesized inverse relation"
                        );
                    }
                }
            }
        }
        Ok(())
    }

    /// Write one edge unless it was already written. Returns whether it was.
    fn write_relation(
        &mut self,
        from: TaskRef,
        kind: RelationKind,
        to: TaskRef,
        written: &mut HashSet<(i64, RelationKind, i64)>,
    ) -> MigrationResult<bool> {
        let place = format!("{} -[{}]-> {}", from, kind, to);
        let resolve = |task: TaskRef| {
            self.ids.task(task).ok_or_else(|| {
                MigrationError::load(
                    EntityKind::Relation,
                    &place,
                    anyhow!("task {} was not created", task),
                )
            })
        };
        let from_id = resolve(from)?;
        let to_id = resolve(to)?;

        if !written.insert((from_id, kind, to_id)) {
            return Ok(false);
        }
        self.store
            .create_relation(from_id, kind, to_id, self.owner)
            .map_err(|e| MigrationError::load(EntityKind::Relation, &place, e))?;
        self.summary.record(EntityKind::Relation);
        Ok(true)
    }
}
