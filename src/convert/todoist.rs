//! Todoist: one synthetic root, nested projects, sections as buckets,
//! subtasks through `parent_id`.

use super::{ConvertContext, html};
use crate::colors::todoist_color;
use crate::error::MigrationResult;
use crate::forest::{
    ImportAttachment, ImportBucket, ImportProject, ImportTask, Label, RelationKind,
    ROOT_PLACEHOLDER_ID, TaskRef,
};
use crate::source::todoist::{TodoistItem, TodoistLabel, TodoistProject, TodoistSync};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub const ROOT_TITLE: &str = "Migrated from Todoist";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Todoist priority 1 means unset; 2..=4 shift down onto the internal low..high range.
fn map_priority(priority: i64) -> Option<i64> {
    match priority {
        2..=4 => Some(priority - 1),
        _ => None,
    }
}

/// Order projects so every parent precedes its children, otherwise keeping
/// source order. Projects whose parent is missing come out at top level.
fn parents_first<'p>(projects: &[&'p TodoistProject]) -> Vec<&'p TodoistProject> {
    let known: HashSet<&str> = projects.iter().map(|p| p.id.as_str()).collect();
    let mut emitted: HashSet<&str> = HashSet::new();
    let mut ordered = Vec::with_capacity(projects.len());

    loop {
        let before = ordered.len();
        for project in projects {
            if emitted.contains(project.id.as_str()) {
                continue;
            }
            let ready = match project.parent_id.as_deref() {
                Some(parent) if known.contains(parent) => emitted.contains(parent),
                _ => true,
            };
            if ready {
                emitted.insert(project.id.as_str());
                ordered.push(*project);
            }
        }
        if ordered.len() == projects.len() {
            return ordered;
        }
        if ordered.len() == before {
            // A parent cycle; break it by emitting the rest at top level.
            for project in projects {
                if emitted.insert(project.id.as_str()) {
                    warn!(project = %project.id, "Project parent cycle, importing at top level");
                    ordered.push(*project);
                }
            }
            return ordered;
        }
    }
}

fn find_label<'s>(sync: &'s TodoistSync, reference: &str) -> Option<&'s TodoistLabel> {
    sync.labels
        .iter()
        .filter(|l| !l.is_deleted)
        .find(|l| l.id == reference)
        .or_else(|| sync.labels.iter().filter(|l| !l.is_deleted).find(|l| l.name == reference))
}

/// Whether `ancestor` is `task` or reachable from it through parent links.
fn has_ancestor(ctx: &ConvertContext<'_>, task: TaskRef, ancestor: TaskRef) -> bool {
    let mut current = Some(task);
    let mut seen = HashSet::new();
    while let Some(t) = current {
        if t == ancestor {
            return true;
        }
        if !seen.insert(t) {
            return false;
        }
        current = ctx
            .forest()
            .task(t)
            .relations
            .get(&RelationKind::ParentTask)
            .and_then(|parents| parents.first().copied());
    }
    false
}

fn build_task(sync: &TodoistSync, item: &TodoistItem, ctx: &mut ConvertContext<'_>) -> ImportTask {
    let mut task = ImportTask::new(item.content.clone());
    task.description = html::markdown(&item.description);
    task.done = item.checked;
    if item.checked {
        task.done_at = ctx.opt_timestamp(item.completed_at.as_deref());
    }
    task.due_date = item.due.as_ref().and_then(|due| ctx.timestamp(&due.date));
    task.priority = map_priority(item.priority);
    task.created_at = ctx.opt_timestamp(item.added_at.as_deref());

    for reference in &item.labels {
        match find_label(sync, reference) {
            Some(label) => {
                let label_ref = ctx.label(&label.id, || Label {
                    title: label.name.clone(),
                    color_hex: todoist_color(&label.color).to_string(),
                });
                if !task.labels.contains(&label_ref) {
                    task.labels.push(label_ref);
                }
            }
            None => warn!(item = %item.id, label = %reference, "Unknown label, skipping"),
        }
    }
    task
}

pub fn convert(sync: &TodoistSync, ctx: &mut ConvertContext<'_>) -> MigrationResult<()> {
    let root = ctx.add_root(ROOT_TITLE);
    debug_assert_eq!(ctx.forest().projects[root].placeholder_id, ROOT_PLACEHOLDER_ID);

    let live: Vec<&TodoistProject> = sync.projects.iter().filter(|p| !p.is_deleted).collect();
    let mut projects: HashMap<&str, usize> = HashMap::new();
    for source in parents_first(&live) {
        let parent_placeholder = match source.parent_id.as_deref() {
            Some(parent) => match projects.get(parent) {
                Some(&idx) => ctx.forest().projects[idx].placeholder_id,
                None => {
                    warn!(
                        project = %source.id,
                        parent,
                        "Parent project not found, attaching to root"
                    );
                    ROOT_PLACEHOLDER_ID
                }
            },
            None => ROOT_PLACEHOLDER_ID,
        };

        let mut project = ImportProject::new(ctx.next_project_id(), source.name.clone());
        project.parent_placeholder_id = Some(parent_placeholder);
        project.color_hex = todoist_color(&source.color).to_string();
        project.archived = source.is_archived;
        let idx = ctx.forest_mut().add_project(project);
        projects.insert(source.id.as_str(), idx);
    }

    for note in sync.project_notes.iter().filter(|n| !n.is_deleted) {
        match projects.get(note.project_id.as_str()) {
            Some(&idx) => ctx.forest_mut().projects[idx].append_description(&note.content),
            None => warn!(note = %note.id, "Project note for unknown project, skipping"),
        }
    }

    // Sections, in declared order, become buckets scoped to their project.
    let mut sections: Vec<_> = sync.sections.iter().filter(|s| !s.is_deleted).collect();
    sections.sort_by_key(|s| s.section_order);
    let mut buckets: HashMap<&str, (usize, i64)> = HashMap::new();
    for section in sections {
        let Some(&project) = projects.get(section.project_id.as_str()) else {
            warn!(section = %section.id, "Section of unknown project, skipping");
            continue;
        };
        let created_at = ctx.opt_timestamp(section.added_at.as_deref());
        let buckets_of = &mut ctx.forest_mut().projects[project].buckets;
        let placeholder_id = buckets_of.len() as i64 + 1;
        buckets_of.push(ImportBucket {
            placeholder_id,
            title: section.name.clone(),
            created_at,
        });
        buckets.insert(section.id.as_str(), (project, placeholder_id));
    }

    // Pass 1: every task, indexed by Todoist id.
    let mut items: HashMap<&str, (TaskRef, usize)> = HashMap::new();
    for item in sync.items.iter().filter(|i| !i.is_deleted) {
        let Some(&project) = projects.get(item.project_id.as_str()) else {
            warn!(item = %item.id, "Item of unknown project, skipping");
            continue;
        };
        let mut task = build_task(sync, item, ctx);
        if let Some(section) = item.section_id.as_deref() {
            match buckets.get(section) {
                Some(&(bucket_project, bucket)) if bucket_project == project => {
                    task.bucket_placeholder_id = Some(bucket);
                }
                _ => debug!(item = %item.id, section, "Section not imported, task has no bucket"),
            }
        }
        let task_ref = ctx.forest_mut().add_task(project, task);
        items.insert(item.id.as_str(), (task_ref, project));
    }

    for note in sync.notes.iter().filter(|n| !n.is_deleted) {
        let Some(&(task_ref, _)) = items.get(note.item_id.as_str()) else {
            warn!(note = %note.id, "Note for unknown item, skipping");
            continue;
        };

        let fragment = html::markdown(&note.content);
        html::append(&mut ctx.forest_mut().task_mut(task_ref).description, &fragment);

        if let Some(file) = &note.file_attachment {
            let Some(url) = file.file_url.as_deref() else {
                warn!(note = %note.id, "File attachment without url, skipping");
                continue;
            };
            let raw_content = ctx.download(url)?;
            let attachment = ImportAttachment {
                file_name: file.file_name.clone(),
                mime_type: file
                    .file_type
                    .clone()
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
                size_hint: file.file_size.unwrap_or(raw_content.len() as u64),
                raw_content,
                created_at: ctx.opt_timestamp(note.posted_at.as_deref()),
                is_cover_image: false,
            };
            ctx.forest_mut().task_mut(task_ref).attachments.push(attachment);
        }
    }

    for reminder in sync.reminders.iter().filter(|r| !r.is_deleted) {
        let Some(&(task_ref, _)) = items.get(reminder.item_id.as_str()) else {
            warn!(reminder = %reminder.id, "Reminder for unknown item, skipping");
            continue;
        };
        let Some(due) = &reminder.due else {
            debug!(reminder = %reminder.id, "Relative reminder, skipping");
            continue;
        };
        if let Some(at) = ctx.timestamp(&due.date) {
            ctx.forest_mut().task_mut(task_ref).reminders.push(at);
        }
    }

    // Pass 2: wire subtasks now that every task exists.
    for item in sync.items.iter().filter(|i| !i.is_deleted) {
        let Some(parent_id) = item.parent_id.as_deref() else {
            continue;
        };
        let Some(&(child, child_project)) = items.get(item.id.as_str()) else {
            continue;
        };
        match items.get(parent_id) {
            Some(&(parent, parent_project)) if parent_project == child_project => {
                if has_ancestor(ctx, parent, child) {
                    warn!(
                        item = %item.id,
                        parent = parent_id,
                        "Subtask cycle, keeping task top-level"
                    );
                    continue;
                }
                let forest = ctx.forest_mut();
                forest.link_subtask(parent, child);
                forest.detach_from_project(child_project, child);
            }
            Some(_) => warn!(
                item = %item.id,
                parent = parent_id,
                "Parent task in another project, keeping task top-level"
            ),
            None => warn!(
                item = %item.id,
                parent = parent_id,
                "Parent task not found, keeping task top-level"
            ),
        }
    }

    Ok(())
}
