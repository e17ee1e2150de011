//! Trello: organizations become synthetic roots, boards become projects,
//! lists become buckets and cards become tasks.

use super::{ConvertContext, dates, html};
use crate::colors::{normalize_hex, trello_color};
use crate::error::MigrationResult;
use crate::forest::{
    ImportAttachment, ImportBucket, ImportComment, ImportProject, ImportTask, Label, Timestamp,
};
use crate::source::trello::{TrelloAction, TrelloBoard, TrelloCard, TrelloChecklist, TrelloExport};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const ROOT_TITLE: &str = "Imported from Trello";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

fn by_pos(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Trello object ids start with the creation time as 8 hex digits of unix seconds.
fn created_at_from_id(id: &str, ctx: &ConvertContext<'_>) -> Option<Timestamp> {
    let prefix = id.get(..8)?;
    let secs = i64::from_str_radix(prefix, 16).ok()?;
    dates::from_unix_seconds(secs, ctx.timezone())
}

/// Roots are created lazily, right before the first board that needs them.
struct Roots<'e> {
    export: &'e TrelloExport,
    by_org: HashMap<&'e str, i64>,
    shared: Option<i64>,
}

impl<'e> Roots<'e> {
    fn new(export: &'e TrelloExport) -> Self {
        Self {
            export,
            by_org: HashMap::new(),
            shared: None,
        }
    }

    fn for_board(&mut self, board: &'e TrelloBoard, ctx: &mut ConvertContext<'_>) -> i64 {
        let export = self.export;
        let org = board
            .id_organization
            .as_deref()
            .and_then(|id| export.organizations.iter().find(|org| org.id == id));

        match org {
            Some(org) => *self.by_org.entry(org.id.as_str()).or_insert_with(|| {
                let idx = ctx.add_root(&org.display_name);
                ctx.forest().projects[idx].placeholder_id
            }),
            None => {
                if board.id_organization.is_some() {
                    debug!(board = %board.id, "Organization not in export, using shared root");
                }
                *self.shared.get_or_insert_with(|| {
                    let idx = ctx.add_root(ROOT_TITLE);
                    ctx.forest().projects[idx].placeholder_id
                })
            }
        }
    }
}

fn checklists_html(checklists: &[&TrelloChecklist]) -> String {
    let mut out = String::new();
    for checklist in checklists {
        let mut items: Vec<_> = checklist.check_items.iter().collect();
        items.sort_by(|a, b| by_pos(a.pos, b.pos));
        let items: Vec<html::ChecklistItem<'_>> = items
            .iter()
            .map(|item| html::ChecklistItem {
                text: &item.name,
                checked: item.is_complete(),
            })
            .collect();
        html::append(&mut out, &html::checklist(&checklist.name, &items));
    }
    out
}

fn convert_card(
    card: &TrelloCard,
    checklists: &[&TrelloChecklist],
    comments: &[&TrelloAction],
    buckets: &HashMap<&str, i64>,
    ctx: &mut ConvertContext<'_>,
) -> MigrationResult<ImportTask> {
    let mut task = ImportTask::new(card.name.clone());
    task.description = html::markdown(&card.desc);
    html::append(&mut task.description, &checklists_html(checklists));
    task.done = card.due_complete;
    task.due_date = ctx.opt_timestamp(card.due.as_deref());
    task.created_at = created_at_from_id(&card.id, ctx);
    task.bucket_placeholder_id = card
        .id_list
        .as_deref()
        .and_then(|list| buckets.get(list).copied());

    for label in &card.labels {
        let label_ref = ctx.label(&label.id, || {
            let color = label.color.as_deref().unwrap_or_default();
            Label {
                title: if label.name.is_empty() {
                    color.to_string()
                } else {
                    label.name.clone()
                },
                color_hex: trello_color(color).to_string(),
            }
        });
        if !task.labels.contains(&label_ref) {
            task.labels.push(label_ref);
        }
    }

    for attachment in &card.attachments {
        if !attachment.is_upload {
            html::append(&mut task.description, &html::link(&attachment.url, &attachment.name));
            continue;
        }
        let raw_content = ctx.download(&attachment.url)?;
        task.attachments.push(ImportAttachment {
            file_name: attachment.name.clone(),
            mime_type: attachment
                .mime_type
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            size_hint: attachment.bytes.unwrap_or(raw_content.len() as u64),
            raw_content,
            created_at: ctx.opt_timestamp(attachment.date.as_deref()),
            is_cover_image: card.id_attachment_cover.as_deref() == Some(attachment.id.as_str()),
        });
    }

    for action in comments {
        let text = action.data.text.as_deref().unwrap_or_default();
        if text.trim().is_empty() {
            continue;
        }
        task.comments.push(ImportComment {
            text: html::markdown(text),
            posted_at: ctx.opt_timestamp(action.date.as_deref()),
        });
    }

    Ok(task)
}

fn convert_board<'e>(
    board: &'e TrelloBoard,
    roots: &mut Roots<'e>,
    ctx: &mut ConvertContext<'_>,
) -> MigrationResult<()> {
    let root = roots.for_board(board, ctx);

    let mut project = ImportProject::new(ctx.next_project_id(), board.name.clone());
    project.parent_placeholder_id = Some(root);
    project.description = html::markdown(&board.desc);
    project.archived = board.closed;
    project.color_hex = board
        .prefs
        .background_color
        .as_deref()
        .map(normalize_hex)
        .unwrap_or_default();

    let mut lists: Vec<_> = board.lists.iter().filter(|l| !l.closed).collect();
    lists.sort_by(|a, b| by_pos(a.pos, b.pos));
    let mut buckets: HashMap<&str, i64> = HashMap::new();
    for list in lists {
        let placeholder_id = project.buckets.len() as i64 + 1;
        project.buckets.push(ImportBucket {
            placeholder_id,
            title: list.name.clone(),
            created_at: created_at_from_id(&list.id, ctx),
        });
        buckets.insert(list.id.as_str(), placeholder_id);
    }
    let project_idx = ctx.forest_mut().add_project(project);

    let mut checklists: HashMap<&str, Vec<&TrelloChecklist>> = HashMap::new();
    for checklist in &board.checklists {
        checklists.entry(checklist.id_card.as_str()).or_default().push(checklist);
    }
    for per_card in checklists.values_mut() {
        per_card.sort_by(|a, b| by_pos(a.pos, b.pos));
    }

    // Actions come newest first; comments should read oldest first.
    let mut comments: HashMap<&str, Vec<&TrelloAction>> = HashMap::new();
    for action in board.actions.iter().rev().filter(|a| a.kind == TrelloAction::COMMENT) {
        if let Some(card) = &action.data.card {
            comments.entry(card.id.as_str()).or_default().push(action);
        }
    }

    let mut cards: Vec<_> = board.cards.iter().filter(|c| !c.closed).collect();
    cards.sort_by(|a, b| by_pos(a.pos, b.pos));
    for card in cards {
        let task = convert_card(
            card,
            checklists.get(card.id.as_str()).map(Vec::as_slice).unwrap_or(&[]),
            comments.get(card.id.as_str()).map(Vec::as_slice).unwrap_or(&[]),
            &buckets,
            ctx,
        )?;
        if task.bucket_placeholder_id.is_none() {
            debug!(card = %card.id, "Card list not imported, task has no bucket");
        }
        ctx.forest_mut().add_task(project_idx, task);
    }

    info!(board = %board.id, cards = board.cards.len(), "Converted Trello board");
    Ok(())
}

pub fn convert(export: &TrelloExport, ctx: &mut ConvertContext<'_>) -> MigrationResult<()> {
    if export.boards.is_empty() {
        warn!("Trello export contains no boards");
        ctx.add_root(ROOT_TITLE);
        return Ok(());
    }

    let mut roots = Roots::new(export);
    for board in &export.boards {
        convert_board(board, &mut roots, ctx)?;
    }
    Ok(())
}
