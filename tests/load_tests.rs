//! Integration tests for loading an import forest into SQLite.
//!
//! Every test runs the loader inside `Database::transact_import` against an
//! in-memory database and a temporary directory for attachment blobs.

use anyhow::{Result, anyhow};
use tempfile::TempDir;
use todo_migrate::db::{Database, ImportStore, NewAttachment, NewProject, NewTask, SqliteStore};
use todo_migrate::error::{EntityKind, MigrationError, MigrationResult};
use todo_migrate::files::{DiskFileStore, FileStore};
use todo_migrate::forest::{
    ImportAttachment, ImportBucket, ImportForest, ImportProject, ImportTask, Label,
    ROOT_PLACEHOLDER_ID, RelationKind, TaskRef,
};
use todo_migrate::load::{CancelFlag, IdMap, LoadSummary, load};

const OWNER: i64 = 42;

fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn run_load(
    db: &Database,
    files: &dyn FileStore,
    forest: &ImportForest,
) -> MigrationResult<(LoadSummary, IdMap)> {
    db.transact_import(files, |store, files| {
        load(forest, OWNER, store, files, &CancelFlag::new())
    })
}

fn child_project(placeholder_id: i64, title: &str) -> ImportProject {
    let mut project = ImportProject::new(placeholder_id, title);
    project.parent_placeholder_id = Some(ROOT_PLACEHOLDER_ID);
    project
}

/// Root, P1 (bucket B1, T1 with subtask T2) and P2.
fn scenario_forest(both_directions: bool) -> ImportForest {
    let mut forest = ImportForest::new();
    forest.add_project(ImportProject::new(ROOT_PLACEHOLDER_ID, "Root"));

    let mut p1 = child_project(2, "P1");
    p1.buckets.push(ImportBucket {
        placeholder_id: 1,
        title: "B1".to_string(),
        created_at: None,
    });
    let p1 = forest.add_project(p1);
    forest.add_project(child_project(3, "P2"));

    let mut t1 = ImportTask::new("T1");
    t1.bucket_placeholder_id = Some(1);
    let t1 = forest.add_task(p1, t1);
    let t2 = forest.add_task(p1, ImportTask::new("T2"));
    if both_directions {
        forest.link_subtask(t1, t2);
    } else {
        forest.add_relation(t1, RelationKind::Subtask, t2);
    }
    assert!(forest.detach_from_project(p1, t2));
    forest
}

mod scenario_tests {
    use super::*;

    #[test]
    fn root_two_projects_bucket_and_subtask() {
        let db = setup_db();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());

        let (summary, ids) = run_load(&db, &files, &scenario_forest(true)).unwrap();

        let counts = db.row_counts().unwrap();
        assert_eq!(counts["projects"], 3);
        assert_eq!(counts["buckets"], 1);
        assert_eq!(counts["tasks"], 2);
        assert_eq!(counts["task_relations"], 2);
        assert_eq!(summary.count(EntityKind::Task), 2);

        let t1 = ids.task(TaskRef(0)).unwrap();
        let t2 = ids.task(TaskRef(1)).unwrap();
        let relations: Vec<_> = db
            .relations()
            .unwrap()
            .into_iter()
            .map(|r| (r.task_id, r.relation_kind, r.other_task_id))
            .collect();
        assert_eq!(
            relations,
            vec![
                (t1, "subtask".to_string(), t2),
                (t2, "parenttask".to_string(), t1),
            ]
        );

        // T1 is in B1, T2 has no bucket and is stored once.
        let p1 = ids.project(2).unwrap();
        let tasks = db.tasks_in_project(p1).unwrap();
        assert_eq!(tasks.len(), 2);
        let bucket = db.buckets_in_project(p1).unwrap()[0].id;
        assert_eq!(tasks[0].bucket_id, Some(bucket));
        assert_eq!(tasks[1].bucket_id, None);
        assert!(db.tasks_in_project(ids.project(3).unwrap()).unwrap().is_empty());
    }

    #[test]
    fn missing_parenttask_edge_is_synthesized() {
        let db = setup_db();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());

        let (summary, ids) = run_load(&db, &files, &scenario_forest(false)).unwrap();

        assert_eq!(summary.synthesized_inverses, 1);
        let t1 = ids.task(TaskRef(0)).unwrap();
        let t2 = ids.task(TaskRef(1)).unwrap();
        let relations = db.relations().unwrap();
        assert_eq!(relations.len(), 2);
        assert!(relations
            .iter()
            .any(|r| r.task_id == t2 && r.other_task_id == t1 && r.relation_kind == "parenttask"));
    }

    #[test]
    fn parents_are_created_before_children() {
        let db = setup_db();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());

        // Added out of placeholder order on purpose.
        let mut forest = ImportForest::new();
        let mut grandchild = ImportProject::new(3, "grandchild");
        grandchild.parent_placeholder_id = Some(2);
        forest.add_project(grandchild);
        forest.add_project(child_project(2, "child"));
        forest.add_project(ImportProject::new(ROOT_PLACEHOLDER_ID, "root"));

        let (_, ids) = run_load(&db, &files, &forest).unwrap();

        let projects = db.projects_for_owner(OWNER).unwrap();
        let titles: Vec<_> = projects.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["root", "child", "grandchild"]);
        for project in &projects {
            if let Some(parent) = project.parent_id {
                assert!(parent < project.id);
            }
        }
        assert_eq!(projects[2].parent_id, ids.project(2));
    }

    #[test]
    fn zero_bucket_loads_without_bucket() {
        let db = setup_db();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());

        let mut forest = ImportForest::new();
        let root = forest.add_project(ImportProject::new(ROOT_PLACEHOLDER_ID, "Root"));
        let mut task = ImportTask::new("loose");
        task.bucket_placeholder_id = Some(0);
        forest.add_task(root, task);

        let (_, ids) = run_load(&db, &files, &forest).unwrap();

        let tasks = db.tasks_in_project(ids.project(ROOT_PLACEHOLDER_ID).unwrap()).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].bucket_id, None);
    }
}

mod label_tests {
    use super::*;

    #[test]
    fn tasks_sharing_a_label_reference_one_row() {
        let db = setup_db();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());

        let mut forest = ImportForest::new();
        forest.add_project(ImportProject::new(ROOT_PLACEHOLDER_ID, "root"));
        let a = forest.add_project(child_project(2, "a"));
        let b = forest.add_project(child_project(3, "b"));
        let urgent = forest.add_label(Label {
            title: "urgent".to_string(),
            color_hex: "e44332".to_string(),
        });
        let other = forest.add_label(Label {
            title: "urgent".to_string(),
            color_hex: "299438".to_string(),
        });
        for (project, title) in [(a, "one"), (b, "two"), (a, "three")] {
            let mut task = ImportTask::new(title);
            task.labels.push(urgent);
            forest.add_task(project, task);
        }
        let mut task = ImportTask::new("four");
        task.labels.push(other);
        forest.add_task(b, task);

        let (_, ids) = run_load(&db, &files, &forest).unwrap();

        let shared = ids.label(urgent).unwrap();
        for idx in 0..3 {
            let task_id = ids.task(TaskRef(idx)).unwrap();
            assert_eq!(db.task_label_ids(task_id).unwrap(), vec![shared]);
        }
        let labels = db.labels_for_owner(OWNER).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].hex_color, "e44332");
    }
}

mod attachment_tests {
    use super::*;

    #[test]
    fn bytes_round_trip_through_file_store() {
        let db = setup_db();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());
        let payload: Vec<u8> = (0..=255u8).cycle().take(1000).collect();

        let mut forest = ImportForest::new();
        let root = forest.add_project(ImportProject::new(ROOT_PLACEHOLDER_ID, "root"));
        forest.add_task(root, ImportTask::new("plain"));
        let mut task = ImportTask::new("with file");
        task.attachments.push(ImportAttachment {
            file_name: "blob.bin".to_string(),
            mime_type: "application/octet-stream".to_string(),
            size_hint: 1000,
            raw_content: payload.clone(),
            created_at: None,
            is_cover_image: true,
        });
        let task_ref = forest.add_task(root, task);

        let (summary, ids) = run_load(&db, &files, &forest).unwrap();
        assert_eq!(summary.count(EntityKind::File), 1);

        let task_id = ids.task(task_ref).unwrap();
        let attachments = db.task_attachments(task_id).unwrap();
        assert_eq!(attachments.len(), 1);
        let row = &attachments[0];
        assert_eq!(row.task_id, task_id);
        assert_eq!(row.size, 1000);
        assert_eq!(files.get(&row.file_id).unwrap(), payload);

        let stored = db.task_by_title("with file").unwrap().unwrap();
        assert_eq!(stored.cover_image_attachment_id, Some(row.id));
    }
}

/// Delegates to a real store but fails the n-th `create_task`.
struct FailOnNthTask<'s, 'c> {
    inner: &'s mut SqliteStore<'c>,
    remaining: usize,
}

impl ImportStore for FailOnNthTask<'_, '_> {
    fn create_project(&mut self, project: &NewProject<'_>) -> Result<i64> {
        self.inner.create_project(project)
    }
    fn create_bucket(&mut self, project_id: i64, title: &str, created_at: i64) -> Result<i64> {
        self.inner.create_bucket(project_id, title, created_at)
    }
    fn create_label(&mut self, owner_id: i64, title: &str, hex_color: &str) -> Result<i64> {
        self.inner.create_label(owner_id, title, hex_color)
    }
    fn create_task(&mut self, task: &NewTask<'_>) -> Result<i64> {
        self.remaining -= 1;
        if self.remaining == 0 {
            return Err(anyhow!("disk I/O error"));
        }
        self.inner.create_task(task)
    }
    fn add_label_to_task(&mut self, task_id: i64, label_id: i64) -> Result<()> {
        self.inner.add_label_to_task(task_id, label_id)
    }
    fn create_attachment(&mut self, attachment: &NewAttachment<'_>) -> Result<i64> {
        self.inner.create_attachment(attachment)
    }
    fn set_task_cover(&mut self, task_id: i64, attachment_id: i64) -> Result<()> {
        self.inner.set_task_cover(task_id, attachment_id)
    }
    fn create_comment(
        &mut self,
        task_id: i64,
        author_id: i64,
        text: &str,
        created_at: i64,
    ) -> Result<i64> {
        self.inner.create_comment(task_id, author_id, text, created_at)
    }
    fn create_reminder(&mut self, task_id: i64, reminder: i64) -> Result<i64> {
        self.inner.create_reminder(task_id, reminder)
    }
    fn create_relation(
        &mut self,
        task_id: i64,
        kind: RelationKind,
        other_task_id: i64,
        created_by: i64,
    ) -> Result<i64> {
        self.inner.create_relation(task_id, kind, other_task_id, created_by)
    }
}

mod failure_tests {
    use super::*;

    fn three_task_forest() -> ImportForest {
        let mut forest = ImportForest::new();
        let root = forest.add_project(ImportProject::new(ROOT_PLACEHOLDER_ID, "root"));
        let label = forest.add_label(Label {
            title: "l".to_string(),
            color_hex: String::new(),
        });
        for title in ["first", "second", "third"] {
            let mut task = ImportTask::new(title);
            task.labels.push(label);
            task.attachments.push(ImportAttachment {
                file_name: format!("{}.txt", title),
                mime_type: "text/plain".to_string(),
                size_hint: 3,
                raw_content: b"abc".to_vec(),
                created_at: None,
                is_cover_image: false,
            });
            forest.add_task(root, task);
        }
        forest
    }

    #[test]
    fn failure_on_third_task_leaves_nothing_behind() {
        let db = setup_db();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());
        let forest = three_task_forest();

        let err = db
            .transact_import(&files, |store, files| {
                let mut failing = FailOnNthTask {
                    inner: store,
                    remaining: 3,
                };
                load(&forest, OWNER, &mut failing, files, &CancelFlag::new())
            })
            .unwrap_err();

        assert!(matches!(
            err,
            MigrationError::Load {
                entity: EntityKind::Task,
                ..
            }
        ));
        assert_eq!(err.to_string(), "failed to create task #2: disk I/O error");
        assert!(db.row_counts().unwrap().values().all(|count| *count == 0));
        // The two blobs stored before the failure were removed.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn cancelled_load_rolls_back() {
        let db = setup_db();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());
        let forest = three_task_forest();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = db
            .transact_import(&files, |store, files| {
                load(&forest, OWNER, store, files, &cancel)
            })
            .unwrap_err();

        assert!(matches!(err, MigrationError::Cancelled));
        assert_eq!(db.row_counts().unwrap()["projects"], 0);
    }

    #[test]
    fn loading_twice_duplicates_rows() {
        let db = setup_db();
        let dir = TempDir::new().unwrap();
        let files = DiskFileStore::new(dir.path());
        let forest = scenario_forest(true);

        run_load(&db, &files, &forest).unwrap();
        run_load(&db, &files, &forest).unwrap();

        let counts = db.row_counts().unwrap();
        assert_eq!(counts["projects"], 6);
        assert_eq!(counts["tasks"], 4);
        assert_eq!(counts["task_relations"], 4);
    }
}
