use std::collections::HashSet;
use std::sync::Arc;
use zennote_core::{
    Change, Folder, FolderId, HierarchyIndex, MemorySnapshotRepository, MutationError,
    MutationService, Note, NoteId, Snapshot,
};

fn setup() -> (
    Arc<MemorySnapshotRepository>,
    MutationService<MemorySnapshotRepository>,
) {
    let repo = Arc::new(MemorySnapshotRepository::new("mutation").unwrap());
    (Arc::clone(&repo), MutationService::new(repo))
}

async fn folder(service: &MutationService<MemorySnapshotRepository>, name: &str, parent: Option<FolderId>) -> Folder {
    service
        .create_folder(name, parent)
        .await
        .unwrap()
        .change
        .folder()
        .cloned()
        .unwrap()
}

async fn note(service: &MutationService<MemorySnapshotRepository>, title: &str, folder: Option<FolderId>) -> Note {
    service
        .create_note(title, folder)
        .await
        .unwrap()
        .change
        .note()
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn create_defaults_and_trims_names() {
    let (repo, service) = setup();

    let work = folder(&service, "  Work  ", None).await;
    assert_eq!(work.name, "Work");
    assert!(work.is_open);
    assert!(work.is_root());

    let untitled = folder(&service, "   ", None).await;
    assert_eq!(untitled.name, "New Folder");

    let draft = note(&service, "", Some(work.id)).await;
    assert_eq!(draft.title, "Untitled Page");
    assert_eq!(draft.content, "");
    assert_eq!(draft.folder_id, Some(work.id));

    let stored = repo.stored();
    assert_eq!(stored.folders.len(), 2);
    assert_eq!(stored.notes.len(), 1);
}

#[tokio::test]
async fn rapid_creates_never_collide() {
    let (repo, service) = setup();
    let (a, b) = tokio::join!(
        service.create_note("a", None),
        service.create_note("b", None)
    );
    let a = a.unwrap().change.note().cloned().unwrap();
    let b = b.unwrap().change.note().cloned().unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(repo.stored().notes.len(), 2);
}

#[tokio::test]
async fn create_folder_under_missing_parent_is_reference_error() {
    let (repo, service) = setup();
    let missing = FolderId::new();

    let err = service.create_folder("X", Some(missing)).await.unwrap_err();
    assert!(matches!(err, MutationError::ParentNotFound(id) if id == missing));
    assert!(err.is_reference_error());
    assert!(repo.stored().folders.is_empty());

    let err = service.create_note("n", Some(missing)).await.unwrap_err();
    assert!(err.is_reference_error());
    assert!(repo.stored().notes.is_empty());
}

#[tokio::test]
async fn blank_rename_is_silent_no_op() {
    let (repo, service) = setup();
    let work = folder(&service, "Work", None).await;
    let draft = note(&service, "Draft", None).await;
    let saves = repo.save_count();

    for blank in ["", "   "] {
        assert!(service.rename_folder(work.id, blank).await.unwrap().is_unchanged());
        assert!(service.rename_note(draft.id, blank).await.unwrap().is_unchanged());
    }
    assert_eq!(repo.save_count(), saves);
    assert_eq!(repo.stored().folder(work.id).unwrap().name, "Work");
    assert_eq!(repo.stored().note(draft.id).unwrap().title, "Draft");

    let renamed = service.rename_folder(work.id, " Office ").await.unwrap();
    assert_eq!(renamed.folder().unwrap().name, "Office");
}

#[tokio::test]
async fn operations_on_missing_ids_fail_before_writing() {
    let (repo, service) = setup();
    let missing_folder = FolderId::new();
    let missing_note = NoteId::new();

    assert!(service.rename_folder(missing_folder, "x").await.unwrap_err().is_reference_error());
    assert!(service.rename_note(missing_note, "x").await.unwrap_err().is_reference_error());
    assert!(service.toggle_folder(missing_folder).await.unwrap_err().is_reference_error());
    assert!(service.move_note(missing_note, None).await.unwrap_err().is_reference_error());
    assert!(service.delete_note(missing_note).await.unwrap_err().is_reference_error());
    assert!(service.delete_folder(missing_folder).await.unwrap_err().is_reference_error());
    assert_eq!(repo.save_count(), 0);
}

#[tokio::test]
async fn move_note_to_root_makes_it_unfiled() {
    let (_repo, service) = setup();
    let work = folder(&service, "Work", None).await;
    let draft = note(&service, "Draft", Some(work.id)).await;

    let outcome = service.move_note(draft.id, None).await.unwrap();
    let moved = outcome.change.note().unwrap();
    assert_eq!(moved.folder_id, None);
    assert!(outcome.revealed.is_none());

    let snapshot = service.load_snapshot().await.unwrap();
    let index = HierarchyIndex::build(&snapshot);
    let unfiled: Vec<_> = index.child_notes(None).iter().map(|n| n.id).collect();
    assert_eq!(unfiled, vec![draft.id]);
    assert!(index.child_notes(Some(work.id)).is_empty());
}

#[tokio::test]
async fn move_note_into_closed_folder_reveals_it() {
    let (repo, service) = setup();
    let archive = folder(&service, "Archive", None).await;
    service.toggle_folder(archive.id).await.unwrap();
    let loose = note(&service, "Loose", None).await;

    let outcome = service.move_note(loose.id, Some(archive.id)).await.unwrap();
    assert_eq!(outcome.revealed.as_ref().map(|f| f.id), Some(archive.id));
    assert!(repo.stored().folder(archive.id).unwrap().is_open);
    assert!(outcome.change.note().unwrap().updated_at >= loose.updated_at);
}

#[tokio::test]
async fn move_into_own_closed_folder_still_reveals_it() {
    let (repo, service) = setup();
    let work = folder(&service, "Work", None).await;
    let draft = note(&service, "Draft", Some(work.id)).await;
    service.toggle_folder(work.id).await.unwrap();
    let saves = repo.save_count();

    let outcome = service.move_note(draft.id, Some(work.id)).await.unwrap();
    assert!(outcome.change.is_unchanged());
    assert_eq!(outcome.revealed.as_ref().map(|f| f.id), Some(work.id));
    assert_eq!(repo.save_count(), saves + 1);
    let stored = repo.stored();
    assert!(stored.folder(work.id).unwrap().is_open);
    assert_eq!(stored.note(draft.id).unwrap().updated_at, draft.updated_at);

    let again = service.move_note(draft.id, Some(work.id)).await.unwrap();
    assert!(again.change.is_unchanged());
    assert!(again.revealed.is_none());
    assert_eq!(repo.save_count(), saves + 1);
}

#[tokio::test]
async fn move_folder_under_own_closed_parent_reveals_it() {
    let (repo, service) = setup();
    let a = folder(&service, "A", None).await;
    let b = folder(&service, "B", Some(a.id)).await;
    service.toggle_folder(a.id).await.unwrap();

    let outcome = service.move_folder(b.id, Some(a.id)).await.unwrap();
    assert!(outcome.change.is_unchanged());
    assert_eq!(outcome.revealed.as_ref().map(|f| f.id), Some(a.id));
    assert!(repo.stored().folder(a.id).unwrap().is_open);
}

#[tokio::test]
async fn move_note_to_missing_folder_is_rejected() {
    let (repo, service) = setup();
    let loose = note(&service, "Loose", None).await;
    let err = service
        .move_note(loose.id, Some(FolderId::new()))
        .await
        .unwrap_err();
    assert!(err.is_reference_error());
    assert_eq!(repo.stored().note(loose.id).unwrap().folder_id, None);
}

#[tokio::test]
async fn reveal_failure_keeps_primary_write() {
    let (repo, service) = setup();
    let closed = folder(&service, "Closed", None).await;
    service.toggle_folder(closed.id).await.unwrap();

    repo.fail_saves_after(1, 1);
    let outcome = service.create_note("Inside", Some(closed.id)).await.unwrap();
    assert!(outcome.revealed.is_none());
    let stored = repo.stored();
    assert_eq!(stored.notes.len(), 1);
    assert!(!stored.folder(closed.id).unwrap().is_open);
}

#[tokio::test]
async fn move_folder_rejects_cycles() {
    let (_repo, service) = setup();
    let a = folder(&service, "A", None).await;
    let b = folder(&service, "B", Some(a.id)).await;
    let c = folder(&service, "C", Some(b.id)).await;

    let err = service.move_folder(a.id, Some(c.id)).await.unwrap_err();
    assert!(matches!(err, MutationError::CycleDetected { .. }));
    let err = service.move_folder(a.id, Some(a.id)).await.unwrap_err();
    assert!(matches!(err, MutationError::CycleDetected { .. }));

    let outcome = service.move_folder(c.id, None).await.unwrap();
    assert!(outcome.change.folder().unwrap().is_root());
}

#[tokio::test]
async fn delete_folder_cascades_exactly_the_subtree() {
    let (repo, service) = setup();
    let a = folder(&service, "A", None).await;
    let b = folder(&service, "B", Some(a.id)).await;
    let keep = folder(&service, "Keep", None).await;
    let n1 = note(&service, "n1", Some(b.id)).await;
    let n2 = note(&service, "n2", Some(a.id)).await;
    let kept_note = note(&service, "kept", Some(keep.id)).await;
    let loose = note(&service, "loose", None).await;

    let change = service.delete_folder(a.id).await.unwrap();
    let Change::FolderTreeRemoved {
        folder_ids,
        note_ids,
    } = change
    else {
        panic!("expected cascade change");
    };
    assert_eq!(folder_ids, vec![a.id, b.id]);
    assert_eq!(
        note_ids.into_iter().collect::<HashSet<_>>(),
        HashSet::from([n1.id, n2.id])
    );

    let stored = repo.stored();
    assert_eq!(stored.folders.iter().map(|f| f.id).collect::<Vec<_>>(), vec![keep.id]);
    assert_eq!(
        stored.notes.iter().map(|n| n.id).collect::<Vec<_>>(),
        vec![kept_note.id, loose.id]
    );
}

#[tokio::test]
async fn delete_folder_scenario_removes_nested_note() {
    let (repo, service) = setup();
    let a = folder(&service, "A", None).await;
    let b = folder(&service, "B", Some(a.id)).await;
    note(&service, "n1", Some(b.id)).await;

    service.delete_folder(a.id).await.unwrap();
    assert!(repo.stored().is_empty());
}

#[tokio::test]
async fn failed_cascade_leaves_durable_copy_intact() {
    let (repo, service) = setup();
    let a = folder(&service, "A", None).await;
    let b = folder(&service, "B", Some(a.id)).await;
    note(&service, "n1", Some(b.id)).await;

    repo.fail_next_saves(1);
    let err = service.delete_folder(a.id).await.unwrap_err();
    assert!(matches!(err, MutationError::Persistence(_)));
    let stored = repo.stored();
    assert_eq!(stored.folders.len(), 2);
    assert_eq!(stored.notes.len(), 1);
}

#[tokio::test]
async fn load_repairs_corrupted_collection_and_next_write_persists_it() {
    let ghost = FolderId::new();
    let orphan = Folder::new("Orphan", Some(ghost));
    let lost = Note::new("Lost", Some(ghost), 1);
    let repo = Arc::new(
        MemorySnapshotRepository::with_snapshot(
            "repair",
            Snapshot::new(vec![orphan.clone(), orphan.clone()], vec![lost.clone()]),
        )
        .unwrap(),
    );
    let service = MutationService::new(Arc::clone(&repo));

    let snapshot = service.load_snapshot().await.unwrap();
    assert_eq!(snapshot.folders.len(), 1);
    assert!(snapshot.folders[0].is_root());
    assert!(snapshot.notes[0].is_unfiled());

    service.toggle_folder(orphan.id).await.unwrap();
    let stored = repo.stored();
    assert_eq!(stored.folders.len(), 1);
    assert_eq!(stored.folders[0].parent_id, None);
    assert_eq!(stored.notes[0].folder_id, None);
}

#[tokio::test]
async fn load_failure_is_persistence_error() {
    let (repo, service) = setup();
    repo.fail_next_loads(1);
    let err = service.create_folder("A", None).await.unwrap_err();
    assert!(matches!(err, MutationError::Persistence(_)));
    assert!(!err.is_reference_error());
}
