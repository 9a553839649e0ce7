use std::sync::Arc;
use std::time::Duration;
use zennote_core::{MemorySnapshotRepository, NoteId, NoteStore, SaveStatus};

const QUIET: Duration = Duration::from_millis(1200);

async fn setup() -> (Arc<MemorySnapshotRepository>, NoteStore<MemorySnapshotRepository>) {
    let repo = Arc::new(MemorySnapshotRepository::new("autosave").unwrap());
    let store = NoteStore::open(Arc::clone(&repo), QUIET).await.unwrap();
    (repo, store)
}

fn stored_content(repo: &MemorySnapshotRepository, id: NoteId) -> String {
    repo.stored().note(id).unwrap().content.clone()
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_coalesce_into_one_write_with_latest_content() {
    let (repo, store) = setup().await;
    let note = store.create_note("Draft", None).await.unwrap();
    let saves = repo.save_count();

    for index in 0..5 {
        store
            .edit_note(note.id, "", &format!("<p>v{index}</p>"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
    assert_eq!(repo.save_count(), saves);
    assert_eq!(store.save_status(note.id), SaveStatus::Saving);
    assert_eq!(store.note_view(note.id).unwrap().content, "<p>v4</p>");
    assert_eq!(store.note(note.id).unwrap().content, "");

    tokio::time::sleep(QUIET).await;
    assert_eq!(repo.save_count(), saves + 1);
    assert_eq!(stored_content(&repo, note.id), "<p>v4</p>");
    assert_eq!(store.note(note.id).unwrap().content, "<p>v4</p>");
    assert_eq!(store.save_status(note.id), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn edit_bundles_title_and_blank_title_keeps_stored_one() {
    let (repo, store) = setup().await;
    let note = store.create_note("Draft", None).await.unwrap();

    store.edit_note(note.id, " Plan ", "<p>a</p>").await.unwrap();
    assert_eq!(store.note_view(note.id).unwrap().title, "Plan");
    store.flush(note.id).await.unwrap();
    let stored = repo.stored().note(note.id).cloned().unwrap();
    assert_eq!(stored.title, "Plan");
    assert_eq!(stored.content, "<p>a</p>");
    assert!(stored.updated_at >= note.updated_at);

    store.edit_note(note.id, "   ", "<p>b</p>").await.unwrap();
    store.flush(note.id).await.unwrap();
    assert_eq!(repo.stored().note(note.id).unwrap().title, "Plan");
    assert_eq!(stored_content(&repo, note.id), "<p>b</p>");
}

#[tokio::test(start_paused = true)]
async fn switching_active_note_flushes_pending_draft() {
    let (repo, store) = setup().await;
    let first = store.create_note("First", None).await.unwrap();
    let second = store.create_note("Second", None).await.unwrap();

    store.set_active_note(Some(first.id)).await.unwrap();
    store.edit_note(first.id, "", "<p>unsaved</p>").await.unwrap();
    let saves = repo.save_count();

    store.set_active_note(Some(second.id)).await.unwrap();
    assert_eq!(store.active_note(), Some(second.id));
    assert_eq!(repo.save_count(), saves + 1);
    assert_eq!(stored_content(&repo, first.id), "<p>unsaved</p>");
    assert_eq!(store.save_status(first.id), SaveStatus::Saved);

    // The cancelled timer must not write again.
    tokio::time::sleep(QUIET * 2).await;
    assert_eq!(repo.save_count(), saves + 1);
}

#[tokio::test(start_paused = true)]
async fn failed_autosave_keeps_draft_until_retried() {
    let (repo, store) = setup().await;
    let note = store.create_note("Draft", None).await.unwrap();

    repo.fail_next_saves(1);
    store.edit_note(note.id, "", "<p>keep me</p>").await.unwrap();
    tokio::time::sleep(QUIET + Duration::from_millis(100)).await;

    assert!(matches!(store.save_status(note.id), SaveStatus::Failed(_)));
    assert_eq!(stored_content(&repo, note.id), "");
    assert_eq!(store.note(note.id).unwrap().content, "");
    assert_eq!(store.note_view(note.id).unwrap().content, "<p>keep me</p>");

    // No automatic retry.
    tokio::time::sleep(QUIET * 3).await;
    assert!(matches!(store.save_status(note.id), SaveStatus::Failed(_)));

    store.flush_all().await.unwrap();
    assert_eq!(store.save_status(note.id), SaveStatus::Saved);
    assert_eq!(stored_content(&repo, note.id), "<p>keep me</p>");
}

#[tokio::test(start_paused = true)]
async fn edit_during_in_flight_write_waits_for_it() {
    let (repo, store) = setup().await;
    let note = store.create_note("Draft", None).await.unwrap();
    let saves = repo.save_count();
    repo.set_save_delay(Some(Duration::from_millis(500)));

    store.edit_note(note.id, "", "<p>one</p>").await.unwrap();
    // Timer fires at 1200ms; the write is in flight until 1700ms.
    tokio::time::sleep(Duration::from_millis(1300)).await;
    store.edit_note(note.id, "", "<p>two</p>").await.unwrap();
    assert_eq!(store.save_status(note.id), SaveStatus::Saving);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(repo.save_count(), saves + 1);
    assert_eq!(stored_content(&repo, note.id), "<p>one</p>");
    assert_eq!(store.save_status(note.id), SaveStatus::Saving);

    tokio::time::sleep(Duration::from_millis(1300)).await;
    assert_eq!(repo.save_count(), saves + 2);
    assert_eq!(stored_content(&repo, note.id), "<p>two</p>");
    assert_eq!(store.save_status(note.id), SaveStatus::Saved);
}

#[tokio::test(start_paused = true)]
async fn deleting_note_discards_pending_draft() {
    let (repo, store) = setup().await;
    let note = store.create_note("Draft", None).await.unwrap();
    store.set_active_note(Some(note.id)).await.unwrap();
    store.edit_note(note.id, "", "<p>gone</p>").await.unwrap();

    store.delete_note(note.id).await.unwrap();
    let saves = repo.save_count();
    assert_eq!(store.save_status(note.id), SaveStatus::Saved);
    assert_eq!(store.active_note(), None);

    tokio::time::sleep(QUIET * 2).await;
    assert_eq!(repo.save_count(), saves);
    assert!(store.note(note.id).is_none());
    assert!(repo.stored().note(note.id).is_none());
}

#[tokio::test(start_paused = true)]
async fn cascade_delete_discards_drafts_of_removed_notes() {
    let (repo, store) = setup().await;
    let folder = store.create_folder("Work", None).await.unwrap();
    let inside = store.create_note("Inside", Some(folder.id)).await.unwrap();
    let outside = store.create_note("Outside", None).await.unwrap();
    store.edit_note(inside.id, "", "<p>x</p>").await.unwrap();
    store.edit_note(outside.id, "", "<p>y</p>").await.unwrap();

    store.delete_folder(folder.id).await.unwrap();
    assert_eq!(store.save_status(inside.id), SaveStatus::Saved);
    assert_eq!(store.save_status(outside.id), SaveStatus::Saving);

    tokio::time::sleep(QUIET * 2).await;
    assert!(repo.stored().note(inside.id).is_none());
    assert_eq!(stored_content(&repo, outside.id), "<p>y</p>");
}

#[tokio::test(start_paused = true)]
async fn append_extends_newest_content() {
    let (repo, store) = setup().await;
    let note = store.create_note("Ideas", None).await.unwrap();

    store.edit_note(note.id, "", "<p>a</p>").await.unwrap();
    store.append_to_note(note.id, "<p>b</p>").await.unwrap();
    assert_eq!(store.note_view(note.id).unwrap().content, "<p>a</p><p>b</p>");

    store.flush(note.id).await.unwrap();
    store.append_to_note(note.id, "<p>c</p>").await.unwrap();
    store.flush(note.id).await.unwrap();
    assert_eq!(stored_content(&repo, note.id), "<p>a</p><p>b</p><p>c</p>");
    assert_eq!(repo.stored().note(note.id).unwrap().title, "Ideas");
}

#[tokio::test(start_paused = true)]
async fn editing_unknown_note_is_rejected() {
    let (_repo, store) = setup().await;
    let missing = NoteId::new();
    assert!(store.edit_note(missing, "", "x").await.unwrap_err().is_reference_error());
    assert!(store.append_to_note(missing, "x").await.is_err());
    assert!(store.set_active_note(Some(missing)).await.is_err());
}
