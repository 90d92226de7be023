use bytes::Bytes;
use futures_util::StreamExt;
use tempfile::TempDir;

use filehub::file_operations::errors::AppError;
use filehub::file_operations::operations::{
    create_folder, delete_folder, delete_object, folder_exists, list_folder, move_object,
    object_exists,
};
use filehub::file_operations::store::{LocalStore, MemoryStore, ObjectStore, PutOptions};

fn store_in(dir: &TempDir) -> LocalStore {
    LocalStore::new(dir.path())
}

async fn put(store: &dyn ObjectStore, key: &str, data: &[u8]) {
    let owned = Bytes::copy_from_slice(data);
    let body = Box::pin(futures_util::stream::iter(vec![Ok(owned)]));
    store
        .put_stream(
            key,
            PutOptions {
                content_type: Some("text/plain".into()),
                content_length: None,
            },
            body,
        )
        .await
        .unwrap();
}

async fn read_all(store: &dyn ObjectStore, key: &str) -> Vec<u8> {
    let mut result = store.get_stream(key).await.unwrap().unwrap();
    let mut out = Vec::new();
    while let Some(chunk) = result.body.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

#[tokio::test]
async fn empty_folder_persists_through_its_marker() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    create_folder(&store, "projects/new").await.unwrap();

    assert!(folder_exists(&store, "projects/new").await.unwrap());
    // The marker is the only stored object and is zero bytes.
    let all = store.list_by_prefix("").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].key, "projects/new/.keep");
    assert_eq!(all[0].size_bytes, 0);
}

#[tokio::test]
async fn folder_existence_is_exactly_the_prefix_invariant() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    put(&store, "a/b/c.txt", b"x").await;

    assert!(folder_exists(&store, "a").await.unwrap());
    assert!(folder_exists(&store, "a/b").await.unwrap());
    assert!(!folder_exists(&store, "a/b/c.txt/d").await.unwrap());
    assert!(!folder_exists(&store, "a/bc").await.unwrap());
}

#[tokio::test]
async fn deleting_marker_only_folder_succeeds() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    create_folder(&store, "tmp").await.unwrap();

    delete_folder(&store, "tmp").await.unwrap();
    assert!(!folder_exists(&store, "tmp").await.unwrap());
}

#[tokio::test]
async fn deleting_non_empty_folder_conflicts_and_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    create_folder(&store, "docs").await.unwrap();
    put(&store, "docs/kept.txt", b"keep me").await;

    let err = delete_folder(&store, "docs").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Folder and contents are untouched, the marker included.
    assert!(folder_exists(&store, "docs").await.unwrap());
    assert!(store.exists("docs/kept.txt").await.unwrap());
    assert!(store.exists("docs/.keep").await.unwrap());
    assert_eq!(read_all(&store, "docs/kept.txt").await, b"keep me");
}

#[tokio::test]
async fn listing_hides_markers_and_aggregates_subfolders() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    create_folder(&store, "root/empty").await.unwrap();
    put(&store, "root/a.txt", b"a").await;
    put(&store, "root/sub/b.txt", b"b").await;
    put(&store, "root/sub/c.txt", b"c").await;

    let listing = list_folder(&store, "root").await.unwrap();

    let files: Vec<_> = listing.files.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(files, vec!["a.txt"]);

    let folders: Vec<_> = listing
        .folders
        .iter()
        .map(|f| (f.name.as_str(), f.child_count))
        .collect();
    // Lexicographic enumeration: "empty" before "sub". The empty folder is
    // visible with zero children; its own marker never counts.
    assert_eq!(folders, vec![("empty", 0), ("sub", 2)]);
}

#[tokio::test]
async fn move_relocates_content_byte_for_byte() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    put(&store, "inbox/report.pdf", b"report body").await;

    move_object(&store, "inbox/report.pdf", "archive/2026/report.pdf")
        .await
        .unwrap();

    assert!(!store.exists("inbox/report.pdf").await.unwrap());
    assert_eq!(
        read_all(&store, "archive/2026/report.pdf").await,
        b"report body"
    );
}

#[tokio::test]
async fn move_preserves_content_type_metadata() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    put(&store, "a.txt", b"x").await;

    move_object(&store, "a.txt", "b.txt").await.unwrap();

    let result = store.get_stream("b.txt").await.unwrap().unwrap();
    assert_eq!(result.content_type, "text/plain");
}

#[tokio::test]
async fn delete_object_removes_only_that_key() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    put(&store, "docs/a.txt", b"a").await;
    put(&store, "docs/b.txt", b"b").await;

    delete_object(&store, "docs/a.txt").await.unwrap();

    assert!(!store.exists("docs/a.txt").await.unwrap());
    assert!(store.exists("docs/b.txt").await.unwrap());
}

#[tokio::test]
async fn traversal_keys_cannot_escape_the_storage_root() {
    let dir = TempDir::new().unwrap();
    // Root the store one level down, with a bystander file outside it.
    tokio::fs::create_dir_all(dir.path().join("storage"))
        .await
        .unwrap();
    tokio::fs::write(dir.path().join("secret.txt"), b"host secret")
        .await
        .unwrap();
    let store = LocalStore::new(dir.path().join("storage"));

    assert!(store.get_stream("../../secret.txt").await.is_err());
    assert!(store.exists("../../secret.txt").await.is_err());

    let body = Box::pin(futures_util::stream::iter(vec![Ok(Bytes::from_static(
        b"payload",
    ))]));
    assert!(store
        .put_stream("../../escape.txt", PutOptions::default(), body)
        .await
        .is_err());
    assert!(!dir.path().join("escape.txt").exists());

    assert!(store.delete("../../secret.txt").await.is_err());
    assert_eq!(
        tokio::fs::read(dir.path().join("secret.txt")).await.unwrap(),
        b"host secret"
    );
}

#[tokio::test]
async fn dot_segments_are_rejected_before_any_store_call() {
    let store = MemoryStore::new();

    let err = move_object(&store, "../etc/passwd", "x.txt").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = create_folder(&store, "a/./b").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = object_exists(&store, "..").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn folder_prefixes_are_not_objects() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    put(&store, "docs/a.txt", b"x").await;

    // "docs" is a folder prefix, never an object key.
    assert!(!object_exists(&store, "docs").await.unwrap());
    assert!(store.get_stream("docs").await.unwrap().is_none());

    let err = move_object(&store, "docs", "archive").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(folder_exists(&store, "docs").await.unwrap());
}

#[tokio::test]
async fn last_writer_wins_on_overwrite() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    put(&store, "race.txt", b"first").await;
    put(&store, "race.txt", b"second").await;

    assert_eq!(read_all(&store, "race.txt").await, b"second");
}
