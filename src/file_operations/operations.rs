//! The externally visible file operations, composed from the store
//! primitives and the hierarchy/marker conventions.

use super::errors::AppError;
use super::hierarchy::{self, Listing, EMPTY_MARKER};
use super::path_utils::has_dot_segments;
use super::store::{ObjectStore, PutOptions};
use anyhow::Context;

fn require_path(path: &str) -> Result<(), AppError> {
    if path.is_empty() {
        return Err(AppError::Validation("path must not be empty".into()));
    }
    if has_dot_segments(path) {
        return Err(AppError::Validation(
            "path must not contain '.' or '..' segments".into(),
        ));
    }
    Ok(())
}

fn marker_key(folder: &str) -> String {
    format!("{folder}/{EMPTY_MARKER}")
}

/// One listing level of the virtual tree for `folder` (`""` for the root).
pub async fn list_folder(store: &dyn ObjectStore, folder: &str) -> Result<Listing, AppError> {
    let prefix = if folder.is_empty() {
        String::new()
    } else {
        format!("{folder}/")
    };
    let objects = store
        .list_by_prefix(&prefix)
        .await
        .context("listing failed")?;
    Ok(hierarchy::list_level(&objects, folder))
}

/// Copy-then-delete. Not atomic: a failure between the steps leaves the
/// source in place (duplicate data), never a lost object, so retries must
/// tolerate duplication. The destination is overwritten if present.
pub async fn move_object(store: &dyn ObjectStore, from: &str, to: &str) -> Result<(), AppError> {
    require_path(from)?;
    require_path(to)?;
    if from == to {
        return Err(AppError::Validation(
            "source and destination are the same path".into(),
        ));
    }
    if !store.exists(from).await.context("check move source")? {
        return Err(AppError::NotFound(from.to_string()));
    }

    store.copy(from, to).await.context("copy step of move")?;
    store
        .delete(from)
        .await
        .context("delete step of move (destination copy already exists)")?;

    tracing::info!(from = %from, to = %to, "object moved");
    Ok(())
}

/// Writes only the zero-byte marker; there is no folder entity to create.
pub async fn create_folder(store: &dyn ObjectStore, folder: &str) -> Result<(), AppError> {
    require_path(folder)?;
    let body = Box::pin(futures_util::stream::empty());
    store
        .put_stream(&marker_key(folder), PutOptions::default(), body)
        .await
        .context("write folder marker")?;
    tracing::info!(folder = %folder, "folder created");
    Ok(())
}

/// Succeeds only when the folder holds nothing but its own marker (or
/// nothing at all). Never deletes contents as a side effect.
pub async fn delete_folder(store: &dyn ObjectStore, folder: &str) -> Result<(), AppError> {
    require_path(folder)?;
    let prefix = format!("{folder}/");
    let entries = store
        .list_by_prefix(&prefix)
        .await
        .context("enumerate folder for delete")?;

    let marker = marker_key(folder);
    if entries.iter().any(|e| e.key != marker) {
        return Err(AppError::Conflict(format!("folder {folder} is not empty")));
    }

    store.delete(&marker).await.context("delete folder marker")?;
    tracing::info!(folder = %folder, "folder deleted");
    Ok(())
}

/// A folder exists iff any key has it as a strict prefix, its own marker
/// included.
pub async fn folder_exists(store: &dyn ObjectStore, folder: &str) -> Result<bool, AppError> {
    require_path(folder)?;
    let entries = store
        .list_by_prefix(&format!("{folder}/"))
        .await
        .context("enumerate folder for exists")?;
    Ok(!entries.is_empty())
}

pub async fn object_exists(store: &dyn ObjectStore, key: &str) -> Result<bool, AppError> {
    require_path(key)?;
    Ok(store.exists(key).await.context("check object")?)
}

/// Passthrough delete; deleting an absent key is a no-op, as in the store.
pub async fn delete_object(store: &dyn ObjectStore, key: &str) -> Result<(), AppError> {
    require_path(key)?;
    store.delete(key).await.context("delete object")?;
    tracing::info!(key = %key, "object deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_operations::store::MemoryStore;
    use bytes::Bytes;

    async fn put(store: &MemoryStore, key: &str, data: &'static [u8]) {
        let body = Box::pin(futures_util::stream::once(async move {
            Ok(Bytes::from_static(data))
        }));
        store
            .put_stream(key, PutOptions::default(), body)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn move_copies_then_deletes_source() {
        let store = MemoryStore::new();
        put(&store, "a/src.txt", b"payload").await;

        move_object(&store, "a/src.txt", "b/dst.txt").await.unwrap();

        assert!(!store.exists("a/src.txt").await.unwrap());
        assert!(store.exists("b/dst.txt").await.unwrap());
    }

    #[tokio::test]
    async fn move_of_missing_source_is_not_found() {
        let store = MemoryStore::new();
        let err = move_object(&store, "nope.txt", "dst.txt").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn create_folder_writes_only_the_marker() {
        let store = MemoryStore::new();
        create_folder(&store, "docs/empty").await.unwrap();

        let keys = store.list_by_prefix("").await.unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key, "docs/empty/.keep");
        assert_eq!(keys[0].size_bytes, 0);
    }

    #[tokio::test]
    async fn folder_exists_tracks_any_descendant_key() {
        let store = MemoryStore::new();
        assert!(!folder_exists(&store, "docs").await.unwrap());

        put(&store, "docs/a.txt", b"x").await;
        assert!(folder_exists(&store, "docs").await.unwrap());
        // Prefix match is on "docs/", not on the raw string.
        assert!(!folder_exists(&store, "doc").await.unwrap());
    }

    #[tokio::test]
    async fn delete_folder_with_only_marker_succeeds() {
        let store = MemoryStore::new();
        create_folder(&store, "docs/empty").await.unwrap();

        delete_folder(&store, "docs/empty").await.unwrap();
        assert!(!folder_exists(&store, "docs/empty").await.unwrap());
    }

    #[tokio::test]
    async fn delete_folder_with_contents_is_a_conflict() {
        let store = MemoryStore::new();
        create_folder(&store, "docs").await.unwrap();
        put(&store, "docs/a.txt", b"x").await;

        let err = delete_folder(&store, "docs").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        // Nothing was deleted.
        assert!(store.exists("docs/a.txt").await.unwrap());
        assert!(store.exists("docs/.keep").await.unwrap());
    }

    #[tokio::test]
    async fn list_folder_hides_markers_and_buckets_keys() {
        let store = MemoryStore::new();
        create_folder(&store, "docs").await.unwrap();
        put(&store, "docs/a.txt", b"x").await;
        put(&store, "docs/sub/b.txt", b"y").await;

        let listing = list_folder(&store, "docs").await.unwrap();
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].name, "a.txt");
        assert_eq!(listing.folders.len(), 1);
        assert_eq!(listing.folders[0].name, "sub");
        assert_eq!(listing.folders[0].child_count, 1);
    }
}
