//! Chunked-upload coordination.
//!
//! Chunks stage under block identifiers derived purely from their index, so
//! any arrival order works and commit can rebuild the full ordered list
//! without ever querying what was staged. The store's assembly call is the
//! single transition that makes the object visible, and it fails outright
//! if any index in `0..total_chunks` was skipped.

use super::errors::AppError;
use super::path_utils::has_dot_segments;
use super::store::ObjectStore;
use anyhow::Context;
use bytes::Bytes;

/// Fixed-width identifier: index 3 stages as `chunk-000003`.
pub fn block_id(index: u32) -> String {
    format!("chunk-{index:06}")
}

/// The complete ordered identifier list for a committed upload.
pub fn block_list(total_chunks: u32) -> Vec<String> {
    (0..total_chunks).map(block_id).collect()
}

fn validate(key: &str, total_chunks: u32) -> Result<(), AppError> {
    if key.is_empty() {
        return Err(AppError::Validation("path must not be empty".into()));
    }
    if has_dot_segments(key) {
        return Err(AppError::Validation(
            "path must not contain '.' or '..' segments".into(),
        ));
    }
    if total_chunks == 0 {
        return Err(AppError::Validation(
            "total_chunks must be at least 1".into(),
        ));
    }
    Ok(())
}

pub async fn stage_chunk(
    store: &dyn ObjectStore,
    key: &str,
    chunk_index: u32,
    total_chunks: u32,
    bytes: Bytes,
) -> Result<(), AppError> {
    validate(key, total_chunks)?;
    if chunk_index >= total_chunks {
        return Err(AppError::Validation(format!(
            "chunk_index {chunk_index} out of range for {total_chunks} chunks"
        )));
    }

    store
        .stage_block(key, &block_id(chunk_index), bytes)
        .await
        .context("stage chunk")?;
    Ok(())
}

pub async fn commit_upload(
    store: &dyn ObjectStore,
    key: &str,
    total_chunks: u32,
    content_type: &str,
) -> Result<(), AppError> {
    validate(key, total_chunks)?;

    let ids = block_list(total_chunks);
    store
        .commit_block_list(key, &ids, content_type)
        .await
        .context("assemble staged blocks")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_operations::store::MemoryStore;

    #[test]
    fn block_ids_are_fixed_width() {
        assert_eq!(block_id(0), "chunk-000000");
        assert_eq!(block_id(3), "chunk-000003");
        assert_eq!(block_id(999_999), "chunk-999999");
    }

    #[test]
    fn block_list_covers_every_index_in_order() {
        assert_eq!(
            block_list(3),
            vec!["chunk-000000", "chunk-000001", "chunk-000002"]
        );
    }

    #[tokio::test]
    async fn out_of_range_index_is_a_validation_error() {
        let store = MemoryStore::new();
        let err = stage_chunk(&store, "f.bin", 3, 3, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_key_is_a_validation_error() {
        let store = MemoryStore::new();
        let err = stage_chunk(&store, "", 0, 1, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn dot_segment_key_is_a_validation_error() {
        let store = MemoryStore::new();
        let err = stage_chunk(&store, "../escape.bin", 0, 1, Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = commit_upload(&store, "a/../b.bin", 1, "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn zero_total_chunks_is_a_validation_error() {
        let store = MemoryStore::new();
        let err = commit_upload(&store, "f.bin", 0, "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
