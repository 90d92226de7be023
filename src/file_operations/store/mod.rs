use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_core::Stream;
use std::pin::Pin;

pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

#[derive(Clone, Debug, Default)]
pub struct PutOptions {
    /// MIME type recorded with the object (e.g. application/json, image/png)
    pub content_type: Option<String>,
    /// Expected content length, when the caller knows it up front
    pub content_length: Option<u64>,
}

pub struct GetResult {
    pub content_length: u64,
    pub content_type: String,
    pub etag: String,
    pub body: BodyStream,
}

/// One entry of a prefix enumeration.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectInfo {
    pub key: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

// ──────────────────────────────────────────────────────
// ObjectStore trait
// ──────────────────────────────────────────────────────
//
// The durable backend every operation goes through. Per-key writes are
// linearizable; enumeration is lexicographic by key. `put_stream` and
// `commit_block_list` are all-or-nothing: a failure mid-way must leave no
// visible object at the target key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Streaming write of a complete object. Constant memory in the object
    /// size; the object becomes visible only once the stream has been fully
    /// consumed and committed.
    async fn put_stream(&self, key: &str, opts: PutOptions, body: BodyStream) -> Result<String>;

    /// Stage one block of a pending chunked upload under a caller-derived
    /// block identifier. Distinct identifiers never interfere.
    async fn stage_block(&self, key: &str, block_id: &str, bytes: Bytes) -> Result<()>;

    /// Assemble a previously staged upload into the final object, in the
    /// given block order. Fails (leaving no object) if any listed block was
    /// never staged. Consumes the staged state on success.
    async fn commit_block_list(
        &self,
        key: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<()>;

    async fn get_stream(&self, key: &str) -> Result<Option<GetResult>>;

    /// Server-side copy; the destination is overwritten if present.
    async fn copy(&self, src: &str, dst: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Lexicographic enumeration of every key starting with `prefix`
    /// (every key when `prefix` is empty), with size and creation time.
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>>;
}

pub use local::LocalStore;
pub use memory::MemoryStore;

mod local;
mod memory;
