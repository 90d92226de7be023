use super::{BodyStream, GetResult, ObjectInfo, ObjectStore, PutOptions};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures_util::StreamExt;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
struct StoredObject {
    bytes: Bytes,
    content_type: String,
    etag: String,
    created_at: DateTime<Utc>,
}

/// In-memory store with the same visibility semantics as `LocalStore`:
/// an object appears only after its body has been fully consumed, and a
/// commit with a missing block inserts nothing. Used by the test suites.
#[derive(Default)]
pub struct MemoryStore {
    objects: DashMap<String, StoredObject>,
    staged: DashMap<(String, String), Bytes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn etag_of(bytes: &[u8]) -> String {
        let digest: [u8; 16] = md5::compute(bytes).into();
        format!("\"{}\"", hex::encode(digest))
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_stream(&self, key: &str, opts: PutOptions, mut body: BodyStream) -> Result<String> {
        let mut buf = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("read body chunk")?;
            buf.extend_from_slice(&chunk);
        }
        if let Some(expected) = opts.content_length {
            if buf.len() as u64 != expected {
                bail!("content length mismatch: expected {expected}, got {}", buf.len());
            }
        }
        let bytes = buf.freeze();
        let etag = Self::etag_of(&bytes);
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: opts
                    .content_type
                    .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
                etag: etag.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(etag)
    }

    async fn stage_block(&self, key: &str, block_id: &str, bytes: Bytes) -> Result<()> {
        self.staged
            .insert((key.to_string(), block_id.to_string()), bytes);
        Ok(())
    }

    async fn commit_block_list(
        &self,
        key: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<()> {
        // All blocks must be present before anything is assembled.
        for id in block_ids {
            if !self
                .staged
                .contains_key(&(key.to_string(), id.to_string()))
            {
                bail!("block {id} was never staged for key {key}");
            }
        }

        let mut buf = BytesMut::new();
        for id in block_ids {
            let entry = self
                .staged
                .get(&(key.to_string(), id.to_string()))
                .context("staged block vanished during commit")?;
            buf.extend_from_slice(entry.value());
        }
        let bytes = buf.freeze();
        let etag = Self::etag_of(&bytes);
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
                etag,
                created_at: Utc::now(),
            },
        );

        self.staged.retain(|(k, _), _| k.as_str() != key);
        Ok(())
    }

    async fn get_stream(&self, key: &str) -> Result<Option<GetResult>> {
        let Some(obj) = self.objects.get(key).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let bytes = obj.bytes.clone();
        let body = futures_util::stream::once(async move { Ok(bytes) });
        Ok(Some(GetResult {
            content_length: obj.bytes.len() as u64,
            content_type: obj.content_type,
            etag: obj.etag,
            body: Box::pin(body),
        }))
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let obj = self
            .objects
            .get(src)
            .map(|e| e.value().clone())
            .with_context(|| format!("copy source {src} not found"))?;
        self.objects.insert(dst.to_string(), obj);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.objects.contains_key(key))
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let mut results: Vec<ObjectInfo> = self
            .objects
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| ObjectInfo {
                key: e.key().clone(),
                size_bytes: e.value().bytes.len() as u64,
                created_at: e.value().created_at,
            })
            .collect();
        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }
}
