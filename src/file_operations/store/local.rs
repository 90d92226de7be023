use super::{BodyStream, GetResult, ObjectInfo, ObjectStore, PutOptions};
use crate::file_operations::path_utils::has_dot_segments;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Keys are joined onto the storage root, so `.`/`..` segments must never
/// get this far. The HTTP boundary rejects them first; this is the store's
/// own line of defense for direct library callers.
fn reject_dot_segments(key: &str) -> Result<()> {
    if has_dot_segments(key) {
        bail!("key {key} contains '.' or '..' path segments");
    }
    Ok(())
}

/// Sidecar record kept per object, outside the key namespace.
#[derive(Serialize, Deserialize, Debug)]
struct ObjectMetadata {
    content_type: String,
    etag: String,
}

/// Removes a temp file unless the write was committed.
struct TempGuard {
    path: PathBuf,
    committed: bool,
}

impl TempGuard {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            committed: false,
        }
    }

    fn mark_committed(&mut self) {
        self.committed = true;
    }
}

impl Drop for TempGuard {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Filesystem-backed store. Layout under the root:
///
///   objects/<key>              object bytes
///   .meta/<key>.json           content type + etag sidecar
///   .staging/<key-digest>/<id> staged chunk-upload blocks
///
/// Objects become visible only via rename of a fully written temp file, so
/// an interrupted put or commit leaves nothing at the target key. Staged
/// blocks live under `.staging/` so abandoned uploads can be reaped by an
/// external sweep without touching live objects.
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join("objects").join(key)
    }

    fn meta_path(&self, key: &str) -> PathBuf {
        self.root.join(".meta").join(format!("{key}.json"))
    }

    fn staging_dir(&self, key: &str) -> PathBuf {
        // Keys contain slashes, so the staging directory is named by digest.
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.root.join(".staging").join(digest)
    }

    async fn write_metadata(&self, key: &str, content_type: &str, etag: &str) -> Result<()> {
        let meta_path = self.meta_path(key);
        if let Some(parent) = meta_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let meta = ObjectMetadata {
            content_type: content_type.to_string(),
            etag: etag.to_string(),
        };
        fs::write(&meta_path, serde_json::to_vec(&meta)?)
            .await
            .context("write metadata sidecar")?;
        Ok(())
    }

    async fn read_metadata(&self, key: &str) -> ObjectMetadata {
        match fs::read(self.meta_path(key)).await {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|_| ObjectMetadata {
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                etag: String::new(),
            }),
            Err(_) => ObjectMetadata {
                content_type: DEFAULT_CONTENT_TYPE.to_string(),
                etag: String::new(),
            },
        }
    }

    async fn prepare_target(&self, key: &str) -> Result<(PathBuf, PathBuf)> {
        let final_path = self.object_path(key);
        let parent = final_path
            .parent()
            .ok_or_else(|| anyhow!("invalid object key: {key}"))?
            .to_path_buf();
        fs::create_dir_all(&parent).await.context("create parent")?;
        let tmp_path = parent.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        Ok((final_path, tmp_path))
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn put_stream(&self, key: &str, opts: PutOptions, mut body: BodyStream) -> Result<String> {
        reject_dot_segments(key)?;
        let (final_path, tmp_path) = self.prepare_target(key).await?;

        let file = fs::File::create(&tmp_path)
            .await
            .context("create temp file")?;
        let mut guard = TempGuard::new(tmp_path.clone());
        let mut writer = BufWriter::with_capacity(512 * 1024, file);

        let mut md5_context = md5::Context::new();
        let mut total_size = 0u64;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.context("read body chunk")?;
            md5_context.consume(&chunk);
            writer.write_all(&chunk).await.context("write chunk")?;
            total_size += chunk.len() as u64;
        }

        if let Some(expected) = opts.content_length {
            if total_size != expected {
                bail!("content length mismatch: expected {expected}, got {total_size}");
            }
        }

        writer.flush().await.context("flush")?;
        writer.into_inner().sync_all().await.context("sync")?;

        let digest: [u8; 16] = md5_context.compute().into();
        let etag = format!("\"{}\"", hex::encode(digest));

        fs::rename(&tmp_path, &final_path)
            .await
            .context("rename temp into place")?;
        guard.mark_committed();

        let content_type = opts
            .content_type
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        self.write_metadata(key, &content_type, &etag).await?;

        tracing::info!(key = %key, bytes = total_size, etag = %etag, "object stored");
        Ok(etag)
    }

    async fn stage_block(&self, key: &str, block_id: &str, bytes: Bytes) -> Result<()> {
        reject_dot_segments(key)?;
        let dir = self.staging_dir(key);
        fs::create_dir_all(&dir).await.context("create staging dir")?;

        // Write-then-rename so a concurrent restage of the same id never
        // exposes a half-written block.
        let tmp = dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));
        let mut guard = TempGuard::new(tmp.clone());
        fs::write(&tmp, &bytes).await.context("write staged block")?;
        fs::rename(&tmp, dir.join(block_id))
            .await
            .context("rename staged block")?;
        guard.mark_committed();

        tracing::info!(key = %key, block_id = %block_id, bytes = bytes.len(), "block staged");
        Ok(())
    }

    async fn commit_block_list(
        &self,
        key: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<()> {
        reject_dot_segments(key)?;
        let dir = self.staging_dir(key);

        // Verify the complete list up front; a skipped index must fail the
        // whole commit before anything is assembled.
        for id in block_ids {
            let block = dir.join(id);
            if fs::metadata(&block).await.is_err() {
                bail!("block {id} was never staged for key {key}");
            }
        }

        let (final_path, tmp_path) = self.prepare_target(key).await?;
        let file = fs::File::create(&tmp_path)
            .await
            .context("create temp file")?;
        let mut guard = TempGuard::new(tmp_path.clone());
        let mut writer = BufWriter::with_capacity(512 * 1024, file);

        let mut md5_context = md5::Context::new();
        let mut total_size = 0u64;
        for id in block_ids {
            let bytes = fs::read(dir.join(id))
                .await
                .with_context(|| format!("read staged block {id}"))?;
            md5_context.consume(&bytes);
            writer.write_all(&bytes).await.context("append block")?;
            total_size += bytes.len() as u64;
        }

        writer.flush().await.context("flush")?;
        writer.into_inner().sync_all().await.context("sync")?;

        let digest: [u8; 16] = md5_context.compute().into();
        let etag = format!("\"{}\"", hex::encode(digest));

        fs::rename(&tmp_path, &final_path)
            .await
            .context("rename assembled object into place")?;
        guard.mark_committed();

        self.write_metadata(key, content_type, &etag).await?;

        // Staged state is consumed by a successful commit.
        let _ = fs::remove_dir_all(&dir).await;

        tracing::info!(
            key = %key,
            blocks = block_ids.len(),
            bytes = total_size,
            "chunked upload committed"
        );
        Ok(())
    }

    async fn get_stream(&self, key: &str) -> Result<Option<GetResult>> {
        reject_dot_segments(key)?;
        let path = self.object_path(key);
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("open object"),
        };
        let file_meta = file.metadata().await.context("stat object")?;
        // A folder prefix is not an object.
        if !file_meta.is_file() {
            return Ok(None);
        }
        let len = file_meta.len();
        let meta = self.read_metadata(key).await;

        let stream = async_stream::try_stream! {
            const CHUNK: usize = 1024 * 1024;
            let mut reader = tokio::io::BufReader::new(file);
            let mut buf = vec![0u8; CHUNK];
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Some(GetResult {
            content_length: len,
            content_type: meta.content_type,
            etag: meta.etag,
            body: Box::pin(stream),
        }))
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        reject_dot_segments(src)?;
        reject_dot_segments(dst)?;
        let src_path = self.object_path(src);
        let dst_path = self.object_path(dst);
        if let Some(parent) = dst_path.parent() {
            fs::create_dir_all(parent).await.context("create parent")?;
        }
        fs::copy(&src_path, &dst_path)
            .await
            .with_context(|| format!("copy {src} to {dst}"))?;

        let meta = self.read_metadata(src).await;
        self.write_metadata(dst, &meta.content_type, &meta.etag)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        reject_dot_segments(key)?;
        match fs::remove_file(self.object_path(key)).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e).context("delete object"),
        }
        let _ = fs::remove_file(self.meta_path(key)).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        reject_dot_segments(key)?;
        // Directories are folder prefixes, not objects.
        Ok(fs::metadata(self.object_path(key))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false))
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        let base = self.root.join("objects");
        let mut results = Vec::new();
        if fs::metadata(&base).await.is_err() {
            return Ok(results);
        }

        let mut dirs = vec![base.clone()];
        while let Some(dir) = dirs.pop() {
            let mut entries = fs::read_dir(&dir).await.context("read dir")?;
            while let Some(entry) = entries.next_entry().await.context("read dir entry")? {
                let path = entry.path();
                if path.is_dir() {
                    dirs.push(path);
                    continue;
                }
                let key = match path.strip_prefix(&base) {
                    Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
                    Err(_) => continue,
                };
                // Temp files from in-flight puts are invisible.
                if entry.file_name().to_string_lossy().ends_with(".tmp") {
                    continue;
                }
                if !key.starts_with(prefix) {
                    continue;
                }
                let meta = entry.metadata().await.context("stat entry")?;
                results.push(ObjectInfo {
                    key,
                    size_bytes: meta.len(),
                    created_at: created_at_of(&meta),
                });
            }
        }
        results.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(results)
    }
}

fn created_at_of(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.created()
        .or_else(|_| meta.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::SystemTime::UNIX_EPOCH))
}
