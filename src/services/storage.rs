//! Disk-backed storage buckets.
//!
//! The service writes to two independent targets: an access-controlled
//! "downloads" bucket holding whole archives and a public "previews" bucket
//! holding per-font files. Both are plain directories; a `LocalBucket` turns
//! keys like `aurora/previews/Aurora-Bold.otf` into nested paths beneath its
//! root. Writes are durable: temp file, fsync, atomic rename, with upsert
//! semantics (same key overwrites).

use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Metadata of one stored object.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: i64,
    pub etag: String,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// A single storage target rooted at a directory on disk.
///
/// Cheap to clone; concurrent writers to distinct keys never contend on
/// in-process state.
#[derive(Clone, Debug)]
pub struct LocalBucket {
    root: PathBuf,
}

impl LocalBucket {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    ///
    /// Rejects empty and oversized keys, keys that begin with `/` or contain
    /// `..`, and keys with control bytes or backslashes.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey(key.to_string()));
        }
        if key.starts_with('/') || key.contains("..") {
            return Err(StorageError::InvalidObjectKey(key.to_string()));
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidObjectKey(key.to_string()));
        }
        Ok(())
    }

    /// Physical path of a key beneath the bucket root. Parent directories
    /// may not exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            path.push(segment);
        }
        path
    }

    /// Stream-write an object to disk.
    ///
    /// - Writes bytes incrementally to a temporary file.
    /// - Computes MD5/etag and size while streaming.
    /// - Atomically renames into the final location (upsert: an existing
    ///   object under the same key is replaced).
    ///
    /// Ensures durable writes (fsync). The temp file is removed whenever the
    /// write does not reach the rename, including when the future is
    /// cancelled mid-flight.
    pub async fn put_stream<S>(&self, key: &str, stream: S) -> StorageResult<StoredObject>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut tmp_guard = TmpFileGuard {
            path: Some(tmp_path.clone()),
        };
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = chunk_res?;
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                return Err(StorageError::Io(err));
            }
        }
        tmp_guard.disarm();

        Ok(StoredObject {
            key: key.to_string(),
            size_bytes,
            etag: format!("{:x}", digest.compute()),
        })
    }

    /// Write an in-memory buffer under `key`.
    pub async fn put_bytes(&self, key: &str, bytes: Bytes) -> StorageResult<StoredObject> {
        self.put_stream(key, futures::stream::iter([Ok(bytes)]))
            .await
    }

    /// Open an object for reading.
    ///
    /// Returns an opened File handle plus its size, ready for streaming out.
    pub async fn open_reader(&self, key: &str) -> StorageResult<(File, i64)> {
        self.ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound(key.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;
        let size = file.metadata().await?.len() as i64;
        Ok((file, size))
    }

    /// Remove an object and prune any directories it leaves empty.
    ///
    /// Idempotent: deleting a missing key succeeds, so failure cleanup can
    /// run against keys whose upload never finished.
    pub async fn delete(&self, key: &str) -> StorageResult<()> {
        self.ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed object {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("object {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    /// Recursively remove empty directories up to the bucket root.
    ///
    /// Stops on the first non-empty or missing directory.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.root) && current != self.root {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Removes the temp file on drop unless the write completed. Covers error
/// returns and cancellation of the surrounding future alike.
struct TmpFileGuard {
    path: Option<PathBuf>,
}

impl TmpFileGuard {
    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for TmpFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
