use crate::error::{BlueprintError, Result};
use bytes::Bytes;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const BLOB_EXTENSION: &str = "txt";
const STAGING_EXTENSION: &str = "tmp";

/// ShardedBlobStore keeps one file per (storage key, revision).
///
/// Every character of the storage key becomes one directory level, so a key
/// `9ov193uu` lands in `9/o/v/1/9/3/u/u/9ov193uu-{revision}.txt`. Keys are
/// case-folded before use.
pub struct ShardedBlobStore {
    base_path: PathBuf,
}

/// A blob file discovered while walking the tree.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub storage_key: String,
    pub revision: i64,
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Everything found under the store root.
#[derive(Debug, Default)]
pub struct BlobTreeListing {
    pub blobs: Vec<StoredBlob>,
    pub staging_files: Vec<PathBuf>,
    pub unrecognized: Vec<PathBuf>,
}

impl ShardedBlobStore {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &PathBuf {
        &self.base_path
    }

    /// Store the content of one revision, creating any missing shard
    /// directories. Returns the final path of the blob.
    pub fn write(&self, storage_key: &str, revision: i64, data: &[u8]) -> Result<PathBuf> {
        let blob_path = self.blob_path(storage_key, revision)?;
        let shard_dir = self.shard_dir(storage_key)?;
        fs::create_dir_all(&shard_dir)?;

        // Write to a staging file first, then rename into place
        let temp_path = blob_path.with_extension(STAGING_EXTENSION);
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &blob_path)?;

        tracing::debug!(
            "Stored blob {}@{} ({} bytes)",
            storage_key,
            revision,
            data.len()
        );
        Ok(blob_path)
    }

    pub fn read(&self, storage_key: &str, revision: i64) -> Result<Bytes> {
        let blob_path = self.blob_path(storage_key, revision)?;

        match fs::read(&blob_path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                Err(BlueprintError::BlobNotFound {
                    storage_key: storage_key.to_string(),
                    revision,
                })
            }
            Err(error) => Err(error.into()),
        }
    }

    pub fn exists(&self, storage_key: &str, revision: i64) -> Result<bool> {
        Ok(self.blob_path(storage_key, revision)?.is_file())
    }

    /// Delete one blob. Missing blobs are not an error; returns whether a file
    /// was removed.
    pub fn delete(&self, storage_key: &str, revision: i64) -> Result<bool> {
        let blob_path = self.blob_path(storage_key, revision)?;
        match fs::remove_file(&blob_path) {
            Ok(()) => {
                tracing::debug!("Deleted blob {}@{}", storage_key, revision);
                Ok(true)
            }
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(error) => Err(error.into()),
        }
    }

    /// Delete every blob stored under a key. Returns the number removed.
    pub fn delete_all(&self, storage_key: &str) -> Result<usize> {
        let shard_dir = self.shard_dir(storage_key)?;
        if !shard_dir.is_dir() {
            return Ok(0);
        }

        let prefix = format!("{}-", normalize_key(storage_key));
        let mut removed = 0usize;
        for entry in fs::read_dir(&shard_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if name.starts_with(&prefix) {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }

        tracing::debug!("Deleted {} blobs for {}", removed, storage_key);
        Ok(removed)
    }

    /// Remove the key's shard directory and any parents left empty, stopping
    /// at the store root. Non-empty directories are kept.
    pub fn prune(&self, storage_key: &str) -> Result<()> {
        let mut dir = self.shard_dir(storage_key)?;

        while dir != self.base_path && dir.starts_with(&self.base_path) {
            match fs::read_dir(&dir) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        break;
                    }
                }
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }

            match fs::remove_dir(&dir) {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => return Err(error.into()),
            }

            if !dir.pop() {
                break;
            }
        }

        Ok(())
    }

    /// True if the directory a key would occupy already exists. Catches
    /// directories orphaned by earlier partial failures.
    pub fn exists_prefix(&self, storage_key: &str) -> Result<bool> {
        Ok(self.shard_dir(storage_key)?.exists())
    }

    /// Walk the whole tree. Used by the orphan sweep.
    pub fn list_all(&self) -> Result<BlobTreeListing> {
        let mut listing = BlobTreeListing::default();
        walk(&self.base_path, &mut listing)?;
        Ok(listing)
    }

    pub(crate) fn blob_path(&self, storage_key: &str, revision: i64) -> Result<PathBuf> {
        if revision < 1 {
            return Err(BlueprintError::InvalidRequest(format!(
                "revision must be positive: {}",
                revision
            )));
        }

        let key = normalize_key(storage_key);
        Ok(self
            .shard_dir(&key)?
            .join(format!("{}-{}.{}", key, revision, BLOB_EXTENSION)))
    }

    fn shard_dir(&self, storage_key: &str) -> Result<PathBuf> {
        validate_key(storage_key)?;

        let mut dir = self.base_path.clone();
        for c in storage_key.chars() {
            dir.push(c.to_ascii_lowercase().to_string());
        }
        Ok(dir)
    }
}

fn normalize_key(storage_key: &str) -> String {
    storage_key.to_ascii_lowercase()
}

fn validate_key(storage_key: &str) -> Result<()> {
    if storage_key.is_empty() {
        return Err(BlueprintError::InvalidRequest(
            "storage key cannot be empty".to_string(),
        ));
    }

    if let Some(c) = storage_key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(BlueprintError::InvalidRequest(format!(
            "invalid character {:?} in storage key",
            c
        )));
    }

    Ok(())
}

/// Parse `{key}-{revision}.txt`. The key itself may contain `-`, so split on
/// the last one.
fn parse_blob_name(name: &str) -> Option<(String, i64)> {
    let stem = name.strip_suffix(&format!(".{}", BLOB_EXTENSION))?;
    let (key, revision) = stem.rsplit_once('-')?;
    if key.is_empty() {
        return None;
    }
    let revision: i64 = revision.parse().ok()?;
    if revision < 1 {
        return None;
    }
    Some((key.to_string(), revision))
}

fn walk(dir: &Path, listing: &mut BlobTreeListing) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            walk(&path, listing)?;
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        if path.extension().and_then(|ext| ext.to_str()) == Some(STAGING_EXTENSION) {
            listing.staging_files.push(path);
            continue;
        }

        let parsed = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_blob_name);

        match parsed {
            Some((storage_key, revision)) => {
                let modified = entry.metadata()?.modified()?;
                listing.blobs.push(StoredBlob {
                    storage_key,
                    revision,
                    path,
                    modified,
                });
            }
            None => listing.unrecognized.push(path),
        }
    }

    Ok(())
}
