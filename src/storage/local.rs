//! Filesystem-backed object storage.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{ObjectStorage, StorageError, StoredObject};

const CONTENT_TYPE_SUFFIX: &str = ".content-type";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Longest file name most filesystems accept, in bytes.
const MAX_FILE_NAME_BYTES: usize = 255;
/// Longest object segment stored verbatim; leaves room for the sidecar suffix.
const MAX_SEGMENT_BYTES: usize = MAX_FILE_NAME_BYTES - CONTENT_TYPE_SUFFIX.len();
/// Hex digits of the key digest appended to shortened segments.
const DIGEST_CHARS: usize = 16;
/// Extensions longer than this are not preserved when shortening.
const MAX_EXTENSION_BYTES: usize = 16;

/// Stores each object as a file under `root`, keys mapping to relative paths.
///
/// Path segments too long for the filesystem are shortened and suffixed
/// with a digest of the full segment. The content type and the full key are
/// kept next to the object in a small sidecar file.
pub struct LocalObjectStorage {
    root: PathBuf,
}

impl LocalObjectStorage {
    /// Create a storage rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `key` to a path inside the root, rejecting anything that could escape it.
    pub fn object_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(key
            .split('/')
            .fold(self.root.clone(), |path, segment| path.join(&*fit_segment(segment))))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError> {
        let path = self.object_path(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| StorageError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent).await?;

        // Write next to the destination, then rename over it
        let staged = tempfile::NamedTempFile::new_in(parent)?;
        fs::write(staged.path(), body).await?;
        staged
            .persist(&path)
            .map_err(|e| StorageError::Backend(format!("Failed to persist {}: {}", key, e.error)))?;

        fs::write(sidecar_path(&path), format!("{}\n{}\n", content_type, key)).await?;

        debug!("Stored {} ({} bytes, {})", key, body.len(), content_type);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError> {
        let path = self.object_path(key)?;
        let body = match fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let content_type = fs::read_to_string(sidecar_path(&path))
            .await
            .ok()
            .and_then(|s| s.lines().next().map(|line| line.trim().to_string()))
            .filter(|line| !line.is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        Ok(Some(StoredObject { body, content_type }))
    }

    fn locator(&self, key: &str) -> String {
        let path = self
            .object_path(key)
            .unwrap_or_else(|_| self.root.join(key));
        format!("file://{}", path.display())
    }
}

/// Maps one key segment to a file name that fits the filesystem limit.
fn fit_segment(segment: &str) -> Cow<'_, str> {
    if segment.len() <= MAX_SEGMENT_BYTES {
        return Cow::Borrowed(segment);
    }

    let digest = format!("{:x}", Sha256::digest(segment.as_bytes()));
    let extension = match segment.rfind('.') {
        Some(i) if segment.len() - i <= MAX_EXTENSION_BYTES => &segment[i..],
        _ => "",
    };

    let mut end = MAX_SEGMENT_BYTES - extension.len() - DIGEST_CHARS - 1;
    while !segment.is_char_boundary(end) {
        end -= 1;
    }

    Cow::Owned(format!(
        "{}~{}{}",
        &segment[..end],
        &digest[..DIGEST_CHARS],
        extension
    ))
}

fn sidecar_path(path: &Path) -> PathBuf {
    let mut sidecar = path.as_os_str().to_owned();
    sidecar.push(CONTENT_TYPE_SUFFIX);
    PathBuf::from(sidecar)
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = || StorageError::InvalidKey(key.to_string());

    if key.is_empty()
        || key.contains('\\')
        || key.contains('\0')
        || key.ends_with('/')
        || key.ends_with(CONTENT_TYPE_SUFFIX)
    {
        return Err(invalid());
    }

    let all_normal = Path::new(key)
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if !all_normal {
        return Err(invalid());
    }

    Ok(())
}
