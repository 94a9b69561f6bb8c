use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::UploadError;
use crate::models::{new_id, FileRef};
use crate::store::FileStore;

pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// MIME type for an accepted resume file, judged by extension.
pub fn resume_mime(path: &Path) -> Result<&'static str, UploadError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => Ok(MIME_PDF),
        "docx" => Ok(MIME_DOCX),
        _ => Err(UploadError::UnsupportedType(if ext.is_empty() {
            "(none)".to_string()
        } else {
            format!(".{}", ext)
        })),
    }
}

pub fn check_size(size: u64) -> Result<(), UploadError> {
    if size > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge {
            size,
            limit: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Validates type and size locally, then hands the bytes to `store`.
/// Rejected files never reach the store.
pub fn upload(store: &dyn FileStore, path: &Path) -> Result<FileRef> {
    let mime = resume_mime(path)?;
    let meta = fs::metadata(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    check_size(meta.len())?;

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid file name: {}", path.display()))?;
    let bytes = fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let file = store.put(name, mime, &bytes)?;
    info!(id = %file.id, name = %file.name, size = file.size, "resume uploaded");
    Ok(file)
}

// --- Local bucket ---

/// Files live under `<root>/<owner>/<id>` with a JSON sidecar holding the
/// `FileRef`.
pub struct LocalBucket {
    dir: PathBuf,
}

impl LocalBucket {
    pub fn new(root: &Path, owner_id: &str) -> Result<Self> {
        let dir = root.join(owner_id);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create storage directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        self.dir.join(id)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn read_meta(&self, id: &str) -> Result<FileRef> {
        let path = self.meta_path(id);
        let raw = fs::read_to_string(&path).with_context(|| format!("File {} not found", id))?;
        serde_json::from_str(&raw).with_context(|| format!("Corrupt metadata in {}", path.display()))
    }

    /// Resolves a full id or a unique id prefix.
    pub fn resolve_id(&self, prefix: &str) -> Result<String> {
        let files = self.list()?;
        if files.iter().any(|f| f.id == prefix) {
            return Ok(prefix.to_string());
        }
        let matches: Vec<_> = files.iter().filter(|f| f.id.starts_with(prefix)).collect();
        match matches.as_slice() {
            [file] => Ok(file.id.clone()),
            [] => Err(anyhow!("No file matches '{}'", prefix)),
            _ => Err(anyhow!("Id prefix '{}' is ambiguous", prefix)),
        }
    }
}

impl FileStore for LocalBucket {
    fn put(&self, name: &str, mime: &str, bytes: &[u8]) -> Result<FileRef> {
        let file = FileRef {
            id: new_id(),
            name: name.to_string(),
            mime: mime.to_string(),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };
        fs::write(self.blob_path(&file.id), bytes).context("Error uploading resume")?;
        fs::write(self.meta_path(&file.id), serde_json::to_string_pretty(&file)?)
            .context("Error uploading resume")?;
        Ok(file)
    }

    fn list(&self) -> Result<Vec<FileRef>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir).context("Error listing resumes")? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.read_meta(id) {
                Ok(file) => files.push(file),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable metadata"),
            }
        }
        files.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(files)
    }

    fn view_url(&self, id: &str) -> Result<String> {
        self.read_meta(id)?;
        let path = self.blob_path(id);
        let absolute = fs::canonicalize(&path)
            .with_context(|| format!("Error getting resume file view with ID {}", id))?;
        Ok(format!("file://{}", absolute.display()))
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.read_meta(id)?;
        fs::remove_file(self.blob_path(id))
            .with_context(|| format!("Error deleting resume with ID {}", id))?;
        fs::remove_file(self.meta_path(id))
            .with_context(|| format!("Error deleting resume with ID {}", id))?;
        Ok(())
    }
}
