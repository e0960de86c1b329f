//! Disk storage for uploaded audio files.
//!
//! Files are written under the configured upload directory with a generated
//! name (`<uuid>` plus a vetted extension). The client-supplied name is only
//! echoed back in the descriptor and never touches the filesystem path.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::http::StatusCode;
use serde::Serialize;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

/// Longest extension kept from a client file name.
const MAX_EXTENSION_LEN: usize = 8;

/// Upload failures. All of them are reported to the client as 500.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Invalid upload request: {0}")]
    Rejected(#[from] MultipartRejection),

    #[error("Unexpected field {0:?}")]
    UnexpectedField(String),

    #[error("Malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),

    #[error("Failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Machine-readable code used in error responses.
    pub fn code(&self) -> &'static str {
        match self {
            UploadError::Rejected(_) => "INVALID_REQUEST",
            UploadError::UnexpectedField(_) => "LIMIT_UNEXPECTED_FILE",
            UploadError::Multipart(e) if e.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                "LIMIT_FILE_SIZE"
            }
            UploadError::Multipart(_) => "MULTIPART",
            UploadError::Io(_) => "IO",
        }
    }

    /// Form field the error relates to, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            UploadError::UnexpectedField(name) => Some(name),
            _ => None,
        }
    }
}

/// Descriptor of a stored upload, returned to the client.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredFile {
    /// Identifier to pass on later requests
    pub id: String,
    pub fieldname: String,
    pub originalname: String,
    pub mimetype: String,
    pub destination: String,
    pub filename: String,
    pub path: String,
    pub size: u64,
}

/// Upload directory handle.
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create the upload directory if it does not exist.
    pub async fn ensure_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.dir).await
    }

    /// Open a new file for an upload named `original_name` by the client.
    pub async fn begin(&self, original_name: &str) -> Result<PendingUpload, UploadError> {
        let id = Uuid::new_v4().to_string();
        let filename = match safe_extension(original_name) {
            Some(ext) => format!("{id}.{ext}"),
            None => id.clone(),
        };
        let path = self.dir.join(&filename);

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        info!(
            upload_id = %id,
            original_name = %original_name,
            path = %path.display(),
            "upload_started"
        );

        Ok(PendingUpload {
            file,
            id,
            filename,
            path,
            destination: self.dir.display().to_string(),
            original_name: original_name.to_string(),
            size: 0,
        })
    }
}

/// File being written. Partial files are left in place if the upload fails.
pub struct PendingUpload {
    file: File,
    id: String,
    filename: String,
    path: PathBuf,
    destination: String,
    original_name: String,
    size: u64,
}

impl PendingUpload {
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), UploadError> {
        self.file.write_all(chunk).await?;
        self.size += chunk.len() as u64;
        Ok(())
    }

    /// Flush to disk and build the descriptor.
    pub async fn finish(mut self, fieldname: &str, mimetype: &str) -> Result<StoredFile, UploadError> {
        self.file.flush().await?;
        self.file.sync_all().await?;

        info!(
            upload_id = %self.id,
            size = self.size,
            "upload_stored"
        );

        Ok(StoredFile {
            id: self.id,
            fieldname: fieldname.to_string(),
            originalname: self.original_name,
            mimetype: mimetype.to_string(),
            destination: self.destination,
            filename: self.filename,
            path: self.path.display().to_string(),
            size: self.size,
        })
    }
}

/// Extension of the client file name, if short and plain ASCII alphanumeric.
fn safe_extension(original_name: &str) -> Option<String> {
    let base = original_name.rsplit(['/', '\\']).next()?;
    let (stem, ext) = base.rsplit_once('.')?;

    if stem.is_empty() || ext.is_empty() || ext.len() > MAX_EXTENSION_LEN {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> UploadStore {
        UploadStore::new(std::env::temp_dir().join(format!("soai-upload-{}", Uuid::new_v4())))
    }

    #[test]
    fn test_safe_extension() {
        assert_eq!(safe_extension("song.mp3"), Some("mp3".to_string()));
        assert_eq!(safe_extension("Song.Final.WAV"), Some("wav".to_string()));
        assert_eq!(safe_extension("../../etc/passwd"), None);
        assert_eq!(safe_extension("..\\..\\boot.ini"), Some("ini".to_string()));
        assert_eq!(safe_extension(".bashrc"), None);
        assert_eq!(safe_extension("noext"), None);
        assert_eq!(safe_extension("x.mp3/"), None);
        assert_eq!(safe_extension("a.verylongextension"), None);
        assert_eq!(safe_extension("a.m p3"), None);
    }

    #[tokio::test]
    async fn test_store_writes_under_generated_name() {
        let store = temp_store();
        store.ensure_dir().await.unwrap();

        let mut pending = store.begin("../../escape.mp3").await.unwrap();
        pending.write_chunk(b"ID3").await.unwrap();
        pending.write_chunk(b"data").await.unwrap();
        let stored = pending.finish("file", "audio/mpeg").await.unwrap();

        assert_eq!(stored.size, 7);
        assert_eq!(stored.originalname, "../../escape.mp3");
        assert_eq!(stored.filename, format!("{}.mp3", stored.id));
        assert!(!stored.filename.contains('/'));

        let on_disk = Path::new(&stored.path);
        assert_eq!(on_disk.parent(), Some(store.dir()));
        assert_eq!(fs::read(on_disk).await.unwrap(), b"ID3data");

        fs::remove_dir_all(store.dir()).await.unwrap();
    }

    #[tokio::test]
    async fn test_begin_fails_without_directory() {
        let store = temp_store();
        let err = store.begin("song.mp3").await.err().unwrap();
        assert!(matches!(err, UploadError::Io(_)));
        assert_eq!(err.code(), "IO");
    }

    #[test]
    fn test_error_codes() {
        let err = UploadError::UnexpectedField("avatar".to_string());
        assert_eq!(err.code(), "LIMIT_UNEXPECTED_FILE");
        assert_eq!(err.field(), Some("avatar"));
        assert_eq!(UploadError::Io(std::io::ErrorKind::NotFound.into()).field(), None);
    }
}
