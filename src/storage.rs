//! # Temporary Audio Store
//!
//! Uploaded recordings are written to a scratch directory so the transcription
//! client can stream them to the provider. Each request gets its own file and
//! owns it through a [`ScratchAudio`] guard.
//!
//! ## Lifecycle:
//! 1. **store**: bytes are written to `<scratch_dir>/<pid>-<uuid>.<ext>`
//! 2. **read**: the transcription client loads the content back
//! 3. **release**: the file is deleted; a missing file is not an error
//!
//! If a guard is dropped without being released (a panic, or a cancelled request
//! future), `Drop` removes the file synchronously instead.

use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("could not prepare scratch directory {path}: {source}")]
    Directory { path: PathBuf, source: io::Error },
    #[error("could not write scratch audio: {0}")]
    Write(io::Error),
    #[error("could not read scratch audio: {0}")]
    Read(io::Error),
}

/// An upload as received from the multipart body, before it touches the disk.
#[derive(Debug, Clone)]
pub struct UploadedAudio {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub filename: Option<String>,
}

/// Creates scratch audio files inside one directory.
#[derive(Debug, Clone)]
pub struct AudioStore {
    dir: PathBuf,
    default_extension: String,
}

impl AudioStore {
    pub fn new(dir: impl Into<PathBuf>, default_extension: &str) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Directory {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            default_extension: default_extension.trim_start_matches('.').to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist an upload under a fresh, collision-free name.
    ///
    /// The file is opened with `create_new`, so an existing path can never be
    /// overwritten even if two names were to collide.
    pub async fn store(&self, audio: &UploadedAudio) -> Result<ScratchAudio, StorageError> {
        let extension = audio
            .content_type
            .as_deref()
            .and_then(extension_for_content_type)
            .unwrap_or(self.default_extension.as_str());

        let file_name = format!("{}-{}.{}", std::process::id(), Uuid::new_v4(), extension);
        let path = self.dir.join(file_name);

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(StorageError::Write)?;

        // From here on the guard owns the path, so a failed write still cleans up.
        let scratch = ScratchAudio {
            path,
            content_type: audio
                .content_type
                .clone()
                .unwrap_or_else(|| format!("audio/{}", extension)),
            released: false,
        };

        file.write_all(&audio.bytes).await.map_err(StorageError::Write)?;
        file.flush().await.map_err(StorageError::Write)?;

        debug!(
            path = %scratch.path().display(),
            size_bytes = audio.bytes.len(),
            "audio stored"
        );

        Ok(scratch)
    }
}

/// Map a declared MIME type (parameters allowed) to a file extension.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "audio/webm" | "video/webm" => Some("webm"),
        "audio/ogg" | "application/ogg" => Some("ogg"),
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" => Some("mp3"),
        "audio/mp4" | "audio/m4a" | "audio/x-m4a" => Some("m4a"),
        _ => None,
    }
}

/// Exclusive handle to one scratch audio file.
#[derive(Debug)]
pub struct ScratchAudio {
    path: PathBuf,
    content_type: String,
    released: bool,
}

impl ScratchAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string())
    }

    pub async fn read(&self) -> Result<Vec<u8>, StorageError> {
        tokio::fs::read(&self.path).await.map_err(StorageError::Read)
    }

    /// Delete the file. Never fails: a file that is already gone is fine, and any
    /// other error is logged and swallowed.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => debug!(path = %self.path().display(), "scratch audio released"),
            Err(err) => log_cleanup_error(self.path(), &err),
        }
    }
}

impl Drop for ScratchAudio {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path().display(), "scratch audio released on drop"),
            Err(err) => log_cleanup_error(self.path(), &err),
        }
    }
}

fn log_cleanup_error(path: &Path, err: &io::Error) {
    if err.kind() == io::ErrorKind::NotFound {
        debug!(path = %path.display(), "scratch audio already removed");
    } else {
        warn!(
            event = "scratch_cleanup_failed",
            path = %path.display(),
            error = %err,
            "could not remove scratch audio"
        );
    }
}
