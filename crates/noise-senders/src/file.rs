//! Rotating file sender
//!
//! Appends and flushes one line per event. When the next line would push the file past
//! its size limit the file is rotated `path -> path.1 -> ... -> path.N` and a
//! fresh file is opened.

use async_trait::async_trait;
use noise_core::{Event, SendError, Sender};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const BYTES_PER_MB: u64 = 1024 * 1024;

struct FileState {
    writer: Option<BufWriter<File>>,
    /// Bytes in the current file
    written: u64,
}

pub struct FileSender {
    path: PathBuf,
    max_bytes: u64,
    max_backups: u32,
    state: Mutex<FileState>,
}

impl FileSender {
    pub async fn open(path: &Path, max_size_mb: u64, max_backups: u32) -> Result<Self, SendError> {
        Self::with_max_bytes(path, max_size_mb.saturating_mul(BYTES_PER_MB), max_backups).await
    }

    pub async fn with_max_bytes(
        path: &Path,
        max_bytes: u64,
        max_backups: u32,
    ) -> Result<Self, SendError> {
        if path.as_os_str().is_empty() {
            return Err(SendError::InvalidConfig("file path is empty".to_string()));
        }
        if max_bytes == 0 {
            return Err(SendError::InvalidConfig("max file size must be positive".to_string()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (writer, written) = open_append(path).await?;
        debug!(path = %path.display(), written = written, "File sender opened");
        Ok(Self {
            path: path.to_path_buf(),
            max_bytes,
            max_backups,
            state: Mutex::new(FileState {
                writer: Some(writer),
                written,
            }),
        })
    }

    /// Shift backups and reopen `path`.
    ///
    /// The current writer is replaced only once the fresh file is open, so a
    /// failed rotation leaves the sender appending to the file it already has.
    async fn rotate(&self, state: &mut FileState) -> Result<(), SendError> {
        if let Some(writer) = state.writer.as_mut() {
            writer.flush().await?;
        }

        if self.max_backups == 0 {
            remove_if_exists(&self.path).await?;
        } else {
            remove_if_exists(&backup_path(&self.path, self.max_backups)).await?;
            for n in (1..self.max_backups).rev() {
                rename_if_exists(&backup_path(&self.path, n), &backup_path(&self.path, n + 1)).await?;
            }
            rename_if_exists(&self.path, &backup_path(&self.path, 1)).await?;
        }

        let (writer, written) = open_append(&self.path).await?;
        state.writer = Some(writer);
        state.written = written;
        info!(path = %self.path.display(), backups = self.max_backups, "Rotated output file");
        Ok(())
    }
}

#[async_trait]
impl Sender for FileSender {
    async fn send(&self, event: &Event) -> Result<(), SendError> {
        let mut line = event.raw.replace('\n', " ");
        line.push('\n');
        let len = line.len() as u64;

        let mut state = self.state.lock().await;
        if state.writer.is_none() {
            return Err(SendError::Closed);
        }
        if state.written > 0 && state.written + len > self.max_bytes {
            // Retried on the next send; until then the current file keeps growing
            if let Err(e) = self.rotate(&mut state).await {
                warn!(path = %self.path.display(), error = %e, "File rotation failed");
            }
        }

        let writer = state.writer.as_mut().ok_or(SendError::Closed)?;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
        state.written += len;
        Ok(())
    }

    async fn test(&self) -> Result<(), SendError> {
        let mut state = self.state.lock().await;
        let writer = state.writer.as_mut().ok_or(SendError::Closed)?;
        writer.flush().await?;
        let metadata = tokio::fs::metadata(&self.path).await?;
        if metadata.permissions().readonly() {
            return Err(SendError::Io(std::io::Error::new(
                ErrorKind::PermissionDenied,
                format!("{} is read-only", self.path.display()),
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), SendError> {
        let mut state = self.state.lock().await;
        if let Some(mut writer) = state.writer.take() {
            writer.flush().await?;
            writer.into_inner().sync_all().await?;
        }
        Ok(())
    }
}

/// `path.n`, keeping the original extension in place
pub fn backup_path(path: &Path, n: u32) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

async fn open_append(path: &Path) -> Result<(BufWriter<File>, u64), SendError> {
    let file = OpenOptions::new().create(true).append(true).open(path).await?;
    let written = file.metadata().await?.len();
    Ok((BufWriter::new(file), written))
}

async fn remove_if_exists(path: &Path) -> Result<(), SendError> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

async fn rename_if_exists(from: &Path, to: &Path) -> Result<(), SendError> {
    match tokio::fs::rename(from, to).await {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}
