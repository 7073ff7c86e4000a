use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fapilog_core::error::{ErrorContext, FapilogError};
use fapilog_core::uri::ParsedUri;
use fapilog_core::Event;
use tokio::sync::Mutex;

use crate::sink::{BoxFuture, Sink};

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_BACKUP_COUNT: u32 = 5;

#[derive(Debug)]
struct FileState {
    file: File,
    size: u64,
}

/// Appends serialized events to a file, rotating when it exceeds
/// `max_bytes` (§4.5): the current file moves to `path.1`, older backups
/// shift up to `backup_count`, and a fresh file opens. Writes are
/// serialized per sink via a `tokio::sync::Mutex` guarding the open handle
/// (§5).
#[derive(Debug)]
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: u64,
    backup_count: u32,
    state: Mutex<FileState>,
}

impl RotatingFileSink {
    pub fn new(path: impl Into<PathBuf>, max_bytes: u64, backup_count: u32) -> Result<Self, FapilogError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = open_append(&path)?;
        let size = file.metadata()?.len();
        Ok(RotatingFileSink {
            path,
            max_bytes,
            backup_count,
            state: Mutex::new(FileState { file, size }),
        })
    }

    pub fn from_uri(uri: &ParsedUri) -> Result<Self, FapilogError> {
        let path = uri.path.as_deref().ok_or_else(|| FapilogError::Configuration {
            context: ErrorContext::new("sink_registry", "file_sink_from_uri"),
            constraint: "file:// URI must carry an absolute path".to_string(),
        })?;
        let max_bytes = uri
            .get_i64("max_bytes")
            .map(|v| v.max(0) as u64)
            .unwrap_or(DEFAULT_MAX_BYTES);
        let backup_count = uri
            .get_i64("backup_count")
            .map(|v| v.max(0) as u32)
            .unwrap_or(DEFAULT_BACKUP_COUNT);
        RotatingFileSink::new(path, max_bytes, backup_count)
    }

    fn backup_path(&self, index: u32) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    fn rotate(&self, state: &mut FileState) -> Result<(), FapilogError> {
        if self.backup_count == 0 {
            state.file = open_truncated(&self.path)?;
            state.size = 0;
            return Ok(());
        }
        for i in (1..self.backup_count).rev() {
            let src = self.backup_path(i);
            if src.exists() {
                let dst = self.backup_path(i + 1);
                std::fs::rename(&src, &dst)?;
            }
        }
        if self.path.exists() {
            std::fs::rename(&self.path, self.backup_path(1))?;
        }
        state.file = open_append(&self.path)?;
        state.size = 0;
        tracing::debug!(path = %self.path.display(), backup_count = self.backup_count, "rotated log file");
        Ok(())
    }

    async fn write_line(&self, line: &str) -> Result<(), FapilogError> {
        let mut state = self.state.lock().await;
        state.file.write_all(line.as_bytes())?;
        state.size += line.len() as u64;
        if state.size > self.max_bytes {
            self.rotate(&mut state)?;
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn open_truncated(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).write(true).truncate(true).open(path)
}

impl Sink for RotatingFileSink {
    fn write(&self, event: &Event) -> BoxFuture<'_, Result<(), FapilogError>> {
        let line = format!("{}\n", event.to_json_line());
        Box::pin(async move { self.write_line(&line).await })
    }

    fn write_batch<'a>(&'a self, events: &'a [Event]) -> BoxFuture<'a, Result<(), FapilogError>> {
        Box::pin(async move {
            for event in events {
                let line = format!("{}\n", event.to_json_line());
                self.write_line(&line).await?;
            }
            let mut state = self.state.lock().await;
            state.file.flush()?;
            Ok(())
        })
    }
}
