use motion_watch_common::frame::Frame;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::{now_ms, CaptureError, CaptureSource};

const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// Still images from a directory, played back in file-name order.
pub struct DirectorySource {
    dir: PathBuf,
    queue: Option<VecDeque<PathBuf>>,
    seq: u64,
}

impl DirectorySource {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            queue: None,
            seq: 0,
        }
    }

    async fn scan(&self) -> Result<VecDeque<PathBuf>, CaptureError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_image = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image && entry.file_type().await?.is_file() {
                files.push(path);
            }
        }
        files.sort();
        info!(
            dir = self.dir.display().to_string(),
            files = files.len(),
            "image directory scanned"
        );
        Ok(files.into())
    }
}

impl CaptureSource for DirectorySource {
    async fn next_frame(&mut self) -> Result<Frame, CaptureError> {
        if self.queue.is_none() {
            self.queue = Some(self.scan().await?);
        }
        let Some(path) = self.queue.as_mut().and_then(|q| q.pop_front()) else {
            debug!(frames = self.seq, "image directory exhausted");
            return Err(CaptureError::EndOfStream);
        };

        let encoded = tokio::fs::read(&path).await?;
        let seq = self.seq;
        self.seq += 1;
        let frame = Frame::decode(&encoded, now_ms(), seq)?;
        debug!(path = path.display().to_string(), seq, "frame loaded");
        Ok(frame)
    }

    async fn release(&mut self) {
        self.queue = Some(VecDeque::new());
    }
}
