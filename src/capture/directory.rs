// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Replays still images from a directory as a looping camera feed

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{decode_frame, Frame, FrameSource};
use crate::error::CaptureError;

pub struct DirectorySource {
    index: u32,
    path: PathBuf,
    files: Vec<PathBuf>,
    cursor: usize,
    open: bool,
}

impl DirectorySource {
    pub fn new(index: u32, path: PathBuf) -> Self {
        Self {
            index,
            path,
            files: Vec::new(),
            cursor: 0,
            open: false,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }
}

pub(crate) fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

#[async_trait]
impl FrameSource for DirectorySource {
    fn index(&self) -> u32 {
        self.index
    }

    fn describe(&self) -> String {
        format!("image directory {:?}", self.path)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<(), CaptureError> {
        let unavailable = |reason: String| CaptureError::SourceUnavailable {
            index: self.index,
            reason,
        };

        let mut entries = tokio::fs::read_dir(&self.path)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| unavailable(e.to_string()))?
        {
            let path = entry.path();
            if is_image_file(&path) {
                files.push(path);
            }
        }

        if files.is_empty() {
            return Err(unavailable("no image files".into()));
        }

        files.sort();
        self.files = files;
        self.cursor = 0;
        self.open = true;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.open || self.files.is_empty() {
            return Err(CaptureError::SourceUnavailable {
                index: self.index,
                reason: "directory source not opened".into(),
            });
        }

        let path = self.files[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.files.len();

        let read_failure = |reason: String| CaptureError::FrameReadFailure {
            index: self.index,
            reason: format!("{:?}: {}", path, reason),
        };

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Directory changed under us; rescan on next open
                self.open = false;
                return Err(CaptureError::SourceUnavailable {
                    index: self.index,
                    reason: format!("{:?} vanished", path),
                });
            }
            Err(e) => return Err(read_failure(e.to_string())),
        };

        decode_frame(&bytes).map_err(|e| read_failure(e.to_string()))
    }

    fn release(&mut self) {
        self.open = false;
        self.files.clear();
    }
}
