// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! HTTP snapshot camera (ESP32-CAM style `/capture` endpoints)

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{decode_frame, Frame, FrameSource};
use crate::error::CaptureError;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

pub struct HttpSnapshotSource {
    index: u32,
    url: String,
    timeout: Duration,
    max_bytes: usize,
    client: Option<reqwest::Client>,
}

impl HttpSnapshotSource {
    pub fn new(index: u32, url: String, timeout: Duration) -> Self {
        Self {
            index,
            url,
            timeout,
            max_bytes: MAX_JPEG_BYTES,
            client: None,
        }
    }

    /// Largest snapshot accepted, in bytes
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Body is read chunk by chunk and abandoned once it passes `max_bytes`
    async fn fetch(client: &reqwest::Client, url: &str, max_bytes: usize) -> Result<Vec<u8>, String> {
        let mut response = client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;

        if let Some(len) = response.content_length() {
            if len > max_bytes as u64 {
                return Err(format!("snapshot of {} bytes exceeds limit of {}", len, max_bytes));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
            if body.len() + chunk.len() > max_bytes {
                return Err(format!("snapshot exceeds limit of {} bytes", max_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl FrameSource for HttpSnapshotSource {
    fn index(&self) -> u32 {
        self.index
    }

    fn describe(&self) -> String {
        format!("http snapshot {}", self.url)
    }

    fn is_open(&self) -> bool {
        self.client.is_some()
    }

    async fn open(&mut self) -> Result<(), CaptureError> {
        let unavailable = |reason: String| CaptureError::SourceUnavailable {
            index: self.index,
            reason,
        };

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| unavailable(e.to_string()))?;

        // Probe once so a dead camera is reported as unavailable
        Self::fetch(&client, &self.url, self.max_bytes).await.map_err(unavailable)?;
        debug!("Snapshot camera {} answered at {}", self.index, self.url);

        self.client = Some(client);
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        let client = self.client.as_ref().ok_or_else(|| CaptureError::SourceUnavailable {
            index: self.index,
            reason: "snapshot camera not opened".into(),
        })?;

        let bytes = Self::fetch(client, &self.url, self.max_bytes)
            .await
            .map_err(|reason| CaptureError::FrameReadFailure {
                index: self.index,
                reason,
            })?;

        decode_frame(&bytes).map_err(|e| CaptureError::FrameReadFailure {
            index: self.index,
            reason: e.to_string(),
        })
    }

    fn release(&mut self) {
        self.client = None;
    }
}
