// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Capture sources - cameras and camera stand-ins

mod directory;
mod http;
mod simulator;

pub use directory::DirectorySource;
pub(crate) use directory::is_image_file;
pub use http::HttpSnapshotSource;
pub use simulator::{SimulatedCamera, SimulatedScene};
#[cfg(test)]
pub(crate) use simulator::{draw_face, FacePattern};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use image::RgbImage;
use tracing::{debug, info};

use crate::config::{SourceConfig, SourceKind};
use crate::error::CaptureError;

/// A raster frame as delivered by a source
pub type Frame = RgbImage;

/// One video input
#[async_trait]
pub trait FrameSource: Send {
    /// Source index, the camera identity in logs
    fn index(&self) -> u32;

    /// Human-readable origin (device, directory, URL)
    fn describe(&self) -> String;

    fn is_open(&self) -> bool;

    async fn open(&mut self) -> Result<(), CaptureError>;

    /// `FrameReadFailure` keeps the handle; `SourceUnavailable` means the
    /// source dropped out and must be reopened.
    async fn read_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Must be safe to call more than once
    fn release(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    Closed,
    Open,
    Released,
}

/// Scoped camera handle owned by one pipeline. The underlying source is
/// released exactly once, either explicitly or when the stream is dropped
/// (including while unwinding from a panic in the loop).
pub struct CameraStream {
    source: Box<dyn FrameSource>,
    status: StreamStatus,
    last_read: Option<DateTime<Utc>>,
}

impl CameraStream {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            status: StreamStatus::Closed,
            last_read: None,
        }
    }

    pub fn index(&self) -> u32 {
        self.source.index()
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    pub fn status(&self) -> StreamStatus {
        self.status
    }

    pub fn last_read(&self) -> Option<DateTime<Utc>> {
        self.last_read
    }

    pub fn is_open(&self) -> bool {
        self.status == StreamStatus::Open && self.source.is_open()
    }

    pub async fn open(&mut self) -> Result<(), CaptureError> {
        if self.status == StreamStatus::Released {
            return Err(CaptureError::SourceUnavailable {
                index: self.index(),
                reason: "stream already released".into(),
            });
        }

        self.source.open().await?;
        self.status = StreamStatus::Open;
        info!("Camera {} opened ({})", self.index(), self.describe());
        Ok(())
    }

    pub async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        match self.source.read_frame().await {
            Ok(frame) => {
                self.last_read = Some(Utc::now());
                Ok(frame)
            }
            Err(e @ CaptureError::SourceUnavailable { .. }) => {
                if self.status == StreamStatus::Open {
                    self.status = StreamStatus::Closed;
                }
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub fn release(&mut self) {
        if self.status == StreamStatus::Released {
            return;
        }
        self.source.release();
        self.status = StreamStatus::Released;
        info!("Camera {} released", self.index());
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Build the configured source; demo mode swaps in a simulated camera
pub fn build_source(config: &SourceConfig, demo_mode: bool, fallback: SimulatedScene) -> Box<dyn FrameSource> {
    if demo_mode {
        let scene = match &config.kind {
            SourceKind::Simulated { scene } => *scene,
            _ => fallback,
        };
        debug!("Demo mode: camera {} simulated as {:?}", config.index, scene);
        return Box::new(SimulatedCamera::new(config.index, scene));
    }

    match &config.kind {
        SourceKind::Simulated { scene } => Box::new(SimulatedCamera::new(config.index, *scene)),
        SourceKind::Directory { path } => Box::new(DirectorySource::new(config.index, path.clone())),
        SourceKind::HttpSnapshot { url, timeout_ms } => Box::new(HttpSnapshotSource::new(
            config.index,
            url.clone(),
            std::time::Duration::from_millis(*timeout_ms),
        )),
    }
}

/// Decode an encoded still (JPEG, PNG) into an RGB frame
pub fn decode_frame(bytes: &[u8]) -> image::ImageResult<Frame> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted source for loop tests
    pub struct ScriptedSource {
        pub index: u32,
        pub open_results: VecDeque<bool>,
        pub frames: VecDeque<Result<Frame, CaptureError>>,
        pub open: bool,
        pub releases: Arc<AtomicUsize>,
        pub open_attempts: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        pub fn new(index: u32) -> Self {
            Self {
                index,
                open_results: VecDeque::new(),
                frames: VecDeque::new(),
                open: false,
                releases: Arc::new(AtomicUsize::new(0)),
                open_attempts: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        fn index(&self) -> u32 {
            self.index
        }

        fn describe(&self) -> String {
            "scripted".into()
        }

        fn is_open(&self) -> bool {
            self.open
        }

        async fn open(&mut self) -> Result<(), CaptureError> {
            self.open_attempts.fetch_add(1, Ordering::SeqCst);
            if self.open_results.pop_front().unwrap_or(true) {
                self.open = true;
                Ok(())
            } else {
                Err(CaptureError::SourceUnavailable {
                    index: self.index,
                    reason: "scripted failure".into(),
                })
            }
        }

        async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
            match self.frames.pop_front() {
                Some(result) => result,
                None => {
                    // Park until the test shuts the loop down
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    Err(CaptureError::FrameReadFailure {
                        index: self.index,
                        reason: "script exhausted".into(),
                    })
                }
            }
        }

        fn release(&mut self) {
            self.open = false;
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedSource;
    use super::*;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_release_is_idempotent_and_runs_on_drop() {
        let source = ScriptedSource::new(3);
        let releases = source.releases.clone();

        let mut stream = CameraStream::new(Box::new(source));
        stream.open().await.unwrap();
        stream.release();
        stream.release();
        drop(stream);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_drop_without_open_releases_once() {
        let source = ScriptedSource::new(0);
        let releases = source.releases.clone();
        drop(CameraStream::new(Box::new(source)));
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_released_stream_cannot_reopen() {
        let mut stream = CameraStream::new(Box::new(ScriptedSource::new(0)));
        stream.release();
        assert!(matches!(
            stream.open().await,
            Err(CaptureError::SourceUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_read_records_timestamp_and_unavailable_closes() {
        let mut source = ScriptedSource::new(1);
        source.frames.push_back(Ok(Frame::new(4, 4)));
        source.frames.push_back(Err(CaptureError::SourceUnavailable {
            index: 1,
            reason: "unplugged".into(),
        }));

        let mut stream = CameraStream::new(Box::new(source));
        stream.open().await.unwrap();
        assert!(stream.last_read().is_none());

        stream.read_frame().await.unwrap();
        assert!(stream.last_read().is_some());

        assert!(stream.read_frame().await.is_err());
        assert_eq!(stream.status(), StreamStatus::Closed);
        assert!(!stream.is_open());
    }

    #[test]
    fn test_demo_mode_simulates_every_source() {
        let config = SourceConfig {
            enabled: true,
            index: 4,
            kind: SourceKind::Directory {
                path: "/nonexistent".into(),
            },
        };
        let source = build_source(&config, true, SimulatedScene::FrontDoor);
        assert_eq!(source.index(), 4);
        assert!(source.describe().contains("simulated"));
    }
}
