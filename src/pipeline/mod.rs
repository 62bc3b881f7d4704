// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Capture and processing loops
//!
//! One [`Pipeline`] runs per camera: open with backoff, read, run the frame
//! through its [`FrameProcessor`], encode the annotated result for viewers,
//! then pace to the target rate. Failures stay inside the loop; only the
//! processor's notifications reach subscribers.

mod hazard;
mod identity;

pub use hazard::{Acknowledgement, HazardProcessor};
pub use identity::IdentityProcessor;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::capture::{CameraStream, Frame};
use crate::config::PacingConfig;
use crate::core::{Clock, FrameScheduler, PacingStats};
use crate::error::CaptureError;
use crate::streaming::{FrameEncoder, FrameFeed};

/// Per-frame work of one pipeline
pub trait FrameProcessor: Send {
    fn name(&self) -> &'static str;

    /// Inspect `frame`, publish whatever it warrants and return the
    /// annotated frame for viewers
    fn process(&mut self, frame: Frame, now: DateTime<Utc>) -> Frame;
}

/// Raw video only, used when the inference adapter failed to start
pub struct Passthrough;

impl FrameProcessor for Passthrough {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn process(&mut self, frame: Frame, _now: DateTime<Utc>) -> Frame {
        frame
    }
}

/// Loop counters reported at exit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub name: String,
    pub frames: u64,
    pub open_failures: u64,
    pub read_failures: u64,
    pub encode_failures: u64,
    pub pacing: PacingStats,
}

pub struct Pipeline {
    name: String,
    stream: CameraStream,
    processor: Box<dyn FrameProcessor>,
    encoder: FrameEncoder,
    feed: FrameFeed,
    pacing: PacingConfig,
    clock: Arc<dyn Clock>,
}

enum Step {
    Continue,
    Shutdown,
}

impl Pipeline {
    pub fn new(
        name: &str,
        stream: CameraStream,
        processor: Box<dyn FrameProcessor>,
        encoder: FrameEncoder,
        feed: FrameFeed,
        pacing: PacingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.to_string(),
            stream,
            processor,
            encoder,
            feed,
            pacing,
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run until `shutdown` fires; the camera is released on every exit path
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> PipelineReport {
        let mut scheduler = FrameScheduler::new(&self.pacing);
        let mut report = PipelineReport {
            name: self.name.clone(),
            frames: 0,
            open_failures: 0,
            read_failures: 0,
            encode_failures: 0,
            pacing: scheduler.stats(),
        };

        info!(
            "Pipeline {} starting on camera {} ({})",
            self.name,
            self.stream.index(),
            self.processor.name()
        );

        loop {
            if !self.stream.is_open() {
                if let Err(e) = self.stream.open().await {
                    report.open_failures += 1;
                    warn!(
                        "Pipeline {}: {}; retrying in {:?}",
                        self.name,
                        e,
                        self.pacing.open_backoff()
                    );
                    if let Step::Shutdown = pause(self.pacing.open_backoff(), &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            }

            scheduler.begin_cycle();

            let read = tokio::select! {
                read = tokio::time::timeout(self.pacing.read_timeout(), self.stream.read_frame()) => read,
                _ = shutdown.recv() => break,
            };

            let frame = match read {
                Ok(Ok(frame)) => frame,
                Ok(Err(e @ CaptureError::SourceUnavailable { .. })) => {
                    // The stream is closed now; the next pass reopens it
                    report.read_failures += 1;
                    warn!("Pipeline {}: {}", self.name, e);
                    continue;
                }
                Ok(Err(e)) => {
                    report.read_failures += 1;
                    warn!("Pipeline {}: {}", self.name, e);
                    if let Step::Shutdown = pause(self.pacing.read_backoff(), &mut shutdown).await {
                        break;
                    }
                    continue;
                }
                Err(_) => {
                    report.read_failures += 1;
                    warn!(
                        "Pipeline {}: camera {} stalled for {:?}",
                        self.name,
                        self.stream.index(),
                        self.pacing.read_timeout()
                    );
                    if let Step::Shutdown = pause(self.pacing.read_backoff(), &mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            let annotated = self.processor.process(frame, self.clock.now());
            report.frames += 1;

            match self.encoder.encode_chunk(&annotated) {
                Ok(chunk) => {
                    self.feed.publish(chunk);
                }
                Err(e) => {
                    report.encode_failures += 1;
                    error!("Pipeline {}: frame dropped from viewer stream: {}", self.name, e);
                }
            }

            tokio::select! {
                _ = scheduler.end_cycle() => {}
                _ = shutdown.recv() => break,
            }
        }

        self.stream.release();
        report.pacing = scheduler.stats();
        info!(
            "Pipeline {} stopped after {} frames ({} open failures, {} read failures)",
            self.name, report.frames, report.open_failures, report.read_failures
        );
        report
    }
}

/// Sleep for `duration` unless shutdown arrives first
async fn pause(duration: Duration, shutdown: &mut broadcast::Receiver<()>) -> Step {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Step::Continue,
        _ = shutdown.recv() => Step::Shutdown,
    }
}
