// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Process wiring: sources, adapters, pipelines and transports
//!
//! A failed inference adapter only downgrades its pipeline to raw video.
//! Startup fails only when no enabled camera can be opened at all.

use anyhow::{bail, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::{Clock, NotificationDispatcher, SystemClock};
use crate::capture::{build_source, CameraStream, SimulatedScene};
use crate::config::{Config, SourceConfig};
use crate::enrollment::EnrollmentService;
use crate::inference::{ColorHazardDetector, FaceRecognizer, IdentityAdapter, SkinToneEncoder};
use crate::pipeline::{
    Acknowledgement, FrameProcessor, HazardProcessor, IdentityProcessor, Passthrough, Pipeline, PipelineReport,
};
use crate::streaming::{EventServer, FrameEncoder, FrameFeed, MqttMirror, ViewerServer};

/// Viewer path of the hazard camera
pub const HAZARD_FEED_PATH: &str = "/fire_video_feed";

/// Viewer path of the front-door camera
pub const IDENTITY_FEED_PATH: &str = "/cctv_video_feed";

/// Main HomeWatch engine
pub struct Engine {
    pub config: Arc<Config>,
    clock: Arc<dyn Clock>,
    dispatcher: Arc<NotificationDispatcher>,
    shutdown_tx: broadcast::Sender<()>,
    pipelines: Vec<JoinHandle<PipelineReport>>,
    tasks: Vec<JoinHandle<()>>,
    enrollment: Option<Arc<EnrollmentService>>,
    viewer_addr: Option<SocketAddr>,
    event_addr: Option<SocketAddr>,
    start_time: Option<Instant>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(4);

        Self {
            config: Arc::new(config),
            clock,
            dispatcher: Arc::new(NotificationDispatcher::default()),
            shutdown_tx,
            pipelines: Vec::new(),
            tasks: Vec::new(),
            enrollment: None,
            viewer_addr: None,
            event_addr: None,
            start_time: None,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        info!("Starting HomeWatch engine...");
        let config = self.config.clone();
        let encoder = FrameEncoder::new(config.streaming.jpeg_quality);

        let hazard_stream = probe("hazard", &config.hazard_camera, config.demo_mode, SimulatedScene::Kitchen).await;
        let identity_stream = probe(
            "identity",
            &config.identity_camera,
            config.demo_mode,
            SimulatedScene::FrontDoor,
        )
        .await;

        let streams: Vec<&(CameraStream, bool)> = hazard_stream.iter().chain(identity_stream.iter()).collect();
        if streams.is_empty() {
            bail!("no camera is enabled");
        }
        if !streams.iter().any(|(_, opened)| *opened) {
            bail!("no video source could be opened");
        }

        // Adapters
        let (hazard_processor, ack_tx) = self.hazard_processor();
        let (identity_processor, identity_adapter) = self.identity_processor(encoder).await;

        let enrollment = Arc::new(EnrollmentService::new(
            config.identity.images_dir.clone(),
            identity_adapter,
            encoder,
        ));
        self.enrollment = Some(enrollment.clone());

        // Transports
        let hazard_feed = FrameFeed::new(HAZARD_FEED_PATH, config.streaming.viewer_buffer);
        let identity_feed = FrameFeed::new(IDENTITY_FEED_PATH, config.streaming.viewer_buffer);

        if config.streaming.http_enabled {
            let mut server = ViewerServer::new(config.streaming.http_port);
            if hazard_stream.is_some() {
                server = server.route(HAZARD_FEED_PATH, hazard_feed.clone());
            }
            if identity_stream.is_some() {
                server = server.route(IDENTITY_FEED_PATH, identity_feed.clone());
            }
            self.viewer_addr = Some(server.start(self.shutdown_tx.subscribe()).await?);
        }

        if config.streaming.websocket_enabled {
            let mut server = EventServer::new(
                config.streaming.websocket_port,
                config.streaming.websocket_max_clients,
                self.dispatcher.clone(),
            )
            .with_enrollment(enrollment);
            if let Some(tx) = ack_tx {
                server = server.with_acknowledgements(tx);
            }
            self.event_addr = Some(server.start(self.shutdown_tx.subscribe()).await?);
        }

        if config.streaming.mqtt_enabled {
            let mirror = MqttMirror::new(&config.streaming);
            self.tasks
                .push(mirror.spawn(&self.dispatcher, self.shutdown_tx.subscribe()));
        }

        // Pipelines
        if let Some((stream, _)) = hazard_stream {
            self.spawn_pipeline("hazard", stream, hazard_processor, encoder, hazard_feed);
        }
        if let Some((stream, _)) = identity_stream {
            self.spawn_pipeline("identity", stream, identity_processor, encoder, identity_feed);
        }

        self.start_time = Some(Instant::now());
        info!("HomeWatch engine started with {} pipelines", self.pipelines.len());
        Ok(())
    }

    /// Signal shutdown and wait for every pipeline to release its camera
    pub async fn stop(&mut self) -> Result<Vec<PipelineReport>> {
        info!("Stopping HomeWatch engine...");
        let _ = self.shutdown_tx.send(());

        let mut reports = Vec::new();
        for handle in self.pipelines.drain(..) {
            match handle.await {
                Ok(report) => {
                    info!(
                        "Pipeline {}: {} frames, {} deadline misses, worst cycle {:?}",
                        report.name, report.frames, report.pacing.deadline_misses, report.pacing.worst_case
                    );
                    reports.push(report);
                }
                Err(e) => error!("Pipeline task failed: {}", e),
            }
        }

        for task in self.tasks.drain(..) {
            let _ = task.await;
        }

        info!("HomeWatch engine stopped");
        Ok(reports)
    }

    pub fn dispatcher(&self) -> Arc<NotificationDispatcher> {
        self.dispatcher.clone()
    }

    /// `None` before `start`
    pub fn enrollment(&self) -> Option<Arc<EnrollmentService>> {
        self.enrollment.clone()
    }

    pub fn viewer_addr(&self) -> Option<SocketAddr> {
        self.viewer_addr
    }

    pub fn event_addr(&self) -> Option<SocketAddr> {
        self.event_addr
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    fn hazard_processor(&self) -> (Box<dyn FrameProcessor>, Option<mpsc::UnboundedSender<Acknowledgement>>) {
        match ColorHazardDetector::new(&self.config.hazard) {
            Ok(detector) => {
                let (tx, rx) = mpsc::unbounded_channel();
                let processor = HazardProcessor::new(
                    Box::new(detector),
                    &self.config.hazard.policy,
                    self.dispatcher.clone(),
                    rx,
                );
                info!("Hazard detection ready ({:?})", self.config.hazard.policy);
                (Box::new(processor), Some(tx))
            }
            Err(e) => {
                error!("Hazard detector failed to start: {}", e);
                warn!("Hazard alerts disabled; {} streams raw video", HAZARD_FEED_PATH);
                (Box::new(Passthrough), None)
            }
        }
    }

    async fn identity_processor(
        &self,
        encoder: FrameEncoder,
    ) -> (Box<dyn FrameProcessor>, Option<Arc<dyn IdentityAdapter>>) {
        let identity = self.config.identity.clone();
        let loaded = tokio::task::spawn_blocking(move || {
            FaceRecognizer::load(Arc::new(SkinToneEncoder::default()), &identity)
        })
        .await;

        let recognizer = match loaded {
            Ok(Ok(recognizer)) => recognizer,
            Ok(Err(e)) => {
                error!("Face identification failed to start: {}", e);
                warn!(
                    "Visitor alerts and enrollment disabled; {} streams raw video",
                    IDENTITY_FEED_PATH
                );
                return (Box::new(Passthrough), None);
            }
            Err(e) => {
                error!("Face identification startup aborted: {}", e);
                return (Box::new(Passthrough), None);
            }
        };

        let adapter: Arc<dyn IdentityAdapter> = Arc::new(recognizer);
        let processor = IdentityProcessor::new(
            adapter.clone(),
            self.config.identity.window(),
            self.dispatcher.clone(),
            encoder,
        );
        (Box::new(processor), Some(adapter))
    }

    fn spawn_pipeline(
        &mut self,
        name: &str,
        stream: CameraStream,
        processor: Box<dyn FrameProcessor>,
        encoder: FrameEncoder,
        feed: FrameFeed,
    ) {
        let pipeline = Pipeline::new(
            name,
            stream,
            processor,
            encoder,
            feed,
            self.config.pacing.clone(),
            self.clock.clone(),
        );
        let shutdown = self.shutdown_tx.subscribe();
        self.pipelines.push(tokio::spawn(pipeline.run(shutdown)));
    }
}

/// Open an enabled camera once. A camera that fails here stays in play and
/// its pipeline keeps retrying.
async fn probe(
    name: &str,
    config: &SourceConfig,
    demo_mode: bool,
    fallback: SimulatedScene,
) -> Option<(CameraStream, bool)> {
    if !config.enabled {
        info!("{} camera disabled", name);
        return None;
    }

    let mut stream = CameraStream::new(build_source(config, demo_mode, fallback));
    let opened = match stream.open().await {
        Ok(()) => true,
        Err(e) => {
            warn!("{} camera not available at startup: {}", name, e);
            false
        }
    };
    Some((stream, opened))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceKind;
    use crate::core::Notification;
    use tempfile::TempDir;

    fn test_config(images: &TempDir) -> Config {
        let mut config = Config::default();
        config.identity.images_dir = images.path().join("images");
        config.streaming.http_port = 0;
        config.streaming.websocket_port = 0;
        config
    }

    #[tokio::test]
    async fn test_starts_and_stops_both_pipelines() {
        let tmp = TempDir::new().unwrap();
        let mut engine = Engine::new(test_config(&tmp));

        engine.start().await.unwrap();
        assert!(engine.viewer_addr().is_some());
        assert!(engine.event_addr().is_some());
        assert!(engine.enrollment().is_some());
        assert!(tmp.path().join("images").is_dir());

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let reports = engine.stop().await.unwrap();

        let mut names: Vec<_> = reports.iter().map(|r| r.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["hazard".to_string(), "identity".to_string()]);
    }

    #[tokio::test]
    async fn test_no_openable_source_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(&tmp);
        config.hazard_camera.kind = SourceKind::Directory {
            path: tmp.path().join("missing"),
        };
        config.identity_camera.enabled = false;

        let mut engine = Engine::new(config);
        assert!(engine.start().await.is_err());
    }

    #[tokio::test]
    async fn test_one_openable_source_is_enough() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(&tmp);
        config.hazard_camera.kind = SourceKind::Directory {
            path: tmp.path().join("missing"),
        };

        let mut engine = Engine::new(config);
        engine.start().await.unwrap();
        let reports = engine.stop().await.unwrap();
        assert_eq!(reports.len(), 2);

        let hazard = reports.iter().find(|r| r.name == "hazard").unwrap();
        assert_eq!(hazard.frames, 0);
    }

    async fn first_chunk(addr: SocketAddr, path: &str) -> Vec<u8> {
        let mut response = reqwest::get(format!("http://127.0.0.1:{}{}", addr.port(), path))
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), response.chunk())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        chunk.to_vec()
    }

    #[tokio::test]
    async fn test_bad_detector_settings_degrade_to_raw_video() {
        let tmp = TempDir::new().unwrap();
        let mut config = test_config(&tmp);
        config.hazard.fire_pixel_ratio = 0.0;
        config.identity.frame_resizing = 2.0;

        let mut engine = Engine::new(config);
        let mut events = engine.dispatcher().subscribe();
        engine.start().await.unwrap();

        let addr = engine.viewer_addr().unwrap();
        for path in [HAZARD_FEED_PATH, IDENTITY_FEED_PATH] {
            let chunk = first_chunk(addr, path).await;
            assert!(chunk.starts_with(b"--frame"));
        }

        let mut png = Vec::new();
        image::DynamicImage::ImageRgb8(crate::capture::Frame::new(16, 16))
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let enrollment = engine.enrollment().unwrap().enroll("Bob", &png).await.unwrap();
        assert!(enrollment.reload.is_none());
        assert!(tmp.path().join("images").join("Bob.jpg").is_file());

        engine.stop().await.unwrap();

        while let Ok(event) = events.try_recv() {
            match event.payload.as_ref() {
                Notification::HazardAlert(_) | Notification::HazardCleared(_) | Notification::ActivityAlert(_) => {
                    panic!("degraded pipeline published {:?}", event.payload)
                }
                Notification::AddPersonError { .. } => {}
            }
        }
    }
}
