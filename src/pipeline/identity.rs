// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Identity pipeline frame processing

use chrono::{DateTime, Duration, Utc};
use image::imageops;
use std::sync::Arc;
use tracing::{error, info};

use super::FrameProcessor;
use crate::alerting::DedupWindow;
use crate::capture::Frame;
use crate::core::{ActivityEvent, Notification, NotificationDispatcher};
use crate::inference::{draw_face_box, FaceObservation, IdentityAdapter};
use crate::streaming::FrameEncoder;

/// Face detections through the dedup window
pub struct IdentityProcessor {
    adapter: Arc<dyn IdentityAdapter>,
    window: DedupWindow,
    dispatcher: Arc<NotificationDispatcher>,
    encoder: FrameEncoder,
}

impl IdentityProcessor {
    pub fn new(
        adapter: Arc<dyn IdentityAdapter>,
        window: Duration,
        dispatcher: Arc<NotificationDispatcher>,
        encoder: FrameEncoder,
    ) -> Self {
        Self {
            adapter,
            window: DedupWindow::new(window),
            dispatcher,
            encoder,
        }
    }

    fn announce(&self, frame: &Frame, face: &FaceObservation) {
        let bbox = &face.bbox;
        let crop = imageops::crop_imm(frame, bbox.x, bbox.y, bbox.width, bbox.height).to_image();

        let image_url = match self.encoder.encode_data_uri(&crop) {
            Ok(uri) => Some(uri),
            Err(e) => {
                error!("Face crop for {} not attached: {}", face.name, e);
                None
            }
        };

        info!("New sighting at the front door: {}", face.name);
        self.dispatcher.publish(Notification::ActivityAlert(ActivityEvent::face(
            &face.name,
            face.is_known(),
            image_url,
        )));
    }
}

impl FrameProcessor for IdentityProcessor {
    fn name(&self) -> &'static str {
        "face-identity"
    }

    fn process(&mut self, mut frame: Frame, now: DateTime<Utc>) -> Frame {
        self.window.begin_frame(now);

        let faces = self.adapter.detect(&frame);
        for face in &faces {
            if self.window.admit(&face.name, now) {
                self.announce(&frame, face);
            }
        }

        for face in &faces {
            draw_face_box(&mut frame, &face.bbox, face.is_known());
        }
        frame
    }
}
