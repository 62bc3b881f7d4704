// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Inference adapters - hazard classification and face identification
//!
//! Adapters own no history. Debouncing and deduplication live in
//! [`crate::alerting`].

mod annotate;
mod face;
mod hazard;
mod identity;

pub use annotate::{draw_face_box, outline, KNOWN_COLOR, UNKNOWN_COLOR};
pub use face::{FaceEncoder, FaceEncoding, SkinToneEncoder};
pub use hazard::{ColorHazardDetector, HazardDetection, HazardDetector, FIRE_LABEL, SMOKE_LABEL};
pub use identity::{FaceRecognizer, IdentityAdapter, ReferenceIdentityStore, ReloadReport};

use serde::{Deserialize, Serialize};

/// Name reported for faces that match no reference
pub const UNKNOWN_NAME: &str = "Unknown";

/// Axis-aligned box in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// Scale by `factor` and clip to a `width` x `height` frame
    pub fn scaled(&self, factor: f32, width: u32, height: u32) -> Self {
        let x = ((self.x as f32 * factor) as u32).min(width.saturating_sub(1));
        let y = ((self.y as f32 * factor) as u32).min(height.saturating_sub(1));
        let right = ((self.right() as f32 * factor).round() as u32).clamp(x + 1, width);
        let bottom = ((self.bottom() as f32 * factor).round() as u32).clamp(y + 1, height);
        Self {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

/// One face found in a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceObservation {
    pub bbox: BoundingBox,
    pub name: String,
}

impl FaceObservation {
    pub fn is_known(&self) -> bool {
        self.name != UNKNOWN_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaled_box_stays_inside_frame() {
        let small = BoundingBox::new(70, 50, 20, 15);
        let full = small.scaled(4.0, 320, 240);
        assert_eq!(full, BoundingBox::new(280, 200, 40, 40));

        let edge = BoundingBox::new(79, 59, 1, 1).scaled(4.0, 320, 240);
        assert!(edge.right() <= 320 && edge.bottom() <= 240);
        assert!(edge.width >= 1 && edge.height >= 1);
    }
}
