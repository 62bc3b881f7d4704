// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Hazard classification

use image::Rgb;

use super::{outline, BoundingBox};
use crate::capture::Frame;
use crate::config::HazardConfig;
use crate::error::AdapterInitError;

pub const FIRE_LABEL: &str = "Fire";
pub const SMOKE_LABEL: &str = "Smoke";

const FIRE_OUTLINE: Rgb<u8> = Rgb([255, 140, 0]);
const SMOKE_OUTLINE: Rgb<u8> = Rgb([200, 200, 200]);

/// Result for one frame; never stored
#[derive(Debug, Clone)]
pub struct HazardDetection {
    pub annotated: Frame,
    pub label: Option<String>,
}

/// Hazard inference engine
pub trait HazardDetector: Send {
    fn name(&self) -> &'static str;

    /// Classify one frame and draw whatever was found onto a copy of it
    fn process(&mut self, frame: Frame) -> HazardDetection;
}

/// Pixel-colour fire/smoke classifier
///
/// A frame is labelled "Fire" when the share of flame-coloured pixels reaches
/// `fire_pixel_ratio`, otherwise "Smoke" when enough low-saturation mid-grey
/// pixels are present. The matching region is outlined.
#[derive(Debug, Clone)]
pub struct ColorHazardDetector {
    fire_ratio: f32,
    smoke_ratio: f32,
}

impl ColorHazardDetector {
    pub fn new(config: &HazardConfig) -> Result<Self, AdapterInitError> {
        check_ratio("fire_pixel_ratio", config.fire_pixel_ratio)?;
        check_ratio("smoke_pixel_ratio", config.smoke_pixel_ratio)?;

        Ok(Self {
            fire_ratio: config.fire_pixel_ratio,
            smoke_ratio: config.smoke_pixel_ratio,
        })
    }
}

fn check_ratio(setting: &'static str, value: f32) -> Result<(), AdapterInitError> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(AdapterInitError::InvalidSetting {
            setting,
            reason: format!("{} is outside (0, 1]", value),
        })
    }
}

fn is_flame(pixel: &Rgb<u8>) -> bool {
    let [r, g, b] = pixel.0;
    r >= 200 && (60..=200).contains(&g) && b <= 90 && r > g && g > b
}

fn is_smoke(pixel: &Rgb<u8>) -> bool {
    let [r, g, b] = pixel.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let avg = (r as u16 + g as u16 + b as u16) / 3;
    max - min <= 16 && (130..=220).contains(&avg)
}

/// Pixel count and extent of the pixels matching `pred`
fn scan(frame: &Frame, pred: fn(&Rgb<u8>) -> bool) -> (u64, Option<BoundingBox>) {
    let mut count = 0u64;
    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);

    for (x, y, pixel) in frame.enumerate_pixels() {
        if pred(pixel) {
            count += 1;
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x);
            y1 = y1.max(y);
        }
    }

    let extent = (count > 0).then(|| BoundingBox::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1));
    (count, extent)
}

impl HazardDetector for ColorHazardDetector {
    fn name(&self) -> &'static str {
        "colour-heuristic"
    }

    fn process(&mut self, mut frame: Frame) -> HazardDetection {
        let total = (frame.width() as u64 * frame.height() as u64).max(1) as f32;

        let (fire, fire_box) = scan(&frame, is_flame);
        if fire as f32 / total >= self.fire_ratio {
            if let Some(bbox) = fire_box {
                outline(&mut frame, &bbox, FIRE_OUTLINE);
            }
            return HazardDetection {
                annotated: frame,
                label: Some(FIRE_LABEL.to_string()),
            };
        }

        let (smoke, smoke_box) = scan(&frame, is_smoke);
        if smoke as f32 / total >= self.smoke_ratio {
            if let Some(bbox) = smoke_box {
                outline(&mut frame, &bbox, SMOKE_OUTLINE);
            }
            return HazardDetection {
                annotated: frame,
                label: Some(SMOKE_LABEL.to_string()),
            };
        }

        HazardDetection {
            annotated: frame,
            label: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> ColorHazardDetector {
        ColorHazardDetector::new(&HazardConfig::default()).unwrap()
    }

    fn wall() -> Frame {
        Frame::from_pixel(100, 100, Rgb([70, 110, 120]))
    }

    #[test]
    fn test_quiet_frame_has_no_label() {
        let result = detector().process(wall());
        assert!(result.label.is_none());
        assert_eq!(result.annotated, wall());
    }

    #[test]
    fn test_flame_patch_is_fire() {
        let mut frame = wall();
        for y in 40..60 {
            for x in 40..60 {
                frame.put_pixel(x, y, Rgb([240, 130, 20]));
            }
        }
        let result = detector().process(frame);
        assert_eq!(result.label.as_deref(), Some(FIRE_LABEL));
        assert_eq!(*result.annotated.get_pixel(40, 40), FIRE_OUTLINE);
    }

    #[test]
    fn test_grey_haze_is_smoke() {
        let mut frame = wall();
        for y in 0..50 {
            for x in 0..100 {
                frame.put_pixel(x, y, Rgb([160, 160, 162]));
            }
        }
        let result = detector().process(frame);
        assert_eq!(result.label.as_deref(), Some(SMOKE_LABEL));
    }

    #[test]
    fn test_fire_wins_over_smoke() {
        let mut frame = Frame::from_pixel(100, 100, Rgb([160, 160, 160]));
        for y in 0..20 {
            for x in 0..20 {
                frame.put_pixel(x, y, Rgb([250, 150, 30]));
            }
        }
        assert_eq!(detector().process(frame).label.as_deref(), Some(FIRE_LABEL));
    }

    #[test]
    fn test_invalid_ratio_fails_init() {
        let config = HazardConfig {
            fire_pixel_ratio: 0.0,
            ..HazardConfig::default()
        };
        assert!(matches!(
            ColorHazardDetector::new(&config),
            Err(AdapterInitError::InvalidSetting { setting: "fire_pixel_ratio", .. })
        ));
    }
}
