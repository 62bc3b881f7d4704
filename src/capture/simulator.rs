// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Simulated cameras for demo/testing

use async_trait::async_trait;
use image::Rgb;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::{Frame, FrameSource};
use crate::error::CaptureError;

const WIDTH: u32 = 320;
const HEIGHT: u32 = 240;

/// What the simulated camera looks at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulatedScene {
    /// Kitchen wall; a fire flares up, turns to smoke, then clears
    Kitchen,
    /// Front door; two visitors come and go
    FrontDoor,
    /// Nothing ever happens
    Idle,
}

/// Generates synthetic frames on a fixed timeline (in frames)
pub struct SimulatedCamera {
    index: u32,
    scene: SimulatedScene,
    open: bool,
    sequence: u64,
    rng: StdRng,
}

impl SimulatedCamera {
    pub fn new(index: u32, scene: SimulatedScene) -> Self {
        Self {
            index,
            scene,
            open: false,
            sequence: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic noise, for tests
    pub fn with_seed(index: u32, scene: SimulatedScene, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ..Self::new(index, scene)
        }
    }

    fn render(&mut self) -> Frame {
        let t = self.sequence;
        self.sequence += 1;

        match self.scene {
            SimulatedScene::Kitchen => self.render_kitchen(t),
            SimulatedScene::FrontDoor => self.render_front_door(t),
            SimulatedScene::Idle => self.background([70, 110, 120]),
        }
    }

    fn background(&mut self, base: [u8; 3]) -> Frame {
        let mut frame = Frame::new(WIDTH, HEIGHT);
        for pixel in frame.pixels_mut() {
            let n: i16 = self.rng.gen_range(-4..=4);
            *pixel = Rgb([
                jitter(base[0], n),
                jitter(base[1], n),
                jitter(base[2], n),
            ]);
        }
        frame
    }

    fn render_kitchen(&mut self, t: u64) -> Frame {
        let mut frame = self.background([70, 110, 120]);
        let phase = t % 600;

        if (300..420).contains(&phase) {
            // Flickering flame above the stove
            let w = 50 + self.rng.gen_range(0..20);
            let h = 60 + self.rng.gen_range(0..25);
            let x0 = 135;
            let y0 = 200 - h;
            for y in y0..200 {
                for x in x0..(x0 + w).min(WIDTH) {
                    let g = self.rng.gen_range(90..170u8);
                    frame.put_pixel(x, y, Rgb([self.rng.gen_range(225..=255u8), g, self.rng.gen_range(0..50u8)]));
                }
            }
        } else if (420..480).contains(&phase) {
            // Smoke haze over the upper half
            for y in 0..HEIGHT * 3 / 5 {
                for x in 0..WIDTH {
                    let v = self.rng.gen_range(150..170u8);
                    frame.put_pixel(x, y, Rgb([v, v, v.saturating_add(3)]));
                }
            }
        }
        frame
    }

    fn render_front_door(&mut self, t: u64) -> Frame {
        let mut frame = self.background([60, 75, 95]);
        let phase = t % 450;

        if (60..180).contains(&phase) {
            draw_face(&mut frame, 110, 50, 100, 110, FacePattern::Horizontal);
        } else if (240..330).contains(&phase) {
            draw_face(&mut frame, 140, 70, 90, 100, FacePattern::Vertical);
        }
        frame
    }
}

fn jitter(value: u8, n: i16) -> u8 {
    (value as i16 + n).clamp(0, 255) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FacePattern {
    Horizontal,
    Vertical,
}

/// Skin-toned patch, half bright and half shaded; the split direction tells
/// one "person" from the other
pub(crate) fn draw_face(frame: &mut Frame, x0: u32, y0: u32, w: u32, h: u32, pattern: FacePattern) {
    for y in y0..(y0 + h).min(frame.height()) {
        for x in x0..(x0 + w).min(frame.width()) {
            let bright = match pattern {
                FacePattern::Horizontal => y - y0 < h / 2,
                FacePattern::Vertical => x - x0 < w / 2,
            };
            let d: i16 = if bright { 25 } else { -25 };
            frame.put_pixel(
                x,
                y,
                Rgb([jitter(200, d), jitter(140, d / 2), 110]),
            );
        }
    }
}

#[async_trait]
impl FrameSource for SimulatedCamera {
    fn index(&self) -> u32 {
        self.index
    }

    fn describe(&self) -> String {
        format!("simulated {:?} camera", self.scene)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<(), CaptureError> {
        self.open = true;
        Ok(())
    }

    async fn read_frame(&mut self) -> Result<Frame, CaptureError> {
        if !self.open {
            return Err(CaptureError::SourceUnavailable {
                index: self.index,
                reason: "simulated camera not opened".into(),
            });
        }
        Ok(self.render())
    }

    fn release(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_requires_open() {
        let mut camera = SimulatedCamera::with_seed(0, SimulatedScene::Idle, 1);
        assert!(camera.read_frame().await.is_err());

        camera.open().await.unwrap();
        let frame = camera.read_frame().await.unwrap();
        assert_eq!(frame.dimensions(), (WIDTH, HEIGHT));
    }

    #[tokio::test]
    async fn test_kitchen_timeline_shows_fire() {
        let mut camera = SimulatedCamera::with_seed(0, SimulatedScene::Kitchen, 7);
        camera.open().await.unwrap();

        let mut fire_frame = None;
        for t in 0..=310u64 {
            let frame = camera.read_frame().await.unwrap();
            if t == 310 {
                fire_frame = Some(frame);
            }
        }
        let frame = fire_frame.unwrap();
        let hot = frame.pixels().filter(|p| p[0] > 220 && p[2] < 60).count();
        assert!(hot > 1000);
    }
}
