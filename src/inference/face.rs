// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Face location and encoding
//!
//! [`FaceEncoder`] is the seam for a real face-embedding engine. The bundled
//! [`SkinToneEncoder`] is a model-free baseline: it finds skin-coloured blobs
//! and encodes each one as a normalised 16x16 luminance thumbnail.

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb};

use super::BoundingBox;
use crate::capture::Frame;

const THUMBNAIL_SIZE: u32 = 16;

/// Feature vector of one face
#[derive(Debug, Clone, PartialEq)]
pub struct FaceEncoding(Vec<f32>);

impl FaceEncoding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Euclidean distance; vectors of different length never match
    pub fn distance(&self, other: &FaceEncoding) -> f32 {
        if self.0.len() != other.0.len() {
            return f32::INFINITY;
        }
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

pub trait FaceEncoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Face boxes in `frame` coordinates
    fn locate(&self, frame: &Frame) -> Vec<BoundingBox>;

    /// `None` when the region carries no usable face signal
    fn encode(&self, frame: &Frame, face: &BoundingBox) -> Option<FaceEncoding>;
}

/// Skin-colour blob locator with thumbnail encodings
#[derive(Debug, Clone)]
pub struct SkinToneEncoder {
    /// Grid cell edge in pixels
    cell: u32,
    /// Share of skin pixels for a cell to count
    cell_fill: f32,
    /// Smallest blob, in cells, reported as a face
    min_cells: usize,
}

impl Default for SkinToneEncoder {
    fn default() -> Self {
        Self {
            cell: 4,
            cell_fill: 0.6,
            min_cells: 6,
        }
    }
}

impl SkinToneEncoder {
    pub fn new(cell: u32, cell_fill: f32, min_cells: usize) -> Self {
        Self {
            cell: cell.max(1),
            cell_fill,
            min_cells: min_cells.max(1),
        }
    }

    fn skin_cells(&self, frame: &Frame) -> (Vec<bool>, u32, u32) {
        let cols = frame.width() / self.cell;
        let rows = frame.height() / self.cell;
        let mut grid = vec![false; (cols * rows) as usize];
        let per_cell = (self.cell * self.cell) as f32;

        for row in 0..rows {
            for col in 0..cols {
                let mut skin = 0u32;
                for y in row * self.cell..(row + 1) * self.cell {
                    for x in col * self.cell..(col + 1) * self.cell {
                        if is_skin(frame.get_pixel(x, y)) {
                            skin += 1;
                        }
                    }
                }
                grid[(row * cols + col) as usize] = skin as f32 / per_cell >= self.cell_fill;
            }
        }
        (grid, cols, rows)
    }
}

/// Kovac et al. daylight skin rule
fn is_skin(pixel: &Rgb<u8>) -> bool {
    let [r, g, b] = pixel.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    r > 95 && g > 40 && b > 20 && max - min > 15 && r.abs_diff(g) > 15 && r > g && r > b
}

/// Shrink `face` to the skin pixels it contains
fn tighten(frame: &Frame, face: &BoundingBox) -> Option<BoundingBox> {
    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0, 0);
    for y in face.y..face.bottom() {
        for x in face.x..face.right() {
            if is_skin(frame.get_pixel(x, y)) {
                x0 = x0.min(x);
                y0 = y0.min(y);
                x1 = x1.max(x);
                y1 = y1.max(y);
            }
        }
    }
    (x0 <= x1).then(|| BoundingBox::new(x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}

impl FaceEncoder for SkinToneEncoder {
    fn name(&self) -> &'static str {
        "skin-tone"
    }

    fn locate(&self, frame: &Frame) -> Vec<BoundingBox> {
        let (mut grid, cols, rows) = self.skin_cells(frame);
        let mut faces = Vec::new();
        let mut stack = Vec::new();

        for start in 0..grid.len() {
            if !grid[start] {
                continue;
            }
            grid[start] = false;
            stack.push(start);

            let (mut min_c, mut min_r, mut max_c, mut max_r) = (cols, rows, 0, 0);
            let mut count = 0usize;

            while let Some(i) = stack.pop() {
                let (c, r) = (i as u32 % cols, i as u32 / cols);
                count += 1;
                min_c = min_c.min(c);
                max_c = max_c.max(c);
                min_r = min_r.min(r);
                max_r = max_r.max(r);

                let mut visit = |c: u32, r: u32| {
                    let j = (r * cols + c) as usize;
                    if grid[j] {
                        grid[j] = false;
                        stack.push(j);
                    }
                };
                if c > 0 {
                    visit(c - 1, r);
                }
                if c + 1 < cols {
                    visit(c + 1, r);
                }
                if r > 0 {
                    visit(c, r - 1);
                }
                if r + 1 < rows {
                    visit(c, r + 1);
                }
            }

            if count >= self.min_cells {
                faces.push(BoundingBox::new(
                    min_c * self.cell,
                    min_r * self.cell,
                    (max_c - min_c + 1) * self.cell,
                    (max_r - min_r + 1) * self.cell,
                ));
            }
        }

        // Left to right
        faces.sort_by_key(|b| (b.x, b.y));
        faces
    }

    fn encode(&self, frame: &Frame, face: &BoundingBox) -> Option<FaceEncoding> {
        if face.width == 0
            || face.height == 0
            || face.right() > frame.width()
            || face.bottom() > frame.height()
        {
            return None;
        }

        let face = tighten(frame, face)?;
        let crop = imageops::crop_imm(frame, face.x, face.y, face.width, face.height).to_image();
        let luma = DynamicImage::ImageRgb8(crop).to_luma8();
        let thumb = imageops::resize(&luma, THUMBNAIL_SIZE, THUMBNAIL_SIZE, FilterType::Triangle);

        let values: Vec<f32> = thumb.pixels().map(|p| p[0] as f32).collect();
        let mean = values.iter().sum::<f32>() / values.len() as f32;
        let centered: Vec<f32> = values.iter().map(|v| v - mean).collect();
        let norm = centered.iter().map(|v| v * v).sum::<f32>().sqrt();

        // Flat patches (a wall, a uniform blob) carry no identity
        if norm / (values.len() as f32).sqrt() < 2.0 {
            return None;
        }
        Some(FaceEncoding(centered.into_iter().map(|v| v / norm).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{draw_face, FacePattern};

    fn scene(pattern: FacePattern) -> Frame {
        let mut frame = Frame::from_pixel(320, 240, Rgb([40, 40, 40]));
        draw_face(&mut frame, 100, 60, 120, 120, pattern);
        frame
    }

    #[test]
    fn test_locates_single_face() {
        let encoder = SkinToneEncoder::default();
        let faces = encoder.locate(&scene(FacePattern::Horizontal));
        assert_eq!(faces, vec![BoundingBox::new(100, 60, 120, 120)]);
    }

    #[test]
    fn test_empty_scene_has_no_faces() {
        let encoder = SkinToneEncoder::default();
        assert!(encoder.locate(&Frame::from_pixel(64, 64, Rgb([40, 40, 40]))).is_empty());
    }

    #[test]
    fn test_two_faces_found_separately() {
        let mut frame = Frame::from_pixel(320, 240, Rgb([40, 40, 40]));
        draw_face(&mut frame, 20, 40, 80, 80, FacePattern::Horizontal);
        draw_face(&mut frame, 200, 40, 80, 80, FacePattern::Vertical);

        let faces = SkinToneEncoder::default().locate(&frame);
        assert_eq!(faces.len(), 2);
        assert!(faces[0].x < faces[1].x);
    }

    #[test]
    fn test_encoding_separates_people() {
        let encoder = SkinToneEncoder::default();
        let a = scene(FacePattern::Horizontal);
        let b = scene(FacePattern::Vertical);
        let bbox = BoundingBox::new(100, 60, 120, 120);

        let ea = encoder.encode(&a, &bbox).unwrap();
        let eb = encoder.encode(&b, &bbox).unwrap();
        let ea2 = encoder.encode(&a, &BoundingBox::new(104, 60, 116, 120)).unwrap();

        assert!(ea.distance(&eb) > 1.0);
        assert!(ea.distance(&ea2) < 0.3);
    }

    #[test]
    fn test_loose_box_encodes_like_tight_box() {
        let encoder = SkinToneEncoder::default();
        let frame = scene(FacePattern::Horizontal);
        let tight = encoder.encode(&frame, &BoundingBox::new(100, 60, 120, 120)).unwrap();
        let loose = encoder.encode(&frame, &BoundingBox::new(90, 50, 140, 140)).unwrap();
        assert!(tight.distance(&loose) < 1e-3);
    }

    #[test]
    fn test_flat_region_has_no_encoding() {
        let encoder = SkinToneEncoder::default();
        let frame = Frame::from_pixel(64, 64, Rgb([200, 140, 110]));
        assert!(encoder.encode(&frame, &BoundingBox::new(0, 0, 64, 64)).is_none());
    }
}
