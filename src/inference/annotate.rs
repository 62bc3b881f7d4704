// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/homewatch

//! Overlay drawing on annotated frames

use image::Rgb;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use super::BoundingBox;
use crate::capture::Frame;

pub const KNOWN_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
pub const UNKNOWN_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

const LABEL_BAR_HEIGHT: u32 = 35;

/// Two-pixel outline around `bbox`
pub fn outline(frame: &mut Frame, bbox: &BoundingBox, color: Rgb<u8>) {
    if bbox.width == 0 || bbox.height == 0 {
        return;
    }
    draw_hollow_rect_mut(frame, rect(bbox), color);
    if bbox.width > 2 && bbox.height > 2 {
        let inner = BoundingBox::new(bbox.x + 1, bbox.y + 1, bbox.width - 2, bbox.height - 2);
        draw_hollow_rect_mut(frame, rect(&inner), color);
    }
}

/// Face outline plus a filled name bar along the bottom edge. Empty boxes
/// draw nothing.
pub fn draw_face_box(frame: &mut Frame, bbox: &BoundingBox, known: bool) {
    if bbox.width == 0 || bbox.height == 0 {
        return;
    }
    let color = if known { KNOWN_COLOR } else { UNKNOWN_COLOR };
    outline(frame, bbox, color);

    let bar_height = LABEL_BAR_HEIGHT.min(bbox.height / 3).max(1);
    let bar = BoundingBox::new(bbox.x, bbox.bottom() - bar_height, bbox.width, bar_height);
    draw_filled_rect_mut(frame, rect(&bar), color);
}

fn rect(bbox: &BoundingBox) -> Rect {
    Rect::at(bbox.x as i32, bbox.y as i32).of_size(bbox.width, bbox.height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_face_box_colors_by_identity() {
        let mut frame = Frame::new(100, 100);
        draw_face_box(&mut frame, &BoundingBox::new(10, 10, 60, 60), true);
        assert_eq!(*frame.get_pixel(10, 10), KNOWN_COLOR);
        // Label bar is filled
        assert_eq!(*frame.get_pixel(40, 65), KNOWN_COLOR);
        // Interior above the bar is untouched
        assert_eq!(*frame.get_pixel(40, 30), Rgb([0, 0, 0]));

        draw_face_box(&mut frame, &BoundingBox::new(0, 0, 9, 9), false);
        assert_eq!(*frame.get_pixel(0, 0), UNKNOWN_COLOR);
    }

    #[test]
    fn test_empty_face_box_draws_nothing() {
        let mut frame = Frame::new(40, 40);
        draw_face_box(&mut frame, &BoundingBox::new(10, 10, 0, 20), true);
        draw_face_box(&mut frame, &BoundingBox::new(0, 0, 20, 0), false);
        assert_eq!(frame, Frame::new(40, 40));
    }
}
