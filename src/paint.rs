//! Stroke accumulation onto a persistent canvas.

use anyhow::{Result, ensure};
use image::{Rgb, RgbImage};
use log::info;
use serde::Serialize;

use crate::config::{Painter, Tool};
use crate::gestures::Mode;
use crate::landmark::Point;

/// A straight stroke drawn onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub from: Point,
    pub to: Point,
    pub color: [u8; 3],
    pub width: u32,
}

#[derive(Debug, Clone)]
pub struct PaintStrokeAccumulator {
    palette: Vec<Tool>,
    active: usize,
    brush_width: u32,
    eraser_width: u32,
    // None while the pen is lifted
    cursor: Option<Point>,
    canvas: RgbImage,
}

impl PaintStrokeAccumulator {
    pub fn new(width: u32, height: u32, painter: &Painter) -> Self {
        Self {
            palette: painter.palette.clone(),
            active: 0,
            brush_width: painter.brush_width,
            eraser_width: painter.eraser_width,
            cursor: None,
            canvas: RgbImage::new(width, height),
        }
    }

    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    pub fn active_tool(&self) -> Option<&Tool> {
        self.palette.get(self.active)
    }

    /// Switches to palette entry `region`. Out-of-range regions are ignored.
    pub fn select_tool(&mut self, region: usize) -> bool {
        let Some(tool) = self.palette.get(region) else {
            return false;
        };
        if region != self.active {
            info!("painter: selected {}", tool.name);
            self.active = region;
        }
        true
    }

    pub fn lift(&mut self) {
        self.cursor = None;
    }

    /// Advances the pen by one frame. Returns the segment drawn, if any.
    ///
    /// The first draw frame after a lift only places the pen.
    pub fn on_frame(&mut self, mode: Mode, cursor: Point) -> Option<Segment> {
        if mode != Mode::Draw {
            self.lift();
            return None;
        }
        let from = self.cursor.replace(cursor)?;
        let tool = self.palette.get(self.active)?;
        let seg = Segment {
            from,
            to: cursor,
            color: tool.color,
            width: if tool.eraser {
                self.eraser_width
            } else {
                self.brush_width
            },
        };
        draw_segment(&mut self.canvas, &seg);
        Some(seg)
    }
}

/// Fills the disc of `radius` around `center`, clipped to the canvas.
fn draw_disc(canvas: &mut RgbImage, (cx, cy): (f32, f32), radius: f32, color: Rgb<u8>) {
    let (w, h) = (canvas.width() as i64, canvas.height() as i64);
    let min_x = ((cx - radius).floor() as i64).max(0);
    let max_x = ((cx + radius).ceil() as i64).min(w - 1);
    let min_y = ((cy - radius).floor() as i64).max(0);
    let max_y = ((cy + radius).ceil() as i64).min(h - 1);
    let r2 = radius * radius;
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            if dx * dx + dy * dy <= r2 {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Rasterizes a round-capped segment `seg.width` pixels thick by stamping a
/// disc at every pixel step along it.
pub fn draw_segment(canvas: &mut RgbImage, seg: &Segment) {
    let (ax, ay) = (seg.from.0 as f32, seg.from.1 as f32);
    let (dx, dy) = (seg.to.0 as f32 - ax, seg.to.1 as f32 - ay);
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
    let radius = (seg.width as f32 / 2.0).max(0.5);
    let color = Rgb(seg.color);
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        draw_disc(canvas, (ax + dx * t, ay + dy * t), radius, color);
    }
}

/// Integer BT.601 luma.
fn luma(px: &Rgb<u8>) -> u8 {
    let [r, g, b] = px.0;
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

/// Overlays `canvas` onto `frame` with a binary alpha.
///
/// Canvas pixels brighter than `darkness` replace the frame pixel. Darker pixels
/// count as no ink and are merged with a bitwise OR, which leaves the frame
/// untouched wherever the canvas is black.
pub fn composite(frame: &mut RgbImage, canvas: &RgbImage, darkness: u8) -> Result<()> {
    ensure!(
        frame.dimensions() == canvas.dimensions(),
        "canvas is {:?} but frame is {:?}",
        canvas.dimensions(),
        frame.dimensions()
    );
    for (dst, src) in frame.pixels_mut().zip(canvas.pixels()) {
        if luma(src) > darkness {
            *dst = *src;
        } else {
            for (d, s) in dst.0.iter_mut().zip(src.0) {
                *d |= s;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Profile;

    fn painter() -> PaintStrokeAccumulator {
        let profile = Profile::builtin().unwrap();
        PaintStrokeAccumulator::new(64, 48, &profile.painter)
    }

    fn inked(img: &RgbImage) -> usize {
        img.pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }

    #[test]
    fn first_draw_frame_only_places_pen() {
        let mut p = painter();
        assert_eq!(p.on_frame(Mode::Draw, (10, 10)), None);
        assert_eq!(inked(p.canvas()), 0);
        let seg = p.on_frame(Mode::Draw, (20, 20)).unwrap();
        assert_eq!((seg.from, seg.to), ((10, 10), (20, 20)));
        assert_eq!(seg.color, [255, 0, 255]);
        assert_eq!(seg.width, 15);
        assert_eq!(p.cursor(), Some((20, 20)));
        // nothing near the origin
        assert_eq!(p.canvas().get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(p.canvas().get_pixel(15, 15).0, [255, 0, 255]);
    }

    #[test]
    fn non_draw_frame_lifts_pen() {
        let mut p = painter();
        p.on_frame(Mode::Draw, (10, 10));
        assert!(p.on_frame(Mode::Draw, (20, 20)).is_some());
        assert_eq!(p.on_frame(Mode::Idle, (30, 30)), None);
        assert_eq!(p.cursor(), None);
        assert_eq!(p.on_frame(Mode::Draw, (40, 40)), None);
        assert!(p.on_frame(Mode::Draw, (41, 40)).is_some());

        for mode in [Mode::Navigate, Mode::Select] {
            p.on_frame(mode, (0, 0));
            assert_eq!(p.cursor(), None);
        }
    }

    #[test]
    fn tool_switch_keeps_cursor() {
        let mut p = painter();
        p.on_frame(Mode::Draw, (5, 5));
        assert!(p.select_tool(3));
        assert_eq!(p.cursor(), Some((5, 5)));
        assert_eq!(p.active_tool().map(|t| t.name.as_str()), Some("Eraser"));
        let seg = p.on_frame(Mode::Draw, (6, 5)).unwrap();
        assert_eq!(seg.width, 50);
        assert_eq!(seg.color, [0, 0, 0]);
        assert!(!p.select_tool(9));
        assert_eq!(p.active_tool().map(|t| t.name.as_str()), Some("Eraser"));
    }

    #[test]
    fn eraser_clears_ink() {
        let mut p = painter();
        p.on_frame(Mode::Draw, (10, 24));
        p.on_frame(Mode::Draw, (50, 24));
        assert!(inked(p.canvas()) > 0);
        p.select_tool(3);
        p.lift();
        p.on_frame(Mode::Draw, (10, 24));
        p.on_frame(Mode::Draw, (50, 24));
        assert_eq!(inked(p.canvas()), 0);
    }

    #[test]
    fn thick_segment_geometry() {
        let mut img = RgbImage::new(40, 40);
        let seg = Segment {
            from: (10, 20),
            to: (30, 20),
            color: [9, 9, 9],
            width: 6,
        };
        draw_segment(&mut img, &seg);
        assert_eq!(img.get_pixel(20, 20).0, [9, 9, 9]);
        assert_eq!(img.get_pixel(20, 23).0, [9, 9, 9]);
        assert_eq!(img.get_pixel(20, 24).0, [0, 0, 0]);
        // round caps
        assert_eq!(img.get_pixel(7, 20).0, [9, 9, 9]);
        assert_eq!(img.get_pixel(7, 23).0, [0, 0, 0]);
    }

    #[test]
    fn segment_clips_at_canvas_edges() {
        let mut img = RgbImage::new(8, 8);
        let seg = Segment {
            from: (-20, -20),
            to: (30, 30),
            color: [200, 200, 200],
            width: 3,
        };
        draw_segment(&mut img, &seg);
        assert_eq!(img.get_pixel(0, 0).0, [200, 200, 200]);
        assert_eq!(img.get_pixel(7, 7).0, [200, 200, 200]);
        assert_eq!(img.get_pixel(7, 0).0, [0, 0, 0]);
    }

    #[test]
    fn composite_uses_darkness_threshold() {
        let mut frame = RgbImage::from_pixel(3, 1, Rgb([10, 100, 10]));
        let mut canvas = RgbImage::new(3, 1);
        canvas.put_pixel(0, 0, Rgb([255, 0, 255]));
        canvas.put_pixel(1, 0, Rgb([0, 0, 40]));
        composite(&mut frame, &canvas, 50).unwrap();
        assert_eq!(frame.get_pixel(0, 0).0, [255, 0, 255]);
        assert_eq!(frame.get_pixel(1, 0).0, [10, 100, 42]);
        assert_eq!(frame.get_pixel(2, 0).0, [10, 100, 10]);
    }

    #[test]
    fn composite_rejects_size_mismatch() {
        let mut frame = RgbImage::new(4, 4);
        assert!(composite(&mut frame, &RgbImage::new(4, 3), 50).is_err());
    }
}
