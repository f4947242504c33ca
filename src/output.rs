use anyhow::{anyhow, Result};
use minifb::{Key, KeyRepeat, MouseButton, MouseMode, Window, WindowOptions};
use nalgebra::Point2;
use std::ops::Range;

use crate::geometry::{PrimitiveKind, RenderPrimitive, POINT_SIZE};
use crate::scene::{HostEvent, Scene};
use crate::view::OrbitCamera;

const BACKGROUND: u32 = 0x0010_1014;

/// Software rendered scene in a minifb window.
pub struct WindowScene {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
    camera: OrbitCamera,
    primitives: Vec<RenderPrimitive>,
    last_mouse: Option<(f32, f32)>,
}

impl WindowScene {
    pub fn new(title: &str, width: usize, height: usize) -> Result<Self> {
        let window = Window::new(
            title,
            width,
            height,
            WindowOptions {
                resize: true,
                ..WindowOptions::default()
            },
        )
        .map_err(|e| anyhow!("Failed to create window: {}", e))?;

        Ok(Self {
            window,
            buffer: vec![BACKGROUND; width * height],
            width,
            height,
            camera: OrbitCamera::new(width, height),
            primitives: Vec::new(),
            last_mouse: None,
        })
    }

    /// Mouse drag orbits, the wheel zooms.
    fn update_controls(&mut self) {
        let mouse = self.window.get_mouse_pos(MouseMode::Pass);
        if self.window.get_mouse_down(MouseButton::Left) {
            if let (Some((x, y)), Some((px, py))) = (mouse, self.last_mouse) {
                self.camera.rotate(x - px, y - py);
            }
        }
        self.last_mouse = mouse;

        if let Some((_, scroll)) = self.window.get_scroll_wheel() {
            self.camera.zoom(scroll.signum());
        }
    }

    fn sync_size(&mut self) {
        let (w, h) = self.window.get_size();
        if (w, h) != (self.width, self.height) && w > 0 && h > 0 {
            self.width = w;
            self.height = h;
            self.camera.set_viewport(w, h);
        }
        self.buffer.clear();
        self.buffer.resize(self.width * self.height, BACKGROUND);
    }

    fn draw_primitive(&mut self, primitive: &RenderPrimitive) {
        let color = primitive.color.to_u32();
        let projected: Vec<_> = primitive
            .world_points()
            .map(|p| self.camera.project(&p))
            .collect();

        match primitive.kind {
            PrimitiveKind::Points => {
                for p in projected.iter().flatten() {
                    let size = self.camera.pixels_at(POINT_SIZE, p.depth).max(1.0);
                    self.fill_square(p.pixel, size, color);
                }
            }
            PrimitiveKind::Line => {
                for pair in projected.windows(2) {
                    if let [Some(a), Some(b)] = pair {
                        self.draw_line(a.pixel, b.pixel, color);
                    }
                }
            }
        }
    }

    fn put(&mut self, x: i64, y: i64, color: u32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.buffer[y as usize * self.width + x as usize] = color;
        }
    }

    fn fill_square(&mut self, center: Point2<f32>, size: f32, color: u32) {
        let Some((xs, ys)) = clipped_square(center, size, self.width, self.height) else {
            return;
        };
        for y in ys {
            self.buffer[y * self.width + xs.start..y * self.width + xs.end].fill(color);
        }
    }

    /// Bresenham between two window points.
    fn draw_line(&mut self, a: Point2<f32>, b: Point2<f32>, color: u32) {
        let limit = (self.width.max(self.height) * 4) as f32;
        if a.coords.abs().max() > limit || b.coords.abs().max() > limit {
            return;
        }
        let (mut x0, mut y0) = (a.x.round() as i64, a.y.round() as i64);
        let (x1, y1) = (b.x.round() as i64, b.y.round() as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;
        loop {
            self.put(x0, y0, color);
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }
}

/// Pixel columns and rows of a square of side `size` centered on `center`,
/// clipped to a `width` by `height` buffer. `None` when nothing is visible.
fn clipped_square(
    center: Point2<f32>,
    size: f32,
    width: usize,
    height: usize,
) -> Option<(Range<usize>, Range<usize>)> {
    if !(center.x.is_finite() && center.y.is_finite() && size.is_finite()) {
        return None;
    }
    let half = size / 2.0;
    let span = |mid: f32, limit: usize| {
        let lo = (mid - half).floor().max(0.0);
        let hi = (mid - half).floor() + size.ceil();
        let hi = hi.min(limit as f32);
        (lo < hi).then(|| lo as usize..hi as usize)
    };
    Some((span(center.x, width)?, span(center.y, height)?))
}

impl Scene for WindowScene {
    fn clear(&mut self) {
        self.primitives.clear();
    }

    fn insert(&mut self, primitive: RenderPrimitive) {
        self.primitives.push(primitive);
    }

    fn render(&mut self) -> Result<()> {
        self.update_controls();
        self.sync_size();

        let primitives = std::mem::take(&mut self.primitives);
        for primitive in &primitives {
            self.draw_primitive(primitive);
        }
        self.primitives = primitives;

        self.window
            .update_with_buffer(&self.buffer, self.width, self.height)
            .map_err(|e| anyhow!("Window update failed: {}", e))
    }

    fn is_open(&self) -> bool {
        self.window.is_open()
    }

    fn poll_event(&mut self) -> Option<HostEvent> {
        if self.window.is_key_down(Key::Escape) {
            return Some(HostEvent::Quit);
        }
        if self.window.is_key_pressed(Key::R, KeyRepeat::No) {
            return Some(HostEvent::ReloadConfig);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_inside_buffer() {
        let (xs, ys) = clipped_square(Point2::new(10.0, 20.0), 4.0, 100, 100).unwrap();
        assert_eq!(xs, 8..12);
        assert_eq!(ys, 18..22);
    }

    #[test]
    fn test_huge_square_is_clipped_to_buffer() {
        // A residual point just past the near plane.
        let camera = OrbitCamera::new(960, 720);
        let size = camera.pixels_at(POINT_SIZE, 0.02);
        assert!(size > 10_000.0);

        let (xs, ys) = clipped_square(Point2::new(480.0, 360.0), size, 960, 720).unwrap();
        assert_eq!(xs, 0..960);
        assert_eq!(ys, 0..720);
    }

    #[test]
    fn test_square_off_screen_is_skipped() {
        assert!(clipped_square(Point2::new(-50.0, 10.0), 4.0, 100, 100).is_none());
        assert!(clipped_square(Point2::new(10.0, 500.0), 4.0, 100, 100).is_none());
    }

    #[test]
    fn test_square_on_edge_is_partial() {
        let (xs, ys) = clipped_square(Point2::new(0.0, 99.0), 4.0, 100, 100).unwrap();
        assert_eq!(xs, 0..2);
        assert_eq!(ys, 97..100);
    }
}
