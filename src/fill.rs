//! Bucket fill on a pixel buffer.
//!
//! Breadth-first, 4-connected, exact color match.  The buffer is snapshotted
//! once before painting and every membership test reads the snapshot, so
//! pixels repainted earlier in the same pass never change which neighbors
//! qualify.  The fill runs to completion on the calling thread; there is no
//! cancellation hook.

use std::collections::VecDeque;
use std::fmt;
use std::time::Instant;

use crate::canvas::{Color, PixelBuffer, Point};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FillError {
    /// Seed lies outside the `width x height` buffer. Nothing was painted.
    InvalidSeed { x: i32, y: i32, width: u32, height: u32 },
}

impl fmt::Display for FillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillError::InvalidSeed { x, y, width, height } => write!(
                f,
                "fill seed ({}, {}) is outside the {}x{} buffer",
                x, y, width, height
            ),
        }
    }
}

impl std::error::Error for FillError {}

/// Outcome of a completed fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FillReport {
    /// Color of the region before the fill.
    pub old_color: Color,
    /// Number of pixels written.
    pub painted: usize,
    /// Inclusive `(min_x, min_y, max_x, max_y)` of the painted pixels.
    pub bounds: (u32, u32, u32, u32),
}

/// Repaint the 4-connected region of `seed`'s color with `color`.
///
/// Filling a region with the color it already has is allowed; the traversal
/// still runs and leaves the buffer unchanged.
pub fn flood_fill<B: PixelBuffer + ?Sized>(
    buffer: &mut B,
    seed: Point,
    color: Color,
) -> Result<FillReport, FillError> {
    let (width, height) = (buffer.width(), buffer.height());
    if !buffer.contains(seed.x, seed.y) {
        return Err(FillError::InvalidSeed { x: seed.x, y: seed.y, width, height });
    }

    let started = Instant::now();
    let snapshot = buffer.snapshot();
    let (sx, sy) = (seed.x as u32, seed.y as u32);
    let old_color = *snapshot.get_pixel(sx, sy);

    let wu = width as usize;
    let mut visited = vec![false; wu * height as usize];
    let mut queue: VecDeque<(u32, u32)> = VecDeque::new();
    visited[sy as usize * wu + sx as usize] = true;
    queue.push_back((sx, sy));

    let mut painted = 0usize;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (sx, sy, sx, sy);

    while let Some((x, y)) = queue.pop_front() {
        buffer.set_pixel(x, y, color);
        painted += 1;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);

        // Left, up, right, down
        let neighbors = [
            (x > 0).then(|| (x - 1, y)),
            (y > 0).then(|| (x, y - 1)),
            (x + 1 < width).then(|| (x + 1, y)),
            (y + 1 < height).then(|| (x, y + 1)),
        ];
        for (nx, ny) in neighbors.into_iter().flatten() {
            let ni = ny as usize * wu + nx as usize;
            if visited[ni] || *snapshot.get_pixel(nx, ny) != old_color {
                continue;
            }
            visited[ni] = true;
            queue.push_back((nx, ny));
        }
    }

    crate::log_info!(
        "Flood fill at ({}, {}): {} px in {:.1}ms",
        seed.x,
        seed.y,
        painted,
        started.elapsed().as_secs_f64() * 1000.0
    );

    Ok(FillReport {
        old_color,
        painted,
        bounds: (min_x, min_y, max_x, max_y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    const BG: Color = Rgba([255, 255, 255, 255]);
    const INK: Color = Rgba([0, 0, 0, 255]);
    const NEW: Color = Rgba([200, 30, 30, 255]);

    /// Build a buffer from ASCII art: `#` = INK, anything else = BG.
    fn from_art(rows: &[&str]) -> RgbaImage {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        RgbaImage::from_fn(w, h, |x, y| {
            if rows[y as usize].as_bytes()[x as usize] == b'#' { INK } else { BG }
        })
    }

    /// Fill `#` region from `seed` and check exactly the `#` pixels changed.
    fn assert_fills_exactly_ink(rows: &[&str], seed: Point) {
        let before = from_art(rows);
        let mut img = before.clone();
        let report = flood_fill(&mut img, seed, NEW).unwrap();

        let ink = before.pixels().filter(|p| **p == INK).count();
        assert_eq!(report.painted, ink);
        assert_eq!(report.old_color, INK);
        for (x, y, p) in img.enumerate_pixels() {
            let was = *before.get_pixel(x, y);
            if was == INK {
                assert_eq!(*p, NEW, "({x}, {y}) not filled");
            } else {
                assert_eq!(*p, was, "({x}, {y}) changed");
            }
        }
    }

    #[test]
    fn fills_rectangle_only() {
        assert_fills_exactly_ink(
            &[
                "........",
                "..####..",
                "..####..",
                "..####..",
                "........",
            ],
            Point::new(3, 2),
        );
    }

    #[test]
    fn fills_u_shape() {
        assert_fills_exactly_ink(
            &[
                ".......",
                ".#...#.",
                ".#...#.",
                ".#...#.",
                ".#####.",
                ".......",
            ],
            Point::new(1, 1),
        );
    }

    #[test]
    fn fills_ring_without_touching_hole() {
        assert_fills_exactly_ink(
            &[
                ".......",
                ".#####.",
                ".#...#.",
                ".#...#.",
                ".#####.",
                ".......",
            ],
            Point::new(5, 3),
        );
    }

    #[test]
    fn fills_single_pixel() {
        assert_fills_exactly_ink(&["...", ".#.", "..."], Point::new(1, 1));
    }

    #[test]
    fn diagonal_neighbors_are_not_connected() {
        let mut img = from_art(&["#..", ".#.", "..#"]);
        let report = flood_fill(&mut img, Point::new(1, 1), NEW).unwrap();
        assert_eq!(report.painted, 1);
        assert_eq!(*img.get_pixel(0, 0), INK);
        assert_eq!(*img.get_pixel(2, 2), INK);
    }

    #[test]
    fn background_fill_stops_at_closed_ring() {
        let mut img = from_art(&[
            ".......",
            ".#####.",
            ".#...#.",
            ".#####.",
            ".......",
        ]);
        let report = flood_fill(&mut img, Point::new(0, 0), NEW).unwrap();
        // 35 px: 12 ink, 3 enclosed, 20 outside
        assert_eq!(report.painted, 20);
        assert_eq!(*img.get_pixel(3, 2), BG);
        assert_eq!(report.bounds, (0, 0, 6, 4));
    }

    #[test]
    fn uniform_buffer_is_filled_entirely() {
        let mut img = RgbaImage::from_pixel(13, 7, BG);
        let report = flood_fill(&mut img, Point::new(12, 6), NEW).unwrap();
        assert_eq!(report.painted, 13 * 7);
        assert!(img.pixels().all(|p| *p == NEW));
    }

    #[test]
    fn refilling_with_same_color_changes_nothing() {
        let before = from_art(&["..##", ".##.", "...."]);
        let mut img = before.clone();
        let report = flood_fill(&mut img, Point::new(2, 0), INK).unwrap();
        assert_eq!(report.painted, 4);
        assert_eq!(img, before);
    }

    #[test]
    fn out_of_bounds_seed_is_rejected_without_mutation() {
        let before = from_art(&["..", ".."]);
        let mut img = before.clone();
        for seed in [Point::new(-1, 0), Point::new(0, 2), Point::new(2, 0)] {
            let err = flood_fill(&mut img, seed, NEW).unwrap_err();
            assert_eq!(err, FillError::InvalidSeed { x: seed.x, y: seed.y, width: 2, height: 2 });
        }
        assert_eq!(img, before);
    }

    #[test]
    fn transparent_regions_fill_like_any_color() {
        let mut img = RgbaImage::new(4, 4);
        img.put_pixel(1, 0, INK);
        img.put_pixel(1, 1, INK);
        img.put_pixel(0, 1, INK);
        let report = flood_fill(&mut img, Point::new(3, 3), NEW).unwrap();
        assert_eq!(report.painted, 12);
        // (0, 0) is walled off by ink
        assert_eq!(*img.get_pixel(0, 0), Rgba([0, 0, 0, 0]));
    }
}
