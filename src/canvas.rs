use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Packed RGBA color used by every buffer in the editor.
pub type Color = Rgba<u8>;

pub const TRANSPARENT: Color = Rgba([0, 0, 0, 0]);

// ============================================================================
// GEOMETRY
// ============================================================================

/// Integer canvas position. May lie outside the canvas (pointer drags do).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

/// Pixel rectangle given by its four edges.
///
/// `right` and `bottom` are edge positions, so a rect from 0 to 200 is 200
/// pixels wide.  Rects built from guide lines are not normalized on their own
/// (a shape may run right-to-left); call [`PixelRect::normalized`] when the
/// orientation matters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl PixelRect {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Rect spanned by two arbitrary corners, normalized.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }

    pub fn normalized(self) -> Self {
        Self::from_corners(
            Point::new(self.left, self.top),
            Point::new(self.right, self.bottom),
        )
    }

    pub fn width(&self) -> i32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> i32 {
        self.bottom.saturating_sub(self.top)
    }

    /// True when the rect covers no area.
    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn translate(self, dx: i32, dy: i32) -> Self {
        let (tl, br) = (self.top_left().offset(dx, dy), self.bottom_right().offset(dx, dy));
        Self::new(tl.x, tl.y, br.x, br.y)
    }

    /// Overlap with `other`, `None` when they share no pixels.
    pub fn intersect(&self, other: PixelRect) -> Option<PixelRect> {
        let r = PixelRect::new(
            self.left.max(other.left),
            self.top.max(other.top),
            self.right.min(other.right),
            self.bottom.min(other.bottom),
        );
        (!r.is_empty()).then_some(r)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right, self.bottom)
    }
}

// ============================================================================
// PIXEL BUFFER
// ============================================================================

/// Mutable 2D pixel grid of fixed size.
///
/// `pixel` / `set_pixel` require in-bounds coordinates; the drawing
/// primitives clip on their own and accept any `i32` position.
pub trait PixelBuffer {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn pixel(&self, x: u32, y: u32) -> Color;
    fn set_pixel(&mut self, x: u32, y: u32, color: Color);

    /// Read-only copy of the current pixels.
    fn snapshot(&self) -> RgbaImage {
        RgbaImage::from_fn(self.width(), self.height(), |x, y| self.pixel(x, y))
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width() && (y as u32) < self.height()
    }

    fn put_clipped(&mut self, x: i32, y: i32, color: Color) {
        if self.contains(x, y) {
            self.set_pixel(x as u32, y as u32, color);
        }
    }

    /// Square pen tip of side `size` centered on (x, y).
    fn stamp(&mut self, x: i32, y: i32, color: Color, size: u32) {
        let size = size.max(1) as i32;
        let start = -(size - 1) / 2;
        for dy in start..start + size {
            for dx in start..start + size {
                self.put_clipped(x + dx, y + dy, color);
            }
        }
    }

    /// Bresenham line, both endpoints included.
    fn draw_line(&mut self, from: Point, to: Point, color: Color, size: u32) {
        let (mut x0, mut y0) = (from.x as i64, from.y as i64);
        let (x1, y1) = (to.x as i64, to.y as i64);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            // x0/y0 stay between the i32 endpoints
            self.stamp(x0 as i32, y0 as i32, color, size);
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

    /// Outline along all four edge lines, `right` and `bottom` included.
    /// Edges are cut to the buffer (plus the pen) before drawing.
    fn draw_rect(&mut self, rect: PixelRect, color: Color, size: u32) {
        let r = rect.normalized();
        let pad = size.max(1) as i32;
        let (x_lo, x_hi) = (-pad, (self.width() as i32).saturating_add(pad));
        let (y_lo, y_hi) = (-pad, (self.height() as i32).saturating_add(pad));
        let (left, right) = (r.left.clamp(x_lo, x_hi), r.right.clamp(x_lo, x_hi));
        let (top, bottom) = (r.top.clamp(y_lo, y_hi), r.bottom.clamp(y_lo, y_hi));

        for y in [r.top, r.bottom] {
            if (y_lo..=y_hi).contains(&y) {
                self.draw_line(Point::new(left, y), Point::new(right, y), color, size);
            }
        }
        for x in [r.left, r.right] {
            if (x_lo..=x_hi).contains(&x) {
                self.draw_line(Point::new(x, top), Point::new(x, bottom), color, size);
            }
        }
    }

    /// Solid fill of the pixels inside the rect (right/bottom exclusive).
    fn fill_rect(&mut self, rect: PixelRect, color: Color) {
        let r = rect.normalized();
        let x0 = r.left.max(0);
        let y0 = r.top.max(0);
        let x1 = r.right.min(self.width() as i32);
        let y1 = r.bottom.min(self.height() as i32);
        for y in y0..y1 {
            for x in x0..x1 {
                self.set_pixel(x as u32, y as u32, color);
            }
        }
    }

    /// Midpoint ellipse outline inscribed in `rect`.
    fn draw_ellipse(&mut self, rect: PixelRect, color: Color, size: u32) {
        let r = rect.normalized();
        let pad = size.max(1) as i32;
        let reach = PixelRect::new(-pad, -pad, (self.width() as i32).saturating_add(pad), (self.height() as i32).saturating_add(pad));
        if r.intersect(reach).is_none() && !r.is_empty() {
            return;
        }
        // i128 keeps the midpoint terms exact for guide-sized radii
        let (left, top) = (r.left as i128, r.top as i128);
        let rx = (r.right as i128 - left) / 2;
        let ry = (r.bottom as i128 - top) / 2;
        let (cx, cy) = (left + rx, top + ry);
        if rx == 0 || ry == 0 {
            self.draw_line(r.top_left(), r.bottom_right(), color, size);
            return;
        }

        let mut plot = |x: i128, y: i128| {
            for (px, py) in [(cx + x, cy + y), (cx - x, cy + y), (cx + x, cy - y), (cx - x, cy - y)] {
                self.stamp(px as i32, py as i32, color, size);
            }
        };

        let rx_sq = rx * rx;
        let ry_sq = ry * ry;
        let mut x = 0i128;
        let mut y = ry;
        let mut dx = 0i128;
        let mut dy = 2 * rx_sq * y;

        let mut p1 = ry_sq - rx_sq * ry + rx_sq / 4;
        while dx < dy {
            plot(x, y);
            x += 1;
            dx += 2 * ry_sq;
            if p1 < 0 {
                p1 += dx + ry_sq;
            } else {
                y -= 1;
                dy -= 2 * rx_sq;
                p1 += dx - dy + ry_sq;
            }
        }

        let mut p2 = ry_sq * (x + 1) * (x + 1) / 4 + rx_sq * (y - 1) * (y - 1) - rx_sq * ry_sq;
        while y >= 0 {
            plot(x, y);
            y -= 1;
            dy -= 2 * rx_sq;
            if p2 > 0 {
                p2 += rx_sq - dy;
            } else {
                x += 1;
                dx += 2 * ry_sq;
                p2 += dx - dy + rx_sq;
            }
        }
    }

    /// Solid ellipse inscribed in `rect`, sampled at pixel centers.
    fn fill_ellipse(&mut self, rect: PixelRect, color: Color) {
        let r = rect.normalized();
        if r.is_empty() {
            return;
        }
        let rx = r.width() as f32 / 2.0;
        let ry = r.height() as f32 / 2.0;
        let cx = r.left as f32 + rx;
        let cy = r.top as f32 + ry;
        for y in r.top.max(0)..r.bottom.min(self.height() as i32) {
            for x in r.left.max(0)..r.right.min(self.width() as i32) {
                let nx = (x as f32 + 0.5 - cx) / rx;
                let ny = (y as f32 + 0.5 - cy) / ry;
                if nx * nx + ny * ny <= 1.0 {
                    self.set_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
}

impl PixelBuffer for RgbaImage {
    fn width(&self) -> u32 {
        self.dimensions().0
    }

    fn height(&self) -> u32 {
        self.dimensions().1
    }

    fn pixel(&self, x: u32, y: u32) -> Color {
        *self.get_pixel(x, y)
    }

    fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        self.put_pixel(x, y, color);
    }

    fn snapshot(&self) -> RgbaImage {
        self.clone()
    }
}

// ============================================================================
// BLENDING
// ============================================================================

/// Source-over blend of `top` onto `base` (straight alpha).
pub fn blend_pixel(base: Color, top: Color) -> Color {
    // Fast paths: nothing to blend / plain overwrite
    if top[3] == 0 {
        return base;
    }
    if top[3] == 255 {
        return top;
    }

    let top_a = top[3] as f32 / 255.0;
    let base_a = base[3] as f32 / 255.0;
    let out_a = top_a + base_a * (1.0 - top_a);
    if out_a <= 0.0 {
        return TRANSPARENT;
    }

    let channel = |b: u8, t: u8| {
        let v = (t as f32 * top_a + b as f32 * base_a * (1.0 - top_a)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(base[0], top[0]),
        channel(base[1], top[1]),
        channel(base[2], top[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Blend a translucent color over every pixel of `rect`.
pub fn tint_rect(target: &mut RgbaImage, rect: PixelRect, color: Color) {
    let r = rect.normalized();
    let x1 = r.right.min(target.width() as i32);
    let y1 = r.bottom.min(target.height() as i32);
    for y in r.top.max(0)..y1 {
        for x in r.left.max(0)..x1 {
            let base = *target.get_pixel(x as u32, y as u32);
            target.put_pixel(x as u32, y as u32, blend_pixel(base, color));
        }
    }
}

/// Composite `top` over `base` in place.  Both images must share dimensions;
/// rows are blended in parallel.
pub fn blend_onto(base: &mut RgbaImage, top: &RgbaImage) {
    debug_assert_eq!(base.dimensions(), top.dimensions());
    let stride = base.width() as usize * 4;
    if stride == 0 {
        return;
    }
    let top_raw = top.as_raw();

    base.par_chunks_mut(stride)
        .zip(top_raw.par_chunks(stride))
        .for_each(|(dst_row, src_row)| {
            for (dst, src) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                if src[3] == 0 {
                    continue;
                }
                let out = blend_pixel(
                    Rgba([dst[0], dst[1], dst[2], dst[3]]),
                    Rgba([src[0], src[1], src[2], src[3]]),
                );
                dst.copy_from_slice(&out.0);
            }
        });
}
