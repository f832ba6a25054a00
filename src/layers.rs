//! Layer variants and the capability interface the scene drives them through.
//!
//! Every variant paints into a full-canvas `RgbaImage`; positionable variants
//! (image, shape, text) keep their geometry in an [`AnchoredRegion`] and
//! resolve it against the scene's grid on each call.

use std::fmt;

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::canvas::{Color, PixelBuffer, PixelRect, Point, TRANSPARENT, tint_rect};
use crate::fill::{FillError, FillReport, flood_fill};
use crate::grid::GuideGrid;
use crate::region::{Alignment, AnchoredRegion, Placement};

/// Translucent blue used for snap previews.
pub const PREVIEW_TINT: Color = Rgba([0, 0, 255, 64]);
const OUTLINE: Color = Rgba([0, 0, 0, 255]);
/// Half side of the endpoint markers drawn while snapping a shape.
const HANDLE_RADIUS: i32 = 16;

// ============================================================================
// SHARED TYPES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerKind {
    Bitmap,
    Image,
    Shape,
    Text,
}

impl LayerKind {
    pub fn code(&self) -> &'static str {
        match self {
            LayerKind::Bitmap => "bmp",
            LayerKind::Image => "img",
            LayerKind::Shape => "shp",
            LayerKind::Text => "txt",
        }
    }

    /// Whether the layer is lifted above its siblings while it has focus.
    pub fn raises_on_focus(&self) -> bool {
        matches!(self, LayerKind::Text)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerEvent {
    Press(Point),
    Move(Point),
    Release(Point),
}

impl PointerEvent {
    pub fn point(&self) -> Point {
        match *self {
            PointerEvent::Press(p) | PointerEvent::Move(p) | PointerEvent::Release(p) => p,
        }
    }
}

/// Read-only view of the scene handed to a layer.
#[derive(Clone, Copy)]
pub struct SceneContext<'a> {
    pub grid: &'a GuideGrid,
    /// This layer is the active one.
    pub focused: bool,
}

impl<'a> SceneContext<'a> {
    pub fn new(grid: &'a GuideGrid, focused: bool) -> Self {
        Self { grid, focused }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayerError {
    Fill(FillError),
}

impl fmt::Display for LayerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LayerError::Fill(e) => write!(f, "fill failed: {}", e),
        }
    }
}

impl std::error::Error for LayerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LayerError::Fill(e) => Some(e),
        }
    }
}

impl From<FillError> for LayerError {
    fn from(e: FillError) -> Self {
        LayerError::Fill(e)
    }
}

/// Capabilities shared by every layer variant.
pub trait LayerBehavior {
    /// Canvas rectangle the layer currently occupies, `None` when it draws
    /// nothing.
    fn resolve_geometry(&self, ctx: &SceneContext) -> Option<PixelRect>;

    /// Draw the layer (and any drag preview) into a canvas-sized target.
    fn paint(&self, target: &mut RgbaImage, ctx: &SceneContext);

    /// Returns `true` when the layer changed and needs a repaint.
    fn handle_pointer(&mut self, event: PointerEvent, ctx: &SceneContext) -> Result<bool, LayerError>;

    /// Canvas resized.  Anchored layers re-resolve on their own.
    fn set_resolution(&mut self, _width: u32, _height: u32, _stretch: bool) {}
}

/// How a positionable layer reacts to the pointer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionTool {
    #[default]
    None,
    /// Re-anchor to the grid (image, text) or snap endpoints (shape).
    Grid,
    /// Nudge the offsets.
    Offset,
}

fn overlay_at(target: &mut RgbaImage, img: &RgbaImage, at: Point) {
    imageops::overlay(target, img, at.x as i64, at.y as i64);
}

/// Resample the part of `source` that lands on the canvas when stretched over
/// `dest`.  Only the visible window is allocated, whatever the size of `dest`.
fn stretch_visible(source: &RgbaImage, dest: PixelRect, (cw, ch): (u32, u32)) -> Option<(RgbaImage, Point)> {
    let canvas = PixelRect::new(0, 0, cw as i32, ch as i32);
    let vis = dest.intersect(canvas)?;
    let (sw, sh) = source.dimensions();
    if sw == 0 || sh == 0 {
        return None;
    }
    // source columns/rows covering [from, to) of the destination span
    let window = |from: i32, to: i32, start: i32, len: i32, src: u32| -> (u32, u32) {
        let scale = src as f64 / len as f64;
        let a = ((from as f64 - start as f64) * scale).floor().clamp(0.0, src as f64 - 1.0) as u32;
        let b = ((to as f64 - start as f64) * scale).ceil().clamp(a as f64 + 1.0, src as f64) as u32;
        (a, b - a)
    };
    let (sx, cw_src) = window(vis.left, vis.right, dest.left, dest.width(), sw);
    let (sy, ch_src) = window(vis.top, vis.bottom, dest.top, dest.height(), sh);
    let crop = imageops::crop_imm(source, sx, sy, cw_src, ch_src).to_image();
    let stretched = imageops::resize(&crop, vis.width() as u32, vis.height() as u32, FilterType::Triangle);
    Some((stretched, vis.top_left()))
}

/// Dragged rectangle outline plus a tint over the guide cell it will snap to.
fn paint_grid_preview(target: &mut RgbaImage, region: &AnchoredRegion, grid: &GuideGrid) {
    if let Some((drag, snapped)) = region.grid_drag_preview(grid) {
        target.draw_rect(drag, OUTLINE, 1);
        tint_rect(target, snapped, PREVIEW_TINT);
    }
}

// ============================================================================
// BITMAP
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BitmapTool {
    #[default]
    None,
    Brush,
    Eraser,
    Line,
    Rect,
    Oval,
    Fill,
}

#[derive(Clone, Copy, Debug)]
struct Stroke {
    start: Point,
    last: Point,
}

/// Free-hand raster layer covering the whole canvas.
#[derive(Clone, Debug)]
pub struct BitmapLayer {
    pub pixels: RgbaImage,
    pub tool: BitmapTool,
    pub color: Color,
    pub width: u32,
    stroke: Option<Stroke>,
    last_fill: Option<FillReport>,
}

impl BitmapLayer {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_pixels(RgbaImage::from_pixel(width, height, TRANSPARENT))
    }

    pub fn from_pixels(pixels: RgbaImage) -> Self {
        Self {
            pixels,
            tool: BitmapTool::None,
            color: Rgba([0, 0, 0, 255]),
            width: 1,
            stroke: None,
            last_fill: None,
        }
    }

    pub fn set_tool(&mut self, tool: BitmapTool, color: Color, width: u32) {
        self.tool = tool;
        self.color = color;
        self.width = width.max(1);
        self.stroke = None;
    }

    /// Bucket fill straight on the layer pixels.
    pub fn fill(&mut self, seed: Point, color: Color) -> Result<FillReport, FillError> {
        let report = flood_fill(&mut self.pixels, seed, color)?;
        self.last_fill = Some(report);
        Ok(report)
    }

    /// Report of the most recent fill on this layer.
    pub fn last_fill(&self) -> Option<FillReport> {
        self.last_fill
    }

    fn commit_shape(&mut self, stroke: Stroke) {
        let rect = PixelRect::from_corners(stroke.start, stroke.last);
        match self.tool {
            BitmapTool::Line => self.pixels.draw_line(stroke.start, stroke.last, self.color, self.width),
            BitmapTool::Rect => self.pixels.draw_rect(rect, self.color, self.width),
            BitmapTool::Oval => self.pixels.draw_ellipse(rect, self.color, self.width),
            _ => {}
        }
    }
}

impl LayerBehavior for BitmapLayer {
    fn resolve_geometry(&self, _ctx: &SceneContext) -> Option<PixelRect> {
        let (w, h) = self.pixels.dimensions();
        Some(PixelRect::new(0, 0, w as i32, h as i32))
    }

    fn paint(&self, target: &mut RgbaImage, _ctx: &SceneContext) {
        overlay_at(target, &self.pixels, Point::default());

        // Outline preview of a shape still being dragged
        if let Some(stroke) = self.stroke {
            let rect = PixelRect::from_corners(stroke.start, stroke.last);
            match self.tool {
                BitmapTool::Line => target.draw_line(stroke.start, stroke.last, OUTLINE, 1),
                BitmapTool::Rect => target.draw_rect(rect, OUTLINE, 1),
                BitmapTool::Oval => target.draw_ellipse(rect, OUTLINE, 1),
                _ => {}
            }
        }
    }

    fn handle_pointer(&mut self, event: PointerEvent, _ctx: &SceneContext) -> Result<bool, LayerError> {
        if self.tool == BitmapTool::None {
            return Ok(false);
        }
        match event {
            PointerEvent::Press(p) => {
                self.stroke = Some(Stroke { start: p, last: p });
                Ok(false)
            }
            PointerEvent::Move(p) => {
                let Some(stroke) = self.stroke.as_mut() else { return Ok(false) };
                match self.tool {
                    BitmapTool::Brush => self.pixels.draw_line(stroke.last, p, self.color, self.width),
                    BitmapTool::Eraser => self.pixels.draw_line(stroke.last, p, TRANSPARENT, self.width),
                    BitmapTool::Fill => return Ok(false),
                    _ => {}
                }
                stroke.last = p;
                Ok(true)
            }
            PointerEvent::Release(p) => {
                let Some(mut stroke) = self.stroke.take() else { return Ok(false) };
                if self.tool == BitmapTool::Fill {
                    // seeded where the button went down
                    self.fill(stroke.start, self.color)?;
                    return Ok(true);
                }
                if matches!(self.tool, BitmapTool::Brush | BitmapTool::Eraser) {
                    return Ok(true);
                }
                stroke.last = p;
                self.commit_shape(stroke);
                Ok(true)
            }
        }
    }

    fn set_resolution(&mut self, width: u32, height: u32, stretch: bool) {
        if self.pixels.dimensions() == (width, height) {
            return;
        }
        self.pixels = if stretch {
            imageops::resize(&self.pixels, width, height, FilterType::Triangle)
        } else {
            let mut resized = RgbaImage::from_pixel(width, height, TRANSPARENT);
            imageops::replace(&mut resized, &self.pixels, 0, 0);
            resized
        };
        self.stroke = None;
    }
}

// ============================================================================
// IMAGE
// ============================================================================

/// Raster image placed inside an anchored region.
#[derive(Clone, Debug)]
pub struct ImageLayer {
    source: RgbaImage,
    scaled: RgbaImage,
    scale_percent: u32,
    pub tool: RegionTool,
    pub region: AnchoredRegion,
}

impl ImageLayer {
    pub fn new(source: RgbaImage, alignment: Alignment) -> Self {
        Self {
            scaled: source.clone(),
            source,
            scale_percent: 100,
            tool: RegionTool::None,
            region: AnchoredRegion::new(alignment),
        }
    }

    pub fn source(&self) -> &RgbaImage {
        &self.source
    }

    pub fn scale_percent(&self) -> u32 {
        self.scale_percent
    }

    /// Natural-size content after scaling.
    pub fn content_size(&self) -> (u32, u32) {
        self.scaled.dimensions()
    }

    /// Scale the natural size by `percent` (at least 1 px per side).
    pub fn set_scale(&mut self, percent: u32) {
        let percent = percent.max(1);
        self.scale_percent = percent;
        if percent == 100 {
            self.scaled = self.source.clone();
            return;
        }
        let (w, h) = self.source.dimensions();
        let sw = ((w as u64 * percent as u64) / 100).max(1) as u32;
        let sh = ((h as u64 * percent as u64) / 100).max(1) as u32;
        self.scaled = imageops::resize(&self.source, sw, sh, FilterType::Triangle);
    }

    pub fn set_image(&mut self, source: RgbaImage) {
        self.source = source;
        self.set_scale(self.scale_percent);
    }
}

impl LayerBehavior for ImageLayer {
    fn resolve_geometry(&self, ctx: &SceneContext) -> Option<PixelRect> {
        let (w, h) = self.content_size();
        Some(match self.region.placement(ctx.grid, w, h) {
            Placement::At(p) => PixelRect::new(p.x, p.y, p.x.saturating_add(w as i32), p.y.saturating_add(h as i32)),
            Placement::Stretch(rect) => rect.normalized(),
        })
    }

    fn paint(&self, target: &mut RgbaImage, ctx: &SceneContext) {
        let (w, h) = self.content_size();
        match self.region.placement(ctx.grid, w, h) {
            Placement::At(p) => overlay_at(target, &self.scaled, p),
            Placement::Stretch(rect) => {
                if let Some((stretched, at)) = stretch_visible(&self.source, rect.normalized(), target.dimensions()) {
                    overlay_at(target, &stretched, at);
                }
            }
        }
        if ctx.focused {
            paint_grid_preview(target, &self.region, ctx.grid);
        }
    }

    fn handle_pointer(&mut self, event: PointerEvent, ctx: &SceneContext) -> Result<bool, LayerError> {
        let region = &mut self.region;
        match (self.tool, event) {
            (RegionTool::Grid, PointerEvent::Press(p)) => region.begin_grid_drag(p),
            (RegionTool::Grid, PointerEvent::Move(p)) => region.update_grid_drag(p),
            (RegionTool::Grid, PointerEvent::Release(p)) => {
                region.update_grid_drag(p);
                region.end_grid_drag(ctx.grid);
            }
            (RegionTool::Offset, PointerEvent::Press(p)) => region.begin_offset_drag(p),
            (RegionTool::Offset, PointerEvent::Move(p)) => region.update_offset_drag(p),
            (RegionTool::Offset, PointerEvent::Release(p)) => {
                region.update_offset_drag(p);
                region.end_drag();
            }
            (RegionTool::None, _) => return Ok(false),
        }
        Ok(true)
    }
}

// ============================================================================
// SHAPE
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    #[default]
    None,
    Line,
    Rect,
    Oval,
}

/// Vector shape whose two endpoints snap to guides.
///
/// The first endpoint lives in `region.left` / `region.top`, the second in
/// `region.right` / `region.bottom`, so the rect is not normalized.
#[derive(Clone, Debug)]
pub struct ShapeLayer {
    pub shape: ShapeKind,
    pub line_color: Color,
    pub fill_color: Color,
    pub stroke_width: u32,
    pub tool: RegionTool,
    pub region: AnchoredRegion,
}

impl Default for ShapeLayer {
    fn default() -> Self {
        Self {
            shape: ShapeKind::None,
            line_color: OUTLINE,
            fill_color: OUTLINE,
            stroke_width: 1,
            tool: RegionTool::None,
            region: AnchoredRegion::default(),
        }
    }
}

impl ShapeLayer {
    pub fn new(shape: ShapeKind) -> Self {
        Self { shape, ..Self::default() }
    }

    fn endpoints(&self, grid: &GuideGrid) -> PixelRect {
        self.region
            .resolve_rect(grid)
            .translate(self.region.x_offset, self.region.y_offset)
    }
}

impl LayerBehavior for ShapeLayer {
    fn resolve_geometry(&self, ctx: &SceneContext) -> Option<PixelRect> {
        (self.shape != ShapeKind::None).then(|| self.endpoints(ctx.grid).normalized())
    }

    fn paint(&self, target: &mut RgbaImage, ctx: &SceneContext) {
        let rect = self.endpoints(ctx.grid);
        let stroke = self.stroke_width.max(1);
        match self.shape {
            ShapeKind::None => return,
            ShapeKind::Line => target.draw_line(rect.top_left(), rect.bottom_right(), self.line_color, stroke),
            ShapeKind::Rect => {
                target.fill_rect(rect, self.fill_color);
                target.draw_rect(rect, self.line_color, stroke);
            }
            ShapeKind::Oval => {
                target.fill_ellipse(rect, self.fill_color);
                target.draw_ellipse(rect, self.line_color, stroke);
            }
        }

        if ctx.focused && self.tool == RegionTool::Grid && self.region.snap_drag_preview().is_some() {
            for end in [rect.top_left(), rect.bottom_right()] {
                let handle = PixelRect::new(
                    end.x - HANDLE_RADIUS,
                    end.y - HANDLE_RADIUS,
                    end.x + HANDLE_RADIUS,
                    end.y + HANDLE_RADIUS,
                );
                tint_rect(target, handle, PREVIEW_TINT);
            }
        }
    }

    fn handle_pointer(&mut self, event: PointerEvent, ctx: &SceneContext) -> Result<bool, LayerError> {
        let region = &mut self.region;
        match (self.tool, event) {
            (RegionTool::Grid, PointerEvent::Press(p)) => region.begin_snap_drag(p, ctx.grid),
            (RegionTool::Grid, PointerEvent::Move(p)) => region.update_snap_drag(p, ctx.grid),
            (RegionTool::Grid, PointerEvent::Release(_)) => region.end_drag(),
            (RegionTool::Offset, PointerEvent::Press(p)) => region.begin_offset_drag(p),
            (RegionTool::Offset, PointerEvent::Move(p)) => region.update_offset_drag(p),
            (RegionTool::Offset, PointerEvent::Release(p)) => {
                region.update_offset_drag(p);
                region.end_drag();
            }
            (RegionTool::None, _) => return Ok(false),
        }
        Ok(true)
    }
}

// ============================================================================
// TEXT
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Character formatting carried for the external text renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub color: [u8; 4],
    pub font: String,
    pub size: f32,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub align: TextAlign,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: [0, 0, 0, 255],
            font: "Verdana".to_string(),
            size: 32.0,
            bold: false,
            italic: false,
            underline: false,
            align: TextAlign::Left,
        }
    }
}

/// Text box anchored to the grid.  Glyphs are rendered elsewhere; the layer
/// only owns the box and draws its outline while focused.
#[derive(Clone, Debug, Default)]
pub struct TextLayer {
    pub text: String,
    pub style: TextStyle,
    pub region: AnchoredRegion,
}

impl TextLayer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }
}

impl LayerBehavior for TextLayer {
    fn resolve_geometry(&self, ctx: &SceneContext) -> Option<PixelRect> {
        Some(self.region.resolve_rect(ctx.grid))
    }

    fn paint(&self, target: &mut RgbaImage, ctx: &SceneContext) {
        if !ctx.focused {
            return;
        }
        target.draw_rect(self.region.resolve_rect(ctx.grid), OUTLINE, 1);
        paint_grid_preview(target, &self.region, ctx.grid);
    }

    fn handle_pointer(&mut self, event: PointerEvent, ctx: &SceneContext) -> Result<bool, LayerError> {
        match event {
            PointerEvent::Press(p) => self.region.begin_grid_drag(p),
            PointerEvent::Move(p) => self.region.update_grid_drag(p),
            PointerEvent::Release(p) => {
                self.region.update_grid_drag(p);
                self.region.end_grid_drag(ctx.grid);
            }
        }
        Ok(true)
    }
}

// ============================================================================
// LAYER
// ============================================================================

#[derive(Clone, Debug)]
pub enum LayerContent {
    Bitmap(BitmapLayer),
    Image(ImageLayer),
    Shape(ShapeLayer),
    Text(TextLayer),
}

impl LayerContent {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerContent::Bitmap(_) => LayerKind::Bitmap,
            LayerContent::Image(_) => LayerKind::Image,
            LayerContent::Shape(_) => LayerKind::Shape,
            LayerContent::Text(_) => LayerKind::Text,
        }
    }

    pub fn behavior(&self) -> &dyn LayerBehavior {
        match self {
            LayerContent::Bitmap(l) => l,
            LayerContent::Image(l) => l,
            LayerContent::Shape(l) => l,
            LayerContent::Text(l) => l,
        }
    }

    pub fn behavior_mut(&mut self) -> &mut dyn LayerBehavior {
        match self {
            LayerContent::Bitmap(l) => l,
            LayerContent::Image(l) => l,
            LayerContent::Shape(l) => l,
            LayerContent::Text(l) => l,
        }
    }

    /// Anchored geometry, if the variant is positionable.
    pub fn region(&self) -> Option<&AnchoredRegion> {
        match self {
            LayerContent::Bitmap(_) => None,
            LayerContent::Image(l) => Some(&l.region),
            LayerContent::Shape(l) => Some(&l.region),
            LayerContent::Text(l) => Some(&l.region),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Layer {
    pub id: Uuid,
    pub name: String,
    pub visible: bool,
    /// Stacking order; higher draws later.
    pub z: i32,
    pub content: LayerContent,
}

impl Layer {
    pub fn new(name: impl Into<String>, content: LayerContent) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            visible: true,
            z: 0,
            content,
        }
    }

    pub fn kind(&self) -> LayerKind {
        self.content.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Color = Rgba([255, 0, 0, 255]);

    fn drag(layer: &mut dyn LayerBehavior, ctx: &SceneContext, from: Point, to: Point) -> bool {
        layer.handle_pointer(PointerEvent::Press(from), ctx).unwrap();
        layer.handle_pointer(PointerEvent::Move(to), ctx).unwrap();
        layer.handle_pointer(PointerEvent::Release(to), ctx).unwrap()
    }

    #[test]
    fn kind_codes_and_focus_raise() {
        assert_eq!(LayerKind::Bitmap.code(), "bmp");
        assert_eq!(LayerKind::Text.code(), "txt");
        assert!(LayerKind::Text.raises_on_focus());
        assert!(!LayerKind::Image.raises_on_focus());
    }

    #[test]
    fn bitmap_fill_tool_fills_on_release() {
        let grid = GuideGrid::new(10, 10);
        let ctx = SceneContext::new(&grid, true);
        let mut layer = BitmapLayer::new(10, 10);
        layer.pixels.draw_line(Point::new(5, 0), Point::new(5, 9), OUTLINE, 1);
        layer.set_tool(BitmapTool::Fill, RED, 1);

        assert!(!layer.handle_pointer(PointerEvent::Press(Point::new(1, 1)), &ctx).unwrap());
        assert!(layer.handle_pointer(PointerEvent::Release(Point::new(8, 8)), &ctx).unwrap());
        // seed is the press point, left of the wall
        assert_eq!(layer.last_fill().map(|r| r.painted), Some(50));
        assert_eq!(layer.pixels.pixel(0, 9), RED);
        assert_eq!(layer.pixels.pixel(8, 8), TRANSPARENT);
    }

    #[test]
    fn bitmap_fill_outside_canvas_errors() {
        let grid = GuideGrid::new(4, 4);
        let ctx = SceneContext::new(&grid, true);
        let mut layer = BitmapLayer::new(4, 4);
        layer.set_tool(BitmapTool::Fill, RED, 1);
        layer.handle_pointer(PointerEvent::Press(Point::new(9, 1)), &ctx).unwrap();
        let err = layer.handle_pointer(PointerEvent::Release(Point::new(9, 1)), &ctx).unwrap_err();
        assert!(matches!(err, LayerError::Fill(FillError::InvalidSeed { x: 9, .. })));
        assert!(layer.pixels.pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn brush_and_eraser_paint_along_the_drag() {
        let grid = GuideGrid::new(8, 4);
        let ctx = SceneContext::new(&grid, true);
        let mut layer = BitmapLayer::new(8, 4);
        layer.set_tool(BitmapTool::Brush, RED, 1);
        drag(&mut layer, &ctx, Point::new(0, 1), Point::new(6, 1));
        assert!((0..=6).all(|x| layer.pixels.pixel(x, 1) == RED));
        assert_eq!(layer.pixels.pixel(7, 1), TRANSPARENT);

        layer.set_tool(BitmapTool::Eraser, RED, 1);
        drag(&mut layer, &ctx, Point::new(2, 1), Point::new(3, 1));
        assert_eq!(layer.pixels.pixel(2, 1), TRANSPARENT);
        assert_eq!(layer.pixels.pixel(4, 1), RED);
    }

    #[test]
    fn rect_tool_commits_on_release_only() {
        let grid = GuideGrid::new(10, 10);
        let ctx = SceneContext::new(&grid, true);
        let mut layer = BitmapLayer::new(10, 10);
        layer.set_tool(BitmapTool::Rect, RED, 1);
        layer.handle_pointer(PointerEvent::Press(Point::new(7, 7)), &ctx).unwrap();
        layer.handle_pointer(PointerEvent::Move(Point::new(2, 2)), &ctx).unwrap();
        assert!(layer.pixels.pixels().all(|p| *p == TRANSPARENT));

        layer.handle_pointer(PointerEvent::Release(Point::new(1, 1)), &ctx).unwrap();
        assert_eq!(layer.pixels.pixel(1, 1), RED);
        assert_eq!(layer.pixels.pixel(7, 4), RED);
        assert_eq!(layer.pixels.pixel(4, 4), TRANSPARENT);
    }

    #[test]
    fn bitmap_resize_crops_or_stretches() {
        let mut layer = BitmapLayer::from_pixels(RgbaImage::from_pixel(4, 4, RED));
        layer.set_resolution(6, 2, false);
        assert_eq!(layer.pixels.dimensions(), (6, 2));
        assert_eq!(layer.pixels.pixel(3, 1), RED);
        assert_eq!(layer.pixels.pixel(5, 0), TRANSPARENT);

        layer.set_resolution(12, 4, true);
        assert_eq!(layer.pixels.dimensions(), (12, 4));
    }

    #[test]
    fn centered_image_paints_at_anchor() {
        let grid = GuideGrid::new(200, 100);
        let ctx = SceneContext::new(&grid, false);
        let layer = ImageLayer::new(RgbaImage::from_pixel(40, 20, RED), Alignment::Center);
        assert_eq!(layer.resolve_geometry(&ctx), Some(PixelRect::new(80, 40, 120, 60)));

        let mut target = RgbaImage::new(200, 100);
        layer.paint(&mut target, &ctx);
        assert_eq!(target.pixel(80, 40), RED);
        assert_eq!(target.pixel(119, 59), RED);
        assert_eq!(target.pixel(79, 40), TRANSPARENT);
        assert_eq!(target.pixel(120, 59), TRANSPARENT);
    }

    #[test]
    fn stretched_image_beyond_canvas_paints_visible_part() {
        use crate::grid::GuideLine;

        let grid = GuideGrid::new(100, 100);
        let ctx = SceneContext::new(&grid, false);
        let mut layer = ImageLayer::new(RgbaImage::from_pixel(4, 4, RED), Alignment::Fill);
        layer.region.right = GuideLine::relative(100_000);
        layer.region.bottom = GuideLine::relative(100_000);
        assert_eq!(layer.resolve_geometry(&ctx), Some(PixelRect::new(0, 0, 100_000, 100_000)));

        let mut target = RgbaImage::new(100, 100);
        layer.paint(&mut target, &ctx);
        assert_eq!(target.pixel(0, 0), RED);
        assert_eq!(target.pixel(99, 99), RED);

        // left half of the stretch is off-canvas, so only the green column shows
        let mut two = RgbaImage::from_pixel(2, 1, RED);
        two.put_pixel(1, 0, Rgba([0, 255, 0, 255]));
        let mut layer = ImageLayer::new(two, Alignment::Fill);
        layer.region.left = GuideLine::relative(-100);
        let mut target = RgbaImage::new(100, 100);
        layer.paint(&mut target, &ctx);
        assert_eq!(target.pixel(0, 50), Rgba([0, 255, 0, 255]));
        assert_eq!(target.pixel(99, 0), Rgba([0, 255, 0, 255]));

        layer.region.right = GuideLine::relative(-50);
        let mut target = RgbaImage::new(100, 100);
        layer.paint(&mut target, &ctx);
        assert_eq!(target, RgbaImage::new(100, 100));
    }

    #[test]
    fn image_scale_changes_content_size() {
        let mut layer = ImageLayer::new(RgbaImage::from_pixel(40, 20, RED), Alignment::LeftTop);
        layer.set_scale(50);
        assert_eq!(layer.content_size(), (20, 10));
        layer.set_scale(0);
        assert_eq!(layer.scale_percent(), 1);
        assert_eq!(layer.content_size(), (1, 1));
    }

    #[test]
    fn image_grid_tool_reanchors_region() {
        let mut grid = GuideGrid::new(200, 100);
        grid.add(crate::grid::Axis::Vertical, crate::grid::GuideLine::absolute(100));
        let ctx = SceneContext::new(&grid, true);
        let mut layer = ImageLayer::new(RgbaImage::from_pixel(10, 10, RED), Alignment::Fill);
        layer.tool = RegionTool::Grid;
        drag(&mut layer, &ctx, Point::new(120, 10), Point::new(180, 90));
        assert_eq!(layer.resolve_geometry(&ctx), Some(PixelRect::new(100, 0, 200, 100)));

        layer.tool = RegionTool::Offset;
        drag(&mut layer, &ctx, Point::new(0, 0), Point::new(-10, 5));
        assert_eq!(layer.resolve_geometry(&ctx), Some(PixelRect::new(90, 5, 190, 105)));
    }

    #[test]
    fn shape_rect_paints_fill_and_outline() {
        let grid = GuideGrid::new(20, 20);
        let ctx = SceneContext::new(&grid, false);
        let mut layer = ShapeLayer::new(ShapeKind::Rect);
        layer.fill_color = RED;
        layer.tool = RegionTool::Grid;
        // snaps to the canvas corners
        drag(&mut layer, &ctx, Point::new(2, 3), Point::new(17, 18));
        assert_eq!(layer.resolve_geometry(&ctx), Some(PixelRect::new(0, 0, 20, 20)));

        let mut target = RgbaImage::new(20, 20);
        layer.paint(&mut target, &ctx);
        assert_eq!(target.pixel(0, 5), OUTLINE);
        assert_eq!(target.pixel(10, 10), RED);
    }

    #[test]
    fn shape_none_has_no_geometry() {
        let grid = GuideGrid::new(20, 20);
        let ctx = SceneContext::new(&grid, false);
        let layer = ShapeLayer::default();
        assert_eq!(layer.resolve_geometry(&ctx), None);
        let mut target = RgbaImage::new(20, 20);
        layer.paint(&mut target, &ctx);
        assert!(target.pixels().all(|p| *p == TRANSPARENT));
    }

    #[test]
    fn text_box_outline_only_when_focused() {
        let grid = GuideGrid::new(30, 30);
        let layer = TextLayer::new("hello");
        let mut target = RgbaImage::new(30, 30);
        layer.paint(&mut target, &SceneContext::new(&grid, false));
        assert!(target.pixels().all(|p| *p == TRANSPARENT));

        layer.paint(&mut target, &SceneContext::new(&grid, true));
        assert_eq!(target.pixel(0, 0), OUTLINE);
        assert_eq!(target.pixel(15, 15), TRANSPARENT);
    }
}
