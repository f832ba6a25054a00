//! Content anchored to the guide grid.
//!
//! An [`AnchoredRegion`] stores four guide references plus a pixel nudge,
//! never absolute coordinates.  Every query resolves against the grid passed
//! in, so grid edits and canvas resizes are picked up without invalidation.

use serde::{Deserialize, Serialize};

use crate::canvas::{PixelRect, Point};
use crate::grid::{Axis, BoundaryLines, GuideGrid, GuideLine};

// ============================================================================
// ALIGNMENT
// ============================================================================

/// Placement of content inside its anchored rectangle.  Serialized with the
/// short codes used by project files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    /// Ignore the rectangle; draw at the raw offset.
    #[default]
    #[serde(rename = "none")]
    None,
    /// Stretch to the rectangle.
    #[serde(rename = "fill")]
    Fill,
    #[serde(rename = "lt")]
    LeftTop,
    #[serde(rename = "top")]
    Top,
    #[serde(rename = "rt")]
    RightTop,
    #[serde(rename = "left")]
    Left,
    #[serde(rename = "cntr")]
    Center,
    #[serde(rename = "rght")]
    Right,
    #[serde(rename = "lb")]
    LeftBottom,
    #[serde(rename = "bttm")]
    Bottom,
    #[serde(rename = "rb")]
    RightBottom,
}

/// One axis of the 3x3 compass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Edge {
    Start,
    Middle,
    End,
}

impl Alignment {
    pub fn code(&self) -> &'static str {
        match self {
            Alignment::None => "none",
            Alignment::Fill => "fill",
            Alignment::LeftTop => "lt",
            Alignment::Top => "top",
            Alignment::RightTop => "rt",
            Alignment::Left => "left",
            Alignment::Center => "cntr",
            Alignment::Right => "rght",
            Alignment::LeftBottom => "lb",
            Alignment::Bottom => "bttm",
            Alignment::RightBottom => "rb",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        Self::all().iter().copied().find(|a| a.code() == code)
    }

    pub fn all() -> &'static [Alignment] {
        &[
            Alignment::None,
            Alignment::Fill,
            Alignment::LeftTop,
            Alignment::Top,
            Alignment::RightTop,
            Alignment::Left,
            Alignment::Center,
            Alignment::Right,
            Alignment::LeftBottom,
            Alignment::Bottom,
            Alignment::RightBottom,
        ]
    }

    /// (horizontal, vertical) compass edges; `None` for `none` / `fill`.
    fn compass(&self) -> Option<(Edge, Edge)> {
        use Edge::*;
        Some(match self {
            Alignment::LeftTop => (Start, Start),
            Alignment::Top => (Middle, Start),
            Alignment::RightTop => (End, Start),
            Alignment::Left => (Start, Middle),
            Alignment::Center => (Middle, Middle),
            Alignment::Right => (End, Middle),
            Alignment::LeftBottom => (Start, End),
            Alignment::Bottom => (Middle, End),
            Alignment::RightBottom => (End, End),
            Alignment::None | Alignment::Fill => return None,
        })
    }
}

fn align_span(edge: Edge, start: i32, end: i32, content: i32) -> i32 {
    let (start, end, content) = (start as i64, end as i64, content as i64);
    let at = match edge {
        Edge::Start => start,
        // floor division keeps odd remainders on the start side
        Edge::Middle => (start + end - content).div_euclid(2),
        Edge::End => end - content,
    };
    at.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Top-left anchor of `cw x ch` content aligned inside `rect`.  `None` for
/// the non-compass alignments.
pub fn anchor_point(rect: PixelRect, alignment: Alignment, cw: i32, ch: i32) -> Option<Point> {
    let (h, v) = alignment.compass()?;
    Some(Point::new(
        align_span(h, rect.left, rect.right, cw),
        align_span(v, rect.top, rect.bottom, ch),
    ))
}

/// Where content should be drawn, offsets already applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    /// Natural size, top-left corner here.
    At(Point),
    /// Scaled to exactly this rectangle.
    Stretch(PixelRect),
}

// ============================================================================
// ANCHORED REGION
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DragMode {
    /// Re-anchor to the guides enclosing the dragged rectangle.
    Grid,
    /// Shape endpoints snapping to the nearest guides.
    Snap,
    /// Translate by pointer movement.
    Offset,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct RegionDrag {
    mode: DragMode,
    origin: Point,
    current: Point,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnchoredRegion {
    pub left: GuideLine,
    pub right: GuideLine,
    pub top: GuideLine,
    pub bottom: GuideLine,
    pub x_offset: i32,
    pub y_offset: i32,
    pub alignment: Alignment,
    #[serde(skip)]
    drag: Option<RegionDrag>,
}

impl Default for AnchoredRegion {
    fn default() -> Self {
        Self {
            left: GuideLine::GRID_START,
            right: GuideLine::GRID_END,
            top: GuideLine::GRID_START,
            bottom: GuideLine::GRID_END,
            x_offset: 0,
            y_offset: 0,
            alignment: Alignment::None,
            drag: None,
        }
    }
}

impl AnchoredRegion {
    /// Full-canvas region with the given alignment.
    pub fn new(alignment: Alignment) -> Self {
        Self { alignment, ..Self::default() }
    }

    /// Current pixel rectangle.  Not normalized: shape endpoints may run in
    /// either direction.
    pub fn resolve_rect(&self, grid: &GuideGrid) -> PixelRect {
        PixelRect::new(
            grid.resolve_offset(Axis::Vertical, self.left),
            grid.resolve_offset(Axis::Horizontal, self.top),
            grid.resolve_offset(Axis::Vertical, self.right),
            grid.resolve_offset(Axis::Horizontal, self.bottom),
        )
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Drop any drag in progress without applying it.
    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    fn begin(&mut self, mode: DragMode, point: Point) {
        self.drag = Some(RegionDrag { mode, origin: point, current: point });
    }

    // ---- grid re-anchoring --------------------------------------------------

    pub fn begin_grid_drag(&mut self, point: Point) {
        self.begin(DragMode::Grid, point);
    }

    pub fn update_grid_drag(&mut self, point: Point) {
        if let Some(drag) = self.drag.as_mut()
            && drag.mode == DragMode::Grid
        {
            drag.current = point;
        }
    }

    /// Finish a grid drag: snap the dragged rectangle to its enclosing guides
    /// and store them as the new borders.  Returns the chosen indices, or
    /// `None` when no grid drag was active.
    pub fn end_grid_drag(&mut self, grid: &GuideGrid) -> Option<BoundaryLines> {
        let drag = self.drag.filter(|d| d.mode == DragMode::Grid)?;
        self.drag = None;
        let rect = clip_drag_rect(drag.origin, drag.current, grid.resolution());
        let bounds = grid.find_boundary_lines(rect.left, rect.top, rect.right, rect.bottom);

        let left = grid.line(Axis::Vertical, bounds.left)?;
        let right = grid.line(Axis::Vertical, bounds.right)?;
        let top = grid.line(Axis::Horizontal, bounds.top)?;
        let bottom = grid.line(Axis::Horizontal, bounds.bottom)?;
        self.left = left;
        self.right = right;
        self.top = top;
        self.bottom = bottom;

        if bounds.is_degenerate(grid) {
            crate::log_warn!("Region snapped to a zero-area rectangle ({left}..{right}, {top}..{bottom})");
        }
        Some(bounds)
    }

    /// While grid dragging: the clipped pointer rectangle and the guide
    /// rectangle it would snap to.
    pub fn grid_drag_preview(&self, grid: &GuideGrid) -> Option<(PixelRect, PixelRect)> {
        let drag = self.drag.filter(|d| d.mode == DragMode::Grid)?;
        let rect = clip_drag_rect(drag.origin, drag.current, grid.resolution());
        let b = grid.find_boundary_lines(rect.left, rect.top, rect.right, rect.bottom);
        let snapped = PixelRect::new(
            grid.offset_at(Axis::Vertical, b.left)?,
            grid.offset_at(Axis::Horizontal, b.top)?,
            grid.offset_at(Axis::Vertical, b.right)?,
            grid.offset_at(Axis::Horizontal, b.bottom)?,
        );
        Some((rect, snapped))
    }

    // ---- endpoint snapping (shapes) -----------------------------------------

    /// Snap the first endpoint (`top`/`left`) to the guides nearest `point`.
    pub fn begin_snap_drag(&mut self, point: Point, grid: &GuideGrid) {
        self.begin(DragMode::Snap, point);
        let (h, v) = grid.find_nearest(point);
        self.top = h;
        self.left = v;
    }

    /// Snap the second endpoint (`bottom`/`right`) to the guides nearest `point`.
    pub fn update_snap_drag(&mut self, point: Point, grid: &GuideGrid) {
        if let Some(drag) = self.drag.as_mut()
            && drag.mode == DragMode::Snap
        {
            drag.current = point;
            let (h, v) = grid.find_nearest(point);
            self.bottom = h;
            self.right = v;
        }
    }

    /// Pointer rectangle of an endpoint drag in progress.
    pub fn snap_drag_preview(&self) -> Option<(Point, Point)> {
        self.drag
            .filter(|d| d.mode == DragMode::Snap)
            .map(|d| (d.origin, d.current))
    }

    // ---- offset nudging -----------------------------------------------------

    pub fn begin_offset_drag(&mut self, point: Point) {
        self.begin(DragMode::Offset, point);
    }

    /// Add the pointer movement since the last update to the offsets.
    pub fn update_offset_drag(&mut self, point: Point) {
        let Some(drag) = self.drag.as_mut() else { return };
        if drag.mode != DragMode::Offset {
            return;
        }
        let (dx, dy) = (point.x - drag.current.x, point.y - drag.current.y);
        drag.current = point;
        self.nudge(dx, dy);
    }

    /// Release an offset or snap drag.  Grid drags go through
    /// [`AnchoredRegion::end_grid_drag`].
    pub fn end_drag(&mut self) {
        if self.drag.is_some_and(|d| d.mode != DragMode::Grid) {
            self.drag = None;
        }
    }

    pub fn nudge(&mut self, dx: i32, dy: i32) {
        self.x_offset += dx;
        self.y_offset += dy;
    }

    // ---- placement ----------------------------------------------------------

    /// Where `content_w x content_h` content is drawn for the current
    /// alignment, offsets included.
    pub fn placement(&self, grid: &GuideGrid, content_w: u32, content_h: u32) -> Placement {
        let rect = self.resolve_rect(grid);
        match self.alignment {
            Alignment::None => Placement::At(Point::new(self.x_offset, self.y_offset)),
            Alignment::Fill => Placement::Stretch(rect.translate(self.x_offset, self.y_offset)),
            alignment => {
                let anchor = anchor_point(rect, alignment, content_w as i32, content_h as i32)
                    .unwrap_or_else(|| rect.top_left());
                Placement::At(anchor.offset(self.x_offset, self.y_offset))
            }
        }
    }
}

/// Normalize two drag points and pull them one pixel inside the canvas, so
/// a drag reaching the border never snaps past the edge guides.
fn clip_drag_rect(a: Point, b: Point, (width, height): (u32, u32)) -> PixelRect {
    let r = PixelRect::from_corners(a, b);
    PixelRect::new(
        r.left.max(1),
        r.top.max(1),
        r.right.min(width as i32 - 1),
        r.bottom.min(height as i32 - 1),
    )
}
