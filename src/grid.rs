//! Guide grid: user-placed horizontal / vertical alignment lines.
//!
//! A guide is either an absolute pixel offset or a percentage of the canvas
//! dimension perpendicular to it (horizontal guides follow the canvas
//! height, vertical guides the width).  Both axes are kept sorted by resolved
//! offset at the grid's current resolution, so every search below can rely on
//! the order.  Nothing here caches pixel positions: a guide is resolved each
//! time it is asked for.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::canvas::{Color, PixelBuffer, Point};

// ============================================================================
// GUIDE LINES
// ============================================================================

/// Orientation of a guide line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// Runs left to right; positioned along the canvas height.
    Horizontal,
    /// Runs top to bottom; positioned along the canvas width.
    Vertical,
}

impl Axis {
    pub fn label(&self) -> &'static str {
        match self {
            Axis::Horizontal => "horizontal",
            Axis::Vertical => "vertical",
        }
    }

    pub fn all() -> [Axis; 2] {
        [Axis::Horizontal, Axis::Vertical]
    }
}

/// How a guide's value is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndentKind {
    /// Pixels from the top (horizontal) or left (vertical) edge.
    Absolute,
    /// Percent of the perpendicular canvas dimension. Not clamped.
    Relative,
}

impl IndentKind {
    /// Persisted `indentType` code.
    pub fn to_u8(self) -> u8 {
        match self {
            IndentKind::Absolute => 0,
            IndentKind::Relative => 1,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(IndentKind::Absolute),
            1 => Some(IndentKind::Relative),
            _ => None,
        }
    }
}

/// A single guide.  Equality is structural: two guides with the same kind
/// and value are interchangeable.
///
/// Persists as the 2-tuple `(indentType, indent)` with `0 = Absolute` and
/// `1 = Relative`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "(u8, i32)", try_from = "(u8, i32)")]
pub struct GuideLine {
    pub kind: IndentKind,
    pub value: i32,
}

impl GuideLine {
    /// Leading grid boundary (top / left edge).
    pub const GRID_START: GuideLine = GuideLine::relative(0);
    /// Trailing grid boundary (bottom / right edge).
    pub const GRID_END: GuideLine = GuideLine::relative(100);

    pub const fn absolute(px: i32) -> Self {
        Self { kind: IndentKind::Absolute, value: px }
    }

    pub const fn relative(percent: i32) -> Self {
        Self { kind: IndentKind::Relative, value: percent }
    }

    pub fn is_boundary(&self) -> bool {
        *self == Self::GRID_START || *self == Self::GRID_END
    }

    /// Pixel offset of this guide on a `width x height` canvas.
    pub fn resolve(&self, axis: Axis, width: u32, height: u32) -> i32 {
        resolve_offset(axis, *self, width, height)
    }
}

impl fmt::Display for GuideLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            IndentKind::Absolute => write!(f, "{}px", self.value),
            IndentKind::Relative => write!(f, "{}%", self.value),
        }
    }
}

impl From<GuideLine> for (u8, i32) {
    fn from(line: GuideLine) -> Self {
        (line.kind.to_u8(), line.value)
    }
}

impl TryFrom<(u8, i32)> for GuideLine {
    type Error = GridError;

    fn try_from((kind, value): (u8, i32)) -> Result<Self, Self::Error> {
        let kind = IndentKind::from_u8(kind).ok_or(GridError::InvalidIndentType(kind))?;
        Ok(Self { kind, value })
    }
}

/// Resolve a guide to a pixel offset.
///
/// Relative guides give `floor(dimension / 100 * value)`, evaluated exactly in
/// integer arithmetic so `100%` always lands on the dimension itself.  Values
/// outside `[0, dimension]` are returned as-is, saturated to the `i32` range.
pub fn resolve_offset(axis: Axis, line: GuideLine, width: u32, height: u32) -> i32 {
    match line.kind {
        IndentKind::Absolute => line.value,
        IndentKind::Relative => {
            let dimension = match axis {
                Axis::Horizontal => height,
                Axis::Vertical => width,
            } as i64;
            let px = (dimension * line.value as i64).div_euclid(100);
            px.clamp(i32::MIN as i64, i32::MAX as i64) as i32
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GridError {
    /// No guide structurally equal to `line` on that axis.
    GuideNotFound { axis: Axis, line: GuideLine },
    /// Deleting `line` would leave the axis without a grid boundary.
    ProtectedBoundary { axis: Axis, line: GuideLine },
    /// Persisted `indentType` was neither 0 nor 1.
    InvalidIndentType(u8),
}

impl fmt::Display for GridError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GridError::GuideNotFound { axis, line } => {
                write!(f, "no {} guide at {}", axis.label(), line)
            }
            GridError::ProtectedBoundary { axis, line } => {
                write!(f, "the {} grid boundary at {} cannot be deleted", axis.label(), line)
            }
            GridError::InvalidIndentType(v) => write!(f, "invalid guide indent type {}", v),
        }
    }
}

impl std::error::Error for GridError {}

// ============================================================================
// GRID
// ============================================================================

/// Indices of the guides enclosing a rectangle, into the sorted sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundaryLines {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
}

impl BoundaryLines {
    /// True when the snapped rectangle has zero width or height.  Callers
    /// may still accept such a region.
    pub fn is_degenerate(&self, grid: &GuideGrid) -> bool {
        let offset = |axis, idx| grid.offset_at(axis, idx);
        offset(Axis::Vertical, self.left) >= offset(Axis::Vertical, self.right)
            || offset(Axis::Horizontal, self.top) >= offset(Axis::Horizontal, self.bottom)
    }
}

/// Persistence snapshot of both guide sequences.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuideSet {
    pub h: Vec<GuideLine>,
    pub v: Vec<GuideLine>,
}

#[derive(Clone, Debug)]
pub struct GuideGrid {
    width: u32,
    height: u32,
    horizontals: Vec<GuideLine>,
    verticals: Vec<GuideLine>,
}

impl GuideGrid {
    /// Empty grid (boundaries only) for a `width x height` canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            horizontals: vec![GuideLine::GRID_START, GuideLine::GRID_END],
            verticals: vec![GuideLine::GRID_START, GuideLine::GRID_END],
        }
    }

    /// Rebuild a grid from persisted sequences.  Missing boundaries are
    /// re-seeded and both axes are sorted for the given resolution.
    pub fn from_guides(guides: GuideSet, width: u32, height: u32) -> Self {
        let mut grid = Self {
            width,
            height,
            horizontals: guides.h,
            verticals: guides.v,
        };
        for axis in Axis::all() {
            let lines = grid.lines_mut(axis);
            for boundary in [GuideLine::GRID_START, GuideLine::GRID_END] {
                if !lines.contains(&boundary) {
                    lines.push(boundary);
                }
            }
            grid.resort(axis);
        }
        grid
    }

    pub fn guides(&self) -> GuideSet {
        GuideSet {
            h: self.horizontals.clone(),
            v: self.verticals.clone(),
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Sorted guides of one axis.
    pub fn lines(&self, axis: Axis) -> &[GuideLine] {
        match axis {
            Axis::Horizontal => &self.horizontals,
            Axis::Vertical => &self.verticals,
        }
    }

    fn lines_mut(&mut self, axis: Axis) -> &mut Vec<GuideLine> {
        match axis {
            Axis::Horizontal => &mut self.horizontals,
            Axis::Vertical => &mut self.verticals,
        }
    }

    pub fn line(&self, axis: Axis, index: usize) -> Option<GuideLine> {
        self.lines(axis).get(index).copied()
    }

    /// Offset of `line` at the grid's current resolution.
    pub fn resolve_offset(&self, axis: Axis, line: GuideLine) -> i32 {
        resolve_offset(axis, line, self.width, self.height)
    }

    pub fn offset_at(&self, axis: Axis, index: usize) -> Option<i32> {
        self.line(axis, index).map(|l| self.resolve_offset(axis, l))
    }

    pub fn add(&mut self, axis: Axis, line: GuideLine) {
        self.lines_mut(axis).push(line);
        self.resort(axis);
    }

    /// Remove the first guide structurally equal to `line`.  The sequence
    /// stays untouched on error.  Removal keeps the order, so no resort.
    pub fn remove(&mut self, axis: Axis, line: GuideLine) -> Result<(), GridError> {
        let lines = self.lines_mut(axis);
        let idx = lines
            .iter()
            .position(|l| *l == line)
            .ok_or(GridError::GuideNotFound { axis, line })?;
        if line.is_boundary() && lines.iter().filter(|l| **l == line).count() == 1 {
            return Err(GridError::ProtectedBoundary { axis, line });
        }
        lines.remove(idx);
        Ok(())
    }

    /// Stable sort of one axis by resolved offset.
    pub fn resort(&mut self, axis: Axis) {
        let (w, h) = (self.width, self.height);
        self.lines_mut(axis)
            .sort_by_key(|line| resolve_offset(axis, *line, w, h));
    }

    /// Switch to a new canvas size.  Relative guides move while absolute ones
    /// stay put, so both axes are re-sorted.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.resort(Axis::Horizontal);
        self.resort(Axis::Vertical);
    }

    /// Closest horizontal guide to `point.y` and closest vertical guide to
    /// `point.x`.  On equal distance the earlier guide in sorted order wins.
    pub fn find_nearest(&self, point: Point) -> (GuideLine, GuideLine) {
        (
            self.nearest(Axis::Horizontal, point.y),
            self.nearest(Axis::Vertical, point.x),
        )
    }

    fn nearest(&self, axis: Axis, coord: i32) -> GuideLine {
        self.lines(axis)
            .iter()
            .min_by_key(|line| (coord as i64 - self.resolve_offset(axis, **line) as i64).abs())
            .copied()
            .unwrap_or(GuideLine::GRID_START)
    }

    /// Tightest guides enclosing the normalized rectangle `(x1, y1)-(x2, y2)`.
    ///
    /// Left/top: the last guide with offset `<=` the near edge, or index 0 if
    /// none qualifies.  Right/bottom: the first guide with offset `>=` the far
    /// edge, or the last index if none qualifies.
    pub fn find_boundary_lines(&self, x1: i32, y1: i32, x2: i32, y2: i32) -> BoundaryLines {
        BoundaryLines {
            left: self.last_at_or_before(Axis::Vertical, x1),
            right: self.first_at_or_after(Axis::Vertical, x2),
            top: self.last_at_or_before(Axis::Horizontal, y1),
            bottom: self.first_at_or_after(Axis::Horizontal, y2),
        }
    }

    fn last_at_or_before(&self, axis: Axis, coord: i32) -> usize {
        self.lines(axis)
            .partition_point(|l| self.resolve_offset(axis, *l) <= coord)
            .saturating_sub(1)
    }

    fn first_at_or_after(&self, axis: Axis, coord: i32) -> usize {
        let lines = self.lines(axis);
        lines
            .partition_point(|l| self.resolve_offset(axis, *l) < coord)
            .min(lines.len().saturating_sub(1))
    }

    /// Draw every guide across `buffer` (display overlay, never persisted).
    pub fn paint_overlay<B: PixelBuffer + ?Sized>(&self, buffer: &mut B, color: Color, size: u32) {
        let right = buffer.width() as i32 - 1;
        let bottom = buffer.height() as i32 - 1;
        for line in &self.horizontals {
            let y = self.resolve_offset(Axis::Horizontal, *line);
            buffer.draw_line(Point::new(0, y), Point::new(right, y), color, size);
        }
        for line in &self.verticals {
            let x = self.resolve_offset(Axis::Vertical, *line);
            buffer.draw_line(Point::new(x, 0), Point::new(x, bottom), color, size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn offsets(grid: &GuideGrid, axis: Axis) -> Vec<i32> {
        grid.lines(axis).iter().map(|l| grid.resolve_offset(axis, *l)).collect()
    }

    fn grid_with(width: u32, height: u32, xs: &[GuideLine], ys: &[GuideLine]) -> GuideGrid {
        let mut grid = GuideGrid::new(width, height);
        for l in xs {
            grid.add(Axis::Vertical, *l);
        }
        for l in ys {
            grid.add(Axis::Horizontal, *l);
        }
        grid
    }

    #[test]
    fn relative_extremes_resolve_to_edges() {
        for (w, h) in [(1280, 720), (29, 57), (1, 1), (999, 3)] {
            assert_eq!(GuideLine::GRID_END.resolve(Axis::Vertical, w, h), w as i32);
            assert_eq!(GuideLine::GRID_END.resolve(Axis::Horizontal, w, h), h as i32);
            assert_eq!(GuideLine::GRID_START.resolve(Axis::Vertical, w, h), 0);
            assert_eq!(GuideLine::absolute(37).resolve(Axis::Horizontal, w, h), 37);
        }
    }

    #[test]
    fn relative_uses_perpendicular_dimension() {
        let line = GuideLine::relative(50);
        assert_eq!(resolve_offset(Axis::Horizontal, line, 1000, 200), 100);
        assert_eq!(resolve_offset(Axis::Vertical, line, 1000, 200), 500);
    }

    #[test]
    fn relative_floors_and_is_unclamped() {
        // 720 / 100 * 33 = 237.6
        assert_eq!(resolve_offset(Axis::Horizontal, GuideLine::relative(33), 0, 720), 237);
        assert_eq!(resolve_offset(Axis::Vertical, GuideLine::relative(150), 200, 0), 300);
        // -0.5 floors to -1
        assert_eq!(resolve_offset(Axis::Vertical, GuideLine::relative(-1), 50, 0), -1);
    }

    #[test]
    fn huge_percentages_saturate_and_stay_ordered() {
        assert_eq!(resolve_offset(Axis::Vertical, GuideLine::relative(i32::MAX), 200, 100), i32::MAX);
        assert_eq!(resolve_offset(Axis::Vertical, GuideLine::relative(i32::MIN), 200, 100), i32::MIN);

        let far = GuideLine::relative(i32::MAX);
        let before = GuideLine::relative(i32::MIN);
        let mut grid = grid_with(200, 100, &[far, before], &[]);
        assert_eq!(grid.lines(Axis::Vertical), &[before, GuideLine::GRID_START, GuideLine::GRID_END, far]);

        grid.set_resolution(7, 100);
        assert_eq!(grid.lines(Axis::Vertical).last(), Some(&far));
        let o = offsets(&grid, Axis::Vertical);
        assert!(o.windows(2).all(|w| w[0] <= w[1]), "{o:?}");
    }

    #[test]
    fn add_keeps_axis_sorted() {
        let grid = grid_with(
            1000,
            500,
            &[GuideLine::absolute(700), GuideLine::relative(25), GuideLine::absolute(10)],
            &[],
        );
        assert_eq!(offsets(&grid, Axis::Vertical), vec![0, 10, 250, 700, 1000]);
        assert_eq!(offsets(&grid, Axis::Horizontal), vec![0, 500]);
    }

    #[test]
    fn resolution_change_reorders_mixed_guides() {
        let abs = GuideLine::absolute(500);
        let rel = GuideLine::relative(50);
        let mut grid = grid_with(1280, 720, &[abs, rel], &[]);
        // 50% of 1280 = 640, after the absolute 500
        assert_eq!(grid.lines(Axis::Vertical)[1..3], [abs, rel]);

        grid.set_resolution(800, 720);
        // 50% of 800 = 400, now before it
        assert_eq!(grid.lines(Axis::Vertical)[1..3], [rel, abs]);
        let o = offsets(&grid, Axis::Vertical);
        assert!(o.windows(2).all(|w| w[0] <= w[1]), "{o:?}");
    }

    #[test]
    fn resort_is_stable_for_equal_offsets() {
        // Both resolve to 100 on a 200px wide canvas
        let a = GuideLine::absolute(100);
        let b = GuideLine::relative(50);
        let grid = grid_with(200, 100, &[a, b], &[]);
        assert_eq!(grid.lines(Axis::Vertical)[1..3], [a, b]);
    }

    #[test]
    fn remove_missing_guide_is_an_error() {
        let mut grid = grid_with(100, 100, &[GuideLine::absolute(10)], &[]);
        let err = grid.remove(Axis::Vertical, GuideLine::absolute(11)).unwrap_err();
        assert_eq!(
            err,
            GridError::GuideNotFound { axis: Axis::Vertical, line: GuideLine::absolute(11) }
        );
        // absolute(10) only exists on the vertical axis
        assert!(grid.remove(Axis::Horizontal, GuideLine::absolute(10)).is_err());
        assert_eq!(grid.lines(Axis::Vertical).len(), 3);
        grid.remove(Axis::Vertical, GuideLine::absolute(10)).unwrap();
        assert_eq!(grid.lines(Axis::Vertical).len(), 2);
    }

    #[test]
    fn duplicate_boundary_removes_one_copy() {
        let mut grid = GuideGrid::new(100, 100);
        assert_eq!(
            grid.remove(Axis::Horizontal, GuideLine::GRID_START),
            Err(GridError::ProtectedBoundary { axis: Axis::Horizontal, line: GuideLine::GRID_START })
        );

        grid.add(Axis::Horizontal, GuideLine::GRID_START);
        assert_eq!(grid.lines(Axis::Horizontal).len(), 3);
        grid.remove(Axis::Horizontal, GuideLine::GRID_START).unwrap();
        assert_eq!(grid.lines(Axis::Horizontal), &[GuideLine::GRID_START, GuideLine::GRID_END]);
    }

    #[test]
    fn nearest_prefers_first_on_ties() {
        let grid = grid_with(
            100,
            100,
            &[GuideLine::absolute(40), GuideLine::absolute(60)],
            &[GuideLine::absolute(30)],
        );
        let (h, v) = grid.find_nearest(Point::new(50, 16));
        assert_eq!(v, GuideLine::absolute(40));
        assert_eq!(h, GuideLine::absolute(30));

        let (h, v) = grid.find_nearest(Point::new(97, 2));
        assert_eq!(v, GuideLine::GRID_END);
        assert_eq!(h, GuideLine::GRID_START);
    }

    #[test]
    fn boundary_lines_are_tightest_enclosing() {
        let grid = grid_with(
            400,
            300,
            &[GuideLine::absolute(50), GuideLine::relative(25), GuideLine::absolute(250), GuideLine::relative(75)],
            &[GuideLine::absolute(100), GuideLine::relative(50), GuideLine::absolute(200)],
        );
        let xs = offsets(&grid, Axis::Vertical);
        let ys = offsets(&grid, Axis::Horizontal);

        for (x1, y1, x2, y2) in [(60, 10, 240, 290), (1, 1, 399, 299), (100, 100, 100, 150), (260, 160, 290, 199)] {
            let b = grid.find_boundary_lines(x1, y1, x2, y2);
            assert!(xs[b.left] <= x1 && xs[b.right] >= x2);
            assert!(ys[b.top] <= y1 && ys[b.bottom] >= y2);
            // nothing tighter between the chosen guide and the edge
            assert!(xs[b.left + 1..].iter().all(|o| *o > x1));
            assert!(xs[..b.right].iter().all(|o| *o < x2));
            assert!(ys[b.top + 1..].iter().all(|o| *o > y1));
            assert!(ys[..b.bottom].iter().all(|o| *o < y2));
        }

        let b = grid.find_boundary_lines(60, 10, 240, 290);
        assert_eq!(grid.line(Axis::Vertical, b.left), Some(GuideLine::absolute(50)));
        assert_eq!(grid.line(Axis::Vertical, b.right), Some(GuideLine::absolute(250)));
        assert_eq!(grid.line(Axis::Horizontal, b.top), Some(GuideLine::GRID_START));
        assert_eq!(grid.line(Axis::Horizontal, b.bottom), Some(GuideLine::GRID_END));
    }

    #[test]
    fn boundary_lines_clamp_outside_grid() {
        let grid = grid_with(100, 100, &[GuideLine::absolute(50)], &[]);
        let b = grid.find_boundary_lines(-20, -5, 140, 120);
        assert_eq!((b.left, b.top), (0, 0));
        assert_eq!(b.right, grid.lines(Axis::Vertical).len() - 1);
        assert_eq!(b.bottom, grid.lines(Axis::Horizontal).len() - 1);
    }

    #[test]
    fn rectangle_on_a_guide_is_degenerate() {
        let grid = grid_with(100, 100, &[GuideLine::absolute(50)], &[]);
        let b = grid.find_boundary_lines(50, 10, 50, 90);
        assert_eq!(b.left, b.right);
        assert!(b.is_degenerate(&grid));
        assert!(!grid.find_boundary_lines(10, 10, 60, 90).is_degenerate(&grid));
    }

    #[test]
    fn guides_persist_as_indent_tuples() {
        let json = serde_json::to_string(&GuideLine::relative(100)).unwrap();
        assert_eq!(json, "[1,100]");
        let line: GuideLine = serde_json::from_str("[0,42]").unwrap();
        assert_eq!(line, GuideLine::absolute(42));
        assert!(serde_json::from_str::<GuideLine>("[2,42]").is_err());
    }

    #[test]
    fn guide_set_round_trip_preserves_offsets() {
        let grid = grid_with(
            640,
            480,
            &[GuideLine::absolute(300), GuideLine::relative(33)],
            &[GuideLine::relative(10), GuideLine::absolute(5), GuideLine::relative(10)],
        );
        let bytes = bincode::serialize(&grid.guides()).unwrap();
        let restored = GuideGrid::from_guides(bincode::deserialize(&bytes).unwrap(), 640, 480);

        for axis in Axis::all() {
            assert_eq!(restored.lines(axis), grid.lines(axis));
            assert_eq!(offsets(&restored, axis), offsets(&grid, axis));
        }
    }

    #[test]
    fn loading_reseeds_missing_boundaries() {
        let set = GuideSet { h: vec![GuideLine::absolute(20)], v: vec![] };
        let grid = GuideGrid::from_guides(set, 100, 100);
        assert_eq!(
            grid.lines(Axis::Horizontal),
            &[GuideLine::GRID_START, GuideLine::absolute(20), GuideLine::GRID_END]
        );
        assert_eq!(grid.lines(Axis::Vertical), &[GuideLine::GRID_START, GuideLine::GRID_END]);
    }

    #[test]
    fn overlay_draws_each_guide() {
        let grid = grid_with(10, 10, &[GuideLine::absolute(4)], &[]);
        let mut img = RgbaImage::new(11, 11);
        let blue = Rgba([0, 0, 255, 255]);
        grid.paint_overlay(&mut img, blue, 1);
        assert!((0..11).all(|y| *img.get_pixel(4, y) == blue));
        assert!((0..11).all(|x| *img.get_pixel(x, 10) == blue));
        assert_eq!(*img.get_pixel(2, 5), Rgba([0, 0, 0, 0]));
    }
}
