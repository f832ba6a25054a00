//! The editing scene: one guide grid, the layer stack, and the compositor.

use std::fmt;
use std::time::Instant;

use image::RgbaImage;
use uuid::Uuid;

use crate::canvas::{Color, Point, TRANSPARENT, blend_onto};
use crate::fill::{FillError, FillReport};
use crate::grid::{Axis, GridError, GuideGrid, GuideLine};
use crate::layers::{
    BitmapLayer, ImageLayer, Layer, LayerContent, LayerError, PointerEvent, SceneContext, ShapeKind,
    ShapeLayer, TextLayer,
};
use crate::region::Alignment;
use crate::settings::EditorSettings;

/// Stacking value of the guide overlay, above every layer.
pub const GUIDE_OVERLAY_Z: i32 = 1024;

/// Lifts the focused layer (when its kind asks for it) to a fixed priority at
/// composite time.  Stored z values are never touched, so focus changes need
/// no bookkeeping to undo.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FocusOverlayPolicy {
    pub priority: i32,
}

impl Default for FocusOverlayPolicy {
    fn default() -> Self {
        Self { priority: GUIDE_OVERLAY_Z - 1 }
    }
}

impl FocusOverlayPolicy {
    pub fn effective_z(&self, layer: &Layer, active: Option<Uuid>) -> i32 {
        if active == Some(layer.id) && layer.kind().raises_on_focus() {
            self.priority
        } else {
            layer.z
        }
    }
}

#[derive(Debug)]
pub enum SceneError {
    UnknownLayer(Uuid),
    NoActiveLayer,
    NotABitmap(Uuid),
    Grid(GridError),
    Layer(LayerError),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::UnknownLayer(id) => write!(f, "no layer with id {}", id),
            SceneError::NoActiveLayer => write!(f, "no layer is active"),
            SceneError::NotABitmap(id) => write!(f, "layer {} is not a bitmap layer", id),
            SceneError::Grid(e) => write!(f, "grid error: {}", e),
            SceneError::Layer(e) => write!(f, "layer error: {}", e),
        }
    }
}

impl std::error::Error for SceneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneError::Grid(e) => Some(e),
            SceneError::Layer(e) => Some(e),
            _ => None,
        }
    }
}

impl From<GridError> for SceneError {
    fn from(e: GridError) -> Self {
        SceneError::Grid(e)
    }
}

impl From<LayerError> for SceneError {
    fn from(e: LayerError) -> Self {
        SceneError::Layer(e)
    }
}

impl From<FillError> for SceneError {
    fn from(e: FillError) -> Self {
        SceneError::Layer(LayerError::Fill(e))
    }
}

/// Guide overlay appearance for [`Scene::render`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GuideOverlay {
    pub color: Color,
    pub width: u32,
}

pub struct Scene {
    grid: GuideGrid,
    layers: Vec<Layer>,
    /// Highest z ever handed out, removed layers included.
    highest_z: i32,
    active: Option<Uuid>,
    pub focus: FocusOverlayPolicy,
    pub background: Color,
}

impl Scene {
    pub fn new(width: u32, height: u32) -> Self {
        Self::from_parts(GuideGrid::new(width, height), Vec::new(), 0, TRANSPARENT)
    }

    /// Blank canvas with the configured size and background.
    pub fn from_settings(settings: &EditorSettings) -> Self {
        let mut scene = Self::new(settings.canvas_width, settings.canvas_height);
        scene.background = settings.background;
        scene
    }

    /// Reassemble a scene from loaded parts.  `highest_z` is raised to cover
    /// every layer so new layers still land on top.
    pub fn from_parts(grid: GuideGrid, layers: Vec<Layer>, highest_z: i32, background: Color) -> Self {
        let highest_z = layers.iter().map(|l| l.z).fold(highest_z, i32::max);
        Self {
            grid,
            layers,
            highest_z,
            active: None,
            focus: FocusOverlayPolicy::default(),
            background,
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.grid.resolution()
    }

    pub fn width(&self) -> u32 {
        self.resolution().0
    }

    pub fn height(&self) -> u32 {
        self.resolution().1
    }

    pub fn grid(&self) -> &GuideGrid {
        &self.grid
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn highest_z(&self) -> i32 {
        self.highest_z
    }

    pub fn layer(&self, id: Uuid) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id)
    }

    pub fn layer_mut(&mut self, id: Uuid) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id == id)
    }

    fn index_of(&self, id: Uuid) -> Result<usize, SceneError> {
        self.layers
            .iter()
            .position(|l| l.id == id)
            .ok_or(SceneError::UnknownLayer(id))
    }

    // ---- layer stack --------------------------------------------------------

    /// Push a layer on top of the stack and return its id.
    pub fn add_layer(&mut self, mut layer: Layer) -> Uuid {
        self.highest_z += 1;
        layer.z = self.highest_z;
        let id = layer.id;
        crate::log_info!("Added {} layer '{}' at z {}", layer.kind().code(), layer.name, layer.z);
        self.layers.push(layer);
        id
    }

    pub fn add_bitmap_layer(&mut self, name: impl Into<String>) -> Uuid {
        let (w, h) = self.resolution();
        self.add_layer(Layer::new(name, LayerContent::Bitmap(BitmapLayer::new(w, h))))
    }

    pub fn add_image_layer(&mut self, name: impl Into<String>, image: RgbaImage, alignment: Alignment) -> Uuid {
        self.add_layer(Layer::new(name, LayerContent::Image(ImageLayer::new(image, alignment))))
    }

    pub fn add_shape_layer(&mut self, name: impl Into<String>, shape: ShapeKind) -> Uuid {
        self.add_layer(Layer::new(name, LayerContent::Shape(ShapeLayer::new(shape))))
    }

    pub fn add_text_layer(&mut self, name: impl Into<String>, text: impl Into<String>) -> Uuid {
        self.add_layer(Layer::new(name, LayerContent::Text(TextLayer::new(text))))
    }

    pub fn remove_layer(&mut self, id: Uuid) -> Result<Layer, SceneError> {
        let idx = self.index_of(id)?;
        if self.active == Some(id) {
            self.active = None;
        }
        let layer = self.layers.remove(idx);
        crate::log_info!("Removed layer '{}'", layer.name);
        Ok(layer)
    }

    pub fn active(&self) -> Option<Uuid> {
        self.active
    }

    /// Give `id` the focus; pointer input goes to it from now on.
    pub fn activate(&mut self, id: Uuid) -> Result<(), SceneError> {
        self.index_of(id)?;
        self.active = Some(id);
        Ok(())
    }

    pub fn deactivate(&mut self) {
        self.active = None;
    }

    pub fn set_visible(&mut self, id: Uuid, visible: bool) -> Result<(), SceneError> {
        let idx = self.index_of(id)?;
        self.layers[idx].visible = visible;
        Ok(())
    }

    /// Exchange the stored z of two layers.
    pub fn swap_z(&mut self, a: Uuid, b: Uuid) -> Result<(), SceneError> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        let za = self.layers[ia].z;
        self.layers[ia].z = self.layers[ib].z;
        self.layers[ib].z = za;
        Ok(())
    }

    /// Swap with the next layer above.  `false` if already on top.
    pub fn move_up(&mut self, id: Uuid) -> Result<bool, SceneError> {
        self.move_by(id, 1)
    }

    /// Swap with the next layer below.  `false` if already at the bottom.
    pub fn move_down(&mut self, id: Uuid) -> Result<bool, SceneError> {
        self.move_by(id, -1)
    }

    fn move_by(&mut self, id: Uuid, step: isize) -> Result<bool, SceneError> {
        self.index_of(id)?;
        let order: Vec<Uuid> = self.stacking_order().iter().map(|l| l.id).collect();
        let Some(pos) = order.iter().position(|l| *l == id) else { return Ok(false) };
        let Some(neighbor) = pos.checked_add_signed(step).and_then(|p| order.get(p)) else {
            return Ok(false);
        };
        self.swap_z(id, *neighbor)?;
        Ok(true)
    }

    /// Layers by stored z, bottom first.  Ties keep insertion order.
    fn stacking_order(&self) -> Vec<&Layer> {
        let mut order: Vec<&Layer> = self.layers.iter().collect();
        order.sort_by_key(|l| l.z);
        order
    }

    // ---- grid ---------------------------------------------------------------

    pub fn add_guide(&mut self, axis: Axis, line: GuideLine) {
        self.grid.add(axis, line);
        crate::log_info!("Added {} guide at {}", axis.label(), line);
    }

    pub fn remove_guide(&mut self, axis: Axis, line: GuideLine) -> Result<(), SceneError> {
        self.grid.remove(axis, line)?;
        crate::log_info!("Removed {} guide at {}", axis.label(), line);
        Ok(())
    }

    /// Change the canvas size.  The grid re-sorts for the new resolution and
    /// bitmap layers are stretched or cropped; anchored layers need nothing.
    pub fn set_resolution(&mut self, width: u32, height: u32, stretch: bool) {
        let started = Instant::now();
        let (old_w, old_h) = self.resolution();
        self.grid.set_resolution(width, height);
        for layer in &mut self.layers {
            layer.content.behavior_mut().set_resolution(width, height, stretch);
        }
        crate::log_info!(
            "Resolution {}x{} -> {}x{} ({}) in {:.1}ms",
            old_w,
            old_h,
            width,
            height,
            if stretch { "stretch" } else { "crop" },
            started.elapsed().as_secs_f64() * 1000.0
        );
    }

    // ---- input --------------------------------------------------------------

    /// Route a pointer event to the active layer.
    pub fn pointer(&mut self, event: PointerEvent) -> Result<bool, SceneError> {
        let id = self.active.ok_or(SceneError::NoActiveLayer)?;
        let grid = &self.grid;
        let layer = self
            .layers
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or(SceneError::UnknownLayer(id))?;
        let ctx = SceneContext::new(grid, true);
        Ok(layer.content.behavior_mut().handle_pointer(event, &ctx)?)
    }

    /// Bucket fill on a bitmap layer.
    pub fn fill_layer(&mut self, id: Uuid, seed: Point, color: Color) -> Result<FillReport, SceneError> {
        let idx = self.index_of(id)?;
        match &mut self.layers[idx].content {
            LayerContent::Bitmap(bitmap) => Ok(bitmap.fill(seed, color)?),
            _ => Err(SceneError::NotABitmap(id)),
        }
    }

    // ---- compositing --------------------------------------------------------

    /// Layers in paint order (bottom first) with the focus policy applied.
    pub fn render_order(&self) -> Vec<&Layer> {
        let mut order: Vec<&Layer> = self.layers.iter().collect();
        order.sort_by_key(|l| self.focus.effective_z(l, self.active));
        order
    }

    /// Flatten the visible layers over the background, optionally with the
    /// guide overlay on top.
    pub fn render(&self, guides: Option<GuideOverlay>) -> RgbaImage {
        let (w, h) = self.resolution();
        let mut out = RgbaImage::from_pixel(w, h, self.background);

        for layer in self.render_order().into_iter().filter(|l| l.visible) {
            let ctx = SceneContext::new(&self.grid, self.active == Some(layer.id));
            let mut buf = RgbaImage::new(w, h);
            layer.content.behavior().paint(&mut buf, &ctx);
            blend_onto(&mut out, &buf);
        }

        if let Some(overlay) = guides {
            let mut buf = RgbaImage::new(w, h);
            self.grid.paint_overlay(&mut buf, overlay.color, overlay.width);
            blend_onto(&mut out, &buf);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::PixelBuffer;
    use image::Rgba;

    const RED: Color = Rgba([255, 0, 0, 255]);
    const BLUE: Color = Rgba([0, 0, 255, 255]);

    fn filled_bitmap(scene: &mut Scene, name: &str, color: Color) -> Uuid {
        let id = scene.add_bitmap_layer(name);
        scene.fill_layer(id, Point::new(0, 0), color).unwrap();
        id
    }

    #[test]
    fn blank_scene_follows_settings() {
        let settings = EditorSettings {
            canvas_width: 30,
            canvas_height: 20,
            background: BLUE,
            ..EditorSettings::default()
        };
        let scene = Scene::from_settings(&settings);
        assert_eq!(scene.resolution(), (30, 20));
        assert!(scene.layers().is_empty());
        assert_eq!(scene.render(None).pixel(29, 19), BLUE);
    }

    #[test]
    fn new_layers_stack_on_top() {
        let mut scene = Scene::new(10, 10);
        let a = scene.add_bitmap_layer("a");
        let b = scene.add_text_layer("b", "hi");
        assert_eq!(scene.layer(a).unwrap().z, 1);
        assert_eq!(scene.layer(b).unwrap().z, 2);

        scene.remove_layer(b).unwrap();
        let c = scene.add_bitmap_layer("c");
        // removed layers still count toward the highest z
        assert_eq!(scene.layer(c).unwrap().z, 3);
    }

    #[test]
    fn top_layer_wins_and_hidden_layers_are_skipped() {
        let mut scene = Scene::new(4, 4);
        filled_bitmap(&mut scene, "red", RED);
        let blue = filled_bitmap(&mut scene, "blue", BLUE);
        assert_eq!(scene.render(None).pixel(2, 2), BLUE);

        scene.set_visible(blue, false).unwrap();
        assert_eq!(scene.render(None).pixel(2, 2), RED);
    }

    #[test]
    fn swapping_z_reorders_composite() {
        let mut scene = Scene::new(4, 4);
        let red = filled_bitmap(&mut scene, "red", RED);
        let blue = filled_bitmap(&mut scene, "blue", BLUE);
        scene.swap_z(red, blue).unwrap();
        assert_eq!(scene.render(None).pixel(0, 0), RED);

        assert!(scene.move_down(red).unwrap());
        assert_eq!(scene.render(None).pixel(0, 0), BLUE);
        assert!(!scene.move_down(red).unwrap());
    }

    #[test]
    fn focused_text_is_raised_without_touching_z() {
        let mut scene = Scene::new(20, 20);
        let text = scene.add_text_layer("caption", "hi");
        let bitmap = filled_bitmap(&mut scene, "paint", RED);
        scene.activate(text).unwrap();

        let order: Vec<Uuid> = scene.render_order().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![bitmap, text]);
        assert_eq!(scene.layer(text).unwrap().z, 1);
        // the box outline shows above the red bitmap
        assert_eq!(scene.render(None).pixel(0, 0), Rgba([0, 0, 0, 255]));

        scene.deactivate();
        let order: Vec<Uuid> = scene.render_order().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![text, bitmap]);
        assert_eq!(scene.render(None).pixel(0, 0), RED);
    }

    #[test]
    fn focused_bitmap_keeps_its_place() {
        let mut scene = Scene::new(4, 4);
        let red = filled_bitmap(&mut scene, "red", RED);
        filled_bitmap(&mut scene, "blue", BLUE);
        scene.activate(red).unwrap();
        assert_eq!(scene.render(None).pixel(1, 1), BLUE);
    }

    #[test]
    fn guide_overlay_draws_above_layers() {
        let mut scene = Scene::new(10, 10);
        filled_bitmap(&mut scene, "red", RED);
        scene.add_guide(Axis::Vertical, GuideLine::absolute(5));
        let out = scene.render(Some(GuideOverlay { color: BLUE, width: 1 }));
        assert_eq!(out.pixel(5, 3), BLUE);
        assert_eq!(out.pixel(4, 3), RED);
    }

    #[test]
    fn resolution_change_resorts_grid_and_resizes_bitmaps() {
        let mut scene = Scene::new(1280, 720);
        let abs = GuideLine::absolute(500);
        let rel = GuideLine::relative(50);
        scene.add_guide(Axis::Vertical, abs);
        scene.add_guide(Axis::Vertical, rel);
        let bitmap = scene.add_bitmap_layer("paint");
        let image = scene.add_image_layer("logo", RgbaImage::from_pixel(10, 10, RED), Alignment::Fill);

        scene.set_resolution(800, 600, false);
        assert_eq!(scene.grid().lines(Axis::Vertical)[1..3], [rel, abs]);
        match &scene.layer(bitmap).unwrap().content {
            LayerContent::Bitmap(b) => assert_eq!(b.pixels.dimensions(), (800, 600)),
            _ => unreachable!(),
        }
        let region = scene.layer(image).unwrap().content.region().unwrap();
        assert_eq!(region.resolve_rect(scene.grid()).bottom_right(), Point::new(800, 600));
    }

    #[test]
    fn pointer_goes_to_active_layer() {
        let mut scene = Scene::new(6, 6);
        assert!(matches!(
            scene.pointer(PointerEvent::Press(Point::new(1, 1))),
            Err(SceneError::NoActiveLayer)
        ));

        let id = scene.add_bitmap_layer("paint");
        scene.activate(id).unwrap();
        if let Some(LayerContent::Bitmap(b)) = scene.layer_mut(id).map(|l| &mut l.content) {
            b.set_tool(crate::layers::BitmapTool::Fill, RED, 1);
        }
        scene.pointer(PointerEvent::Press(Point::new(1, 1))).unwrap();
        assert!(scene.pointer(PointerEvent::Release(Point::new(1, 1))).unwrap());
        assert!(scene.render(None).pixels().all(|p| *p == RED));
    }

    #[test]
    fn errors_leave_scene_untouched() {
        let mut scene = Scene::new(6, 6);
        let text = scene.add_text_layer("t", "");
        assert!(matches!(
            scene.fill_layer(text, Point::new(0, 0), RED),
            Err(SceneError::NotABitmap(id)) if id == text
        ));
        assert!(matches!(
            scene.remove_guide(Axis::Horizontal, GuideLine::GRID_END),
            Err(SceneError::Grid(GridError::ProtectedBoundary { .. }))
        ));
        assert!(matches!(scene.activate(Uuid::new_v4()), Err(SceneError::UnknownLayer(_))));
        assert_eq!(scene.grid().lines(Axis::Horizontal).len(), 2);
    }
}
