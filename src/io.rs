use std::fs::{self, File};
use std::io::{BufWriter, Cursor};
use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ImageEncoder, ImageError, ImageFormat, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::grid::{GuideGrid, GuideSet};
use crate::layers::{
    BitmapLayer, ImageLayer, Layer, LayerBehavior, LayerContent, ShapeKind, ShapeLayer, TextLayer,
    TextStyle,
};
use crate::region::AnchoredRegion;
use crate::scene::Scene;

// ============================================================================
// GRI PROJECT FILE FORMAT
// ============================================================================

/// Magic header of `.gri` project files.
const GRI_MAGIC: &str = "GRI1";

/// Largest canvas edge accepted from a project file.
const MAX_CANVAS_DIM: u32 = 32_768;
/// Most layers accepted from a project file.
const MAX_LAYERS: usize = 256;
/// Largest image-layer scale accepted from a project file.
const MAX_SCALE_PERCENT: u32 = 1_000;

#[derive(Serialize, Deserialize)]
pub struct ProjectFile {
    magic: String,
    width: u32,
    height: u32,
    highest_z: i32,
    background: [u8; 4],
    guides: GuideSet,
    layers: Vec<LayerRecord>,
}

#[derive(Serialize, Deserialize)]
struct LayerRecord {
    name: String,
    visible: bool,
    z: i32,
    data: LayerData,
}

/// Pixel layers are stored as PNG bytes; anchored layers keep their guide
/// references, never resolved pixel positions.
#[derive(Serialize, Deserialize)]
enum LayerData {
    Bitmap {
        png: Vec<u8>,
    },
    Image {
        png: Vec<u8>,
        scale_percent: u32,
        region: AnchoredRegion,
    },
    Shape {
        shape: ShapeKind,
        line_color: [u8; 4],
        fill_color: [u8; 4],
        stroke_width: u32,
        region: AnchoredRegion,
    },
    Text {
        text: String,
        style: TextStyle,
        region: AnchoredRegion,
    },
}

#[derive(Debug)]
pub enum ProjectError {
    Io(std::io::Error),
    Serialize(String),
    Image(ImageError),
    InvalidFormat(String),
}

impl std::fmt::Display for ProjectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectError::Io(e) => write!(f, "I/O error: {}", e),
            ProjectError::Serialize(e) => write!(f, "Serialization error: {}", e),
            ProjectError::Image(e) => write!(f, "Image error: {}", e),
            ProjectError::InvalidFormat(e) => write!(f, "Invalid format: {}", e),
        }
    }
}

impl std::error::Error for ProjectError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProjectError::Io(e) => Some(e),
            ProjectError::Image(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ProjectError {
    fn from(e: std::io::Error) -> Self {
        ProjectError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for ProjectError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        ProjectError::Serialize(e.to_string())
    }
}

impl From<ImageError> for ProjectError {
    fn from(e: ImageError) -> Self {
        ProjectError::Image(e)
    }
}

fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ProjectError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes).write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        image::ColorType::Rgba8,
    )?;
    Ok(bytes)
}

/// Decode an embedded layer PNG.  The header is checked against
/// `MAX_CANVAS_DIM` before any pixels are allocated.
fn decode_png(bytes: &[u8]) -> Result<RgbaImage, ProjectError> {
    let (w, h) = image::io::Reader::with_format(Cursor::new(bytes), ImageFormat::Png).into_dimensions()?;
    if w > MAX_CANVAS_DIM || h > MAX_CANVAS_DIM {
        return Err(ProjectError::InvalidFormat(format!("Layer image {}x{} too large", w, h)));
    }
    Ok(image::load_from_memory_with_format(bytes, ImageFormat::Png)?.to_rgba8())
}

/// Reject scales that would blow a layer image past `MAX_CANVAS_DIM`.
fn check_scale(source: &RgbaImage, scale_percent: u32) -> Result<(), ProjectError> {
    let (w, h) = source.dimensions();
    let scaled = |side: u32| side as u64 * scale_percent as u64 / 100;
    if scale_percent > MAX_SCALE_PERCENT || scaled(w.max(h)) > MAX_CANVAS_DIM as u64 {
        return Err(ProjectError::InvalidFormat(format!(
            "Image scale {}% out of range for {}x{}",
            scale_percent, w, h
        )));
    }
    Ok(())
}

/// Snapshot a scene into its serializable form.
pub fn build_project(scene: &Scene) -> Result<ProjectFile, ProjectError> {
    let layers = scene
        .layers()
        .iter()
        .map(|layer| -> Result<LayerRecord, ProjectError> {
            let data = match &layer.content {
                LayerContent::Bitmap(b) => LayerData::Bitmap { png: encode_png(&b.pixels)? },
                LayerContent::Image(i) => LayerData::Image {
                    png: encode_png(i.source())?,
                    scale_percent: i.scale_percent(),
                    region: i.region.clone(),
                },
                LayerContent::Shape(s) => LayerData::Shape {
                    shape: s.shape,
                    line_color: s.line_color.0,
                    fill_color: s.fill_color.0,
                    stroke_width: s.stroke_width,
                    region: s.region.clone(),
                },
                LayerContent::Text(t) => LayerData::Text {
                    text: t.text.clone(),
                    style: t.style.clone(),
                    region: t.region.clone(),
                },
            };
            Ok(LayerRecord {
                name: layer.name.clone(),
                visible: layer.visible,
                z: layer.z,
                data,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ProjectFile {
        magic: GRI_MAGIC.to_string(),
        width: scene.width(),
        height: scene.height(),
        highest_z: scene.highest_z(),
        background: scene.background.0,
        guides: scene.grid().guides(),
        layers,
    })
}

/// Rebuild a scene.  Layers get fresh ids; nothing is active.
pub fn restore_project(project: ProjectFile) -> Result<Scene, ProjectError> {
    let (w, h) = (project.width, project.height);
    if w == 0 || h == 0 || w > MAX_CANVAS_DIM || h > MAX_CANVAS_DIM {
        return Err(ProjectError::InvalidFormat(format!("Canvas size {}x{} out of range", w, h)));
    }
    if project.layers.len() > MAX_LAYERS {
        return Err(ProjectError::InvalidFormat(format!("Too many layers ({})", project.layers.len())));
    }

    let mut layers = Vec::with_capacity(project.layers.len());
    for record in project.layers {
        let content = match record.data {
            LayerData::Bitmap { png } => {
                let mut bitmap = BitmapLayer::from_pixels(decode_png(&png)?);
                if bitmap.pixels.dimensions() != (w, h) {
                    crate::log_warn!("Layer '{}' size differs from the canvas, cropping", record.name);
                    bitmap.set_resolution(w, h, false);
                }
                LayerContent::Bitmap(bitmap)
            }
            LayerData::Image { png, scale_percent, region } => {
                let source = decode_png(&png)?;
                check_scale(&source, scale_percent)?;
                let mut image = ImageLayer::new(source, region.alignment);
                image.set_scale(scale_percent);
                image.region = region;
                LayerContent::Image(image)
            }
            LayerData::Shape { shape, line_color, fill_color, stroke_width, region } => {
                LayerContent::Shape(ShapeLayer {
                    shape,
                    line_color: Rgba(line_color),
                    fill_color: Rgba(fill_color),
                    stroke_width,
                    region,
                    ..ShapeLayer::default()
                })
            }
            LayerData::Text { text, style, region } => {
                LayerContent::Text(TextLayer { text, style, region })
            }
        };
        let mut layer = Layer::new(record.name, content);
        layer.visible = record.visible;
        layer.z = record.z;
        layers.push(layer);
    }

    let grid = GuideGrid::from_guides(project.guides, w, h);
    Ok(Scene::from_parts(grid, layers, project.highest_z, Rgba(project.background)))
}

pub fn encode_project(scene: &Scene) -> Result<Vec<u8>, ProjectError> {
    Ok(bincode::serialize(&build_project(scene)?)?)
}

pub fn decode_project(raw: &[u8]) -> Result<Scene, ProjectError> {
    if raw.len() < 12 {
        return Err(ProjectError::InvalidFormat("File too small".into()));
    }
    // bincode writes the magic String as an 8-byte length then the bytes
    let magic = std::str::from_utf8(&raw[8..12]).unwrap_or("");
    if magic != GRI_MAGIC {
        return Err(ProjectError::InvalidFormat(format!("Unknown magic '{}'", magic)));
    }
    let project: ProjectFile = bincode::deserialize(raw)?;
    restore_project(project)
}

/// Save a scene as a `.gri` project file.
pub fn save_project(scene: &Scene, path: &Path) -> Result<(), ProjectError> {
    let project = build_project(scene)?;
    let writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(writer, &project)?;
    crate::log_info!("Saved project {} ({} layers)", path.display(), project.layers.len());
    Ok(())
}

pub fn load_project(path: &Path) -> Result<Scene, ProjectError> {
    let raw = fs::read(path)?;
    let scene = decode_project(&raw).inspect_err(|e| {
        crate::log_err!("Failed to load project {}: {}", path.display(), e);
    })?;
    crate::log_info!(
        "Loaded project {} ({}x{}, {} layers)",
        path.display(),
        scene.width(),
        scene.height(),
        scene.layers().len()
    );
    Ok(scene)
}

// ============================================================================
// PLAIN IMAGES
// ============================================================================

/// Decode any raster format the `image` crate knows into RGBA.
pub fn load_image(path: &Path) -> Result<RgbaImage, ProjectError> {
    Ok(image::open(path)?.to_rgba8())
}

/// Write a flattened image; the format follows the file extension.
pub fn save_image(image: &RgbaImage, path: &Path) -> Result<(), ProjectError> {
    let format = ImageFormat::from_path(path)?;
    if format == ImageFormat::Png {
        let writer = BufWriter::new(File::create(path)?);
        PngEncoder::new(writer).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ColorType::Rgba8,
        )?;
    } else if format == ImageFormat::Jpeg {
        // no alpha channel in JPEG
        image::DynamicImage::ImageRgba8(image.clone()).to_rgb8().save(path)?;
    } else {
        image.save_with_format(path, format)?;
    }
    Ok(())
}
