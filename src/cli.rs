// ============================================================================
// GrImage CLI: headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   grimage -i sketch.png --fill 10,10 --color 255,0,0 -o filled.png
//   grimage -i *.png --resize 800x600 --stretch --output-dir out/
//   grimage -i layout.gri --vguide 50% --hguide 120 --guides -o preview.png
//   grimage -i photo.jpg -o project.gri            (start a project from an image)
//   grimage --new --place logo.png --align rb -o card.gri
//
// Plain images load as a single bitmap layer; `.gri` projects keep every
// layer; `--new` starts from a blank canvas of the configured size.
// Processing runs synchronously on the current thread.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::canvas::{Color, Point};
use crate::grid::{Axis, GuideLine};
use crate::io::{load_image, load_project, save_image, save_project};
use crate::layers::{BitmapLayer, Layer, LayerContent, LayerKind};
use crate::region::Alignment;
use crate::scene::{GuideOverlay, Scene};
use crate::settings::{EditorSettings, parse_color};

const PROJECT_EXT: &str = "gri";
/// Stand-in input name for `--new`, used to name its output.
const NEW_CANVAS_NAME: &str = "untitled";

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// GrImage headless processor.
#[derive(Parser, Debug)]
#[command(
    name = "grimage",
    about = "GrImage headless batch processor",
    long_about = "Apply bucket fills, resizes and guides to images or .gri projects\n\
                  without opening the editor.\n\n\
                  Example:\n  \
                  grimage -i sketch.png --fill 10,10 --color 255,0,0 -o filled.png\n  \
                  grimage -i *.gri --resize 1920x1080 --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.gri").
    #[arg(short, long, num_args = 1.., required_unless_present = "new", conflicts_with = "new")]
    pub input: Vec<String>,

    /// Start from a blank canvas with the configured size and background.
    #[arg(long)]
    pub new: bool,

    /// Place an image as a new layer anchored to the full grid. Repeatable.
    #[arg(long, value_name = "IMAGE")]
    pub place: Vec<PathBuf>,

    /// Alignment for --place (none, fill, lt, top, rt, left, cntr, rght, lb,
    /// bttm, rb). Defaults to the configured image alignment.
    #[arg(long, value_name = "CODE", value_parser = parse_alignment)]
    pub align: Option<Alignment>,

    /// Bucket fill seed on the target bitmap layer. Repeatable; applied in order.
    #[arg(long, value_name = "X,Y", value_parser = parse_point)]
    pub fill: Vec<Point>,

    /// Fill color. Defaults to the configured fill color.
    #[arg(long, value_name = "R,G,B[,A]", value_parser = parse_color_arg)]
    pub color: Option<Color>,

    /// Resize the canvas before filling.
    #[arg(long, value_name = "WxH", value_parser = parse_size)]
    pub resize: Option<(u32, u32)>,

    /// Stretch bitmap layers on --resize instead of cropping them.
    #[arg(long)]
    pub stretch: bool,

    /// Add a horizontal guide: `120` / `120px` (absolute) or `50%` (relative).
    #[arg(long, value_name = "GUIDE", value_parser = parse_guide)]
    pub hguide: Vec<GuideLine>,

    /// Add a vertical guide, same syntax as --hguide.
    #[arg(long, value_name = "GUIDE", value_parser = parse_guide)]
    pub vguide: Vec<GuideLine>,

    /// Draw the guide overlay into flattened output.
    #[arg(long)]
    pub guides: bool,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE", conflicts_with = "output_dir")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format (png, jpg, bmp, tga, webp, gri). Inferred from --output when omitted.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Per-file timing and fill statistics.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Everything `run_one` needs besides the paths.
struct Job<'a> {
    args: &'a CliArgs,
    settings: &'a EditorSettings,
    color: Color,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Process every input.  `0` when all succeeded, `1` otherwise.
pub fn run(args: CliArgs, settings: &EditorSettings) -> ExitCode {
    let inputs = if args.new {
        vec![PathBuf::from(NEW_CANVAS_NAME)]
    } else {
        resolve_inputs(&args.input)
    };
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let ext = output_extension(args.format.as_deref(), args.output.as_deref());
    let job = Job {
        args: &args,
        settings,
        color: args.color.unwrap_or(settings.fill_color),
    };

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref(), &ext)
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &job) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  -> {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                crate::log_err!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(input: &Path, output: &Path, job: &Job) -> Result<(), String> {
    let args = job.args;

    // -- Step 1: Load ----------------------------------------------------
    let mut scene = if args.new {
        Scene::from_settings(job.settings)
    } else {
        load_scene(input, job.settings)?
    };
    let alignment = args.align.unwrap_or(job.settings.image_alignment);
    for path in &args.place {
        let image = load_image(path).map_err(|e| format!("cannot place '{}': {}", path.display(), e))?;
        scene.add_image_layer(layer_name(path), image, alignment);
    }

    // -- Step 2: Grid + resolution ----------------------------------------
    for line in &args.hguide {
        scene.add_guide(Axis::Horizontal, *line);
    }
    for line in &args.vguide {
        scene.add_guide(Axis::Vertical, *line);
    }
    if let Some((w, h)) = args.resize {
        scene.set_resolution(w, h, args.stretch || job.settings.stretch_on_resize);
    }

    // -- Step 3: Fills ---------------------------------------------------
    if !args.fill.is_empty() {
        let target = fill_target(&scene).ok_or_else(|| "no bitmap layer to fill".to_string())?;
        for seed in &args.fill {
            let report = scene
                .fill_layer(target, *seed, job.color)
                .map_err(|e| e.to_string())?;
            if args.verbose {
                let (x0, y0, x1, y1) = report.bounds;
                println!(
                    "  fill ({}, {}): {} px in ({}, {})..({}, {})",
                    seed.x, seed.y, report.painted, x0, y0, x1, y1
                );
            }
        }
    }

    // -- Step 4: Save ----------------------------------------------------
    if has_extension(output, PROJECT_EXT) {
        save_project(&scene, output).map_err(|e| format!("project save failed: {}", e))?;
    } else {
        let overlay = args.guides.then_some(GuideOverlay {
            color: job.settings.guide_color,
            width: job.settings.guide_width,
        });
        save_image(&scene.render(overlay), output).map_err(|e| format!("save failed: {}", e))?;
    }
    Ok(())
}

/// `.gri` files open as projects; anything else becomes a one-layer scene.
fn load_scene(input: &Path, settings: &EditorSettings) -> Result<Scene, String> {
    if has_extension(input, PROJECT_EXT) {
        return load_project(input).map_err(|e| format!("load failed: {}", e));
    }
    let image = load_image(input).map_err(|e| format!("load failed: {}", e))?;
    let mut scene = Scene::new(image.width(), image.height());
    scene.background = settings.background;
    scene.add_layer(Layer::new(layer_name(input), LayerContent::Bitmap(BitmapLayer::from_pixels(image))));
    Ok(scene)
}

fn layer_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Layer".to_string())
}

/// The active layer if it is a bitmap, else the topmost bitmap layer.
fn fill_target(scene: &Scene) -> Option<uuid::Uuid> {
    if let Some(active) = scene.active()
        && scene.layer(active).is_some_and(|l| l.kind() == LayerKind::Bitmap)
    {
        return Some(active);
    }
    scene
        .render_order()
        .into_iter()
        .rev()
        .find(|l| l.kind() == LayerKind::Bitmap)
        .map(|l| l.id)
}

// ============================================================================
// Helpers
// ============================================================================

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Output extension from `--format`, else from `--output`, else `png`.
fn output_extension(format_arg: Option<&str>, output: Option<&Path>) -> String {
    let normalize = |s: &str| match s.to_lowercase().as_str() {
        "jpeg" | "jpg" => "jpg".to_string(),
        "" => "png".to_string(),
        other => other.to_string(),
    };
    if let Some(f) = format_arg {
        return normalize(f);
    }
    output
        .and_then(|o| o.extension())
        .and_then(|e| e.to_str())
        .map(normalize)
        .unwrap_or_else(|| "png".to_string())
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir` + input stem + extension
/// 3. Next to the input, with `_out` appended if it would overwrite it
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>, ext: &str) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));
    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

/// `X,Y` in canvas pixels.
pub fn parse_point(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got '{}'", s))?;
    let x = x.trim().parse::<i32>().map_err(|e| format!("bad x in '{}': {}", s, e))?;
    let y = y.trim().parse::<i32>().map_err(|e| format!("bad y in '{}': {}", s, e))?;
    Ok(Point::new(x, y))
}

/// `WxH`, both non-zero.
pub fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .to_lowercase()
        .split_once('x')
        .map(|(w, h)| (w.trim().parse::<u32>(), h.trim().parse::<u32>()))
        .ok_or_else(|| format!("expected WxH but got '{}'", s))?;
    match (w, h) {
        (Ok(w), Ok(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(format!("invalid size '{}'", s)),
    }
}

/// `N` / `Npx` absolute, `N%` relative.
pub fn parse_guide(s: &str) -> Result<GuideLine, String> {
    let s = s.trim();
    let (digits, relative) = match s.strip_suffix('%') {
        Some(d) => (d, true),
        None => (s.strip_suffix("px").unwrap_or(s), false),
    };
    let value = digits
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid guide '{}': {}", s, e))?;
    Ok(if relative { GuideLine::relative(value) } else { GuideLine::absolute(value) })
}

fn parse_color_arg(s: &str) -> Result<Color, String> {
    parse_color(s).ok_or_else(|| format!("expected R,G,B or R,G,B,A but got '{}'", s))
}

fn parse_alignment(s: &str) -> Result<Alignment, String> {
    Alignment::from_code(s.trim()).ok_or_else(|| format!("unknown alignment '{}'", s))
}
