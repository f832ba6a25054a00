use std::path::PathBuf;

use image::Rgba;

use crate::canvas::{Color, TRANSPARENT};
use crate::region::Alignment;

/// Editor defaults that persist across sessions.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSettings {
    /// Size of a new canvas
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Bucket color when none is given
    pub fill_color: Color,
    /// Guide overlay appearance
    pub guide_color: Color,
    pub guide_width: u32,
    /// Alignment given to newly placed images
    pub image_alignment: Alignment,
    /// Canvas color under all layers
    pub background: Color,
    /// Stretch bitmap layers on resize instead of cropping
    pub stretch_on_resize: bool,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            canvas_width: 1280,
            canvas_height: 720,
            fill_color: Rgba([0, 0, 0, 255]),
            guide_color: Rgba([0, 0, 255, 255]),
            guide_width: 4,
            image_alignment: Alignment::Center,
            background: TRANSPARENT,
            stretch_on_resize: false,
        }
    }
}

/// Format a color as "r,g,b,a"
pub fn color_to_str(c: Color) -> String {
    format!("{},{},{},{}", c[0], c[1], c[2], c[3])
}

/// Parse "r,g,b" (opaque) or "r,g,b,a"
pub fn parse_color(s: &str) -> Option<Color> {
    let parts = s
        .split(',')
        .map(|p| p.trim().parse::<u8>().ok())
        .collect::<Option<Vec<u8>>>()?;
    match parts[..] {
        [r, g, b] => Some(Rgba([r, g, b, 255])),
        [r, g, b, a] => Some(Rgba([r, g, b, a])),
        _ => None,
    }
}

impl EditorSettings {
    /// Path to the settings file.
    /// On Linux:   ~/.config/grimage/grimage_settings.cfg  (XDG_CONFIG_HOME respected)
    /// On Windows: %APPDATA%\GrImage\grimage_settings.cfg
    /// On macOS:   ~/Library/Application Support/GrImage/grimage_settings.cfg
    /// Fallback:   next to the executable.
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            let config_dir = std::env::var("XDG_CONFIG_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|_| {
                    let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                    PathBuf::from(home).join(".config")
                })
                .join("grimage");
            Some(config_dir.join("grimage_settings.cfg"))
        }
        #[cfg(target_os = "windows")]
        {
            let appdata = std::env::var("APPDATA")
                .or_else(|_| std::env::var("USERPROFILE"))
                .ok()?;
            Some(PathBuf::from(appdata).join("GrImage").join("grimage_settings.cfg"))
        }
        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
            Some(
                PathBuf::from(home)
                    .join("Library")
                    .join("Application Support")
                    .join("GrImage")
                    .join("grimage_settings.cfg"),
            )
        }
        #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
        {
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|d| d.join("grimage_settings.cfg")))
        }
    }

    pub fn to_cfg_string(&self) -> String {
        format!(
            "canvas_width={}\n\
             canvas_height={}\n\
             fill_color={}\n\
             guide_color={}\n\
             guide_width={}\n\
             image_alignment={}\n\
             background={}\n\
             stretch_on_resize={}\n",
            self.canvas_width,
            self.canvas_height,
            color_to_str(self.fill_color),
            color_to_str(self.guide_color),
            self.guide_width,
            self.image_alignment.code(),
            color_to_str(self.background),
            self.stretch_on_resize,
        )
    }

    /// Parse `key=value` lines.  Unknown keys and bad values keep the
    /// default.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let val = val.trim();
            match key.trim() {
                "canvas_width" => {
                    if let Ok(v) = val.parse::<u32>()
                        && v > 0
                    {
                        s.canvas_width = v;
                    }
                }
                "canvas_height" => {
                    if let Ok(v) = val.parse::<u32>()
                        && v > 0
                    {
                        s.canvas_height = v;
                    }
                }
                "fill_color" => {
                    if let Some(c) = parse_color(val) {
                        s.fill_color = c;
                    }
                }
                "guide_color" => {
                    if let Some(c) = parse_color(val) {
                        s.guide_color = c;
                    }
                }
                "guide_width" => {
                    if let Ok(v) = val.parse::<u32>() {
                        s.guide_width = v.clamp(1, 64);
                    }
                }
                "image_alignment" => {
                    if let Some(a) = Alignment::from_code(val) {
                        s.image_alignment = a;
                    }
                }
                "background" => {
                    if let Some(c) = parse_color(val) {
                        s.background = c;
                    }
                }
                "stretch_on_resize" => s.stretch_on_resize = val == "true",
                _ => {}
            }
        }
        s
    }

    /// Load settings from disk.  A missing file is created with defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let s = Self::default();
                s.save();
                s
            }
            Err(e) => {
                crate::log_warn!("Failed to read settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Some(dir) = path.parent()
            && let Err(e) = std::fs::create_dir_all(dir)
        {
            crate::log_warn!("Cannot create settings directory {}: {}", dir.display(), e);
            return;
        }
        if let Err(e) = std::fs::write(&path, self.to_cfg_string()) {
            crate::log_warn!("Failed to save settings to {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rgb_and_rgba() {
        assert_eq!(parse_color("10, 20,30"), Some(Rgba([10, 20, 30, 255])));
        assert_eq!(parse_color("1,2,3,4"), Some(Rgba([1, 2, 3, 4])));
        assert_eq!(parse_color("1,2"), None);
        assert_eq!(parse_color("1,2,300"), None);
        assert_eq!(parse_color(""), None);
    }

    #[test]
    fn cfg_round_trip() {
        let settings = EditorSettings {
            canvas_width: 640,
            fill_color: Rgba([200, 0, 0, 255]),
            image_alignment: Alignment::RightBottom,
            stretch_on_resize: true,
            ..EditorSettings::default()
        };
        assert_eq!(EditorSettings::parse(&settings.to_cfg_string()), settings);
    }

    #[test]
    fn bad_values_fall_back_to_defaults() {
        let s = EditorSettings::parse(
            "canvas_width=0\n\
             canvas_height=abc\n\
             guide_width=500\n\
             image_alignment=middle\n\
             no equals sign\n\
             unknown=1\n",
        );
        let d = EditorSettings::default();
        assert_eq!(s.canvas_width, d.canvas_width);
        assert_eq!(s.canvas_height, d.canvas_height);
        assert_eq!(s.guide_width, 64);
        assert_eq!(s.image_alignment, Alignment::Center);
    }
}
