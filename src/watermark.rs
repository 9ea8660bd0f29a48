use crate::color::Color;
use crate::error::{Result, WatermarkError};
use crate::layout::Anchor;
use crate::templates::TemplateStore;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "JPEG")]
    Jpeg,
    #[serde(rename = "PNG")]
    Png,
    #[serde(rename = "TIFF")]
    Tiff,
    #[serde(rename = "BMP")]
    Bmp,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::Tiff => "tiff",
            OutputFormat::Bmp => "bmp",
        }
    }

    /// Whether `ext` (any case) already names this format.
    pub fn matches_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        match self {
            OutputFormat::Jpeg => ext == "jpg" || ext == "jpeg",
            OutputFormat::Png => ext == "png",
            OutputFormat::Tiff => ext == "tiff" || ext == "tif",
            OutputFormat::Bmp => ext == "bmp",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
            OutputFormat::Tiff => ImageFormat::Tiff,
            OutputFormat::Bmp => ImageFormat::Bmp,
        }
    }

    /// Formats whose output is flattened onto an opaque background.
    pub fn is_opaque(&self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::Bmp)
    }
}

impl FromStr for OutputFormat {
    type Err = WatermarkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            "tiff" | "tif" => Ok(OutputFormat::Tiff),
            "bmp" => Ok(OutputFormat::Bmp),
            _ => Err(WatermarkError::InvalidOutputFormat(s.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::Tiff => "TIFF",
            OutputFormat::Bmp => "BMP",
        };
        f.write_str(name)
    }
}

pub const MAX_FONT_SIZE: u32 = 10_000;

/// A fully resolved watermark configuration.
///
/// Serialized with the same field names as a template record; fields absent
/// from a stored record take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatermarkConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlay_image_path: Option<PathBuf>,
    pub font_size: u32,
    pub color: Color,
    pub position: Anchor,
    pub opacity: u8,
    pub output_format: OutputFormat,
    pub quality: u8,
    pub overlay_scale: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            text: None,
            overlay_image_path: None,
            font_size: 30,
            color: Color::WHITE,
            position: Anchor::BottomRight,
            opacity: 80,
            output_format: OutputFormat::Jpeg,
            quality: 95,
            overlay_scale: 1.0,
        }
    }
}

impl WatermarkConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_FONT_SIZE).contains(&self.font_size) {
            return Err(WatermarkError::InvalidConfig(format!(
                "font size {} out of range 1-{}",
                self.font_size, MAX_FONT_SIZE
            )));
        }
        if self.opacity > 100 {
            return Err(WatermarkError::InvalidConfig(format!(
                "opacity {} out of range 0-100",
                self.opacity
            )));
        }
        if !(1..=100).contains(&self.quality) {
            return Err(WatermarkError::InvalidConfig(format!(
                "quality {} out of range 1-100",
                self.quality
            )));
        }
        if !self.overlay_scale.is_finite() || self.overlay_scale <= 0.0 {
            return Err(WatermarkError::InvalidConfig(format!(
                "overlay scale {} must be a positive number",
                self.overlay_scale
            )));
        }
        Ok(())
    }

    /// Opacity as a 0.0-1.0 factor.
    pub fn alpha_factor(&self) -> f32 {
        self.opacity.min(100) as f32 / 100.0
    }

    /// True when neither text nor an overlay image is configured, in which
    /// case the capture timestamp becomes the text.
    pub fn needs_derived_text(&self) -> bool {
        self.text.is_none() && self.overlay_image_path.is_none()
    }
}

/// Explicitly supplied per-call fields. `None` means "not given", so a value
/// equal to the default still overrides a template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatermarkOverrides {
    pub text: Option<String>,
    pub overlay_image_path: Option<PathBuf>,
    pub font_size: Option<u32>,
    pub color: Option<Color>,
    pub position: Option<Anchor>,
    pub opacity: Option<u8>,
    pub output_format: Option<OutputFormat>,
    pub quality: Option<u8>,
    pub overlay_scale: Option<f32>,
}

impl WatermarkOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply_to(&self, config: &mut WatermarkConfig) {
        if let Some(text) = &self.text {
            config.text = Some(text.clone());
        }
        if let Some(path) = &self.overlay_image_path {
            config.overlay_image_path = Some(path.clone());
        }
        if let Some(font_size) = self.font_size {
            config.font_size = font_size;
        }
        if let Some(color) = self.color {
            config.color = color;
        }
        if let Some(position) = self.position {
            config.position = position;
        }
        if let Some(opacity) = self.opacity {
            config.opacity = opacity;
        }
        if let Some(output_format) = self.output_format {
            config.output_format = output_format;
        }
        if let Some(quality) = self.quality {
            config.quality = quality;
        }
        if let Some(overlay_scale) = self.overlay_scale {
            config.overlay_scale = overlay_scale;
        }
    }
}

/// Merges built-in defaults, an optional named template and explicit
/// overrides, in increasing order of precedence.
pub struct ConfigResolver<'a> {
    store: Option<&'a TemplateStore>,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(store: &'a TemplateStore) -> Self {
        Self { store: Some(store) }
    }

    /// A resolver with no template store; naming a template always fails.
    pub fn without_templates() -> Self {
        Self { store: None }
    }

    pub fn resolve(
        &self,
        template_name: Option<&str>,
        overrides: &WatermarkOverrides,
    ) -> Result<WatermarkConfig> {
        let mut config = match template_name {
            Some(name) => {
                let store = self
                    .store
                    .ok_or_else(|| WatermarkError::TemplateNotFound(name.to_string()))?;
                let template = store.get(name)?;
                debug!("Resolving watermark from template '{}'", name);
                template.config
            }
            None => WatermarkConfig::default(),
        };

        overrides.apply_to(&mut config);
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = WatermarkConfig::default();
        assert_eq!(config.font_size, 30);
        assert_eq!(config.color, Color::new(255, 255, 255));
        assert_eq!(config.position, Anchor::BottomRight);
        assert_eq!(config.opacity, 80);
        assert_eq!(config.output_format, OutputFormat::Jpeg);
        assert_eq!(config.quality, 95);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_resolve_without_template_or_overrides_yields_defaults() {
        let config = ConfigResolver::without_templates()
            .resolve(None, &WatermarkOverrides::default())
            .unwrap();
        assert_eq!(config, WatermarkConfig::default());
    }

    #[test]
    fn test_font_size_precedence() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path().join("templates.json"));
        let template = WatermarkConfig {
            font_size: 48,
            ..WatermarkConfig::default()
        };
        store.save("big", &template, None).unwrap();
        let resolver = ConfigResolver::new(&store);

        let from_template = resolver
            .resolve(Some("big"), &WatermarkOverrides::default())
            .unwrap();
        assert_eq!(from_template.font_size, 48);

        let explicit = WatermarkOverrides {
            font_size: Some(12),
            ..Default::default()
        };
        assert_eq!(resolver.resolve(Some("big"), &explicit).unwrap().font_size, 12);
        assert_eq!(resolver.resolve(None, &explicit).unwrap().font_size, 12);
    }

    #[test]
    fn test_explicit_default_value_still_overrides_template() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path().join("templates.json"));
        let template = WatermarkConfig {
            font_size: 48,
            opacity: 40,
            ..WatermarkConfig::default()
        };
        store.save("soft", &template, None).unwrap();

        let overrides = WatermarkOverrides {
            font_size: Some(30),
            ..Default::default()
        };
        let config = ConfigResolver::new(&store)
            .resolve(Some("soft"), &overrides)
            .unwrap();
        assert_eq!(config.font_size, 30);
        assert_eq!(config.opacity, 40);
    }

    #[test]
    fn test_missing_template_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = TemplateStore::new(temp_dir.path().join("templates.json"));
        let result = ConfigResolver::new(&store).resolve(Some("nope"), &WatermarkOverrides::default());
        assert!(matches!(result, Err(WatermarkError::TemplateNotFound(name)) if name == "nope"));

        let result = ConfigResolver::without_templates()
            .resolve(Some("nope"), &WatermarkOverrides::default());
        assert!(matches!(result, Err(WatermarkError::TemplateNotFound(_))));
    }

    #[test]
    fn test_out_of_range_overrides_are_rejected() {
        let resolver = ConfigResolver::without_templates();
        let cases = [
            WatermarkOverrides {
                opacity: Some(101),
                ..Default::default()
            },
            WatermarkOverrides {
                quality: Some(0),
                ..Default::default()
            },
            WatermarkOverrides {
                font_size: Some(0),
                ..Default::default()
            },
            WatermarkOverrides {
                overlay_scale: Some(0.0),
                ..Default::default()
            },
        ];
        for overrides in cases {
            assert!(matches!(
                resolver.resolve(None, &overrides),
                Err(WatermarkError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_font_size_upper_bound() {
        let resolver = ConfigResolver::without_templates();
        let at_limit = WatermarkOverrides {
            font_size: Some(MAX_FONT_SIZE),
            ..Default::default()
        };
        assert_eq!(
            resolver.resolve(None, &at_limit).unwrap().font_size,
            MAX_FONT_SIZE
        );

        for font_size in [MAX_FONT_SIZE + 1, u32::MAX] {
            let overrides = WatermarkOverrides {
                font_size: Some(font_size),
                ..Default::default()
            };
            let err = resolver.resolve(None, &overrides).unwrap_err();
            assert!(matches!(err, WatermarkError::InvalidConfig(_)));
            assert_eq!(err.exit_code(), 2);
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("jpg".parse::<OutputFormat>().unwrap(), OutputFormat::Jpeg);
        assert_eq!("PNG".parse::<OutputFormat>().unwrap(), OutputFormat::Png);
        assert_eq!("tif".parse::<OutputFormat>().unwrap(), OutputFormat::Tiff);
        assert!(matches!(
            "gif".parse::<OutputFormat>(),
            Err(WatermarkError::InvalidOutputFormat(_))
        ));
        assert!(OutputFormat::Jpeg.matches_extension("JPEG"));
        assert!(!OutputFormat::Png.matches_extension("jpg"));
    }

    #[test]
    fn test_derived_text_only_without_text_or_overlay() {
        let mut config = WatermarkConfig::default();
        assert!(config.needs_derived_text());
        config.overlay_image_path = Some(PathBuf::from("logo.png"));
        assert!(!config.needs_derived_text());
        config.overlay_image_path = None;
        config.text = Some("© Studio".to_string());
        assert!(!config.needs_derived_text());
    }
}
