use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

pub mod batch;
pub mod color;
pub mod error;
pub mod layout;
pub mod render;
pub mod startup_checks;
pub mod templates;
pub mod timestamp;
pub mod watermark;

pub use batch::{BatchProcessor, BatchResult, Destination, OutputNaming, RunOutcome};
pub use error::{ErrorKind, Result, WatermarkError};
pub use render::{Renderer, WatermarkFont};
pub use templates::TemplateStore;
pub use timestamp::TimestampExtractor;
pub use watermark::{ConfigResolver, OutputFormat, WatermarkConfig, WatermarkOverrides};

pub const DEFAULT_CONFIG_FILE: &str = "stampwell.toml";

/// Environment settings read from `stampwell.toml`.
///
/// None of these are watermark fields; they decide where things live and
/// how outputs are named.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub templates: TemplatesConfig,
    pub fonts: FontsConfig,
    pub layout: LayoutConfig,
    pub timestamp: TimestampConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplatesConfig {
    pub path: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        let path = dirs::home_dir()
            .map(|home| home.join(".stampwell").join("templates.json"))
            .unwrap_or_else(|| PathBuf::from("templates.json"));
        Self { path }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct FontsConfig {
    pub path: Option<PathBuf>,
    pub search_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub margin: u32,
    pub backing_alpha: u8,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin: layout::DEFAULT_MARGIN,
            backing_alpha: render::DEFAULT_BACKING_ALPHA,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub format: String,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            format: timestamp::DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory_suffix: String,
    pub prefix: String,
    pub suffix: String,
    pub overwrite: bool,
    pub recursive: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory_suffix: batch::DEFAULT_DIRECTORY_SUFFIX.to_string(),
            prefix: String::new(),
            suffix: String::new(),
            overwrite: true,
            recursive: false,
        }
    }
}

impl Config {
    /// Read `path`, or fall back to defaults when it does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = toml_edit::de::from_str::<Config>(&content).map_err(|e| {
            WatermarkError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        info!("Configuration loaded from: {:?}", path);
        Ok(config)
    }

    pub fn template_store(&self) -> TemplateStore {
        TemplateStore::new(self.templates.path.clone())
    }

    /// Build a renderer with the configured font, timestamp pattern and layout.
    pub fn renderer(&self) -> Result<Renderer> {
        let timestamps = TimestampExtractor::try_new(&self.timestamp.format)?;
        let font = WatermarkFont::discover(self.fonts.path.as_deref(), &self.fonts.search_paths);
        Ok(Renderer::new(font, timestamps)
            .with_margin(self.layout.margin)
            .with_backing_alpha(self.layout.backing_alpha))
    }

    /// An explicit output path wins over the derived `<dir><suffix>` rule.
    pub fn destination(&self, explicit: Option<PathBuf>) -> Destination {
        match explicit {
            Some(path) => Destination::Explicit(path),
            None => Destination::Derived {
                suffix: self.output.directory_suffix.clone(),
            },
        }
    }

    pub fn naming(&self) -> OutputNaming {
        OutputNaming::new(&self.output.prefix, &self.output.suffix)
    }

    pub fn batch_processor(
        &self,
        explicit_output: Option<PathBuf>,
        recursive: bool,
    ) -> Result<BatchProcessor> {
        let processor = BatchProcessor::new(self.renderer()?, self.destination(explicit_output))
            .with_naming(self.naming())
            .with_overwrite(self.output.overwrite)
            .with_recursive(recursive || self.output.recursive);
        Ok(processor)
    }
}
