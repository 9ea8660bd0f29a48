use crate::watermark::WatermarkConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored watermark configuration. The template name is the key of the
/// enclosing mapping and is not repeated inside the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(flatten)]
    pub config: WatermarkConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "chrono::Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "chrono::Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn new(config: WatermarkConfig, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            config,
            description,
            created_at: now,
            updated_at: now,
        }
    }

    /// One-line description of the stored settings.
    pub fn summary(&self) -> String {
        let config = &self.config;
        let mut parts = vec![
            format!("font {}px", config.font_size),
            format!("color RGB({})", config.color),
            format!("position {}", config.position),
            format!("opacity {}%", config.opacity),
            format!("format {}", config.output_format),
        ];
        if let Some(text) = &config.text {
            parts.push(format!("text \"{}\"", text));
        }
        if let Some(path) = &config.overlay_image_path {
            parts.push(format!("image {}", path.display()));
        }
        parts.join(" | ")
    }
}

/// How `import_all` treats a name that already exists in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    #[default]
    Overwrite,
    Skip,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub imported: Vec<String>,
    pub skipped: Vec<String>,
}
