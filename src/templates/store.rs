use super::{ImportSummary, MergeStrategy, Template};
use crate::error::{Result, WatermarkError};
use crate::watermark::WatermarkConfig;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

type TemplateMap = BTreeMap<String, Template>;

/// Named watermark configurations persisted in a single JSON file.
///
/// Every operation reads the file, applies its change and writes the file
/// back before returning. Nothing is cached between calls and the store
/// assumes a single writer.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    path: PathBuf,
}

impl TemplateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace `name`. Replacing keeps the original creation time.
    pub fn save(
        &self,
        name: &str,
        config: &WatermarkConfig,
        description: Option<&str>,
    ) -> Result<Template> {
        validate_name(name)?;
        config
            .validate()
            .map_err(|e| invalid_template(name, e))?;

        let mut templates = self.load()?;
        let now = Utc::now();
        let template = match templates.get(name) {
            Some(existing) => {
                debug!("Overwriting template '{}'", name);
                Template {
                    config: config.clone(),
                    description: description.map(str::to_string),
                    created_at: existing.created_at,
                    updated_at: now,
                }
            }
            None => Template::new(config.clone(), description.map(str::to_string)),
        };

        templates.insert(name.to_string(), template.clone());
        self.persist(&templates)?;
        info!("Saved template '{}' to {}", name, self.path.display());
        Ok(template)
    }

    pub fn get(&self, name: &str) -> Result<Template> {
        self.load()?
            .remove(name)
            .ok_or_else(|| WatermarkError::TemplateNotFound(name.to_string()))
    }

    /// All templates ordered by name.
    pub fn list(&self) -> Result<Vec<(String, Template)>> {
        Ok(self.load()?.into_iter().collect())
    }

    pub fn delete(&self, name: &str) -> Result<Template> {
        let mut templates = self.load()?;
        let removed = templates
            .remove(name)
            .ok_or_else(|| WatermarkError::TemplateNotFound(name.to_string()))?;
        self.persist(&templates)?;
        info!("Deleted template '{}'", name);
        Ok(removed)
    }

    /// Write the whole collection to `target`. Returns the number of templates written.
    pub fn export_all(&self, target: &Path) -> Result<usize> {
        let templates = self.load()?;
        write_map(target, &templates)?;
        info!("Exported {} templates to {}", templates.len(), target.display());
        Ok(templates.len())
    }

    /// Write a single template to `target` in the same schema as [`TemplateStore::export_all`].
    pub fn export_one(&self, name: &str, target: &Path) -> Result<()> {
        let template = self.get(name)?;
        let single = TemplateMap::from([(name.to_string(), template)]);
        write_map(target, &single)?;
        info!("Exported template '{}' to {}", name, target.display());
        Ok(())
    }

    /// Merge every template found in `source` into the store.
    ///
    /// The whole file is validated before anything is merged, so an invalid
    /// record leaves the store untouched.
    pub fn import_all(&self, source: &Path, strategy: MergeStrategy) -> Result<ImportSummary> {
        if !source.exists() {
            return Err(WatermarkError::store(source, "import file does not exist"));
        }
        let incoming = read_map(source)?;
        for (name, template) in &incoming {
            validate_name(name)?;
            template
                .config
                .validate()
                .map_err(|e| invalid_template(name, e))?;
        }

        let mut templates = self.load()?;
        let mut summary = ImportSummary::default();
        for (name, template) in incoming {
            if templates.contains_key(&name) && strategy == MergeStrategy::Skip {
                warn!("Template '{}' already exists, skipping import", name);
                summary.skipped.push(name);
                continue;
            }
            templates.insert(name.clone(), template);
            summary.imported.push(name);
        }

        if !summary.imported.is_empty() {
            self.persist(&templates)?;
        }
        info!(
            "Imported {} templates from {} ({} skipped)",
            summary.imported.len(),
            source.display(),
            summary.skipped.len()
        );
        Ok(summary)
    }

    fn load(&self) -> Result<TemplateMap> {
        if !self.path.exists() {
            return Ok(TemplateMap::new());
        }
        read_map(&self.path)
    }

    fn persist(&self, templates: &TemplateMap) -> Result<()> {
        write_map(&self.path, templates)
    }
}

fn read_map(path: &Path) -> Result<TemplateMap> {
    let contents = std::fs::read_to_string(path).map_err(|e| WatermarkError::store(path, e))?;
    if contents.trim().is_empty() {
        return Ok(TemplateMap::new());
    }
    serde_json::from_str(&contents).map_err(|e| WatermarkError::store(path, e))
}

fn write_map(path: &Path, templates: &TemplateMap) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| WatermarkError::store(path, e))?;
    }

    let json = serde_json::to_string_pretty(templates).map_err(|e| WatermarkError::store(path, e))?;

    // Staged beside the target, then renamed into place
    let staging = path.with_extension("json.tmp");
    std::fs::write(&staging, json).map_err(|e| WatermarkError::store(path, e))?;
    std::fs::rename(&staging, path).map_err(|e| {
        let _ = std::fs::remove_file(&staging);
        WatermarkError::store(path, e)
    })
}

fn validate_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(WatermarkError::InvalidTemplate {
            name: name.to_string(),
            reason: "template name must not be empty".to_string(),
        });
    }
    Ok(())
}

fn invalid_template(name: &str, error: WatermarkError) -> WatermarkError {
    WatermarkError::InvalidTemplate {
        name: name.to_string(),
        reason: error.to_string(),
    }
}
