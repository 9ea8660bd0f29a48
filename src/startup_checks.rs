use crate::Config;
use crate::render::WatermarkFont;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Source does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("Source directory is not readable: {0}")]
    SourceUnreadable(PathBuf),

    #[error("Template store path is a directory: {0}")]
    TemplateStoreIsDirectory(PathBuf),
}

/// Checks run before a batch touches any file.
///
/// Missing fonts and a missing template store directory only warn; the
/// renderer and store have fallbacks for both.
pub async fn perform_startup_checks(
    config: &Config,
    source: &Path,
) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    if !source.exists() {
        error!("Source does not exist: {:?}", source);
        errors.push(StartupCheckError::SourceMissing(source.to_path_buf()));
    } else if source.is_dir() {
        match tokio::fs::read_dir(source).await {
            Ok(_) => info!("Source directory is accessible: {:?}", source),
            Err(e) => {
                error!("Source directory is not accessible: {}", e);
                errors.push(StartupCheckError::SourceUnreadable(source.to_path_buf()));
            }
        }
    } else {
        info!("Source file exists: {:?}", source);
    }

    // Fonts
    let font = WatermarkFont::discover(config.fonts.path.as_deref(), &config.fonts.search_paths);
    if let Some(configured) = &config.fonts.path
        && font.path() != Some(configured.as_path())
    {
        warn!("Configured font is missing or unreadable: {:?}", configured);
    }
    if font.is_builtin() {
        warn!("No usable font found, text will use the built-in bitmap font");
    }

    // Template store
    let store_path = &config.templates.path;
    if store_path.is_dir() {
        error!("Template store path is a directory: {:?}", store_path);
        errors.push(StartupCheckError::TemplateStoreIsDirectory(
            store_path.clone(),
        ));
    } else if let Some(parent) = store_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        warn!(
            "Template store directory does not exist, it will be created on first save: {:?}",
            parent
        );
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}
