// Batch module - applies one watermark configuration across many files
mod types;

pub use types::*;

use crate::error::{Result, WatermarkError};
use crate::render::Renderer;
use crate::watermark::WatermarkConfig;
use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Extensions picked up when enumerating a directory.
pub const ELIGIBLE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "tiff", "tif", "bmp"];

pub fn is_eligible(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            ELIGIBLE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Supplies the configuration for each item.
pub trait ConfigSource {
    fn config_for(&self, source: &Path) -> Result<Cow<'_, WatermarkConfig>>;
}

impl ConfigSource for WatermarkConfig {
    fn config_for(&self, _source: &Path) -> Result<Cow<'_, WatermarkConfig>> {
        Ok(Cow::Borrowed(self))
    }
}

/// Resolves a configuration per file. An error fails only that item.
pub struct PerItemConfig<F>(pub F);

impl<F> ConfigSource for PerItemConfig<F>
where
    F: Fn(&Path) -> Result<WatermarkConfig>,
{
    fn config_for(&self, source: &Path) -> Result<Cow<'_, WatermarkConfig>> {
        (self.0)(source).map(Cow::Owned)
    }
}

/// Receives per-item events while a batch runs.
pub trait BatchReporter: Send + Sync {
    fn item_started(&self, _index: usize, _total: usize, _source: &Path) {}
    fn item_succeeded(&self, source: &Path, destination: &Path);
    fn item_skipped(&self, source: &Path, reason: &str);
    fn item_failed(&self, source: &Path, error: &WatermarkError);
    fn finished(&self, _result: &BatchResult) {}
}

/// Logs batch progress through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl BatchReporter for TracingReporter {
    fn item_started(&self, index: usize, total: usize, source: &Path) {
        debug!("[{}/{}] Processing {}", index + 1, total, source.display());
    }

    fn item_succeeded(&self, source: &Path, destination: &Path) {
        info!("Watermarked {} -> {}", source.display(), destination.display());
    }

    fn item_skipped(&self, source: &Path, reason: &str) {
        info!("Skipped {}: {}", source.display(), reason);
    }

    fn item_failed(&self, source: &Path, error: &WatermarkError) {
        error!("Failed to watermark {}: {}", source.display(), error);
    }

    fn finished(&self, result: &BatchResult) {
        info!(
            "Batch finished: {} succeeded, {} skipped, {} failed",
            result.succeeded, result.skipped, result.failed
        );
        for failure in &result.failures {
            warn!("  {}: {}", failure.path.display(), failure.reason);
        }
    }
}

pub struct BatchProcessor {
    renderer: Renderer,
    destination: Destination,
    naming: OutputNaming,
    overwrite: bool,
    recursive: bool,
    stop: Option<Arc<AtomicBool>>,
}

impl BatchProcessor {
    pub fn new(renderer: Renderer, destination: Destination) -> Self {
        Self {
            renderer,
            destination,
            naming: OutputNaming::default(),
            overwrite: true,
            recursive: false,
            stop: None,
        }
    }

    pub fn with_naming(mut self, naming: OutputNaming) -> Self {
        self.naming = naming;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Checked between items; once set, the remaining items are skipped.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Output directory used for a directory source.
    pub fn output_directory(&self, source_dir: &Path) -> PathBuf {
        match &self.destination {
            Destination::Explicit(path) => path.clone(),
            Destination::Derived { suffix } => {
                source_dir.join(format!("{}{}", directory_name(source_dir), suffix))
            }
        }
    }

    /// Enumerate the files a run over `source` would process, in a stable order.
    pub fn plan(&self, source: &Path) -> Result<Vec<BatchItem>> {
        if !source.exists() {
            return Err(WatermarkError::SourceNotFound(source.to_path_buf()));
        }

        if source.is_file() {
            return Ok(vec![self.plan_file(source)]);
        }

        let output_dir = self.output_directory(source);
        let output_canonical = output_dir.canonicalize().ok();
        let max_depth = if self.recursive { usize::MAX } else { 1 };

        let walker = WalkDir::new(source)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.file_type().is_dir()
                    && is_same_path(entry.path(), &output_dir, output_canonical.as_deref()))
            });

        let mut items = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Cannot read entry under {}: {}", source.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file()
                || entry.file_name().to_string_lossy().starts_with('.')
                || !is_eligible(entry.path())
            {
                continue;
            }

            let relative_dir = entry
                .path()
                .parent()
                .and_then(|parent| parent.strip_prefix(source).ok())
                .unwrap_or_else(|| Path::new(""));
            items.push(BatchItem {
                source: entry.path().to_path_buf(),
                target: Target::Directory(output_dir.join(relative_dir)),
            });
        }

        debug!(
            "Found {} eligible images under {}",
            items.len(),
            source.display()
        );
        Ok(items)
    }

    fn plan_file(&self, source: &Path) -> BatchItem {
        let target = match &self.destination {
            Destination::Explicit(path) if path.is_dir() => Target::Directory(path.clone()),
            Destination::Explicit(path) => Target::File(path.clone()),
            Destination::Derived { .. } => {
                let parent = source
                    .parent()
                    .filter(|parent| !parent.as_os_str().is_empty())
                    .unwrap_or_else(|| Path::new("."));
                Target::Directory(self.output_directory(parent))
            }
        };
        BatchItem {
            source: source.to_path_buf(),
            target,
        }
    }

    /// Watermark every eligible file under `source`.
    ///
    /// Only a missing source aborts the run; every per-item problem is
    /// recorded in the returned [`BatchResult`].
    pub fn run<C>(
        &self,
        source: &Path,
        configs: &C,
        reporter: &dyn BatchReporter,
    ) -> Result<BatchResult>
    where
        C: ConfigSource + ?Sized,
    {
        let items = self.plan(source)?;
        if items.is_empty() {
            warn!("No eligible images found in {}", source.display());
        } else {
            info!("Processing {} images from {}", items.len(), source.display());
        }

        let total = items.len();
        let mut result = BatchResult::default();
        let mut written = HashMap::new();

        for (index, item) in items.iter().enumerate() {
            if self.stop_requested() {
                let remaining = &items[index..];
                info!("Stop requested, skipping {} remaining images", remaining.len());
                for rest in remaining {
                    result.skipped += 1;
                    reporter.item_skipped(&rest.source, "stop requested");
                }
                break;
            }

            reporter.item_started(index, total, &item.source);
            self.process_item(item, configs, reporter, &mut result, &mut written);
        }

        reporter.finished(&result);
        Ok(result)
    }

    /// `written` maps each destination produced so far in this run to the
    /// source it came from. A second source landing on the same file fails.
    fn process_item<C>(
        &self,
        item: &BatchItem,
        configs: &C,
        reporter: &dyn BatchReporter,
        result: &mut BatchResult,
        written: &mut HashMap<PathBuf, PathBuf>,
    ) where
        C: ConfigSource + ?Sized,
    {
        let config = match configs
            .config_for(&item.source)
            .and_then(|config| config.validate().map(|()| config))
        {
            Ok(config) => config,
            Err(e) => {
                reporter.item_failed(&item.source, &e);
                result.record_failure(&item.source, e);
                return;
            }
        };

        let destination = item.destination(&self.naming, config.output_format);
        if let Some(earlier) = written.get(&destination) {
            let e = WatermarkError::encoding(
                &destination,
                format!("already written from {}", earlier.display()),
            );
            reporter.item_failed(&item.source, &e);
            result.record_failure(&item.source, e);
            return;
        }
        if is_same_path(&item.source, &destination, destination.canonicalize().ok().as_deref()) {
            result.skipped += 1;
            reporter.item_skipped(&item.source, "destination is the source file");
            return;
        }
        if !self.overwrite && destination.exists() {
            result.skipped += 1;
            reporter.item_skipped(&item.source, "destination already exists");
            return;
        }

        match self.renderer.render_file(&item.source, &destination, &config) {
            Ok(()) => {
                result.succeeded += 1;
                reporter.item_succeeded(&item.source, &destination);
                written.insert(destination, item.source.clone());
            }
            Err(e) => {
                reporter.item_failed(&item.source, &e);
                result.record_failure(&item.source, e);
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|stop| stop.load(Ordering::SeqCst))
    }
}

fn is_same_path(path: &Path, other: &Path, other_canonical: Option<&Path>) -> bool {
    if path == other {
        return true;
    }
    match (path.canonicalize().ok(), other_canonical) {
        (Some(canonical), Some(other)) => canonical == other,
        _ => false,
    }
}

fn directory_name(dir: &Path) -> String {
    dir.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .or_else(|| {
            dir.canonicalize()
                .ok()
                .and_then(|canonical| canonical.file_name().map(|n| n.to_string_lossy().to_string()))
        })
        .unwrap_or_else(|| "output".to_string())
}
