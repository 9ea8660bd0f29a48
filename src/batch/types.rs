use crate::watermark::OutputFormat;
use std::path::{Path, PathBuf};

pub const DEFAULT_DIRECTORY_SUFFIX: &str = "_watermark";

/// Where watermarked files are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// An output directory, or for a single-file source an exact output file
    /// unless the path is an existing directory.
    Explicit(PathBuf),
    /// `<dir>/<dir name><suffix>/` beside the originals, file names preserved.
    Derived { suffix: String },
}

impl Default for Destination {
    fn default() -> Self {
        Destination::Derived {
            suffix: DEFAULT_DIRECTORY_SUFFIX.to_string(),
        }
    }
}

/// Optional decoration around the preserved file stem.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputNaming {
    pub prefix: String,
    pub suffix: String,
}

impl OutputNaming {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Output file name for `source` encoded as `format`. The source extension
    /// is kept when it already names the format.
    pub fn file_name(&self, source: &Path, format: OutputFormat) -> String {
        let stem = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default();
        let extension = source
            .extension()
            .map(|ext| ext.to_string_lossy().to_string())
            .filter(|ext| format.matches_extension(ext))
            .unwrap_or_else(|| format.extension().to_string());

        format!("{}{}{}.{}", self.prefix, stem, self.suffix, extension)
    }
}

/// Where one enumerated source file goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Write into this directory using [`OutputNaming`].
    Directory(PathBuf),
    /// Write exactly this file.
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub source: PathBuf,
    pub target: Target,
}

impl BatchItem {
    pub fn destination(&self, naming: &OutputNaming, format: OutputFormat) -> PathBuf {
        match &self.target {
            Target::Directory(dir) => dir.join(naming.file_name(&self.source, format)),
            Target::File(path) => path.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// How a run ended, for exit-status purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    PartialFailure,
    TotalFailure,
    /// No item succeeded or failed, e.g. an empty directory.
    NothingToDo,
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Success | RunOutcome::NothingToDo => 0,
            RunOutcome::PartialFailure | RunOutcome::TotalFailure => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub failures: Vec<ItemFailure>,
}

impl BatchResult {
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped + self.failed
    }

    pub fn outcome(&self) -> RunOutcome {
        match (self.succeeded, self.failed) {
            (0, 0) => RunOutcome::NothingToDo,
            (_, 0) => RunOutcome::Success,
            (0, _) => RunOutcome::TotalFailure,
            _ => RunOutcome::PartialFailure,
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.outcome().exit_code()
    }

    pub(crate) fn record_failure(&mut self, path: &Path, reason: impl ToString) {
        self.failed += 1;
        self.failures.push(ItemFailure {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        });
    }
}
