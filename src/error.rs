use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatermarkError {
    #[error("Invalid color specification: {0}")]
    InvalidColorSpec(String),

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Invalid output format: {0}")]
    InvalidOutputFormat(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Invalid template '{name}': {reason}")]
    InvalidTemplate { name: String, reason: String },

    #[error("Template store error ({path}): {reason}")]
    TemplateStore { path: PathBuf, reason: String },

    #[error("Source not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Unsupported image format ({path}): {source}")]
    UnsupportedImageFormat {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Overlay image not found or unreadable: {0}")]
    OverlayImageNotFound(PathBuf),

    #[error("Encoding failure ({path}): {reason}")]
    EncodingFailure { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Coarse classification used to decide whether a failure aborts a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong invocation; nothing has been touched yet.
    Configuration,
    /// Confined to one batch item.
    Item,
    /// Precondition or environment failure outside any single item.
    Fatal,
}

impl WatermarkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WatermarkError::InvalidColorSpec(_)
            | WatermarkError::InvalidPosition(_)
            | WatermarkError::InvalidOutputFormat(_)
            | WatermarkError::InvalidConfig(_)
            | WatermarkError::TemplateNotFound(_)
            | WatermarkError::InvalidTemplate { .. } => ErrorKind::Configuration,
            WatermarkError::UnsupportedImageFormat { .. }
            | WatermarkError::OverlayImageNotFound(_)
            | WatermarkError::EncodingFailure { .. } => ErrorKind::Item,
            WatermarkError::TemplateStore { .. }
            | WatermarkError::SourceNotFound(_)
            | WatermarkError::IoError(_) => ErrorKind::Fatal,
        }
    }

    /// Process exit status for a run that ended with this error.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Item | ErrorKind::Fatal => 1,
        }
    }

    pub(crate) fn store(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        WatermarkError::TemplateStore {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn encoding(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        WatermarkError::EncodingFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T, E = WatermarkError> = std::result::Result<T, E>;
