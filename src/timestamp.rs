use crate::error::{Result, WatermarkError};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDateTime};
use std::path::Path;
use tracing::{debug, trace};

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Derives display text from a photo's capture time.
///
/// Falls back to the file's modification time whenever the EXIF capture time
/// is missing or unparseable. Neither path returns an error.
#[derive(Debug, Clone)]
pub struct TimestampExtractor {
    format: String,
}

impl Default for TimestampExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TIMESTAMP_FORMAT)
    }
}

impl TimestampExtractor {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    /// Like [`TimestampExtractor::new`], rejecting strftime patterns chrono cannot render.
    pub fn try_new(format: impl Into<String>) -> Result<Self> {
        let format = format.into();
        let invalid = StrftimeItems::new(&format).any(|item| matches!(item, Item::Error));
        if invalid || format.trim().is_empty() {
            return Err(WatermarkError::InvalidConfig(format!(
                "invalid timestamp format '{}'",
                format
            )));
        }
        Ok(Self { format })
    }

    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn extract(&self, image_path: &Path) -> String {
        let timestamp = match capture_time(image_path) {
            Some(captured) => {
                debug!("Using EXIF capture time for {}", image_path.display());
                captured
            }
            None => {
                debug!(
                    "No usable capture time for {}, using modification time",
                    image_path.display()
                );
                modification_time(image_path)
            }
        };

        timestamp.format(&self.format).to_string()
    }
}

/// Capture time recorded in the file's EXIF block, interpreted as local time.
pub fn capture_time(image_path: &Path) -> Option<NaiveDateTime> {
    let exif = match rexif::parse_file(image_path) {
        Ok(exif) => exif,
        Err(e) => {
            trace!("No EXIF data for {}: {}", image_path.display(), e);
            return None;
        }
    };

    // Try different date fields in order of preference
    let date_fields = [
        rexif::ExifTag::DateTimeOriginal,
        rexif::ExifTag::DateTimeDigitized,
        rexif::ExifTag::DateTime,
    ];

    for field in &date_fields {
        if let Some(entry) = exif.entries.iter().find(|e| e.tag == *field)
            && let Some(date) = parse_exif_datetime(&entry.value_more_readable)
        {
            trace!("Found capture date in {:?}: {}", field, date);
            return Some(date);
        }
    }

    None
}

fn parse_exif_datetime(datetime_str: &str) -> Option<NaiveDateTime> {
    // EXIF datetime format: "2005:07:30 07:22:46"
    let trimmed = datetime_str.trim().trim_end_matches('\0');

    let formats = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    formats
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
}

fn modification_time(image_path: &Path) -> NaiveDateTime {
    let modified = std::fs::metadata(image_path).and_then(|metadata| metadata.modified());
    let local: DateTime<Local> = match modified {
        Ok(time) => time.into(),
        Err(e) => {
            debug!(
                "Cannot read modification time of {}: {}, using current time",
                image_path.display(),
                e
            );
            Local::now()
        }
    };
    local.naive_local()
}
