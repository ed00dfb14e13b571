use {
    crate::{archive::Compression, template::DEFAULT_ARCHIVE_NAME_FORMAT},
    chrono::{DateTime, FixedOffset, Local, Utc},
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
};

/// Default rotation threshold, as a size spec.
pub const DEFAULT_MAX_FILE_SIZE: &str = "2M";

/// Specifies the time zone used to render `{dateTime}` in archive names.
///
/// # Examples
/// ```
/// use filelog_rotator::TimeZone;
/// use chrono::FixedOffset;
///
/// // Use UTC time for global deployments
/// let utc = TimeZone::UTC;
///
/// // Use local system time zone
/// let local = TimeZone::Local;
///
/// // Use a fixed offset for a specific region (e.g., UTC+8)
/// let china = TimeZone::Fix(FixedOffset::east_opt(8 * 3600).unwrap());
/// ```
#[derive(Debug, Clone, Copy)]
pub enum TimeZone {
    /// Use UTC time zone. Best for consistent naming in distributed systems.
    UTC,
    /// Use the system's local time zone, captured when the sink is built.
    Local,
    /// Use a fixed time zone offset.
    Fix(FixedOffset),
}

impl TimeZone {
    pub(crate) fn offset(&self) -> FixedOffset {
        match self {
            TimeZone::UTC => Utc::now().fixed_offset().offset().to_owned(),
            TimeZone::Local => Local::now().offset().to_owned(),
            TimeZone::Fix(fixed_offset) => *fixed_offset,
        }
    }
}

/// Where the rotation sequence number starts when a sink is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SequenceSeed {
    /// Start from zero; the first rotation of this sink is number 1.
    #[default]
    Fresh,
    /// Continue after the highest `{number}` among archives already on disk
    /// that match the configured format. Falls back to zero when the format
    /// has no `{number}` placeholder.
    ScanArchives,
}

/// Line terminator appended to every message passed to
/// [`FileLogSink::write`](crate::FileLogSink::write).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineEnding {
    #[default]
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
        }
    }
}

/// Validated, immutable configuration of a [`FileLogSink`](crate::FileLogSink).
///
/// Built by [`FileLogSinkBuilder`](crate::FileLogSinkBuilder); the size
/// threshold has already been parsed and the archive format checked by the
/// time a value exists.
#[derive(Debug, Clone)]
pub struct LogSinkConfig {
    /// The live log file.
    pub(crate) file_path: PathBuf,
    /// Whether size-based rotation runs at all.
    pub(crate) rotation_enabled: bool,
    /// Rotation threshold in bytes, checked after each write.
    pub(crate) max_size_bytes: u64,
    /// Archive name format, see [`render_archive_name`](crate::render_archive_name).
    pub(crate) archive_name_format: String,
    /// Codec for archives, `None` to keep them as plain copies.
    pub(crate) compression: Option<Compression>,
    /// Offset used for `{dateTime}`.
    pub(crate) time_zone: FixedOffset,
    pub(crate) line_ending: LineEnding,
    /// The maximum number of archives to keep.
    pub(crate) max_keep_files: Option<u64>,
    pub(crate) sequence_seed: SequenceSeed,
    /// Permissions for the live file and archives (Unix-like systems only).
    pub(crate) file_mode: Option<u32>,
    /// Hold an advisory lock on `<file>.lock` around each write.
    pub(crate) cross_process_lock: bool,
}

impl LogSinkConfig {
    pub(crate) fn new(file_path: PathBuf) -> Self {
        LogSinkConfig {
            file_path,
            rotation_enabled: true,
            max_size_bytes: 2 * 1024 * 1024,
            archive_name_format: DEFAULT_ARCHIVE_NAME_FORMAT.to_string(),
            compression: Some(Compression::Zip),
            time_zone: TimeZone::Local.offset(),
            line_ending: LineEnding::Lf,
            max_keep_files: None,
            sequence_seed: SequenceSeed::Fresh,
            file_mode: None,
            cross_process_lock: false,
        }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn rotation_enabled(&self) -> bool {
        self.rotation_enabled
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn archive_name_format(&self) -> &str {
        &self.archive_name_format
    }

    pub fn compression(&self) -> Option<&Compression> {
        self.compression.as_ref()
    }

    pub fn max_keep_files(&self) -> Option<u64> {
        self.max_keep_files
    }

    pub fn sequence_seed(&self) -> SequenceSeed {
        self.sequence_seed
    }

    /// Directory that holds the live file and its archives.
    pub fn directory(&self) -> &Path {
        self.file_path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// The live file's name split into `{fileName}` and `{extension}`.
    pub fn name_parts(&self) -> (String, String) {
        let file_name = self
            .file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = self
            .file_path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        (file_name, extension)
    }

    /// Path of the advisory lock file used with `cross_process_lock`.
    pub fn lock_path(&self) -> PathBuf {
        let mut lock = self.file_path.clone().into_os_string();
        lock.push(".lock");
        PathBuf::from(lock)
    }

    /// Get the current time in the configured time zone.
    pub(crate) fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.time_zone)
    }
}

/// Loosely typed options, as found in a configuration file.
///
/// Every key is optional and falls back to the documented default. Turn the
/// options into a validated sink with
/// [`FileLogSinkBuilder::from_options`](crate::FileLogSinkBuilder::from_options).
///
/// ```
/// use filelog_rotator::SinkOptions;
///
/// let options: SinkOptions = serde_json::from_str(r#"{ "file": "/var/log/app.log", "maxFileSize": "500K" }"#).unwrap();
/// assert!(options.is_file_rotation_enabled);
/// assert_eq!(options.max_file_size, "500K");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SinkOptions {
    /// The live log file. Created, with its parent directories, if missing.
    pub file: PathBuf,
    pub is_file_rotation_enabled: bool,
    /// Size spec such as `2M`, `500K`, `1G` or a plain byte count.
    pub max_file_size: String,
    pub rotated_file_format: String,
    /// Zip archives (and add `.zip` to their names).
    pub zip_rotated_files: bool,
}

impl Default for SinkOptions {
    fn default() -> Self {
        SinkOptions {
            file: std::env::temp_dir().join("filelog_rotator.log"),
            is_file_rotation_enabled: true,
            max_file_size: DEFAULT_MAX_FILE_SIZE.to_string(),
            rotated_file_format: DEFAULT_ARCHIVE_NAME_FORMAT.to_string(),
            zip_rotated_files: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults() {
        let options: SinkOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, SinkOptions::default());
        assert!(options.is_file_rotation_enabled);
        assert!(options.zip_rotated_files);
        assert_eq!(options.max_file_size, "2M");
        assert_eq!(options.rotated_file_format, "{fileName}-{dateTime}.{extension}");
    }

    #[test]
    fn test_options_camel_case_keys() {
        let options: SinkOptions = serde_json::from_str(
            r#"{
                "file": "/var/log/app.log",
                "isFileRotationEnabled": false,
                "maxFileSize": "10",
                "rotatedFileFormat": "{fileName}.{number}.{extension}",
                "zipRotatedFiles": false
            }"#,
        )
        .unwrap();
        assert_eq!(options.file, PathBuf::from("/var/log/app.log"));
        assert!(!options.is_file_rotation_enabled);
        assert_eq!(options.max_file_size, "10");
        assert!(!options.zip_rotated_files);
    }

    #[test]
    fn test_name_parts_and_lock_path() {
        let config = LogSinkConfig::new(PathBuf::from("/var/log/app.log"));
        assert_eq!(config.name_parts(), ("app".to_string(), "log".to_string()));
        assert_eq!(config.directory(), Path::new("/var/log"));
        assert_eq!(config.lock_path(), PathBuf::from("/var/log/app.log.lock"));

        let config = LogSinkConfig::new(PathBuf::from("server"));
        assert_eq!(config.name_parts(), ("server".to_string(), String::new()));
        assert_eq!(config.directory(), Path::new(""));
    }

    #[test]
    fn test_fixed_time_zone() {
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        assert_eq!(TimeZone::Fix(offset).offset(), offset);
        assert_eq!(TimeZone::UTC.offset().local_minus_utc(), 0);
    }
}
