use {
    crate::{
        archive::Archiver,
        config::LogSinkConfig,
        fs::FileSystem,
        template::{archive_pattern, render_archive_name},
        SinkError,
    },
    chrono::{DateTime, FixedOffset},
    std::{io, path::PathBuf},
};

/// One successful rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    /// The live file that was archived and truncated.
    pub source_path: PathBuf,
    /// The archive that now holds the live file's former content.
    pub destination_path: PathBuf,
    /// Process-local, advancing by one per triggered rotation attempt.
    pub sequence_number: u64,
    /// The time used to render the archive name.
    pub timestamp: DateTime<FixedOffset>,
    /// Bytes moved out of the live file, before compression.
    pub archived_bytes: u64,
}

/// Result of a post-write rotation check.
#[derive(Debug)]
pub enum RotationOutcome {
    /// Rotation is disabled or the threshold was not reached.
    None,
    /// The live file was archived and is empty again.
    Rotated(ArchiveRecord),
    /// A rotation was due but failed; the live file is unchanged and the
    /// rotation will be attempted again on the next write.
    Failed(SinkError),
}

impl RotationOutcome {
    pub fn is_rotated(&self) -> bool {
        matches!(self, RotationOutcome::Rotated(_))
    }

    pub fn archive(&self) -> Option<&ArchiveRecord> {
        match self {
            RotationOutcome::Rotated(record) => Some(record),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SinkError> {
        match self {
            RotationOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

/// Decides after each write whether the live file must be rotated, and
/// performs the rotation.
pub struct RotationPolicy<'a> {
    config: &'a LogSinkConfig,
    fs: &'a dyn FileSystem,
}

impl<'a> RotationPolicy<'a> {
    pub fn new(config: &'a LogSinkConfig, fs: &'a dyn FileSystem) -> Self {
        RotationPolicy { config, fs }
    }

    /// Check if the live file should be rotated.
    /// The threshold is checked after the write, so a file may grow past it
    /// by up to one message.
    pub fn should_rotate(&self, current_size: u64) -> bool {
        self.config.rotation_enabled && current_size >= self.config.max_size_bytes
    }

    /// Get the archive path for a rotation.
    /// # Arguments
    /// * `number` - The sequence number of the rotation.
    /// * `now` - The time of the rotation.
    /// # Returns
    /// The rendered archive name joined with the live file's directory.
    pub fn archive_path(&self, number: u64, now: &DateTime<FixedOffset>) -> PathBuf {
        let (file_name, extension) = self.config.name_parts();
        let name = render_archive_name(
            &self.config.archive_name_format,
            &file_name,
            &extension,
            number,
            now,
            self.config.compression.as_ref(),
        );
        self.config.directory().join(name)
    }

    /// Rotate the live file if `current_size` has reached the threshold.
    ///
    /// `sequence` holds the number of the last attempted rotation. It is
    /// advanced on every triggered attempt, so a name taken by an older
    /// archive is skipped on the next write instead of blocking rotation.
    pub fn check_and_rotate(
        &self,
        current_size: u64,
        sequence: &mut u64,
        now: DateTime<FixedOffset>,
    ) -> RotationOutcome {
        if !self.should_rotate(current_size) {
            return RotationOutcome::None;
        }

        *sequence += 1;
        let number = *sequence;
        let destination_path = self.archive_path(number, &now);
        let archived = Archiver::new(self.fs, self.config.compression.as_ref())
            .file_mode(self.config.file_mode)
            .archive(&self.config.file_path, &destination_path);

        match archived {
            Ok(archived_bytes) => {
                if self.config.max_keep_files.is_some() {
                    if let Err(err) = self.prune_archives() {
                        tracing::warn!(
                            target: "filelog_rotator",
                            error = %err,
                            "failed to remove old archives"
                        );
                    }
                }
                RotationOutcome::Rotated(ArchiveRecord {
                    source_path: self.config.file_path.clone(),
                    destination_path,
                    sequence_number: number,
                    timestamp: now,
                    archived_bytes,
                })
            }
            Err(err) => RotationOutcome::Failed(err),
        }
    }

    /// List archives of the live file, oldest first.
    /// Archives carrying a `{number}` are ordered by it, others by name.
    pub fn list_archives(&self) -> Result<Vec<(Option<u64>, String)>, SinkError> {
        let (file_name, extension) = self.config.name_parts();
        let pattern = archive_pattern(
            &self.config.archive_name_format,
            &file_name,
            &extension,
            self.config.compression.as_ref(),
        )?;
        let directory = self.config.directory();
        let live_name = self.config.file_path.file_name().and_then(|n| n.to_str());

        let names = match self.fs.list(directory) {
            Ok(names) => names,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(SinkError::DirectoryIo {
                    path: directory.to_path_buf(),
                    source,
                })
            }
        };

        let mut archives: Vec<(Option<u64>, String)> = names
            .into_iter()
            .filter(|name| Some(name.as_str()) != live_name)
            .filter_map(|name| {
                let caps = pattern.captures(&name)?;
                let number = caps.name("number").and_then(|m| m.as_str().parse::<u64>().ok());
                Some((number, name))
            })
            .collect();
        archives.sort();
        Ok(archives)
    }

    /// Highest `{number}` found among existing archives, 0 when there is none.
    pub fn scan_highest_sequence(&self) -> Result<u64, SinkError> {
        Ok(self
            .list_archives()?
            .into_iter()
            .filter_map(|(number, _)| number)
            .max()
            .unwrap_or(0))
    }

    /// Remove the oldest archives beyond `max_keep_files`.
    /// # Returns
    /// The paths that were removed.
    pub fn prune_archives(&self) -> Result<Vec<PathBuf>, SinkError> {
        let Some(max_keep_files) = self.config.max_keep_files else {
            return Ok(Vec::new());
        };
        let archives = self.list_archives()?;
        let excess = archives.len().saturating_sub(max_keep_files as usize);
        let mut removed = Vec::with_capacity(excess);
        for (_, name) in archives.into_iter().take(excess) {
            let path = self.config.directory().join(&name);
            match self.fs.remove(&path) {
                Ok(()) => removed.push(path),
                Err(err) => tracing::warn!(
                    target: "filelog_rotator",
                    archive = %path.display(),
                    error = %err,
                    "failed to remove old archive"
                ),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{archive::Compression, fs::MemoryFileSystem},
        chrono::TimeZone,
        std::path::Path,
    };

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2019, 1, 16, 17, 4, 40)
            .unwrap()
    }

    fn config(max_size_bytes: u64) -> LogSinkConfig {
        LogSinkConfig {
            max_size_bytes,
            archive_name_format: "{fileName}.{number}.{extension}".to_string(),
            compression: None,
            ..LogSinkConfig::new(PathBuf::from("/logs/app.log"))
        }
    }

    #[test]
    fn test_below_threshold_is_none() {
        let memfs = MemoryFileSystem::new();
        let config = config(10);
        let mut sequence = 0;
        let outcome = RotationPolicy::new(&config, &memfs).check_and_rotate(9, &mut sequence, at());
        assert!(matches!(outcome, RotationOutcome::None));
        assert_eq!(sequence, 0);
    }

    #[test]
    fn test_disabled_is_none() {
        let memfs = MemoryFileSystem::new();
        let config = LogSinkConfig {
            rotation_enabled: false,
            ..config(10)
        };
        let mut sequence = 0;
        let outcome = RotationPolicy::new(&config, &memfs).check_and_rotate(u64::MAX, &mut sequence, at());
        assert!(matches!(outcome, RotationOutcome::None));
    }

    #[test]
    fn test_threshold_reached_rotates() {
        let memfs = MemoryFileSystem::new();
        memfs.insert("/logs/app.log", "1234567890");
        let config = config(10);
        let mut sequence = 0;
        let outcome = RotationPolicy::new(&config, &memfs).check_and_rotate(10, &mut sequence, at());
        let record = outcome.archive().unwrap();
        assert_eq!(record.sequence_number, 1);
        assert_eq!(record.archived_bytes, 10);
        assert_eq!(record.destination_path, PathBuf::from("/logs/app.1.log"));
        assert_eq!(sequence, 1);
        assert_eq!(memfs.contents(Path::new("/logs/app.1.log")).unwrap(), b"1234567890");
        assert_eq!(memfs.contents(Path::new("/logs/app.log")).unwrap(), b"");
    }

    #[test]
    fn test_failure_advances_sequence() {
        let memfs = MemoryFileSystem::new();
        memfs.insert("/logs/app.log", "1234567890");
        memfs.fail_archive_writes(true);
        let config = config(10);
        let policy = RotationPolicy::new(&config, &memfs);
        let mut sequence = 4;
        let outcome = policy.check_and_rotate(10, &mut sequence, at());
        assert!(matches!(outcome.error(), Some(SinkError::ArchiveWriteError { .. })));
        assert_eq!(sequence, 5);

        memfs.fail_archive_writes(false);
        let outcome = policy.check_and_rotate(10, &mut sequence, at());
        assert_eq!(outcome.archive().unwrap().sequence_number, 6);
        assert!(memfs.exists(Path::new("/logs/app.6.log")));
        assert!(!memfs.exists(Path::new("/logs/app.5.log")));
    }

    #[test]
    fn test_collision_moves_to_next_number() {
        let memfs = MemoryFileSystem::new();
        memfs.insert("/logs/app.log", "1234567890");
        memfs.insert("/logs/app.1.log", "from a previous process");
        let config = config(10);
        let policy = RotationPolicy::new(&config, &memfs);
        let mut sequence = 0;

        let outcome = policy.check_and_rotate(10, &mut sequence, at());
        assert!(matches!(outcome.error(), Some(SinkError::ArchivePathCollision(_))));
        assert_eq!(memfs.contents(Path::new("/logs/app.log")).unwrap(), b"1234567890");

        let outcome = policy.check_and_rotate(10, &mut sequence, at());
        assert_eq!(outcome.archive().unwrap().sequence_number, 2);
        assert_eq!(memfs.contents(Path::new("/logs/app.1.log")).unwrap(), b"from a previous process");
        assert_eq!(memfs.contents(Path::new("/logs/app.2.log")).unwrap(), b"1234567890");
    }

    #[test]
    fn test_default_format_with_zip() {
        let memfs = MemoryFileSystem::new();
        let config = LogSinkConfig {
            compression: Some(Compression::Zip),
            archive_name_format: crate::DEFAULT_ARCHIVE_NAME_FORMAT.to_string(),
            ..config(10)
        };
        let path = RotationPolicy::new(&config, &memfs).archive_path(1, &at());
        assert_eq!(path, PathBuf::from("/logs/app-2019-01-16__17-04-40.log.zip"));
    }

    #[test]
    fn test_scan_and_prune() {
        let memfs = MemoryFileSystem::new();
        memfs.insert("/logs/app.log", "");
        for n in [1, 2, 10, 3] {
            memfs.insert(format!("/logs/app.{n}.log"), format!("archive {n}"));
        }
        memfs.insert("/logs/app.x.log", "not an archive");
        memfs.insert("/other/app.99.log", "other directory");

        let config = LogSinkConfig {
            max_keep_files: Some(2),
            ..config(10)
        };
        let policy = RotationPolicy::new(&config, &memfs);
        assert_eq!(policy.scan_highest_sequence().unwrap(), 10);

        let removed = policy.prune_archives().unwrap();
        assert_eq!(removed, vec![PathBuf::from("/logs/app.1.log"), PathBuf::from("/logs/app.2.log")]);
        assert!(memfs.exists(Path::new("/logs/app.3.log")));
        assert!(memfs.exists(Path::new("/logs/app.10.log")));
        assert!(memfs.exists(Path::new("/logs/app.x.log")));
        assert!(memfs.exists(Path::new("/logs/app.log")));
    }

    #[test]
    fn test_scan_missing_directory() {
        let memfs = MemoryFileSystem::new();
        let config = config(10);
        assert_eq!(RotationPolicy::new(&config, &memfs).scan_highest_sequence().unwrap(), 0);
    }
}
