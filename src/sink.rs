use {
    crate::{
        archive::Compression,
        config::{LineEnding, LogSinkConfig, SequenceSeed, SinkOptions, TimeZone},
        fs::{FileLock, FileSystem, OsFileSystem},
        policy::{RotationOutcome, RotationPolicy},
        size::{parse_size, RotationSize},
        template::{archive_pattern, has_number_placeholder},
        SinkError,
    },
    std::{
        cell::Cell,
        fmt,
        io,
        path::Path,
        sync::{Arc, Mutex, PoisonError},
    },
};

/// Callback receiving rotation failures.
pub type RotationErrorHook = Arc<dyn Fn(&SinkError) + Send + Sync>;

fn default_rotation_error_hook() -> RotationErrorHook {
    Arc::new(|err: &SinkError| {
        tracing::warn!(target: "filelog_rotator", error = %err, "log rotation failed, will retry on next write")
    })
}

thread_local! {
    /// Set while this thread runs a rotation error hook.
    static IN_ERROR_HOOK: Cell<bool> = const { Cell::new(false) };
}

struct HookGuard;

impl HookGuard {
    /// `None` when the current thread is already inside a hook.
    fn enter() -> Option<HookGuard> {
        (!IN_ERROR_HOOK.replace(true)).then(|| HookGuard)
    }
}

impl Drop for HookGuard {
    fn drop(&mut self) {
        IN_ERROR_HOOK.set(false);
    }
}

/// State shared by all writers of one sink.
struct SinkState {
    /// Sequence number of the last rotation attempt.
    sequence: u64,
}

/// A log file that rotates itself once it grows past a size threshold.
///
/// Each [`write`](FileLogSink::write) appends one line to the live file, then
/// checks its size. When the size has reached the threshold, the content is
/// moved into an archive named after the configured format and the live file
/// is emptied. Append, size check and rotation happen under one lock, so
/// concurrent writers never interleave with a rotation.
///
/// A failed rotation never fails the write: the message is already on disk.
/// The failure goes to the rotation error hook and the rotation is attempted
/// again on the next write.
pub struct FileLogSink {
    config: Arc<LogSinkConfig>,
    fs: Arc<dyn FileSystem>,
    state: Mutex<SinkState>,
    on_rotation_error: RotationErrorHook,
}

impl fmt::Debug for FileLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLogSink")
            .field("config", &self.config)
            .field("fs", &self.fs)
            .field("sequence", &self.sequence_number())
            .finish_non_exhaustive()
    }
}

impl FileLogSink {
    /// Start configuring a sink for `file_path`.
    pub fn builder<P: AsRef<Path>>(file_path: P) -> FileLogSinkBuilder {
        FileLogSinkBuilder::new(file_path)
    }

    pub fn config(&self) -> &LogSinkConfig {
        &self.config
    }

    /// Sequence number of the last rotation attempt (0 before the first).
    pub fn sequence_number(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).sequence
    }

    /// Append `message` and the configured line terminator to the live file,
    /// then rotate it if it reached the threshold.
    ///
    /// # Errors
    /// Only when the append itself fails. Rotation problems are returned as
    /// [`RotationOutcome::Failed`] and passed to the rotation error hook.
    pub fn write(&self, message: &str) -> Result<RotationOutcome, SinkError> {
        let line_ending = self.config.line_ending.as_str();
        let mut line = String::with_capacity(message.len() + line_ending.len());
        line.push_str(message);
        line.push_str(line_ending);
        self.append_and_check(line.as_bytes())
    }

    /// Dispatcher entry point. The channel is accepted for parity with the
    /// logging front-end and not interpreted.
    pub fn listen(&self, message: &str, _channel: &str) -> Result<RotationOutcome, SinkError> {
        self.write(message)
    }

    /// Archive the live file now, whatever its size, if rotation is enabled
    /// and the file is not empty.
    pub fn force_rotate(&self) -> RotationOutcome {
        let outcome = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match self.cross_process_lock() {
                Err(err) => RotationOutcome::Failed(err),
                Ok(_lock) => match self.fs.len(&self.config.file_path) {
                    Ok(0) => RotationOutcome::None,
                    Ok(_) => {
                        let forced = LogSinkConfig {
                            max_size_bytes: 0,
                            ..LogSinkConfig::clone(&self.config)
                        };
                        RotationPolicy::new(&forced, self.fs.as_ref()).check_and_rotate(
                            u64::MAX,
                            &mut state.sequence,
                            self.config.now(),
                        )
                    }
                    Err(err) if err.kind() == io::ErrorKind::NotFound => RotationOutcome::None,
                    Err(source) => RotationOutcome::Failed(SinkError::LiveFileIo {
                        path: self.config.file_path.clone(),
                        source,
                    }),
                },
            }
        };
        self.report(outcome)
    }

    fn cross_process_lock(&self) -> Result<Option<FileLock>, SinkError> {
        if !self.config.cross_process_lock {
            return Ok(None);
        }
        let lock_path = self.config.lock_path();
        self.fs
            .lock(&lock_path)
            .map(Some)
            .map_err(|source| SinkError::LockFailed { path: lock_path, source })
    }

    fn append_and_check(&self, bytes: &[u8]) -> Result<RotationOutcome, SinkError> {
        let outcome = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let _lock = self.cross_process_lock()?;
            let path = &self.config.file_path;

            let created = self.config.file_mode.is_some() && !self.fs.exists(path);
            self.fs.append(path, bytes).map_err(|source| SinkError::AppendFailed {
                path: path.to_path_buf(),
                source,
            })?;
            if let (true, Some(mode)) = (created, self.config.file_mode) {
                if let Err(err) = self.fs.set_mode(path, mode) {
                    tracing::warn!(
                        target: "filelog_rotator",
                        file = %path.display(),
                        error = %err,
                        "failed to set log file permissions"
                    );
                }
            }

            // The message is persisted from here on; nothing below fails the write.
            match self.fs.len(path) {
                Ok(size) => RotationPolicy::new(&self.config, self.fs.as_ref()).check_and_rotate(
                    size,
                    &mut state.sequence,
                    self.config.now(),
                ),
                Err(source) if self.config.rotation_enabled => RotationOutcome::Failed(SinkError::LiveFileIo {
                    path: path.to_path_buf(),
                    source,
                }),
                Err(_) => RotationOutcome::None,
            }
        };
        Ok(self.report(outcome))
    }

    /// Runs outside the lock so a hook may write to the sink again. A failure
    /// raised by such a write, or by a `tracing` subscriber writing the hook's
    /// event back into the sink, is returned but not reported a second time.
    fn report(&self, outcome: RotationOutcome) -> RotationOutcome {
        match &outcome {
            RotationOutcome::Rotated(record) => tracing::debug!(
                target: "filelog_rotator",
                archive = %record.destination_path.display(),
                sequence = record.sequence_number,
                bytes = record.archived_bytes,
                "rotated log file"
            ),
            RotationOutcome::Failed(err) => {
                if let Some(_guard) = HookGuard::enter() {
                    (self.on_rotation_error)(err)
                }
            }
            RotationOutcome::None => {}
        }
        outcome
    }
}

impl io::Write for &FileLogSink {
    /// Append the raw buffer (no line terminator is added) and rotate if due.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.append_and_check(buf).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Every append is written through before `write` returns.
        Ok(())
    }
}

impl io::Write for FileLogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut &*self, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Provides a fluent interface for configuring [`FileLogSink`] instances.
///
/// # Default Configuration
///
/// * Rotation enabled, threshold `2M`
/// * Archive names `{fileName}-{dateTime}.{extension}`
/// * Archives zipped (`.zip` appended to the name)
/// * Local system time zone for `{dateTime}`
/// * Keep all archives, sequence numbers start at 1
/// * `\n` line terminator, no cross-process lock
///
/// # Examples
///
/// ```rust
/// use filelog_rotator::{Compression, FileLogSinkBuilder};
///
/// let dir = tempfile::tempdir().unwrap();
/// let sink = FileLogSinkBuilder::new(dir.path().join("app.log"))
///     .max_file_size("500K")
///     .archive_name_format("{fileName}.{number}.{extension}")
///     .compression(Compression::Gzip)
///     .max_keep_files(5)
///     .build()
///     .unwrap();
/// sink.write("service started").unwrap();
/// ```
pub struct FileLogSinkBuilder {
    meta: LogSinkConfig,
    max_file_size: Option<String>,
    fs: Arc<dyn FileSystem>,
    on_rotation_error: RotationErrorHook,
}

impl FileLogSinkBuilder {
    /// Create a new sink builder.
    /// # Arguments
    /// * `file_path` - The live log file. It is created, with its parent
    ///   directories, on the first write.
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        FileLogSinkBuilder {
            meta: LogSinkConfig::new(file_path.as_ref().to_path_buf()),
            max_file_size: None,
            fs: Arc::new(OsFileSystem),
            on_rotation_error: default_rotation_error_hook(),
        }
    }

    /// Create a builder from configuration-file options. The size spec is
    /// validated by [`build`](Self::build).
    pub fn from_options(options: SinkOptions) -> Self {
        let builder = Self::new(&options.file)
            .rotation_enabled(options.is_file_rotation_enabled)
            .max_file_size(options.max_file_size)
            .archive_name_format(options.rotated_file_format);
        if options.zip_rotated_files {
            builder.compression(Compression::Zip)
        } else {
            builder.no_compression()
        }
    }

    /// Enable or disable rotation. When disabled the file grows unbounded.
    pub fn rotation_enabled(self, rotation_enabled: bool) -> Self {
        Self {
            meta: LogSinkConfig {
                rotation_enabled,
                ..self.meta
            },
            ..self
        }
    }

    /// Set the rotation threshold from a size spec such as `2M` or `500K`.
    pub fn max_file_size(self, spec: impl Into<String>) -> Self {
        Self {
            max_file_size: Some(spec.into()),
            ..self
        }
    }

    /// Set the rotation threshold.
    pub fn max_size(self, size: RotationSize) -> Self {
        Self {
            meta: LogSinkConfig {
                max_size_bytes: size.bytes(),
                ..self.meta
            },
            max_file_size: None,
            ..self
        }
    }

    /// Set the archive name format. See
    /// [`render_archive_name`](crate::render_archive_name) for placeholders.
    pub fn archive_name_format(self, format: impl Into<String>) -> Self {
        Self {
            meta: LogSinkConfig {
                archive_name_format: format.into(),
                ..self.meta
            },
            ..self
        }
    }

    /// Set the compression type for archives.
    pub fn compression(self, compression: Compression) -> Self {
        Self {
            meta: LogSinkConfig {
                compression: Some(compression),
                ..self.meta
            },
            ..self
        }
    }

    /// Keep archives as plain copies of the live file.
    pub fn no_compression(self) -> Self {
        Self {
            meta: LogSinkConfig {
                compression: None,
                ..self.meta
            },
            ..self
        }
    }

    /// Set the time zone used for `{dateTime}`.
    pub fn time_zone(self, time_zone: TimeZone) -> Self {
        Self {
            meta: LogSinkConfig {
                time_zone: time_zone.offset(),
                ..self.meta
            },
            ..self
        }
    }

    pub fn line_ending(self, line_ending: LineEnding) -> Self {
        Self {
            meta: LogSinkConfig {
                line_ending,
                ..self.meta
            },
            ..self
        }
    }

    /// Set the maximum number of archives to keep. Older ones are removed
    /// after each successful rotation.
    pub fn max_keep_files(self, max_keep_files: u64) -> Self {
        Self {
            meta: LogSinkConfig {
                max_keep_files: Some(max_keep_files),
                ..self.meta
            },
            ..self
        }
    }

    /// Choose where sequence numbers start.
    pub fn sequence_seed(self, sequence_seed: SequenceSeed) -> Self {
        Self {
            meta: LogSinkConfig {
                sequence_seed,
                ..self.meta
            },
            ..self
        }
    }

    /// Set the file permissions for the live file and archives (Unix-like
    /// systems only), in octal notation like when using chmod.
    pub fn file_mode(self, mode: u32) -> Self {
        Self {
            meta: LogSinkConfig {
                file_mode: Some(mode),
                ..self.meta
            },
            ..self
        }
    }

    /// Also take an advisory lock on `<file>.lock` around every write, for
    /// several processes sharing one live file.
    pub fn cross_process_lock(self, cross_process_lock: bool) -> Self {
        Self {
            meta: LogSinkConfig {
                cross_process_lock,
                ..self.meta
            },
            ..self
        }
    }

    /// Use another filesystem, e.g. a [`MemoryFileSystem`](crate::MemoryFileSystem).
    pub fn file_system(self, fs: Arc<dyn FileSystem>) -> Self {
        Self { fs, ..self }
    }

    /// Receive rotation failures. Replaces the default, which emits a
    /// `tracing` warning.
    pub fn on_rotation_error<F>(self, hook: F) -> Self
    where
        F: Fn(&SinkError) + Send + Sync + 'static,
    {
        Self {
            on_rotation_error: Arc::new(hook),
            ..self
        }
    }

    /// Validate the configuration and build the sink.
    ///
    /// # Errors
    /// * [`SinkError::InvalidFilePath`] - the path has no file name.
    /// * [`SinkError::InvalidSizeSpec`] - the size spec is malformed.
    /// * [`SinkError::InvalidArchivePattern`] - the format cannot be matched.
    /// * [`SinkError::DirectoryIo`] - scanning for existing archives failed.
    pub fn build(self) -> Result<FileLogSink, SinkError> {
        let mut meta = self.meta;
        if meta.file_path.file_name().is_none() {
            return Err(SinkError::InvalidFilePath(meta.file_path));
        }
        if let Some(spec) = &self.max_file_size {
            meta.max_size_bytes = parse_size(spec)?;
        }
        let (file_name, extension) = meta.name_parts();
        archive_pattern(&meta.archive_name_format, &file_name, &extension, meta.compression.as_ref())?;

        let sequence = match meta.sequence_seed {
            SequenceSeed::ScanArchives if has_number_placeholder(&meta.archive_name_format) => {
                RotationPolicy::new(&meta, self.fs.as_ref()).scan_highest_sequence()?
            }
            _ => 0,
        };

        Ok(FileLogSink {
            config: Arc::new(meta),
            fs: self.fs,
            state: Mutex::new(SinkState { sequence }),
            on_rotation_error: self.on_rotation_error,
        })
    }
}

impl fmt::Debug for FileLogSinkBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileLogSinkBuilder")
            .field("meta", &self.meta)
            .field("max_file_size", &self.max_file_size)
            .finish_non_exhaustive()
    }
}

impl TryFrom<SinkOptions> for FileLogSink {
    type Error = SinkError;

    fn try_from(options: SinkOptions) -> Result<Self, Self::Error> {
        FileLogSinkBuilder::from_options(options).build()
    }
}
