use {
    crate::{fs::FileSystem, SinkError},
    std::{
        io::{self, Write as _},
        path::Path,
    },
};

/// Specifies the compression applied to archived log files.
///
/// When a rotation happens, the live file's bytes are encoded with the chosen
/// codec and the codec's extension is appended to the rendered archive name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// A zip archive with a single deflated entry named after the live file.
    /// Archives get the `.zip` extension.
    Zip,
    /// Gzip, which provides a good balance of compression ratio and speed.
    /// The live file's name is stored in the gzip header. Archives get the
    /// `.gz` extension.
    Gzip,
    /// XZ, the highest ratio but the slowest. Archives get the `.xz`
    /// extension. Requires the `xz` feature.
    #[cfg(feature = "xz")]
    XZ,
}

impl Compression {
    /// Get the extension for the compressed archive, without the dot.
    pub fn get_extension(&self) -> &'static str {
        match self {
            Compression::Zip => "zip",
            Compression::Gzip => "gz",
            #[cfg(feature = "xz")]
            Compression::XZ => "xz",
        }
    }

    /// Encode `bytes` as a single-entry archive named `entry_name`.
    pub fn encode(&self, bytes: &[u8], entry_name: &str) -> io::Result<Vec<u8>> {
        match self {
            Compression::Zip => {
                let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
                let options = zip::write::SimpleFileOptions::default()
                    .compression_method(zip::CompressionMethod::Deflated)
                    .large_file(bytes.len() as u64 >= u64::from(u32::MAX));
                writer.start_file(entry_name, options)?;
                writer.write_all(bytes)?;
                Ok(writer.finish()?.into_inner())
            }
            Compression::Gzip => {
                let mut encoder =
                    flate2::GzBuilder::new().filename(entry_name).write(Vec::new(), flate2::Compression::default());
                encoder.write_all(bytes)?;
                encoder.finish()
            }
            #[cfg(feature = "xz")]
            Compression::XZ => {
                let mut out = Vec::new();
                lzma_rs::xz_compress(&mut io::BufReader::new(bytes), &mut out)?;
                Ok(out)
            }
        }
    }
}

/// Moves the live file's content into an archive and empties the live file.
///
/// The live file is truncated only after the archive has been written and
/// synced. If anything fails before that point the live file is left as it
/// was, so a message can be archived twice after a crash but never lost.
pub struct Archiver<'a> {
    fs: &'a dyn FileSystem,
    compression: Option<&'a Compression>,
    file_mode: Option<u32>,
}

impl<'a> Archiver<'a> {
    pub fn new(fs: &'a dyn FileSystem, compression: Option<&'a Compression>) -> Self {
        Archiver {
            fs,
            compression,
            file_mode: None,
        }
    }

    /// Permissions to apply to each archive (Unix-like systems only).
    pub fn file_mode(self, file_mode: Option<u32>) -> Self {
        Self { file_mode, ..self }
    }

    /// Archive `live_path` into `archive_path`.
    /// # Arguments
    /// * `live_path` - The live log file.
    /// * `archive_path` - The destination, which must not exist.
    /// # Returns
    /// The number of live bytes that were archived.
    /// # Errors
    /// * [`SinkError::ArchivePathCollision`] - the destination already exists.
    /// * [`SinkError::ArchiveWriteError`] - the archive could not be encoded or
    ///   written. The live file is untouched.
    /// * [`SinkError::LiveFileIo`] - the live file could not be read (untouched)
    ///   or truncated (the archive is kept).
    pub fn archive(&self, live_path: &Path, archive_path: &Path) -> Result<u64, SinkError> {
        if self.fs.exists(archive_path) {
            return Err(SinkError::ArchivePathCollision(archive_path.to_path_buf()));
        }

        let bytes = self.fs.read(live_path).map_err(|source| SinkError::LiveFileIo {
            path: live_path.to_path_buf(),
            source,
        })?;

        let archived = bytes.len() as u64;
        let payload = match self.compression {
            Some(compression) => {
                let entry_name = live_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                compression
                    .encode(&bytes, &entry_name)
                    .map_err(|source| SinkError::ArchiveWriteError {
                        path: archive_path.to_path_buf(),
                        source,
                    })?
            }
            None => bytes,
        };

        self.fs.write_new(archive_path, &payload).map_err(|source| {
            if source.kind() == io::ErrorKind::AlreadyExists {
                SinkError::ArchivePathCollision(archive_path.to_path_buf())
            } else {
                SinkError::ArchiveWriteError {
                    path: archive_path.to_path_buf(),
                    source,
                }
            }
        })?;

        if let Some(mode) = self.file_mode {
            // Archive is complete; a permission failure must not block truncation.
            if let Err(err) = self.fs.set_mode(archive_path, mode) {
                tracing::warn!(
                    target: "filelog_rotator",
                    archive = %archive_path.display(),
                    error = %err,
                    "failed to set archive permissions"
                );
            }
        }

        self.fs.truncate(live_path).map_err(|source| SinkError::LiveFileIo {
            path: live_path.to_path_buf(),
            source,
        })?;

        Ok(archived)
    }
}
