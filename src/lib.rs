//! # filelog-rotator
//!
//! A log file sink that appends messages to a live file and, once the file
//! has grown to a configured size, archives its content under a templated name
//! (zipped by default) and starts the live file over from empty.
//!
//! Rotation runs after each write, so the threshold is a trigger rather than a
//! hard cap. The live file is truncated only after its archive has been
//! written and synced, and a failed rotation never fails the write that
//! triggered it: the message is kept, the failure is reported through a hook,
//! and the rotation is tried again on the next write.
//!
//! ## Example
//!
//! ```rust
//! use filelog_rotator::{FileLogSinkBuilder, TimeZone};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dir = tempfile::tempdir()?;
//!     let sink = FileLogSinkBuilder::new(dir.path().join("app.log"))
//!         .max_file_size("2M")
//!         .archive_name_format("{fileName}-{dateTime}.{extension}")
//!         .time_zone(TimeZone::UTC)
//!         .build()?;
//!
//!     sink.write("This is an info message")?;
//!     sink.write("This is a warning message")?;
//!     sink.write("This is an error message")?;
//!
//!     Ok(())
//! }
//! ```
//!
//! The sink also implements [`std::io::Write`], so it can back a `tracing`
//! subscriber through `tracing_appender::non_blocking`. Rotation failures are
//! reported as `tracing` events under the `filelog_rotator` target. When that
//! event is itself written into a sink whose rotation keeps failing, the
//! nested failure is not reported again, so one failed write logs one warning.
mod archive;
mod config;
mod error;
mod fs;
mod policy;
mod size;
mod sink;
mod template;

pub use {
    archive::{Archiver, Compression},
    config::{LineEnding, LogSinkConfig, SequenceSeed, SinkOptions, TimeZone, DEFAULT_MAX_FILE_SIZE},
    error::SinkError,
    fs::{FileLock, FileSystem, MemoryFileSystem, OsFileSystem},
    policy::{ArchiveRecord, RotationOutcome, RotationPolicy},
    sink::{FileLogSink, FileLogSinkBuilder, RotationErrorHook},
    size::{parse_size, RotationSize},
    template::{archive_pattern, render_archive_name, DATE_TIME_FORMAT, DEFAULT_ARCHIVE_NAME_FORMAT},
};
