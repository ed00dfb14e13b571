//! Filesystem primitives used by the sink.
//!
//! The rotation engine only touches storage through [`FileSystem`], so it can
//! run against the real disk ([`OsFileSystem`]) or against memory
//! ([`MemoryFileSystem`]) in tests and simulations.

use std::{
    collections::BTreeMap,
    fmt::Debug,
    fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, PoisonError,
    },
};

#[cfg(unix)]
use std::{fs::Permissions, os::unix::fs::PermissionsExt};

/// Storage primitives the sink depends on.
///
/// Implementations must be usable from several threads; the sink serializes
/// all calls that concern one live file.
pub trait FileSystem: Send + Sync + Debug {
    /// Append `bytes` to `path`, creating the file and its parent directories
    /// when they are missing.
    fn append(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Current length of `path` in bytes.
    fn len(&self, path: &Path) -> io::Result<u64>;

    /// Read the whole file.
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Create `path`, which must not exist yet, write `bytes` and make them
    /// durable before returning. Durable covers the directory entry too: once
    /// this returns, the file survives a crash even if the caller truncates
    /// the live file right after. Fails with [`io::ErrorKind::AlreadyExists`]
    /// when the path is taken. A partially written file is removed on error.
    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()>;

    /// Truncate `path` to zero length.
    fn truncate(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Names of the regular files directly inside `dir`.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Set Unix permission bits. A no-op where the platform has none.
    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Take an exclusive lock shared with other processes. The lock is held
    /// until the returned guard is dropped.
    fn lock(&self, _path: &Path) -> io::Result<FileLock> {
        Ok(FileLock::default())
    }
}

/// Guard for a lock taken with [`FileSystem::lock`].
#[derive(Debug, Default)]
pub struct FileLock {
    file: Option<fs::File>,
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            // Closing the descriptor releases the lock as well.
            let _ = file.unlock();
        }
    }
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl OsFileSystem {
    fn open_append(path: &Path) -> io::Result<fs::File> {
        let mut open_options = fs::OpenOptions::new();
        open_options.append(true).create(true);
        match open_options.open(path) {
            Ok(file) => Ok(file),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // Create the directory if it doesn't exist
                match path.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => {
                        fs::create_dir_all(parent)?;
                        open_options.open(path)
                    }
                    _ => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Flush the directory entry of `path` to disk, so a newly created file
    /// survives a crash together with its content.
    #[cfg(unix)]
    fn sync_parent_dir(path: &Path) -> io::Result<()> {
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::File::open(parent)?.sync_all()
    }

    // Directory handles cannot be synced through `std` elsewhere.
    #[cfg(not(unix))]
    fn sync_parent_dir(_path: &Path) -> io::Result<()> {
        Ok(())
    }
}

impl FileSystem for OsFileSystem {
    fn append(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = Self::open_append(path)?;
        file.write_all(bytes)?;
        file.flush()
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        fs::metadata(path).map(|m| m.len())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let mut file = fs::OpenOptions::new().write(true).create_new(true).open(path)?;
        let written = file.write_all(bytes).and_then(|_| file.sync_all());
        drop(file);
        if let Err(err) = written.and_then(|_| Self::sync_parent_dir(path)) {
            let _ = fs::remove_file(path);
            return Err(err);
        }
        Ok(())
    }

    fn truncate(&self, path: &Path) -> io::Result<()> {
        let file = fs::OpenOptions::new().write(true).open(path)?;
        file.set_len(0)?;
        file.sync_all()
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)?.flatten() {
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn set_mode(&self, path: &Path, mode: u32) -> io::Result<()> {
        #[cfg(unix)]
        {
            fs::set_permissions(path, Permissions::from_mode(mode))
        }
        #[cfg(not(unix))]
        {
            let _ = (path, mode);
            tracing::warn!(
                target: "filelog_rotator",
                "Setting file permissions is not supported on non-Unix platforms"
            );
            Ok(())
        }
    }

    fn lock(&self, path: &Path) -> io::Result<FileLock> {
        let file = match fs::OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?
            }
            Err(err) => return Err(err),
        };
        file.lock()?;
        Ok(FileLock { file: Some(file) })
    }
}

/// In-memory [`FileSystem`].
///
/// Directories are implicit. Archive writes ([`FileSystem::write_new`]) can be
/// made to fail to simulate a full or read-only disk.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
    fail_archive_writes: AtomicBool,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `write_new` fail (or succeed again).
    pub fn fail_archive_writes(&self, fail: bool) {
        self.fail_archive_writes.store(fail, Ordering::SeqCst);
    }

    /// Put a file in place, replacing any previous content.
    pub fn insert(&self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files().insert(path.into(), bytes.into());
    }

    /// Content of a file, if it exists.
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.files().get(path).cloned()
    }

    /// Every stored path, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files().keys().cloned().collect()
    }

    fn files(&self) -> std::sync::MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, format!("'{}' does not exist", path.display()))
    }
}

impl FileSystem for MemoryFileSystem {
    fn append(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        self.files().entry(path.to_path_buf()).or_default().extend_from_slice(bytes);
        Ok(())
    }

    fn len(&self, path: &Path) -> io::Result<u64> {
        self.files()
            .get(path)
            .map(|bytes| bytes.len() as u64)
            .ok_or_else(|| Self::not_found(path))
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.contents(path).ok_or_else(|| Self::not_found(path))
    }

    fn write_new(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        if self.fail_archive_writes.load(Ordering::SeqCst) {
            return Err(io::Error::other("simulated write failure: no space left on device"));
        }
        let mut files = self.files();
        if files.contains_key(path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("'{}' already exists", path.display()),
            ));
        }
        files.insert(path.to_path_buf(), bytes.to_vec());
        Ok(())
    }

    fn truncate(&self, path: &Path) -> io::Result<()> {
        self.files()
            .get_mut(path)
            .map(Vec::clear)
            .ok_or_else(|| Self::not_found(path))
    }

    fn exists(&self, path: &Path) -> bool {
        self.files().contains_key(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.files().remove(path).map(|_| ()).ok_or_else(|| Self::not_found(path))
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        Ok(self
            .files()
            .keys()
            .filter(|path| path.parent() == Some(dir))
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()).map(str::to_string))
            .collect())
    }

    fn set_mode(&self, _path: &Path, _mode: u32) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, tempfile::TempDir};

    #[test]
    fn test_os_append_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/app.log");
        OsFileSystem.append(&path, b"one\n").unwrap();
        OsFileSystem.append(&path, b"two\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        assert_eq!(OsFileSystem.len(&path).unwrap(), 8);
    }

    #[test]
    fn test_os_write_new_refuses_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.log");
        OsFileSystem.write_new(&path, b"first").unwrap();
        let err = OsFileSystem.write_new(&path, b"second").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(fs::read(&path).unwrap(), b"first");
    }

    #[cfg(unix)]
    #[test]
    fn test_os_sync_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("archive.log");
        OsFileSystem.write_new(&path, b"synced").unwrap();
        OsFileSystem::sync_parent_dir(&path).unwrap();
        OsFileSystem::sync_parent_dir(Path::new("relative.log")).unwrap();

        let missing = dir.path().join("gone/archive.log");
        let err = OsFileSystem::sync_parent_dir(&missing).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_os_truncate_and_list() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, b"content").unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();
        OsFileSystem.truncate(&path).unwrap();
        assert_eq!(OsFileSystem.len(&path).unwrap(), 0);
        assert_eq!(OsFileSystem.list(dir.path()).unwrap(), vec!["app.log".to_string()]);
    }

    #[test]
    fn test_os_lock_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log.lock");
        let guard = OsFileSystem.lock(&path).unwrap();
        drop(guard);
        let _again = OsFileSystem.lock(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_memory_file_system() {
        let memfs = MemoryFileSystem::new();
        let path = Path::new("/logs/app.log");
        memfs.append(path, b"abc").unwrap();
        memfs.append(path, b"def").unwrap();
        assert_eq!(memfs.len(path).unwrap(), 6);
        assert_eq!(memfs.list(Path::new("/logs")).unwrap(), vec!["app.log".to_string()]);

        memfs.fail_archive_writes(true);
        assert!(memfs.write_new(Path::new("/logs/a.1"), b"x").is_err());
        memfs.fail_archive_writes(false);
        memfs.write_new(Path::new("/logs/a.1"), b"x").unwrap();
        assert_eq!(
            memfs.write_new(Path::new("/logs/a.1"), b"y").unwrap_err().kind(),
            io::ErrorKind::AlreadyExists
        );

        memfs.truncate(path).unwrap();
        assert_eq!(memfs.contents(path).unwrap(), b"");
        assert!(memfs.len(Path::new("/logs/missing")).is_err());
    }
}
