//! Per-unit lock file.
//!
//! The lock file `~<filename>.lock` sits next to the temp file. Holding an
//! exclusive, non-blocking `flock` on it is what entitles a process to touch
//! the temp file. Contention resolves immediately instead of queuing.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

use super::DownloadError;

/// Result of trying to take a unit's lock.
#[derive(Debug)]
pub enum LockAttempt {
    /// This process now holds the lock.
    Acquired(EpisodeLock),
    /// Another process holds it.
    Contended,
}

/// A held lock. Dropping it releases the lock and removes the file.
#[derive(Debug)]
pub struct EpisodeLock {
    path: PathBuf,
    file: Option<File>,
}

impl EpisodeLock {
    /// Tries to take the lock at `path` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] when the lock file cannot be opened or
    /// the lock call fails for a reason other than contention.
    pub fn try_acquire(path: &Path) -> Result<LockAttempt, DownloadError> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| DownloadError::io(path, e))?;

        if let Err(e) = FileExt::try_lock_exclusive(&file) {
            if is_contention(&e) {
                debug!(path = %path.display(), "lock held elsewhere");
                return Ok(LockAttempt::Contended);
            }
            return Err(DownloadError::io(path, e));
        }

        // The previous holder may have removed the file between our open and
        // our lock; a lock on an unlinked file excludes nobody.
        if !still_linked(&file, path).map_err(|e| DownloadError::io(path, e))? {
            debug!(path = %path.display(), "lock file replaced while locking");
            return Ok(LockAttempt::Contended);
        }

        debug!(path = %path.display(), "lock acquired");
        Ok(LockAttempt::Acquired(Self {
            path: path.to_path_buf(),
            file: Some(file),
        }))
    }

    /// The lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the lock file, then releases the lock.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::Io`] when the lock file cannot be removed.
    pub fn release(mut self) -> Result<(), DownloadError> {
        self.release_inner().map_err(|e| DownloadError::io(&self.path, e))
    }

    fn release_inner(&mut self) -> io::Result<()> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        let removed = match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        };
        let _ = FileExt::unlock(&file);
        debug!(path = %self.path.display(), "lock released");
        removed
    }
}

impl Drop for EpisodeLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

fn is_contention(error: &io::Error) -> bool {
    error.kind() == io::ErrorKind::WouldBlock
        || error.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

#[cfg(unix)]
fn still_linked(file: &File, path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file.metadata()?;
    match std::fs::metadata(path) {
        Ok(current) => Ok(held.dev() == current.dev() && held.ino() == current.ino()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn still_linked(_file: &File, path: &Path) -> io::Result<bool> {
    Ok(path.exists())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn acquired(attempt: LockAttempt) -> EpisodeLock {
        match attempt {
            LockAttempt::Acquired(lock) => lock,
            LockAttempt::Contended => panic!("expected to acquire the lock"),
        }
    }

    #[test]
    fn test_second_acquire_is_contended() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("~ep.mp4.lock");

        let lock = acquired(EpisodeLock::try_acquire(&path).unwrap());
        assert!(path.exists());
        assert!(matches!(
            EpisodeLock::try_acquire(&path).unwrap(),
            LockAttempt::Contended
        ));

        lock.release().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn test_reacquire_after_release() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("~ep.mp4.lock");

        acquired(EpisodeLock::try_acquire(&path).unwrap())
            .release()
            .unwrap();
        let again = acquired(EpisodeLock::try_acquire(&path).unwrap());
        assert_eq!(again.path(), path.as_path());
    }

    #[test]
    fn test_stale_lock_file_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("~ep.mp4.lock");
        std::fs::write(&path, b"").unwrap();

        let lock = acquired(EpisodeLock::try_acquire(&path).unwrap());
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("~ep.mp4.lock");
        assert!(matches!(
            EpisodeLock::try_acquire(&path),
            Err(DownloadError::Io { .. })
        ));
    }
}
