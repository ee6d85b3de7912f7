// Working Directory Validation
//
// Checks a directory before commands are launched inside it. The checks run in
// a fixed order (absolute, exists, directory, readable) and stop at the first
// failure.

use std::fs;
use std::path::{Path, PathBuf};

/// Error types for working directory validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkingDirError {
    #[error("Path must be absolute: {}", .0.display())]
    NotAbsolute(PathBuf),

    #[error("Path does not exist: {}", .0.display())]
    DoesNotExist(PathBuf),

    #[error("Path is not readable: {}", .0.display())]
    NotReadable(PathBuf),

    #[error("Path must be a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("Current directory is unavailable: {0}")]
    CurrentDirUnavailable(String),
}

/// A directory that has passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingDir {
    path: PathBuf,
}

impl WorkingDir {
    /// Validate `path` as a working directory
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, WorkingDirError> {
        let path = path.into();

        if !path.is_absolute() {
            return Err(WorkingDirError::NotAbsolute(path));
        }

        if !path.exists() {
            return Err(WorkingDirError::DoesNotExist(path));
        }

        if !path.is_dir() {
            return Err(WorkingDirError::NotADirectory(path));
        }

        // A directory we cannot list is treated as unreadable
        if fs::read_dir(&path).is_err() {
            return Err(WorkingDirError::NotReadable(path));
        }

        Ok(Self { path })
    }

    /// The process's current working directory
    pub fn current() -> Result<Self, WorkingDirError> {
        let cwd = std::env::current_dir()
            .map_err(|e| WorkingDirError::CurrentDirUnavailable(e.to_string()))?;
        Self::new(cwd)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsRef<Path> for WorkingDir {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, NamedTempFile};

    #[test]
    fn test_valid_directory() {
        let dir = tempdir().unwrap();
        let wd = WorkingDir::new(dir.path()).unwrap();
        assert_eq!(wd.path(), dir.path());
    }

    #[test]
    fn test_current_directory() {
        let wd = WorkingDir::current().unwrap();
        assert!(wd.path().is_absolute());
    }

    #[test]
    fn test_relative_path_rejected() {
        let err = WorkingDir::new("relative/dir").unwrap_err();
        assert_eq!(err, WorkingDirError::NotAbsolute(PathBuf::from("relative/dir")));
        assert_eq!(err.to_string(), "Path must be absolute: relative/dir");
    }

    #[test]
    fn test_missing_path_rejected() {
        let err = WorkingDir::new("/invalid/filesystem/path").unwrap_err();
        assert!(matches!(err, WorkingDirError::DoesNotExist(_)));
        assert_eq!(
            err.to_string(),
            "Path does not exist: /invalid/filesystem/path"
        );
    }

    #[test]
    fn test_file_rejected() {
        let file = NamedTempFile::new().unwrap();
        let err = WorkingDir::new(file.path()).unwrap_err();
        assert!(matches!(err, WorkingDirError::NotADirectory(_)));
    }
}
