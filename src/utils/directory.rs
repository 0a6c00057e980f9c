//! Output directory preparation.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::AcquireError;

/// Make sure `path` is a directory, creating it (and its parents) if needed.
///
/// An existing non-directory at `path` is an error.
pub fn prepare_working_directory(path: &Path) -> Result<(), AcquireError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(AcquireError::DirectoryConflict(path.to_path_buf()));
        }
        return Ok(());
    }
    fs::create_dir_all(path)?;
    info!("Created directory {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a/b");
        prepare_working_directory(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_existing_directory_is_fine() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(prepare_working_directory(tmp.path()).is_ok());
    }

    #[test]
    fn test_file_in_the_way() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("book");
        fs::write(&file, b"x").unwrap();
        let err = prepare_working_directory(&file).unwrap_err();
        assert!(matches!(err, AcquireError::DirectoryConflict(_)));
    }
}
