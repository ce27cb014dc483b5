//! Capture and restore of the user's token file.
//!
//! A dev server writes its root token to `~/.vault-token`, clobbering any
//! token the developer had there. The previous contents are captured before
//! the server starts and written back on shutdown.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::constants::TOKEN_FILE_NAME;
#[cfg(unix)]
use crate::constants::TOKEN_FILE_MODE;
use crate::error::{Error, Result};

/// Path of the token file in the current user's home directory.
pub fn default_token_path() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(Error::HomeDirUnavailable)?;
    Ok(home.join(TOKEN_FILE_NAME))
}

/// Contents of a token file as they were before a server started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedToken {
    path: PathBuf,
    contents: Vec<u8>,
}

impl SavedToken {
    /// Read the file at `path`, if there is one.
    ///
    /// A missing or unreadable file yields `None`; nothing to restore later.
    pub fn capture(path: &Path) -> Option<Self> {
        match fs::read(path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "Saved existing token file");
                Some(Self {
                    path: path.to_path_buf(),
                    contents,
                })
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "Token file unreadable, treating as absent"
                );
                None
            },
        }
    }

    /// Path the token was read from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Saved bytes, verbatim.
    pub fn contents(&self) -> &[u8] {
        &self.contents
    }

    /// Write the saved bytes back, owner read/write only.
    pub fn restore(&self) -> io::Result<()> {
        fs::write(&self.path, &self.contents)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(TOKEN_FILE_MODE))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_token_path() {
        let path = default_token_path().expect("Failed to resolve token path");
        assert!(path.ends_with(".vault-token"));
    }

    #[test]
    fn test_capture_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(SavedToken::capture(&temp_dir.path().join(".vault-token")).is_none());
    }

    #[test]
    fn test_capture_keeps_whitespace() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".vault-token");
        fs::write(&path, b"  s.original\n\n").unwrap();

        let saved = SavedToken::capture(&path).unwrap();
        assert_eq!(saved.contents(), b"  s.original\n\n");
        assert_eq!(saved.path(), path);
    }

    #[test]
    fn test_restore_overwrites_server_token() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".vault-token");
        fs::write(&path, b"s.original").unwrap();

        let saved = SavedToken::capture(&path).unwrap();
        fs::write(&path, b"hvs.server-root-token-that-is-longer").unwrap();

        saved.restore().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"s.original");
    }

    #[cfg(unix)]
    #[test]
    fn test_restore_sets_owner_only_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".vault-token");
        fs::write(&path, b"s.original").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let saved = SavedToken::capture(&path).unwrap();
        saved.restore().unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_restore_recreates_deleted_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".vault-token");
        fs::write(&path, b"s.original").unwrap();

        let saved = SavedToken::capture(&path).unwrap();
        fs::remove_file(&path).unwrap();

        saved.restore().unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"s.original");
    }
}
