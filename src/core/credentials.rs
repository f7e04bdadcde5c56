//! Purpose: Persist the bearer credential across process restarts.
//! Exports: `CredentialFile`.
//! Role: Single-token file store shared by concurrent CLI invocations.
//! Invariants: A missing file means "logged out", never an error.
//! Invariants: Writes hold an exclusive advisory lock; the file is owner-only on Unix.

use crate::core::error::{Error, ErrorKind};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored token. Whitespace is trimmed; an empty or missing
    /// file reads as no credential.
    pub fn load(&self) -> Result<Option<String>, Error> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token.to_string()))
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(Error::new(ErrorKind::Io)
                .with_message("failed to read credential file")
                .with_source(err)),
        }
    }

    pub fn store(&self, token: &str) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to create state directory")
                    .with_source(err)
            })?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to open credential file")
                    .with_source(err)
            })?;
        file.lock_exclusive().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to lock credential file")
                .with_source(err)
        })?;
        let result = write_token(&file, token);
        let _ = fs2::FileExt::unlock(&file);
        result?;

        restrict_permissions(&self.path);
        Ok(())
    }

    pub fn clear(&self) -> Result<(), Error> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(Error::new(ErrorKind::Io)
                .with_message("failed to remove credential file")
                .with_source(err)),
        }
    }
}

fn write_token(mut file: &File, token: &str) -> Result<(), Error> {
    let io_err = |err: std::io::Error| {
        Error::new(ErrorKind::Io)
            .with_message("failed to write credential file")
            .with_source(err)
    };
    file.set_len(0).map_err(io_err)?;
    file.write_all(token.as_bytes()).map_err(io_err)?;
    file.write_all(b"\n").map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::CredentialFile;

    #[test]
    fn missing_file_reads_as_logged_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CredentialFile::new(dir.path().join("credential"));
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CredentialFile::new(dir.path().join("credential"));
        store.store("tok-123").expect("store");
        assert_eq!(store.load().expect("load"), Some("tok-123".to_string()));

        store.store("tok-456").expect("store");
        assert_eq!(store.load().expect("load"), Some("tok-456".to_string()));
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CredentialFile::new(dir.path().join("credential"));
        store.store("tok").expect("store");
        store.clear().expect("clear");
        store.clear().expect("clear again");
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn blank_file_reads_as_logged_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("credential");
        std::fs::write(&path, "  \n").expect("write");
        let store = CredentialFile::new(path);
        assert_eq!(store.load().expect("load"), None);
    }
}
