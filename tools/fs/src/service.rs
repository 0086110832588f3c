//! File operations on top of [`PathConfiner`].

use std::fmt;
use std::io;

use confine_core::{ConfinedPath, ConfinementError, PathConfiner};
use futures_lite::StreamExt;
use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::debug;

/// Errors reported by [`FileService`].
///
/// The display strings are what the remote caller sees.
#[derive(Debug, Error)]
pub enum FsError {
    /// The path escapes the base directory.
    #[error("Error: Cannot access {target} outside of the base directory.")]
    Confinement {
        /// `"files"` or `"directories"`, depending on the operation.
        target: &'static str,
        /// The underlying confinement failure.
        #[source]
        source: ConfinementError,
    },
    /// Nothing exists at the path.
    #[error("Error: File does not exist: {0}")]
    NotFound(String),
    /// The path exists but is not a regular file.
    #[error("Error: File does not exist or is not a file: {0}")]
    NotAFile(String),
    /// The base directory itself cannot be removed.
    #[error("Error: Cannot delete the base directory.")]
    BaseDirectory,
    /// Any other OS-level failure.
    #[error("Error {action}: {source}")]
    Io {
        /// What was being attempted.
        action: Action,
        /// The OS error.
        #[source]
        source: io::Error,
    },
}

/// The file operation that failed, used in [`FsError::Io`] messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Listing a directory.
    List,
    /// Reading a file.
    Read,
    /// Writing a file.
    Write,
    /// Deleting a file or directory.
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::List => "listing files",
            Self::Read => "reading file",
            Self::Write => "writing to file",
            Self::Delete => "deleting file",
        })
    }
}

impl Action {
    fn fail(self) -> impl FnOnce(io::Error) -> FsError {
        move |source| FsError::Io {
            action: self,
            source,
        }
    }
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntryKind {
    /// Anything that is not a directory.
    File,
    /// A directory.
    Directory,
}

/// Size column of a listing: a byte count for files, `"-"` for directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySize {
    /// Length in bytes.
    Bytes(u64),
    /// Directories have no meaningful size.
    Directory,
}

impl Serialize for EntrySize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bytes(len) => serializer.serialize_u64(*len),
            Self::Directory => serializer.serialize_str("-"),
        }
    }
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirEntry {
    /// File name, lossily converted to UTF-8.
    pub name: String,
    /// File or directory.
    #[serde(rename = "type")]
    pub kind: EntryKind,
    /// Byte count or directory marker.
    pub size: EntrySize,
}

/// What [`FileService::delete`] removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    /// A file or symlink.
    File,
    /// An empty directory.
    Directory,
}

/// List, read, write and delete files under a single base directory.
#[derive(Debug, Clone)]
pub struct FileService {
    confiner: PathConfiner,
}

impl FileService {
    /// Creates a file service confined by `confiner`.
    #[must_use]
    pub const fn new(confiner: PathConfiner) -> Self {
        Self { confiner }
    }

    /// Returns the confiner used for every operation.
    #[must_use]
    pub const fn confiner(&self) -> &PathConfiner {
        &self.confiner
    }

    fn confine(&self, path: &str, target: &'static str) -> Result<ConfinedPath, FsError> {
        self.confiner
            .confine(path)
            .map_err(|source| FsError::Confinement { target, source })
    }

    /// Lists the immediate entries of a directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Fails if the path escapes the base or the directory cannot be read.
    pub async fn list(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let target = self.confine(path, "directories")?;
        debug!(path = %target, "listing directory");

        let mut entries = Vec::new();
        let mut dir = async_fs::read_dir(&target)
            .await
            .map_err(Action::List.fail())?;

        while let Some(entry) = dir.next().await {
            let entry = entry.map_err(Action::List.fail())?;
            // Follow symlinks; fall back to the link itself when the target is gone.
            let metadata = match async_fs::metadata(entry.path()).await {
                Ok(metadata) => metadata,
                Err(_) => entry.metadata().await.map_err(Action::List.fail())?,
            };

            let (kind, size) = if metadata.is_dir() {
                (EntryKind::Directory, EntrySize::Directory)
            } else {
                (EntryKind::File, EntrySize::Bytes(metadata.len()))
            };

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind,
                size,
            });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Reads a regular file as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Fails if the path escapes the base, does not exist, is not a regular file, or
    /// cannot be read as UTF-8.
    pub async fn read(&self, path: &str) -> Result<String, FsError> {
        let target = self.confine(path, "files")?;
        debug!(path = %target, "reading file");

        match async_fs::metadata(&target).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => return Err(FsError::NotAFile(path.to_string())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(FsError::NotFound(path.to_string()));
            }
            Err(err) => return Err(Action::Read.fail()(err)),
        }

        async_fs::read_to_string(&target)
            .await
            .map_err(Action::Read.fail())
    }

    /// Writes `content` to a file, replacing it if it exists.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Fails if the path escapes the base or the file cannot be written.
    pub async fn write(&self, path: &str, content: &str) -> Result<ConfinedPath, FsError> {
        let target = self.confine(path, "files")?;
        debug!(path = %target, bytes = content.len(), "writing file");

        if let Some(parent) = target.as_path().parent() {
            async_fs::create_dir_all(parent)
                .await
                .map_err(Action::Write.fail())?;
        }
        async_fs::write(&target, content)
            .await
            .map_err(Action::Write.fail())?;

        Ok(target)
    }

    /// Deletes a file, a symlink, or an empty directory.
    ///
    /// Directories are never removed recursively.
    ///
    /// # Errors
    ///
    /// Fails if the path escapes the base, names the base itself, does not exist, is a
    /// non-empty directory, or cannot be removed.
    pub async fn delete(&self, path: &str) -> Result<Deleted, FsError> {
        let target = self.confine(path, "files")?;
        if target.as_path() == self.confiner.base().as_path() {
            return Err(FsError::BaseDirectory);
        }
        debug!(path = %target, "deleting");

        let metadata = match async_fs::symlink_metadata(&target).await {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(FsError::NotFound(path.to_string()));
            }
            Err(err) => return Err(Action::Delete.fail()(err)),
        };

        if metadata.is_dir() {
            async_fs::remove_dir(&target)
                .await
                .map_err(Action::Delete.fail())?;
            Ok(Deleted::Directory)
        } else {
            async_fs::remove_file(&target)
                .await
                .map_err(Action::Delete.fail())?;
            Ok(Deleted::File)
        }
    }
}
