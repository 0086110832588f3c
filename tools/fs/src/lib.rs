//! Filesystem tools confined to a single base directory.
//!
//! Four tools share one [`FileService`]:
//!
//! | Tool | Arguments | Output |
//! |---|---|---|
//! | `list_files` | `path` (default `""`) | JSON array of `{name, type, size}` |
//! | `read_file` | `file_path` | the file's text |
//! | `write_file` | `file_path`, `content` | confirmation |
//! | `delete_file` | `file_path` | confirmation |
//!
//! Failures surface as tool errors whose message is the [`FsError`] display string.

use std::borrow::Cow;

use confine_core::{PathConfiner, Tool, Tools, json};
use schemars::JsonSchema;
use serde::Deserialize;

mod service;

pub use service::{Action, Deleted, DirEntry, EntryKind, EntrySize, FileService, FsError};

/// Registers all four file tools, sharing one [`FileService`].
pub fn register(tools: &mut Tools, confiner: PathConfiner) {
    let service = FileService::new(confiner);
    tools.register(ListFiles::new(service.clone()));
    tools.register(ReadFile::new(service.clone()));
    tools.register(WriteFile::new(service.clone()));
    tools.register(DeleteFile::new(service));
}

/// List all files in the specified directory.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListFilesArgs {
    /// Optional subdirectory path relative to the base directory.
    #[serde(default)]
    pub path: String,
}

/// Read the contents of a file.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// Path to the file relative to the base directory.
    pub file_path: String,
}

/// Write content to a file.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct WriteFileArgs {
    /// Path to the file relative to the base directory.
    pub file_path: String,
    /// Content to write to the file. Replaces any existing content.
    pub content: String,
}

/// Delete a file or an empty directory.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteFileArgs {
    /// Path to the file relative to the base directory.
    pub file_path: String,
}

/// `list_files` tool.
#[derive(Debug, Clone)]
pub struct ListFiles {
    service: FileService,
}

impl ListFiles {
    /// Wraps a file service.
    #[must_use]
    pub const fn new(service: FileService) -> Self {
        Self { service }
    }
}

impl Tool for ListFiles {
    fn name(&self) -> Cow<'static, str> {
        "list_files".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "List all files in the specified directory.".into()
    }

    type Arguments = ListFilesArgs;

    async fn call(&self, arguments: Self::Arguments) -> confine_core::Result {
        let entries = self.service.list(&arguments.path).await?;
        Ok(json(&entries))
    }
}

/// `read_file` tool.
#[derive(Debug, Clone)]
pub struct ReadFile {
    service: FileService,
}

impl ReadFile {
    /// Wraps a file service.
    #[must_use]
    pub const fn new(service: FileService) -> Self {
        Self { service }
    }
}

impl Tool for ReadFile {
    fn name(&self) -> Cow<'static, str> {
        "read_file".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Read the contents of a file.".into()
    }

    type Arguments = ReadFileArgs;

    async fn call(&self, arguments: Self::Arguments) -> confine_core::Result {
        Ok(self.service.read(&arguments.file_path).await?)
    }
}

/// `write_file` tool.
#[derive(Debug, Clone)]
pub struct WriteFile {
    service: FileService,
}

impl WriteFile {
    /// Wraps a file service.
    #[must_use]
    pub const fn new(service: FileService) -> Self {
        Self { service }
    }
}

impl Tool for WriteFile {
    fn name(&self) -> Cow<'static, str> {
        "write_file".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Write content to a file. Missing parent directories are created.".into()
    }

    type Arguments = WriteFileArgs;

    async fn call(&self, arguments: Self::Arguments) -> confine_core::Result {
        self.service
            .write(&arguments.file_path, &arguments.content)
            .await?;
        Ok(format!("Successfully wrote to {}", arguments.file_path))
    }
}

/// `delete_file` tool.
#[derive(Debug, Clone)]
pub struct DeleteFile {
    service: FileService,
}

impl DeleteFile {
    /// Wraps a file service.
    #[must_use]
    pub const fn new(service: FileService) -> Self {
        Self { service }
    }
}

impl Tool for DeleteFile {
    fn name(&self) -> Cow<'static, str> {
        "delete_file".into()
    }

    fn description(&self) -> Cow<'static, str> {
        "Delete a file or an empty directory.".into()
    }

    type Arguments = DeleteFileArgs;

    async fn call(&self, arguments: Self::Arguments) -> confine_core::Result {
        let message = match self.service.delete(&arguments.file_path).await? {
            Deleted::File => "Successfully deleted file",
            Deleted::Directory => "Successfully deleted directory",
        };
        Ok(format!("{message}: {}", arguments.file_path))
    }
}
