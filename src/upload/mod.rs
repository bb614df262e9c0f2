//! Stage uploaded sequence files in a per-request temporary directory.

use crate::pipeline::PipelineError;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use itertools::Itertools;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// File extensions offered by the upload control.
///
/// Only a hint to the user interface, the content is never checked against it.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["fasta", "fa"];

/// File name the upload is staged under.
pub const INPUT_FILE: &str = "input.fasta";

/// An uploaded file, assumed to be FASTA.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Upload {
    /// File name reported by the client.
    pub filename: Option<String>,
    /// Raw file contents.
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: Option<String>, bytes: Vec<u8>) -> Self {
        Upload { filename, bytes }
    }

    /// Read an [`Upload`] from a local file.
    pub fn from_path(path: &Path) -> Result<Self, Report> {
        let bytes = std::fs::read(path).wrap_err_with(|| eyre!("Failed to read: {path:?}"))?;
        let filename = path.file_name().map(|name| name.to_string_lossy().to_string());
        Ok(Upload { filename, bytes })
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Returns `true` if the file name ends in one of the [`ACCEPTED_EXTENSIONS`], ignoring case.
///
/// ```rust
/// use treebuilder::upload::has_accepted_extension;
/// assert!(has_accepted_extension("sequences.fasta"));
/// assert!(has_accepted_extension("sequences.FA"));
/// assert!(!has_accepted_extension("sequences.txt"));
/// assert!(!has_accepted_extension("fasta"));
/// ```
pub fn has_accepted_extension(filename: &str) -> bool {
    Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Returns the value of an HTML `accept` attribute for the [`ACCEPTED_EXTENSIONS`].
///
/// ```rust
/// assert_eq!(treebuilder::upload::accept_attribute(), ".fasta,.fa");
/// ```
pub fn accept_attribute() -> String {
    ACCEPTED_EXTENSIONS.iter().map(|ext| format!(".{ext}")).join(",")
}

/// A temporary working directory owned by one pipeline run.
///
/// The directory and everything in it is deleted when the [`Workspace`] is dropped.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Result<Self, Report> {
        let dir = tempfile::Builder::new()
            .prefix("treebuilder-")
            .tempdir()
            .wrap_err("Failed to create a temporary working directory.")?;
        debug!("Created workspace: {:?}", dir.path());
        Ok(Workspace { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write the upload verbatim to [`INPUT_FILE`] and return its path.
    ///
    /// Returns [`PipelineError::EmptyUpload`] if there are no bytes to write.
    pub fn stage(&self, upload: &Upload) -> Result<PathBuf, Report> {
        if upload.is_empty() {
            return Err(PipelineError::EmptyUpload.into());
        }
        if let Some(filename) = &upload.filename {
            if !has_accepted_extension(filename) {
                warn!("Upload {filename:?} does not have a FASTA extension ({}).", accept_attribute());
            }
        }

        let path = self.path().join(INPUT_FILE);
        std::fs::write(&path, &upload.bytes).wrap_err_with(|| eyre!("Failed to write: {path:?}"))?;
        Ok(path)
    }
}
