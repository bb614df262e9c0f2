//! Run the full upload → alignment → tree → render pipeline for one request.

#[cfg(test)]
mod tests;

use crate::align::{Aligner, Alignment};
use crate::render::{self, RenderStyle};
use crate::tree::{self, Method};
use crate::upload::{Upload, Workspace};
use color_eyre::eyre::{Report, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use treebuilder_phylo::{FromNewick, Phylogeny};

// ----------------------------------------------------------------------------
// Errors
// ----------------------------------------------------------------------------

/// Failures that abort a pipeline run and that callers may want to tell apart.
///
/// These are carried inside the [`Report`] and can be recovered with [`PipelineError::find`].
#[derive(Clone, Debug, PartialEq)]
pub enum PipelineError {
    /// No bytes were uploaded.
    EmptyUpload,
    /// The external aligner could not be started because it was not found.
    ToolNotFound { program: String },
    /// The external aligner exited unsuccessfully.
    ToolFailed { program: String, code: Option<i32>, stderr: String },
    /// The external aligner exited successfully but did not write its output.
    MissingOutput { path: PathBuf },
    /// The alignment could not be read as equal-length FASTA records.
    InvalidAlignment(String),
}

impl Display for PipelineError {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PipelineError::EmptyUpload => write!(f, "No sequences were uploaded."),
            PipelineError::ToolNotFound { program } => {
                write!(f, "Alignment tool not found: {program}")
            }
            PipelineError::ToolFailed { program, code, stderr } => {
                let code = code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string());
                write!(f, "Alignment tool {program} failed (exit code {code}): {}", stderr.trim())
            }
            PipelineError::MissingOutput { path } => {
                write!(f, "Alignment tool did not write its output: {path:?}")
            }
            PipelineError::InvalidAlignment(reason) => write!(f, "Invalid alignment: {reason}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl PipelineError {
    /// Returns the first [`PipelineError`] in the chain of a [`Report`].
    pub fn find(report: &Report) -> Option<&PipelineError> {
        report.chain().find_map(|e| e.downcast_ref::<PipelineError>())
    }

    /// Returns `true` if the failure was caused by the uploaded data rather than the server.
    pub fn is_input_error(&self) -> bool {
        matches!(self, PipelineError::EmptyUpload | PipelineError::InvalidAlignment(_))
    }
}

// ----------------------------------------------------------------------------
// Request and Output
// ----------------------------------------------------------------------------

/// Everything one pipeline run needs from the user.
#[derive(Clone, Debug, Default)]
pub struct Request {
    pub upload: Upload,
    pub method: Method,
}

/// Everything one pipeline run produces.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Output {
    /// Tree construction method that was used.
    pub method: Method,
    /// Aligned sequences as returned by the aligner.
    pub alignment: Alignment,
    /// Aligned sequences as FASTA text.
    pub alignment_fasta: String,
    /// Tree in Newick format, internal node labels removed.
    pub newick: String,
    /// Guide tree written by the aligner, if any.
    pub guide_tree: Option<String>,
    /// Leaf labels of the rendered tree, top to bottom.
    pub leaves: Vec<String>,
    /// Rendered tree as a standalone SVG.
    pub svg: String,
    /// Rendered tree embedded in a fixed-height scrollable HTML fragment.
    pub embed: String,
}

/// Returns the normalized guide tree, or its raw text if it is not valid Newick.
///
/// The guide tree is not needed to build the tree, so failures are logged and never abort a run.
fn read_guide_tree(path: &Path) -> Option<String> {
    let newick = match std::fs::read_to_string(path) {
        Ok(newick) => newick,
        Err(e) => {
            warn!("Failed to read guide tree {path:?}: {e}");
            return None;
        }
    };
    match tree::normalize_newick(&newick) {
        Ok(normalized) => Some(normalized),
        Err(e) => {
            warn!("Keeping guide tree as written, failed to normalize it: {e}");
            Some(newick.trim().to_string())
        }
    }
}

/// Run the pipeline for a single request.
///
/// The request gets its own temporary directory, which is removed when this function returns,
/// whether it succeeds or not. Any failure aborts the run with no partial output.
pub fn run(request: &Request, aligner: &dyn Aligner, style: &RenderStyle) -> Result<Output, Report> {
    info!(
        "Building {} tree from upload: {} ({} bytes)",
        request.method,
        request.upload.filename.as_deref().unwrap_or("<unnamed>"),
        request.upload.bytes.len()
    );

    // ------------------------------------------------------------------------
    // Upload Intake

    let workspace = Workspace::new()?;
    let input = workspace.stage(&request.upload)?;
    debug!("Staged upload: {input:?}");

    // ------------------------------------------------------------------------
    // Alignment

    let files = aligner.align(&input, workspace.path())?;
    let alignment = Alignment::read(&files.alignment)?;
    info!("Aligned {} sequences of length {}", alignment.len(), alignment.width());

    let guide_tree = files.guide_tree.as_deref().and_then(read_guide_tree);

    // ------------------------------------------------------------------------
    // Distance, Tree Construction, Normalization

    let phylogeny = tree::build(&alignment, request.method)?;
    let newick = tree::normalize(phylogeny)?;
    debug!("Normalized tree: {newick}");

    // ------------------------------------------------------------------------
    // Render

    let phylogeny = Phylogeny::from_newick(&newick)?;
    let leaves = phylogeny.get_leaf_labels()?.into_iter().map(String::from).collect();
    let svg = render::to_svg(&phylogeny, style)?;
    let embed = render::embed(&svg, style);

    Ok(Output {
        method: request.method,
        alignment_fasta: alignment.to_fasta()?,
        alignment,
        newick,
        guide_tree,
        leaves,
        svg,
        embed,
    })
}
