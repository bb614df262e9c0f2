//! `treebuilder` builds **phylogenetic trees** from uploaded FASTA sequences.
//!
//! ## Pipeline
//!
//! Each request runs the same stages, in order, and any failure aborts the whole run:
//!
//! 1. [Upload intake](upload): the uploaded bytes are staged in a temporary directory owned by the request.
//! 1. [Alignment](align): an external multiple sequence aligner (Clustal Omega) aligns the sequences.
//! 1. [Tree construction](tree): identity distances between the aligned sequences are joined into a tree
//!    with either Neighbor-Joining or UPGMA.
//! 1. [Normalization](tree::normalize): the tree is written as Newick with internal node labels removed.
//! 1. [Rendering](render): the tree is drawn as an SVG phylogram and embedded in a scrollable panel.
//!
//! The stages are tied together by [`pipeline::run`], which is served over HTTP by [`server`]
//! and from the command-line by [`run`].
//!
//! ```rust
//! use treebuilder::align::Prealigned;
//! use treebuilder::pipeline::{self, Request};
//! use treebuilder::render::RenderStyle;
//! use treebuilder::tree::Method;
//! use treebuilder::upload::Upload;
//!
//! let fasta = b">A\nACGTAC\n>B\nACGTTC\n>C\nTCGATC\n".to_vec();
//! let request = Request { upload: Upload::new(None, fasta), method: Method::Upgma };
//! let output = pipeline::run(&request, &Prealigned, &RenderStyle::default())?;
//! assert_eq!(output.newick, "(C:0.20833,(A:0.08333,B:0.08333):0.12500);");
//! # Ok::<(), color_eyre::eyre::Report>(())
//! ```

pub mod align;
pub mod cli;
pub mod pipeline;
pub mod render;
pub mod run;
pub mod server;
pub mod tree;
pub mod upload;
mod utils;

#[doc(inline)]
pub use crate::cli::Cli;
#[doc(inline)]
pub use crate::pipeline::{Output, PipelineError, Request};
#[doc(inline)]
pub use utils::verbosity::Verbosity;
