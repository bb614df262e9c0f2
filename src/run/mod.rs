//! Run the pipeline on a local file and write every output to a directory.

use crate::align::AlignerArgs;
use crate::pipeline::{self, Output, Request};
use crate::render::{self, RenderStyle};
use crate::tree::Method;
use crate::upload::Upload;
use clap::Parser;
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs::create_dir_all;
use std::path::{Path, PathBuf};

pub const ALIGNMENT_FILE: &str = "alignment.fasta";
pub const TREE_FILE: &str = "tree.nwk";
pub const HTML_FILE: &str = "tree.html";
pub const GUIDE_TREE_FILE: &str = "guide_tree.dnd";
pub const SUMMARY_FILE: &str = "summary.json";

/// Run pipeline arguments.
#[derive(Clone, Debug, Deserialize, Parser, PartialEq, Serialize)]
#[clap(verbatim_doc_comment)]
pub struct Args {
    /// Input sequences in FASTA format.
    #[clap(short = 'i', long, required = true)]
    pub input: PathBuf,

    /// Tree construction method.
    #[clap(short = 'm', long, value_enum, default_value_t = Args::default().method)]
    pub method: Method,

    /// Output directory.
    ///
    /// If the directory does not exist, it will be created.
    #[clap(short = 'o', long, required = true)]
    pub output_dir: PathBuf,

    #[clap(flatten)]
    pub aligner: AlignerArgs,

    #[clap(flatten)]
    pub style: RenderStyle,
}

impl Default for Args {
    fn default() -> Self {
        Args {
            input: PathBuf::new(),
            method: Method::default(),
            output_dir: PathBuf::new(),
            aligner: AlignerArgs::default(),
            style: RenderStyle::default(),
        }
    }
}

/// Description of a finished run, written to [`SUMMARY_FILE`].
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Summary {
    pub version: String,
    pub input: PathBuf,
    pub method: Method,
    pub aligner: String,
    pub sequences: usize,
    pub alignment_length: usize,
    pub leaves: Vec<String>,
    pub newick: String,
}

impl Summary {
    fn new(args: &Args, output: &Output) -> Self {
        Summary {
            version: env!("CARGO_PKG_VERSION").to_string(),
            input: args.input.clone(),
            method: output.method,
            aligner: args.aligner.aligner.to_string(),
            sequences: output.alignment.len(),
            alignment_length: output.alignment.width(),
            leaves: output.leaves.clone(),
            newick: output.newick.clone(),
        }
    }

    /// Read a [`Summary`] from a JSON file.
    pub fn read(path: &Path) -> Result<Summary, Report> {
        let summary = std::fs::read_to_string(path)
            .wrap_err_with(|| eyre!("Failed to read file: {path:?}."))?;
        let summary = serde_json::from_str(&summary)
            .wrap_err_with(|| eyre!("Failed to parse file: {path:?}"))?;
        Ok(summary)
    }

    /// Write a [`Summary`] to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), Report> {
        let output = serde_json::to_string_pretty(self)
            .wrap_err_with(|| eyre!("Failed to parse: {self:?}"))?;
        std::fs::write(path, output).wrap_err_with(|| eyre!("Failed to write: {path:?}"))?;
        Ok(())
    }
}

/// Run the pipeline on [`Args::input`] and write the results to [`Args::output_dir`].
pub fn run(args: &Args) -> Result<Output, Report> {
    info!("Running {} tree pipeline on: {:?}", args.method, args.input);

    // Warn if the directory already exists
    if !args.output_dir.exists() {
        info!("Creating output directory: {:?}", &args.output_dir);
        create_dir_all(&args.output_dir)
            .wrap_err_with(|| eyre!("Failed to create output directory: {:?}", args.output_dir))?;
    } else {
        warn!("Proceed with caution! --output-dir {:?} already exists.", args.output_dir);
    }

    let request = Request { upload: Upload::from_path(&args.input)?, method: args.method };
    let aligner = args.aligner.build();
    let output = pipeline::run(&request, aligner.as_ref(), &args.style)?;

    // ------------------------------------------------------------------------
    // Export

    let write = |name: &str, contents: &str| -> Result<(), Report> {
        let path = args.output_dir.join(name);
        info!("Exporting: {path:?}");
        std::fs::write(&path, contents).wrap_err_with(|| eyre!("Failed to write: {path:?}"))
    };

    write(ALIGNMENT_FILE, &output.alignment_fasta)?;
    write(TREE_FILE, &format!("{}\n", output.newick))?;
    write(HTML_FILE, &render::document(&format!("{} Tree", output.method), &output.embed))?;
    if let Some(guide_tree) = &output.guide_tree {
        write(GUIDE_TREE_FILE, &format!("{guide_tree}\n"))?;
    }

    let summary_path = args.output_dir.join(SUMMARY_FILE);
    info!("Exporting: {summary_path:?}");
    Summary::new(args, &output).write(&summary_path)?;

    info!("Done.");
    Ok(output)
}
