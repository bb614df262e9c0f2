//! Run an external multiple sequence aligner and read the [`Alignment`] it writes.


use crate::pipeline::PipelineError;
use clap::{Args as ClapArgs, ValueEnum};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use color_eyre::Help;
use itertools::Itertools;
use log::{debug, info, warn};
use noodles::fasta;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::Command;
use strum::Display;

/// File name of the alignment written into the working directory.
pub const ALIGNMENT_FILE: &str = "aligned.fasta";
/// File name of the guide tree written into the working directory.
pub const GUIDE_TREE_FILE: &str = "guide_tree.dnd";

// ----------------------------------------------------------------------------
// Aligner
// ----------------------------------------------------------------------------

/// Paths written by an [`Aligner`].
#[derive(Clone, Debug, PartialEq)]
pub struct AlignmentFiles {
    /// Aligned sequences in FASTA format.
    pub alignment: PathBuf,
    /// Guide tree in Newick format, if the aligner produced one.
    pub guide_tree: Option<PathBuf>,
}

/// A multiple sequence aligner, run against a staged FASTA file.
pub trait Aligner: Send + Sync {
    /// Align the sequences of `input`, writing output files into `output_dir`.
    fn align(&self, input: &Path, output_dir: &Path) -> Result<AlignmentFiles, Report>;
}

/// The [Clustal Omega](http://www.clustal.org/omega/) command-line aligner.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct ClustalOmega {
    /// Program name or path of the `clustalo` binary.
    pub program: PathBuf,
}

impl Default for ClustalOmega {
    fn default() -> Self {
        ClustalOmega { program: PathBuf::from("clustalo") }
    }
}

impl ClustalOmega {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        ClustalOmega { program: program.into() }
    }

    /// Returns the command that aligns `input` into `output_dir`.
    ///
    /// Parameters are auto-detected, existing output is overwritten and a guide tree is written.
    ///
    /// ```rust
    /// use treebuilder::align::ClustalOmega;
    /// use std::path::Path;
    ///
    /// let command = ClustalOmega::default().command(Path::new("in.fasta"), Path::new("work"));
    /// let args: Vec<_> = command.get_args().map(|a| a.to_string_lossy().to_string()).collect();
    /// assert!(args.contains(&"--auto".to_string()));
    /// assert!(args.contains(&"--force".to_string()));
    /// assert!(args.contains(&"--guidetree-out".to_string()));
    /// ```
    pub fn command(&self, input: &Path, output_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("--infile")
            .arg(input)
            .arg("--outfile")
            .arg(output_dir.join(ALIGNMENT_FILE))
            .arg("--outfmt=fasta")
            .arg("--auto")
            .arg("--force")
            .arg("--guidetree-out")
            .arg(output_dir.join(GUIDE_TREE_FILE));
        command
    }
}

impl Aligner for ClustalOmega {
    fn align(&self, input: &Path, output_dir: &Path) -> Result<AlignmentFiles, Report> {
        let program = self.program.display().to_string();
        let mut command = self.command(input, output_dir);
        debug!("Running aligner: {command:?}");

        // blocks until the aligner exits, there is no timeout
        let output = match command.output() {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Report::new(PipelineError::ToolNotFound { program })
                    .suggestion("Install Clustal Omega or pass its location with --clustalo."));
            }
            Err(e) => return Err(e).wrap_err_with(|| eyre!("Failed to run aligner: {program}")),
        };

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        debug!("Aligner stdout: {}", String::from_utf8_lossy(&output.stdout).trim());
        if !stderr.trim().is_empty() {
            debug!("Aligner stderr: {}", stderr.trim());
        }

        if !output.status.success() {
            return Err(PipelineError::ToolFailed { program, code: output.status.code(), stderr }.into());
        }

        let alignment = output_dir.join(ALIGNMENT_FILE);
        if !alignment.exists() {
            return Err(PipelineError::MissingOutput { path: alignment }.into());
        }

        let guide_tree = output_dir.join(GUIDE_TREE_FILE);
        let guide_tree = match guide_tree.exists() {
            true => Some(guide_tree),
            false => {
                warn!("Aligner did not write a guide tree: {guide_tree:?}");
                None
            }
        };

        info!("Alignment written: {alignment:?}");
        Ok(AlignmentFiles { alignment, guide_tree })
    }
}

/// Treat the input as already aligned and use it as is.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Prealigned;

impl Aligner for Prealigned {
    fn align(&self, input: &Path, output_dir: &Path) -> Result<AlignmentFiles, Report> {
        let alignment = output_dir.join(ALIGNMENT_FILE);
        std::fs::copy(input, &alignment)
            .wrap_err_with(|| eyre!("Failed to copy {input:?} to {alignment:?}"))?;
        Ok(AlignmentFiles { alignment, guide_tree: None })
    }
}

/// Which [`Aligner`] to run.
#[derive(Clone, Copy, Debug, Default, Deserialize, Display, PartialEq, Serialize, ValueEnum)]
pub enum AlignerKind {
    /// Align with Clustal Omega.
    #[default]
    #[strum(serialize = "clustal-omega")]
    ClustalOmega,
    /// Input sequences are already aligned.
    #[strum(serialize = "prealigned")]
    Prealigned,
}

/// Command-line options that select and configure the aligner.
#[derive(Clone, ClapArgs, Debug, Deserialize, PartialEq, Serialize)]
pub struct AlignerArgs {
    /// Alignment tool.
    #[clap(short = 'a', long, value_enum, default_value_t = AlignerArgs::default().aligner)]
    pub aligner: AlignerKind,

    /// Clustal Omega program name or path.
    #[clap(long, default_value_os_t = AlignerArgs::default().clustalo)]
    pub clustalo: PathBuf,
}

impl Default for AlignerArgs {
    fn default() -> Self {
        AlignerArgs {
            aligner: AlignerKind::default(),
            clustalo: ClustalOmega::default().program,
        }
    }
}

impl AlignerArgs {
    /// Returns the configured [`Aligner`].
    pub fn build(&self) -> Box<dyn Aligner> {
        match self.aligner {
            AlignerKind::ClustalOmega => Box::new(ClustalOmega::new(&self.clustalo)),
            AlignerKind::Prealigned => Box::new(Prealigned),
        }
    }
}

// ----------------------------------------------------------------------------
// Alignment
// ----------------------------------------------------------------------------

/// An aligned sequence record.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Record {
    pub id: String,
    pub sequence: Vec<u8>,
}

/// Equal-length aligned sequence records, in file order.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Alignment {
    pub records: Vec<Record>,
}

impl Alignment {
    /// Read an [`Alignment`] from a FASTA file.
    ///
    /// Returns [`PipelineError::InvalidAlignment`] if the file is not FASTA or the records
    /// are rejected by [`Alignment::new`].
    pub fn read(path: &Path) -> Result<Self, Report> {
        let mut reader = File::open(path)
            .map(BufReader::new)
            .map(fasta::Reader::new)
            .wrap_err_with(|| eyre!("Failed to open alignment: {path:?}"))?;

        let records = reader
            .records()
            .map(|result| {
                let record = result.map_err(|e| PipelineError::InvalidAlignment(e.to_string()))?;
                Ok(Record {
                    id: record.name().to_string(),
                    sequence: record.sequence().as_ref().to_vec(),
                })
            })
            .collect::<Result<Vec<_>, Report>>()?;

        Alignment::new(records)
    }

    /// Returns an [`Alignment`] after checking it has records of equal length with unique identifiers.
    ///
    /// ```rust
    /// use treebuilder::align::{Alignment, Record};
    /// let record = |id: &str, seq: &str| Record { id: id.to_string(), sequence: seq.as_bytes().to_vec() };
    ///
    /// let alignment = Alignment::new(vec![record("A", "AC-T"), record("B", "ACGT")])?;
    /// assert_eq!(alignment.width(), 4);
    ///
    /// assert!(Alignment::new(vec![record("A", "ACT"), record("B", "ACGT")]).is_err());
    /// assert!(Alignment::new(vec![record("A", "ACGT"), record("A", "ACGA")]).is_err());
    /// assert!(Alignment::new(Vec::new()).is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn new(records: Vec<Record>) -> Result<Self, Report> {
        let Some(first) = records.first() else {
            return Err(PipelineError::InvalidAlignment("no sequences found".to_string()).into());
        };
        let width = first.sequence.len();
        if let Some(record) = records.iter().find(|r| r.sequence.len() != width) {
            let reason = format!(
                "{} has length {} but {} has length {width}",
                record.id,
                record.sequence.len(),
                first.id
            );
            return Err(PipelineError::InvalidAlignment(reason).into());
        }
        let duplicates = records.iter().map(|r| &r.id).duplicates().join(", ");
        if !duplicates.is_empty() {
            let reason = format!("duplicate sequence identifiers: {duplicates}");
            return Err(PipelineError::InvalidAlignment(reason).into());
        }
        Ok(Alignment { records })
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the number of aligned columns.
    pub fn width(&self) -> usize {
        self.records.first().map(|r| r.sequence.len()).unwrap_or(0)
    }

    /// Returns the record identifiers, in file order.
    pub fn ids(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.id.as_str()).collect()
    }

    /// Returns the alignment as FASTA text.
    pub fn to_fasta(&self) -> Result<String, Report> {
        let mut writer = fasta::Writer::new(Vec::new());
        for record in &self.records {
            let definition = fasta::record::Definition::new(record.id.as_str(), None);
            let sequence = fasta::record::Sequence::from(record.sequence.clone());
            writer
                .write_record(&fasta::Record::new(definition, sequence))
                .wrap_err_with(|| eyre!("Failed to write FASTA record: {}", record.id))?;
        }
        let fasta = String::from_utf8(writer.get_ref().to_vec())
            .wrap_err("Alignment contains non UTF-8 characters.")?;
        Ok(fasta)
    }
}
