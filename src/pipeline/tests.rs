use super::*;
use crate::align::{AlignmentFiles, Prealigned};
use color_eyre::eyre::{Report, Result};
use itertools::Itertools;
use std::path::Path;
use std::sync::Mutex;
use strum::IntoEnumIterator;

const SEQUENCES: &str = "\
>human
ACGTACGTAACG
>chimp
ACGTACGTATCG
>gorilla
ACGAACGTATCG
>mouse
ACGAACTTATGG
>rat
ACGAACTTCTGG
";

fn request(bytes: &str, method: Method) -> Request {
    Request { upload: Upload::new(Some("primates.fasta".to_string()), bytes.as_bytes().to_vec()), method }
}

const GUIDE_TREE: &str = "((human:0.1,chimp:0.1)Inner1:0.2,gorilla:0.3);\n";

/// Records the working directory it was run in, and reports a guide tree.
struct Recording {
    dir: Mutex<Option<PathBuf>>,
    /// Guide tree contents, no file is written if [`None`].
    guide_tree: Option<&'static str>,
}

impl Default for Recording {
    fn default() -> Self {
        Recording { dir: Mutex::new(None), guide_tree: Some(GUIDE_TREE) }
    }
}

impl Aligner for Recording {
    fn align(&self, input: &Path, output_dir: &Path) -> Result<AlignmentFiles, Report> {
        if let Ok(mut dir) = self.dir.lock() {
            *dir = Some(output_dir.to_path_buf());
        }
        let mut files = Prealigned.align(input, output_dir)?;
        let guide_tree = output_dir.join(crate::align::GUIDE_TREE_FILE);
        if let Some(contents) = self.guide_tree {
            std::fs::write(&guide_tree, contents)?;
        }
        files.guide_tree = Some(guide_tree);
        Ok(files)
    }
}

#[test]
fn alignment_keeps_every_record() -> Result<(), Report> {
    let output = run(&request(SEQUENCES, Method::default()), &Prealigned, &RenderStyle::default())?;
    assert_eq!(output.alignment.len(), 5);
    assert_eq!(output.alignment.ids(), ["human", "chimp", "gorilla", "mouse", "rat"]);
    assert_eq!(output.alignment_fasta, SEQUENCES);
    Ok(())
}

#[test]
fn both_methods_cover_all_sequences() -> Result<(), Report> {
    for method in Method::iter() {
        let output = run(&request(SEQUENCES, method), &Prealigned, &RenderStyle::default())?;
        assert_eq!(output.method, method);

        let phylogeny = Phylogeny::from_newick(&output.newick)?;
        let leaves = phylogeny.get_leaf_labels()?.into_iter().sorted().collect_vec();
        assert_eq!(leaves, ["chimp", "gorilla", "human", "mouse", "rat"], "{method}");
        assert!(!output.newick.contains("Inner"), "{method}: {}", output.newick);
        assert_eq!(output.leaves.iter().sorted().collect_vec(), leaves);
    }
    Ok(())
}

#[test]
fn rendered_labels_match_leaves() -> Result<(), Report> {
    let output = run(&request(SEQUENCES, Method::Upgma), &Prealigned, &RenderStyle::default())?;
    assert_eq!(output.svg.matches(r#"class="leaf-name""#).count(), output.leaves.len());
    assert!(output.embed.contains(&output.svg));
    assert!(output.embed.contains("overflow: auto"));
    Ok(())
}

#[test]
fn empty_upload_is_rejected() {
    let report = run(&request("", Method::default()), &Prealigned, &RenderStyle::default()).unwrap_err();
    let error = PipelineError::find(&report);
    assert_eq!(error, Some(&PipelineError::EmptyUpload));
    assert!(error.is_some_and(|e| e.is_input_error()));
}

#[test]
fn non_fasta_upload_is_rejected() {
    let upload = "name,sequence\nhuman,ACGT\n";
    let report = run(&request(upload, Method::default()), &Prealigned, &RenderStyle::default()).unwrap_err();
    assert!(matches!(PipelineError::find(&report), Some(PipelineError::InvalidAlignment(_))), "{report:?}");
}

#[test]
fn guide_tree_is_normalized() -> Result<(), Report> {
    let output = run(&request(SEQUENCES, Method::default()), &Recording::default(), &RenderStyle::default())?;
    assert_eq!(
        output.guide_tree.as_deref(),
        Some("((human:0.10000,chimp:0.10000):0.20000,gorilla:0.30000);")
    );
    Ok(())
}

#[test]
fn unparsable_guide_tree_is_kept_as_written() -> Result<(), Report> {
    let sequences = ">NC_1:1-8\nACGTACGT\n>NC_2:1-8\nACGTACGA\n>NC_3:1-8\nACGAACGA\n";
    let aligner = Recording { guide_tree: Some("(\nNC_1:1-8:0.1\n,\nNC_2:1-8:0.2\n);\n"), ..Default::default() };
    let output = run(&request(sequences, Method::Upgma), &aligner, &RenderStyle::default())?;

    assert_eq!(output.guide_tree.as_deref(), Some("(\nNC_1:1-8:0.1\n,\nNC_2:1-8:0.2\n);"));
    let leaves = output.leaves.iter().sorted().collect_vec();
    assert_eq!(leaves, ["NC_1:1-8", "NC_2:1-8", "NC_3:1-8"]);
    assert!(output.newick.contains("'NC_1:1-8'"));
    Ok(())
}

#[test]
fn unreadable_guide_tree_is_skipped() -> Result<(), Report> {
    let aligner = Recording { guide_tree: None, ..Default::default() };
    let output = run(&request(SEQUENCES, Method::default()), &aligner, &RenderStyle::default())?;
    assert_eq!(output.guide_tree, None);
    assert_eq!(output.leaves.len(), 5);
    Ok(())
}

#[test]
fn working_directory_is_removed() -> Result<(), Report> {
    let aligner = Recording::default();
    run(&request(SEQUENCES, Method::default()), &aligner, &RenderStyle::default())?;
    let dir = aligner.dir.lock().ok().and_then(|dir| dir.clone()).unwrap();
    assert!(!dir.exists());

    // also removed when the run fails
    let aligner = Recording::default();
    let ragged = ">a\nACGT\n>b\nAC\n";
    assert!(run(&request(ragged, Method::default()), &aligner, &RenderStyle::default()).is_err());
    let dir = aligner.dir.lock().ok().and_then(|dir| dir.clone()).unwrap();
    assert!(!dir.exists());
    Ok(())
}

#[test]
fn concurrent_runs_are_isolated() -> Result<(), Report> {
    let handles = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let method = if i % 2 == 0 { Method::NeighborJoining } else { Method::Upgma };
                run(&request(SEQUENCES, method), &Prealigned, &RenderStyle::default())
            })
        })
        .collect_vec();
    for handle in handles {
        let output = handle.join().unwrap()?;
        assert_eq!(output.leaves.len(), 5);
    }
    Ok(())
}

#[test]
fn single_sequence() -> Result<(), Report> {
    let output = run(&request(">only\nACGT\n", Method::Upgma), &Prealigned, &RenderStyle::default())?;
    assert_eq!(output.newick, "only;");
    assert_eq!(output.leaves, ["only"]);
    Ok(())
}
