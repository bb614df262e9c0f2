//! Build and normalize the tree of an [`Alignment`].

use crate::align::Alignment;
use clap::ValueEnum;
use color_eyre::eyre::{Report, Result, WrapErr};
use log::debug;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use treebuilder_phylo::{DistanceMatrix, FromNewick, Phylogeny, ToNewick};

/// Tree construction method.
///
/// ```rust
/// use treebuilder::tree::Method;
/// use std::str::FromStr;
/// assert_eq!(Method::NeighborJoining.to_string(), "Neighbor-Joining");
/// assert_eq!(Method::from_str("UPGMA")?, Method::Upgma);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, EnumIter, EnumString, Eq, PartialEq, Serialize, ValueEnum,
)]
pub enum Method {
    #[default]
    #[serde(rename = "Neighbor-Joining")]
    #[strum(to_string = "Neighbor-Joining", serialize = "neighbor-joining", serialize = "nj")]
    NeighborJoining,
    #[serde(rename = "UPGMA")]
    #[strum(to_string = "UPGMA", serialize = "upgma")]
    Upgma,
}

/// Returns the tree of an alignment, built from identity distances with the selected method.
pub fn build(alignment: &Alignment, method: Method) -> Result<Phylogeny, Report> {
    let records = alignment.records.iter().map(|r| (r.id.as_str(), r.sequence.as_slice()));
    let distances = DistanceMatrix::identity(records)?;
    debug!("Computed identity distances between {} sequences.", distances.len());

    let phylogeny = match method {
        Method::NeighborJoining => Phylogeny::neighbor_joining(&distances),
        Method::Upgma => Phylogeny::upgma(&distances),
    }
    .wrap_err_with(|| format!("Failed to build {method} tree."))?;

    Ok(phylogeny)
}

/// Returns the Newick string of a tree, with internal node labels removed.
///
/// Labels are removed from the tree before it is written, so leaf labels are never affected.
pub fn normalize(mut phylogeny: Phylogeny) -> Result<String, Report> {
    let cleared = phylogeny.clear_internal_labels();
    debug!("Cleared {cleared} internal node labels.");
    phylogeny.to_newick()
}

/// Returns a Newick string with internal node labels removed.
///
/// ```rust
/// use treebuilder::tree::normalize_newick;
/// let newick = normalize_newick("((A:1,Inner9:1)Inner1:1,C:2)Inner2;")?;
/// assert_eq!(newick, "((A:1.00000,Inner9:1.00000):1.00000,C:2.00000);");
/// assert_eq!(normalize_newick(&newick)?, newick);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn normalize_newick(newick: &str) -> Result<String, Report> {
    normalize(Phylogeny::from_newick(newick)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::Record;
    use itertools::Itertools;
    use strum::IntoEnumIterator;

    fn alignment(records: &[(&str, &str)]) -> Alignment {
        let records = records
            .iter()
            .map(|(id, seq)| Record { id: id.to_string(), sequence: seq.as_bytes().to_vec() })
            .collect();
        Alignment::new(records).unwrap()
    }

    #[test]
    fn both_methods_keep_leaf_set() -> Result<(), Report> {
        let alignment = alignment(&[
            ("human", "ACGTACGTAA"),
            ("chimp", "ACGTACGTAT"),
            ("mouse", "ACGAACTTAT"),
            ("rat", "ACGAACTTCT"),
            ("fish", "TCCAAGTTCG"),
        ]);
        for method in Method::iter() {
            let newick = normalize(build(&alignment, method)?)?;
            let phylogeny = Phylogeny::from_newick(&newick)?;
            let leaves = phylogeny.get_leaf_labels()?.into_iter().sorted().collect_vec();
            assert_eq!(leaves, ["chimp", "fish", "human", "mouse", "rat"], "{method}");
        }
        Ok(())
    }

    #[test]
    fn normalize_round_trip_keeps_topology() -> Result<(), Report> {
        let alignment = alignment(&[("a", "AAAAAA"), ("b", "AAAAAT"), ("c", "AATTTT"), ("d", "TTTTTT")]);
        let phylogeny = build(&alignment, Method::Upgma)?;
        let clades = phylogeny.get_clades()?;

        let reparsed = Phylogeny::from_newick(&normalize(phylogeny)?)?;
        assert_eq!(reparsed.get_clades()?, clades);
        Ok(())
    }

    #[test]
    fn normalize_is_idempotent() -> Result<(), Report> {
        let alignment = alignment(&[("a", "ACGT"), ("b", "ACGA"), ("c", "TCGA"), ("d", "TTGA")]);
        let once = normalize(build(&alignment, Method::NeighborJoining)?)?;
        assert!(!once.contains("Inner"));
        assert_eq!(normalize_newick(&once)?, once);
        Ok(())
    }

    #[test]
    fn leaf_named_like_placeholder_is_kept() -> Result<(), Report> {
        // the constructors label internal nodes Inner1, Inner2, ...
        let alignment = alignment(&[("Inner1", "ACGT"), ("Inner22", "ACGA"), ("x", "TTGA")]);
        for method in Method::iter() {
            let newick = normalize(build(&alignment, method)?)?;
            let phylogeny = Phylogeny::from_newick(&newick)?;
            let leaves = phylogeny.get_leaf_labels()?.into_iter().sorted().collect_vec();
            assert_eq!(leaves, ["Inner1", "Inner22", "x"], "{method}: {newick}");
        }
        Ok(())
    }

    #[test]
    fn method_names() -> Result<(), Report> {
        assert_eq!(Method::iter().map(|m| m.to_string()).collect_vec(), ["Neighbor-Joining", "UPGMA"]);
        assert_eq!("nj".parse::<Method>()?, Method::NeighborJoining);
        assert_eq!(serde_json::to_string(&Method::Upgma)?, "\"UPGMA\"");
        Ok(())
    }
}
