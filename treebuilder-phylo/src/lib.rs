//! `treebuilder-phylo` builds, reads and writes phylogenetic trees.
//!
//! - [`DistanceMatrix`]: pairwise identity distances between aligned sequences.
//! - [`Phylogeny`]: a rooted tree, built with [`Phylogeny::neighbor_joining`] or [`Phylogeny::upgma`].
//! - [`newick`]: read and write [Newick](https://en.wikipedia.org/wiki/Newick_format) strings.
//!
//! ```rust
//! use treebuilder_phylo::{DistanceMatrix, Phylogeny, ToNewick};
//!
//! let records = [("A", "ACGTAC"), ("B", "ACGTTC"), ("C", "TCGATC")];
//! let distances = DistanceMatrix::identity(records)?;
//! let mut phylo = Phylogeny::upgma(&distances)?;
//! phylo.clear_internal_labels();
//! assert_eq!(phylo.to_newick()?, "(C:0.20833,(A:0.08333,B:0.08333):0.12500);");
//! # Ok::<(), color_eyre::eyre::Report>(())
//! ```

use color_eyre::eyre::{Report, Result};

mod branch;
mod construct;
mod distance;
pub mod newick;
mod node;
mod phylogeny;

#[doc(inline)]
pub use branch::Branch;
#[doc(inline)]
pub use distance::DistanceMatrix;
#[doc(inline)]
pub use node::Node;
#[doc(inline)]
pub use phylogeny::Phylogeny;

// ----------------------------------------------------------------------------
// Traits
// ----------------------------------------------------------------------------

/// Returns an object created from a [Newick](https://en.wikipedia.org/wiki/Newick_format) [`str`].
pub trait FromNewick {
    fn from_newick(newick: &str) -> Result<Self, Report>
    where
        Self: Sized;
}

/// Returns a [Newick](https://en.wikipedia.org/wiki/Newick_format) [`str`] created from an object.
pub trait ToNewick {
    fn to_newick(&self) -> Result<String, Report>;
}
