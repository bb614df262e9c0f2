use crate::FromNewick;

use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use num_traits::AsPrimitive;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fmt::{Display, Formatter};

/// A [`Branch`] in the [`Phylogeny`](crate::Phylogeny).
#[derive(Copy, Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Branch {
    /// [`Branch`] length (ex. 0.25).
    pub length: f64,
}

#[rustfmt::skip]
impl AsPrimitive<f64> for Branch { fn as_(self) -> f64 { self.length } }
#[rustfmt::skip]
impl Default for Branch { fn default() -> Self { Self::new() } }
#[rustfmt::skip]
impl Display for Branch { fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{:.5}", self.length) } }

impl Branch {
    /// Returns a zero-length [`Branch`].
    pub fn new() -> Self {
        Branch { length: 0.0 }
    }

    /// Returns a [`Branch`] of the given length, negative lengths are clamped to zero.
    ///
    /// ```rust
    /// use treebuilder_phylo::Branch;
    /// assert_eq!(Branch::with_length(-0.2).length, 0.0);
    /// assert_eq!(Branch::with_length(0.5).length, 0.5);
    /// ```
    pub fn with_length(length: f64) -> Self {
        Branch { length: length.max(0.0) }
    }
}

impl FromNewick for Branch {
    /// Returns a [`Branch`] created from the attribute section of a [Newick](https://en.wikipedia.org/wiki/Newick_format) node.
    ///
    /// Only the branch length is read, anything after a second `:` is ignored.
    ///
    /// # Examples
    ///
    /// Just a node name.
    ///
    /// ```rust
    /// use treebuilder_phylo::{Branch, FromNewick};
    ///
    /// let branch = Branch::from_newick("A")?;
    /// assert_eq!(branch, Branch { length: 0.0 });
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    ///
    /// Branch length, with a trailing support value.
    ///
    /// ```rust
    /// # use treebuilder_phylo::{Branch, FromNewick};
    /// assert_eq!(Branch::from_newick("A:2")?, Branch { length: 2.0 });
    /// assert_eq!(Branch::from_newick(":2:90")?, Branch { length: 2.0 });
    /// assert!(Branch::from_newick("A:x").is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    fn from_newick(newick: &str) -> Result<Branch, Report> {
        let length = match newick.trim_end_matches(';').split(':').map(str::trim).nth(1) {
            Some(length) if !length.is_empty() => length
                .parse()
                .wrap_err_with(|| eyre!("Failed to parse branch length from newick: {newick}"))?,
            _ => 0.0,
        };
        Ok(Branch { length })
    }
}
