use color_eyre::eyre::{Report, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A [`Node`] in the [`Phylogeny`](crate::Phylogeny) graph.
#[derive(Clone, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct Node {
    /// [`Node`] label for display, empty for unnamed internal nodes.
    pub label: String,
}

#[rustfmt::skip]
impl Display for Node { fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { write!(f, "{}", self.label) } }
#[rustfmt::skip]
impl From<&str> for Node { fn from(label: &str) -> Self { Node { label: label.to_string() } } }
#[rustfmt::skip]
impl From<String> for Node { fn from(label: String) -> Self { Node { label } } }

impl FromStr for Node {
    type Err = Report;
    fn from_str(s: &str) -> Result<Node, Report> {
        Ok(Node::from(s))
    }
}

impl Node {
    /// Returns a new [`Node`] with an empty label.
    pub fn new() -> Self {
        Node::default()
    }

    /// Returns the placeholder [`Node`] used for the `n`th internal node created by a tree constructor.
    ///
    /// ```rust
    /// use treebuilder_phylo::Node;
    /// assert_eq!(Node::inner(3).label, "Inner3");
    /// ```
    pub fn inner(n: usize) -> Self {
        Node { label: format!("Inner{n}") }
    }

    /// Returns `true` if the label is empty.
    pub fn is_unnamed(&self) -> bool {
        self.label.is_empty()
    }
}
