use crate::{newick, Branch, FromNewick, Node, ToNewick};

use color_eyre::eyre::{eyre, Report, Result};
use itertools::Itertools;
use num_traits::AsPrimitive;
use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{EdgeIndex, Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A rooted [`Phylogeny`] of labelled nodes connected by branches.
///
/// ## Introduction
///
/// - Branches point from parent to child, so the root is the only node without an incoming branch.
/// - Leaves are nodes without children, their labels are the sequence identifiers.
/// - Internal nodes created by the tree constructors carry placeholder labels (`Inner1`, `Inner2`, ...)
///   until [`clear_internal_labels`](Phylogeny::clear_internal_labels) is called.
/// - Child order is the order in which branches were added.
///
/// ```rust
/// use treebuilder_phylo::{Phylogeny, FromNewick, ToNewick};
/// let phylo = Phylogeny::from_newick("((A:0.1,B:0.2):0.3,C:0.4);")?;
/// assert_eq!(phylo.get_leaf_labels()?, ["A", "B", "C"]);
/// assert_eq!(phylo.to_newick()?, "((A:0.10000,B:0.20000):0.30000,C:0.40000);");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Phylogeny {
    /// Directed graph of parents and children.
    pub graph: Graph<Node, Branch>,
}

impl Phylogeny {
    /// Returns a new empty [`Phylogeny`].
    pub fn new() -> Self {
        Phylogeny { graph: Graph::new() }
    }

    /// Adds a new node to the [`Phylogeny`] and returns its [`NodeIndex`].
    ///
    /// Labels are not required to be unique, every call creates a new node.
    ///
    /// ```rust
    /// use treebuilder_phylo::{Phylogeny, Node};
    /// use petgraph::graph::NodeIndex;
    ///
    /// let mut phylo = Phylogeny::new();
    /// let a_i = phylo.add_node(Node::from("A"));
    /// let b_i = phylo.add_node(Node::from("A"));
    /// assert_eq!(a_i, NodeIndex::new(0));
    /// assert_eq!(b_i, NodeIndex::new(1));
    /// ```
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        self.graph.add_node(node)
    }

    /// Creates a branch between the parent and child nodes and returns the [`EdgeIndex`].
    ///
    /// - If the child already has a parent, returns an Error.
    /// - If the new edge would create a cycle, returns an Error.
    ///
    /// ```rust
    /// use treebuilder_phylo::{Phylogeny, Node, Branch};
    ///
    /// let mut phylo = Phylogeny::new();
    /// let a = phylo.add_node(Node::from("A"));
    /// let b = phylo.add_node(Node::from("B"));
    /// phylo.add_branch(a, b, Branch::with_length(1.0))?;
    /// assert!(phylo.add_branch(b, a, Branch::new()).is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn add_branch(
        &mut self,
        parent: NodeIndex,
        child: NodeIndex,
        branch: Branch,
    ) -> Result<EdgeIndex, Report> {
        let (parent_node, child_node) = (self.get_node(&parent)?, self.get_node(&child)?);
        if self.get_parent(&child).is_some() {
            return Err(eyre!(
                "Node {child:?} ({child_node}) already has a parent, cannot add branch from {parent_node}."
            ));
        }

        let edge_index = self.graph.add_edge(parent, child, branch);

        // check if edge introduced a cycle
        if is_cyclic_directed(&self.graph) {
            self.graph.remove_edge(edge_index);
            return Err(eyre!("New edge between {parent:?} and {child:?} introduced a cycle."));
        }

        Ok(edge_index)
    }

    /// Returns the node that corresponds to the [`NodeIndex`].
    pub fn get_node(&self, node_index: &NodeIndex) -> Result<&Node, Report> {
        self.graph
            .node_weight(*node_index)
            .ok_or_else(|| eyre!("Failed to get node of node index: {node_index:?}"))
    }

    /// Returns the branch leading into the node, [`None`] for the root.
    pub fn get_branch(&self, node_index: &NodeIndex) -> Option<&Branch> {
        self.graph.edges_directed(*node_index, Direction::Incoming).next().map(|e| e.weight())
    }

    /// Returns the parent of the node, [`None`] for the root.
    pub fn get_parent(&self, node_index: &NodeIndex) -> Option<NodeIndex> {
        self.graph.neighbors_directed(*node_index, Direction::Incoming).next()
    }

    /// Returns immediate children of the node, in the order their branches were added.
    pub fn get_children(&self, node_index: &NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .edges_directed(*node_index, Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
            .sorted()
            .map(|(_, target)| target)
            .collect()
    }

    /// Returns the [`NodeIndex`] of the root node.
    ///
    /// Returns an Error if the phylogeny is empty or has more than one root.
    pub fn get_root_index(&self) -> Result<NodeIndex, Report> {
        let roots = self
            .graph
            .externals(Direction::Incoming)
            .collect_vec();

        match roots.len() {
            1 => Ok(roots[0]),
            0 => Err(eyre!("Failed to locate the root of an empty phylogeny.")),
            n => Err(eyre!("Phylogeny has {n} roots, expected exactly one.")),
        }
    }

    /// Returns all nodes in pre-order (parents before children, children in insertion order).
    pub fn get_preorder(&self) -> Result<Vec<NodeIndex>, Report> {
        let root = self.get_root_index()?;
        Ok(self.get_preorder_from(&root))
    }

    fn get_preorder_from(&self, start: &NodeIndex) -> Vec<NodeIndex> {
        let mut order = Vec::new();
        let mut stack = vec![*start];
        while let Some(node_index) = stack.pop() {
            order.push(node_index);
            stack.extend(self.get_children(&node_index).into_iter().rev());
        }
        order
    }

    /// Returns the leaves in pre-order.
    pub fn get_leaves(&self) -> Result<Vec<NodeIndex>, Report> {
        Ok(self.get_preorder()?.into_iter().filter(|n| self.is_leaf(n)).collect())
    }

    /// Returns the leaf labels in pre-order.
    ///
    /// ```rust
    /// use treebuilder_phylo::{Phylogeny, FromNewick};
    /// let phylo = Phylogeny::from_newick("(C,(A,B)Inner1);")?;
    /// assert_eq!(phylo.get_leaf_labels()?, ["C", "A", "B"]);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn get_leaf_labels(&self) -> Result<Vec<&str>, Report> {
        self.get_leaves()?
            .iter()
            .map(|n| Ok(self.get_node(n)?.label.as_str()))
            .collect()
    }

    /// Returns the summed branch length from the root to the node.
    pub fn get_depth(&self, node_index: &NodeIndex) -> f64 {
        let mut depth = 0.0;
        let mut current = *node_index;
        while let Some(parent) = self.get_parent(&current) {
            depth += self.get_branch(&current).map(|b| b.as_()).unwrap_or(0.0);
            current = parent;
        }
        depth
    }

    /// Returns the topology as a set of clades, each clade being the sorted leaf labels below an internal node.
    ///
    /// Internal labels and branch lengths are ignored, so two trees with the same shape compare equal.
    ///
    /// ```rust
    /// use treebuilder_phylo::{Phylogeny, FromNewick};
    /// let p1 = Phylogeny::from_newick("((A:1,B:2)X:1,C:3);")?;
    /// let p2 = Phylogeny::from_newick("(C,(B,A));")?;
    /// assert_eq!(p1.get_clades()?, p2.get_clades()?);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn get_clades(&self) -> Result<BTreeSet<Vec<String>>, Report> {
        self.get_preorder()?
            .into_iter()
            .filter(|n| !self.is_leaf(n))
            .map(|n| {
                self.get_preorder_from(&n)
                    .into_iter()
                    .filter(|d| self.is_leaf(d))
                    .map(|d| Ok(self.get_node(&d)?.label.clone()))
                    .collect::<Result<Vec<_>, Report>>()
                    .map(|labels| labels.into_iter().sorted().collect())
            })
            .collect()
    }

    /// Returns `true` if the node has no children.
    pub fn is_leaf(&self, node_index: &NodeIndex) -> bool {
        self.graph.neighbors_directed(*node_index, Direction::Outgoing).next().is_none()
    }

    /// Returns `true` if the [`Phylogeny`] has no nodes.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns the number of nodes in the [`Phylogeny`].
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Blanks the label of every internal node and returns how many labels were removed.
    ///
    /// Leaves are never modified, even when their label looks like an internal placeholder.
    ///
    /// ```rust
    /// use treebuilder_phylo::{Phylogeny, FromNewick, ToNewick};
    /// let mut phylo = Phylogeny::from_newick("((Inner7,B)Inner1,C)Inner2;")?;
    /// assert_eq!(phylo.clear_internal_labels(), 2);
    /// assert_eq!(phylo.to_newick()?, "((Inner7:0.00000,B:0.00000):0.00000,C:0.00000);");
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn clear_internal_labels(&mut self) -> usize {
        let internal = self
            .graph
            .node_indices()
            .filter(|n| !self.is_leaf(n))
            .collect_vec();

        let mut cleared = 0;
        for node_index in internal {
            if let Some(node) = self.graph.node_weight_mut(node_index) {
                if !node.is_unnamed() {
                    node.label.clear();
                    cleared += 1;
                }
            }
        }
        cleared
    }
}

impl FromNewick for Phylogeny {
    /// Returns a [`Phylogeny`] created from a [Newick](https://en.wikipedia.org/wiki/Newick_format) string.
    ///
    /// ```rust
    /// use treebuilder_phylo::{Phylogeny, FromNewick};
    /// let phylo = Phylogeny::from_newick("(A,B);")?;
    /// assert_eq!(phylo.len(), 3);
    /// assert!(Phylogeny::from_newick("(A,B;").is_err());
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    fn from_newick(newick: &str) -> Result<Phylogeny, Report> {
        newick::parse(newick)
    }
}

impl ToNewick for Phylogeny {
    fn to_newick(&self) -> Result<String, Report> {
        newick::write(self)
    }
}
