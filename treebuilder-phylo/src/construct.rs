//! Build a [`Phylogeny`] from a [`DistanceMatrix`].
//!
//! Internal nodes are labelled `Inner1`, `Inner2`, ... in the order they are created,
//! so the root always carries the highest number.

use crate::{Branch, DistanceMatrix, Node, Phylogeny};
use color_eyre::eyre::{eyre, Report, Result};
use itertools::Itertools;
use petgraph::graph::NodeIndex;

/// An active cluster during UPGMA.
struct Cluster {
    node: NodeIndex,
    size: usize,
    height: f64,
}

impl Phylogeny {
    /// Returns a rooted, ultrametric [`Phylogeny`] built with UPGMA (average linkage).
    ///
    /// - The two closest clusters are merged at half their distance.
    /// - Distances to the merged cluster are averaged, weighted by cluster size.
    /// - Ties are broken by the first pair in row-major order.
    ///
    /// ```rust
    /// use treebuilder_phylo::{DistanceMatrix, Phylogeny, ToNewick};
    /// let dm = DistanceMatrix::identity([("A", "AAAA"), ("B", "AAAT"), ("C", "TTTT")])?;
    /// let phylo = Phylogeny::upgma(&dm)?;
    /// assert_eq!(phylo.to_newick()?, "(C:0.43750,(A:0.12500,B:0.12500)Inner1:0.31250)Inner2;");
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn upgma(distances: &DistanceMatrix) -> Result<Phylogeny, Report> {
        let mut phylogeny = Phylogeny::new();
        let mut clusters = leaves(&mut phylogeny, distances)?
            .into_iter()
            .map(|node| Cluster { node, size: 1, height: 0.0 })
            .collect_vec();
        let mut matrix = distances.matrix.clone();
        let mut inner = 0;

        while clusters.len() > 1 {
            let (i, j) = closest_pair(&matrix, |a, b| matrix[a][b]);
            let height = matrix[i][j] / 2.0;

            inner += 1;
            let node = phylogeny.add_node(Node::inner(inner));
            for k in [i, j] {
                let branch = Branch::with_length(height - clusters[k].height);
                phylogeny.add_branch(node, clusters[k].node, branch)?;
            }

            let (size_i, size_j) = (clusters[i].size as f64, clusters[j].size as f64);
            let distances = (0..clusters.len())
                .filter(|&k| k != i && k != j)
                .map(|k| (matrix[i][k] * size_i + matrix[j][k] * size_j) / (size_i + size_j))
                .collect_vec();

            let size = clusters[i].size + clusters[j].size;
            merge(&mut matrix, &mut clusters, (i, j), distances, Cluster { node, size, height });
        }

        Ok(phylogeny)
    }

    /// Returns a [`Phylogeny`] built with Neighbor-Joining.
    ///
    /// - Pairs are joined by the minimum of the Q-matrix, ties broken by the first pair in row-major order.
    /// - Negative branch lengths are clamped to zero.
    /// - The last two clusters are joined by attaching the remaining cluster to the most recent
    ///   internal node, so the root of three or more sequences has three children.
    /// - Two sequences are placed under a new root at half their distance each.
    ///
    /// ```rust
    /// use treebuilder_phylo::{DistanceMatrix, Phylogeny, ToNewick};
    /// let dm = DistanceMatrix::identity([("A", "AAAA"), ("B", "AAAT"), ("C", "TTTT")])?;
    /// let phylo = Phylogeny::neighbor_joining(&dm)?;
    /// assert_eq!(phylo.to_newick()?, "(A:0.25000,B:0.00000,C:0.75000)Inner1;");
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn neighbor_joining(distances: &DistanceMatrix) -> Result<Phylogeny, Report> {
        let mut phylogeny = Phylogeny::new();
        let mut nodes = leaves(&mut phylogeny, distances)?;
        let mut matrix = distances.matrix.clone();
        let mut inner = 0;

        while nodes.len() > 2 {
            let n = nodes.len() as f64;
            let sums = matrix.iter().map(|row| row.iter().sum::<f64>()).collect_vec();
            let (i, j) =
                closest_pair(&matrix, |a, b| (n - 2.0) * matrix[a][b] - sums[a] - sums[b]);

            let d_ij = matrix[i][j];
            let length_i = d_ij / 2.0 + (sums[i] - sums[j]) / (2.0 * (n - 2.0));
            let length_j = d_ij - length_i;

            inner += 1;
            let node = phylogeny.add_node(Node::inner(inner));
            phylogeny.add_branch(node, nodes[i], Branch::with_length(length_i))?;
            phylogeny.add_branch(node, nodes[j], Branch::with_length(length_j))?;

            let distances = (0..nodes.len())
                .filter(|&k| k != i && k != j)
                .map(|k| (matrix[i][k] + matrix[j][k] - d_ij) / 2.0)
                .collect_vec();

            merge(&mut matrix, &mut nodes, (i, j), distances, node);
        }

        if let [a, b] = nodes[..] {
            let distance = matrix[0][1];
            match (phylogeny.is_leaf(&a), phylogeny.is_leaf(&b)) {
                (_, false) => _ = phylogeny.add_branch(b, a, Branch::with_length(distance))?,
                (false, true) => _ = phylogeny.add_branch(a, b, Branch::with_length(distance))?,
                (true, true) => {
                    inner += 1;
                    let root = phylogeny.add_node(Node::inner(inner));
                    phylogeny.add_branch(root, a, Branch::with_length(distance / 2.0))?;
                    phylogeny.add_branch(root, b, Branch::with_length(distance / 2.0))?;
                }
            }
        }

        Ok(phylogeny)
    }
}

/// Adds one leaf per sequence, in matrix order.
fn leaves(phylogeny: &mut Phylogeny, distances: &DistanceMatrix) -> Result<Vec<NodeIndex>, Report> {
    if distances.is_empty() {
        return Err(eyre!("Cannot build a tree from an empty distance matrix."));
    }
    Ok(distances
        .names
        .iter()
        .map(|name| phylogeny.add_node(Node::from(name.as_str())))
        .collect())
}

/// Returns the pair `(i, j)` with `i < j` that minimizes `score`, first in row-major order on ties.
fn closest_pair<F>(matrix: &[Vec<f64>], score: F) -> (usize, usize)
where
    F: Fn(usize, usize) -> f64,
{
    (0..matrix.len())
        .tuple_combinations()
        .min_by(|&(a, b), &(c, d)| score(a, b).total_cmp(&score(c, d)))
        .unwrap_or((0, 1))
}

/// Removes rows and columns `i` and `j` (and their items), then appends the merged item
/// with its distances to every remaining item.
fn merge<T>(
    matrix: &mut Vec<Vec<f64>>,
    items: &mut Vec<T>,
    (i, j): (usize, usize),
    distances: Vec<f64>,
    item: T,
) {
    // remove the larger index first so the smaller one stays valid
    for k in [j, i] {
        matrix.remove(k);
        matrix.iter_mut().for_each(|row| _ = row.remove(k));
        items.remove(k);
    }
    matrix.iter_mut().zip(&distances).for_each(|(row, d)| row.push(*d));
    let mut row = distances;
    row.push(0.0);
    matrix.push(row);
    items.push(item);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FromNewick, ToNewick};

    fn matrix(names: &[&str], rows: &[&[f64]]) -> DistanceMatrix {
        let names = names.iter().map(|n| n.to_string()).collect();
        let rows = rows.iter().map(|r| r.to_vec()).collect();
        DistanceMatrix::new(names, rows).unwrap()
    }

    fn depth_of(phylo: &Phylogeny, label: &str) -> f64 {
        let node = phylo
            .graph
            .node_indices()
            .find(|n| phylo.graph[*n].label == label)
            .unwrap();
        phylo.get_depth(&node)
    }

    #[test]
    fn neighbor_joining_recovers_additive_tree() -> Result<(), Report> {
        let dm = matrix(
            &["a", "b", "c", "d", "e"],
            &[
                &[0.0, 5.0, 9.0, 9.0, 8.0],
                &[5.0, 0.0, 10.0, 10.0, 9.0],
                &[9.0, 10.0, 0.0, 8.0, 7.0],
                &[9.0, 10.0, 8.0, 0.0, 3.0],
                &[8.0, 9.0, 7.0, 3.0, 0.0],
            ],
        );
        let phylo = Phylogeny::neighbor_joining(&dm)?;

        let expected = Phylogeny::from_newick("(((a,b),c),d,e);")?;
        assert_eq!(phylo.get_clades()?, expected.get_clades()?);

        let root = phylo.get_root_index()?;
        assert_eq!(phylo.get_children(&root).len(), 3);
        assert_eq!(phylo.get_node(&root)?.label, "Inner3");

        for (label, depth) in [("a", 7.0), ("b", 8.0), ("c", 6.0), ("d", 2.0), ("e", 1.0)] {
            assert!((depth_of(&phylo, label) - depth).abs() < 1e-9, "{label}");
        }
        Ok(())
    }

    #[test]
    fn upgma_is_ultrametric() -> Result<(), Report> {
        let dm = matrix(
            &["A", "B", "C", "D"],
            &[
                &[0.0, 2.0, 6.0, 10.0],
                &[2.0, 0.0, 6.0, 10.0],
                &[6.0, 6.0, 0.0, 10.0],
                &[10.0, 10.0, 10.0, 0.0],
            ],
        );
        let phylo = Phylogeny::upgma(&dm)?;

        let expected = Phylogeny::from_newick("(D,(C,(A,B)));")?;
        assert_eq!(phylo.get_clades()?, expected.get_clades()?);
        for label in ["A", "B", "C", "D"] {
            assert!((depth_of(&phylo, label) - 5.0).abs() < 1e-9, "{label}");
        }

        let root = phylo.get_root_index()?;
        assert_eq!(phylo.get_node(&root)?.label, "Inner3");
        Ok(())
    }

    #[test]
    fn methods_may_disagree_on_topology() -> Result<(), Report> {
        // non-ultrametric distances, UPGMA groups a with b, NJ groups a with c
        let dm = matrix(
            &["a", "b", "c", "d"],
            &[
                &[0.0, 3.0, 4.0, 5.0],
                &[3.0, 0.0, 5.0, 4.0],
                &[4.0, 5.0, 0.0, 7.0],
                &[5.0, 4.0, 7.0, 0.0],
            ],
        );
        let nj = Phylogeny::neighbor_joining(&dm)?;
        let upgma = Phylogeny::upgma(&dm)?;
        assert_ne!(nj.get_clades()?, upgma.get_clades()?);

        let mut labels = nj.get_leaf_labels()?;
        labels.sort();
        assert_eq!(labels, ["a", "b", "c", "d"]);
        let mut labels = upgma.get_leaf_labels()?;
        labels.sort();
        assert_eq!(labels, ["a", "b", "c", "d"]);
        Ok(())
    }

    #[test]
    fn small_inputs() -> Result<(), Report> {
        let one = matrix(&["A"], &[&[0.0]]);
        assert_eq!(Phylogeny::neighbor_joining(&one)?.to_newick()?, "A;");
        assert_eq!(Phylogeny::upgma(&one)?.to_newick()?, "A;");

        let two = matrix(&["A", "B"], &[&[0.0, 0.5], &[0.5, 0.0]]);
        assert_eq!(
            Phylogeny::neighbor_joining(&two)?.to_newick()?,
            "(A:0.25000,B:0.25000)Inner1;"
        );
        assert_eq!(Phylogeny::upgma(&two)?.to_newick()?, "(A:0.25000,B:0.25000)Inner1;");
        Ok(())
    }
}
