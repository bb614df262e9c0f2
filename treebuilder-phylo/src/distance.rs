use color_eyre::eyre::{eyre, Report, Result};
use color_eyre::Help;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// A symmetric matrix of pairwise distances between named sequences.
///
/// The diagonal is always zero.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DistanceMatrix {
    /// Sequence identifiers, in input order.
    pub names: Vec<String>,
    /// Full square matrix, `matrix[i][j] == matrix[j][i]`.
    pub matrix: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Returns a [`DistanceMatrix`] from names and a full square matrix.
    ///
    /// Returns an Error if the matrix is not square, not symmetric, has a non-zero diagonal,
    /// or if any name is duplicated.
    ///
    /// ```rust
    /// use treebuilder_phylo::DistanceMatrix;
    /// let names = vec!["A".to_string(), "B".to_string()];
    /// let dm = DistanceMatrix::new(names, vec![vec![0.0, 0.5], vec![0.5, 0.0]])?;
    /// assert_eq!(dm.get(0, 1), 0.5);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    pub fn new(names: Vec<String>, matrix: Vec<Vec<f64>>) -> Result<Self, Report> {
        check_names(&names)?;
        let n = names.len();
        if matrix.len() != n || matrix.iter().any(|row| row.len() != n) {
            return Err(eyre!("Distance matrix must be {n}x{n} to match the number of names."));
        }
        for (i, j) in (0..n).cartesian_product(0..n) {
            if i == j && matrix[i][j] != 0.0 {
                return Err(eyre!("Distance matrix diagonal must be zero, found {} for {}.", matrix[i][j], names[i]));
            }
            if matrix[i][j] != matrix[j][i] {
                return Err(eyre!("Distance matrix is not symmetric between {} and {}.", names[i], names[j]));
            }
        }
        Ok(DistanceMatrix { names, matrix })
    }

    /// Returns the identity [`DistanceMatrix`] of aligned sequences.
    ///
    /// The distance between two sequences is `1 - matches / length`, counting every aligned column,
    /// so a gap aligned with a gap is a match.
    ///
    /// ## Arguments
    ///
    /// - `records` - Pairs of sequence identifier and aligned sequence.
    ///
    /// ## Examples
    ///
    /// ```rust
    /// use treebuilder_phylo::DistanceMatrix;
    /// let records = [("A", "ACGT"), ("B", "ACGA"), ("C", "TTGA")];
    /// let dm = DistanceMatrix::identity(records)?;
    /// assert_eq!(dm.get(0, 1), 0.25);
    /// assert_eq!(dm.get(0, 2), 0.75);
    /// assert_eq!(dm.get(2, 1), 0.5);
    /// # Ok::<(), color_eyre::eyre::Report>(())
    /// ```
    ///
    /// Sequences of different lengths are not aligned.
    ///
    /// ```rust
    /// use treebuilder_phylo::DistanceMatrix;
    /// assert!(DistanceMatrix::identity([("A", "ACGT"), ("B", "ACG")]).is_err());
    /// ```
    pub fn identity<I, N, S>(records: I) -> Result<Self, Report>
    where
        I: IntoIterator<Item = (N, S)>,
        N: AsRef<str>,
        S: AsRef<[u8]>,
    {
        let (names, sequences): (Vec<String>, Vec<S>) =
            records.into_iter().map(|(name, seq)| (name.as_ref().to_string(), seq)).unzip();
        check_names(&names)?;

        if names.is_empty() {
            return Err(eyre!("Cannot compute distances without any sequences."));
        }

        let length = sequences[0].as_ref().len();
        if let Some((name, seq)) = names.iter().zip(&sequences).find(|(_, s)| s.as_ref().len() != length) {
            return Err(eyre!(
                "Sequence {name} has length {} but {} has length {length}.",
                seq.as_ref().len(),
                names[0]
            )
            .suggestion("Are you sure the sequences are aligned?"));
        }

        let n = names.len();
        let mut matrix = vec![vec![0.0; n]; n];
        for (i, j) in (0..n).tuple_combinations() {
            let distance = identity_distance(sequences[i].as_ref(), sequences[j].as_ref());
            matrix[i][j] = distance;
            matrix[j][i] = distance;
        }

        Ok(DistanceMatrix { names, matrix })
    }

    /// Returns the distance between the sequences at indices `i` and `j`.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.matrix[i][j]
    }

    /// Returns the number of sequences.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns `true` if there are no sequences.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Identity distance between two equal-length sequences, case-insensitive.
fn identity_distance(a: &[u8], b: &[u8]) -> f64 {
    if a.is_empty() {
        return 0.0;
    }
    let matches = a.iter().zip(b).filter(|(x, y)| x.eq_ignore_ascii_case(y)).count();
    1.0 - matches as f64 / a.len() as f64
}

fn check_names(names: &[String]) -> Result<(), Report> {
    match names.iter().duplicates().next() {
        Some(name) => Err(eyre!("Duplicate sequence identifier: {name}")
            .suggestion("Every sequence must have a unique identifier.")),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_counts_gaps_as_characters() -> Result<(), Report> {
        let dm = DistanceMatrix::identity([("A", "AC--"), ("B", "AC-T"), ("C", "acgt")])?;
        assert_eq!(dm.get(0, 1), 0.25);
        assert_eq!(dm.get(1, 2), 0.25);
        assert_eq!(dm.get(0, 2), 0.5);
        assert_eq!(dm.get(2, 2), 0.0);
        Ok(())
    }

    #[test]
    fn identity_rejects_duplicates_and_empty() {
        assert!(DistanceMatrix::identity([("A", "AC"), ("A", "AC")]).is_err());
        assert!(DistanceMatrix::identity(Vec::<(&str, &str)>::new()).is_err());
    }

    #[test]
    fn new_rejects_asymmetric() {
        let names = vec!["A".to_string(), "B".to_string()];
        assert!(DistanceMatrix::new(names, vec![vec![0.0, 0.1], vec![0.2, 0.0]]).is_err());
    }
}
