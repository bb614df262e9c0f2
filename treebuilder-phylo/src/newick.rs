//! Read and write [Newick](https://en.wikipedia.org/wiki/Newick_format) strings.

use crate::{Branch, FromNewick, Node, Phylogeny};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use petgraph::graph::NodeIndex;
use std::fmt::Write;

/// Characters that end an unquoted label or a branch attribute section.
const DELIMITERS: &[char] = &['(', ')', ',', ';', '[', ']'];

/// Returns a [`Phylogeny`] parsed from a Newick string.
///
/// - Labels may be quoted with `'`, a doubled `''` inside quotes is a literal quote.
/// - Branch attributes follow `:`, see [`Branch::from_newick`].
/// - Comments in square brackets are skipped.
/// - The terminating `;` is optional.
///
/// # Examples
///
/// ```rust
/// use treebuilder_phylo::newick;
/// let phylo = newick::parse("(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;")?;
/// assert_eq!(phylo.get_leaf_labels()?, ["A", "B", "C", "D"]);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
///
/// Unbalanced parentheses are an Error.
///
/// ```rust
/// use treebuilder_phylo::newick;
/// assert!(newick::parse("((A,B);").is_err());
/// assert!(newick::parse("").is_err());
/// ```
pub fn parse(newick: &str) -> Result<Phylogeny, Report> {
    let mut parser = Parser { chars: newick.chars().collect(), pos: 0 };
    let mut phylogeny = Phylogeny::new();

    parser.skip_ignored()?;
    if parser.peek().is_none() {
        return Err(eyre!("Failed to parse empty newick string."));
    }

    // the root branch attributes have nowhere to go
    let (_root, _branch) = parser
        .subtree(&mut phylogeny)
        .wrap_err_with(|| eyre!("Failed to parse newick: {newick}"))?;

    parser.skip_ignored()?;
    if parser.peek() == Some(';') {
        parser.pos += 1;
        parser.skip_ignored()?;
    }
    if let Some(c) = parser.peek() {
        return Err(eyre!("Unexpected character {c:?} at position {} in newick: {newick}", parser.pos));
    }

    Ok(phylogeny)
}

/// Returns the Newick string of a [`Phylogeny`].
///
/// Every non-root node is written with its branch length to 5 decimal places.
/// Empty labels are written as nothing.
///
/// ```rust
/// use treebuilder_phylo::{newick, Phylogeny, Node, Branch};
/// let mut phylo = Phylogeny::new();
/// let root = phylo.add_node(Node::new());
/// let a = phylo.add_node(Node::from("A"));
/// let b = phylo.add_node(Node::from("sample b"));
/// phylo.add_branch(root, a, Branch::with_length(0.5))?;
/// phylo.add_branch(root, b, Branch::with_length(1.0))?;
/// assert_eq!(newick::write(&phylo)?, "(A:0.50000,'sample b':1.00000);");
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn write(phylogeny: &Phylogeny) -> Result<String, Report> {
    let root = phylogeny.get_root_index()?;
    let mut newick = String::new();
    write_node(phylogeny, &root, &mut newick)?;
    newick.push(';');
    Ok(newick)
}

fn write_node(phylogeny: &Phylogeny, node_index: &NodeIndex, newick: &mut String) -> Result<(), Report> {
    let children = phylogeny.get_children(node_index);
    if !children.is_empty() {
        newick.push('(');
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                newick.push(',');
            }
            write_node(phylogeny, child, newick)?;
        }
        newick.push(')');
    }

    let node = phylogeny.get_node(node_index)?;
    newick.push_str(&quote(&node.label));

    if let Some(branch) = phylogeny.get_branch(node_index) {
        write!(newick, ":{branch}")?;
    }
    Ok(())
}

/// Returns the label, quoted if it contains characters with meaning in Newick.
///
/// ```rust
/// use treebuilder_phylo::newick::quote;
/// assert_eq!(quote("A"), "A");
/// assert_eq!(quote("it's"), "'it''s'");
/// assert_eq!(quote("a:b"), "'a:b'");
/// ```
pub fn quote(label: &str) -> String {
    let needs_quotes =
        label.chars().any(|c| c.is_whitespace() || c == ':' || c == '\'' || DELIMITERS.contains(&c));
    match needs_quotes {
        true => format!("'{}'", label.replace('\'', "''")),
        false => label.to_string(),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    /// Skip whitespace and bracketed comments.
    fn skip_ignored(&mut self) -> Result<(), Report> {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else if c == '[' {
                let start = self.pos;
                while self.peek().is_some_and(|c| c != ']') {
                    self.pos += 1;
                }
                if self.peek().is_none() {
                    return Err(eyre!("Unterminated comment starting at position {start}."));
                }
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Parse a node and everything below it, returning the node and the branch leading into it.
    fn subtree(&mut self, phylogeny: &mut Phylogeny) -> Result<(NodeIndex, Branch), Report> {
        self.skip_ignored()?;

        let mut children = Vec::new();
        if self.peek() == Some('(') {
            self.pos += 1;
            loop {
                children.push(self.subtree(phylogeny)?);
                self.skip_ignored()?;
                match self.peek() {
                    Some(',') => self.pos += 1,
                    Some(')') => {
                        self.pos += 1;
                        break;
                    }
                    Some(c) => return Err(eyre!("Expected ',' or ')' at position {}, found {c:?}.", self.pos)),
                    None => return Err(eyre!("Missing closing parenthesis.")),
                }
            }
        }

        let label = self.label()?;
        let branch = self.attributes()?;

        let node_index = phylogeny.add_node(Node::from(label));
        for (child, child_branch) in children {
            phylogeny.add_branch(node_index, child, child_branch)?;
        }

        Ok((node_index, branch))
    }

    fn label(&mut self) -> Result<String, Report> {
        self.skip_ignored()?;
        let mut label = String::new();

        if self.peek() == Some('\'') {
            self.pos += 1;
            loop {
                match self.peek() {
                    Some('\'') if self.chars.get(self.pos + 1) == Some(&'\'') => {
                        label.push('\'');
                        self.pos += 2;
                    }
                    Some('\'') => {
                        self.pos += 1;
                        break;
                    }
                    Some(c) => {
                        label.push(c);
                        self.pos += 1;
                    }
                    None => return Err(eyre!("Unterminated quoted label: '{label}")),
                }
            }
        } else {
            while let Some(c) = self.peek() {
                if c == ':' || c.is_whitespace() || DELIMITERS.contains(&c) {
                    break;
                }
                label.push(c);
                self.pos += 1;
            }
        }

        Ok(label)
    }

    fn attributes(&mut self) -> Result<Branch, Report> {
        self.skip_ignored()?;
        let mut attributes = String::new();
        while let Some(c) = self.peek() {
            if c.is_whitespace() || DELIMITERS.contains(&c) {
                break;
            }
            attributes.push(c);
            self.pos += 1;
        }
        Branch::from_newick(&attributes)
    }
}
