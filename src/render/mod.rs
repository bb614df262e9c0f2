//! Draw a [`Phylogeny`] as a rectangular phylogram in SVG.

use clap::{ArgAction, Args as ClapArgs};
use color_eyre::eyre::{Report, Result};
use indoc::formatdoc;
use itertools::Itertools;
use log::debug;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write;
use treebuilder_phylo::Phylogeny;

/// Approximate glyph width as a fraction of the font size, used to reserve room for labels.
const GLYPH_WIDTH: f64 = 0.62;

// ----------------------------------------------------------------------------
// Render Style
// ----------------------------------------------------------------------------

/// Options that control how a tree is drawn.
#[derive(Clone, ClapArgs, Debug, Deserialize, PartialEq, Serialize)]
pub struct RenderStyle {
    /// Font size of leaf labels, in pixels.
    #[clap(long, default_value_t = RenderStyle::default().font_size)]
    pub font_size: u32,

    /// Horizontal pixels per unit of branch length.
    #[clap(long, default_value_t = RenderStyle::default().branch_scale)]
    pub branch_scale: f64,

    /// Do not draw leaf labels.
    #[clap(long = "no-leaf-names", action = ArgAction::SetFalse)]
    pub show_leaf_names: bool,

    /// Height of the scrollable tree panel, in pixels.
    #[clap(long, default_value_t = RenderStyle::default().height)]
    pub height: u32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        RenderStyle { font_size: 12, branch_scale: 300.0, show_leaf_names: true, height: 600 }
    }
}

impl RenderStyle {
    fn row_height(&self) -> f64 {
        f64::from(self.font_size) * 1.8
    }

    fn margin(&self) -> f64 {
        f64::from(self.font_size) * 2.0
    }
}

// ----------------------------------------------------------------------------
// Layout
// ----------------------------------------------------------------------------

/// Pixel coordinates of every node of a tree.
#[derive(Debug)]
struct Layout {
    points: HashMap<NodeIndex, (f64, f64)>,
    leaves: Vec<NodeIndex>,
    max_depth: f64,
}

impl Layout {
    /// Leaves are stacked top to bottom in pre-order, parents are centered on their children
    /// and x is the distance from the root.
    fn new(phylogeny: &Phylogeny, style: &RenderStyle) -> Result<Self, Report> {
        let leaves = phylogeny.get_leaves()?;
        let margin = style.margin();
        let row_height = style.row_height();

        let mut points = HashMap::new();
        for (row, leaf) in leaves.iter().enumerate() {
            let y = margin + row as f64 * row_height;
            points.insert(*leaf, (0.0, y));
        }

        // reverse pre-order visits children before their parent
        let preorder = phylogeny.get_preorder()?;
        for node in preorder.iter().rev() {
            let children = phylogeny.get_children(node);
            if let (Some(first), Some(last)) = (children.first(), children.last()) {
                let y = (points[first].1 + points[last].1) / 2.0;
                points.insert(*node, (0.0, y));
            }
        }

        let mut max_depth: f64 = 0.0;
        for node in &preorder {
            let depth = phylogeny.get_depth(node);
            max_depth = max_depth.max(depth);
            if let Some(point) = points.get_mut(node) {
                point.0 = margin + depth * style.branch_scale;
            }
        }

        Ok(Layout { points, leaves, max_depth })
    }
}

// ----------------------------------------------------------------------------
// Render
// ----------------------------------------------------------------------------

/// Returns the tree drawn as a standalone SVG document.
///
/// - Each branch is an elbow: a vertical line at the parent, then a horizontal line to the child.
/// - Each leaf label is a `<text class="leaf-name">` element, unless labels are hidden.
/// - A scale bar is drawn below the tree when it has non-zero depth.
///
/// ```rust
/// use treebuilder::render::{to_svg, RenderStyle};
/// use treebuilder_phylo::{Phylogeny, FromNewick};
///
/// let phylo = Phylogeny::from_newick("((A:0.1,B:0.2):0.3,C:0.4);")?;
/// let svg = to_svg(&phylo, &RenderStyle::default())?;
/// assert!(svg.starts_with("<svg"));
/// assert_eq!(svg.matches(r#"class="leaf-name""#).count(), 3);
/// # Ok::<(), color_eyre::eyre::Report>(())
/// ```
pub fn to_svg(phylogeny: &Phylogeny, style: &RenderStyle) -> Result<String, Report> {
    let layout = Layout::new(phylogeny, style)?;
    let font_size = f64::from(style.font_size);
    let margin = style.margin();

    let label_width = match style.show_leaf_names {
        true => {
            let longest = layout
                .leaves
                .iter()
                .map(|n| Ok(phylogeny.get_node(n)?.label.chars().count()))
                .collect::<Result<Vec<_>, Report>>()?
                .into_iter()
                .max()
                .unwrap_or(0);
            longest as f64 * font_size * GLYPH_WIDTH + font_size
        }
        false => 0.0,
    };
    let tree_height = layout.leaves.len().saturating_sub(1) as f64 * style.row_height();
    let width = (2.0 * margin + layout.max_depth * style.branch_scale + label_width).ceil();
    let height = (3.0 * margin + tree_height + font_size).ceil();
    debug!("Rendering {} leaves in {width}x{height} px.", layout.leaves.len());

    let mut svg = String::new();
    writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="sans-serif" font-size="{font_size}">"#
    )?;

    // branches
    writeln!(svg, r#"<g class="branches" stroke="black" stroke-width="1" fill="none">"#)?;
    for node in phylogeny.get_preorder()? {
        let (x, _) = layout.points[&node];
        let children = phylogeny.get_children(&node);
        if let (Some(first), Some(last)) = (children.first(), children.last()) {
            let (y1, y2) = (layout.points[first].1, layout.points[last].1);
            writeln!(svg, r#"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}"/>"#)?;
        }
        for child in children {
            let (child_x, child_y) = layout.points[&child];
            writeln!(svg, r#"<line x1="{x:.2}" y1="{child_y:.2}" x2="{child_x:.2}" y2="{child_y:.2}"/>"#)?;
        }
    }
    writeln!(svg, "</g>")?;

    // leaf labels
    if style.show_leaf_names {
        writeln!(svg, r#"<g class="leaf-names" dominant-baseline="middle">"#)?;
        for leaf in &layout.leaves {
            let (x, y) = layout.points[leaf];
            let label = escape(&phylogeny.get_node(leaf)?.label);
            let x = x + font_size / 2.0;
            writeln!(svg, r#"<text class="leaf-name" x="{x:.2}" y="{y:.2}">{label}</text>"#)?;
        }
        writeln!(svg, "</g>")?;
    }

    // scale bar
    if layout.max_depth > 0.0 {
        let exponent = layout.max_depth.log10().floor() as i32;
        let length = 10_f64.powi(exponent);
        let precision = exponent.min(0).unsigned_abs() as usize;
        let (x1, y) = (margin, margin + tree_height + margin);
        let x2 = x1 + length * style.branch_scale;
        writeln!(svg, r#"<g class="scale-bar" stroke="black" stroke-width="1">"#)?;
        writeln!(svg, r#"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}"/>"#)?;
        let y = y + font_size;
        writeln!(svg, r#"<text x="{x1:.2}" y="{y:.2}" stroke="none">{length:.precision$}</text>"#)?;
        writeln!(svg, "</g>")?;
    }

    svg.push_str("</svg>");
    Ok(svg)
}

/// Returns the SVG wrapped in a fixed-height panel that scrolls when the tree is taller.
///
/// ```rust
/// use treebuilder::render::{embed, RenderStyle};
/// let html = embed("<svg></svg>", &RenderStyle::default());
/// assert!(html.contains("height: 600px"));
/// assert!(html.contains("overflow: auto"));
/// ```
pub fn embed(svg: &str, style: &RenderStyle) -> String {
    format!(
        r#"<div class="tree" style="height: {}px; overflow: auto; border: 1px solid #ddd;">{svg}</div>"#,
        style.height
    )
}

/// Returns a complete HTML page.
pub fn document(title: &str, body: &str) -> String {
    let title = escape(title);
    formatdoc! {r#"
        <!DOCTYPE html>
        <html lang="en">
        <head>
        <meta charset="utf-8">
        <title>{title}</title>
        <style>
          body {{ font-family: sans-serif; margin: 2em; max-width: 60em; }}
          pre {{ background: #f6f6f6; padding: 1em; overflow-x: auto; }}
          .error {{ background: #fdecea; color: #611a15; padding: 1em; border-radius: 4px; }}
        </style>
        </head>
        <body>
        {body}
        </body>
        </html>
    "#}
}

/// Returns text with the characters that have meaning in XML and HTML escaped.
///
/// ```rust
/// use treebuilder::render::escape;
/// assert_eq!(escape("<a & 'b'>"), "&lt;a &amp; &#39;b&#39;&gt;");
/// ```
pub fn escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '&' => "&amp;".to_string(),
            '<' => "&lt;".to_string(),
            '>' => "&gt;".to_string(),
            '"' => "&quot;".to_string(),
            '\'' => "&#39;".to_string(),
            c => c.to_string(),
        })
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use treebuilder_phylo::FromNewick;

    #[test]
    fn one_label_per_leaf() -> Result<(), Report> {
        let phylo = Phylogeny::from_newick("((A:1,B:1):1,(C:1,(D:1,E:2):1):0.5,F:3);")?;
        let svg = to_svg(&phylo, &RenderStyle::default())?;
        assert_eq!(svg.matches(r#"class="leaf-name""#).count(), 6);
        for label in ["A", "B", "C", "D", "E", "F"] {
            assert!(svg.contains(&format!(">{label}</text>")), "{label}");
        }
        Ok(())
    }

    #[test]
    fn hidden_labels() -> Result<(), Report> {
        let phylo = Phylogeny::from_newick("(A:1,B:1);")?;
        let style = RenderStyle { show_leaf_names: false, ..Default::default() };
        let svg = to_svg(&phylo, &style)?;
        assert_eq!(svg.matches("leaf-name").count(), 0);
        Ok(())
    }

    #[test]
    fn labels_are_escaped() -> Result<(), Report> {
        let phylo = Phylogeny::from_newick("('a<b':1,'c&d':1);")?;
        let svg = to_svg(&phylo, &RenderStyle::default())?;
        assert!(svg.contains(">a&lt;b</text>"));
        assert!(svg.contains(">c&amp;d</text>"));
        Ok(())
    }

    #[test]
    fn single_leaf() -> Result<(), Report> {
        let phylo = Phylogeny::from_newick("A;")?;
        let svg = to_svg(&phylo, &RenderStyle::default())?;
        assert_eq!(svg.matches(r#"class="leaf-name""#).count(), 1);
        assert!(!svg.contains("scale-bar"));
        Ok(())
    }

    #[test]
    fn leaves_are_stacked_and_parents_centered() -> Result<(), Report> {
        let phylo = Phylogeny::from_newick("(A:1,B:2);")?;
        let style = RenderStyle::default();
        let layout = Layout::new(&phylo, &style)?;
        let root = phylo.get_root_index()?;
        let [a, b] = layout.leaves[..] else { panic!("expected two leaves") };

        let (root_x, root_y) = layout.points[&root];
        let (a_x, a_y) = layout.points[&a];
        let (b_x, b_y) = layout.points[&b];
        assert!((b_y - a_y - style.row_height()).abs() < 1e-9);
        assert_eq!(root_y, (a_y + b_y) / 2.0);
        assert_eq!(a_x - root_x, style.branch_scale);
        assert_eq!(b_x - root_x, 2.0 * style.branch_scale);
        assert_eq!(layout.max_depth, 2.0);
        Ok(())
    }

    #[test]
    fn document_escapes_title() {
        let html = document("<tree>", "<p>body</p>");
        assert!(html.contains("<title>&lt;tree&gt;</title>"));
        assert!(html.contains("<p>body</p>"));
    }
}
