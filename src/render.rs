//! SVG rendering (§4.8): a dependency-free, deliberately simple
//! circular layout, not a layout engine. Grounded in
//! `soffit.display.drawGraph`'s circle placement, reworked as plain
//! string building instead of a `networkx`/`matplotlib` call, since
//! nothing in the corpus pulls in an SVG or plotting crate for this.

use crate::graph::Graph;
use std::f64::consts::PI;
use std::fs;
use std::io;
use std::path::Path;

const RADIUS: f64 = 200.0;
const NODE_R: f64 = 18.0;
const MARGIN: f64 = 40.0;

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Lay a graph's nodes evenly around a circle and render it as an SVG
/// document: one `<circle>` per node (labeled with its tag, if any, via
/// a `<text>` element) and one `<line>` per edge (labeled the same
/// way). Node order (and so placement) follows [`Graph::nodes`]'s
/// insertion order, giving a deterministic layout for a given graph.
pub fn draw_svg(g: &Graph) -> String {
    let n = g.node_count();
    let side = 2.0 * (RADIUS + NODE_R + MARGIN);
    let center = side / 2.0;

    let positions: Vec<(f64, f64)> = (0..n.max(1))
        .map(|i| {
            if n <= 1 {
                (center, center)
            } else {
                let theta = 2.0 * PI * (i as f64) / (n as f64);
                (center + RADIUS * theta.cos(), center + RADIUS * theta.sin())
            }
        })
        .collect();

    let pos_of: std::collections::HashMap<crate::graph::NodeId, (f64, f64)> =
        g.nodes().zip(positions.iter().copied()).collect();

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{side}\" height=\"{side}\" viewBox=\"0 0 {side} {side}\">\n"
    ));
    svg.push_str("<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n");

    for (a, b) in g.edges() {
        let (ax, ay) = pos_of[&a];
        let (bx, by) = pos_of[&b];
        svg.push_str(&format!(
            "<line x1=\"{ax:.2}\" y1=\"{ay:.2}\" x2=\"{bx:.2}\" y2=\"{by:.2}\" stroke=\"black\" stroke-width=\"1.5\"/>\n"
        ));
        if let Some(tag) = g.edge_tag(a, b) {
            let mx = (ax + bx) / 2.0;
            let my = (ay + by) / 2.0;
            svg.push_str(&format!(
                "<text x=\"{mx:.2}\" y=\"{my:.2}\" font-size=\"10\" text-anchor=\"middle\" fill=\"darkred\">{}</text>\n",
                escape_xml(tag)
            ));
        }
    }

    for node in g.nodes() {
        let (x, y) = pos_of[&node];
        svg.push_str(&format!(
            "<circle cx=\"{x:.2}\" cy=\"{y:.2}\" r=\"{NODE_R}\" fill=\"lightblue\" stroke=\"black\" stroke-width=\"1.5\"/>\n"
        ));
        let label = g.node_tag(node).unwrap_or("");
        svg.push_str(&format!(
            "<text x=\"{x:.2}\" y=\"{:.2}\" font-size=\"12\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
            y + 4.0,
            escape_xml(label)
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

/// Render `g` and write it to `path`.
pub fn write_svg(g: &Graph, path: &Path) -> io::Result<()> {
    fs::write(path, draw_svg(g))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    #[test]
    fn empty_graph_is_still_a_valid_svg_document() {
        let g = Graph::new_undirected();
        let svg = draw_svg(&g);
        assert!(svg.starts_with("<svg"));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn one_circle_and_text_per_node() {
        let mut g = Graph::new_undirected();
        g.mint_node(Some("a".into()));
        g.mint_node(Some("b".into()));
        let svg = draw_svg(&g);
        assert_eq!(svg.matches("<circle").count(), 2);
        assert!(svg.contains(">a<"));
        assert!(svg.contains(">b<"));
    }

    #[test]
    fn one_line_per_edge() {
        let mut g = Graph::new_undirected();
        let a = g.mint_node(None);
        let b = g.mint_node(None);
        let c = g.mint_node(None);
        g.add_edge(a, b, None);
        g.add_edge(b, c, None);
        let svg = draw_svg(&g);
        assert_eq!(svg.matches("<line").count(), 2);
    }

    #[test]
    fn tags_are_xml_escaped() {
        let mut g = Graph::new_undirected();
        g.mint_node(Some("<tag & \"thing\">".into()));
        let svg = draw_svg(&g);
        assert!(!svg.contains("<tag &"));
        assert!(svg.contains("&lt;tag &amp; &quot;thing&quot;&gt;"));
    }
}
