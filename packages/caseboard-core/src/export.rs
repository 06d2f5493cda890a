/// Static SVG snapshot of a rendered board.
use std::fmt::Write;

use crate::render::{RenderedBoard, RenderedNode};
use crate::types::{ItemId, Position};

const NODE_WIDTH: f64 = 160.0;
const NODE_HEIGHT: f64 = 48.0;
const MARGIN: f64 = 40.0;

pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn center(node: &RenderedNode) -> Position {
    Position::new(
        node.position.x + NODE_WIDTH / 2.0,
        node.position.y + NODE_HEIGHT / 2.0,
    )
}

/// Render nodes as labelled boxes and edges as arrows between box centers.
/// Optimistic edges are dashed, unsaved nodes get a dotted outline.
pub fn to_svg(board: &RenderedBoard) -> String {
    let (min, max) = board
        .bounds()
        .unwrap_or((Position::new(0.0, 0.0), Position::new(0.0, 0.0)));
    let origin_x = min.x - MARGIN;
    let origin_y = min.y - MARGIN;
    let width = (max.x - min.x) + NODE_WIDTH + 2.0 * MARGIN;
    let height = (max.y - min.y) + NODE_HEIGHT + 2.0 * MARGIN;

    let mut svg = String::new();
    // Writing into a String cannot fail.
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="{} {} {} {}" width="{}" height="{}">"#,
        origin_x, origin_y, width, height, width, height
    );
    let _ = writeln!(svg, "  <title>Board {} (case {})</title>", board.board_id, board.case_id);
    svg.push_str(concat!(
        "  <defs><marker id=\"arrow\" viewBox=\"0 0 10 10\" refX=\"10\" refY=\"5\" ",
        "markerWidth=\"8\" markerHeight=\"8\" orient=\"auto-start-reverse\">",
        "<path d=\"M 0 0 L 10 5 L 0 10 z\" fill=\"#555\"/></marker></defs>\n"
    ));

    let node_center = |id: ItemId| board.node(id).map(center);
    for edge in &board.edges {
        let (Some(from), Some(to)) = (node_center(edge.from_item), node_center(edge.to_item)) else {
            continue;
        };
        let dash = if edge.optimistic {
            r#" stroke-dasharray="6 4""#
        } else {
            ""
        };
        let _ = writeln!(
            svg,
            r##"  <line x1="{}" y1="{}" x2="{}" y2="{}" stroke="#555" stroke-width="2"{} marker-end="url(#arrow)"/>"##,
            from.x, from.y, to.x, to.y, dash
        );
        if !edge.label.is_empty() {
            let _ = writeln!(
                svg,
                r#"  <text x="{}" y="{}" font-size="11" text-anchor="middle">{}</text>"#,
                (from.x + to.x) / 2.0,
                (from.y + to.y) / 2.0 - 4.0,
                escape_xml(&edge.label)
            );
        }
    }

    for node in &board.nodes {
        let outline = if node.unsaved {
            r#" stroke-dasharray="2 2""#
        } else {
            ""
        };
        let _ = writeln!(
            svg,
            r#"  <g data-item="{}" data-kind="{}">"#,
            node.item_id,
            escape_xml(node.style.title)
        );
        let _ = writeln!(
            svg,
            r#"    <rect x="{}" y="{}" width="{}" height="{}" rx="6" fill="white" stroke="{}" stroke-width="2"{}/>"#,
            node.position.x, node.position.y, NODE_WIDTH, NODE_HEIGHT, node.style.color, outline
        );
        let _ = writeln!(
            svg,
            r#"    <text x="{}" y="{}" font-size="10" fill="{}">{}</text>"#,
            node.position.x + 8.0,
            node.position.y + 16.0,
            node.style.color,
            escape_xml(node.style.title)
        );
        let _ = writeln!(
            svg,
            r#"    <text x="{}" y="{}" font-size="13">{}</text>"#,
            node.position.x + 8.0,
            node.position.y + 34.0,
            escape_xml(&node.label)
        );
        svg.push_str("  </g>\n");
    }

    svg.push_str("</svg>\n");
    svg
}
