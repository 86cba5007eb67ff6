//! SVG export.
//!
//! Serialises a built [`Frame`] into a standalone SVG document. Style
//! classes become CSS classes with a neutral default theme, so the output
//! is viewable as-is and restylable by the host.

use crate::frame::Frame;
use crate::primitive::{Shape, StyleClass};
use flowloom_core::Size;
use std::fmt::Write as _;

const STYLE_SHEET: &str = "\
.grid_line { stroke: #e8e8e8; stroke-width: 1; }
.node_shadow { fill: rgba(0,0,0,0.12); }
.connection { stroke: #7a8699; stroke-width: 2; fill: none; }
.connection_detached { stroke: #c98a3d; stroke-width: 2; fill: none; stroke-dasharray: 6 4; }
.node_body { fill: #ffffff; stroke: #aab2bf; stroke-width: 1.5; }
.node_body_invalid { fill: #fff4f4; stroke: #d05b5b; stroke-width: 1.5; }
.port { fill: #5b78a6; }
.node_label { fill: #2e3440; font-family: sans-serif; }
.selection_outline { fill: none; stroke: #3d7bd9; stroke-width: 2; stroke-dasharray: 4 3; }";

/// Renders a frame as a standalone SVG document of the given pixel size.
#[must_use]
pub fn export_svg(frame: &Frame, size: Size) -> String {
    let mut svg = String::with_capacity(1024 + frame.items.len() * 96);
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}">"#,
        size.width, size.height, size.width, size.height
    );
    let _ = writeln!(svg, "<style>{STYLE_SHEET}</style>");

    for item in &frame.items {
        let class = class_name(item.style);
        match &item.shape {
            Shape::Rect {
                rect,
                corner_radius,
            } => {
                let _ = writeln!(
                    svg,
                    r#"<rect class="{class}" x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" rx="{corner_radius:.2}"/>"#,
                    rect.x, rect.y, rect.width, rect.height
                );
            }
            Shape::Line { from, to } => {
                let _ = writeln!(
                    svg,
                    r#"<line class="{class}" x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}"/>"#,
                    from.x, from.y, to.x, to.y
                );
            }
            Shape::Polyline { points, .. } => {
                let mut attr = String::with_capacity(points.len() * 16);
                for (i, p) in points.iter().enumerate() {
                    if i > 0 {
                        attr.push(' ');
                    }
                    let _ = write!(attr, "{:.2},{:.2}", p.x, p.y);
                }
                let _ = writeln!(svg, r#"<polyline class="{class}" points="{attr}"/>"#);
            }
            Shape::Circle { center, radius } => {
                let _ = writeln!(
                    svg,
                    r#"<circle class="{class}" cx="{:.2}" cy="{:.2}" r="{radius:.2}"/>"#,
                    center.x, center.y
                );
            }
            Shape::Text {
                origin,
                content,
                font_size,
            } => {
                let _ = writeln!(
                    svg,
                    r#"<text class="{class}" x="{:.2}" y="{:.2}" font-size="{font_size:.1}">{}</text>"#,
                    origin.x,
                    origin.y,
                    escape(content)
                );
            }
        }
    }

    svg.push_str("</svg>\n");
    svg
}

fn class_name(style: StyleClass) -> &'static str {
    match style {
        StyleClass::GridLine => "grid_line",
        StyleClass::NodeShadow => "node_shadow",
        StyleClass::Connection => "connection",
        StyleClass::ConnectionDetached => "connection_detached",
        StyleClass::NodeBody => "node_body",
        StyleClass::NodeBodyInvalid => "node_body_invalid",
        StyleClass::Port => "port",
        StyleClass::NodeLabel => "node_label",
        StyleClass::SelectionOutline => "selection_outline",
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
