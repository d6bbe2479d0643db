//! Built-in HTML/CSS generator: every node becomes an absolutely positioned
//! box, so the page reproduces the frame at 1:1 scale.

use std::collections::HashMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use tracing::debug;

use super::convert::{ConversionResult, Fill, IntermediateNode, NodeKind};
use super::{AssetRepository, ImageResolver, MarkupGenerator};
use crate::{DcovError, Result};

#[derive(Debug, Clone, Default)]
pub struct HtmlCssGenerator;

impl HtmlCssGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MarkupGenerator for HtmlCssGenerator {
    async fn generate(
        &self,
        entry: &ConversionResult,
        assets: &AssetRepository,
        resolver: &dyn ImageResolver,
    ) -> Result<String> {
        let keys = entry.root.asset_keys();
        let resolved = if keys.is_empty() {
            HashMap::new()
        } else {
            debug!(frame = %entry.frame_id, count = keys.len(), "resolving image assets");
            resolver.resolve(&keys).await.map_err(|e| {
                DcovError::conversion(format!(
                    "asset resolution failed for frame {}: {e}",
                    entry.frame_id
                ))
            })?
        };

        let mut urls = HashMap::with_capacity(keys.len());
        for key in keys {
            let url = resolved
                .get(&key)
                .cloned()
                .unwrap_or_else(|| assets.placeholder(&key));
            urls.insert(key, url);
        }

        Ok(render_document(entry, assets, &urls))
    }
}

struct Emitter<'a> {
    urls: &'a HashMap<String, String>,
    css: String,
    body: String,
    counter: usize,
}

fn render_document(
    entry: &ConversionResult,
    assets: &AssetRepository,
    urls: &HashMap<String, String>,
) -> String {
    let mut emitter = Emitter {
        urls,
        css: String::new(),
        body: String::new(),
        counter: 0,
    };
    emitter.node(&entry.root, 0);

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(
        out,
        "<meta name=\"design-file\" content=\"{}\">",
        escape_html(&assets.file_key)
    );
    let _ = writeln!(
        out,
        "<meta name=\"design-frame\" content=\"{}\">",
        escape_html(&entry.frame_id)
    );
    let _ = writeln!(out, "<title>{}</title>", escape_html(&entry.name));
    out.push_str("<style>\n* { box-sizing: border-box; margin: 0; padding: 0; }\n");
    let _ = writeln!(
        out,
        "html, body {{ width: {}; height: {}; overflow: hidden; }}",
        px(entry.root.width),
        px(entry.root.height)
    );
    out.push_str(&emitter.css);
    out.push_str("</style>\n</head>\n<body>\n");
    out.push_str(&emitter.body);
    out.push_str("</body>\n</html>\n");
    out
}

impl Emitter<'_> {
    fn node(&mut self, node: &IntermediateNode, depth: usize) {
        let class = format!("n{}", self.counter);
        self.counter += 1;
        let indent = "  ".repeat(depth);

        let mut rules = vec![
            "position: absolute".to_string(),
            format!("left: {}", px(node.x)),
            format!("top: {}", px(node.y)),
            format!("width: {}", px(node.width)),
            format!("height: {}", px(node.height)),
        ];
        if node.opacity < 1.0 {
            rules.push(format!("opacity: {}", num(node.opacity)));
        }
        if node.kind == NodeKind::Ellipse {
            rules.push("border-radius: 50%".to_string());
        } else if node.corner_radius > 0.0 {
            rules.push(format!("border-radius: {}", px(node.corner_radius)));
        }
        if let Some(stroke) = &node.stroke {
            rules.push(format!("border: {} solid {}", px(stroke.weight), stroke.color));
        }
        if node.clips_content {
            rules.push("overflow: hidden".to_string());
        }

        let solid = node.fills.iter().rev().find_map(|f| match f {
            Fill::Solid(color) => Some(color.as_str()),
            Fill::Image => None,
        });

        match node.kind {
            NodeKind::Text => {
                if let Some(color) = solid {
                    rules.push(format!("color: {color}"));
                }
                if let Some(text) = &node.text {
                    if let Some(family) = &text.font_family {
                        rules.push(format!("font-family: '{}', sans-serif", family.replace('\'', "")));
                    }
                    if let Some(size) = text.font_size {
                        rules.push(format!("font-size: {}", px(size)));
                    }
                    if let Some(weight) = text.font_weight {
                        rules.push(format!("font-weight: {}", weight.round() as i64));
                    }
                    if let Some(line_height) = text.line_height {
                        rules.push(format!("line-height: {}", px(line_height)));
                    }
                    if let Some(spacing) = text.letter_spacing {
                        rules.push(format!("letter-spacing: {}", px(spacing)));
                    }
                    if let Some(align) = &text.align {
                        let align = if align == "justified" { "justify" } else { align };
                        rules.push(format!("text-align: {align}"));
                    }
                }
                rules.push("white-space: pre-wrap".to_string());
            }
            NodeKind::Asset => {}
            _ => {
                if let Some(color) = solid {
                    rules.push(format!("background-color: {color}"));
                }
                if node.has_image_fill() {
                    if let Some(url) = self.urls.get(&node.id) {
                        rules.push(format!("background-image: url(\"{}\")", escape_css_url(url)));
                        rules.push("background-size: cover".to_string());
                        rules.push("background-position: center".to_string());
                    }
                }
            }
        }

        let _ = writeln!(self.css, ".{class} {{ {}; }}", rules.join("; "));

        match node.kind {
            NodeKind::Asset => {
                let src = self.urls.get(&node.id).map(String::as_str).unwrap_or("");
                let _ = writeln!(
                    self.body,
                    "{indent}<img class=\"{class}\" src=\"{}\" alt=\"{}\">",
                    escape_html(src),
                    escape_html(&node.name)
                );
            }
            NodeKind::Text => {
                let characters = node
                    .text
                    .as_ref()
                    .map(|t| t.characters.as_str())
                    .unwrap_or("");
                let _ = writeln!(
                    self.body,
                    "{indent}<p class=\"{class}\">{}</p>",
                    escape_html(characters)
                );
            }
            _ => {
                let _ = writeln!(self.body, "{indent}<div class=\"{class}\">");
                for child in &node.children {
                    self.node(child, depth + 1);
                }
                let _ = writeln!(self.body, "{indent}</div>");
            }
        }
    }
}

fn num(value: f64) -> String {
    let s = format!("{:.2}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    match s {
        "" | "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

fn px(value: f64) -> String {
    format!("{}px", num(value))
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn escape_css_url(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}
