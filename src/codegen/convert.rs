//! Figma node tree to the intermediate tree consumed by markup generators.

use crate::figma::{FigmaNode, FigmaPaint};
use crate::frames::Frame;
use crate::{DcovError, Result};

/// Node types exported as a single raster asset instead of being laid out.
const ASSET_TYPES: &[&str] = &[
    "VECTOR",
    "BOOLEAN_OPERATION",
    "STAR",
    "LINE",
    "POLYGON",
    "REGULAR_POLYGON",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Container,
    Rectangle,
    Ellipse,
    Text,
    /// Rendered from an exported image of the node itself.
    Asset,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Fill {
    /// CSS color, opacity already folded in.
    Solid(String),
    /// Image paint; the node's own export stands in for it.
    Image,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextContent {
    pub characters: String,
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<f64>,
    pub line_height: Option<f64>,
    pub letter_spacing: Option<f64>,
    pub align: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    /// Offset from the parent's top-left corner.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fills: Vec<Fill>,
    pub stroke: Option<Stroke>,
    pub corner_radius: f64,
    pub opacity: f64,
    pub clips_content: bool,
    pub text: Option<TextContent>,
    pub children: Vec<IntermediateNode>,
}

impl IntermediateNode {
    pub fn has_image_fill(&self) -> bool {
        self.fills.iter().any(|f| matches!(f, Fill::Image))
    }

    /// Whether this node needs an exported image to render.
    pub fn needs_asset(&self) -> bool {
        self.kind == NodeKind::Asset || self.has_image_fill()
    }

    /// Ids of every node needing an asset, in pre-order.
    pub fn asset_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        self.collect_asset_keys(&mut keys);
        keys
    }

    fn collect_asset_keys(&self, acc: &mut Vec<String>) {
        if self.needs_asset() {
            acc.push(self.id.clone());
        }
        for child in &self.children {
            child.collect_asset_keys(acc);
        }
    }
}

/// One frame ready for codegen.
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub frame_id: String,
    pub name: String,
    pub file_key: String,
    pub root: IntermediateNode,
}

/// Convert a frame into the intermediate tree. Pure and synchronous.
pub fn convert(frame: &Frame<'_>, file_key: &str) -> Result<ConversionResult> {
    let node = frame.node;
    if node.dimensions().is_none() {
        return Err(DcovError::conversion(format!(
            "frame {} has neither size nor bounding box",
            node.id
        )));
    }
    if frame.size.width <= 0.0 || frame.size.height <= 0.0 {
        return Err(DcovError::conversion(format!(
            "frame {} has an empty size ({}x{})",
            node.id, frame.size.width, frame.size.height
        )));
    }

    let mut root = map_node(node, None);
    root.x = 0.0;
    root.y = 0.0;
    root.width = frame.size.width;
    root.height = frame.size.height;

    Ok(ConversionResult {
        frame_id: frame.id.to_string(),
        name: frame.name.to_string(),
        file_key: file_key.to_string(),
        root,
    })
}

fn map_node(node: &FigmaNode, parent: Option<&FigmaNode>) -> IntermediateNode {
    let kind = node_kind(node);
    let (width, height) = node.dimensions().unwrap_or((0.0, 0.0));
    let (x, y) = match (
        node.absolute_bounding_box.as_ref(),
        parent.and_then(|p| p.absolute_bounding_box.as_ref()),
    ) {
        (Some(own), Some(parent)) => (own.x - parent.x, own.y - parent.y),
        _ => (0.0, 0.0),
    };

    let children = if kind == NodeKind::Asset {
        Vec::new()
    } else {
        node.children
            .iter()
            .filter(|child| child.visible)
            .map(|child| map_node(child, Some(node)))
            .collect()
    };

    IntermediateNode {
        id: node.id.clone(),
        name: node.name.clone(),
        kind,
        x,
        y,
        width,
        height,
        fills: node.fills.iter().filter_map(map_fill).collect(),
        stroke: map_stroke(node),
        corner_radius: node.corner_radius.unwrap_or(0.0),
        opacity: node.opacity.unwrap_or(1.0),
        clips_content: node.clips_content,
        text: (kind == NodeKind::Text).then(|| map_text(node)),
        children,
    }
}

fn node_kind(node: &FigmaNode) -> NodeKind {
    match node.node_type.as_str() {
        "TEXT" => NodeKind::Text,
        "RECTANGLE" => NodeKind::Rectangle,
        "ELLIPSE" => NodeKind::Ellipse,
        t if ASSET_TYPES.contains(&t) => NodeKind::Asset,
        _ => NodeKind::Container,
    }
}

fn map_fill(paint: &FigmaPaint) -> Option<Fill> {
    if !paint.visible {
        return None;
    }
    match paint.paint_type.as_str() {
        "SOLID" => paint
            .color
            .map(|c| Fill::Solid(c.to_css(paint.opacity.unwrap_or(1.0)))),
        "IMAGE" => Some(Fill::Image),
        _ => None,
    }
}

fn map_stroke(node: &FigmaNode) -> Option<Stroke> {
    let weight = node.stroke_weight.unwrap_or(0.0);
    if weight <= 0.0 {
        return None;
    }
    node.strokes
        .iter()
        .filter(|p| p.visible && p.paint_type == "SOLID")
        .find_map(|p| p.color.map(|c| c.to_css(p.opacity.unwrap_or(1.0))))
        .map(|color| Stroke { color, weight })
}

fn map_text(node: &FigmaNode) -> TextContent {
    let style = node.style.clone().unwrap_or_default();
    TextContent {
        characters: node.characters.clone().unwrap_or_default(),
        font_family: style.font_family,
        font_size: style.font_size,
        font_weight: style.font_weight,
        line_height: style.line_height_px,
        letter_spacing: style.letter_spacing,
        align: style.text_align_horizontal.map(|a| a.to_ascii_lowercase()),
    }
}
