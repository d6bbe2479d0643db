//! Figma document types, parsed from the REST API (or an archived copy of it).

use palette::Srgba;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const CANVAS: &str = "CANVAS";
pub const FRAME: &str = "FRAME";

/// A design file as returned by `GET /v1/files/{key}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaFile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub document: FigmaNode,
}

/// Any node of the document tree, from the DOCUMENT root down to leaves.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaNode {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub children: Vec<FigmaNode>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub absolute_bounding_box: Option<FigmaBoundingBox>,
    pub size: Option<FigmaVector>,
    pub characters: Option<String>,
    pub style: Option<FigmaTypeStyle>,
    #[serde(default)]
    pub fills: Vec<FigmaPaint>,
    #[serde(default)]
    pub strokes: Vec<FigmaPaint>,
    pub stroke_weight: Option<f64>,
    pub corner_radius: Option<f64>,
    pub opacity: Option<f64>,
    #[serde(default)]
    pub clips_content: bool,
}

fn default_visible() -> bool {
    true
}

impl FigmaNode {
    pub fn is_canvas(&self) -> bool {
        self.node_type == CANVAS
    }

    pub fn is_frame(&self) -> bool {
        self.node_type == FRAME
    }

    /// Width/height from `size`, falling back to the absolute bounding box.
    pub fn dimensions(&self) -> Option<(f64, f64)> {
        self.size
            .as_ref()
            .map(|s| (s.x, s.y))
            .or_else(|| {
                self.absolute_bounding_box
                    .as_ref()
                    .map(|bb| (bb.width, bb.height))
            })
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct FigmaVector {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FigmaBoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FigmaTypeStyle {
    pub font_family: Option<String>,
    pub font_size: Option<f64>,
    pub font_weight: Option<f64>,
    pub line_height_px: Option<f64>,
    pub letter_spacing: Option<f64>,
    pub text_align_horizontal: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FigmaPaint {
    #[serde(rename = "type")]
    pub paint_type: String,
    #[serde(default = "default_visible")]
    pub visible: bool,
    pub color: Option<FigmaColor>,
    pub opacity: Option<f64>,
    pub image_ref: Option<String>,
}

/// RGBA color from Figma (0.0-1.0 range).
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct FigmaColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl FigmaColor {
    /// CSS `rgba()` with the paint opacity folded into alpha.
    pub fn to_css(&self, opacity: f64) -> String {
        let rgba: Srgba<u8> = Srgba::new(self.r, self.g, self.b, self.a).into_format();
        let alpha = (self.a as f64 * opacity).clamp(0.0, 1.0);
        format!(
            "rgba({}, {}, {}, {})",
            rgba.red,
            rgba.green,
            rgba.blue,
            trim_float(alpha)
        )
    }
}

fn trim_float(value: f64) -> String {
    let s = format!("{:.3}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Response from the images export endpoint. A `null` URL means the
/// render for that node is not available (yet).
#[derive(Debug, Deserialize)]
pub struct FigmaImageExport {
    #[serde(default)]
    pub images: HashMap<String, Option<String>>,
    #[serde(default)]
    pub err: Option<String>,
}
