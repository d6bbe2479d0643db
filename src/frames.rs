//! Frame extraction: the canonical, top-level renderable units of a document.

use serde::Serialize;

use crate::figma::{FigmaFile, FigmaNode};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrameSize {
    pub width: f64,
    pub height: f64,
}

/// A FRAME node sitting directly under a CANVAS. Its id doubles as the
/// export key.
#[derive(Debug, Clone)]
pub struct Frame<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub size: FrameSize,
    pub node: &'a FigmaNode,
}

impl<'a> Frame<'a> {
    fn from_node(node: &'a FigmaNode) -> Self {
        let (width, height) = node.dimensions().unwrap_or((0.0, 0.0));
        Self {
            id: &node.id,
            name: &node.name,
            size: FrameSize { width, height },
            node,
        }
    }
}

/// Canvases in document order, then each canvas's direct FRAME children in
/// child order. Deeper frames are never eligible.
pub fn extract_frames(file: &FigmaFile) -> Vec<Frame<'_>> {
    file.document
        .children
        .iter()
        .filter(|canvas| canvas.is_canvas())
        .flat_map(|canvas| canvas.children.iter())
        .filter(|node| node.is_frame())
        .map(Frame::from_node)
        .collect()
}

pub fn frame_ids(frames: &[Frame<'_>]) -> Vec<String> {
    frames.iter().map(|f| f.id.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(json: &str) -> FigmaFile {
        serde_json::from_str(json).expect("parse file")
    }

    const DOC: &str = r#"{
      "name": "sample",
      "document": {
        "id": "0:0", "type": "DOCUMENT",
        "children": [
          { "id": "0:1", "type": "CANVAS", "name": "Page 1", "children": [
              { "id": "1:1", "type": "FRAME", "name": "Home", "size": {"x": 100, "y": 50},
                "children": [ { "id": "1:9", "type": "FRAME", "name": "Nested" } ] },
              { "id": "1:2", "type": "RECTANGLE", "name": "Loose rect" },
              { "id": "1:3", "type": "FRAME", "name": "About",
                "absoluteBoundingBox": {"x": 0, "y": 0, "width": 320.4, "height": 640.6} }
          ]},
          { "id": "0:2", "type": "CANVAS", "name": "Page 2", "children": [
              { "id": "2:1", "type": "GROUP", "name": "Group", "children": [
                  { "id": "2:2", "type": "FRAME", "name": "In group" } ] },
              { "id": "2:3", "type": "FRAME", "name": "Contact", "size": {"x": 10, "y": 10} }
          ]}
        ]
      }
    }"#;

    #[test]
    fn keeps_only_top_level_frames_in_document_order() {
        let file = file(DOC);
        let frames = extract_frames(&file);
        let ids: Vec<&str> = frames.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec!["1:1", "1:3", "2:3"]);
    }

    #[test]
    fn every_frame_is_a_frame_under_a_canvas() {
        let file = file(DOC);
        for frame in extract_frames(&file) {
            assert!(frame.node.is_frame());
            let parent = file
                .document
                .children
                .iter()
                .find(|canvas| canvas.children.iter().any(|c| c.id == frame.id))
                .expect("frame has a parent canvas");
            assert!(parent.is_canvas());
        }
    }

    #[test]
    fn size_comes_from_size_or_bounding_box() {
        let file = file(DOC);
        let frames = extract_frames(&file);
        assert_eq!(
            frames[0].size,
            FrameSize {
                width: 100.0,
                height: 50.0
            }
        );
        assert!((frames[1].size.width - 320.4).abs() < 1e-9);
        assert_eq!(frames[1].name, "About");
    }

    #[test]
    fn empty_document_yields_no_frames() {
        let file = file(r#"{"document":{"id":"0:0","type":"DOCUMENT"}}"#);
        assert!(extract_frames(&file).is_empty());
    }

    #[test]
    fn frame_ids_preserve_order() {
        let file = file(DOC);
        let frames = extract_frames(&file);
        assert_eq!(frame_ids(&frames), vec!["1:1", "1:3", "2:3"]);
    }
}
