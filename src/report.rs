//! The per-frame `report.json` record.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{FrameArtifacts, DIFF_IMAGE, IMAGE_A, IMAGE_B};
use crate::Viewport;

pub const FRAME_TYPE: &str = "FRAME";

/// Identifies the code generator that produced `b.png`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineInfo {
    pub name: String,
    pub version: String,
    pub framework: String,
}

impl Default for EngineInfo {
    fn default() -> Self {
        Self {
            name: "dcov-htmlcss".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            framework: "preview".to_string(),
        }
    }
}

/// Written once per completed frame and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub sample_id: String,
    pub frame_id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub image_a: String,
    pub image_b: String,
    pub diff_image: String,
    pub mismatch_percent: f64,
    /// RFC 3339, UTC.
    pub generated_at: String,
    pub engine: EngineInfo,
}

impl Report {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Pure aggregation; the timestamp is taken here.
pub fn assemble_report(
    sample_id: &str,
    frame_id: &str,
    name: &str,
    viewport: Viewport,
    mismatch_percent: f64,
    engine: &EngineInfo,
) -> Report {
    Report {
        sample_id: sample_id.to_string(),
        frame_id: frame_id.to_string(),
        node_type: FRAME_TYPE.to_string(),
        name: name.to_string(),
        width: viewport.width,
        height: viewport.height,
        image_a: FrameArtifacts::relative(IMAGE_A),
        image_b: FrameArtifacts::relative(IMAGE_B),
        diff_image: FrameArtifacts::relative(DIFF_IMAGE),
        mismatch_percent,
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        engine: engine.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn serializes_with_snake_case_keys() {
        let report = assemble_report(
            "S1",
            "F1",
            "Home",
            Viewport {
                width: 100,
                height: 50,
            },
            12.5,
            &EngineInfo::default(),
        );
        let value: serde_json::Value =
            serde_json::from_str(&report.to_json().expect("json")).expect("parse");

        assert_eq!(value["sample_id"], "S1");
        assert_eq!(value["frame_id"], "F1");
        assert_eq!(value["type"], "FRAME");
        assert_eq!(value["width"], 100);
        assert_eq!(value["height"], 50);
        assert_eq!(value["image_a"], "./a.png");
        assert_eq!(value["image_b"], "./b.png");
        assert_eq!(value["diff_image"], "./diff.png");
        assert_eq!(value["mismatch_percent"], 12.5);
        assert_eq!(value["engine"]["name"], "dcov-htmlcss");
    }

    #[test]
    fn generated_at_is_rfc3339() {
        let report = assemble_report(
            "S1",
            "F1",
            "Home",
            Viewport {
                width: 1,
                height: 1,
            },
            0.0,
            &EngineInfo::default(),
        );
        assert!(DateTime::parse_from_rfc3339(&report.generated_at).is_ok());
        assert!(report.generated_at.ends_with('Z'));
    }

    #[test]
    fn partial_engine_override_keeps_defaults() {
        let engine: EngineInfo = serde_json::from_str(r#"{"name":"x"}"#).expect("parse");
        assert_eq!(engine.name, "x");
        assert_eq!(engine.framework, "preview");
    }

    #[test]
    fn report_round_trips_through_json() {
        let report = assemble_report(
            "S1",
            "1:2",
            "About",
            Viewport {
                width: 3,
                height: 4,
            },
            1.25,
            &EngineInfo::default(),
        );
        let parsed: Report =
            serde_json::from_str(&report.to_json().expect("json")).expect("parse");
        assert_eq!(parsed, report);
    }
}
