use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One audio description narration cue.
///
/// Two file shapes share this type: transcript extracts carry `end_time`,
/// prepared track files instead tag clips with `type: "Visual"`. Absent
/// fields are omitted on serialization so both shapes round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioClip {
    pub start_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub clip_type: Option<String>,
    pub description_style: String,
    pub text: String,
}

/// One span of original dialogue the narration must not overlap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueWindow {
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub sequence_num: u32,
}

/// The judge input for one video: dialogue timing plus the AD clip list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdTrack {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dialogue_timestamps: Vec<DialogueWindow>,
    pub audio_clips: Vec<AudioClip>,
}

/// The judge output for one video/track pair.
///
/// Criterion keys are whatever the judge emitted; casing and naming vary
/// across records and are preserved verbatim. The map is ordered so
/// re-serialization is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub evaluation_summary: EvaluationSummary,
    #[serde(default)]
    pub criteria_ratings: BTreeMap<String, CriterionRating>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvaluationSummary {
    #[serde(default)]
    pub overall_quality_rating: String,
    #[serde(default)]
    pub strengths: String,
    #[serde(default)]
    pub areas_for_improvement: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionRating {
    pub rating: String,
    #[serde(default)]
    pub justification: String,
}

/// Ratings are string-encoded digits. Returns the numeric value only when
/// the text parses and lands in the 1-5 scale.
pub fn parse_rating(raw: &str) -> Option<u8> {
    let value = raw.trim().parse::<u8>().ok()?;
    (1..=5).contains(&value).then_some(value)
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceHash {
    pub filename: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffprobe: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluatePaths {
    pub video_folder: String,
    pub video_path: String,
    pub input_path: String,
    pub output_path: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluateCounts {
    pub attempt_count: usize,
    pub chunk_count: usize,
    pub prompt_chars: usize,
    pub response_chars: usize,
    pub dialogue_window_count: usize,
    pub audio_clip_count: usize,
    pub criteria_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluateRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub judge: String,
    pub model: String,
    pub input_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_versions: Option<ToolVersions>,
    pub paths: EvaluatePaths,
    pub counts: EvaluateCounts,
    pub source_hashes: Vec<SourceHash>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}

/// Lenient view of a run manifest for status reporting. Every field is
/// optional so older or foreign manifests still load.
#[derive(Debug, Clone, Deserialize)]
pub struct RunManifestSummary {
    pub run_id: Option<String>,
    pub status: Option<String>,
    pub judge: Option<String>,
    pub model: Option<String>,
    pub input_type: Option<String>,
    pub started_at: Option<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rating_accepts_scale_values() {
        assert_eq!(parse_rating("1"), Some(1));
        assert_eq!(parse_rating("5"), Some(5));
        assert_eq!(parse_rating(" 4 "), Some(4));
    }

    #[test]
    fn parse_rating_rejects_out_of_scale_values() {
        assert_eq!(parse_rating("0"), None);
        assert_eq!(parse_rating("6"), None);
        assert_eq!(parse_rating("excellent"), None);
        assert_eq!(parse_rating(""), None);
    }

    #[test]
    fn evaluation_preserves_criterion_key_variants() {
        let raw = r#"{
            "evaluation_summary": {
                "overall_quality_rating": "4",
                "strengths": "Accurate text reading.",
                "areas_for_improvement": "Trim overlap at 01:12."
            },
            "criteria_ratings": {
                "Reads Text-on-Screen": { "rating": "5", "justification": "no on-screen text present." },
                "reads_text_on_screen": { "rating": "4", "justification": "Signs are read promptly." },
                "track_placement": { "rating": "3", "justification": "One clash with dialogue." }
            }
        }"#;

        let evaluation: Evaluation = serde_json::from_str(raw).unwrap();
        assert_eq!(evaluation.criteria_ratings.len(), 3);
        assert!(evaluation.criteria_ratings.contains_key("Reads Text-on-Screen"));
        assert!(evaluation.criteria_ratings.contains_key("reads_text_on_screen"));

        let rendered = serde_json::to_string(&evaluation).unwrap();
        assert!(rendered.contains("Reads Text-on-Screen"));
        assert!(rendered.contains("reads_text_on_screen"));
    }

    #[test]
    fn evaluation_tolerates_missing_summary_fields() {
        let raw = r#"{
            "evaluation_summary": { "overall_quality_rating": "2" }
        }"#;

        let evaluation: Evaluation = serde_json::from_str(raw).unwrap();
        assert_eq!(evaluation.evaluation_summary.overall_quality_rating, "2");
        assert!(evaluation.evaluation_summary.strengths.is_empty());
        assert!(evaluation.criteria_ratings.is_empty());
    }

    #[test]
    fn extract_shaped_track_omits_empty_dialogue_section() {
        let track = AdTrack {
            dialogue_timestamps: Vec::new(),
            audio_clips: vec![AudioClip {
                start_time: 3.5,
                end_time: Some(6.1),
                clip_type: None,
                description_style: "inline".to_string(),
                text: "A woman waves.".to_string(),
            }],
        };

        let rendered = serde_json::to_string(&track).unwrap();
        assert!(!rendered.contains("dialogue_timestamps"));
        assert!(!rendered.contains("\"type\""));
        assert!(rendered.contains("end_time"));
    }

    #[test]
    fn prepared_track_round_trips_clip_type() {
        let raw = r#"{
            "dialogue_timestamps": [
                { "start_time": 0.4, "end_time": 2.1, "duration": 1.8, "sequence_num": 1 }
            ],
            "audio_clips": [
                { "start_time": 2.4, "type": "Visual", "description_style": "extended", "text": "Title card." }
            ]
        }"#;

        let track: AdTrack = serde_json::from_str(raw).unwrap();
        assert_eq!(track.dialogue_timestamps.len(), 1);
        assert_eq!(track.audio_clips[0].clip_type.as_deref(), Some("Visual"));
        assert_eq!(track.audio_clips[0].end_time, None);

        let rendered = serde_json::to_string(&track).unwrap();
        assert!(rendered.contains("\"type\":\"Visual\""));
        assert!(rendered.contains("\"sequence_num\":1"));
    }
}
