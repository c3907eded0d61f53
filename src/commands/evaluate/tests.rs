use std::cell::RefCell;
use std::path::Path;
use std::time::Duration;

use anyhow::anyhow;

use super::judge::{Judge, JudgeResponse, evaluate_with_retry};
use super::response::{extract_json_object, parse_evaluation};
use super::run::quality_warnings;
use super::{prompt, response};
use crate::model::parse_rating;

/// Scripted judge for exercising the retry wrapper without a network.
struct FakeJudge {
    outcomes: RefCell<Vec<Result<String, String>>>,
    calls: RefCell<usize>,
}

impl FakeJudge {
    fn new(outcomes: Vec<Result<String, String>>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes),
            calls: RefCell::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl Judge for FakeJudge {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn model(&self) -> &str {
        "fake-model"
    }

    fn evaluate(&self, _video_path: &Path, _prompt: &str) -> anyhow::Result<JudgeResponse> {
        *self.calls.borrow_mut() += 1;
        let mut outcomes = self.outcomes.borrow_mut();
        match outcomes.remove(0) {
            Ok(text) => Ok(JudgeResponse {
                text,
                chunk_count: 1,
            }),
            Err(message) => Err(anyhow!(message)),
        }
    }
}

const SAMPLE_EVALUATION: &str = r#"{
    "evaluation_summary": {
        "overall_quality_rating": "4",
        "strengths": "Concise, well-placed inline descriptions.",
        "areas_for_improvement": "The closing credits are never read."
    },
    "criteria_ratings": {
        "reads_text_on_screen": { "rating": "3", "justification": "Misses the street sign at 00:42." },
        "inline_track_quality": { "rating": "5", "justification": "Fits pauses cleanly." },
        "track_placement": { "rating": "4", "justification": "One overlap with music." }
    }
}"#;

#[test]
fn extract_json_object_strips_fences() {
    let wrapped = format!("```json\n{SAMPLE_EVALUATION}\n```");
    let cleaned = extract_json_object(&wrapped);
    assert!(cleaned.starts_with('{'));
    assert!(cleaned.ends_with('}'));
    assert!(!cleaned.contains("```"));
}

#[test]
fn extract_json_object_slices_out_surrounding_prose() {
    let wrapped = format!("Here is my evaluation:\n{SAMPLE_EVALUATION}\nHope that helps!");
    let cleaned = extract_json_object(&wrapped);
    assert!(cleaned.starts_with('{'));
    assert!(cleaned.ends_with('}'));
    assert!(!cleaned.contains("Hope that helps"));
}

#[test]
fn parse_evaluation_reads_a_clean_record() {
    let evaluation = parse_evaluation(SAMPLE_EVALUATION).unwrap();
    assert_eq!(evaluation.evaluation_summary.overall_quality_rating, "4");
    assert_eq!(evaluation.criteria_ratings.len(), 3);
    assert_eq!(
        evaluation.criteria_ratings["inline_track_quality"].rating,
        "5"
    );
}

#[test]
fn parse_evaluation_normalizes_numeric_ratings() {
    let raw = r#"{
        "evaluation_summary": { "overall_quality_rating": 4, "strengths": "ok", "areas_for_improvement": "" },
        "criteria_ratings": {
            "track_placement": { "rating": 5, "justification": "well timed" }
        }
    }"#;

    let evaluation = parse_evaluation(raw).unwrap();
    assert_eq!(evaluation.evaluation_summary.overall_quality_rating, "4");
    assert_eq!(evaluation.criteria_ratings["track_placement"].rating, "5");
    assert_eq!(parse_rating("4"), Some(4));
}

#[test]
fn parse_evaluation_rejects_prose_without_json() {
    assert!(parse_evaluation("I could not watch the video, sorry.").is_err());
    assert!(parse_evaluation("").is_err());
}

#[test]
fn parse_evaluation_requires_a_summary_section() {
    let raw = r#"{ "criteria_ratings": { "track_placement": { "rating": "4", "justification": "x" } } }"#;
    assert!(parse_evaluation(raw).is_err());
}

#[test]
fn parse_evaluation_preserves_title_case_criterion_keys() {
    let raw = r#"{
        "evaluation_summary": { "overall_quality_rating": "5", "strengths": "", "areas_for_improvement": "" },
        "criteria_ratings": {
            "Reads Text-on-Screen": { "rating": "5", "justification": "no on-screen text present." }
        }
    }"#;

    let evaluation = parse_evaluation(raw).unwrap();
    assert!(evaluation.criteria_ratings.contains_key("Reads Text-on-Screen"));
}

#[test]
fn retry_returns_first_success_and_counts_attempts() {
    let judge = FakeJudge::new(vec![
        Err("transient failure".to_string()),
        Ok(SAMPLE_EVALUATION.to_string()),
    ]);

    let run = evaluate_with_retry(
        &judge,
        Path::new("videos/vid1/vid1.mp4"),
        "prompt",
        3,
        Duration::ZERO,
    )
    .unwrap();

    assert_eq!(run.attempt_count, 2);
    assert_eq!(judge.calls(), 2);
    assert!(response::parse_evaluation(&run.response.text).is_ok());
}

#[test]
fn retry_gives_up_after_max_attempts() {
    let judge = FakeJudge::new(vec![
        Err("boom".to_string()),
        Err("boom again".to_string()),
    ]);

    let result = evaluate_with_retry(
        &judge,
        Path::new("videos/vid1/vid1.mp4"),
        "prompt",
        2,
        Duration::ZERO,
    );

    assert!(result.is_err());
    assert_eq!(judge.calls(), 2);
}

#[test]
fn prompt_embeds_track_json_and_rubric() {
    let track_json = r#"{ "audio_clips": [] }"#;
    let built = prompt::build_prompt(track_json);

    assert!(built.contains(track_json));
    assert!(!built.contains("{json_data}"));
    assert!(built.contains("Reads Text-on-Screen"));
    assert!(built.contains("Track Placement"));
    assert!(built.contains("single, valid JSON object"));
}

#[test]
fn quality_warnings_flag_bad_ratings_and_empty_criteria() {
    let empty = parse_evaluation(
        r#"{ "evaluation_summary": { "overall_quality_rating": "9" } }"#,
    )
    .unwrap();
    let warnings = quality_warnings(&empty);

    assert_eq!(warnings.len(), 2);
    assert!(warnings[0].contains("overall_quality_rating"));
    assert!(warnings[1].contains("criteria_ratings is empty"));

    let clean = parse_evaluation(SAMPLE_EVALUATION).unwrap();
    assert!(quality_warnings(&clean).is_empty());
}
