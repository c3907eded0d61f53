//! Cleanup and parsing of judge output.
//!
//! Models wrap the requested JSON in code fences or prose often enough that
//! a direct parse is only the first attempt. The fallback pass accepts
//! numeric ratings and fills missing text fields so a usable record still
//! comes out; a response with no evaluation object at all is an error.

use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};
use serde_json::Value;

use crate::model::{CriterionRating, Evaluation, EvaluationSummary};

pub fn parse_evaluation(raw: &str) -> Result<Evaluation> {
    if raw.trim().is_empty() {
        bail!("judge returned an empty response");
    }

    let cleaned = extract_json_object(raw);

    if let Ok(evaluation) = serde_json::from_str::<Evaluation>(&cleaned) {
        return Ok(evaluation);
    }

    let value: Value =
        serde_json::from_str(&cleaned).context("judge response is not valid json")?;
    evaluation_from_value(&value)
}

/// Strips code fences and slices out the outermost `{...}`. Returns the
/// stripped text unchanged when no braces are present so the parse error
/// points at what the model actually said.
pub fn extract_json_object(raw: &str) -> String {
    let stripped = raw.replace("```json", "").replace("```", "");
    let stripped = stripped.trim();

    match (stripped.find('{'), stripped.rfind('}')) {
        (Some(start), Some(end)) if start < end => stripped[start..=end].to_string(),
        _ => stripped.to_string(),
    }
}

fn evaluation_from_value(value: &Value) -> Result<Evaluation> {
    let object = value
        .as_object()
        .context("judge response is not a json object")?;
    let summary_value = object
        .get("evaluation_summary")
        .context("judge response is missing evaluation_summary")?;

    let evaluation_summary = EvaluationSummary {
        overall_quality_rating: rating_text(summary_value.get("overall_quality_rating"))
            .unwrap_or_default(),
        strengths: text_field(summary_value.get("strengths")),
        areas_for_improvement: text_field(summary_value.get("areas_for_improvement")),
    };

    let mut criteria_ratings = BTreeMap::new();
    if let Some(criteria) = object.get("criteria_ratings").and_then(Value::as_object) {
        for (name, entry) in criteria {
            criteria_ratings.insert(
                name.clone(),
                CriterionRating {
                    rating: rating_text(entry.get("rating")).unwrap_or_default(),
                    justification: text_field(entry.get("justification")),
                },
            );
        }
    }

    Ok(Evaluation {
        evaluation_summary,
        criteria_ratings,
    })
}

/// Ratings come back as `"4"` or `4` depending on the model's mood; both
/// normalize to the string encoding the record format uses.
fn rating_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn text_field(value: Option<&Value>) -> String {
    value
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
