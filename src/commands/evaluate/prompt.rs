//! The judge prompt. The wording is load-bearing: downstream consumers
//! expect the exact record shape spelled out in the OUTPUT FORMAT block.

pub const SYSTEM_INSTRUCTION: &str = "You are an expert Accessibility Consultant specializing in \
the quality assurance of audio description (AD) for video content.";

const EVALUATION_TEMPLATE: &str = r#"ROLE:
You are an expert content evaluator specializing in audio descriptions.

INPUT:
A video.
JSON data with original dialog timing and the audio description track:
{json_data}

SCALE (1-5):
1 = very poor, 2 = poor, 3 = acceptable, 4 = good, 5 = exemplary.

CATEGORIES & CRITERIA:
Reads Text-on-Screen: Captures visible text accurately and at the right time. (If there is no on-screen text in the video, score = 5 with justification "no on-screen text present.")
Inline Track Quality: Effectiveness of short ADs placed during natural pauses. (Inline ADs are preferred over extended ones when they can convey the same info.)
Extended Track Quality: Effectiveness of longer ADs inserted into pauses or gaps.
Balance of Inline and Extended: Optimal mix of brief (preferred) and in-depth AD.
Track Placement: Narration is well-timed and does not overlap original video dialog or music.

OUTPUT FORMAT:
You MUST return your response as a single, valid JSON object. Do not include any text, notes, or markdown formatting before or after the JSON block.
The JSON object should have the following structure:
{
  "evaluation_summary": {
    "overall_quality_rating": "A rating from 1 to 5, where 1 is poor and 5 is excellent.",
    "strengths": "A brief summary of what was done well.",
    "areas_for_improvement": "A brief summary of what could be improved."
  },
  "criteria_ratings": {
    "reads_text_on_screen": { "rating": "1-5", "justification": "..." },
    "inline_track_quality": { "rating": "1-5", "justification": "..." },
    "extended_track_quality": { "rating": "1-5", "justification": "..." },
    "balance_of_inline_and_extended": { "rating": "1-5", "justification": "..." },
    "track_placement": { "rating": "1-5", "justification": "..." }
  }
}
"#;

pub fn build_prompt(track_json: &str) -> String {
    EVALUATION_TEMPLATE.replace("{json_data}", track_json)
}
