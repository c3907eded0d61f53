use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::cli::{EvaluateArgs, JudgeKind};
use crate::model::{
    AdTrack, Evaluation, EvaluateCounts, EvaluatePaths, EvaluateRunManifest, SourceHash,
    ToolVersions, parse_rating,
};
use crate::util::{
    now_utc_string, read_json, sha256_file, trailing_path_component, utc_compact_string,
    write_json_pretty,
};

use super::judge::{self, Judge};
use super::{gemini, local, media, prompt, response};

const MANIFEST_VERSION: u32 = 1;
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

pub fn run(args: EvaluateArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let video_id = trailing_path_component(&args.video_folder)?;
    let video_path = args.video_folder.join(format!("{video_id}.mp4"));
    let input_path = args
        .video_folder
        .join(format!("final_data_{}.json", args.input_type));

    if !video_path.is_file() {
        bail!("missing video file: {}", video_path.display());
    }
    if !input_path.is_file() {
        bail!("missing audio description data: {}", input_path.display());
    }

    let judge = build_judge(&args)?;

    info!(
        run_id = %run_id,
        video = %video_path.display(),
        input = %input_path.display(),
        judge = judge.name(),
        model = judge.model(),
        "starting evaluation"
    );

    let track: AdTrack = read_json(&input_path)?;
    let track_json =
        serde_json::to_string_pretty(&track).context("failed to render audio description data")?;
    let full_prompt = prompt::build_prompt(&track_json);

    let judge_run = judge::evaluate_with_retry(
        judge.as_ref(),
        &video_path,
        &full_prompt,
        args.max_attempts,
        RETRY_BACKOFF,
    )?;

    let evaluation = match response::parse_evaluation(&judge_run.response.text) {
        Ok(evaluation) => evaluation,
        Err(err) => {
            let debug_path = args.video_folder.join("debug_raw_response.txt");
            fs::write(&debug_path, &judge_run.response.text)
                .with_context(|| format!("failed to write {}", debug_path.display()))?;
            warn!(path = %debug_path.display(), "saved raw judge response for debugging");
            return Err(err);
        }
    };

    let warnings = quality_warnings(&evaluation);
    for warning in &warnings {
        warn!(warning = %warning, "evaluation quality warning");
    }

    let output_path = args.output_path.clone().unwrap_or_else(|| {
        args.video_folder
            .join(format!("{}_evaluate_{}.json", judge.name(), args.input_type))
    });
    write_json_pretty(&output_path, &evaluation)?;

    let manifest_path = args.manifest_path.clone().unwrap_or_else(|| {
        args.video_folder
            .join("manifests")
            .join(format!("evaluate_run_{}.json", utc_compact_string(started_ts)))
    });

    let manifest = EvaluateRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id: run_id.clone(),
        status: "completed".to_string(),
        started_at,
        updated_at: now_utc_string(),
        command: render_evaluate_command(&args),
        judge: judge.name().to_string(),
        model: judge.model().to_string(),
        input_type: args.input_type.clone(),
        tool_versions: collect_tool_versions(args.judge),
        paths: EvaluatePaths {
            video_folder: args.video_folder.display().to_string(),
            video_path: video_path.display().to_string(),
            input_path: input_path.display().to_string(),
            output_path: output_path.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        counts: EvaluateCounts {
            attempt_count: judge_run.attempt_count,
            chunk_count: judge_run.response.chunk_count,
            prompt_chars: full_prompt.chars().count(),
            response_chars: judge_run.response.text.chars().count(),
            dialogue_window_count: track.dialogue_timestamps.len(),
            audio_clip_count: track.audio_clips.len(),
            criteria_count: evaluation.criteria_ratings.len(),
        },
        source_hashes: vec![
            source_hash(&video_path)?,
            source_hash(&input_path)?,
        ],
        warnings,
        notes: vec![
            "Evaluation uses the five-criterion audio description rubric.".to_string(),
            "Ratings are recorded as strings; out-of-range values are surfaced as warnings only."
                .to_string(),
        ],
    };

    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote evaluate run manifest");

    info!(
        path = %output_path.display(),
        overall = %evaluation.evaluation_summary.overall_quality_rating,
        criteria_count = evaluation.criteria_ratings.len(),
        "evaluation completed"
    );

    Ok(())
}

fn build_judge(args: &EvaluateArgs) -> Result<Box<dyn Judge>> {
    match args.judge {
        JudgeKind::Gemini => {
            let api_key = std::env::var(gemini::API_KEY_ENV)
                .with_context(|| format!("{} environment variable not found", gemini::API_KEY_ENV))?;
            let model = args
                .model
                .clone()
                .unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string());

            Ok(Box::new(gemini::GeminiJudge::new(
                api_key,
                model,
                args.temperature,
                args.max_output_tokens,
                args.timeout_secs,
            )?))
        }
        JudgeKind::Local => {
            let model = args
                .model
                .clone()
                .unwrap_or_else(|| local::DEFAULT_MODEL.to_string());

            Ok(Box::new(local::LocalJudge::new(
                args.endpoint.clone(),
                model,
                args.temperature,
                args.chunk_seconds,
                args.max_frames_per_chunk,
                args.timeout_secs,
            )?))
        }
    }
}

/// Structural oddities in an otherwise-parsed record. None of these fail
/// the run; they are recorded in the manifest for the consumer.
pub fn quality_warnings(evaluation: &Evaluation) -> Vec<String> {
    let mut warnings = Vec::new();

    let overall = &evaluation.evaluation_summary.overall_quality_rating;
    if parse_rating(overall).is_none() {
        warnings.push(format!(
            "overall_quality_rating {overall:?} does not parse as an integer in 1..=5"
        ));
    }

    if evaluation.criteria_ratings.is_empty() {
        warnings.push("criteria_ratings is empty".to_string());
    }

    for (name, criterion) in &evaluation.criteria_ratings {
        if parse_rating(&criterion.rating).is_none() {
            warnings.push(format!(
                "criterion {name:?} rating {:?} does not parse as an integer in 1..=5",
                criterion.rating
            ));
        }
    }

    warnings
}

fn collect_tool_versions(judge: JudgeKind) -> Option<ToolVersions> {
    if judge != JudgeKind::Local {
        return None;
    }

    Some(ToolVersions {
        ffmpeg: media::tool_version("ffmpeg").ok(),
        ffprobe: media::tool_version("ffprobe").ok(),
    })
}

fn source_hash(path: &Path) -> Result<SourceHash> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

    Ok(SourceHash {
        filename,
        sha256: sha256_file(path)?,
    })
}

fn render_evaluate_command(args: &EvaluateArgs) -> String {
    let mut command = vec![
        "adeval".to_string(),
        "evaluate".to_string(),
        "--video-folder".to_string(),
        args.video_folder.display().to_string(),
        "--input-type".to_string(),
        args.input_type.clone(),
        "--judge".to_string(),
        args.judge.as_str().to_string(),
    ];

    if let Some(model) = &args.model {
        command.push("--model".to_string());
        command.push(model.clone());
    }
    if args.judge == JudgeKind::Local {
        command.push("--endpoint".to_string());
        command.push(args.endpoint.clone());
    }

    command.join(" ")
}
