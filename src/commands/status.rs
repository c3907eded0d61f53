use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::model::{AdTrack, Evaluation, RunManifestSummary, parse_rating};
use crate::util::{read_json, trailing_path_component};

pub fn run(args: StatusArgs) -> Result<()> {
    let video_id = trailing_path_component(&args.video_folder)?;

    info!(
        video_folder = %args.video_folder.display(),
        video_id = %video_id,
        "status requested"
    );

    let video_path = args.video_folder.join(format!("{video_id}.mp4"));
    if video_path.is_file() {
        info!(path = %video_path.display(), "video file present");
    } else {
        warn!(path = %video_path.display(), "video file missing");
    }

    let evaluation_pattern = Regex::new(r"^([A-Za-z0-9]+)_evaluate_(.+)\.json$")
        .context("failed to compile evaluation filename regex")?;

    let mut track_count = 0_usize;
    let mut evaluation_count = 0_usize;

    for name in folder_file_names(&args.video_folder)? {
        let path = args.video_folder.join(&name);

        if is_track_file(&name, &video_id) {
            track_count += 1;
            report_track(&path);
            continue;
        }

        if let Some(captures) = evaluation_pattern.captures(&name) {
            evaluation_count += 1;
            let judge = captures.get(1).map_or("", |m| m.as_str());
            let input_type = captures.get(2).map_or("", |m| m.as_str());
            report_evaluation(&path, judge, input_type);
        }
    }

    if track_count == 0 {
        warn!("no audio description track files found");
    }
    if evaluation_count == 0 {
        warn!("no evaluation records found");
    }

    report_latest_manifest(&args.video_folder.join("manifests"));

    info!(
        track_count,
        evaluation_count,
        "status completed"
    );

    Ok(())
}

fn folder_file_names(folder: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();

    let entries =
        fs::read_dir(folder).with_context(|| format!("failed to read {}", folder.display()))?;
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", folder.display()))?;
        if !entry
            .file_type()
            .with_context(|| format!("failed to inspect {}", entry.path().display()))?
            .is_file()
        {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }

    names.sort();
    Ok(names)
}

fn is_track_file(name: &str, video_id: &str) -> bool {
    if name == format!("human_{video_id}_output.json") {
        return true;
    }
    name.starts_with("final_data_") && name.ends_with(".json")
}

fn report_track(path: &Path) {
    match read_json::<AdTrack>(path) {
        Ok(track) => info!(
            path = %path.display(),
            clip_count = track.audio_clips.len(),
            dialogue_window_count = track.dialogue_timestamps.len(),
            "loaded audio description track"
        ),
        Err(err) => warn!(path = %path.display(), error = %err, "unreadable track file"),
    }
}

fn report_evaluation(path: &Path, judge: &str, input_type: &str) {
    let evaluation: Evaluation = match read_json(path) {
        Ok(evaluation) => evaluation,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "unreadable evaluation record");
            return;
        }
    };

    let overall = &evaluation.evaluation_summary.overall_quality_rating;
    info!(
        path = %path.display(),
        judge,
        input_type,
        overall_quality_rating = %overall,
        criteria_count = evaluation.criteria_ratings.len(),
        "loaded evaluation record"
    );

    if parse_rating(overall).is_none() {
        warn!(
            path = %path.display(),
            rating = %overall,
            "overall rating outside the 1-5 scale"
        );
    }
    for (name, criterion) in &evaluation.criteria_ratings {
        if parse_rating(&criterion.rating).is_none() {
            warn!(
                path = %path.display(),
                criterion = %name,
                rating = %criterion.rating,
                "criterion rating outside the 1-5 scale"
            );
        }
    }
    if evaluation.criteria_ratings.is_empty() {
        warn!(path = %path.display(), "evaluation has no criteria ratings");
    }
}

fn report_latest_manifest(manifest_dir: &Path) {
    let Some(path) = latest_run_manifest(manifest_dir) else {
        warn!(path = %manifest_dir.display(), "no evaluate run manifests found");
        return;
    };

    match read_json::<RunManifestSummary>(&path) {
        Ok(manifest) => info!(
            path = %path.display(),
            run_id = %manifest.run_id.unwrap_or_default(),
            status = %manifest.status.unwrap_or_default(),
            judge = %manifest.judge.unwrap_or_default(),
            model = %manifest.model.unwrap_or_default(),
            input_type = %manifest.input_type.unwrap_or_default(),
            started_at = %manifest.started_at.unwrap_or_default(),
            warning_count = manifest.warnings.len(),
            "loaded latest evaluate run manifest"
        ),
        Err(err) => warn!(path = %path.display(), error = %err, "unreadable run manifest"),
    }
}

/// Run manifests embed a sortable UTC timestamp in their filename, so the
/// lexicographically greatest name is the latest run.
fn latest_run_manifest(manifest_dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(manifest_dir).ok()?;

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().to_str().map(ToOwned::to_owned))
        .filter(|name| name.starts_with("evaluate_run_") && name.ends_with(".json"))
        .collect();

    names.sort();
    names.pop().map(|name| manifest_dir.join(name))
}
