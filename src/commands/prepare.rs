use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::StringRecord;
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::PrepareArgs;
use crate::model::{AdTrack, AudioClip, DialogueWindow};
use crate::util::{read_json, trailing_path_component, write_json_pretty};

/// Positional columns of the per-video AD export (no header row).
const COL_DESCRIPTION_STYLE: usize = 14;
const COL_START_TIME: usize = 15;
const COL_TEXT: usize = 18;

/// Trim applied to every stored dialogue end so back-to-back narration has
/// breathing room before the next line starts.
const END_TRIM_SECONDS: f64 = 0.1;

#[derive(Debug, Clone, Deserialize)]
struct Scene {
    #[serde(default)]
    start_time: f64,
    #[serde(default)]
    end_time: f64,
    #[serde(default)]
    transcript: Vec<TranscriptLine>,
}

#[derive(Debug, Clone, Deserialize)]
struct TranscriptLine {
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
}

pub fn run(args: PrepareArgs) -> Result<()> {
    let video_id = trailing_path_component(&args.video_folder)?;

    let csv_path = args
        .csv_path
        .clone()
        .unwrap_or_else(|| args.video_folder.join(format!("human_{video_id}.csv")));
    let scenes_path = args.scenes_path.clone().unwrap_or_else(|| {
        args.video_folder
            .join(format!("{video_id}_scenes"))
            .join("scene_info.json")
    });
    let output_path = default_output_path(&args, &video_id);

    let scenes: Vec<Scene> = read_json(&scenes_path)?;
    let dialogue_timestamps = build_dialogue_windows(&scenes, args.gap_threshold);
    info!(
        path = %scenes_path.display(),
        window_count = dialogue_timestamps.len(),
        "prepared dialogue windows"
    );

    let audio_clips = load_audio_clips(&csv_path)?;
    info!(
        path = %csv_path.display(),
        clip_count = audio_clips.len(),
        "parsed audio clips"
    );

    let track = AdTrack {
        dialogue_timestamps,
        audio_clips,
    };

    write_json_pretty(&output_path, &track)?;

    info!(
        path = %output_path.display(),
        window_count = track.dialogue_timestamps.len(),
        clip_count = track.audio_clips.len(),
        "wrote prepared audio description track"
    );

    Ok(())
}

fn default_output_path(args: &PrepareArgs, video_id: &str) -> PathBuf {
    args.output_path
        .clone()
        .unwrap_or_else(|| args.video_folder.join(format!("human_{video_id}_output.json")))
}

/// Flattens scene transcripts into absolute-time dialogue windows.
///
/// Lines that start within `gap_threshold` of the previous line's end while
/// a scene-boundary continuation is pending extend the previous window
/// instead of opening a new one. Stored end times are trimmed by
/// `END_TRIM_SECONDS`; durations are rounded to 2 decimals.
fn build_dialogue_windows(scenes: &[Scene], gap_threshold: f64) -> Vec<DialogueWindow> {
    let mut windows: Vec<DialogueWindow> = Vec::new();
    let mut sequence = 1_u32;
    let mut last_end: Option<f64> = None;
    let mut continuing = false;

    for scene in scenes {
        for line in &scene.transcript {
            let start = scene.start_time + line.start;
            let end = scene.start_time + line.end;

            let near_previous = last_end
                .map(|prev| (start - prev).abs() < gap_threshold)
                .unwrap_or(false);

            if near_previous && continuing {
                if let Some(window) = windows.last_mut() {
                    window.end_time = end - END_TRIM_SECONDS;
                    window.duration = round2(window.end_time - window.start_time);
                    continuing = false;
                    last_end = Some(end);
                    continue;
                }
            }

            windows.push(DialogueWindow {
                start_time: start,
                end_time: end - END_TRIM_SECONDS,
                duration: round2(end - start),
                sequence_num: sequence,
            });
            sequence += 1;

            continuing = end >= scene.end_time - gap_threshold;
            last_end = Some(end);
        }
    }

    windows
}

fn load_audio_clips(csv_path: &Path) -> Result<Vec<AudioClip>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut clips = Vec::new();

    for (index, record) in reader.records().enumerate() {
        let record =
            record.with_context(|| format!("failed to read csv row {}", index + 1))?;

        match clip_from_record(&record) {
            Some(clip) => clips.push(clip),
            None => warn!(row = index + 1, "skipping unparsable audio clip row"),
        }
    }

    clips.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    Ok(clips)
}

/// Some exports quote each full line into a single field; re-split those on
/// commas before indexing.
fn clip_from_record(record: &StringRecord) -> Option<AudioClip> {
    let fields: Vec<&str> = if record.len() == 1 {
        record.get(0)?.split(',').collect()
    } else {
        record.iter().collect()
    };

    let description_style = fields.get(COL_DESCRIPTION_STYLE)?.trim();
    let start_time = fields.get(COL_START_TIME)?.trim().parse::<f64>().ok()?;
    let text = fields.get(COL_TEXT)?.trim();

    Some(AudioClip {
        start_time,
        end_time: None,
        clip_type: Some("Visual".to_string()),
        description_style: description_style.to_string(),
        text: text.to_string(),
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
