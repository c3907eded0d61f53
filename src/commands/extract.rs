use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::model::{AdTrack, AudioClip};
use crate::util::write_json_pretty;

/// Row shape of the master AD export. Columns the extract does not use are
/// ignored by name.
#[derive(Debug, Deserialize)]
struct ExportRow {
    youtube_id: String,
    audio_description_id: String,
    audio_clip_start_time: String,
    audio_clip_end_time: String,
    audio_clip_playback_type: String,
    audio_clip_transcript: String,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let mut reader = csv::Reader::from_path(&args.csv_path)
        .with_context(|| format!("failed to open {}", args.csv_path.display()))?;

    let clips = collect_clips(&mut reader, &args.video_id, &args.audio_description_id)
        .with_context(|| format!("failed to extract clips from {}", args.csv_path.display()))?;

    if clips.is_empty() {
        warn!(
            video_id = %args.video_id,
            audio_description_id = %args.audio_description_id,
            "no audio clips matched"
        );
    }

    let output_path = args.output_path.clone().unwrap_or_else(|| default_output_path(&args));
    let track = AdTrack {
        dialogue_timestamps: Vec::new(),
        audio_clips: clips,
    };

    write_json_pretty(&output_path, &track)?;

    info!(
        path = %output_path.display(),
        clip_count = track.audio_clips.len(),
        "wrote audio clip transcript"
    );

    Ok(())
}

fn default_output_path(args: &ExtractArgs) -> PathBuf {
    args.videos_root.join(&args.video_id).join(format!(
        "human_{}_{}.json",
        args.video_id, args.audio_description_id
    ))
}

fn collect_clips<R: io::Read>(
    reader: &mut csv::Reader<R>,
    video_id: &str,
    audio_description_id: &str,
) -> Result<Vec<AudioClip>> {
    let mut clips = Vec::new();

    for (index, row) in reader.deserialize::<ExportRow>().enumerate() {
        let line = index + 2; // header occupies line 1
        let row = row.with_context(|| format!("failed to parse csv row at line {line}"))?;

        if row.youtube_id != video_id || row.audio_description_id != audio_description_id {
            continue;
        }

        let start_time = parse_seconds(&row.audio_clip_start_time)
            .with_context(|| format!("invalid audio_clip_start_time at line {line}"))?;
        let end_time = parse_seconds(&row.audio_clip_end_time)
            .with_context(|| format!("invalid audio_clip_end_time at line {line}"))?;

        clips.push(AudioClip {
            start_time,
            end_time: Some(end_time),
            clip_type: None,
            description_style: row.audio_clip_playback_type,
            text: row.audio_clip_transcript,
        });
    }

    clips.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    Ok(clips)
}

fn parse_seconds(raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .with_context(|| format!("not a number of seconds: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "youtube_id,audio_description_id,audio_clip_start_time,audio_clip_end_time,audio_clip_playback_type,audio_clip_transcript\n";

    fn reader_for(rows: &str) -> csv::Reader<&[u8]> {
        csv::Reader::from_reader(rows.as_bytes())
    }

    #[test]
    fn collect_clips_filters_on_both_ids_and_sorts_by_start() {
        let data = format!(
            "{HEADER}\
             vid1,ad1,12.5,14.0,inline,A door opens.\n\
             vid1,ad2,1.0,2.0,inline,Wrong track.\n\
             vid2,ad1,3.0,4.0,inline,Wrong video.\n\
             vid1,ad1,2.25,5.75,extended,Opening titles over a city skyline.\n"
        );

        let mut reader = reader_for(&data);
        let clips = collect_clips(&mut reader, "vid1", "ad1").unwrap();

        assert_eq!(clips.len(), 2);
        assert_eq!(clips[0].start_time, 2.25);
        assert_eq!(clips[0].description_style, "extended");
        assert_eq!(clips[1].start_time, 12.5);
        assert_eq!(clips[1].end_time, Some(14.0));
        assert!(clips.iter().all(|clip| clip.clip_type.is_none()));
    }

    #[test]
    fn collect_clips_fails_on_unparsable_start_time() {
        let data = format!("{HEADER}vid1,ad1,not-a-number,14.0,inline,Broken row.\n");

        let mut reader = reader_for(&data);
        let result = collect_clips(&mut reader, "vid1", "ad1");
        assert!(result.is_err());
    }

    #[test]
    fn collect_clips_returns_empty_for_unmatched_ids() {
        let data = format!("{HEADER}vid1,ad1,1.0,2.0,inline,Only row.\n");

        let mut reader = reader_for(&data);
        let clips = collect_clips(&mut reader, "vid9", "ad9").unwrap();
        assert!(clips.is_empty());
    }
}
