//! Local judge: an Ollama-style endpoint serving a vision model. The video
//! is standardized, cut into chunks, and each chunk is shown to the model
//! as sampled frames alongside the full track JSON. The first chunk
//! response that parses into an evaluation wins.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::{Value, json};
use tracing::{info, warn};

use super::judge::{Judge, JudgeResponse};
use super::{media, response};

pub const DEFAULT_MODEL: &str = "qwen2.5vl:7b";

pub struct LocalJudge {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    temperature: f64,
    chunk_seconds: f64,
    max_frames_per_chunk: usize,
}

impl LocalJudge {
    pub fn new(
        endpoint: String,
        model: String,
        temperature: f64,
        chunk_seconds: f64,
        max_frames_per_chunk: usize,
        timeout_secs: u64,
    ) -> Result<Self> {
        if chunk_seconds <= 0.0 {
            bail!("chunk length must be positive, got {chunk_seconds}");
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            temperature,
            chunk_seconds,
            max_frames_per_chunk: max_frames_per_chunk.max(1),
        })
    }

    fn evaluate_chunks(&self, video_path: &Path, prompt: &str) -> Result<JudgeResponse> {
        let duration = media::probe_duration(video_path)?;
        if duration <= 0.0 {
            bail!("video has no measurable duration: {}", video_path.display());
        }

        let mut responses = Vec::new();
        let mut chunk_start = 0.0_f64;
        let mut chunk_index = 0_usize;

        while chunk_start < duration {
            let chunk_len = (duration - chunk_start).min(self.chunk_seconds);
            info!(
                chunk = chunk_index,
                start_secs = chunk_start,
                end_secs = chunk_start + chunk_len,
                "processing video chunk"
            );

            let chunk_path =
                video_path.with_file_name(format!("temp_chunk_{chunk_index}.mp4"));
            let outcome = self.evaluate_single_chunk(
                video_path, chunk_start, chunk_len, &chunk_path, prompt,
            );
            let _ = fs::remove_file(&chunk_path);

            match outcome {
                Ok(text) => responses.push(text),
                Err(err) => {
                    warn!(chunk = chunk_index, error = %err, "chunk evaluation failed")
                }
            }

            chunk_start += self.chunk_seconds;
            chunk_index += 1;
        }

        if responses.is_empty() {
            bail!("no chunk of {} produced a response", video_path.display());
        }

        Ok(JudgeResponse {
            text: pick_response(responses),
            chunk_count: chunk_index,
        })
    }

    fn evaluate_single_chunk(
        &self,
        video_path: &Path,
        start: f64,
        duration: f64,
        chunk_path: &Path,
        prompt: &str,
    ) -> Result<String> {
        media::cut_chunk(video_path, start, duration, chunk_path)?;

        let frames_dir = chunk_path.with_extension("frames");
        let result = self.query_with_frames(chunk_path, &frames_dir, prompt);
        let _ = fs::remove_dir_all(&frames_dir);
        result
    }

    fn query_with_frames(
        &self,
        chunk_path: &Path,
        frames_dir: &Path,
        prompt: &str,
    ) -> Result<String> {
        let frames = media::sample_frames(chunk_path, frames_dir, self.max_frames_per_chunk)?;

        let mut images = Vec::with_capacity(frames.len());
        for frame in &frames {
            let bytes =
                fs::read(frame).with_context(|| format!("failed to read {}", frame.display()))?;
            images.push(STANDARD.encode(bytes));
        }

        let body = json!({
            "model": self.model,
            "prompt": prompt,
            "images": images,
            "stream": false,
            "options": { "temperature": self.temperature }
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.endpoint))
            .json(&body)
            .send()
            .with_context(|| format!("request to {} failed", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("local judge returned {status}: {}", body.trim());
        }

        let payload: Value = response
            .json()
            .context("failed to parse local judge response")?;
        let text = payload
            .get("response")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if text.trim().is_empty() {
            bail!("local judge returned an empty response");
        }

        Ok(text.to_string())
    }
}

/// Every chunk saw the full track JSON, so any one response can stand for
/// the whole video. Prefer the first that parses into an evaluation.
fn pick_response(responses: Vec<String>) -> String {
    responses
        .iter()
        .position(|text| response::parse_evaluation(text).is_ok())
        .map(|index| responses[index].clone())
        .unwrap_or_else(|| responses[0].clone())
}

impl Judge for LocalJudge {
    fn name(&self) -> &'static str {
        "local"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn evaluate(&self, video_path: &Path, prompt: &str) -> Result<JudgeResponse> {
        if !media::is_available("ffmpeg") || !media::is_available("ffprobe") {
            bail!("local judge requires ffmpeg and ffprobe on PATH");
        }

        let standardized = media::standardize_video(video_path)?;
        let result = self.evaluate_chunks(&standardized, prompt);

        if standardized != video_path {
            cleanup_temp_video(&standardized);
        }

        result
    }
}

fn cleanup_temp_video(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %err, "could not remove standardized video");
    }
}
