//! Gemini judge: raw upload to the Files API, poll until the file is
//! active, then one generateContent call with the video attached.

use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use super::judge::{Judge, JudgeResponse};

pub const DEFAULT_MODEL: &str = "gemini-1.5-pro-latest";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const API_BASE: &str = "https://generativelanguage.googleapis.com";
const FILE_POLL_INTERVAL: Duration = Duration::from_secs(10);
const FILE_POLL_TIMEOUT: Duration = Duration::from_secs(600);

/// The judge has to be able to discuss arbitrary video content, so every
/// harm category is set to BLOCK_NONE.
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

pub struct GeminiJudge {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    temperature: f64,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct FileEnvelope {
    file: FileResource,
}

#[derive(Debug, Deserialize)]
struct FileResource {
    name: String,
    uri: String,
    #[serde(default)]
    state: String,
    #[serde(default, rename = "mimeType")]
    mime_type: String,
}

impl GeminiJudge {
    pub fn new(
        api_key: String,
        model: String,
        temperature: f64,
        max_output_tokens: u32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build http client")?;

        Ok(Self {
            client,
            api_key,
            model,
            temperature,
            max_output_tokens,
        })
    }

    fn upload_video(&self, video_path: &Path) -> Result<FileResource> {
        let bytes = fs::read(video_path)
            .with_context(|| format!("failed to read {}", video_path.display()))?;

        info!(
            path = %video_path.display(),
            bytes = bytes.len(),
            "uploading video to the files api"
        );

        let response = self
            .client
            .post(format!("{API_BASE}/upload/v1beta/files"))
            .query(&[("key", self.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "raw")
            .header(reqwest::header::CONTENT_TYPE, "video/mp4")
            .body(bytes)
            .send()
            .context("file upload request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("file upload failed with {status}: {}", body.trim());
        }

        let envelope: FileEnvelope = response
            .json()
            .context("failed to parse file upload response")?;
        Ok(envelope.file)
    }

    fn fetch_file(&self, name: &str) -> Result<FileResource> {
        let response = self
            .client
            .get(format!("{API_BASE}/v1beta/{name}"))
            .query(&[("key", self.api_key.as_str())])
            .send()
            .with_context(|| format!("failed to poll uploaded file {name}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("file poll for {name} failed with {status}: {}", body.trim());
        }

        response
            .json()
            .with_context(|| format!("failed to parse file state for {name}"))
    }

    fn wait_for_file_active(&self, mut file: FileResource) -> Result<FileResource> {
        let deadline = Instant::now() + FILE_POLL_TIMEOUT;

        while file.state == "PROCESSING" {
            if Instant::now() >= deadline {
                bail!("timed out waiting for uploaded file {} to leave PROCESSING", file.name);
            }
            debug!(name = %file.name, "uploaded file still processing");
            thread::sleep(FILE_POLL_INTERVAL);
            file = self.fetch_file(&file.name)?;
        }

        if file.state == "FAILED" {
            bail!("file processing failed for {}", file.name);
        }

        info!(name = %file.name, state = %file.state, "uploaded file is ready");
        Ok(file)
    }

    fn generate(&self, file: &FileResource, prompt: &str) -> Result<String> {
        let mime_type = if file.mime_type.is_empty() {
            "video/mp4"
        } else {
            file.mime_type.as_str()
        };

        let safety_settings: Vec<Value> = HARM_CATEGORIES
            .iter()
            .map(|category| json!({ "category": category, "threshold": "BLOCK_NONE" }))
            .collect();

        let body = json!({
            "systemInstruction": {
                "parts": [{ "text": super::prompt::SYSTEM_INSTRUCTION }]
            },
            "contents": [{
                "role": "user",
                "parts": [
                    { "text": prompt },
                    { "fileData": { "mimeType": mime_type, "fileUri": file.uri } }
                ]
            }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
                "responseMimeType": "application/json"
            },
            "safetySettings": safety_settings
        });

        let response = self
            .client
            .post(format!("{API_BASE}/v1beta/models/{}:generateContent", self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .context("generateContent request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            bail!("generateContent failed with {status}: {}", body.trim());
        }

        let payload: Value = response
            .json()
            .context("failed to parse generateContent response")?;
        extract_candidate_text(&payload)
    }
}

fn extract_candidate_text(payload: &Value) -> Result<String> {
    let parts = payload
        .get("candidates")
        .and_then(|candidates| candidates.get(0))
        .and_then(|candidate| candidate.get("content"))
        .and_then(|content| content.get("parts"))
        .and_then(Value::as_array)
        .context("generateContent response carried no candidate parts")?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("");

    if text.trim().is_empty() {
        bail!("model returned no text parts");
    }

    Ok(text)
}

impl Judge for GeminiJudge {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn evaluate(&self, video_path: &Path, prompt: &str) -> Result<JudgeResponse> {
        let uploaded = self.upload_video(video_path)?;
        let active = self.wait_for_file_active(uploaded)?;
        let text = self.generate(&active, prompt)?;

        Ok(JudgeResponse {
            text,
            chunk_count: 1,
        })
    }
}
