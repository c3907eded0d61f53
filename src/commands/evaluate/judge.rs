use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tracing::warn;

/// A vision judge that scores an audio description track against its video.
pub trait Judge {
    fn name(&self) -> &'static str;
    fn model(&self) -> &str;
    fn evaluate(&self, video_path: &Path, prompt: &str) -> Result<JudgeResponse>;
}

pub struct JudgeResponse {
    /// Raw model output; cleaned and parsed by the caller.
    pub text: String,
    /// Video chunks inspected. Single-call judges report 1.
    pub chunk_count: usize,
}

pub struct JudgeRun {
    pub response: JudgeResponse,
    pub attempt_count: usize,
}

/// Retries a judge with linear backoff (`backoff_base` x attempt number).
pub fn evaluate_with_retry(
    judge: &dyn Judge,
    video_path: &Path,
    prompt: &str,
    max_attempts: usize,
    backoff_base: Duration,
) -> Result<JudgeRun> {
    let max_attempts = max_attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=max_attempts {
        match judge.evaluate(video_path, prompt) {
            Ok(response) => {
                return Ok(JudgeRun {
                    response,
                    attempt_count: attempt,
                });
            }
            Err(err) => {
                warn!(
                    judge = judge.name(),
                    attempt,
                    max_attempts,
                    error = %err,
                    "judge request failed"
                );
                last_error = Some(err);
                if attempt < max_attempts {
                    thread::sleep(backoff_base * attempt as u32);
                }
            }
        }
    }

    Err(last_error
        .unwrap_or_else(|| anyhow!("judge produced no response"))
        .context(format!("judge failed after {max_attempts} attempts")))
}
