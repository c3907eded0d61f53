use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "adeval",
    version,
    about = "Local audio description extraction and evaluation tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Prepare(PrepareArgs),
    Evaluate(EvaluateArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(long)]
    pub csv_path: PathBuf,

    #[arg(long)]
    pub video_id: String,

    #[arg(long)]
    pub audio_description_id: String,

    #[arg(long, default_value = "videos")]
    pub videos_root: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct PrepareArgs {
    #[arg(long)]
    pub video_folder: PathBuf,

    #[arg(long)]
    pub csv_path: Option<PathBuf>,

    #[arg(long)]
    pub scenes_path: Option<PathBuf>,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long, default_value_t = 0.1)]
    pub gap_threshold: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum JudgeKind {
    Gemini,
    Local,
}

impl JudgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Local => "local",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    #[arg(long)]
    pub video_folder: PathBuf,

    /// Tag selecting the track file, e.g. "human" reads final_data_human.json.
    #[arg(long)]
    pub input_type: String,

    #[arg(long, value_enum, default_value_t = JudgeKind::Gemini)]
    pub judge: JudgeKind,

    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, default_value_t = 0.6)]
    pub temperature: f64,

    #[arg(long, default_value_t = 1024)]
    pub max_output_tokens: u32,

    #[arg(long, default_value_t = 600)]
    pub timeout_secs: u64,

    #[arg(long, default_value_t = 2)]
    pub max_attempts: usize,

    #[arg(long, default_value = "http://127.0.0.1:11434")]
    pub endpoint: String,

    #[arg(long, default_value_t = 30.0)]
    pub chunk_seconds: f64,

    #[arg(long, default_value_t = 8)]
    pub max_frames_per_chunk: usize,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long)]
    pub video_folder: PathBuf,
}
