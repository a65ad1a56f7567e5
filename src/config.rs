use crate::error::Error;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub const DEFAULT_PACKS_ROOT: &str = "outputs/prompt_packs";
pub const DEFAULT_CSV_PATH: &str = "data/batch_items.csv";
pub const DEFAULT_GUIDE_PATH: &str = "guides/Guia criação dos vídeos.txt";

/// Credentials and model settings shared by every generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "openai_api_key", default)]
    pub openai_key: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_text_model")]
    pub text_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_image_model")]
    pub image_model: String,
    #[serde(default = "default_image_size")]
    pub image_size: String,
    /// `None` leaves the HTTP client's default in place.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_text_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_image_model() -> String {
    "gpt-image-1".to_string()
}

fn default_image_size() -> String {
    "1024x1536".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_key: String::new(),
            api_base: default_api_base(),
            text_model: default_text_model(),
            temperature: default_temperature(),
            image_model: default_image_model(),
            image_size: default_image_size(),
            request_timeout_secs: None,
        }
    }
}

impl Config {
    /// Reads a JSON config file. A blank key falls back to the environment.
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        let mut config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.as_ref().display()))?;

        if config.openai_key.is_empty() {
            let _ = dotenvy::dotenv();
            config.openai_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        }
        config.validate()?;
        Ok(config)
    }

    /// Loads `.env` (if any) and reads the key and API base from the environment.
    pub fn from_env() -> std::result::Result<Self, Error> {
        let _ = dotenvy::dotenv();
        let mut config = Config {
            openai_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            ..Config::default()
        };
        if let Ok(base) = std::env::var("OPENAI_API_BASE") {
            let base = base.trim().trim_end_matches('/');
            if !base.is_empty() {
                config.api_base = base.to_string();
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), Error> {
        if self.openai_key.trim().is_empty() {
            return Err(Error::MissingApiKey);
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature must be within 0.0..=2.0 (got {})",
                self.temperature
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Where reference image URLs come from when downloading per pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageUrlSource {
    /// Companion spreadsheet, row N feeds pack `NNN-*`.
    Csv,
    /// URLs pasted into the scenes prompt.
    #[default]
    Scenes,
}

/// Options for the pack processing run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub packs_root: PathBuf,
    /// When set, consolidated results go to `<output_root>/<pack>.txt`.
    pub output_root: Option<PathBuf>,
    pub skip_existing: bool,
    pub only_final: bool,
    pub download_images: bool,
    pub image_source: ImageUrlSource,
    pub csv_path: PathBuf,
    pub max_images: usize,
    pub max_script_words: usize,
    pub min_hashtags: usize,
    pub max_hashtags: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            packs_root: PathBuf::from(DEFAULT_PACKS_ROOT),
            output_root: None,
            skip_existing: false,
            only_final: false,
            download_images: false,
            image_source: ImageUrlSource::default(),
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            max_images: 1,
            max_script_words: 160,
            min_hashtags: 10,
            max_hashtags: 15,
        }
    }
}

/// Options for the scene image run.
#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub packs_root: PathBuf,
    /// Where downloaded reference images live, if not next to the pack.
    pub source_root: Option<PathBuf>,
    /// Images go to `<output_root>/<pack>/` instead of the pack itself.
    pub output_root: Option<PathBuf>,
    pub overwrite: bool,
    pub max_scenes_per_pack: usize,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            packs_root: PathBuf::from(DEFAULT_PACKS_ROOT),
            source_root: None,
            output_root: None,
            overwrite: false,
            max_scenes_per_pack: 6,
        }
    }
}

/// Options for turning a spreadsheet into packs.
#[derive(Debug, Clone)]
pub struct PackGenOptions {
    pub csv_path: PathBuf,
    pub packs_root: PathBuf,
    pub guide_path: Option<PathBuf>,
    /// A missing guide is fatal instead of silently skipped.
    pub guide_required: bool,
}

impl Default for PackGenOptions {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from(DEFAULT_CSV_PATH),
            packs_root: PathBuf::from(DEFAULT_PACKS_ROOT),
            guide_path: Some(PathBuf::from(DEFAULT_GUIDE_PATH)),
            guide_required: false,
        }
    }
}

/// Options for moving finished results and images into per-pack folders.
#[derive(Debug, Clone)]
pub struct OrganizeOptions {
    pub packs_root: PathBuf,
    /// Flat directory holding `<pack>.txt` and `<pack>_imgN.*`, when results
    /// were written outside the packs.
    pub final_root: Option<PathBuf>,
    pub images_subdir: Option<String>,
    /// New stem for the first image, e.g. `thumb`.
    pub rename_first: Option<String>,
}

impl Default for OrganizeOptions {
    fn default() -> Self {
        Self {
            packs_root: PathBuf::from(DEFAULT_PACKS_ROOT),
            final_root: None,
            images_subdir: None,
            rename_first: None,
        }
    }
}

/// Options for single-topic text assets.
#[derive(Debug, Clone)]
pub struct TopicOptions {
    pub topic: String,
    pub style: String,
    pub duration_secs: u32,
    pub language: String,
    pub output_dir: PathBuf,
}

impl Default for TopicOptions {
    fn default() -> Self {
        Self {
            topic: String::new(),
            style: "persuasivo".to_string(),
            duration_secs: 30,
            language: "pt-BR".to_string(),
            output_dir: PathBuf::from("outputs"),
        }
    }
}
