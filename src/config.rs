//! Runtime configuration for the classification pipeline.
//!
//! Every field has a fixed default so the demo binary runs without any
//! arguments. The download cache location, the hub endpoint and the debug
//! dump of the resized image can be set through environment variables.
use std::env;
use std::path::PathBuf;

/// Overrides the directory used to cache downloaded weights and labels.
pub const HOME_ENV: &str = "MOBILENET_CLASSIFY_HOME";
/// Overrides the base URL of the model hub.
pub const HUB_ENV: &str = "MOBILENET_CLASSIFY_HUB";
/// When set, the resized sample image is written to this path.
pub const DUMP_ENV: &str = "MOBILENET_CLASSIFY_DUMP";

pub const DEFAULT_MODEL_DIR: &str = "model";
pub const DEFAULT_IMAGE_PATH: &str = "sample_images/macaque.jpg";
pub const DEFAULT_HUB_URL: &str = "https://huggingface.co";
pub const DEFAULT_LABELS_URL: &str =
    "https://storage.googleapis.com/download.tensorflow.org/data/imagenet_class_index.json";

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the model is saved to.
    pub model_dir: PathBuf,
    /// Sample image to classify.
    pub image_path: PathBuf,
    /// Height and width the image is resized to.
    pub image_size: i64,
    /// Where downloaded files are cached.
    pub cache_dir: PathBuf,
    /// Base URL used to resolve pretrained weight files.
    pub hub_url: String,
    /// Location of the ImageNet class index.
    pub labels_url: String,
    /// When set, the resized image is written there as a PNG.
    pub dump_resized: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            image_path: PathBuf::from(DEFAULT_IMAGE_PATH),
            image_size: 224,
            cache_dir: default_cache_dir(),
            hub_url: DEFAULT_HUB_URL.to_string(),
            labels_url: DEFAULT_LABELS_URL.to_string(),
            dump_resized: None,
        }
    }
}

impl Config {
    /// Default configuration with the environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        if let Some(home) = env_var(HOME_ENV) {
            config.cache_dir = PathBuf::from(home);
        }
        if let Some(hub) = env_var(HUB_ENV) {
            config.hub_url = hub.trim_end_matches('/').to_string();
        }
        config.dump_resized = env_var(DUMP_ENV).map(PathBuf::from);
        config
    }

    /// URL of a file stored in a hub repository.
    pub fn hub_file_url(&self, repo: &str, file_name: &str) -> String {
        format!("{}/{repo}/resolve/main/{file_name}", self.hub_url)
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

fn default_cache_dir() -> PathBuf {
    match env_var("HOME") {
        Some(home) => PathBuf::from(home).join(".cache").join("mobilenet-classify"),
        None => env::temp_dir().join("mobilenet-classify"),
    }
}
