//! ImageNet classification with pretrained MobileNetV3 models.
//!
//! The pipeline creates a pretrained model, saves it to disk, preprocesses
//! a JPEG image and decodes the top predictions:
//!
//! ```no_run
//! use mobilenet_classify::vision::{image, imagenet};
//! use mobilenet_classify::{Config, Model, ModelConfig};
//!
//! # fn main() -> mobilenet_classify::Result<()> {
//! let config = Config::from_env();
//! let model = Model::pretrained(ModelConfig::small(), &config)?;
//! model.save(&config.model_dir)?;
//! let input = image::load_image_and_resize(&config.image_path, 224, 224)?;
//! let probs = model.predict(&input)?;
//! let classes = imagenet::ImagenetClasses::fetch(&config)?;
//! let top5 = imagenet::decode_predictions(&probs, &classes, 5)?;
//! # Ok(())
//! # }
//! ```
pub mod config;
pub use config::Config;

mod download;

mod error;
pub use error::{Error, Result};

pub mod report;
pub use report::Report;

pub mod vision;

pub mod zoo;
pub use zoo::{Model, ModelConfig, Weights};
