//! Pretrained classifiers: creation, persistence and inference.
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tch::nn::{self, ModuleT, VarStore};
use tch::{Device, Kind, Tensor};

use crate::config::Config;
use crate::download;
use crate::error::{Error, Result};
use crate::vision::imagenet;
use crate::vision::mobilenet_v3::{self, MobileNetV3Config, Variant};

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";
const FORMAT_VERSION: u32 = 1;
const MIN_INPUT_SIZE: i64 = 32;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Where the initial weights of a model come from.
#[derive(Debug, Clone, PartialEq)]
pub enum Weights {
    /// Random initialization.
    None,
    /// ImageNet weights from the model zoo, downloaded on first use.
    Imagenet,
    /// A local safetensors file.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub variant: Variant,
    /// Input shape as `[height, width, channels]`.
    pub input_shape: [i64; 3],
    pub classes: i64,
    pub dropout: f64,
    /// Rescale `[0, 255]` inputs and apply the ImageNet normalization inside
    /// the model.
    pub include_preprocessing: bool,
    pub weights: Weights,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            variant: Variant::Small,
            input_shape: [224, 224, 3],
            classes: imagenet::CLASS_COUNT,
            dropout: MobileNetV3Config::default().dropout,
            include_preprocessing: true,
            weights: Weights::Imagenet,
        }
    }
}

impl ModelConfig {
    pub fn small() -> Self {
        Self::default()
    }

    pub fn large() -> Self {
        ModelConfig { variant: Variant::Large, ..Self::default() }
    }

    fn validate(&self) -> Result<()> {
        let [height, width, channels] = self.input_shape;
        if height < MIN_INPUT_SIZE || width < MIN_INPUT_SIZE {
            return Err(Error::Config(format!(
                "input size must be at least {MIN_INPUT_SIZE}x{MIN_INPUT_SIZE}, \
                 got {height}x{width}"
            )));
        }
        if channels <= 0 {
            return Err(Error::Config(format!("invalid channel count {channels}")));
        }
        if self.classes <= 0 {
            return Err(Error::Config(format!("invalid class count {}", self.classes)));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::Config(format!("dropout must be in [0, 1), got {}", self.dropout)));
        }
        if self.weights == Weights::Imagenet {
            if channels != 3 {
                return Err(Error::Config(format!(
                    "imagenet weights need 3 input channels, got {channels}"
                )));
            }
            if self.classes != imagenet::CLASS_COUNT {
                return Err(Error::Config(format!(
                    "imagenet weights need {} classes, got {}",
                    imagenet::CLASS_COUNT,
                    self.classes
                )));
            }
        }
        if self.include_preprocessing && channels != 3 {
            return Err(Error::Config("input preprocessing expects RGB inputs".to_string()));
        }
        Ok(())
    }
}

/// The part of `ModelConfig` written next to the saved weights.
#[derive(Debug, Serialize, Deserialize)]
struct SavedConfig {
    format_version: u32,
    variant: Variant,
    input_shape: [i64; 3],
    classes: i64,
    dropout: f64,
    include_preprocessing: bool,
}

impl From<&ModelConfig> for SavedConfig {
    fn from(config: &ModelConfig) -> Self {
        SavedConfig {
            format_version: FORMAT_VERSION,
            variant: config.variant,
            input_shape: config.input_shape,
            classes: config.classes,
            dropout: config.dropout,
            include_preprocessing: config.include_preprocessing,
        }
    }
}

/// Hub repository holding the ImageNet weights of each variant.
fn imagenet_repo(variant: Variant) -> &'static str {
    match variant {
        Variant::Small => "timm/mobilenetv3_small_100.lamb_in1k",
        Variant::Large => "timm/mobilenetv3_large_100.ra_in1k",
    }
}

/// Converts NHWC inputs into the normalized NCHW layout the network expects.
fn input_layer(include_preprocessing: bool) -> nn::Func<'static> {
    let mean = Tensor::from_slice(&IMAGENET_MEAN).view([1, 3, 1, 1]);
    let std = Tensor::from_slice(&IMAGENET_STD).view([1, 3, 1, 1]);
    nn::func(move |xs| {
        let xs = xs.permute([0, 3, 1, 2]);
        if include_preprocessing {
            (xs / 255. - &mean) / &std
        } else {
            xs
        }
    })
}

/// An image classifier with its weights.
#[derive(Debug)]
pub struct Model {
    vs: VarStore,
    net: nn::SequentialT,
    config: ModelConfig,
}

impl Model {
    /// Builds the model described by `config` and binds its weights.
    ///
    /// Requesting [`Weights::Imagenet`] downloads the weights on first use.
    pub fn pretrained(config: ModelConfig, runtime: &Config) -> Result<Self> {
        config.validate()?;
        let weights = match &config.weights {
            Weights::Imagenet => {
                let repo = imagenet_repo(config.variant);
                Some(download::cached_file(
                    runtime,
                    repo,
                    WEIGHTS_FILE,
                    &runtime.hub_file_url(repo, WEIGHTS_FILE),
                    download::validate_safetensors,
                )?)
            }
            Weights::File(path) => Some(path.clone()),
            Weights::None => None,
        };
        Self::with_weights(config, weights.as_deref())
    }

    fn with_weights(config: ModelConfig, weights: Option<&Path>) -> Result<Self> {
        let mut model = Self::build(config);
        if let Some(path) = weights {
            model.load_weights(path)?;
        }
        model.vs.freeze();
        Ok(model)
    }

    /// Builds the network with randomly initialized weights.
    fn build(config: ModelConfig) -> Self {
        let vs = VarStore::new(Device::Cpu);
        let root = vs.root();
        let mobilenet_config =
            MobileNetV3Config { dropout: config.dropout, ..Default::default() };
        let [_, _, channels] = config.input_shape;
        let net = nn::seq_t().add(input_layer(config.include_preprocessing));
        let net = match config.variant {
            Variant::Small => net.add(mobilenet_v3::v3_small(
                &root,
                channels,
                config.classes,
                &mobilenet_config,
            )),
            Variant::Large => net.add(mobilenet_v3::v3_large(
                &root,
                channels,
                config.classes,
                &mobilenet_config,
            )),
        };
        tracing::debug!(variant = ?config.variant, variables = vs.variables().len(), "built model");
        Model { vs, net, config }
    }

    fn load_weights(&mut self, path: &Path) -> Result<()> {
        tracing::info!(path = %path.display(), "loading weights");
        self.vs.load(path).map_err(|err| Error::from(err).path_context(path))
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Writes the architecture and the weights to `dir`, replacing any
    /// previous contents.
    pub fn save<T: AsRef<Path>>(&self, dir: T) -> Result<()> {
        let dir = dir.as_ref();
        if dir.exists() {
            if !dir.is_dir() {
                return Err(Error::Config(format!("{} is not a directory", dir.display())));
            }
            fs::remove_dir_all(dir)?;
        }
        fs::create_dir_all(dir)?;
        let writer = BufWriter::new(File::create(dir.join(CONFIG_FILE))?);
        serde_json::to_writer_pretty(writer, &SavedConfig::from(&self.config))?;
        self.vs.save(dir.join(WEIGHTS_FILE))?;
        tracing::info!(dir = %dir.display(), "saved model");
        Ok(())
    }

    /// Restores a model written by [`Model::save`].
    pub fn load<T: AsRef<Path>>(dir: T) -> Result<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::MissingModel(dir.to_path_buf()));
        }
        let reader = BufReader::new(File::open(dir.join(CONFIG_FILE))?);
        let saved: SavedConfig = serde_json::from_reader(reader)?;
        if saved.format_version != FORMAT_VERSION {
            return Err(Error::Config(format!(
                "unsupported model format version {}",
                saved.format_version
            )));
        }
        let weights = dir.join(WEIGHTS_FILE);
        let config = ModelConfig {
            variant: saved.variant,
            input_shape: saved.input_shape,
            classes: saved.classes,
            dropout: saved.dropout,
            include_preprocessing: saved.include_preprocessing,
            weights: Weights::File(weights.clone()),
        };
        config.validate()?;
        Self::with_weights(config, Some(&weights))
    }

    /// Runs one forward pass and returns the `[N, classes]` probabilities.
    ///
    /// `input` must be a float tensor of shape `[N, height, width, channels]`
    /// matching the model input shape.
    pub fn predict(&self, input: &Tensor) -> Result<Tensor> {
        let [height, width, channels] = self.config.input_shape;
        match input.size().as_slice() {
            [_, h, w, c] if *h == height && *w == width && *c == channels => {}
            size => {
                return Err(Error::Shape(format!(
                    "expected input of shape [N, {height}, {width}, {channels}], got {size:?}"
                )))
            }
        }
        let input = input.f_to_kind(Kind::Float)?;
        let logits = tch::no_grad(|| self.net.forward_t(&input, false));
        Ok(logits.f_softmax(-1, Kind::Float)?)
    }
}
