// Creates a pretrained MobileNetV3-Small, saves it to `model/` and prints
// the top-1 ImageNet class of `sample_images/macaque.jpg`.
//
// The weights and the ImageNet class index are downloaded on the first run
// and cached, see MOBILENET_CLASSIFY_HOME to change the cache location.
use anyhow::{Context, Result};
use mobilenet_classify::vision::{image, imagenet};
use mobilenet_classify::{Config, Model, ModelConfig, Report};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let config = Config::from_env();

    let model = Model::pretrained(ModelConfig::small(), &config)
        .context("loading the pretrained model")?;
    model.save(&config.model_dir).with_context(|| format!("saving to {:?}", config.model_dir))?;

    let size = config.image_size;
    let input = image::load_image_and_resize(&config.image_path, size, size)
        .with_context(|| format!("reading {:?}", config.image_path))?;
    if let Some(path) = &config.dump_resized {
        image::save_image(&input, path)?;
    }

    let probs = model.predict(&input)?;
    let classes = imagenet::ImagenetClasses::fetch(&config).context("loading imagenet labels")?;
    let decoded = imagenet::decode_predictions(&probs, &classes, 1)?;
    let argmax = imagenet::argmax(&probs)?.first().copied().context("empty prediction")?;
    let top1 = decoded
        .first()
        .and_then(|row| row.first())
        .context("no prediction returned")?;
    Report::new(argmax, top1).print();
    Ok(())
}
