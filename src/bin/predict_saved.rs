// Reloads the model saved by `mobilenet-classify` and classifies an image
// with it, printing the same report.
//
// Usage: predict-saved [image.jpg]
use anyhow::{Context, Result};
use mobilenet_classify::vision::{image, imagenet};
use mobilenet_classify::{Config, Model, Report};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();
    let mut config = Config::from_env();
    if let Some(path) = std::env::args_os().nth(1) {
        config.image_path = path.into();
    }

    let model = Model::load(&config.model_dir)
        .context("run `mobilenet-classify` first to generate the model files")?;
    let [height, width, _] = model.config().input_shape;
    let input = image::load_image_and_resize(&config.image_path, height, width)
        .with_context(|| format!("reading {:?}", config.image_path))?;

    let probs = model.predict(&input)?;
    let classes = imagenet::ImagenetClasses::fetch(&config)?;
    let decoded = imagenet::decode_predictions(&probs, &classes, 1)?;
    let argmax = imagenet::argmax(&probs)?.first().copied().context("empty prediction")?;
    let top1 = decoded
        .first()
        .and_then(|row| row.first())
        .context("no prediction returned")?;
    Report::new(argmax, top1).print();
    Ok(())
}
