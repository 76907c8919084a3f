// These tests download the pretrained weights and the ImageNet class index,
// and expect the sample image at sample_images/macaque.jpg.
// Run them with `cargo test -- --ignored`.
use mobilenet_classify::vision::{image, imagenet};
use mobilenet_classify::{Config, Model, ModelConfig};

use test_utils::*;

fn sample_image() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(Config::default().image_path)
}

#[test]
#[ignore]
fn classifies_the_macaque() {
    let config = Config::from_env();
    let model = Model::pretrained(ModelConfig::small(), &config).unwrap();
    let input = image::load_image_and_resize(sample_image(), 224, 224).unwrap();
    let probs = model.predict(&input).unwrap();
    let classes = imagenet::ImagenetClasses::fetch(&config).unwrap();
    assert_eq!(classes.len() as i64, imagenet::CLASS_COUNT);

    let decoded = imagenet::decode_predictions(&probs, &classes, 1).unwrap();
    let top1 = &decoded[0][0];
    assert!(
        ["macaque", "proboscis_monkey", "guenon"].contains(&top1.description.as_str()),
        "{top1:?}"
    );
    assert!(top1.score > 0.5, "{top1:?}");
    assert_eq!(imagenet::argmax(&probs).unwrap(), [top1.index]);
}

#[test]
#[ignore]
fn saved_pretrained_model_predicts_the_same() {
    let config = Config::from_env();
    let dir = TmpPath::create("pretrained");
    let model = Model::pretrained(ModelConfig::small(), &config).unwrap();
    model.save(&dir).unwrap();
    let reloaded = Model::load(&dir).unwrap();

    let input = image::load_image_and_resize(sample_image(), 224, 224).unwrap();
    let expected = model.predict(&input).unwrap();
    let actual = reloaded.predict(&input).unwrap();
    let diff = (expected - actual).abs().max().double_value(&[]);
    assert!(diff < 1e-5, "{diff}");
}
