use image::{Rgb, RgbImage};
use mobilenet_classify::vision::image as preprocess;
use mobilenet_classify::Error;
use tch::Kind;

use test_utils::*;

#[test]
fn preprocessed_shape_is_fixed() {
    for (width, height) in [(640, 480), (100, 300), (224, 224), (17, 1000), (1, 1)] {
        let tmp = TmpPath::create(&format!("shape-{width}x{height}.jpg"));
        write_jpeg(tmp.as_ref(), width, height);
        let tensor = preprocess::load_image_and_resize(&tmp, 224, 224).unwrap();
        assert_eq!(tensor.size(), [1, 224, 224, 3], "{width}x{height}");
        assert_eq!(tensor.kind(), Kind::Float);
    }
}

#[test]
fn pixel_range() {
    let tmp = TmpPath::create("range.jpg");
    write_jpeg(tmp.as_ref(), 320, 240);
    let tensor = preprocess::load_image_and_resize(&tmp, 224, 224).unwrap();
    assert!(tensor.min().double_value(&[]) >= 0.);
    assert!(tensor.max().double_value(&[]) <= 255.);
    // The gradient spans most of the range on the first two channels.
    assert!(tensor.max().double_value(&[]) > 200.);
}

#[test]
fn uniform_image_keeps_its_color() {
    let tmp = TmpPath::create("uniform.jpg");
    RgbImage::from_pixel(500, 375, Rgb([200, 100, 50])).save(&tmp.0).unwrap();
    let tensor = preprocess::load_image_and_resize(&tmp, 224, 224).unwrap();
    for (channel, expected) in [200., 100., 50.].into_iter().enumerate() {
        let mean = tensor.select(3, channel as i64).mean(Kind::Double).double_value(&[]);
        assert!((mean - expected).abs() < 4., "{mean} vs {expected}");
    }
}

#[test]
fn missing_file() {
    let tmp = TmpPath::create("missing.jpg");
    let err = preprocess::load_image_and_resize(&tmp, 224, 224).unwrap_err();
    assert!(matches!(err, Error::Io(_)), "{err:?}");
}

#[test]
fn invalid_jpeg() {
    let tmp = TmpPath::create("invalid.jpg");
    std::fs::write(&tmp.0, b"definitely not a jpeg").unwrap();
    let err = preprocess::load_image_and_resize(&tmp, 224, 224).unwrap_err();
    assert!(matches!(err, Error::Image(_)), "{err:?}");
}

#[test]
fn png_is_not_accepted_as_jpeg() {
    let tmp = TmpPath::create("image.png");
    RgbImage::from_pixel(32, 32, Rgb([1, 2, 3])).save(&tmp.0).unwrap();
    let err = preprocess::load_image(&tmp).unwrap_err();
    assert!(matches!(err, Error::Image(_)), "{err:?}");
}

#[test]
fn dump_resized_image() {
    let src = TmpPath::create("dump-src.jpg");
    let dst = TmpPath::create("dump-dst.png");
    write_jpeg(src.as_ref(), 300, 200);
    let tensor = preprocess::load_image_and_resize(&src, 224, 224).unwrap();
    preprocess::save_image(&tensor, &dst).unwrap();
    let saved = image::open(&dst.0).unwrap();
    assert_eq!((saved.width(), saved.height()), (224, 224));
}

#[test]
fn save_image_rejects_bad_shapes() {
    let dst = TmpPath::create("bad-shape.png");
    let tensor = tch::Tensor::zeros([1, 3, 8, 8], (Kind::Float, tch::Device::Cpu));
    let err = preprocess::save_image(&tensor, &dst).unwrap_err();
    assert!(matches!(err, Error::Shape(_)), "{err:?}");
}
