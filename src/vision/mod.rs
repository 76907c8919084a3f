/// The `vision` module groups the image handling and the models related
/// to computer vision.
pub mod image;

pub mod imagenet;

pub mod mobilenet_v3;
