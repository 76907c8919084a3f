use mobilenet_classify::vision::mobilenet_v3::{self, MobileNetV3Config};
use tch::nn::{self, ModuleT};
use tch::Tensor;

fn shape_of(vs: &nn::VarStore, name: &str) -> Vec<i64> {
    match vs.variables().get(name) {
        Some(tensor) => tensor.size(),
        None => panic!("missing variable {name}"),
    }
}

#[test]
fn mobilenet_v3_small() {
    let vs = nn::VarStore::new(tch::Device::Cpu);
    let net = mobilenet_v3::v3_small(&vs.root(), 3, 1000, &MobileNetV3Config::default());
    let img = Tensor::zeros([1, 3, 224, 224], tch::kind::FLOAT_CPU);
    let logits = net.forward_t(&img, false);
    assert_eq!(logits.size(), [1, 1000]);
}

#[test]
fn mobilenet_v3_large() {
    let vs = nn::VarStore::new(tch::Device::Cpu);
    let net = mobilenet_v3::v3_large(&vs.root(), 3, 1000, &MobileNetV3Config::default());
    let img = Tensor::zeros([2, 3, 224, 224], tch::kind::FLOAT_CPU);
    let logits = net.forward_t(&img, false);
    assert_eq!(logits.size(), [2, 1000]);
}

#[test]
fn small_checkpoint_layout() {
    let vs = nn::VarStore::new(tch::Device::Cpu);
    let _net = mobilenet_v3::v3_small(&vs.root(), 3, 1000, &MobileNetV3Config::default());
    assert_eq!(shape_of(&vs, "conv_stem.weight"), [16, 3, 3, 3]);
    assert_eq!(shape_of(&vs, "bn1.running_var"), [16]);
    assert_eq!(shape_of(&vs, "blocks.0.0.conv_dw.weight"), [16, 1, 3, 3]);
    assert_eq!(shape_of(&vs, "blocks.0.0.se.conv_reduce.weight"), [8, 16, 1, 1]);
    assert_eq!(shape_of(&vs, "blocks.0.0.se.conv_expand.bias"), [16]);
    assert_eq!(shape_of(&vs, "blocks.0.0.conv_pw.weight"), [16, 16, 1, 1]);
    assert_eq!(shape_of(&vs, "blocks.1.1.conv_pw.weight"), [88, 24, 1, 1]);
    assert_eq!(shape_of(&vs, "blocks.2.1.se.conv_reduce.weight"), [64, 240, 1, 1]);
    assert_eq!(shape_of(&vs, "blocks.4.2.conv_pwl.weight"), [96, 576, 1, 1]);
    assert_eq!(shape_of(&vs, "blocks.4.2.bn3.weight"), [96]);
    assert_eq!(shape_of(&vs, "blocks.5.0.conv.weight"), [576, 96, 1, 1]);
    assert_eq!(shape_of(&vs, "conv_head.weight"), [1024, 576, 1, 1]);
    assert_eq!(shape_of(&vs, "conv_head.bias"), [1024]);
    assert_eq!(shape_of(&vs, "classifier.weight"), [1000, 1024]);
    assert!(!vs.variables().contains_key("blocks.1.0.se.conv_reduce.weight"));
}

#[test]
fn large_checkpoint_layout() {
    let vs = nn::VarStore::new(tch::Device::Cpu);
    let _net = mobilenet_v3::v3_large(&vs.root(), 3, 1000, &MobileNetV3Config::default());
    assert_eq!(shape_of(&vs, "blocks.2.0.se.conv_reduce.weight"), [24, 72, 1, 1]);
    assert_eq!(shape_of(&vs, "blocks.3.1.conv_pw.weight"), [200, 80, 1, 1]);
    assert_eq!(shape_of(&vs, "blocks.3.2.conv_pw.weight"), [184, 80, 1, 1]);
    assert_eq!(shape_of(&vs, "blocks.6.0.conv.weight"), [960, 160, 1, 1]);
    assert_eq!(shape_of(&vs, "classifier.weight"), [1000, 1280]);
}
