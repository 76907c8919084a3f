//! MobileNetV3 implementation.
//!
//! See "Searching for MobileNetV3" Andrew Howard et al. 2019
//! https://arxiv.org/abs/1905.02244
//!
//! Variables are laid out like the `timm` checkpoints (`conv_stem`, `bn1`,
//! `blocks.<stage>.<block>.*`, `conv_head`, `classifier`) so that the
//! published ImageNet weights load without renaming.
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use tch::nn::{self, ModuleT, Path};
use tch::Tensor;

/// Architecture variant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Small,
    Large,
}

impl Variant {
    /// Width of the last hidden layer before the classifier.
    pub fn num_features(self) -> i64 {
        match self {
            Variant::Small => 1024,
            Variant::Large => 1280,
        }
    }
}

#[derive(Debug, Copy, Clone)]
enum NL {
    ReLU,
    HSwish,
}

#[derive(Debug, Copy, Clone)]
enum SE {
    SEModule,
    Identity,
}

#[derive(Debug, Copy, Clone)]
enum BlockKind {
    /// Depthwise conv followed by a pointwise projection.
    DepthwiseSeparable,
    /// Pointwise expansion, depthwise conv, pointwise projection.
    InvertedResidual,
    /// Single conv + batch-norm + activation.
    ConvBnAct,
}

// kind, k, exp, c, se, nl, s
type BlockDef = (BlockKind, i64, f64, i64, SE, NL, i64);

#[derive(Debug, Clone)]
pub struct MobileNetV3Config {
    pub dropout: f64,
    pub width_mult: f64,
}

/// Default model parameters: 0.2 dropout before the classifier and a
/// width multiplier of 1.0, the setting the ImageNet weights use.
impl Default for MobileNetV3Config {
    fn default() -> Self {
        MobileNetV3Config { dropout: 0.2, width_mult: 1.0 }
    }
}

/// Rounds `v` to a multiple of 8 without going more than 10% below it.
pub fn make_divisible(v: f64) -> i64 {
    let divisor = 8;
    let new_v = i64::max(divisor, (v + divisor as f64 / 2.) as i64 / divisor * divisor);
    if (new_v as f64) < 0.9 * v {
        new_v + divisor
    } else {
        new_v
    }
}

fn stages(variant: Variant) -> Vec<Vec<BlockDef>> {
    use BlockKind::*;
    use NL::*;
    use SE::*;
    match variant {
        Variant::Small => vec![
            vec![(DepthwiseSeparable, 3, 1., 16, SEModule, ReLU, 2)],
            vec![
                (InvertedResidual, 3, 4.5, 24, Identity, ReLU, 2),
                (InvertedResidual, 3, 3.67, 24, Identity, ReLU, 1),
            ],
            vec![
                (InvertedResidual, 5, 4., 40, SEModule, HSwish, 2),
                (InvertedResidual, 5, 6., 40, SEModule, HSwish, 1),
                (InvertedResidual, 5, 6., 40, SEModule, HSwish, 1),
            ],
            vec![
                (InvertedResidual, 5, 3., 48, SEModule, HSwish, 1),
                (InvertedResidual, 5, 3., 48, SEModule, HSwish, 1),
            ],
            vec![
                (InvertedResidual, 5, 6., 96, SEModule, HSwish, 2),
                (InvertedResidual, 5, 6., 96, SEModule, HSwish, 1),
                (InvertedResidual, 5, 6., 96, SEModule, HSwish, 1),
            ],
            vec![(ConvBnAct, 1, 1., 576, Identity, HSwish, 1)],
        ],
        Variant::Large => vec![
            vec![(DepthwiseSeparable, 3, 1., 16, Identity, ReLU, 1)],
            vec![
                (InvertedResidual, 3, 4., 24, Identity, ReLU, 2),
                (InvertedResidual, 3, 3., 24, Identity, ReLU, 1),
            ],
            vec![
                (InvertedResidual, 5, 3., 40, SEModule, ReLU, 2),
                (InvertedResidual, 5, 3., 40, SEModule, ReLU, 1),
                (InvertedResidual, 5, 3., 40, SEModule, ReLU, 1),
            ],
            vec![
                (InvertedResidual, 3, 6., 80, Identity, HSwish, 2),
                (InvertedResidual, 3, 2.5, 80, Identity, HSwish, 1),
                (InvertedResidual, 3, 2.3, 80, Identity, HSwish, 1),
                (InvertedResidual, 3, 2.3, 80, Identity, HSwish, 1),
            ],
            vec![
                (InvertedResidual, 3, 6., 112, SEModule, HSwish, 1),
                (InvertedResidual, 3, 6., 112, SEModule, HSwish, 1),
            ],
            vec![
                (InvertedResidual, 5, 6., 160, SEModule, HSwish, 2),
                (InvertedResidual, 5, 6., 160, SEModule, HSwish, 1),
                (InvertedResidual, 5, 6., 160, SEModule, HSwish, 1),
            ],
            vec![(ConvBnAct, 1, 1., 960, Identity, HSwish, 1)],
        ],
    }
}

fn depthwise_separable(
    path: &Path,
    c_in: i64,
    c_out: i64,
    k: i64,
    s: i64,
    se: SE,
    nl: NL,
) -> impl ModuleT {
    let use_res_connect = s == 1 && c_in == c_out;
    let conv_dw = conv_layer(path / "conv_dw", c_in, c_in, k, s, (k - 1) / 2, Some(c_in), false);
    let bn1 = norm_layer(path / "bn1", c_in);
    let se = squeeze_excite(&(path / "se"), c_in, se);
    let conv_pw = conv_layer(path / "conv_pw", c_in, c_out, 1, 1, 0, None, false);
    let bn2 = norm_layer(path / "bn2", c_out);
    nn::func_t(move |xs, train| {
        let ys = activation(&xs.apply(&conv_dw).apply_t(&bn1, train), nl)
            .apply(&se)
            .apply(&conv_pw)
            .apply_t(&bn2, train);
        if use_res_connect {
            ys + xs
        } else {
            ys
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn inverted_residual(
    path: &Path,
    c_in: i64,
    c_out: i64,
    k: i64,
    s: i64,
    c_exp: i64,
    se: SE,
    nl: NL,
) -> impl ModuleT {
    assert!([1, 2].contains(&s), "stride should be either 1 or 2");
    assert!([3, 5].contains(&k), "kernel size should be either 3 or 5");

    let use_res_connect = s == 1 && c_in == c_out;
    let conv_pw = conv_layer(path / "conv_pw", c_in, c_exp, 1, 1, 0, None, false);
    let bn1 = norm_layer(path / "bn1", c_exp);
    let conv_dw =
        conv_layer(path / "conv_dw", c_exp, c_exp, k, s, (k - 1) / 2, Some(c_exp), false);
    let bn2 = norm_layer(path / "bn2", c_exp);
    let se = squeeze_excite(&(path / "se"), c_exp, se);
    let conv_pwl = conv_layer(path / "conv_pwl", c_exp, c_out, 1, 1, 0, None, false);
    let bn3 = norm_layer(path / "bn3", c_out);
    nn::func_t(move |xs, train| {
        let ys = activation(&xs.apply(&conv_pw).apply_t(&bn1, train), nl);
        let ys = activation(&ys.apply(&conv_dw).apply_t(&bn2, train), nl)
            .apply(&se)
            .apply(&conv_pwl)
            .apply_t(&bn3, train);
        if use_res_connect {
            ys + xs
        } else {
            ys
        }
    })
}

fn conv_bn_act(path: &Path, c_in: i64, c_out: i64, nl: NL) -> impl ModuleT {
    let conv = conv_layer(path / "conv", c_in, c_out, 1, 1, 0, None, false);
    let bn1 = norm_layer(path / "bn1", c_out);
    nn::func_t(move |xs, train| activation(&xs.apply(&conv).apply_t(&bn1, train), nl))
}

/// Squeeze-and-excitation: a channel gate computed from the pooled input.
fn squeeze_excite(path: &Path, channel: i64, se: SE) -> nn::Func<'static> {
    let squeeze_channel = match se {
        SE::SEModule => make_divisible(channel as f64 * 0.25),
        SE::Identity => return nn::func(|xs| xs.shallow_clone()),
    };
    let conv_reduce =
        conv_layer(path / "conv_reduce", channel, squeeze_channel, 1, 1, 0, None, true);
    let conv_expand =
        conv_layer(path / "conv_expand", squeeze_channel, channel, 1, 1, 0, None, true);
    nn::func(move |xs| {
        let gate = xs
            .adaptive_avg_pool2d([1, 1])
            .apply(&conv_reduce)
            .relu()
            .apply(&conv_expand);
        xs * h_sigmoid(&gate)
    })
}

// Helper functions

/// Convolution layer
#[allow(clippy::too_many_arguments)]
fn conv_layer<'a, P: Borrow<Path<'a>>>(
    path: P,
    input_channel: i64,
    output_channel: i64,
    kernel: i64,
    stride: i64,
    padding: i64,
    groups: Option<i64>,
    bias: bool,
) -> nn::Conv2D {
    let mut config = nn::ConvConfig { stride, padding, bias, ..Default::default() };
    if let Some(g) = groups {
        config.groups = g;
    }
    nn::conv2d(path, input_channel, output_channel, kernel, config)
}

/// Batch-norm layer
fn norm_layer<'a, P: Borrow<Path<'a>>>(path: P, channel: i64) -> nn::BatchNorm {
    nn::batch_norm2d(path, channel, Default::default())
}

fn activation(xs: &Tensor, nl: NL) -> Tensor {
    match nl {
        NL::ReLU => xs.relu(),
        NL::HSwish => h_swish(xs),
    }
}

/// H-Sigmoid activation
fn h_sigmoid(xs: &Tensor) -> Tensor {
    (xs + 3.).relu().clamp_max(6.) / 6.
}

/// H-Swish activation
fn h_swish(xs: &Tensor) -> Tensor {
    xs * h_sigmoid(xs)
}

/// Main model building function, expects NCHW inputs and returns logits.
fn build_mobilenet_v3(
    path: &Path,
    input_channel: i64,
    n_classes: i64,
    config: &MobileNetV3Config,
    variant: Variant,
) -> impl ModuleT {
    assert!(
        input_channel.is_positive(),
        "input_channel must be positive integer, but get {input_channel}"
    );
    assert!(n_classes.is_positive(), "n_classes must be positive integer, but get {n_classes}");
    assert!(
        (0.0..1.0).contains(&config.dropout),
        "dropout should be in [0, 1), but get {}",
        config.dropout
    );
    assert!(
        config.width_mult > 0.,
        "width_mult should be positive, but get {}",
        config.width_mult
    );

    let width_mult = config.width_mult;
    let multiplied_channel = |val: i64| make_divisible(val as f64 * width_mult);

    // Stem
    let mut c_in = multiplied_channel(16);
    let conv_stem = conv_layer(path / "conv_stem", input_channel, c_in, 3, 2, 1, None, false);
    let bn1 = norm_layer(path / "bn1", c_in);

    // Mobile blocks
    let mut blocks = nn::seq_t();
    for (stage_idx, stage) in stages(variant).into_iter().enumerate() {
        let path_stage = path.sub("blocks").sub(stage_idx);
        for (block_idx, (kind, k, exp, c, se, nl, s)) in stage.into_iter().enumerate() {
            let path_block = &path_stage / block_idx;
            let c_out = multiplied_channel(c);
            blocks = match kind {
                BlockKind::DepthwiseSeparable => {
                    blocks.add(depthwise_separable(&path_block, c_in, c_out, k, s, se, nl))
                }
                BlockKind::InvertedResidual => {
                    let c_exp = make_divisible(c_in as f64 * exp);
                    blocks.add(inverted_residual(&path_block, c_in, c_out, k, s, c_exp, se, nl))
                }
                BlockKind::ConvBnAct => blocks.add(conv_bn_act(&path_block, c_in, c_out, nl)),
            };
            c_in = c_out;
        }
    }

    // Head
    let num_features = variant.num_features();
    let conv_head = conv_layer(path / "conv_head", c_in, num_features, 1, 1, 0, None, true);
    let classifier = nn::linear(path / "classifier", num_features, n_classes, Default::default());
    let dropout = config.dropout;

    nn::func_t(move |xs, train| {
        let features = h_swish(&xs.apply(&conv_stem).apply_t(&bn1, train))
            .apply_t(&blocks, train)
            .adaptive_avg_pool2d([1, 1])
            .apply(&conv_head);
        h_swish(&features)
            .flatten(1, -1)
            .dropout(dropout, train)
            .apply(&classifier)
    })
}

/// Build large MobileNetV3 model
pub fn v3_large(
    path: &Path,
    input_channel: i64,
    n_classes: i64,
    config: &MobileNetV3Config,
) -> impl ModuleT {
    build_mobilenet_v3(path, input_channel, n_classes, config, Variant::Large)
}

/// Build small MobileNetV3 model
pub fn v3_small(
    path: &Path,
    input_channel: i64,
    n_classes: i64,
    config: &MobileNetV3Config,
) -> impl ModuleT {
    build_mobilenet_v3(path, input_channel, n_classes, config, Variant::Small)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divisible_channels() {
        assert_eq!(make_divisible(16. * 0.25), 8);
        assert_eq!(make_divisible(24. * 3.67), 88);
        assert_eq!(make_divisible(240. * 0.25), 64);
        assert_eq!(make_divisible(120. * 0.25), 32);
        assert_eq!(make_divisible(80. * 2.3), 184);
        assert_eq!(make_divisible(72. * 0.25), 24);
    }
}
