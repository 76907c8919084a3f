//! ImageNet label table and prediction decoding.
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tch::{Kind, Tensor};

use crate::config::Config;
use crate::download;
use crate::error::{Error, Result};

/// Number of classes of the ILSVRC-2012 label set.
pub const CLASS_COUNT: i64 = 1000;

const CLASS_INDEX_FILE: &str = "imagenet_class_index.json";

/// A decoded class with its probability.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub index: i64,
    /// WordNet id such as `n02487347`.
    pub class_name: String,
    /// Human readable label such as `macaque`.
    pub description: String,
    pub score: f64,
}

/// Ordered `(class_name, description)` pairs indexed by class id.
#[derive(Debug, Clone)]
pub struct ImagenetClasses {
    classes: Vec<(String, String)>,
}

impl ImagenetClasses {
    pub fn new(classes: Vec<(String, String)>) -> Self {
        ImagenetClasses { classes }
    }

    /// Parses a class index in the `{"0": ["n01440764", "tench"], ...}` format.
    pub fn load<T: AsRef<Path>>(path: T) -> Result<Self> {
        let reader = BufReader::new(File::open(path.as_ref())?);
        let raw: BTreeMap<String, (String, String)> = serde_json::from_reader(reader)?;
        let mut indexed = raw
            .into_iter()
            .map(|(idx, entry)| match idx.parse::<usize>() {
                Ok(idx) => Ok((idx, entry)),
                Err(_) => Err(Error::Config(format!("class id {idx:?} is not an integer"))),
            })
            .collect::<Result<Vec<_>>>()?;
        if indexed.is_empty() {
            return Err(Error::Config("class index is empty".to_string()));
        }
        indexed.sort_by_key(|(idx, _)| *idx);
        for (expected, (idx, _)) in indexed.iter().enumerate() {
            if *idx != expected {
                return Err(Error::Config(format!("class index is missing id {expected}")));
            }
        }
        Ok(Self::new(indexed.into_iter().map(|(_, entry)| entry).collect()))
    }

    /// Returns the ImageNet class index, downloading it on first use.
    pub fn fetch(config: &Config) -> Result<Self> {
        let path = download::cached_file(
            config,
            "labels",
            CLASS_INDEX_FILE,
            &config.labels_url,
            download::validate_json,
        )?;
        Self::load(path)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, index: i64) -> Option<(&str, &str)> {
        let (name, description) = self.classes.get(usize::try_from(index).ok()?)?;
        Some((name.as_str(), description.as_str()))
    }
}

/// Returns the index of the highest probability of each row.
pub fn argmax(probs: &Tensor) -> Result<Vec<i64>> {
    let indexes = probs.f_argmax(-1, false)?;
    Ok(Vec::<i64>::try_from(&indexes.view([-1]))?)
}

/// Returns the `k` most likely `(probability, index)` pairs of a single row.
pub fn top(probs: &Tensor, k: i64) -> Result<Vec<(f64, i64)>> {
    let probs = match probs.size().as_slice() {
        [_] => probs.shallow_clone(),
        [1, _] => probs.squeeze_dim(0),
        size => return Err(Error::Shape(format!("expected a single row, got {size:?}"))),
    };
    let (values, indexes) = probs.f_topk(k, -1, true, true)?;
    let values = Vec::<f64>::try_from(&values.to_kind(Kind::Double))?;
    let indexes = Vec::<i64>::try_from(&indexes)?;
    Ok(values.into_iter().zip(indexes).collect())
}

/// Decodes the `top` best classes of every row of a `[N, classes]` tensor.
///
/// Rows are returned in input order, classes in descending score order.
pub fn decode_predictions(
    probs: &Tensor,
    classes: &ImagenetClasses,
    top_k: i64,
) -> Result<Vec<Vec<Prediction>>> {
    let size = probs.size();
    if size.len() != 2 || size[1] == 0 || size[1] != classes.len() as i64 {
        return Err(Error::Shape(format!(
            "expected a batch of predictions of shape [N, {}], got {size:?}",
            classes.len()
        )));
    }
    let top_k = top_k.clamp(1, size[1]);
    (0..size[0])
        .map(|row| {
            top(&probs.get(row), top_k)?
                .into_iter()
                .map(|(score, index)| {
                    let (class_name, description) = classes
                        .get(index)
                        .ok_or_else(|| Error::Shape(format!("no label for class {index}")))?;
                    Ok(Prediction {
                        index,
                        class_name: class_name.to_string(),
                        description: description.to_string(),
                        score,
                    })
                })
                .collect()
        })
        .collect()
}
