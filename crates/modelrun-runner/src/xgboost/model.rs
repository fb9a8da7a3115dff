//! Tree-ensemble evaluation over the XGBoost JSON model format
//!
//! Only the parts of the document needed for prediction are interpreted.
//! The parsed document is kept as-is so a loaded model saves back
//! byte-for-byte equivalent JSON.

use super::dmatrix::DMatrix;
use crate::adapter::{AdapterError, Predictions};
use rayon::ThreadPool;
use rayon::prelude::*;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Objectives whose output transform is implemented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    SquaredError,
    Logistic,
    LogitRaw,
    Poisson,
    SoftProb,
    SoftMax,
}

impl Objective {
    pub fn from_name(name: &str) -> Result<Self, AdapterError> {
        match name {
            "reg:squarederror" | "reg:linear" => Ok(Self::SquaredError),
            "reg:logistic" | "binary:logistic" => Ok(Self::Logistic),
            "binary:logitraw" => Ok(Self::LogitRaw),
            "count:poisson" => Ok(Self::Poisson),
            "multi:softprob" => Ok(Self::SoftProb),
            "multi:softmax" => Ok(Self::SoftMax),
            other => Err(AdapterError::Load(format!("unsupported objective {other:?}"))),
        }
    }

    fn is_multiclass(self) -> bool {
        matches!(self, Self::SoftProb | Self::SoftMax)
    }

    /// `base_score` is stored in output space; trees add to margin space.
    fn base_margin(self, base_score: f64) -> f64 {
        match self {
            Self::Logistic | Self::LogitRaw => -(1.0 / base_score - 1.0).ln(),
            Self::Poisson => base_score.ln(),
            _ => base_score,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelDoc {
    learner: LearnerDoc,
    #[serde(default)]
    version: Vec<u32>,
}

#[derive(Debug, Deserialize)]
struct LearnerDoc {
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBoosterDoc,
    learner_model_param: ModelParamDoc,
    objective: ObjectiveDoc,
}

#[derive(Debug, Deserialize)]
struct GradientBoosterDoc {
    name: String,
    model: Option<TreesDoc>,
}

#[derive(Debug, Deserialize)]
struct TreesDoc {
    trees: Vec<TreeDoc>,
    #[serde(default)]
    tree_info: Vec<i64>,
}

#[derive(Debug, Deserialize)]
struct TreeDoc {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    #[serde(deserialize_with = "flags")]
    default_left: Vec<bool>,
    /// Per-node split kind: 0 numeric, 1 categorical
    #[serde(default)]
    split_type: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ModelParamDoc {
    #[serde(deserialize_with = "lenient_number")]
    base_score: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    num_class: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    num_feature: f64,
}

#[derive(Debug, Deserialize)]
struct ObjectiveDoc {
    name: String,
}

/// Numbers are written as JSON strings, sometimes wrapped in brackets
/// (`"5E-1"`, `"[5E-1]"`).
fn lenient_number<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
    use serde::de::Error;
    match Value::deserialize(de)? {
        Value::Number(n) => n.as_f64().ok_or_else(|| D::Error::custom("number out of range")),
        Value::String(s) => {
            let trimmed = s.trim().trim_start_matches('[').trim_end_matches(']');
            trimmed
                .parse()
                .map_err(|_| D::Error::custom(format!("invalid number {s:?}")))
        }
        other => Err(D::Error::custom(format!("expected a number, got {other}"))),
    }
}

/// `default_left` is a list of booleans or of 0/1 integers depending on the writer.
fn flags<'de, D: Deserializer<'de>>(de: D) -> Result<Vec<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
    }
    let raw = Vec::<Flag>::deserialize(de)?;
    Ok(raw
        .into_iter()
        .map(|f| match f {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        })
        .collect())
}

#[derive(Debug, Clone)]
struct Tree {
    left: Vec<i32>,
    right: Vec<i32>,
    feature: Vec<u32>,
    threshold: Vec<f32>,
    default_left: Vec<bool>,
}

impl Tree {
    fn from_doc(index: usize, doc: TreeDoc, num_feature: usize) -> Result<Self, AdapterError> {
        let n = doc.left_children.len();
        let lengths = [
            doc.right_children.len(),
            doc.split_indices.len(),
            doc.split_conditions.len(),
            doc.default_left.len(),
        ];
        if n == 0 || lengths.iter().any(|&len| len != n) {
            return Err(AdapterError::Load(format!(
                "tree {index} has inconsistent node arrays"
            )));
        }

        if doc.split_type.iter().any(|&kind| kind != 0) {
            return Err(AdapterError::Load(format!(
                "tree {index}: categorical splits are not supported"
            )));
        }

        for node in 0..n {
            let left = doc.left_children[node];
            if left == -1 {
                continue;
            }
            let right = doc.right_children[node];
            // Children always come after their parent, so traversal terminates.
            for child in [left, right] {
                if child <= node as i32 || child as usize >= n {
                    return Err(AdapterError::Load(format!(
                        "tree {index} node {node} has invalid child {child}"
                    )));
                }
            }
            let feature = doc.split_indices[node] as usize;
            if num_feature > 0 && feature >= num_feature {
                return Err(AdapterError::Load(format!(
                    "tree {index} node {node} splits on feature {feature} of {num_feature}"
                )));
            }
        }

        Ok(Self {
            left: doc.left_children,
            right: doc.right_children,
            feature: doc.split_indices,
            threshold: doc.split_conditions,
            default_left: doc.default_left,
        })
    }

    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut node = 0;
        loop {
            let left = self.left[node];
            if left == -1 {
                return self.threshold[node];
            }
            let value = row
                .get(self.feature[node] as usize)
                .copied()
                .unwrap_or(f32::NAN);
            let go_left = if value.is_nan() {
                self.default_left[node]
            } else {
                value < self.threshold[node]
            };
            let next = if go_left { left } else { self.right[node] };
            node = next as usize;
        }
    }
}

/// A parsed gradient-boosted tree ensemble
#[derive(Debug, Clone)]
pub struct Booster {
    raw: Value,
    trees: Vec<Tree>,
    groups: Vec<usize>,
    num_groups: usize,
    objective: Objective,
    base_margin: f32,
    num_feature: usize,
    feature_names: Vec<String>,
    version: Option<String>,
}

impl Booster {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AdapterError> {
        Self::from_value(serde_json::from_slice(bytes)?)
    }

    pub fn from_value(raw: Value) -> Result<Self, AdapterError> {
        let doc = ModelDoc::deserialize(&raw)?;
        let learner = doc.learner;

        let objective = Objective::from_name(&learner.objective.name)?;
        let params = learner.learner_model_param;
        let num_feature = params.num_feature.max(0.0) as usize;
        let num_class = params.num_class.max(0.0) as usize;
        if objective.is_multiclass() && num_class < 2 {
            return Err(AdapterError::Load(format!(
                "{} requires num_class >= 2, got {num_class}",
                learner.objective.name
            )));
        }
        let num_groups = num_class.max(1);

        let booster = learner.gradient_booster;
        let model = booster.model.ok_or_else(|| {
            AdapterError::Load(format!("unsupported booster {:?}", booster.name))
        })?;

        let groups = if model.tree_info.is_empty() {
            (0..model.trees.len()).map(|t| t % num_groups).collect()
        } else {
            if model.tree_info.len() != model.trees.len() {
                return Err(AdapterError::Load(
                    "tree_info does not match the number of trees".into(),
                ));
            }
            model
                .tree_info
                .iter()
                .map(|&g| match usize::try_from(g) {
                    Ok(g) if g < num_groups => Ok(g),
                    _ => Err(AdapterError::Load(format!("invalid tree group {g}"))),
                })
                .collect::<Result<Vec<_>, _>>()?
        };

        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(i, doc)| Tree::from_doc(i, doc, num_feature))
            .collect::<Result<Vec<_>, _>>()?;

        let base_margin = objective.base_margin(params.base_score);
        if !base_margin.is_finite() {
            return Err(AdapterError::Load(format!(
                "base_score {} is outside the objective's range",
                params.base_score
            )));
        }

        let version = (!doc.version.is_empty()).then(|| {
            doc.version
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join(".")
        });

        Ok(Self {
            raw,
            trees,
            groups,
            num_groups,
            objective,
            base_margin: base_margin as f32,
            num_feature,
            feature_names: learner.feature_names,
            version,
        })
    }

    pub fn load(path: &Path) -> Result<Self, AdapterError> {
        Self::from_slice(&fs::read(path)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), AdapterError> {
        fs::write(path, serde_json::to_vec(&self.raw)?)?;
        Ok(())
    }

    pub fn objective(&self) -> Objective {
        self.objective
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Version of the library that wrote the model, e.g. `1.7.6`
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Output values per row
    pub fn output_width(&self) -> usize {
        match self.objective {
            Objective::SoftProb => self.num_groups,
            _ => 1,
        }
    }

    fn check_input(&self, dm: &DMatrix) -> Result<(), AdapterError> {
        if self.num_feature > 0 && dm.cols() != self.num_feature {
            return Err(AdapterError::InvalidInput(format!(
                "batch has {} features, model expects {}",
                dm.cols(),
                self.num_feature
            )));
        }
        if let Some(names) = dm.feature_names() {
            if !self.feature_names.is_empty() && names != self.feature_names.as_slice() {
                return Err(AdapterError::InvalidInput(format!(
                    "feature names {names:?} do not match model features {:?}",
                    self.feature_names
                )));
            }
        }
        Ok(())
    }

    fn margins(&self, row: &[f32], out: &mut [f32]) {
        out.fill(self.base_margin);
        for (tree, &group) in self.trees.iter().zip(&self.groups) {
            out[group] += tree.leaf_value(row);
        }
    }

    fn predict_row(&self, row: &[f32], out: &mut [f32]) {
        match self.objective {
            Objective::SoftProb => {
                self.margins(row, out);
                softmax(out);
            }
            Objective::SoftMax => {
                let mut margins = vec![0.0; self.num_groups];
                self.margins(row, &mut margins);
                out[0] = argmax(&margins) as f32;
            }
            objective => {
                self.margins(row, out);
                out[0] = match objective {
                    Objective::Logistic => sigmoid(out[0]),
                    Objective::Poisson => out[0].exp(),
                    _ => out[0],
                };
            }
        }
    }

    /// Evaluate rows one after another on the calling thread
    pub fn predict(&self, dm: &DMatrix) -> Result<Predictions, AdapterError> {
        self.check_input(dm)?;
        let width = self.output_width();
        let mut values = vec![0.0; dm.rows() * width];
        for (r, out) in values.chunks_mut(width).enumerate() {
            self.predict_row(dm.row(r), out);
        }
        Predictions::with_shape(dm.rows(), width, values)
    }

    /// Evaluate rows in parallel on `pool`; same output as [`predict`](Self::predict)
    pub fn predict_parallel(
        &self,
        dm: &DMatrix,
        pool: &ThreadPool,
    ) -> Result<Predictions, AdapterError> {
        self.check_input(dm)?;
        let width = self.output_width();
        let mut values = vec![0.0; dm.rows() * width];
        pool.install(|| {
            values
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(r, out)| self.predict_row(dm.row(r), out));
        });
        Predictions::with_shape(dm.rows(), width, values)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn softmax(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 { (i, v) } else { best }
        })
        .0
}
