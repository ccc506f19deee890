use serde::Deserialize;
use std::{fs, path::Path, sync::Arc};
use thiserror::Error;

use crate::types::FeatureVector;

#[derive(Debug, Error)]
#[error("inference failed: {0}")]
pub struct InferenceError(pub String);

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to read model at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse model {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid model: {0}")]
    Invalid(String),
    #[error("unsupported model format: {0}")]
    Unsupported(String),
}

/// Binary classifier returning P(survived).
///
/// Loaded once at startup and shared read-only across handlers.
pub trait Classifier: Send + Sync {
    fn predict_probability(&self, x: &FeatureVector) -> Result<f64, InferenceError>;

    /// Short human-readable summary for logs and the health endpoint.
    fn describe(&self) -> String;
}

/// Picks the backend from the file extension.
pub fn load_model(path: impl AsRef<Path>) -> Result<Arc<dyn Classifier>, ModelLoadError> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "json" => Ok(Arc::new(ForestModel::load(path)?)),
        #[cfg(feature = "torch")]
        "pt" | "ts" => Ok(Arc::new(crate::torch_model::TorchModel::load(path)?)),
        #[cfg(not(feature = "torch"))]
        "pt" | "ts" => Err(ModelLoadError::Unsupported(format!(
            "{} is a TorchScript module; rebuild with --features torch",
            path.display()
        ))),
        other => Err(ModelLoadError::Unsupported(format!(
            "unknown extension {:?} for {}",
            other,
            path.display()
        ))),
    }
}

// ---------- Random forest ----------

/// One fitted decision tree in flat array form (node 0 is the root,
/// `-1` in `children_left` marks a leaf).
#[derive(Debug, Clone, Deserialize)]
pub struct Tree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights `[died, survived]`.
    pub value: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForestModel {
    pub n_features: usize,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub trees: Vec<Tree>,
}

impl ForestModel {
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let txt = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&txt).map_err(|e| match e {
            ModelLoadError::Parse { source, .. } => ModelLoadError::Parse {
                path: path.display().to_string(),
                source,
            },
            other => other,
        })
    }

    pub fn from_json(txt: &str) -> Result<Self, ModelLoadError> {
        let forest: ForestModel =
            serde_json::from_str(txt).map_err(|source| ModelLoadError::Parse {
                path: "<inline>".to_string(),
                source,
            })?;
        forest.validate()?;
        Ok(forest)
    }

    /// Structural checks; a forest that passes always terminates and never
    /// indexes out of bounds.
    pub fn validate(&self) -> Result<(), ModelLoadError> {
        let invalid = |msg: String| Err(ModelLoadError::Invalid(msg));

        if self.n_features != FeatureVector::LEN {
            return invalid(format!(
                "model expects {} features, encoder produces {}",
                self.n_features,
                FeatureVector::LEN
            ));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.n_features {
                return invalid(format!(
                    "feature_names has {} entries, n_features is {}",
                    names.len(),
                    self.n_features
                ));
            }
        }
        if self.trees.is_empty() {
            return invalid("forest has no trees".to_string());
        }

        for (t, tree) in self.trees.iter().enumerate() {
            let n = tree.children_left.len();
            if n == 0 {
                return invalid(format!("tree {t} has no nodes"));
            }
            if tree.children_right.len() != n
                || tree.feature.len() != n
                || tree.threshold.len() != n
                || tree.value.len() != n
            {
                return invalid(format!("tree {t} has arrays of different lengths"));
            }
            for i in 0..n {
                let (l, r) = (tree.children_left[i], tree.children_right[i]);
                let [w0, w1] = tree.value[i];
                if !(w0.is_finite() && w1.is_finite() && w0 >= 0.0 && w1 >= 0.0) {
                    return invalid(format!("tree {t} node {i} has bad class weights"));
                }
                if l == -1 && r == -1 {
                    continue;
                }
                let in_range = |c: i64| c > i as i64 && (c as usize) < n;
                if !in_range(l) || !in_range(r) {
                    return invalid(format!("tree {t} node {i} has bad children ({l}, {r})"));
                }
                let f = tree.feature[i];
                if f < 0 || f as usize >= self.n_features {
                    return invalid(format!("tree {t} node {i} splits on feature {f}"));
                }
                if !tree.threshold[i].is_finite() {
                    return invalid(format!("tree {t} node {i} has non-finite threshold"));
                }
            }
        }
        Ok(())
    }

    /// Mean over trees of the leaf's class-1 share.
    pub fn proba(&self, x: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.leaf_proba(x)).sum();
        sum / self.trees.len() as f64
    }
}

impl Tree {
    fn leaf_proba(&self, x: &[f64]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != -1 {
            let f = self.feature[node] as usize;
            // splits were learned on f32 inputs
            let v = x[f] as f32 as f64;
            node = if v <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        let [died, survived] = self.value[node];
        let total = died + survived;
        if total > 0.0 {
            survived / total
        } else {
            0.0
        }
    }
}

impl Classifier for ForestModel {
    fn predict_probability(&self, x: &FeatureVector) -> Result<f64, InferenceError> {
        let p = self.proba(x.as_slice());
        if p.is_finite() {
            Ok(p)
        } else {
            Err(InferenceError(format!("forest produced {p}")))
        }
    }

    fn describe(&self) -> String {
        let depth = self.trees.iter().map(Tree::depth).max().unwrap_or(0);
        format!(
            "random forest ({} trees, max depth {}, {} features)",
            self.trees.len(),
            depth,
            self.n_features
        )
    }
}

impl Tree {
    fn depth(&self) -> usize {
        // children always have larger indices, so one forward pass suffices
        let mut d = vec![0usize; self.children_left.len()];
        let mut max = 0;
        for i in 0..d.len() {
            max = max.max(d[i]);
            if self.children_left[i] != -1 {
                d[self.children_left[i] as usize] = d[i] + 1;
                d[self.children_right[i] as usize] = d[i] + 1;
            }
        }
        max
    }
}
