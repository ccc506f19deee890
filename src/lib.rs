//! Titanic survival prediction service.
//!
//! Raw passenger fields are coerced into the 7-column feature vector the
//! classifier was trained on, scored by a model loaded once at startup, and
//! returned as a survival percentage over HTTP.
//!
//! The model artifact is a JSON export of a fitted random forest: one entry
//! per tree holding its `children_left`, `children_right`, `feature`,
//! `threshold` and `value` arrays, as found on a scikit-learn estimator's
//! `tree_`. `models/titanic_model.json` is a two-tree sample in that format
//! so the default `MODEL_PATH` starts; swap in the real export for serving.

pub mod config;
pub mod features;
pub mod http;
pub mod model;
pub mod service;
#[cfg(feature = "torch")]
pub mod torch_model;
pub mod types;

pub use features::{encode, encode_query, ValidationError, DEFAULT_AGE};
pub use model::{load_model, Classifier, ForestModel, InferenceError, ModelLoadError};
pub use service::{PredictError, PredictionService};
pub use types::{FeatureVector, PassengerQuery, PredictionResult};
