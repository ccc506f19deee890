use std::sync::Arc;
use thiserror::Error;

use crate::features::{self, ValidationError};
use crate::model::{Classifier, InferenceError};
use crate::types::{FeatureVector, PassengerQuery, PredictionResult};

#[derive(Debug, Error)]
pub enum PredictError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
}

/// Encoder + model. Cheap to clone; the model is shared.
#[derive(Clone)]
pub struct PredictionService {
    model: Arc<dyn Classifier>,
    log_predictions: bool,
}

impl PredictionService {
    pub fn new(model: Arc<dyn Classifier>) -> Self {
        Self {
            model,
            log_predictions: false,
        }
    }

    pub fn with_prediction_logging(mut self, on: bool) -> Self {
        self.log_predictions = on;
        self
    }

    pub fn describe_model(&self) -> String {
        self.model.describe()
    }

    pub fn predict(&self, query: &PassengerQuery) -> Result<PredictionResult, PredictError> {
        let fv = features::encode_query(query)?;
        let result = self.predict_features(&fv)?;
        if self.log_predictions {
            tracing::info!(
                "predict features={:?} survival_percentage={:.2}",
                fv.as_slice(),
                result.survival_percentage
            );
        }
        Ok(result)
    }

    pub fn predict_features(&self, fv: &FeatureVector) -> Result<PredictionResult, InferenceError> {
        let p = self.model.predict_probability(fv)?;
        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(InferenceError(format!(
                "model returned out-of-range probability {p}"
            )));
        }
        Ok(PredictionResult {
            survival_percentage: to_percentage(p)?,
        })
    }
}

/// `round(p * 100, 2)`, kept within [0, 100].
///
/// Rounds the exact decimal expansion of `p * 100` (ties to even), so
/// 0.00125 gives 0.12 rather than 0.13.
pub fn to_percentage(p: f64) -> Result<f64, InferenceError> {
    format!("{:.2}", p * 100.0)
        .parse::<f64>()
        .map(|pct| pct.clamp(0.0, 100.0))
        .map_err(|e| InferenceError(format!("cannot round {p}: {e}")))
}
