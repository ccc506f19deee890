use parking_lot::Mutex;
use std::path::Path;
use tch::{kind::Kind, CModule, Device, IndexOp, Tensor};

use crate::model::{Classifier, InferenceError, ModelLoadError};
use crate::types::FeatureVector;

/// TorchScript classifier. Output is either `[1, 2]` logits or a single
/// `[1, 1]` logit for the positive class.
pub struct TorchModel {
    model: Mutex<CModule>,
    device: Device,
    n_out: i64,
    source: String,
}

impl TorchModel {
    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let device = Device::Cpu;
        let model = CModule::load_on_device(path, device).map_err(|e| {
            ModelLoadError::Invalid(format!("failed to load TorchScript {}: {}", path.display(), e))
        })?;

        // Probe output shape with a dummy forward
        let dummy = Tensor::zeros([1, FeatureVector::LEN as i64], (Kind::Float, device));
        let out = tch::no_grad(|| model.forward_ts(&[dummy]))
            .map_err(|e| ModelLoadError::Invalid(format!("probe forward failed: {}", e)))?;
        let sz = out.size();
        if sz.len() != 2 || sz[0] != 1 || !(sz[1] == 1 || sz[1] == 2) {
            return Err(ModelLoadError::Invalid(format!(
                "unexpected model output size: {:?}",
                sz
            )));
        }

        Ok(Self {
            model: Mutex::new(model),
            device,
            n_out: sz[1],
            source: path.display().to_string(),
        })
    }
}

impl Classifier for TorchModel {
    fn predict_probability(&self, x: &FeatureVector) -> Result<f64, InferenceError> {
        let row: Vec<f32> = x.as_slice().iter().map(|v| *v as f32).collect();
        let input = Tensor::from_slice(&row)
            .reshape([1, FeatureVector::LEN as i64])
            .to_device(self.device);

        let out = {
            let model = self.model.lock();
            tch::no_grad(|| model.forward_ts(&[input]))
                .map_err(|e| InferenceError(e.to_string()))?
        };

        let p = if self.n_out == 2 {
            out.softmax(1, Kind::Float).i((0, 1))
        } else {
            out.sigmoid().i((0, 0))
        };
        Ok(p.double_value(&[]))
    }

    fn describe(&self) -> String {
        format!("torchscript module {} ({} outputs)", self.source, self.n_out)
    }
}
