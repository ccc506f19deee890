use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw prediction request as it arrives over the wire.
///
/// Every field is kept as an untyped JSON value: the browser form posts
/// strings ("3", "22", "") while API clients post numbers, and both must be
/// accepted. `features::encode_query` does the coercion.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PassengerQuery {
    #[serde(default)]
    pub pclass: Option<Value>,
    #[serde(default)]
    pub sex: Option<Value>,
    #[serde(default)]
    pub age: Option<Value>,
    #[serde(default)]
    pub embarked: Option<Value>,
}

/// Model input, in training column order:
/// `[Pclass, Sex, Age, Fare, Embarked_C, Embarked_Q, Embarked_S]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector(pub [f64; FeatureVector::LEN]);

impl FeatureVector {
    pub const LEN: usize = 7;

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn passenger_class(&self) -> f64 {
        self.0[0]
    }

    pub fn sex(&self) -> f64 {
        self.0[1]
    }

    pub fn age(&self) -> f64 {
        self.0[2]
    }

    pub fn fare(&self) -> f64 {
        self.0[3]
    }

    /// Port indicators `[C, Q, S]`.
    pub fn ports(&self) -> [f64; 3] {
        [self.0[4], self.0[5], self.0[6]]
    }
}

/// Survival percentage in [0, 100], two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionResult {
    pub survival_percentage: f64,
}

#[derive(Debug, Serialize)]
pub struct UsageHint {
    pub message: &'static str,
    pub example: ExamplePayload,
}

#[derive(Debug, Serialize)]
pub struct ExamplePayload {
    pub pclass: u8,
    pub sex: &'static str,
    pub age: u8,
    pub embarked: &'static str,
}

impl Default for UsageHint {
    fn default() -> Self {
        Self {
            message: "Use POST with a JSON body to get a survival prediction.",
            example: ExamplePayload {
                pclass: 3,
                sex: "male",
                age: 22,
                embarked: "S",
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}
