//! Request fields -> model feature vector.

use serde_json::Value;
use thiserror::Error;

use crate::types::{FeatureVector, PassengerQuery};

/// Mean passenger age in the training set, used when no age is given.
pub const DEFAULT_AGE: f64 = 29.69911764705882;

/// Average fare per ticket class.
pub const FARE_MAP: [(i64, f64); 3] = [(1, 84.15), (2, 20.66), (3, 13.68)];

/// Fare for classes outside `FARE_MAP` (the class-3 value).
pub const DEFAULT_FARE: f64 = 13.68;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),
    #[error("pclass must be an integer, got {0}")]
    InvalidClass(String),
    #[error("age must be a non-negative number, got {0}")]
    InvalidAge(String),
    #[error("{0} must be a string")]
    NotAString(&'static str),
}

/// A request after coercion to strict types.
#[derive(Debug, Clone, PartialEq)]
pub struct Passenger {
    pub passenger_class: i64,
    pub sex: String,
    pub age: Option<f64>,
    pub embarked_port: String,
}

impl Passenger {
    pub fn from_query(q: &PassengerQuery) -> Result<Self, ValidationError> {
        let missing: Vec<&'static str> = [
            ("pclass", q.pclass.as_ref()),
            ("sex", q.sex.as_ref()),
            ("embarked", q.embarked.as_ref()),
        ]
        .into_iter()
        .filter(|(_, v)| is_blank(*v))
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        // All three are present past this point.
        let passenger_class = parse_class(q.pclass.as_ref().unwrap_or(&Value::Null))?;
        let sex = string_field("sex", q.sex.as_ref())?;
        let age = if is_blank(q.age.as_ref()) {
            None
        } else {
            Some(parse_age(q.age.as_ref().unwrap_or(&Value::Null))?)
        };
        let embarked_port = string_field("embarked", q.embarked.as_ref())?;

        Ok(Self {
            passenger_class,
            sex,
            age,
            embarked_port,
        })
    }
}

/// Fare for a ticket class; unknown classes fall back to `DEFAULT_FARE`.
pub fn fare_for_class(passenger_class: i64) -> f64 {
    FARE_MAP
        .iter()
        .find(|(class, _)| *class == passenger_class)
        .map(|(_, fare)| *fare)
        .unwrap_or(DEFAULT_FARE)
}

/// Builds the model input. Infallible: out-of-domain sex encodes as male and
/// an unknown port leaves all three port indicators at zero.
pub fn encode(p: &Passenger) -> FeatureVector {
    let sex_encoded = if p.sex.trim().eq_ignore_ascii_case("female") {
        1.0
    } else {
        0.0
    };
    let port = p.embarked_port.as_str();
    let flag = |code: &str| if port == code { 1.0 } else { 0.0 };

    FeatureVector([
        p.passenger_class as f64,
        sex_encoded,
        p.age.unwrap_or(DEFAULT_AGE),
        fare_for_class(p.passenger_class),
        flag("C"),
        flag("Q"),
        flag("S"),
    ])
}

pub fn encode_query(q: &PassengerQuery) -> Result<FeatureVector, ValidationError> {
    Passenger::from_query(q).map(|p| encode(&p))
}

fn is_blank(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

fn parse_class(v: &Value) -> Result<i64, ValidationError> {
    let invalid = || ValidationError::InvalidClass(v.to_string());
    match v {
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Ok(i),
            (None, Some(f)) if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Ok(f as i64)
            }
            _ => Err(invalid()),
        },
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

fn parse_age(v: &Value) -> Result<f64, ValidationError> {
    let age = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match age {
        Some(a) if a.is_finite() && a >= 0.0 => Ok(a),
        _ => Err(ValidationError::InvalidAge(v.to_string())),
    }
}

fn string_field(name: &'static str, v: Option<&Value>) -> Result<String, ValidationError> {
    match v {
        Some(Value::String(s)) => Ok(s.clone()),
        _ => Err(ValidationError::NotAString(name)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(v: Value) -> PassengerQuery {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn third_class_male_from_southampton() {
        let fv = encode_query(&query(json!({"pclass": 3, "sex": "male", "age": 22, "embarked": "S"})))
            .unwrap();
        assert_eq!(fv.0, [3.0, 0.0, 22.0, 13.68, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn first_class_female_without_age() {
        let fv = encode_query(&query(json!({"pclass": 1, "sex": "female", "embarked": "C"}))).unwrap();
        assert_eq!(fv.0, [1.0, 1.0, DEFAULT_AGE, 84.15, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn form_strings_are_coerced() {
        let fv = encode_query(&query(
            json!({"pclass": " 2 ", "sex": "FeMaLe", "age": "", "embarked": "Q"}),
        ))
        .unwrap();
        assert_eq!(fv.0, [2.0, 1.0, DEFAULT_AGE, 20.66, 0.0, 1.0, 0.0]);

        let fv = encode_query(&query(json!({"pclass": 2.0, "sex": "male", "age": "4.5", "embarked": "S"})))
            .unwrap();
        assert_eq!(fv.age(), 4.5);
        assert_eq!(fv.passenger_class(), 2.0);
    }

    #[test]
    fn null_age_uses_default() {
        let fv = encode_query(&query(json!({"pclass": 3, "sex": "male", "age": null, "embarked": "S"})))
            .unwrap();
        assert_eq!(fv.age(), DEFAULT_AGE);
    }

    #[test]
    fn zero_age_is_kept() {
        let fv = encode_query(&query(json!({"pclass": 3, "sex": "male", "age": 0, "embarked": "S"})))
            .unwrap();
        assert_eq!(fv.age(), 0.0);
    }

    #[test]
    fn missing_fields_are_listed_together() {
        let err = encode_query(&query(json!({"sex": "", "age": 30}))).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["pclass", "sex", "embarked"])
        );
        assert_eq!(err.to_string(), "missing required fields: pclass, sex, embarked");
    }

    #[test]
    fn bad_class_and_age_are_rejected() {
        let bad_class = [json!("first"), json!(2.5), json!(true), json!([1])];
        for pclass in bad_class {
            let err = encode_query(&query(json!({"pclass": pclass, "sex": "male", "embarked": "S"})))
                .unwrap_err();
            assert!(matches!(err, ValidationError::InvalidClass(_)), "{err}");
        }

        let bad_age = [json!(-1), json!("old"), json!("NaN"), json!({"y": 3})];
        for age in bad_age {
            let err = encode_query(&query(
                json!({"pclass": 1, "sex": "male", "age": age, "embarked": "S"}),
            ))
            .unwrap_err();
            assert!(matches!(err, ValidationError::InvalidAge(_)), "{err}");
        }
    }

    #[test]
    fn non_string_sex_or_port_is_rejected() {
        let err = encode_query(&query(json!({"pclass": 1, "sex": 1, "embarked": "S"}))).unwrap_err();
        assert_eq!(err, ValidationError::NotAString("sex"));
        let err = encode_query(&query(json!({"pclass": 1, "sex": "male", "embarked": 7}))).unwrap_err();
        assert_eq!(err, ValidationError::NotAString("embarked"));
    }

    #[test]
    fn out_of_domain_values_fall_back() {
        let fv = encode_query(&query(json!({"pclass": 4, "sex": "unknown", "age": 40, "embarked": "X"})))
            .unwrap();
        assert_eq!(fv.0, [4.0, 0.0, 40.0, DEFAULT_FARE, 0.0, 0.0, 0.0]);

        // port codes are case-sensitive
        let fv = encode_query(&query(json!({"pclass": 1, "sex": "male", "embarked": "c"}))).unwrap();
        assert_eq!(fv.ports(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn exactly_one_port_flag_for_known_ports() {
        for (class, fare) in FARE_MAP {
            for sex in ["male", "female", "MALE", "Female"] {
                for port in ["C", "Q", "S"] {
                    let fv = encode_query(&query(
                        json!({"pclass": class, "sex": sex, "age": 10, "embarked": port}),
                    ))
                    .unwrap();
                    assert_eq!(fv.as_slice().len(), FeatureVector::LEN);
                    assert_eq!(fv.ports().iter().sum::<f64>(), 1.0);
                    assert_eq!(fv.fare(), fare);
                    let female = sex.eq_ignore_ascii_case("female");
                    assert_eq!(fv.sex(), if female { 1.0 } else { 0.0 });
                }
            }
        }
    }
}
