//! Exercise grading.
//!
//! Answer keys are tagged unions decoded at the boundary from the raw
//! JSON the content table stores; submissions are decoded per exercise
//! type. Grading itself is pure and has no side effects.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{FinquestError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseKind {
    MultipleChoice,
    TrueFalse,
    Numeric,
}

impl ExerciseKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseKind::MultipleChoice => "multiple_choice",
            ExerciseKind::TrueFalse => "true_false",
            ExerciseKind::Numeric => "numeric",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "multiple_choice" => Some(ExerciseKind::MultipleChoice),
            "true_false" => Some(ExerciseKind::TrueFalse),
            "numeric" => Some(ExerciseKind::Numeric),
            _ => None,
        }
    }
}

/// Decoded answer key. `Numeric` holds an inclusive range; exact-match
/// keys set min == max.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerKey {
    MultipleChoice { correct: i64 },
    TrueFalse { correct: bool },
    Numeric { min: f64, max: f64 },
}

impl AnswerKey {
    /// Decode the stored key payload for an exercise type. A key that does
    /// not match its type tag is corrupt content, not a caller error.
    pub fn decode(kind: ExerciseKind, raw: &Value) -> Result<Self> {
        let malformed = || FinquestError::Internal("malformed answer key".to_string());
        match kind {
            ExerciseKind::MultipleChoice => {
                let correct = raw.get("correct").and_then(Value::as_i64).ok_or_else(malformed)?;
                Ok(AnswerKey::MultipleChoice { correct })
            }
            ExerciseKind::TrueFalse => {
                let correct = raw.get("correct").and_then(Value::as_bool).ok_or_else(malformed)?;
                Ok(AnswerKey::TrueFalse { correct })
            }
            ExerciseKind::Numeric => {
                let min = raw.get("min").and_then(Value::as_f64).ok_or_else(malformed)?;
                let max = raw.get("max").and_then(Value::as_f64).ok_or_else(malformed)?;
                Ok(AnswerKey::Numeric { min, max })
            }
        }
    }

    /// The key payload revealed to the client after an incorrect answer.
    pub fn reveal(&self) -> Value {
        match self {
            AnswerKey::MultipleChoice { correct } => json!({ "correct": correct }),
            AnswerKey::TrueFalse { correct } => json!({ "correct": correct }),
            AnswerKey::Numeric { min, max } => json!({ "min": min, "max": max }),
        }
    }
}

/// Grade a submitted answer payload against the key.
///
/// A missing answer field is a validation failure; an unparseable numeric
/// value is simply wrong, not an error.
pub fn grade(key: &AnswerKey, submission: &Value) -> Result<bool> {
    match key {
        AnswerKey::MultipleChoice { correct } => {
            let selected = submission
                .get("selected")
                .and_then(Value::as_i64)
                .ok_or_else(|| {
                    FinquestError::Validation("answer requires a `selected` option index".to_string())
                })?;
            Ok(selected == *correct)
        }
        AnswerKey::TrueFalse { correct } => {
            let selected = submission
                .get("selected")
                .and_then(Value::as_bool)
                .ok_or_else(|| {
                    FinquestError::Validation("answer requires a `selected` boolean".to_string())
                })?;
            Ok(selected == *correct)
        }
        AnswerKey::Numeric { min, max } => {
            let field = submission.get("value").ok_or_else(|| {
                FinquestError::Validation("answer requires a `value` field".to_string())
            })?;
            let parsed = match field {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            Ok(parsed.is_some_and(|v| v >= *min && v <= *max))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_choice_grading() {
        let key = AnswerKey::decode(
            ExerciseKind::MultipleChoice,
            &json!({ "correct": 2 }),
        )
        .unwrap();
        assert!(grade(&key, &json!({ "selected": 2 })).unwrap());
        assert!(!grade(&key, &json!({ "selected": 0 })).unwrap());
    }

    #[test]
    fn test_true_false_grading() {
        let key = AnswerKey::decode(ExerciseKind::TrueFalse, &json!({ "correct": true })).unwrap();
        assert!(grade(&key, &json!({ "selected": true })).unwrap());
        assert!(!grade(&key, &json!({ "selected": false })).unwrap());
    }

    #[test]
    fn test_numeric_inclusive_boundaries() {
        let key = AnswerKey::decode(
            ExerciseKind::Numeric,
            &json!({ "min": 10.0, "max": 20.0 }),
        )
        .unwrap();
        assert!(grade(&key, &json!({ "value": 10.0 })).unwrap());
        assert!(grade(&key, &json!({ "value": 20.0 })).unwrap());
        assert!(!grade(&key, &json!({ "value": 9.999 })).unwrap());
        assert!(!grade(&key, &json!({ "value": 20.001 })).unwrap());
    }

    #[test]
    fn test_numeric_accepts_string_values() {
        let key = AnswerKey::Numeric { min: 50.0, max: 50.0 };
        assert!(grade(&key, &json!({ "value": "50" })).unwrap());
        assert!(grade(&key, &json!({ "value": " 50.0 " })).unwrap());
        // Unparseable input is wrong, not an error.
        assert!(!grade(&key, &json!({ "value": "fifty" })).unwrap());
    }

    #[test]
    fn test_missing_answer_field_is_validation_failure() {
        let key = AnswerKey::MultipleChoice { correct: 1 };
        let err = grade(&key, &json!({})).unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_malformed_key_is_internal() {
        let err = AnswerKey::decode(ExerciseKind::Numeric, &json!({ "correct": 1 })).unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_reveal_shapes() {
        let key = AnswerKey::Numeric { min: 1.0, max: 2.0 };
        assert_eq!(key.reveal(), json!({ "min": 1.0, "max": 2.0 }));
        let key = AnswerKey::MultipleChoice { correct: 3 };
        assert_eq!(key.reveal(), json!({ "correct": 3 }));
    }
}
