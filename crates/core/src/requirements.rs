//! Typed RFP requirement documents.
//!
//! Requirements are stored as JSONB but always pass through these types, so
//! the evaluation engine matches on a closed set of measures instead of
//! probing untyped maps at runtime.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Weight applied to a criterion that does not declare one.
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Maximum number of criteria on a single RFP.
pub const MAX_CRITERIA: usize = 32;

/// The structured requirement document owned by an RFP.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Requirements {
    /// Ordered, weighted scoring criteria.
    #[serde(default)]
    pub criteria: Vec<Criterion>,
    /// What is being procured.
    #[serde(default)]
    pub items: Vec<LineItem>,
}

impl Requirements {
    pub fn is_scorable(&self) -> bool {
        !self.criteria.is_empty()
    }
}

/// A requested good or service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<u32>,
    #[serde(default)]
    pub specifications: Option<String>,
}

/// A single weighted scoring criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    /// Human-facing label, unique within an RFP.
    pub criterion: String,
    #[serde(default)]
    pub weight: Option<f64>,
    pub measure: Measure,
}

/// What a criterion measures and the constraint it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measure {
    /// Offered price; `ceiling` defaults to the RFP budget when absent.
    Price {
        #[serde(default)]
        ceiling: Option<f64>,
    },
    /// Delivery lead time in days.
    DeliveryTime {
        #[serde(default)]
        max_days: Option<f64>,
    },
    /// Warranty duration in months.
    Warranty {
        #[serde(default)]
        min_months: Option<f64>,
    },
    /// Payment terms compared against the expected wording.
    PaymentTerms { expected: String },
    /// A named specification compared against the expected value.
    Specification { key: String, expected: String },
}

/// How a measure's value is mapped onto a sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    LowerIsBetter,
    HigherIsBetter,
    Match,
}

impl Measure {
    pub fn comparator(&self) -> Comparator {
        match self {
            Self::Price { .. } | Self::DeliveryTime { .. } => Comparator::LowerIsBetter,
            Self::Warranty { .. } => Comparator::HigherIsBetter,
            Self::PaymentTerms { .. } | Self::Specification { .. } => Comparator::Match,
        }
    }
}

impl Criterion {
    pub fn new(criterion: impl Into<String>, weight: Option<f64>, measure: Measure) -> Self {
        Self {
            criterion: criterion.into(),
            weight,
            measure,
        }
    }

    pub fn effective_weight(&self) -> f64 {
        self.weight.unwrap_or(DEFAULT_WEIGHT)
    }
}

/// Validate a requirement document before it is stored or scored against.
pub fn validate_requirements(requirements: &Requirements) -> Result<(), CoreError> {
    if requirements.criteria.len() > MAX_CRITERIA {
        return Err(CoreError::InvalidInput(format!(
            "An RFP may carry at most {MAX_CRITERIA} criteria (got {})",
            requirements.criteria.len()
        )));
    }

    let mut seen = HashSet::new();
    for c in &requirements.criteria {
        let name = c.criterion.trim();
        if name.is_empty() {
            return Err(CoreError::InvalidInput(
                "Criterion name must not be empty".to_string(),
            ));
        }
        if !seen.insert(name.to_lowercase()) {
            return Err(CoreError::InvalidInput(format!(
                "Duplicate criterion '{name}'"
            )));
        }
        if let Some(w) = c.weight {
            if !w.is_finite() || w <= 0.0 {
                return Err(CoreError::InvalidInput(format!(
                    "Criterion '{name}' weight must be a positive number (got {w})"
                )));
            }
        }
        validate_measure(name, &c.measure)?;
    }

    for item in &requirements.items {
        if item.name.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "Line item name must not be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_measure(name: &str, measure: &Measure) -> Result<(), CoreError> {
    let bound = match measure {
        Measure::Price { ceiling } => *ceiling,
        Measure::DeliveryTime { max_days } => *max_days,
        Measure::Warranty { min_months } => *min_months,
        Measure::PaymentTerms { expected } | Measure::Specification { expected, .. } => {
            if expected.trim().is_empty() {
                return Err(CoreError::InvalidInput(format!(
                    "Criterion '{name}' needs a non-empty expected value"
                )));
            }
            None
        }
    };
    if let Measure::Specification { key, .. } = measure {
        if key.trim().is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "Criterion '{name}' needs a specification key"
            )));
        }
    }
    match bound {
        Some(b) if !b.is_finite() || b < 0.0 => Err(CoreError::InvalidInput(format!(
            "Criterion '{name}' bound must be a non-negative number (got {b})"
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn price(weight: Option<f64>) -> Criterion {
        Criterion::new("price", weight, Measure::Price { ceiling: None })
    }

    #[test]
    fn deserializes_tagged_measures() {
        let req: Requirements = serde_json::from_value(json!({
            "criteria": [
                {"criterion": "price", "weight": 2, "measure": {"kind": "price"}},
                {"criterion": "delivery", "measure": {"kind": "delivery_time", "max_days": 30}},
                {"criterion": "terms", "measure": {"kind": "payment_terms", "expected": "net 30"}}
            ],
            "items": [{"name": "laptop", "quantity": 50}]
        }))
        .unwrap();

        assert_eq!(req.criteria.len(), 3);
        assert_eq!(req.criteria[0].effective_weight(), 2.0);
        assert_eq!(req.criteria[1].effective_weight(), DEFAULT_WEIGHT);
        assert_eq!(
            req.criteria[1].measure,
            Measure::DeliveryTime { max_days: Some(30.0) }
        );
        assert_eq!(req.criteria[2].measure.comparator(), Comparator::Match);
        assert_eq!(req.items[0].quantity, Some(50));
    }

    #[test]
    fn unknown_measure_kind_is_rejected() {
        let result: Result<Criterion, _> = serde_json::from_value(json!({
            "criterion": "vibes", "measure": {"kind": "vibes"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn valid_requirements_pass() {
        let req = Requirements {
            criteria: vec![
                price(Some(2.0)),
                Criterion::new("warranty", None, Measure::Warranty { min_months: Some(12.0) }),
            ],
            items: vec![],
        };
        assert!(validate_requirements(&req).is_ok());
    }

    #[test]
    fn non_positive_weight_rejected() {
        for w in [0.0, -1.0, f64::NAN] {
            let req = Requirements {
                criteria: vec![price(Some(w))],
                items: vec![],
            };
            assert!(validate_requirements(&req).is_err(), "weight {w}");
        }
    }

    #[test]
    fn duplicate_criteria_rejected() {
        let req = Requirements {
            criteria: vec![price(None), Criterion::new("Price", None, Measure::Price { ceiling: None })],
            items: vec![],
        };
        let err = validate_requirements(&req).unwrap_err();
        assert!(err.to_string().contains("Duplicate criterion"));
    }

    #[test]
    fn empty_expected_value_rejected() {
        let req = Requirements {
            criteria: vec![Criterion::new(
                "terms",
                None,
                Measure::PaymentTerms { expected: "  ".into() },
            )],
            items: vec![],
        };
        assert!(validate_requirements(&req).is_err());
    }

    #[test]
    fn negative_bound_rejected() {
        let req = Requirements {
            criteria: vec![Criterion::new("price", None, Measure::Price { ceiling: Some(-5.0) })],
            items: vec![],
        };
        assert!(validate_requirements(&req).is_err());
    }
}
