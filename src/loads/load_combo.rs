//! Load combinations

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};

/// A load combination defines how load cases are combined for analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadCombination {
    /// Name of the load combination
    pub name: String,
    /// Factors for each load case, in definition order
    pub factors: Vec<(String, f64)>,
    /// Optional tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,
}

impl LoadCombination {
    /// Create a new load combination
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            factors: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Create a load combination with a single load case at factor 1.0
    pub fn single(name: &str, case: &str) -> Self {
        Self::new(name).with_case(case, 1.0)
    }

    /// Add a load case with a factor
    pub fn with_case(mut self, case: &str, factor: f64) -> Self {
        self.factors.push((case.to_string(), factor));
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    /// Check if this combination carries any of the given tags
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }

    /// Check factor values and case uniqueness; case existence is checked by the model
    pub(crate) fn validate(&self) -> FEAResult<()> {
        if self.factors.is_empty() {
            return Err(FEAError::InvalidInput(format!(
                "load combination '{}' has no load cases",
                self.name
            )));
        }
        for (i, (case, factor)) in self.factors.iter().enumerate() {
            if !factor.is_finite() {
                return Err(FEAError::InvalidInput(format!(
                    "load combination '{}': factor for case '{case}' is not finite",
                    self.name
                )));
            }
            if self.factors[..i].iter().any(|(other, _)| other == case) {
                return Err(FEAError::InvalidInput(format!(
                    "load combination '{}' lists case '{case}' more than once",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for LoadCombination {
    fn default() -> Self {
        Self::single("Combo 1", "Case 1")
    }
}
