//! Source weight registry
//!
//! Static mapping of provider identifier to trust weight. Lookup falls
//! back to the `default` entry (1.0). Read-only at runtime;
//! reconfiguration means process restart.

use std::collections::HashMap;

use crate::error::ConfigError;

pub const DEFAULT_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct SourceWeightRegistry {
    weights: HashMap<String, f64>,
    default_weight: f64,
}

impl Default for SourceWeightRegistry {
    fn default() -> Self {
        Self {
            weights: HashMap::new(),
            default_weight: DEFAULT_WEIGHT,
        }
    }
}

impl SourceWeightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from configured overrides. A `default` entry
    /// replaces the fallback weight. Negative weights are rejected.
    pub fn from_overrides(overrides: &HashMap<String, f64>) -> Result<Self, ConfigError> {
        let mut registry = Self::new();
        for (source, weight) in overrides {
            if *weight < 0.0 || !weight.is_finite() {
                return Err(ConfigError::InvalidValue {
                    key: format!("SOURCE_WEIGHT_{}", source.to_uppercase()),
                    message: format!("weight must be a non-negative number, got {weight}"),
                });
            }
            let key = source.trim().to_lowercase();
            if key == "default" {
                registry.default_weight = *weight;
            } else {
                registry.weights.insert(key, *weight);
            }
        }
        Ok(registry)
    }

    /// The configured weight for a source, or the default entry.
    pub fn weight_of(&self, source: &str) -> f64 {
        self.weights
            .get(&source.trim().to_lowercase())
            .copied()
            .unwrap_or(self.default_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_falls_back_to_default() {
        let registry = SourceWeightRegistry::new();
        assert_eq!(registry.weight_of("finnhub"), 1.0);
        assert_eq!(registry.weight_of("anything"), 1.0);
    }

    #[test]
    fn overrides_apply_case_insensitively() {
        let mut overrides = HashMap::new();
        overrides.insert("Alpha_Vantage".to_string(), 2.5);
        overrides.insert("default".to_string(), 0.5);
        let registry = SourceWeightRegistry::from_overrides(&overrides).unwrap();

        assert_eq!(registry.weight_of("alpha_vantage"), 2.5);
        assert_eq!(registry.weight_of("ALPHA_VANTAGE"), 2.5);
        assert_eq!(registry.weight_of("yahoo_finance"), 0.5);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut overrides = HashMap::new();
        overrides.insert("finnhub".to_string(), -1.0);
        assert!(SourceWeightRegistry::from_overrides(&overrides).is_err());
    }
}
