use crate::encode::{FEATURE_NAMES, FeatureVector, NUM_FEATURES};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the public, human-readable format of a trained ensemble member
// when serialized to a TOML file.

/// Anything that maps a feature vector to the probability of the positive class.
pub trait BinaryClassifier {
    /// Probability in [0, 1] that ctDNA is detected.
    fn predict_probability(&self, features: &FeatureVector) -> f64;
}

/// One trained logistic-regression ensemble member.
///
/// Field order matters for serialization: TOML requires plain values before tables,
/// so the coefficient array, which ndarray serializes as a table, comes last.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    /// Free-form label, e.g. the cross-validation fold the member came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// The column order the member was trained on. Optional in the file; when
    /// present it must equal `FEATURE_NAMES` exactly.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Array1<f64>,
}

/// Custom error type for model loading, saving, and validation.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("Model has {found} coefficients, but the encoder produces {expected} features.")]
    MismatchedFeatureCount { found: usize, expected: usize },
    #[error(
        "Model was trained on column '{found}' at position {position}, but the encoder emits '{expected}' there."
    )]
    MismatchedFeatureName {
        position: usize,
        found: String,
        expected: &'static str,
    },
    #[error("Model parameter '{0}' is not finite.")]
    NonFiniteParameter(String),
}

impl LogisticModel {
    /// Builds a member from raw parameters, recording the current column order.
    pub fn new(intercept: f64, coefficients: Array1<f64>) -> Result<Self, ModelError> {
        let model = Self {
            model_id: None,
            feature_names: FEATURE_NAMES.iter().map(|name| name.to_string()).collect(),
            intercept,
            coefficients,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn with_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    /// Checks the member against the encoder's contract.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.coefficients.len() != NUM_FEATURES {
            return Err(ModelError::MismatchedFeatureCount {
                found: self.coefficients.len(),
                expected: NUM_FEATURES,
            });
        }

        if !self.feature_names.is_empty() {
            if self.feature_names.len() != NUM_FEATURES {
                return Err(ModelError::MismatchedFeatureCount {
                    found: self.feature_names.len(),
                    expected: NUM_FEATURES,
                });
            }
            if let Some((position, (found, expected))) = self
                .feature_names
                .iter()
                .zip(FEATURE_NAMES.iter())
                .enumerate()
                .find(|(_, (found, expected))| found.as_str() != **expected)
            {
                return Err(ModelError::MismatchedFeatureName {
                    position,
                    found: found.clone(),
                    expected: *expected,
                });
            }
        }

        if !self.intercept.is_finite() {
            return Err(ModelError::NonFiniteParameter("intercept".to_string()));
        }
        if let Some(position) = self.coefficients.iter().position(|c| !c.is_finite()) {
            return Err(ModelError::NonFiniteParameter(
                FEATURE_NAMES[position].to_string(),
            ));
        }

        Ok(())
    }

    /// The linear predictor `intercept + beta . x`.
    pub fn linear_predictor(&self, features: &FeatureVector) -> f64 {
        self.intercept + self.coefficients.dot(&features.as_view())
    }

    /// Saves the member to a file in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads a member from a TOML file and validates it.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model: Self = toml::from_str(&toml_string)?;
        model.validate()?;
        Ok(model)
    }
}

impl BinaryClassifier for LogisticModel {
    fn predict_probability(&self, features: &FeatureVector) -> f64 {
        let eta = self.linear_predictor(features);
        // Finite parameters can still overflow to inf - inf; such a member carries no
        // information for this record.
        if eta.is_nan() {
            log::warn!(
                "Linear predictor of member {} is undefined for this record; scoring it at 0.5",
                self.model_id.as_deref().unwrap_or("?")
            );
            return 0.5;
        }
        // Clamp eta to prevent numerical overflow in exp()
        let eta = eta.clamp(-700.0, 700.0);
        1.0 / (1.0 + f64::exp(-eta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use crate::record::{
        ClinicalRecord, MetastasisSites, PerformanceStatus, Response, Sex,
    };
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn record() -> ClinicalRecord {
        ClinicalRecord {
            sex: Sex::Woman,
            age: 50,
            performance_status: PerformanceStatus::Ps0,
            diagnosis_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            specimen_date: NaiveDate::from_ymd_opt(2024, 1, 11).unwrap(),
            treatment_line: 0,
            response: Response::Ne,
            metastases: MetastasisSites::none(),
        }
    }

    fn age_only_model(intercept: f64, age_weight: f64) -> LogisticModel {
        let mut coefficients = Array1::zeros(NUM_FEATURES);
        coefficients[1] = age_weight;
        LogisticModel::new(intercept, coefficients).unwrap()
    }

    #[test]
    fn probability_is_sigmoid_of_linear_predictor() {
        let features = encode(&record());
        let model = age_only_model(-5.0, 0.1);
        assert_abs_diff_eq!(model.linear_predictor(&features), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(model.predict_probability(&features), 0.5, epsilon = 1e-12);

        let model = age_only_model(-4.0, 0.1);
        let expected = 1.0 / (1.0 + f64::exp(-1.0));
        assert_abs_diff_eq!(model.predict_probability(&features), expected, epsilon = 1e-12);
    }

    #[test]
    fn extreme_linear_predictor_stays_finite() {
        let features = encode(&record());
        let high = age_only_model(0.0, 1e6).predict_probability(&features);
        let low = age_only_model(0.0, -1e6).predict_probability(&features);
        assert!(high.is_finite() && high <= 1.0);
        assert!(low.is_finite() && low >= 0.0);
    }

    #[test]
    fn overflowing_linear_predictor_scores_as_uninformative() {
        let features = encode(&record());
        let mut model = age_only_model(0.0, 1e308);
        model.coefficients[2] = -1e308;
        assert!(model.validate().is_ok());
        assert!(model.linear_predictor(&features).is_nan());
        assert_eq!(model.predict_probability(&features), 0.5);
    }

    #[test]
    fn rejects_wrong_coefficient_count() {
        let result = LogisticModel::new(0.0, Array1::zeros(NUM_FEATURES - 1));
        assert!(matches!(
            result,
            Err(ModelError::MismatchedFeatureCount {
                found: 26,
                expected: 27
            })
        ));
    }

    #[test]
    fn rejects_swapped_column_names() {
        let mut model = age_only_model(0.0, 0.0);
        model.feature_names.swap(0, 1);
        match model.validate() {
            Err(ModelError::MismatchedFeatureName {
                position, found, ..
            }) => {
                assert_eq!(position, 0);
                assert_eq!(found, "age");
            }
            other => panic!("expected a column mismatch, got {other:?}"),
        }
    }

    #[test]
    fn rejects_non_finite_coefficients() {
        let mut model = age_only_model(0.0, 0.0);
        model.coefficients[3] = f64::NAN;
        assert!(matches!(
            model.validate(),
            Err(ModelError::NonFiniteParameter(name)) if name == "metastasis_sites"
        ));
    }

    #[test]
    fn save_and_load_preserve_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("member.toml");
        let model = age_only_model(-1.5, 0.02).with_id("fold-0");
        model.save(&path).unwrap();

        let loaded = LogisticModel::load(&path).unwrap();
        assert_eq!(loaded.model_id.as_deref(), Some("fold-0"));
        assert_eq!(loaded.intercept, -1.5);
        assert_eq!(loaded.coefficients, model.coefficients);
        assert_eq!(loaded.feature_names.len(), NUM_FEATURES);
    }

    #[test]
    fn load_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("member.toml");
        fs::write(&path, "intercept = \"not a number\"").unwrap();
        assert!(matches!(
            LogisticModel::load(&path),
            Err(ModelError::TomlParseError(_))
        ));
    }
}
