use crate::encode::encode;
use crate::ensemble::{
    EnsembleError, EnsembleSpec, ModelEnsemble, mean_probability, shared_ensemble,
};
use crate::model::BinaryClassifier;
use crate::record::ClinicalRecord;
use crate::report::Prediction;
use itertools::Itertools;

// ========================================================================================
//                               The encode-then-score pass
// ========================================================================================

/// Scores one record against an already loaded ensemble.
pub fn predict<C: BinaryClassifier>(
    record: &ClinicalRecord,
    ensemble: &ModelEnsemble<C>,
) -> Prediction {
    let features = encode(record);
    log::debug!(
        "Encoded features: {}",
        features
            .named()
            .map(|(name, value)| format!("{name}={value}"))
            .join(", ")
    );

    let member_probabilities = ensemble.member_probabilities(&features);
    let probability = mean_probability(&member_probabilities);
    log::debug!("Member probabilities: {member_probabilities:?} -> mean {probability}");

    Prediction::new(probability, member_probabilities)
}

/// Scores one record against the process-wide ensemble for `spec`, loading it on
/// first use.
pub fn predict_with_spec(
    record: &ClinicalRecord,
    spec: &EnsembleSpec,
) -> Result<Prediction, EnsembleError> {
    let ensemble = shared_ensemble(spec)?;
    Ok(predict(record, ensemble.as_ref()))
}
