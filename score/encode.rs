// ========================================================================================
//                                 The Feature Encoder
// ========================================================================================

//! Maps a `ClinicalRecord` onto the fixed-order feature vector the ensemble members
//! were trained on.
//!
//! The column order is an external contract with the model artifacts. It is recorded
//! once, in `FEATURE_NAMES`, and `encode` emits values in exactly that order.

use crate::record::{ClinicalRecord, MetastasisSite, PerformanceStatus, Response, Sex};
use ndarray::{Array1, ArrayView1};
use std::ops::Deref;

/// Length of every feature vector.
pub const NUM_FEATURES: usize = 27;

/// Column names, in the order the models consume them.
pub const FEATURE_NAMES: [&str; NUM_FEATURES] = [
    "sex",
    "age",
    "days_diagnosis_to_specimen",
    "metastasis_sites",
    "meta_lymph_node",
    "meta_lung",
    "meta_pleura",
    "meta_liver",
    "meta_bone",
    "meta_brain",
    "meta_peritoneum",
    "meta_kidney",
    "meta_adrenal",
    "meta_muscle",
    "meta_soft_tissue",
    "meta_ovary",
    "treatment_line",
    "ps_0",
    "ps_1",
    "ps_2",
    "ps_3",
    "ps_4",
    "response_cr",
    "response_ne",
    "response_pd",
    "response_pr",
    "response_sd",
];

/// An encoded record. Only `encode` constructs one, so the length is always
/// `NUM_FEATURES`.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq)]
pub struct FeatureVector(Array1<f64>);

impl FeatureVector {
    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }

    pub fn into_inner(self) -> Array1<f64> {
        self.0
    }

    /// Pairs each value with its column name.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.0.iter().copied())
    }
}

impl Deref for FeatureVector {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<FeatureVector> for Array1<f64> {
    fn from(values: FeatureVector) -> Self {
        values.0
    }
}

/// Days from diagnosis to specimen collection. A specimen collected before the
/// recorded diagnosis counts as day zero.
pub fn day_interval(record: &ClinicalRecord) -> i64 {
    (record.specimen_date - record.diagnosis_date)
        .num_days()
        .max(0)
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

/// Encodes a record. Total over every record that passed the boundary checks.
pub fn encode(record: &ClinicalRecord) -> FeatureVector {
    let mut values = Vec::with_capacity(NUM_FEATURES);

    values.push(match record.sex {
        Sex::Woman => 0.0,
        Sex::Man => 1.0,
    });
    values.push(f64::from(record.age));
    values.push(day_interval(record) as f64);
    values.push(record.metastases.count() as f64);
    values.extend(
        MetastasisSite::ALL
            .iter()
            .map(|&site| indicator(record.metastases.contains(site))),
    );
    values.push(f64::from(record.treatment_line));
    values.extend(
        PerformanceStatus::ALL
            .iter()
            .map(|&ps| indicator(ps == record.performance_status)),
    );
    values.extend(
        Response::ALL
            .iter()
            .map(|&response| indicator(response == record.response)),
    );

    debug_assert_eq!(values.len(), NUM_FEATURES);
    FeatureVector(Array1::from(values))
}
