// ========================================================================================
//                                 The Ensemble Scorer
// ========================================================================================

//! Averages the positive-class probabilities of K independently trained members.
//!
//! An ensemble is only ever built complete: every one of the K members must load,
//! or the whole request fails. There is no partial-ensemble fallback.

use crate::encode::FeatureVector;
use crate::model::{BinaryClassifier, LogisticModel, ModelError};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

/// Number of cross-validation folds, one member per fold. Every ensemble has
/// exactly this many members.
pub const NUM_FOLDS: usize = 5;

/// Directory holding the member artifacts, relative to the working directory.
pub const DEFAULT_MODEL_DIR: &str = "pancreasliquidmodel";

/// File stem shared by all members; fold `i` lives in `<stem>_<i>.toml`.
pub const DEFAULT_ARTIFACT_STEM: &str = "logistic_250401_shap";

#[derive(Error, Debug)]
pub enum EnsembleError {
    #[error("Failed to load ensemble member {index} from '{}': {source}", .path.display())]
    MemberLoad {
        index: usize,
        path: PathBuf,
        #[source]
        source: ModelError,
    },
    #[error("Ensemble has {loaded} members, but {expected} are required.")]
    Incomplete { loaded: usize, expected: usize },
}

/// Where the members of one ensemble live on disk.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnsembleSpec {
    pub model_dir: PathBuf,
    pub artifact_stem: String,
}

impl Default for EnsembleSpec {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            artifact_stem: DEFAULT_ARTIFACT_STEM.to_string(),
        }
    }
}

impl EnsembleSpec {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            ..Self::default()
        }
    }

    /// Path of the artifact for fold `index`.
    pub fn member_path(&self, index: usize) -> PathBuf {
        self.model_dir
            .join(format!("{}_{index}.toml", self.artifact_stem))
    }

    pub fn member_paths(&self) -> impl Iterator<Item = PathBuf> + '_ {
        (0..NUM_FOLDS).map(|index| self.member_path(index))
    }
}

/// A complete, immutable set of members.
#[derive(Debug)]
pub struct ModelEnsemble<C = LogisticModel> {
    members: Vec<C>,
}

impl<C: BinaryClassifier> ModelEnsemble<C> {
    /// Builds an ensemble, requiring exactly `NUM_FOLDS` members.
    pub fn new(members: Vec<C>) -> Result<Self, EnsembleError> {
        if members.len() != NUM_FOLDS {
            return Err(EnsembleError::Incomplete {
                loaded: members.len(),
                expected: NUM_FOLDS,
            });
        }
        Ok(Self { members })
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[C] {
        &self.members
    }

    /// Each member's probability, in member order.
    pub fn member_probabilities(&self, features: &FeatureVector) -> Vec<f64> {
        self.members
            .iter()
            .map(|member| member.predict_probability(features))
            .collect()
    }

    /// The unweighted mean of the members' probabilities.
    pub fn score(&self, features: &FeatureVector) -> f64 {
        mean_probability(&self.member_probabilities(features))
    }
}

impl ModelEnsemble<LogisticModel> {
    /// Loads every member named by `spec`, failing on the first one that is missing
    /// or corrupt.
    pub fn load(spec: &EnsembleSpec) -> Result<Self, EnsembleError> {
        let mut members = Vec::with_capacity(NUM_FOLDS);
        for (index, path) in spec.member_paths().enumerate() {
            let member = load_member(index, &path)?;
            log::debug!("Loaded ensemble member {index} from {}", path.display());
            members.push(member);
        }

        log::info!(
            "Loaded {} ensemble members from {}",
            members.len(),
            spec.model_dir.display()
        );
        Self::new(members)
    }
}

fn load_member(index: usize, path: &Path) -> Result<LogisticModel, EnsembleError> {
    LogisticModel::load(path).map_err(|source| EnsembleError::MemberLoad {
        index,
        path: path.to_path_buf(),
        source,
    })
}

/// Unweighted mean of member probabilities, as returned by `member_probabilities`.
pub fn mean_probability(probabilities: &[f64]) -> f64 {
    probabilities.iter().sum::<f64>() / probabilities.len() as f64
}

// ========================================================================================
//                               Process-wide model cache
// ========================================================================================

static ENSEMBLE_CACHE: OnceLock<DashMap<EnsembleSpec, Arc<ModelEnsemble>>> = OnceLock::new();

/// Returns the ensemble for `spec`, loading it on first use.
///
/// Loading happens while the map entry is held, so concurrent first callers for the
/// same spec wait for one load instead of racing. A failed load caches nothing.
/// Loaded ensembles are never evicted: the cache lives for the whole process and
/// holds one entry per distinct spec.
pub fn shared_ensemble(spec: &EnsembleSpec) -> Result<Arc<ModelEnsemble>, EnsembleError> {
    let cache = ENSEMBLE_CACHE.get_or_init(DashMap::new);
    if let Some(ensemble) = cache.get(spec) {
        log::debug!("Reusing cached ensemble for {}", spec.model_dir.display());
        return Ok(Arc::clone(ensemble.value()));
    }

    let entry = cache
        .entry(spec.clone())
        .or_try_insert_with(|| ModelEnsemble::load(spec).map(Arc::new))?;
    Ok(Arc::clone(entry.value()))
}
