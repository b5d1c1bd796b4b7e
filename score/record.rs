// ========================================================================================
//                             The Clinical Record Contract
// ========================================================================================

//! Typed representation of one patient's clinical inputs.
//!
//! Every field is an enumerated choice or a bounded integer, mirroring the input
//! form the models were built for. The encoder relies on these bounds holding, so
//! they are checked here, at the boundary, and nowhere downstream.

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Highest age the input form accepts.
pub const MAX_AGE: u32 = 100;

/// Highest treatment line the input form accepts.
pub const MAX_TREATMENT_LINE: u32 = 20;

/// Number of metastasis sites tracked by the models.
pub const NUM_METASTASIS_SITES: usize = 12;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Failed to read record file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML record file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Age {found} is outside the accepted range 0..={max}.")]
    AgeOutOfRange { found: u32, max: u32 },
    #[error("Treatment line {found} is outside the accepted range 0..={max}.")]
    TreatmentLineOutOfRange { found: u32, max: u32 },
    #[error("Invalid date '{0}'. Expected the YYYY-MM-DD format.")]
    InvalidDate(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Woman,
    Man,
}

/// ECOG performance status, an ordinal 0-4 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(try_from = "u8", into = "u8")]
pub enum PerformanceStatus {
    #[value(name = "0")]
    Ps0,
    #[value(name = "1")]
    Ps1,
    #[value(name = "2")]
    Ps2,
    #[value(name = "3")]
    Ps3,
    #[value(name = "4")]
    Ps4,
}

impl PerformanceStatus {
    pub const ALL: [PerformanceStatus; 5] = [
        Self::Ps0,
        Self::Ps1,
        Self::Ps2,
        Self::Ps3,
        Self::Ps4,
    ];

    pub fn grade(self) -> u8 {
        match self {
            Self::Ps0 => 0,
            Self::Ps1 => 1,
            Self::Ps2 => 2,
            Self::Ps3 => 3,
            Self::Ps4 => 4,
        }
    }
}

impl TryFrom<u8> for PerformanceStatus {
    type Error = String;

    fn try_from(grade: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|ps| ps.grade() == grade)
            .ok_or_else(|| format!("ECOG performance status must be 0-4, found {grade}"))
    }
}

impl From<PerformanceStatus> for u8 {
    fn from(ps: PerformanceStatus) -> Self {
        ps.grade()
    }
}

impl fmt::Display for PerformanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.grade())
    }
}

/// Best response to the current treatment line.
///
/// The declaration order is the order the one-hot flags are emitted in the feature
/// vector. Do not reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
pub enum Response {
    /// Complete response.
    #[value(name = "CR", alias = "cr")]
    #[serde(alias = "cr")]
    Cr,
    /// Not evaluable.
    #[value(name = "NE", alias = "ne")]
    #[serde(alias = "ne")]
    Ne,
    /// Progressive disease.
    #[value(name = "PD", alias = "pd")]
    #[serde(alias = "pd")]
    Pd,
    /// Partial response.
    #[value(name = "PR", alias = "pr")]
    #[serde(alias = "pr")]
    Pr,
    /// Stable disease.
    #[value(name = "SD", alias = "sd")]
    #[serde(alias = "sd")]
    Sd,
}

impl Response {
    pub const ALL: [Response; 5] = [Self::Cr, Self::Ne, Self::Pd, Self::Pr, Self::Sd];

    pub fn code(self) -> &'static str {
        match self {
            Self::Cr => "CR",
            Self::Ne => "NE",
            Self::Pd => "PD",
            Self::Pr => "PR",
            Self::Sd => "SD",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A metastatic site. Declaration order is the feature order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum MetastasisSite {
    #[value(alias = "lymph_node")]
    LymphNode,
    Lung,
    Pleura,
    Liver,
    Bone,
    Brain,
    Peritoneum,
    Kidney,
    Adrenal,
    Muscle,
    #[value(alias = "soft_tissue")]
    SoftTissue,
    Ovary,
}

impl MetastasisSite {
    pub const ALL: [MetastasisSite; NUM_METASTASIS_SITES] = [
        Self::LymphNode,
        Self::Lung,
        Self::Pleura,
        Self::Liver,
        Self::Bone,
        Self::Brain,
        Self::Peritoneum,
        Self::Kidney,
        Self::Adrenal,
        Self::Muscle,
        Self::SoftTissue,
        Self::Ovary,
    ];

    /// Position of this site within the block of site flags.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::LymphNode => "Lymph node",
            Self::Lung => "Lung",
            Self::Pleura => "Pleura",
            Self::Liver => "Liver",
            Self::Bone => "Bone",
            Self::Brain => "Brain",
            Self::Peritoneum => "Peritoneum",
            Self::Kidney => "Kidney",
            Self::Adrenal => "Adrenal",
            Self::Muscle => "Muscle",
            Self::SoftTissue => "Soft tissue",
            Self::Ovary => "Ovary",
        }
    }
}

impl fmt::Display for MetastasisSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// The twelve independent metastasis toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<MetastasisSite>", into = "Vec<MetastasisSite>")]
pub struct MetastasisSites([bool; NUM_METASTASIS_SITES]);

impl MetastasisSites {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, site: MetastasisSite) {
        self.0[site.index()] = true;
    }

    pub fn contains(&self, site: MetastasisSite) -> bool {
        self.0[site.index()]
    }

    /// Number of involved sites, 0 through 12.
    pub fn count(&self) -> usize {
        self.0.iter().filter(|&&flag| flag).count()
    }

    /// The raw flags in feature order.
    pub fn flags(&self) -> &[bool; NUM_METASTASIS_SITES] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = MetastasisSite> + '_ {
        MetastasisSite::ALL
            .into_iter()
            .filter(|&site| self.contains(site))
    }
}

impl FromIterator<MetastasisSite> for MetastasisSites {
    fn from_iter<I: IntoIterator<Item = MetastasisSite>>(iter: I) -> Self {
        let mut sites = Self::none();
        for site in iter {
            sites.insert(site);
        }
        sites
    }
}

impl From<Vec<MetastasisSite>> for MetastasisSites {
    fn from(sites: Vec<MetastasisSite>) -> Self {
        sites.into_iter().collect()
    }
}

impl From<MetastasisSites> for Vec<MetastasisSite> {
    fn from(sites: MetastasisSites) -> Self {
        sites.iter().collect()
    }
}

/// One patient's raw inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalRecord {
    pub sex: Sex,
    pub age: u32,
    pub performance_status: PerformanceStatus,
    pub diagnosis_date: NaiveDate,
    pub specimen_date: NaiveDate,
    pub treatment_line: u32,
    pub response: Response,
    #[serde(default)]
    pub metastases: MetastasisSites,
}

impl ClinicalRecord {
    /// Checks the numeric bounds the input form imposes. Enumerated fields are
    /// constrained by their types already.
    pub fn check_bounds(&self) -> Result<(), RecordError> {
        if self.age > MAX_AGE {
            return Err(RecordError::AgeOutOfRange {
                found: self.age,
                max: MAX_AGE,
            });
        }
        if self.treatment_line > MAX_TREATMENT_LINE {
            return Err(RecordError::TreatmentLineOutOfRange {
                found: self.treatment_line,
                max: MAX_TREATMENT_LINE,
            });
        }
        Ok(())
    }

    /// Loads a record from a TOML file and checks its bounds.
    pub fn load(path: &Path) -> Result<Self, RecordError> {
        let toml_string = fs::read_to_string(path)?;
        let record: Self = toml::from_str(&toml_string)?;
        record.check_bounds()?;
        Ok(record)
    }
}

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(value: &str) -> Result<NaiveDate, RecordError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| RecordError::InvalidDate(value.trim().to_string()))
}
