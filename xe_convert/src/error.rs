use std::path::PathBuf;
use mr_data::cfl::CflError;
use crate::dialect::DialectQuery;

pub type Result<T> = std::result::Result<T,ConvertError>;

/// Every way a conversion can fail. All variants abort the current scan; nothing is written
/// for a scan that produced one of these.
#[derive(Debug,thiserror::Error)]
pub enum ConvertError {
    #[error("dialect classification: no rule matches {0}")]
    UnrecognizedDialect(DialectQuery),

    #[error("partition ({dialect}): {total} acquisitions split into gas={gas} dissolved={dissolved} proton={proton} bonus={bonus} discarded={discarded}")]
    InconsistentAcquisitionCount {
        dialect:String,
        total:usize,
        gas:usize,
        dissolved:usize,
        proton:usize,
        bonus:usize,
        discarded:usize,
    },

    #[error("metadata: excitation offset {value} ppm from {source_key} is not one of 208 or 218 ppm")]
    InvalidExcitationFrequency {
        value:f64,
        source_key:String,
    },

    #[error("metadata: required field {field} not found (tried {})", .tried.join(", "))]
    MissingRequiredMetadataField {
        field:&'static str,
        tried:Vec<String>,
    },

    #[error("{stage}: trajectory shape {found:?} does not match expected {expected}")]
    TrajectoryShapeMismatch {
        stage:&'static str,
        expected:String,
        found:Vec<usize>,
    },

    #[error("normalization: {0}")]
    InvalidNormalization(String),

    #[error("noise filter ({phase}): {flagged} of {total} projections flagged, more than the allowed fraction {bound}")]
    ExcessiveNoiseFraction {
        phase:String,
        flagged:usize,
        total:usize,
        bound:f64,
    },

    #[error("truncation: cannot skip {skip_start} leading and {skip_end} trailing projections of {n_projections}")]
    InvalidTruncation {
        skip_start:usize,
        skip_end:usize,
        n_projections:usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no scans were supplied for subject {0}")]
    NoScans(String),

    #[error("cannot parse settings {path:?}: {source}")]
    ConfigParse {
        path:PathBuf,
        #[source]
        source:toml::de::Error,
    },

    #[error("cannot serialize settings: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("cannot parse {path:?}: {source}")]
    Json {
        path:PathBuf,
        #[source]
        source:serde_json::Error,
    },

    #[error("i/o failed for {path:?}: {source}")]
    Io {
        path:PathBuf,
        #[source]
        source:std::io::Error,
    },

    #[error(transparent)]
    Cfl(#[from] CflError),
}

impl ConvertError {
    pub fn io(path:&std::path::Path) -> impl FnOnce(std::io::Error) -> ConvertError + '_ {
        move |source| ConvertError::Io {path:path.to_owned(),source}
    }
}
