//! Error taxonomy for the growth engine.
//!
//! Everything returned here stops the simulation: invariant violations signal a
//! programming defect, configuration errors a defect in the parameter set.
//! Operational conditions (grazing an empty sward, sowing a live plant) never
//! reach this type; they are logged with `tracing::warn!` and skipped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PastureError {
    #[error("{organ}: {quantity} mass balance lost (expected {expected:.9}, found {actual:.9})")]
    MassBalance {
        organ: String,
        quantity: &'static str,
        expected: f64,
        actual: f64,
    },

    #[error("{organ}: turnover rate {rate} outside [0, 1]")]
    TurnoverRateOutOfRange { organ: &'static str, rate: f64 },

    #[error("initial root depth {depth} mm exceeds maximum rooting depth {maximum} mm")]
    RootDepthExceedsMaximum { depth: f64, maximum: f64 },

    #[error("parameter `{name}` must have {expected} values, found {found}")]
    ParameterLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("parameter `{name}` is invalid: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("no root organ is associated with soil zone `{0}`")]
    UnknownZone(String),

    #[error("soil zone `{zone}` has {found} layers, expected {expected}")]
    LayerMismatch {
        zone: String,
        expected: usize,
        found: usize,
    },

    #[error("allocation of new growth could not be completed")]
    AllocationFailed,

    #[error("could not read configuration {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, PastureError>;
