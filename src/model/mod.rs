pub mod basis;
pub mod family;
pub mod gam;
pub mod nrmse;
pub mod pirls;
pub mod scores;
pub mod settings;
pub mod stats;

use crate::model::nrmse::NrmseError;

/// Failure of a single model fit. Batch code converts these into failure
/// records; only `AllFailed` escapes a batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error("not enough observations: {n_obs} available, at least {required} required")]
    TooFewObservations { n_obs: usize, required: usize },
    #[error("covariate has no spread over the training data")]
    NoSpread,
    #[error("response outside the family domain: {0}")]
    Domain(String),
    #[error("residual scale estimate is zero (response is constant or fitted exactly)")]
    ZeroScale,
    #[error("penalized normal equations are singular")]
    Singular,
    #[error("PIRLS did not converge after {0} iterations")]
    NotConverged(usize),
    #[error("linear predictor left the valid range of the link")]
    InvalidPredictor,
    #[error("numerical error: {0}")]
    Numerical(String),
    #[error("normalized error: {0}")]
    Nrmse(#[from] NrmseError),
    #[error("all {n_units} model fits failed; first error: {first}")]
    AllFailed { n_units: usize, first: String },
}
