//! Statistics used by the analysis steps.
//!
//! - [`descriptive`]: moments, percentiles and the 20-bin histogram entropy.
//! - [`density`]: Gaussian KDE with Scott's bandwidth.
//! - [`anova`]: one-way ANOVA with an F-distribution p-value (`statrs`).
//! - [`stationarity`]: ADF and KPSS tests.

pub mod anova;
pub mod density;
pub mod descriptive;
pub mod stationarity;

pub use anova::{one_way_anova, AnovaResult};
pub use density::{scott_bandwidth, GaussianKde};
pub use descriptive::{histogram_entropy, kurtosis, percentile, percentile_sorted, skewness, Moments};
pub use stationarity::{adf, kpss, AdfResult, KpssResult, StationarityError};
