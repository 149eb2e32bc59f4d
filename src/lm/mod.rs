//! Linear model fitting for log-expression data
//!
//! Builds the group indicator design, fits one least squares model per
//! feature and evaluates the case/control contrast.

mod contrast;
mod design;
mod fitting;

pub use contrast::{evaluate_contrast, Contrast, ContrastFit, ContrastResult};
pub use design::{build_design, design_from_group_string, DesignMatrix};
pub use fitting::{fit_linear_model, fit_single_feature, FeatureFit, LinearFit};
