//! Data structures for microarray differential expression analysis

mod annotation;
mod expression;
mod groups;
mod intensity;

pub use annotation::{AnnotationRecord, AnnotationTable};
pub use expression::ExpressionMatrix;
pub use groups::{GroupLevel, GroupLevels, Sample};
pub use intensity::{RawIntensities, RawIntensityProvider, SampleSubset};
