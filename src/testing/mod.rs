//! Statistical testing: p-values and multiple testing correction

mod fdr;
mod pvalue;

pub use fdr::{adjust_pvalues, benjamini_hochberg, bonferroni, AdjustMethod};
pub use pvalue::{pvalue_normal, pvalue_t, t_upper_quantile, t_upper_tail};
