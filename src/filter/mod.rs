//! DEG selection from the adjusted results table

mod deg;

pub use deg::{select_degs, DegThresholds};
