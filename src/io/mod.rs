//! Input/Output operations for intensity data, annotations and results

mod csv;
pub(crate) mod results;

pub use self::csv::{
    read_annotation, read_intensity_matrix, read_probe_map, write_annotated, write_design,
    write_expression, write_results,
};
pub use results::{LimmaResults, ResultsSummary};
