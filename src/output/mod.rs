//! Console and file output for run results

pub mod json;
pub mod text;
