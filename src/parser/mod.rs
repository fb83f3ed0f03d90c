pub mod types;
pub mod yaml;

pub use yaml::{parse_workflow_content, parse_workflow_file};
