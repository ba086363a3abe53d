pub mod objects;
pub mod report;
