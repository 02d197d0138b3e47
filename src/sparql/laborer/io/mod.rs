pub mod excel_write;
pub mod executor;
pub mod report;
