//! Data models for civic issue reports.

pub mod config;
pub mod report;

pub use config::CivicConfig;
pub use report::{NewReport, Report};
