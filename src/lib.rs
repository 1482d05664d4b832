//! Timekeeper Import Library
//!
//! This library reads timesheet rows from CSV files, resolves each row's labor task
//! against the Timekeeper taxonomy, and writes the entry to the Timekeeper service.

pub mod error;
pub mod helpers;
pub mod models;
pub mod service;

pub use error::TimekeeperError;
pub use service::{BatchReport, ImportService};

// Re-export key types for convenience
pub use helpers::config::{ConfigProvider, EnvProvider, TimekeeperConfig, YamlFileProvider};
pub use helpers::rows::RowSource;
pub use helpers::timekeeper::TimekeeperClient;
pub use models::timekeeper::{ImportOutcome, LaborTask, TimesheetEntry};
