//! Linked views over a table of city sustainability indicators: a map of
//! cities, an indicator chart for the selected city and a ranking of all
//! cities, kept in step through one shared selection.

pub mod aggregate;
pub mod config;
pub mod console;
pub mod dashboard;
pub mod error;
pub mod loader;
pub mod output;
pub mod ranking;
pub mod selection;
pub mod types;
pub mod util;
pub mod views;

pub use dashboard::Dashboard;
pub use error::{DashboardError, DataLoadError, Result};
