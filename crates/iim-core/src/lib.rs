pub mod config;
pub mod error;
pub mod fakes;
pub mod fields;
pub mod incident;
pub mod io;
pub mod jira;
pub mod overview;
pub mod reconcile;
pub mod render;
pub mod report;
pub mod tracker;

pub use error::{ErrorKind, IimError, Result};
