pub mod analysis;
pub mod cli;
pub mod config;
pub mod error;
pub mod gc;
pub mod jvm;
pub mod logging;
pub mod metrics;
pub mod report;
pub mod session;

pub use error::{Error, Result};
