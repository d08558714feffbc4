#![forbid(unsafe_code)]

pub mod analyze;
pub mod atomic;
pub mod config;
pub mod exec;
pub mod journal;
pub mod plan;
pub mod runner;

pub use analyze::analyze;
pub use exec::{execute, should_run};
pub use plan::generate;
