#![forbid(unsafe_code)]

pub mod component;
pub mod errors;
pub mod schema;
pub mod spec;
pub mod traits;
pub mod types;
pub mod version;
