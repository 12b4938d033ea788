//! Error plumbing shared by the cortex library crates.

pub mod error;

pub use error::FromMessage;
