//! Side effects and reply text, one module per intent that does something.

pub mod issues;
pub mod lighting;
pub mod temperature;

pub use {issues::IssueLookupEffect, lighting::LightingEffect};
