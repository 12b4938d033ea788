//! Intent classification for cortex.
//!
//! Free text (or a WAV recording) goes to Wit, and the response is folded
//! into the closed [`Intent`] enum the dispatcher switches on.

pub mod classifier;
pub mod error;
pub mod types;
pub mod wit;

pub use {
    classifier::IntentClassifier,
    error::{Error, Result},
    types::{Intent, LightState, TemperatureUnit},
    wit::WitClassifier,
};
