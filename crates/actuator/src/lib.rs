//! Light controller boundary.
//!
//! The dispatcher only sees the [`Actuator`] trait; [`SerialActuator`]
//! drives the USB-attached controller board.

pub mod error;
pub mod serial;

use {async_trait::async_trait, cortex_intent::LightState};

pub use {
    error::{Error, Result},
    serial::SerialActuator,
};

/// Switches a numbered light.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn apply(&self, target_id: u32, state: LightState) -> Result<()>;
}
