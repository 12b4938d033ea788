//! Glue between the Flowdock stream, intent classification and effects.
//!
//! [`Pipeline`] owns the event loop; [`Dispatcher`] turns one message into
//! the replies it deserves.

pub mod dispatcher;
pub mod effects;
pub mod error;
pub mod pipeline;

pub use {
    dispatcher::Dispatcher,
    error::{Error, Result},
    pipeline::Pipeline,
};
