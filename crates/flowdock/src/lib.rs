//! Flowdock transport for cortex.
//!
//! Covers the streaming side (long-lived `\r`-delimited JSON stream and the
//! correlation of its records into [`CorrelatedEvent`]s) and the REST side
//! (flow directory, user list and threaded comment replies).

pub mod client;
pub mod directory;
pub mod error;
pub mod event;
pub mod outbound;
pub mod stream;
pub mod users;

pub use {
    client::FlowdockApi,
    directory::{ChannelDirectory, ChannelLookup, ChannelRecord, REFRESH_INTERVAL},
    error::{Error, Result},
    event::{CorrelatedEvent, Correlation, EventCorrelator, EventKind},
    outbound::{ReplyOutcome, ReplyPoster},
    stream::{Connection, RawEvent, StreamReader},
};
