use async_trait::async_trait;

use crate::{Result, types::Intent};

/// Turns free text into an [`Intent`].
///
/// Calls are made one at a time from the event loop and carry no timeout of
/// their own; a hung classifier stalls the pipeline.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Intent>;
}
