use std::sync::Arc;

use {serde_json::json, tracing::debug};

use crate::{
    client::{FlowdockApi, status_and_body},
    directory::ChannelLookup,
    error::{Error, Result},
};

/// What an effect wants said back in the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    Message(String),
    NoReply,
}

impl ReplyOutcome {
    pub fn message(text: impl Into<String>) -> Self {
        Self::Message(text.into())
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Message(text) => Some(text),
            Self::NoReply => None,
        }
    }
}

/// Posts replies as threaded comments.
///
/// Delivery is best effort: each reply is attempted once.
pub struct ReplyPoster {
    api: FlowdockApi,
    directory: Arc<dyn ChannelLookup>,
}

impl ReplyPoster {
    pub fn new(api: FlowdockApi, directory: Arc<dyn ChannelLookup>) -> Self {
        Self { api, directory }
    }

    /// Comment on message `anchor_id` in flow `channel_id`.
    pub async fn post(&self, outcome: &ReplyOutcome, anchor_id: i64, channel_id: &str) -> Result<()> {
        let Some(text) = outcome.text() else {
            return Ok(());
        };
        let endpoint = self.directory.lookup_url(channel_id)?;
        let url = format!(
            "{}/messages/{anchor_id}/comments",
            endpoint.as_str().trim_end_matches('/')
        );
        let body = json!({
            "event": "comment",
            "content": text,
        });

        let resp = self.api.post_json(&url, &body)?.send().await?;
        if !resp.status().is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(Error::Post { status, body });
        }
        debug!(channel_id, anchor_id, "reply posted");
        Ok(())
    }
}
