use std::{collections::HashMap, sync::Arc};

use {
    cortex_flowdock::{ChannelLookup, ReplyOutcome},
    tracing::warn,
};

/// Links issue numbers to the tracker configured for the flow they were
/// mentioned in.
pub struct IssueLookupEffect {
    directory: Arc<dyn ChannelLookup>,
    /// Flow display name to tracker base URL.
    trackers: HashMap<String, String>,
}

impl IssueLookupEffect {
    pub fn new(directory: Arc<dyn ChannelLookup>, trackers: HashMap<String, String>) -> Self {
        Self {
            directory,
            trackers,
        }
    }

    /// One reply per issue. Issues that cannot be linked are logged and
    /// left out.
    pub fn replies(&self, channel_id: &str, issue_ids: &[u64]) -> Vec<ReplyOutcome> {
        let flow = match self.directory.lookup_display_name(channel_id) {
            Ok(name) => name,
            Err(e) => {
                warn!(channel_id, issues = issue_ids.len(), error = %e, "cannot link issues");
                return Vec::new();
            },
        };
        let Some(base) = self.trackers.get(&flow) else {
            warn!(channel_id, flow = %flow, issues = issue_ids.len(), "no issue tracker configured for flow");
            return Vec::new();
        };
        issue_ids
            .iter()
            .map(|id| ReplyOutcome::message(format!("Issue #{id}: {base}{id}")))
            .collect()
    }
}
