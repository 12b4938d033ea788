use std::{collections::HashMap, sync::Arc};

use {
    cortex_actuator::Actuator,
    cortex_flowdock::{ChannelLookup, CorrelatedEvent, ReplyOutcome},
    cortex_intent::{Intent, IntentClassifier},
    tracing::{debug, warn},
};

use crate::effects::{IssueLookupEffect, LightingEffect, temperature};

/// Classifies one message and runs whatever effect its intent calls for.
pub struct Dispatcher {
    classifier: Arc<dyn IntentClassifier>,
    lighting: LightingEffect,
    issues: IssueLookupEffect,
}

impl Dispatcher {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        actuator: Arc<dyn Actuator>,
        directory: Arc<dyn ChannelLookup>,
        issue_trackers: HashMap<String, String>,
    ) -> Self {
        Self {
            classifier,
            lighting: LightingEffect::new(actuator),
            issues: IssueLookupEffect::new(directory, issue_trackers),
        }
    }

    /// Replies for a stream event, in the order they should be posted.
    pub async fn handle(&self, event: &CorrelatedEvent) -> Vec<ReplyOutcome> {
        self.respond(&event.text, &event.channel_id).await
    }

    /// Classify `text` as if said in `channel_id` and act on it.
    pub async fn respond(&self, text: &str, channel_id: &str) -> Vec<ReplyOutcome> {
        let intent = self.classify(text).await;
        self.execute(intent, channel_id).await
    }

    /// Classification never fails from the caller's point of view; errors
    /// become [`Intent::ClassificationError`].
    pub async fn classify(&self, text: &str) -> Intent {
        match self.classifier.classify(text).await {
            Ok(intent) => {
                debug!(?intent, "classified");
                intent
            },
            Err(e) => {
                warn!(error = %e, "classification failed");
                Intent::ClassificationError {
                    reason: e.to_string(),
                }
            },
        }
    }

    pub async fn execute(&self, intent: Intent, channel_id: &str) -> Vec<ReplyOutcome> {
        let replies = match intent {
            Intent::Lighting { target_id, state } => {
                vec![self.lighting.apply(target_id, state).await]
            },
            Intent::Temperature { degrees, unit } => vec![temperature::reply(degrees, unit)],
            Intent::IssueReference { issue_ids } => self.issues.replies(channel_id, &issue_ids),
            Intent::Unrecognized => Vec::new(),
            Intent::ClassificationError { reason } => vec![ReplyOutcome::message(format!(
                "Sorry, I could not understand that ({reason})"
            ))],
        };
        if replies.is_empty() {
            vec![ReplyOutcome::NoReply]
        } else {
            replies
        }
    }
}
