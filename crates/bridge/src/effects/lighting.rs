use std::sync::Arc;

use {
    cortex_actuator::Actuator,
    cortex_flowdock::ReplyOutcome,
    cortex_intent::LightState,
    tracing::{info, warn},
};

pub struct LightingEffect {
    actuator: Arc<dyn Actuator>,
}

impl LightingEffect {
    pub fn new(actuator: Arc<dyn Actuator>) -> Self {
        Self { actuator }
    }

    /// Switch the light and describe what happened. A controller failure is
    /// reported in the reply rather than dropped.
    pub async fn apply(&self, target_id: u32, state: LightState) -> ReplyOutcome {
        match self.actuator.apply(target_id, state).await {
            Ok(()) => {
                info!(target_id, state = %state, "light switched");
                ReplyOutcome::message(format!("Turning light {target_id} {state}"))
            },
            Err(e) => {
                warn!(target_id, state = %state, error = %e, "light controller failed");
                ReplyOutcome::message(format!("Could not turn light {target_id} {state}: {e}"))
            },
        }
    }
}
