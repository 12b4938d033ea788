use std::sync::Arc;

use {
    cortex_config::FlowdockConfig,
    cortex_flowdock::{
        ChannelDirectory, ChannelLookup, Correlation, EventCorrelator, FlowdockApi, RawEvent,
        ReplyOutcome, ReplyPoster, StreamReader, REFRESH_INTERVAL,
    },
    tracing::{debug, error, info, warn},
};

use crate::{Dispatcher, error::Result};

/// The long-lived event loop: stream in, replies out.
///
/// Events are handled strictly one after another. Only a stream failure
/// ends [`Pipeline::run`]; anything that goes wrong with a single event is
/// logged and the loop moves on.
pub struct Pipeline {
    reader: StreamReader,
    correlator: EventCorrelator,
    dispatcher: Arc<Dispatcher>,
    poster: ReplyPoster,
    directory: Arc<ChannelDirectory>,
}

impl Pipeline {
    pub fn new(
        api: FlowdockApi,
        config: &FlowdockConfig,
        bot_user_id: Option<String>,
        dispatcher: Arc<Dispatcher>,
        directory: Arc<ChannelDirectory>,
    ) -> Result<Self> {
        let anchor_tag = cortex_config::anchor_pattern(&config.anchor_tag_pattern)?;
        let lookup: Arc<dyn ChannelLookup> = directory.clone();
        Ok(Self {
            reader: StreamReader::new(api.clone(), config.flows.clone()),
            correlator: EventCorrelator::new(bot_user_id, anchor_tag),
            dispatcher,
            poster: ReplyPoster::new(api, lookup),
            directory,
        })
    }

    /// Load the flow directory, start its background refresh, then consume
    /// the stream until it fails. The first directory load is fatal.
    pub async fn run(&self) -> Result<()> {
        let flows = self.directory.refresh().await?;
        info!(flows, bot_user_id = ?self.correlator.bot_user_id(), "flow directory loaded");
        let refresh = self.directory.spawn_refresh(REFRESH_INTERVAL);

        let result = self.consume().await;
        refresh.abort();
        if let Err(e) = &result {
            error!(error = %e, "event stream stopped");
        }
        result
    }

    async fn consume(&self) -> Result<()> {
        let mut connection = self.reader.connect().await?;
        loop {
            let raw = connection.read_next().await?;
            self.process(&raw).await;
        }
    }

    /// Handle one record. Returns how many replies were delivered.
    pub async fn process(&self, raw: &RawEvent) -> usize {
        let event = match self.correlator.correlate(raw) {
            Ok(Correlation::Event(event)) => event,
            Ok(Correlation::Ignore) => return 0,
            Err(e) => {
                warn!(error = %e, record = %raw.to_text(), "skipping undecodable record");
                return 0;
            },
        };
        debug!(
            kind = %event.kind,
            channel_id = %event.channel_id,
            anchor_id = event.anchor_id,
            "handling event"
        );

        let mut delivered = 0;
        for outcome in self.dispatcher.handle(&event).await {
            if matches!(outcome, ReplyOutcome::NoReply) {
                continue;
            }
            match self
                .poster
                .post(&outcome, event.anchor_id, &event.channel_id)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => warn!(
                    channel_id = %event.channel_id,
                    anchor_id = event.anchor_id,
                    error = %e,
                    "reply not delivered"
                ),
            }
        }
        delivered
    }
}
