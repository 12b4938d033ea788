use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use {
    serde::Deserialize,
    tokio::{task::JoinHandle, time::MissedTickBehavior},
    tracing::{debug, info, warn},
    url::Url,
};

use crate::{
    client::{FlowdockApi, status_and_body},
    error::{Error, Result},
};

/// How often the flow list is re-fetched in the background.
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// One flow the bot can see.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// URL-safe flow name, used to key per-flow settings.
    #[serde(rename = "parameterized_name")]
    pub display_name: String,
    /// REST base for the flow; replies go under `<url>/messages/...`.
    #[serde(rename = "url")]
    pub reply_endpoint: Url,
}

type Snapshot = Arc<HashMap<String, ChannelRecord>>;

/// Read side of the directory, as seen by reply routing and effects.
pub trait ChannelLookup: Send + Sync {
    fn lookup_url(&self, channel_id: &str) -> Result<Url>;
    fn lookup_display_name(&self, channel_id: &str) -> Result<String>;
}

/// Flow id → [`ChannelRecord`] map, replaced wholesale on every refresh.
///
/// Readers clone the current `Arc` and never observe a half-built map.
pub struct ChannelDirectory {
    api: FlowdockApi,
    snapshot: RwLock<Snapshot>,
}

impl ChannelDirectory {
    pub fn new(api: FlowdockApi) -> Self {
        Self {
            api,
            snapshot: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Fetch the full flow list without touching the snapshot.
    pub async fn fetch(&self) -> Result<Vec<ChannelRecord>> {
        let resp = self.api.get("flows").send().await?;
        if !resp.status().is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(Error::DirectoryUnavailable { status, body });
        }
        Ok(resp.json().await?)
    }

    /// Fetch and atomically publish a new snapshot. On error the previous
    /// snapshot stays in place. Returns the number of flows published.
    pub async fn refresh(&self) -> Result<usize> {
        let records = self.fetch().await?;
        let count = records.len();
        self.replace(records);
        debug!(flows = count, "flow directory refreshed");
        Ok(count)
    }

    fn replace(&self, records: Vec<ChannelRecord>) {
        let next: HashMap<_, _> = records.into_iter().map(|r| (r.id.clone(), r)).collect();
        let next = Arc::new(next);
        let mut guard = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        *guard = next;
    }

    /// Spawn the periodic refresh. The first refresh is expected to have run
    /// already (and to have been fatal on failure); failures here are logged
    /// and the last good snapshot is kept.
    pub fn spawn_refresh(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let directory = Arc::clone(self);
        tokio::spawn(async move {
            info!(period_secs = period.as_secs(), "starting flow directory refresh");
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                if let Err(e) = directory.refresh().await {
                    warn!(error = %e, "flow directory refresh failed, keeping previous snapshot");
                }
            }
        })
    }
}

impl ChannelLookup for ChannelDirectory {
    fn lookup_url(&self, channel_id: &str) -> Result<Url> {
        self.snapshot()
            .get(channel_id)
            .map(|r| r.reply_endpoint.clone())
            .ok_or_else(|| Error::channel_not_found(channel_id))
    }

    fn lookup_display_name(&self, channel_id: &str) -> Result<String> {
        self.snapshot()
            .get(channel_id)
            .map(|r| r.display_name.clone())
            .ok_or_else(|| Error::channel_not_found(channel_id))
    }
}
