//! Config schema types (flowdock, wit, actuator, http).
use std::{collections::HashMap, path::PathBuf};

use {
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    url::Url,
};

pub const DEFAULT_FLOWDOCK_API_URL: &str = "https://api.flowdock.com";
pub const DEFAULT_FLOWDOCK_STREAM_URL: &str = "https://stream.flowdock.com";
pub const DEFAULT_WIT_API_URL: &str = "https://api.wit.ai";
/// Flowdock links a comment to its parent message with an `influx:<id>` tag.
pub const DEFAULT_ANCHOR_TAG_PATTERN: &str = r"^influx:(\d+)$";

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CortexConfig {
    pub flowdock: FlowdockConfig,
    pub wit: WitConfig,
    pub actuator: ActuatorConfig,
    pub http: HttpConfig,
}

impl CortexConfig {
    /// Whether the Flowdock stream pipeline should be started.
    pub fn stream_enabled(&self) -> bool {
        !self.flowdock.access_token.expose_secret().is_empty()
    }
}

/// Flowdock account, stream filter and reply routing.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct FlowdockConfig {
    /// Personal API token, sent as HTTP Basic credentials.
    pub access_token: Secret<String>,

    /// Comma separated `organization/flow` list to subscribe to.
    pub flows: String,

    /// Our own Flowdock user id; events authored by it are ignored.
    pub bot_user_id: Option<String>,

    /// Used to look up `bot_user_id` from the user list when it is not set.
    pub bot_email: Option<String>,

    /// Regex with one capture group matching a comment tag that names the
    /// message a reply should be threaded under.
    pub anchor_tag_pattern: String,

    /// Issue tracker base URL per flow (keyed by parameterized flow name).
    /// The issue number is appended verbatim.
    pub issue_trackers: HashMap<String, String>,

    pub api_url: Url,
    pub stream_url: Url,
}

impl std::fmt::Debug for FlowdockConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowdockConfig")
            .field("access_token", &"[REDACTED]")
            .field("flows", &self.flows)
            .field("bot_user_id", &self.bot_user_id)
            .field("bot_email", &self.bot_email)
            .field("anchor_tag_pattern", &self.anchor_tag_pattern)
            .field("issue_trackers", &self.issue_trackers)
            .field("api_url", &self.api_url.as_str())
            .field("stream_url", &self.stream_url.as_str())
            .finish()
    }
}

impl Default for FlowdockConfig {
    fn default() -> Self {
        Self {
            access_token: Secret::new(String::new()),
            flows: String::new(),
            bot_user_id: None,
            bot_email: None,
            anchor_tag_pattern: DEFAULT_ANCHOR_TAG_PATTERN.into(),
            issue_trackers: HashMap::new(),
            api_url: default_url(DEFAULT_FLOWDOCK_API_URL),
            stream_url: default_url(DEFAULT_FLOWDOCK_STREAM_URL),
        }
    }
}

/// Wit.ai classifier credentials.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct WitConfig {
    pub access_token: Secret<String>,
    pub api_url: Url,
}

impl std::fmt::Debug for WitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WitConfig")
            .field("access_token", &"[REDACTED]")
            .field("api_url", &self.api_url.as_str())
            .finish()
    }
}

impl Default for WitConfig {
    fn default() -> Self {
        Self {
            access_token: Secret::new(String::new()),
            api_url: default_url(DEFAULT_WIT_API_URL),
        }
    }
}

/// Light controller attached over USB serial.
///
/// The controller expects 9600 baud 8N1 and cortex does not set the line up
/// itself; configure the device first, e.g.
/// `stty -F /dev/ttyACM0 9600 cs8 -cstopb -parenb raw`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    /// Device node to write commands to. Autodetected under `/dev` when unset.
    pub device: Option<PathBuf>,
}

/// Ad-hoc HTTP endpoints (`/wit`, `/sms`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Port to listen on; the endpoints are disabled when unset.
    pub port: Option<u16>,
    pub bind: Option<String>,
}

impl HttpConfig {
    pub fn bind_addr(&self) -> Option<String> {
        let port = self.port?;
        let host = self.bind.as_deref().unwrap_or("127.0.0.1");
        Some(format!("{host}:{port}"))
    }
}

#[allow(clippy::expect_used)]
fn default_url(raw: &str) -> Url {
    Url::parse(raw).expect("built-in default URL is valid")
}
