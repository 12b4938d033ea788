use {
    base64::{Engine, engine::general_purpose::STANDARD},
    reqwest::{Client, RequestBuilder, Response, header},
    secrecy::{ExposeSecret, Secret},
    url::Url,
};

use cortex_config::FlowdockConfig;

use crate::error::{Context, Result};

/// Authenticated access to the Flowdock REST and streaming hosts.
///
/// Every request carries the personal API token as HTTP Basic credentials.
/// Cloning is cheap; all clones share the underlying connection pool.
#[derive(Clone)]
pub struct FlowdockApi {
    http: Client,
    api_url: Url,
    stream_url: Url,
    authorization: Secret<String>,
}

impl FlowdockApi {
    pub fn new(config: &FlowdockConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: &FlowdockConfig) -> Self {
        let encoded = STANDARD.encode(config.access_token.expose_secret());
        Self {
            http,
            api_url: config.api_url.clone(),
            stream_url: config.stream_url.clone(),
            authorization: Secret::new(format!("Basic {encoded}")),
        }
    }

    /// `GET <api_url>/<path>`.
    pub(crate) fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.http.get(join(&self.api_url, path)))
    }

    /// `GET <stream_url>/<path>`.
    pub(crate) fn stream(&self, path: &str) -> RequestBuilder {
        self.authorized(self.http.get(join(&self.stream_url, path)))
            .header(header::ACCEPT, "application/json")
    }

    /// `POST` a JSON body to an absolute URL handed out by Flowdock itself.
    pub(crate) fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<RequestBuilder> {
        let url = Url::parse(url).with_context(|| format!("invalid reply URL '{url}'"))?;
        Ok(self.authorized(self.http.post(url)).json(body))
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header(header::AUTHORIZATION, self.authorization.expose_secret())
    }
}

fn join(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Split a response into its status and body for error reporting.
pub(crate) async fn status_and_body(resp: Response) -> (reqwest::StatusCode, String) {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    (status, body)
}
