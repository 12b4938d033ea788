//! Wit.ai client.
//!
//! Wit answers with an `outcome` holding the intent name and a bag of
//! entities. Some entities come back as a single object or as an array
//! depending on how many matches there were; [`OneOrMany`] absorbs that.

use {
    async_trait::async_trait,
    reqwest::{Client, StatusCode},
    secrecy::{ExposeSecret, Secret},
    serde::Deserialize,
    tracing::debug,
};

use {cortex_config::WitConfig, url::Url};

use crate::{
    classifier::IntentClassifier,
    error::{Error, Result},
    types::{Intent, LightState, TemperatureUnit},
};

/// Either a single value or an array of them; normalized with [`OneOrMany::into_vec`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct WitMessage {
    #[serde(default)]
    msg_body: Option<String>,
    outcome: WitOutcome,
}

#[derive(Debug, Deserialize)]
struct WitOutcome {
    #[serde(default)]
    intent: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    entities: WitEntities,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WitEntities {
    on_off: Option<WitValue<String>>,
    number: Option<OneOrMany<WitValue<i64>>>,
    github_issue: Option<OneOrMany<WitValue<i64>>>,
    temperature: Option<WitValue<WitTemperature>>,
}

#[derive(Debug, Clone, Deserialize)]
struct WitValue<T> {
    value: T,
}

#[derive(Debug, Clone, Deserialize)]
struct WitTemperature {
    unit: String,
    temperature: i64,
}

/// Parse a raw Wit `/message` or `/speech` response body into an [`Intent`].
pub fn parse_response(body: &str) -> Result<Intent> {
    let message: WitMessage = serde_json::from_str(body)?;
    debug!(
        intent = %message.outcome.intent,
        confidence = message.outcome.confidence,
        text = message.msg_body.as_deref().unwrap_or_default(),
        "wit outcome"
    );
    message.outcome.into_intent()
}

impl WitOutcome {
    fn into_intent(self) -> Result<Intent> {
        let intent = self.intent.as_str();
        let entities = self.entities;
        match intent {
            "lights" => {
                let number = entities
                    .number
                    .and_then(|n| n.into_vec().into_iter().next())
                    .ok_or_else(|| Error::missing(intent, "number"))?;
                let target_id =
                    u32::try_from(number.value).map_err(|e| Error::invalid("number", e))?;
                let state = entities
                    .on_off
                    .ok_or_else(|| Error::missing(intent, "on_off"))?
                    .value
                    .parse::<LightState>()
                    .map_err(|e| Error::invalid("on_off", e))?;
                Ok(Intent::Lighting { target_id, state })
            },
            "temperature" => {
                let temperature = entities
                    .temperature
                    .ok_or_else(|| Error::missing(intent, "temperature"))?
                    .value;
                let unit = temperature
                    .unit
                    .parse::<TemperatureUnit>()
                    .map_err(|e| Error::invalid("temperature", e))?;
                Ok(Intent::Temperature {
                    degrees: temperature.temperature,
                    unit,
                })
            },
            "github" => {
                let issue_ids = entities
                    .github_issue
                    .ok_or_else(|| Error::missing(intent, "github_issue"))?
                    .into_vec()
                    .into_iter()
                    .map(|n| u64::try_from(n.value).map_err(|e| Error::invalid("github_issue", e)))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Intent::IssueReference { issue_ids })
            },
            _ => Ok(Intent::Unrecognized),
        }
    }
}

/// HTTP client for the Wit message and speech endpoints.
pub struct WitClassifier {
    http: Client,
    api_url: Url,
    access_token: Secret<String>,
}

impl WitClassifier {
    pub fn new(config: &WitConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(http: Client, config: &WitConfig) -> Self {
        Self {
            http,
            api_url: config.api_url.clone(),
            access_token: config.access_token.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.api_url.as_str().trim_end_matches('/'))
    }

    /// Classify a WAV recording; Wit transcribes it and returns the same
    /// outcome shape as for text.
    pub async fn classify_speech(&self, wav: Vec<u8>) -> Result<Intent> {
        if wav.is_empty() {
            return Err(Error::EmptyAudio);
        }
        let resp = self
            .http
            .post(self.endpoint("speech"))
            .bearer_auth(self.access_token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(wav)
            .send()
            .await?;
        parse_response(&read_body(resp).await?)
    }
}

#[async_trait]
impl IntentClassifier for WitClassifier {
    async fn classify(&self, text: &str) -> Result<Intent> {
        let resp = self
            .http
            .get(self.endpoint("message"))
            .query(&[("q", text)])
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;
        parse_response(&read_body(resp).await?)
    }
}

async fn read_body(resp: reqwest::Response) -> Result<String> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Unauthorized);
    }
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::Status { status, body });
    }
    Ok(body)
}
