//! Ad-hoc HTTP endpoints for trying the classifier without Flowdock.

use std::sync::Arc;

use {
    anyhow::Context,
    axum::{
        Router,
        extract::{Query, State},
        http::StatusCode,
        routing::get,
    },
    cortex_bridge::Dispatcher,
    cortex_flowdock::ReplyOutcome,
    serde::Deserialize,
    tokio::task::JoinHandle,
    tracing::{error, info, warn},
};

const WIT_USAGE: &str = "Please add a /wit?q=<text here> to the url";

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/wit", get(wit_handler))
        .route("/sms", get(sms_handler))
        .with_state(AppState { dispatcher })
}

pub async fn serve(addr: String, dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "http endpoints listening");
    axum::serve(listener, router(dispatcher)).await?;
    Ok(())
}

/// Serve next to the stream pipeline. Nothing awaits the task, so a failure
/// (port already taken, listener error) is logged here.
pub fn spawn(addr: String, dispatcher: Arc<Dispatcher>) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = serve(addr, dispatcher).await {
            error!(error = %e, "http endpoints stopped");
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WitQuery {
    q: String,
}

/// Messages sent here have no flow, so issue references cannot be linked.
async fn wit_handler(State(state): State<AppState>, Query(query): Query<WitQuery>) -> String {
    if query.q.trim().is_empty() {
        return WIT_USAGE.to_string();
    }
    let replies = state.dispatcher.respond(&query.q, "").await;
    reply_lines(&replies)
}

/// Inbound SMS as delivered by Nexmo.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SmsQuery {
    text: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(rename = "messageID", alias = "messageId")]
    message_id: String,
    #[serde(rename = "message-timestamp")]
    timestamp: String,
    msisdn: String,
}

/// Nexmo retries anything but a 200, so the answer is always 200.
async fn sms_handler(State(state): State<AppState>, Query(sms): Query<SmsQuery>) -> StatusCode {
    if sms.kind != "text" || sms.text.trim().is_empty() {
        warn!(message_id = %sms.message_id, kind = %sms.kind, "ignoring sms without text");
        return StatusCode::OK;
    }
    let replies = state.dispatcher.respond(&sms.text, "").await;
    info!(
        message_id = %sms.message_id,
        from = %sms.msisdn,
        sent_at = %sms.timestamp,
        replies = %reply_lines(&replies),
        "sms handled"
    );
    StatusCode::OK
}

fn reply_lines(replies: &[ReplyOutcome]) -> String {
    replies
        .iter()
        .filter_map(ReplyOutcome::text)
        .collect::<Vec<_>>()
        .join("\n")
}
