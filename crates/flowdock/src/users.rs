use {serde::Deserialize, tracing::debug};

use crate::{
    client::{FlowdockApi, status_and_body},
    error::{Error, Result},
};

/// A member of the organization, as listed by `GET /users`.
#[derive(Debug, Clone, Deserialize)]
pub struct FlowdockUser {
    pub id: i64,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// List all users the token can see.
pub async fn fetch_users(api: &FlowdockApi) -> Result<Vec<FlowdockUser>> {
    let resp = api.get("users").send().await?;
    if !resp.status().is_success() {
        let (status, body) = status_and_body(resp).await;
        return Err(Error::Message(format!(
            "user list request failed ({status}): {body}"
        )));
    }
    Ok(resp.json().await?)
}

/// Find a user id by email (case-insensitive).
pub fn find_user_id(users: &[FlowdockUser], email: &str) -> Option<String> {
    users
        .iter()
        .find(|u| u.email.eq_ignore_ascii_case(email.trim()))
        .map(|u| u.id.to_string())
}

/// Resolve the bot's own user id from its account email.
pub async fn resolve_bot_user_id(api: &FlowdockApi, email: &str) -> Result<Option<String>> {
    let users = fetch_users(api).await?;
    let id = find_user_id(&users, email);
    debug!(email, found = id.is_some(), users = users.len(), "resolved bot user");
    Ok(id)
}
