use {regex::Regex, secrecy::ExposeSecret};

use crate::{
    error::{Error, Result},
    schema::CortexConfig,
};

/// Check that the loaded config can run the requested services.
///
/// The Flowdock token only matters when the stream pipeline is enabled, but
/// every mode needs a classifier token and a usable anchor tag pattern.
pub fn validate(config: &CortexConfig) -> Result<()> {
    if config.wit.access_token.expose_secret().is_empty() {
        return Err(Error::Invalid("wit.access_token is required".into()));
    }
    if config.stream_enabled() && config.flowdock.flows.trim().is_empty() {
        return Err(Error::Invalid(
            "flowdock.flows must name at least one flow to stream".into(),
        ));
    }
    if !config.stream_enabled() && config.http.port.is_none() {
        return Err(Error::Invalid(
            "nothing to run: set flowdock.access_token or http.port".into(),
        ));
    }
    anchor_pattern(&config.flowdock.anchor_tag_pattern)?;
    Ok(())
}

/// Compile the comment cross-reference pattern, requiring one capture group.
pub fn anchor_pattern(raw: &str) -> Result<Regex> {
    let re = Regex::new(raw)
        .map_err(|e| Error::Invalid(format!("flowdock.anchor_tag_pattern: {e}")))?;
    if re.captures_len() < 2 {
        return Err(Error::Invalid(
            "flowdock.anchor_tag_pattern needs a capture group for the message id".into(),
        ));
    }
    Ok(re)
}
