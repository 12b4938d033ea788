//! Stream record decoding and reply-anchor correlation.
//!
//! A record is decoded twice: once into an [`Envelope`] to read the `event`
//! discriminator and author, then into the shape that event kind uses.

use {
    regex::Regex,
    serde::{Deserialize, Deserializer},
    tracing::trace,
};

use crate::{error::Result, stream::RawEvent};

const EVENT_MESSAGE: &str = "message";
const EVENT_MESSAGE_EDIT: &str = "message-edit";
const EVENT_COMMENT: &str = "comment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NewMessage,
    EditedMessage,
    ThreadedComment,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::NewMessage => EVENT_MESSAGE,
            Self::EditedMessage => EVENT_MESSAGE_EDIT,
            Self::ThreadedComment => EVENT_COMMENT,
        })
    }
}

/// A stream record reduced to what the dispatcher and reply poster need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelatedEvent {
    pub kind: EventKind,
    /// Text to classify.
    pub text: String,
    /// Message a reply must be threaded under.
    pub anchor_id: i64,
    /// Flow the record arrived on.
    pub channel_id: String,
    pub author_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlation {
    Event(CorrelatedEvent),
    /// Our own output, or an event kind we do not react to.
    Ignore,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default, deserialize_with = "author_id")]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageRecord {
    id: i64,
    flow: String,
    content: String,
    #[serde(default, deserialize_with = "author_id")]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditRecord {
    id: i64,
    flow: String,
    content: EditContent,
    #[serde(default, deserialize_with = "author_id")]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EditContent {
    updated_content: String,
}

#[derive(Debug, Deserialize)]
struct CommentRecord {
    id: i64,
    flow: String,
    content: CommentContent,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "author_id")]
    user: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentContent {
    text: String,
}

/// Flowdock sends user ids as strings on some events and as numbers on
/// others.
fn author_id<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(i64),
    }
    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    }))
}

/// Maps raw stream records to [`Correlation`]s.
pub struct EventCorrelator {
    bot_user_id: Option<String>,
    anchor_tag: Regex,
}

impl EventCorrelator {
    /// `anchor_tag` must have one capture group holding the numeric id of the
    /// message a comment belongs to.
    pub fn new(bot_user_id: Option<String>, anchor_tag: Regex) -> Self {
        Self {
            bot_user_id,
            anchor_tag,
        }
    }

    pub fn bot_user_id(&self) -> Option<&str> {
        self.bot_user_id.as_deref()
    }

    /// Decode one record. Errors are [`crate::Error::Decode`] and only
    /// concern this record.
    pub fn correlate(&self, raw: &RawEvent) -> Result<Correlation> {
        let bytes = raw.as_bytes();
        let envelope: Envelope = serde_json::from_slice(bytes)?;

        let kind = match envelope.event.as_str() {
            EVENT_MESSAGE => EventKind::NewMessage,
            EVENT_MESSAGE_EDIT => EventKind::EditedMessage,
            EVENT_COMMENT => EventKind::ThreadedComment,
            other => {
                trace!(event = other, "ignoring event kind");
                return Ok(Correlation::Ignore);
            },
        };
        if self.is_self(envelope.user.as_deref()) {
            trace!(kind = %kind, "ignoring our own event");
            return Ok(Correlation::Ignore);
        }

        let event = match kind {
            EventKind::NewMessage => {
                let record: MessageRecord = serde_json::from_slice(bytes)?;
                CorrelatedEvent {
                    kind,
                    text: record.content,
                    anchor_id: record.id,
                    channel_id: record.flow,
                    author_id: record.user.unwrap_or_default(),
                }
            },
            EventKind::EditedMessage => {
                let record: EditRecord = serde_json::from_slice(bytes)?;
                CorrelatedEvent {
                    kind,
                    text: record.content.updated_content,
                    anchor_id: record.id,
                    channel_id: record.flow,
                    author_id: record.user.unwrap_or_default(),
                }
            },
            EventKind::ThreadedComment => {
                let record: CommentRecord = serde_json::from_slice(bytes)?;
                let anchor_id = self.anchor_from_tags(&record.tags).unwrap_or(record.id);
                CorrelatedEvent {
                    kind,
                    text: record.content.text,
                    anchor_id,
                    channel_id: record.flow,
                    author_id: record.user.unwrap_or_default(),
                }
            },
        };
        Ok(Correlation::Event(event))
    }

    fn is_self(&self, author: Option<&str>) -> bool {
        matches!((self.bot_user_id.as_deref(), author), (Some(bot), Some(user)) if bot == user)
    }

    /// The last tag matching the cross-reference pattern wins.
    fn anchor_from_tags(&self, tags: &[String]) -> Option<i64> {
        tags.iter()
            .filter_map(|tag| self.anchor_tag.captures(tag))
            .filter_map(|caps| caps.get(1)?.as_str().parse::<i64>().ok())
            .last()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, crate::Error, rstest::rstest};

    const BOT: &str = "77156";

    fn correlator() -> EventCorrelator {
        EventCorrelator::new(
            Some(BOT.into()),
            Regex::new(cortex_config::schema::DEFAULT_ANCHOR_TAG_PATTERN).unwrap(),
        )
    }

    fn event(raw: &'static str) -> CorrelatedEvent {
        match correlator().correlate(&RawEvent::from(raw)).unwrap() {
            Correlation::Event(e) => e,
            Correlation::Ignore => panic!("expected an event for {raw}"),
        }
    }

    #[test]
    fn message_uses_content_and_own_id() {
        let e = event(
            r#"{"event":"message","tags":[],"uuid":"x","persist":true,"id":4521,
               "flow":"flow-1","content":"turn the light one on please","sent":1,"user":"31347"}"#,
        );
        assert_eq!(e, CorrelatedEvent {
            kind: EventKind::NewMessage,
            text: "turn the light one on please".into(),
            anchor_id: 4521,
            channel_id: "flow-1".into(),
            author_id: "31347".into(),
        });
    }

    #[test]
    fn edit_uses_updated_content() {
        let e = event(
            r#"{"event":"message-edit","id":99,"flow":"flow-1","user":31347,
               "content":{"message":4521,"updated_content":"it is 20 C"}}"#,
        );
        assert_eq!(e.kind, EventKind::EditedMessage);
        assert_eq!(e.text, "it is 20 C");
        assert_eq!(e.anchor_id, 99);
        assert_eq!(e.author_id, "31347");
    }

    #[test]
    fn comment_tag_overrides_anchor() {
        let e = event(
            r#"{"event":"comment","id":700,"flow":"flow-1","user":"31347",
               "tags":[":thread","influx:4521"],
               "content":{"title":"original","text":"look at #45"}}"#,
        );
        assert_eq!(e.kind, EventKind::ThreadedComment);
        assert_eq!(e.text, "look at #45");
        assert_eq!(e.anchor_id, 4521);
    }

    #[test]
    fn comment_without_tag_keeps_own_id() {
        let e = event(
            r#"{"event":"comment","id":700,"flow":"flow-1","user":"1",
               "tags":["influx:notanumber","other:5"],"content":{"title":"","text":"hi"}}"#,
        );
        assert_eq!(e.anchor_id, 700);
    }

    #[test]
    fn custom_anchor_pattern() {
        let correlator = EventCorrelator::new(None, Regex::new(r"^parent=(\d+)$").unwrap());
        let raw = RawEvent::from(
            r#"{"event":"comment","id":1,"flow":"f","tags":["influx:2","parent=3"],
               "content":{"text":"x"}}"#,
        );
        let Correlation::Event(e) = correlator.correlate(&raw).unwrap() else {
            panic!("expected event");
        };
        assert_eq!(e.anchor_id, 3);
    }

    #[rstest]
    #[case(r#"{"event":"activity.user","user":"1","content":{"last_activity":1}}"#)]
    #[case(r#"{"event":"action","user":"1","content":{"type":"join"}}"#)]
    #[case(r#"{"event":"tag-change","id":1,"flow":"f","content":{"add":["x"]}}"#)]
    #[case(r#"{"event":"file","id":1,"flow":"f","content":{"path":"/a"}}"#)]
    fn other_event_kinds_are_ignored(#[case] raw: &'static str) {
        assert_eq!(
            correlator().correlate(&RawEvent::from(raw)).unwrap(),
            Correlation::Ignore
        );
    }

    #[rstest]
    #[case(r#"{"event":"comment","id":5,"flow":"f","user":"77156","tags":["influx:9"],"content":{"text":"Which is 68F"}}"#)]
    #[case(r#"{"event":"comment","id":5,"flow":"f","user":77156,"tags":[],"content":{"text":"x"}}"#)]
    #[case(r#"{"event":"message","id":5,"flow":"f","user":"77156","content":"Turning light 1 on"}"#)]
    fn own_events_are_ignored(#[case] raw: &'static str) {
        assert_eq!(
            correlator().correlate(&RawEvent::from(raw)).unwrap(),
            Correlation::Ignore
        );
    }

    #[test]
    fn nothing_is_suppressed_without_bot_id() {
        let correlator = EventCorrelator::new(
            None,
            Regex::new(cortex_config::schema::DEFAULT_ANCHOR_TAG_PATTERN).unwrap(),
        );
        let raw =
            RawEvent::from(r#"{"event":"message","id":5,"flow":"f","user":"77156","content":"x"}"#);
        assert!(matches!(
            correlator.correlate(&raw).unwrap(),
            Correlation::Event(_)
        ));
    }

    #[rstest]
    #[case("not json at all")]
    #[case(r#"{"id":1}"#)]
    #[case(r#"{"event":"message","id":"abc","flow":"f","content":"x"}"#)]
    #[case(r#"{"event":"message-edit","id":1,"flow":"f","content":"flat"}"#)]
    #[case(r#"{"event":"comment","id":1,"flow":"f","content":{"title":"no text"}}"#)]
    fn malformed_records_are_decode_errors(#[case] raw: &'static str) {
        assert!(matches!(
            correlator().correlate(&RawEvent::from(raw)),
            Err(Error::Decode(_))
        ));
    }
}
