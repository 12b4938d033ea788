use std::pin::Pin;

use {
    bytes::Bytes,
    futures::{Stream, StreamExt},
    tracing::{debug, info},
};

use crate::{
    client::{FlowdockApi, status_and_body},
    error::{Error, Result},
};

/// Records on the stream end with a carriage return.
pub const RECORD_SEPARATOR: u8 = b'\r';

/// Anything shorter than this after trimming cannot be a JSON object.
pub const MIN_RECORD_LEN: usize = 4;

type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// One trimmed record pulled off the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent(Bytes);

impl RawEvent {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lossy text form for logging.
    pub fn to_text(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl From<&'static str> for RawEvent {
    fn from(record: &'static str) -> Self {
        Self(Bytes::from_static(record.as_bytes()))
    }
}

impl From<String> for RawEvent {
    fn from(record: String) -> Self {
        Self(Bytes::from(record))
    }
}

/// Opens the flow stream.
pub struct StreamReader {
    api: FlowdockApi,
    flows: String,
}

impl StreamReader {
    pub fn new(api: FlowdockApi, flows: impl Into<String>) -> Self {
        Self {
            api,
            flows: flows.into(),
        }
    }

    /// Open the stream for the configured flow filter. Anything but a success
    /// status on the handshake is an [`Error::Connection`].
    pub async fn connect(&self) -> Result<Connection> {
        let resp = self
            .api
            .stream("flows")
            .query(&[("filter", self.flows.as_str())])
            .send()
            .await
            .map_err(|e| Error::Connection {
                status: e.status(),
                message: e.to_string(),
            })?;
        if !resp.status().is_success() {
            let (status, body) = status_and_body(resp).await;
            return Err(Error::Connection {
                status: Some(status),
                message: format!("stream handshake returned {status}: {body}"),
            });
        }
        info!(flows = %self.flows, "flow stream connected");
        Ok(Connection::from_stream(
            resp.bytes_stream()
                .map(|chunk| chunk.map_err(std::io::Error::other)),
        ))
    }
}

/// A live stream, yielding one [`RawEvent`] per record.
pub struct Connection {
    body: ByteStream,
    buf: Vec<u8>,
}

impl Connection {
    /// Wrap any byte stream; used for the HTTP body and in tests.
    pub fn from_stream(body: impl Stream<Item = std::io::Result<Bytes>> + Send + 'static) -> Self {
        Self {
            body: Box::pin(body),
            buf: Vec::new(),
        }
    }

    /// Wait for the next complete record.
    ///
    /// Fails with [`Error::StreamTerminated`] when the connection closes
    /// (a trailing partial record is discarded), when reading fails, or when
    /// a record is too short to be valid JSON.
    pub async fn read_next(&mut self) -> Result<RawEvent> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == RECORD_SEPARATOR) {
                let mut record: Vec<u8> = self.buf.drain(..=pos).collect();
                record.pop();
                let trimmed = record.trim_ascii();
                if trimmed.len() < MIN_RECORD_LEN {
                    return Err(Error::StreamTerminated(format!(
                        "implausible record of {} bytes",
                        trimmed.len()
                    )));
                }
                return Ok(RawEvent(Bytes::copy_from_slice(trimmed)));
            }

            match self.body.next().await {
                Some(Ok(chunk)) => self.buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    return Err(Error::StreamTerminated(format!("read failed: {e}")));
                },
                None => {
                    if !self.buf.trim_ascii().is_empty() {
                        debug!(
                            bytes = self.buf.len(),
                            "discarding partial record at end of stream"
                        );
                    }
                    return Err(Error::StreamTerminated("connection closed".into()));
                },
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, cortex_config::FlowdockConfig, secrecy::Secret, url::Url};

    fn connection(chunks: Vec<&'static str>) -> Connection {
        Connection::from_stream(futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes()))),
        ))
    }

    fn reader(url: &str) -> StreamReader {
        let config = FlowdockConfig {
            access_token: Secret::new("token".into()),
            stream_url: Url::parse(url).unwrap(),
            ..FlowdockConfig::default()
        };
        StreamReader::new(FlowdockApi::new(&config), "org/main,org/ops")
    }

    #[tokio::test]
    async fn splits_records_across_chunks() {
        let mut conn = connection(vec![
            "{\"event\":\"mess",
            "age\"}\r\n{\"event\":\"comment\"}\r\n",
        ]);
        assert_eq!(
            conn.read_next().await.unwrap().as_bytes(),
            br#"{"event":"message"}"#
        );
        assert_eq!(
            conn.read_next().await.unwrap().as_bytes(),
            br#"{"event":"comment"}"#
        );
        assert!(matches!(
            conn.read_next().await,
            Err(Error::StreamTerminated(_))
        ));
    }

    #[tokio::test]
    async fn short_record_terminates() {
        let mut conn = connection(vec!["  {}\r\n"]);
        let err = conn.read_next().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("implausible"));
    }

    #[tokio::test]
    async fn partial_record_at_close_terminates() {
        let mut conn = connection(vec!["{\"event\":\"message\""]);
        assert!(matches!(
            conn.read_next().await,
            Err(Error::StreamTerminated(msg)) if msg == "connection closed"
        ));
    }

    #[tokio::test]
    async fn read_error_terminates() {
        let mut conn = Connection::from_stream(futures::stream::iter(vec![Err(
            std::io::Error::other("reset by peer"),
        )]));
        assert!(matches!(
            conn.read_next().await,
            Err(Error::StreamTerminated(msg)) if msg.contains("reset by peer")
        ));
    }

    #[tokio::test]
    async fn connect_sends_filter_and_reads_records() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/flows")
            .match_query(mockito::Matcher::UrlEncoded(
                "filter".into(),
                "org/main,org/ops".into(),
            ))
            .match_header("authorization", "Basic dG9rZW4=")
            .with_status(200)
            .with_body("{\"event\":\"message\",\"id\":1}\r\n")
            .create_async()
            .await;

        let mut conn = reader(&server.url()).connect().await.unwrap();
        assert_eq!(
            conn.read_next().await.unwrap().to_text(),
            r#"{"event":"message","id":1}"#
        );
        assert!(conn.read_next().await.is_err());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_handshake_is_connection_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/flows")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create_async()
            .await;

        let err = reader(&server.url()).connect().await.err().unwrap();
        assert!(matches!(
            err,
            Error::Connection { status: Some(s), .. } if s == 401
        ));
    }
}
