#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use {
    async_trait::async_trait,
    cortex_actuator::Actuator,
    cortex_bridge::{Dispatcher, Error, Pipeline},
    cortex_config::{FlowdockConfig, WitConfig},
    cortex_flowdock::{ChannelDirectory, FlowdockApi, RawEvent},
    cortex_intent::{LightState, WitClassifier},
    mockito::{Matcher, Server, ServerGuard},
    secrecy::Secret,
    serde_json::json,
    url::Url,
};

const BOT: &str = "77156";
const FLOW: &str = "aaaaaaaa-d97b-0000-1111-555598671f8c";

const LIGHT_PAYLOAD: &str = r#"{
  "msg_body": "turn the light one on please",
  "outcome": {
    "intent": "lights",
    "confidence": 1,
    "entities": {
      "on_off": {"value": "on"},
      "number": {"value": 1, "body": "one ", "start": 15, "end": 18}
    }
  }
}"#;

const ISSUES_PAYLOAD: &str = r#"{
  "msg_body": "look at #45, #102 and work on those",
  "outcome": {
    "intent": "github",
    "confidence": 0.997,
    "entities": {
      "github_issue": [{"value": 45}, {"value": 102}]
    }
  }
}"#;

#[derive(Default)]
struct Recorder(Mutex<Vec<(u32, LightState)>>);

#[async_trait]
impl Actuator for Recorder {
    async fn apply(&self, target_id: u32, state: LightState) -> cortex_actuator::Result<()> {
        self.0.lock().unwrap().push((target_id, state));
        Ok(())
    }
}

struct Harness {
    api: ServerGuard,
    stream: ServerGuard,
    wit: ServerGuard,
    actuator: Arc<Recorder>,
}

impl Harness {
    async fn new() -> Self {
        Self {
            api: Server::new_async().await,
            stream: Server::new_async().await,
            wit: Server::new_async().await,
            actuator: Arc::default(),
        }
    }

    fn flowdock_config(&self) -> FlowdockConfig {
        FlowdockConfig {
            access_token: Secret::new("token".into()),
            flows: "fmpwizard/huston".into(),
            bot_user_id: Some(BOT.into()),
            issue_trackers: HashMap::from([(
                "huston".to_string(),
                "https://github.com/fmpwizard/cortex/issues/".to_string(),
            )]),
            api_url: Url::parse(&self.api.url()).unwrap(),
            stream_url: Url::parse(&self.stream.url()).unwrap(),
            ..FlowdockConfig::default()
        }
    }

    async fn mock_flows(&mut self) -> mockito::Mock {
        let body = json!([{
            "id": FLOW,
            "name": "Huston",
            "parameterized_name": "huston",
            "url": format!("{}/flows/fmpwizard/huston", self.api.url()),
        }]);
        self.api
            .mock("GET", "/flows")
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await
    }

    fn pipeline(&self) -> (Pipeline, Arc<ChannelDirectory>) {
        let config = self.flowdock_config();
        let api = FlowdockApi::new(&config);
        let directory = Arc::new(ChannelDirectory::new(api.clone()));
        let classifier = WitClassifier::new(&WitConfig {
            access_token: Secret::new("wit-token".into()),
            api_url: Url::parse(&self.wit.url()).unwrap(),
        });
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(classifier),
            self.actuator.clone(),
            directory.clone(),
            config.issue_trackers.clone(),
        ));
        let pipeline = Pipeline::new(
            api,
            &config,
            config.bot_user_id.clone(),
            dispatcher,
            directory.clone(),
        )
        .unwrap();
        (pipeline, directory)
    }
}

fn stream_body(records: &[String]) -> String {
    records.iter().map(|r| format!("{r}\r\n")).collect()
}

#[tokio::test]
async fn light_request_is_switched_and_answered_in_thread() {
    let mut h = Harness::new().await;
    let flows = h.mock_flows().await;

    let body = stream_body(&[
        json!({"event": "activity.user", "user": "31347", "content": {"last_activity": 1}})
            .to_string(),
        json!({
            "event": "message", "id": 4521, "flow": FLOW, "user": "31347",
            "content": "turn the light one on please", "tags": []
        })
        .to_string(),
        json!({
            "event": "comment", "id": 4522, "flow": FLOW, "user": BOT,
            "tags": ["influx:4521"], "content": {"title": "x", "text": "Turning light 1 on"}
        })
        .to_string(),
        "this is not json".to_string(),
    ]);
    let stream = h
        .stream
        .mock("GET", "/flows")
        .match_query(Matcher::UrlEncoded("filter".into(), "fmpwizard/huston".into()))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;
    let wit = h
        .wit
        .mock("GET", "/message")
        .match_query(Matcher::UrlEncoded(
            "q".into(),
            "turn the light one on please".into(),
        ))
        .with_status(200)
        .with_body(LIGHT_PAYLOAD)
        .expect(1)
        .create_async()
        .await;
    let reply = h
        .api
        .mock("POST", "/flows/fmpwizard/huston/messages/4521/comments")
        .match_body(Matcher::Json(json!({
            "event": "comment",
            "content": "Turning light 1 on",
        })))
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let (pipeline, _) = h.pipeline();
    let err = pipeline.run().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(matches!(
        err,
        Error::Flowdock(cortex_flowdock::Error::StreamTerminated(_))
    ));
    assert_eq!(*h.actuator.0.lock().unwrap(), vec![(1, LightState::On)]);
    flows.assert_async().await;
    stream.assert_async().await;
    wit.assert_async().await;
    reply.assert_async().await;
}

#[tokio::test]
async fn issue_mentions_in_comments_reply_under_tagged_message() {
    let mut h = Harness::new().await;
    let _flows = h.mock_flows().await;
    let _wit = h
        .wit
        .mock("GET", "/message")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(ISSUES_PAYLOAD)
        .create_async()
        .await;
    let first = h
        .api
        .mock("POST", "/flows/fmpwizard/huston/messages/4521/comments")
        .match_body(Matcher::PartialJson(json!({
            "content": "Issue #45: https://github.com/fmpwizard/cortex/issues/45",
        })))
        .with_status(201)
        .create_async()
        .await;
    let second = h
        .api
        .mock("POST", "/flows/fmpwizard/huston/messages/4521/comments")
        .match_body(Matcher::PartialJson(json!({
            "content": "Issue #102: https://github.com/fmpwizard/cortex/issues/102",
        })))
        .with_status(201)
        .create_async()
        .await;

    let (pipeline, directory) = h.pipeline();
    directory.refresh().await.unwrap();
    let raw = RawEvent::from(
        r#"{"event":"comment","id":9000,"flow":"aaaaaaaa-d97b-0000-1111-555598671f8c","user":"31347","tags":["influx:4521"],"content":{"title":"t","text":"look at #45, #102"}}"#,
    );

    assert_eq!(pipeline.process(&raw).await, 2);

    first.assert_async().await;
    second.assert_async().await;
}

#[tokio::test]
async fn directory_failure_stops_before_streaming() {
    let mut h = Harness::new().await;
    let _flows = h
        .api
        .mock("GET", "/flows")
        .with_status(401)
        .with_body("unauthorized")
        .create_async()
        .await;
    let stream = h
        .stream
        .mock("GET", "/flows")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let (pipeline, _) = h.pipeline();
    let err = pipeline.run().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Flowdock(cortex_flowdock::Error::DirectoryUnavailable { .. })
    ));
    stream.assert_async().await;
}

fn light_request(id: i64, flow: &str) -> String {
    json!({
        "event": "message", "id": id, "flow": flow, "user": "31347",
        "content": "turn the light one on please", "tags": []
    })
    .to_string()
}

async fn mock_lights(h: &mut Harness) -> mockito::Mock {
    h.wit
        .mock("GET", "/message")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(LIGHT_PAYLOAD)
        .create_async()
        .await
}

#[tokio::test]
async fn rejected_reply_does_not_stop_the_stream() {
    let mut h = Harness::new().await;
    let _flows = h.mock_flows().await;
    let _wit = mock_lights(&mut h).await;
    let _stream = h
        .stream
        .mock("GET", "/flows")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(stream_body(&[
            light_request(100, FLOW),
            light_request(200, FLOW),
        ]))
        .create_async()
        .await;
    let rejected = h
        .api
        .mock("POST", "/flows/fmpwizard/huston/messages/100/comments")
        .with_status(500)
        .with_body("internal error")
        .expect(1)
        .create_async()
        .await;
    let delivered = h
        .api
        .mock("POST", "/flows/fmpwizard/huston/messages/200/comments")
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let (pipeline, _) = h.pipeline();
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(
        err,
        Error::Flowdock(cortex_flowdock::Error::StreamTerminated(_))
    ));
    assert_eq!(h.actuator.0.lock().unwrap().len(), 2);
    rejected.assert_async().await;
    delivered.assert_async().await;
}

#[tokio::test]
async fn undeliverable_replies_are_not_counted() {
    let mut h = Harness::new().await;
    let _flows = h.mock_flows().await;
    let _wit = mock_lights(&mut h).await;
    let _rejected = h
        .api
        .mock("POST", "/flows/fmpwizard/huston/messages/100/comments")
        .with_status(500)
        .create_async()
        .await;
    let delivered = h
        .api
        .mock("POST", "/flows/fmpwizard/huston/messages/200/comments")
        .with_status(201)
        .expect(1)
        .create_async()
        .await;

    let (pipeline, directory) = h.pipeline();
    directory.refresh().await.unwrap();

    let unknown_flow = RawEvent::from(light_request(300, "flow-404"));
    let rejected = RawEvent::from(light_request(100, FLOW));
    let accepted = RawEvent::from(light_request(200, FLOW));

    assert_eq!(pipeline.process(&unknown_flow).await, 0);
    assert_eq!(pipeline.process(&rejected).await, 0);
    assert_eq!(pipeline.process(&accepted).await, 1);
    delivered.assert_async().await;
}
