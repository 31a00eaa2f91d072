use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, TimeZone};
use progress_pulse::models::{Narrative, RecurrencePattern, Task};
use progress_pulse::narrative::client::EndpointClient;
use progress_pulse::narrative::dispatch::NarrativeDispatcher;
use progress_pulse::narrative::fallback::fallback_narrative;
use progress_pulse::narrative::openai::{self, OpenAiConfig, OpenAiNarrator};
use progress_pulse::narrative::prompt::build_prompt;
use progress_pulse::narrative::server::{self, NarrativeServer};
use progress_pulse::narrative::{narrate, NarrativeError, NarrativeRequest, NarrativeService};
use progress_pulse::storage::TaskStore;
use progress_pulse::validation::TaskDraft;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

fn one_off_task() -> Task {
    let created = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
    TaskDraft::one_off("Write report", 10, 2).validate(created).unwrap()
}

fn weekly_task() -> Task {
    let created = FixedOffset::east_opt(0).unwrap().with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap();
    TaskDraft::recurring("Morning run", RecurrencePattern::Weekly, vec![1, 3, 5])
        .validate(created)
        .unwrap()
}

/// Echoes the user update back, after an optional delay.
struct EchoService {
    delay: Duration,
}

#[async_trait]
impl NarrativeService for EchoService {
    async fn analyze(&self, request: &NarrativeRequest, _today: NaiveDate) -> Result<Narrative, NarrativeError> {
        let update = request.user_update.clone().unwrap_or_default();
        let delay = if update == "slow" { self.delay } else { Duration::from_millis(5) };
        tokio::time::sleep(delay).await;
        Ok(Narrative {
            progress_made: format!("{}: {}", request.task.title, update),
            progress_to_go: "Keep going".into(),
        })
    }
}

struct FailingService;

#[async_trait]
impl NarrativeService for FailingService {
    async fn analyze(&self, _request: &NarrativeRequest, _today: NaiveDate) -> Result<Narrative, NarrativeError> {
        Err(NarrativeError::Transport("connection refused".into()))
    }
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
    })
}

#[test]
fn test_fallback_one_off() {
    let task = one_off_task();
    let narrative = fallback_narrative(&task, today());
    assert_eq!(narrative.progress_made, "4 of 10 days elapsed (40% of the planned time).");
    assert_eq!(narrative.progress_to_go, "6 days remaining. Next reminder Oct 20, 2026.");

    let overdue = fallback_narrative(&task, NaiveDate::from_ymd_opt(2026, 10, 25).unwrap());
    assert!(overdue.progress_to_go.starts_with("Overdue by 1 day."));
}

#[test]
fn test_fallback_recurring_mentions_weekday() {
    let narrative = fallback_narrative(&weekly_task(), today());
    assert_eq!(narrative.progress_made, "Today is Sunday. This weekly task runs on Mon, Wed, Fri.");
    assert_eq!(narrative.progress_to_go, "Keep the habit going. Next reminder Oct 19, 2026.");
}

#[test]
fn test_fallback_completed() {
    let mut task = one_off_task();
    task.completed = true;
    assert_eq!(fallback_narrative(&task, today()).progress_made, "Task completed. Nice work!");
}

#[test]
fn test_prompt_includes_update() {
    let prompt = build_prompt(&one_off_task(), Some("Finished the outline"), today());
    assert!(prompt.user.contains("Write report"));
    assert!(prompt.user.contains("Finished the outline"));
    assert!(prompt.user.contains("progressMade"));

    let without = build_prompt(&weekly_task(), None, today());
    assert!(!without.user.contains("Latest update from the user"));
}

#[test]
fn test_parse_content() {
    let fenced = "```json\n{\"progressMade\": \"Outline done\", \"progressToGo\": \"Write it\"}\n```";
    let narrative = openai::parse_content(fenced);
    assert_eq!(narrative.progress_made, "Outline done");
    assert_eq!(narrative.progress_to_go, "Write it");

    let garbage = openai::parse_content("Sure! Here's how you're doing...");
    assert_eq!(garbage.progress_made, openai::UNPARSEABLE_PROGRESS_MADE);
    assert_eq!(garbage.progress_to_go, openai::UNPARSEABLE_PROGRESS_TO_GO);
}

#[tokio::test]
async fn test_openai_narrator_success() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion(
            "{\"progressMade\": \"Halfway there\", \"progressToGo\": \"Finish section two\"}",
        )))
        .expect(1)
        .mount(&mock)
        .await;

    let narrator = OpenAiNarrator::new(OpenAiConfig::new("test-key").with_base_url(mock.uri()));
    let request = NarrativeRequest { task: one_off_task(), user_update: Some("Wrote intro".into()) };
    let narrative = narrator.analyze(&request, today()).await.unwrap();

    assert_eq!(narrative.progress_made, "Halfway there");
    assert_eq!(narrative.progress_to_go, "Finish section two");
}

#[tokio::test]
async fn test_openai_narrator_error_status() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "Incorrect API key provided", "type": "invalid_request_error" }
        })))
        .mount(&mock)
        .await;

    let narrator = OpenAiNarrator::new(OpenAiConfig::new("bad").with_base_url(mock.uri()));
    let request = NarrativeRequest { task: one_off_task(), user_update: None };
    match narrator.analyze(&request, today()).await {
        Err(NarrativeError::Status { status, message }) => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect API key provided");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_openai_narrator_missing_content() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&mock)
        .await;

    let narrator = OpenAiNarrator::new(OpenAiConfig::new("k").with_base_url(mock.uri()));
    let request = NarrativeRequest { task: one_off_task(), user_update: None };
    assert!(matches!(narrator.analyze(&request, today()).await, Err(NarrativeError::Malformed(_))));
}

#[tokio::test]
async fn test_endpoint_client_sends_contract() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/analyze-task-progress"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "progressMade": "Good start",
            "progressToGo": "Two sections left"
        })))
        .expect(1)
        .mount(&mock)
        .await;

    let client = EndpointClient::new(format!("{}/analyze-task-progress", mock.uri()));
    let task = one_off_task();
    let request = NarrativeRequest { task: task.clone(), user_update: Some("Started".into()) };
    let narrative = client.analyze(&request, today()).await.unwrap();
    assert_eq!(narrative.progress_made, "Good start");

    let received = mock.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["userUpdate"], "Started");
    assert_eq!(body["task"]["title"], "Write report");
    assert_eq!(body["task"]["schedule"]["mode"], "oneOff");
}

#[tokio::test]
async fn test_endpoint_client_error_body() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": "backend down",
            "progressMade": server::ERROR_PROGRESS_MADE,
            "progressToGo": server::ERROR_PROGRESS_TO_GO
        })))
        .mount(&mock)
        .await;

    let client = EndpointClient::new(mock.uri());
    let request = NarrativeRequest { task: one_off_task(), user_update: None };
    match client.analyze(&request, today()).await {
        Err(NarrativeError::Status { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "backend down");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_narrate_falls_back_on_malformed_response() {
    let mock = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock)
        .await;

    let client = EndpointClient::new(mock.uri());
    let task = one_off_task();
    let outcome = narrate(Some(&client as &dyn NarrativeService), &task, None, today(), Duration::from_secs(5)).await;

    assert!(matches!(outcome.fallback_reason, Some(NarrativeError::Malformed(_))));
    assert_eq!(outcome.narrative, fallback_narrative(&task, today()));
}

#[tokio::test]
async fn test_narrate_times_out() {
    let service = EchoService { delay: Duration::from_secs(5) };
    let task = one_off_task();
    let outcome = narrate(Some(&service as &dyn NarrativeService), &task, Some("slow".into()), today(), Duration::from_millis(50)).await;

    assert!(matches!(outcome.fallback_reason, Some(NarrativeError::Timeout(_))));
    assert_eq!(outcome.narrative, fallback_narrative(&task, today()));
}

#[tokio::test]
async fn test_narrate_without_service() {
    let task = weekly_task();
    let outcome = narrate(None, &task, None, today(), Duration::from_secs(1)).await;
    assert!(matches!(outcome.fallback_reason, Some(NarrativeError::NotConfigured)));
    assert!(outcome.notice().unwrap().starts_with("Showing a local summary"));
}

#[tokio::test]
async fn test_server_round_trip() {
    let service: Arc<dyn NarrativeService> = Arc::new(EchoService { delay: Duration::ZERO });
    let server = NarrativeServer::start(Some(service), "127.0.0.1:0").await.unwrap();

    assert!(server.addr().ip().is_loopback());
    let client = EndpointClient::new(server.url());
    assert!(client.url().ends_with("/analyze-task-progress"));
    let request = NarrativeRequest { task: one_off_task(), user_update: Some("Drafted".into()) };
    let narrative = client.analyze(&request, today()).await.unwrap();
    assert_eq!(narrative.progress_made, "Write report: Drafted");

    server.shutdown();
    tokio::time::sleep(Duration::from_millis(50)).await;
    let after = EndpointClient::new(server.url());
    assert!(after.analyze(&request, today()).await.is_err());
}

#[tokio::test]
async fn test_server_rejects_missing_task() {
    let service: Arc<dyn NarrativeService> = Arc::new(EchoService { delay: Duration::ZERO });
    let server = NarrativeServer::start(Some(service), "127.0.0.1:0").await.unwrap();

    let response = reqwest::Client::new()
        .post(server.url())
        .json(&json!({ "userUpdate": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Task data is required");
    assert_eq!(body["progressMade"], server::ERROR_PROGRESS_MADE);
    assert_eq!(body["progressToGo"], server::ERROR_PROGRESS_TO_GO);

    let bad = reqwest::Client::new()
        .post(server.url())
        .body("{")
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status(), 400);
}

#[tokio::test]
async fn test_server_backend_failure() {
    let service: Arc<dyn NarrativeService> = Arc::new(FailingService);
    let server = NarrativeServer::start(Some(service), "127.0.0.1:0").await.unwrap();

    let response = reqwest::Client::new()
        .post(server.url())
        .json(&json!({ "task": one_off_task() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["progressMade"], server::ERROR_PROGRESS_MADE);

    let unconfigured = NarrativeServer::start(None, "127.0.0.1:0").await.unwrap();
    let response = reqwest::Client::new()
        .post(unconfigured.url())
        .json(&json!({ "task": one_off_task() }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
}

#[tokio::test]
async fn test_server_preflight() {
    let server = NarrativeServer::start(None, "127.0.0.1:0").await.unwrap();
    let response = reqwest::Client::new()
        .request(reqwest::Method::OPTIONS, server.url())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert!(response.headers().contains_key("access-control-allow-headers"));
}

fn store_with(task: &Task) -> (TempDir, TaskStore) {
    let dir = TempDir::new().unwrap();
    let mut store = TaskStore::open(dir.path().join("tasks.json")).unwrap().store;
    store.add(task.clone());
    (dir, store)
}

#[test]
fn test_dispatcher_last_resolved_wins() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let service: Arc<dyn NarrativeService> = Arc::new(EchoService { delay: Duration::from_millis(300) });
    let mut dispatcher = NarrativeDispatcher::new(runtime.handle().clone(), Some(service), Duration::from_secs(5));

    let task = one_off_task();
    let (_dir, mut store) = store_with(&task);

    dispatcher.request(&task, Some("slow".into()), today());
    dispatcher.request(&task, Some("fast".into()), today());
    assert!(dispatcher.is_pending(task.id));
    assert_eq!(dispatcher.pending(), 2);

    let first = dispatcher.apply_next(&mut store, Duration::from_secs(5)).unwrap();
    assert!(first.stored);
    assert_eq!(store.get(task.id).unwrap().progress_made.as_deref(), Some("Write report: fast"));
    assert!(dispatcher.is_pending(task.id));

    let second = dispatcher.apply_next(&mut store, Duration::from_secs(5)).unwrap();
    assert!(second.stored);
    assert!(second.notice.is_none());
    assert_eq!(store.get(task.id).unwrap().progress_made.as_deref(), Some("Write report: slow"));
    assert!(!dispatcher.is_pending(task.id));
    assert_eq!(dispatcher.pending(), 0);
}

#[test]
fn test_dispatcher_drops_result_for_deleted_task() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let service: Arc<dyn NarrativeService> = Arc::new(EchoService { delay: Duration::from_millis(100) });
    let mut dispatcher = NarrativeDispatcher::new(runtime.handle().clone(), Some(service), Duration::from_secs(5));

    let task = one_off_task();
    let (_dir, mut store) = store_with(&task);

    dispatcher.request(&task, Some("slow".into()), today());
    store.remove(task.id).unwrap();

    let applied = dispatcher.apply_next(&mut store, Duration::from_secs(5)).unwrap();
    assert!(!applied.stored);
    assert_eq!(applied.task_id, task.id);
    assert!(store.tasks().is_empty());
}

#[test]
fn test_dispatcher_fallback_notice() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut dispatcher = NarrativeDispatcher::new(runtime.handle().clone(), None, Duration::from_secs(1));

    let task = weekly_task();
    let (_dir, mut store) = store_with(&task);
    assert!(dispatcher.apply_ready(&mut store).is_empty());

    dispatcher.request(&task, None, today());
    let applied = dispatcher.apply_next(&mut store, Duration::from_secs(5)).unwrap();
    assert!(applied.stored);
    assert!(applied.notice.is_some());
    assert_eq!(
        store.get(task.id).unwrap().progress_to_go.as_deref(),
        Some("Keep the habit going. Next reminder Oct 19, 2026.")
    );
}
