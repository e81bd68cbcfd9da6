//! End-to-end accounting through the JSON-lines host protocol, with the
//! account served by a mock endpoint and state kept in a temp file.

use std::io::Write;
use std::sync::{Arc, Mutex};

use tempfile::TempDir;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use packycost::host::{HostEvent, JsonLinesNotifier};
use packycost::{
    AccountingService, Config, EventOutcome, HttpSnapshotSource, JsonFileStore, StateStore,
};

/// Clonable in-memory sink so the test can read what the notifier wrote.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl SharedBuf {
    fn lines(&self) -> Vec<serde_json::Value> {
        let buf = self.0.lock().unwrap();
        String::from_utf8_lossy(&buf)
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

struct Fixture {
    _dir: TempDir,
    server: MockServer,
    store: Arc<JsonFileStore>,
    output: SharedBuf,
    service: AccountingService,
}

async fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let config = Config {
        endpoint: server.uri(),
        api_key: Some("sk-mock-key".to_string()),
        ..Config::default()
    };
    let store = Arc::new(JsonFileStore::new(dir.path().join("state.json")));
    let output = SharedBuf::default();
    let service = AccountingService::new(
        config.clone(),
        Arc::new(HttpSnapshotSource::from_config(&config)),
        store.clone(),
        Arc::new(JsonLinesNotifier::new(output.clone())),
    );
    Fixture {
        _dir: dir,
        server,
        store,
        output,
        service,
    }
}

/// Serve `total` for the next `times` requests.
async fn serve_total(server: &MockServer, total: f64, times: u64) {
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "total_spent_usd": total,
            "daily_spent_usd": 1.5,
            "daily_budget_usd": 20
        })))
        .up_to_n_times(times)
        .mount(server)
        .await;
}

async fn feed(service: &AccountingService, line: &str) -> EventOutcome {
    let event: HostEvent = serde_json::from_str(line).unwrap();
    service.handle_event(event).await
}

const USER: &str = r#"{"type":"turn-completed","role":"user","messageId":"u1","sessionId":"s1"}"#;
const PART: &str = r#"{"type":"part-observed","messageId":"m1","sessionId":"s1","timestamp":1320}"#;
const ASSISTANT: &str = r#"{"type":"turn-completed","role":"assistant","messageId":"m1",
    "sessionId":"s1","providerId":"packycode","createdAt":1000,"completedAt":3000,
    "tokens":{"input":120,"output":340,"cache":{"read":50,"write":0}}}"#;

#[tokio::test]
async fn test_turn_is_charged_once_and_persisted() {
    let f = fixture().await;
    serve_total(&f.server, 10.0, 1).await;
    serve_total(&f.server, 10.25, 10).await;

    assert_eq!(feed(&f.service, USER).await, EventOutcome::Recorded);
    assert_eq!(feed(&f.service, PART).await, EventOutcome::Observed);
    let EventOutcome::Accounted(charge) = feed(&f.service, ASSISTANT).await else {
        panic!("expected an accounted turn");
    };
    assert_eq!(feed(&f.service, ASSISTANT).await, EventOutcome::Duplicate);

    assert!((charge.delta.unwrap() - 0.25).abs() < 1e-9);
    assert_eq!(charge.first_token_latency, Some(320.0));

    let state = f.store.load();
    assert_eq!(state.baseline_by_session["s1"], 10.0);
    assert!((state.session_totals["s1"] - 0.25).abs() < 1e-9);
    let stats = state.session_stats["s1"];
    assert_eq!(stats.input_tokens, 120);
    assert_eq!(stats.output_tokens, 340);
    assert_eq!(stats.cache_tokens, 50);
    assert_eq!(stats.latency_count, 1);
    assert!((state.aggregate_stats["__all__"].cost - 0.25).abs() < 1e-9);
    assert_eq!(state.last_snapshot.unwrap().total_spent, Some(10.25));

    let toasts: Vec<_> = f
        .output
        .lines()
        .into_iter()
        .filter(|line| line["type"] == "toast")
        .collect();
    assert_eq!(toasts.len(), 1);
    let message = toasts[0]["message"].as_str().unwrap();
    assert!(message.contains("This turn: $0.2500 | Session: $0.2500"));
    assert!(message.contains("first token 320 ms"));
}

#[tokio::test]
async fn test_account_outage_keeps_tokens_and_skips_cost() {
    let f = fixture().await;
    serve_total(&f.server, 10.0, 1).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&f.server)
        .await;

    feed(&f.service, USER).await;
    let EventOutcome::Accounted(charge) = feed(&f.service, ASSISTANT).await else {
        panic!("expected an accounted turn");
    };

    assert_eq!(charge.delta, None);
    let state = f.store.load();
    assert_eq!(state.session_totals["s1"], 0.0);
    assert_eq!(state.session_stats["s1"].output_tokens, 340);
    assert_eq!(state.session_stats["s1"].cost, 0.0);

    let lines = f.output.lines();
    assert_eq!(lines[0]["variant"], "warning");
}

#[tokio::test]
async fn test_state_survives_a_new_service() {
    let f = fixture().await;
    serve_total(&f.server, 10.0, 1).await;
    serve_total(&f.server, 10.5, 10).await;

    feed(&f.service, USER).await;
    feed(&f.service, ASSISTANT).await;

    let config = Config {
        endpoint: f.server.uri(),
        api_key: Some("sk-mock-key".to_string()),
        ..Config::default()
    };
    let restarted = AccountingService::new(
        config.clone(),
        Arc::new(HttpSnapshotSource::from_config(&config)),
        Arc::new(JsonFileStore::new(f.store.path())),
        Arc::new(JsonLinesNotifier::new(Vec::new())),
    );
    let view = restarted.report(None).await;

    assert_eq!(view.usage.session_id.as_deref(), Some("s1"));
    assert!((view.usage.session.cost - 0.5).abs() < 1e-9);
    assert!(!view.snapshot_cached);
}

#[tokio::test]
async fn test_commands_are_handled_and_confirmed() {
    let f = fixture().await;
    serve_total(&f.server, 10.0, 1).await;
    serve_total(&f.server, 10.25, 10).await;

    feed(&f.service, USER).await;
    feed(&f.service, ASSISTANT).await;

    let outcome = feed(
        &f.service,
        r#"{"type":"command","command":"clearcost","sessionId":"s1"}"#,
    )
    .await;
    assert!(matches!(outcome, EventOutcome::CommandHandled { .. }));

    let state = f.store.load();
    assert!(!state.session_stats.contains_key("s1"));
    assert!((state.aggregate_stats["__all__"].cost - 0.25).abs() < 1e-9);

    feed(
        &f.service,
        r#"{"type":"command","command":"clear-all-usage","sessionId":"s1"}"#,
    )
    .await;
    let state = f.store.load();
    assert!(state.aggregate_stats.is_empty());
    assert!(state.last_session_id.is_none());

    let posts: Vec<_> = f
        .output
        .lines()
        .into_iter()
        .filter(|line| line["type"] == "session-message")
        .collect();
    assert_eq!(posts.len(), 2);
    assert!(posts[0]["text"].as_str().unwrap().contains("this session"));
    assert!(posts[1]["text"].as_str().unwrap().contains("all sessions"));
}
