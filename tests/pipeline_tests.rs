//! End-to-end pipeline tests against an in-memory blueprint server.
//!
//! Scripts really run; only the HTTP exchange is replaced.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use blueprint_agent::error::{PipelineError, TransportError};
use blueprint_agent::pipeline::{PipelineConfig, PipelineCoordinator};
use blueprint_agent::report::{ConclusionEnvelope, ScriptConclusion, TIMESTAMP_FORMAT};
use blueprint_agent::transport::Transport;
use chrono::DateTime;
use serde_json::json;
use tempfile::TempDir;

/// Serves a fixed listing and records every conclusion posted to it.
struct FakeServer {
    listing: Result<String, u16>,
    /// Identities whose delivery is rejected with a 500.
    rejected: HashSet<String>,
    /// Identities whose delivery panics inside the transport.
    panics: HashSet<String>,
    /// Per-identity delay before answering a POST.
    delays: HashMap<String, Duration>,
    gets: Mutex<Vec<String>>,
    posts: Mutex<Vec<(String, ScriptConclusion)>>,
}

impl FakeServer {
    fn new(listing: serde_json::Value) -> Self {
        Self {
            listing: Ok(listing.to_string()),
            rejected: HashSet::new(),
            panics: HashSet::new(),
            delays: HashMap::new(),
            gets: Mutex::new(Vec::new()),
            posts: Mutex::new(Vec::new()),
        }
    }

    fn unreachable_listing(code: u16) -> Self {
        Self {
            listing: Err(code),
            ..Self::new(json!([]))
        }
    }

    fn raw_listing(body: &str) -> Self {
        Self {
            listing: Ok(body.to_string()),
            ..Self::new(json!([]))
        }
    }

    fn reject(mut self, identity: &str) -> Self {
        self.rejected.insert(identity.to_string());
        self
    }

    fn panic_on(mut self, identity: &str) -> Self {
        self.panics.insert(identity.to_string());
        self
    }

    fn delay(mut self, identity: &str, millis: u64) -> Self {
        self.delays
            .insert(identity.to_string(), Duration::from_millis(millis));
        self
    }

    fn conclusions(&self) -> Vec<ScriptConclusion> {
        self.posts
            .lock()
            .expect("lock poisoned")
            .iter()
            .map(|(_, c)| c.clone())
            .collect()
    }

    fn conclusion_for(&self, identity: &str) -> ScriptConclusion {
        self.conclusions()
            .into_iter()
            .find(|c| c.script_characterization_id == identity)
            .unwrap_or_else(|| panic!("no conclusion posted for {identity}"))
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn get(&self, path: &str) -> Result<Vec<u8>, TransportError> {
        self.gets.lock().expect("lock poisoned").push(path.to_string());
        match &self.listing {
            Ok(body) => Ok(body.clone().into_bytes()),
            Err(code) => Err(TransportError::Status {
                code: *code,
                body: "unavailable".to_string(),
            }),
        }
    }

    async fn post_json(&self, path: &str, body: Vec<u8>) -> Result<String, TransportError> {
        let envelope: ConclusionEnvelope =
            serde_json::from_slice(&body).expect("conclusion envelope");
        let identity = envelope.script_conclusion.script_characterization_id.clone();

        if let Some(delay) = self.delays.get(&identity) {
            tokio::time::sleep(*delay).await;
        }
        if self.panics.contains(&identity) {
            panic!("collector bug");
        }

        self.posts
            .lock()
            .expect("lock poisoned")
            .push((path.to_string(), envelope.script_conclusion));

        if self.rejected.contains(&identity) {
            return Err(TransportError::Status {
                code: 500,
                body: "collector exploded".to_string(),
            });
        }
        Ok("201 Created".to_string())
    }
}

fn unit(order: i64, identity: &str, code: &str) -> serde_json::Value {
    json!({
        "execution_order": order,
        "parameter_values": {},
        "type": "boot",
        "uuid": identity,
        "script": {"code": code, "uuid": format!("script-{identity}"), "attachment_paths": []}
    })
}

fn append_to(path: &Path, text: &str) -> String {
    format!("echo {} >> '{}'", text, path.display())
}

fn coordinator(server: &Arc<FakeServer>) -> PipelineCoordinator {
    PipelineCoordinator::new(PipelineConfig::new(), server.clone()).expect("valid config")
}

#[tokio::test]
async fn test_scripts_run_in_declared_order() {
    let temp = TempDir::new().unwrap();
    let log = temp.path().join("order.log");

    let server = Arc::new(FakeServer::new(json!([
        unit(3, "c", &append_to(&log, "c")),
        unit(1, "a", &append_to(&log, "a")),
        unit(2, "b1", &append_to(&log, "b1")),
        unit(2, "b2", &append_to(&log, "b2")),
    ])));

    let summary = coordinator(&server).run().await.unwrap();
    assert_eq!(summary.units, 4);
    assert_eq!(summary.script_failures, 0);

    assert_eq!(fs::read_to_string(&log).unwrap(), "a\nb1\nb2\nc\n");

    // Start times follow the same sequence.
    let started: Vec<_> = ["a", "b1", "b2", "c"]
        .iter()
        .map(|id| {
            let conclusion = server.conclusion_for(id);
            DateTime::parse_from_str(&conclusion.started_at, TIMESTAMP_FORMAT).unwrap()
        })
        .collect();
    assert!(started.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_each_script_finishes_before_the_next_starts() {
    let temp = TempDir::new().unwrap();
    let marker = temp.path().join("first.done");

    // The second script only succeeds if the first has fully completed.
    let server = Arc::new(FakeServer::new(json!([
        unit(1, "first", &format!("sleep 0.2\ntouch '{}'", marker.display())),
        unit(2, "second", &format!("test -f '{}'", marker.display())),
    ])));

    let summary = coordinator(&server).run().await.unwrap();
    assert_eq!(summary.script_failures, 0);
    assert_eq!(server.conclusion_for("second").exit_code, 0);
}

#[tokio::test]
async fn test_outcomes_are_reported() {
    let server = Arc::new(FakeServer::new(json!([
        unit(1, "hello", "echo Hello!"),
        unit(2, "unknown", "lk"),
        unit(3, "stderr", "echo oops 1>&2\nexit 9"),
    ])));

    let summary = coordinator(&server).run().await.unwrap();
    assert_eq!(summary.script_failures, 2);

    let hello = server.conclusion_for("hello");
    assert_eq!(hello.output, "Hello!\n");
    assert_eq!(hello.exit_code, 0);

    assert_eq!(server.conclusion_for("unknown").exit_code, 127);

    let stderr = server.conclusion_for("stderr");
    assert_eq!(stderr.output, "oops\n");
    assert_eq!(stderr.exit_code, 9);

    for conclusion in server.conclusions() {
        let started = DateTime::parse_from_str(&conclusion.started_at, TIMESTAMP_FORMAT).unwrap();
        let finished = DateTime::parse_from_str(&conclusion.finished_at, TIMESTAMP_FORMAT).unwrap();
        assert!(started <= finished);
    }
}

#[tokio::test]
async fn test_one_result_per_outcome_regardless_of_arrival() {
    let server = Arc::new(
        FakeServer::new(json!([
            unit(1, "slow", "true"),
            unit(2, "medium", "true"),
            unit(3, "fast", "true"),
        ]))
        .delay("slow", 150)
        .delay("medium", 75),
    );

    let summary = coordinator(&server).run().await.unwrap();

    assert_eq!(summary.results.len(), 3);
    let identities: HashSet<_> = summary.results.iter().map(|r| r.identity.as_str()).collect();
    assert_eq!(identities, HashSet::from(["slow", "medium", "fast"]));
    assert!(summary.results.iter().all(|r| r.delivered));
    assert!(summary.results.iter().all(|r| r.status_text == "201 Created"));

    // Deliveries overlap, so the fastest answer is collected first.
    assert_eq!(summary.results[0].identity, "fast");
}

#[tokio::test]
async fn test_failed_delivery_does_not_block_others() {
    let server = Arc::new(
        FakeServer::new(json!([
            unit(1, "a", "echo a"),
            unit(2, "b", "echo b"),
            unit(3, "c", "echo c"),
        ]))
        .reject("b"),
    );

    let summary = coordinator(&server).run().await.unwrap();

    assert_eq!(server.conclusions().len(), 3);
    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.delivered(), 2);
    assert_eq!(summary.delivery_failures(), 1);

    let failed = summary.results.iter().find(|r| !r.delivered).unwrap();
    assert_eq!(failed.identity, "b");
    assert!(failed.status_text.contains("500"));
    assert!(failed.status_text.contains("collector exploded"));
}

#[tokio::test]
async fn test_panicking_delivery_yields_failed_result() {
    let server = Arc::new(
        FakeServer::new(json!([
            unit(1, "a", "true"),
            unit(2, "boom", "true"),
            unit(3, "c", "true"),
        ]))
        .panic_on("boom"),
    );

    let summary = tokio::time::timeout(Duration::from_secs(5), coordinator(&server).run())
        .await
        .expect("collection finished")
        .unwrap();

    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.delivered(), 2);

    let failed = summary.results.iter().find(|r| !r.delivered).unwrap();
    assert_eq!(failed.identity, "boom");
    assert!(failed.status_text.contains("delivery task failed"));
    assert!(failed.status_text.contains("collector bug"));
}

#[tokio::test]
async fn test_requests_use_configured_paths() {
    let server = Arc::new(FakeServer::new(json!([unit(1, "a", "true")])));

    coordinator(&server).run().await.unwrap();

    assert_eq!(
        *server.gets.lock().unwrap(),
        vec!["blueprint/script_characterizations?type=boot".to_string()]
    );
    let posts = server.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "blueprint/script_conclusions");
}

#[tokio::test]
async fn test_retrieval_failure_is_fatal() {
    let server = Arc::new(FakeServer::unreachable_listing(503));

    let err = coordinator(&server).run().await.unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Retrieval(TransportError::Status { code: 503, .. })
    ));
    assert!(server.conclusions().is_empty());
}

#[tokio::test]
async fn test_malformed_listing_runs_nothing() {
    let temp = TempDir::new().unwrap();
    let marker = temp.path().join("ran");

    let listing = json!([
        unit(1, "good", &format!("touch '{}'", marker.display())),
        {"execution_order": "two", "uuid": "bad"}
    ]);
    let server = Arc::new(FakeServer::raw_listing(&listing.to_string()));

    let err = coordinator(&server).run().await.unwrap_err();
    assert!(matches!(err, PipelineError::Parse(_)));
    assert!(!marker.exists());
    assert!(server.conclusions().is_empty());
}
