mod common;

use common::{Harness, Reply};
use core::time::Duration;
use resource_loader::{ErrorKind, LoadError, LoadOptions, Payload, ResourceState};
use serde_json::json;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;

fn retrying(retries: u32) -> LoadOptions {
    LoadOptions {
        retries,
        retry_delay: Duration::from_secs(1),
        ..LoadOptions::default()
    }
}

/// Options that record every `on_error` invocation.
fn recording(options: LoadOptions) -> (LoadOptions, Arc<Mutex<Vec<(ErrorKind, String)>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let options = options.on_error(move |error: &LoadError, key: &str| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((error.kind(), key.to_owned()));
    });
    (options, seen)
}

#[tokio::test(start_paused = true)]
async fn retries_until_success() {
    let harness = Harness::new();
    harness.fetcher.script(
        "/data.json",
        [Reply::Status(500), Reply::Body(200, r#"{"ready":true}"#)],
    );
    let (options, errors) = recording(retrying(2));
    let started = Instant::now();

    let outcome = harness.loader.include_one("/data.json", options).await;

    assert_eq!(outcome, Ok(Payload::Json(json!({"ready": true}))));
    assert_eq!(harness.fetcher.calls_to("/data.json"), 2);
    assert_eq!(harness.loader.attempts("/data.json"), 2);
    assert_eq!(started.elapsed().as_secs(), 1);
    assert_eq!(
        errors.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        vec![(ErrorKind::Network, String::from("/data.json"))]
    );
    assert_eq!(harness.loader.resource_state("/data.json"), ResourceState::Loaded);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_the_last_retry() {
    let harness = Harness::new();
    harness.fetcher.script("/data.json", [Reply::Status(503)]);
    let (options, errors) = recording(retrying(2));
    let started = Instant::now();

    let outcome = harness.loader.include_one("/data.json", options).await;

    let error = outcome.err();
    assert_eq!(error.as_ref().map(LoadError::kind), Some(ErrorKind::Network));
    assert_eq!(
        error.as_ref().map(LoadError::message),
        Some("Network error or resource not found: /data.json (HTTP error! status: 503)")
    );
    assert_eq!(harness.fetcher.calls_to("/data.json"), 3);
    assert_eq!(started.elapsed().as_secs(), 2, "one delay before each retry");
    assert_eq!(errors.lock().unwrap_or_else(PoisonError::into_inner).len(), 3);
    assert_eq!(harness.loader.resource_state("/data.json"), ResourceState::Unloaded);
}

#[tokio::test(start_paused = true)]
async fn failed_resources_load_again_on_the_next_include() {
    let harness = Harness::new();
    harness
        .fetcher
        .script("/app.js", [Reply::Status(500), Reply::Status(200)]);

    let first = harness
        .loader
        .include_one("/app.js", LoadOptions::default())
        .await;
    assert_eq!(first.err().map(|error| error.kind()), Some(ErrorKind::Network));
    assert_eq!(harness.count("script"), 0, "failed elements are removed");

    let second = harness
        .loader
        .include_one("/app.js", LoadOptions::default())
        .await;
    assert_eq!(second, Ok(Payload::None));
    assert_eq!(harness.fetcher.calls_to("/app.js"), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_elements_stay_when_asked() {
    let harness = Harness::new();
    harness.fetcher.script("/app.js", [Reply::Status(500)]);
    let options = LoadOptions {
        remove_failed_elements: false,
        ..LoadOptions::default()
    };
    let outcome = harness.loader.include_one("/app.js", options).await;
    assert_eq!(outcome.err().map(|error| error.kind()), Some(ErrorKind::Network));
    assert_eq!(harness.count("script"), 1);
}

#[tokio::test(start_paused = true)]
async fn kept_failed_elements_never_count_as_loaded() {
    let harness = Harness::new();
    harness.fetcher.script("/app.js", [Reply::Status(500)]);
    let options = LoadOptions {
        remove_failed_elements: false,
        ..retrying(1)
    };

    let first = harness.loader.include_one("/app.js", options.clone()).await;
    assert_eq!(first.err().map(|error| error.kind()), Some(ErrorKind::Network));
    assert_eq!(harness.count("script"), 1, "a retry replaces the failed element");

    let second = harness.loader.include_one("/app.js", options).await;
    assert_eq!(second.err().map(|error| error.kind()), Some(ErrorKind::Network));
    assert_eq!(harness.fetcher.calls_to("/app.js"), 4);
    assert_eq!(harness.loader.resource_state("/app.js"), ResourceState::Unloaded);
    assert_eq!(harness.count("script"), 1);
}

#[tokio::test(start_paused = true)]
async fn kept_failed_element_is_replaced_by_a_later_success() {
    let harness = Harness::new();
    harness
        .fetcher
        .script("/app.js", [Reply::Status(500), Reply::Status(200)]);
    let options = LoadOptions {
        remove_failed_elements: false,
        ..LoadOptions::default()
    };

    let first = harness.loader.include_one("/app.js", options.clone()).await;
    assert_eq!(first.err().map(|error| error.kind()), Some(ErrorKind::Network));

    let second = harness.loader.include_one("/app.js", options).await;
    assert_eq!(second, Ok(Payload::None));
    assert_eq!(harness.fetcher.calls_to("/app.js"), 2);
    assert_eq!(harness.count("script"), 1);
    assert_eq!(harness.loader.resource_state("/app.js"), ResourceState::Loaded);
}

#[tokio::test(start_paused = true)]
async fn timeout_removes_the_element() {
    let harness = Harness::new();
    harness.fetcher.script("/slow.js", [Reply::Hang]);
    let options = LoadOptions {
        timeout: Duration::from_millis(500),
        ..LoadOptions::default()
    };
    let started = Instant::now();

    let outcome = harness.loader.include_one("/slow.js", options).await;

    let error = outcome.err();
    assert_eq!(error.as_ref().map(LoadError::kind), Some(ErrorKind::Timeout));
    assert_eq!(
        error.as_ref().map(LoadError::message),
        Some("Timeout while loading: /slow.js")
    );
    assert!((500..510).contains(&started.elapsed().as_millis()));
    assert_eq!(harness.count("script"), 0);
    assert_eq!(harness.loader.resource_state("/slow.js"), ResourceState::Unloaded);
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_retried() {
    let harness = Harness::new();
    harness
        .fetcher
        .script("/photo.png", [Reply::Hang, Reply::Status(200)]);
    let options = LoadOptions {
        timeout: Duration::from_secs(1),
        ..retrying(1)
    };
    let started = Instant::now();

    let outcome = harness.loader.include_one("/photo.png", options).await;

    assert_eq!(outcome, Ok(Payload::None));
    assert_eq!(started.elapsed().as_secs(), 2);
    assert_eq!(harness.count("img"), 1, "only the successful element remains");
}

#[tokio::test]
async fn unsupported_kinds_fail_fast_without_retry() {
    let harness = Harness::new();
    let (options, errors) = recording(retrying(3));

    let outcome = harness.loader.include_one("/notes.xyz", options).await;

    let error = outcome.err();
    assert_eq!(error.as_ref().map(LoadError::kind), Some(ErrorKind::Unsupported));
    assert_eq!(
        error.as_ref().map(LoadError::message),
        Some("Unsupported file type: xyz for /notes.xyz")
    );
    assert!(harness.fetcher.calls().is_empty());
    assert_eq!(harness.loader.attempts("/notes.xyz"), 1);
    assert_eq!(errors.lock().unwrap_or_else(PoisonError::into_inner).len(), 1);
}

#[tokio::test]
async fn fetch_errors_are_network_failures() {
    let harness = Harness::new();
    harness
        .fetcher
        .script("/clip.mp4", [Reply::Error("connection reset")]);
    let outcome = harness
        .loader
        .include_one("/clip.mp4", LoadOptions::default())
        .await;
    assert_eq!(
        outcome.err().map(|error| error.message().to_owned()),
        Some(String::from(
            "Network error or resource not found: /clip.mp4 (connection reset)"
        ))
    );
}
