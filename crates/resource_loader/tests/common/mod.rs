#![allow(dead_code, reason = "each test binary uses a different subset of the helpers")]

use anyhow::{Error, anyhow};
use core::time::Duration;
use futures::FutureExt as _;
use futures::future::{BoxFuture, pending};
use resource_loader::{
    Document, FetchResponse, Fetcher, LoadOptions, MemoryDocument, ResourceLoader, StateChange,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast::Receiver;
use tokio::time::sleep;
use url::Url;

/// Document URL used by every harness.
pub const BASE: &str = "https://example.test/index.html";

/// Scripted answer to one fetch.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Respond immediately with a status and an empty body.
    Status(u16),
    /// Respond immediately with a status and body.
    Body(u16, &'static str),
    /// Fail the request itself.
    Error(&'static str),
    /// Never respond.
    Hang,
    /// Respond with a status after a delay.
    After(Duration, u16),
}

/// Fetcher answering from per-path reply queues and recording every request.
///
/// The last reply in a queue repeats. Unscripted paths answer `200`.
#[derive(Default)]
pub struct ScriptedFetcher {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Url>>,
}

impl ScriptedFetcher {
    /// Queue replies for requests whose path equals `path`.
    pub fn script(&self, path: &str, replies: impl IntoIterator<Item = Reply>) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_owned(), replies.into_iter().collect());
    }

    /// Every requested URL, in order.
    pub fn calls(&self) -> Vec<Url> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests for `path`.
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|url| url.path() == path)
            .count()
    }

    /// Requested paths, in order.
    pub fn paths(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|url| url.path().to_owned())
            .collect()
    }

    fn next_reply(&self, path: &str) -> Reply {
        let mut replies = self.replies.lock().unwrap_or_else(PoisonError::into_inner);
        match replies.get_mut(path) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Reply::Status(200)),
            Some(queue) => queue.front().cloned().unwrap_or(Reply::Status(200)),
            None => Reply::Status(200),
        }
    }
}

impl Fetcher for ScriptedFetcher {
    fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<FetchResponse, Error>> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.clone());
        let reply = self.next_reply(url.path());
        async move {
            match reply {
                Reply::Status(status) => Ok(FetchResponse::new(status, "")),
                Reply::Body(status, body) => Ok(FetchResponse::new(status, body)),
                Reply::Error(message) => Err(anyhow!("{message}")),
                Reply::Hang => pending().await,
                Reply::After(delay, status) => {
                    sleep(delay).await;
                    Ok(FetchResponse::new(status, ""))
                }
            }
        }
        .boxed()
    }
}

/// A loader wired to an in-memory document and a scripted fetcher.
pub struct Harness {
    pub loader: ResourceLoader,
    pub document: Arc<MemoryDocument>,
    pub fetcher: Arc<ScriptedFetcher>,
}

impl Harness {
    /// Document that is already interactively ready.
    pub fn new() -> Self {
        Self::build(true)
    }

    /// Document still loading; deferred scripts wait for `mark_ready`.
    pub fn loading() -> Self {
        Self::build(false)
    }

    fn build(ready: bool) -> Self {
        init_logging();
        let base = Url::parse(BASE).unwrap_or_else(|err| panic!("bad base URL: {err}"));
        let fetcher = Arc::new(ScriptedFetcher::default());
        let document = Arc::new(if ready {
            MemoryDocument::new(base, Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        } else {
            MemoryDocument::loading(base, Arc::clone(&fetcher) as Arc<dyn Fetcher>)
        });
        let loader = ResourceLoader::new(
            Arc::clone(&document) as Arc<dyn Document>,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        );
        Self {
            loader,
            document,
            fetcher,
        }
    }

    /// Attached elements with `tag`.
    pub fn count(&self, tag: &str) -> usize {
        self.document.elements_by_tag(tag).len()
    }
}

/// Default options with short timers, for tests that do not pause time.
pub fn quick_options() -> LoadOptions {
    LoadOptions {
        timeout: Duration::from_millis(500),
        retry_delay: Duration::from_millis(10),
        ..LoadOptions::default()
    }
}

/// Drain everything currently buffered in a state change receiver.
pub fn drain(changes: &mut Receiver<StateChange>) -> Vec<StateChange> {
    core::iter::from_fn(|| changes.try_recv().ok()).collect()
}

/// Let spawned operations run until they block.
pub async fn settle_tasks() {
    sleep(Duration::from_millis(1)).await;
}

/// Install the test logger once per binary.
pub fn init_logging() {
    drop(env_logger::builder().is_test(true).try_init());
}
