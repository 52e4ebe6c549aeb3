//! Fetch-backed strategies: JSON documents and binary blobs.

use super::{LoadContext, LoadStrategy, Outcome, Payload};
use crate::error::LoadError;
use crate::logging::verbose;
use crate::plan::LoadPlan;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use serde_json::{Value, from_slice};

/// Fetch, require a 2xx status, parse the body as JSON.
pub struct JsonStrategy;

/// Fetch and hand back the raw body. The status is not inspected.
pub struct BlobStrategy;

impl LoadStrategy for JsonStrategy {
    fn load(&self, plan: &LoadPlan, context: &LoadContext) -> BoxFuture<'static, Outcome> {
        let url = plan.final_url.clone();
        let target = match plan.resolve(context.document.base_url()) {
            Ok(target) => target,
            Err(error) => return async move { Err(error) }.boxed(),
        };
        let fetch = context.fetcher.fetch(&target);
        async move {
            let response = fetch
                .await
                .map_err(|err| LoadError::network(&url, &format!("{err:#}")))?;
            if !response.is_success() {
                return Err(LoadError::network(
                    &url,
                    &format!("HTTP error! status: {}", response.status),
                ));
            }
            let value: Value = from_slice(&response.body)
                .map_err(|err| LoadError::network(&url, &format!("invalid JSON: {err}")))?;
            verbose!("JSON document loaded from: {url}");
            Ok(Payload::Json(value))
        }
        .boxed()
    }
}

impl LoadStrategy for BlobStrategy {
    fn load(&self, plan: &LoadPlan, context: &LoadContext) -> BoxFuture<'static, Outcome> {
        let url = plan.final_url.clone();
        let target = match plan.resolve(context.document.base_url()) {
            Ok(target) => target,
            Err(error) => return async move { Err(error) }.boxed(),
        };
        let fetch = context.fetcher.fetch(&target);
        async move {
            let response = fetch
                .await
                .map_err(|err| LoadError::network(&url, &format!("{err:#}")))?;
            verbose!(
                "Blob loaded from: {url} (status {}, {} bytes)",
                response.status,
                response.body.len()
            );
            Ok(Payload::Blob(response.body))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::dom::{Document, MemoryDocument};
    use crate::error::ErrorKind;
    use crate::net::{FetchResponse, Fetcher};
    use crate::options::LoadOptions;
    use crate::plan::normalize;
    use anyhow::{Error, anyhow};
    use bytes::Bytes;
    use serde_json::json;
    use std::sync::{Arc, Mutex, PoisonError};
    use url::Url;

    /// Replies with a fixed response and records requested URLs.
    struct Fixed {
        reply: Option<FetchResponse>,
        seen: Mutex<Vec<String>>,
    }

    impl Fetcher for Fixed {
        fn fetch(&self, url: &Url) -> BoxFuture<'static, Result<FetchResponse, Error>> {
            self.seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(url.to_string());
            let reply = self.reply.clone();
            async move { reply.ok_or_else(|| anyhow!("connection refused")) }.boxed()
        }
    }

    fn context(reply: Option<FetchResponse>) -> Result<(LoadContext, Arc<Fixed>), url::ParseError> {
        let fetcher = Arc::new(Fixed {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        let document: Arc<dyn Document> = Arc::new(MemoryDocument::new(
            Url::parse("https://example.test/app/")?,
            Arc::clone(&fetcher) as Arc<dyn Fetcher>,
        ));
        let context = LoadContext {
            cancel: CancelHandle::new(Arc::clone(&document)),
            document,
            fetcher: Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            options: Arc::new(LoadOptions::default()),
        };
        Ok((context, fetcher))
    }

    fn plan(url: &str) -> Result<LoadPlan, url::ParseError> {
        Ok(normalize(
            &url.into(),
            &LoadOptions::default(),
            &Url::parse("https://example.test/app/")?,
            0,
        ))
    }

    #[tokio::test]
    async fn json_resolves_with_parsed_value() -> Result<(), url::ParseError> {
        let (context, fetcher) = context(Some(FetchResponse::new(200, r#"{"msg":"hi","n":42}"#)))?;
        let outcome = JsonStrategy.load(&plan("data/sample.json")?, &context).await;
        assert_eq!(outcome, Ok(Payload::Json(json!({"msg": "hi", "n": 42}))));
        let seen = fetcher.seen.lock().unwrap_or_else(PoisonError::into_inner).clone();
        assert_eq!(seen, vec![String::from("https://example.test/app/data/sample.json")]);
        Ok(())
    }

    #[tokio::test]
    async fn json_rejects_error_statuses_and_bad_bodies() -> Result<(), url::ParseError> {
        let (not_found, _) = context(Some(FetchResponse::new(404, "{}")))?;
        let error = JsonStrategy.load(&plan("d.json")?, &not_found).await.err();
        assert_eq!(
            error.map(|err| err.message().to_owned()),
            Some(String::from(
                "Network error or resource not found: d.json (HTTP error! status: 404)"
            ))
        );

        let (garbage, _) = context(Some(FetchResponse::new(200, "not json")))?;
        let parse_error = JsonStrategy.load(&plan("d.json")?, &garbage).await.err();
        assert_eq!(parse_error.map(|err| err.kind()), Some(ErrorKind::Network));
        Ok(())
    }

    #[tokio::test]
    async fn blob_ignores_status() -> Result<(), url::ParseError> {
        let (context, _) = context(Some(FetchResponse::new(500, "oops")))?;
        let outcome = BlobStrategy.load(&plan("clip.bin")?, &context).await;
        assert_eq!(outcome, Ok(Payload::Blob(Bytes::from_static(b"oops"))));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_failures_are_network_errors() -> Result<(), url::ParseError> {
        let (context, _) = context(None)?;
        let outcome = BlobStrategy.load(&plan("clip.zip")?, &context).await;
        assert_eq!(outcome.err().map(|err| err.kind()), Some(ErrorKind::Network));
        Ok(())
    }
}
