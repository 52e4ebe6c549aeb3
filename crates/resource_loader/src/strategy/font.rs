//! Font faces.

use super::{LoadContext, LoadStrategy, Outcome, Payload};
use crate::error::LoadError;
use crate::logging::verbose;
use crate::plan::LoadPlan;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Load a font face through the document and add it to the font registry.
pub struct FontStrategy;

impl LoadStrategy for FontStrategy {
    fn load(&self, plan: &LoadPlan, context: &LoadContext) -> BoxFuture<'static, Outcome> {
        let url = plan.final_url.clone();
        let target = match plan.resolve(context.document.base_url()) {
            Ok(target) => target,
            Err(error) => return async move { Err(error) }.boxed(),
        };
        let document = Arc::clone(&context.document);
        let face = document.load_font(&target, context.options.cross_origin);
        async move {
            face.await.map_err(|detail| LoadError::network(&url, &detail))?;
            document.register_font(&target);
            verbose!("Font loaded from: {url}");
            Ok(Payload::None)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use crate::dom::{Document, MemoryDocument};
    use crate::net::{FetchResponse, Fetcher};
    use crate::options::LoadOptions;
    use crate::plan::normalize;
    use anyhow::Error;
    use url::Url;

    struct Status(u16);

    impl Fetcher for Status {
        fn fetch(&self, _url: &Url) -> BoxFuture<'static, Result<FetchResponse, Error>> {
            let status = self.0;
            async move { Ok(FetchResponse::new(status, "")) }.boxed()
        }
    }

    async fn load_font(status: u16) -> Result<(Outcome, Vec<Url>), url::ParseError> {
        let base = Url::parse("https://example.test/")?;
        let document = Arc::new(MemoryDocument::new(base.clone(), Arc::new(Status(status))));
        let context = LoadContext {
            document: Arc::clone(&document) as Arc<dyn Document>,
            fetcher: Arc::new(Status(status)),
            options: Arc::new(LoadOptions::default()),
            cancel: CancelHandle::new(Arc::clone(&document) as Arc<dyn Document>),
        };
        let plan = normalize(&"/fonts/inter.woff2".into(), &LoadOptions::default(), &base, 0);
        let outcome = FontStrategy.load(&plan, &context).await;
        Ok((outcome, document.fonts()))
    }

    #[tokio::test]
    async fn registers_loaded_fonts() -> Result<(), url::ParseError> {
        let (outcome, fonts) = load_font(200).await?;
        assert_eq!(outcome, Ok(Payload::None));
        assert_eq!(fonts, vec![Url::parse("https://example.test/fonts/inter.woff2")?]);
        Ok(())
    }

    #[tokio::test]
    async fn failed_fonts_are_not_registered() -> Result<(), url::ParseError> {
        let (outcome, fonts) = load_font(404).await?;
        assert_eq!(
            outcome.err().map(|err| err.message().to_owned()),
            Some(String::from(
                "Network error or resource not found: /fonts/inter.woff2 (HTTP error! status: 404)"
            ))
        );
        assert!(fonts.is_empty());
        Ok(())
    }
}
