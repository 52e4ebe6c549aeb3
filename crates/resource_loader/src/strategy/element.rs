//! DOM-backed strategies: scripts, stylesheets and images.
//!
//! The element is injected, then the strategy waits for its `load` or `error`
//! event. An abandoned attempt removes its element when the future drops.

use super::{LoadContext, LoadStrategy, Outcome, Payload};
use crate::dom::{CrossOrigin, Document, InsertionPoint, NodeKey};
use crate::error::LoadError;
use crate::kind::ResourceKind;
use crate::logging::{verbose, warning};
use crate::plan::LoadPlan;
use futures::FutureExt as _;
use futures::future::BoxFuture;
use std::sync::Arc;

/// Scripts, stylesheets and images: inject an element and wait for its
/// `load` or `error` event.
pub struct ElementStrategy {
    kind: ResourceKind,
}

impl ElementStrategy {
    #[must_use]
    pub const fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }
}

/// Removes the injected element when the attempt is abandoned (timeout,
/// cancellation) or fails with `remove_failed_elements` set.
struct ElementGuard {
    document: Arc<dyn Document>,
    element: NodeKey,
    armed: bool,
}

impl ElementGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ElementGuard {
    fn drop(&mut self) {
        if self.armed {
            self.document.remove(self.element);
        }
    }
}

impl LoadStrategy for ElementStrategy {
    fn load(&self, plan: &LoadPlan, context: &LoadContext) -> BoxFuture<'static, Outcome> {
        let (Some(tag), Some(url_attribute)) = (self.kind.tag_name(), self.kind.url_attribute())
        else {
            let error = LoadError::unsupported(&plan.extension, &plan.final_url);
            return async move { Err(error) }.boxed();
        };
        let document = Arc::clone(&context.document);
        let options = &context.options;

        let element = document.create_element(tag);
        document.set_attribute(element, url_attribute, &plan.final_url);
        match self.kind {
            ResourceKind::Script => document.set_attribute(element, "async", ""),
            ResourceKind::Stylesheet => document.set_attribute(element, "rel", "stylesheet"),
            _ => {}
        }
        if let Some(cross_origin) = options.cross_origin {
            document.set_attribute(element, "crossorigin", cross_origin.as_str());
        }
        apply_attributes(&*document, element, tag, self.kind, plan);

        let parent = if self.kind == ResourceKind::Script {
            options.insertion_point
        } else {
            InsertionPoint::Head
        };
        document.append(element, parent);
        context.cancel.track(element);

        let loaded = document.element_loaded(element);
        let mut guard = ElementGuard {
            document,
            element,
            armed: true,
        };
        let remove_failed = options.remove_failed_elements;
        let url = plan.final_url.clone();
        async move {
            match loaded.await {
                Ok(()) => {
                    guard.disarm();
                    verbose!("Resource loaded from: {url}");
                    Ok(Payload::None)
                }
                Err(detail) => {
                    warning!("Failed to load resource from: {url}");
                    if remove_failed {
                        verbose!("Removed failed element: {url}");
                    } else {
                        guard.disarm();
                    }
                    Err(LoadError::network(&url, &detail))
                }
            }
        }
        .boxed()
    }
}

/// Copy caller attributes onto the element, dropping names the element does
/// not recognize, then check the security attributes of scripts and
/// stylesheets.
fn apply_attributes(
    document: &dyn Document,
    element: NodeKey,
    tag: &str,
    kind: ResourceKind,
    plan: &LoadPlan,
) {
    for (name, value) in &plan.attributes {
        if kind.requires_security_attributes() && name.eq_ignore_ascii_case("crossorigin") {
            continue;
        }
        if document.recognizes_attribute(tag, name) {
            document.set_attribute(element, name, value);
        } else {
            warning!("Invalid attribute \"{name}\" for element type \"{tag}\". Skipping.");
        }
    }
    if !kind.requires_security_attributes() {
        return;
    }

    let attribute = |wanted: &str| {
        plan.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
            .map(|(_, value)| value.as_str())
    };
    if let Some(value) = attribute("crossorigin") {
        let cross_origin = CrossOrigin::parse(value).unwrap_or_else(|| {
            warning!(
                "Invalid \"crossorigin\" attribute for {kind} resource: {value}. Using default \"anonymous\"."
            );
            CrossOrigin::Anonymous
        });
        document.set_attribute(element, "crossorigin", cross_origin.as_str());
    }
    if attribute("integrity").is_none() {
        warning!(
            "\"integrity\" attribute missing for {kind} resource {}. This is required for secure resource loading.",
            plan.final_url
        );
    }
}
