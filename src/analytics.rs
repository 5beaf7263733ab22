//! Analytics activation behind consent.
//!
//! The consent gate only knows one call: [`AnalyticsActivator::activate`].
//! Implementations must make it idempotent; the gate additionally guards it
//! so the library is loaded at most once per page.
//!
//! [`PostHogActivator`] reproduces the PostHog snippet headlessly: a single
//! async `<script>` pointing at the assets host, with the init options
//! recorded as JSON in a `data-posthog-config` attribute.

use crate::config::AnalyticsConfig;
use crate::dom::{Document, Selector};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

const LOADER_ATTRIBUTE: &str = "data-posthog-config";

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("analytics project key is not configured")]
    MissingProjectKey,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Loads and initializes a third-party analytics library.
pub trait AnalyticsActivator {
    fn activate(&mut self, doc: &mut Document, config: &AnalyticsConfig) -> Result<(), AnalyticsError>;

    /// Whether a previous `activate` succeeded.
    fn is_active(&self) -> bool;
}

/// Init options passed to `posthog.init`.
#[derive(Debug, Serialize)]
struct InitOptions<'a> {
    api_key: &'a str,
    api_host: &'a str,
    defaults: &'a str,
}

/// Injects the PostHog loader script into the document head.
#[derive(Debug, Default)]
pub struct PostHogActivator {
    active: bool,
}

impl PostHogActivator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalyticsActivator for PostHogActivator {
    fn activate(&mut self, doc: &mut Document, config: &AnalyticsConfig) -> Result<(), AnalyticsError> {
        if self.active {
            return Ok(());
        }
        if config.project_key.trim().is_empty() {
            return Err(AnalyticsError::MissingProjectKey);
        }
        let already_loaded = Selector::parse(&format!("script[{LOADER_ATTRIBUTE}]"))
            .ok()
            .and_then(|s| doc.query(doc.head(), &s))
            .is_some();
        if !already_loaded {
            let options = serde_json::to_string(&InitOptions {
                api_key: &config.project_key,
                api_host: &config.api_host,
                defaults: &config.defaults,
            })?;
            let script = doc.create_element("script");
            doc.set_attribute(script, "type", "text/javascript");
            doc.set_attribute(script, "async", "");
            doc.set_attribute(script, "src", &loader_url(&config.api_host));
            doc.set_attribute(script, LOADER_ATTRIBUTE, &options);
            let head = doc.head();
            doc.append_child(head, script);
            debug!(host = %config.api_host, "analytics loader injected");
        }
        self.active = true;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// The loader script lives on the assets subdomain of the ingest host.
pub fn loader_url(api_host: &str) -> String {
    format!(
        "{}/static/array.js",
        api_host
            .trim_end_matches('/')
            .replace(".i.posthog.com", "-assets.i.posthog.com")
    )
}
