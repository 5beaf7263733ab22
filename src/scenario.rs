//! Scripted page sessions.
//!
//! A scenario describes the host (viewport, capabilities), what the visitor
//! had stored before, and a list of steps to replay against a page:
//!
//! ```toml
//! consent = "accepted"   # pre-seeded decision, omit for a first visit
//! seed = 7               # slideshow jitter
//!
//! [viewport]
//! width = 400
//! height = 1000
//!
//! [[steps]]
//! action = "click"
//! selector = ".product-btn"
//! index = 1
//!
//! [[steps]]
//! action = "advance"
//! ms = 4000
//! ```
//!
//! Steps that need a bootstrapped page are skipped while the document is
//! still loading; a `content_loaded` step finishes loading.

use crate::config::SiteConfig;
use crate::dom::{PageSpec, SelectorError};
use crate::page::{HostCapabilities, HostEnvironment, Page, PageLifecycle, Services, nth_match};
use crate::runtime::{Event, EventOutcome};
use crate::storage::{FileStore, KeyValueStore, MemoryStore};
use crate::visibility::Viewport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid selector: {0}")]
    Selector(#[from] SelectorError),
    #[error("no element #{index} matches '{selector}'")]
    NoMatch { selector: String, index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ViewportSpec {
    pub width: f64,
    pub height: f64,
}

impl Default for ViewportSpec {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Click the `index`-th element matching `selector`.
    Click {
        selector: String,
        #[serde(default)]
        index: usize,
    },
    Key { key: String },
    Advance { ms: u64 },
    Scroll { y: f64 },
    Resize { width: f64, height: f64 },
    ContentLoaded,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Click { selector, index } => write!(f, "click {selector} [{index}]"),
            Step::Key { key } => write!(f, "key {key}"),
            Step::Advance { ms } => write!(f, "advance {ms}ms"),
            Step::Scroll { y } => write!(f, "scroll to {y}"),
            Step::Resize { width, height } => write!(f, "resize {width}x{height}"),
            Step::ContentLoaded => write!(f, "content loaded"),
        }
    }
}

/// What a step did.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    Dispatched(EventOutcome),
    Advanced { tasks: usize },
    Bootstrapped,
    Skipped(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub step: Step,
    pub result: StepResult,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    /// Replaces the page URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Stored consent value before the visit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub viewport: ViewportSpec,
    pub intersection_observer: Option<bool>,
    pub steps: Vec<Step>,
}

/// A finished run.
pub struct ScenarioRun {
    pub lifecycle: PageLifecycle,
    pub records: Vec<StepRecord>,
}

impl Scenario {
    pub fn parse(content: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn host(&self) -> HostEnvironment {
        HostEnvironment {
            viewport: Viewport::new(self.viewport.width, self.viewport.height),
            capabilities: HostCapabilities {
                intersection_observer: self.intersection_observer.unwrap_or(true),
            },
        }
    }

    /// Production collaborators over an in-memory store seeded with the
    /// scenario's consent value.
    pub fn services(&self, config: &SiteConfig) -> Services {
        let store = match &self.consent {
            Some(value) => MemoryStore::with_entry(&config.consent.storage_key, value),
            None => MemoryStore::new(),
        };
        self.seeded(Services::new(Box::new(store)))
    }

    /// Production collaborators over a [`FileStore`] in `dir`, so the
    /// consent decision survives between runs. A scenario consent value
    /// overwrites the stored one.
    pub fn services_in(&self, dir: &Path, spec: &PageSpec, config: &SiteConfig) -> Services {
        let url = self.url.as_deref().unwrap_or(&spec.url);
        let mut store = FileStore::new(dir, url);
        if let Some(value) = &self.consent {
            if let Err(err) = store.set(&config.consent.storage_key, value) {
                warn!(%err, path = %dir.display(), "could not seed stored consent");
            }
        }
        self.seeded(Services::new(Box::new(store)))
    }

    fn seeded(&self, services: Services) -> Services {
        match self.seed {
            Some(seed) => services.with_seed(seed),
            None => services,
        }
    }

    /// Start the page with the given collaborators and replay every step.
    pub fn run_with(
        &self,
        spec: &PageSpec,
        config: SiteConfig,
        services: Services,
    ) -> Result<ScenarioRun, ScenarioError> {
        let doc = match &self.url {
            Some(url) => PageSpec {
                url: url.clone(),
                ..spec.clone()
            }
            .to_document(),
            None => spec.to_document(),
        };
        let mut lifecycle = PageLifecycle::start(doc, config, services, self.host());
        let mut records = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let (next, result) = apply(lifecycle, step)?;
            lifecycle = next;
            debug!(%step, ?result, "scenario step");
            records.push(StepRecord {
                step: step.clone(),
                result,
            });
        }
        Ok(ScenarioRun { lifecycle, records })
    }

    /// [`run_with`](Self::run_with) using [`services`](Self::services).
    pub fn run(&self, spec: &PageSpec, config: SiteConfig) -> Result<ScenarioRun, ScenarioError> {
        let services = self.services(&config);
        self.run_with(spec, config, services)
    }
}

fn apply(mut lifecycle: PageLifecycle, step: &Step) -> Result<(PageLifecycle, StepResult), ScenarioError> {
    let result = match step {
        Step::ContentLoaded if lifecycle.is_ready() => StepResult::Skipped("page already loaded"),
        Step::ContentLoaded => {
            lifecycle = lifecycle.content_loaded();
            StepResult::Bootstrapped
        }
        _ => {
            let Some(page) = lifecycle.page_mut() else {
                return Ok((lifecycle, StepResult::Skipped("document still loading")));
            };
            dispatch_step(page, step)?
        }
    };
    Ok((lifecycle, result))
}

fn dispatch_step(page: &mut Page, step: &Step) -> Result<StepResult, ScenarioError> {
    Ok(match step {
        Step::Click { selector, index } => {
            let target = nth_match(page, selector, *index)?.ok_or_else(|| ScenarioError::NoMatch {
                selector: selector.clone(),
                index: *index,
            })?;
            StepResult::Dispatched(page.dispatch(Event::Click { target }))
        }
        Step::Key { key } => StepResult::Dispatched(page.key_down(key)),
        Step::Scroll { y } => StepResult::Dispatched(page.scroll_to(*y)),
        Step::Resize { width, height } => StepResult::Dispatched(page.resize(*width, *height)),
        Step::Advance { ms } => StepResult::Advanced {
            tasks: page.advance(Duration::from_millis(*ms)),
        },
        Step::ContentLoaded => StepResult::Skipped("page already loaded"),
    })
}
