//! Cookie consent gate.
//!
//! ```text
//! NoDecision ──init──▶ BannerShown ──accept──▶ Accepted
//!     │                    └────────decline──▶ Declined
//!     ├──init (stored "accepted")──▶ Accepted
//!     └──init (stored "declined")──▶ Declined
//! ```
//!
//! `Accepted` and `Declined` are terminal. Analytics is activated on entry
//! to `Accepted` and never otherwise. The decision is the only thing
//! persisted; storage failures degrade to "no decision" on read and are
//! dropped on write.

use crate::analytics::AnalyticsActivator;
use crate::config::{AnalyticsConfig, ConsentConfig};
use crate::dom::{Document, ElementId};
use crate::runtime::{EventOutcome, Scheduler, TaskId, TaskKind};
use crate::storage::KeyValueStore;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

pub const BANNER_ID: &str = "cookie-consent-banner";

/// A visitor's recorded choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentDecision {
    Accepted,
    Declined,
}

impl ConsentDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsentDecision::Accepted => "accepted",
            ConsentDecision::Declined => "declined",
        }
    }

    /// Parse a stored value. Anything unrecognized is no decision.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "accepted" => Some(ConsentDecision::Accepted),
            "declined" => Some(ConsentDecision::Declined),
            _ => None,
        }
    }
}

impl fmt::Display for ConsentDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentState {
    NoDecision,
    BannerShown,
    Accepted,
    Declined,
}

impl ConsentState {
    pub fn is_decided(&self) -> bool {
        matches!(self, ConsentState::Accepted | ConsentState::Declined)
    }
}

#[derive(Debug, Clone, Copy)]
struct Banner {
    root: ElementId,
    accept: ElementId,
    decline: ElementId,
}

pub struct ConsentGate {
    config: ConsentConfig,
    analytics_config: AnalyticsConfig,
    store: Box<dyn KeyValueStore>,
    analytics: Box<dyn AnalyticsActivator>,
    state: ConsentState,
    banner: Option<Banner>,
    removal: Option<TaskId>,
    analytics_requested: bool,
}

impl fmt::Debug for ConsentGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsentGate")
            .field("state", &self.state)
            .field("banner", &self.banner)
            .field("analytics_requested", &self.analytics_requested)
            .finish_non_exhaustive()
    }
}

impl ConsentGate {
    pub fn new(
        config: ConsentConfig,
        analytics_config: AnalyticsConfig,
        store: Box<dyn KeyValueStore>,
        analytics: Box<dyn AnalyticsActivator>,
    ) -> Self {
        Self {
            config,
            analytics_config,
            store,
            analytics,
            state: ConsentState::NoDecision,
            banner: None,
            removal: None,
            analytics_requested: false,
        }
    }

    pub fn state(&self) -> ConsentState {
        self.state
    }

    pub fn banner(&self) -> Option<ElementId> {
        self.banner.map(|b| b.root)
    }

    pub fn analytics_active(&self) -> bool {
        self.analytics.is_active()
    }

    /// Read the stored decision and act on it. Runs once; later calls do
    /// nothing.
    pub fn init(&mut self, doc: &mut Document) {
        if self.state != ConsentState::NoDecision {
            return;
        }
        match self.read_decision() {
            Some(ConsentDecision::Accepted) => {
                self.state = ConsentState::Accepted;
                self.activate_analytics(doc);
            }
            Some(ConsentDecision::Declined) => {
                self.state = ConsentState::Declined;
            }
            None => {
                self.show_banner(doc);
                self.state = ConsentState::BannerShown;
            }
        }
        debug!(state = ?self.state, "consent initialized");
    }

    pub fn accept(&mut self, doc: &mut Document, scheduler: &mut Scheduler) {
        if self.decide(ConsentDecision::Accepted, doc, scheduler) {
            self.activate_analytics(doc);
        }
    }

    pub fn decline(&mut self, doc: &mut Document, scheduler: &mut Scheduler) {
        self.decide(ConsentDecision::Declined, doc, scheduler);
    }

    /// Route clicks on the banner buttons.
    pub fn handle_click(
        &mut self,
        doc: &mut Document,
        scheduler: &mut Scheduler,
        target: ElementId,
    ) -> EventOutcome {
        let Some(banner) = self.banner else {
            return EventOutcome::default();
        };
        if self.state != ConsentState::BannerShown {
            return EventOutcome::default();
        }
        if doc.contains(banner.accept, target) {
            self.accept(doc, scheduler);
            EventOutcome::handled()
        } else if doc.contains(banner.decline, target) {
            self.decline(doc, scheduler);
            EventOutcome::handled()
        } else {
            EventOutcome::default()
        }
    }

    /// Detach the faded-out banner. Runs when the removal timer fires.
    pub fn finish_removal(&mut self, doc: &mut Document) {
        self.removal = None;
        if let Some(banner) = self.banner {
            doc.detach(banner.root);
            debug!("consent banner removed");
        }
    }

    /// Returns whether the decision was taken (false if already decided).
    fn decide(&mut self, decision: ConsentDecision, doc: &mut Document, scheduler: &mut Scheduler) -> bool {
        if self.state.is_decided() {
            return false;
        }
        if let Err(e) = self.store.set(&self.config.storage_key, decision.as_str()) {
            debug!("consent not persisted: {e}");
        }
        self.state = match decision {
            ConsentDecision::Accepted => ConsentState::Accepted,
            ConsentDecision::Declined => ConsentState::Declined,
        };
        self.remove_banner(doc, scheduler);
        debug!(%decision, "consent decided");
        true
    }

    fn read_decision(&self) -> Option<ConsentDecision> {
        match self.store.get(&self.config.storage_key) {
            Ok(value) => value.as_deref().and_then(ConsentDecision::parse),
            Err(e) => {
                debug!("consent not readable: {e}");
                None
            }
        }
    }

    fn show_banner(&mut self, doc: &mut Document) {
        let root = doc.create_element("div");
        doc.set_id(root, BANNER_ID);
        doc.set_attribute(root, "role", "dialog");
        doc.set_attribute(root, "aria-label", "Cookie consent");

        let inner = doc.create_element("div");
        doc.add_class(inner, "cookie-consent-inner");
        doc.append_child(root, inner);

        let text = doc.create_element("p");
        doc.add_class(text, "cookie-consent-text");
        doc.set_text(text, &self.config.message);
        doc.append_child(inner, text);

        let buttons = doc.create_element("div");
        doc.add_class(buttons, "cookie-consent-buttons");
        doc.append_child(inner, buttons);

        let button = |doc: &mut Document, variant: &str, label: &str| {
            let b = doc.create_element("button");
            doc.set_attribute(b, "type", "button");
            doc.add_class(b, "cookie-btn");
            doc.add_class(b, variant);
            doc.set_text(b, label);
            doc.append_child(buttons, b);
            b
        };
        let accept = button(doc, "cookie-btn-accept", &self.config.accept_label);
        let decline = button(doc, "cookie-btn-decline", &self.config.decline_label);

        let body = doc.body();
        doc.append_child(body, root);
        doc.add_class(root, "cookie-consent-visible");
        self.banner = Some(Banner {
            root,
            accept,
            decline,
        });
    }

    fn remove_banner(&mut self, doc: &mut Document, scheduler: &mut Scheduler) {
        let Some(banner) = self.banner else {
            return;
        };
        if !doc.is_connected(banner.root) || self.removal.is_some() {
            return;
        }
        doc.set_style(banner.root, "opacity", "0");
        doc.set_style(banner.root, "transform", "translateY(100%)");
        self.removal = Some(scheduler.schedule_once(
            Duration::from_millis(self.config.fade_out_ms),
            TaskKind::RemoveConsentBanner,
        ));
    }

    fn activate_analytics(&mut self, doc: &mut Document) {
        if self.analytics_requested {
            return;
        }
        self.analytics_requested = true;
        if let Err(e) = self.analytics.activate(doc, &self.analytics_config) {
            warn!("analytics not activated: {e}");
        }
    }

    /// Cancel a pending banner removal.
    pub fn teardown(&mut self, scheduler: &mut Scheduler) {
        if let Some(id) = self.removal.take() {
            scheduler.cancel(id);
        }
    }
}
