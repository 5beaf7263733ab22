//! Page lifecycle: bootstrap, event dispatch and teardown.
//!
//! A [`PageLifecycle`] starts in `Loading` when the document is still being
//! parsed and bootstraps on `content_loaded`, or bootstraps immediately
//! otherwise. Bootstrapping discovers each widget group on its own, in a
//! fixed order:
//!
//! | Order | Widget     | Selector                    |
//! |-------|------------|-----------------------------|
//! | 1     | reveal     | `.product-content`          |
//! | 2     | modals     | `.modal`                    |
//! | 3     | carousels  | `.portfolio-item`           |
//! | 4     | slideshows | `.project-image.slideshow`  |
//! | 5     | spotlight  | `.project`                  |
//! | 6     | QR share   | `nav`                       |
//! | 7     | consent    | `#cookie-consent-banner`    |
//!
//! A group that is missing, or whose host capability is absent, is recorded
//! with zero instances and never stops the groups after it. The resulting
//! [`Page`] owns every widget and hands events to them in the same order.

use crate::analytics::{AnalyticsActivator, PostHogActivator};
use crate::carousel::CarouselController;
use crate::config::SiteConfig;
use crate::consent::{BANNER_ID, ConsentGate};
use crate::dom::{Document, ElementId, ReadyState, Selector, SelectorError};
use crate::modal::ModalController;
use crate::qr::{QrRenderer, QrShare, SvgQrRenderer};
use crate::runtime::{Event, EventOutcome, Scheduler, TaskKind};
use crate::slideshow::{SlideshowPolicy, SlideshowScheduler};
use crate::storage::{KeyValueStore, MemoryStore};
use crate::visibility::{ObserveOptions, RootMargin, TriggerMode, Viewport, VisibilityTrigger};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Optional browser features the page may rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostCapabilities {
    pub intersection_observer: bool,
}

impl Default for HostCapabilities {
    fn default() -> Self {
        Self {
            intersection_observer: true,
        }
    }
}

/// What the host looks like when the page starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HostEnvironment {
    pub viewport: Viewport,
    pub capabilities: HostCapabilities,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            viewport: Viewport::new(1280.0, 800.0),
            capabilities: HostCapabilities::default(),
        }
    }
}

/// External collaborators handed to the widgets at bootstrap.
pub struct Services {
    pub store: Box<dyn KeyValueStore>,
    pub analytics: Box<dyn AnalyticsActivator>,
    pub qr: Box<dyn QrRenderer>,
    pub rng: StdRng,
}

impl Services {
    /// Production collaborators over the given store.
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self {
            store,
            analytics: Box::new(PostHogActivator::new()),
            qr: Box::new(SvgQrRenderer),
            rng: StdRng::from_os_rng(),
        }
    }

    /// Reproducible slideshow timing.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl Default for Services {
    fn default() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    Reveal,
    Modal,
    Carousel,
    Slideshow,
    Spotlight,
    QrShare,
    Consent,
}

impl WidgetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::Reveal => "reveal",
            WidgetKind::Modal => "modal",
            WidgetKind::Carousel => "carousel",
            WidgetKind::Slideshow => "slideshow",
            WidgetKind::Spotlight => "spotlight",
            WidgetKind::QrShare => "qr-share",
            WidgetKind::Consent => "consent",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered widget group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetRegistryEntry {
    pub selector: String,
    pub kind: WidgetKind,
    pub instances: usize,
}

/// A bootstrapped page and every widget on it.
pub struct Page {
    doc: Document,
    config: SiteConfig,
    scheduler: Scheduler,
    viewport: Viewport,
    registry: Vec<WidgetRegistryEntry>,
    reveal: Option<VisibilityTrigger>,
    modals: Option<ModalController>,
    carousels: Option<CarouselController>,
    slideshows: Option<SlideshowScheduler>,
    spotlight: Option<VisibilityTrigger>,
    qr_share: Option<QrShare>,
    consent: Option<ConsentGate>,
    torn_down: bool,
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("url", &self.doc.url())
            .field("registry", &self.registry)
            .field("now", &self.scheduler.now())
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn registry(&self) -> &[WidgetRegistryEntry] {
        &self.registry
    }

    pub fn entry(&self, kind: WidgetKind) -> Option<&WidgetRegistryEntry> {
        self.registry.iter().find(|e| e.kind == kind)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Virtual time since bootstrap.
    pub fn now(&self) -> Duration {
        self.scheduler.now()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn reveal(&self) -> Option<&VisibilityTrigger> {
        self.reveal.as_ref()
    }

    pub fn modals(&self) -> Option<&ModalController> {
        self.modals.as_ref()
    }

    pub fn carousels(&self) -> Option<&CarouselController> {
        self.carousels.as_ref()
    }

    pub fn slideshows(&self) -> Option<&SlideshowScheduler> {
        self.slideshows.as_ref()
    }

    pub fn spotlight(&self) -> Option<&VisibilityTrigger> {
        self.spotlight.as_ref()
    }

    pub fn qr_share(&self) -> Option<&QrShare> {
        self.qr_share.as_ref()
    }

    pub fn consent(&self) -> Option<&ConsentGate> {
        self.consent.as_ref()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    /// Elements matching `selector`, in document order.
    pub fn select_all(&self, selector: &str) -> Result<Vec<ElementId>, SelectorError> {
        self.doc.select_all(selector)
    }

    /// Hand an event to every widget, in registration order.
    pub fn dispatch(&mut self, event: Event) -> EventOutcome {
        if self.torn_down {
            return EventOutcome::default();
        }
        let mut outcome = EventOutcome::default();
        match event {
            Event::Click { target } => {
                if let Some(modals) = &mut self.modals {
                    outcome.merge(modals.handle_click(&mut self.doc, target));
                }
                if let Some(carousels) = &mut self.carousels {
                    outcome.merge(carousels.handle_click(&mut self.doc, target));
                }
                if let Some(qr) = &mut self.qr_share {
                    outcome.merge(qr.handle_click(&mut self.doc, target));
                }
                if let Some(consent) = &mut self.consent {
                    outcome.merge(consent.handle_click(&mut self.doc, &mut self.scheduler, target));
                }
            }
            Event::KeyDown { key } => {
                if let Some(modals) = &mut self.modals {
                    outcome.merge(modals.handle_key(&mut self.doc, &key));
                }
            }
            Event::Scroll { y } => {
                self.viewport.scroll_y = y;
                outcome.merge(self.evaluate_visibility());
            }
            Event::Resize { width, height } => {
                self.viewport.width = width;
                self.viewport.height = height;
                outcome.merge(self.evaluate_visibility());
            }
        }
        outcome
    }

    pub fn click(&mut self, target: ElementId) -> EventOutcome {
        self.dispatch(Event::Click { target })
    }

    pub fn key_down(&mut self, key: &str) -> EventOutcome {
        self.dispatch(Event::KeyDown {
            key: key.to_string(),
        })
    }

    pub fn scroll_to(&mut self, y: f64) -> EventOutcome {
        self.dispatch(Event::Scroll { y })
    }

    pub fn resize(&mut self, width: f64, height: f64) -> EventOutcome {
        self.dispatch(Event::Resize { width, height })
    }

    /// Move the virtual clock forward, running every task that comes due.
    /// Returns the number of tasks run.
    pub fn advance(&mut self, duration: Duration) -> usize {
        let until = self.scheduler.now() + duration;
        let mut ran = 0;
        while let Some((_, kind)) = self.scheduler.pop_due(until) {
            self.run_task(kind);
            ran += 1;
        }
        self.scheduler.settle(until);
        ran
    }

    fn run_task(&mut self, kind: TaskKind) {
        match kind {
            TaskKind::RemoveConsentBanner => {
                if let Some(consent) = &mut self.consent {
                    consent.finish_removal(&mut self.doc);
                }
            }
            TaskKind::AdvanceAllSlideshows | TaskKind::AdvanceSlideshow(_) => {
                if let Some(slideshows) = &mut self.slideshows {
                    slideshows.handle_task(&mut self.doc, kind);
                }
            }
        }
    }

    fn evaluate_visibility(&mut self) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        for trigger in [&mut self.reveal, &mut self.spotlight].into_iter().flatten() {
            let delivered = trigger.evaluate(&mut self.doc, &self.viewport);
            if !delivered.is_empty() {
                outcome.merge(EventOutcome::handled());
            }
        }
        outcome
    }

    /// Stop every timer and observer. Later events are ignored.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        if let Some(slideshows) = &mut self.slideshows {
            slideshows.stop(&mut self.scheduler);
        }
        if let Some(consent) = &mut self.consent {
            consent.teardown(&mut self.scheduler);
        }
        for trigger in [&mut self.reveal, &mut self.spotlight].into_iter().flatten() {
            trigger.disconnect();
        }
        let cancelled = self.scheduler.cancel_all();
        self.torn_down = true;
        debug!(cancelled, "page torn down");
    }
}

/// Wires a parsed document to its widgets.
pub struct Bootstrapper;

impl Bootstrapper {
    pub fn bootstrap(
        mut doc: Document,
        config: SiteConfig,
        services: Services,
        host: HostEnvironment,
    ) -> Page {
        let Services {
            store,
            analytics,
            qr,
            mut rng,
        } = services;
        let mut scheduler = Scheduler::new();
        let mut registry = Vec::new();
        let capable = host.capabilities.intersection_observer;

        let reveal = Self::group(&mut registry, WidgetKind::Reveal, ".product-content", || {
            if !capable {
                return Ok(None);
            }
            let elements = doc.select_all(".product-content")?;
            if elements.is_empty() {
                return Ok(None);
            }
            let mut trigger = VisibilityTrigger::new(ObserveOptions {
                threshold: config.reveal.threshold,
                root_margin: RootMargin::parse(&config.reveal.root_margin).unwrap_or_default(),
                mode: TriggerMode::Reveal {
                    offset_px: config.reveal.offset_px,
                    duration_ms: config.reveal.duration_ms,
                },
            });
            trigger.observe(&mut doc, &elements);
            Ok(Some((trigger, elements.len())))
        });

        let modals = Self::group(&mut registry, WidgetKind::Modal, ".modal", || {
            let mut modals = ModalController::discover(&doc)?;
            // Triggers may still name modals outside `.modal`.
            if modals.modals().is_empty() && doc.select_all(".product-btn")?.is_empty() {
                return Ok(None);
            }
            modals.register_trigger(".product-btn", "data-product")?;
            modals.register_close(".modal-close")?;
            modals.register_overlay_close(".modal-overlay")?;
            if config.modal.close_on_escape {
                modals.register_escape_close_all();
            }
            let count = modals.modals().len();
            Ok(Some((modals, count)))
        });

        let carousels = Self::group(&mut registry, WidgetKind::Carousel, ".portfolio-item", || {
            let carousels = CarouselController::discover(&mut doc)?;
            let count = carousels.carousels().len();
            Ok((count > 0).then_some((carousels, count)))
        });

        let slideshows = Self::group(
            &mut registry,
            WidgetKind::Slideshow,
            ".project-image.slideshow",
            || {
                let policy = SlideshowPolicy::from_config(&config.slideshow);
                let mut slideshows = SlideshowScheduler::bind(&mut doc, policy)?;
                let count = slideshows.slideshows().len();
                if count == 0 {
                    return Ok(None);
                }
                slideshows.start(&mut scheduler, &mut rng);
                Ok(Some((slideshows, count)))
            },
        );

        let spotlight = Self::group(&mut registry, WidgetKind::Spotlight, ".project", || {
            let narrow = host.viewport.width <= f64::from(config.spotlight.max_viewport_width);
            if !capable || !narrow {
                return Ok(None);
            }
            let elements = doc.select_all(".project")?;
            if elements.is_empty() {
                return Ok(None);
            }
            let mut trigger = VisibilityTrigger::new(ObserveOptions {
                threshold: 0.0,
                root_margin: RootMargin::parse(&config.spotlight.root_margin).unwrap_or_default(),
                mode: TriggerMode::Toggle {
                    class: config.spotlight.class.clone(),
                },
            });
            trigger.observe(&mut doc, &elements);
            Ok(Some((trigger, elements.len())))
        });

        let qr_share = Self::group(&mut registry, WidgetKind::QrShare, "nav", || {
            Ok(QrShare::install(&mut doc, &config.qr, qr).map(|share| (share, 1)))
        });

        let consent = Self::group(&mut registry, WidgetKind::Consent, &format!("#{BANNER_ID}"), || {
            let mut gate = ConsentGate::new(
                config.consent.clone(),
                config.analytics.clone(),
                store,
                analytics,
            );
            gate.init(&mut doc);
            Ok(Some((gate, 1)))
        });

        let mut page = Page {
            doc,
            config,
            scheduler,
            viewport: host.viewport,
            registry,
            reveal,
            modals,
            carousels,
            slideshows,
            spotlight,
            qr_share,
            consent,
            torn_down: false,
        };
        // Observers deliver an initial observation right after `observe`.
        page.evaluate_visibility();
        info!(url = %page.doc.url(), groups = page.registry.len(), "page bootstrapped");
        page
    }

    /// Run one group's discovery and record it. Errors are logged and the
    /// group is treated as absent.
    fn group<T>(
        registry: &mut Vec<WidgetRegistryEntry>,
        kind: WidgetKind,
        selector: &str,
        discover: impl FnOnce() -> Result<Option<(T, usize)>, SelectorError>,
    ) -> Option<T> {
        let (widget, instances) = match discover() {
            Ok(Some((widget, instances))) => (Some(widget), instances),
            Ok(None) => (None, 0),
            Err(e) => {
                warn!(%kind, "widget group skipped: {e}");
                (None, 0)
            }
        };
        debug!(%kind, instances, "widget group bound");
        registry.push(WidgetRegistryEntry {
            selector: selector.to_string(),
            kind,
            instances,
        });
        widget
    }
}

/// Loading/ready wrapper around a [`Page`].
pub enum PageLifecycle {
    Loading(Box<PendingPage>),
    Ready(Box<Page>),
}

/// Everything needed to bootstrap once the document is parsed.
pub struct PendingPage {
    doc: Document,
    config: SiteConfig,
    services: Services,
    host: HostEnvironment,
}

impl PageLifecycle {
    /// Bootstrap now if the document is parsed, otherwise wait for
    /// [`content_loaded`](Self::content_loaded).
    pub fn start(doc: Document, config: SiteConfig, services: Services, host: HostEnvironment) -> Self {
        if doc.ready_state() == ReadyState::Loading {
            debug!("document still loading; bootstrap deferred");
            return PageLifecycle::Loading(Box::new(PendingPage {
                doc,
                config,
                services,
                host,
            }));
        }
        PageLifecycle::Ready(Box::new(Bootstrapper::bootstrap(doc, config, services, host)))
    }

    /// The document finished parsing. A ready page is returned unchanged.
    pub fn content_loaded(self) -> Self {
        match self {
            PageLifecycle::Loading(pending) => {
                let PendingPage {
                    mut doc,
                    config,
                    services,
                    host,
                } = *pending;
                doc.set_ready_state(ReadyState::Interactive);
                PageLifecycle::Ready(Box::new(Bootstrapper::bootstrap(doc, config, services, host)))
            }
            ready => ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, PageLifecycle::Ready(_))
    }

    pub fn page(&self) -> Option<&Page> {
        match self {
            PageLifecycle::Ready(page) => Some(page.as_ref()),
            PageLifecycle::Loading(_) => None,
        }
    }

    pub fn page_mut(&mut self) -> Option<&mut Page> {
        match self {
            PageLifecycle::Ready(page) => Some(page.as_mut()),
            PageLifecycle::Loading(_) => None,
        }
    }

    pub fn into_page(self) -> Option<Page> {
        match self {
            PageLifecycle::Ready(page) => Some(*page),
            PageLifecycle::Loading(_) => None,
        }
    }

    /// The document while it is still loading.
    pub fn pending_document(&self) -> Option<&Document> {
        match self {
            PageLifecycle::Loading(pending) => Some(&pending.doc),
            PageLifecycle::Ready(_) => None,
        }
    }
}

/// The `index`-th element matching `selector`, for hosts that address
/// event targets by selector.
pub fn nth_match(page: &Page, selector: &str, index: usize) -> Result<Option<ElementId>, SelectorError> {
    let selector = Selector::parse(selector)?;
    let doc = page.document();
    Ok(doc.query_all(doc.root(), &selector).get(index).copied())
}
