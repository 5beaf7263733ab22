//! Shared test utilities for the tuuli-site test suite.
//!
//! Provides page fixture builders, panicking lookups, and recording stand-ins
//! for the collaborator traits.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let doc = full_page();
//! let button = find(&doc, ".product-btn[data-product=aura]");
//!
//! let activator = RecordingActivator::default();
//! // hand `Box::new(activator.clone())` to the page, then:
//! assert_eq!(activator.calls(), 0);
//! ```

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::analytics::{AnalyticsActivator, AnalyticsError};
use crate::config::AnalyticsConfig;
use crate::dom::{Document, ElementId, NodeSpec, PageSpec, Rect};
use crate::qr::{QrError, QrRenderer, QrRequest};

// =========================================================================
// Lookups
// =========================================================================

/// First element matching `selector`. Panics if there is none.
pub fn find(doc: &Document, selector: &str) -> ElementId {
    doc.select_all(selector)
        .unwrap_or_else(|e| panic!("bad selector '{selector}': {e}"))
        .into_iter()
        .next()
        .unwrap_or_else(|| panic!("no element matches '{selector}'"))
}

// =========================================================================
// Fixture builders
// =========================================================================

/// `.portfolio-item` with `slides` slides, one dot per slide and, when
/// `controls` is set, prev/next buttons.
pub fn gallery(slides: usize, controls: bool) -> NodeSpec {
    let container = NodeSpec::new("div")
        .class("gallery-container")
        .children((0..slides).map(|_| NodeSpec::new("div").class("gallery-slide")));
    let mut item = NodeSpec::new("div").class("portfolio-item").child(container);
    if controls {
        item = item
            .child(NodeSpec::new("button").class("gallery-nav prev"))
            .child(NodeSpec::new("button").class("gallery-nav next"))
            .child(
                NodeSpec::new("div")
                    .class("gallery-dots")
                    .children((0..slides).map(|_| NodeSpec::new("span").class("gallery-dot"))),
            );
    }
    item
}

/// `.project-image.slideshow` with `images` images.
pub fn slideshow(images: usize) -> NodeSpec {
    NodeSpec::new("div")
        .class("project-image slideshow")
        .children((0..images).map(|i| NodeSpec::new("img").attr("src", &format!("shot-{i}.avif"))))
}

/// `.modal#modal-<name>` with a backdrop and a close button.
pub fn modal(name: &str) -> NodeSpec {
    NodeSpec::new("div")
        .class("modal")
        .id(&format!("modal-{name}"))
        .child(NodeSpec::new("div").class("modal-overlay"))
        .child(
            NodeSpec::new("div")
                .class("modal-content")
                .child(NodeSpec::new("button").class("modal-close").text("×")),
        )
}

pub fn product_button(name: &str) -> NodeSpec {
    NodeSpec::new("a")
        .class("product-btn")
        .attr("href", "#")
        .attr("data-product", name)
}

/// Document with only a `nav`.
pub fn page_with_nav() -> Document {
    PageSpec::new("https://tuuli.cz/aura/")
        .body([NodeSpec::new("nav")])
        .to_document()
}

/// Two modals and three triggers, one of them pointing nowhere.
pub fn modal_page() -> Document {
    PageSpec::new("https://tuuli.cz/aura/")
        .body([
            product_button("aura"),
            product_button("vento"),
            product_button("missing"),
            modal("aura"),
            modal("vento"),
        ])
        .to_document()
}

/// Every widget group on one page.
///
/// Layout: the first `.product-content` is on screen at load, the second and
/// the `.project` card sit around y = 3000.
pub fn full_page_spec() -> PageSpec {
    PageSpec::new("https://tuuli.cz/").body([
        NodeSpec::new("nav"),
        NodeSpec::new("section")
            .class("product-content")
            .layout(Rect::new(0.0, 100.0, 1280.0, 400.0)),
        NodeSpec::new("section")
            .class("product-content")
            .layout(Rect::new(0.0, 3000.0, 1280.0, 400.0)),
        product_button("aura"),
        product_button("vento"),
        modal("aura"),
        modal("vento"),
        gallery(3, true),
        slideshow(3),
        slideshow(4),
        NodeSpec::new("div")
            .class("project")
            .layout(Rect::new(0.0, 3000.0, 400.0, 100.0)),
    ])
}

pub fn full_page() -> Document {
    full_page_spec().to_document()
}

// =========================================================================
// Recording collaborators
// =========================================================================

/// Counts `activate` calls. Clones share the counter.
#[derive(Debug, Clone, Default)]
pub struct RecordingActivator {
    calls: Rc<Cell<usize>>,
    active: Rc<Cell<bool>>,
    fail: bool,
}

impl RecordingActivator {
    /// An activator whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl AnalyticsActivator for RecordingActivator {
    fn activate(&mut self, _doc: &mut Document, _config: &AnalyticsConfig) -> Result<(), AnalyticsError> {
        self.calls.set(self.calls.get() + 1);
        if self.fail {
            return Err(AnalyticsError::MissingProjectKey);
        }
        self.active.set(true);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// Records requests and returns a stub SVG. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingQrRenderer {
    requests: Rc<RefCell<Vec<QrRequest>>>,
}

impl RecordingQrRenderer {
    pub fn requests(&self) -> Vec<QrRequest> {
        self.requests.borrow().clone()
    }
}

impl QrRenderer for RecordingQrRenderer {
    fn render(&self, request: &QrRequest) -> Result<String, QrError> {
        self.requests.borrow_mut().push(request.clone());
        Ok("<svg/>".to_string())
    }
}
