//! QR share modal and its renderer collaborator.
//!
//! The share button lives in the page `nav`. Clicking it opens an overlay
//! with a QR code of the current page URL so a visitor can continue on a
//! phone. The code is rendered lazily on the first open through a
//! [`QrRenderer`]; while no renderer succeeds the container shows a plain
//! fallback line and the next open tries again.
//!
//! ```text
//! nav
//! └── button.qr-trigger-btn          (appended)
//! body
//! └── div.qr-modal-overlay           (appended, `active` while open)
//!     └── div.qr-modal-content
//!         ├── div.qr-modal-header > h3 + p
//!         ├── div#qrcode             (renderer output)
//!         └── button.qr-close-btn
//! ```

use crate::config::QrConfig;
use crate::dom::{Document, ElementId, Selector};
use crate::runtime::EventOutcome;
use maud::html;
use qrcode::render::svg;
use qrcode::{EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

pub const CONTAINER_ID: &str = "qrcode";

#[derive(Error, Debug)]
pub enum QrError {
    #[error("QR renderer is not available")]
    Unavailable,
    #[error("QR encoding failed: {0}")]
    Encode(#[from] qrcode::types::QrError),
}

/// Error correction level, from lowest (L, ~7%) to highest (H, ~30%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L,
    M,
    Q,
    H,
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

impl fmt::Display for ErrorCorrection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCorrection::L => "L",
            ErrorCorrection::M => "M",
            ErrorCorrection::Q => "Q",
            ErrorCorrection::H => "H",
        };
        f.write_str(name)
    }
}

/// What to encode and how it should look.
#[derive(Debug, Clone, PartialEq)]
pub struct QrRequest {
    pub text: String,
    pub width: u32,
    pub height: u32,
    pub error_correction: ErrorCorrection,
    pub dark_color: String,
    pub light_color: String,
}

impl QrRequest {
    pub fn from_config(text: &str, config: &QrConfig) -> Self {
        Self {
            text: text.to_string(),
            width: config.size,
            height: config.size,
            error_correction: config.error_correction,
            dark_color: config.dark_color.clone(),
            light_color: config.light_color.clone(),
        }
    }
}

/// Turns a [`QrRequest`] into markup for the `#qrcode` container.
pub trait QrRenderer {
    fn render(&self, request: &QrRequest) -> Result<String, QrError>;
}

/// SVG output through the `qrcode` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SvgQrRenderer;

impl QrRenderer for SvgQrRenderer {
    fn render(&self, request: &QrRequest) -> Result<String, QrError> {
        let code =
            QrCode::with_error_correction_level(request.text.as_bytes(), request.error_correction.into())?;
        Ok(code
            .render::<svg::Color<'_>>()
            .min_dimensions(request.width, request.height)
            .dark_color(svg::Color(&request.dark_color))
            .light_color(svg::Color(&request.light_color))
            .build())
    }
}

/// Stands in for a renderer library that failed to load.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRenderer;

impl QrRenderer for UnavailableRenderer {
    fn render(&self, _request: &QrRequest) -> Result<String, QrError> {
        Err(QrError::Unavailable)
    }
}

/// Share button icon (lucide `qr-code`).
fn trigger_icon() -> String {
    html! {
        svg xmlns="http://www.w3.org/2000/svg" width="24" height="24" viewBox="0 0 24 24"
            fill="none" stroke="currentColor" stroke-width="2" stroke-linecap="round"
            stroke-linejoin="round" class="lucide lucide-qr-code" {
            rect width="5" height="5" x="3" y="3" rx="1" {}
            rect width="5" height="5" x="16" y="3" rx="1" {}
            rect width="5" height="5" x="3" y="16" rx="1" {}
            @for d in ["M21 16h-3a2 2 0 0 0-2 2v3", "M21 21v.01", "M12 7v3a2 2 0 0 1-2 2H7",
                       "M3 12h.01", "M12 3h.01", "M12 16v.01", "M16 12h1", "M21 12v.01", "M12 21v-1"] {
                path d=(d) {}
            }
        }
    }
    .into_string()
}

/// The installed share widget.
pub struct QrShare {
    config: QrConfig,
    renderer: Box<dyn QrRenderer>,
    trigger: ElementId,
    overlay: ElementId,
    container: ElementId,
    close_button: ElementId,
    rendered: bool,
}

impl fmt::Debug for QrShare {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QrShare")
            .field("trigger", &self.trigger)
            .field("overlay", &self.overlay)
            .field("rendered", &self.rendered)
            .finish_non_exhaustive()
    }
}

impl QrShare {
    /// Insert the trigger and overlay. Returns `None`, leaving the document
    /// untouched, when the page has no `nav`.
    pub fn install(doc: &mut Document, config: &QrConfig, renderer: Box<dyn QrRenderer>) -> Option<Self> {
        let nav_selector = Selector::parse("nav").ok()?;
        let nav = doc.query(doc.root(), &nav_selector)?;

        let overlay = doc.create_element("div");
        doc.add_class(overlay, "qr-modal-overlay");
        let content = doc.create_element("div");
        doc.add_class(content, "qr-modal-content");
        doc.append_child(overlay, content);

        let header = doc.create_element("div");
        doc.add_class(header, "qr-modal-header");
        let title = doc.create_element("h3");
        doc.set_text(title, &config.title);
        let subtitle = doc.create_element("p");
        doc.set_text(subtitle, &config.subtitle);
        doc.append_child(header, title);
        doc.append_child(header, subtitle);
        doc.append_child(content, header);

        let container = doc.create_element("div");
        doc.set_id(container, CONTAINER_ID);
        doc.append_child(content, container);

        let close_button = doc.create_element("button");
        doc.add_class(close_button, "qr-close-btn");
        doc.set_text(close_button, &config.close_label);
        doc.append_child(content, close_button);

        let body = doc.body();
        doc.append_child(body, overlay);

        let trigger = doc.create_element("button");
        doc.add_class(trigger, "qr-trigger-btn");
        doc.set_attribute(trigger, "aria-label", &config.trigger_label);
        doc.set_inner_html(trigger, trigger_icon());
        doc.append_child(nav, trigger);

        Some(Self {
            config: config.clone(),
            renderer,
            trigger,
            overlay,
            container,
            close_button,
            rendered: false,
        })
    }

    pub fn trigger(&self) -> ElementId {
        self.trigger
    }

    pub fn overlay(&self) -> ElementId {
        self.overlay
    }

    pub fn close_button(&self) -> ElementId {
        self.close_button
    }

    pub fn is_open(&self, doc: &Document) -> bool {
        doc.has_class(self.overlay, "active")
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered
    }

    pub fn handle_click(&mut self, doc: &mut Document, target: ElementId) -> EventOutcome {
        if doc.contains(self.trigger, target) {
            self.open(doc);
            return EventOutcome::handled();
        }
        // Clicks inside the content bubble to the overlay with a different
        // target and must not close it.
        if doc.contains(self.close_button, target) || target == self.overlay {
            self.close(doc);
            return EventOutcome::handled();
        }
        EventOutcome::default()
    }

    pub fn open(&mut self, doc: &mut Document) {
        doc.add_class(self.overlay, "active");
        if self.rendered {
            return;
        }
        doc.clear_children(self.container);
        let request = QrRequest::from_config(doc.url(), &self.config);
        match self.renderer.render(&request) {
            Ok(markup) => {
                doc.set_inner_html(self.container, markup);
                self.rendered = true;
                debug!(url = %request.text, "QR code rendered");
            }
            Err(e) => {
                warn!("QR code unavailable: {e}");
                let fallback = doc.create_element("p");
                doc.set_style(fallback, "color", "black");
                doc.set_text(fallback, &self.config.fallback_text);
                doc.append_child(self.container, fallback);
            }
        }
    }

    pub fn close(&mut self, doc: &mut Document) {
        doc.remove_class(self.overlay, "active");
    }
}
