//! Viewport visibility triggers.
//!
//! A [`VisibilityTrigger`] watches a set of elements and reacts when their
//! visible fraction crosses a threshold, following the delivery rules of the
//! browser's intersection observer:
//!
//! - the root box is the viewport grown (or shrunk, for negative values) by
//!   the root margin;
//! - visible fraction = intersection area / element area; an element with
//!   no area counts as fully visible while its box touches the root;
//! - an observation is delivered on the first evaluation after `observe` and
//!   afterwards only when the element's above/below-threshold state flips.
//!
//! Two modes share that machinery. [`TriggerMode::Reveal`] fades an element
//! in once and forgets it. [`TriggerMode::Toggle`] keeps a class in sync with
//! the element being inside the band for as long as the page lives.

use crate::dom::{Document, ElementId, Rect};
use std::fmt;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq)]
pub enum MarginError {
    #[error("root margin must have 1 to 4 values, got {0}")]
    Arity(usize),
    #[error("invalid root margin value '{0}' (expected px or %)")]
    Value(String),
}

/// One side of a root margin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Px(f64),
    Percent(f64),
}

impl Length {
    fn parse(token: &str) -> Result<Self, MarginError> {
        let invalid = || MarginError::Value(token.to_string());
        if let Some(number) = token.strip_suffix('%') {
            return number.parse().map(Length::Percent).map_err(|_| invalid());
        }
        if let Some(number) = token.strip_suffix("px") {
            return number.parse().map(Length::Px).map_err(|_| invalid());
        }
        // Unitless zero is valid CSS.
        match token.parse::<f64>() {
            Ok(n) if n == 0.0 => Ok(Length::Px(0.0)),
            _ => Err(invalid()),
        }
    }

    fn resolve(&self, basis: f64) -> f64 {
        match self {
            Length::Px(px) => *px,
            Length::Percent(pct) => basis * pct / 100.0,
        }
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Length::Px(px) => write!(f, "{px}px"),
            Length::Percent(pct) => write!(f, "{pct}%"),
        }
    }
}

/// Root margin in CSS shorthand order: top, right, bottom, left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RootMargin {
    pub top: Length,
    pub right: Length,
    pub bottom: Length,
    pub left: Length,
}

impl Default for RootMargin {
    fn default() -> Self {
        Self {
            top: Length::Px(0.0),
            right: Length::Px(0.0),
            bottom: Length::Px(0.0),
            left: Length::Px(0.0),
        }
    }
}

impl RootMargin {
    /// Parse CSS margin shorthand: `"0px"`, `"-40% 0px"`,
    /// `"10px 0px -40%"` or `"-40% 0px -40% 0px"`.
    pub fn parse(input: &str) -> Result<Self, MarginError> {
        let values = input
            .split_whitespace()
            .map(Length::parse)
            .collect::<Result<Vec<_>, _>>()?;
        let (top, right, bottom, left) = match values.as_slice() {
            [all] => (*all, *all, *all, *all),
            [v, h] => (*v, *h, *v, *h),
            [t, h, b] => (*t, *h, *b, *h),
            [t, r, b, l] => (*t, *r, *b, *l),
            other => return Err(MarginError::Arity(other.len())),
        };
        Ok(Self {
            top,
            right,
            bottom,
            left,
        })
    }

    /// The root box for a viewport, in viewport coordinates.
    pub fn apply(&self, viewport: &Viewport) -> Rect {
        let top = self.top.resolve(viewport.height);
        let right = self.right.resolve(viewport.width);
        let bottom = self.bottom.resolve(viewport.height);
        let left = self.left.resolve(viewport.width);
        Rect::new(
            -left,
            -top,
            viewport.width + left + right,
            viewport.height + top + bottom,
        )
    }
}

/// Visible area of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub scroll_x: f64,
    pub scroll_y: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            scroll_x: 0.0,
            scroll_y: 0.0,
        }
    }

    /// An element's layout box in viewport coordinates.
    fn to_viewport(&self, rect: Rect) -> Rect {
        Rect::new(
            rect.x - self.scroll_x,
            rect.y - self.scroll_y,
            rect.width,
            rect.height,
        )
    }
}

/// What the trigger does when an observation is delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerMode {
    /// Fade/slide the element in once, then stop observing it.
    Reveal { offset_px: u32, duration_ms: u64 },
    /// Keep `class` on the element while it is inside the band.
    Toggle { class: String },
}

/// Observation parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserveOptions {
    pub threshold: f64,
    pub root_margin: RootMargin,
    pub mode: TriggerMode,
}

/// Result of measuring one element against the root.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityObservation {
    pub element: ElementId,
    pub intersecting: bool,
    pub ratio: f64,
}

impl VisibilityObservation {
    fn measure(doc: &Document, element: ElementId, root: &Rect, viewport: &Viewport) -> Self {
        let Some(layout) = doc.element(element).layout() else {
            return Self {
                element,
                intersecting: false,
                ratio: 0.0,
            };
        };
        let target = viewport.to_viewport(layout);
        match target.intersection(root) {
            Some(hit) => {
                let area = target.area();
                let ratio = if area > 0.0 { hit.area() / area } else { 1.0 };
                Self {
                    element,
                    intersecting: true,
                    ratio,
                }
            }
            None => Self {
                element,
                intersecting: false,
                ratio: 0.0,
            },
        }
    }

    fn satisfies(&self, threshold: f64) -> bool {
        self.intersecting && self.ratio >= threshold
    }
}

#[derive(Debug, Clone)]
struct Watched {
    element: ElementId,
    /// Last delivered state; `None` until the first evaluation.
    last: Option<bool>,
}

/// Watches elements and applies the configured mode on visibility changes.
#[derive(Debug, Clone)]
pub struct VisibilityTrigger {
    options: ObserveOptions,
    watched: Vec<Watched>,
}

impl VisibilityTrigger {
    pub fn new(options: ObserveOptions) -> Self {
        Self {
            options,
            watched: Vec::new(),
        }
    }

    pub fn options(&self) -> &ObserveOptions {
        &self.options
    }

    /// Start observing `elements`. In reveal mode each element is put into
    /// its hidden starting pose first.
    pub fn observe(&mut self, doc: &mut Document, elements: &[ElementId]) {
        for &element in elements {
            if self.is_observing(element) {
                continue;
            }
            if let TriggerMode::Reveal {
                offset_px,
                duration_ms,
            } = &self.options.mode
            {
                let seconds = *duration_ms as f64 / 1000.0;
                doc.set_style(element, "opacity", "0");
                doc.set_style(element, "transform", &format!("translateY({offset_px}px)"));
                doc.set_style(
                    element,
                    "transition",
                    &format!("opacity {seconds}s ease, transform {seconds}s ease"),
                );
            }
            self.watched.push(Watched {
                element,
                last: None,
            });
        }
    }

    /// Stop observing one element.
    pub fn unobserve(&mut self, element: ElementId) {
        self.watched.retain(|w| w.element != element);
    }

    /// Stop observing everything.
    pub fn disconnect(&mut self) {
        self.watched.clear();
    }

    pub fn is_observing(&self, element: ElementId) -> bool {
        self.watched.iter().any(|w| w.element == element)
    }

    pub fn observed_count(&self) -> usize {
        self.watched.len()
    }

    /// Measure every watched element, deliver observations whose state
    /// changed, and apply the mode. Returns the delivered observations.
    pub fn evaluate(&mut self, doc: &mut Document, viewport: &Viewport) -> Vec<VisibilityObservation> {
        let root = self.options.root_margin.apply(viewport);
        let threshold = self.options.threshold;
        let mut delivered = Vec::new();

        for watched in &mut self.watched {
            let observation = VisibilityObservation::measure(doc, watched.element, &root, viewport);
            let state = observation.satisfies(threshold);
            if watched.last == Some(state) {
                continue;
            }
            watched.last = Some(state);
            delivered.push(observation);
        }

        for observation in &delivered {
            let visible = observation.satisfies(threshold);
            match &self.options.mode {
                TriggerMode::Reveal { .. } => {
                    if visible {
                        doc.set_style(observation.element, "opacity", "1");
                        doc.set_style(observation.element, "transform", "translateY(0)");
                        debug!(element = ?observation.element, ratio = observation.ratio, "revealed");
                    }
                }
                TriggerMode::Toggle { class } => {
                    doc.toggle_class(observation.element, class, visible);
                }
            }
        }

        if matches!(self.options.mode, TriggerMode::Reveal { .. }) {
            let revealed: Vec<_> = delivered
                .iter()
                .filter(|o| o.satisfies(threshold))
                .map(|o| o.element)
                .collect();
            self.watched.retain(|w| !revealed.contains(&w.element));
        }

        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reveal_options() -> ObserveOptions {
        ObserveOptions {
            threshold: 0.1,
            root_margin: RootMargin::default(),
            mode: TriggerMode::Reveal {
                offset_px: 30,
                duration_ms: 800,
            },
        }
    }

    fn toggle_options() -> ObserveOptions {
        ObserveOptions {
            threshold: 0.0,
            root_margin: RootMargin::parse("-40% 0px -40% 0px").unwrap(),
            mode: TriggerMode::Toggle {
                class: "in-view".to_string(),
            },
        }
    }

    fn doc_with_box(rect: Rect) -> (Document, ElementId) {
        let mut doc = Document::new("https://tuuli.cz/");
        let el = doc.create_element("section");
        doc.set_layout(el, rect);
        doc.append_child(doc.body(), el);
        (doc, el)
    }

    fn scrolled(y: f64) -> Viewport {
        Viewport {
            scroll_y: y,
            ..Viewport::new(1280.0, 800.0)
        }
    }

    // =========================================================================
    // RootMargin
    // =========================================================================

    #[test]
    fn margin_shorthand_forms() {
        let one = RootMargin::parse("10px").unwrap();
        assert_eq!(one.left, Length::Px(10.0));
        let two = RootMargin::parse("-40% 0px").unwrap();
        assert_eq!(two.bottom, Length::Percent(-40.0));
        assert_eq!(two.right, Length::Px(0.0));
        let three = RootMargin::parse("1px 2px 3px").unwrap();
        assert_eq!(three.left, Length::Px(2.0));
        let four = RootMargin::parse("-40% 0px -40% 0px").unwrap();
        assert_eq!(four.top, Length::Percent(-40.0));
        assert_eq!(RootMargin::parse("0").unwrap(), RootMargin::default());
    }

    #[test]
    fn margin_errors() {
        assert_eq!(RootMargin::parse(""), Err(MarginError::Arity(0)));
        assert_eq!(
            RootMargin::parse("1px 1px 1px 1px 1px"),
            Err(MarginError::Arity(5))
        );
        assert!(matches!(RootMargin::parse("10em"), Err(MarginError::Value(_))));
        assert!(matches!(RootMargin::parse("5"), Err(MarginError::Value(_))));
    }

    #[test]
    fn negative_percent_margin_shrinks_to_middle_band() {
        let margin = RootMargin::parse("-40% 0px -40% 0px").unwrap();
        let root = margin.apply(&Viewport::new(400.0, 1000.0));
        assert_eq!(root, Rect::new(0.0, 400.0, 400.0, 200.0));
    }

    // =========================================================================
    // Reveal mode
    // =========================================================================

    #[test]
    fn observe_applies_hidden_pose() {
        let (mut doc, el) = doc_with_box(Rect::new(0.0, 2000.0, 1280.0, 400.0));
        let mut trigger = VisibilityTrigger::new(reveal_options());
        trigger.observe(&mut doc, &[el]);
        assert_eq!(doc.style(el, "opacity"), Some("0"));
        assert_eq!(doc.style(el, "transform"), Some("translateY(30px)"));
        assert_eq!(
            doc.style(el, "transition"),
            Some("opacity 0.8s ease, transform 0.8s ease")
        );
    }

    #[test]
    fn reveal_fires_once_past_threshold() {
        let (mut doc, el) = doc_with_box(Rect::new(0.0, 1000.0, 1280.0, 400.0));
        let mut trigger = VisibilityTrigger::new(reveal_options());
        trigger.observe(&mut doc, &[el]);

        // Off screen: delivered (first evaluation) but not revealed.
        let first = trigger.evaluate(&mut doc, &scrolled(0.0));
        assert_eq!(first.len(), 1);
        assert_eq!(doc.style(el, "opacity"), Some("0"));

        // 20px of 400px visible = 5%, below threshold: no change.
        assert!(trigger.evaluate(&mut doc, &scrolled(220.0)).is_empty());
        assert_eq!(doc.style(el, "opacity"), Some("0"));

        // 100px visible = 25%.
        let hit = trigger.evaluate(&mut doc, &scrolled(300.0));
        assert_eq!(hit.len(), 1);
        assert!((hit[0].ratio - 0.25).abs() < 1e-9);
        assert_eq!(doc.style(el, "opacity"), Some("1"));
        assert_eq!(doc.style(el, "transform"), Some("translateY(0)"));
        assert!(!trigger.is_observing(el));
    }

    #[test]
    fn reveal_never_fires_twice() {
        let (mut doc, el) = doc_with_box(Rect::new(0.0, 100.0, 1280.0, 400.0));
        let mut trigger = VisibilityTrigger::new(reveal_options());
        trigger.observe(&mut doc, &[el]);
        assert_eq!(trigger.evaluate(&mut doc, &scrolled(0.0)).len(), 1);

        // Scroll away and back: nothing delivered, state untouched.
        doc.set_style(el, "opacity", "0.5");
        assert!(trigger.evaluate(&mut doc, &scrolled(5000.0)).is_empty());
        assert!(trigger.evaluate(&mut doc, &scrolled(0.0)).is_empty());
        assert_eq!(doc.style(el, "opacity"), Some("0.5"));
    }

    #[test]
    fn element_without_layout_is_never_visible() {
        let mut doc = Document::new("https://tuuli.cz/");
        let el = doc.create_element("section");
        doc.append_child(doc.body(), el);
        let mut trigger = VisibilityTrigger::new(reveal_options());
        trigger.observe(&mut doc, &[el]);
        trigger.evaluate(&mut doc, &scrolled(0.0));
        assert!(trigger.is_observing(el));
        assert_eq!(doc.style(el, "opacity"), Some("0"));
    }

    #[test]
    fn zero_area_element_counts_as_visible_when_touching() {
        let (mut doc, el) = doc_with_box(Rect::new(10.0, 10.0, 0.0, 0.0));
        let mut trigger = VisibilityTrigger::new(reveal_options());
        trigger.observe(&mut doc, &[el]);
        let delivered = trigger.evaluate(&mut doc, &scrolled(0.0));
        assert_eq!(delivered[0].ratio, 1.0);
        assert_eq!(doc.style(el, "opacity"), Some("1"));
    }

    #[test]
    fn observe_twice_is_ignored() {
        let (mut doc, el) = doc_with_box(Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut trigger = VisibilityTrigger::new(reveal_options());
        trigger.observe(&mut doc, &[el, el]);
        assert_eq!(trigger.observed_count(), 1);
        trigger.disconnect();
        assert_eq!(trigger.observed_count(), 0);
    }

    // =========================================================================
    // Toggle mode
    // =========================================================================

    #[test]
    fn toggle_tracks_middle_band() {
        // Viewport 400x1000: band is y in [400, 600] of the viewport.
        let (mut doc, el) = doc_with_box(Rect::new(0.0, 1200.0, 400.0, 100.0));
        let mut trigger = VisibilityTrigger::new(toggle_options());
        trigger.observe(&mut doc, &[el]);
        let viewport = |y: f64| Viewport {
            scroll_y: y,
            ..Viewport::new(400.0, 1000.0)
        };

        trigger.evaluate(&mut doc, &viewport(0.0));
        assert!(!doc.has_class(el, "in-view"));

        // Element at viewport y 450..550: inside the band.
        assert_eq!(trigger.evaluate(&mut doc, &viewport(750.0)).len(), 1);
        assert!(doc.has_class(el, "in-view"));

        // Still inside: nothing delivered.
        assert!(trigger.evaluate(&mut doc, &viewport(760.0)).is_empty());

        // Element at viewport y 100..200: above the band.
        trigger.evaluate(&mut doc, &viewport(1100.0));
        assert!(!doc.has_class(el, "in-view"));

        // Back in: fires again.
        trigger.evaluate(&mut doc, &viewport(750.0));
        assert!(doc.has_class(el, "in-view"));
        assert!(trigger.is_observing(el));
    }

    #[test]
    fn toggle_does_not_touch_styles() {
        let (mut doc, el) = doc_with_box(Rect::new(0.0, 0.0, 10.0, 10.0));
        let mut trigger = VisibilityTrigger::new(toggle_options());
        trigger.observe(&mut doc, &[el]);
        assert!(doc.element(el).styles().is_empty());
    }
}
