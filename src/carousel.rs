//! Manual image galleries.
//!
//! Each `.portfolio-item` with a `.gallery-container` and at least one
//! `.gallery-slide` becomes a [`Carousel`]. The container is shifted by
//! whole slide widths; dots mirror the current index. Prev/next buttons and
//! dots are optional.

use crate::dom::{Document, ElementId, Selector, SelectorError};
use crate::runtime::EventOutcome;
use tracing::debug;

struct GallerySelectors {
    item: Selector,
    container: Selector,
    slide: Selector,
    dot: Selector,
    prev: Selector,
    next: Selector,
}

impl GallerySelectors {
    fn new() -> Result<Self, SelectorError> {
        Ok(Self {
            item: Selector::parse(".portfolio-item")?,
            container: Selector::parse(".gallery-container")?,
            slide: Selector::parse(".gallery-slide")?,
            dot: Selector::parse(".gallery-dot")?,
            prev: Selector::parse(".gallery-nav.prev")?,
            next: Selector::parse(".gallery-nav.next")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Carousel {
    root: ElementId,
    container: ElementId,
    slide_count: usize,
    dots: Vec<ElementId>,
    prev: Option<ElementId>,
    next: Option<ElementId>,
    current: usize,
}

impl Carousel {
    fn bind(doc: &mut Document, root: ElementId, selectors: &GallerySelectors) -> Option<Self> {
        let container = doc.query(root, &selectors.container)?;
        let slide_count = doc.query_all(root, &selectors.slide).len();
        if slide_count == 0 {
            return None;
        }
        let carousel = Self {
            root,
            container,
            slide_count,
            dots: doc.query_all(root, &selectors.dot),
            prev: doc.query(root, &selectors.prev),
            next: doc.query(root, &selectors.next),
            current: 0,
        };
        carousel.project(doc);
        Some(carousel)
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn slide_count(&self) -> usize {
        self.slide_count
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Show slide `index`. Below zero goes to the last slide, past the end
    /// goes to the first.
    pub fn go_to(&mut self, doc: &mut Document, index: isize) {
        self.current = if index < 0 {
            self.slide_count - 1
        } else if index as usize >= self.slide_count {
            0
        } else {
            index as usize
        };
        self.project(doc);
    }

    pub fn next(&mut self, doc: &mut Document) {
        self.go_to(doc, self.current as isize + 1);
    }

    pub fn prev(&mut self, doc: &mut Document) {
        self.go_to(doc, self.current as isize - 1);
    }

    pub fn handle_click(&mut self, doc: &mut Document, target: ElementId) -> EventOutcome {
        if self.prev.is_some_and(|b| doc.contains(b, target)) {
            self.prev(doc);
        } else if self.next.is_some_and(|b| doc.contains(b, target)) {
            self.next(doc);
        } else if let Some(i) = self.dots.iter().position(|d| doc.contains(*d, target)) {
            self.go_to(doc, i as isize);
        } else {
            return EventOutcome::default();
        }
        debug!(root = ?self.root, index = self.current, "carousel moved");
        EventOutcome::handled()
    }

    fn project(&self, doc: &mut Document) {
        doc.set_style(
            self.container,
            "transform",
            &format!("translateX(-{}%)", self.current * 100),
        );
        for (i, dot) in self.dots.iter().enumerate() {
            doc.toggle_class(*dot, "active", i == self.current);
        }
    }
}

/// All galleries on the page.
#[derive(Debug, Default)]
pub struct CarouselController {
    carousels: Vec<Carousel>,
    skipped: usize,
}

impl CarouselController {
    pub fn discover(doc: &mut Document) -> Result<Self, SelectorError> {
        let selectors = GallerySelectors::new()?;
        let mut controller = Self::default();
        for item in doc.query_all(doc.root(), &selectors.item) {
            match Carousel::bind(doc, item, &selectors) {
                Some(carousel) => controller.carousels.push(carousel),
                None => controller.skipped += 1,
            }
        }
        Ok(controller)
    }

    pub fn carousels(&self) -> &[Carousel] {
        &self.carousels
    }

    pub fn carousel_mut(&mut self, index: usize) -> Option<&mut Carousel> {
        self.carousels.get_mut(index)
    }

    /// Items without a container or slides.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn handle_click(&mut self, doc: &mut Document, target: ElementId) -> EventOutcome {
        let mut outcome = EventOutcome::default();
        for carousel in &mut self.carousels {
            outcome.merge(carousel.handle_click(doc, target));
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeSpec, PageSpec};
    use crate::test_helpers::{find, gallery};

    fn page(items: Vec<NodeSpec>) -> Document {
        PageSpec::new("https://tuuli.cz/").body(items).to_document()
    }

    fn transform(doc: &Document, c: &Carousel) -> String {
        doc.style(c.container, "transform").unwrap_or_default().to_string()
    }

    fn active_dots(doc: &Document, c: &Carousel) -> Vec<usize> {
        c.dots
            .iter()
            .enumerate()
            .filter(|(_, d)| doc.has_class(**d, "active"))
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn initial_state_is_projected() {
        let mut doc = page(vec![gallery(3, true)]);
        let controller = CarouselController::discover(&mut doc).unwrap();
        let c = &controller.carousels()[0];
        assert_eq!(c.current_index(), 0);
        assert_eq!(transform(&doc, c), "translateX(-0%)");
        assert_eq!(active_dots(&doc, c), vec![0]);
    }

    #[test]
    fn three_slide_walkthrough() {
        let mut doc = page(vec![gallery(3, true)]);
        let mut controller = CarouselController::discover(&mut doc).unwrap();
        let next = find(&doc, ".gallery-nav.next");
        let prev = find(&doc, ".gallery-nav.prev");

        controller.handle_click(&mut doc, next);
        controller.handle_click(&mut doc, next);
        let c = &controller.carousels()[0];
        assert_eq!(c.current_index(), 2);
        assert_eq!(transform(&doc, c), "translateX(-200%)");
        assert_eq!(active_dots(&doc, c), vec![2]);

        controller.handle_click(&mut doc, next);
        assert_eq!(controller.carousels()[0].current_index(), 0);

        controller.handle_click(&mut doc, prev);
        let c = &controller.carousels()[0];
        assert_eq!(c.current_index(), 2);
        assert_eq!(active_dots(&doc, c), vec![2]);
    }

    #[test]
    fn dot_click_jumps() {
        let mut doc = page(vec![gallery(4, true)]);
        let mut controller = CarouselController::discover(&mut doc).unwrap();
        let dot = doc.select_all(".gallery-dot").unwrap()[3];
        assert_eq!(controller.handle_click(&mut doc, dot).handled, 1);
        let c = &controller.carousels()[0];
        assert_eq!(c.current_index(), 3);
        assert_eq!(transform(&doc, c), "translateX(-300%)");
    }

    #[test]
    fn slide_count_nexts_return_to_start() {
        let mut doc = page(vec![gallery(5, true)]);
        let mut controller = CarouselController::discover(&mut doc).unwrap();
        let c = controller.carousel_mut(0).unwrap();
        for _ in 0..5 {
            c.next(&mut doc);
            assert!(c.current_index() < c.slide_count());
        }
        assert_eq!(c.current_index(), 0);
    }

    #[test]
    fn go_to_wraps_out_of_range() {
        let mut doc = page(vec![gallery(3, false)]);
        let mut controller = CarouselController::discover(&mut doc).unwrap();
        let c = controller.carousel_mut(0).unwrap();
        c.go_to(&mut doc, -5);
        assert_eq!(c.current_index(), 2);
        c.go_to(&mut doc, 17);
        assert_eq!(c.current_index(), 0);
    }

    #[test]
    fn missing_controls_are_tolerated() {
        let mut doc = page(vec![gallery(2, false)]);
        let mut controller = CarouselController::discover(&mut doc).unwrap();
        assert_eq!(controller.carousels().len(), 1);
        let body = doc.body();
        assert_eq!(controller.handle_click(&mut doc, body).handled, 0);
    }

    #[test]
    fn items_without_container_or_slides_are_skipped() {
        let no_container = NodeSpec::new("div")
            .class("portfolio-item")
            .child(NodeSpec::new("div").class("gallery-slide"));
        let no_slides = NodeSpec::new("div")
            .class("portfolio-item")
            .child(NodeSpec::new("div").class("gallery-container"));
        let mut doc = page(vec![no_container, no_slides, gallery(2, true)]);
        let controller = CarouselController::discover(&mut doc).unwrap();
        assert_eq!(controller.carousels().len(), 1);
        assert_eq!(controller.skipped(), 2);
    }

    #[test]
    fn galleries_are_independent() {
        let mut doc = page(vec![gallery(3, true), gallery(3, true)]);
        let mut controller = CarouselController::discover(&mut doc).unwrap();
        let second_next = doc.select_all(".gallery-nav.next").unwrap()[1];
        controller.handle_click(&mut doc, second_next);
        assert_eq!(controller.carousels()[0].current_index(), 0);
        assert_eq!(controller.carousels()[1].current_index(), 1);
    }
}
