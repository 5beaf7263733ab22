//! Headless document model.
//!
//! Widgets never own elements; they hold [`ElementId`] handles into a
//! [`Document`] arena and project their typed state onto it through classes,
//! inline styles and attributes. Nothing in the widget layer reads those
//! projections back as state.
//!
//! The model covers what the behavior layer touches and nothing more:
//!
//! - element tree with tag, id, classes, attributes, inline styles and text
//! - raw inner markup for collaborator output (QR SVG, icons)
//! - a layout box per element, supplied by the host, for visibility checks
//! - simple CSS selector queries ([`Selector`])
//! - document readiness ([`ReadyState`])
//!
//! Detached elements stay in the arena with no parent; they are simply not
//! reachable from the root anymore, so ids stay valid for the whole page.

mod render;
mod selector;
mod spec;

pub use render::{render_document, render_element};
pub use selector::{Selector, SelectorError};
pub use spec::{NodeSpec, PageSpec, PageSpecError, load_page_spec};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Handle to an element in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

/// Document parsing state, mirroring `document.readyState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadyState {
    Loading,
    Interactive,
    #[default]
    Complete,
}

/// Layout box in document coordinates (CSS pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection of two boxes. Edge-adjacent boxes intersect with zero
    /// area; disjoint boxes return `None`.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if left <= right && top <= bottom {
            Some(Rect::new(left, top, right - left, bottom - top))
        } else {
            None
        }
    }
}

/// A single element node.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    id: Option<String>,
    classes: Vec<String>,
    attributes: BTreeMap<String, String>,
    /// Inline style declarations in insertion order.
    styles: Vec<(String, String)>,
    text: Option<String>,
    inner_html: Option<String>,
    layout: Option<Rect>,
    parent: Option<ElementId>,
    children: Vec<ElementId>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            id: None,
            classes: Vec::new(),
            attributes: BTreeMap::new(),
            styles: Vec::new(),
            text: None,
            inner_html: None,
            layout: None,
            parent: None,
            children: Vec::new(),
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.styles
            .iter()
            .find(|(p, _)| p == property)
            .map(|(_, v)| v.as_str())
    }

    pub fn styles(&self) -> &[(String, String)] {
        &self.styles
    }

    /// Serialized `style` attribute, e.g. `opacity: 0; transform: none`.
    pub fn style_attribute(&self) -> Option<String> {
        if self.styles.is_empty() {
            return None;
        }
        Some(
            self.styles
                .iter()
                .map(|(p, v)| format!("{p}: {v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn inner_html(&self) -> Option<&str> {
        self.inner_html.as_deref()
    }

    pub fn layout(&self) -> Option<Rect> {
        self.layout
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn children(&self) -> &[ElementId] {
        &self.children
    }
}

/// The page's element tree plus its readiness and URL.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
    root: ElementId,
    head: ElementId,
    body: ElementId,
    ready_state: ReadyState,
    url: String,
}

impl Document {
    /// Create an empty `html > head + body` document.
    pub fn new(url: impl Into<String>) -> Self {
        let mut doc = Self {
            nodes: vec![Element::new("html")],
            root: ElementId(0),
            head: ElementId(0),
            body: ElementId(0),
            ready_state: ReadyState::Complete,
            url: url.into(),
        };
        let head = doc.create_element("head");
        let body = doc.create_element("body");
        doc.append_child(doc.root, head);
        doc.append_child(doc.root, body);
        doc.head = head;
        doc.body = body;
        doc
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn head(&self) -> ElementId {
        self.head
    }

    pub fn body(&self) -> ElementId {
        self.body
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }

    pub fn element(&self, id: ElementId) -> &Element {
        &self.nodes[id.0]
    }

    fn element_mut(&mut self, id: ElementId) -> &mut Element {
        &mut self.nodes[id.0]
    }

    // =========================================================================
    // Tree mutation
    // =========================================================================

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> ElementId {
        self.nodes.push(Element::new(tag));
        ElementId(self.nodes.len() - 1)
    }

    /// Append `child` as the last child of `parent`, detaching it first.
    pub fn append_child(&mut self, parent: ElementId, child: ElementId) {
        self.detach(child);
        self.element_mut(child).parent = Some(parent);
        self.element_mut(parent).children.push(child);
    }

    /// Remove an element from its parent. The element and its subtree stay
    /// in the arena, unreachable from the root.
    pub fn detach(&mut self, id: ElementId) {
        if let Some(parent) = self.element_mut(id).parent.take() {
            self.element_mut(parent).children.retain(|c| *c != id);
        }
    }

    /// Detach every child, the equivalent of `innerHTML = ''`.
    pub fn clear_children(&mut self, id: ElementId) {
        let children = std::mem::take(&mut self.element_mut(id).children);
        for child in children {
            self.element_mut(child).parent = None;
        }
        let el = self.element_mut(id);
        el.text = None;
        el.inner_html = None;
    }

    /// Whether the element is reachable from the document root.
    pub fn is_connected(&self, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root {
                return true;
            }
            current = self.element(node).parent;
        }
        false
    }

    // =========================================================================
    // Element properties
    // =========================================================================

    pub fn set_id(&mut self, id: ElementId, value: &str) {
        self.element_mut(id).id = Some(value.to_string());
    }

    pub fn add_class(&mut self, id: ElementId, class: &str) {
        let el = self.element_mut(id);
        if !el.has_class(class) {
            el.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, id: ElementId, class: &str) {
        self.element_mut(id).classes.retain(|c| c != class);
    }

    /// Force a class on or off, the two-argument `classList.toggle`.
    pub fn toggle_class(&mut self, id: ElementId, class: &str, on: bool) {
        if on {
            self.add_class(id, class);
        } else {
            self.remove_class(id, class);
        }
    }

    pub fn has_class(&self, id: ElementId, class: &str) -> bool {
        self.element(id).has_class(class)
    }

    pub fn set_attribute(&mut self, id: ElementId, name: &str, value: &str) {
        self.element_mut(id)
            .attributes
            .insert(name.to_string(), value.to_string());
    }

    pub fn attribute(&self, id: ElementId, name: &str) -> Option<&str> {
        self.element(id).attribute(name)
    }

    /// Set an inline style property, replacing an existing value in place.
    pub fn set_style(&mut self, id: ElementId, property: &str, value: &str) {
        let styles = &mut self.element_mut(id).styles;
        match styles.iter_mut().find(|(p, _)| p == property) {
            Some((_, v)) => *v = value.to_string(),
            None => styles.push((property.to_string(), value.to_string())),
        }
    }

    pub fn remove_style(&mut self, id: ElementId, property: &str) {
        self.element_mut(id).styles.retain(|(p, _)| p != property);
    }

    pub fn style(&self, id: ElementId, property: &str) -> Option<&str> {
        self.element(id).style(property)
    }

    pub fn set_text(&mut self, id: ElementId, text: &str) {
        self.element_mut(id).text = Some(text.to_string());
    }

    /// Set raw markup rendered verbatim inside the element.
    pub fn set_inner_html(&mut self, id: ElementId, markup: String) {
        self.element_mut(id).inner_html = Some(markup);
    }

    pub fn set_layout(&mut self, id: ElementId, rect: Rect) {
        self.element_mut(id).layout = Some(rect);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Descendants of `scope` in document order, excluding `scope` itself.
    pub fn descendants(&self, scope: ElementId) -> Vec<ElementId> {
        let mut out = Vec::new();
        let mut stack: Vec<ElementId> = self.element(scope).children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.element(id).children.iter().rev().copied());
        }
        out
    }

    /// First connected element with the given id, in document order.
    pub fn get_element_by_id(&self, id: &str) -> Option<ElementId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .find(|el| self.element(*el).id() == Some(id))
    }

    /// All descendants of `scope` matching `selector`, in document order.
    pub fn query_all(&self, scope: ElementId, selector: &Selector) -> Vec<ElementId> {
        self.descendants(scope)
            .into_iter()
            .filter(|el| selector.matches(self, *el))
            .collect()
    }

    /// First descendant of `scope` matching `selector`.
    pub fn query(&self, scope: ElementId, selector: &Selector) -> Option<ElementId> {
        self.descendants(scope)
            .into_iter()
            .find(|el| selector.matches(self, *el))
    }

    /// Parse `selector` and query the whole document.
    pub fn select_all(&self, selector: &str) -> Result<Vec<ElementId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(self.query_all(self.root, &selector))
    }

    /// Nearest inclusive ancestor matching `selector`.
    pub fn closest(&self, id: ElementId, selector: &Selector) -> Option<ElementId> {
        let mut current = Some(id);
        while let Some(node) = current {
            if selector.matches(self, node) {
                return Some(node);
            }
            current = self.element(node).parent;
        }
        None
    }

    /// Whether `ancestor` is `id` or one of its ancestors.
    pub fn contains(&self, ancestor: ElementId, id: ElementId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if node == ancestor {
                return true;
            }
            current = self.element(node).parent;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_list() -> (Document, ElementId, Vec<ElementId>) {
        let mut doc = Document::new("https://tuuli.cz/");
        let list = doc.create_element("ul");
        doc.append_child(doc.body(), list);
        let items: Vec<_> = (0..3)
            .map(|i| {
                let li = doc.create_element("li");
                doc.set_id(li, &format!("item-{i}"));
                doc.add_class(li, "item");
                doc.append_child(list, li);
                li
            })
            .collect();
        (doc, list, items)
    }

    #[test]
    fn new_document_has_head_and_body() {
        let doc = Document::new("https://tuuli.cz/");
        assert_eq!(doc.element(doc.head()).tag(), "head");
        assert_eq!(doc.element(doc.body()).tag(), "body");
        assert_eq!(doc.element(doc.root()).children(), &[doc.head(), doc.body()]);
    }

    #[test]
    fn descendants_are_in_document_order() {
        let (doc, list, items) = doc_with_list();
        assert_eq!(doc.descendants(list), items);
    }

    #[test]
    fn get_element_by_id_skips_detached() {
        let (mut doc, _, items) = doc_with_list();
        assert_eq!(doc.get_element_by_id("item-1"), Some(items[1]));
        doc.detach(items[1]);
        assert_eq!(doc.get_element_by_id("item-1"), None);
        assert!(!doc.is_connected(items[1]));
    }

    #[test]
    fn add_class_is_idempotent() {
        let (mut doc, list, _) = doc_with_list();
        doc.add_class(list, "active");
        doc.add_class(list, "active");
        assert_eq!(doc.element(list).classes(), &["active".to_string()]);
        doc.toggle_class(list, "active", false);
        assert!(!doc.has_class(list, "active"));
    }

    #[test]
    fn set_style_replaces_in_place() {
        let (mut doc, list, _) = doc_with_list();
        doc.set_style(list, "opacity", "0");
        doc.set_style(list, "transform", "translateY(30px)");
        doc.set_style(list, "opacity", "1");
        assert_eq!(
            doc.element(list).style_attribute().as_deref(),
            Some("opacity: 1; transform: translateY(30px)")
        );
        doc.remove_style(list, "opacity");
        assert_eq!(doc.style(list, "opacity"), None);
    }

    #[test]
    fn append_child_moves_between_parents() {
        let (mut doc, list, items) = doc_with_list();
        let other = doc.create_element("div");
        doc.append_child(doc.body(), other);
        doc.append_child(other, items[0]);
        assert_eq!(doc.element(list).children(), &items[1..]);
        assert_eq!(doc.element(items[0]).parent(), Some(other));
    }

    #[test]
    fn closest_includes_self() {
        let (doc, list, items) = doc_with_list();
        let item = Selector::parse(".item").unwrap();
        let ul = Selector::parse("ul").unwrap();
        assert_eq!(doc.closest(items[2], &item), Some(items[2]));
        assert_eq!(doc.closest(items[2], &ul), Some(list));
        assert_eq!(doc.closest(list, &item), None);
    }

    #[test]
    fn clear_children_detaches_everything() {
        let (mut doc, list, items) = doc_with_list();
        doc.clear_children(list);
        assert!(doc.element(list).children().is_empty());
        assert!(items.iter().all(|i| !doc.is_connected(*i)));
    }

    #[test]
    fn rect_intersection_edges() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(10.0, 0.0, 5.0, 5.0);
        let touching = a.intersection(&b).unwrap();
        assert_eq!(touching.area(), 0.0);
        assert!(a.intersection(&Rect::new(11.0, 0.0, 1.0, 1.0)).is_none());
        let overlap = a.intersection(&Rect::new(5.0, 5.0, 10.0, 10.0)).unwrap();
        assert_eq!(overlap.area(), 25.0);
    }
}
