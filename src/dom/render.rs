//! HTML serialization of a [`Document`].
//!
//! Tag names are dynamic here, which maud's `html!` macro cannot express, so
//! element boundaries are emitted as pre-escaped fragments while every piece
//! of user-controlled text (attribute values, text content) goes through
//! maud's escaping.

use super::{Document, ElementId};
use maud::{DOCTYPE, Markup, PreEscaped, html};

const VOID_ELEMENTS: &[&str] = &["area", "br", "hr", "img", "input", "link", "meta", "source"];

/// Render the whole document, doctype included.
pub fn render_document(doc: &Document) -> Markup {
    html! {
        (DOCTYPE)
        (render_element(doc, doc.root()))
    }
}

/// Render one element and its subtree.
pub fn render_element(doc: &Document, id: ElementId) -> Markup {
    let el = doc.element(id);
    let mut out = String::new();
    out.push('<');
    out.push_str(el.tag());
    if let Some(value) = el.id() {
        push_attribute(&mut out, "id", value);
    }
    if !el.classes().is_empty() {
        push_attribute(&mut out, "class", &el.classes().join(" "));
    }
    for (name, value) in el.attributes() {
        push_attribute(&mut out, name, value);
    }
    if let Some(style) = el.style_attribute() {
        push_attribute(&mut out, "style", &style);
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&el.tag()) {
        return PreEscaped(out);
    }

    if let Some(text) = el.text() {
        out.push_str(&html! { (text) }.into_string());
    }
    if let Some(raw) = el.inner_html() {
        out.push_str(raw);
    }
    for child in el.children() {
        out.push_str(&render_element(doc, *child).into_string());
    }
    out.push_str("</");
    out.push_str(el.tag());
    out.push('>');
    PreEscaped(out)
}

fn push_attribute(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    out.push_str(&html! { (value) }.into_string());
    out.push('"');
}
