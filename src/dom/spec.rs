//! Serialized page descriptions.
//!
//! Pages are described as JSON trees so the CLI and the integration tests
//! can load real page structures without an HTML parser:
//!
//! ```json
//! {
//!   "url": "https://tuuli.cz/aura/",
//!   "body": [
//!     { "tag": "nav" },
//!     { "tag": "section", "class": "product-content",
//!       "layout": { "x": 0, "y": 900, "width": 1280, "height": 400 } }
//!   ]
//! }
//! ```

use super::{Document, ElementId, ReadyState, Rect};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PageSpecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One element and its subtree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeSpec {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Space-separated class list, as in HTML.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<Rect>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn layout(mut self, rect: Rect) -> Self {
        self.layout = Some(rect);
        self
    }

    pub fn child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.children.extend(children);
        self
    }

    fn build(&self, doc: &mut Document, parent: ElementId) {
        let el = doc.create_element(&self.tag);
        if let Some(id) = &self.id {
            doc.set_id(el, id);
        }
        for class in self.class.iter().flat_map(|c| c.split_whitespace()) {
            doc.add_class(el, class);
        }
        for (name, value) in &self.attrs {
            doc.set_attribute(el, name, value);
        }
        if let Some(text) = &self.text {
            doc.set_text(el, text);
        }
        if let Some(rect) = self.layout {
            doc.set_layout(el, rect);
        }
        doc.append_child(parent, el);
        for child in &self.children {
            child.build(doc, el);
        }
    }
}

/// A whole page: URL, readiness and the head/body content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PageSpec {
    pub url: String,
    #[serde(default)]
    pub ready_state: ReadyState,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub head: Vec<NodeSpec>,
    #[serde(default)]
    pub body: Vec<NodeSpec>,
}

impl PageSpec {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ready_state: ReadyState::Complete,
            head: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn body(mut self, nodes: impl IntoIterator<Item = NodeSpec>) -> Self {
        self.body.extend(nodes);
        self
    }

    /// Build a fresh [`Document`] from this description.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new(&self.url);
        let (head, body) = (doc.head(), doc.body());
        for node in &self.head {
            node.build(&mut doc, head);
        }
        for node in &self.body {
            node.build(&mut doc, body);
        }
        doc.set_ready_state(self.ready_state);
        doc
    }
}

/// Read a JSON page description from disk.
pub fn load_page_spec(path: &Path) -> Result<PageSpec, PageSpecError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
