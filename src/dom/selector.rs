//! Minimal CSS selector support.
//!
//! Covers the selectors the page contract uses: compound selectors built
//! from a tag, `#id`, `.class` and `[attr]` / `[attr=value]` parts, joined by
//! descendant (whitespace) or child (`>`) combinators:
//!
//! ```text
//! .gallery-nav.prev
//! .project-image.slideshow > img
//! button[data-product]
//! nav
//! ```

use super::{Document, ElementId};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,
    #[error("unexpected character '{found}' at {position} in selector '{selector}'")]
    Unexpected {
        selector: String,
        found: char,
        position: usize,
    },
    #[error("selector '{0}' ends with a combinator")]
    DanglingCombinator(String),
    #[error("unterminated attribute selector in '{0}'")]
    UnterminatedAttribute(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq)]
struct AttributeMatch {
    name: String,
    value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeMatch>,
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attributes.is_empty()
    }

    fn matches(&self, doc: &Document, id: ElementId) -> bool {
        let el = doc.element(id);
        if let Some(tag) = &self.tag
            && el.tag() != tag
        {
            return false;
        }
        if let Some(wanted) = &self.id
            && el.id() != Some(wanted.as_str())
        {
            return false;
        }
        if !self.classes.iter().all(|c| el.has_class(c)) {
            return false;
        }
        self.attributes.iter().all(|a| match (&a.value, el.attribute(&a.name)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(want), Some(have)) => want == have,
        })
    }
}

/// A parsed selector. Matching runs right to left, like a browser engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Selector {
    source: String,
    /// Each compound with the combinator linking it to the previous one.
    /// The first combinator is unused.
    parts: Vec<(Combinator, Compound)>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let source = input.trim();
        if source.is_empty() {
            return Err(SelectorError::Empty);
        }

        let chars: Vec<char> = source.chars().collect();
        let mut parts = Vec::new();
        let mut current = Compound::default();
        let mut pending = Combinator::Descendant;
        let mut i = 0;

        let unexpected = |found: char, position: usize| SelectorError::Unexpected {
            selector: source.to_string(),
            found,
            position,
        };

        while i < chars.len() {
            let c = chars[i];
            match c {
                ' ' | '\t' | '\n' | '>' => {
                    if !current.is_empty() {
                        parts.push((pending, std::mem::take(&mut current)));
                        pending = Combinator::Descendant;
                    }
                    if c == '>' {
                        if parts.is_empty() || pending == Combinator::Child {
                            return Err(unexpected(c, i));
                        }
                        pending = Combinator::Child;
                    }
                    i += 1;
                }
                '.' | '#' => {
                    let (ident, next) = read_ident(&chars, i + 1);
                    if ident.is_empty() {
                        return Err(unexpected(c, i));
                    }
                    if c == '.' {
                        current.classes.push(ident);
                    } else {
                        current.id = Some(ident);
                    }
                    i = next;
                }
                '[' => {
                    let close = chars[i..]
                        .iter()
                        .position(|ch| *ch == ']')
                        .map(|p| p + i)
                        .ok_or_else(|| SelectorError::UnterminatedAttribute(source.to_string()))?;
                    let body: String = chars[i + 1..close].iter().collect();
                    current.attributes.push(parse_attribute(&body).ok_or_else(|| unexpected(c, i))?);
                    i = close + 1;
                }
                '*' => {
                    i += 1;
                }
                c if is_ident_char(c) => {
                    if !current.is_empty() {
                        return Err(unexpected(c, i));
                    }
                    let (ident, next) = read_ident(&chars, i);
                    current.tag = Some(ident.to_ascii_lowercase());
                    i = next;
                }
                other => return Err(unexpected(other, i)),
            }
        }

        if current.is_empty() {
            if pending == Combinator::Child {
                return Err(SelectorError::DanglingCombinator(source.to_string()));
            }
            // A bare `*` matches everything.
            if parts.is_empty() {
                parts.push((Combinator::Descendant, current));
            }
        } else {
            parts.push((pending, current));
        }

        Ok(Self {
            source: source.to_string(),
            parts,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, doc: &Document, id: ElementId) -> bool {
        self.matches_from(doc, id, self.parts.len() - 1)
    }

    fn matches_from(&self, doc: &Document, id: ElementId, index: usize) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(doc, id) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match combinator {
            Combinator::Child => doc
                .element(id)
                .parent()
                .is_some_and(|p| self.matches_from(doc, p, index - 1)),
            Combinator::Descendant => {
                let mut ancestor = doc.element(id).parent();
                while let Some(a) = ancestor {
                    if self.matches_from(doc, a, index - 1) {
                        return true;
                    }
                    ancestor = doc.element(a).parent();
                }
                false
            }
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn parse_attribute(body: &str) -> Option<AttributeMatch> {
    let (name, value) = match body.split_once('=') {
        Some((name, value)) => {
            let value = value.trim();
            let unquoted = value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
                .unwrap_or(value);
            (name.trim(), Some(unquoted.to_string()))
        }
        None => (body.trim(), None),
    };
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return None;
    }
    Some(AttributeMatch {
        name: name.to_string(),
        value,
    })
}
