//! Named overlay dialogs.
//!
//! Every `.modal` element found at bootstrap gets a [`Modal`] record keyed
//! by its id. Triggers name their target through an attribute: a
//! `.product-btn` with `data-product="aura"` opens `#modal-aura`. Several
//! modals may be open at once; the body scroll lock is held for as long as
//! at least one of them is.

use crate::dom::{Document, ElementId, Selector, SelectorError};
use crate::runtime::EventOutcome;
use tracing::debug;

const ACTIVE_CLASS: &str = "active";

/// Reference-counted `overflow: hidden` on the body.
#[derive(Debug, Default)]
pub struct ScrollLock {
    holders: usize,
}

impl ScrollLock {
    pub fn acquire(&mut self, doc: &mut Document) {
        self.holders += 1;
        if self.holders == 1 {
            let body = doc.body();
            doc.set_style(body, "overflow", "hidden");
        }
    }

    pub fn release(&mut self, doc: &mut Document) {
        if self.holders == 0 {
            return;
        }
        self.holders -= 1;
        if self.holders == 0 {
            let body = doc.body();
            doc.remove_style(body, "overflow");
        }
    }

    pub fn holders(&self) -> usize {
        self.holders
    }

    pub fn is_locked(&self) -> bool {
        self.holders > 0
    }
}

/// One dialog's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Modal {
    pub id: String,
    pub element: ElementId,
    pub is_open: bool,
}

#[derive(Debug)]
struct Trigger {
    selector: Selector,
    attribute: String,
}

#[derive(Debug)]
pub struct ModalController {
    modals: Vec<Modal>,
    triggers: Vec<Trigger>,
    closes: Vec<Selector>,
    overlay_closes: Vec<Selector>,
    escape_closes_all: bool,
    lock: ScrollLock,
}

impl ModalController {
    /// Discover every `.modal` in the document, all closed.
    pub fn discover(doc: &Document) -> Result<Self, SelectorError> {
        let modal_selector = Selector::parse(".modal")?;
        let modals = doc
            .query_all(doc.root(), &modal_selector)
            .into_iter()
            .map(|element| Modal {
                id: doc.element(element).id().unwrap_or_default().to_string(),
                element,
                is_open: false,
            })
            .collect();
        Ok(Self {
            modals,
            triggers: Vec::new(),
            closes: Vec::new(),
            overlay_closes: Vec::new(),
            escape_closes_all: false,
            lock: ScrollLock::default(),
        })
    }

    /// Clicks on `selector` open `modal-<attribute value>`.
    pub fn register_trigger(&mut self, selector: &str, attribute: &str) -> Result<(), SelectorError> {
        self.triggers.push(Trigger {
            selector: Selector::parse(selector)?,
            attribute: attribute.to_string(),
        });
        Ok(())
    }

    /// Clicks on `selector` close the enclosing modal.
    pub fn register_close(&mut self, selector: &str) -> Result<(), SelectorError> {
        self.closes.push(Selector::parse(selector)?);
        Ok(())
    }

    /// Clicks on the backdrop `selector` close the enclosing modal.
    pub fn register_overlay_close(&mut self, selector: &str) -> Result<(), SelectorError> {
        self.overlay_closes.push(Selector::parse(selector)?);
        Ok(())
    }

    /// Escape closes every open modal.
    pub fn register_escape_close_all(&mut self) {
        self.escape_closes_all = true;
    }

    pub fn modals(&self) -> &[Modal] {
        &self.modals
    }

    pub fn open_count(&self) -> usize {
        self.modals.iter().filter(|m| m.is_open).count()
    }

    pub fn is_open(&self, id: &str) -> bool {
        self.modals.iter().any(|m| m.id == id && m.is_open)
    }

    pub fn scroll_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn handle_click(&mut self, doc: &mut Document, target: ElementId) -> EventOutcome {
        let mut outcome = EventOutcome::default();

        let opens: Vec<Option<String>> = self
            .triggers
            .iter()
            .filter_map(|t| {
                doc.closest(target, &t.selector)
                    .map(|button| doc.attribute(button, &t.attribute).map(str::to_string))
            })
            .collect();
        for value in opens {
            outcome.merge(EventOutcome::prevented());
            let Some(value) = value else {
                continue;
            };
            if let Some(element) = doc.get_element_by_id(&format!("modal-{value}")) {
                self.open(doc, element);
            }
        }

        let closers: Vec<ElementId> = self
            .closes
            .iter()
            .chain(&self.overlay_closes)
            .filter_map(|s| doc.closest(target, s))
            .collect();
        for closer in closers {
            outcome.merge(EventOutcome::handled());
            if let Some(modal) = self.enclosing(doc, closer) {
                self.close(doc, modal);
            }
        }

        outcome
    }

    pub fn handle_key(&mut self, doc: &mut Document, key: &str) -> EventOutcome {
        if self.escape_closes_all && key == "Escape" {
            self.close_all(doc);
            return EventOutcome::handled();
        }
        EventOutcome::default()
    }

    /// Open a modal element. Opening an open modal changes nothing.
    pub fn open(&mut self, doc: &mut Document, element: ElementId) {
        let index = self.index_of(doc, element);
        let modal = &mut self.modals[index];
        if modal.is_open {
            return;
        }
        modal.is_open = true;
        doc.add_class(element, ACTIVE_CLASS);
        self.lock.acquire(doc);
        debug!(modal = %self.modals[index].id, "modal opened");
    }

    /// Close a modal element. Closing a closed modal changes nothing.
    pub fn close(&mut self, doc: &mut Document, element: ElementId) {
        let Some(modal) = self.modals.iter_mut().find(|m| m.element == element) else {
            return;
        };
        if !modal.is_open {
            return;
        }
        modal.is_open = false;
        doc.remove_class(element, ACTIVE_CLASS);
        self.lock.release(doc);
        debug!(modal = %modal.id, "modal closed");
    }

    pub fn close_all(&mut self, doc: &mut Document) {
        let open: Vec<ElementId> = self
            .modals
            .iter()
            .filter(|m| m.is_open)
            .map(|m| m.element)
            .collect();
        for element in open {
            self.close(doc, element);
        }
    }

    /// The registered modal containing `element`, lazily registered ones
    /// included.
    fn enclosing(&self, doc: &Document, element: ElementId) -> Option<ElementId> {
        let mut current = Some(element);
        while let Some(node) = current {
            if self.modals.iter().any(|m| m.element == node) {
                return Some(node);
            }
            current = doc.element(node).parent();
        }
        None
    }

    /// Index of the record for `element`, registering it if the element was
    /// not under `.modal` at discovery.
    fn index_of(&mut self, doc: &Document, element: ElementId) -> usize {
        if let Some(index) = self.modals.iter().position(|m| m.element == element) {
            return index;
        }
        self.modals.push(Modal {
            id: doc.element(element).id().unwrap_or_default().to_string(),
            element,
            is_open: false,
        });
        self.modals.len() - 1
    }
}
