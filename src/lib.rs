//! # tuuli-site
//!
//! The page behavior layer of the tuuli.cz marketing site, run headless.
//! Marketing pages carry a handful of interactive widgets: sections that fade
//! in on scroll, product modals, image galleries, rotating slideshows, a
//! mobile-only spotlight on the card in the middle of the screen, a QR code
//! for sharing the page, and a cookie banner gating analytics. This crate
//! binds those widgets to a document and drives them from events and a
//! virtual clock, so their behavior can be exercised without a browser.
//!
//! # Architecture: Bootstrap, Then Dispatch
//!
//! ```text
//! PageSpec (JSON)  →  Document  →  Bootstrapper  →  Page
//!                                    (7 widget groups, fixed order)
//! Page ← Event { click, key, scroll, resize }
//! Page ← advance(duration)   (runs due timers on the Scheduler)
//! ```
//!
//! The [`page::Page`] owns the [`dom::Document`], the [`runtime::Scheduler`]
//! and every widget. Widgets never hold references to each other or to the
//! page; each handler gets `&mut Document` (and `&mut Scheduler` where it
//! arms timers) for the duration of the call.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`dom`] | Arena document: elements, classes, inline styles, layout boxes, selectors, JSON page specs, HTML rendering |
//! | [`runtime`] | Events, event outcomes, and the virtual-clock task scheduler |
//! | [`visibility`] | Viewport intersection tracking: reveal-on-scroll and class toggling |
//! | [`modal`] | Product modals with reference-counted scroll lock |
//! | [`carousel`] | Gallery carousels with dots and prev/next |
//! | [`slideshow`] | Timed image rotation, synchronized or jittered |
//! | [`qr`] | QR share overlay and the renderer behind it |
//! | [`consent`] | Cookie banner state machine gating analytics |
//! | [`analytics`] | PostHog loader injection |
//! | [`storage`] | Key-value persistence for the consent decision |
//! | [`page`] | Bootstrapper, widget registry, event routing, lifecycle |
//! | [`scenario`] | Scripted TOML sessions replayed against a page |
//! | [`mailer`] | Rate-limited transactional email through Resend |
//! | [`config`] | `config.toml` loading, validation, and stock defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Independent Widget Groups
//!
//! Each group is discovered by its own selector and bound on its own. A page
//! without galleries, or a host without intersection observation, yields an
//! empty group in the registry; the remaining groups bind as usual. A failure
//! in one group is logged, never propagated.
//!
//! ## Collaborators Behind Traits
//!
//! Storage ([`storage::KeyValueStore`]), analytics
//! ([`analytics::AnalyticsActivator`]), QR rendering ([`qr::QrRenderer`]) and
//! email delivery ([`mailer::EmailTransport`]) are traits, so tests swap in
//! recording doubles and the CLI wires up the real ones.
//!
//! ## Virtual Time
//!
//! Timers (banner fade-out, slideshow rotation) live on a
//! [`runtime::Scheduler`] that only moves when the caller advances it. The
//! same scenario always produces the same page, given a fixed RNG seed for
//! jittered slideshows.

pub mod analytics;
pub mod carousel;
pub mod config;
pub mod consent;
pub mod dom;
pub mod mailer;
pub mod modal;
pub mod output;
pub mod page;
pub mod qr;
pub mod runtime;
pub mod scenario;
pub mod slideshow;
pub mod storage;
pub mod visibility;

#[cfg(test)]
pub(crate) mod test_helpers;
