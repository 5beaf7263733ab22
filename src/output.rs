//! CLI output formatting for page simulations.
//!
//! # Output Format
//!
//! ## Registry
//!
//! ```text
//! Widgets
//! 001 reveal (.product-content): 2
//! 002 modal (.modal): 2
//! 003 carousel (.portfolio-item): 1
//! ...
//! ```
//!
//! ## Steps
//!
//! ```text
//! Steps
//! 001 click .product-btn [0] → 1 handler, default prevented
//! 002 advance 4000ms → 1 task
//! ```
//!
//! ## State
//!
//! ```text
//! State at 4.000s
//!     Reveal: 1 of 2 revealed
//!     Modals: 1 open (modal-aura), scroll locked
//!     Carousels
//!         001 slide 2/3
//!     Slideshows (synchronized every 4000ms, 1 running)
//!         001 image 2/3
//!     Spotlight: 0 in view
//!     QR share: closed
//!     Consent: accepted, analytics active
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::consent::ConsentState;
use crate::mailer::SendResult;
use crate::page::{Page, WidgetKind, WidgetRegistryEntry};
use crate::scenario::{StepRecord, StepResult};
use crate::slideshow::SlideshowPolicy;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

fn consent_label(state: ConsentState) -> &'static str {
    match state {
        ConsentState::NoDecision => "no decision",
        ConsentState::BannerShown => "banner shown",
        ConsentState::Accepted => "accepted",
        ConsentState::Declined => "declined",
    }
}

fn describe_result(result: &StepResult) -> String {
    match result {
        StepResult::Dispatched(outcome) if outcome.default_prevented => {
            format!("{}, default prevented", plural(outcome.handled, "handler"))
        }
        StepResult::Dispatched(outcome) => plural(outcome.handled, "handler"),
        StepResult::Advanced { tasks } => plural(*tasks, "task"),
        StepResult::Bootstrapped => "bootstrapped".to_string(),
        StepResult::Skipped(reason) => format!("skipped ({reason})"),
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Format the widget registry in bootstrap order.
pub fn format_registry(registry: &[WidgetRegistryEntry]) -> Vec<String> {
    let mut lines = vec!["Widgets".to_string()];
    for (i, entry) in registry.iter().enumerate() {
        lines.push(format!(
            "{} {} ({}): {}",
            format_index(i + 1),
            entry.kind,
            entry.selector,
            entry.instances
        ));
    }
    lines
}

pub fn print_registry(registry: &[WidgetRegistryEntry]) {
    for line in format_registry(registry) {
        println!("{}", line);
    }
}

// ============================================================================
// Scenario steps
// ============================================================================

pub fn format_steps(records: &[StepRecord]) -> Vec<String> {
    if records.is_empty() {
        return Vec::new();
    }
    let mut lines = vec!["Steps".to_string()];
    for (i, record) in records.iter().enumerate() {
        lines.push(format!(
            "{} {} \u{2192} {}",
            format_index(i + 1),
            record.step,
            describe_result(&record.result)
        ));
    }
    lines
}

pub fn print_steps(records: &[StepRecord]) {
    for line in format_steps(records) {
        println!("{}", line);
    }
}

// ============================================================================
// Widget state
// ============================================================================

/// Format the current state of every widget on the page.
pub fn format_page_state(page: &Page) -> Vec<String> {
    let now = page.now();
    let mut lines = vec![format!("State at {}.{:03}s", now.as_secs(), now.subsec_millis())];

    let reveal_total = page.entry(WidgetKind::Reveal).map_or(0, |e| e.instances);
    match page.reveal() {
        Some(reveal) => lines.push(format!(
            "{}Reveal: {} of {} revealed",
            indent(1),
            reveal_total.saturating_sub(reveal.observed_count()),
            reveal_total
        )),
        None => lines.push(format!("{}Reveal: inactive", indent(1))),
    }

    if let Some(modals) = page.modals() {
        let open: Vec<&str> = modals
            .modals()
            .iter()
            .filter(|m| m.is_open)
            .map(|m| m.id.as_str())
            .collect();
        let mut line = format!("{}Modals: {} open", indent(1), open.len());
        if !open.is_empty() {
            line.push_str(&format!(" ({})", open.join(", ")));
        }
        if modals.scroll_locked() {
            line.push_str(", scroll locked");
        }
        lines.push(line);
    }

    if let Some(carousels) = page.carousels().filter(|c| !c.carousels().is_empty()) {
        lines.push(format!("{}Carousels", indent(1)));
        for (i, carousel) in carousels.carousels().iter().enumerate() {
            lines.push(format!(
                "{}{} slide {}/{}",
                indent(2),
                format_index(i + 1),
                carousel.current_index() + 1,
                carousel.slide_count()
            ));
        }
    }

    if let Some(slideshows) = page.slideshows().filter(|s| !s.slideshows().is_empty()) {
        let policy = match slideshows.policy() {
            SlideshowPolicy::Synchronized { interval } => {
                format!("synchronized every {}ms", interval.as_millis())
            }
            SlideshowPolicy::Jittered { min, max } => {
                format!("jittered {}-{}ms", min.as_millis(), max.as_millis())
            }
        };
        lines.push(format!(
            "{}Slideshows ({}, {} running)",
            indent(1),
            policy,
            slideshows.running_tasks(page.scheduler())
        ));
        for (i, show) in slideshows.slideshows().iter().enumerate() {
            lines.push(format!(
                "{}{} image {}/{}",
                indent(2),
                format_index(i + 1),
                show.current_index() + 1,
                show.images().len()
            ));
        }
    }

    if page.spotlight().is_some() {
        let class = &page.config().spotlight.class;
        let in_view = page
            .select_all(&format!(".{class}"))
            .map_or(0, |found| found.len());
        lines.push(format!("{}Spotlight: {} in view", indent(1), in_view));
    }

    if let Some(qr) = page.qr_share() {
        let state = if qr.is_open(page.document()) { "open" } else { "closed" };
        lines.push(format!("{}QR share: {}", indent(1), state));
    }

    if let Some(consent) = page.consent() {
        let mut line = format!("{}Consent: {}", indent(1), consent_label(consent.state()));
        if consent.analytics_active() {
            line.push_str(", analytics active");
        }
        lines.push(line);
    }

    lines
}

pub fn print_page_state(page: &Page) {
    for line in format_page_state(page) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// One checked page: its path, then the registry indented under it.
pub fn format_check(path: &Path, page: &Page) -> Vec<String> {
    let mut lines = vec![format!("{} \u{2192} {}", path.display(), page.document().url())];
    for line in format_registry(page.registry()).into_iter().skip(1) {
        lines.push(format!("{}{}", indent(1), line));
    }
    lines
}

pub fn print_check(path: &Path, page: &Page) {
    for line in format_check(path, page) {
        println!("{}", line);
    }
}

// ============================================================================
// Email
// ============================================================================

pub fn format_send_result(to: &str, result: &SendResult) -> Vec<String> {
    match (&result.data, &result.error) {
        (Some(receipt), _) if result.success => vec![format!("Sent to {} (id {})", to, receipt.id)],
        (_, Some(error)) => vec![format!("Failed to send to {}", to), format!("{}{}", indent(1), error)],
        _ => vec![format!("Failed to send to {}", to)],
    }
}

pub fn print_send_result(to: &str, result: &SendResult) {
    for line in format_send_result(to, result) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::mailer::SendReceipt;
    use crate::page::{Bootstrapper, HostEnvironment, Services};
    use crate::runtime::EventOutcome;
    use crate::scenario::Step;
    use crate::test_helpers::{find, full_page};
    use std::time::Duration;

    fn bootstrapped() -> Page {
        Bootstrapper::bootstrap(
            full_page(),
            SiteConfig::default(),
            Services::default().with_seed(1),
            HostEnvironment::default(),
        )
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    #[test]
    fn format_index_pads() {
        assert_eq!(format_index(1), "001");
        assert_eq!(format_index(42), "042");
        assert_eq!(format_index(999), "999");
    }

    #[test]
    fn plural_forms() {
        assert_eq!(plural(1, "task"), "1 task");
        assert_eq!(plural(0, "task"), "0 tasks");
        assert_eq!(plural(3, "handler"), "3 handlers");
    }

    #[test]
    fn describe_results() {
        assert_eq!(
            describe_result(&StepResult::Dispatched(EventOutcome::prevented())),
            "1 handler, default prevented"
        );
        assert_eq!(describe_result(&StepResult::Advanced { tasks: 2 }), "2 tasks");
        assert_eq!(
            describe_result(&StepResult::Skipped("document still loading")),
            "skipped (document still loading)"
        );
    }

    // =========================================================================
    // Registry and state
    // =========================================================================

    #[test]
    fn registry_lists_groups_in_order() {
        let page = bootstrapped();
        let lines = format_registry(page.registry());
        assert_eq!(lines[0], "Widgets");
        assert_eq!(lines[1], "001 reveal (.product-content): 2");
        assert_eq!(lines[2], "002 modal (.modal): 2");
        assert_eq!(lines[3], "003 carousel (.portfolio-item): 1");
        assert_eq!(lines.len(), 8);
    }

    #[test]
    fn state_reflects_open_modal() {
        let mut page = bootstrapped();
        let trigger = find(page.document(), ".product-btn");
        page.click(trigger);
        let lines = format_page_state(&page);
        assert_eq!(lines[0], "State at 0.000s");
        assert!(lines.contains(&"    Modals: 1 open (modal-aura), scroll locked".to_string()));
        assert!(lines.contains(&"    Reveal: 1 of 2 revealed".to_string()));
        assert!(lines.contains(&"    Consent: banner shown".to_string()));
    }

    #[test]
    fn state_after_time_passes() {
        let mut page = bootstrapped();
        page.advance(Duration::from_millis(4000));
        let lines = format_page_state(&page);
        assert_eq!(lines[0], "State at 4.000s");
        assert!(lines.contains(&"    Slideshows (synchronized every 4000ms, 1 running)".to_string()));
        assert!(lines.contains(&"        001 image 2/3".to_string()));
        assert!(lines.contains(&"        002 image 2/4".to_string()));
    }

    #[test]
    fn check_indents_registry() {
        let page = bootstrapped();
        let lines = format_check(Path::new("pages/home.json"), &page);
        assert_eq!(lines[0], "pages/home.json \u{2192} https://tuuli.cz/");
        assert_eq!(lines[1], "    001 reveal (.product-content): 2");
    }

    // =========================================================================
    // Steps and email
    // =========================================================================

    #[test]
    fn steps_show_action_and_result() {
        let records = vec![
            StepRecord {
                step: Step::Click {
                    selector: ".product-btn".to_string(),
                    index: 0,
                },
                result: StepResult::Dispatched(EventOutcome::prevented()),
            },
            StepRecord {
                step: Step::Advance { ms: 4000 },
                result: StepResult::Advanced { tasks: 1 },
            },
        ];
        let lines = format_steps(&records);
        assert_eq!(lines[0], "Steps");
        assert_eq!(
            lines[1],
            "001 click .product-btn [0] \u{2192} 1 handler, default prevented"
        );
        assert_eq!(lines[2], "002 advance 4000ms \u{2192} 1 task");
    }

    #[test]
    fn no_steps_no_section() {
        assert!(format_steps(&[]).is_empty());
    }

    #[test]
    fn send_result_lines() {
        let ok = SendResult {
            success: true,
            data: Some(SendReceipt { id: "abc".into() }),
            error: None,
        };
        assert_eq!(format_send_result("a@b.cz", &ok), vec!["Sent to a@b.cz (id abc)"]);

        let failed = SendResult {
            success: false,
            data: None,
            error: Some("RESEND_API_KEY is not configured".into()),
        };
        assert_eq!(
            format_send_result("a@b.cz", &failed),
            vec![
                "Failed to send to a@b.cz".to_string(),
                "    RESEND_API_KEY is not configured".to_string()
            ]
        );
    }
}
