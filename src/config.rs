//! Site behavior configuration.
//!
//! Handles loading, validating, and merging `config.toml`. Stock defaults
//! reproduce the live site's behavior; a user `config.toml` overrides only
//! the keys it names.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [consent]
//! storage_key = "tuuli_cookie_consent"
//! fade_out_ms = 400          # Banner fade-out before removal
//!
//! [analytics]
//! project_key = ""           # Empty: consent is stored, analytics never load
//! api_host = "https://eu.i.posthog.com"
//! defaults = "2026-01-30"
//!
//! [reveal]
//! threshold = 0.1            # Visible fraction that triggers the reveal
//! root_margin = "0px"
//! offset_px = 30             # Initial downward offset
//! duration_ms = 800          # Opacity/transform transition
//!
//! [spotlight]
//! root_margin = "-40% 0px -40% 0px"
//! max_viewport_width = 768   # Only on viewports this wide or narrower
//! class = "in-view"
//!
//! [slideshow]
//! policy = "synchronized"    # or "jittered"
//! interval_ms = 4000
//! jitter_min_ms = 3000
//! jitter_max_ms = 5000
//!
//! [modal]
//! close_on_escape = true
//!
//! [qr]
//! size = 200
//! error_correction = "H"
//!
//! [email]
//! from = "Linda z Tuuli <linda@tuuli.cz>"
//! delay_ms = 600
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::qr::ErrorCorrection;
use crate::visibility::RootMargin;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Cookie consent banner and persisted decision.
    pub consent: ConsentConfig,
    /// Analytics activation parameters.
    pub analytics: AnalyticsConfig,
    /// One-shot reveal animation of `.product-content`.
    pub reveal: RevealConfig,
    /// Mobile in-view highlighting of `.project` cards.
    pub spotlight: SpotlightConfig,
    /// Auto-advancing slideshows.
    pub slideshow: SlideshowConfig,
    /// Product modals.
    pub modal: ModalConfig,
    /// QR share modal.
    pub qr: QrConfig,
    /// Transactional email.
    pub email: EmailConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consent.storage_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "consent.storage_key must not be empty".into(),
            ));
        }
        if self.consent.fade_out_ms == 0 {
            return Err(ConfigError::Validation(
                "consent.fade_out_ms must be greater than 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reveal.threshold) {
            return Err(ConfigError::Validation(
                "reveal.threshold must be between 0 and 1".into(),
            ));
        }
        for (key, margin) in [
            ("reveal.root_margin", &self.reveal.root_margin),
            ("spotlight.root_margin", &self.spotlight.root_margin),
        ] {
            RootMargin::parse(margin)
                .map_err(|e| ConfigError::Validation(format!("{key}: {e}")))?;
        }
        if self.spotlight.class.trim().is_empty() {
            return Err(ConfigError::Validation(
                "spotlight.class must not be empty".into(),
            ));
        }
        if self.slideshow.interval_ms == 0 {
            return Err(ConfigError::Validation(
                "slideshow.interval_ms must be greater than 0".into(),
            ));
        }
        if self.slideshow.jitter_min_ms == 0
            || self.slideshow.jitter_min_ms >= self.slideshow.jitter_max_ms
        {
            return Err(ConfigError::Validation(
                "slideshow.jitter_min_ms must be non-zero and below jitter_max_ms".into(),
            ));
        }
        if self.qr.size == 0 {
            return Err(ConfigError::Validation(
                "qr.size must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Cookie consent settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsentConfig {
    /// Key of the persisted decision in the origin's storage.
    pub storage_key: String,
    /// Fade-out duration before the banner is detached.
    pub fade_out_ms: u64,
    /// Banner text.
    pub message: String,
    pub accept_label: String,
    pub decline_label: String,
}

impl Default for ConsentConfig {
    fn default() -> Self {
        Self {
            storage_key: "tuuli_cookie_consent".to_string(),
            fade_out_ms: 400,
            message: "Tento web používá cookies pro analýzu návštěvnosti. \
                      Data zpracováváme anonymně pomocí PostHog."
                .to_string(),
            accept_label: "Přijmout".to_string(),
            decline_label: "Odmítnout".to_string(),
        }
    }
}

/// Analytics activation parameters, passed verbatim to the activator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Project key. Empty means analytics cannot be activated.
    pub project_key: String,
    /// Ingestion host.
    pub api_host: String,
    /// Default capture behavior version.
    pub defaults: String,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            project_key: String::new(),
            api_host: "https://eu.i.posthog.com".to_string(),
            defaults: "2026-01-30".to_string(),
        }
    }
}

/// Reveal animation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RevealConfig {
    /// Visible fraction (0-1) that triggers the reveal.
    pub threshold: f64,
    /// Margin around the viewport, CSS shorthand.
    pub root_margin: String,
    /// Initial downward offset in pixels.
    pub offset_px: u32,
    /// Transition duration.
    pub duration_ms: u64,
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            root_margin: "0px".to_string(),
            offset_px: 30,
            duration_ms: 800,
        }
    }
}

/// Mobile in-view highlighting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpotlightConfig {
    /// Viewport band, CSS shorthand. The default keeps the middle 20%.
    pub root_margin: String,
    /// Widest viewport (px) the highlighting runs on.
    pub max_viewport_width: u32,
    /// Class applied while a card is inside the band.
    pub class: String,
}

impl Default for SpotlightConfig {
    fn default() -> Self {
        Self {
            root_margin: "-40% 0px -40% 0px".to_string(),
            max_viewport_width: 768,
            class: "in-view".to_string(),
        }
    }
}

/// Which timer layout drives the slideshows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlideshowPolicyKind {
    /// One shared timer advances every slideshow together.
    #[default]
    Synchronized,
    /// Each slideshow gets its own randomized interval.
    Jittered,
}

/// Slideshow timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlideshowConfig {
    pub policy: SlideshowPolicyKind,
    /// Shared interval for the synchronized policy.
    pub interval_ms: u64,
    /// Lower bound (inclusive) of the jittered interval.
    pub jitter_min_ms: u64,
    /// Upper bound (exclusive) of the jittered interval.
    pub jitter_max_ms: u64,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            policy: SlideshowPolicyKind::Synchronized,
            interval_ms: 4000,
            jitter_min_ms: 3000,
            jitter_max_ms: 5000,
        }
    }
}

/// Product modal behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModalConfig {
    /// Escape closes every open modal.
    pub close_on_escape: bool,
}

impl Default for ModalConfig {
    fn default() -> Self {
        Self {
            close_on_escape: true,
        }
    }
}

/// QR share modal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QrConfig {
    /// Rendered width and height in pixels.
    pub size: u32,
    pub error_correction: ErrorCorrection,
    pub dark_color: String,
    pub light_color: String,
    pub title: String,
    pub subtitle: String,
    pub close_label: String,
    pub trigger_label: String,
    /// Shown in place of the code when no renderer is available.
    pub fallback_text: String,
}

impl Default for QrConfig {
    fn default() -> Self {
        Self {
            size: 200,
            error_correction: ErrorCorrection::H,
            dark_color: "#000000".to_string(),
            light_color: "#ffffff".to_string(),
            title: "Sdílet projekt".to_string(),
            subtitle: "Naskenujte QR kód pro otevření stránky".to_string(),
            close_label: "Zavřít".to_string(),
            trigger_label: "Zobrazit QR kód".to_string(),
            fallback_text: "QR Library not loaded".to_string(),
        }
    }
}

/// Transactional email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailConfig {
    /// Sender shown to recipients.
    pub from: String,
    /// Send endpoint of the provider.
    pub api_url: String,
    /// Pause after every send attempt (provider allows 2 requests/s).
    pub delay_ms: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            from: "Linda z Tuuli <linda@tuuli.cz>".to_string(),
            api_url: "https://api.resend.com/emails".to_string(),
            delay_ms: 600,
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key by key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the directory has no `config.toml`.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given directory, on top of the
/// stock defaults.
pub fn load_config(dir: &Path) -> Result<SiteConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(dir)?)
}

/// Returns a fully-commented stock `config.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# tuuli-site Configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Cookie consent
# ---------------------------------------------------------------------------
[consent]
# Key of the persisted decision ("accepted" or "declined").
storage_key = "tuuli_cookie_consent"

# Banner fade-out before it is removed from the page.
fade_out_ms = 400

# Accepting only loads analytics once [analytics] project_key is set.

message = "Tento web používá cookies pro analýzu návštěvnosti. Data zpracováváme anonymně pomocí PostHog."
accept_label = "Přijmout"
decline_label = "Odmítnout"

# ---------------------------------------------------------------------------
# Analytics (loaded only after consent)
# ---------------------------------------------------------------------------
[analytics]
# PostHog project key. The stock value is empty: visitors can still accept
# cookies and the decision is stored, but no analytics script is loaded.
# Set your project's key here to enable analytics after consent.
project_key = ""
api_host = "https://eu.i.posthog.com"
defaults = "2026-01-30"

# ---------------------------------------------------------------------------
# Reveal animation for .product-content
# ---------------------------------------------------------------------------
[reveal]
# Visible fraction (0-1) that triggers the one-time reveal.
threshold = 0.1
root_margin = "0px"
# Initial downward offset and transition duration.
offset_px = 30
duration_ms = 800

# ---------------------------------------------------------------------------
# Mobile in-view highlighting for .project cards
# ---------------------------------------------------------------------------
[spotlight]
# Band inside the viewport; the default keeps the middle 20%.
root_margin = "-40% 0px -40% 0px"
# Only on viewports this wide or narrower.
max_viewport_width = 768
class = "in-view"

# ---------------------------------------------------------------------------
# Slideshows (.project-image.slideshow > img)
# ---------------------------------------------------------------------------
[slideshow]
# "synchronized": one timer advances every slideshow together.
# "jittered": each slideshow picks its own interval in [jitter_min_ms, jitter_max_ms).
policy = "synchronized"
interval_ms = 4000
jitter_min_ms = 3000
jitter_max_ms = 5000

# ---------------------------------------------------------------------------
# Product modals
# ---------------------------------------------------------------------------
[modal]
# Escape closes every open modal at once.
close_on_escape = true

# ---------------------------------------------------------------------------
# QR share modal
# ---------------------------------------------------------------------------
[qr]
size = 200
# Error correction level: L, M, Q or H.
error_correction = "H"
dark_color = "#000000"
light_color = "#ffffff"
title = "Sdílet projekt"
subtitle = "Naskenujte QR kód pro otevření stránky"
close_label = "Zavřít"
trigger_label = "Zobrazit QR kód"
fallback_text = "QR Library not loaded"

# ---------------------------------------------------------------------------
# Transactional email
# ---------------------------------------------------------------------------
[email]
from = "Linda z Tuuli <linda@tuuli.cz>"
api_url = "https://api.resend.com/emails"
# Pause after every send; the provider allows 2 requests per second.
delay_ms = 600
"##
}
