//! Site configuration
//!
//! Everything the banner needs from the surrounding site, in one place.
//! Loaded from TOML at startup (or built in code by an embedding host),
//! sanitized once, read-only for the page lifetime.

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::types::{OverlayMode, TrackingMode};

pub const DEFAULT_COOKIE_NAME: &str = "cmp410gone_consent";
pub const LEGACY_COOKIE_NAME: &str = "cmp_consent";

pub const MAX_WAIT_FOR_UPDATE_MS: i64 = 5_000;
pub const MIN_RETENTION_DAYS: i64 = 1;
pub const MAX_RETENTION_DAYS: i64 = 3_650;

/// Top-level site configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Master switch. When off, only the default-deny command is announced:
    /// no banner, no stored consent applied, no scripts loaded.
    pub enabled: bool,
    /// Verbose decision logging.
    pub debug: bool,
    /// Tag manager / analytics setup.
    pub tracking: TrackingConfig,
    /// Retargeting pixel identifiers.
    pub pixels: PixelConfig,
    /// Consent cookie naming and retention.
    pub cookie: CookieConfig,
    /// Banner behaviour.
    pub banner: BannerConfig,
    /// Gate predicate overrides; unset fields follow the tracking mode.
    pub gate: GateOverrides,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    #[serde(deserialize_with = "lenient")]
    pub mode: TrackingMode,
    /// Tag-manager container id (GTM-XXXX). Empty disables.
    pub container_id: String,
    /// Analytics measurement id (G-XXXX). Empty disables.
    pub measurement_id: String,
    /// Handed to the default-deny command as `wait_for_update`.
    pub wait_for_update_ms: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PixelConfig {
    pub meta_pixel_id: String,
    pub linkedin_partner_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    /// Read-only fallback written by older versions.
    pub legacy_name: String,
    pub retention_days: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BannerConfig {
    /// Show the banner on every page load, ignoring stored consent.
    pub force_show: bool,
    /// Handed through to the markup layer, which decides when the overlay
    /// starts blocking clicks. The state machine itself does not read it.
    #[serde(deserialize_with = "lenient")]
    pub overlay_mode: OverlayMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GateOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag_manager: Option<TagManagerRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics_tag: Option<AnalyticsRule>,
}

/// When the tag-manager container may be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagManagerRule {
    Never,
    OnConsentRead,
    OnAnalyticsGranted,
}

/// When the analytics tag may be injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalyticsRule {
    Never,
    OnAnalyticsGranted,
}

/// Effective gating predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatePolicy {
    pub tag_manager: TagManagerRule,
    pub analytics_tag: AnalyticsRule,
}

impl GatePolicy {
    pub fn for_mode(mode: TrackingMode) -> Self {
        match mode {
            TrackingMode::AllInclusive => Self {
                tag_manager: TagManagerRule::OnAnalyticsGranted,
                analytics_tag: AnalyticsRule::OnAnalyticsGranted,
            },
            // The host enqueues the container itself in this mode.
            TrackingMode::Gtm => Self {
                tag_manager: TagManagerRule::Never,
                analytics_tag: AnalyticsRule::Never,
            },
            TrackingMode::Hybrid => Self {
                tag_manager: TagManagerRule::OnConsentRead,
                analytics_tag: AnalyticsRule::Never,
            },
        }
    }
}

// ============================================================
// Defaults
// ============================================================

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            tracking: TrackingConfig::default(),
            pixels: PixelConfig::default(),
            cookie: CookieConfig::default(),
            banner: BannerConfig::default(),
            gate: GateOverrides::default(),
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::Hybrid,
            container_id: String::new(),
            measurement_id: String::new(),
            wait_for_update_ms: 500,
        }
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.into(),
            legacy_name: LEGACY_COOKIE_NAME.into(),
            retention_days: 180,
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl SiteConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match Self::from_file(path) {
            Ok(config) => {
                tracing::info!("Loaded site config from {}", path.display());
                config
            }
            Err(Error::IoError(_)) => {
                tracing::info!("No site config at {}, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                Self::default()
            }
        }
    }

    /// Strict variant of [`SiteConfig::load`].
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content)?;
        Ok(config.sanitize())
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Normalize identifiers and clamp numeric ranges.
    pub fn sanitize(mut self) -> Self {
        self.tracking.container_id = sanitize_id(&self.tracking.container_id, r"^GTM-[A-Z0-9]+$");
        self.tracking.measurement_id = sanitize_id(&self.tracking.measurement_id, r"^G-[A-Z0-9]+$");
        self.tracking.wait_for_update_ms = self.tracking.wait_for_update_ms.clamp(0, MAX_WAIT_FOR_UPDATE_MS);

        self.pixels.meta_pixel_id = sanitize_id(&self.pixels.meta_pixel_id, r"^[0-9]+$");
        self.pixels.linkedin_partner_id = sanitize_id(&self.pixels.linkedin_partner_id, r"^[0-9]+$");

        self.cookie.retention_days = self.cookie.retention_days.clamp(MIN_RETENTION_DAYS, MAX_RETENTION_DAYS);
        if self.cookie.name.trim().is_empty() {
            self.cookie.name = DEFAULT_COOKIE_NAME.into();
        }
        if self.cookie.legacy_name.trim().is_empty() {
            self.cookie.legacy_name = LEGACY_COOKIE_NAME.into();
        }
        self
    }

    pub fn wait_for_update_ms(&self) -> u32 {
        self.tracking.wait_for_update_ms.clamp(0, MAX_WAIT_FOR_UPDATE_MS) as u32
    }

    pub fn retention_days(&self) -> u32 {
        self.cookie.retention_days.clamp(MIN_RETENTION_DAYS, MAX_RETENTION_DAYS) as u32
    }

    pub fn container_id(&self) -> Option<&str> {
        non_empty(&self.tracking.container_id)
    }

    pub fn measurement_id(&self) -> Option<&str> {
        non_empty(&self.tracking.measurement_id)
    }

    pub fn meta_pixel_id(&self) -> Option<&str> {
        non_empty(&self.pixels.meta_pixel_id)
    }

    pub fn linkedin_partner_id(&self) -> Option<&str> {
        non_empty(&self.pixels.linkedin_partner_id)
    }

    /// Gating predicates for the configured mode with `[gate]` overrides applied.
    pub fn gate_policy(&self) -> GatePolicy {
        let base = GatePolicy::for_mode(self.tracking.mode);
        GatePolicy {
            tag_manager: self.gate.tag_manager.unwrap_or(base.tag_manager),
            analytics_tag: self.gate.analytics_tag.unwrap_or(base.analytics_tag),
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn sanitize_id(raw: &str, pattern: &str) -> String {
    let id = raw.trim().to_uppercase();
    if id.is_empty() {
        return id;
    }
    if Regex::new(pattern).map(|re| re.is_match(&id)).unwrap_or(false) {
        id
    } else {
        tracing::warn!("Dropping malformed identifier {:?}", raw);
        String::new()
    }
}

/// Unknown enum strings fall back to the default instead of failing the load.
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr + Default,
    T::Err: std::fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_else(|e| {
        tracing::warn!("{}, using default", e);
        T::default()
    }))
}
