//! Core types for Consentgate

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Schema version written by the current store.
pub const SCHEMA_VERSION: u32 = 2;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A single consent signal as understood by the consent-signaling protocol.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Granted,
    #[default]
    Denied,
}

impl Signal {
    pub fn from_bool(granted: bool) -> Self {
        if granted {
            Signal::Granted
        } else {
            Signal::Denied
        }
    }

    /// Strict parse: only the literal protocol strings are accepted.
    pub fn from_literal(s: &str) -> Option<Self> {
        match s {
            "granted" => Some(Signal::Granted),
            "denied" => Some(Signal::Denied),
            _ => None,
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Signal::Granted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::Granted => "granted",
            Signal::Denied => "denied",
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four standardized consent categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    AnalyticsStorage,
    AdStorage,
    AdUserData,
    AdPersonalization,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::AnalyticsStorage,
        Category::AdStorage,
        Category::AdUserData,
        Category::AdPersonalization,
    ];

    /// Categories driven by the single retargeting choice.
    pub const ADS: [Category; 3] = [
        Category::AdStorage,
        Category::AdUserData,
        Category::AdPersonalization,
    ];

    /// Wire key used in stored records and consent commands.
    pub fn key(&self) -> &'static str {
        match self {
            Category::AnalyticsStorage => "analytics_storage",
            Category::AdStorage => "ad_storage",
            Category::AdUserData => "ad_user_data",
            Category::AdPersonalization => "ad_personalization",
        }
    }
}

/// Canonical consent record, as persisted and published.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsentRecord {
    pub version: u32,
    pub timestamp: i64,
    pub analytics_storage: Signal,
    pub ad_storage: Signal,
    pub ad_user_data: Signal,
    pub ad_personalization: Signal,
}

impl Default for ConsentRecord {
    fn default() -> Self {
        Self::denied()
    }
}

impl ConsentRecord {
    /// All four categories denied, stamped now.
    pub fn denied() -> Self {
        Self::from_choices(false, false)
    }

    /// All four categories granted, stamped now.
    pub fn granted() -> Self {
        Self::from_choices(true, true)
    }

    /// Build a record from the two coarse choices the UI exposes.
    pub fn from_choices(analytics: bool, retargeting: bool) -> Self {
        let ads = Signal::from_bool(retargeting);
        Self {
            version: SCHEMA_VERSION,
            timestamp: now_millis(),
            analytics_storage: Signal::from_bool(analytics),
            ad_storage: ads,
            ad_user_data: ads,
            ad_personalization: ads,
        }
    }

    pub fn get(&self, category: Category) -> Signal {
        match category {
            Category::AnalyticsStorage => self.analytics_storage,
            Category::AdStorage => self.ad_storage,
            Category::AdUserData => self.ad_user_data,
            Category::AdPersonalization => self.ad_personalization,
        }
    }

    pub fn set(&mut self, category: Category, signal: Signal) {
        match category {
            Category::AnalyticsStorage => self.analytics_storage = signal,
            Category::AdStorage => self.ad_storage = signal,
            Category::AdUserData => self.ad_user_data = signal,
            Category::AdPersonalization => self.ad_personalization = signal,
        }
    }

    pub fn analytics_granted(&self) -> bool {
        self.analytics_storage.is_granted()
    }

    /// Combined ad-category consent; `ad_storage` is the representative signal.
    pub fn ads_granted(&self) -> bool {
        self.ad_storage.is_granted()
    }

    /// Category signals as a JSON object, the payload of consent commands.
    pub fn signals(&self) -> serde_json::Map<String, serde_json::Value> {
        Category::ALL
            .iter()
            .map(|c| (c.key().to_string(), self.get(*c).as_str().into()))
            .collect()
    }

    /// Same category signals, ignoring version and timestamp.
    pub fn same_signals(&self, other: &ConsentRecord) -> bool {
        Category::ALL.iter().all(|c| self.get(*c) == other.get(*c))
    }
}

/// State of the two modal checkboxes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toggles {
    pub analytics: bool,
    pub retargeting: bool,
}

impl Default for Toggles {
    /// With nothing stored the modal opens with both boxes checked.
    fn default() -> Self {
        Self {
            analytics: true,
            retargeting: true,
        }
    }
}

impl Toggles {
    pub fn from_record(record: Option<&ConsentRecord>) -> Self {
        match record {
            Some(r) => Self {
                analytics: r.analytics_granted(),
                retargeting: r.ads_granted(),
            },
            None => Self::default(),
        }
    }

    pub fn to_record(&self) -> ConsentRecord {
        ConsentRecord::from_choices(self.analytics, self.retargeting)
    }
}

/// Who is responsible for loading the tag manager and analytics tag.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// The core loads tag manager and analytics tag after analytics consent.
    AllInclusive,
    /// The host page loads the tag manager itself; the core only signals.
    Gtm,
    /// The core loads the tag manager once consent has been read.
    #[default]
    Hybrid,
}

impl TrackingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackingMode::AllInclusive => "all_inclusive",
            TrackingMode::Gtm => "gtm",
            TrackingMode::Hybrid => "hybrid",
        }
    }
}

impl FromStr for TrackingMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all_inclusive" => Ok(TrackingMode::AllInclusive),
            "gtm" => Ok(TrackingMode::Gtm),
            "hybrid" => Ok(TrackingMode::Hybrid),
            other => Err(Error::invalid_mode("tracking", other)),
        }
    }
}

/// When the page-blocking overlay is applied.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OverlayMode {
    /// Inline CSS, before any script runs.
    #[default]
    Inline,
    /// Applied by script after bootstrap.
    Js,
}

impl FromStr for OverlayMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(OverlayMode::Inline),
            "js" => Ok(OverlayMode::Js),
            other => Err(Error::invalid_mode("overlay", other)),
        }
    }
}

/// Values of the `data-action` attribute in the banner markup.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserAction {
    Accept,
    Reject,
    Customize,
    Save,
    Close,
}

impl FromStr for UserAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accept" => Ok(UserAction::Accept),
            "reject" => Ok(UserAction::Reject),
            "customize" => Ok(UserAction::Customize),
            "save" => Ok(UserAction::Save),
            "close" => Ok(UserAction::Close),
            other => Err(Error::InvalidAction(other.to_string())),
        }
    }
}
