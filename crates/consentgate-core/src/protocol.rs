//! Host page protocol: command queue entries and script injections
//!
//! Queue format (an array on the host page, consumed by the tag manager):
//!
//! Command tuple (what the command function pushes):
//!   ["consent", "default", { "analytics_storage": "denied", ..., "wait_for_update": 500 }]
//!   ["consent", "update",  { "analytics_storage": "granted", ... }]
//!   ["config", "G-XXXX"]
//!
//! Event object (plain push):
//!   { "event": "cmp_consent_update", "cmp_analytics": true, "cmp_retargeting": false }
//!   { "event": "gtm.js", "gtm.start": 1700000000000 }

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::types::{Category, ConsentRecord, Signal};

pub const CONSENT_UPDATE_EVENT: &str = "cmp_consent_update";
pub const PAGE_VIEW_EVENT: &str = "cmp_page_view";
pub const ANALYTICS_READY_EVENT: &str = "ga4_after_consent";
pub const TAG_MANAGER_START_EVENT: &str = "gtm.js";

/// One entry on the host command queue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueueEntry {
    Command(Vec<Value>),
    Event(Map<String, Value>),
}

impl QueueEntry {
    pub fn command(args: impl IntoIterator<Item = Value>) -> Self {
        Self::Command(args.into_iter().collect())
    }

    /// Event object. Non-object `fields` are ignored.
    pub fn event(name: &str, fields: Value) -> Self {
        let mut map = Map::new();
        map.insert("event".into(), Value::String(name.into()));
        if let Value::Object(extra) = fields {
            map.extend(extra);
        }
        Self::Event(map)
    }

    /// Deny-by-default announcement for all four categories.
    pub fn consent_default(wait_for_update_ms: u32) -> Self {
        let mut params: Map<String, Value> = Category::ALL
            .iter()
            .map(|c| (c.key().to_string(), Value::from(Signal::Denied.as_str())))
            .collect();
        params.insert("wait_for_update".into(), Value::from(wait_for_update_ms));
        Self::command([json!("consent"), json!("default"), Value::Object(params)])
    }

    pub fn consent_update(record: &ConsentRecord) -> Self {
        Self::command([json!("consent"), json!("update"), Value::Object(record.signals())])
    }

    /// Structured event mirroring the two coarse choices.
    pub fn consent_event(record: &ConsentRecord) -> Self {
        Self::event(
            CONSENT_UPDATE_EVENT,
            json!({
                "cmp_analytics": record.analytics_granted(),
                "cmp_retargeting": record.ads_granted(),
            }),
        )
    }

    /// True for `[name, sub, ...]` command tuples.
    pub fn is_command(&self, name: &str, sub: Option<&str>) -> bool {
        match self {
            Self::Command(args) => {
                args.first().and_then(Value::as_str) == Some(name)
                    && sub.map_or(true, |s| args.get(1).and_then(Value::as_str) == Some(s))
            }
            Self::Event(_) => false,
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        match self {
            Self::Event(map) => map.get("event").and_then(Value::as_str),
            Self::Command(_) => None,
        }
    }
}

/// A script the core asked the host page to inject.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScriptTag {
    /// Integration that requested the injection.
    pub integration: String,
    pub src: String,
    /// Page marker (global name or element id) that proves the script is present.
    pub marker: String,
    /// Calls made against the integration's own queue once injected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<Vec<Value>>,
}

impl ScriptTag {
    pub fn new(integration: impl Into<String>, src: impl Into<String>, marker: impl Into<String>) -> Self {
        Self {
            integration: integration.into(),
            src: src.into(),
            marker: marker.into(),
            calls: Vec::new(),
        }
    }

    pub fn with_call(mut self, args: impl IntoIterator<Item = Value>) -> Self {
        self.calls.push(args.into_iter().collect());
        self
    }
}
