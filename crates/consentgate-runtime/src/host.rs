//! Host page capability for script injection

use consentgate_core::ScriptTag;
use std::collections::{HashMap, HashSet};

/// The parts of the page the loaders touch.
pub trait HostPage {
    /// Whether a global or element proving an integration is present exists.
    fn has_marker(&self, marker: &str) -> bool;

    /// Insert a script tag; its marker becomes present.
    fn inject(&mut self, script: ScriptTag);

    /// Append `value` to the named global list unless already there.
    /// Returns true if it was appended.
    fn push_unique(&mut self, list: &str, value: &str) -> bool;
}

/// Page that records injections instead of touching a DOM.
#[derive(Clone, Debug, Default)]
pub struct RecordingPage {
    scripts: Vec<ScriptTag>,
    markers: HashSet<String>,
    lists: HashMap<String, Vec<String>>,
}

impl RecordingPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page where something else already defined `marker`.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.insert(marker.into());
        self
    }

    pub fn scripts(&self) -> &[ScriptTag] {
        &self.scripts
    }

    /// How many scripts were injected for one integration.
    pub fn injections(&self, integration: &str) -> usize {
        self.scripts
            .iter()
            .filter(|s| s.integration == integration)
            .count()
    }

    pub fn list(&self, name: &str) -> &[String] {
        self.lists.get(name).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl HostPage for RecordingPage {
    fn has_marker(&self, marker: &str) -> bool {
        self.markers.contains(marker)
    }

    fn inject(&mut self, script: ScriptTag) {
        self.markers.insert(script.marker.clone());
        self.scripts.push(script);
    }

    fn push_unique(&mut self, list: &str, value: &str) -> bool {
        let entries = self.lists.entry(list.to_string()).or_default();
        if entries.iter().any(|v| v == value) {
            return false;
        }
        entries.push(value.to_string());
        true
    }
}
