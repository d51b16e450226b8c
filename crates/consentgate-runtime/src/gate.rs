//! Tag loader gate
//!
//! Evaluated on every consent apply. Tag manager and analytics tag are tracked
//! by one-way flags owned by the gate; pixels rely on their loaders' own page
//! markers. Either way a script is injected at most once per page session.

use consentgate_core::{
    now_millis, AnalyticsRule, ConsentRecord, GatePolicy, QueueEntry, ScriptTag, SiteConfig,
    TagManagerRule, ANALYTICS_READY_EVENT, TAG_MANAGER_START_EVENT,
};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use crate::host::HostPage;
use crate::registry::{LoadOutcome, LoaderRegistry};
use crate::sink::SignalSink;

pub const TAG_MANAGER: &str = "tag_manager";
pub const ANALYTICS_TAG: &str = "analytics_tag";

const TAG_MANAGER_MARKER: &str = "google_tag_manager";
const ANALYTICS_MARKER: &str = "gtag-js";

/// Per-integration loaded state. Each flag only ever goes false -> true.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct LoadedFlags {
    pub tag_manager: bool,
    pub analytics_tag: bool,
}

pub struct TagLoaderGate {
    policy: GatePolicy,
    container_id: Option<String>,
    measurement_id: Option<String>,
    flags: LoadedFlags,
    loaders: LoaderRegistry,
}

impl TagLoaderGate {
    pub fn new(config: &SiteConfig) -> Self {
        Self::with_registry(config, crate::create_default_registry(config))
    }

    pub fn with_registry(config: &SiteConfig, loaders: LoaderRegistry) -> Self {
        Self {
            policy: config.gate_policy(),
            container_id: config.container_id().map(str::to_string),
            measurement_id: config.measurement_id().map(str::to_string),
            flags: LoadedFlags::default(),
            loaders,
        }
    }

    pub fn flags(&self) -> LoadedFlags {
        self.flags
    }

    pub fn policy(&self) -> GatePolicy {
        self.policy
    }

    /// Load whatever the consent now allows and has not been loaded yet.
    /// Returns the integrations injected by this call.
    pub fn evaluate(
        &mut self,
        consent: &ConsentRecord,
        sink: &mut dyn SignalSink,
        page: &mut dyn HostPage,
    ) -> Vec<String> {
        let mut loaded = Vec::new();

        if self.analytics_allowed(consent) {
            if let Some(id) = self.measurement_id.clone() {
                load_analytics_tag(&id, sink, page);
                self.flags.analytics_tag = true;
                loaded.push(ANALYTICS_TAG.to_string());
            }
        }

        if self.tag_manager_allowed(consent) {
            if let Some(id) = self.container_id.clone() {
                load_tag_manager(&id, sink, page);
                self.flags.tag_manager = true;
                loaded.push(TAG_MANAGER.to_string());
            }
        }

        for (name, outcome) in self.loaders.run(consent, page) {
            if outcome == LoadOutcome::Injected {
                loaded.push(name);
            }
        }

        debug!(?loaded, flags = ?self.flags, "gate evaluated");
        loaded
    }

    fn tag_manager_allowed(&self, consent: &ConsentRecord) -> bool {
        if self.flags.tag_manager {
            return false;
        }
        match self.policy.tag_manager {
            TagManagerRule::Never => false,
            TagManagerRule::OnConsentRead => true,
            TagManagerRule::OnAnalyticsGranted => consent.analytics_granted(),
        }
    }

    fn analytics_allowed(&self, consent: &ConsentRecord) -> bool {
        if self.flags.analytics_tag {
            return false;
        }
        match self.policy.analytics_tag {
            AnalyticsRule::Never => false,
            AnalyticsRule::OnAnalyticsGranted => consent.analytics_granted(),
        }
    }
}

fn load_analytics_tag(measurement_id: &str, sink: &mut dyn SignalSink, page: &mut dyn HostPage) {
    let now = chrono::Utc::now().to_rfc3339();
    sink.command(vec![json!("js"), json!(now)]);
    sink.command(vec![json!("config"), json!(measurement_id)]);
    page.inject(ScriptTag::new(
        ANALYTICS_TAG,
        format!("https://www.googletagmanager.com/gtag/js?id={measurement_id}"),
        ANALYTICS_MARKER,
    ));
    sink.push(QueueEntry::event(ANALYTICS_READY_EVENT, json!({})));
    info!("analytics tag loaded: {}", measurement_id);
}

fn load_tag_manager(container_id: &str, sink: &mut dyn SignalSink, page: &mut dyn HostPage) {
    sink.push(QueueEntry::event(
        TAG_MANAGER_START_EVENT,
        json!({ "gtm.start": now_millis() }),
    ));
    page.inject(ScriptTag::new(
        TAG_MANAGER,
        format!("https://www.googletagmanager.com/gtm.js?id={container_id}"),
        TAG_MANAGER_MARKER,
    ));
    info!("tag manager loaded: {}", container_id);
}
