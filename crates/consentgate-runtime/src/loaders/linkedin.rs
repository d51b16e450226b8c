//! LinkedIn Insight tag
//!
//! The partner id goes on the page-global partner list on every run (once per
//! id); the script itself is keyed on its element id.

use consentgate_core::ScriptTag;
use tracing::info;

use crate::host::HostPage;
use crate::registry::{LoadOutcome, PixelLoader};

pub const MARKER: &str = "linkedin-insight";
pub const PARTNER_LIST: &str = "_linkedin_data_partner_ids";
const SRC: &str = "https://snap.licdn.com/li.lms-analytics/insight.min.js";

pub struct LinkedInInsightLoader {
    partner_id: String,
}

impl LinkedInInsightLoader {
    pub fn new(partner_id: impl Into<String>) -> Self {
        Self { partner_id: partner_id.into() }
    }
}

impl PixelLoader for LinkedInInsightLoader {
    fn name(&self) -> &str { "linkedin_insight" }

    fn load(&self, page: &mut dyn HostPage) -> LoadOutcome {
        page.push_unique(PARTNER_LIST, &self.partner_id);

        if page.has_marker(MARKER) {
            return LoadOutcome::AlreadyPresent;
        }

        page.inject(ScriptTag::new(self.name(), SRC, MARKER));
        info!("LinkedIn Insight loaded: {}", self.partner_id);
        LoadOutcome::Injected
    }
}
