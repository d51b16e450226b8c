//! Meta pixel (`fbq` global), init + PageView on load

use consentgate_core::ScriptTag;
use serde_json::json;
use tracing::info;

use crate::host::HostPage;
use crate::registry::{LoadOutcome, PixelLoader};

pub const MARKER: &str = "fbq";
const SRC: &str = "https://connect.facebook.net/en_US/fbevents.js";

pub struct MetaPixelLoader {
    pixel_id: String,
}

impl MetaPixelLoader {
    pub fn new(pixel_id: impl Into<String>) -> Self {
        Self { pixel_id: pixel_id.into() }
    }
}

impl PixelLoader for MetaPixelLoader {
    fn name(&self) -> &str { "meta_pixel" }

    fn load(&self, page: &mut dyn HostPage) -> LoadOutcome {
        if page.has_marker(MARKER) {
            return LoadOutcome::AlreadyPresent;
        }

        let script = ScriptTag::new(self.name(), SRC, MARKER)
            .with_call([json!("init"), json!(self.pixel_id)])
            .with_call([json!("track"), json!("PageView")]);
        page.inject(script);
        info!("Meta pixel loaded: {}", self.pixel_id);
        LoadOutcome::Injected
    }
}
