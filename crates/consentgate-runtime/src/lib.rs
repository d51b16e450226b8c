//! Consentgate Runtime: the page-session consent state machine
//!
//! Wiring, leaf first:
//! - store: cookie-backed consent record (current + legacy cookie)
//! - sink / publisher: default-deny and update signals on the host queue
//! - registry / loaders / gate: at-most-once script injection
//! - controller: Hidden / Banner / Modal visibility
//! - manager: bootstrap and user actions over all of the above

pub mod controller;
pub mod gate;
pub mod host;
pub mod loaders;
pub mod manager;
pub mod publisher;
pub mod registry;
pub mod sink;
pub mod store;

pub use controller::{BannerController, UiState};
pub use gate::{LoadedFlags, TagLoaderGate};
pub use host::{HostPage, RecordingPage};
pub use manager::ConsentManager;
pub use publisher::ConsentPublisher;
pub use registry::{LoadOutcome, LoaderRegistry, PixelLoader};
pub use sink::{DataLayer, SignalSink};
pub use store::{ConsentStore, CookieJar, DecodeStrategy, MemoryCookieJar, SetCookie};

use consentgate_core::SiteConfig;

/// Registry holding a loader for every pixel the site has an identifier for.
///
/// Integrations without an identifier are left out entirely.
pub fn create_default_registry(config: &SiteConfig) -> LoaderRegistry {
    let mut registry = LoaderRegistry::new();

    if let Some(id) = config.meta_pixel_id() {
        registry.register(loaders::meta::MetaPixelLoader::new(id));
    }
    if let Some(id) = config.linkedin_partner_id() {
        registry.register(loaders::linkedin::LinkedInInsightLoader::new(id));
    }

    registry
}
