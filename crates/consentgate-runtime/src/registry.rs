//! Pixel loader registry and trait definitions
//!
//! Each retargeting integration is a self-contained module in loaders/
//! implementing the PixelLoader trait. Loaders are registered by
//! create_default_registry() in lib.rs when the site has an id for them.

use consentgate_core::ConsentRecord;
use tracing::debug;

use crate::host::HostPage;

/// Result of one loader run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Script inserted by this run.
    Injected,
    /// The page marker was already there; nothing inserted.
    AlreadyPresent,
    /// Consent does not allow this integration.
    NotPermitted,
}

/// A third-party script gated on ad consent.
///
/// `load` must check the loader's own page marker first, so running it
/// after every consent change is safe.
pub trait PixelLoader {
    /// Unique integration name (e.g. "meta_pixel").
    fn name(&self) -> &str;

    /// Whether the given consent allows this integration. Default: ad storage granted.
    fn is_permitted(&self, consent: &ConsentRecord) -> bool {
        consent.ads_granted()
    }

    /// Inject the script unless the page already has it.
    fn load(&self, page: &mut dyn HostPage) -> LoadOutcome;
}

#[derive(Default)]
pub struct LoaderRegistry {
    loaders: Vec<Box<dyn PixelLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self { loaders: Vec::new() }
    }

    /// Register a loader. Replaces any existing loader with the same name.
    pub fn register(&mut self, loader: impl PixelLoader + 'static) {
        self.remove(loader.name());
        self.loaders.push(Box::new(loader));
    }

    /// Remove a loader by name.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.loaders.len();
        self.loaders.retain(|l| l.name() != name);
        self.loaders.len() != before
    }

    pub fn list(&self) -> Vec<&str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    /// Run every loader against the current consent, in registration order.
    pub fn run(&self, consent: &ConsentRecord, page: &mut dyn HostPage) -> Vec<(String, LoadOutcome)> {
        self.loaders
            .iter()
            .map(|loader| {
                let outcome = if loader.is_permitted(consent) {
                    loader.load(page)
                } else {
                    LoadOutcome::NotPermitted
                };
                debug!("loader {}: {:?}", loader.name(), outcome);
                (loader.name().to_string(), outcome)
            })
            .collect()
    }
}
