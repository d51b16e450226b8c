//! Consent manager: bootstrap and user actions for one page session
//!
//! Owns every piece of session state (store, sink, page, publisher, gate,
//! controller) and sequences them:
//!
//!   bootstrap: announce default -> read store -> banner | apply stored consent
//!   decision:  write store -> publish update -> evaluate gate -> hide

use consentgate_core::{ConsentRecord, SiteConfig, Toggles, UserAction};
use tracing::{debug, info};

use crate::controller::{BannerController, UiState};
use crate::gate::{LoadedFlags, TagLoaderGate};
use crate::host::{HostPage, RecordingPage};
use crate::publisher::ConsentPublisher;
use crate::registry::LoaderRegistry;
use crate::sink::{DataLayer, SignalSink};
use crate::store::{ConsentStore, CookieJar, MemoryCookieJar};

pub struct ConsentManager<J = MemoryCookieJar, S = DataLayer, P = RecordingPage> {
    config: SiteConfig,
    store: ConsentStore<J>,
    sink: S,
    page: P,
    publisher: ConsentPublisher,
    gate: TagLoaderGate,
    controller: BannerController,
    applied: Option<ConsentRecord>,
    booted: bool,
}

impl<J: CookieJar, S: SignalSink, P: HostPage> ConsentManager<J, S, P> {
    /// `secure` is whether the page is served over TLS.
    pub fn new(config: SiteConfig, jar: J, sink: S, page: P, secure: bool) -> Self {
        let loaders = crate::create_default_registry(&config);
        Self::with_registry(config, jar, sink, page, secure, loaders)
    }

    pub fn with_registry(
        config: SiteConfig,
        jar: J,
        sink: S,
        page: P,
        secure: bool,
        loaders: LoaderRegistry,
    ) -> Self {
        Self {
            store: ConsentStore::new(jar, &config, secure),
            publisher: ConsentPublisher::new(config.wait_for_update_ms()),
            gate: TagLoaderGate::with_registry(&config, loaders),
            controller: BannerController::new(config.banner.force_show),
            sink,
            page,
            config,
            applied: None,
            booted: false,
        }
    }

    /// Page-load entry point. Runs once; later calls return the current state.
    pub fn bootstrap(&mut self) -> UiState {
        if self.booted {
            return self.controller.state();
        }
        self.booted = true;

        self.publisher.announce_default(&mut self.sink);

        if !self.config.enabled {
            info!("consent banner disabled, default-deny only");
            return self.controller.state();
        }

        let existing = self.store.read();
        let has_consent = existing.is_some();
        if self.config.banner.force_show {
            info!("force_show enabled, showing banner");
        } else if let Some(consent) = existing {
            self.apply(consent);
        }
        let state = self.controller.on_bootstrap(has_consent);

        debug!(
            has_consent,
            force_show = self.config.banner.force_show,
            mode = self.config.tracking.mode.as_str(),
            loaded = ?self.gate.flags(),
            "init ok"
        );
        state
    }

    /// Dispatch a `data-action` click. Every action is a no-op while the
    /// banner is disabled.
    pub fn handle_action(&mut self, action: UserAction) -> UiState {
        match action {
            UserAction::Accept => self.accept_all(),
            UserAction::Reject => self.reject_all(),
            UserAction::Customize => self.open_modal(),
            UserAction::Save => self.save(),
            UserAction::Close => self.close_modal(),
        }
    }

    pub fn accept_all(&mut self) -> UiState {
        self.decide(ConsentRecord::granted())
    }

    pub fn reject_all(&mut self) -> UiState {
        self.decide(ConsentRecord::denied())
    }

    /// Save the modal's current checkbox state.
    pub fn save(&mut self) -> UiState {
        let record = self.controller.toggles().to_record();
        self.decide(record)
    }

    /// Programmatic entry point for external "manage cookies" triggers.
    pub fn open_modal(&mut self) -> UiState {
        if !self.config.enabled {
            return self.controller.state();
        }
        let stored = self.store.read();
        self.controller.on_customize(stored.as_ref())
    }

    pub fn close_modal(&mut self) -> UiState {
        if !self.config.enabled {
            return self.controller.state();
        }
        let has_consent = self.store.read().is_some();
        self.controller.on_close(has_consent)
    }

    /// Checkbox change inside the modal.
    pub fn set_toggles(&mut self, toggles: Toggles) {
        self.controller.set_toggles(toggles);
    }

    fn decide(&mut self, record: ConsentRecord) -> UiState {
        if !self.config.enabled {
            debug!("consent banner disabled, ignoring decision");
            return self.controller.state();
        }
        let stored = self.store.write(&record);
        info!(
            analytics = stored.analytics_granted(),
            retargeting = stored.ads_granted(),
            "consent saved"
        );
        self.apply(stored);
        self.controller.on_decision()
    }

    fn apply(&mut self, consent: ConsentRecord) {
        let previous = self.applied.take();
        self.publisher.publish(&mut self.sink, &consent, previous.as_ref());
        self.gate.evaluate(&consent, &mut self.sink, &mut self.page);
        self.applied = Some(consent);
    }

    /// Server-side hint for the initial `aria-hidden` of the banner root.
    pub fn initial_aria_hidden(&self) -> bool {
        !self.config.enabled || (self.store.has_valid_consent() && !self.config.banner.force_show)
    }

    pub fn state(&self) -> UiState {
        self.controller.state()
    }

    pub fn toggles(&self) -> Toggles {
        self.controller.toggles()
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn stored(&self) -> Option<ConsentRecord> {
        self.store.read()
    }

    /// Last consent pushed to the publisher and gate.
    pub fn applied(&self) -> Option<&ConsentRecord> {
        self.applied.as_ref()
    }

    pub fn loaded(&self) -> LoadedFlags {
        self.gate.flags()
    }

    pub fn jar(&self) -> &J {
        self.store.jar()
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn page(&self) -> &P {
        &self.page
    }
}
