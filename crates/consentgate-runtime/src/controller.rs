//! Banner / modal visibility state machine
//!
//!   Hidden  --bootstrap (no consent | force)-->  Banner
//!   Banner  --customize-->                       Modal
//!   Banner | Modal  --accept | reject | save-->  Hidden
//!   Modal   --close-->  Hidden if consent exists (and not forced), else Banner
//!
//! Purely synchronous: no timers, no I/O. The manager performs the side
//! effects and calls the matching transition.

use consentgate_core::{ConsentRecord, Toggles};
use serde::Serialize;
use tracing::debug;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UiState {
    #[default]
    Hidden,
    Banner,
    Modal,
}

impl UiState {
    /// Value for the root container's `aria-hidden` attribute.
    pub fn aria_hidden(&self) -> bool {
        matches!(self, UiState::Hidden)
    }
}

pub struct BannerController {
    state: UiState,
    force_show: bool,
    toggles: Toggles,
}

impl BannerController {
    pub fn new(force_show: bool) -> Self {
        Self {
            state: UiState::Hidden,
            force_show,
            toggles: Toggles::default(),
        }
    }

    pub fn state(&self) -> UiState {
        self.state
    }

    pub fn toggles(&self) -> Toggles {
        self.toggles
    }

    /// Reflect a checkbox change made by the user.
    pub fn set_toggles(&mut self, toggles: Toggles) {
        self.toggles = toggles;
    }

    /// Whether bootstrap has to show the banner instead of applying stored consent.
    pub fn needs_choice(&self, has_consent: bool) -> bool {
        self.force_show || !has_consent
    }

    pub fn on_bootstrap(&mut self, has_consent: bool) -> UiState {
        let next = if self.needs_choice(has_consent) {
            UiState::Banner
        } else {
            UiState::Hidden
        };
        self.transition(next)
    }

    /// Accept, reject or save completed.
    pub fn on_decision(&mut self) -> UiState {
        self.transition(UiState::Hidden)
    }

    /// Open the modal with checkboxes synced from stored consent.
    pub fn on_customize(&mut self, stored: Option<&ConsentRecord>) -> UiState {
        self.toggles = Toggles::from_record(stored);
        self.transition(UiState::Modal)
    }

    /// Modal dismissed without saving.
    pub fn on_close(&mut self, has_consent: bool) -> UiState {
        let next = if has_consent && !self.force_show {
            UiState::Hidden
        } else {
            UiState::Banner
        };
        self.transition(next)
    }

    fn transition(&mut self, next: UiState) -> UiState {
        debug!("ui {:?} -> {:?}", self.state, next);
        self.state = next;
        next
    }
}
