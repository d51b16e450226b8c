//! One simulated page load against in-memory host, jar and queue.

use std::str::FromStr;

use consentgate_core::{
    ConsentRecord, Error, OverlayMode, QueueEntry, ScriptTag, SiteConfig, Toggles, UserAction,
};
use consentgate_runtime::{
    ConsentManager, DataLayer, LoadedFlags, MemoryCookieJar, RecordingPage, UiState,
};
use serde::Serialize;

/// A user interaction after bootstrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Accept,
    Reject,
    Customize,
    Save,
    Close,
    /// External "manage cookies" link.
    Open,
}

impl FromStr for Step {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "open" {
            return Ok(Step::Open);
        }
        Ok(match UserAction::from_str(s)? {
            UserAction::Accept => Step::Accept,
            UserAction::Reject => Step::Reject,
            UserAction::Customize => Step::Customize,
            UserAction::Save => Step::Save,
            UserAction::Close => Step::Close,
        })
    }
}

#[derive(Clone, Debug, Default)]
pub struct Simulation {
    /// `Cookie:` header the page loads with.
    pub cookie_header: Option<String>,
    /// Page served over TLS.
    pub secure: bool,
    /// Checkbox state to set whenever the modal opens.
    pub toggles: Option<Toggles>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
pub struct StepReport {
    pub step: Step,
    pub state: UiState,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub enabled: bool,
    /// Passed to the markup layer as-is.
    pub overlay_mode: OverlayMode,
    pub initial_aria_hidden: bool,
    pub bootstrap: UiState,
    pub steps: Vec<StepReport>,
    pub final_state: UiState,
    pub stored: Option<ConsentRecord>,
    pub loaded: LoadedFlags,
    pub queue: Vec<QueueEntry>,
    pub scripts: Vec<ScriptTag>,
    pub set_cookies: Vec<String>,
}

pub fn run(config: SiteConfig, sim: &Simulation) -> SimulationReport {
    let jar = sim
        .cookie_header
        .as_deref()
        .map(MemoryCookieJar::from_header)
        .unwrap_or_default();
    let mut manager = ConsentManager::new(config, jar, DataLayer::new(), RecordingPage::new(), sim.secure);

    let initial_aria_hidden = manager.initial_aria_hidden();
    let bootstrap = manager.bootstrap();

    let mut steps = Vec::with_capacity(sim.steps.len());
    for step in &sim.steps {
        let state = match step {
            Step::Accept => manager.handle_action(UserAction::Accept),
            Step::Reject => manager.handle_action(UserAction::Reject),
            Step::Customize => manager.handle_action(UserAction::Customize),
            Step::Save => manager.handle_action(UserAction::Save),
            Step::Close => manager.handle_action(UserAction::Close),
            Step::Open => manager.open_modal(),
        };
        if state == UiState::Modal {
            if let Some(toggles) = sim.toggles {
                manager.set_toggles(toggles);
            }
        }
        steps.push(StepReport { step: *step, state });
    }

    SimulationReport {
        enabled: manager.config().enabled,
        overlay_mode: manager.config().banner.overlay_mode,
        initial_aria_hidden,
        bootstrap,
        steps,
        final_state: manager.state(),
        stored: manager.stored(),
        loaded: manager.loaded(),
        queue: manager.sink().entries().to_vec(),
        scripts: manager.page().scripts().to_vec(),
        set_cookies: manager.jar().written().iter().map(|c| c.header()).collect(),
    }
}
