//! Consent signal publisher
//!
//! Two phases per page load:
//!   1. `announce_default`: all four categories denied, with `wait_for_update`,
//!      before anything reads stored consent.
//!   2. `publish`: an `update` amending that default, every time consent is
//!      applied (stored consent at bootstrap, or a user decision).

use consentgate_core::{ConsentRecord, QueueEntry, PAGE_VIEW_EVENT};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::sink::SignalSink;

/// What one `publish` call emitted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Publication {
    /// The update command went through the command function.
    pub command_sent: bool,
    /// A synthetic page view was emitted.
    pub page_view: bool,
}

pub struct ConsentPublisher {
    wait_for_update_ms: u32,
    default_announced: bool,
}

impl ConsentPublisher {
    pub fn new(wait_for_update_ms: u32) -> Self {
        Self {
            wait_for_update_ms,
            default_announced: false,
        }
    }

    pub fn default_announced(&self) -> bool {
        self.default_announced
    }

    /// Install the command function if needed and push the default-deny
    /// command. Idempotent within a page session.
    pub fn announce_default(&mut self, sink: &mut dyn SignalSink) {
        if self.default_announced {
            debug!("consent default already announced");
            return;
        }
        sink.install_command_fn();
        if let QueueEntry::Command(args) = QueueEntry::consent_default(self.wait_for_update_ms) {
            sink.command(args);
        }
        self.default_announced = true;
        info!(wait_for_update_ms = self.wait_for_update_ms, "consent default: all denied");
    }

    /// Push the update command and the coarse consent event. A page view is
    /// emitted only when analytics goes from not granted (or unknown) to granted.
    pub fn publish(
        &mut self,
        sink: &mut dyn SignalSink,
        consent: &ConsentRecord,
        previous: Option<&ConsentRecord>,
    ) -> Publication {
        if !self.default_announced {
            warn!("consent update before default, announcing default first");
            self.announce_default(sink);
        }

        let mut publication = Publication::default();

        if let QueueEntry::Command(args) = QueueEntry::consent_update(consent) {
            publication.command_sent = sink.command(args);
        }
        if !publication.command_sent {
            debug!("command function not available (still ok), pushing event only");
        }

        sink.push(QueueEntry::consent_event(consent));

        let was_granted = previous.is_some_and(ConsentRecord::analytics_granted);
        if consent.analytics_granted() && !was_granted {
            sink.push(QueueEntry::event(PAGE_VIEW_EVENT, Value::Object(Default::default())));
            publication.page_view = true;
        }

        debug!(
            analytics = consent.analytics_granted(),
            retargeting = consent.ads_granted(),
            page_view = publication.page_view,
            "consent update"
        );
        publication
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::DataLayer;

    #[test]
    fn publish_without_default_announces_it_first() {
        let mut sink = DataLayer::new();
        let mut publisher = ConsentPublisher::new(300);
        publisher.publish(&mut sink, &ConsentRecord::denied(), None);
        assert_eq!(sink.position_of_command("consent", Some("default")), Some(0));
        assert_eq!(sink.position_of_command("consent", Some("update")), Some(1));
    }

    #[test]
    fn default_is_announced_once() {
        let mut sink = DataLayer::new();
        let mut publisher = ConsentPublisher::new(300);
        publisher.announce_default(&mut sink);
        publisher.announce_default(&mut sink);
        let defaults = sink
            .entries()
            .iter()
            .filter(|e| e.is_command("consent", Some("default")))
            .count();
        assert_eq!(defaults, 1);
    }
}
