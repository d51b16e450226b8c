//! Tests for consentgate-runtime: store, publisher, gate, loaders, controller and
//! full page-session flows through ConsentManager

use consentgate_core::*;
use consentgate_runtime::gate::{ANALYTICS_TAG, TAG_MANAGER};
use consentgate_runtime::loaders::{linkedin, meta};
use consentgate_runtime::*;
use proptest::prelude::*;

const GRANTED_V2: &str = r#"{"version":2,"timestamp":1700000000000,"analytics_storage":"granted","ad_storage":"granted","ad_user_data":"granted","ad_personalization":"granted"}"#;

fn site(mode: TrackingMode) -> SiteConfig {
    let mut config = SiteConfig::default();
    config.tracking.mode = mode;
    config.tracking.container_id = "GTM-TEST1".into();
    config.tracking.measurement_id = "G-TEST2".into();
    config.pixels.meta_pixel_id = "111222333".into();
    config.pixels.linkedin_partner_id = "4455".into();
    config
}

fn manager_with(config: SiteConfig, jar: MemoryCookieJar) -> ConsentManager {
    ConsentManager::new(config, jar, DataLayer::new(), RecordingPage::new(), true)
}

fn jar_with(name: &str, raw: &str) -> MemoryCookieJar {
    let mut jar = MemoryCookieJar::new();
    jar.insert(name, raw);
    jar
}

// ===========================================================================
// ConsentStore
// ===========================================================================

#[test]
fn store_read_none_when_nothing_stored() {
    let store = ConsentStore::new(MemoryCookieJar::new(), &SiteConfig::default(), false);
    assert!(store.read().is_none());
    assert!(!store.has_valid_consent());
}

#[test]
fn store_empty_cookie_counts_as_absent() {
    let store = ConsentStore::new(jar_with("cmp410gone_consent", "  "), &SiteConfig::default(), false);
    assert!(store.read().is_none());
}

#[test]
fn store_garbage_is_present_but_denied() {
    let store = ConsentStore::new(jar_with("cmp410gone_consent", "%%%not-json"), &SiteConfig::default(), false);
    let record = store.read().expect("present cookie must read as Some");
    assert!(!record.analytics_granted());
    assert!(!record.ads_granted());
    assert!(!store.has_valid_consent());
}

#[test]
fn store_falls_back_to_legacy_cookie() {
    let store = ConsentStore::new(
        jar_with("cmp_consent", r#"{"v":1,"essential":true,"analytics":true,"retargeting":false}"#),
        &SiteConfig::default(),
        false,
    );
    let record = store.read().unwrap();
    assert!(record.analytics_granted());
    assert!(!record.ads_granted());
    assert!(store.has_valid_consent());
}

#[test]
fn store_prefers_current_cookie_over_legacy() {
    let mut jar = jar_with("cmp_consent", r#"{"analytics":true,"retargeting":true}"#);
    jar.insert("cmp410gone_consent", r#"{"analytics_storage":"denied"}"#);
    let store = ConsentStore::new(jar, &SiteConfig::default(), false);
    assert!(!store.read().unwrap().analytics_granted());
}

#[test]
fn store_decodes_every_layer_encoding() {
    let encodings = [
        GRANTED_V2.to_string(),
        format!("\"{}\"", GRANTED_V2),
        format!("'{}'", GRANTED_V2),
        GRANTED_V2.replace('"', "\\\""),
        urlencoding::encode(GRANTED_V2).into_owned(),
        format!("%22{}%22", urlencoding::encode(GRANTED_V2)),
        urlencoding::encode(&urlencoding::encode(GRANTED_V2)).into_owned(),
        urlencoding::encode(&GRANTED_V2.replace(',', ", ")).replace("%20", "+"),
    ];
    for raw in encodings {
        let store = ConsentStore::new(jar_with("cmp410gone_consent", &raw), &SiteConfig::default(), false);
        let record = store.read().unwrap();
        assert!(record.analytics_granted(), "failed for {raw}");
        assert!(record.ads_granted(), "failed for {raw}");
    }
}

#[test]
fn store_keeps_escaped_backslashes_in_unslashed_blob() {
    let raw = r#"{\"analytics_storage\":\"granted\",\"note\":\"a\\\\b\"}"#;
    let store = ConsentStore::new(jar_with("cmp410gone_consent", raw), &SiteConfig::default(), false);
    assert!(store.read().unwrap().analytics_granted());
    assert!(store.has_valid_consent());
}

proptest! {
    #[test]
    fn store_read_never_panics_and_present_means_some(raw in "\\PC{1,96}") {
        let store = ConsentStore::new(jar_with("cmp410gone_consent", &raw), &SiteConfig::default(), false);
        let record = store.read();
        prop_assert_eq!(record.is_some(), !raw.trim().is_empty());
        if let Some(record) = record {
            prop_assert_eq!(record.version, SCHEMA_VERSION);
        }
    }
}

#[test]
fn store_write_sets_cookie_attributes() {
    let mut config = SiteConfig::default();
    config.cookie.retention_days = 30;
    let mut store = ConsentStore::new(MemoryCookieJar::new(), &config, true);
    store.write(&ConsentRecord::from_choices(true, false));

    let written = store.jar().written();
    assert_eq!(written.len(), 1);
    let cookie = &written[0];
    assert_eq!(cookie.name, "cmp410gone_consent");
    assert_eq!(cookie.path, "/");
    assert_eq!(cookie.same_site, "Lax");
    assert!(cookie.secure);
    assert_eq!(cookie.max_age_secs, 30 * 86_400);

    let decoded = urlencoding::decode(&cookie.value).unwrap();
    let json: serde_json::Value = serde_json::from_str(&decoded).unwrap();
    assert_eq!(json["version"], 2);
    assert_eq!(json["analytics_storage"], "granted");
    assert_eq!(json["ad_personalization"], "denied");
}

#[test]
fn decode_strategy_order_is_stable() {
    assert_eq!(DecodeStrategy::ORDER[0], DecodeStrategy::AsIs);
    assert_eq!(DecodeStrategy::ORDER[1], DecodeStrategy::QuoteStripped);
    assert_eq!(*DecodeStrategy::ORDER.last().unwrap(), DecodeStrategy::FormDecoded);
}

// ===========================================================================
// ConsentPublisher
// ===========================================================================

#[test]
fn page_view_only_on_transition_to_granted() {
    let mut sink = DataLayer::new();
    let mut publisher = ConsentPublisher::new(500);
    publisher.announce_default(&mut sink);

    let granted = ConsentRecord::granted();
    assert!(publisher.publish(&mut sink, &granted, None).page_view);
    assert!(!publisher.publish(&mut sink, &granted, Some(&granted)).page_view);
    assert_eq!(sink.count_events(PAGE_VIEW_EVENT), 1);

    let denied = ConsentRecord::denied();
    assert!(!publisher.publish(&mut sink, &denied, Some(&granted)).page_view);
    assert!(publisher.publish(&mut sink, &granted, Some(&denied)).page_view);
    assert_eq!(sink.count_events(PAGE_VIEW_EVENT), 2);
}

#[test]
fn publish_pushes_update_and_event() {
    let mut sink = DataLayer::new();
    let mut publisher = ConsentPublisher::new(250);
    publisher.announce_default(&mut sink);
    let publication = publisher.publish(&mut sink, &ConsentRecord::from_choices(false, true), None);

    assert!(publication.command_sent);
    assert!(!publication.page_view);
    assert_eq!(sink.count_events(CONSENT_UPDATE_EVENT), 1);
    let event = sink
        .entries()
        .iter()
        .find(|e| e.event_name() == Some(CONSENT_UPDATE_EVENT))
        .unwrap();
    let json = serde_json::to_value(event).unwrap();
    assert_eq!(json["cmp_analytics"], false);
    assert_eq!(json["cmp_retargeting"], true);
}

/// Sink whose page never gets a command function.
#[derive(Default)]
struct QueueOnly(Vec<QueueEntry>);

impl SignalSink for QueueOnly {
    fn has_command_fn(&self) -> bool {
        false
    }

    fn install_command_fn(&mut self) {}

    fn push(&mut self, entry: QueueEntry) {
        self.0.push(entry);
    }
}

#[test]
fn publish_without_command_fn_pushes_event_only() {
    let mut sink = QueueOnly::default();
    let mut publisher = ConsentPublisher::new(500);
    publisher.announce_default(&mut sink);
    let publication = publisher.publish(&mut sink, &ConsentRecord::granted(), None);

    assert!(!publication.command_sent);
    assert!(sink.0.iter().all(|e| matches!(e, QueueEntry::Event(_))));
    assert!(sink.0.iter().any(|e| e.event_name() == Some(CONSENT_UPDATE_EVENT)));
}

// ===========================================================================
// TagLoaderGate / loaders
// ===========================================================================

#[test]
fn gate_twice_loads_each_integration_once() {
    let mut gate = TagLoaderGate::new(&site(TrackingMode::AllInclusive));
    let mut sink = DataLayer::with_command_fn();
    let mut page = RecordingPage::new();
    let consent = ConsentRecord::granted();

    let first = gate.evaluate(&consent, &mut sink, &mut page);
    let second = gate.evaluate(&consent, &mut sink, &mut page);

    assert_eq!(first.len(), 4);
    assert!(second.is_empty());
    for integration in [TAG_MANAGER, ANALYTICS_TAG, "meta_pixel", "linkedin_insight"] {
        assert_eq!(page.injections(integration), 1, "{integration}");
    }
    assert_eq!(gate.flags(), LoadedFlags { tag_manager: true, analytics_tag: true });
    assert_eq!(sink.count_events(TAG_MANAGER_START_EVENT), 1);
}

#[test]
fn pixels_wait_for_ad_storage() {
    let mut gate = TagLoaderGate::new(&site(TrackingMode::Gtm));
    let mut sink = DataLayer::with_command_fn();
    let mut page = RecordingPage::new();

    assert!(gate.evaluate(&ConsentRecord::from_choices(true, false), &mut sink, &mut page).is_empty());
    let loaded = gate.evaluate(&ConsentRecord::from_choices(true, true), &mut sink, &mut page);
    assert_eq!(loaded, vec!["meta_pixel".to_string(), "linkedin_insight".to_string()]);
}

#[test]
fn meta_loader_respects_existing_global() {
    let mut page = RecordingPage::new().with_marker(meta::MARKER);
    let loader = meta::MetaPixelLoader::new("999");
    assert_eq!(loader.load(&mut page), LoadOutcome::AlreadyPresent);
    assert!(page.scripts().is_empty());
}

#[test]
fn meta_loader_initializes_pixel() {
    let mut page = RecordingPage::new();
    meta::MetaPixelLoader::new("999").load(&mut page);
    let script = &page.scripts()[0];
    assert_eq!(script.marker, meta::MARKER);
    assert_eq!(script.calls[0], vec![serde_json::json!("init"), serde_json::json!("999")]);
    assert_eq!(script.calls[1][1], "PageView");
}

#[test]
fn linkedin_partner_id_listed_once() {
    let mut page = RecordingPage::new();
    let loader = linkedin::LinkedInInsightLoader::new("4455");
    assert_eq!(loader.load(&mut page), LoadOutcome::Injected);
    assert_eq!(loader.load(&mut page), LoadOutcome::AlreadyPresent);
    assert_eq!(page.list(linkedin::PARTNER_LIST), ["4455".to_string()]);
    assert_eq!(page.injections("linkedin_insight"), 1);
}

#[test]
fn registry_skips_unconfigured_integrations() {
    let registry = create_default_registry(&SiteConfig::default());
    assert!(registry.is_empty());

    let mut config = SiteConfig::default();
    config.pixels.linkedin_partner_id = "1".into();
    assert_eq!(create_default_registry(&config).list(), vec!["linkedin_insight"]);
}

#[test]
fn registry_register_replaces_same_name() {
    let mut registry = LoaderRegistry::new();
    registry.register(meta::MetaPixelLoader::new("1"));
    registry.register(meta::MetaPixelLoader::new("2"));
    assert_eq!(registry.list(), vec!["meta_pixel"]);
    assert!(registry.remove("meta_pixel"));
    assert!(!registry.remove("meta_pixel"));
}

// ===========================================================================
// ConsentManager: page sessions
// ===========================================================================

#[test]
fn first_visit_shows_banner_then_reject_hides_and_loads_nothing() {
    let mut m = manager_with(site(TrackingMode::AllInclusive), MemoryCookieJar::new());
    assert!(!m.initial_aria_hidden());
    assert_eq!(m.bootstrap(), UiState::Banner);
    assert!(m.applied().is_none());

    assert_eq!(m.handle_action(UserAction::Reject), UiState::Hidden);

    let stored = m.stored().unwrap();
    assert!(Category::ALL.iter().all(|c| stored.get(*c) == Signal::Denied));
    assert_eq!(m.loaded(), LoadedFlags::default());
    assert!(m.page().scripts().is_empty());
    assert_eq!(m.sink().count_events(PAGE_VIEW_EVENT), 0);
}

#[test]
fn revisit_with_granted_cookie_applies_without_banner() {
    let mut m = manager_with(
        site(TrackingMode::AllInclusive),
        jar_with("cmp410gone_consent", &urlencoding::encode(GRANTED_V2)),
    );
    assert!(m.initial_aria_hidden());
    assert_eq!(m.bootstrap(), UiState::Hidden);

    assert_eq!(m.loaded(), LoadedFlags { tag_manager: true, analytics_tag: true });
    assert_eq!(m.page().scripts().len(), 4);
    assert_eq!(m.sink().count_events(PAGE_VIEW_EVENT), 1);
    assert!(m.jar().written().is_empty());
}

#[test]
fn double_encoded_grant_is_honoured() {
    let raw = urlencoding::encode(&urlencoding::encode(GRANTED_V2)).into_owned();
    let mut m = manager_with(site(TrackingMode::AllInclusive), jar_with("cmp410gone_consent", &raw));
    assert!(m.initial_aria_hidden());
    assert_eq!(m.bootstrap(), UiState::Hidden);
    assert!(m.applied().unwrap().analytics_granted());
    assert_eq!(m.loaded(), LoadedFlags { tag_manager: true, analytics_tag: true });
}

#[test]
fn disabled_banner_only_announces_default() {
    let mut config = site(TrackingMode::AllInclusive);
    config.enabled = false;
    let mut m = manager_with(config, jar_with("cmp410gone_consent", GRANTED_V2));
    assert!(m.initial_aria_hidden());
    assert_eq!(m.bootstrap(), UiState::Hidden);

    assert_eq!(m.handle_action(UserAction::Customize), UiState::Hidden);
    assert_eq!(m.handle_action(UserAction::Accept), UiState::Hidden);
    assert!(m.applied().is_none());
    assert!(m.jar().written().is_empty());
    assert!(m.page().scripts().is_empty());
    assert_eq!(m.sink().entries().len(), 1);
    assert!(m.sink().entries()[0].is_command("consent", Some("default")));
}

#[test]
fn default_deny_precedes_stored_consent_update() {
    let mut m = manager_with(site(TrackingMode::Hybrid), jar_with("cmp_consent", r#"{"analytics":true}"#));
    m.bootstrap();
    let default_at = m.sink().position_of_command("consent", Some("default")).unwrap();
    let update_at = m.sink().position_of_command("consent", Some("update")).unwrap();
    assert_eq!(default_at, 0);
    assert!(default_at < update_at);
}

#[test]
fn bootstrap_runs_once() {
    let mut m = manager_with(site(TrackingMode::Hybrid), jar_with("cmp_consent", r#"{"analytics":true}"#));
    m.bootstrap();
    let len = m.sink().entries().len();
    assert_eq!(m.bootstrap(), UiState::Hidden);
    assert_eq!(m.sink().entries().len(), len);
}

#[test]
fn hybrid_loads_tag_manager_after_reading_denied_consent() {
    let mut m = manager_with(site(TrackingMode::Hybrid), jar_with("cmp410gone_consent", "garbage"));
    assert_eq!(m.bootstrap(), UiState::Hidden);
    assert!(m.loaded().tag_manager);
    assert!(!m.loaded().analytics_tag);
    assert_eq!(m.page().injections("meta_pixel"), 0);
}

#[test]
fn accept_after_revisit_grant_does_not_reinject_or_repeat_page_view() {
    let mut m = manager_with(
        site(TrackingMode::AllInclusive),
        jar_with("cmp410gone_consent", GRANTED_V2),
    );
    m.bootstrap();
    m.open_modal();
    m.handle_action(UserAction::Accept);

    for integration in [TAG_MANAGER, ANALYTICS_TAG, "meta_pixel", "linkedin_insight"] {
        assert_eq!(m.page().injections(integration), 1, "{integration}");
    }
    assert_eq!(m.sink().count_events(PAGE_VIEW_EVENT), 1);
    assert_eq!(m.sink().count_events(CONSENT_UPDATE_EVENT), 2);
}

#[test]
fn close_modal_without_record_returns_to_banner() {
    let mut m = manager_with(SiteConfig::default(), MemoryCookieJar::new());
    m.bootstrap();
    assert_eq!(m.handle_action(UserAction::Customize), UiState::Modal);
    assert_eq!(m.toggles(), Toggles { analytics: true, retargeting: true });
    assert_eq!(m.handle_action(UserAction::Close), UiState::Banner);
    assert!(m.stored().is_none());
}

#[test]
fn close_modal_with_record_hides() {
    let mut m = manager_with(SiteConfig::default(), jar_with("cmp_consent", r#"{"analytics":false}"#));
    m.bootstrap();
    assert_eq!(m.open_modal(), UiState::Modal);
    assert_eq!(m.toggles(), Toggles { analytics: false, retargeting: false });
    assert_eq!(m.close_modal(), UiState::Hidden);
}

#[test]
fn force_show_keeps_banner_and_defers_apply() {
    let mut config = site(TrackingMode::AllInclusive);
    config.banner.force_show = true;
    let mut m = manager_with(config, jar_with("cmp410gone_consent", GRANTED_V2));
    assert!(!m.initial_aria_hidden());
    assert_eq!(m.bootstrap(), UiState::Banner);
    assert!(m.page().scripts().is_empty());

    m.open_modal();
    assert_eq!(m.close_modal(), UiState::Banner);
}

#[test]
fn save_uses_modal_toggles() {
    let mut m = manager_with(site(TrackingMode::AllInclusive), MemoryCookieJar::new());
    m.bootstrap();
    m.handle_action(UserAction::Customize);
    m.set_toggles(Toggles { analytics: true, retargeting: false });
    assert_eq!(m.handle_action(UserAction::Save), UiState::Hidden);

    let stored = m.stored().unwrap();
    assert!(stored.analytics_granted());
    assert_eq!(stored.ad_user_data, Signal::Denied);
    assert!(m.loaded().analytics_tag);
    assert_eq!(m.page().injections("meta_pixel"), 0);
    assert_eq!(m.sink().count_events(PAGE_VIEW_EVENT), 1);
}

#[test]
fn later_ad_grant_loads_pixels_once() {
    let mut m = manager_with(site(TrackingMode::Hybrid), MemoryCookieJar::new());
    m.bootstrap();
    m.reject_all();
    assert_eq!(m.page().injections("meta_pixel"), 0);

    m.open_modal();
    m.set_toggles(Toggles { analytics: false, retargeting: true });
    m.save();
    m.accept_all();

    assert_eq!(m.page().injections("meta_pixel"), 1);
    assert_eq!(m.page().injections("linkedin_insight"), 1);
    assert_eq!(m.page().injections(TAG_MANAGER), 1);
}
