//! Page signals through plugins into the queue

use std::sync::Arc;

use trailmark_core::domain::{EventType, PluginName};
use trailmark_core::ports::{ElementInfo, FormField, FormInfo, NavigationKind, PageSignal};
use trailmark_pipeline::{Tracker, TrackerBuilder};
use trailmark_plugins::{ScriptedHistory, SignalBus, StaticPageContext};

use crate::common::{quiet_config, settle, RecordingTransport};

struct Page {
    tracker: Arc<Tracker>,
    bus: Arc<SignalBus>,
    history: Arc<ScriptedHistory>,
    transport: Arc<RecordingTransport>,
}

fn page_with(plugins: Vec<PluginName>, auto_page_view: bool) -> Page {
    let page = Arc::new(StaticPageContext::new("https://example.com/"));
    let bus = Arc::new(SignalBus::new());
    let history = Arc::new(ScriptedHistory::with_page(page.clone()));
    let transport = Arc::new(RecordingTransport::default());
    let tracker = TrackerBuilder::new(
        quiet_config()
            .auto_page_view(auto_page_view)
            .plugins(plugins)
            .build(),
    )
    .page(page)
    .events(bus.clone())
    .history(history.clone())
    .transport(transport.clone())
    .start_timer(false)
    .build()
    .unwrap();

    Page {
        tracker,
        bus,
        history,
        transport,
    }
}

fn types(tracker: &Tracker) -> Vec<EventType> {
    tracker
        .queued_events()
        .into_iter()
        .map(|e| e.event_type)
        .collect()
}

#[test]
fn test_auto_page_view_tracks_initial_and_spa_navigation() {
    let page = page_with(Vec::new(), true);
    assert_eq!(types(&page.tracker), vec![EventType::PageView]);

    page.history
        .navigate(NavigationKind::Push, "https://example.com/pricing");
    let queued = page.tracker.queued_events();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued[1].url, "https://example.com/pricing");
}

#[test]
fn test_auto_page_view_off_excludes_listed_page_view() {
    let page = page_with(vec![PluginName::PageView, PluginName::Clicks], false);
    assert_eq!(page.tracker.plugin_names(), vec![PluginName::Clicks]);
    assert!(page.tracker.queued_events().is_empty());
}

#[test]
fn test_click_signal_becomes_button_click() {
    let page = page_with(vec![PluginName::Clicks], false);
    page.bus.dispatch(&PageSignal::Click(ElementInfo {
        tag: "button".into(),
        text: Some("Start trial".into()),
        ..Default::default()
    }));

    let queued = page.tracker.queued_events();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].event_type, EventType::ButtonClick);
    assert_eq!(queued[0].event_name, "Start trial");
}

#[tokio::test]
async fn test_form_submit_identifies_in_background() {
    let page = page_with(vec![PluginName::Forms], false);
    page.bus.dispatch(&PageSignal::FormSubmit(FormInfo {
        id: "signup".into(),
        name: Some("Signup".into()),
        action: None,
        fields: vec![
            FormField {
                name: "email".into(),
                field_type: "email".into(),
                value: Some("ada@example.com".into()),
            },
            FormField {
                name: "company".into(),
                field_type: "text".into(),
                value: Some("Acme".into()),
            },
        ],
    }));
    settle().await;

    assert_eq!(types(&page.tracker), vec![EventType::FormSubmit]);
    let identifies = page.transport.identifies.lock().unwrap();
    assert_eq!(identifies.len(), 1);
    assert_eq!(identifies[0].email, "ada@example.com");
    assert_eq!(identifies[0].properties["company"], "Acme");
}

#[tokio::test]
async fn test_unload_signal_uses_beacon() {
    let page = page_with(Vec::new(), true);
    page.bus.dispatch(&PageSignal::PageHide);

    assert_eq!(page.tracker.queue_len(), 0);
    let beacons = page.transport.beacons.lock().unwrap();
    assert_eq!(beacons.len(), 1);
    assert_eq!(beacons[0][0].event_type, EventType::PageView);
}

#[tokio::test]
async fn test_destroy_restores_history_and_detaches_everything() {
    let page = page_with(vec![PluginName::Clicks, PluginName::Scroll], true);
    assert!(page.history.is_installed());

    page.tracker.destroy().await;

    assert!(!page.history.is_installed());
    assert_eq!(page.bus.listener_count(), 0);
    assert_eq!(page.transport.sent_names().len(), 1);
}
