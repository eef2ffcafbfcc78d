//! File change → eviction → notification.

mod support;

use std::path::Path;

use spry_core::{
    InvalidationDispatcher, LiveMessage, LiveUpdateBus, PluginDescriptor, ReloadPolicy,
};
use support::{InlinePlugin, ROOT, WatchPlugin, engine, id, root_path};

fn html_policy() -> ReloadPolicy {
    ReloadPolicy::new(ROOT, &["**/*.html".to_string()])
        .unwrap()
        .with_files([root_path("index.js")])
}

#[tokio::test]
async fn change_evicts_dependents_and_names_them() {
    let engine = engine(
        &[
            ("b.bundle.js", "a.js\n"),
            ("a.js", "export const a = 1;"),
            ("c.js", "export const c = 1;"),
        ],
        vec![PluginDescriptor::from_plugin(InlinePlugin)],
    );
    let bus = LiveUpdateBus::new();
    let (_, mut rx) = bus.subscribe();
    let dispatcher = InvalidationDispatcher::new(engine.clone(), html_policy(), bus);

    engine.build(&id("b.bundle.js")).await.unwrap();
    engine.build(&id("c.js")).await.unwrap();

    let outcome = dispatcher.dispatch(&root_path("a.js"));

    assert!(outcome.evicted.contains(&id("b.bundle.js")));
    assert!(!outcome.evicted.contains(&id("c.js")));
    assert!(!outcome.needs_full_reload);
    assert!(!engine.cache().contains(&id("b.bundle.js")));
    assert!(engine.cache().contains(&id("c.js")));

    match rx.recv().await.unwrap() {
        LiveMessage::Update { changes } => {
            let ids: Vec<&str> = changes.iter().map(|c| c.id.as_str()).collect();
            assert_eq!(ids, vec!["b.bundle.js"]);
        }
        other => panic!("expected update, got {other:?}"),
    }
}

#[tokio::test]
async fn unrelated_change_is_a_noop() {
    let engine = engine(&[("c.js", "export {}")], Vec::new());
    let bus = LiveUpdateBus::new();
    let (_, mut rx) = bus.subscribe();
    let dispatcher = InvalidationDispatcher::new(engine.clone(), html_policy(), bus);

    engine.build(&id("c.js")).await.unwrap();
    let outcome = dispatcher.dispatch(&root_path("styles/unused.css"));

    assert!(outcome.is_noop());
    assert!(engine.cache().contains(&id("c.js")));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn policy_match_forces_reload() {
    let engine = engine(&[("index.js", "export {}")], Vec::new());
    let bus = LiveUpdateBus::new();
    let (_, mut rx) = bus.subscribe();
    let dispatcher = InvalidationDispatcher::new(engine.clone(), html_policy(), bus);

    engine.build(&id("index.js")).await.unwrap();
    let outcome = dispatcher.dispatch(&root_path("index.js"));
    assert!(outcome.needs_full_reload);
    assert!(outcome.evicted.contains(&id("index.js")));
    assert_eq!(rx.recv().await, Some(LiveMessage::Reload));

    // Matches even when nothing was built from it.
    let outcome = dispatcher.dispatch(&root_path("pages/about.html"));
    assert!(outcome.needs_full_reload);
    assert_eq!(rx.recv().await, Some(LiveMessage::Reload));
}

#[tokio::test]
async fn watch_change_hooks_contribute_ids() {
    let engine = engine(
        &[("theme.css", "body {}")],
        vec![PluginDescriptor::from_plugin(WatchPlugin {
            trigger: root_path("tokens.json"),
            ids: vec![id("theme.css")],
        })],
    );
    let dispatcher =
        InvalidationDispatcher::new(engine.clone(), html_policy(), LiveUpdateBus::new());

    engine.build(&id("theme.css")).await.unwrap();
    let outcome = dispatcher.on_file_changed(Path::new("/virtual/./tokens.json"));

    assert_eq!(outcome.evicted.into_iter().collect::<Vec<_>>(), vec![id("theme.css")]);
    assert!(!engine.cache().contains(&id("theme.css")));
}

#[tokio::test]
async fn always_reload_turns_updates_into_reloads() {
    let engine = engine(&[("c.js", "export {}")], Vec::new());
    let policy = html_policy().with_always(true);
    let dispatcher = InvalidationDispatcher::new(engine.clone(), policy, LiveUpdateBus::new());

    engine.build(&id("c.js")).await.unwrap();
    let outcome = dispatcher.on_file_changed(&root_path("c.js"));
    assert!(outcome.needs_full_reload);

    let outcome = dispatcher.on_file_changed(&root_path("other.js"));
    assert!(outcome.is_noop());
}
