//! Property tests for plugin ordering.

use proptest::prelude::*;
use spry_core::plugin::{Builtin, BuiltinSet, Condition};
use spry_core::{Enforce, HookUsage, PipelineMode, Plugin, PluginDescriptor, compose};

#[derive(Debug)]
struct Named(String);

impl Plugin for Named {
    fn name(&self) -> &str {
        &self.0
    }

    fn register_hook_usage(&self) -> HookUsage {
        HookUsage::TRANSFORM
    }
}

fn descriptor(name: String, enforce: Enforce) -> PluginDescriptor {
    PluginDescriptor::from_plugin(Named(name)).with_enforce(enforce)
}

fn builtins() -> BuiltinSet {
    BuiltinSet {
        pre_resolution: vec![
            Builtin::always(descriptor("builtin:alias".into(), Enforce::Default)),
            Builtin::when(
                Condition::Development,
                descriptor("builtin:dev".into(), Enforce::Default),
            ),
        ],
        post_resolution: vec![Builtin::always(descriptor(
            "builtin:json".into(),
            Enforce::Default,
        ))],
    }
}

fn enforce() -> impl Strategy<Value = Enforce> {
    prop_oneof![Just(Enforce::Pre), Just(Enforce::Default), Just(Enforce::Post)]
}

fn phase_rank(name: &str, tags: &[(String, Enforce)]) -> u8 {
    match name {
        "builtin:alias" | "builtin:dev" => 2,
        "builtin:json" => 3,
        _ => match tags.iter().find(|(n, _)| n == name).map(|(_, e)| *e) {
            Some(Enforce::Pre) => 0,
            Some(Enforce::Default) | None => 1,
            Some(Enforce::Post) => 4,
        },
    }
}

proptest! {
    #[test]
    fn composition_is_a_stable_partition(
        tags in prop::collection::vec(enforce(), 0..24),
        production in any::<bool>(),
    ) {
        let tags: Vec<(String, Enforce)> = tags
            .into_iter()
            .enumerate()
            .map(|(i, e)| (format!("user:{i}"), e))
            .collect();
        let plugins = tags
            .iter()
            .map(|(name, e)| descriptor(name.clone(), *e))
            .collect();
        let mode = PipelineMode { production, hot: false };

        let pipeline = compose(plugins, &builtins(), mode);
        let names = pipeline.names();

        // Every user plugin appears exactly once, plus the active built-ins.
        let expected_builtins = if production { 2 } else { 3 };
        prop_assert_eq!(names.len(), tags.len() + expected_builtins);

        // Phases never go backwards.
        let ranks: Vec<u8> = names.iter().map(|n| phase_rank(n, &tags)).collect();
        prop_assert!(ranks.windows(2).all(|w| w[0] <= w[1]));

        // Within a phase, the caller's relative order is kept.
        for phase in [Enforce::Pre, Enforce::Default, Enforce::Post] {
            let original: Vec<&str> = tags
                .iter()
                .filter(|(_, e)| *e == phase)
                .map(|(n, _)| n.as_str())
                .collect();
            let composed: Vec<&str> = names
                .iter()
                .copied()
                .filter(|n| original.contains(n))
                .collect();
            prop_assert_eq!(original, composed);
        }

        // Composition is deterministic.
        let again = compose(
            tags.iter().map(|(n, e)| descriptor(n.clone(), *e)).collect(),
            &builtins(),
            mode,
        );
        prop_assert_eq!(again.names(), names);
    }
}
