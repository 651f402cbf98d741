//! Property-based tests for the statechart engine.
//!
//! These tests use proptest to drive a fixed two-region design with random
//! event sequences and verify the tree invariants hold at every committed
//! snapshot.

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use ramify::{Design, EventContext, Handler, Snapshot, StateConfig, Statechart, to};
use serde_json::Value;

#[derive(Clone, PartialEq, Debug, Default)]
struct Counter {
    count: i64,
}

/// Two parallel regions under `m`, an `other` sibling, counters and a
/// guaranteed-failing event.
fn machine() -> Statechart<Counter> {
    Statechart::new(
        Design::new(Counter::default())
            .action("add", |d: &mut Counter, _: &EventContext| {
                d.count += 1;
                Ok(())
            })
            .action("dec", |d: &mut Counter, _: &EventContext| {
                d.count -= 1;
                Ok(())
            })
            .action("boom", |_: &mut Counter, _: &EventContext| {
                Err("always fails".to_string())
            })
            .condition("countIsAtMin", |d: &Counter, _: &EventContext| {
                Ok(d.count == 0)
            })
            .root(
                StateConfig::new()
                    .initial("m")
                    .state(
                        "m",
                        StateConfig::new()
                            .parallel()
                            .state(
                                "letters",
                                StateConfig::new()
                                    .initial("a")
                                    .state("a", StateConfig::new())
                                    .state("b", StateConfig::new())
                                    .state("c", StateConfig::new())
                                    .on("TO_B", to("b"))
                                    .on("TO_C", to("c")),
                            )
                            .state(
                                "numbers",
                                StateConfig::new()
                                    .initial("one")
                                    .state("one", StateConfig::new().on("SWAP", to("two")))
                                    .state("two", StateConfig::new().on("SWAP", to("one"))),
                            ),
                    )
                    .state("other", StateConfig::new().on("BACK", to("m.restore")))
                    .on("AWAY", to("other"))
                    .on("ADD", Handler::new().run_named("add"))
                    .on(
                        "DEC",
                        Handler::new().unless_named("countIsAtMin").run_named("dec"),
                    )
                    .on("FAIL", Handler::new().run_named("boom")),
            ),
    )
    .unwrap()
}

prop_compose! {
    fn arbitrary_event()(variant in 0..8u8) -> &'static str {
        match variant {
            0 => "TO_B",
            1 => "TO_C",
            2 => "SWAP",
            3 => "AWAY",
            4 => "BACK",
            5 => "DEC",
            6 => "FAIL",
            _ => "ADD",
        }
    }
}

fn leaf_count(snapshot: &Snapshot<Counter>, region: &str) -> usize {
    snapshot
        .active_paths
        .iter()
        .filter(|p| p.contains(&format!(".{region}.")))
        .count()
}

fn assert_tree_invariants(snapshot: &Snapshot<Counter>) -> Result<(), TestCaseError> {
    prop_assert!(!snapshot.active_paths.is_empty());
    for path in &snapshot.active_paths {
        prop_assert!(path.starts_with("root"));
    }

    let in_m = snapshot.active_paths.iter().any(|p| p.contains(".m."));
    if in_m {
        // Parallel region: both branches active; compound children: exactly
        // one active leaf each.
        prop_assert_eq!(leaf_count(snapshot, "letters"), 1);
        prop_assert_eq!(leaf_count(snapshot, "numbers"), 1);
        prop_assert_eq!(snapshot.active_paths.len(), 2);
    } else {
        prop_assert_eq!(&snapshot.active_paths, &vec!["root.other".to_string()]);
    }
    Ok(())
}

proptest! {
    #[test]
    fn invariants_hold_under_random_event_sequences(
        events in prop::collection::vec(arbitrary_event(), 0..40)
    ) {
        let chart = machine();
        assert_tree_invariants(&chart.snapshot())?;

        for event in events {
            let before = chart.snapshot();
            match chart.send(event, Value::Null) {
                Ok(snapshot) => {
                    assert_tree_invariants(&snapshot)?;
                    // The returned snapshot is the committed one.
                    prop_assert_eq!(snapshot, chart.snapshot());
                }
                Err(_) => {
                    // Atomicity: a failed dispatch leaves nothing behind.
                    prop_assert_eq!(chart.snapshot(), before);
                }
            }
        }
    }

    #[test]
    fn failing_dispatches_never_change_observable_state(
        events in prop::collection::vec(arbitrary_event(), 0..20)
    ) {
        let chart = machine();
        for event in events {
            let _ = chart.send(event, Value::Null);
        }
        let before = chart.snapshot();
        prop_assert!(chart.send("FAIL", Value::Null).is_err());
        prop_assert_eq!(chart.snapshot(), before);
    }

    #[test]
    fn can_agrees_with_send_for_guarded_events(
        events in prop::collection::vec(arbitrary_event(), 0..30)
    ) {
        let chart = machine();
        for event in events {
            let expected = chart.snapshot().data.count > 0;
            prop_assert_eq!(chart.can("DEC", Value::Null), expected);
            let _ = chart.send(event, Value::Null);
        }
    }

    #[test]
    fn can_is_deterministic(
        events in prop::collection::vec(arbitrary_event(), 0..20)
    ) {
        let chart = machine();
        for event in events {
            let _ = chart.send(event, Value::Null);
        }
        for probe in ["TO_B", "SWAP", "DEC", "FAIL", "NOT_AN_EVENT"] {
            let first = chart.can(probe, Value::Null);
            let second = chart.can(probe, Value::Null);
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn restore_always_lands_on_a_remembered_configuration(
        events in prop::collection::vec(arbitrary_event(), 0..30)
    ) {
        let chart = machine();
        for event in events {
            let _ = chart.send(event, Value::Null);
        }
        let in_m = chart.is_in("m");
        let paths_before = chart.snapshot().active_paths;

        chart.send("AWAY", Value::Null).unwrap();
        prop_assert!(chart.is_in("other"));
        chart.send("BACK", Value::Null).unwrap();

        if in_m {
            // Leaving and restoring reproduces the exact configuration.
            prop_assert_eq!(chart.snapshot().active_paths, paths_before);
        }
        assert_tree_invariants(&chart.snapshot())?;
    }
}
