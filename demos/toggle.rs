//! Minimal statechart: a toggle with a payload-driven counter.
//!
//! Run with: cargo run --example toggle

use ramify::{Design, EventContext, Handler, StateConfig, Statechart, to};
use serde_json::{json, Value};

#[derive(Clone, PartialEq, Debug)]
struct Counter {
    count: i64,
}

fn main() {
    let chart = Statechart::new(
        Design::new(Counter { count: 0 })
            .action("add", |d: &mut Counter, cx: &EventContext| {
                d.count += cx.payload.as_i64().unwrap_or(0);
                Ok(())
            })
            .value("doubled", |d: &Counter| json!(d.count * 2))
            .root(
                StateConfig::new()
                    .initial("off")
                    .state("off", StateConfig::new().on("TOGGLE", to("on")))
                    .state(
                        "on",
                        StateConfig::new()
                            .on("TOGGLE", to("off"))
                            .on("ADD", Handler::new().run_named("add")),
                    ),
            ),
    )
    .expect("design compiles");

    chart.subscribe(|snapshot| {
        println!(
            "update: active={:?} count={} doubled={}",
            snapshot.active_paths, snapshot.data.count, snapshot.values["doubled"]
        );
    });

    chart.send("TOGGLE", Value::Null).unwrap();
    chart.send("ADD", json!(3)).unwrap();
    chart.send("ADD", json!(4)).unwrap();
    chart.send("TOGGLE", Value::Null).unwrap();

    // ADD only matches while `on` is active.
    chart.send("ADD", json!(100)).unwrap();
    println!("final count: {}", chart.snapshot().data.count);

    let description = chart.describe();
    println!(
        "graph: {}",
        serde_json::to_string_pretty(&description).unwrap()
    );
}
