//! A stopwatch driven by a lifecycle-bound repeater.
//!
//! The engine's clock is host-driven: this demo sleeps until the next
//! timer deadline and advances the chart by exactly that much.
//!
//! Run with: cargo run --example stopwatch

use ramify::{Design, EventContext, Handler, StateConfig, Statechart, to};
use serde_json::Value;

#[derive(Clone, PartialEq, Debug)]
struct Stopwatch {
    seconds: u64,
}

#[tokio::main]
async fn main() {
    let chart = Statechart::new(
        Design::new(Stopwatch { seconds: 0 })
            .action("tick", |d: &mut Stopwatch, _: &EventContext| {
                d.seconds += 1;
                Ok(())
            })
            .root(
                StateConfig::new()
                    .initial("paused")
                    .state("paused", StateConfig::new().on("TOGGLE", to("running")))
                    .state(
                        "running",
                        StateConfig::new()
                            .repeat(1.0, Handler::new().run_named("tick"))
                            .on("TOGGLE", to("paused")),
                    ),
            ),
    )
    .expect("design compiles");

    chart.subscribe(|snapshot| {
        println!("{:>3}s  {:?}", snapshot.data.seconds, snapshot.active_paths);
    });

    chart.send("TOGGLE", Value::Null).unwrap();
    println!("running for five seconds...");

    for _ in 0..5 {
        let Some(gap) = chart.next_deadline() else {
            break;
        };
        tokio::time::sleep(gap).await;
        chart.advance(gap).unwrap();
    }

    chart.send("TOGGLE", Value::Null).unwrap();
    println!("paused at {}s", chart.snapshot().data.seconds);
}
