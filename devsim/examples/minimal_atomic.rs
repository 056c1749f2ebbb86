//! Example: a minimal periodic counter.
//!
//! This example demonstrates in particular:
//!
//! * the declarative specification of an atomic model,
//! * external input injection,
//! * simulation monitoring with the console printer and an output listener.

use std::rc::Rc;

use devsim::dynamic::Dynamic;
use devsim::model::Atomic;
use devsim::printer::ConsolePrinter;
use devsim::simulation::Simulator;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A counter: every second it emits its count and increments it; an input
    // bumps the count immediately.
    let counter = Atomic::new(
        0i64,
        |s: &i64, _elapsed: f64, x: &i64| s + x,
        |s: &i64| s + 1,
        |s: &i64| *s,
        |_: &i64| 1.0,
    );

    let mut simu = Simulator::new(
        "counter",
        counter.factory(),
        0.0,
        10.0,
        Rc::new(ConsolePrinter::new()),
    )?;

    simu.add_output_listener(Rc::new(|model, time, value| {
        let count: &i64 = value.downcast_ref().unwrap();
        println!("        -> {model} emitted {count} at t = {time}");
        Ok(())
    }));

    // Bump the counter by 100 half-way through.
    simu.schedule_input(5.5, Dynamic::new(100i64), "bump by 100")?;

    simu.run()?;

    Ok(())
}
