//! Example: traffic light with a maintenance controller.
//!
//! This example demonstrates in particular:
//!
//! * a compound model wiring two atomic models,
//! * a typed transformer on a wiring edge,
//! * a custom `select` tie-break for simultaneous transitions,
//! * promotion of a child output to the compound output.
//!
//! ```text
//!                    ┌────────────────────────────────────────────┐
//!                    │ intersection                               │
//!                    │  ┌────────────┐            ┌────────────┐  │
//!                    │  │            │ String     │            │  │ Phase
//!                    │  │ controller ├───────────►│   light    ├──┼──────► observers
//!                    │  │            │ (command)  │            │  │
//!                    │  └────────────┘            └────────────┘  │
//!                    └────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::rc::Rc;

use devsim::model::{Atomic, Compound, ModelFactory, Transformer};
use devsim::printer::ConsolePrinter;
use devsim::simulation::Simulator;

/// The phases of the light.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    Red,
    Green,
    Yellow,
    Off,
}

impl Phase {
    fn next(self) -> Self {
        match self {
            Phase::Red => Phase::Green,
            Phase::Green => Phase::Yellow,
            Phase::Yellow => Phase::Red,
            Phase::Off => Phase::Off,
        }
    }

    fn duration(self) -> f64 {
        match self {
            Phase::Red => 30.0,
            Phase::Green => 25.0,
            Phase::Yellow => 5.0,
            Phase::Off => f64::INFINITY,
        }
    }
}

/// Commands understood by the light.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Command {
    Shutdown,
}

/// The light cycles Red -> Green -> Yellow and emits the phase it enters; a
/// `Shutdown` command turns it off for good.
fn light() -> ModelFactory<f64> {
    Atomic::new(
        Phase::Red,
        |_: &Phase, _elapsed: f64, command: &Command| match command {
            Command::Shutdown => Phase::Off,
        },
        |phase: &Phase| phase.next(),
        |phase: &Phase| phase.next(),
        |phase: &Phase| phase.duration(),
    )
    .factory()
}

/// The controller requests a shutdown after two minutes, as a plain string
/// that the wiring edge converts into a typed command.
fn controller() -> ModelFactory<f64> {
    Atomic::new(
        false,
        |armed: &bool, _elapsed: f64, _: &()| *armed,
        |_: &bool| true,
        |_: &bool| "shutdown".to_owned(),
        |armed: &bool| if *armed { f64::INFINITY } else { 120.0 },
    )
    .factory()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let intersection = Compound::new(
        BTreeMap::from([
            ("controller".to_owned(), controller()),
            ("light".to_owned(), light()),
        ]),
        BTreeMap::from([
            // controller -> light, converting the string message to a command.
            (
                Some("light".to_owned()),
                BTreeMap::from([(
                    Some("controller".to_owned()),
                    Some(Transformer::new(|_: String| Command::Shutdown)),
                )]),
            ),
            // The light phases are the compound's own output.
            (
                None,
                BTreeMap::from([(Some("light".to_owned()), None)]),
            ),
        ]),
    )
    // On simultaneous transitions, let the controller act first.
    .with_select(Rc::new(|candidates: &[String]| {
        if candidates.iter().any(|c| c == "controller") {
            "controller".to_owned()
        } else {
            candidates[0].clone()
        }
    }));

    let mut simu = Simulator::new(
        "intersection",
        intersection.factory(),
        0.0,
        300.0,
        Rc::new(ConsolePrinter::new()),
    )?;

    simu.add_output_listener(Rc::new(|_model, time, value| {
        let phase: &Phase = value.downcast_ref().unwrap();
        println!("        -> light switched to {phase:?} at t = {time}");
        Ok(())
    }));

    simu.run()?;

    Ok(())
}
