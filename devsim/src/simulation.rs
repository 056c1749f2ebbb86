//! Simulation management.
//!
//! A [`Simulator`] owns the calendar and the root model of a simulation
//! bench. It is created from a root-model factory — typically obtained from
//! [`Atomic::factory`](crate::model::Atomic::factory) or
//! [`Compound::factory`](crate::model::Compound::factory) — together with
//! the virtual time span to simulate and a [`Printer`] observer.
//!
//! The typical lifecycle is:
//!
//! 1. build the simulator from the root factory,
//! 2. inject external inputs with [`Simulator::schedule_input`] and attach
//!    output observers with [`Simulator::add_output_listener`],
//! 3. call [`Simulator::run`], which drives the calendar until no executable
//!    event remains at or before the end time.
//!
//! # Examples
//!
//! A counter incrementing once per virtual second:
//!
//! ```
//! use std::rc::Rc;
//!
//! use devsim::model::Atomic;
//! use devsim::printer::NoopPrinter;
//! use devsim::simulation::Simulator;
//!
//! let counter = Atomic::new(
//!     0i64,
//!     |s: &i64, _elapsed: f64, x: &i64| s + x,
//!     |s: &i64| s + 1,
//!     |s: &i64| *s,
//!     |_: &i64| 1.0,
//! );
//!
//! let mut simu = Simulator::new(
//!     "counter",
//!     counter.factory(),
//!     0.0,
//!     3.5,
//!     Rc::new(NoopPrinter),
//! )
//! .unwrap();
//!
//! simu.run().unwrap();
//! assert_eq!(simu.time(), 3.5);
//! ```

use std::fmt;
use std::rc::Rc;

use crate::calendar::{Calendar, ExecutionError, SchedulingError};
use crate::dynamic::Dynamic;
use crate::model::{Model, ModelFactory, OutputListener, SetupError};
use crate::printer::Printer;
use crate::time::SimTime;

/// Simulation environment.
///
/// The simulator uniquely owns the calendar and the root model; the root
/// model in turn owns its descendants. Models are torn down before the
/// calendar, so wiring closures referencing the calendar are dropped first.
pub struct Simulator<T: SimTime = f64> {
    // Dropped in declaration order: the root model and its wiring closures go
    // before the calendar handle.
    root: Rc<dyn Model<T>>,
    calendar: Calendar<T>,
    printer: Rc<dyn Printer<T>>,
    steps: u64,
}

impl<T: SimTime> Simulator<T> {
    /// Builds a simulator over the virtual time span `[start, end]` with the
    /// default simultaneity tolerance.
    pub fn new(
        root_name: &str,
        factory: ModelFactory<T>,
        start: T,
        end: T,
        printer: Rc<dyn Printer<T>>,
    ) -> Result<Self, SetupError> {
        Self::with_epsilon(root_name, factory, start, end, T::DEFAULT_EPSILON, printer)
    }

    /// Builds a simulator with an explicit simultaneity tolerance.
    pub fn with_epsilon(
        root_name: &str,
        factory: ModelFactory<T>,
        start: T,
        end: T,
        epsilon: T,
        printer: Rc<dyn Printer<T>>,
    ) -> Result<Self, SetupError> {
        let calendar = Calendar::new(start, end, epsilon);
        let root = factory(root_name, &calendar)?;

        {
            let printer = printer.clone();
            calendar.add_time_advanced_listener(Rc::new(move |prev, next| {
                printer.on_time_advanced(prev, next);
            }));
        }
        {
            let printer = printer.clone();
            calendar.add_event_scheduled_listener(Rc::new(move |now, event| {
                printer.on_event_scheduled(now, event);
            }));
        }
        {
            let printer = printer.clone();
            calendar.add_executing_event_listener(Rc::new(move |now, event| {
                printer.on_executing_event_action(now, event);
            }));
        }
        {
            let printer = printer.clone();
            root.add_state_transition_listener(Rc::new(move |model, time, prev, next| {
                printer.on_model_state_transition(model, time, prev, next);
            }));
        }

        Ok(Self {
            root,
            calendar,
            printer,
            steps: 0,
        })
    }

    /// The root model.
    pub fn model(&self) -> &Rc<dyn Model<T>> {
        &self.root
    }

    /// The shared calendar.
    pub fn calendar(&self) -> &Calendar<T> {
        &self.calendar
    }

    /// The current virtual time.
    pub fn time(&self) -> T {
        self.calendar.now()
    }

    /// Schedules an input on the root model at a future virtual time.
    pub fn schedule_input(
        &self,
        time: T,
        value: Dynamic,
        description: &str,
    ) -> Result<(), SchedulingError> {
        self.root.external_input(time, value, description)
    }

    /// Registers an output observer on the root model.
    pub fn add_output_listener(&self, listener: OutputListener<T>) {
        self.root.add_output_listener(listener);
    }

    /// Runs the simulation to completion.
    ///
    /// Dispatches concurrent batches in chronological order until no
    /// executable event remains at or before the calendar end time, then
    /// advances virtual time to the end time. Run-time errors abort the run
    /// and propagate.
    pub fn run(&mut self) -> Result<(), ExecutionError> {
        {
            let printer = self.printer.clone();
            let now = self.calendar.now();
            self.root
                .visit_atomic_states(&mut |model, state| printer.on_sim_start(model, now, state));
        }

        let select = self.root.select();
        while self.calendar.execute_next(&select)? {
            self.steps += 1;
            self.printer.on_sim_step(self.calendar.now(), self.steps);
        }

        {
            let printer = self.printer.clone();
            let now = self.calendar.now();
            self.root
                .visit_atomic_states(&mut |model, state| printer.on_sim_end(model, now, state));
        }

        Ok(())
    }
}

impl<T: SimTime> fmt::Debug for Simulator<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("root", &self.root.name())
            .field("calendar", &self.calendar)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}
