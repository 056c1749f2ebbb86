//! Simulation observers.
//!
//! The engine reports its progress through the [`Printer`] trait, a
//! structured observer surface with no-op defaults: implementors override
//! only the callbacks they care about. The
//! [`Simulator`](crate::simulation::Simulator) bridges every calendar and
//! model listener hook onto the printer it was built with.
//!
//! Three implementations are provided:
//!
//! * [`NoopPrinter`] — ignores everything; the default choice for tests and
//!   headless runs,
//! * [`ConsolePrinter`] — ANSI-colored, line-per-callback rendering on
//!   standard output,
//! * [`EventRecorder`] — buffers every callback as a [`TraceRecord`] and
//!   yields them in first-in-first-out order; meant for assertions on
//!   simulation runs.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::calendar::Event;
use crate::time::SimTime;

/// A structured simulation observer.
///
/// All methods default to no-ops.
pub trait Printer<T: SimTime> {
    /// Virtual time advanced from `prev` to `next`.
    fn on_time_advanced(&self, prev: T, next: T) {
        let _ = (prev, next);
    }

    /// An event was inserted into the calendar.
    fn on_event_scheduled(&self, now: T, event: &Event<T>) {
        let _ = (now, event);
    }

    /// An event action is about to run.
    fn on_executing_event_action(&self, now: T, event: &Event<T>) {
        let _ = (now, event);
    }

    /// An atomic model transitioned between the rendered states.
    fn on_model_state_transition(&self, model: &str, time: T, prev: &str, next: &str) {
        let _ = (model, time, prev, next);
    }

    /// An atomic model enters the simulation with the rendered initial state.
    fn on_sim_start(&self, model: &str, time: T, state: &str) {
        let _ = (model, time, state);
    }

    /// A batch of concurrent events was dispatched.
    fn on_sim_step(&self, time: T, step: u64) {
        let _ = (time, step);
    }

    /// The simulation halted; the atomic model ends with the rendered state.
    fn on_sim_end(&self, model: &str, time: T, state: &str) {
        let _ = (model, time, state);
    }
}

/// A [`Printer`] that ignores every callback.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopPrinter;

impl<T: SimTime> Printer<T> for NoopPrinter {}

// SGR escape sequences used by `ConsolePrinter`.
const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";
const CYAN: &str = "\x1b[36m";
const YELLOW: &str = "\x1b[33m";
const GREEN: &str = "\x1b[32m";
const MAGENTA: &str = "\x1b[35m";

/// A [`Printer`] writing one ANSI-colored line per callback to standard
/// output.
#[derive(Copy, Clone, Debug, Default)]
pub struct ConsolePrinter {
    plain: bool,
}

impl ConsolePrinter {
    /// Creates a colored console printer.
    pub fn new() -> Self {
        Self { plain: false }
    }

    /// Creates a console printer without ANSI escape sequences.
    pub fn plain() -> Self {
        Self { plain: true }
    }

    fn paint(&self, color: &'static str) -> (&'static str, &'static str) {
        if self.plain {
            ("", "")
        } else {
            (color, RESET)
        }
    }
}

impl<T: SimTime> Printer<T> for ConsolePrinter {
    fn on_time_advanced(&self, prev: T, next: T) {
        let (on, off) = self.paint(DIM);
        println!("{}[T = {}] advancing time to {}{}", on, prev, next, off);
    }

    fn on_event_scheduled(&self, now: T, event: &Event<T>) {
        let (on, off) = self.paint(DIM);
        println!(
            "{}[T = {}] scheduled `{}` for model `{}` at {}{}",
            on,
            now,
            event.description(),
            event.model(),
            event.time(),
            off
        );
    }

    fn on_executing_event_action(&self, now: T, event: &Event<T>) {
        let (on, off) = self.paint(CYAN);
        println!(
            "{}[T = {}] executing `{}` for model `{}`{}",
            on,
            now,
            event.description(),
            event.model(),
            off
        );
    }

    fn on_model_state_transition(&self, model: &str, time: T, prev: &str, next: &str) {
        let (on, off) = self.paint(YELLOW);
        println!(
            "{}[T = {}] model `{}` transitioned from {} to {}{}",
            on, time, model, prev, next, off
        );
    }

    fn on_sim_start(&self, model: &str, time: T, state: &str) {
        let (on, off) = self.paint(GREEN);
        println!(
            "{}[T = {}] starting model `{}` in state {}{}",
            on, time, model, state, off
        );
    }

    fn on_sim_step(&self, time: T, step: u64) {
        let (on, off) = self.paint(DIM);
        println!("{}[T = {}] step {}{}", on, time, step, off);
    }

    fn on_sim_end(&self, model: &str, time: T, state: &str) {
        let (on, off) = self.paint(MAGENTA);
        println!(
            "{}[T = {}] finished model `{}` in state {}{}",
            on, time, model, state, off
        );
    }
}

/// A single observed callback.
#[derive(Clone, Debug, PartialEq)]
pub enum TraceRecord<T: SimTime> {
    /// Virtual time advanced.
    TimeAdvanced {
        /// Time before the advance.
        prev: T,
        /// Time after the advance.
        next: T,
    },
    /// An event was inserted into the calendar.
    EventScheduled {
        /// Virtual time at insertion.
        now: T,
        /// Scheduled firing time.
        time: T,
        /// Model owning the event.
        model: String,
        /// Event description.
        description: String,
    },
    /// An event action was dispatched.
    ExecutingEvent {
        /// Virtual time at dispatch.
        now: T,
        /// Scheduled firing time.
        time: T,
        /// Model owning the event.
        model: String,
        /// Event description.
        description: String,
    },
    /// An atomic model transitioned.
    StateTransition {
        /// The transitioning model.
        model: String,
        /// Transition time.
        time: T,
        /// Rendered state before the transition.
        prev: String,
        /// Rendered state after the transition.
        next: String,
    },
    /// An atomic model entered the simulation.
    SimStart {
        /// The model name.
        model: String,
        /// The simulation start time.
        time: T,
        /// Rendered initial state.
        state: String,
    },
    /// A batch of concurrent events was dispatched.
    SimStep {
        /// Virtual time after the batch.
        time: T,
        /// One-based step index.
        step: u64,
    },
    /// The simulation halted.
    SimEnd {
        /// The model name.
        model: String,
        /// The simulation end time.
        time: T,
        /// Rendered final state.
        state: String,
    },
}

/// A [`Printer`] buffering every callback as a [`TraceRecord`].
///
/// An `EventRecorder` is a cheaply clonable handle to a shared buffer.
/// Records are yielded in first-in-first-out order through the [`Iterator`]
/// implementation; [`EventRecorder::records`] takes a non-destructive
/// snapshot instead.
#[derive(Clone, Debug, Default)]
pub struct EventRecorder<T: SimTime> {
    buffer: Rc<RefCell<VecDeque<TraceRecord<T>>>>,
}

impl<T: SimTime> EventRecorder<T> {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self {
            buffer: Rc::new(RefCell::new(VecDeque::new())),
        }
    }

    /// A snapshot of all buffered records, oldest first.
    pub fn records(&self) -> Vec<TraceRecord<T>> {
        self.buffer.borrow().iter().cloned().collect()
    }

    fn push(&self, record: TraceRecord<T>) {
        self.buffer.borrow_mut().push_back(record);
    }
}

impl<T: SimTime> Iterator for EventRecorder<T> {
    type Item = TraceRecord<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.borrow_mut().pop_front()
    }
}

impl<T: SimTime> Printer<T> for EventRecorder<T> {
    fn on_time_advanced(&self, prev: T, next: T) {
        self.push(TraceRecord::TimeAdvanced { prev, next });
    }

    fn on_event_scheduled(&self, now: T, event: &Event<T>) {
        self.push(TraceRecord::EventScheduled {
            now,
            time: event.time(),
            model: event.model().to_owned(),
            description: event.description().to_owned(),
        });
    }

    fn on_executing_event_action(&self, now: T, event: &Event<T>) {
        self.push(TraceRecord::ExecutingEvent {
            now,
            time: event.time(),
            model: event.model().to_owned(),
            description: event.description().to_owned(),
        });
    }

    fn on_model_state_transition(&self, model: &str, time: T, prev: &str, next: &str) {
        self.push(TraceRecord::StateTransition {
            model: model.to_owned(),
            time,
            prev: prev.to_owned(),
            next: next.to_owned(),
        });
    }

    fn on_sim_start(&self, model: &str, time: T, state: &str) {
        self.push(TraceRecord::SimStart {
            model: model.to_owned(),
            time,
            state: state.to_owned(),
        });
    }

    fn on_sim_step(&self, time: T, step: u64) {
        self.push(TraceRecord::SimStep { time, step });
    }

    fn on_sim_end(&self, model: &str, time: T, state: &str) {
        self.push(TraceRecord::SimEnd {
            model: model.to_owned(),
            time,
            state: state.to_owned(),
        });
    }
}
