//! A hierarchical discrete-event (DEVS) simulation kernel.
//!
//! Devsim executes classic Parallel DEVS models on a shared event calendar
//! with deterministic, simultaneity-aware semantics. A simulation bench is a
//! tree of models: *atomic* models are user-supplied state machines defined
//! by the four classic functions `(δ_ext, δ_int, λ, ta)`, while *compound*
//! models wire child models together through an influencer graph whose edges
//! can carry value transformers, with a user-controlled tie-break among
//! simultaneous transitions.
//!
//! The engine is strictly single-threaded and cooperative: the calendar is
//! the only scheduler, every state change happens inside an event action and
//! actions run to completion. Virtual time is decoupled from the wall clock
//! and advances only between batches of concurrent events.
//!
//! # A practical overview
//!
//! Simulating a system involves three activities:
//!
//! 1. the design of atomic models for each sub-system,
//! 2. the assembly of a bench by wiring models inside a compound,
//! 3. the execution of the simulation, driven by the
//!    [`Simulator`](simulation::Simulator) façade.
//!
//! ## Authoring atomic models
//!
//! An atomic model is specified declaratively with
//! [`Atomic::new`](model::Atomic::new): an initial state, the external
//! transition `δ_ext(s, elapsed, x)`, the internal transition `δ_int(s)`,
//! the output function `λ(s)` and the time advance `ta(s)`. All four are
//! pure functions; the engine owns the mutable state and the scheduling
//! bookkeeping. A `ta` of [`SimTime::INFINITY`](time::SimTime::INFINITY)
//! passivates the model until the next input.
//!
//! ## Assembling compound models
//!
//! A compound is specified with [`Compound::new`](model::Compound::new) from
//! named component factories and an influencer table keyed by influencee.
//! The key `None` stands for the compound itself, so the table uniformly
//! expresses child→child wiring, the routing of the compound's own input
//! down to its children, and the promotion of a child's output to the
//! compound's output. Each edge may carry a
//! [`Transformer`](model::Transformer) converting the conveyed value between
//! the endpoint types.
//!
//! ## Running simulations
//!
//! The [`Simulator`](simulation::Simulator) builds the calendar and the root
//! model, bridges a [`Printer`](printer::Printer) observer onto the engine
//! hooks, and drives the run loop until no executable event remains at or
//! before the end time:
//!
//! ```
//! use std::rc::Rc;
//!
//! use devsim::dynamic::Dynamic;
//! use devsim::model::Atomic;
//! use devsim::printer::NoopPrinter;
//! use devsim::simulation::Simulator;
//!
//! // A periodic counter: emits its count every second; an input bumps the
//! // count immediately.
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
//!     10.0,
//!     Rc::new(NoopPrinter),
//! )
//! .unwrap();
//!
//! // Observe the outputs.
//! simu.add_output_listener(Rc::new(|model, time, value| {
//!     let count: &i64 = value.downcast_ref().unwrap();
//!     println!("[{time}] {model} emitted {count}");
//!     Ok(())
//! }));
//!
//! // Inject an input at t = 2.5 and run to completion.
//! simu.schedule_input(2.5, Dynamic::new(10i64), "bump")?;
//! simu.run()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Simultaneity
//!
//! Floating point timestamps drift, and zero-delay cascades legitimately
//! produce several transitions at one instant. The calendar therefore treats
//! events whose times differ by at most a tolerance `ε` as *concurrent*: they
//! are extracted as one batch, ordered by the root model's
//! [`Select`](model::Select) function (FIFO by default), and any event
//! scheduled within `ε` of the batch anchor while the batch is running is
//! drained into it rather than deferred. Details are documented in the
//! [`calendar`] module.
//!
//! # Observability
//!
//! The [`printer`] module provides the structured observer surface consumed
//! by the simulator, along with an ANSI console implementation and a
//! recording sink for tests. With the `tracing` feature enabled, event
//! scheduling and dispatch are additionally instrumented with
//! [`tracing`](https://docs.rs/tracing) spans carrying the model name.

#![warn(missing_docs, missing_debug_implementations, unreachable_pub)]

pub mod calendar;
pub mod dynamic;
pub mod model;
pub mod printer;
pub mod simulation;
pub mod time;
