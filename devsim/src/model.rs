//! Model components.
//!
//! # Model interface
//!
//! Atomic and compound models share the object-safe [`Model`] trait. A model
//! exposes its name, an optional state snapshot, its tie-break
//! [`Select`] function, listener registration for inputs, outputs and state
//! transitions, and three input entry points:
//!
//! * [`Model::external_input`] — the public entry point used by a run harness
//!   to inject an input at a future virtual time;
//! * [`Model::input_from_influencer`] — used by wiring edges to schedule an
//!   input carrying the emission time of the influencer;
//! * [`Model::direct_input`] — immediate delivery without a calendar round
//!   trip, used by a compound to forward its own input to its children at
//!   the same instant.
//!
//! Models are driven entirely through [`Rc`] handles: listeners and wiring
//! edges registered against a model call back into it re-entrantly during
//! event dispatch, so all drivers use interior mutability.
//!
//! # Authoring atomic models
//!
//! An atomic model is specified by an initial state and the four classic
//! functions `(δ_ext, δ_int, λ, ta)`, bundled in an [`Atomic`] value:
//!
//! ```
//! use devsim::model::Atomic;
//!
//! // A saw-tooth counter: emits its count every second, accumulates inputs.
//! let counter = Atomic::new(
//!     0i64,
//!     |s: &i64, _elapsed: f64, x: &i64| s + x,
//!     |s: &i64| s + 1,
//!     |s: &i64| *s,
//!     |_: &i64| 1.0,
//! );
//! let factory = counter.factory();
//! ```
//!
//! All four functions are pure: they receive the state by reference and
//! return new values. The driver owns the mutable state, the
//! `time_of_last_event` bookkeeping and the cancellation key of the pending
//! internal transition.
//!
//! # Assembling compound models
//!
//! A compound model instantiates child models from factories and wires them
//! through an *influencer* table keyed by influencee. The key `None` denotes
//! the compound itself: as an influencer it stands for the compound's own
//! input, as an influencee for its own output. Every edge can carry an
//! optional [`Transformer`] converting the conveyed value; a missing
//! transformer is the identity.

mod atomic;
mod compound;

pub use atomic::{Atomic, AtomicModel};
pub use compound::{Compound, CompoundModel, Influencers};

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::calendar::{Calendar, ExecutionError, SchedulingError};
use crate::dynamic::{Dynamic, TypeMismatch};
use crate::time::SimTime;

/// The source label attached to inputs injected by the run harness.
pub const EXTERNAL: &str = "external";

/// A listener notified when a model receives an input, with the source name
/// and the delivered value.
pub type InputListener = Rc<dyn Fn(&str, &Dynamic)>;

/// A listener notified when a model emits an output.
///
/// Output listeners implement the wiring fan-out, so delivery to a
/// downstream model can fail; observers should return `Ok(())`.
pub type OutputListener<T> = Rc<dyn Fn(&str, T, &Dynamic) -> Result<(), ExecutionError>>;

/// A listener notified of a state transition, with the model name, the
/// transition time and the rendered previous and next states.
pub type StateTransitionListener<T> = Rc<dyn Fn(&str, T, &str, &str)>;

/// A tie-break function choosing, among the models owning simultaneous
/// events, the one whose event is dispatched next.
///
/// The returned name must be one of the candidates. The engine only invokes
/// the function for batches of at least two events.
pub type Select = Rc<dyn Fn(&[String]) -> String>;

/// A callable building a model against a shared calendar.
pub type ModelFactory<T> =
    Box<dyn FnOnce(&str, &Calendar<T>) -> Result<Rc<dyn Model<T>>, SetupError>>;

/// The default tie-break: first scheduled, first dispatched.
pub fn fifo_select() -> Select {
    Rc::new(|candidates: &[String]| {
        debug_assert!(!candidates.is_empty(), "select invoked without candidates");
        candidates[0].clone()
    })
}

/// A value conversion applied on a wiring edge.
///
/// Transformers are pure mappings between the influencer's output type and
/// the influencee's input type. They run in the influencee's reception
/// context; a transformer applied to a value of an unexpected type fails
/// with a [`TypeMismatch`], which the engine reports as fatal, naming both
/// endpoints of the edge.
#[derive(Clone)]
pub struct Transformer {
    apply: Rc<dyn Fn(Dynamic) -> Result<Dynamic, TypeMismatch>>,
}

impl Transformer {
    /// Wraps a typed conversion function.
    pub fn new<A, B, F>(f: F) -> Self
    where
        A: Clone + 'static,
        B: Clone + 'static,
        F: Fn(A) -> B + 'static,
    {
        Self {
            apply: Rc::new(move |value| {
                let input = value.downcast::<A>()?;
                Ok(Dynamic::new(f(input)))
            }),
        }
    }

    /// Applies the conversion to a conveyed value.
    pub fn apply(&self, value: Dynamic) -> Result<Dynamic, TypeMismatch> {
        (self.apply)(value)
    }
}

impl fmt::Debug for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Transformer").finish_non_exhaustive()
    }
}

/// The common surface of atomic and compound models.
pub trait Model<T: SimTime> {
    /// The model name, unique within its parent.
    fn name(&self) -> String;

    /// The tie-break function for simultaneous events.
    ///
    /// Atomic models return the FIFO default; compound models return the
    /// user-supplied function.
    fn select(&self) -> Select;

    /// A snapshot of the current state; `None` for compound models.
    fn state(&self) -> Option<Dynamic>;

    /// The child models, keyed by name; `None` for atomic models.
    fn components(&self) -> Option<BTreeMap<String, Rc<dyn Model<T>>>>;

    /// Registers a listener notified of every input delivery.
    fn add_input_listener(&self, listener: InputListener);

    /// Registers a listener notified of every emitted output.
    fn add_output_listener(&self, listener: OutputListener<T>);

    /// Registers a listener notified of every state transition of this model
    /// and, for compounds, of every descendant.
    fn add_state_transition_listener(&self, listener: StateTransitionListener<T>);

    /// Schedules an input conveyed by a wiring edge for delivery at the
    /// influencer's emission time.
    fn input_from_influencer(
        &self,
        from: &str,
        time: T,
        value: Dynamic,
        transformer: Option<Transformer>,
    ) -> Result<(), SchedulingError>;

    /// Delivers an input immediately, without a calendar round trip.
    fn direct_input(
        &self,
        from: &str,
        value: Dynamic,
        transformer: Option<Transformer>,
    ) -> Result<(), ExecutionError>;

    /// Schedules an input injected by the run harness for delivery at a
    /// future virtual time.
    fn external_input(&self, time: T, value: Dynamic, description: &str)
        -> Result<(), SchedulingError>;

    /// Visits every atomic descendant with its name and rendered state.
    fn visit_atomic_states(&self, visit: &mut dyn FnMut(&str, &str));
}

/// Error returned when a model cannot be constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SetupError {
    /// A model was given an empty name.
    EmptyName,
    /// A compound was given no components.
    EmptyCompound {
        /// The compound being constructed.
        compound: String,
    },
    /// A child carries the same name as its parent.
    NameCollision {
        /// The colliding name.
        name: String,
    },
    /// A wiring edge loops a component back to itself.
    SelfInfluence {
        /// The model named on both ends of the edge.
        model: String,
    },
    /// A wiring edge references a component that does not exist.
    UnknownComponent {
        /// The compound being constructed.
        compound: String,
        /// The missing component.
        component: String,
    },
    /// The initial internal transition could not be scheduled.
    Scheduling(SchedulingError),
}

impl fmt::Display for SetupError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyName => write!(fmt, "the model name cannot be empty"),
            Self::EmptyCompound { compound } => {
                write!(fmt, "compound `{}` has no components", compound)
            }
            Self::NameCollision { name } => write!(
                fmt,
                "component `{}` carries the same name as its parent",
                name
            ),
            Self::SelfInfluence { model } => {
                write!(fmt, "model `{}` cannot influence itself", model)
            }
            Self::UnknownComponent {
                compound,
                component,
            } => write!(
                fmt,
                "compound `{}` wires unknown component `{}`",
                compound, component
            ),
            Self::Scheduling(e) => e.fmt(fmt),
        }
    }
}

impl Error for SetupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Scheduling(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SchedulingError> for SetupError {
    fn from(e: SchedulingError) -> Self {
        Self::Scheduling(e)
    }
}
