//! Atomic model driver.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::calendar::{Action, Calendar, Event, EventKey, ExecutionError, SchedulingError};
use crate::dynamic::{Dynamic, TypeMismatch};
use crate::model::{
    fifo_select, InputListener, Model, ModelFactory, OutputListener, Select, SetupError,
    StateTransitionListener, Transformer, EXTERNAL,
};
use crate::time::SimTime;

/// The specification of an atomic model: an initial state and the four
/// classic functions `(δ_ext, δ_int, λ, ta)`.
///
/// `X`, `Y` and `S` are the input, output and state types; all three are
/// erased behind [`Dynamic`] once the model is built, so heterogeneously
/// typed atomic models can share one calendar.
pub struct Atomic<X, Y, S, T = f64> {
    initial: S,
    delta_external: Box<dyn Fn(&S, T, &X) -> S>,
    delta_internal: Box<dyn Fn(&S) -> S>,
    output: Box<dyn Fn(&S) -> Y>,
    time_advance: Box<dyn Fn(&S) -> T>,
}

impl<X, Y, S, T> Atomic<X, Y, S, T>
where
    X: Clone + 'static,
    Y: Clone + 'static,
    S: Clone + fmt::Debug + 'static,
    T: SimTime,
{
    /// Bundles an initial state with the transition, output and time-advance
    /// functions.
    pub fn new(
        initial: S,
        delta_external: impl Fn(&S, T, &X) -> S + 'static,
        delta_internal: impl Fn(&S) -> S + 'static,
        output: impl Fn(&S) -> Y + 'static,
        time_advance: impl Fn(&S) -> T + 'static,
    ) -> Self {
        Self {
            initial,
            delta_external: Box::new(delta_external),
            delta_internal: Box::new(delta_internal),
            output: Box::new(output),
            time_advance: Box::new(time_advance),
        }
    }

    /// Converts the specification into a model factory.
    pub fn factory(self) -> ModelFactory<T> {
        Box::new(move |name, calendar| {
            AtomicModel::build(name, calendar, self).map(|model| model as Rc<dyn Model<T>>)
        })
    }
}

impl<X, Y, S: fmt::Debug, T> fmt::Debug for Atomic<X, Y, S, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Atomic")
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}

/// An object-safe view of the typed behavior of an atomic model.
trait Behavior<T: SimTime> {
    /// A type-erased snapshot of the current state.
    fn snapshot(&self) -> Dynamic;

    /// The current state, rendered for observers.
    fn state_string(&self) -> String;

    /// The delay until the next internal transition.
    fn time_advance(&self) -> T;

    /// Performs the internal transition, returning the emitted output and
    /// the rendered previous and next states.
    fn internal(&mut self) -> (Dynamic, String, String);

    /// Performs the external transition, returning the rendered previous and
    /// next states.
    fn external(&mut self, elapsed: T, input: &Dynamic) -> Result<(String, String), TypeMismatch>;
}

struct TypedBehavior<X, Y, S, T> {
    state: S,
    delta_external: Box<dyn Fn(&S, T, &X) -> S>,
    delta_internal: Box<dyn Fn(&S) -> S>,
    output: Box<dyn Fn(&S) -> Y>,
    time_advance: Box<dyn Fn(&S) -> T>,
}

impl<X, Y, S, T> Behavior<T> for TypedBehavior<X, Y, S, T>
where
    X: Clone + 'static,
    Y: Clone + 'static,
    S: Clone + fmt::Debug + 'static,
    T: SimTime,
{
    fn snapshot(&self) -> Dynamic {
        Dynamic::new(self.state.clone())
    }

    fn state_string(&self) -> String {
        format!("{:?}", self.state)
    }

    fn time_advance(&self) -> T {
        (self.time_advance)(&self.state)
    }

    fn internal(&mut self) -> (Dynamic, String, String) {
        // The output function observes the pre-transition state.
        let output = (self.output)(&self.state);
        let next = (self.delta_internal)(&self.state);

        let prev_str = format!("{:?}", self.state);
        let next_str = format!("{:?}", next);
        self.state = next;

        (Dynamic::new(output), prev_str, next_str)
    }

    fn external(&mut self, elapsed: T, input: &Dynamic) -> Result<(String, String), TypeMismatch> {
        let input = input.downcast_ref::<X>()?;
        let next = (self.delta_external)(&self.state, elapsed, input);

        let prev_str = format!("{:?}", self.state);
        let next_str = format!("{:?}", next);
        self.state = next;

        Ok((prev_str, next_str))
    }
}

/// The driver of an atomic model.
///
/// The driver keeps the mutable state, the time of the last transition and
/// the cancellation key of the pending internal transition. At most one
/// internal transition of a given model is live in the calendar at any time:
/// every input delivery cancels the pending one before recomputing it from
/// the new state.
pub struct AtomicModel<T: SimTime = f64> {
    inner: Rc<RefCell<AtomicInner<T>>>,
}

struct AtomicInner<T: SimTime> {
    name: String,
    calendar: Calendar<T>,
    behavior: Box<dyn Behavior<T>>,
    last_transition: T,
    pending_internal: Option<EventKey>,
    input_listeners: Vec<InputListener>,
    output_listeners: Vec<OutputListener<T>>,
    transition_listeners: Vec<StateTransitionListener<T>>,
}

impl<T: SimTime> AtomicModel<T> {
    fn build<X, Y, S>(
        name: &str,
        calendar: &Calendar<T>,
        spec: Atomic<X, Y, S, T>,
    ) -> Result<Rc<Self>, SetupError>
    where
        X: Clone + 'static,
        Y: Clone + 'static,
        S: Clone + fmt::Debug + 'static,
    {
        if name.is_empty() {
            return Err(SetupError::EmptyName);
        }

        let behavior = Box::new(TypedBehavior {
            state: spec.initial,
            delta_external: spec.delta_external,
            delta_internal: spec.delta_internal,
            output: spec.output,
            time_advance: spec.time_advance,
        });

        let inner = Rc::new(RefCell::new(AtomicInner {
            name: name.to_owned(),
            calendar: calendar.clone(),
            behavior,
            last_transition: calendar.now(),
            pending_internal: None,
            input_listeners: Vec::new(),
            output_listeners: Vec::new(),
            transition_listeners: Vec::new(),
        }));

        schedule_internal(&inner)?;

        Ok(Rc::new(Self { inner }))
    }

    /// Schedules delivery of an input at the specified time.
    fn schedule_delivery(
        &self,
        from: &str,
        time: T,
        value: Dynamic,
        transformer: Option<Transformer>,
        description: String,
    ) -> Result<(), SchedulingError> {
        let (name, calendar) = {
            let inner = self.inner.borrow();
            (inner.name.clone(), inner.calendar.clone())
        };

        let weak = Rc::downgrade(&self.inner);
        let from = from.to_owned();
        let action: Action = Box::new(move || match weak.upgrade() {
            Some(inner) => deliver(&inner, &from, value, transformer),
            None => Ok(()),
        });

        calendar.schedule(Event::new(time, name, description, action))
    }
}

impl<T: SimTime> Model<T> for AtomicModel<T> {
    fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    fn select(&self) -> Select {
        fifo_select()
    }

    fn state(&self) -> Option<Dynamic> {
        Some(self.inner.borrow().behavior.snapshot())
    }

    fn components(&self) -> Option<BTreeMap<String, Rc<dyn Model<T>>>> {
        None
    }

    fn add_input_listener(&self, listener: InputListener) {
        self.inner.borrow_mut().input_listeners.push(listener);
    }

    fn add_output_listener(&self, listener: OutputListener<T>) {
        self.inner.borrow_mut().output_listeners.push(listener);
    }

    fn add_state_transition_listener(&self, listener: StateTransitionListener<T>) {
        self.inner.borrow_mut().transition_listeners.push(listener);
    }

    fn input_from_influencer(
        &self,
        from: &str,
        time: T,
        value: Dynamic,
        transformer: Option<Transformer>,
    ) -> Result<(), SchedulingError> {
        let description = format!("input from {}", from);
        self.schedule_delivery(from, time, value, transformer, description)
    }

    fn direct_input(
        &self,
        from: &str,
        value: Dynamic,
        transformer: Option<Transformer>,
    ) -> Result<(), ExecutionError> {
        deliver(&self.inner, from, value, transformer)
    }

    fn external_input(
        &self,
        time: T,
        value: Dynamic,
        description: &str,
    ) -> Result<(), SchedulingError> {
        self.schedule_delivery(EXTERNAL, time, value, None, description.to_owned())
    }

    fn visit_atomic_states(&self, visit: &mut dyn FnMut(&str, &str)) {
        let (name, state) = {
            let inner = self.inner.borrow();
            (inner.name.clone(), inner.behavior.state_string())
        };

        visit(&name, &state);
    }
}

impl<T: SimTime> fmt::Debug for AtomicModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("AtomicModel")
            .field("name", &inner.name)
            .field("state", &inner.behavior.state_string())
            .field("last_transition", &inner.last_transition)
            .finish_non_exhaustive()
    }
}

/// Schedules the next internal transition at `now + ta(s)`, storing its
/// cancellation key; a previously stored key is discarded.
fn schedule_internal<T: SimTime>(
    inner_rc: &Rc<RefCell<AtomicInner<T>>>,
) -> Result<(), SchedulingError> {
    let (calendar, event) = {
        let mut inner = inner_rc.borrow_mut();

        let delay = inner.behavior.time_advance();
        if delay.is_infinite() {
            inner.pending_internal = None;
            return Ok(());
        }

        let time = inner.calendar.now() + delay;
        let weak = Rc::downgrade(inner_rc);
        let action: Action = Box::new(move || match weak.upgrade() {
            Some(inner) => internal_transition(&inner),
            None => Ok(()),
        });

        let event = Event::new(time, inner.name.clone(), "internal transition", action);
        inner.pending_internal = Some(event.key());

        (inner.calendar.clone(), event)
    };

    calendar.schedule(event)
}

/// The action of an internal-transition event.
fn internal_transition<T: SimTime>(
    inner_rc: &Rc<RefCell<AtomicInner<T>>>,
) -> Result<(), ExecutionError> {
    let (name, now, output, prev, next, transition_listeners, output_listeners) = {
        let mut inner = inner_rc.borrow_mut();

        let now = inner.calendar.now();
        let (output, prev, next) = inner.behavior.internal();
        inner.last_transition = now;
        inner.pending_internal = None;

        (
            inner.name.clone(),
            now,
            output,
            prev,
            next,
            inner.transition_listeners.clone(),
            inner.output_listeners.clone(),
        )
    };

    for listener in &transition_listeners {
        listener(&name, now, &prev, &next);
    }
    // Synchronous fan-out: downstream deliveries are scheduled before the
    // running batch continues.
    for listener in &output_listeners {
        listener(&name, now, &output)?;
    }

    schedule_internal(inner_rc).map_err(ExecutionError::from)
}

/// The input path: cancels the pending internal transition, applies the
/// external transition and reschedules from the new state.
fn deliver<T: SimTime>(
    inner_rc: &Rc<RefCell<AtomicInner<T>>>,
    from: &str,
    value: Dynamic,
    transformer: Option<Transformer>,
) -> Result<(), ExecutionError> {
    // The transformer runs in this model's reception context.
    let value = match &transformer {
        Some(transformer) => transformer.apply(value).map_err(|mismatch| {
            ExecutionError::TransformerTypeMismatch {
                influencer: from.to_owned(),
                influencee: inner_rc.borrow().name.clone(),
                mismatch,
            }
        })?,
        None => value,
    };

    let input_listeners = inner_rc.borrow().input_listeners.clone();
    for listener in &input_listeners {
        listener(from, &value);
    }

    let (name, now, prev, next, transition_listeners) = {
        let mut inner = inner_rc.borrow_mut();

        if let Some(key) = inner.pending_internal.take() {
            key.cancel();
        }

        let now = inner.calendar.now();
        let elapsed = now - inner.last_transition;
        let name = inner.name.clone();
        let (prev, next) = inner.behavior.external(elapsed, &value).map_err(|mismatch| {
            ExecutionError::InputTypeMismatch {
                model: name.clone(),
                from: from.to_owned(),
                mismatch,
            }
        })?;
        inner.last_transition = now;

        (name, now, prev, next, inner.transition_listeners.clone())
    };

    for listener in &transition_listeners {
        listener(&name, now, &prev, &next);
    }

    schedule_internal(inner_rc).map_err(ExecutionError::from)
}
