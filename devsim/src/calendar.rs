//! Priority-ordered event calendar with cancellation and simultaneity
//! handling.
//!
//! The [`Calendar`] is the only scheduler of a simulation: every deferred
//! effect is an [`Event`] inserted into it and every state change happens
//! inside an event action. Events are totally ordered by firing time, with
//! FIFO ordering among events scheduled for the same time.
//!
//! # Concurrent batches
//!
//! Two events whose times differ by at most the calendar tolerance `ε` are
//! treated as *concurrent*. [`Calendar::execute_next`] extracts the whole
//! batch of events concurrent with the earliest pending event, advances
//! virtual time once to the batch anchor, then dispatches the batch:
//!
//! - while more than one event remains, a user-supplied
//!   [`Select`](crate::model::Select) function picks the model whose event
//!   runs next;
//! - an event cancelled by an earlier action of the same batch is dropped
//!   silently;
//! - after each execution, events newly scheduled within `ε` of the anchor
//!   are greedily drained into the batch, so that a zero-delay cascade
//!   triggered by an action is dispatched at the same instant rather than
//!   deferred.
//!
//! # Cancellation
//!
//! Each event shares its cancellation flag with the [`EventKey`]s issued for
//! it. Cancelled events are skipped during extraction and never executed.
//!
//! # Observers
//!
//! Time advancement, event insertion and event dispatch can each be observed
//! through listener registration; the
//! [`Simulator`](crate::simulation::Simulator) uses these hooks to feed its
//! [`Printer`](crate::printer::Printer).

mod event;
mod queue;

pub use event::{Action, Event, EventKey};

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use crate::dynamic::TypeMismatch;
use crate::model::Select;
use crate::time::SimTime;

use queue::EventQueue;

/// A listener notified when virtual time advances, with the previous and new
/// time.
pub type TimeAdvancedListener<T> = Rc<dyn Fn(T, T)>;

/// A listener notified of an event, together with the current virtual time.
pub type EventListener<T> = Rc<dyn Fn(T, &Event<T>)>;

/// The shared event calendar.
///
/// A `Calendar` is a cheaply clonable handle to the underlying event queue
/// and clock; models keep a clone to schedule their own transitions. All
/// methods take `&self`, so a handle can be used from within a running event
/// action.
pub struct Calendar<T: SimTime = f64> {
    inner: Rc<RefCell<CalendarInner<T>>>,
}

impl<T: SimTime> Clone for Calendar<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct CalendarInner<T: SimTime> {
    queue: EventQueue<T>,
    now: T,
    end: T,
    epsilon: T,
    time_advanced: Vec<TimeAdvancedListener<T>>,
    event_scheduled: Vec<EventListener<T>>,
    executing_event: Vec<EventListener<T>>,
}

impl<T: SimTime> CalendarInner<T> {
    /// Discards cancelled events sitting at the head of the queue.
    fn drop_cancelled(&mut self) {
        while self.queue.peek().map_or(false, |e| e.is_cancelled()) {
            self.queue.pull();
        }
    }

    /// Extracts every pending event concurrent with the anchor time.
    fn drain_concurrent(&mut self, anchor: T) -> VecDeque<Event<T>> {
        let mut batch = VecDeque::new();

        loop {
            self.drop_cancelled();
            let concurrent = match self.queue.peek() {
                Some(head) => {
                    head.time().abs_diff(anchor).total_cmp(&self.epsilon) != Ordering::Greater
                }
                None => false,
            };
            if !concurrent {
                break;
            }
            if let Some(event) = self.queue.pull() {
                batch.push_back(event);
            }
        }

        batch
    }
}

impl<T: SimTime> Calendar<T> {
    /// Creates a calendar covering the virtual time span `[start, end]` with
    /// the specified simultaneity tolerance.
    pub fn new(start: T, end: T, epsilon: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(CalendarInner {
                queue: EventQueue::new(),
                now: start,
                end,
                epsilon,
                time_advanced: Vec::new(),
                event_scheduled: Vec::new(),
                executing_event: Vec::new(),
            })),
        }
    }

    /// The current virtual time.
    pub fn now(&self) -> T {
        self.inner.borrow().now
    }

    /// The virtual time at which the simulation halts.
    pub fn end(&self) -> T {
        self.inner.borrow().end
    }

    /// The simultaneity tolerance.
    pub fn epsilon(&self) -> T {
        self.inner.borrow().epsilon
    }

    /// Registers a listener notified whenever virtual time advances by more
    /// than the tolerance.
    pub fn add_time_advanced_listener(&self, listener: TimeAdvancedListener<T>) {
        self.inner.borrow_mut().time_advanced.push(listener);
    }

    /// Registers a listener notified whenever an event is inserted.
    pub fn add_event_scheduled_listener(&self, listener: EventListener<T>) {
        self.inner.borrow_mut().event_scheduled.push(listener);
    }

    /// Registers a listener notified immediately before an event action runs.
    pub fn add_executing_event_listener(&self, listener: EventListener<T>) {
        self.inner.borrow_mut().executing_event.push(listener);
    }

    /// Inserts an event into the calendar.
    ///
    /// An error is returned if the event time lies in the past of the current
    /// virtual time.
    pub fn schedule(&self, event: Event<T>) -> Result<(), SchedulingError> {
        let (now, listeners) = {
            let inner = self.inner.borrow();
            if event.time().total_cmp(&inner.now) == Ordering::Less {
                return Err(SchedulingError::PastSchedule);
            }

            (inner.now, inner.event_scheduled.clone())
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(
            target: env!("CARGO_PKG_NAME"),
            model = event.model(),
            time = %event.time(),
            description = event.description(),
            "event scheduled"
        );

        for listener in &listeners {
            listener(now, &event);
        }
        self.inner.borrow_mut().queue.insert(event);

        Ok(())
    }

    /// Extracts and dispatches the next concurrent batch of events, advancing
    /// virtual time to the batch anchor.
    ///
    /// Returns `Ok(false)` when no executable event remains at or before the
    /// calendar end time; virtual time is then advanced to the end time and
    /// the simulation should halt. Simultaneous events from distinct models
    /// are dispatched in the order chosen by `select`.
    pub fn execute_next(&self, select: &Select) -> Result<bool, ExecutionError> {
        let batch = {
            let mut inner = self.inner.borrow_mut();
            inner.drop_cancelled();

            let next_time = inner.queue.peek().map(|head| head.time());
            match next_time {
                Some(anchor) if anchor.total_cmp(&inner.end) != Ordering::Greater => {
                    Some((anchor, inner.drain_concurrent(anchor)))
                }
                _ => None,
            }
        };

        let (anchor, mut batch) = match batch {
            Some(batch) => batch,
            None => {
                let end = self.end();
                self.advance_time(end);
                return Ok(false);
            }
        };
        self.advance_time(anchor);

        while !batch.is_empty() {
            let event = if batch.len() == 1 {
                match batch.pop_front() {
                    Some(event) => event,
                    None => break,
                }
            } else {
                let candidates: Vec<String> =
                    batch.iter().map(|e| e.model().to_owned()).collect();
                let chosen = select(&candidates);
                let index = match batch.iter().position(|e| e.model() == chosen) {
                    Some(index) => index,
                    None => {
                        return Err(ExecutionError::SelectInvalid {
                            returned: chosen,
                            candidates,
                        })
                    }
                };
                match batch.remove(index) {
                    Some(event) => event,
                    None => break,
                }
            };

            // The event may have been cancelled by an earlier action of this
            // batch.
            if event.is_cancelled() {
                continue;
            }

            self.notify_executing(&event);

            #[cfg(feature = "tracing")]
            let _span = tracing::info_span!(
                target: env!("CARGO_PKG_NAME"),
                "model",
                name = %event.model()
            )
            .entered();

            event.invoke()?;

            // An action may have scheduled zero-delay events at this very
            // instant; they belong to the running batch.
            let drained = self.inner.borrow_mut().drain_concurrent(anchor);
            batch.extend(drained);
        }

        Ok(true)
    }

    /// Sets the virtual time, notifying the time-advanced listeners if the
    /// advance exceeds the tolerance.
    fn advance_time(&self, to: T) {
        let (prev, epsilon, listeners) = {
            let mut inner = self.inner.borrow_mut();
            let prev = inner.now;
            inner.now = to;

            (prev, inner.epsilon, inner.time_advanced.clone())
        };

        if prev.abs_diff(to).total_cmp(&epsilon) == Ordering::Greater {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                target: env!("CARGO_PKG_NAME"),
                from = %prev,
                to = %to,
                "time advanced"
            );

            for listener in &listeners {
                listener(prev, to);
            }
        }
    }

    fn notify_executing(&self, event: &Event<T>) {
        let (now, listeners) = {
            let inner = self.inner.borrow();

            (inner.now, inner.executing_event.clone())
        };

        for listener in &listeners {
            listener(now, event);
        }
    }
}

impl<T: SimTime> fmt::Debug for Calendar<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Calendar")
            .field("now", &inner.now)
            .field("end", &inner.end)
            .field("epsilon", &inner.epsilon)
            .finish_non_exhaustive()
    }
}

/// Error returned when an event cannot be inserted into the calendar.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SchedulingError {
    /// The event time lies in the past of the current virtual time.
    PastSchedule,
}

impl fmt::Display for SchedulingError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PastSchedule => write!(
                fmt,
                "the scheduled time lies in the past of the current virtual time"
            ),
        }
    }
}

impl Error for SchedulingError {}

/// Error aborting a simulation run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionError {
    /// An action attempted to schedule an event in the past.
    Scheduling(SchedulingError),
    /// The select function returned a model name absent from the candidate
    /// list.
    SelectInvalid {
        /// The name returned by the select function.
        returned: String,
        /// The names of the models with an event in the batch.
        candidates: Vec<String>,
    },
    /// A model could not accept a delivered input value.
    InputTypeMismatch {
        /// The receiving model.
        model: String,
        /// The source of the input.
        from: String,
        /// The underlying type error.
        mismatch: TypeMismatch,
    },
    /// A transformer on a wiring edge could not accept the conveyed value.
    TransformerTypeMismatch {
        /// The source endpoint of the edge.
        influencer: String,
        /// The destination endpoint of the edge.
        influencee: String,
        /// The underlying type error.
        mismatch: TypeMismatch,
    },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scheduling(e) => e.fmt(fmt),
            Self::SelectInvalid {
                returned,
                candidates,
            } => write!(
                fmt,
                "the select function returned `{}`, which is not among the candidates {:?}",
                returned, candidates
            ),
            Self::InputTypeMismatch {
                model,
                from,
                mismatch,
            } => write!(
                fmt,
                "model `{}` cannot accept the input received from `{}`: {}",
                model, from, mismatch
            ),
            Self::TransformerTypeMismatch {
                influencer,
                influencee,
                mismatch,
            } => write!(
                fmt,
                "the transformer on the connection from `{}` to `{}` failed: {}",
                influencer, influencee, mismatch
            ),
        }
    }
}

impl Error for ExecutionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Scheduling(e) => Some(e),
            Self::InputTypeMismatch { mismatch, .. } => Some(mismatch),
            Self::TransformerTypeMismatch { mismatch, .. } => Some(mismatch),
            Self::SelectInvalid { .. } => None,
        }
    }
}

impl From<SchedulingError> for ExecutionError {
    fn from(e: SchedulingError) -> Self {
        Self::Scheduling(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fifo_select;

    use std::cell::RefCell;

    /// An event appending its label to the log when executed.
    fn logged(
        time: f64,
        model: &str,
        log: &Rc<RefCell<Vec<String>>>,
    ) -> Event<f64> {
        let log = log.clone();
        let label = model.to_owned();
        Event::new(
            time,
            model,
            "log",
            Box::new(move || {
                log.borrow_mut().push(label);
                Ok(())
            }),
        )
    }

    #[test]
    fn scheduling_in_the_past_fails() {
        let calendar = Calendar::new(5.0, 10.0, 1e-3);

        let err = calendar
            .schedule(logged(4.0, "m", &Rc::new(RefCell::new(Vec::new()))))
            .unwrap_err();

        assert_eq!(err, SchedulingError::PastSchedule);
    }

    #[test]
    fn events_execute_in_time_order() {
        let calendar = Calendar::new(0.0, 10.0, 1e-3);
        let log = Rc::new(RefCell::new(Vec::new()));

        calendar.schedule(logged(3.0, "late", &log)).unwrap();
        calendar.schedule(logged(1.0, "early", &log)).unwrap();
        calendar.schedule(logged(2.0, "mid", &log)).unwrap();

        let select = fifo_select();
        while calendar.execute_next(&select).unwrap() {}

        assert_eq!(*log.borrow(), ["early", "mid", "late"]);
        assert_eq!(calendar.now(), 10.0);
    }

    #[test]
    fn cancelled_events_are_never_executed() {
        let calendar = Calendar::new(0.0, 10.0, 1e-3);
        let log = Rc::new(RefCell::new(Vec::new()));

        let doomed = logged(1.0, "doomed", &log);
        let key = doomed.key();
        calendar.schedule(doomed).unwrap();
        calendar.schedule(logged(1.0, "survivor", &log)).unwrap();
        key.cancel();

        let select = fifo_select();
        while calendar.execute_next(&select).unwrap() {}

        assert_eq!(*log.borrow(), ["survivor"]);
    }

    #[test]
    fn events_within_epsilon_form_one_batch() {
        let calendar = Calendar::new(0.0, 10.0, 1e-3);
        let log = Rc::new(RefCell::new(Vec::new()));

        calendar.schedule(logged(1.0, "a", &log)).unwrap();
        calendar.schedule(logged(1.0004, "b", &log)).unwrap();
        calendar.schedule(logged(1.1, "c", &log)).unwrap();

        let select = fifo_select();
        assert!(calendar.execute_next(&select).unwrap());
        assert_eq!(*log.borrow(), ["a", "b"]);

        assert!(calendar.execute_next(&select).unwrap());
        assert_eq!(*log.borrow(), ["a", "b", "c"]);
    }

    #[test]
    fn select_orders_a_simultaneous_batch() {
        let calendar = Calendar::new(0.0, 10.0, 1e-3);
        let log = Rc::new(RefCell::new(Vec::new()));

        calendar.schedule(logged(1.0, "a", &log)).unwrap();
        calendar.schedule(logged(1.0, "b", &log)).unwrap();
        calendar.schedule(logged(1.0, "c", &log)).unwrap();

        // Dispatch in reverse name order.
        let select: Select = Rc::new(|candidates: &[String]| {
            let mut sorted = candidates.to_vec();
            sorted.sort();
            sorted.last().cloned().unwrap_or_default()
        });
        assert!(calendar.execute_next(&select).unwrap());

        assert_eq!(*log.borrow(), ["c", "b", "a"]);
    }

    #[test]
    fn select_returning_a_stranger_is_fatal() {
        let calendar = Calendar::new(0.0, 10.0, 1e-3);
        let log = Rc::new(RefCell::new(Vec::new()));

        calendar.schedule(logged(1.0, "a", &log)).unwrap();
        calendar.schedule(logged(1.0, "b", &log)).unwrap();

        let select: Select = Rc::new(|_: &[String]| "stranger".to_owned());
        let err = calendar.execute_next(&select).unwrap_err();

        assert!(matches!(err, ExecutionError::SelectInvalid { .. }));
    }

    #[test]
    fn zero_delay_events_join_the_running_batch() {
        let calendar = Calendar::new(0.0, 10.0, 1e-3);
        let log = Rc::new(RefCell::new(Vec::new()));

        // The first event schedules a second one at the same instant; it must
        // run within the same `execute_next` call.
        let chained = {
            let log = log.clone();
            let handle = calendar.clone();
            Event::new(
                1.0,
                "first",
                "chain",
                Box::new(move || {
                    log.borrow_mut().push("first".to_owned());
                    let log = log.clone();
                    handle.schedule(Event::new(
                        1.0,
                        "second",
                        "chained",
                        Box::new(move || {
                            log.borrow_mut().push("second".to_owned());
                            Ok(())
                        }),
                    ))?;
                    Ok(())
                }),
            )
        };
        calendar.schedule(chained).unwrap();

        let select = fifo_select();
        assert!(calendar.execute_next(&select).unwrap());

        assert_eq!(*log.borrow(), ["first", "second"]);
    }

    #[test]
    fn a_drained_calendar_halts_at_the_end_time() {
        let calendar: Calendar = Calendar::new(0.0, 7.5, 1e-3);

        let select = fifo_select();
        assert!(!calendar.execute_next(&select).unwrap());
        assert_eq!(calendar.now(), 7.5);
    }

    #[test]
    fn events_beyond_the_end_time_halt_the_calendar() {
        let calendar = Calendar::new(0.0, 2.0, 1e-3);
        let log = Rc::new(RefCell::new(Vec::new()));

        calendar.schedule(logged(5.0, "beyond", &log)).unwrap();

        let select = fifo_select();
        assert!(!calendar.execute_next(&select).unwrap());
        assert_eq!(calendar.now(), 2.0);
        assert!(log.borrow().is_empty());
    }
}
