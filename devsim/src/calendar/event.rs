//! Calendar entries and cancellation keys.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::ExecutionError;
use crate::time::SimTime;

/// The deferred effect carried by an event.
///
/// Actions run to completion on the single simulation context and may
/// schedule further events or cancel pending ones.
pub type Action = Box<dyn FnOnce() -> Result<(), ExecutionError>>;

/// A calendar entry: a deferred action bound to a firing time.
///
/// Each event shares a cancellation flag with every [`EventKey`] issued for
/// it, so any key holder can mark the event dead without locating it in the
/// calendar. A cancelled event is skipped during extraction and its action is
/// never invoked.
pub struct Event<T: SimTime> {
    time: T,
    model: String,
    description: String,
    action: Action,
    is_cancelled: Rc<Cell<bool>>,
}

impl<T: SimTime> Event<T> {
    /// Creates an event firing at the specified time on behalf of the named
    /// model.
    pub fn new(
        time: T,
        model: impl Into<String>,
        description: impl Into<String>,
        action: Action,
    ) -> Self {
        Self {
            time,
            model: model.into(),
            description: description.into(),
            action,
            is_cancelled: Rc::new(Cell::new(false)),
        }
    }

    /// The scheduled firing time.
    pub fn time(&self) -> T {
        self.time
    }

    /// The name of the model this event acts upon.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// A short description of the deferred effect, for tracing.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Checks whether the event was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.get()
    }

    /// Issues a key sharing this event's cancellation flag.
    pub fn key(&self) -> EventKey {
        EventKey {
            is_cancelled: self.is_cancelled.clone(),
        }
    }

    /// Invokes the deferred action, consuming the event.
    pub(crate) fn invoke(self) -> Result<(), ExecutionError> {
        (self.action)()
    }
}

impl<T: SimTime> fmt::Debug for Event<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Event")
            .field("time", &self.time)
            .field("model", &self.model)
            .field("description", &self.description)
            .field("cancelled", &self.is_cancelled.get())
            .finish_non_exhaustive()
    }
}

/// Handle to a scheduled event.
///
/// An `EventKey` can be used to cancel the associated event. Cancellation is
/// idempotent and observable from within another event's action.
#[derive(Clone, Debug)]
#[must_use = "prefer unkeyed events if the event is never cancelled"]
pub struct EventKey {
    is_cancelled: Rc<Cell<bool>>,
}

impl EventKey {
    /// Checks whether the event was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.is_cancelled.get()
    }

    /// Cancels the associated event.
    pub fn cancel(self) {
        self.is_cancelled.set(true);
    }
}
