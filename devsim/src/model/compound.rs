//! Compound model driver.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::calendar::{Action, Calendar, Event, ExecutionError, SchedulingError};
use crate::dynamic::Dynamic;
use crate::model::{
    fifo_select, InputListener, Model, ModelFactory, OutputListener, Select, SetupError,
    StateTransitionListener, Transformer, EXTERNAL,
};
use crate::time::SimTime;

/// The influencer table of a compound model.
///
/// Keyed by influencee, then by influencer; `None` denotes the compound
/// itself (its own input as an influencer, its own output as an influencee).
/// Each edge carries an optional [`Transformer`]; a missing transformer is
/// the identity.
pub type Influencers = BTreeMap<Option<String>, BTreeMap<Option<String>, Option<Transformer>>>;

/// The specification of a compound model: named component factories, the
/// influencer table and an optional tie-break function.
pub struct Compound<T: SimTime = f64> {
    components: BTreeMap<String, ModelFactory<T>>,
    influencers: Influencers,
    select: Option<Select>,
}

impl<T: SimTime> Compound<T> {
    /// Bundles component factories with their wiring.
    pub fn new(components: BTreeMap<String, ModelFactory<T>>, influencers: Influencers) -> Self {
        Self {
            components,
            influencers,
            select: None,
        }
    }

    /// Replaces the FIFO tie-break with a user-supplied function.
    pub fn with_select(mut self, select: Select) -> Self {
        self.select = Some(select);
        self
    }

    /// Converts the specification into a model factory.
    pub fn factory(self) -> ModelFactory<T> {
        Box::new(move |name, calendar| {
            CompoundModel::build(name, calendar, self).map(|model| model as Rc<dyn Model<T>>)
        })
    }
}

impl<T: SimTime> fmt::Debug for Compound<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Compound")
            .field("components", &self.components.keys())
            .finish_non_exhaustive()
    }
}

/// The driver of a compound model.
///
/// A compound exclusively owns its children; wiring edges only hold weak
/// cross-links, so they never extend a child's lifetime.
pub struct CompoundModel<T: SimTime = f64> {
    inner: Rc<RefCell<CompoundInner<T>>>,
}

struct CompoundInner<T: SimTime> {
    name: String,
    calendar: Calendar<T>,
    components: BTreeMap<String, Rc<dyn Model<T>>>,
    select: Select,
    /// Children receiving the compound's own input, without a calendar round
    /// trip.
    input_routes: Vec<(Weak<dyn Model<T>>, Option<Transformer>)>,
    input_listeners: Vec<InputListener>,
    output_listeners: Vec<OutputListener<T>>,
}

impl<T: SimTime> CompoundModel<T> {
    fn build(
        name: &str,
        calendar: &Calendar<T>,
        spec: Compound<T>,
    ) -> Result<Rc<Self>, SetupError> {
        if name.is_empty() {
            return Err(SetupError::EmptyName);
        }
        if spec.components.is_empty() {
            return Err(SetupError::EmptyCompound {
                compound: name.to_owned(),
            });
        }

        let mut components: BTreeMap<String, Rc<dyn Model<T>>> = BTreeMap::new();
        for (child_name, factory) in spec.components {
            if child_name == name {
                return Err(SetupError::NameCollision { name: child_name });
            }
            let child = factory(&child_name, calendar)?;
            components.insert(child_name, child);
        }

        let model = Rc::new(Self {
            inner: Rc::new(RefCell::new(CompoundInner {
                name: name.to_owned(),
                calendar: calendar.clone(),
                components,
                select: spec.select.unwrap_or_else(fifo_select),
                input_routes: Vec::new(),
                input_listeners: Vec::new(),
                output_listeners: Vec::new(),
            })),
        });

        for (influencee, edges) in spec.influencers {
            match influencee {
                Some(child_name) => {
                    for (influencer, transformer) in edges {
                        model.wire_child_input(&child_name, influencer, transformer)?;
                    }
                }
                None => {
                    for (influencer, transformer) in edges {
                        model.wire_own_output(influencer, transformer)?;
                    }
                }
            }
        }

        Ok(model)
    }

    /// Wires an edge whose influencee is the named child.
    fn wire_child_input(
        &self,
        child_name: &str,
        influencer: Option<String>,
        transformer: Option<Transformer>,
    ) -> Result<(), SetupError> {
        let inner = self.inner.borrow();
        let child = inner
            .components
            .get(child_name)
            .ok_or_else(|| SetupError::UnknownComponent {
                compound: inner.name.clone(),
                component: child_name.to_owned(),
            })?;

        match influencer {
            // The compound's own input flows directly to the child.
            None => {
                let route = (Rc::downgrade(child), transformer);
                drop(inner);
                self.inner.borrow_mut().input_routes.push(route);
            }
            Some(other_name) => {
                if other_name == child_name {
                    return Err(SetupError::SelfInfluence {
                        model: other_name,
                    });
                }
                let other = inner.components.get(&other_name).ok_or_else(|| {
                    SetupError::UnknownComponent {
                        compound: inner.name.clone(),
                        component: other_name.clone(),
                    }
                })?;

                let weak_child = Rc::downgrade(child);
                let listener: OutputListener<T> =
                    Rc::new(move |from, time, value| match weak_child.upgrade() {
                        Some(child) => {
                            child.input_from_influencer(
                                from,
                                time,
                                value.clone(),
                                transformer.clone(),
                            )?;
                            Ok(())
                        }
                        None => Ok(()),
                    });
                other.add_output_listener(listener);
            }
        }

        Ok(())
    }

    /// Wires an edge whose influencee is the compound's own output.
    fn wire_own_output(
        &self,
        influencer: Option<String>,
        transformer: Option<Transformer>,
    ) -> Result<(), SetupError> {
        let inner = self.inner.borrow();

        let other_name = influencer.ok_or_else(|| SetupError::SelfInfluence {
            model: inner.name.clone(),
        })?;
        let other = inner.components.get(&other_name).ok_or_else(|| {
            SetupError::UnknownComponent {
                compound: inner.name.clone(),
                component: other_name.clone(),
            }
        })?;

        let weak_inner = Rc::downgrade(&self.inner);
        let listener: OutputListener<T> = Rc::new(move |from, time, value| {
            let inner = match weak_inner.upgrade() {
                Some(inner) => inner,
                None => return Ok(()),
            };

            let value = match &transformer {
                Some(transformer) => transformer.apply(value.clone()).map_err(|mismatch| {
                    ExecutionError::TransformerTypeMismatch {
                        influencer: from.to_owned(),
                        influencee: inner.borrow().name.clone(),
                        mismatch,
                    }
                })?,
                None => value.clone(),
            };

            // The compound is the emitting boundary as seen from outside.
            let (name, listeners) = {
                let inner = inner.borrow();
                (inner.name.clone(), inner.output_listeners.clone())
            };
            for listener in &listeners {
                listener(&name, time, &value)?;
            }

            Ok(())
        });
        other.add_output_listener(listener);

        Ok(())
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

impl<T: SimTime> Model<T> for CompoundModel<T> {
    fn name(&self) -> String {
        self.inner.borrow().name.clone()
    }

    fn select(&self) -> Select {
        self.inner.borrow().select.clone()
    }

    fn state(&self) -> Option<Dynamic> {
        None
    }

    fn components(&self) -> Option<BTreeMap<String, Rc<dyn Model<T>>>> {
        Some(self.inner.borrow().components.clone())
    }

    fn add_input_listener(&self, listener: InputListener) {
        self.inner.borrow_mut().input_listeners.push(listener);
    }

    fn add_output_listener(&self, listener: OutputListener<T>) {
        self.inner.borrow_mut().output_listeners.push(listener);
    }

    fn add_state_transition_listener(&self, listener: StateTransitionListener<T>) {
        let components = self.inner.borrow().components.clone();
        for child in components.values() {
            child.add_state_transition_listener(listener.clone());
        }
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
        let components = self.inner.borrow().components.clone();
        for child in components.values() {
            child.visit_atomic_states(visit);
        }
    }
}

impl<T: SimTime> fmt::Debug for CompoundModel<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("CompoundModel")
            .field("name", &inner.name)
            .field("components", &inner.components.keys())
            .finish_non_exhaustive()
    }
}

/// The input path: transforms the value in the compound's reception context,
/// then fans it out to the routed children at the same instant.
fn deliver<T: SimTime>(
    inner_rc: &Rc<RefCell<CompoundInner<T>>>,
    from: &str,
    value: Dynamic,
    transformer: Option<Transformer>,
) -> Result<(), ExecutionError> {
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

    let (input_listeners, routes) = {
        let inner = inner_rc.borrow();
        (inner.input_listeners.clone(), inner.input_routes.clone())
    };

    for listener in &input_listeners {
        listener(from, &value);
    }
    for (child, transformer) in &routes {
        if let Some(child) = child.upgrade() {
            child.direct_input(from, value.clone(), transformer.clone())?;
        }
    }

    Ok(())
}
