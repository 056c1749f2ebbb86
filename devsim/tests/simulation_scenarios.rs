//! End-to-end simulation scenarios on small benches.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use devsim::calendar::ExecutionError;
use devsim::dynamic::Dynamic;
use devsim::model::{Atomic, Compound, ModelFactory, Transformer};
use devsim::printer::{EventRecorder, TraceRecord};
use devsim::simulation::Simulator;

/// A periodic counter: emits its count, then increments it; inputs are added
/// to the count.
fn counter(period: f64) -> ModelFactory<f64> {
    Atomic::new(
        0i64,
        |s: &i64, _elapsed: f64, x: &i64| s + x,
        |s: &i64| s + 1,
        |s: &i64| *s,
        move |_: &i64| period,
    )
    .factory()
}

/// Collects `(time, value)` pairs from the outputs of the root model.
fn collect_outputs(simu: &Simulator) -> Rc<RefCell<Vec<(f64, i64)>>> {
    let outputs = Rc::new(RefCell::new(Vec::new()));
    {
        let outputs = outputs.clone();
        simu.add_output_listener(Rc::new(move |_from, time, value| {
            let value = *value.downcast_ref::<i64>().unwrap();
            outputs.borrow_mut().push((time, value));
            Ok(())
        }));
    }

    outputs
}

#[test]
fn an_idle_atomic_only_starts_and_ends() {
    let idle = Atomic::new(
        (),
        |_: &(), _elapsed: f64, _: &()| (),
        |_: &()| (),
        |_: &()| (),
        |_: &()| f64::INFINITY,
    );

    let recorder = EventRecorder::new();
    let mut simu =
        Simulator::new("idle", idle.factory(), 0.0, 1.0, Rc::new(recorder.clone())).unwrap();
    simu.run().unwrap();

    let records = recorder.records();
    assert!(records.contains(&TraceRecord::SimStart {
        model: "idle".to_owned(),
        time: 0.0,
        state: "()".to_owned(),
    }));
    assert!(records.contains(&TraceRecord::SimEnd {
        model: "idle".to_owned(),
        time: 1.0,
        state: "()".to_owned(),
    }));
    assert!(!records
        .iter()
        .any(|r| matches!(r, TraceRecord::StateTransition { .. })));
    assert_eq!(simu.time(), 1.0);
}

#[test]
fn a_periodic_atomic_emits_the_pre_transition_state() {
    let recorder = EventRecorder::new();
    let mut simu =
        Simulator::new("counter", counter(1.0), 0.0, 3.5, Rc::new(recorder.clone())).unwrap();
    let outputs = collect_outputs(&simu);

    simu.run().unwrap();

    assert_eq!(*outputs.borrow(), [(1.0, 0), (2.0, 1), (3.0, 2)]);
    assert!(recorder.records().contains(&TraceRecord::SimEnd {
        model: "counter".to_owned(),
        time: 3.5,
        state: "3".to_owned(),
    }));
}

#[test]
fn an_external_input_cancels_the_pending_internal_transition() {
    let bumper = Atomic::new(
        0i64,
        |s: &i64, _elapsed: f64, x: &i64| s + x,
        |s: &i64| s + 10,
        |s: &i64| *s,
        |_: &i64| 5.0,
    );

    let recorder = EventRecorder::new();
    let mut simu =
        Simulator::new("bumper", bumper.factory(), 0.0, 10.0, Rc::new(recorder.clone())).unwrap();
    let outputs = collect_outputs(&simu);

    simu.schedule_input(2.0, Dynamic::new(1i64), "bump").unwrap();
    simu.run().unwrap();

    // The internal transition initially scheduled for t = 5 was cancelled by
    // the input at t = 2; the next one fires at t = 7 from the new state.
    assert_eq!(*outputs.borrow(), [(7.0, 1)]);

    let transitions: Vec<_> = recorder
        .records()
        .into_iter()
        .filter_map(|r| match r {
            TraceRecord::StateTransition {
                time, prev, next, ..
            } => Some((time, prev, next)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        [
            (2.0, "0".to_owned(), "1".to_owned()),
            (7.0, "1".to_owned(), "11".to_owned()),
        ]
    );
}

#[test]
fn select_orders_simultaneous_models() {
    // Two models fire at t = 1; `select` favors B.
    fn shouter(name: &'static str) -> ModelFactory<f64> {
        Atomic::new(
            0u32,
            |s: &u32, _elapsed: f64, _: &()| *s,
            |s: &u32| s + 1,
            move |_: &u32| name.to_owned(),
            |s: &u32| if *s == 0 { 1.0 } else { f64::INFINITY },
        )
        .factory()
    }

    let spec = Compound::new(
        BTreeMap::from([("A".to_owned(), shouter("A")), ("B".to_owned(), shouter("B"))]),
        BTreeMap::from([(
            None,
            BTreeMap::from([
                (Some("A".to_owned()), None),
                (Some("B".to_owned()), None),
            ]),
        )]),
    )
    .with_select(Rc::new(|candidates: &[String]| {
        if candidates.iter().any(|c| c == "B") {
            "B".to_owned()
        } else {
            candidates[0].clone()
        }
    }));

    let mut simu = Simulator::new(
        "pair",
        spec.factory(),
        0.0,
        1.0005,
        Rc::new(devsim::printer::NoopPrinter),
    )
    .unwrap();

    let order = Rc::new(RefCell::new(Vec::new()));
    {
        let order = order.clone();
        simu.add_output_listener(Rc::new(move |_from, _time, value| {
            order
                .borrow_mut()
                .push(value.downcast_ref::<String>().unwrap().clone());
            Ok(())
        }));
    }

    simu.run().unwrap();

    assert_eq!(*order.borrow(), ["B", "A"]);
}

#[test]
fn a_compound_applies_the_transformer_on_its_output_edge() {
    let spec = Compound::new(
        BTreeMap::from([("X".to_owned(), counter(1.0))]),
        BTreeMap::from([(
            None,
            BTreeMap::from([(
                Some("X".to_owned()),
                Some(Transformer::new(|v: i64| v * 10)),
            )]),
        )]),
    );

    let mut simu = Simulator::new(
        "wrapper",
        spec.factory(),
        0.0,
        3.5,
        Rc::new(devsim::printer::NoopPrinter),
    )
    .unwrap();

    let outputs = Rc::new(RefCell::new(Vec::new()));
    {
        let outputs = outputs.clone();
        simu.add_output_listener(Rc::new(move |from, time, value| {
            let value = *value.downcast_ref::<i64>().unwrap();
            outputs.borrow_mut().push((from.to_owned(), time, value));
            Ok(())
        }));
    }

    simu.run().unwrap();

    assert_eq!(
        *outputs.borrow(),
        [
            ("wrapper".to_owned(), 1.0, 0),
            ("wrapper".to_owned(), 2.0, 10),
            ("wrapper".to_owned(), 3.0, 20),
        ]
    );
}

#[test]
fn an_input_of_the_wrong_type_aborts_the_run() {
    let mut simu = Simulator::new(
        "victim",
        counter(f64::INFINITY),
        0.0,
        10.0,
        Rc::new(devsim::printer::NoopPrinter),
    )
    .unwrap();

    simu.schedule_input(1.0, Dynamic::new("oops".to_owned()), "bad input")
        .unwrap();

    let err = simu.run().unwrap_err();
    match err {
        ExecutionError::InputTypeMismatch { model, from, .. } => {
            assert_eq!(model, "victim");
            assert_eq!(from, "external");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
