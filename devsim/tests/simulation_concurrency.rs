//! Simultaneity, cascades, cancellation and observable invariants.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use devsim::calendar::{Calendar, Event};
use devsim::dynamic::Dynamic;
use devsim::model::{fifo_select, Atomic, Compound, ModelFactory};
use devsim::printer::{EventRecorder, NoopPrinter, TraceRecord};
use devsim::simulation::Simulator;

/// Emits `42` once at t = 1, then passivates.
fn one_shot_source() -> ModelFactory<f64> {
    Atomic::new(
        0u32,
        |s: &u32, _elapsed: f64, _: &()| *s,
        |s: &u32| s + 1,
        |_: &u32| 42i64,
        |s: &u32| if *s == 0 { 1.0 } else { f64::INFINITY },
    )
    .factory()
}

/// Forwards any received value with zero delay.
fn zero_delay_relay() -> ModelFactory<f64> {
    Atomic::new(
        -1i64,
        |_: &i64, _elapsed: f64, x: &i64| *x,
        |_: &i64| -1,
        |s: &i64| *s,
        |s: &i64| if *s >= 0 { 0.0 } else { f64::INFINITY },
    )
    .factory()
}

#[test]
fn a_zero_delay_cascade_runs_within_one_batch() {
    let spec = Compound::new(
        BTreeMap::from([
            ("relay".to_owned(), zero_delay_relay()),
            ("source".to_owned(), one_shot_source()),
        ]),
        BTreeMap::from([
            (
                Some("relay".to_owned()),
                BTreeMap::from([(Some("source".to_owned()), None)]),
            ),
            (None, BTreeMap::from([(Some("relay".to_owned()), None)])),
        ]),
    );

    let recorder = EventRecorder::new();
    let mut simu =
        Simulator::new("cascade", spec.factory(), 0.0, 5.0, Rc::new(recorder.clone())).unwrap();

    let outputs = Rc::new(RefCell::new(Vec::new()));
    {
        let outputs = outputs.clone();
        simu.add_output_listener(Rc::new(move |_from, time, value| {
            outputs
                .borrow_mut()
                .push((time, *value.downcast_ref::<i64>().unwrap()));
            Ok(())
        }));
    }

    simu.run().unwrap();

    // Source emission, relay reception and relay emission all happen at
    // t = 1, within a single dispatched batch.
    assert_eq!(*outputs.borrow(), [(1.0, 42)]);
    let steps = recorder
        .records()
        .iter()
        .filter(|r| matches!(r, TraceRecord::SimStep { .. }))
        .count();
    assert_eq!(steps, 1);
}

#[test]
fn a_batch_action_can_cancel_a_later_event_of_the_same_batch() {
    let calendar = Calendar::new(0.0, 10.0, 1e-3);
    let log = Rc::new(RefCell::new(Vec::new()));

    let victim = {
        let log = log.clone();
        Event::new(
            1.0,
            "victim",
            "doomed",
            Box::new(move || {
                log.borrow_mut().push("victim");
                Ok(())
            }),
        )
    };
    let key = victim.key();

    let killer = {
        let log = log.clone();
        Event::new(
            1.0,
            "killer",
            "cancels the victim",
            Box::new(move || {
                log.borrow_mut().push("killer");
                key.cancel();
                Ok(())
            }),
        )
    };

    calendar.schedule(killer).unwrap();
    calendar.schedule(victim).unwrap();

    let select = fifo_select();
    assert!(calendar.execute_next(&select).unwrap());

    assert_eq!(*log.borrow(), ["killer"]);
}

#[test]
fn identity_wiring_preserves_values_and_elapsed_times() {
    let elapsed_log = Rc::new(RefCell::new(Vec::new()));

    let consumer = {
        let elapsed_log = elapsed_log.clone();
        Atomic::new(
            0i64,
            move |s: &i64, elapsed: f64, x: &i64| {
                elapsed_log.borrow_mut().push(elapsed);
                s + x
            },
            |s: &i64| *s,
            |s: &i64| *s,
            |_: &i64| f64::INFINITY,
        )
        .factory()
    };

    let producer = Atomic::new(
        0i64,
        |s: &i64, _elapsed: f64, x: &i64| s + x,
        |s: &i64| s + 1,
        |s: &i64| *s,
        |_: &i64| 1.0,
    )
    .factory();

    let spec = Compound::new(
        BTreeMap::from([
            ("consumer".to_owned(), consumer),
            ("producer".to_owned(), producer),
        ]),
        BTreeMap::from([(
            Some("consumer".to_owned()),
            BTreeMap::from([(Some("producer".to_owned()), None)]),
        )]),
    );

    let mut simu =
        Simulator::new("chain", spec.factory(), 0.0, 3.5, Rc::new(NoopPrinter)).unwrap();
    simu.run().unwrap();

    // The producer emitted 0, 1, 2 at t = 1, 2, 3; without a transformer the
    // consumer receives them unchanged.
    let components = simu.model().components().unwrap();
    let consumer_state = components
        .get("consumer")
        .unwrap()
        .state()
        .unwrap()
        .downcast::<i64>()
        .unwrap();
    assert_eq!(consumer_state, 3);

    // Each delivery happened one second after the consumer's previous
    // transition.
    assert_eq!(*elapsed_log.borrow(), [1.0, 1.0, 1.0]);
}

#[test]
fn observed_times_are_monotone_and_never_in_the_past() {
    let recorder = EventRecorder::new();
    let spec = Atomic::new(
        0i64,
        |s: &i64, _elapsed: f64, x: &i64| s + x,
        |s: &i64| s + 1,
        |s: &i64| *s,
        |_: &i64| 0.75,
    );
    let mut simu =
        Simulator::new("clocked", spec.factory(), 0.0, 5.0, Rc::new(recorder.clone())).unwrap();
    simu.schedule_input(2.2, Dynamic::new(5i64), "bump").unwrap();
    simu.run().unwrap();

    let records = recorder.records();

    // No event is ever scheduled in the past.
    for record in &records {
        if let TraceRecord::EventScheduled { now, time, .. } = record {
            assert!(time >= now, "event scheduled at {time} while now = {now}");
        }
    }

    // Time advances monotonically.
    let advances: Vec<(f64, f64)> = records
        .iter()
        .filter_map(|r| match r {
            TraceRecord::TimeAdvanced { prev, next } => Some((*prev, *next)),
            _ => None,
        })
        .collect();
    assert!(!advances.is_empty());
    for (prev, next) in &advances {
        assert!(prev <= next);
    }
    for window in advances.windows(2) {
        assert!(window[0].1 <= window[1].0);
    }
}

#[test]
fn a_custom_epsilon_widens_the_simultaneity_window() {
    // With ε = 0.5, events at t = 1.0 and t = 1.3 are concurrent.
    let calendar = Calendar::new(0.0, 10.0, 0.5);
    let log = Rc::new(RefCell::new(Vec::new()));

    for (time, label) in [(1.0, "a"), (1.3, "b"), (2.0, "c")] {
        let log = log.clone();
        calendar
            .schedule(Event::new(
                time,
                label,
                "log",
                Box::new(move || {
                    log.borrow_mut().push(label);
                    Ok(())
                }),
            ))
            .unwrap();
    }

    let select = fifo_select();
    assert!(calendar.execute_next(&select).unwrap());
    assert_eq!(*log.borrow(), ["a", "b"]);

    assert!(calendar.execute_next(&select).unwrap());
    assert_eq!(*log.borrow(), ["a", "b", "c"]);
}
