//! Example: a single-server queue (M/M/1).
//!
//! This example demonstrates in particular:
//!
//! * a Poisson-process arrival generator built from the random helpers,
//! * elapsed-time bookkeeping in an external transition,
//! * a compound bench observed through an output listener.
//!
//! ```text
//!              ┌───────────────────────────────────────────┐
//!              │ bank                                      │
//!              │  ┌────────────┐  u64     ┌────────────┐   │
//!              │  │            │ customer │            │   │  u64
//!              │  │  arrivals  ├─────────►│   server   ├───┼────────► departures
//!              │  │            │          │            │   │
//!              │  └────────────┘          └────────────┘   │
//!              └───────────────────────────────────────────┘
//! ```

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use devsim::model::{Atomic, Compound, ModelFactory};
use devsim::printer::NoopPrinter;
use devsim::simulation::Simulator;
use devsim_util::{models, random};

/// The server: one customer in service, the others waiting in FIFO order.
#[derive(Clone, Debug)]
struct Server {
    waiting: VecDeque<u64>,
    in_service: Option<u64>,
    /// Remaining service time of the customer in service.
    remaining: f64,
}

impl Server {
    fn idle() -> Self {
        Self {
            waiting: VecDeque::new(),
            in_service: None,
            remaining: 0.0,
        }
    }
}

/// Builds the server model with exponentially distributed service times.
fn server(seed: u64, service_rate: f64) -> ModelFactory<f64> {
    let draw = Rc::new(RefCell::new(random::exponential(seed, service_rate)));
    let draw_on_arrival = draw.clone();

    Atomic::new(
        Server::idle(),
        move |s: &Server, elapsed: f64, customer: &u64| {
            let mut next = s.clone();
            match next.in_service {
                // The server keeps working while the arrival is handled.
                Some(_) => {
                    next.remaining -= elapsed;
                    next.waiting.push_back(*customer);
                }
                None => {
                    next.in_service = Some(*customer);
                    next.remaining = draw_on_arrival.borrow_mut()();
                }
            }
            next
        },
        move |s: &Server| {
            let mut next = s.clone();
            next.in_service = next.waiting.pop_front();
            next.remaining = match next.in_service {
                Some(_) => draw.borrow_mut()(),
                None => 0.0,
            };
            next
        },
        |s: &Server| s.in_service.unwrap_or(0),
        |s: &Server| {
            if s.in_service.is_some() {
                s.remaining
            } else {
                f64::INFINITY
            }
        },
    )
    .factory()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    const ARRIVAL_RATE: f64 = 0.8; // customers per minute
    const SERVICE_RATE: f64 = 1.0; // customers per minute
    const CLOSING_TIME: f64 = 480.0; // an eight-hour day, in minutes

    let bank = Compound::new(
        BTreeMap::from([
            (
                "arrivals".to_owned(),
                models::generator(random::exponential(42, ARRIVAL_RATE), |n| n),
            ),
            ("server".to_owned(), server(43, SERVICE_RATE)),
        ]),
        BTreeMap::from([
            (
                Some("server".to_owned()),
                BTreeMap::from([(Some("arrivals".to_owned()), None)]),
            ),
            (None, BTreeMap::from([(Some("server".to_owned()), None)])),
        ]),
    );

    let mut simu = Simulator::new(
        "bank",
        bank.factory(),
        0.0,
        CLOSING_TIME,
        Rc::new(NoopPrinter),
    )?;

    let departures = Rc::new(RefCell::new(Vec::new()));
    {
        let departures = departures.clone();
        simu.add_output_listener(Rc::new(move |_from, time, value| {
            departures
                .borrow_mut()
                .push((time, *value.downcast_ref::<u64>().unwrap()));
            Ok(())
        }));
    }

    simu.run()?;

    let departures = departures.borrow();
    println!("served {} customers in {} minutes", departures.len(), CLOSING_TIME);
    if let Some((time, customer)) = departures.last() {
        println!("last departure: customer {} at t = {:.1}", customer, time);
    }

    Ok(())
}
