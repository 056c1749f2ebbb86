//! Reusable atomic-model factories for bench assembly.

use std::cell::RefCell;
use std::rc::Rc;

use devsim::model::{Atomic, ModelFactory};

/// Builds a generator: an atomic model emitting `payload(n)` for the n-th
/// emission, with successive inter-emission delays taken from `draw`.
///
/// The generator ignores inputs. A draw of `f64::INFINITY` stops the
/// generator for the remainder of the run.
///
/// # Examples
///
/// A Poisson-process source of customer identifiers:
///
/// ```
/// use devsim_util::{models, random};
///
/// let arrivals = models::generator(random::exponential(42, 0.5), |n| n);
/// ```
pub fn generator<Y>(
    draw: impl FnMut() -> f64 + 'static,
    payload: impl Fn(u64) -> Y + 'static,
) -> ModelFactory<f64>
where
    Y: Clone + 'static,
{
    let draw = Rc::new(RefCell::new(draw));
    let first_delay = draw.borrow_mut()();
    let draw_next = draw.clone();

    Atomic::new(
        // State: (emission count, delay until the next emission).
        (0u64, first_delay),
        |s: &(u64, f64), _elapsed: f64, _: &()| *s,
        move |s: &(u64, f64)| (s.0 + 1, draw_next.borrow_mut()()),
        move |s: &(u64, f64)| payload(s.0),
        |s: &(u64, f64)| s.1,
    )
    .factory()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    use devsim::printer::NoopPrinter;
    use devsim::simulation::Simulator;

    #[test]
    fn the_generator_spaces_emissions_by_the_drawn_delays() {
        let delays = RefCell::new(vec![2.0, 1.0, 0.5].into_iter());
        let draw = move || delays.borrow_mut().next().unwrap_or(f64::INFINITY);

        let mut simu = Simulator::new(
            "gen",
            generator(draw, |n| n),
            0.0,
            10.0,
            Rc::new(NoopPrinter),
        )
        .unwrap();

        let emissions = Rc::new(RefCell::new(Vec::new()));
        {
            let emissions = emissions.clone();
            simu.add_output_listener(Rc::new(move |_from, time, value| {
                emissions
                    .borrow_mut()
                    .push((time, *value.downcast_ref::<u64>().unwrap()));
                Ok(())
            }));
        }

        simu.run().unwrap();

        // Delays are consumed in order: emissions land at t = 2, 3 and 3.5.
        assert_eq!(*emissions.borrow(), [(2.0, 0), (3.0, 1), (3.5, 2)]);
    }
}
