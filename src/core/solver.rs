use super::error::SolverError;

/// Direction in which the balance function moves as the search variable grows.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Monotonicity {
    Increasing,
    Decreasing,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BisectionStatus {
    /// A bracketed root was found within tolerance.
    Converged,
    /// The search stopped at the lower bound.
    SaturatedLow,
    /// The search stopped at the upper bound.
    SaturatedHigh,
}

#[derive(Debug, Clone, Copy)]
pub struct BisectConfig {
    /// Accept any non-negative balance at or below this value.
    pub tolerance: f64,
    /// Stop once the bracket is narrower than this.
    pub x_tolerance: f64,
    pub max_iterations: u32,
}

impl Default for BisectConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.005,
            x_tolerance: 1e-6,
            max_iterations: 200,
        }
    }
}

/// Where a search stopped, together with whatever the evaluator built there.
#[derive(Debug, Clone)]
pub struct Bisection<T> {
    pub x: f64,
    pub value: f64,
    pub output: T,
    pub iterations: u32,
    pub status: BisectionStatus,
}

impl<T> Bisection<T> {
    pub fn is_feasible(&self) -> bool {
        self.value >= 0.0
    }
}

/// Finds the point in `[lo, hi]` where a monotone balance crosses zero, always
/// reporting the side where the balance is non-negative when one exists.
///
/// The evaluator returns the balance at `x` plus an arbitrary artifact, so the
/// caller gets the allocation it computed at the chosen point without having to
/// rebuild it. If no point in the range is feasible the infeasible end is
/// returned and `value` stays negative.
pub fn bisect<T, E, F>(
    lo: f64,
    hi: f64,
    config: BisectConfig,
    monotonicity: Monotonicity,
    mut f: F,
) -> Result<Bisection<T>, E>
where
    E: From<SolverError>,
    F: FnMut(f64) -> Result<(f64, T), E>,
{
    let mut evaluate = |x: f64| -> Result<(f64, T), E> {
        let (value, output) = f(x)?;
        if !value.is_finite() {
            return Err(SolverError::NonFinite(x).into());
        }
        Ok((value, output))
    };

    let hi = hi.max(lo);
    // Past ~1e9 the float spacing is coarser than the configured width.
    let x_tolerance = config
        .x_tolerance
        .max(f64::EPSILON * 4.0 * hi.abs().max(lo.abs()));
    // The cheap end is the one that is feasible when the whole range is.
    let (cheap, far, cheap_status, far_status) = match monotonicity {
        Monotonicity::Increasing => (
            lo,
            hi,
            BisectionStatus::SaturatedLow,
            BisectionStatus::SaturatedHigh,
        ),
        Monotonicity::Decreasing => (
            hi,
            lo,
            BisectionStatus::SaturatedHigh,
            BisectionStatus::SaturatedLow,
        ),
    };

    let (value, output) = evaluate(cheap)?;
    if value >= 0.0 || hi - lo <= x_tolerance {
        return Ok(Bisection {
            x: cheap,
            value,
            output,
            iterations: 0,
            status: cheap_status,
        });
    }

    let (far_value, far_output) = evaluate(far)?;
    if far_value < 0.0 {
        return Ok(Bisection {
            x: far,
            value: far_value,
            output: far_output,
            iterations: 0,
            status: far_status,
        });
    }

    // `feasible` always holds a non-negative balance, `infeasible` a negative one.
    let mut feasible = (far, far_value, far_output);
    let mut infeasible = cheap;
    let mut it = 0;
    while it < config.max_iterations {
        it += 1;
        let mid = (feasible.0 + infeasible) * 0.5;
        let (value, output) = evaluate(mid)?;
        if value >= 0.0 {
            feasible = (mid, value, output);
            if value <= config.tolerance {
                break;
            }
        } else {
            infeasible = mid;
        }
        if (feasible.0 - infeasible).abs() <= x_tolerance {
            break;
        }
    }

    let (x, value, output) = feasible;
    if value > config.tolerance && (x - infeasible).abs() > x_tolerance {
        let (lower, upper) = if x < infeasible {
            (x, infeasible)
        } else {
            (infeasible, x)
        };
        return Err(SolverError::NotConverged {
            iterations: it,
            lower,
            upper,
        }
        .into());
    }

    Ok(Bisection {
        x,
        value,
        output,
        iterations: it,
        status: BisectionStatus::Converged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::SimError;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn solve(
        lo: f64,
        hi: f64,
        monotonicity: Monotonicity,
        f: impl Fn(f64) -> f64,
    ) -> Bisection<()> {
        bisect::<(), SolverError, _>(lo, hi, BisectConfig::default(), monotonicity, |x| {
            Ok((f(x), ()))
        })
        .expect("bisect")
    }

    #[test]
    fn finds_root_of_decreasing_line_on_feasible_side() {
        let result = solve(0.0, 10_000.0, Monotonicity::Decreasing, |x| 4_321.0 - x);
        assert_eq!(result.status, BisectionStatus::Converged);
        assert!(result.value >= 0.0 && result.value <= 0.005);
        assert!((result.x - 4_321.0).abs() <= 0.01);
    }

    #[test]
    fn finds_root_of_increasing_line_on_feasible_side() {
        let result = solve(0.0, 10_000.0, Monotonicity::Increasing, |x| 0.7 * x - 2_000.0);
        assert_eq!(result.status, BisectionStatus::Converged);
        assert!(result.value >= 0.0);
        assert!(result.x >= 2_000.0 / 0.7 - 1e-6);
    }

    #[test]
    fn saturates_when_whole_range_is_feasible() {
        let decreasing = solve(0.0, 100.0, Monotonicity::Decreasing, |x| 500.0 - x);
        assert_eq!(decreasing.status, BisectionStatus::SaturatedHigh);
        assert_eq!(decreasing.x, 100.0);
        assert_eq!(decreasing.iterations, 0);

        let increasing = solve(50.0, 100.0, Monotonicity::Increasing, |x| x);
        assert_eq!(increasing.status, BisectionStatus::SaturatedLow);
        assert_eq!(increasing.x, 50.0);
    }

    #[test]
    fn reports_infeasible_end_when_no_root_exists() {
        let result = solve(0.0, 100.0, Monotonicity::Increasing, |x| x - 1_000.0);
        assert_eq!(result.status, BisectionStatus::SaturatedHigh);
        assert!(!result.is_feasible());
        assert_eq!(result.value, -900.0);

        let result = solve(0.0, 100.0, Monotonicity::Decreasing, |x| -1.0 - x);
        assert_eq!(result.status, BisectionStatus::SaturatedLow);
        assert_eq!(result.x, 0.0);
    }

    #[test]
    fn handles_step_functions_by_narrowing_the_bracket() {
        let result = solve(0.0, 1_000.0, Monotonicity::Decreasing, |x| {
            if x <= 300.0 { 50.0 } else { -50.0 }
        });
        assert_eq!(result.status, BisectionStatus::Converged);
        assert_eq!(result.value, 50.0);
        assert!((result.x - 300.0).abs() <= 1e-5);
    }

    #[test]
    fn non_finite_balance_is_an_error() {
        let err = bisect::<(), SolverError, _>(
            0.0,
            10.0,
            BisectConfig::default(),
            Monotonicity::Increasing,
            |_| Ok((f64::NAN, ())),
        )
        .expect_err("nan");
        assert_eq!(err, SolverError::NonFinite(0.0));
    }

    #[test]
    fn iteration_cap_is_reported() {
        let config = BisectConfig {
            tolerance: 1e-12,
            x_tolerance: 1e-12,
            max_iterations: 3,
        };
        let err = bisect::<(), SolverError, _>(
            0.0,
            1_000.0,
            config,
            Monotonicity::Decreasing,
            |x| Ok((123.456 - x, ())),
        )
        .expect_err("cap");
        assert!(matches!(err, SolverError::NotConverged { iterations: 3, .. }));
    }

    #[test]
    fn evaluator_errors_propagate() {
        let err = bisect::<(), SimError, _>(
            0.0,
            10.0,
            BisectConfig::default(),
            Monotonicity::Increasing,
            |_| Err(SimError::NegativeIncome(-1.0)),
        )
        .expect_err("propagates");
        assert_eq!(err, SimError::NegativeIncome(-1.0));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_root_is_bracketed_and_feasible(
            root in 0.0f64..50_000.0,
            slope in 0.05f64..5.0,
            increasing in proptest::bool::ANY,
        ) {
            let (monotonicity, f): (Monotonicity, Box<dyn Fn(f64) -> f64>) = if increasing {
                (Monotonicity::Increasing, Box::new(move |x| slope * (x - root)))
            } else {
                (Monotonicity::Decreasing, Box::new(move |x| slope * (root - x)))
            };
            let result = solve(0.0, 50_000.0, monotonicity, f);
            prop_assert!(result.value >= 0.0);
            prop_assert!((result.x - root).abs() <= 0.005 / slope + 1e-5);
            prop_assert!(result.x >= 0.0 && result.x <= 50_000.0);
        }

        #[test]
        fn prop_evaluator_output_matches_returned_point(root in 1.0f64..1_000.0) {
            let result = bisect::<f64, SolverError, _>(
                0.0,
                1_000.0,
                BisectConfig::default(),
                Monotonicity::Decreasing,
                |x| Ok((root - x, x)),
            )
            .expect("bisect");
            prop_assert_eq!(result.output, result.x);
        }
    }
}
