use log::{debug, info, warn};
use rayon::prelude::*;

use super::account::round_cents;
use super::engine::{Simulation, run_simulation};
use super::error::{SimError, SimResult};
use super::tax::TaxService;
use super::types::{
    ConversionCandidate, ConversionSearch, GridPoint, Inputs, SearchStop, SweepResult,
};

/// Hard stop for the conversion sweep.
pub const MAX_CANDIDATES: usize = 10_000;

pub const DEFAULT_RATES: [f64; 7] = [1.01, 1.02, 1.03, 1.04, 1.05, 1.06, 1.07];

fn has_conversion_years(inputs: &Inputs) -> bool {
    let first_retired = inputs.age_of_retirement.max(inputs.current_age);
    let last_alive = inputs.age_of_death;
    first_retired < inputs.age_to_start_rmds && first_retired <= last_alive
}

/// Steps the yearly conversion amount up by `roth_conversion_unit` and keeps
/// the candidate with the largest after-tax legacy.
///
/// The objective is not monotone, so the sweep keeps going past dips and only
/// stops once larger candidates cannot change anything.
pub fn search_roth_conversion<T: TaxService + Clone>(
    inputs: &Inputs,
    tax: &T,
) -> SimResult<ConversionSearch> {
    inputs.validate()?;
    if !(inputs.roth_conversion_unit > 0.0) {
        return Err(SimError::InvalidConfig(format!(
            "conversion unit must be positive, got {}",
            inputs.roth_conversion_unit
        )));
    }
    let conversion_years = has_conversion_years(inputs);

    let mut candidates = Vec::new();
    let mut best: Option<ConversionCandidate> = None;
    let mut step = 0usize;
    let stop = loop {
        if step >= MAX_CANDIDATES {
            warn!(
                "conversion search stopped after {MAX_CANDIDATES} candidates at {:.2}/year",
                step as f64 * inputs.roth_conversion_unit
            );
            break SearchStop::CandidateCap;
        }

        let amount = step as f64 * inputs.roth_conversion_unit;
        let candidate_inputs = Inputs {
            roth_conversion_amount: amount,
            ..inputs.clone()
        };
        let simulation = run_simulation(candidate_inputs, tax.clone())?;
        let summary = simulation.summary();
        let candidate = ConversionCandidate {
            roth_conversion_amount: amount,
            after_tax_assets: summary.after_tax_assets,
            total_taxes: summary.total_taxes,
            traditional_at_death: summary.final_balances.traditional(),
            insolvent: summary.insolvent,
        };
        debug!(
            "conversion {:.2}: after-tax assets {:.2}{}",
            amount,
            candidate.after_tax_assets,
            if candidate.insolvent { " (insolvent)" } else { "" }
        );
        candidates.push(candidate);

        // Ties go to the larger conversion.
        let improves = best.is_none_or(|current| {
            round_cents(candidate.after_tax_assets) >= round_cents(current.after_tax_assets)
        });
        if !candidate.insolvent && improves {
            best = Some(candidate);
        }

        if !conversion_years {
            break SearchStop::NoConversionYears;
        }
        if round_cents(candidate.traditional_at_death) == 0.0 {
            break SearchStop::TraditionalExhausted;
        }
        if step > 0 && !converted_full_amount(&simulation, amount) {
            break SearchStop::ConversionSaturated;
        }
        step += 1;
    };

    match best {
        Some(best) => info!(
            "best conversion {:.2}/year: after-tax assets {:.2} ({} candidates, {:?})",
            best.roth_conversion_amount,
            best.after_tax_assets,
            candidates.len(),
            stop
        ),
        None => warn!(
            "every conversion candidate ran out of money ({} tried)",
            candidates.len()
        ),
    }

    Ok(ConversionSearch {
        best,
        candidates,
        stop,
    })
}

fn converted_full_amount<T: TaxService>(simulation: &Simulation<T>, amount: f64) -> bool {
    simulation
        .rows()
        .iter()
        .any(|row| round_cents(row.roth_conversion) >= round_cents(amount))
}

/// Runs the search, then replays the winning candidate so its years can be reported.
pub fn plan_best_conversion<T: TaxService + Clone>(
    inputs: &Inputs,
    tax: &T,
) -> SimResult<(ConversionSearch, Simulation<T>)> {
    let search = search_roth_conversion(inputs, tax)?;
    let amount = search
        .best
        .map(|best| best.roth_conversion_amount)
        .unwrap_or(0.0);
    let simulation = run_simulation(
        Inputs {
            roth_conversion_amount: amount,
            ..inputs.clone()
        },
        tax.clone(),
    )?;
    Ok((search, simulation))
}

/// Rate-of-return by years-to-wait grid for sensitivity sweeps.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub rates: Vec<f64>,
    pub years_to_wait: Vec<u32>,
}

impl SweepGrid {
    /// Default rates, and every deferral length up to the working years.
    pub fn for_inputs(inputs: &Inputs) -> Self {
        Self {
            rates: DEFAULT_RATES.to_vec(),
            years_to_wait: (0..inputs.working_years().max(1)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.rates.len() * self.years_to_wait.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Runs an independent conversion search for every grid point in parallel.
pub fn sweep_grid<T: TaxService + Clone>(
    inputs: &Inputs,
    tax: &T,
    grid: &SweepGrid,
) -> SimResult<SweepResult> {
    let coordinates: Vec<(f64, u32)> = grid
        .rates
        .iter()
        .flat_map(|rate| grid.years_to_wait.iter().map(move |wait| (*rate, *wait)))
        .collect();
    info!("sweeping {} grid points", coordinates.len());

    let mut points = coordinates
        .par_iter()
        .map(|&(rate_of_return, years_to_wait)| {
            let point_inputs = Inputs {
                rate_of_return,
                years_to_wait,
                ..inputs.clone()
            };
            let search = search_roth_conversion(&point_inputs, tax)?;
            Ok(GridPoint {
                rate_of_return,
                years_to_wait,
                best_conversion: search.best.map(|best| best.roth_conversion_amount),
                after_tax_assets: search.best.map(|best| best.after_tax_assets),
                total_taxes: search.best.map(|best| best.total_taxes),
                candidates_tried: search.candidates.len(),
            })
        })
        .collect::<SimResult<Vec<_>>>()?;

    points.sort_by(|a, b| {
        a.rate_of_return
            .total_cmp(&b.rate_of_return)
            .then(a.years_to_wait.cmp(&b.years_to_wait))
    });

    let mut best_by_rate: Vec<GridPoint> = Vec::new();
    for point in &points {
        let Some(assets) = point.after_tax_assets else {
            continue;
        };
        match best_by_rate.last_mut() {
            Some(best) if best.rate_of_return == point.rate_of_return => {
                if best.after_tax_assets.is_none_or(|current| assets > current) {
                    *best = *point;
                }
            }
            _ => best_by_rate.push(*point),
        }
    }

    Ok(SweepResult {
        points,
        best_by_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tax::Tax2021;
    use crate::core::types::AccountAmounts;

    fn retiree_inputs() -> Inputs {
        Inputs {
            current_age: 60,
            age_of_retirement: 60,
            age_of_death: 80,
            income: 0.0,
            spending: 40_000.0,
            roth_conversion_unit: 25_000.0,
            starting_balances: AccountAmounts {
                traditional_ira: 800_000.0,
                taxable: 300_000.0,
                ..AccountAmounts::default()
            },
            ..Inputs::default()
        }
    }

    #[test]
    fn search_is_deterministic() {
        let inputs = retiree_inputs();
        let first = search_roth_conversion(&inputs, &Tax2021).expect("first");
        let second = search_roth_conversion(&inputs, &Tax2021).expect("second");
        assert_eq!(first, second);
        let best = first.best.expect("solvent candidate");
        assert!(best.after_tax_assets > 0.0);
        assert_eq!(best.roth_conversion_amount % 25_000.0, 0.0);
    }

    #[test]
    fn best_candidate_is_the_maximum_seen() {
        let search = search_roth_conversion(&retiree_inputs(), &Tax2021).expect("search");
        let best = search.best.expect("best");
        for candidate in search.candidates.iter().filter(|c| !c.insolvent) {
            assert!(round_cents(candidate.after_tax_assets) <= round_cents(best.after_tax_assets));
        }
        assert!(search.candidates.len() > 1);
        assert!(matches!(
            search.stop,
            SearchStop::TraditionalExhausted | SearchStop::ConversionSaturated
        ));
    }

    #[test]
    fn no_conversion_years_tries_only_zero() {
        let inputs = Inputs {
            current_age: 72,
            age_of_retirement: 72,
            age_of_death: 80,
            ..retiree_inputs()
        };
        let search = search_roth_conversion(&inputs, &Tax2021).expect("search");
        assert_eq!(search.stop, SearchStop::NoConversionYears);
        assert_eq!(search.candidates.len(), 1);
        assert_eq!(search.best.expect("best").roth_conversion_amount, 0.0);
    }

    #[test]
    fn empty_traditional_stops_immediately() {
        let inputs = Inputs {
            starting_balances: AccountAmounts {
                taxable: 900_000.0,
                ..AccountAmounts::default()
            },
            ..retiree_inputs()
        };
        let search = search_roth_conversion(&inputs, &Tax2021).expect("search");
        assert_eq!(search.stop, SearchStop::TraditionalExhausted);
        assert_eq!(search.candidates.len(), 1);
    }

    #[test]
    fn replay_matches_the_winning_candidate() {
        let inputs = retiree_inputs();
        let (search, simulation) = plan_best_conversion(&inputs, &Tax2021).expect("plan");
        let best = search.best.expect("best");
        assert_eq!(
            simulation.summary().roth_conversion_amount,
            best.roth_conversion_amount
        );
        assert_eq!(simulation.total_assets_after_death(), best.after_tax_assets);
    }

    #[test]
    fn search_maximizes_assets_net_of_lifetime_taxes() {
        let inputs = Inputs {
            roth_conversion_unit: 5_000.0,
            ..retiree_inputs()
        };
        let (search, simulation) = plan_best_conversion(&inputs, &Tax2021).expect("plan");
        let best = search.best.expect("best");
        let summary = simulation.summary();
        assert_eq!(
            best.after_tax_assets,
            summary.total_assets - summary.total_taxes
        );
        assert!(summary.total_taxes > summary.estate_tax + summary.heir_tax);
        assert_eq!(best.roth_conversion_amount, 0.0);
        assert!((best.after_tax_assets - 1_107_528.89).abs() <= 0.01);
    }

    #[test]
    fn invalid_unit_is_rejected() {
        let inputs = Inputs {
            roth_conversion_unit: 0.0,
            ..retiree_inputs()
        };
        assert!(matches!(
            search_roth_conversion(&inputs, &Tax2021),
            Err(SimError::InvalidConfig(_))
        ));
    }

    #[test]
    fn grid_sweep_is_sorted_and_picks_best_per_rate() {
        let inputs = Inputs {
            current_age: 57,
            ..retiree_inputs()
        };
        let grid = SweepGrid {
            rates: vec![1.05, 1.02],
            years_to_wait: vec![0, 1, 2],
        };
        let result = sweep_grid(&inputs, &Tax2021, &grid).expect("sweep");
        assert_eq!(result.points.len(), grid.len());
        assert_eq!(result.points[0].rate_of_return, 1.02);
        assert_eq!(result.points[0].years_to_wait, 0);
        assert_eq!(result.points[5].rate_of_return, 1.05);
        assert_eq!(result.best_by_rate.len(), 2);
        for best in &result.best_by_rate {
            let top = result
                .points
                .iter()
                .filter(|p| p.rate_of_return == best.rate_of_return)
                .filter_map(|p| p.after_tax_assets)
                .fold(f64::MIN, f64::max);
            assert_eq!(best.after_tax_assets, Some(top));
        }
    }

    #[test]
    fn default_grid_covers_working_years() {
        let grid = SweepGrid::for_inputs(&Inputs::default());
        assert_eq!(grid.rates.len(), 7);
        assert_eq!(grid.years_to_wait, (0..22).collect::<Vec<_>>());
        let retired = SweepGrid::for_inputs(&retiree_inputs());
        assert_eq!(retired.years_to_wait, vec![0]);
    }
}
