use log::{debug, warn};

use super::account::Ledger;
use super::error::{SimError, SimResult};
use super::solver::{BisectConfig, BisectionStatus, Monotonicity, bisect};
use super::tax::{TaxBreakdown, TaxService, TaxYear, assess_year};
use super::types::{AccountAmounts, AccountKind};

const PENALTY_FREE_AGE: u32 = 60;
const HSA_PENALTY_FREE_AGE: u32 = 65;
const EARLY_WITHDRAWAL_PENALTY: f64 = 0.10;
const HSA_EARLY_PENALTY: f64 = 0.20;
const SEPARATION_AGE: u32 = 55;
const PUBLIC_SAFETY_SEPARATION_AGE: u32 = 50;

/// The parts of a year that are settled before any money comes out.
#[derive(Debug, Clone, Copy)]
pub struct WithdrawalYear {
    pub age: u32,
    pub age_of_retirement: u32,
    pub retired: bool,
    pub public_safety_employee: bool,
    pub spending: f64,
    /// Wages, deductions and credits from the contribution step.
    pub base: TaxYear,
    /// Employee contributions already committed this year.
    pub contributions: f64,
    pub rmds: AccountAmounts,
    /// Traditional dollars to move to the Roth IRA this year.
    pub conversion: f64,
}

impl WithdrawalYear {
    /// Smallest total withdrawal allowed: RMDs plus the conversion source.
    pub fn floor(&self) -> f64 {
        self.rmds.traditional() + self.conversion
    }

    fn separated_from_service(&self) -> bool {
        let threshold = if self.public_safety_employee {
            PUBLIC_SAFETY_SEPARATION_AGE
        } else {
            SEPARATION_AGE
        };
        self.retired && self.age >= self.age_of_retirement && self.age_of_retirement >= threshold
    }

    /// Early-withdrawal penalty on the taxable part of a draw from `kind`.
    pub fn penalty_rate(&self, kind: AccountKind) -> f64 {
        match kind {
            AccountKind::Taxable => 0.0,
            AccountKind::Hsa if self.age < HSA_PENALTY_FREE_AGE => HSA_EARLY_PENALTY,
            AccountKind::Hsa => 0.0,
            _ if self.age >= PENALTY_FREE_AGE => 0.0,
            _ if kind.is_employer_plan() && self.separated_from_service() => 0.0,
            _ => EARLY_WITHDRAWAL_PENALTY,
        }
    }

    fn roth_gains_taxable(&self) -> bool {
        self.age < PENALTY_FREE_AGE
    }
}

/// A candidate split of one total withdrawal across the accounts.
///
/// Each priority step takes the plan by value and hands back the next one, so
/// the amount still to place travels with the plan instead of living in
/// shared state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WithdrawalPlan {
    /// Everything taken from each account, conversion source included.
    pub draws: AccountAmounts,
    pub gains: AccountAmounts,
    pub conversion: f64,
    /// Ordinary income created by the draws.
    pub ordinary_income: f64,
    pub ltcg: f64,
    pub penalties: f64,
    pub unallocated: f64,
}

impl WithdrawalPlan {
    pub fn new(total: f64) -> Self {
        Self {
            unallocated: total.max(0.0),
            ..Self::default()
        }
    }

    /// Spendable dollars: the conversion never leaves the tax-advantaged accounts.
    pub fn cash(&self) -> f64 {
        self.draws.total() - self.conversion
    }

    fn available(&self, ledger: &Ledger, kind: AccountKind) -> f64 {
        (ledger.get(kind).value() - self.draws.get(kind)).max(0.0)
    }

    fn roth_basis_available(&self, ledger: &Ledger, kind: AccountKind) -> f64 {
        (ledger.get(kind).contributions() - self.draws.get(kind)).max(0.0)
    }

    fn draw(
        mut self,
        ledger: &Ledger,
        year: &WithdrawalYear,
        kind: AccountKind,
        amount: f64,
    ) -> SimResult<Self> {
        let amount = amount
            .min(self.unallocated)
            .min(self.available(ledger, kind));
        if amount <= 0.0 {
            return Ok(self);
        }

        let account = ledger.get(kind);
        let already = self.draws.get(kind);
        let gains = account.preview_withdrawal(already + amount)?.gains_portion
            - account.preview_withdrawal(already)?.gains_portion;

        match kind {
            AccountKind::Taxable => self.ltcg += gains,
            AccountKind::Roth401k | AccountKind::RothIra => {
                if year.roth_gains_taxable() {
                    self.ordinary_income += gains;
                    self.penalties += gains * year.penalty_rate(kind);
                }
            }
            AccountKind::Hsa | AccountKind::Traditional401k | AccountKind::TraditionalIra => {
                self.ordinary_income += amount;
                self.penalties += amount * year.penalty_rate(kind);
            }
        }
        self.draws.add(kind, amount);
        self.gains.add(kind, gains);
        self.unallocated -= amount;
        Ok(self)
    }

    // Conversions are taxed as ordinary income but are never penalized.
    fn convert(mut self, ledger: &Ledger, amount: f64) -> Self {
        let mut remaining = amount.min(self.unallocated);
        for kind in [AccountKind::TraditionalIra, AccountKind::Traditional401k] {
            let moved = remaining.min(self.available(ledger, kind));
            if moved <= 0.0 {
                continue;
            }
            self.draws.add(kind, moved);
            self.ordinary_income += moved;
            self.conversion += moved;
            self.unallocated -= moved;
            remaining -= moved;
        }
        self
    }

    fn tax_year(&self, year: &WithdrawalYear) -> TaxYear {
        TaxYear {
            ordinary_income: year.base.ordinary_income + self.ordinary_income,
            ltcg: year.base.ltcg + self.ltcg,
            ..year.base
        }
    }

    pub fn assess<T: TaxService + ?Sized>(
        &self,
        tax: &T,
        year: &WithdrawalYear,
    ) -> SimResult<TaxBreakdown> {
        let mut taxes = assess_year(tax, &self.tax_year(year))?;
        taxes.penalties = self.penalties;
        Ok(taxes)
    }

    pub fn balance(&self, year: &WithdrawalYear, taxes: &TaxBreakdown) -> f64 {
        year.base.wages + self.cash() - taxes.total() - year.spending - year.contributions
    }
}

/// Splits a total withdrawal across accounts, most favourable source first.
pub fn plan_withdrawals<T: TaxService + ?Sized>(
    tax: &T,
    ledger: &Ledger,
    year: &WithdrawalYear,
    total: f64,
) -> SimResult<WithdrawalPlan> {
    use AccountKind::*;

    let married = year.base.married;
    let deduction = tax.standard_deduction(married);
    let ordinary_so_far = |plan: &WithdrawalPlan| year.base.ordinary_income + plan.ordinary_income;
    let penalty_free = |kind: AccountKind| year.penalty_rate(kind) == 0.0;

    let mut plan = WithdrawalPlan::new(total)
        .draw(ledger, year, Traditional401k, year.rmds.traditional_401k)?
        .draw(ledger, year, TraditionalIra, year.rmds.traditional_ira)?
        .convert(ledger, year.conversion);

    // Tax-deferred dollars sheltered by the standard deduction.
    for kind in [Traditional401k, TraditionalIra] {
        if penalty_free(kind) {
            let room = (deduction - ordinary_so_far(&plan)).max(0.0);
            plan = plan.draw(ledger, year, kind, room)?;
        }
    }

    // Taxable gains inside the 0% long-term band.
    let taxable = ledger.get(Taxable);
    if taxable.value() > 0.0 {
        let gains_room = (deduction + tax.ltcg_zero_rate_limit(married)
            - ordinary_so_far(&plan)
            - year.base.ltcg
            - plan.ltcg)
            .max(0.0);
        let gains_ratio = (taxable.gains() / taxable.value()).clamp(0.0, 1.0);
        let amount = if gains_ratio > 0.0 {
            gains_room / gains_ratio
        } else {
            plan.available(ledger, Taxable)
        };
        plan = plan.draw(ledger, year, Taxable, amount)?;
    }

    // Tax-deferred dollars up to the top of the lowest bracket.
    for kind in [Traditional401k, TraditionalIra] {
        if penalty_free(kind) {
            let room =
                (deduction + tax.lowest_bracket_limit(married) - ordinary_so_far(&plan)).max(0.0);
            plan = plan.draw(ledger, year, kind, room)?;
        }
    }

    for kind in [RothIra, Roth401k] {
        let basis = plan.roth_basis_available(ledger, kind);
        plan = plan.draw(ledger, year, kind, basis)?;
    }

    let mut plan = plan.draw(ledger, year, Taxable, f64::INFINITY)?;
    for kind in [Traditional401k, TraditionalIra, Hsa, RothIra, Roth401k] {
        plan = plan.draw(ledger, year, kind, f64::INFINITY)?;
    }
    Ok(plan)
}

#[derive(Debug, Clone, Copy)]
pub struct WithdrawalOutcome {
    pub plan: WithdrawalPlan,
    pub taxes: TaxBreakdown,
    pub total: f64,
    /// Cash left over after the year's obligations; reinvested by the caller.
    pub surplus: f64,
    /// Unmet obligation when every account is drained; zero otherwise.
    pub needed_to_continue: f64,
    pub iterations: u32,
    pub status: BisectionStatus,
}

impl WithdrawalOutcome {
    pub fn is_insolvent(&self) -> bool {
        self.needed_to_continue > 0.0
    }
}

/// Finds the smallest withdrawal at or above the RMD floor that balances the year.
pub fn solve_withdrawals<T: TaxService + ?Sized>(
    tax: &T,
    ledger: &Ledger,
    year: &WithdrawalYear,
    config: BisectConfig,
) -> SimResult<WithdrawalOutcome> {
    let floor = year.floor();
    let ceiling = ledger.total().max(floor);
    let result = bisect::<_, SimError, _>(floor, ceiling, config, Monotonicity::Increasing, |total| {
        let plan = plan_withdrawals(tax, ledger, year, total)?;
        let taxes = plan.assess(tax, year)?;
        Ok((plan.balance(year, &taxes), (plan, taxes)))
    })?;

    let (plan, taxes) = result.output;
    let needed_to_continue = if result.is_feasible() {
        0.0
    } else {
        -result.value
    };
    if needed_to_continue > 0.0 {
        warn!(
            "age {}: assets exhausted, {:.2} short of covering the year",
            year.age, needed_to_continue
        );
    } else {
        debug!(
            "age {}: withdrawal {:.2} (floor {:.2}, {:?}, {} iterations)",
            year.age, result.x, floor, result.status, result.iterations
        );
    }

    Ok(WithdrawalOutcome {
        plan,
        taxes,
        total: result.x,
        surplus: result.value.max(0.0),
        needed_to_continue,
        iterations: result.iterations,
        status: result.status,
    })
}

/// Commits a plan: draws every account, then credits the conversion to the Roth IRA.
pub fn apply_plan(ledger: &mut Ledger, plan: &WithdrawalPlan) -> SimResult<()> {
    for kind in AccountKind::ALL {
        let amount = plan.draws.get(kind);
        if amount > 0.0 {
            ledger.withdraw_exact(kind, amount)?;
        }
    }
    if plan.conversion > 0.0 {
        // Converted dollars were taxed on the way in, so they join the basis.
        ledger
            .get_mut(AccountKind::RothIra)
            .contribute(plan.conversion, false)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state_tax::StateCode;
    use crate::core::tax::Tax2021;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn retired_year(age: u32, spending: f64) -> WithdrawalYear {
        WithdrawalYear {
            age,
            age_of_retirement: 50,
            retired: true,
            public_safety_employee: false,
            spending,
            base: TaxYear {
                ordinary_income: 0.0,
                ltcg: 0.0,
                wages: 0.0,
                retirement_contributions: 0.0,
                married: true,
                dependents: 0,
                state: StateCode::Tx,
            },
            contributions: 0.0,
            rmds: AccountAmounts::default(),
            conversion: 0.0,
        }
    }

    fn ledger(balances: AccountAmounts) -> Ledger {
        Ledger::open(1.0, &balances).expect("open")
    }

    fn solve(ledger: &Ledger, year: &WithdrawalYear) -> WithdrawalOutcome {
        solve_withdrawals(&Tax2021, ledger, year, BisectConfig::default()).expect("solve")
    }

    #[test]
    fn nothing_to_do_draws_nothing() {
        let ledger = ledger(AccountAmounts::default());
        let outcome = solve(&ledger, &retired_year(65, 0.0));
        assert_eq!(outcome.total, 0.0);
        assert_eq!(outcome.plan.draws.total(), 0.0);
        assert_eq!(outcome.taxes.total(), 0.0);
        assert!(!outcome.is_insolvent());
    }

    #[test]
    fn taxable_gains_inside_zero_band_cost_nothing() {
        let mut ledger = ledger(AccountAmounts {
            taxable: 50_000.0,
            ..AccountAmounts::default()
        });
        ledger
            .get_mut(AccountKind::Taxable)
            .contribute(50_000.0, true)
            .expect("gains");

        let outcome = solve(&ledger, &retired_year(65, 20_000.0));
        assert_approx_tol(outcome.plan.draws.taxable, 20_000.0, 0.01);
        assert_approx_tol(outcome.plan.gains.taxable, 10_000.0, 0.01);
        assert_eq!(outcome.taxes.total(), 0.0);
        assert!(outcome.surplus <= 0.005);
    }

    #[test]
    fn roth_basis_comes_out_tax_and_penalty_free() {
        let mut ledger = ledger(AccountAmounts {
            roth_ira: 50_000.0,
            ..AccountAmounts::default()
        });
        ledger
            .get_mut(AccountKind::RothIra)
            .contribute(30_000.0, true)
            .expect("gains");

        let outcome = solve(&ledger, &retired_year(52, 10_000.0));
        assert_approx_tol(outcome.plan.draws.roth_ira, 10_000.0, 0.01);
        assert_eq!(outcome.plan.gains.roth_ira, 0.0);
        assert_eq!(outcome.taxes.penalties, 0.0);
    }

    #[test]
    fn early_ira_withdrawals_are_penalized() {
        let ledger = ledger(AccountAmounts {
            traditional_ira: 100_000.0,
            ..AccountAmounts::default()
        });
        let outcome = solve(&ledger, &retired_year(52, 20_000.0));
        let drawn = outcome.plan.draws.traditional_ira;
        assert!(drawn > 20_000.0);
        assert_approx_tol(outcome.taxes.penalties, drawn * 0.10, 1e-6);
        assert!(outcome.surplus <= 0.005);
    }

    #[test]
    fn separation_after_55_waives_the_401k_penalty() {
        let ledger = ledger(AccountAmounts {
            traditional_401k: 100_000.0,
            ..AccountAmounts::default()
        });
        let mut year = retired_year(56, 20_000.0);
        year.age_of_retirement = 55;
        let outcome = solve(&ledger, &year);
        assert_eq!(outcome.taxes.penalties, 0.0);
        assert_approx_tol(outcome.plan.draws.traditional_401k, 20_000.0, 0.01);

        year.age_of_retirement = 52;
        assert_eq!(year.penalty_rate(AccountKind::Traditional401k), 0.10);
        year.public_safety_employee = true;
        assert_eq!(year.penalty_rate(AccountKind::Traditional401k), 0.0);
        assert_eq!(year.penalty_rate(AccountKind::TraditionalIra), 0.10);
        assert_eq!(year.penalty_rate(AccountKind::Hsa), 0.20);
    }

    #[test]
    fn conversion_is_taxed_but_not_spent() {
        let ledger = ledger(AccountAmounts {
            traditional_ira: 200_000.0,
            taxable: 100_000.0,
            ..AccountAmounts::default()
        });
        let mut year = retired_year(65, 0.0);
        year.conversion = 40_000.0;
        let outcome = solve(&ledger, &year);
        assert_eq!(outcome.plan.conversion, 40_000.0);
        // 14,900 of taxable income after the deduction.
        assert_approx_tol(outcome.taxes.federal, 1_490.0, 1e-6);
        assert_approx_tol(outcome.plan.cash(), 1_490.0, 0.01);
        assert_approx_tol(outcome.plan.draws.taxable, 1_490.0, 0.01);

        let mut applied = ledger.clone();
        apply_plan(&mut applied, &outcome.plan).expect("apply");
        assert_approx_tol(applied.get(AccountKind::RothIra).value(), 40_000.0, 1e-9);
        assert_approx_tol(applied.get(AccountKind::RothIra).contributions(), 40_000.0, 1e-9);
        assert_approx_tol(applied.traditional(), 160_000.0, 1e-9);
    }

    #[test]
    fn running_dry_reports_the_shortfall() {
        let ledger = ledger(AccountAmounts {
            taxable: 5_000.0,
            ..AccountAmounts::default()
        });
        let outcome = solve(&ledger, &retired_year(70, 30_000.0));
        assert!(outcome.is_insolvent());
        assert_eq!(outcome.status, BisectionStatus::SaturatedHigh);
        assert_approx_tol(outcome.needed_to_continue, 25_000.0, 1e-6);
        assert_approx_tol(outcome.plan.draws.taxable, 5_000.0, 1e-9);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_withdrawal_never_undercuts_rmds(
            age in 72u32..100,
            traditional_401k in 0.0f64..2_000_000.0,
            traditional_ira in 0.0f64..2_000_000.0,
            taxable in 0.0f64..500_000.0,
            spending in 0.0f64..150_000.0,
        ) {
            let ledger = ledger(AccountAmounts {
                traditional_401k,
                traditional_ira,
                taxable,
                ..AccountAmounts::default()
            });
            let divisor = Tax2021.rmd_divisor(age).expect("rmd age");
            let mut year = retired_year(age, spending);
            year.rmds = AccountAmounts {
                traditional_401k: traditional_401k / divisor,
                traditional_ira: traditional_ira / divisor,
                ..AccountAmounts::default()
            };
            let outcome = solve(&ledger, &year);
            prop_assert!(outcome.total >= year.floor());
            prop_assert!(outcome.plan.draws.traditional() + 1e-6 >= year.rmds.traditional());
            prop_assert!(outcome.plan.draws.total() <= ledger.total() + 1e-6);
            if !outcome.is_insolvent() {
                prop_assert!(outcome.surplus >= 0.0);
            }
        }
    }
}
