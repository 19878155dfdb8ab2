use log::{debug, info};

use super::account::Ledger;
use super::contribution::{ContributionPlan, WorkingYear, solve_contributions, tax_year};
use super::error::SimResult;
use super::solver::BisectConfig;
use super::tax::{TaxService, TaxYear};
use super::types::{
    AccountAmounts, AccountKind, Inputs, Phase, SimulationSummary, YearRow,
};
use super::withdrawal::{WithdrawalYear, apply_plan, solve_withdrawals};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum RunState {
    Running,
    Dead,
    Insolvent,
    Failed,
}

#[derive(Debug, Clone, Copy, Default)]
struct TerminalTaxes {
    estate_tax: f64,
    heir_tax: f64,
}

/// One lifetime, simulated a year at a time.
#[derive(Debug, Clone)]
pub struct Simulation<T: TaxService> {
    inputs: Inputs,
    tax: T,
    config: BisectConfig,
    ledger: Ledger,
    age: u32,
    year: u32,
    income: f64,
    lifetime_taxes: f64,
    needed_to_continue: f64,
    rows: Vec<YearRow>,
    state: RunState,
    terminal: TerminalTaxes,
}

impl<T: TaxService> Simulation<T> {
    pub fn new(inputs: Inputs, tax: T) -> SimResult<Self> {
        inputs.validate()?;
        let ledger = Ledger::open(inputs.rate_of_return, &inputs.starting_balances)?;
        Ok(Self {
            age: inputs.current_age,
            year: 0,
            income: capped_income(inputs.income, inputs.max_income),
            inputs,
            tax,
            config: BisectConfig::default(),
            ledger,
            lifetime_taxes: 0.0,
            needed_to_continue: 0.0,
            rows: Vec::new(),
            state: RunState::Running,
            terminal: TerminalTaxes::default(),
        })
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn is_finished(&self) -> bool {
        self.state != RunState::Running
    }

    pub fn rows(&self) -> &[YearRow] {
        &self.rows
    }

    /// Runs the next year, or returns `None` once the simulation has ended.
    pub fn step_year(&mut self) -> SimResult<Option<YearRow>> {
        if self.is_finished() {
            return Ok(None);
        }
        match self.run_year() {
            Ok(row) => Ok(Some(row)),
            Err(err) => {
                self.state = RunState::Failed;
                Err(err)
            }
        }
    }

    /// Lazy year-by-year view; each `next` runs one more year.
    pub fn years(&mut self) -> Years<'_, T> {
        Years { simulation: self }
    }

    pub fn simulate(&mut self) -> SimResult<()> {
        while self.step_year()?.is_some() {}
        Ok(())
    }

    /// Taxes paid while alive plus the estate and heir taxes at death.
    pub fn total_taxes(&self) -> f64 {
        self.lifetime_taxes + self.terminal.estate_tax + self.terminal.heir_tax
    }

    pub fn total_assets(&self) -> f64 {
        self.ledger.total()
    }

    /// Final assets net of every tax the household and its heirs pay, lifetime
    /// taxes included. This is the value the conversion search maximizes.
    pub fn total_assets_after_death(&self) -> f64 {
        self.total_assets() - self.total_taxes()
    }

    pub fn needed_to_continue(&self) -> f64 {
        self.needed_to_continue
    }

    pub fn summary(&self) -> SimulationSummary {
        let total_assets = self.total_assets();
        let total_taxes = self.total_taxes();
        SimulationSummary {
            roth_conversion_amount: self.inputs.roth_conversion_amount,
            years_simulated: self.rows.len() as u32,
            final_balances: self.ledger.balances(),
            total_assets,
            estate_tax: self.terminal.estate_tax,
            heir_tax: self.terminal.heir_tax,
            lifetime_taxes: self.lifetime_taxes,
            total_taxes,
            after_tax_assets: self.total_assets_after_death(),
            tax_asset_ratio: if total_assets > 0.0 {
                total_taxes / total_assets
            } else {
                0.0
            },
            needed_to_continue: self.needed_to_continue,
            insolvent: self.state == RunState::Insolvent,
        }
    }

    fn run_year(&mut self) -> SimResult<YearRow> {
        let age = self.age;
        let phase = self.inputs.phase_at(age);
        let married = self.inputs.married_at(age);
        let dependents = self.inputs.dependents_at(age);
        let state = self.inputs.state_at(age);
        let wages = if phase == Phase::Working {
            self.income
        } else {
            0.0
        };

        let (contributions, base) = if phase == Phase::Working {
            let working = WorkingYear::from_inputs(&self.inputs, self.year, age, wages);
            let outcome = solve_contributions(&self.tax, &working, self.config)?;
            let deposits = outcome.plan.employee_deposits();
            for kind in AccountKind::ALL {
                let amount = deposits.get(kind);
                if amount > 0.0 {
                    self.ledger.get_mut(kind).contribute(amount, false)?;
                }
            }
            // The employer's dollars were never taxed to the employee, so they
            // stay out of the Roth basis.
            if outcome.plan.employer_match > 0.0 {
                self.ledger
                    .get_mut(outcome.plan.match_account)
                    .contribute(outcome.plan.employer_match, true)?;
            }
            (outcome.plan, tax_year(&working, &outcome.plan))
        } else {
            let base = TaxYear {
                ordinary_income: 0.0,
                ltcg: 0.0,
                wages: 0.0,
                retirement_contributions: 0.0,
                married,
                dependents,
                state,
            };
            (ContributionPlan::none(), base)
        };

        let rmds = self.required_distributions();
        let conversion = if phase == Phase::RetiredPreRmd {
            self.inputs
                .roth_conversion_amount
                .min(self.ledger.traditional() - rmds.traditional())
                .max(0.0)
        } else {
            0.0
        };

        let withdrawal_year = WithdrawalYear {
            age,
            age_of_retirement: self.inputs.age_of_retirement,
            retired: phase != Phase::Working,
            public_safety_employee: self.inputs.public_safety_employee,
            spending: self.inputs.spending,
            base,
            contributions: contributions.employee_total(),
            rmds,
            conversion,
        };
        let outcome = solve_withdrawals(&self.tax, &self.ledger, &withdrawal_year, self.config)?;
        apply_plan(&mut self.ledger, &outcome.plan)?;
        if outcome.surplus > 0.0 {
            self.ledger
                .get_mut(AccountKind::Taxable)
                .contribute(outcome.surplus, false)?;
        }

        let taxes = outcome.taxes;
        self.lifetime_taxes += taxes.total();

        let mut deposits = contributions.deposits();
        deposits.taxable += outcome.surplus;
        let ordinary_income = base.ordinary_income + outcome.plan.ordinary_income;
        let ltcg = base.ltcg + outcome.plan.ltcg;
        let gross_income = wages + outcome.plan.ordinary_income + outcome.plan.ltcg;
        let row = YearRow {
            year: self.year,
            age,
            phase,
            married,
            dependents,
            state,
            income: wages,
            contribution: contributions.employee_total(),
            employer_match: contributions.employer_match,
            deposits,
            rmd: rmds.traditional(),
            roth_conversion: outcome.plan.conversion,
            withdrawals: outcome.plan.draws,
            ordinary_income,
            ltcg,
            taxes,
            spending: self.inputs.spending,
            surplus_reinvested: outcome.surplus,
            balances: self.ledger.balances(),
            effective_tax_rate: ratio(taxes.total(), gross_income),
            savings_rate: ratio(contributions.employee_total() + outcome.surplus, wages),
            total_taxes: self.lifetime_taxes,
        };
        debug!(
            "age {age} {phase:?}: contribution {:.2}, withdrawal {:.2}, taxes {:.2}, assets {:.2}",
            row.contribution,
            outcome.total,
            taxes.total(),
            self.ledger.total()
        );
        self.rows.push(row.clone());

        if outcome.is_insolvent() {
            self.needed_to_continue = outcome.needed_to_continue;
            self.state = RunState::Insolvent;
            self.settle_estate();
            return Ok(row);
        }

        self.age += 1;
        self.year += 1;
        if self.age > self.inputs.age_of_death {
            self.state = RunState::Dead;
            self.settle_estate();
        } else {
            self.ledger.increment_all();
            if self.age < self.inputs.age_of_retirement {
                self.income = capped_income(
                    self.income * self.inputs.yearly_income_raise,
                    self.inputs.max_income,
                );
            }
        }
        Ok(row)
    }

    fn required_distributions(&self) -> AccountAmounts {
        let mut rmds = AccountAmounts::default();
        if self.age < self.inputs.age_to_start_rmds {
            return rmds;
        }
        let divisor = self.tax.rmd_divisor(self.age);
        for kind in [AccountKind::Traditional401k, AccountKind::TraditionalIra] {
            let value = self.ledger.get(kind).value();
            *rmds.get_mut(kind) = match divisor {
                Some(divisor) => value / divisor,
                None => value,
            };
        }
        rmds
    }

    // Heirs inherit without selling, so only estate tax and the tax on
    // draining the tax-deferred accounts are charged.
    fn settle_estate(&mut self) {
        let estate_tax = self.tax.estate_tax(self.ledger.total());
        let heir_tax = self
            .tax
            .minimum_remaining_tax_for_heir(self.ledger.traditional(), self.inputs.heir_age());
        self.terminal = TerminalTaxes {
            estate_tax,
            heir_tax,
        };
        info!(
            "simulation ended at age {} ({:?}): assets {:.2}, estate tax {:.2}, heir tax {:.2}, total taxes {:.2}",
            self.age,
            self.state,
            self.ledger.total(),
            estate_tax,
            heir_tax,
            self.total_taxes()
        );
    }
}

/// Iterator returned by [`Simulation::years`].
pub struct Years<'a, T: TaxService> {
    simulation: &'a mut Simulation<T>,
}

impl<T: TaxService> Iterator for Years<'_, T> {
    type Item = SimResult<YearRow>;

    fn next(&mut self) -> Option<Self::Item> {
        self.simulation.step_year().transpose()
    }
}

/// Runs a whole lifetime to completion.
pub fn run_simulation<T: TaxService>(inputs: Inputs, tax: T) -> SimResult<Simulation<T>> {
    let mut simulation = Simulation::new(inputs, tax)?;
    simulation.simulate()?;
    Ok(simulation)
}

fn capped_income(income: f64, max_income: f64) -> f64 {
    if max_income > 0.0 {
        income.min(max_income)
    } else {
        income
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
