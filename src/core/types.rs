use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::{SimError, SimResult};
use super::life_tables::UNIFORM_LIFETIME_START_AGE;
use super::state_tax::StateCode;
use super::tax::TaxBreakdown;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccountKind {
    Hsa,
    Taxable,
    Traditional401k,
    TraditionalIra,
    Roth401k,
    RothIra,
}

impl AccountKind {
    pub const ALL: [AccountKind; 6] = [
        AccountKind::Hsa,
        AccountKind::Taxable,
        AccountKind::Traditional401k,
        AccountKind::TraditionalIra,
        AccountKind::Roth401k,
        AccountKind::RothIra,
    ];

    pub fn index(self) -> usize {
        match self {
            AccountKind::Hsa => 0,
            AccountKind::Taxable => 1,
            AccountKind::Traditional401k => 2,
            AccountKind::TraditionalIra => 3,
            AccountKind::Roth401k => 4,
            AccountKind::RothIra => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AccountKind::Hsa => "HSA",
            AccountKind::Taxable => "taxable",
            AccountKind::Traditional401k => "traditional 401k",
            AccountKind::TraditionalIra => "traditional IRA",
            AccountKind::Roth401k => "Roth 401k",
            AccountKind::RothIra => "Roth IRA",
        }
    }

    pub fn is_traditional(self) -> bool {
        matches!(
            self,
            AccountKind::Traditional401k | AccountKind::TraditionalIra
        )
    }

    pub fn is_roth(self) -> bool {
        matches!(self, AccountKind::Roth401k | AccountKind::RothIra)
    }

    /// Employer plans qualify for the separation-from-service exception.
    pub fn is_employer_plan(self) -> bool {
        matches!(
            self,
            AccountKind::Traditional401k | AccountKind::Roth401k
        )
    }

    /// Roth accounts hand back principal before earnings.
    pub fn withdraws_contributions_first(self) -> bool {
        self.is_roth()
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Working,
    RetiredPreRmd,
    RetiredRmd,
}

/// One dollar figure per named account.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountAmounts {
    pub hsa: f64,
    pub taxable: f64,
    pub traditional_401k: f64,
    pub traditional_ira: f64,
    pub roth_401k: f64,
    pub roth_ira: f64,
}

impl AccountAmounts {
    pub fn get(&self, kind: AccountKind) -> f64 {
        match kind {
            AccountKind::Hsa => self.hsa,
            AccountKind::Taxable => self.taxable,
            AccountKind::Traditional401k => self.traditional_401k,
            AccountKind::TraditionalIra => self.traditional_ira,
            AccountKind::Roth401k => self.roth_401k,
            AccountKind::RothIra => self.roth_ira,
        }
    }

    pub fn get_mut(&mut self, kind: AccountKind) -> &mut f64 {
        match kind {
            AccountKind::Hsa => &mut self.hsa,
            AccountKind::Taxable => &mut self.taxable,
            AccountKind::Traditional401k => &mut self.traditional_401k,
            AccountKind::TraditionalIra => &mut self.traditional_ira,
            AccountKind::Roth401k => &mut self.roth_401k,
            AccountKind::RothIra => &mut self.roth_ira,
        }
    }

    pub fn add(&mut self, kind: AccountKind, amount: f64) {
        *self.get_mut(kind) += amount;
    }

    pub fn total(&self) -> f64 {
        AccountKind::ALL.iter().map(|kind| self.get(*kind)).sum()
    }

    pub fn traditional(&self) -> f64 {
        self.traditional_401k + self.traditional_ira
    }

    pub fn roth(&self) -> f64 {
        self.roth_401k + self.roth_ira
    }
}

/// Yearly contribution limits. Catch-up amounts apply from their age onward.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionLimits {
    pub hsa: f64,
    pub hsa_catch_up: f64,
    pub hsa_catch_up_age: u32,
    pub elective_401k: f64,
    pub catch_up_401k: f64,
    pub catch_up_401k_age: u32,
    pub total_401k: f64,
    pub ira: f64,
    pub ira_catch_up: f64,
    pub ira_catch_up_age: u32,
}

impl ContributionLimits {
    pub fn hsa_limit(&self, age: u32) -> f64 {
        with_catch_up(self.hsa, self.hsa_catch_up, self.hsa_catch_up_age, age)
    }

    pub fn elective_limit(&self, age: u32) -> f64 {
        with_catch_up(
            self.elective_401k,
            self.catch_up_401k,
            self.catch_up_401k_age,
            age,
        )
    }

    /// Employee plus employer dollars allowed into the 401k.
    pub fn total_401k_limit(&self, age: u32) -> f64 {
        with_catch_up(
            self.total_401k,
            self.catch_up_401k,
            self.catch_up_401k_age,
            age,
        )
    }

    pub fn ira_limit(&self, age: u32) -> f64 {
        with_catch_up(self.ira, self.ira_catch_up, self.ira_catch_up_age, age)
    }
}

impl Default for ContributionLimits {
    fn default() -> Self {
        Self {
            hsa: 3_600.0,
            hsa_catch_up: 1_000.0,
            hsa_catch_up_age: 55,
            elective_401k: 19_500.0,
            catch_up_401k: 6_500.0,
            catch_up_401k_age: 50,
            total_401k: 58_000.0,
            ira: 6_000.0,
            ira_catch_up: 1_000.0,
            ira_catch_up_age: 50,
        }
    }
}

fn with_catch_up(base: f64, catch_up: f64, catch_up_age: u32, age: u32) -> f64 {
    if age >= catch_up_age {
        base + catch_up
    } else {
        base
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmployerMatch {
    /// Employer dollars per matched employee dollar.
    pub rate: f64,
    /// Fraction of salary the employer will match.
    pub limit: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inputs {
    pub current_age: u32,
    pub age_of_retirement: u32,
    pub age_to_start_rmds: u32,
    pub age_of_death: u32,
    pub age_of_marriage: u32,
    pub income: f64,
    pub yearly_income_raise: f64,
    pub max_income: f64,
    pub spending: f64,
    pub rate_of_return: f64,
    pub years_to_wait: u32,
    pub roth_conversion_amount: f64,
    pub roth_conversion_unit: f64,
    pub starting_balances: AccountAmounts,
    pub limits: ContributionLimits,
    pub employer_match: EmployerMatch,
    pub mega_backdoor_roth: bool,
    pub work_state: StateCode,
    pub retirement_state: StateCode,
    /// Ages at which a dependent joins the household.
    pub dependents: Vec<u32>,
    pub public_safety_employee: bool,
}

pub const DEPENDENT_YEARS: u32 = 18;

impl Default for Inputs {
    fn default() -> Self {
        Self {
            current_age: 38,
            age_of_retirement: 60,
            age_to_start_rmds: 72,
            age_of_death: 79,
            age_of_marriage: 30,
            income: 63_179.0,
            yearly_income_raise: 1.02,
            max_income: 0.0,
            spending: 30_000.0,
            rate_of_return: 1.04,
            years_to_wait: 0,
            roth_conversion_amount: 0.0,
            roth_conversion_unit: 1_000.0,
            starting_balances: AccountAmounts::default(),
            limits: ContributionLimits::default(),
            employer_match: EmployerMatch::default(),
            mega_backdoor_roth: false,
            work_state: StateCode::Tx,
            retirement_state: StateCode::Tx,
            dependents: Vec::new(),
            public_safety_employee: false,
        }
    }
}

impl Inputs {
    /// Rejects configurations the simulation cannot run at all.
    pub fn validate(&self) -> SimResult<()> {
        if self.current_age >= self.age_of_death {
            return Err(SimError::InvalidConfig(format!(
                "current age {} must be below age of death {}",
                self.current_age, self.age_of_death
            )));
        }
        if self.age_of_retirement > self.age_of_death {
            return Err(SimError::InvalidConfig(format!(
                "age of retirement {} is after age of death {}",
                self.age_of_retirement, self.age_of_death
            )));
        }
        if self.age_to_start_rmds < UNIFORM_LIFETIME_START_AGE {
            return Err(SimError::InvalidConfig(format!(
                "RMDs cannot start before {UNIFORM_LIFETIME_START_AGE}, got {}",
                self.age_to_start_rmds
            )));
        }
        if self.limits.total_401k < self.limits.elective_401k {
            return Err(SimError::InvalidConfig(
                "total 401k limit is below the elective limit".to_string(),
            ));
        }
        if self.rate_of_return <= 0.0 || self.yearly_income_raise <= 0.0 {
            return Err(SimError::InvalidConfig(
                "growth multipliers must be positive".to_string(),
            ));
        }
        let amounts = [
            self.income,
            self.max_income,
            self.spending,
            self.roth_conversion_amount,
            self.employer_match.rate,
            self.employer_match.limit,
        ];
        let balances = AccountKind::ALL.map(|kind| self.starting_balances.get(kind));
        if amounts
            .iter()
            .chain(balances.iter())
            .any(|value| !value.is_finite() || *value < 0.0)
        {
            return Err(SimError::InvalidConfig(
                "amounts and balances must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }

    pub fn phase_at(&self, age: u32) -> Phase {
        if age < self.age_of_retirement {
            Phase::Working
        } else if age < self.age_to_start_rmds {
            Phase::RetiredPreRmd
        } else {
            Phase::RetiredRmd
        }
    }

    pub fn married_at(&self, age: u32) -> bool {
        age >= self.age_of_marriage
    }

    pub fn dependents_at(&self, age: u32) -> u32 {
        self.dependents
            .iter()
            .filter(|added| age >= **added && age < **added + DEPENDENT_YEARS)
            .count() as u32
    }

    pub fn state_at(&self, age: u32) -> StateCode {
        if age < self.age_of_retirement {
            self.work_state
        } else {
            self.retirement_state
        }
    }

    /// Contributions are routed to Roth during the first `years_to_wait` years.
    pub fn prefers_roth(&self, year: u32) -> bool {
        year < self.years_to_wait
    }

    pub fn heir_age(&self) -> u32 {
        self.age_of_death.saturating_sub(30)
    }

    /// Working years in the simulation, the upper end of the `years_to_wait` axis.
    pub fn working_years(&self) -> u32 {
        self.age_of_retirement.saturating_sub(self.current_age)
    }
}

/// One simulated year.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRow {
    pub year: u32,
    pub age: u32,
    pub phase: Phase,
    pub married: bool,
    pub dependents: u32,
    pub state: StateCode,
    pub income: f64,
    /// Employee dollars placed in tax-advantaged accounts.
    pub contribution: f64,
    pub employer_match: f64,
    /// Deposits per account, including the match and reinvested surplus.
    pub deposits: AccountAmounts,
    pub rmd: f64,
    pub roth_conversion: f64,
    pub withdrawals: AccountAmounts,
    pub ordinary_income: f64,
    pub ltcg: f64,
    pub taxes: TaxBreakdown,
    pub spending: f64,
    pub surplus_reinvested: f64,
    pub balances: AccountAmounts,
    pub effective_tax_rate: f64,
    pub savings_rate: f64,
    pub total_taxes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSummary {
    pub roth_conversion_amount: f64,
    pub years_simulated: u32,
    pub final_balances: AccountAmounts,
    pub total_assets: f64,
    pub estate_tax: f64,
    pub heir_tax: f64,
    pub lifetime_taxes: f64,
    pub total_taxes: f64,
    pub after_tax_assets: f64,
    pub tax_asset_ratio: f64,
    pub needed_to_continue: f64,
    pub insolvent: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionCandidate {
    pub roth_conversion_amount: f64,
    pub after_tax_assets: f64,
    pub total_taxes: f64,
    pub traditional_at_death: f64,
    pub insolvent: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStop {
    /// The tax-deferred balance is gone at death.
    TraditionalExhausted,
    /// No year could convert the full candidate, so larger candidates change nothing.
    ConversionSaturated,
    /// No retired year precedes RMDs, so conversions never happen.
    NoConversionYears,
    CandidateCap,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionSearch {
    pub best: Option<ConversionCandidate>,
    pub candidates: Vec<ConversionCandidate>,
    pub stop: SearchStop,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPoint {
    pub rate_of_return: f64,
    pub years_to_wait: u32,
    pub best_conversion: Option<f64>,
    pub after_tax_assets: Option<f64>,
    pub total_taxes: Option<f64>,
    pub candidates_tried: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepResult {
    pub points: Vec<GridPoint>,
    /// Best years-to-wait for each rate of return.
    pub best_by_rate: Vec<GridPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catch_up_applies_from_threshold_age() {
        let limits = ContributionLimits::default();
        assert_eq!(limits.ira_limit(49), 6_000.0);
        assert_eq!(limits.ira_limit(50), 7_000.0);
        assert_eq!(limits.hsa_limit(54), 3_600.0);
        assert_eq!(limits.hsa_limit(55), 4_600.0);
        assert_eq!(limits.elective_limit(50), 26_000.0);
        assert_eq!(limits.total_401k_limit(38), 58_000.0);
    }

    #[test]
    fn phases_follow_ages() {
        let inputs = Inputs::default();
        assert_eq!(inputs.phase_at(59), Phase::Working);
        assert_eq!(inputs.phase_at(60), Phase::RetiredPreRmd);
        assert_eq!(inputs.phase_at(72), Phase::RetiredRmd);
        assert_eq!(inputs.state_at(59), inputs.work_state);
        assert!(inputs.married_at(38));
        assert!(!inputs.married_at(29));
    }

    #[test]
    fn dependents_count_for_eighteen_years() {
        let inputs = Inputs {
            dependents: vec![30, 33],
            ..Inputs::default()
        };
        assert_eq!(inputs.dependents_at(29), 0);
        assert_eq!(inputs.dependents_at(33), 2);
        assert_eq!(inputs.dependents_at(47), 2);
        assert_eq!(inputs.dependents_at(48), 1);
        assert_eq!(inputs.dependents_at(51), 0);
    }

    #[test]
    fn validate_rejects_retirement_after_death() {
        let inputs = Inputs {
            age_of_death: 55,
            ..Inputs::default()
        };
        assert!(matches!(inputs.validate(), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_rmds_before_the_first_divisor() {
        let inputs = Inputs {
            age_to_start_rmds: 69,
            ..Inputs::default()
        };
        assert!(matches!(inputs.validate(), Err(SimError::InvalidConfig(_))));
        let inputs = Inputs {
            age_to_start_rmds: 70,
            ..Inputs::default()
        };
        assert!(inputs.validate().is_ok());
    }

    #[test]
    fn validate_rejects_negative_balances() {
        let mut inputs = Inputs::default();
        inputs.starting_balances.taxable = -1.0;
        assert!(matches!(inputs.validate(), Err(SimError::InvalidConfig(_))));
        assert!(Inputs::default().validate().is_ok());
    }

    #[test]
    fn account_amounts_group_by_tax_treatment() {
        let mut amounts = AccountAmounts::default();
        for (i, kind) in AccountKind::ALL.iter().enumerate() {
            amounts.add(*kind, (i + 1) as f64);
        }
        assert_eq!(amounts.total(), 21.0);
        assert_eq!(amounts.traditional(), 7.0);
        assert_eq!(amounts.roth(), 11.0);
    }
}
