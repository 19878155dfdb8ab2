use log::debug;

use super::error::{SimError, SimResult};
use super::solver::{BisectConfig, BisectionStatus, Monotonicity, bisect};
use super::state_tax::StateCode;
use super::tax::{TaxBreakdown, TaxService, TaxYear, assess_year};
use super::types::{AccountAmounts, AccountKind, ContributionLimits, EmployerMatch, Inputs};

/// What the contribution solver needs to know about one working year.
#[derive(Debug, Clone, Copy)]
pub struct WorkingYear {
    pub age: u32,
    pub income: f64,
    pub spending: f64,
    pub married: bool,
    pub dependents: u32,
    pub state: StateCode,
    pub prefer_roth: bool,
    pub limits: ContributionLimits,
    pub employer_match: EmployerMatch,
    pub mega_backdoor_roth: bool,
}

impl WorkingYear {
    pub fn from_inputs(inputs: &Inputs, year: u32, age: u32, income: f64) -> Self {
        Self {
            age,
            income,
            spending: inputs.spending,
            married: inputs.married_at(age),
            dependents: inputs.dependents_at(age),
            state: inputs.state_at(age),
            prefer_roth: inputs.prefers_roth(year),
            limits: inputs.limits,
            employer_match: inputs.employer_match,
            mega_backdoor_roth: inputs.mega_backdoor_roth,
        }
    }
}

/// Room left in each contribution bucket this year.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionSpace {
    pub hsa: f64,
    pub elective: f64,
    /// Part of the elective room the employer matches.
    pub matched_elective: f64,
    /// Employer dollars that still fit under the plan's total limit.
    pub match_room: f64,
    pub ira: f64,
    pub mega: f64,
    /// Contributions cannot exceed earned income.
    pub earned_income: f64,
}

impl ContributionSpace {
    pub fn for_year(year: &WorkingYear) -> Self {
        let limits = &year.limits;
        let income = year.income.max(0.0);
        let elective = limits.elective_limit(year.age);
        let total_401k = limits.total_401k_limit(year.age);
        let matched_elective = if year.employer_match.rate > 0.0 {
            (income * year.employer_match.limit).clamp(0.0, elective)
        } else {
            0.0
        };
        let match_room = (matched_elective * year.employer_match.rate)
            .min((total_401k - elective).max(0.0));
        let mega = if year.mega_backdoor_roth {
            (total_401k - elective - match_room).max(0.0)
        } else {
            0.0
        };
        Self {
            hsa: limits.hsa_limit(year.age),
            elective,
            matched_elective,
            match_room,
            ira: limits.ira_limit(year.age),
            mega,
            earned_income: income,
        }
    }

    /// Upper end of the contribution search.
    pub fn total(&self) -> f64 {
        (self.hsa + self.elective + self.ira + self.mega).min(self.earned_income)
    }
}

/// Employee contributions split by bucket, plus the employer match they earn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContributionPlan {
    pub hsa: f64,
    pub traditional_401k: f64,
    pub roth_401k: f64,
    pub traditional_ira: f64,
    pub roth_ira: f64,
    pub mega_backdoor: f64,
    pub employer_match: f64,
    pub match_account: AccountKind,
}

impl ContributionPlan {
    pub fn none() -> Self {
        Self {
            hsa: 0.0,
            traditional_401k: 0.0,
            roth_401k: 0.0,
            traditional_ira: 0.0,
            roth_ira: 0.0,
            mega_backdoor: 0.0,
            employer_match: 0.0,
            match_account: AccountKind::Traditional401k,
        }
    }

    /// Dollars the employee puts away; the match is not part of it.
    pub fn employee_total(&self) -> f64 {
        self.hsa
            + self.traditional_401k
            + self.roth_401k
            + self.traditional_ira
            + self.roth_ira
            + self.mega_backdoor
    }

    pub fn deductible(&self) -> f64 {
        self.hsa + self.traditional_401k + self.traditional_ira
    }

    pub fn credit_eligible(&self) -> f64 {
        self.traditional_401k
            + self.roth_401k
            + self.traditional_ira
            + self.roth_ira
            + self.mega_backdoor
    }

    pub fn employee_deposits(&self) -> AccountAmounts {
        AccountAmounts {
            hsa: self.hsa,
            taxable: 0.0,
            traditional_401k: self.traditional_401k,
            traditional_ira: self.traditional_ira,
            roth_401k: self.roth_401k + self.mega_backdoor,
            roth_ira: self.roth_ira,
        }
    }

    /// Employee deposits plus the employer match in its account.
    pub fn deposits(&self) -> AccountAmounts {
        let mut deposits = self.employee_deposits();
        deposits.add(self.match_account, self.employer_match);
        deposits
    }
}

fn take(remaining: &mut f64, room: f64) -> f64 {
    let amount = remaining.min(room).max(0.0);
    *remaining -= amount;
    amount
}

/// Splits `total` employee dollars across buckets in priority order:
/// matched elective, HSA, the rest of the elective, IRA, then mega-backdoor.
pub fn allocate<T: TaxService + ?Sized>(
    tax: &T,
    year: &WorkingYear,
    space: &ContributionSpace,
    total: f64,
) -> ContributionPlan {
    let mut remaining = total.clamp(0.0, space.total());
    let matched = take(&mut remaining, space.matched_elective);
    let hsa = take(&mut remaining, space.hsa);
    let unmatched = take(&mut remaining, space.elective - space.matched_elective);
    let ira = take(&mut remaining, space.ira);
    let mega_backdoor = take(&mut remaining, space.mega);

    let elective = matched + unmatched;
    let (traditional_401k, roth_401k, match_account) = if year.prefer_roth {
        (0.0, elective, AccountKind::Roth401k)
    } else {
        (elective, 0.0, AccountKind::Traditional401k)
    };

    let would_be_agi = year.income - hsa - traditional_401k - ira;
    let (traditional_ira, roth_ira) =
        if !year.prefer_roth && tax.fully_deductible_ira(would_be_agi, year.married) {
            (ira, 0.0)
        } else {
            (0.0, ira)
        };

    ContributionPlan {
        hsa,
        traditional_401k,
        roth_401k,
        traditional_ira,
        roth_ira,
        mega_backdoor,
        employer_match: (matched * year.employer_match.rate).min(space.match_room),
        match_account,
    }
}

/// Tax picture of a working year before any withdrawals.
pub fn tax_year(year: &WorkingYear, plan: &ContributionPlan) -> TaxYear {
    TaxYear {
        ordinary_income: (year.income - plan.deductible()).max(0.0),
        ltcg: 0.0,
        wages: year.income.max(0.0),
        retirement_contributions: plan.credit_eligible(),
        married: year.married,
        dependents: year.dependents,
        state: year.state,
    }
}

fn balance(year: &WorkingYear, plan: &ContributionPlan, taxes: &TaxBreakdown) -> f64 {
    year.income - taxes.total() - year.spending - plan.employee_total()
}

#[derive(Debug, Clone, Copy)]
pub struct ContributionOutcome {
    pub plan: ContributionPlan,
    pub taxes: TaxBreakdown,
    /// Cash left after taxes, spending and contributions; negative when even a
    /// zero contribution cannot cover spending.
    pub balance: f64,
    pub space: f64,
    pub iterations: u32,
    pub status: BisectionStatus,
}

/// Finds the largest contribution the year's cash flow can afford.
pub fn solve_contributions<T: TaxService + ?Sized>(
    tax: &T,
    year: &WorkingYear,
    config: BisectConfig,
) -> SimResult<ContributionOutcome> {
    let space = ContributionSpace::for_year(year);
    let result = bisect::<_, SimError, _>(
        0.0,
        space.total(),
        config,
        Monotonicity::Decreasing,
        |total| {
            let plan = allocate(tax, year, &space, total);
            let taxes = assess_year(tax, &tax_year(year, &plan))?;
            Ok((balance(year, &plan, &taxes), (plan, taxes)))
        },
    )?;

    let (plan, taxes) = result.output;
    debug!(
        "age {}: contribution {:.2} of {:.2} space ({:?}, {} iterations, balance {:.4})",
        year.age,
        plan.employee_total(),
        space.total(),
        result.status,
        result.iterations,
        result.value
    );
    Ok(ContributionOutcome {
        plan,
        taxes,
        balance: result.value,
        space: space.total(),
        iterations: result.iterations,
        status: result.status,
    })
}
