use serde::Serialize;

use super::account::round_cents;
use super::error::{SimError, SimResult};
use super::life_tables::{single_life_divisor, uniform_lifetime_divisor};
use super::state_tax::{StateCode, bracket_tax, state_income_tax};

/// Tax law consumed by the simulation. Implementations must be pure.
pub trait TaxService: Send + Sync {
    fn federal_income_tax(
        &self,
        ordinary_income: f64,
        married: bool,
        dependents: u32,
        ltcg: f64,
        just_ltcg: bool,
    ) -> f64;
    fn fica_tax(&self, gross_income: f64, married: bool) -> f64;
    fn state_tax(&self, taxable_income: f64, married: bool, state: StateCode, dependents: u32)
    -> f64;
    fn savers_credit(&self, agi: f64, retirement_contributions: f64, married: bool) -> f64;
    fn standard_deduction(&self, married: bool) -> f64;
    /// Taxable income at which long-term gains stop being taxed at 0%.
    fn ltcg_zero_rate_limit(&self, married: bool) -> f64;
    /// Top of the lowest ordinary bracket, in taxable income.
    fn lowest_bracket_limit(&self, married: bool) -> f64;
    fn rmd_divisor(&self, age: u32) -> Option<f64>;
    fn heir_divisor(&self, age: u32) -> Option<f64>;
    fn estate_tax(&self, total_estate: f64) -> f64;
    fn fully_deductible_ira(&self, agi: f64, married: bool) -> bool;

    /// Federal tax an heir pays when draining an inherited tax-deferred balance
    /// under single-life distributions starting at `heir_age`.
    fn minimum_remaining_tax_for_heir(&self, value: f64, heir_age: u32) -> f64 {
        let mut remaining = value.max(0.0);
        let mut age = heir_age;
        let mut total = 0.0;
        while let Some(divisor) = self.heir_divisor(age) {
            if round_cents(remaining) == 0.0 {
                break;
            }
            let distribution = remaining / divisor;
            remaining -= distribution;
            total += self.federal_income_tax(distribution, true, 0, 0.0, false);
            age += 1;
        }
        total
    }
}

type Bracket = (f64, f64, f64);

const FEDERAL_SINGLE: &[Bracket] = &[
    (0.0, 0.00, 0.10),
    (9_950.0, 995.00, 0.12),
    (40_525.0, 4_664.00, 0.22),
    (86_375.0, 14_751.00, 0.24),
    (164_925.0, 33_603.00, 0.32),
    (209_425.0, 47_843.00, 0.35),
    (523_600.0, 157_804.25, 0.37),
];

const FEDERAL_MARRIED: &[Bracket] = &[
    (0.0, 0.00, 0.10),
    (19_900.0, 1_990.00, 0.12),
    (81_050.0, 9_328.00, 0.22),
    (172_750.0, 29_502.00, 0.24),
    (329_850.0, 67_206.00, 0.32),
    (418_850.0, 95_686.00, 0.35),
    (628_300.0, 168_993.50, 0.37),
];

// Upper bound of each band in taxable income, then the rate inside it.
const LTCG_SINGLE: &[(f64, f64)] = &[(40_000.0, 0.00), (441_450.0, 0.15), (f64::MAX, 0.20)];
const LTCG_MARRIED: &[(f64, f64)] = &[(80_000.0, 0.00), (496_600.0, 0.15), (f64::MAX, 0.20)];

const ESTATE_EXEMPTION: f64 = 11_700_000.0;
const ESTATE_BRACKETS: &[Bracket] = &[
    (0.0, 0.0, 0.18),
    (10_000.0, 1_800.0, 0.20),
    (20_000.0, 3_800.0, 0.22),
    (40_000.0, 8_200.0, 0.24),
    (60_000.0, 13_000.0, 0.26),
    (80_000.0, 18_200.0, 0.28),
    (100_000.0, 23_800.0, 0.30),
    (150_000.0, 38_800.0, 0.32),
    (250_000.0, 70_800.0, 0.34),
    (500_000.0, 155_800.0, 0.37),
    (750_000.0, 248_300.0, 0.39),
    (1_000_000.0, 345_800.0, 0.40),
];

const SAVERS_MARRIED: &[(f64, f64)] = &[
    (0.0, 0.50),
    (39_501.0, 0.20),
    (43_001.0, 0.10),
    (66_000.0, 0.00),
];
const SAVERS_OTHER: &[(f64, f64)] = &[
    (0.0, 0.50),
    (19_751.0, 0.20),
    (21_501.0, 0.10),
    (33_000.0, 0.00),
];

const SOCIAL_SECURITY_WAGE_BASE: f64 = 142_800.0;
const SOCIAL_SECURITY_RATE: f64 = 0.062;
const MEDICARE_RATE: f64 = 0.0145;
const ADDITIONAL_MEDICARE_RATE: f64 = 0.009;

const FEDERAL_DEPENDENT_EXEMPTION: f64 = 0.0;

/// 2021 federal law plus the shipped state tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tax2021;

impl TaxService for Tax2021 {
    fn federal_income_tax(
        &self,
        ordinary_income: f64,
        married: bool,
        dependents: u32,
        ltcg: f64,
        just_ltcg: bool,
    ) -> f64 {
        let deduction =
            self.standard_deduction(married) + FEDERAL_DEPENDENT_EXEMPTION * dependents as f64;
        let ordinary = ordinary_income.max(0.0);
        let ordinary_taxable = (ordinary - deduction).max(0.0);
        let unused_deduction = (deduction - ordinary).max(0.0);
        let ltcg_taxable = (ltcg.max(0.0) - unused_deduction).max(0.0);

        let bands = if married { LTCG_MARRIED } else { LTCG_SINGLE };
        let ltcg_tax = stacked_band_tax(bands, ordinary_taxable, ltcg_taxable);
        if just_ltcg {
            return ltcg_tax;
        }

        let brackets = if married {
            FEDERAL_MARRIED
        } else {
            FEDERAL_SINGLE
        };
        bracket_tax(brackets, ordinary_taxable) + ltcg_tax
    }

    fn fica_tax(&self, gross_income: f64, married: bool) -> f64 {
        let gross = gross_income.max(0.0);
        let threshold = if married { 250_000.0 } else { 200_000.0 };
        gross.min(SOCIAL_SECURITY_WAGE_BASE) * SOCIAL_SECURITY_RATE
            + gross * MEDICARE_RATE
            + (gross - threshold).max(0.0) * ADDITIONAL_MEDICARE_RATE
    }

    fn state_tax(
        &self,
        taxable_income: f64,
        married: bool,
        state: StateCode,
        dependents: u32,
    ) -> f64 {
        state_income_tax(taxable_income, married, state, dependents)
    }

    fn savers_credit(&self, agi: f64, retirement_contributions: f64, married: bool) -> f64 {
        let cap = if married { 4_000.0 } else { 2_000.0 };
        let qualified = retirement_contributions.clamp(0.0, cap);
        let bands = if married {
            SAVERS_MARRIED
        } else {
            SAVERS_OTHER
        };
        let agi = agi.max(0.0);
        bands
            .iter()
            .rev()
            .find(|(limit, _)| agi >= *limit)
            .map(|(_, rate)| qualified * rate)
            .unwrap_or(0.0)
    }

    fn standard_deduction(&self, married: bool) -> f64 {
        if married { 25_100.0 } else { 12_550.0 }
    }

    fn ltcg_zero_rate_limit(&self, married: bool) -> f64 {
        let bands = if married { LTCG_MARRIED } else { LTCG_SINGLE };
        bands[0].0
    }

    fn lowest_bracket_limit(&self, married: bool) -> f64 {
        let brackets = if married {
            FEDERAL_MARRIED
        } else {
            FEDERAL_SINGLE
        };
        brackets[1].0
    }

    fn rmd_divisor(&self, age: u32) -> Option<f64> {
        uniform_lifetime_divisor(age)
    }

    fn heir_divisor(&self, age: u32) -> Option<f64> {
        single_life_divisor(age)
    }

    fn estate_tax(&self, total_estate: f64) -> f64 {
        let taxable_estate = (total_estate - ESTATE_EXEMPTION).max(0.0);
        bracket_tax(ESTATE_BRACKETS, taxable_estate)
    }

    fn fully_deductible_ira(&self, agi: f64, married: bool) -> bool {
        let limit = if married { 104_000.0 } else { 65_000.0 };
        agi < limit
    }
}

// Tax on `amount` stacked on top of `base` across `(upper_bound, rate)` bands.
fn stacked_band_tax(bands: &[(f64, f64)], base: f64, amount: f64) -> f64 {
    if amount <= 0.0 {
        return 0.0;
    }
    let start = base;
    let end = base + amount;
    let mut lower = 0.0;
    let mut tax = 0.0;
    for &(upper, rate) in bands {
        let overlap = (end.min(upper) - start.max(lower)).max(0.0);
        tax += overlap * rate;
        lower = upper;
        if end <= upper {
            break;
        }
    }
    tax
}

/// One year's taxable picture, assembled by the solvers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxYear {
    /// Ordinary income after above-the-line deductions (pre-tax contributions).
    pub ordinary_income: f64,
    pub ltcg: f64,
    /// Wages subject to payroll tax.
    pub wages: f64,
    /// Elective retirement contributions eligible for the saver's credit.
    pub retirement_contributions: f64,
    pub married: bool,
    pub dependents: u32,
    pub state: StateCode,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBreakdown {
    pub federal: f64,
    pub state: f64,
    pub fica: f64,
    pub savers_credit: f64,
    pub penalties: f64,
}

impl TaxBreakdown {
    pub fn total(&self) -> f64 {
        self.federal + self.state + self.fica + self.penalties
    }
}

// Float residue from repeated withdrawals can leave income a hair below zero.
const NEGATIVE_INCOME_TOLERANCE: f64 = 0.01;

/// Federal + state + payroll tax for a year, net of the saver's credit.
pub fn assess_year<T: TaxService + ?Sized>(tax: &T, year: &TaxYear) -> SimResult<TaxBreakdown> {
    for value in [year.ordinary_income, year.ltcg, year.wages] {
        if value < -NEGATIVE_INCOME_TOLERANCE || !value.is_finite() {
            return Err(SimError::NegativeIncome(value));
        }
    }
    let ordinary = year.ordinary_income.max(0.0);
    let ltcg = year.ltcg.max(0.0);
    let agi = ordinary + ltcg;

    let federal_gross = tax.federal_income_tax(ordinary, year.married, year.dependents, ltcg, false);
    let savers_credit = if year.retirement_contributions > 0.0 {
        tax.savers_credit(agi, year.retirement_contributions, year.married)
            .min(federal_gross)
    } else {
        0.0
    };

    Ok(TaxBreakdown {
        federal: federal_gross - savers_credit,
        state: tax.state_tax(agi, year.married, year.state, year.dependents),
        fica: tax.fica_tax(year.wages.max(0.0), year.married),
        savers_credit,
        penalties: 0.0,
    })
}
