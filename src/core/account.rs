use super::error::{SimError, SimResult};
use super::types::{AccountAmounts, AccountKind};

/// Result of taking money out of an [`Account`].
///
/// `value_taken + insufficient_amount` always equals the amount requested.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Withdrawal {
    pub value_taken: f64,
    pub gains_portion: f64,
    pub insufficient_amount: f64,
}

impl Withdrawal {
    pub fn basis_portion(self) -> f64 {
        (self.value_taken - self.gains_portion).max(0.0)
    }

    pub fn is_short(self) -> bool {
        round_cents(self.insufficient_amount) > 0.0
    }
}

/// A single-bucket ledger: market value, after-tax principal still inside it,
/// and a deterministic yearly growth multiplier.
#[derive(Debug, Clone)]
pub struct Account {
    value: f64,
    contributions: f64,
    age: u32,
    rate_of_return: f64,
    withdraw_contributions_first: bool,
    yearly_diff: Vec<f64>,
}

impl Account {
    pub fn new(rate_of_return: f64, withdraw_contributions_first: bool) -> Self {
        Self {
            value: 0.0,
            contributions: 0.0,
            age: 0,
            rate_of_return,
            withdraw_contributions_first,
            yearly_diff: vec![0.0],
        }
    }

    /// Opens the account with an existing balance that is treated as principal.
    pub fn with_balance(
        rate_of_return: f64,
        withdraw_contributions_first: bool,
        starting_balance: f64,
    ) -> SimResult<Self> {
        let mut account = Self::new(rate_of_return, withdraw_contributions_first);
        if starting_balance > 0.0 {
            account.contribute(starting_balance, false)?;
            account.yearly_diff[0] = 0.0;
        }
        Ok(account)
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn contributions(&self) -> f64 {
        self.contributions
    }

    pub fn gains(&self) -> f64 {
        self.value - self.contributions
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn rate_of_return(&self) -> f64 {
        self.rate_of_return
    }

    pub fn withdraws_contributions_first(&self) -> bool {
        self.withdraw_contributions_first
    }

    /// Net flow per account year, index 0 being the year the account was opened.
    pub fn yearly_diff(&self) -> &[f64] {
        &self.yearly_diff
    }

    pub fn contribute(&mut self, amount: f64, is_rollover: bool) -> SimResult<()> {
        if amount < 0.0 || !amount.is_finite() {
            return Err(SimError::NegativeAmount {
                operation: "contribute",
                amount,
            });
        }
        self.value += amount;
        if !is_rollover {
            self.contributions += amount;
        }
        self.record_flow(amount);
        Ok(())
    }

    /// Computes what [`Account::withdrawal`] would return without touching the ledger.
    pub fn preview_withdrawal(&self, amount_needed: f64) -> SimResult<Withdrawal> {
        self.plan_withdrawal(amount_needed)
            .map(|(withdrawal, _, _)| withdrawal)
    }

    pub fn withdrawal(&mut self, amount_needed: f64) -> SimResult<Withdrawal> {
        let (withdrawal, value, contributions) = self.plan_withdrawal(amount_needed)?;
        self.value = value;
        self.contributions = contributions;
        self.record_flow(-withdrawal.value_taken);
        Ok(withdrawal)
    }

    /// Advances one year: applies growth and snaps sub-cent balances to zero.
    pub fn increment(&mut self) {
        self.age += 1;
        if round_cents(self.value) == 0.0 {
            self.clear();
        } else {
            self.value *= self.rate_of_return;
            if round_cents(self.value) == 0.0 {
                self.clear();
            }
        }
        self.yearly_diff.push(0.0);
    }

    fn clear(&mut self) {
        self.value = 0.0;
        self.contributions = 0.0;
    }

    fn record_flow(&mut self, amount: f64) {
        if let Some(current) = self.yearly_diff.last_mut() {
            *current += amount;
        }
    }

    // Returns the withdrawal plus the post-withdrawal (value, contributions).
    fn plan_withdrawal(&self, amount_needed: f64) -> SimResult<(Withdrawal, f64, f64)> {
        if amount_needed < 0.0 || !amount_needed.is_finite() {
            return Err(SimError::NegativeAmount {
                operation: "withdrawal",
                amount: amount_needed,
            });
        }

        let taken = amount_needed.min(self.value.max(0.0));
        let mut value = self.value;
        let mut contributions = self.contributions;
        let mut remaining = taken;
        let mut gains = 0.0;

        if self.withdraw_contributions_first && contributions > 0.0 {
            let from_basis = remaining.min(contributions);
            value -= from_basis;
            contributions -= from_basis;
            remaining -= from_basis;
        }

        if remaining > 0.0 && value > 0.0 {
            let gains_ratio = ((value - contributions) / value).clamp(0.0, 1.0);
            gains = remaining * gains_ratio;
            contributions -= remaining * (1.0 - gains_ratio);
            value -= remaining;
        }

        let withdrawal = Withdrawal {
            value_taken: taken,
            gains_portion: gains,
            insufficient_amount: amount_needed - taken,
        };
        Ok((withdrawal, value.max(0.0), contributions.max(0.0)))
    }
}

/// The fixed set of named accounts a simulation owns.
#[derive(Debug, Clone)]
pub struct Ledger {
    accounts: [Account; 6],
}

impl Ledger {
    pub fn open(rate_of_return: f64, balances: &AccountAmounts) -> SimResult<Self> {
        let open = |kind: AccountKind| {
            Account::with_balance(
                rate_of_return,
                kind.withdraws_contributions_first(),
                balances.get(kind),
            )
        };
        Ok(Self {
            accounts: [
                open(AccountKind::Hsa)?,
                open(AccountKind::Taxable)?,
                open(AccountKind::Traditional401k)?,
                open(AccountKind::TraditionalIra)?,
                open(AccountKind::Roth401k)?,
                open(AccountKind::RothIra)?,
            ],
        })
    }

    pub fn get(&self, kind: AccountKind) -> &Account {
        &self.accounts[kind.index()]
    }

    pub fn get_mut(&mut self, kind: AccountKind) -> &mut Account {
        &mut self.accounts[kind.index()]
    }

    pub fn balances(&self) -> AccountAmounts {
        let mut amounts = AccountAmounts::default();
        for kind in AccountKind::ALL {
            *amounts.get_mut(kind) = self.get(kind).value();
        }
        amounts
    }

    pub fn total(&self) -> f64 {
        self.accounts.iter().map(Account::value).sum()
    }

    pub fn traditional(&self) -> f64 {
        AccountKind::ALL
            .iter()
            .filter(|kind| kind.is_traditional())
            .map(|kind| self.get(*kind).value())
            .sum()
    }

    /// Commits a withdrawal that must be fully covered by the account.
    pub fn withdraw_exact(&mut self, kind: AccountKind, amount: f64) -> SimResult<Withdrawal> {
        let preview = self.get(kind).preview_withdrawal(amount)?;
        if preview.is_short() {
            return Err(SimError::Overdraw {
                account: kind,
                requested: amount,
                shortfall: preview.insufficient_amount,
            });
        }
        self.get_mut(kind).withdrawal(amount)
    }

    pub fn increment_all(&mut self) {
        for account in &mut self.accounts {
            account.increment();
        }
    }
}

pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
