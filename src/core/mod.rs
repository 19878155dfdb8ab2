mod account;
mod contribution;
mod engine;
mod error;
mod life_tables;
mod optimizer;
mod solver;
mod state_tax;
mod tax;
mod types;
mod withdrawal;

pub use account::{Account, Ledger, Withdrawal};
pub use contribution::{
    ContributionOutcome, ContributionPlan, ContributionSpace, WorkingYear, solve_contributions,
};
pub use engine::{Simulation, Years, run_simulation};
pub use error::{SimError, SimResult, SolverError};
pub use optimizer::{
    DEFAULT_RATES, MAX_CANDIDATES, SweepGrid, plan_best_conversion, search_roth_conversion,
    sweep_grid,
};
pub use solver::{BisectConfig, Bisection, BisectionStatus, Monotonicity, bisect};
pub use state_tax::StateCode;
pub use tax::{Tax2021, TaxBreakdown, TaxService, TaxYear, assess_year};
pub use types::{
    AccountAmounts, AccountKind, ContributionLimits, ConversionCandidate, ConversionSearch,
    EmployerMatch, GridPoint, Inputs, Phase, SearchStop, SimulationSummary, SweepResult, YearRow,
};
pub use withdrawal::{WithdrawalOutcome, WithdrawalPlan, WithdrawalYear, solve_withdrawals};
