use thiserror::Error;

use super::types::AccountKind;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolverError {
    #[error("bisection did not converge after {iterations} iterations (bracket {lower}..{upper})")]
    NotConverged {
        iterations: u32,
        lower: f64,
        upper: f64,
    },

    #[error("balance function returned a non-finite value at {0}")]
    NonFinite(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{operation} called with negative amount {amount}")]
    NegativeAmount { operation: &'static str, amount: f64 },

    #[error("taxable income must be >= 0, got {0}")]
    NegativeIncome(f64),

    #[error("withdrawal of {requested} from {account} is short by {shortfall}")]
    Overdraw {
        account: AccountKind,
        requested: f64,
        shortfall: f64,
    },

    #[error(transparent)]
    Solver(#[from] SolverError),
}

pub type SimResult<T> = Result<T, SimError>;
