mod engine;
mod solver;
mod types;

pub use engine::run_projection;
pub use solver::{
    WithdrawalSolveConfig, WithdrawalSolveIteration, WithdrawalSolveResult,
    solve_max_withdrawal,
};
pub use types::{Inputs, Projection, Summary, YearRecord};
