use super::{Inputs, run_projection};

#[derive(Debug, Clone, Copy)]
pub struct WithdrawalSolveConfig {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct WithdrawalSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_value: f64,
    pub perpetual: bool,
}

#[derive(Debug, Clone)]
pub struct WithdrawalSolveResult {
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_value: Option<f64>,
    pub iterations: Vec<WithdrawalSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Finds the largest first-year withdrawal that keeps the plan perpetual
/// over the projected horizon.
///
/// Raising the first-year withdrawal lowers every year's begin balance until
/// the first failed affordability gate, so perpetuity is monotone in the
/// withdrawal and bisection applies. The lower bound is kept feasible
/// throughout; the returned value is the last feasible lower bound.
pub fn solve_max_withdrawal(
    inputs: &Inputs,
    config: WithdrawalSolveConfig,
) -> Result<WithdrawalSolveResult, String> {
    validate_config(config)?;

    let mut iterations = Vec::with_capacity(config.max_iterations as usize);
    let low_perpetual = candidate_is_perpetual(inputs, config.search_min);
    let high_perpetual = candidate_is_perpetual(inputs, config.search_max);

    let mut solved_value = None;
    let mut converged = false;
    let feasible;
    let message;

    if !low_perpetual {
        feasible = false;
        message = "No sustainable withdrawal found within the search bounds.".to_string();
    } else if high_perpetual {
        solved_value = Some(config.search_max);
        converged = true;
        feasible = true;
        message =
            "Upper withdrawal bound is still sustainable; increase search max for a higher value."
                .to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let perpetual = candidate_is_perpetual(inputs, mid);
            iterations.push(WithdrawalSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_value: mid,
                perpetual,
            });

            if perpetual {
                lo = mid;
            } else {
                hi = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                solved_value = Some(lo);
                break;
            }
        }
        if solved_value.is_none() {
            solved_value = Some(lo);
        }
        feasible = true;
        message = if converged {
            "Solved maximum sustainable first-year withdrawal.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    Ok(WithdrawalSolveResult {
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_value,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn candidate_is_perpetual(base_inputs: &Inputs, candidate_value: f64) -> bool {
    let mut inputs = *base_inputs;
    inputs.first_year_withdrawal = candidate_value.max(0.0);
    run_projection(&inputs).summary.is_perpetual
}

fn validate_config(config: WithdrawalSolveConfig) -> Result<(), String> {
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return Err("search bounds must be finite".to_string());
    }
    if config.search_min < 0.0 {
        return Err("search_min must be >= 0".to_string());
    }
    if config.search_max <= config.search_min {
        return Err("search_max must be greater than search_min".to_string());
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return Err("tolerance must be > 0".to_string());
    }
    if config.max_iterations == 0 {
        return Err("max_iterations must be > 0".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn flat_inputs() -> Inputs {
        Inputs {
            principal: 100.0,
            annual_return_rate: 0.0,
            first_year_withdrawal: 0.0,
            withdrawal_growth_rate: 0.0,
            years: 4,
        }
    }

    #[test]
    fn solver_finds_deterministic_solution() {
        // 100 over 4 years at 0% return: exactly 25 per year drains the
        // account without ever failing the gate; anything above fails in
        // year 4.
        let config = WithdrawalSolveConfig {
            search_min: 0.0,
            search_max: 100.0,
            tolerance: 0.01,
            max_iterations: 40,
        };

        let result = solve_max_withdrawal(&flat_inputs(), config).expect("must solve");
        assert!(result.feasible);
        assert!(result.converged);
        assert_close(
            result.solved_value.expect("value expected"),
            25.0,
            config.tolerance + 0.01,
        );
        assert!(!result.iterations.is_empty());
    }

    #[test]
    fn solver_reports_infeasible_when_lower_bound_fails() {
        let mut inputs = flat_inputs();
        inputs.principal = 10.0;

        let config = WithdrawalSolveConfig {
            search_min: 50.0,
            search_max: 100.0,
            tolerance: 0.5,
            max_iterations: 16,
        };

        let result = solve_max_withdrawal(&inputs, config).expect("must return result");
        assert!(!result.feasible);
        assert!(result.solved_value.is_none());
    }

    #[test]
    fn solver_returns_upper_bound_when_still_sustainable() {
        // 8% on 300 sustains a withdrawal of 24 forever; a search capped at
        // 10 never leaves feasible territory.
        let inputs = Inputs {
            principal: 300.0,
            annual_return_rate: 8.0,
            first_year_withdrawal: 12.0,
            withdrawal_growth_rate: 0.0,
            years: 40,
        };
        let config = WithdrawalSolveConfig {
            search_min: 0.0,
            search_max: 10.0,
            tolerance: 0.1,
            max_iterations: 16,
        };

        let result = solve_max_withdrawal(&inputs, config).expect("must solve");
        assert!(result.feasible);
        assert!(result.converged);
        assert_close(result.solved_value.expect("value expected"), 10.0, 1e-12);
        assert!(result.message.contains("increase search max"));
    }

    #[test]
    fn solver_rejects_invalid_bounds() {
        let config = WithdrawalSolveConfig {
            search_min: 10.0,
            search_max: 10.0,
            tolerance: 0.1,
            max_iterations: 8,
        };
        let err = solve_max_withdrawal(&flat_inputs(), config).expect_err("must reject");
        assert!(err.contains("search_max"));
    }
}
