use super::types::{Inputs, Projection, Summary, YearRecord};

/// Projects the account balance year by year under a fixed annual return
/// while an annually-growing withdrawal is taken out.
///
/// Pure function: same inputs always produce the same projection. The loop
/// runs for exactly `inputs.years` iterations with no early exit, so the
/// table keeps going after the account is exhausted (later years just show a
/// zero withdrawal).
///
/// The stored `end_balance` of each record is floored at zero for display,
/// but the balance carried into the next year is the unfloored raw value.
/// With a withdrawal that overshoots the balance in a single year the raw
/// chain can go negative, in which case `profit = balance * rate` compounds
/// the shortfall. The terminal `principal_multiplier` is computed from the
/// raw final balance, so the floor never leaks into the summary.
pub fn run_projection(inputs: &Inputs) -> Projection {
    let rate = inputs.annual_return_rate / 100.0;
    let growth = inputs.withdrawal_growth_rate / 100.0;

    let mut records = Vec::with_capacity(inputs.years as usize);
    let mut balance = inputs.principal;
    let mut total_withdraw = 0.0;
    let mut peak_balance = inputs.principal;
    let mut exhaust_year = None;

    for year in 1..=inputs.years {
        let begin_balance = balance;

        let planned_withdraw =
            inputs.first_year_withdrawal * (1.0 + growth).powi(year as i32 - 1);

        // All-or-nothing gate: the planned amount is taken only if the
        // balance fully covers it. Never a partial withdrawal.
        let withdraw = if begin_balance > 0.0 && begin_balance >= planned_withdraw {
            planned_withdraw
        } else {
            0.0
        };

        // Return accrues on the pre-withdrawal balance every year, raw sign
        // included.
        let profit = begin_balance * rate;

        let end_balance_raw = begin_balance + profit - withdraw;
        total_withdraw += withdraw;

        if end_balance_raw > peak_balance {
            peak_balance = end_balance_raw;
        }

        // First year a positive planned withdrawal could not be honored;
        // later years never overwrite it.
        if exhaust_year.is_none() && planned_withdraw > 0.0 && withdraw == 0.0 {
            exhaust_year = Some(year);
        }

        records.push(YearRecord {
            year,
            begin_balance,
            profit,
            withdraw,
            end_balance: end_balance_raw.max(0.0),
            cumulative_withdraw: total_withdraw,
        });

        balance = end_balance_raw;
    }

    let principal_multiplier = if balance > 0.0 {
        balance / inputs.principal
    } else {
        0.0
    };

    Projection {
        records,
        summary: Summary {
            peak_balance,
            exhaust_year,
            total_withdraw,
            principal_multiplier,
            is_perpetual: exhaust_year.is_none(),
        },
    }
}
