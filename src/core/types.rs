use serde::Serialize;

/// The five drawdown parameters. Rates are percentages; the engine converts
/// them to decimal fractions once per run.
#[derive(Debug, Clone, Copy)]
pub struct Inputs {
    pub principal: f64,
    pub annual_return_rate: f64,
    pub first_year_withdrawal: f64,
    pub withdrawal_growth_rate: f64,
    pub years: u32,
}

/// One simulated year, 1-indexed. `end_balance` is floored at zero for
/// display; the raw (unfloored) value is what the engine carries into the
/// next year.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearRecord {
    pub year: u32,
    pub begin_balance: f64,
    pub profit: f64,
    pub withdraw: f64,
    pub end_balance: f64,
    pub cumulative_withdraw: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub peak_balance: f64,
    pub exhaust_year: Option<u32>,
    pub total_withdraw: f64,
    pub principal_multiplier: f64,
    pub is_perpetual: bool,
}

/// The full output of one engine run. Always rebuilt from scratch; callers
/// never patch a previous projection.
#[derive(Debug, Clone)]
pub struct Projection {
    pub records: Vec<YearRecord>,
    pub summary: Summary,
}
