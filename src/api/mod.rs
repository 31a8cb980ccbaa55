use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    Inputs, Summary, WithdrawalSolveConfig, WithdrawalSolveResult, YearRecord, run_projection,
    solve_max_withdrawal,
};

const INDEX_HTML: &str = include_str!("../../web/index.html");
const STYLES_CSS: &str = include_str!("../../web/styles.css");
const APP_JS: &str = include_str!("../../web/app.js");

// Column headers and download filename of the exported table, kept verbatim
// from the product (年份 = year, 期初余额 = begin balance, 收益 = profit,
// 提取 = withdrawal, 期末余额 = end balance).
const CSV_HEADER: &str = "年份,期初余额,收益,提取,期末余额";
const CSV_CONTENT_DISPOSITION: &str =
    "attachment; filename=\"annuity-table.csv\"; filename*=UTF-8''%E5%B9%B4%E9%87%91%E6%95%B0%E6%8D%AE.csv";

#[derive(Parser, Debug)]
#[command(
    name = "drawdown",
    about = "Annuity drawdown projector (fixed annual return + growing withdrawal schedule)"
)]
struct Cli {
    #[arg(long, default_value_t = 300.0, help = "Starting balance")]
    principal: f64,
    #[arg(long, default_value_t = 8.0, help = "Annual return rate in percent")]
    annual_return_rate: f64,
    #[arg(long, default_value_t = 12.0, help = "First-year withdrawal amount")]
    first_year_withdrawal: f64,
    #[arg(
        long,
        default_value_t = 2.0,
        help = "Annual growth of the withdrawal schedule in percent"
    )]
    withdrawal_growth_rate: f64,
    #[arg(long, default_value_t = 40, help = "Number of years to project")]
    years: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ProjectPayload {
    principal: Option<f64>,
    #[serde(alias = "rate")]
    annual_return_rate: Option<f64>,
    #[serde(alias = "withdrawal")]
    first_year_withdrawal: Option<f64>,
    #[serde(alias = "growth")]
    withdrawal_growth_rate: Option<f64>,
    years: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SolvePayload {
    principal: Option<f64>,
    #[serde(alias = "rate")]
    annual_return_rate: Option<f64>,
    #[serde(alias = "withdrawal")]
    first_year_withdrawal: Option<f64>,
    #[serde(alias = "growth")]
    withdrawal_growth_rate: Option<f64>,
    years: Option<u32>,
    search_min: Option<f64>,
    search_max: Option<f64>,
    tolerance: Option<f64>,
    max_iterations: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectResponse {
    principal: f64,
    annual_return_rate: f64,
    first_year_withdrawal: f64,
    withdrawal_growth_rate: f64,
    years: u32,
    /// Withdrawal level that leaves the principal untouched in year one
    /// (principal x return rate); the front end surfaces it as the
    /// perpetuity suggestion.
    sustainable_withdrawal_hint: f64,
    results: Vec<YearRecord>,
    summary: Summary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveIterationResponse {
    iteration: u32,
    lower_bound: f64,
    upper_bound: f64,
    candidate_value: f64,
    perpetual: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SolveResponse {
    search_min: f64,
    search_max: f64,
    tolerance: f64,
    max_iterations: u32,
    solved_value: Option<f64>,
    converged: bool,
    feasible: bool,
    message: String,
    iterations: Vec<SolveIterationResponse>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    if !cli.principal.is_finite() || cli.principal <= 0.0 {
        return Err("--principal must be > 0".to_string());
    }

    if !(0.0..=100.0).contains(&cli.annual_return_rate) {
        return Err("--annual-return-rate must be between 0 and 100".to_string());
    }

    if !cli.first_year_withdrawal.is_finite() || cli.first_year_withdrawal < 0.0 {
        return Err("--first-year-withdrawal must be >= 0".to_string());
    }

    if !(0.0..=100.0).contains(&cli.withdrawal_growth_rate) {
        return Err("--withdrawal-growth-rate must be between 0 and 100".to_string());
    }

    if !(1..=200).contains(&cli.years) {
        return Err("--years must be between 1 and 200".to_string());
    }

    Ok(Inputs {
        principal: cli.principal,
        annual_return_rate: cli.annual_return_rate,
        first_year_withdrawal: cli.first_year_withdrawal,
        withdrawal_growth_rate: cli.withdrawal_growth_rate,
        years: cli.years,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        principal: 300.0,
        annual_return_rate: 8.0,
        first_year_withdrawal: 12.0,
        withdrawal_growth_rate: 2.0,
        years: 40,
    }
}

fn inputs_from_payload(payload: ProjectPayload) -> Result<Inputs, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.principal {
        cli.principal = v;
    }
    if let Some(v) = payload.annual_return_rate {
        cli.annual_return_rate = v;
    }
    if let Some(v) = payload.first_year_withdrawal {
        cli.first_year_withdrawal = v;
    }
    if let Some(v) = payload.withdrawal_growth_rate {
        cli.withdrawal_growth_rate = v;
    }
    if let Some(v) = payload.years {
        cli.years = v;
    }

    build_inputs(cli)
}

fn solve_request_from_payload(
    payload: SolvePayload,
) -> Result<(Inputs, WithdrawalSolveConfig), String> {
    let inputs = inputs_from_payload(ProjectPayload {
        principal: payload.principal,
        annual_return_rate: payload.annual_return_rate,
        first_year_withdrawal: payload.first_year_withdrawal,
        withdrawal_growth_rate: payload.withdrawal_growth_rate,
        years: payload.years,
    })?;

    let config = WithdrawalSolveConfig {
        search_min: payload.search_min.unwrap_or(0.0),
        // The first-year return on the whole principal bounds any sustainable
        // withdrawal, with slack for schedules that front-load under growth.
        search_max: payload
            .search_max
            .unwrap_or(inputs.principal * (1.0 + inputs.annual_return_rate / 100.0)),
        tolerance: payload.tolerance.unwrap_or(0.01),
        max_iterations: payload.max_iterations.unwrap_or(60),
    };

    Ok((inputs, config))
}

#[cfg(test)]
fn project_inputs_from_json(json: &str) -> Result<Inputs, String> {
    let payload = serde_json::from_str::<ProjectPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    inputs_from_payload(payload)
}

fn build_project_response(inputs: &Inputs) -> ProjectResponse {
    let projection = run_projection(inputs);
    ProjectResponse {
        principal: inputs.principal,
        annual_return_rate: inputs.annual_return_rate,
        first_year_withdrawal: inputs.first_year_withdrawal,
        withdrawal_growth_rate: inputs.withdrawal_growth_rate,
        years: inputs.years,
        sustainable_withdrawal_hint: inputs.principal * inputs.annual_return_rate / 100.0,
        results: projection.records,
        summary: projection.summary,
    }
}

fn build_solve_response(result: WithdrawalSolveResult) -> SolveResponse {
    SolveResponse {
        search_min: result.search_min,
        search_max: result.search_max,
        tolerance: result.tolerance,
        max_iterations: result.max_iterations,
        solved_value: result.solved_value,
        converged: result.converged,
        feasible: result.feasible,
        message: result.message,
        iterations: result
            .iterations
            .into_iter()
            .map(|it| SolveIterationResponse {
                iteration: it.iteration,
                lower_bound: it.lower_bound,
                upper_bound: it.upper_bound,
                candidate_value: it.candidate_value,
                perpetual: it.perpetual,
            })
            .collect(),
    }
}

fn render_projection_csv(records: &[YearRecord]) -> String {
    let mut csv = String::with_capacity(64 * (records.len() + 1));
    csv.push_str(CSV_HEADER);
    csv.push('\n');
    for record in records {
        csv.push_str(&format!(
            "{},{:.2},{:.2},{:.2},{:.2}\n",
            record.year,
            record.begin_balance,
            record.profit,
            record.withdraw,
            record.end_balance
        ));
    }
    csv
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/index.html", get(index_handler))
        .route("/styles.css", get(styles_handler))
        .route("/app.js", get(app_js_handler))
        .route(
            "/api/project",
            get(project_get_handler).post(project_post_handler),
        )
        .route("/api/project.csv", get(project_csv_handler))
        .route("/api/solve", get(solve_get_handler).post(solve_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    println!("Drawdown HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/");

    axum::serve(listener, app).await
}

async fn index_handler() -> impl IntoResponse {
    with_cache_control(Html(INDEX_HTML))
}

async fn styles_handler() -> impl IntoResponse {
    with_cache_control((
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        STYLES_CSS,
    ))
}

async fn app_js_handler() -> impl IntoResponse {
    with_cache_control((
        [(
            header::CONTENT_TYPE,
            "application/javascript; charset=utf-8",
        )],
        APP_JS,
    ))
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn project_get_handler(Query(payload): Query<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

async fn project_post_handler(Json(payload): Json<ProjectPayload>) -> Response {
    project_handler_impl(payload)
}

fn project_handler_impl(payload: ProjectPayload) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    json_response(StatusCode::OK, build_project_response(&inputs))
}

async fn project_csv_handler(Query(payload): Query<ProjectPayload>) -> Response {
    let inputs = match inputs_from_payload(payload) {
        Ok(inputs) => inputs,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    let projection = run_projection(&inputs);
    let body = render_projection_csv(&projection.records);
    with_cache_control((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, CSV_CONTENT_DISPOSITION),
        ],
        body,
    ))
}

async fn solve_get_handler(Query(payload): Query<SolvePayload>) -> Response {
    solve_handler_impl(payload)
}

async fn solve_post_handler(Json(payload): Json<SolvePayload>) -> Response {
    solve_handler_impl(payload)
}

fn solve_handler_impl(payload: SolvePayload) -> Response {
    let (inputs, config) = match solve_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    match solve_max_withdrawal(&inputs, config) {
        Ok(result) => json_response(StatusCode::OK, build_solve_response(result)),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
