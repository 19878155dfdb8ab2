use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AccountAmounts, ContributionLimits, ConversionCandidate, EmployerMatch, Inputs, SearchStop,
    SimError, SimulationSummary, StateCode, SweepGrid, SweepResult, Tax2021, YearRow,
    plan_best_conversion, run_simulation, sweep_grid,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_age: Option<u32>,
    age_of_retirement: Option<u32>,
    age_to_start_rmds: Option<u32>,
    age_of_death: Option<u32>,
    age_of_marriage: Option<u32>,

    income: Option<f64>,
    yearly_income_raise: Option<f64>,
    max_income: Option<f64>,
    spending: Option<f64>,
    rate_of_return: Option<f64>,
    years_to_wait: Option<u32>,
    roth_conversion_unit: Option<f64>,
    fixed_conversion: Option<f64>,

    hsa_start: Option<f64>,
    taxable_start: Option<f64>,
    traditional_401k_start: Option<f64>,
    traditional_ira_start: Option<f64>,
    roth_401k_start: Option<f64>,
    roth_ira_start: Option<f64>,

    hsa_limit: Option<f64>,
    hsa_catch_up: Option<f64>,
    hsa_catch_up_age: Option<u32>,
    elective_401k_limit: Option<f64>,
    catch_up_401k: Option<f64>,
    catch_up_401k_age: Option<u32>,
    total_401k_limit: Option<f64>,
    ira_limit: Option<f64>,
    ira_catch_up: Option<f64>,
    ira_catch_up_age: Option<u32>,

    match_rate: Option<f64>,
    match_limit: Option<f64>,
    mega_backdoor_roth: Option<bool>,
    public_safety_employee: Option<bool>,

    work_state: Option<String>,
    retirement_state: Option<String>,
    /// Comma-separated ages, so the same field works in a query string.
    dependents: Option<String>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taxplan",
    about = "Lifetime tax simulator that searches for the best yearly Roth conversion"
)]
pub struct Cli {
    #[arg(long, default_value_t = 38)]
    current_age: u32,
    #[arg(long, default_value_t = 60)]
    age_of_retirement: u32,
    #[arg(long, default_value_t = 72)]
    age_to_start_rmds: u32,
    #[arg(long, default_value_t = 79)]
    age_of_death: u32,
    #[arg(long, default_value_t = 30)]
    age_of_marriage: u32,

    #[arg(long, default_value_t = 63_179.0, help = "Gross wages in the first year")]
    income: f64,
    #[arg(
        long,
        default_value_t = 1.02,
        help = "Wage multiplier applied each working year"
    )]
    yearly_income_raise: f64,
    #[arg(long, default_value_t = 0.0, help = "Wage ceiling, 0 for none")]
    max_income: f64,
    #[arg(long, default_value_t = 30_000.0)]
    spending: f64,
    #[arg(
        long,
        default_value_t = 1.04,
        help = "Yearly growth multiplier for every account"
    )]
    rate_of_return: f64,
    #[arg(
        long,
        default_value_t = 0,
        help = "Working years at the start routed to Roth"
    )]
    years_to_wait: u32,
    #[arg(long, default_value_t = 1_000.0, help = "Step of the conversion search")]
    roth_conversion_unit: f64,
    #[arg(long, help = "Simulate this yearly conversion instead of searching")]
    fixed_conversion: Option<f64>,

    #[arg(long, default_value_t = 0.0)]
    hsa_start: f64,
    #[arg(long, default_value_t = 0.0)]
    taxable_start: f64,
    #[arg(long, default_value_t = 0.0)]
    traditional_401k_start: f64,
    #[arg(long, default_value_t = 0.0)]
    traditional_ira_start: f64,
    #[arg(long, default_value_t = 0.0)]
    roth_401k_start: f64,
    #[arg(long, default_value_t = 0.0)]
    roth_ira_start: f64,

    #[arg(long, default_value_t = 3_600.0)]
    hsa_limit: f64,
    #[arg(long, default_value_t = 1_000.0)]
    hsa_catch_up: f64,
    #[arg(long, default_value_t = 55)]
    hsa_catch_up_age: u32,
    #[arg(long, default_value_t = 19_500.0)]
    elective_401k_limit: f64,
    #[arg(long, default_value_t = 6_500.0)]
    catch_up_401k: f64,
    #[arg(long, default_value_t = 50)]
    catch_up_401k_age: u32,
    #[arg(
        long,
        default_value_t = 58_000.0,
        help = "Employee plus employer 401k limit"
    )]
    total_401k_limit: f64,
    #[arg(long, default_value_t = 6_000.0)]
    ira_limit: f64,
    #[arg(long, default_value_t = 1_000.0)]
    ira_catch_up: f64,
    #[arg(long, default_value_t = 50)]
    ira_catch_up_age: u32,

    #[arg(
        long,
        default_value_t = 0.0,
        help = "Employer dollars per matched employee dollar"
    )]
    match_rate: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Fraction of wages the employer matches"
    )]
    match_limit: f64,
    #[arg(long)]
    mega_backdoor_roth: bool,
    #[arg(long, help = "Separation-from-service exception applies from 50")]
    public_safety_employee: bool,

    #[arg(long, default_value = "TX")]
    work_state: String,
    #[arg(long, default_value = "TX")]
    retirement_state: String,
    #[arg(
        long = "dependent",
        help = "Age at which a dependent joins the household; repeatable"
    )]
    dependents: Vec<u32>,

    #[arg(
        long,
        help = "Sweep rates of return and years to wait instead of one search"
    )]
    sweep: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    roth_conversion_amount: f64,
    stop: Option<SearchStop>,
    candidates: Vec<ConversionCandidate>,
    summary: SimulationSummary,
    years: Vec<YearRow>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: Inputs,
    fixed_conversion: Option<f64>,
}

fn parse_state(flag: &str, value: &str) -> Result<StateCode, String> {
    value.parse().map_err(|e| format!("{flag}: {e}"))
}

fn parse_dependents(value: &str) -> Result<Vec<u32>, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u32>()
                .map_err(|_| format!("--dependent must be an age, got '{part}'"))
        })
        .collect()
}

fn build_inputs(cli: Cli) -> Result<Inputs, String> {
    if cli.current_age >= cli.age_of_death {
        return Err("--current-age must be < --age-of-death".to_string());
    }

    if cli.age_of_retirement > cli.age_of_death {
        return Err("--age-of-retirement must be <= --age-of-death".to_string());
    }

    if cli.age_to_start_rmds < 70 {
        return Err("--age-to-start-rmds must be >= 70".to_string());
    }

    for (name, value) in [
        ("--income", cli.income),
        ("--max-income", cli.max_income),
        ("--spending", cli.spending),
        ("--hsa-start", cli.hsa_start),
        ("--taxable-start", cli.taxable_start),
        ("--traditional-401k-start", cli.traditional_401k_start),
        ("--traditional-ira-start", cli.traditional_ira_start),
        ("--roth-401k-start", cli.roth_401k_start),
        ("--roth-ira-start", cli.roth_ira_start),
        ("--hsa-limit", cli.hsa_limit),
        ("--hsa-catch-up", cli.hsa_catch_up),
        ("--elective-401k-limit", cli.elective_401k_limit),
        ("--catch-up-401k", cli.catch_up_401k),
        ("--total-401k-limit", cli.total_401k_limit),
        ("--ira-limit", cli.ira_limit),
        ("--ira-catch-up", cli.ira_catch_up),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    if cli.total_401k_limit < cli.elective_401k_limit {
        return Err("--total-401k-limit must be >= --elective-401k-limit".to_string());
    }

    if !cli.rate_of_return.is_finite() || cli.rate_of_return <= 0.0 {
        return Err("--rate-of-return must be > 0".to_string());
    }

    if !cli.yearly_income_raise.is_finite() || cli.yearly_income_raise <= 0.0 {
        return Err("--yearly-income-raise must be > 0".to_string());
    }

    if !cli.roth_conversion_unit.is_finite() || cli.roth_conversion_unit <= 0.0 {
        return Err("--roth-conversion-unit must be > 0".to_string());
    }

    if let Some(amount) = cli.fixed_conversion
        && (!amount.is_finite() || amount < 0.0)
    {
        return Err("--fixed-conversion must be >= 0".to_string());
    }

    for (name, value) in [
        ("--match-rate", cli.match_rate),
        ("--match-limit", cli.match_limit),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("{name} must be between 0 and 1"));
        }
    }

    let work_state = parse_state("--work-state", &cli.work_state)?;
    let retirement_state = parse_state("--retirement-state", &cli.retirement_state)?;

    Ok(Inputs {
        current_age: cli.current_age,
        age_of_retirement: cli.age_of_retirement,
        age_to_start_rmds: cli.age_to_start_rmds,
        age_of_death: cli.age_of_death,
        age_of_marriage: cli.age_of_marriage,
        income: cli.income,
        yearly_income_raise: cli.yearly_income_raise,
        max_income: cli.max_income,
        spending: cli.spending,
        rate_of_return: cli.rate_of_return,
        years_to_wait: cli.years_to_wait,
        roth_conversion_amount: cli.fixed_conversion.unwrap_or(0.0),
        roth_conversion_unit: cli.roth_conversion_unit,
        starting_balances: AccountAmounts {
            hsa: cli.hsa_start,
            taxable: cli.taxable_start,
            traditional_401k: cli.traditional_401k_start,
            traditional_ira: cli.traditional_ira_start,
            roth_401k: cli.roth_401k_start,
            roth_ira: cli.roth_ira_start,
        },
        limits: ContributionLimits {
            hsa: cli.hsa_limit,
            hsa_catch_up: cli.hsa_catch_up,
            hsa_catch_up_age: cli.hsa_catch_up_age,
            elective_401k: cli.elective_401k_limit,
            catch_up_401k: cli.catch_up_401k,
            catch_up_401k_age: cli.catch_up_401k_age,
            total_401k: cli.total_401k_limit,
            ira: cli.ira_limit,
            ira_catch_up: cli.ira_catch_up,
            ira_catch_up_age: cli.ira_catch_up_age,
        },
        employer_match: EmployerMatch {
            rate: cli.match_rate,
            limit: cli.match_limit,
        },
        mega_backdoor_roth: cli.mega_backdoor_roth,
        work_state,
        retirement_state,
        dependents: cli.dependents,
        public_safety_employee: cli.public_safety_employee,
    })
}

/// Runs one scenario from the command line and returns the JSON report.
pub fn run_cli(cli: Cli) -> Result<String, String> {
    let sweep = cli.sweep;
    let fixed_conversion = cli.fixed_conversion;
    let inputs = build_inputs(cli)?;
    let report = if sweep {
        let result = run_sweep(&inputs).map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&result)
    } else {
        let response = run_scenario(&inputs, fixed_conversion).map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&response)
    };
    report.map_err(|e| format!("failed to encode report: {e}"))
}

fn run_scenario(inputs: &Inputs, fixed_conversion: Option<f64>) -> Result<SimulateResponse, SimError> {
    if let Some(amount) = fixed_conversion {
        let simulation = run_simulation(
            Inputs {
                roth_conversion_amount: amount,
                ..inputs.clone()
            },
            Tax2021,
        )?;
        return Ok(SimulateResponse {
            roth_conversion_amount: amount,
            stop: None,
            candidates: Vec::new(),
            summary: simulation.summary(),
            years: simulation.rows().to_vec(),
        });
    }

    let (search, simulation) = plan_best_conversion(inputs, &Tax2021)?;
    let summary = simulation.summary();
    Ok(SimulateResponse {
        roth_conversion_amount: summary.roth_conversion_amount,
        stop: Some(search.stop),
        candidates: search.candidates,
        summary,
        years: simulation.rows().to_vec(),
    })
}

fn run_sweep(inputs: &Inputs) -> Result<SweepResult, SimError> {
    sweep_grid(inputs, &Tax2021, &SweepGrid::for_inputs(inputs))
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route("/api/sweep", get(sweep_get_handler).post(sweep_post_handler))
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("taxplan HTTP API listening on http://{addr}");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn sweep_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    sweep_handler_impl(payload).await
}

async fn sweep_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    sweep_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let outcome = tokio::task::spawn_blocking(move || {
        run_scenario(&request.inputs, request.fixed_conversion)
    })
    .await;
    match outcome {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(err)) => sim_error_response(&err),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn sweep_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    let outcome = tokio::task::spawn_blocking(move || run_sweep(&request.inputs)).await;
    match outcome {
        Ok(Ok(result)) => json_response(StatusCode::OK, result),
        Ok(Err(err)) => sim_error_response(&err),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

fn error_status(err: &SimError) -> StatusCode {
    match err {
        SimError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn sim_error_response(err: &SimError) -> Response {
    error_response(error_status(err), &err.to_string())
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
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

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.age_of_retirement {
        cli.age_of_retirement = v;
    }
    if let Some(v) = payload.age_to_start_rmds {
        cli.age_to_start_rmds = v;
    }
    if let Some(v) = payload.age_of_death {
        cli.age_of_death = v;
    }
    if let Some(v) = payload.age_of_marriage {
        cli.age_of_marriage = v;
    }

    if let Some(v) = payload.income {
        cli.income = v;
    }
    if let Some(v) = payload.yearly_income_raise {
        cli.yearly_income_raise = v;
    }
    if let Some(v) = payload.max_income {
        cli.max_income = v;
    }
    if let Some(v) = payload.spending {
        cli.spending = v;
    }
    if let Some(v) = payload.rate_of_return {
        cli.rate_of_return = v;
    }
    if let Some(v) = payload.years_to_wait {
        cli.years_to_wait = v;
    }
    if let Some(v) = payload.roth_conversion_unit {
        cli.roth_conversion_unit = v;
    }
    if payload.fixed_conversion.is_some() {
        cli.fixed_conversion = payload.fixed_conversion;
    }

    if let Some(v) = payload.hsa_start {
        cli.hsa_start = v;
    }
    if let Some(v) = payload.taxable_start {
        cli.taxable_start = v;
    }
    if let Some(v) = payload.traditional_401k_start {
        cli.traditional_401k_start = v;
    }
    if let Some(v) = payload.traditional_ira_start {
        cli.traditional_ira_start = v;
    }
    if let Some(v) = payload.roth_401k_start {
        cli.roth_401k_start = v;
    }
    if let Some(v) = payload.roth_ira_start {
        cli.roth_ira_start = v;
    }

    if let Some(v) = payload.hsa_limit {
        cli.hsa_limit = v;
    }
    if let Some(v) = payload.hsa_catch_up {
        cli.hsa_catch_up = v;
    }
    if let Some(v) = payload.hsa_catch_up_age {
        cli.hsa_catch_up_age = v;
    }
    if let Some(v) = payload.elective_401k_limit {
        cli.elective_401k_limit = v;
    }
    if let Some(v) = payload.catch_up_401k {
        cli.catch_up_401k = v;
    }
    if let Some(v) = payload.catch_up_401k_age {
        cli.catch_up_401k_age = v;
    }
    if let Some(v) = payload.total_401k_limit {
        cli.total_401k_limit = v;
    }
    if let Some(v) = payload.ira_limit {
        cli.ira_limit = v;
    }
    if let Some(v) = payload.ira_catch_up {
        cli.ira_catch_up = v;
    }
    if let Some(v) = payload.ira_catch_up_age {
        cli.ira_catch_up_age = v;
    }

    if let Some(v) = payload.match_rate {
        cli.match_rate = v;
    }
    if let Some(v) = payload.match_limit {
        cli.match_limit = v;
    }
    if let Some(v) = payload.mega_backdoor_roth {
        cli.mega_backdoor_roth = v;
    }
    if let Some(v) = payload.public_safety_employee {
        cli.public_safety_employee = v;
    }

    if let Some(v) = payload.work_state {
        cli.work_state = v;
    }
    if let Some(v) = payload.retirement_state {
        cli.retirement_state = v;
    }
    if let Some(v) = payload.dependents {
        cli.dependents = parse_dependents(&v)?;
    }

    let fixed_conversion = cli.fixed_conversion;
    let inputs = build_inputs(cli)?;
    Ok(ApiRequest {
        inputs,
        fixed_conversion,
    })
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 38,
        age_of_retirement: 60,
        age_to_start_rmds: 72,
        age_of_death: 79,
        age_of_marriage: 30,
        income: 63_179.0,
        yearly_income_raise: 1.02,
        max_income: 0.0,
        spending: 30_000.0,
        rate_of_return: 1.04,
        years_to_wait: 0,
        roth_conversion_unit: 1_000.0,
        fixed_conversion: None,
        hsa_start: 0.0,
        taxable_start: 0.0,
        traditional_401k_start: 0.0,
        traditional_ira_start: 0.0,
        roth_401k_start: 0.0,
        roth_ira_start: 0.0,
        hsa_limit: 3_600.0,
        hsa_catch_up: 1_000.0,
        hsa_catch_up_age: 55,
        elective_401k_limit: 19_500.0,
        catch_up_401k: 6_500.0,
        catch_up_401k_age: 50,
        total_401k_limit: 58_000.0,
        ira_limit: 6_000.0,
        ira_catch_up: 1_000.0,
        ira_catch_up_age: 50,
        match_rate: 0.0,
        match_limit: 0.0,
        mega_backdoor_roth: false,
        public_safety_employee: false,
        work_state: "TX".to_string(),
        retirement_state: "TX".to_string(),
        dependents: Vec::new(),
        sweep: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Phase;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    #[test]
    fn api_defaults_match_library_defaults() {
        let inputs = build_inputs(sample_cli()).expect("valid inputs");
        assert_eq!(inputs, Inputs::default());
    }

    #[test]
    fn cli_parses_kebab_flags() {
        let cli = Cli::try_parse_from([
            "taxplan",
            "--current-age",
            "45",
            "--traditional-ira-start",
            "250000",
            "--work-state",
            "ca",
            "--dependent",
            "40",
            "--dependent",
            "43",
            "--mega-backdoor-roth",
        ])
        .expect("parses");
        let inputs = build_inputs(cli).expect("valid inputs");
        assert_eq!(inputs.current_age, 45);
        assert_approx(inputs.starting_balances.traditional_ira, 250_000.0);
        assert_eq!(inputs.work_state, StateCode::Ca);
        assert_eq!(inputs.retirement_state, StateCode::Tx);
        assert_eq!(inputs.dependents, vec![40, 43]);
        assert!(inputs.mega_backdoor_roth);
    }

    #[test]
    fn build_inputs_accepts_states_with_credit_exemptions() {
        let mut cli = sample_cli();
        cli.work_state = "nj".to_string();
        cli.retirement_state = "OR".to_string();
        let inputs = build_inputs(cli).expect("valid inputs");
        assert_eq!(inputs.work_state, StateCode::Nj);
        assert_eq!(inputs.retirement_state, StateCode::Or);

        let mut cli = sample_cli();
        cli.work_state = "PR".to_string();
        let err = build_inputs(cli).expect_err("unknown state");
        assert!(err.contains("--work-state"));
    }

    #[test]
    fn build_inputs_rejects_death_before_current_age() {
        let mut cli = sample_cli();
        cli.age_of_death = 38;
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("--current-age"));
    }

    #[test]
    fn build_inputs_rejects_early_rmds() {
        let mut cli = sample_cli();
        cli.age_to_start_rmds = 65;
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("--age-to-start-rmds"));
    }

    #[test]
    fn build_inputs_rejects_negative_balance() {
        let mut cli = sample_cli();
        cli.roth_ira_start = -1.0;
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("--roth-ira-start"));
    }

    #[test]
    fn build_inputs_rejects_total_limit_below_elective() {
        let mut cli = sample_cli();
        cli.total_401k_limit = 10_000.0;
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("--total-401k-limit"));
    }

    #[test]
    fn build_inputs_rejects_match_outside_unit_range() {
        let mut cli = sample_cli();
        cli.match_limit = 1.5;
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("--match-limit"));
    }

    #[test]
    fn build_inputs_rejects_zero_conversion_unit() {
        let mut cli = sample_cli();
        cli.roth_conversion_unit = 0.0;
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("--roth-conversion-unit"));
    }

    #[test]
    fn build_inputs_rejects_unknown_state() {
        let mut cli = sample_cli();
        cli.retirement_state = "ZZ".to_string();
        let err = build_inputs(cli).expect_err("must reject");
        assert!(err.contains("--retirement-state"));
    }

    #[test]
    fn api_request_from_json_parses_camel_case_keys() {
        let request = api_request_from_json(
            r#"{
                "currentAge": 50,
                "ageOfRetirement": 55,
                "rateOfReturn": 1.05,
                "traditional401kStart": 400000,
                "matchRate": 0.5,
                "matchLimit": 0.06,
                "retirementState": "fl",
                "dependents": "40, 42",
                "fixedConversion": 20000
            }"#,
        )
        .expect("valid payload");
        let inputs = &request.inputs;
        assert_eq!(inputs.current_age, 50);
        assert_eq!(inputs.age_of_retirement, 55);
        assert_approx(inputs.rate_of_return, 1.05);
        assert_approx(inputs.starting_balances.traditional_401k, 400_000.0);
        assert_approx(inputs.employer_match.rate, 0.5);
        assert_approx(inputs.employer_match.limit, 0.06);
        assert_eq!(inputs.retirement_state, StateCode::Fl);
        assert_eq!(inputs.dependents, vec![40, 42]);
        assert_eq!(request.fixed_conversion, Some(20_000.0));
        assert_approx(inputs.roth_conversion_amount, 20_000.0);
    }

    #[test]
    fn api_request_reports_validation_errors() {
        let err = api_request_from_json(r#"{"ageToStartRmds": 60}"#).expect_err("must reject");
        assert!(err.contains("--age-to-start-rmds"));

        let err = api_request_from_json(r#"{"dependents": "40,abc"}"#).expect_err("must reject");
        assert!(err.contains("--dependent"));

        let err = api_request_from_json(r#"{"currentAge": "old"}"#).expect_err("must reject");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn fixed_conversion_runs_a_single_simulation() {
        let request = api_request_from_json(
            r#"{
                "currentAge": 62,
                "ageOfRetirement": 62,
                "ageOfDeath": 75,
                "income": 0,
                "traditionalIraStart": 600000,
                "taxableStart": 200000,
                "fixedConversion": 30000
            }"#,
        )
        .expect("valid payload");
        let response =
            run_scenario(&request.inputs, request.fixed_conversion).expect("simulates");
        assert_eq!(response.stop, None);
        assert!(response.candidates.is_empty());
        assert_approx(response.roth_conversion_amount, 30_000.0);
        assert_eq!(response.years.len(), 14);
        let converted: Vec<_> = response
            .years
            .iter()
            .filter(|row| row.roth_conversion > 0.0)
            .collect();
        assert!(!converted.is_empty());
        assert!(
            converted
                .iter()
                .all(|row| row.phase == Phase::RetiredPreRmd && row.age < 72)
        );
    }

    #[test]
    fn simulate_response_serializes_camel_case() {
        let request = api_request_from_json(
            r#"{"currentAge": 70, "ageOfRetirement": 70, "ageOfDeath": 72, "income": 0,
                "taxableStart": 100000, "fixedConversion": 0}"#,
        )
        .expect("valid payload");
        let response =
            run_scenario(&request.inputs, request.fixed_conversion).expect("simulates");
        let json = serde_json::to_value(&response).expect("serializes");
        assert!(json.get("rothConversionAmount").is_some());
        assert!(json["summary"].get("afterTaxAssets").is_some());
        assert!(json["years"][0].get("effectiveTaxRate").is_some());
    }

    #[test]
    fn invalid_config_maps_to_bad_request() {
        assert_eq!(
            error_status(&SimError::InvalidConfig("x".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_status(&SimError::NegativeIncome(-5.0)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
