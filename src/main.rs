use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use axum_prometheus::PrometheusMetricLayer;
use clap::{Args, Parser, Subcommand};
use lendcore::config::AppConfig;
use lendcore::error::AppError;
use lendcore::telemetry;
use lendcore::workflows::lending::{
    classify_preview, lending_router, quote, AffordabilityEngine, LendingState,
    LoanApplicationService, MemoryStore, SigningWorkflow, SystemClock, TracingMessenger,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
struct AppState {
    readiness: Arc<AtomicBool>,
    metrics: PrometheusHandle,
}

#[derive(Parser, Debug)]
#[command(
    name = "Loan Origination Service",
    about = "Run the multi-channel loan origination service or preview loan pricing from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Preview loan terms and an affordability classification
    Quote(QuoteArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct QuoteArgs {
    /// Loan amount in rand
    #[arg(long)]
    amount: f64,
    /// Term in months
    #[arg(long)]
    term_months: u32,
    /// Gross monthly income, enables the affordability preview
    #[arg(long)]
    gross_income: Option<f64>,
    /// Total monthly expenses, used with --gross-income
    #[arg(long, default_value_t = 0.0)]
    monthly_expenses: f64,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err}");
        std::process::exit(1);
    }
}

async fn run_cli() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => run_server(args).await,
        Command::Quote(args) => run_quote(args),
    }
}

async fn run_server(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let store = Arc::new(MemoryStore::default());
    let messenger = Arc::new(TracingMessenger);
    let clock = Arc::new(SystemClock);
    let affordability = Arc::new(AffordabilityEngine::new(store.clone(), clock.clone()));
    let applications = Arc::new(LoanApplicationService::new(
        store.clone(),
        affordability,
        clock.clone(),
    ));
    let signing = Arc::new(SigningWorkflow::new(
        store,
        messenger,
        clock,
        config.environment.reveals_signing_codes(),
    ));

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let state = AppState {
        readiness: readiness_flag.clone(),
        metrics: prometheus_handle,
    };

    let app = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
        .with_state(state)
        .merge(lending_router(LendingState {
            applications,
            signing,
        }))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "loan origination service ready");

    axum::serve(listener, app).await?;
    Ok(())
}

fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let terms = quote(args.amount, args.term_months);

    println!("Loan quote");
    println!(
        "Amount R{:.2} over {} month(s) at {:.2}% per annum",
        args.amount, args.term_months, terms.annual_interest_rate
    );
    println!("Monthly payment: R{:.2}", terms.monthly_payment);
    println!("Total repayable: R{:.2}", terms.total_repayable);

    if let Some(gross_income) = args.gross_income {
        let status = classify_preview(gross_income, args.monthly_expenses);
        println!(
            "\nAffordability preview (income R{:.2}, expenses R{:.2}): {}",
            gross_income,
            args.monthly_expenses,
            status.label()
        );
    }

    Ok(())
}

async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn readiness_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
