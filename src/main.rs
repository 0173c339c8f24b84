//! cfo-copilot: ask finance questions of normalized monthly data.
//!
//! Usage:
//!   cfo-copilot ask "What was June 2025 revenue vs budget?"
//!   cfo-copilot --entity ParentCo kpis
//!   cfo-copilot trend 2023-01:2023-06
//!   cfo-copilot growth 2023-01:2023-06
//!   cfo-copilot opex-ratio 2023-03
//!   cfo-copilot burn-multiple --months 3
//!   cfo-copilot schema

use anyhow::{Context, Result};
use cfo_copilot::utils::{months_between, parse_period_string};
use cfo_copilot::{
    format_pct, format_usd, load_dataset, metric_result_schema, CalendarMonth, Copilot,
    CopilotConfig, Dataset, MetricResult, QueryOutcome, QueryParameter, Runway,
};
use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cfo-copilot")]
#[command(about = "Answer finance questions over actuals, budget and cash", long_about = None)]
#[command(version)]
struct Cli {
    /// Normalized fact table (entity,month,category,source,amount_usd)
    #[arg(long, default_value = "fixtures/facts.csv", global = true)]
    facts: PathBuf,

    /// Normalized cash table (entity,month,cash_balance_usd)
    #[arg(long, default_value = "fixtures/cash.csv", global = true)]
    cash: PathBuf,

    /// JSON configuration file; built-in defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Restrict every metric to one entity
    #[arg(long, global = true)]
    entity: Option<String>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a free-text question
    Ask {
        /// The question, e.g. "gross margin last 6 months"
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Headline KPIs at the latest month
    Kpis,

    /// Gross margin over an explicit period (YYYY-MM or YYYY-MM:YYYY-MM)
    Trend { period: String },

    /// Month-over-month revenue growth over a period (YYYY-MM or YYYY-MM:YYYY-MM)
    Growth { period: String },

    /// Opex as a share of revenue for one month (YYYY-MM)
    OpexRatio { month: CalendarMonth },

    /// Net burn over net new revenue across the last N months of cash data
    BurnMultiple {
        #[arg(long, default_value_t = 3)]
        months: u32,
    },

    /// Print the JSON Schema of metric results
    Schema,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    match &cli.command {
        Commands::Schema => print_json(&metric_result_schema())?,
        Commands::Ask { query } => {
            let copilot = build_copilot(&cli)?;
            let outcome = copilot.answer(&query.join(" "))?;
            if cli.json {
                print_json(&outcome)?;
            } else {
                print_outcome(&outcome);
            }
        }
        Commands::Kpis => {
            let copilot = build_copilot(&cli)?;
            let Some(kpis) = copilot.kpi_snapshot() else {
                println!("No financial records loaded.");
                return Ok(());
            };
            if cli.json {
                print_json(&kpis)?;
            } else {
                println!("KPIs for {}", kpis.month.label());
                println!("  Revenue:      {}", format_usd(kpis.revenue_vs_budget.actual));
                println!(
                    "  vs Budget:    {}",
                    kpis.revenue_vs_budget
                        .variance_abs
                        .map(format_usd)
                        .unwrap_or_else(|| "n/a".to_string())
                );
                println!(
                    "  Gross margin: {}",
                    kpis.gross_margin
                        .map(format_pct)
                        .unwrap_or_else(|| "n/a".to_string())
                );
                println!("  Opex:         {}", format_usd(kpis.opex_total));
                println!(
                    "  Opex ratio:   {}",
                    kpis.opex_ratio
                        .map(format_pct)
                        .unwrap_or_else(|| "n/a".to_string())
                );
                println!("  Runway:       {}", describe_runway(&kpis.cash_runway.runway));
            }
        }
        Commands::Trend { period } => {
            let (end, window) = period_window(period)?;
            let copilot = build_copilot(&cli)?;
            let trend = copilot.engine().gross_margin_trend(end, window)?;
            emit(&cli, &MetricResult::GrossMarginTrend(trend))?;
        }
        Commands::Growth { period } => {
            let (end, window) = period_window(period)?;
            let copilot = build_copilot(&cli)?;
            let growth = copilot.engine().revenue_growth(end, window)?;
            emit(&cli, &MetricResult::RevenueGrowth(growth))?;
        }
        Commands::OpexRatio { month } => {
            let copilot = build_copilot(&cli)?;
            let ratio = copilot.engine().opex_ratio(*month);
            emit(&cli, &MetricResult::OpexRatio(ratio))?;
        }
        Commands::BurnMultiple { months } => {
            let copilot = build_copilot(&cli)?;
            let multiple = copilot.engine().burn_multiple(*months)?;
            emit(&cli, &MetricResult::BurnMultiple(multiple))?;
        }
    }

    Ok(())
}

fn build_copilot(cli: &Cli) -> Result<Copilot> {
    let config = match &cli.config {
        Some(path) => CopilotConfig::from_json_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => CopilotConfig::default(),
    };

    let mut dataset: Dataset = load_dataset(&cli.facts, &cli.cash).with_context(|| {
        format!(
            "loading {} and {}",
            cli.facts.display(),
            cli.cash.display()
        )
    })?;

    if let Some(entity) = &cli.entity {
        info!("Scoping to entity {}", entity);
        dataset = dataset.for_entity(entity);
    }

    Ok(Copilot::new(dataset, config)?)
}

/// End month and inclusive length of a `YYYY-MM[:YYYY-MM]` period.
fn period_window(period: &str) -> Result<(CalendarMonth, u32)> {
    let (start, end) = parse_period_string(period)?;
    let window = u32::try_from(months_between(start, end) + 1)
        .with_context(|| format!("period {} is not in chronological order", period))?;
    Ok((end, window))
}

fn emit(cli: &Cli, result: &MetricResult) -> Result<()> {
    if cli.json {
        print_json(result)
    } else {
        print_result(result);
        Ok(())
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_outcome(outcome: &QueryOutcome) {
    match outcome {
        QueryOutcome::Answered { result, .. } => print_result(result),
        QueryOutcome::UnknownIntent { .. } => {
            println!("I didn't understand that. Try revenue vs budget, gross margin, opex, or cash runway.");
        }
        QueryOutcome::MissingParameter {
            parameter: QueryParameter::Month,
            ..
        } => {
            println!("Which month? Try something like \"June 2025\".");
        }
        QueryOutcome::MissingParameter {
            parameter: QueryParameter::Window,
            ..
        } => {
            println!("Over how many months? Try something like \"last 6 months\".");
        }
        QueryOutcome::UnsupportedParameter { .. } => {
            println!("That window reaches back further than the calendar allows. Try a shorter one.");
        }
    }
}

fn print_result(result: &MetricResult) {
    println!("{}", result.summary());
    match result {
        MetricResult::GrossMarginTrend(trend) => {
            for point in &trend.points {
                println!(
                    "  {}  {:>8}",
                    point.month,
                    point
                        .gross_margin
                        .map(format_pct)
                        .unwrap_or_else(|| "n/a".to_string())
                );
            }
        }
        MetricResult::OpexBreakdown(breakdown) => {
            for line in &breakdown.lines {
                println!("  {:<24} {:>12}", line.category, format_usd(line.amount));
            }
        }
        MetricResult::RevenueGrowth(growth) => {
            for point in &growth.points {
                println!(
                    "  {}  {:>12}  {:>8}",
                    point.month,
                    point
                        .revenue
                        .map(format_usd)
                        .unwrap_or_else(|| "n/a".to_string()),
                    point
                        .growth
                        .map(format_pct)
                        .unwrap_or_else(|| "n/a".to_string())
                );
            }
        }
        _ => {}
    }
}

fn describe_runway(runway: &Runway) -> String {
    match runway {
        Runway::Finite { months } => format!("{:.1} months", months),
        Runway::Infinite => "unlimited".to_string(),
        Runway::Unavailable => "n/a".to_string(),
    }
}
