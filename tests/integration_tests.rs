use cfo_copilot::*;
use std::io::Write;
use std::path::PathBuf;

fn month(year: i32, month: u32) -> CalendarMonth {
    CalendarMonth::new(year, month).unwrap()
}

fn actual(m: CalendarMonth, category: &str, amount: f64) -> FinancialRecord {
    FinancialRecord::new("ParentCo", m, category, amount, RecordSource::Actual)
}

fn budget(m: CalendarMonth, category: &str, amount: f64) -> FinancialRecord {
    FinancialRecord::new("ParentCo", m, category, amount, RecordSource::Budget)
}

fn cash_series(start: CalendarMonth, balances: &[f64]) -> Vec<CashRecord> {
    balances
        .iter()
        .enumerate()
        .map(|(i, b)| CashRecord::new("Consolidated", start.offset(i as i32).unwrap(), *b))
        .collect()
}

fn fake_data() -> Dataset {
    Dataset::new(
        vec![
            actual(month(2023, 1), "Revenue", 1000.0),
            budget(month(2023, 1), "Revenue", 1200.0),
            actual(month(2023, 1), "COGS", 400.0),
            actual(month(2023, 1), "Opex:Sales", 200.0),
            actual(month(2023, 2), "Revenue", 1500.0),
            budget(month(2023, 2), "Revenue", 1400.0),
            actual(month(2023, 2), "COGS", 500.0),
            actual(month(2023, 2), "Opex:Sales", 300.0),
            actual(month(2023, 3), "Revenue", 800.0),
            actual(month(2023, 3), "COGS", 400.0),
            actual(month(2023, 3), "Opex:Sales", 600.0),
        ],
        cash_series(month(2023, 1), &[10000.0, 9000.0, 8000.0]),
    )
    .unwrap()
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
}

fn answered(outcome: QueryOutcome) -> (Intent, QueryParams, MetricResult) {
    match outcome {
        QueryOutcome::Answered {
            intent,
            params,
            result,
        } => (intent, params, result),
        other => panic!("expected an answer, got {:?}", other),
    }
}

#[test]
fn test_variance_pct_matches_definition_and_round_trips() {
    let pairs = [
        (1000.0, 1200.0),
        (1500.0, 1400.0),
        (333.33, 1000.01),
        (0.0, 50.0),
        (-20.0, 80.0),
    ];

    for (i, (a, b)) in pairs.iter().enumerate() {
        let m = month(2024, 1).offset(i as i32).unwrap();
        let ds = Dataset::new(
            vec![actual(m, "Revenue", *a), budget(m, "Revenue", *b)],
            vec![],
        )
        .unwrap();
        let result = MetricsEngine::new(&ds).revenue_vs_budget(m);

        let pct = result.variance_pct.unwrap();
        assert_eq!(pct, (a - b) / b);
        assert_eq!(result.variance_abs, Some(a - b));
        let reconstructed = b * (1.0 + pct);
        assert!(
            (reconstructed - a).abs() < 1e-9,
            "round trip for {} vs {} gave {}",
            a,
            b,
            reconstructed
        );
    }
}

#[test]
fn test_missing_budget_yields_nulls_and_flag() {
    let ds = fake_data();
    let result = MetricsEngine::new(&ds).revenue_vs_budget(month(2023, 3));

    assert_eq!(result.status, BudgetStatus::NoBudget);
    assert!(!result.status.has_budget());
    assert_eq!(result.actual, 800.0);
    assert_eq!(result.budget, None);
    assert_eq!(result.variance_abs, None);
    assert_eq!(result.variance_pct, None);
    assert!(result.summary.contains("no budget data"));

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["budget"].is_null());
    assert!(json["variance_pct"].is_null());
    assert_eq!(json["status"], "no_budget");
}

#[test]
fn test_no_data_is_distinct_from_zero_revenue() {
    let ds = Dataset::new(
        vec![
            actual(month(2023, 1), "Revenue", 0.0),
            budget(month(2023, 1), "Revenue", 0.0),
        ],
        vec![],
    )
    .unwrap();
    let engine = MetricsEngine::new(&ds);

    let zero = engine.revenue_vs_budget(month(2023, 1));
    assert_eq!(zero.status, BudgetStatus::Complete);
    assert_eq!(zero.actual, 0.0);
    assert_eq!(zero.budget, Some(0.0));
    assert_eq!(zero.variance_pct, None);

    let nothing = engine.revenue_vs_budget(month(2023, 6));
    assert_eq!(nothing.status, BudgetStatus::NoData);
    assert_eq!(nothing.actual, 0.0);
    assert_eq!(nothing.budget, None);
    assert_eq!(nothing.variance_abs, None);
    assert!(!nothing.status.has_budget());
}

#[test]
fn test_gross_margin_half_exactly() {
    let ds = Dataset::new(
        vec![
            actual(month(2023, 5), "Revenue", 1000.0),
            actual(month(2023, 5), "COGS", 500.0),
        ],
        vec![],
    )
    .unwrap();
    let trend = MetricsEngine::new(&ds)
        .gross_margin_trend(month(2023, 5), 1)
        .unwrap();
    assert_eq!(trend.points.len(), 1);
    assert_eq!(trend.points[0].gross_margin, Some(0.5));
    assert_eq!(trend.average_margin, Some(0.5));
}

#[test]
fn test_zero_revenue_month_is_null_but_present() {
    let mut records = fake_data().records().to_vec();
    records.push(actual(month(2023, 4), "Revenue", 0.0));
    records.push(actual(month(2023, 4), "COGS", 100.0));
    let ds = Dataset::new(records, vec![]).unwrap();

    let trend = MetricsEngine::new(&ds)
        .gross_margin_trend(month(2023, 4), 4)
        .unwrap();

    let months: Vec<CalendarMonth> = trend.points.iter().map(|p| p.month).collect();
    assert_eq!(
        months,
        vec![month(2023, 1), month(2023, 2), month(2023, 3), month(2023, 4)]
    );
    assert_eq!(trend.points[3].gross_margin, None);
    assert_eq!(trend.points[3].cogs, 100.0);

    let expected = (0.6 + 1000.0 / 1500.0 + 0.5) / 3.0;
    let average = trend.average_margin.unwrap();
    assert!((average - expected).abs() < 1e-12);
}

#[test]
fn test_gap_months_stay_in_timeline() {
    let ds = Dataset::new(
        vec![
            actual(month(2022, 11), "Revenue", 100.0),
            actual(month(2022, 11), "COGS", 25.0),
            actual(month(2023, 2), "Revenue", 200.0),
            actual(month(2023, 2), "COGS", 150.0),
        ],
        vec![],
    )
    .unwrap();
    let trend = MetricsEngine::new(&ds)
        .gross_margin_trend(month(2023, 2), 4)
        .unwrap();

    let margins: Vec<Option<f64>> = trend.points.iter().map(|p| p.gross_margin).collect();
    assert_eq!(margins, vec![Some(0.75), None, None, Some(0.25)]);
    assert_eq!(trend.points[1].month, month(2022, 12));
    assert_eq!(trend.average_margin, Some(0.5));
}

#[test]
fn test_trend_with_no_revenue_at_all() {
    let ds = Dataset::default();
    let trend = MetricsEngine::new(&ds)
        .gross_margin_trend(month(2023, 3), 3)
        .unwrap();
    assert_eq!(trend.points.len(), 3);
    assert!(trend.points.iter().all(|p| p.gross_margin.is_none()));
    assert_eq!(trend.average_margin, None);
}

#[test]
fn test_opex_breakdown_descending_without_revenue() {
    let m = month(2024, 2);
    let ds = Dataset::new(
        vec![
            actual(m, "Opex:Eng", 200.0),
            actual(m, "Revenue", 900.0),
            actual(m, "Opex:Marketing", 300.0),
        ],
        vec![],
    )
    .unwrap();
    let breakdown = MetricsEngine::new(&ds).opex_breakdown(m);

    assert_eq!(
        breakdown.lines,
        vec![
            OpexLine {
                category: "Opex:Marketing".to_string(),
                amount: 300.0
            },
            OpexLine {
                category: "Opex:Eng".to_string(),
                amount: 200.0
            },
        ]
    );
    assert_eq!(breakdown.total, 500.0);
}

#[test]
fn test_opex_breakdown_groups_and_empty_month() {
    let m = month(2024, 2);
    let ds = Dataset::new(
        vec![
            actual(m, "Opex:Eng", 200.0),
            FinancialRecord::new("EMEA", m, "Opex:Eng", 50.0, RecordSource::Actual),
        ],
        vec![],
    )
    .unwrap();
    let engine = MetricsEngine::new(&ds);

    let grouped = engine.opex_breakdown(m);
    assert_eq!(grouped.lines.len(), 1);
    assert_eq!(grouped.lines[0].amount, 250.0);

    let empty = engine.opex_breakdown(month(2024, 3));
    assert!(empty.lines.is_empty());
    assert_eq!(empty.total, 0.0);
}

#[test]
fn test_runway_single_point_is_infinite() {
    let ds = Dataset::new(vec![], cash_series(month(2023, 1), &[5000.0])).unwrap();
    let result = MetricsEngine::new(&ds).cash_runway();
    assert_eq!(result.runway, Runway::Infinite);
    assert_eq!(result.deltas_used, 0);
    assert_eq!(result.average_delta, None);
    assert_eq!(result.current_cash, Some(5000.0));
}

#[test]
fn test_runway_shrinking_cash() {
    let ds = Dataset::new(vec![], cash_series(month(2023, 1), &[1000.0, 800.0, 600.0])).unwrap();
    let result = MetricsEngine::new(&ds).cash_runway();
    assert_eq!(result.runway, Runway::Finite { months: 3.0 });
    assert_eq!(result.runway.months(), Some(3.0));
    assert_eq!(result.net_burn, Some(200.0));
    assert_eq!(result.as_of, Some(month(2023, 3)));
}

#[test]
fn test_runway_growing_cash_is_infinite() {
    let ds = Dataset::new(
        vec![],
        cash_series(month(2023, 1), &[10000.0, 11000.0, 12000.0, 12500.0]),
    )
    .unwrap();
    let result = MetricsEngine::new(&ds).cash_runway();
    assert!(result.runway.is_infinite());
    assert_eq!(result.runway.months(), None);
    assert!(result.summary.contains("not depleting"));
}

#[test]
fn test_runway_ignores_entity_that_stopped_reporting() {
    let ds = Dataset::new(
        vec![],
        vec![
            CashRecord::new("ParentCo", month(2023, 1), 1000.0),
            CashRecord::new("ParentCo", month(2023, 2), 1000.0),
            CashRecord::new("ParentCo", month(2023, 3), 1000.0),
            CashRecord::new("EMEA", month(2023, 1), 500.0),
            CashRecord::new("EMEA", month(2023, 2), 500.0),
        ],
    )
    .unwrap();
    let result = MetricsEngine::new(&ds).cash_runway();
    assert_eq!(result.as_of, Some(month(2023, 2)));
    assert_eq!(result.current_cash, Some(1500.0));
    assert_eq!(result.average_delta, Some(0.0));
    assert!(result.runway.is_infinite());
}

#[test]
fn test_revenue_growth_trend() {
    let growth = MetricsEngine::new(&fake_data())
        .revenue_growth(month(2023, 3), 3)
        .unwrap();
    let feb = growth
        .points
        .iter()
        .find(|p| p.month == month(2023, 2))
        .unwrap();
    assert_eq!(feb.prior_revenue, Some(1000.0));
    assert_eq!(feb.growth, Some(0.5));
    assert_eq!(growth.points[0].growth, None);

    let json = serde_json::to_value(MetricResult::RevenueGrowth(growth)).unwrap();
    assert_eq!(json["metric"], "revenue_growth");
    assert_eq!(json["points"][0]["growth"], serde_json::Value::Null);
}

#[test]
fn test_burn_multiple_with_shrinking_revenue_is_null() {
    let result = MetricsEngine::new(&fake_data()).burn_multiple(2).unwrap();
    assert_eq!(result.start_month, Some(month(2023, 1)));
    assert_eq!(result.net_burn, Some(2000.0));
    assert_eq!(result.net_new_revenue, Some(-200.0));
    assert_eq!(result.burn_multiple, None);
    assert!(result.summary.starts_with("Revenue did not grow"));
}

#[test]
fn test_answer_window_past_year_one() {
    let copilot = Copilot::with_defaults(fake_data());
    let outcome = copilot.answer("gross margin last 30000 months").unwrap();
    assert!(matches!(
        outcome,
        QueryOutcome::UnsupportedParameter {
            intent: Intent::GrossMarginTrend,
            parameter: QueryParameter::Window,
            ..
        }
    ));

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["outcome"], "unsupported_parameter");
    assert_eq!(json["parameter"], "window");
}

#[test]
fn test_planner_examples() {
    assert_eq!(
        extract_month("What was June 2025 revenue vs budget?"),
        Some(month(2025, 6))
    );
    assert_eq!(extract_month("revenue last quarter"), None);
    assert_eq!(extract_n_months("last 6 months"), Some(6));
    assert_eq!(extract_n_months("gross margin trend"), None);
    assert_eq!(
        classify("show opex and gross margin for last 6 months"),
        Intent::GrossMarginTrend
    );
}

#[test]
fn test_answer_revenue_vs_budget_query() {
    let copilot = Copilot::with_defaults(fake_data());
    let (intent, params, result) =
        answered(copilot.answer("What was Jan 2023 revenue vs budget?").unwrap());

    assert_eq!(intent, Intent::RevenueVsBudget);
    assert_eq!(params.month, Some(month(2023, 1)));
    assert_eq!(result.metric_type(), MetricType::RevenueVsBudget);
    let MetricResult::RevenueVsBudget(rvb) = result else {
        panic!("wrong metric");
    };
    assert_eq!(rvb.variance_abs, Some(-200.0));
    assert_eq!(
        rvb.summary,
        "Revenue for January 2023 was $1,000 vs budget $1,200: variance -$200 (-16.7%)."
    );
}

#[test]
fn test_answer_margin_trend_uses_default_window() {
    let copilot = Copilot::with_defaults(fake_data());
    let (_, params, result) = answered(copilot.answer("gross margin trend").unwrap());
    assert_eq!(params.window_months, None);

    let MetricResult::GrossMarginTrend(trend) = result else {
        panic!("wrong metric");
    };
    assert_eq!(trend.window_months, 3);
    assert_eq!(trend.end_month, month(2023, 3));
    assert_eq!(trend.points.last().unwrap().gross_margin, Some(0.5));
}

#[test]
fn test_answer_margin_trend_with_explicit_window_and_month() {
    let config = CopilotConfig::from_json_str(r#"{"default_window_months": 6}"#).unwrap();
    let copilot = Copilot::new(fake_data(), config).unwrap();

    let (_, _, result) = answered(copilot.answer("margin for the last 2 months to Feb 2023").unwrap());
    let MetricResult::GrossMarginTrend(trend) = result else {
        panic!("wrong metric");
    };
    assert_eq!(trend.window_months, 2);
    assert_eq!(trend.points[0].month, month(2023, 1));
    assert_eq!(trend.points[1].month, month(2023, 2));

    let (_, _, result) = answered(copilot.answer("margin please").unwrap());
    let MetricResult::GrossMarginTrend(trend) = result else {
        panic!("wrong metric");
    };
    assert_eq!(trend.points.len(), 6);
}

#[test]
fn test_answer_runway_query() {
    let copilot = Copilot::with_defaults(fake_data());
    let (intent, _, result) = answered(copilot.answer("How long is our cash runway?").unwrap());
    assert_eq!(intent, Intent::CashRunway);
    let MetricResult::CashRunway(runway) = result else {
        panic!("wrong metric");
    };
    assert_eq!(runway.runway, Runway::Finite { months: 8.0 });
}

#[test]
fn test_load_fixtures_and_answer() {
    let dataset = load_dataset(fixture("facts.csv"), fixture("cash.csv")).unwrap();
    assert_eq!(dataset.entities().len(), 2);

    let copilot = Copilot::with_defaults(dataset.clone());

    let (_, _, result) = answered(copilot.answer("opex breakdown March 2023").unwrap());
    let MetricResult::OpexBreakdown(opex) = result else {
        panic!("wrong metric");
    };
    let lines: Vec<(&str, f64)> = opex
        .lines
        .iter()
        .map(|l| (l.category.as_str(), l.amount))
        .collect();
    assert_eq!(lines, vec![("Opex:Sales", 600.0), ("Opex:Marketing", 350.0)]);

    let (_, _, result) = answered(copilot.answer("runway").unwrap());
    let MetricResult::CashRunway(runway) = result else {
        panic!("wrong metric");
    };
    assert_eq!(runway.current_cash, Some(10000.0));
    assert_eq!(runway.runway, Runway::Finite { months: 10.0 });

    let emea = Copilot::with_defaults(dataset.for_entity("EMEA"));
    let (_, _, result) = answered(emea.answer("runway").unwrap());
    let MetricResult::CashRunway(runway) = result else {
        panic!("wrong metric");
    };
    assert!(runway.runway.is_infinite());
}

#[test]
fn test_kpis_from_fixtures() {
    let dataset = load_dataset(fixture("facts.csv"), fixture("cash.csv")).unwrap();
    let kpis = Copilot::with_defaults(dataset).kpi_snapshot().unwrap();

    assert_eq!(kpis.month, month(2023, 3));
    assert_eq!(kpis.revenue_vs_budget.actual, 1000.0);
    assert_eq!(kpis.revenue_vs_budget.budget, Some(250.0));
    assert_eq!(kpis.revenue_vs_budget.variance_pct, Some(3.0));
    assert_eq!(kpis.gross_margin, Some(0.55));
    assert_eq!(kpis.opex_total, 950.0);
    assert_eq!(kpis.opex_ratio, Some(0.95));

    let json = serde_json::to_value(&kpis).unwrap();
    assert_eq!(json["opex_ratio"], 0.95);
}

#[test]
fn test_load_rejects_foreign_currency_file() {
    let dir = tempfile::tempdir().unwrap();
    let facts = dir.path().join("facts.csv");
    let mut file = std::fs::File::create(&facts).unwrap();
    writeln!(file, "entity,month,category,source,amount_usd,currency").unwrap();
    writeln!(file, "ParentCo,2023-01,Revenue,actual,1000,GBP").unwrap();
    drop(file);

    let err = load_dataset(&facts, fixture("cash.csv")).unwrap_err();
    assert!(matches!(err, CopilotError::NonUsdCurrency { row: 1, .. }));
    assert!(err.to_string().contains("GBP"));
}

#[test]
fn test_load_rejects_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_dataset(dir.path().join("nope.csv"), fixture("cash.csv")).unwrap_err();
    assert!(matches!(err, CopilotError::Io(_)));
}

#[test]
fn test_engine_is_pure() {
    let ds = fake_data();
    let before = ds.records().to_vec();
    let engine = MetricsEngine::new(&ds);

    let first = engine.gross_margin_trend(month(2023, 3), 3).unwrap();
    let _ = engine.opex_breakdown(month(2023, 2));
    let _ = engine.cash_runway();
    let second = engine.gross_margin_trend(month(2023, 3), 3).unwrap();

    assert_eq!(first, second);
    assert_eq!(ds.records(), before.as_slice());
}
