//! End-to-end engine behaviour with scripted advisors and in-memory markets

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::json;
use tokio::sync::watch;

use nexusquant::advisors::{Advisor, AdvisorSignal, AdvisoryRequest, DiscretionarySignal};
use nexusquant::domain::{AdvisorKind, MarketBar, Outlook, RunStatus};
use nexusquant::error::AdvisorError;
use nexusquant::persistence::MemoryRecorder;
use nexusquant::simulation::{MarketReplay, SimulationEngine};
use nexusquant::AppConfig;

type Script = Box<dyn Fn(u64, &str) -> Result<AdvisorSignal, AdvisorError> + Send + Sync>;

/// Discretionary advisor driven by a closure; remembers every call
struct ScriptedAnalyst {
    script: Script,
    calls: Arc<Mutex<Vec<(u64, String)>>>,
}

impl ScriptedAnalyst {
    fn new(script: Script) -> (Self, Arc<Mutex<Vec<(u64, String)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                script,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl Advisor for ScriptedAnalyst {
    fn name(&self) -> &str {
        "LLM_Analyst"
    }

    fn kind(&self) -> AdvisorKind {
        AdvisorKind::Discretionary
    }

    async fn advise(&self, request: &AdvisoryRequest<'_>) -> Result<AdvisorSignal, AdvisorError> {
        self.calls
            .lock()
            .unwrap()
            .push((request.tick_id, request.asset.to_string()));
        (self.script)(request.tick_id, request.asset)
    }
}

fn payload(value: serde_json::Value) -> Result<AdvisorSignal, AdvisorError> {
    Ok(AdvisorSignal::Discretionary(DiscretionarySignal { payload: value }))
}

fn config(assets: &[&str]) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.simulation.run_id = "testrun1".to_string();
    cfg.simulation.asset_universe = assets.iter().map(|s| s.to_string()).collect();
    cfg
}

fn replay_from(prices: &[(&str, Vec<f64>)]) -> MarketReplay {
    let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let assets: Vec<String> = prices.iter().map(|(a, _)| a.to_string()).collect();
    let series: HashMap<String, Vec<MarketBar>> = prices
        .iter()
        .map(|(asset, closes)| {
            let bars = closes
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    MarketBar::new(*asset, *p, 1.0, start + chrono::Duration::minutes(5 * i as i64))
                })
                .collect();
            (asset.to_string(), bars)
        })
        .collect();
    MarketReplay::new(assets, series).unwrap()
}

#[tokio::test]
async fn alternating_signals_never_overdraw_cash() {
    let assets = ["BTC-USD", "ETH-USD", "SOL-USD", "SPY", "GLD"];
    let mut cfg = config(&assets);
    cfg.advisor.llm_cooldown_ticks = 1;
    cfg.arbiter.smoothing_factor = 1.0;

    let universe = cfg.simulation.asset_universe.clone();
    let market = MarketReplay::synthetic(&universe, 50, 7).unwrap();
    let recorder = Arc::new(MemoryRecorder::new());
    let (analyst, _) = ScriptedAnalyst::new(Box::new(|tick: u64, _: &str| {
        let outlook = if tick % 2 == 1 { "BULLISH" } else { "BEARISH" };
        payload(json!({"outlook": outlook, "confidence": 0.9, "reasoning": "scripted"}))
    }));

    let mut engine = SimulationEngine::new(cfg, Box::new(market), recorder.clone())
        .with_analyst(Box::new(analyst));

    let (_tx, rx) = watch::channel(false);
    let summary = engine.run(rx, None).await.unwrap();

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.ticks, 50);
    assert!(summary.orders > 0);

    let snapshots = recorder.snapshots().await;
    assert_eq!(snapshots.len(), 50);
    for snap in &snapshots {
        assert!(snap.balance >= -0.01, "tick {} cash {}", snap.tick_id, snap.balance);
        assert!(snap.total_equity > 0.0, "tick {} equity {}", snap.tick_id, snap.total_equity);
    }
    assert_eq!(recorder.status().await, Some(RunStatus::Completed));
}

#[tokio::test]
async fn invalid_prices_carry_forward() {
    let mut cfg = config(&["AAA", "BBB"]);
    cfg.advisor.llm_cooldown_ticks = 1;
    cfg.arbiter.smoothing_factor = 1.0;
    let market = replay_from(&[
        ("AAA", vec![f64::NAN, 10.0, 11.0, f64::NAN, -4.0, 12.0]),
        ("BBB", vec![5.0, 5.0, 5.0, 5.0, 5.0, 5.0]),
    ]);
    let (analyst, _) = ScriptedAnalyst::new(Box::new(|_: u64, _: &str| {
        payload(json!({"outlook": "BULLISH", "confidence": 1.0, "reasoning": "buy"}))
    }));
    let recorder = Arc::new(MemoryRecorder::new());
    let mut engine = SimulationEngine::new(cfg, Box::new(market), recorder.clone())
        .with_analyst(Box::new(analyst));

    let first = engine.run_tick().await.unwrap();
    assert_eq!(first.prices["AAA"], 0.01);
    assert!(first.bars["AAA"].price.is_nan());
    // valued at the floor, but never filled at it
    assert!(first.targets["AAA"] > 0.0);
    assert!(first.orders.iter().all(|o| o.asset != "AAA"));
    assert!(first.orders.iter().any(|o| o.asset == "BBB"));
    assert_eq!(engine.ledger().holding("AAA"), 0.0);

    let second = engine.run_tick().await.unwrap();
    let buy = second
        .orders
        .iter()
        .find(|o| o.asset == "AAA")
        .expect("AAA bought once it prints a real price");
    assert_eq!(buy.fill_price, 10.0);

    let mut reports = vec![first, second];
    while let Some(report) = engine.run_tick().await {
        reports.push(report);
    }
    assert_eq!(reports.len(), 6);
    assert_eq!(reports[3].prices["AAA"], 11.0);
    assert_eq!(reports[4].prices["AAA"], 11.0);
    assert_eq!(reports[5].prices["AAA"], 12.0);
    for report in &reports {
        let equity = report.snapshot.total_equity;
        assert!(equity.is_finite());
        assert!((95_000.0..105_000.0).contains(&equity), "tick {} equity {}", report.tick_id, equity);
        assert!(report.snapshot.balance >= -0.01);
        assert!(report.volatilities.values().all(|v| v.is_finite()));
    }
}

#[tokio::test]
async fn drawdown_warning_fires_once_per_episode() {
    let mut cfg = config(&["AAA"]);
    cfg.advisor.llm_cooldown_ticks = 1;
    cfg.arbiter.smoothing_factor = 1.0;
    cfg.allocator.max_position_pct = 1.0;
    cfg.allocator.cash_reserve_pct = 0.0;
    cfg.risk.max_drawdown_pct = 0.1;

    // fully invested: breach at 80, still breached at 75, recover, breach again
    let market = replay_from(&[(
        "AAA",
        vec![100.0, 100.0, 80.0, 75.0, 100.0, 80.0, 79.0, 100.0],
    )]);
    let (analyst, _) = ScriptedAnalyst::new(Box::new(|_: u64, _: &str| {
        payload(json!({"outlook": "BULLISH", "confidence": 1.0}))
    }));
    let mut engine = SimulationEngine::new(cfg, Box::new(market), Arc::new(MemoryRecorder::new()))
        .with_analyst(Box::new(analyst));

    let mut breaches = Vec::new();
    while engine.run_tick().await.is_some() {
        breaches.push(engine.drawdown_breaches());
    }

    assert_eq!(breaches, vec![0, 0, 1, 1, 1, 2, 2, 2]);
    assert!((engine.ledger().worst_drawdown() - 0.25).abs() < 1e-9);
    assert_eq!(engine.ledger().max_drawdown(), 0.0);
    assert_eq!(engine.ticks_processed(), 8);
}

#[tokio::test]
async fn analyst_respects_cooldown() {
    let mut cfg = config(&["BTC-USD", "AAPL"]);
    cfg.advisor.llm_cooldown_ticks = 10;

    let market = MarketReplay::synthetic(&cfg.simulation.asset_universe, 25, 1).unwrap();
    let (analyst, calls) = ScriptedAnalyst::new(Box::new(|_: u64, _: &str| {
        payload(json!({"outlook": "NEUTRAL", "confidence": 0.5}))
    }));
    let mut engine = SimulationEngine::new(cfg, Box::new(market), Arc::new(MemoryRecorder::new()))
        .with_analyst(Box::new(analyst));

    let (_tx, rx) = watch::channel(false);
    engine.run(rx, None).await.unwrap();

    let calls = calls.lock().unwrap().clone();
    for asset in ["BTC-USD", "AAPL"] {
        let ticks: Vec<u64> = calls
            .iter()
            .filter(|(_, a)| a == asset)
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(ticks, vec![1, 11, 21], "{asset}");
    }
}

#[tokio::test]
async fn every_tick_gets_quant_advice_per_asset() {
    let cfg = config(&["SPY", "QQQ", "GLD"]);
    let market = MarketReplay::synthetic(&cfg.simulation.asset_universe, 30, 3).unwrap();
    let recorder = Arc::new(MemoryRecorder::new());
    let mut engine = SimulationEngine::new(cfg, Box::new(market), recorder.clone());

    let (_tx, rx) = watch::channel(false);
    engine.run(rx, None).await.unwrap();

    let ticks = recorder.ticks().await;
    for report in &ticks {
        assert_eq!(report.advice.len(), 3);
        assert!(report.advice.iter().all(|a| a.kind == AdvisorKind::Quant));
        if report.tick_id < 20 {
            assert!(report
                .advice
                .iter()
                .all(|a| a.outlook == Outlook::Neutral && a.confidence == 0.0));
        }
    }
}

#[tokio::test]
async fn advisor_failures_become_neutral_records() {
    let cfg = config(&["BTC-USD", "ETH-USD", "TSLA"]);
    let market = MarketReplay::synthetic(&cfg.simulation.asset_universe, 1, 9).unwrap();
    let (analyst, _) = ScriptedAnalyst::new(Box::new(|_: u64, asset: &str| match asset {
        "BTC-USD" => Err(AdvisorError::Timeout { elapsed_ms: 30_000 }),
        "ETH-USD" => payload(json!({"sentiment": "up", "confidence": "lots"})),
        _ => Err(AdvisorError::Status {
            status: 500,
            body: "upstream".to_string(),
        }),
    }));
    let mut engine = SimulationEngine::new(cfg, Box::new(market), Arc::new(MemoryRecorder::new()))
        .with_analyst(Box::new(analyst));

    let report = engine.run_tick().await.unwrap();
    let analyst_advice: HashMap<&str, _> = report
        .advice
        .iter()
        .filter(|a| a.kind == AdvisorKind::Discretionary)
        .map(|a| (a.asset.as_str(), a))
        .collect();

    assert_eq!(analyst_advice.len(), 3);
    for rec in analyst_advice.values() {
        assert_eq!(rec.outlook, Outlook::Neutral);
        assert_eq!(rec.confidence, 0.0);
        assert_eq!(rec.advisor, "LLM_Analyst");
    }
    assert!(analyst_advice["BTC-USD"].rationale.contains("timed out"));
    assert_eq!(analyst_advice["ETH-USD"].rationale, "No rationale");
    assert!(analyst_advice["TSLA"].rationale.contains("500"));
    assert!(report.orders.is_empty());
}

#[tokio::test]
async fn bullish_consensus_builds_capped_positions() {
    let mut cfg = config(&["AAA", "BBB"]);
    cfg.advisor.llm_cooldown_ticks = 1;
    cfg.arbiter.smoothing_factor = 1.0;

    let market = replay_from(&[("AAA", vec![100.0; 5]), ("BBB", vec![50.0; 5])]);
    let (analyst, _) = ScriptedAnalyst::new(Box::new(|_: u64, _: &str| {
        payload(json!({"outlook": "BULLISH", "confidence": 1.0, "reasoning": "all in"}))
    }));
    let recorder = Arc::new(MemoryRecorder::new());
    let mut engine = SimulationEngine::new(cfg, Box::new(market), recorder.clone())
        .with_analyst(Box::new(analyst));

    let report = engine.run_tick().await.unwrap();
    assert_eq!(report.scores["AAA"], 1.0);
    // equal default volatility: each weight 0.5 capped at 0.15 of 95% of 100k
    let cap = 0.15 * 100_000.0 * 0.95;
    assert!((report.targets["AAA"] - cap).abs() < 1e-6);
    assert!((report.targets["BBB"] - cap).abs() < 1e-6);
    assert_eq!(report.orders.len(), 2);
    assert!((engine.ledger().holding("AAA") - cap / 100.0).abs() < 1e-9);

    // flat prices, same targets: nothing more to trade
    let second = engine.run_tick().await.unwrap();
    assert!(second.orders.is_empty());
    assert!((second.snapshot.total_equity - 100_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn shutdown_and_tick_limit_interrupt_the_run() {
    let cfg = config(&["SPY"]);
    let market = MarketReplay::synthetic(&cfg.simulation.asset_universe, 40, 5).unwrap();
    let recorder = Arc::new(MemoryRecorder::new());
    let mut engine = SimulationEngine::new(cfg.clone(), Box::new(market), recorder.clone());

    let (_tx, rx) = watch::channel(false);
    let summary = engine.run(rx, Some(5)).await.unwrap();
    assert_eq!(summary.status, RunStatus::Interrupted);
    assert_eq!(summary.ticks, 5);
    assert_eq!(recorder.tick_count().await, 5);

    let market = MarketReplay::synthetic(&cfg.simulation.asset_universe, 40, 5).unwrap();
    let mut engine = SimulationEngine::new(cfg, Box::new(market), recorder.clone());
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();
    let summary = engine.run(rx, None).await.unwrap();
    assert_eq!(summary.status, RunStatus::Interrupted);
    assert_eq!(summary.ticks, 0);
    assert!(summary.final_snapshot.is_none());
    assert_eq!(recorder.status().await, Some(RunStatus::Interrupted));
}
