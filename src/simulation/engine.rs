//! Tick orchestrator
//!
//! Each tick runs, in order: price sanitization, valuation, advice collection
//! (quant every tick, analyst under a per-asset cooldown), arbitration,
//! volatility, allocation, rebalance, and finally recording. Ticks are
//! processed strictly one after another; shutdown is only observed between
//! ticks.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::market::MarketSource;
use crate::advisors::{consult, Advisor, AdvisoryRequest, QuantAdvisor};
use crate::config::AppConfig;
use crate::decision::{rolling_volatility, CapitalAllocator, SignalArbiter};
use crate::domain::{
    is_valid_price, AdviceRecord, MarketBar, PortfolioSnapshot, RunRecord, RunStatus, TickReport,
};
use crate::error::Result;
use crate::persistence::RunRecorder;
use crate::portfolio::PortfolioLedger;

/// Outcome of a full run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: String,
    pub status: RunStatus,
    pub ticks: u64,
    pub orders: usize,
    pub initial_capital: f64,
    /// Last snapshot, if at least one tick ran
    pub final_snapshot: Option<PortfolioSnapshot>,
    /// Sentiment memory at the end of the run
    pub scores: HashMap<String, f64>,
    /// Last valuation price per asset
    pub prices: HashMap<String, f64>,
}

impl RunSummary {
    pub fn total_return(&self) -> Option<f64> {
        self.final_snapshot
            .as_ref()
            .map(|s| s.total_equity / self.initial_capital - 1.0)
    }
}

pub struct SimulationEngine {
    config: AppConfig,
    run_id: String,
    market: Box<dyn MarketSource>,
    quant: Box<dyn Advisor>,
    analyst: Option<Box<dyn Advisor>>,
    arbiter: SignalArbiter,
    allocator: CapitalAllocator,
    ledger: PortfolioLedger,
    recorder: Arc<dyn RunRecorder>,
    /// asset -> tick of the last analyst call
    last_analyst_call: HashMap<String, u64>,
    /// Assets that have printed at least one valid price
    priced: HashSet<String>,
    ticks_processed: u64,
    orders_filled: usize,
    in_drawdown_breach: bool,
    drawdown_breaches: u64,
    last_snapshot: Option<PortfolioSnapshot>,
}

impl SimulationEngine {
    /// Engine with the default quant advisor and no analyst
    pub fn new(
        config: AppConfig,
        market: Box<dyn MarketSource>,
        recorder: Arc<dyn RunRecorder>,
    ) -> Self {
        let run_id = config.simulation.run_id.clone();
        let ledger = PortfolioLedger::new(
            run_id.clone(),
            config.simulation.initial_capital,
            market.assets(),
            &config.execution,
        );

        Self {
            quant: Box::new(QuantAdvisor::from_config(&config.advisor)),
            analyst: None,
            arbiter: SignalArbiter::new(config.arbiter.clone()),
            allocator: CapitalAllocator::new(&config.allocator),
            ledger,
            recorder,
            market,
            run_id,
            config,
            last_analyst_call: HashMap::new(),
            priced: HashSet::new(),
            ticks_processed: 0,
            orders_filled: 0,
            in_drawdown_breach: false,
            drawdown_breaches: 0,
            last_snapshot: None,
        }
    }

    pub fn with_quant(mut self, quant: Box<dyn Advisor>) -> Self {
        self.quant = quant;
        self
    }

    pub fn with_analyst(mut self, analyst: Box<dyn Advisor>) -> Self {
        self.analyst = Some(analyst);
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn arbiter(&self) -> &SignalArbiter {
        &self.arbiter
    }

    pub fn ticks_processed(&self) -> u64 {
        self.ticks_processed
    }

    /// Number of distinct drawdown breach episodes so far
    pub fn drawdown_breaches(&self) -> u64 {
        self.drawdown_breaches
    }

    /// Replay until the market is exhausted, `max_ticks` is reached, or the
    /// shutdown channel flips to `true`.
    pub async fn run(
        &mut self,
        shutdown: watch::Receiver<bool>,
        max_ticks: Option<u64>,
    ) -> Result<RunSummary> {
        let record = RunRecord {
            run_id: self.run_id.clone(),
            project: self.config.simulation.project_name.clone(),
            version: self.config.simulation.version.clone(),
            started_at: Utc::now(),
            config_snapshot: serde_json::to_value(&self.config)?,
            status: RunStatus::Running,
        };
        if let Err(e) = self.recorder.start_run(&record).await {
            error!(run_id = %self.run_id, error = %e, "failed to record run start");
        }

        info!(
            run_id = %self.run_id,
            assets = self.market.assets().len(),
            initial_capital = self.config.simulation.initial_capital,
            analyst = self.analyst.is_some(),
            "starting portfolio loop"
        );

        let status = loop {
            if *shutdown.borrow() {
                info!(tick_id = self.ticks_processed, "shutdown requested, stopping between ticks");
                break RunStatus::Interrupted;
            }
            if max_ticks.is_some_and(|max| self.ticks_processed >= max) {
                info!(max_ticks = ?max_ticks, "tick limit reached");
                break RunStatus::Interrupted;
            }
            if self.run_tick().await.is_none() {
                break RunStatus::Completed;
            }
        };

        if let Err(e) = self.recorder.finish_run(&self.run_id, status).await {
            error!(run_id = %self.run_id, error = %e, "failed to record run end");
        }

        info!(
            run_id = %self.run_id,
            status = %status,
            ticks = self.ticks_processed,
            orders = self.orders_filled,
            equity = self.ledger.total_equity(),
            worst_drawdown = self.ledger.worst_drawdown(),
            "simulation finished"
        );

        Ok(self.summary(status))
    }

    pub fn summary(&self, status: RunStatus) -> RunSummary {
        RunSummary {
            run_id: self.run_id.clone(),
            status,
            ticks: self.ticks_processed,
            orders: self.orders_filled,
            initial_capital: self.config.simulation.initial_capital,
            final_snapshot: self.last_snapshot.clone(),
            scores: self.arbiter.memory().clone(),
            prices: self
                .market
                .assets()
                .iter()
                .filter_map(|a| self.ledger.last_price(a).map(|p| (a.clone(), p)))
                .collect(),
        }
    }

    /// Process one tick. `None` once the market source is exhausted.
    pub async fn run_tick(&mut self) -> Option<TickReport> {
        let tick = self.market.next_tick()?;
        let tick_id = tick.tick_id;
        let assets: Vec<String> = self.market.assets().to_vec();

        // 1. Valuation at sanitized prices
        let prices = self.sanitize_prices(&assets, &tick.bars);
        self.ledger.revalue(&prices);

        // 2. Advice
        let advice = self.collect_advice(tick_id, &assets, &prices).await;

        // 3. Arbitration
        let scores = self.arbiter.aggregate(&advice);

        // 4. Risk inputs
        let volatilities: HashMap<String, f64> = assets
            .iter()
            .map(|asset| {
                let vol = rolling_volatility(
                    self.market.history(asset),
                    self.config.risk.volatility_lookback,
                    self.config.risk.default_volatility,
                );
                (asset.clone(), vol)
            })
            .collect();

        // 5. Allocation
        let targets = self
            .allocator
            .allocate(&scores, &volatilities, self.ledger.total_equity());

        // 6. Rebalance. Floor prices value the book but never fill orders.
        let tradable: HashMap<String, f64> = targets
            .iter()
            .filter(|(asset, _)| self.priced.contains(asset.as_str()))
            .map(|(asset, usd)| (asset.clone(), *usd))
            .collect();
        let orders = self.ledger.rebalance(tick_id, &tradable);
        self.orders_filled += orders.len();

        // 7. Bookkeeping
        let timestamp = tick
            .bars
            .values()
            .map(|b| b.timestamp)
            .max()
            .unwrap_or_else(Utc::now);
        let snapshot = self.ledger.snapshot(tick_id, timestamp);
        self.ticks_processed += 1;
        self.check_drawdown(tick_id);

        let interval = self.config.simulation.progress_interval;
        if interval > 0 && tick_id % interval == 0 {
            info!(
                tick_id,
                equity = snapshot.total_equity,
                drawdown = snapshot.max_drawdown,
                cash = snapshot.balance,
                "TICK"
            );
        }

        let report = TickReport {
            run_id: self.run_id.clone(),
            tick_id,
            timestamp,
            bars: tick.bars,
            prices,
            advice,
            scores,
            volatilities,
            targets,
            orders,
            snapshot: snapshot.clone(),
        };

        if let Err(e) = self.recorder.record_tick(&report).await {
            warn!(tick_id, error = %e, "failed to record tick");
        }

        self.last_snapshot = Some(snapshot);
        Some(report)
    }

    /// Replace unusable prices with the previous valuation price, or the
    /// floor price for assets that never printed one.
    fn sanitize_prices(
        &mut self,
        assets: &[String],
        bars: &HashMap<String, MarketBar>,
    ) -> HashMap<String, f64> {
        assets
            .iter()
            .map(|asset| {
                let raw = bars.get(asset).map(|b| b.price);
                let price = match raw {
                    Some(p) if is_valid_price(p) => {
                        self.priced.insert(asset.clone());
                        p
                    }
                    _ => {
                        let fallback = self
                            .ledger
                            .last_price(asset)
                            .unwrap_or(self.config.execution.floor_price);
                        warn!(asset = %asset, raw = ?raw, fallback, "invalid price, carrying forward");
                        fallback
                    }
                };
                (asset.clone(), price)
            })
            .collect()
    }

    async fn collect_advice(
        &mut self,
        tick_id: u64,
        assets: &[String],
        prices: &HashMap<String, f64>,
    ) -> Vec<AdviceRecord> {
        let cooldown = self.config.advisor.llm_cooldown_ticks;
        let mut advice = Vec::with_capacity(assets.len() * 2);

        for asset in assets {
            let request = AdvisoryRequest {
                run_id: &self.run_id,
                tick_id,
                asset,
                price: prices.get(asset).copied().unwrap_or(self.config.execution.floor_price),
                history: self.market.history(asset),
            };

            let quant = self.quant.as_ref();
            advice.push(consult(quant, &request).await.into_record(&request, quant));

            let Some(analyst) = self.analyst.as_deref() else {
                continue;
            };
            let due = self
                .last_analyst_call
                .get(asset)
                .map_or(true, |last| tick_id.saturating_sub(*last) >= cooldown);
            if !due {
                continue;
            }

            debug!(asset = %asset, tick_id, "consulting analyst");
            advice.push(consult(analyst, &request).await.into_record(&request, analyst));
            self.last_analyst_call.insert(asset.clone(), tick_id);
        }

        advice
    }

    fn check_drawdown(&mut self, tick_id: u64) {
        let drawdown = self.ledger.max_drawdown();
        let limit = self.config.risk.max_drawdown_pct;
        if drawdown > limit {
            if !self.in_drawdown_breach {
                self.drawdown_breaches += 1;
                warn!(
                    tick_id,
                    drawdown,
                    limit,
                    "RISK: max drawdown exceeded"
                );
            }
            self.in_drawdown_breach = true;
        } else {
            self.in_drawdown_breach = false;
        }
    }
}
