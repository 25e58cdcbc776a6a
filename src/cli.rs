//! Command line interface and result formatting

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tabled::{Table, Tabled};

use crate::config::AppConfig;
use crate::simulation::RunSummary;

/// Seed used for synthetic data when none is given
pub const DEFAULT_SEED: u64 = 42;

#[derive(Parser)]
#[command(name = "nexusquant")]
#[command(author = "NexusQuant Team")]
#[command(version)]
#[command(about = "Multi-asset portfolio simulator driven by fused advisory signals", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding default.toml and environment overrides
    #[arg(short, long, default_value = "config", global = true)]
    pub config_dir: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replay market data through the portfolio engine
    Run(RunArgs),
    /// Load, validate and print the effective configuration
    CheckConfig,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Directory with one <ASSET>.csv per asset (overrides market.data_dir)
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Replay N synthetic random-walk bars instead of CSV data
    #[arg(long, value_name = "N")]
    pub synthetic: Option<usize>,

    /// Seed for synthetic data
    #[arg(long)]
    pub seed: Option<u64>,

    /// Disable the LLM analyst
    #[arg(long)]
    pub no_llm: bool,

    /// Stop after this many ticks
    #[arg(long)]
    pub max_ticks: Option<u64>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Apply command line overrides on top of loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.data_dir {
            config.market.data_dir = dir.clone();
        }
        if self.no_llm {
            config.advisor.llm.enabled = false;
        }
    }
}

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct RunRow {
    #[tabled(rename = "Run")]
    pub run_id: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Ticks")]
    pub ticks: u64,
    #[tabled(rename = "Orders")]
    pub orders: usize,
    #[tabled(rename = "Equity")]
    pub equity: String,
    #[tabled(rename = "Cash")]
    pub cash: String,
    #[tabled(rename = "Return")]
    pub total_return: String,
    #[tabled(rename = "Worst DD")]
    pub worst_drawdown: String,
}

#[derive(Debug, Clone, Serialize, Tabled)]
pub struct PositionRow {
    #[tabled(rename = "Asset")]
    pub asset: String,
    #[tabled(rename = "Quantity")]
    pub quantity: String,
    #[tabled(rename = "Price")]
    pub price: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Weight")]
    pub weight: String,
    #[tabled(rename = "Sentiment")]
    pub sentiment: String,
}

pub fn run_row(summary: &RunSummary) -> RunRow {
    let snap = summary.final_snapshot.as_ref();
    RunRow {
        run_id: summary.run_id.clone(),
        status: summary.status.to_string(),
        ticks: summary.ticks,
        orders: summary.orders,
        equity: snap.map_or("-".to_string(), |s| format!("{:.2}", s.total_equity)),
        cash: snap.map_or("-".to_string(), |s| format!("{:.2}", s.balance)),
        total_return: summary
            .total_return()
            .map_or("-".to_string(), |r| format!("{:+.2}%", r * 100.0)),
        worst_drawdown: snap.map_or("-".to_string(), |s| format!("{:.2}%", s.worst_drawdown * 100.0)),
    }
}

/// One row per asset held or scored, sorted by asset
pub fn position_rows(summary: &RunSummary) -> Vec<PositionRow> {
    let Some(snap) = summary.final_snapshot.as_ref() else {
        return Vec::new();
    };

    let mut assets: Vec<&String> = snap.holdings.keys().collect();
    assets.sort();

    assets
        .into_iter()
        .map(|asset| {
            let quantity = snap.holdings.get(asset).copied().unwrap_or(0.0);
            let price = summary.prices.get(asset).copied().unwrap_or(0.0);
            let value = quantity * price;
            let weight = if snap.total_equity > 0.0 {
                value / snap.total_equity
            } else {
                0.0
            };
            PositionRow {
                asset: asset.clone(),
                quantity: format!("{:.6}", quantity),
                price: format!("{:.2}", price),
                value: format!("{:.2}", value),
                weight: format!("{:.2}%", weight * 100.0),
                sentiment: format!("{:+.3}", summary.scores.get(asset).copied().unwrap_or(0.0)),
            }
        })
        .collect()
}

/// Print the end-of-run summary in the chosen mode.
pub fn print_summary(summary: &RunSummary, mode: OutputMode) -> anyhow::Result<()> {
    let run = run_row(summary);
    let positions = position_rows(summary);

    match mode {
        OutputMode::Table => {
            println!("{}", Table::new([run]));
            if positions.is_empty() {
                println!("(no positions)");
            } else {
                println!("{}", Table::new(&positions));
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(&serde_json::json!({
                "run": run,
                "positions": positions,
            }))?;
            println!("{json}");
        }
    }
    Ok(())
}
