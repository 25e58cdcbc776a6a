//! Market replay
//!
//! A [`MarketSource`] yields one portfolio-wide [`MarketTick`] at a time and
//! exposes the close history seen so far, with no lookahead past the current
//! bar. [`MarketReplay`] is the in-memory implementation backing CSV files and
//! synthetic random walks.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{info, warn};

use crate::domain::{MarketBar, MarketTick};
use crate::error::{NexusError, Result};

/// Ordered, finite source of portfolio-wide ticks
pub trait MarketSource: Send + Sync {
    /// Asset universe, in replay order
    fn assets(&self) -> &[String];

    /// Advance one bar; `None` once the series is exhausted
    fn next_tick(&mut self) -> Option<MarketTick>;

    /// Closes up to and including the current bar
    fn history(&self, asset: &str) -> &[f64];
}

/// Pre-loaded replay over aligned per-asset series
#[derive(Debug, Clone)]
pub struct MarketReplay {
    assets: Vec<String>,
    bars: HashMap<String, Vec<MarketBar>>,
    closes: HashMap<String, Vec<f64>>,
    cursor: usize,
    len: usize,
}

impl MarketReplay {
    /// Build a replay from raw series. Every series is truncated to the
    /// shortest one so that all assets share one timeline.
    pub fn new(assets: Vec<String>, mut series: HashMap<String, Vec<MarketBar>>) -> Result<Self> {
        if assets.is_empty() {
            return Err(NexusError::Validation("asset universe is empty".to_string()));
        }

        if let Some(missing) = assets.iter().find(|a| !series.contains_key(*a)) {
            return Err(NexusError::MarketDataUnavailable(format!(
                "no series for {}",
                missing
            )));
        }

        let len = assets.iter().map(|a| series[a].len()).min().unwrap_or(0);

        let mut bars = HashMap::with_capacity(assets.len());
        let mut closes = HashMap::with_capacity(assets.len());
        for asset in &assets {
            let mut s = series.remove(asset).unwrap_or_default();
            s.truncate(len);
            closes.insert(asset.clone(), s.iter().map(|b| b.price).collect());
            bars.insert(asset.clone(), s);
        }

        info!(assets = assets.len(), ticks = len, "market data synchronized");

        Ok(Self {
            assets,
            bars,
            closes,
            cursor: 0,
            len,
        })
    }

    /// Load `<dir>/<ASSET>.csv` for each asset.
    ///
    /// Expected format: timestamp,open,high,low,close,volume (with header)
    pub fn from_csv_dir<P: AsRef<Path>>(dir: P, assets: &[String]) -> Result<Self> {
        let dir = dir.as_ref();
        let mut series = HashMap::with_capacity(assets.len());
        for asset in assets {
            let path = dir.join(format!("{}.csv", asset));
            let bars = load_bars_from_csv(&path, asset)?;
            if bars.is_empty() {
                return Err(NexusError::MarketDataUnavailable(format!(
                    "{} has no usable rows",
                    path.display()
                )));
            }
            series.insert(asset.clone(), bars);
        }
        Self::new(assets.to_vec(), series)
    }

    /// Seeded geometric random walk, 5-minute bars
    pub fn synthetic(assets: &[String], ticks: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = Utc
            .timestamp_opt(1_704_067_200, 0)
            .single()
            .unwrap_or_else(Utc::now);

        let mut series = HashMap::with_capacity(assets.len());
        for asset in assets {
            let mut price: f64 = rng.gen_range(20.0..500.0);
            let vol: f64 = rng.gen_range(0.004..0.03);
            let drift: f64 = rng.gen_range(-0.0005..0.0005);

            let bars = (0..ticks)
                .map(|i| {
                    if i > 0 {
                        price *= (drift + vol * standard_normal(&mut rng)).exp();
                    }
                    let volume = rng.gen_range(1_000.0..50_000.0);
                    MarketBar::new(asset.clone(), price, volume, start + Duration::minutes(5 * i as i64))
                })
                .collect();
            series.insert(asset.clone(), bars);
        }

        Self::new(assets.to_vec(), series)
    }

    /// Total number of ticks in the replay
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Ticks not yet emitted
    pub fn remaining(&self) -> usize {
        self.len - self.cursor
    }
}

impl MarketSource for MarketReplay {
    fn assets(&self) -> &[String] {
        &self.assets
    }

    fn next_tick(&mut self) -> Option<MarketTick> {
        if self.cursor >= self.len {
            return None;
        }

        let index = self.cursor;
        self.cursor += 1;

        let bars = self
            .assets
            .iter()
            .filter_map(|a| self.bars.get(a).and_then(|s| s.get(index)))
            .map(|bar| (bar.asset.clone(), bar.clone()))
            .collect();

        Some(MarketTick {
            tick_id: self.cursor as u64,
            bars,
        })
    }

    fn history(&self, asset: &str) -> &[f64] {
        self.closes
            .get(asset)
            .map(|c| &c[..self.cursor])
            .unwrap_or(&[])
    }
}

/// Box-Muller from two uniforms
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Load one asset's bars. Malformed rows are skipped; unparsable numbers
/// become NaN and are sanitized downstream.
pub fn load_bars_from_csv<P: AsRef<Path>>(path: P, asset: &str) -> Result<Vec<MarketBar>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        NexusError::MarketDataUnavailable(format!("{}: {}", path.display(), e))
    })?;
    let reader = BufReader::new(file);
    let mut bars = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        if i == 0 {
            continue; // Skip header
        }

        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split(',').map(str::trim).collect();

        if parts.len() < 6 {
            warn!(asset, line = i, "skipping malformed row: insufficient columns");
            continue;
        }

        let Some(timestamp) = parse_timestamp(parts[0]) else {
            warn!(asset, line = i, value = parts[0], "skipping row with invalid timestamp");
            continue;
        };

        let close = parts[4].parse::<f64>().unwrap_or(f64::NAN);
        let volume = parts[5].parse::<f64>().unwrap_or(0.0);

        bars.push(MarketBar::new(asset, close, volume, timestamp));
    }

    info!(asset, rows = bars.len(), "loaded market data");
    Ok(bars)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = s.parse::<i64>() {
        // Unix timestamp (seconds or milliseconds)
        return if ts > 1_000_000_000_000 {
            Utc.timestamp_millis_opt(ts).single()
        } else {
            Utc.timestamp_opt(ts, 0).single()
        };
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%z",
        "%Y-%m-%d %H:%M:%S%.f",
    ];
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    None
}
