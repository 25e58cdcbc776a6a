//! PostgreSQL run recorder

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use tracing::{debug, info};

use super::RunRecorder;
use crate::domain::{RunRecord, RunStatus, TickReport};
use crate::error::Result;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS simulation_runs (
        id TEXT PRIMARY KEY,
        project TEXT NOT NULL,
        version TEXT NOT NULL,
        started_at TIMESTAMPTZ NOT NULL,
        finished_at TIMESTAMPTZ,
        status TEXT NOT NULL,
        config_snapshot JSONB NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS market_data (
        id BIGSERIAL PRIMARY KEY,
        run_id TEXT NOT NULL REFERENCES simulation_runs(id),
        tick_id BIGINT NOT NULL,
        asset TEXT NOT NULL,
        price DOUBLE PRECISION NOT NULL,
        volume DOUBLE PRECISION NOT NULL,
        bar_time TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS advice (
        id BIGSERIAL PRIMARY KEY,
        run_id TEXT NOT NULL REFERENCES simulation_runs(id),
        tick_id BIGINT NOT NULL,
        asset TEXT NOT NULL,
        advisor TEXT NOT NULL,
        kind TEXT NOT NULL,
        outlook TEXT NOT NULL,
        confidence DOUBLE PRECISION NOT NULL,
        rationale TEXT NOT NULL,
        raw_response JSONB NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS portfolio_states (
        id BIGSERIAL PRIMARY KEY,
        run_id TEXT NOT NULL REFERENCES simulation_runs(id),
        tick_id BIGINT NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL,
        balance DOUBLE PRECISION NOT NULL,
        holdings JSONB NOT NULL,
        total_equity DOUBLE PRECISION NOT NULL,
        peak_equity DOUBLE PRECISION NOT NULL,
        max_drawdown DOUBLE PRECISION NOT NULL,
        worst_drawdown DOUBLE PRECISION NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS orders (
        id BIGSERIAL PRIMARY KEY,
        run_id TEXT NOT NULL REFERENCES simulation_runs(id),
        tick_id BIGINT NOT NULL,
        asset TEXT NOT NULL,
        side TEXT NOT NULL,
        quantity DOUBLE PRECISION NOT NULL,
        filled_price DOUBLE PRECISION NOT NULL,
        status TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_portfolio_states_run_tick ON portfolio_states (run_id, tick_id)",
    "CREATE INDEX IF NOT EXISTS idx_advice_run_tick ON advice (run_id, tick_id)",
];

pub struct PostgresRecorder {
    pool: PgPool,
}

impl PostgresRecorder {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect a pool
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, "connected to database");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables if missing
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(*statement).execute(&self.pool).await?;
        }
        debug!("schema ready");
        Ok(())
    }
}

#[async_trait]
impl RunRecorder for PostgresRecorder {
    async fn start_run(&self, run: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO simulation_runs (id, project, version, started_at, status, config_snapshot)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status
            "#,
        )
        .bind(&run.run_id)
        .bind(&run.project)
        .bind(&run.version)
        .bind(run.started_at)
        .bind(run.status.as_str())
        .bind(&run.config_snapshot)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_tick(&self, report: &TickReport) -> Result<()> {
        let tick_id = report.tick_id as i64;
        let mut tx = self.pool.begin().await?;

        for bar in report.bars.values() {
            sqlx::query(
                r#"
                INSERT INTO market_data (run_id, tick_id, asset, price, volume, bar_time)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(&report.run_id)
            .bind(tick_id)
            .bind(&bar.asset)
            .bind(bar.price)
            .bind(bar.volume)
            .bind(bar.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        for advice in &report.advice {
            sqlx::query(
                r#"
                INSERT INTO advice (
                    run_id, tick_id, asset, advisor, kind, outlook, confidence,
                    rationale, raw_response, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(&advice.run_id)
            .bind(tick_id)
            .bind(&advice.asset)
            .bind(&advice.advisor)
            .bind(advice.kind.as_str())
            .bind(advice.outlook.as_str())
            .bind(advice.confidence)
            .bind(&advice.rationale)
            .bind(&advice.raw)
            .bind(advice.created_at)
            .execute(&mut *tx)
            .await?;
        }

        for order in &report.orders {
            sqlx::query(
                r#"
                INSERT INTO orders (
                    run_id, tick_id, asset, side, quantity, filled_price, status, created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(&order.run_id)
            .bind(tick_id)
            .bind(&order.asset)
            .bind(order.side.as_str())
            .bind(order.quantity)
            .bind(order.fill_price)
            .bind(order.status.as_str())
            .bind(order.created_at)
            .execute(&mut *tx)
            .await?;
        }

        let snapshot = &report.snapshot;
        sqlx::query(
            r#"
            INSERT INTO portfolio_states (
                run_id, tick_id, recorded_at, balance, holdings, total_equity,
                peak_equity, max_drawdown, worst_drawdown
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&snapshot.run_id)
        .bind(tick_id)
        .bind(snapshot.timestamp)
        .bind(snapshot.balance)
        .bind(Json(&snapshot.holdings))
        .bind(snapshot.total_equity)
        .bind(snapshot.peak_equity)
        .bind(snapshot.max_drawdown)
        .bind(snapshot.worst_drawdown)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            tick_id,
            advice = report.advice.len(),
            orders = report.orders.len(),
            "tick recorded"
        );
        Ok(())
    }

    async fn finish_run(&self, run_id: &str, status: RunStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE simulation_runs
            SET status = $2, finished_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(run_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        info!(run_id, status = %status, "run finalized");
        Ok(())
    }
}
