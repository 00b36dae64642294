//! PostgreSQL repository over a small pool of tokio-postgres clients.

use crate::db::{check_plan, Repository};
use crate::error::RepositoryError;
use crate::models::{
    Action, ApplyCounts, CompositeSignal, IndicatorFrame, Interval, PriceBar, SeriesInfo,
    SignalEvent, UpdatePlan,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, info};

/// Table names for one interval, e.g. `price_bars_1d`.
#[derive(Debug, Clone)]
struct Tables {
    bars: String,
    indicators: String,
    composites: String,
}

impl Tables {
    fn for_interval(interval: Interval) -> Self {
        let suffix = interval.code();
        Self {
            bars: format!("price_bars_{}", suffix),
            indicators: format!("indicators_{}", suffix),
            composites: format!("composite_signals_{}", suffix),
        }
    }
}

pub struct PostgresRepository {
    clients: Vec<Mutex<Client>>,
    next: AtomicUsize,
    tables: Tables,
}

impl PostgresRepository {
    /// Open `pool_size` connections and create the interval's tables if missing.
    pub async fn connect(
        database_url: &str,
        pool_size: usize,
        interval: Interval,
    ) -> Result<Self, RepositoryError> {
        let mut clients = Vec::with_capacity(pool_size.max(1));
        for slot in 0..pool_size.max(1) {
            let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!(error = %e, slot = slot, "postgres connection error");
                }
            });
            clients.push(Mutex::new(client));
        }

        let repo = Self {
            clients,
            next: AtomicUsize::new(0),
            tables: Tables::for_interval(interval),
        };
        repo.init_schema().await?;
        info!(
            pool_size = repo.clients.len(),
            interval = %interval,
            "postgres repository ready"
        );
        Ok(repo)
    }

    fn slot(&self) -> &Mutex<Client> {
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.clients.len();
        &self.clients[index]
    }

    async fn init_schema(&self) -> Result<(), RepositoryError> {
        let client = self.slot().lock().await;
        let t = &self.tables;
        client
            .batch_execute(&format!(
                "CREATE TABLE IF NOT EXISTS {bars} (
                    symbol TEXT NOT NULL,
                    ts TIMESTAMPTZ NOT NULL,
                    open DOUBLE PRECISION NOT NULL,
                    high DOUBLE PRECISION NOT NULL,
                    low DOUBLE PRECISION NOT NULL,
                    close DOUBLE PRECISION NOT NULL,
                    volume BIGINT NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    PRIMARY KEY (symbol, ts)
                );
                CREATE TABLE IF NOT EXISTS {indicators} (
                    symbol TEXT NOT NULL,
                    ts TIMESTAMPTZ NOT NULL,
                    vals JSONB NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    PRIMARY KEY (symbol, ts)
                );
                CREATE TABLE IF NOT EXISTS {composites} (
                    symbol TEXT NOT NULL,
                    ts TIMESTAMPTZ NOT NULL,
                    score DOUBLE PRECISION NOT NULL,
                    action TEXT NOT NULL,
                    events JSONB NOT NULL,
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                    PRIMARY KEY (symbol, ts)
                );",
                bars = t.bars,
                indicators = t.indicators,
                composites = t.composites,
            ))
            .await?;
        Ok(())
    }

    /// Round-trip check for health reporting.
    pub async fn ping(&self) -> bool {
        let client = self.slot().lock().await;
        client.simple_query("SELECT 1").await.is_ok()
    }

    fn upsert_bar_sql(&self) -> String {
        format!(
            "INSERT INTO {} (symbol, ts, open, high, low, close, volume)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (symbol, ts) DO UPDATE SET
                open = EXCLUDED.open, high = EXCLUDED.high, low = EXCLUDED.low,
                close = EXCLUDED.close, volume = EXCLUDED.volume, updated_at = now()",
            self.tables.bars
        )
    }

    fn bar_from_row(&self, row: &Row) -> Result<PriceBar, RepositoryError> {
        let volume: i64 = row.try_get("volume")?;
        Ok(PriceBar {
            symbol: row.try_get("symbol")?,
            timestamp: row.try_get("ts")?,
            open: row.try_get("open")?,
            high: row.try_get("high")?,
            low: row.try_get("low")?,
            close: row.try_get("close")?,
            volume: u64::try_from(volume).map_err(|_| RepositoryError::CorruptRow {
                table: self.tables.bars.clone(),
                reason: format!("negative volume {}", volume),
            })?,
        })
    }

    fn composite_from_row(&self, row: &Row) -> Result<CompositeSignal, RepositoryError> {
        let action: String = row.try_get("action")?;
        let events: Value = row.try_get("events")?;
        Ok(CompositeSignal {
            symbol: row.try_get("symbol")?,
            timestamp: row.try_get("ts")?,
            score: row.try_get("score")?,
            action: Action::parse(&action).ok_or_else(|| RepositoryError::CorruptRow {
                table: self.tables.composites.clone(),
                reason: format!("unknown action '{}'", action),
            })?,
            contributing_events: serde_json::from_value::<Vec<SignalEvent>>(events).map_err(
                |source| RepositoryError::Serialization {
                    what: "signal events",
                    source,
                },
            )?,
        })
    }
}

fn volume_param(bar: &PriceBar) -> Result<i64, RepositoryError> {
    i64::try_from(bar.volume).map_err(|_| RepositoryError::InvalidPlan {
        symbol: bar.symbol.clone(),
        reason: format!("volume {} exceeds BIGINT", bar.volume),
    })
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn series_info(&self, symbol: &str) -> Result<Option<SeriesInfo>, RepositoryError> {
        let client = self.slot().lock().await;
        let row = client
            .query_one(
                &format!(
                    "SELECT MIN(ts) AS earliest, MAX(ts) AS latest, COUNT(*) AS count
                     FROM {} WHERE symbol = $1",
                    self.tables.bars
                ),
                &[&symbol],
            )
            .await?;
        let earliest: Option<DateTime<Utc>> = row.try_get("earliest")?;
        let latest: Option<DateTime<Utc>> = row.try_get("latest")?;
        let count: i64 = row.try_get("count")?;
        Ok(match (earliest, latest) {
            (Some(earliest), Some(latest)) => Some(SeriesInfo {
                symbol: symbol.to_string(),
                earliest,
                latest,
                count: count as usize,
            }),
            _ => None,
        })
    }

    async fn read_window(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>, RepositoryError> {
        let client = self.slot().lock().await;
        let rows = client
            .query(
                &format!(
                    "SELECT symbol, ts, open, high, low, close, volume FROM {}
                     WHERE symbol = $1 AND ts >= $2 AND ts <= $3 ORDER BY ts",
                    self.tables.bars
                ),
                &[&symbol, &start, &end],
            )
            .await?;
        rows.iter().map(|row| self.bar_from_row(row)).collect()
    }

    async fn read_latest(&self, symbol: &str, limit: usize) -> Result<Vec<PriceBar>, RepositoryError> {
        let client = self.slot().lock().await;
        let rows = client
            .query(
                &format!(
                    "SELECT * FROM (
                        SELECT symbol, ts, open, high, low, close, volume FROM {}
                        WHERE symbol = $1 ORDER BY ts DESC LIMIT $2
                     ) latest ORDER BY ts",
                    self.tables.bars
                ),
                &[&symbol, &(limit as i64)],
            )
            .await?;
        rows.iter().map(|row| self.bar_from_row(row)).collect()
    }

    async fn apply_plan(&self, plan: &UpdatePlan) -> Result<ApplyCounts, RepositoryError> {
        check_plan(plan)?;
        if plan.is_empty() {
            return Ok(ApplyCounts::default());
        }

        let mut client = self.slot().lock().await;
        let tx = client.transaction().await?;
        let statement = tx.prepare(&self.upsert_bar_sql()).await?;
        let rows = plan
            .to_insert
            .iter()
            .chain(plan.to_update.iter().map(|(_, bar)| bar));
        for bar in rows {
            let volume = volume_param(bar)?;
            tx.execute(
                &statement,
                &[
                    &bar.symbol,
                    &bar.timestamp,
                    &bar.open,
                    &bar.high,
                    &bar.low,
                    &bar.close,
                    &volume,
                ],
            )
            .await?;
        }
        tx.commit().await?;

        Ok(ApplyCounts {
            inserted: plan.to_insert.len(),
            updated: plan.to_update.len(),
        })
    }

    async fn write_indicators(&self, symbol: &str, frame: &IndicatorFrame) -> Result<usize, RepositoryError> {
        let rows = frame.rows();
        if rows.is_empty() {
            return Ok(0);
        }
        let mut client = self.slot().lock().await;
        let tx = client.transaction().await?;
        let statement = tx
            .prepare(&format!(
                "INSERT INTO {} (symbol, ts, vals) VALUES ($1, $2, $3)
                 ON CONFLICT (symbol, ts) DO UPDATE SET vals = EXCLUDED.vals, updated_at = now()",
                self.tables.indicators
            ))
            .await?;
        for (ts, values) in &rows {
            let vals = serde_json::to_value(values).map_err(|source| RepositoryError::Serialization {
                what: "indicator row",
                source,
            })?;
            tx.execute(&statement, &[&symbol, ts, &vals]).await?;
        }
        tx.commit().await?;
        Ok(rows.len())
    }

    async fn write_composite(&self, signal: &CompositeSignal) -> Result<(), RepositoryError> {
        self.write_composites(std::slice::from_ref(signal)).await.map(|_| ())
    }

    async fn write_composites(&self, signals: &[CompositeSignal]) -> Result<usize, RepositoryError> {
        if signals.is_empty() {
            return Ok(0);
        }
        let mut client = self.slot().lock().await;
        let tx = client.transaction().await?;
        let statement = tx
            .prepare(&format!(
                "INSERT INTO {} (symbol, ts, score, action, events) VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (symbol, ts) DO UPDATE SET
                    score = EXCLUDED.score, action = EXCLUDED.action,
                    events = EXCLUDED.events, updated_at = now()",
                self.tables.composites
            ))
            .await?;
        for signal in signals {
            let events = serde_json::to_value(&signal.contributing_events).map_err(|source| {
                RepositoryError::Serialization {
                    what: "signal events",
                    source,
                }
            })?;
            tx.execute(
                &statement,
                &[
                    &signal.symbol,
                    &signal.timestamp,
                    &signal.score,
                    &signal.action.as_str(),
                    &events,
                ],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(signals.len())
    }

    async fn latest_composites(
        &self,
        symbol: Option<&str>,
        limit: usize,
    ) -> Result<Vec<CompositeSignal>, RepositoryError> {
        let client = self.slot().lock().await;
        let limit = limit as i64;
        let rows = match symbol {
            Some(symbol) => {
                client
                    .query(
                        &format!(
                            "SELECT symbol, ts, score, action, events FROM {}
                             WHERE symbol = $1 ORDER BY ts DESC LIMIT $2",
                            self.tables.composites
                        ),
                        &[&symbol, &limit],
                    )
                    .await?
            }
            None => {
                client
                    .query(
                        &format!(
                            "SELECT DISTINCT ON (symbol) symbol, ts, score, action, events FROM {}
                             ORDER BY symbol, ts DESC LIMIT $1",
                            self.tables.composites
                        ),
                        &[&limit],
                    )
                    .await?
            }
        };
        rows.iter().map(|row| self.composite_from_row(row)).collect()
    }
}
