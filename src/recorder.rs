use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;

use crate::bucket::{AggregatorConfig, BucketAggregator, Ingested};
use crate::error::AppError;
use crate::model::summary::SummaryRow;
use crate::model::trade::Trade;

/// What to do when the feed hands over a trade the classifier rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidTradePolicy {
    /// Stop the run and discard the partial series.
    #[default]
    FailFast,
    /// Log, count and keep going.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    InputClosed,
    Shutdown,
    DurationElapsed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub trades_ingested: u64,
    pub trades_skipped: u64,
    pub trades_late: u64,
    pub rows_emitted: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecorderOptions {
    pub run_duration: Option<Duration>,
    pub flush_pending_on_stop: bool,
    pub invalid_trade_policy: InvalidTradePolicy,
}

#[derive(Debug, Clone)]
pub struct RecordedSeries {
    pub rows: Vec<SummaryRow>,
    pub stats: RecorderStats,
    pub stop_reason: StopReason,
}

/// Single consumer of the trade feed. Every `ingest` goes through here, one
/// at a time, in arrival order.
#[derive(Debug)]
pub struct Recorder {
    aggregator: BucketAggregator,
    options: RecorderOptions,
    stats: RecorderStats,
}

impl Recorder {
    pub fn new(config: AggregatorConfig, options: RecorderOptions) -> Self {
        Self {
            aggregator: BucketAggregator::new(config),
            options,
            stats: RecorderStats::default(),
        }
    }

    /// Feed one trade through the aggregator, applying the invalid-trade policy.
    pub fn process(&mut self, trade: &Trade) -> Result<Option<SummaryRow>, AppError> {
        match self.aggregator.ingest(trade) {
            Ok(Ingested::Rolled(row)) => {
                self.stats.trades_ingested += 1;
                self.stats.rows_emitted += 1;
                Ok(Some(row))
            }
            Ok(Ingested::Opened(_)) | Ok(Ingested::Accumulated(_)) => {
                self.stats.trades_ingested += 1;
                Ok(None)
            }
            Ok(Ingested::Late { .. }) => {
                self.stats.trades_late += 1;
                Ok(None)
            }
            Err(e) => match self.options.invalid_trade_policy {
                InvalidTradePolicy::FailFast => {
                    tracing::error!(error = %e, "Invalid trade, aborting run");
                    Err(e.into())
                }
                InvalidTradePolicy::Skip => {
                    tracing::warn!(error = %e, "Invalid trade skipped");
                    self.stats.trades_skipped += 1;
                    Ok(None)
                }
            },
        }
    }

    /// Consume trades until the feed closes, shutdown flips, or the run
    /// duration elapses. A dropped shutdown sender counts as shutdown.
    pub async fn run(
        mut self,
        mut trades: mpsc::Receiver<Trade>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<RecordedSeries, AppError> {
        let deadline = self.options.run_duration.map(|d| Instant::now() + d);

        let stop_reason = loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break StopReason::Shutdown;
                    }
                }
                _ = wait_until(deadline) => {
                    break StopReason::DurationElapsed;
                }
                trade = trades.recv() => {
                    match trade {
                        Some(trade) => {
                            if let Some(row) = self.process(&trade)? {
                                tracing::info!(
                                    timestamp = %row.timestamp,
                                    buy_qty = row.buy_qty,
                                    sell_qty = row.sell_qty,
                                    price_pct_change = row.price_pct_change,
                                    "Bucket recorded"
                                );
                            }
                        }
                        None => break StopReason::InputClosed,
                    }
                }
            }
        };

        Ok(self.finish(stop_reason))
    }

    /// Apply the stop-time flush policy and return the series.
    pub fn finish(mut self, stop_reason: StopReason) -> RecordedSeries {
        if self.options.flush_pending_on_stop {
            if self.aggregator.flush_pending().is_some() {
                self.stats.rows_emitted += 1;
            }
        } else if let Some(pending) = self.aggregator.pending() {
            tracing::info!(
                key = %pending.key,
                trades = pending.trade_count,
                "Open bucket dropped at stop"
            );
        }

        tracing::info!(
            reason = ?stop_reason,
            trades = self.stats.trades_ingested,
            skipped = self.stats.trades_skipped,
            late = self.stats.trades_late,
            rows = self.stats.rows_emitted,
            "Recorder stopped"
        );

        RecordedSeries {
            rows: self.aggregator.into_rows(),
            stats: self.stats,
            stop_reason,
        }
    }

    pub fn aggregator(&self) -> &BucketAggregator {
        &self.aggregator
    }

    pub fn stats(&self) -> &RecorderStats {
        &self.stats
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
