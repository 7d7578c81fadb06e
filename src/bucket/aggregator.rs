use chrono::{DateTime, Local, Utc};
use serde::Deserialize;

use super::classifier::{classify, BucketAccumulator, BucketKey, BucketWidth};
use crate::error::InvalidTradeError;
use crate::model::summary::SummaryRow;
use crate::model::trade::Trade;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which instant a row's `timestamp` column names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampLabel {
    /// The key itself read as epoch seconds.
    #[default]
    RawKey,
    /// Start of the bucket: `key * width`.
    BucketStart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampZone {
    #[default]
    Utc,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregatorConfig {
    pub width: BucketWidth,
    pub label: TimestampLabel,
    pub zone: TimestampZone,
}

impl AggregatorConfig {
    pub fn with_width(width: BucketWidth) -> Self {
        Self {
            width,
            ..Self::default()
        }
    }
}

/// Raw totals of the most recently finalized bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PriorTotals {
    pub buy_qty: f64,
    pub sell_qty: f64,
    pub price: f64,
}

/// What a single `ingest` call did.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingested {
    /// First trade since construction or the last flush.
    Opened(BucketKey),
    Accumulated(BucketKey),
    /// The previous bucket closed; the trade opened the next one.
    Rolled(SummaryRow),
    /// The trade is older than the active bucket and was not applied.
    Late { key: BucketKey },
}

#[derive(Debug)]
enum BucketState {
    NoBucket,
    Tracking(BucketAccumulator),
}

/// Groups trades into fixed-width buckets and emits one summary row each time
/// the active bucket is left behind.
///
/// The bucket that is open when input stops is never emitted on its own;
/// call [`BucketAggregator::flush_pending`] to close it explicitly.
#[derive(Debug)]
pub struct BucketAggregator {
    config: AggregatorConfig,
    state: BucketState,
    prior: PriorTotals,
    last_finalized: Option<BucketKey>,
    rows: Vec<SummaryRow>,
}

impl BucketAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self {
            config,
            state: BucketState::NoBucket,
            prior: PriorTotals::default(),
            last_finalized: None,
            rows: Vec::new(),
        }
    }

    pub fn ingest(&mut self, trade: &Trade) -> Result<Ingested, InvalidTradeError> {
        let key = classify(trade, self.config.width)?;

        if self.last_finalized.is_some_and(|done| key <= done) {
            tracing::debug!(key = %key, "Late trade for finalized bucket ignored");
            return Ok(Ingested::Late { key });
        }

        let (state, outcome) = match std::mem::replace(&mut self.state, BucketState::NoBucket) {
            BucketState::NoBucket => {
                let mut acc = BucketAccumulator::new(key);
                acc.accumulate(trade);
                (BucketState::Tracking(acc), Ingested::Opened(key))
            }
            BucketState::Tracking(mut acc) if acc.key == key => {
                acc.accumulate(trade);
                (BucketState::Tracking(acc), Ingested::Accumulated(key))
            }
            BucketState::Tracking(acc) if key < acc.key => {
                // Only the current bucket is resident; anything older is closed.
                tracing::debug!(key = %key, current = %acc.key, "Late trade for finalized bucket ignored");
                (BucketState::Tracking(acc), Ingested::Late { key })
            }
            BucketState::Tracking(acc) => {
                let row = self.finalize(acc);
                let mut next = BucketAccumulator::new(key);
                next.accumulate(trade);
                (BucketState::Tracking(next), Ingested::Rolled(row))
            }
        };
        self.state = state;
        Ok(outcome)
    }

    /// Close the open bucket now, if any.
    pub fn flush_pending(&mut self) -> Option<SummaryRow> {
        match std::mem::replace(&mut self.state, BucketState::NoBucket) {
            BucketState::Tracking(acc) => Some(self.finalize(acc)),
            BucketState::NoBucket => None,
        }
    }

    fn finalize(&mut self, acc: BucketAccumulator) -> SummaryRow {
        let row = SummaryRow {
            key: acc.key,
            timestamp: self.format_timestamp(acc.key),
            buy_qty: acc.buy_qty,
            sell_qty: acc.sell_qty,
            buy_pct_change: round2(pct_change(acc.buy_qty, self.prior.buy_qty)),
            sell_pct_change: round2(pct_change(acc.sell_qty, self.prior.sell_qty)),
            price_pct_change: round2(pct_change(acc.last_price, self.prior.price)),
        };

        tracing::debug!(
            key = %acc.key,
            timestamp = %row.timestamp,
            trades = acc.trade_count,
            buy_qty = acc.buy_qty,
            sell_qty = acc.sell_qty,
            "Bucket finalized"
        );

        self.prior = PriorTotals {
            buy_qty: acc.buy_qty,
            sell_qty: acc.sell_qty,
            price: acc.last_price,
        };
        self.last_finalized = Some(acc.key);
        self.rows.push(row.clone());
        row
    }

    fn format_timestamp(&self, key: BucketKey) -> String {
        let utc = match self.config.label {
            TimestampLabel::BucketStart => {
                DateTime::<Utc>::from_timestamp_millis(key.start_ms(self.config.width))
            }
            TimestampLabel::RawKey => DateTime::<Utc>::from_timestamp(key.0, 0),
        };
        match (utc, self.config.zone) {
            (Some(ts), TimestampZone::Utc) => ts.format(TIMESTAMP_FORMAT).to_string(),
            (Some(ts), TimestampZone::Local) => ts
                .with_timezone(&Local)
                .format(TIMESTAMP_FORMAT)
                .to_string(),
            (None, _) => key.to_string(),
        }
    }

    pub fn current_key(&self) -> Option<BucketKey> {
        match &self.state {
            BucketState::Tracking(acc) => Some(acc.key),
            BucketState::NoBucket => None,
        }
    }

    pub fn pending(&self) -> Option<&BucketAccumulator> {
        match &self.state {
            BucketState::Tracking(acc) => Some(acc),
            BucketState::NoBucket => None,
        }
    }

    pub fn prior_totals(&self) -> PriorTotals {
        self.prior
    }

    pub fn width(&self) -> BucketWidth {
        self.config.width
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<SummaryRow> {
        self.rows
    }
}

/// Percent change from `prior` to `current`; a zero prior yields 0.
pub fn pct_change(current: f64, prior: f64) -> f64 {
    if prior > 0.0 {
        (current - prior) / prior * 100.0
    } else {
        0.0
    }
}

/// Round to two decimals, halves away from zero. Never returns `-0.0`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0 + 0.0
}
