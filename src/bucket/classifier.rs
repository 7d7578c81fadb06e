use std::fmt;

use crate::error::InvalidTradeError;
use crate::model::trade::Trade;

/// Fixed bucket width in milliseconds. Always in `1..=MAX_MILLIS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketWidth(u64);

impl BucketWidth {
    /// Widths must stay positive once used as an `i64` divisor.
    pub const MAX_MILLIS: u64 = i64::MAX as u64;

    pub fn from_millis(ms: u64) -> Self {
        assert!(ms > 0, "bucket width must be > 0");
        assert!(
            ms <= Self::MAX_MILLIS,
            "bucket width must not exceed i64::MAX ms"
        );
        Self(ms)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl Default for BucketWidth {
    fn default() -> Self {
        Self(60_000)
    }
}

/// Index of a bucket: `timestamp_ms / width_ms`, truncated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BucketKey(pub i64);

impl BucketKey {
    /// Epoch milliseconds at which this bucket starts.
    pub fn start_ms(&self, width: BucketWidth) -> i64 {
        self.0.saturating_mul(width.as_millis() as i64)
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn validate(trade: &Trade) -> Result<(), InvalidTradeError> {
    if trade.timestamp_ms < 0 {
        return Err(InvalidTradeError::NegativeTimestamp(trade.timestamp_ms));
    }
    if !trade.price.is_finite() || trade.price < 0.0 {
        return Err(InvalidTradeError::Price(trade.price));
    }
    if !trade.qty.is_finite() || trade.qty < 0.0 {
        return Err(InvalidTradeError::Quantity(trade.qty));
    }
    Ok(())
}

/// Map a trade to its bucket. Pure; only the timestamp decides the key.
pub fn classify(trade: &Trade, width: BucketWidth) -> Result<BucketKey, InvalidTradeError> {
    validate(trade)?;
    Ok(BucketKey(trade.timestamp_ms / width.as_millis() as i64))
}

/// Running totals for one bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketAccumulator {
    pub key: BucketKey,
    pub buy_qty: f64,
    pub sell_qty: f64,
    pub last_price: f64,
    pub trade_count: u64,
}

impl BucketAccumulator {
    pub fn new(key: BucketKey) -> Self {
        Self {
            key,
            buy_qty: 0.0,
            sell_qty: 0.0,
            last_price: 0.0,
            trade_count: 0,
        }
    }

    /// Add the trade's quantity to its side. Price is last-write-wins.
    pub fn accumulate(&mut self, trade: &Trade) {
        if trade.is_sell {
            self.sell_qty += trade.qty;
        } else {
            self.buy_qty += trade.qty;
        }
        self.last_price = trade.price;
        self.trade_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_truncation() {
        let width = BucketWidth::from_millis(60_000);
        let t = Trade::buy(1_700_000_059_999, 100.0, 1.0);
        assert_eq!(classify(&t, width).unwrap(), BucketKey(28_333_334));
        let t = Trade::buy(1_700_000_040_000, 100.0, 1.0);
        assert_eq!(classify(&t, width).unwrap(), BucketKey(28_333_334));
        let t = Trade::buy(1_700_000_100_000, 100.0, 1.0);
        assert_eq!(classify(&t, width).unwrap(), BucketKey(28_333_335));
    }

    #[test]
    fn bucket_start_ms() {
        let width = BucketWidth::from_millis(60_000);
        assert_eq!(BucketKey(2).start_ms(width), 120_000);
    }

    #[test]
    fn rejects_non_finite_price() {
        let width = BucketWidth::default();
        let t = Trade::buy(0, f64::NAN, 1.0);
        assert!(matches!(
            classify(&t, width),
            Err(InvalidTradeError::Price(_))
        ));
        let t = Trade::sell(0, 1.0, f64::INFINITY);
        assert!(matches!(
            classify(&t, width),
            Err(InvalidTradeError::Quantity(_))
        ));
    }

    #[test]
    fn zero_values_are_valid() {
        let t = Trade::buy(0, 0.0, 0.0);
        assert_eq!(classify(&t, BucketWidth::default()).unwrap(), BucketKey(0));
    }

    #[test]
    fn max_width_keeps_keys_non_negative() {
        let width = BucketWidth::from_millis(BucketWidth::MAX_MILLIS);
        let t = Trade::buy(1_700_000_000_000, 1.0, 1.0);
        assert_eq!(classify(&t, width).unwrap(), BucketKey(0));
    }

    #[test]
    #[should_panic(expected = "bucket width must not exceed i64::MAX ms")]
    fn rejects_width_beyond_i64() {
        let _ = BucketWidth::from_millis(u64::MAX);
    }

    #[test]
    #[should_panic(expected = "bucket width must be > 0")]
    fn rejects_zero_width() {
        let _ = BucketWidth::from_millis(0);
    }
}
