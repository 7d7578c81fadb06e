use crate::bucket::classifier::BucketKey;

pub const CSV_HEADERS: [&str; 6] = [
    "timestamp",
    "buy_qty",
    "sell_qty",
    "buy_pct_change",
    "sell_pct_change",
    "price_pct_change",
];

/// One finalized bucket. Immutable once emitted.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub key: BucketKey,
    pub timestamp: String,
    pub buy_qty: f64,
    pub sell_qty: f64,
    pub buy_pct_change: f64,
    pub sell_pct_change: f64,
    pub price_pct_change: f64,
}

impl SummaryRow {
    pub fn csv_headers() -> [&'static str; 6] {
        CSV_HEADERS
    }

    /// Quantities keep their full decimal text; percent columns are fixed at
    /// two places.
    pub fn to_csv_record(&self) -> [String; 6] {
        [
            self.timestamp.clone(),
            self.buy_qty.to_string(),
            self.sell_qty.to_string(),
            format!("{:.2}", self.buy_pct_change),
            format!("{:.2}", self.sell_pct_change),
            format!("{:.2}", self.price_pct_change),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_record_formats_percent_columns() {
        let row = SummaryRow {
            key: BucketKey(0),
            timestamp: "1970-01-01 00:00:00".to_string(),
            buy_qty: 2.5,
            sell_qty: 0.0,
            buy_pct_change: 150.0,
            sell_pct_change: -33.33,
            price_pct_change: 0.0,
        };
        assert_eq!(
            row.to_csv_record(),
            [
                "1970-01-01 00:00:00".to_string(),
                "2.5".to_string(),
                "0".to_string(),
                "150.00".to_string(),
                "-33.33".to_string(),
                "0.00".to_string(),
            ]
        );
    }
}
