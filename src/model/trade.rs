use crate::binance::types::BinanceTradeEvent;

/// A single executed trade as seen by the bucketing core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trade {
    pub timestamp_ms: i64,
    pub price: f64,
    pub qty: f64,
    pub is_sell: bool,
}

impl Trade {
    pub fn buy(timestamp_ms: i64, price: f64, qty: f64) -> Self {
        Self {
            timestamp_ms,
            price,
            qty,
            is_sell: false,
        }
    }

    pub fn sell(timestamp_ms: i64, price: f64, qty: f64) -> Self {
        Self {
            timestamp_ms,
            price,
            qty,
            is_sell: true,
        }
    }
}

impl From<&BinanceTradeEvent> for Trade {
    /// Buyer-maker trades are taker sells.
    fn from(event: &BinanceTradeEvent) -> Self {
        Self {
            timestamp_ms: i64::try_from(event.trade_time).unwrap_or(i64::MAX),
            price: event.price,
            qty: event.qty,
            is_sell: event.is_buyer_maker,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buyer_maker_maps_to_sell() {
        let event = BinanceTradeEvent {
            event_type: "trade".to_string(),
            event_time: 1_700_000_000_100,
            symbol: "BTCUSDT".to_string(),
            trade_id: 7,
            price: 42000.5,
            qty: 0.25,
            trade_time: 1_700_000_000_050,
            is_buyer_maker: true,
        };
        let trade = Trade::from(&event);
        assert!(trade.is_sell);
        assert_eq!(trade.timestamp_ms, 1_700_000_000_050);
        assert!((trade.price - 42000.5).abs() < f64::EPSILON);
        assert!((trade.qty - 0.25).abs() < f64::EPSILON);
    }
}
