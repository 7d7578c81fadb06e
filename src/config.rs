use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bucket::{AggregatorConfig, BucketWidth, TimestampLabel, TimestampZone};
use crate::recorder::InvalidTradePolicy;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
pub const CONFIG_PATH_ENV: &str = "TRADE_FLOW_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub binance: BinanceConfig,
    pub aggregator: AggregatorSection,
    pub recorder: RecorderConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceConfig {
    pub ws_base_url: String,
    pub symbol: String,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorSection {
    pub bucket_width: String,
    #[serde(default)]
    pub timestamp_label: TimestampLabel,
    #[serde(default)]
    pub timestamp_zone: TimestampZone,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecorderConfig {
    pub output_path: PathBuf,
    #[serde(default)]
    pub run_duration_secs: Option<u64>,
    #[serde(default)]
    pub flush_pending_on_stop: bool,
    #[serde(default)]
    pub invalid_trade_policy: InvalidTradePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

fn default_channel_capacity() -> usize {
    1024
}

/// Parse an interval string ("500ms", "1s", "1m", "1h", "1d", "1w", "1M") into milliseconds.
pub fn parse_interval_ms(s: &str) -> Result<u64> {
    if s.len() < 2 {
        bail!("invalid interval '{}': expected format like '1m'", s);
    }

    let (num_str, unit_ms) = if let Some(num) = s.strip_suffix("ms") {
        (num, 1)
    } else {
        let (num_str, suffix) = s.split_at(s.len() - 1);
        let unit_ms = match suffix {
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            "w" => 7 * 86_400_000,
            "M" => 30 * 86_400_000,
            _ => bail!(
                "invalid interval '{}': unsupported suffix '{}', expected one of ms/s/m/h/d/w/M",
                s,
                suffix
            ),
        };
        (num_str, unit_ms)
    };

    let n: u64 = num_str.parse().with_context(|| {
        format!(
            "invalid interval '{}': quantity must be a positive integer",
            s
        )
    })?;
    if n == 0 {
        bail!("invalid interval '{}': quantity must be > 0", s);
    }

    let ms = n
        .checked_mul(unit_ms)
        .with_context(|| format!("invalid interval '{}': value is too large", s))?;
    if ms > BucketWidth::MAX_MILLIS {
        bail!(
            "invalid interval '{}': must not exceed {}ms",
            s,
            BucketWidth::MAX_MILLIS
        );
    }
    Ok(ms)
}

impl BinanceConfig {
    pub fn trade_stream(&self) -> String {
        format!("{}@trade", self.symbol.trim().to_ascii_lowercase())
    }
}

impl AggregatorSection {
    pub fn bucket_width(&self) -> Result<BucketWidth> {
        parse_interval_ms(&self.bucket_width).map(BucketWidth::from_millis)
    }

    pub fn to_aggregator_config(&self) -> Result<AggregatorConfig> {
        Ok(AggregatorConfig {
            width: self.bucket_width()?,
            label: self.timestamp_label,
            zone: self.timestamp_zone,
        })
    }
}

impl RecorderConfig {
    pub fn run_duration(&self) -> Option<Duration> {
        self.run_duration_secs.map(Duration::from_secs)
    }
}

impl Config {
    /// Load from `$TRADE_FLOW_CONFIG`, falling back to `config/default.toml`.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("failed to parse {}", config_path.display()))
    }

    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("invalid TOML config")?;

        config
            .aggregator
            .bucket_width()
            .context("aggregator.bucket_width is invalid")?;
        if config.binance.symbol.trim().is_empty() {
            bail!("binance.symbol must not be empty");
        }
        if config.binance.channel_capacity == 0 {
            bail!("binance.channel_capacity must be > 0");
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_interval_valid() {
        assert_eq!(parse_interval_ms("1m").unwrap(), 60_000);
        assert_eq!(parse_interval_ms("2h").unwrap(), 7_200_000);
        assert_eq!(parse_interval_ms("1M").unwrap(), 2_592_000_000);
        assert_eq!(parse_interval_ms("500ms").unwrap(), 500);
        assert_eq!(parse_interval_ms("10s").unwrap(), 10_000);
    }

    #[test]
    fn parse_interval_rejects_invalid_inputs() {
        assert!(parse_interval_ms("").is_err());
        assert!(parse_interval_ms("m").is_err());
        assert!(parse_interval_ms("0m").is_err());
        assert!(parse_interval_ms("1x").is_err());
        assert!(parse_interval_ms("ms").is_err());
        assert!(parse_interval_ms("0ms").is_err());
        assert!(parse_interval_ms("18446744073709551615ms").is_err());
        assert!(parse_interval_ms("9223372036854775808ms").is_err());
        assert_eq!(
            parse_interval_ms("9223372036854775807ms").unwrap(),
            i64::MAX as u64
        );
    }

    #[test]
    fn trade_stream_is_lowercase() {
        let cfg = BinanceConfig {
            ws_base_url: "wss://stream.binance.com:9443/ws".to_string(),
            symbol: " BTCUSDT ".to_string(),
            channel_capacity: 16,
        };
        assert_eq!(cfg.trade_stream(), "btcusdt@trade");
    }
}
