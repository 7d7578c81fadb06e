use anyhow::{Context, Result};
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;

use super::types::decode_trade_message;
use crate::error::AppError;
use crate::model::trade::Trade;

/// Exponential backoff for reconnection.
struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

enum SessionEnd {
    Shutdown,
    ConsumerGone,
}

pub struct BinanceWsClient {
    url: String,
}

impl BinanceWsClient {
    pub fn new(ws_base_url: &str, stream: &str) -> Self {
        Self {
            url: format!("{}/{}", ws_base_url.trim_end_matches('/'), stream),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and forward decoded trades into `trade_tx` until shutdown or
    /// until the receiving side goes away, reconnecting on errors.
    ///
    /// Trades are sent with backpressure; none are dropped on a full channel.
    pub async fn connect_and_run(
        &self,
        trade_tx: mpsc::Sender<Trade>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let mut backoff = ExponentialBackoff::new(
            Duration::from_secs(1),
            Duration::from_secs(60),
            2.0,
        );
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.connect_once(&trade_tx, &mut shutdown, &mut backoff).await {
                Ok(SessionEnd::Shutdown) => {
                    tracing::info!("Trade stream closed on shutdown");
                    break;
                }
                Ok(SessionEnd::ConsumerGone) => {
                    tracing::info!("Trade consumer gone, closing stream");
                    break;
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    tracing::warn!(
                        error = %format!("{:#}", e),
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Trade stream disconnected, reconnecting"
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            tracing::info!("Shutdown during reconnect");
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn connect_once(
        &self,
        trade_tx: &mpsc::Sender<Trade>,
        shutdown: &mut watch::Receiver<bool>,
        backoff: &mut ExponentialBackoff,
    ) -> Result<SessionEnd> {
        tracing::info!(url = %self.url, "Connecting to trade stream");

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(&self.url)
            .await
            .context("WebSocket connect failed")?;

        tracing::info!(url = %self.url, "Trade stream connected");
        backoff.reset();

        let (_write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            match decode_trade_message(&text) {
                                Ok(trade) => {
                                    if trade_tx.send(trade).await.is_err() {
                                        return Ok(SessionEnd::ConsumerGone);
                                    }
                                }
                                Err(e) => {
                                    tracing::debug!(error = %e, "Failed to parse WS message");
                                }
                            }
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tokio-tungstenite handles pong automatically
                        }
                        Some(Ok(tungstenite::Message::Close(frame))) => {
                            tracing::info!(?frame, "Server closed trade stream");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(AppError::WebSocket(e.to_string()))
                                .context("WebSocket read error");
                        }
                        None => {
                            return Err(AppError::WebSocket("stream ended".to_string()))
                                .context("WebSocket read error");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    return Ok(SessionEnd::Shutdown);
                }
            }
        }
    }
}
