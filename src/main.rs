use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};

use trade_flow_recorder::binance::ws::BinanceWsClient;
use trade_flow_recorder::config::Config;
use trade_flow_recorder::model::trade::Trade;
use trade_flow_recorder::recorder::{Recorder, RecorderOptions};
use trade_flow_recorder::sink::save_rows_to_csv;

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Set TRADE_FLOW_CONFIG or provide config/default.toml");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .init();

    let aggregator_config = config
        .aggregator
        .to_aggregator_config()
        .context("validated aggregator.bucket_width became invalid at runtime")?;

    tracing::info!(
        symbol = %config.binance.symbol,
        ws_url = %config.binance.ws_base_url,
        bucket_width_ms = aggregator_config.width.as_millis(),
        run_duration_secs = ?config.recorder.run_duration_secs,
        output = %config.recorder.output_path.display(),
        "Starting trade-flow-recorder"
    );

    let (trade_tx, trade_rx) = mpsc::channel::<Trade>(config.binance.channel_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let ws_client = BinanceWsClient::new(&config.binance.ws_base_url, &config.binance.trade_stream());
    let ws_shutdown = shutdown_rx.clone();
    let ws_task = tokio::spawn(async move {
        if let Err(e) = ws_client.connect_and_run(trade_tx, ws_shutdown).await {
            tracing::error!(error = %format!("{:#}", e), "Trade stream task failed");
        }
    });

    // Ctrl+C handler
    let ctrl_c_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Ctrl+C received");
        let _ = ctrl_c_shutdown.send(true);
    });

    let recorder = Recorder::new(
        aggregator_config,
        RecorderOptions {
            run_duration: config.recorder.run_duration(),
            flush_pending_on_stop: config.recorder.flush_pending_on_stop,
            invalid_trade_policy: config.recorder.invalid_trade_policy,
        },
    );
    let result = recorder.run(trade_rx, shutdown_rx).await;

    // Stop the transport whichever way the recorder ended.
    let _ = shutdown_tx.send(true);
    if let Err(e) = ws_task.await {
        tracing::warn!(error = %e, "Trade stream task join failed");
    }

    let series = result.context("recording aborted, partial series discarded")?;
    save_rows_to_csv(&config.recorder.output_path, &series.rows).with_context(|| {
        format!(
            "failed to write {}",
            config.recorder.output_path.display()
        )
    })?;

    println!(
        "Saved {} rows to {}",
        series.rows.len(),
        config.recorder.output_path.display()
    );
    Ok(())
}
