use trade_flow_recorder::bucket::{AggregatorConfig, BucketAggregator, BucketWidth};
use trade_flow_recorder::model::trade::Trade;
use trade_flow_recorder::sink::{rows_to_csv_string, save_rows_to_csv, SummaryCsvWriter};

fn two_rows() -> Vec<trade_flow_recorder::model::summary::SummaryRow> {
    let mut agg = BucketAggregator::new(AggregatorConfig::with_width(BucketWidth::from_millis(
        60_000,
    )));
    agg.ingest(&Trade::buy(0, 100.0, 2.0)).unwrap();
    agg.ingest(&Trade::sell(1_000, 100.0, 1.0)).unwrap();
    agg.ingest(&Trade::buy(60_000, 103.0, 3.0)).unwrap();
    agg.ingest(&Trade::sell(61_000, 103.0, 0.5)).unwrap();
    agg.ingest(&Trade::buy(120_000, 101.0, 1.0)).unwrap();
    agg.into_rows()
}

#[test]
fn csv_layout_matches_reference_columns() {
    let csv = rows_to_csv_string(&two_rows()).unwrap();
    let expected = "\
timestamp,buy_qty,sell_qty,buy_pct_change,sell_pct_change,price_pct_change
1970-01-01 00:00:00,2,1,0.00,0.00,0.00
1970-01-01 00:00:01,3,0.5,50.00,-50.00,3.00
";
    assert_eq!(csv, expected);
}

#[test]
fn incremental_writer_counts_rows() {
    let rows = two_rows();
    let mut writer = SummaryCsvWriter::new(Vec::new()).unwrap();
    for row in &rows {
        writer.write_row(row).unwrap();
    }
    assert_eq!(writer.rows_written(), 2);
    let bytes = writer.finish().unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap().lines().count(), 3);
}

#[test]
fn save_creates_parent_dirs_and_truncates() {
    let dir = std::env::temp_dir().join(format!(
        "trade_flow_recorder_sink_{}",
        std::process::id()
    ));
    let path = dir.join("nested").join("btc_data.csv");

    save_rows_to_csv(&path, &two_rows()).expect("first save should succeed");
    save_rows_to_csv(&path, &two_rows()[..1]).expect("second save should succeed");

    let content = std::fs::read_to_string(&path).unwrap();
    assert_eq!(content.lines().count(), 2);
    assert!(content.starts_with("timestamp,buy_qty"));

    let _ = std::fs::remove_dir_all(&dir);
}
