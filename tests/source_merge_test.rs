use candlesync::application::market_data::SourceMerge;
use candlesync::domain::market::{Candle, RawEvent};
use candlesync::infrastructure::mock::{candle_source, channel_source};
use futures::StreamExt;
use rust_decimal_macros::dec;
use std::time::Duration;

fn flat(ts: i64) -> Candle {
    Candle::flat(ts, dec!(1))
}

fn order(events: Vec<RawEvent>) -> Vec<(String, i64)> {
    events
        .into_iter()
        .map(|e| {
            let ts = e.timestamp().unwrap();
            (e.symbol, ts)
        })
        .collect()
}

#[tokio::test]
async fn test_merge_waits_for_slow_source() {
    let (tx, slow) = channel_source(4);
    let fast = candle_source("A", vec![flat(60_000), flat(120_000)]);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(Ok(RawEvent::new("B", flat(60_000)))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(Ok(RawEvent::new("B", flat(120_000)))).await.unwrap();
    });

    let events: Vec<RawEvent> = SourceMerge::new(vec![fast, slow])
        .into_stream()
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(
        order(events),
        vec![
            ("A".to_string(), 60_000),
            ("B".to_string(), 60_000),
            ("A".to_string(), 120_000),
            ("B".to_string(), 120_000),
        ]
    );
}

#[tokio::test]
async fn test_exhausted_source_does_not_stall_others() {
    let short = candle_source("A", vec![flat(60_000)]);
    let long = candle_source("B", vec![flat(60_000), flat(120_000), flat(180_000)]);

    let events: Vec<RawEvent> = SourceMerge::new(vec![short, long])
        .into_stream()
        .map(|r| r.unwrap())
        .collect()
        .await;

    assert_eq!(
        order(events),
        vec![
            ("A".to_string(), 60_000),
            ("B".to_string(), 60_000),
            ("B".to_string(), 120_000),
            ("B".to_string(), 180_000),
        ]
    );
}

#[tokio::test]
async fn test_dropping_merged_stream_releases_sources() {
    let (tx, source) = channel_source(4);
    tx.send(Ok(RawEvent::new("A", flat(60_000)))).await.unwrap();

    let mut merged = SourceMerge::new(vec![source]).into_stream();
    let first = merged.next().await.unwrap().unwrap();
    assert_eq!(first.timestamp(), Some(60_000));
    assert!(!tx.is_closed());

    drop(merged);
    assert!(tx.is_closed());
}

#[tokio::test]
async fn test_active_sources_counts_registered() {
    let merge = SourceMerge::new(vec![
        candle_source("A", vec![]),
        candle_source("B", vec![flat(60_000)]),
    ]);
    assert_eq!(merge.active_sources(), 2);
}
