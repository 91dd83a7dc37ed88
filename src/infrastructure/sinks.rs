use crate::domain::market::Snapshot;
use crate::domain::ports::SnapshotSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc::Sender;
use tracing::info;

/// Logs every snapshot at INFO. Used by the headless runner.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl SnapshotSink for LoggingSink {
    async fn on_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let closes: Vec<String> = snapshot
            .iter()
            .map(|(symbol, candle)| format!("{}={}", symbol, candle.close))
            .collect();
        info!(
            "Snapshot {:?}: {} symbol(s) [{}]",
            snapshot.timestamp(),
            snapshot.len(),
            closes.join(", ")
        );
        Ok(())
    }
}

/// Forwards snapshots to an async consumer over a channel.
pub struct ChannelSink {
    tx: Sender<Snapshot>,
}

impl ChannelSink {
    pub fn new(tx: Sender<Snapshot>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl SnapshotSink for ChannelSink {
    async fn on_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.tx
            .send(snapshot.clone())
            .await
            .context("Snapshot consumer has gone away")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::Candle;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    fn snapshot() -> Snapshot {
        Snapshot::from_candles([("BTC/USDT", Candle::flat(60_000, dec!(68000)))]).unwrap()
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (tx, mut rx) = mpsc::channel(1);
        ChannelSink::new(tx).on_snapshot(&snapshot()).await.unwrap();

        assert_eq!(rx.recv().await, Some(snapshot()));
    }

    #[tokio::test]
    async fn test_channel_sink_errors_without_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        assert!(ChannelSink::new(tx).on_snapshot(&snapshot()).await.is_err());
    }

    #[test]
    fn test_logging_sink_accepts_empty() {
        assert!(tokio_test::block_on(LoggingSink.on_snapshot(&Snapshot::new())).is_ok());
    }
}
