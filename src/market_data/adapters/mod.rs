// Shared trait + error for feed sources

use thiserror::Error;
use tokio::sync::mpsc;

use crate::market_data::events::MarketEvent;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read feed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed event on line {line}: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("router channel closed")]
    ChannelClosed,
}

#[async_trait::async_trait]
pub trait FeedSource {
    /// Push normalised events into the router until the source is exhausted.
    /// Returns how many events were sent.
    async fn run(&self, tx: mpsc::Sender<MarketEvent>) -> Result<usize, FeedError>;
}

pub mod replay;
