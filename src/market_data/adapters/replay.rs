use std::path::PathBuf;

use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::{FeedError, FeedSource};
use crate::market_data::events::MarketEvent;

/// Replays a recorded feed: one JSON `MarketEvent` per line. Blank lines and
/// lines starting with `#` are skipped.
pub struct JsonLinesReplay {
    pub path: PathBuf,
}

impl JsonLinesReplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

pub fn decode_line(line_no: usize, line: &str) -> Result<Option<MarketEvent>, FeedError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| FeedError::Decode { line: line_no, source })
}

#[async_trait::async_trait]
impl FeedSource for JsonLinesReplay {
    async fn run(&self, tx: mpsc::Sender<MarketEvent>) -> Result<usize, FeedError> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0;
        let mut sent = 0;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            let Some(event) = decode_line(line_no, &line)? else {
                continue;
            };
            debug!(line = line_no, kind = event.kind(), "Replaying event");
            tx.send(event).await.map_err(|_| FeedError::ChannelClosed)?;
            sent += 1;
        }

        info!(path = %self.path.display(), events = sent, "Replay finished");
        Ok(sent)
    }
}
