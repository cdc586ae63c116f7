// Order book engine: per-market price ladder + multi-market registry
pub mod types;
pub mod ladder;
pub mod registry;

pub use ladder::{LadderRow, LadderView, PriceLadder};
pub use registry::{LevelData, MarketKey, MarketRegistry};
pub use types::{LadderError, LevelEntry, Predicate, Side, Trade, DEFAULT_TICK_SIZE};
