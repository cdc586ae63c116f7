// Market data module entrypoint
pub mod events;      // venue-neutral book events
pub mod normaliser;  // venue payloads -> events (cents, yes/no books)
pub mod adapters;    // feed sources (recorded replay)
pub mod router;      // single-writer event loop over the registry

pub use events::MarketEvent;
pub use router::{FeedRouter, Outcome, RouterStats};
