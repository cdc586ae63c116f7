pub mod engine;
pub mod market_data;
pub mod config;
pub mod cli;
pub mod telemetry;
