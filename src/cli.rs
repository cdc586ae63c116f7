// REPL command parsing and execution against a registry.

use std::fmt::Write as _;

use thiserror::Error;

use crate::engine::registry::MarketRegistry;
use crate::engine::types::{LadderError, LevelEntry, ParseTokenError, Predicate, Side};

pub const HELP: &str = "\
Available commands:
  init <exchange> <market> [b:<price>:<qty> ...] [o:<price>:<qty> ...]
  update <exchange> <market> <yes|no> <bid|offer> <price> <qty> [delta]
  match <exchange> <market> <yes|no> <bid|offer> <price> <qty>
  read <exchange> <market>
  top <exchange> <market>
  retick <exchange> <market> <tick>
  remove <exchange> <market>
  markets
  quit, q";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Init { exchange: String, market: String, bids: Vec<LevelEntry>, offers: Vec<LevelEntry> },
    Update {
        exchange: String,
        market: String,
        predicate: Predicate,
        side: Side,
        entry: LevelEntry,
        is_delta: bool,
    },
    Match { exchange: String, market: String, predicate: Predicate, side: Side, entry: LevelEntry },
    Read { exchange: String, market: String },
    Top { exchange: String, market: String },
    Retick { exchange: String, market: String, tick: f64 },
    Remove { exchange: String, market: String },
    Markets,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command `{0}`, type 'help' for available commands")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("invalid number `{0}`")]
    Number(String),
    #[error("invalid level `{0}` (expected b:<price>:<qty> or o:<price>:<qty>)")]
    Level(String),
    #[error(transparent)]
    Token(#[from] ParseTokenError),
}

fn number(s: &str) -> Result<f64, CommandError> {
    s.parse::<f64>().map_err(|_| CommandError::Number(s.to_string()))
}

fn level(s: &str) -> Result<(Side, LevelEntry), CommandError> {
    let mut parts = s.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(side), Some(price), Some(qty), None) => {
            let side = side.parse::<Side>().map_err(|_| CommandError::Level(s.to_string()))?;
            Ok((side, LevelEntry::new(number(price)?, number(qty)?)))
        }
        _ => Err(CommandError::Level(s.to_string())),
    }
}

pub fn parse(line: &str) -> Result<Option<Command>, CommandError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some((head, args)) = parts.split_first() else {
        return Ok(None);
    };
    let market = |usage: &'static str| -> Result<(String, String), CommandError> {
        match args {
            [ex, mkt, ..] => Ok((ex.to_string(), mkt.to_string())),
            _ => Err(CommandError::Usage(usage)),
        }
    };

    let cmd = match head.to_lowercase().as_str() {
        "help" | "h" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        "markets" => Command::Markets,
        "init" => {
            let (exchange, market) = market("init <exchange> <market> [b:<price>:<qty> ...]")?;
            let mut bids = Vec::new();
            let mut offers = Vec::new();
            for token in &args[2..] {
                match level(token)? {
                    (Side::Bid, e) => bids.push(e),
                    (Side::Offer, e) => offers.push(e),
                }
            }
            Command::Init { exchange, market, bids, offers }
        }
        "update" => {
            const USAGE: &str = "update <exchange> <market> <yes|no> <bid|offer> <price> <qty> [delta]";
            let (exchange, market) = market(USAGE)?;
            let (fields, is_delta) = match &args[2..] {
                [fields @ .., flag] if flag.eq_ignore_ascii_case("delta") => (fields, true),
                fields => (fields, false),
            };
            match fields {
                [pred, side, price, qty] => Command::Update {
                    exchange,
                    market,
                    predicate: pred.parse()?,
                    side: side.parse()?,
                    entry: LevelEntry::new(number(price)?, number(qty)?),
                    is_delta,
                },
                _ => return Err(CommandError::Usage(USAGE)),
            }
        }
        "match" => {
            const USAGE: &str = "match <exchange> <market> <yes|no> <bid|offer> <price> <qty>";
            let (exchange, market) = market(USAGE)?;
            match &args[2..] {
                [pred, side, price, qty] => Command::Match {
                    exchange,
                    market,
                    predicate: pred.parse()?,
                    side: side.parse()?,
                    entry: LevelEntry::new(number(price)?, number(qty)?),
                },
                _ => return Err(CommandError::Usage(USAGE)),
            }
        }
        "read" => {
            let (exchange, market) = market("read <exchange> <market>")?;
            Command::Read { exchange, market }
        }
        "top" => {
            let (exchange, market) = market("top <exchange> <market>")?;
            Command::Top { exchange, market }
        }
        "retick" => {
            const USAGE: &str = "retick <exchange> <market> <tick>";
            let (exchange, market) = market(USAGE)?;
            match &args[2..] {
                [tick] => Command::Retick { exchange, market, tick: number(tick)? },
                _ => return Err(CommandError::Usage(USAGE)),
            }
        }
        "remove" => {
            let (exchange, market) = market("remove <exchange> <market>")?;
            Command::Remove { exchange, market }
        }
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(cmd))
}

fn fmt_level(entry: &LevelEntry) -> String {
    format!("{:>10.2} @ {:.4}", entry.quantity, entry.price)
}

/// Bids and offers of one market, highest price on top.
pub fn render_book(registry: &MarketRegistry, exchange: &str, market: &str) -> String {
    let Some(ladder) = registry.ladder(exchange, market) else {
        return format!("No market {exchange}|{market}");
    };
    let view = ladder.ladder();
    let midpoint = view.midpoint_price();
    let tick = view.tick_size;
    let (bids, offers) = view.into_levels();

    let mut out = String::new();
    let _ = writeln!(out, "=== {exchange}|{market} (tick {tick}) ===");
    for o in offers.iter().rev() {
        let _ = writeln!(out, "  OFFER {}", fmt_level(o));
    }
    let _ = writeln!(out, "  ----- mid {midpoint:.4} -----");
    for b in bids.iter().rev() {
        let _ = writeln!(out, "  BID   {}", fmt_level(b));
    }
    out
}

pub fn execute(registry: &mut MarketRegistry, cmd: &Command) -> Result<String, LadderError> {
    let out = match cmd {
        Command::Help => HELP.to_string(),
        Command::Quit => "Goodbye!".to_string(),
        Command::Markets => {
            let keys = registry.markets();
            if keys.is_empty() {
                "No markets".to_string()
            } else {
                keys.iter().map(|k| k.to_string()).collect::<Vec<_>>().join("\n")
            }
        }
        Command::Init { exchange, market, bids, offers } => {
            registry.init_market(exchange, market, bids, offers)?;
            render_book(registry, exchange, market)
        }
        Command::Update { exchange, market, predicate, side, entry, is_delta } => {
            if registry.update_market(exchange, market, *predicate, *side, *entry, *is_delta) {
                render_book(registry, exchange, market)
            } else {
                format!("No market {exchange}|{market}")
            }
        }
        Command::Match { exchange, market, predicate, side, entry } => {
            let trades = registry.match_market(exchange, market, *predicate, *side, *entry);
            let mut out = format!("{} trade(s)\n", trades.len());
            for t in &trades {
                let _ = writeln!(out, "  Trade: {:.2} @ {:.4}", t.quantity, t.price);
            }
            out + &render_book(registry, exchange, market)
        }
        Command::Read { exchange, market } => render_book(registry, exchange, market),
        Command::Top { exchange, market } => match registry.top_of_book(exchange, market) {
            None => format!("No market {exchange}|{market}"),
            Some((bid, offer)) => {
                let side = |e: Option<LevelEntry>| e.map(|e| fmt_level(&e)).unwrap_or_else(|| "None".to_string());
                format!("Best bid: {}\nBest offer: {}", side(bid), side(offer))
            }
        },
        Command::Retick { exchange, market, tick } => {
            if registry.retick(exchange, market, *tick)? {
                render_book(registry, exchange, market)
            } else {
                format!("No market {exchange}|{market}")
            }
        }
        Command::Remove { exchange, market } => match registry.remove_market(exchange, market) {
            Some(_) => format!("Removed {exchange}|{market}"),
            None => format!("No market {exchange}|{market}"),
        },
    };
    Ok(out)
}
