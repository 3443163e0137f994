use rust_decimal::Decimal;
use serde::Deserialize;

use crate::book::{BookLevel, OrderBook};

#[derive(Debug, Clone, Deserialize)]
pub struct RawBookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

impl From<RawBookLevel> for BookLevel {
    fn from(r: RawBookLevel) -> Self {
        BookLevel {
            price: r.price,
            size: r.size,
        }
    }
}

/// A parsed, typed market/user event. Each variant corresponds to one of
/// the recognized `type`/`event_type` discriminators on the wire.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    Book { asset_id: String, book: OrderBook },
    PriceChange { asset_id: String, price: Decimal, side: Option<String> },
    Midpoint { asset_id: String, mid: Decimal },
    LastTradePrice { asset_id: String, price: Decimal },
    TickSizeChange { asset_id: String, new_tick_size: Decimal },
    BestBidAsk { asset_id: String, best_bid: Option<Decimal>, best_ask: Option<Decimal> },
    NewMarket { market_id: String },
    MarketResolved { market_id: String, winning_outcome: Option<String> },
}

#[derive(Debug, Clone)]
pub enum UserEvent {
    Trade { market_id: String, payload: serde_json::Value },
    Order { market_id: String, payload: serde_json::Value },
}

fn first_field<'a>(v: &'a serde_json::Value, keys: &[&str]) -> Option<&'a serde_json::Value> {
    keys.iter().find_map(|k| v.get(k))
}

fn parse_levels(v: &serde_json::Value, keys: &[&str]) -> Vec<BookLevel> {
    first_field(v, keys)
        .and_then(|arr| serde_json::from_value::<Vec<RawBookLevel>>(arr.clone()).ok())
        .map(|levels| levels.into_iter().map(BookLevel::from).collect())
        .unwrap_or_default()
}

/// Parse one JSON object frame into zero or more typed market events.
/// Orderbook frames synthesize an additional `Midpoint` event when both
/// sides are present. Bids/asks may be spelled `bids`/`asks` or
/// `buys`/`sells`.
pub fn parse_market_event(v: &serde_json::Value) -> Vec<MarketEvent> {
    let event_type = v
        .get("type")
        .or_else(|| v.get("event_type"))
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    let asset_id = v
        .get("asset_id")
        .and_then(|a| a.as_str())
        .unwrap_or_default()
        .to_string();

    match event_type {
        "orderbook" | "book" => {
            let mut bids = parse_levels(v, &["bids", "buys"]);
            let mut asks = parse_levels(v, &["asks", "sells"]);
            bids.sort_by(|a, b| b.price.cmp(&a.price));
            asks.sort_by(|a, b| a.price.cmp(&b.price));
            let hash = v
                .get("hash")
                .and_then(|h| h.as_str())
                .unwrap_or_default()
                .to_string();
            let mut out = Vec::new();
            let midpoint = match (bids.first(), asks.first()) {
                (Some(b), Some(a)) => Some((b.price + a.price) / Decimal::new(2, 0)),
                _ => None,
            };
            out.push(MarketEvent::Book {
                asset_id: asset_id.clone(),
                book: OrderBook { bids, asks, hash },
            });
            if let Some(mid) = midpoint {
                out.push(MarketEvent::Midpoint { asset_id, mid });
            }
            out
        }
        "price_change" | "price" => v
            .get("price")
            .and_then(|p| p.as_str())
            .and_then(|s| s.parse::<Decimal>().ok())
            .map(|price| {
                vec![MarketEvent::PriceChange {
                    asset_id,
                    price,
                    side: v.get("side").and_then(|s| s.as_str()).map(String::from),
                }]
            })
            .unwrap_or_default(),
        "midpoint" => v
            .get("mid")
            .or_else(|| v.get("midpoint"))
            .and_then(|m| m.as_str())
            .and_then(|s| s.parse::<Decimal>().ok())
            .map(|mid| vec![MarketEvent::Midpoint { asset_id, mid }])
            .unwrap_or_default(),
        "last_trade_price" => v
            .get("price")
            .and_then(|p| p.as_str())
            .and_then(|s| s.parse::<Decimal>().ok())
            .map(|price| vec![MarketEvent::LastTradePrice { asset_id, price }])
            .unwrap_or_default(),
        "tick_size_change" => v
            .get("new_tick_size")
            .and_then(|t| t.as_str())
            .and_then(|s| s.parse::<Decimal>().ok())
            .map(|new_tick_size| vec![MarketEvent::TickSizeChange { asset_id, new_tick_size }])
            .unwrap_or_default(),
        "best_bid_ask" => vec![MarketEvent::BestBidAsk {
            asset_id,
            best_bid: v
                .get("best_bid")
                .and_then(|p| p.as_str())
                .and_then(|s| s.parse::<Decimal>().ok()),
            best_ask: v
                .get("best_ask")
                .and_then(|p| p.as_str())
                .and_then(|s| s.parse::<Decimal>().ok()),
        }],
        "new_market" => vec![MarketEvent::NewMarket {
            market_id: v
                .get("market")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string(),
        }],
        "market_resolved" => vec![MarketEvent::MarketResolved {
            market_id: v
                .get("market")
                .and_then(|m| m.as_str())
                .unwrap_or_default()
                .to_string(),
            winning_outcome: v
                .get("winning_outcome")
                .and_then(|w| w.as_str())
                .map(String::from),
        }],
        _ => Vec::new(),
    }
}

pub fn parse_user_event(v: &serde_json::Value) -> Vec<UserEvent> {
    let event_type = v
        .get("type")
        .or_else(|| v.get("event_type"))
        .and_then(|t| t.as_str())
        .unwrap_or_default();
    let market_id = v
        .get("market")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    match event_type {
        "trade" => vec![UserEvent::Trade {
            market_id,
            payload: v.clone(),
        }],
        "order" => vec![UserEvent::Order {
            market_id,
            payload: v.clone(),
        }],
        _ => Vec::new(),
    }
}

/// Unpack a raw inbound text frame into its constituent JSON objects:
/// either a single object or an array of objects.
pub fn unpack_frame(text: &str) -> Vec<serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(serde_json::Value::Array(items)) => items,
        Ok(obj @ serde_json::Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_frame_handles_object_and_array() {
        assert_eq!(unpack_frame(r#"{"type":"price"}"#).len(), 1);
        assert_eq!(unpack_frame(r#"[{"type":"price"},{"type":"midpoint"}]"#).len(), 2);
        assert_eq!(unpack_frame("not json").len(), 0);
    }

    #[test]
    fn book_event_synthesizes_midpoint() {
        let v: serde_json::Value = serde_json::from_str(
            r#"{"type":"book","asset_id":"1","hash":"h","bids":[{"price":"0.40","size":"10"}],"asks":[{"price":"0.60","size":"10"}]}"#,
        )
        .unwrap();
        let events = parse_market_event(&v);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], MarketEvent::Book { .. }));
        match &events[1] {
            MarketEvent::Midpoint { mid, .. } => assert_eq!(*mid, Decimal::new(50, 2)),
            _ => panic!("expected midpoint"),
        }
    }

    #[test]
    fn book_event_accepts_buys_sells_aliases() {
        let v: serde_json::Value = serde_json::from_str(
            r#"{"type":"book","asset_id":"1","hash":"h","buys":[{"price":"0.40","size":"10"}],"sells":[{"price":"0.60","size":"10"}]}"#,
        )
        .unwrap();
        let events = parse_market_event(&v);
        match &events[0] {
            MarketEvent::Book { book, .. } => {
                assert_eq!(book.bids.len(), 1);
                assert_eq!(book.asks.len(), 1);
            }
            _ => panic!("expected book"),
        }
    }
}
