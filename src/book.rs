//! Order book snapshot and the market-order price-discovery walk.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{ClobError, Result};
use crate::order::types::MarketAmountKind;
use crate::signer::Side;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// Descending by price.
    pub bids: Vec<BookLevel>,
    /// Ascending by price.
    pub asks: Vec<BookLevel>,
    pub hash: String,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    pub fn midpoint(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.price + a.price) / Decimal::new(2, 0)),
            _ => None,
        }
    }

    /// The side of the book a market order of `side` trades against.
    fn opposing_levels(&self, side: Side) -> &[BookLevel] {
        match side {
            Side::Buy => &self.asks,
            Side::Sell => &self.bids,
        }
    }

    /// Walk the opposing side from the worst level toward the best,
    /// accumulating cumulative notional (`BaseCurrency`) or cumulative size
    /// (`Shares`) until `amount` is reached. Returns the cutoff price — the
    /// worst price the order must tolerate to fill `amount`.
    ///
    /// `fok` controls the exhaustion behavior: when the book can't cover
    /// `amount`, FOK orders fail with `InsufficientLiquidity`; FAK orders
    /// fall back to the best opposing price.
    pub fn market_cutoff_price(
        &self,
        side: Side,
        amount: Decimal,
        kind: MarketAmountKind,
        fok: bool,
    ) -> Result<Decimal> {
        let levels = self.opposing_levels(side);
        if levels.is_empty() {
            return Err(ClobError::InsufficientLiquidity);
        }

        let mut cumulative = Decimal::ZERO;
        let mut cutoff: Option<Decimal> = None;
        for level in levels.iter().rev() {
            let contribution = match kind {
                MarketAmountKind::BaseCurrency => level.price * level.size,
                MarketAmountKind::Shares => level.size,
            };
            cumulative += contribution;
            if cumulative >= amount {
                cutoff = Some(level.price);
                break;
            }
        }

        match cutoff {
            Some(price) => Ok(price),
            None if fok => Err(ClobError::InsufficientLiquidity),
            None => Ok(levels[0].price),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book_with_asks() -> OrderBook {
        OrderBook {
            bids: vec![],
            asks: vec![
                BookLevel {
                    price: dec!(0.50),
                    size: dec!(100),
                },
                BookLevel {
                    price: dec!(0.55),
                    size: dec!(100),
                },
                BookLevel {
                    price: dec!(0.60),
                    size: dec!(100),
                },
            ],
            hash: "h".to_string(),
        }
    }

    #[test]
    fn market_buy_walks_from_worst_to_best() {
        // S2: asks sorted ascending; worst-first walk should start at 0.60.
        let book = book_with_asks();
        let cutoff = book
            .market_cutoff_price(Side::Buy, dec!(50), MarketAmountKind::BaseCurrency, false)
            .unwrap();
        assert_eq!(cutoff, dec!(0.50));
    }

    #[test]
    fn fok_fails_when_book_cannot_cover_amount() {
        let book = OrderBook {
            bids: vec![],
            asks: vec![BookLevel {
                price: dec!(0.60),
                size: dec!(1),
            }],
            hash: "h".to_string(),
        };
        let err = book
            .market_cutoff_price(Side::Buy, dec!(100), MarketAmountKind::BaseCurrency, true)
            .unwrap_err();
        assert!(matches!(err, ClobError::InsufficientLiquidity));
    }

    #[test]
    fn fak_falls_back_to_best_level_when_exhausted() {
        let book = OrderBook {
            bids: vec![],
            asks: vec![BookLevel {
                price: dec!(0.60),
                size: dec!(1),
            }],
            hash: "h".to_string(),
        };
        let cutoff = book
            .market_cutoff_price(Side::Buy, dec!(100), MarketAmountKind::BaseCurrency, false)
            .unwrap();
        assert_eq!(cutoff, dec!(0.60));
    }
}
