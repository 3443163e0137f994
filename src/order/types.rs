use rust_decimal::Decimal;
use serde::Serialize;

use crate::numeric::Amount;
use crate::signer::{SignatureType, Side};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderTimeInForce {
    Gtc,
    Gtd,
    Fak,
    Fok,
}

impl OrderTimeInForce {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderTimeInForce::Gtc => "GTC",
            OrderTimeInForce::Gtd => "GTD",
            OrderTimeInForce::Fak => "FAK",
            OrderTimeInForce::Fok => "FOK",
        }
    }

    pub fn is_market_order_type(self) -> bool {
        matches!(self, OrderTimeInForce::Fak | OrderTimeInForce::Fok)
    }
}

/// Which side of the limit/market split a `MarketAmount` is denominated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketAmountKind {
    BaseCurrency,
    Shares,
}

#[derive(Debug, Clone)]
pub struct Order {
    pub salt: u64,
    pub maker: [u8; 20],
    pub signer: [u8; 20],
    pub taker: [u8; 20],
    pub token_id: Amount,
    pub maker_amount: Amount,
    pub taker_amount: Amount,
    pub expiration: u64,
    pub nonce: u64,
    pub fee_rate_bps: u32,
    pub side: Side,
    pub signature_type: SignatureType,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderJson {
    pub salt: u64,
    pub maker: String,
    pub signer: String,
    pub taker: String,
    #[serde(rename = "tokenId")]
    pub token_id: String,
    #[serde(rename = "makerAmount")]
    pub maker_amount: String,
    #[serde(rename = "takerAmount")]
    pub taker_amount: String,
    pub expiration: String,
    pub nonce: String,
    #[serde(rename = "feeRateBps")]
    pub fee_rate_bps: String,
    pub side: String,
    #[serde(rename = "signatureType")]
    pub signature_type: u8,
    pub signature: String,
}

#[derive(Debug, Clone)]
pub struct SignedOrder {
    pub order: Order,
    pub signature: String,
    pub owner: String,
    pub order_type: OrderTimeInForce,
    pub post_only: bool,
    pub defer_exec: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostOrderBody {
    pub order: OrderJson,
    pub owner: String,
    #[serde(rename = "orderType")]
    pub order_type: &'static str,
    #[serde(rename = "postOnly", skip_serializing_if = "is_false")]
    pub post_only: bool,
    #[serde(rename = "deferExec", skip_serializing_if = "is_false")]
    pub defer_exec: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl SignedOrder {
    pub fn to_order_json(&self) -> OrderJson {
        let o = &self.order;
        OrderJson {
            salt: o.salt,
            maker: format!("0x{}", hex::encode(o.maker)),
            signer: format!("0x{}", hex::encode(o.signer)),
            taker: format!("0x{}", hex::encode(o.taker)),
            token_id: o.token_id.to_string(),
            maker_amount: o.maker_amount.to_string(),
            taker_amount: o.taker_amount.to_string(),
            expiration: o.expiration.to_string(),
            nonce: o.nonce.to_string(),
            fee_rate_bps: o.fee_rate_bps.to_string(),
            side: o.side.as_wire_str().to_string(),
            signature_type: o.signature_type as u8,
            signature: self.signature.clone(),
        }
    }

    pub fn to_post_body(&self) -> PostOrderBody {
        PostOrderBody {
            order: self.to_order_json(),
            owner: self.owner.clone(),
            order_type: self.order_type.as_str(),
            post_only: self.post_only,
            defer_exec: self.defer_exec,
        }
    }
}

/// Rounding precision table keyed by tick size: (price_digits, size_digits).
/// Size digits are frozen at 2 regardless of tick size.
pub fn round_config_for_tick_size(tick_size: Decimal) -> crate::error::Result<(u32, u32)> {
    use rust_decimal_macros::dec;
    let size_digits = 2u32;
    let price_digits = if tick_size == dec!(0.1) {
        1
    } else if tick_size == dec!(0.01) {
        2
    } else if tick_size == dec!(0.001) {
        3
    } else if tick_size == dec!(0.0001) {
        4
    } else {
        return Err(crate::error::ClobError::InvalidPrice(format!(
            "unsupported tick size {tick_size} (expected 0.1/0.01/0.001/0.0001)"
        )));
    };
    Ok((price_digits, size_digits))
}
