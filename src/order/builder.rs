use rust_decimal::Decimal;

use crate::book::OrderBook;
use crate::error::{ClobError, Result};
use crate::numeric::{self, to_fixed_1e6};
use crate::order::sign::sign_order;
use crate::order::types::{
    round_config_for_tick_size, MarketAmountKind, Order, OrderTimeInForce, SignedOrder,
};
use crate::signer::{SignatureType, Side, Signer};
use crate::{signer as signer_mod, numeric::Amount};

const ZERO_ADDRESS: [u8; 20] = [0u8; 20];

/// Fluent, single-use configurator for both limit and market orders.
/// Mirrors the exchange's amount-normalization and validation rules; see
/// the crate's design notes for the full invariant list.
#[derive(Debug, Clone, Default)]
pub struct OrderBuilder {
    token_id: Option<Amount>,
    side: Option<Side>,
    price: Option<Decimal>,
    size: Option<Decimal>,
    fee_rate_bps_override: Option<u32>,
    tick_size_override: Option<Decimal>,
    signature_type: Option<SignatureType>,
    maker_override: Option<[u8; 20]>,
    funder_override: Option<[u8; 20]>,
    nonce: u64,
    expiration: u64,
    order_type: OrderTimeInForce,
    post_only: bool,
    defer_exec: bool,
    salt_generator: Option<fn() -> u64>,
}

impl OrderBuilder {
    pub fn new() -> Self {
        Self {
            order_type: OrderTimeInForce::Gtc,
            ..Default::default()
        }
    }

    pub fn token_id(mut self, token_id: Amount) -> Self {
        self.token_id = Some(token_id);
        self
    }

    /// The token id configured so far, if any — lets callers resolve market
    /// metadata (tick size, fee rate) before handing the builder off to be
    /// signed, without threading the token id through a second parameter.
    pub fn configured_token_id(&self) -> Option<Amount> {
        self.token_id
    }

    pub fn side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    pub fn price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    pub fn size(mut self, size: Decimal) -> Self {
        self.size = Some(size);
        self
    }

    pub fn fee_rate_bps(mut self, fee_rate_bps: u32) -> Self {
        self.fee_rate_bps_override = Some(fee_rate_bps);
        self
    }

    pub fn tick_size(mut self, tick_size: Decimal) -> Self {
        self.tick_size_override = Some(tick_size);
        self
    }

    pub fn signature_type(mut self, t: SignatureType) -> Self {
        self.signature_type = Some(t);
        self
    }

    pub fn maker(mut self, maker: [u8; 20]) -> Self {
        self.maker_override = Some(maker);
        self
    }

    pub fn funder(mut self, funder: [u8; 20]) -> Self {
        self.funder_override = Some(funder);
        self
    }

    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn expiration(mut self, expiration: u64) -> Self {
        self.expiration = expiration;
        self
    }

    pub fn order_type(mut self, t: OrderTimeInForce) -> Self {
        self.order_type = t;
        self
    }

    pub fn post_only(mut self, v: bool) -> Self {
        self.post_only = v;
        self
    }

    pub fn defer_exec(mut self, v: bool) -> Self {
        self.defer_exec = v;
        self
    }

    pub fn salt_generator(mut self, f: fn() -> u64) -> Self {
        self.salt_generator = Some(f);
        self
    }

    fn resolve_tick_size(&self, exchange_min_tick: Decimal) -> Result<Decimal> {
        match self.tick_size_override {
            Some(override_tick) if override_tick < exchange_min_tick => Err(
                ClobError::InvalidPrice(format!(
                    "tick size override {override_tick} below exchange minimum {exchange_min_tick}"
                )),
            ),
            Some(override_tick) => Ok(override_tick.max(exchange_min_tick)),
            None => Ok(exchange_min_tick),
        }
    }

    fn resolve_fee_rate_bps(&self, exchange_fee_rate_bps: u32) -> Result<u32> {
        match self.fee_rate_bps_override {
            Some(user) if user != 0 && exchange_fee_rate_bps != 0 && user != exchange_fee_rate_bps => {
                Err(ClobError::InvalidPrice(format!(
                    "fee rate override {user} conflicts with exchange fee rate {exchange_fee_rate_bps}"
                )))
            }
            Some(user) if user != 0 => Ok(user),
            _ => Ok(exchange_fee_rate_bps),
        }
    }

    fn resolve_maker(&self, signer: &dyn Signer) -> Result<([u8; 20], SignatureType)> {
        if let Some(maker) = self.maker_override {
            let sig_type = self.signature_type.unwrap_or(SignatureType::Eoa);
            return Ok((maker, sig_type));
        }
        if let Some(funder) = self.funder_override {
            let sig_type = self.signature_type.unwrap_or(SignatureType::Proxy);
            if sig_type == SignatureType::Eoa {
                return Err(ClobError::InvalidSignature);
            }
            if funder == ZERO_ADDRESS {
                return Err(ClobError::InvalidSignature);
            }
            return Ok((funder, sig_type));
        }
        let sig_type = self.signature_type.unwrap_or(SignatureType::Eoa);
        let maker = match sig_type {
            SignatureType::Eoa => signer.address(),
            SignatureType::Proxy => signer_mod::derive_proxy_address(signer.address(), signer.chain_id())?,
            SignatureType::Multisig => {
                signer_mod::derive_multisig_address(signer.address(), signer.chain_id())?
            }
        };
        Ok((maker, sig_type))
    }

    fn generate_salt(&self) -> u64 {
        if let Some(f) = self.salt_generator {
            return f();
        }
        let bytes: [u8; 8] = rand::random();
        u64::from_be_bytes(bytes) & ((1u64 << 53) - 1)
    }

    fn validate_limit_order_type(&self) -> Result<()> {
        if self.post_only && !matches!(self.order_type, OrderTimeInForce::Gtc | OrderTimeInForce::Gtd) {
            return Err(ClobError::InvalidPrice(
                "postOnly is only valid with GTC/GTD".to_string(),
            ));
        }
        match self.order_type {
            OrderTimeInForce::Gtd if self.expiration == 0 => Err(ClobError::InvalidPrice(
                "GTD requires a non-zero expiration".to_string(),
            )),
            OrderTimeInForce::Gtd => Ok(()),
            _ if self.expiration != 0 => Err(ClobError::InvalidPrice(
                "expiration is only valid with GTD".to_string(),
            )),
            _ => Ok(()),
        }
    }

    fn validate_market_order_type(&self) -> Result<()> {
        if !self.order_type.is_market_order_type() {
            return Err(ClobError::InvalidPrice(
                "market orders require FAK or FOK".to_string(),
            ));
        }
        if self.post_only {
            return Err(ClobError::InvalidPrice(
                "postOnly is not valid for market orders".to_string(),
            ));
        }
        Ok(())
    }

    fn check_bounds(price: Decimal, size: Decimal, tick_size: Decimal) -> Result<()> {
        if size <= Decimal::ZERO {
            return Err(ClobError::InvalidSize(format!("size must be positive, got {size}")));
        }
        if price <= Decimal::ZERO {
            return Err(ClobError::InvalidPrice(format!("price must be positive, got {price}")));
        }
        let upper = Decimal::ONE - tick_size;
        if price < tick_size || price > upper {
            return Err(ClobError::InvalidPrice(format!(
                "price {price} outside bounds [{tick_size}, {upper}]"
            )));
        }
        Ok(())
    }

    /// Build and sign a limit order. `exchange_min_tick`/`exchange_fee_rate_bps`
    /// are the values read from the exchange (typically via the per-client
    /// tick/fee cache).
    pub fn build_signed_limit(
        self,
        signer: &dyn Signer,
        exchange_address: [u8; 20],
        exchange_min_tick: Decimal,
        exchange_fee_rate_bps: u32,
    ) -> Result<SignedOrder> {
        self.validate_limit_order_type()?;
        let side = self.side.ok_or_else(|| ClobError::InvalidPrice("side required".into()))?;
        let price = self.price.ok_or_else(|| ClobError::InvalidPrice("price required".into()))?;
        let size = self.size.ok_or_else(|| ClobError::InvalidSize("size required".into()))?;
        let token_id = self
            .token_id
            .ok_or_else(|| ClobError::InvalidPrice("token_id required".into()))?;

        if numeric::decimal_places(size) > 2 {
            return Err(ClobError::InvalidSize(format!("size {size} exceeds 2 decimal places")));
        }

        let tick_size = self.resolve_tick_size(exchange_min_tick)?;
        Self::check_bounds(price, size, tick_size)?;
        let fee_rate_bps = self.resolve_fee_rate_bps(exchange_fee_rate_bps)?;
        let (price_digits, _) = round_config_for_tick_size(tick_size)?;
        let trunc_scale = price_digits + 2;

        let (maker_amt, taker_amt) = match side {
            Side::Buy => {
                let maker_decimal = numeric::trunc_down(size * price, trunc_scale);
                (to_fixed_1e6(maker_decimal)?, to_fixed_1e6(size)?)
            }
            Side::Sell => {
                let taker_decimal = numeric::trunc_down(size * price, trunc_scale);
                (to_fixed_1e6(size)?, to_fixed_1e6(taker_decimal)?)
            }
        };

        let (maker, signature_type) = self.resolve_maker(signer)?;
        let salt = self.generate_salt();

        let order = Order {
            salt,
            maker,
            signer: signer.address(),
            taker: ZERO_ADDRESS,
            token_id,
            maker_amount: maker_amt,
            taker_amount: taker_amt,
            expiration: self.expiration,
            nonce: self.nonce,
            fee_rate_bps,
            side,
            signature_type,
        };

        sign_order(
            signer,
            exchange_address,
            order,
            None,
            self.order_type,
            self.post_only,
            self.defer_exec,
        )
    }

    /// Build and sign a market order. `amount` is denominated per `kind`
    /// (base-currency notional, or outcome shares). The book's opposing
    /// side is walked from worst to best to find the cutoff price.
    #[allow(clippy::too_many_arguments)]
    pub fn build_signed_market(
        self,
        signer: &dyn Signer,
        exchange_address: [u8; 20],
        exchange_min_tick: Decimal,
        exchange_fee_rate_bps: u32,
        book: &OrderBook,
        amount: Decimal,
        kind: MarketAmountKind,
    ) -> Result<SignedOrder> {
        self.validate_market_order_type()?;
        let side = self.side.ok_or_else(|| ClobError::InvalidPrice("side required".into()))?;
        let token_id = self
            .token_id
            .ok_or_else(|| ClobError::InvalidPrice("token_id required".into()))?;
        if side == Side::Sell && kind == MarketAmountKind::BaseCurrency {
            return Err(ClobError::InvalidSize(
                "SELL market orders must be denominated in shares".to_string(),
            ));
        }
        if amount <= Decimal::ZERO {
            return Err(ClobError::InvalidSize(format!("amount must be positive, got {amount}")));
        }

        let fok = matches!(self.order_type, OrderTimeInForce::Fok);
        let price = book.market_cutoff_price(side, amount, kind, fok)?;

        let tick_size = self.resolve_tick_size(exchange_min_tick)?;
        Self::check_bounds(price, Decimal::ONE, tick_size)?;
        let fee_rate_bps = self.resolve_fee_rate_bps(exchange_fee_rate_bps)?;
        let (price_digits, _) = round_config_for_tick_size(tick_size)?;
        let trunc_scale = price_digits + 2;

        let (maker_amt, taker_amt) = match (side, kind) {
            (Side::Buy, MarketAmountKind::BaseCurrency) => {
                let taker_decimal = numeric::trunc_down(amount / price, trunc_scale);
                (to_fixed_1e6(amount)?, to_fixed_1e6(taker_decimal)?)
            }
            (Side::Buy, MarketAmountKind::Shares) => {
                let maker_decimal = numeric::trunc_down(amount * price, trunc_scale);
                (to_fixed_1e6(maker_decimal)?, to_fixed_1e6(amount)?)
            }
            (Side::Sell, MarketAmountKind::Shares) => {
                let taker_decimal = numeric::trunc_down(amount * price, trunc_scale);
                (to_fixed_1e6(amount)?, to_fixed_1e6(taker_decimal)?)
            }
            (Side::Sell, MarketAmountKind::BaseCurrency) => unreachable!("rejected above"),
        };

        let (maker, signature_type) = self.resolve_maker(signer)?;
        let salt = self.generate_salt();

        let order = Order {
            salt,
            maker,
            signer: signer.address(),
            taker: ZERO_ADDRESS,
            token_id,
            maker_amount: maker_amt,
            taker_amount: taker_amt,
            expiration: 0,
            nonce: self.nonce,
            fee_rate_bps,
            side,
            signature_type,
        };

        sign_order(
            signer,
            exchange_address,
            order,
            None,
            self.order_type,
            false,
            self.defer_exec,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::{LocalSigner, PRIMARY_CHAIN_ID, SECONDARY_CHAIN_ID};
    use rust_decimal_macros::dec;

    const TEST_PK: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn exchange() -> [u8; 20] {
        crate::eth::parse_hex_20("0xdFE02Eb6733538f8Ea35D585af8DE5958AD99E40").unwrap()
    }

    #[test]
    fn s1_limit_order_amounts_match_reference_vector() {
        let signer = LocalSigner::from_private_key_hex(TEST_PK, SECONDARY_CHAIN_ID).unwrap();
        let signed = OrderBuilder::new()
            .token_id(Amount::from_u64(123))
            .side(Side::Buy)
            .price(dec!(0.5))
            .size(dec!(10))
            .salt_generator(|| 1)
            .build_signed_limit(&signer, exchange(), dec!(0.01), 0)
            .unwrap();
        assert_eq!(signed.order.maker_amount.to_string(), "5000000");
        assert_eq!(signed.order.taker_amount.to_string(), "10000000");
        assert_eq!(signed.order.side.as_signing_u8(), 0);
        assert_eq!(signed.order.maker, signer.address());
    }

    #[test]
    fn tick_size_override_below_minimum_errors() {
        let signer = LocalSigner::from_private_key_hex(TEST_PK, SECONDARY_CHAIN_ID).unwrap();
        let err = OrderBuilder::new()
            .token_id(Amount::from_u64(1))
            .side(Side::Buy)
            .price(dec!(0.5))
            .size(dec!(10))
            .tick_size(dec!(0.0001))
            .build_signed_limit(&signer, exchange(), dec!(0.01), 0)
            .unwrap_err();
        assert!(matches!(err, ClobError::InvalidPrice(_)));
    }

    #[test]
    fn fee_rate_conflict_errors() {
        let signer = LocalSigner::from_private_key_hex(TEST_PK, SECONDARY_CHAIN_ID).unwrap();
        let err = OrderBuilder::new()
            .token_id(Amount::from_u64(1))
            .side(Side::Buy)
            .price(dec!(0.5))
            .size(dec!(10))
            .fee_rate_bps(5)
            .build_signed_limit(&signer, exchange(), dec!(0.01), 10)
            .unwrap_err();
        assert!(matches!(err, ClobError::InvalidPrice(_)));
    }

    #[test]
    fn funder_override_requires_non_eoa_signature_type() {
        let signer = LocalSigner::from_private_key_hex(TEST_PK, PRIMARY_CHAIN_ID).unwrap();
        let err = OrderBuilder::new()
            .token_id(Amount::from_u64(1))
            .side(Side::Buy)
            .price(dec!(0.5))
            .size(dec!(10))
            .funder([0x22u8; 20])
            .signature_type(SignatureType::Eoa)
            .build_signed_limit(&signer, exchange(), dec!(0.01), 0)
            .unwrap_err();
        assert!(matches!(err, ClobError::InvalidSignature));
    }

    #[test]
    fn gtd_without_expiration_errors() {
        let signer = LocalSigner::from_private_key_hex(TEST_PK, SECONDARY_CHAIN_ID).unwrap();
        let err = OrderBuilder::new()
            .token_id(Amount::from_u64(1))
            .side(Side::Buy)
            .price(dec!(0.5))
            .size(dec!(10))
            .order_type(OrderTimeInForce::Gtd)
            .build_signed_limit(&signer, exchange(), dec!(0.01), 0)
            .unwrap_err();
        assert!(matches!(err, ClobError::InvalidPrice(_)));
    }

    #[test]
    fn salt_default_generator_is_bounded_to_53_bits() {
        let b = OrderBuilder::new();
        let salt = b.generate_salt();
        assert!(salt < (1u64 << 53));
    }

    #[test]
    fn s2_market_buy_amounts_match_reference_vector() {
        use crate::book::{BookLevel, OrderBook};

        let signer = LocalSigner::from_private_key_hex(TEST_PK, SECONDARY_CHAIN_ID).unwrap();
        let book = OrderBook {
            bids: vec![],
            asks: vec![
                BookLevel { price: dec!(0.60), size: dec!(100) },
                BookLevel { price: dec!(0.55), size: dec!(100) },
                BookLevel { price: dec!(0.50), size: dec!(100) },
            ],
            hash: "h".to_string(),
        };
        let signed = OrderBuilder::new()
            .token_id(Amount::from_u64(123))
            .side(Side::Buy)
            .order_type(OrderTimeInForce::Fak)
            .salt_generator(|| 1)
            .build_signed_market(
                &signer,
                exchange(),
                dec!(0.01),
                0,
                &book,
                dec!(50),
                MarketAmountKind::BaseCurrency,
            )
            .unwrap();
        assert_eq!(signed.order.maker_amount.to_string(), "50000000");
        assert_eq!(signed.order.taker_amount.to_string(), "100000000");
    }

    #[test]
    fn configured_token_id_reflects_setter() {
        let b = OrderBuilder::new();
        assert!(b.configured_token_id().is_none());
        let b = b.token_id(Amount::from_u64(42));
        assert_eq!(b.configured_token_id(), Some(Amount::from_u64(42)));
    }
}
