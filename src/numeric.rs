//! Fixed-precision decimal and 256-bit fixed-point primitives shared by the
//! order builder, signer, and wire codecs.

use ethereum_types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

/// On-chain amount: a 256-bit unsigned integer, serialized as a decimal
/// string by default (the order payload's wire shape), with an explicit
/// hex codec for fields that travel as `0x`-prefixed hex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(pub U256);

impl Amount {
    pub fn zero() -> Self {
        Amount(U256::zero())
    }

    pub fn from_u64(v: u64) -> Self {
        Amount(U256::from(v))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{:x}", self.0)
    }

    pub fn from_hex(s: &str) -> anyhow::Result<Self> {
        let raw = s.trim().strip_prefix("0x").unwrap_or(s.trim());
        Ok(Amount(U256::from_str_radix(raw, 16)?))
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Amount(U256::from_dec_str(s)?))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Amount::from_str(&raw).map_err(serde::de::Error::custom)
    }
}

/// Count of significant fractional decimal digits in a decimal string
/// (e.g. `"0.001"` -> 3, `"1"` -> 0). Used by tick-size and lot-size checks.
pub fn decimal_places(d: Decimal) -> u32 {
    d.normalize().scale()
}

/// Truncate `d` toward zero to `places` fractional digits.
pub fn trunc_down(d: Decimal, places: u32) -> Decimal {
    d.trunc_with_scale(places)
}

/// Truncate `d` away from zero to `places` fractional digits (round up the
/// last kept digit if anything would be discarded).
pub fn trunc_up(d: Decimal, places: u32) -> Decimal {
    let down = trunc_down(d, places);
    if down == d {
        down
    } else {
        let step = Decimal::new(1, places);
        down + step
    }
}

/// Convert a human-facing decimal quantity (at most 6 decimal places) into
/// its on-chain fixed-point `Amount` (base unit = 10^-6).
pub fn to_fixed_1e6(d: Decimal) -> anyhow::Result<Amount> {
    let scaled = trunc_down(d, 6) * Decimal::new(1_000_000, 0);
    let int = scaled
        .to_string()
        .split('.')
        .next()
        .unwrap_or("0")
        .to_string();
    Ok(Amount(U256::from_dec_str(&int)?))
}
