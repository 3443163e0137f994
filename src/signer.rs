use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};

use crate::error::{ClobError, Result};
use crate::eth;

/// Primary chain factory/init-code constants. Only the primary chain has a
/// deployed proxy-wallet factory; the secondary chain has neither.
const PROXY_FACTORY_HEX: &str = "0xaB45c5A4B0c941a2F231C04C3f49182e1A254052";
const PROXY_INIT_CODE_HASH_HEX: &str =
    "d21df8dc65880a8606f09fe0ce3df9b8869287ab0b058be05aa9e8af6330a00b";
const SAFE_FACTORY_HEX: &str = "0xaacFeEa03eb1561C4e67d661e40682Bd20E3541b";
const SAFE_INIT_CODE_HASH_HEX: &str =
    "2bce2127ff07fb632d16c8347c4ebf501f4841168bed00d9e6ef715ddb6fcecf";
pub const PRIMARY_CHAIN_ID: u64 = 137;
pub const SECONDARY_CHAIN_ID: u64 = 80002;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn as_signing_u8(self) -> u8 {
        match self {
            Side::Buy => 0,
            Side::Sell => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureType {
    Eoa = 0,
    Proxy = 1,
    Multisig = 2,
}

/// Abstracts over concrete key material so an alternate signer (hardware
/// wallet, remote KMS) can be substituted without touching any downstream
/// component. The only implementation shipped here is [`LocalSigner`].
pub trait Signer: Send + Sync {
    fn address(&self) -> [u8; 20];
    fn address_checksum(&self) -> String;
    fn chain_id(&self) -> u64;
    fn sign_preimage(&self, preimage: &[u8]) -> Result<String>;
}

#[derive(Debug)]
pub struct LocalSigner {
    signing_key: SigningKey,
    address_bytes: [u8; 20],
    address_checksum: String,
    chain_id: u64,
}

impl LocalSigner {
    pub fn from_private_key_hex(private_key_hex: &str, chain_id: u64) -> Result<Self> {
        let pk32 = eth::parse_hex_32(private_key_hex).map_err(ClobError::Other)?;
        let signing_key =
            SigningKey::from_bytes((&pk32).into()).map_err(|e| ClobError::Signer(e.to_string()))?;
        let address_bytes = eth::address_from_signing_key(&signing_key);
        let address_checksum = eth::eip55_checksum_address(address_bytes);
        Ok(Self {
            signing_key,
            address_bytes,
            address_checksum,
            chain_id,
        })
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }
}

impl Signer for LocalSigner {
    fn address(&self) -> [u8; 20] {
        self.address_bytes
    }

    fn address_checksum(&self) -> String {
        self.address_checksum.clone()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn sign_preimage(&self, preimage: &[u8]) -> Result<String> {
        eth::sign_keccak256_hex_0x(&self.signing_key, preimage).map_err(ClobError::Other)
    }
}

/// Deterministic proxy-wallet address for `eoa` on `chain_id`.
pub fn derive_proxy_address(eoa: [u8; 20], chain_id: u64) -> Result<[u8; 20]> {
    if chain_id != PRIMARY_CHAIN_ID {
        return Err(ClobError::ProxyUnsupported { chain_id });
    }
    let factory = eth::parse_hex_20(PROXY_FACTORY_HEX).expect("valid constant");
    let init_code_hash = eth::parse_hex_32(PROXY_INIT_CODE_HASH_HEX).expect("valid constant");
    let salt = eth::keccak256(&eoa);
    Ok(eth::create2_address(factory, salt, init_code_hash))
}

/// Deterministic multisig (Gnosis-Safe-style) wallet address for `eoa` on
/// `chain_id`.
pub fn derive_multisig_address(eoa: [u8; 20], chain_id: u64) -> Result<[u8; 20]> {
    if chain_id != PRIMARY_CHAIN_ID {
        return Err(ClobError::SafeUnsupported { chain_id });
    }
    let factory = eth::parse_hex_20(SAFE_FACTORY_HEX).expect("valid constant");
    let init_code_hash = eth::parse_hex_32(SAFE_INIT_CODE_HASH_HEX).expect("valid constant");
    let salt = eth::keccak256(&eth::left_pad_32(eoa));
    Ok(eth::create2_address(factory, salt, init_code_hash))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_PK: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn local_signer_derives_checksummed_address() {
        let signer = LocalSigner::from_private_key_hex(TEST_PK, PRIMARY_CHAIN_ID).unwrap();
        assert!(signer.address_checksum().starts_with("0x"));
        assert_eq!(signer.address_checksum().len(), 42);
    }

    #[test]
    fn proxy_derivation_fails_on_secondary_chain() {
        let signer = LocalSigner::from_private_key_hex(TEST_PK, SECONDARY_CHAIN_ID).unwrap();
        let err = derive_proxy_address(signer.address(), SECONDARY_CHAIN_ID).unwrap_err();
        assert!(matches!(err, ClobError::ProxyUnsupported { chain_id: 80002 }));
    }

    #[test]
    fn proxy_derivation_is_deterministic() {
        let eoa = [0x11u8; 20];
        let a = derive_proxy_address(eoa, PRIMARY_CHAIN_ID).unwrap();
        let b = derive_proxy_address(eoa, PRIMARY_CHAIN_ID).unwrap();
        assert_eq!(a, b);
        let multisig = derive_multisig_address(eoa, PRIMARY_CHAIN_ID).unwrap();
        assert_ne!(a, multisig);
    }
}
