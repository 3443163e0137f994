use ethereum_types::U256;

use crate::error::{ClobError, Result};
use crate::eth;
use crate::order::types::{Order, SignedOrder};
use crate::signer::Signer;

const EXCHANGE_DOMAIN_NAME: &str = "Polymarket CTF Exchange";
const EXCHANGE_DOMAIN_VERSION: &str = "1";

fn abi_word_u64(x: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&x.to_be_bytes());
    out
}

fn abi_word_u256(x: U256) -> [u8; 32] {
    eth::u256_be(x)
}

fn abi_word_address(addr: [u8; 20]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(&addr);
    out
}

fn abi_encode(words: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 32);
    for w in words {
        out.extend_from_slice(w);
    }
    out
}

pub fn domain_separator_exchange(chain_id: u64, verifying_contract: [u8; 20]) -> [u8; 32] {
    let type_hash = eth::keccak256(
        b"EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)",
    );
    let name_hash = eth::keccak256(EXCHANGE_DOMAIN_NAME.as_bytes());
    let version_hash = eth::keccak256(EXCHANGE_DOMAIN_VERSION.as_bytes());
    let chain_word = abi_word_u64(chain_id);
    let vc_word = abi_word_address(verifying_contract);
    eth::keccak256(&abi_encode(&[
        type_hash,
        name_hash,
        version_hash,
        chain_word,
        vc_word,
    ]))
}

pub fn order_struct_hash(o: &Order) -> [u8; 32] {
    let type_hash = eth::keccak256(b"Order(uint256 salt,address maker,address signer,address taker,uint256 tokenId,uint256 makerAmount,uint256 takerAmount,uint256 expiration,uint256 nonce,uint256 feeRateBps,uint8 side,uint8 signatureType)");

    let enc = abi_encode(&[
        type_hash,
        abi_word_u64(o.salt),
        abi_word_address(o.maker),
        abi_word_address(o.signer),
        abi_word_address(o.taker),
        abi_word_u256(o.token_id.0),
        abi_word_u256(o.maker_amount.0),
        abi_word_u256(o.taker_amount.0),
        abi_word_u64(o.expiration),
        abi_word_u64(o.nonce),
        abi_word_u64(o.fee_rate_bps as u64),
        abi_word_u64(o.side.as_signing_u8() as u64),
        abi_word_u64(o.signature_type as u64),
    ]);
    eth::keccak256(&enc)
}

fn eip712_preimage(domain_sep: [u8; 32], struct_hash: [u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + 32 + 32);
    out.extend_from_slice(b"\x19\x01");
    out.extend_from_slice(&domain_sep);
    out.extend_from_slice(&struct_hash);
    out
}

/// Sign an already-built [`Order`], producing the wire-ready [`SignedOrder`].
/// `owner` defaults to the caller's L2 API key, falling back to the signer
/// address, per the credential-header contract.
pub fn sign_order(
    signer: &dyn Signer,
    exchange_address: [u8; 20],
    order: Order,
    owner: Option<String>,
    order_type: crate::order::types::OrderTimeInForce,
    post_only: bool,
    defer_exec: bool,
) -> Result<SignedOrder> {
    if order.signer != signer.address() {
        return Err(ClobError::InvalidSignature);
    }
    let domain = domain_separator_exchange(signer.chain_id(), exchange_address);
    let struct_hash = order_struct_hash(&order);
    let preimage = eip712_preimage(domain, struct_hash);
    let signature = signer.sign_preimage(&preimage)?;
    let owner = owner.unwrap_or_else(|| signer.address_checksum());

    Ok(SignedOrder {
        order,
        signature,
        owner,
        order_type,
        post_only,
        defer_exec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::Amount;
    use crate::signer::{LocalSigner, SignatureType, Side};

    const TEST_PK: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn signature_recovers_to_signer_address() {
        let signer = LocalSigner::from_private_key_hex(TEST_PK, crate::signer::SECONDARY_CHAIN_ID)
            .unwrap();
        let exchange = eth::parse_hex_20("0xdFE02Eb6733538f8Ea35D585af8DE5958AD99E40").unwrap();
        let order = Order {
            salt: 1,
            maker: signer.address(),
            signer: signer.address(),
            taker: [0u8; 20],
            token_id: Amount::from_u64(100),
            maker_amount: Amount::from_u64(50_000_000),
            taker_amount: Amount::from_u64(100_000_000),
            expiration: 0,
            nonce: 0,
            fee_rate_bps: 0,
            side: Side::Buy,
            signature_type: SignatureType::Eoa,
        };
        let signed = sign_order(
            &signer,
            exchange,
            order,
            None,
            crate::order::types::OrderTimeInForce::Gtc,
            false,
            false,
        )
        .unwrap();
        assert!(signed.signature.starts_with("0x"));
        assert_eq!(signed.signature.len(), 2 + 130);
        let v = u8::from_str_radix(&signed.signature[signed.signature.len() - 2..], 16).unwrap();
        assert!(v == 27 || v == 28);
    }
}
