//! Level-1 (wallet) and Level-2 (HMAC) credential header builders, plus
//! builder-attribution headers computed locally or via a remote signer.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use hmac::Mac as _;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::{ClobError, Result};
use crate::eth;
use crate::signer::Signer;

pub const POLY_ADDRESS: &str = "POLY_ADDRESS";
pub const POLY_SIGNATURE: &str = "POLY_SIGNATURE";
pub const POLY_TIMESTAMP: &str = "POLY_TIMESTAMP";
pub const POLY_NONCE: &str = "POLY_NONCE";
pub const POLY_API_KEY: &str = "POLY_API_KEY";
pub const POLY_PASSPHRASE: &str = "POLY_PASSPHRASE";
pub const POLY_BUILDER_API_KEY: &str = "POLY_BUILDER_API_KEY";
pub const POLY_BUILDER_PASSPHRASE: &str = "POLY_BUILDER_PASSPHRASE";
pub const POLY_BUILDER_TIMESTAMP: &str = "POLY_BUILDER_TIMESTAMP";
pub const POLY_BUILDER_SIGNATURE: &str = "POLY_BUILDER_SIGNATURE";

const CLOB_DOMAIN_NAME: &str = "ClobAuthDomain";
const CLOB_DOMAIN_VERSION: &str = "1";
const CLOB_AUTH_MESSAGE: &str = "This message attests that I control the given wallet";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiKey {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

/// Either a locally-held builder credential, or a remote signer service
/// that computes builder-attribution headers on our behalf.
#[derive(Clone, Debug)]
pub enum BuilderConfig {
    Local(ApiKey),
    Remote { host: String, token: Option<String> },
}

impl BuilderConfig {
    pub fn is_valid(&self) -> bool {
        match self {
            BuilderConfig::Local(creds) => {
                !creds.api_key.is_empty() && !creds.secret.is_empty() && !creds.passphrase.is_empty()
            }
            BuilderConfig::Remote { host, .. } => !host.is_empty(),
        }
    }
}

pub fn now_unix_s() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Decode a base64 secret, tolerating any of the four common variants
/// (standard/url-safe, padded/unpadded) the exchange has historically
/// issued credentials in.
pub fn decode_secret(secret: &str) -> Result<Vec<u8>> {
    for engine in [&STANDARD, &URL_SAFE, &URL_SAFE_NO_PAD] {
        if let Ok(bytes) = engine.decode(secret) {
            return Ok(bytes);
        }
    }
    if let Ok(bytes) = base64::engine::general_purpose::STANDARD_NO_PAD.decode(secret) {
        return Ok(bytes);
    }
    Err(ClobError::Signer(format!(
        "secret is not valid base64 in any known variant (len={})",
        secret.len()
    )))
}

fn abi_word_address(addr: [u8; 20]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(&addr);
    out
}

fn abi_word_u64(x: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&x.to_be_bytes());
    out
}

fn abi_encode(words: &[[u8; 32]]) -> Vec<u8> {
    let mut out = Vec::with_capacity(words.len() * 32);
    for w in words {
        out.extend_from_slice(w);
    }
    out
}

fn domain_separator_clob(chain_id: u64) -> [u8; 32] {
    let type_hash = eth::keccak256(b"EIP712Domain(string name,string version,uint256 chainId)");
    let name_hash = eth::keccak256(CLOB_DOMAIN_NAME.as_bytes());
    let version_hash = eth::keccak256(CLOB_DOMAIN_VERSION.as_bytes());
    let chain_word = abi_word_u64(chain_id);
    eth::keccak256(&abi_encode(&[type_hash, name_hash, version_hash, chain_word]))
}

fn clob_auth_struct_hash(address: [u8; 20], timestamp_s: u64, nonce: u64) -> [u8; 32] {
    let type_hash =
        eth::keccak256(b"ClobAuth(address address,string timestamp,uint256 nonce,string message)");
    let addr_word = abi_word_address(address);
    let ts_hash = eth::keccak256(timestamp_s.to_string().as_bytes());
    let nonce_word = abi_word_u64(nonce);
    let msg_hash = eth::keccak256(CLOB_AUTH_MESSAGE.as_bytes());
    eth::keccak256(&abi_encode(&[
        type_hash, addr_word, ts_hash, nonce_word, msg_hash,
    ]))
}

fn eip712_preimage(domain_sep: [u8; 32], struct_hash: [u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + 32 + 32);
    out.extend_from_slice(b"\x19\x01");
    out.extend_from_slice(&domain_sep);
    out.extend_from_slice(&struct_hash);
    out
}

/// Build the Level-1 (wallet-signature) header set for account-management
/// endpoints (`/auth/api-key`, `/auth/derive-api-key`).
pub fn create_level1_headers(
    signer: &dyn Signer,
    nonce: u64,
    timestamp_s: Option<u64>,
) -> Result<HashMap<String, String>> {
    let timestamp_s = timestamp_s.unwrap_or_else(now_unix_s);
    let domain = domain_separator_clob(signer.chain_id());
    let struct_hash = clob_auth_struct_hash(signer.address(), timestamp_s, nonce);
    let preimage = eip712_preimage(domain, struct_hash);
    let signature = signer.sign_preimage(&preimage)?;

    let mut headers = HashMap::new();
    headers.insert(POLY_ADDRESS.to_string(), signer.address_checksum());
    headers.insert(POLY_SIGNATURE.to_string(), signature);
    headers.insert(POLY_TIMESTAMP.to_string(), timestamp_s.to_string());
    headers.insert(POLY_NONCE.to_string(), nonce.to_string());
    Ok(headers)
}

/// The exchange's HMAC canonicalization: every single-quote in the body is
/// rewritten to a double-quote before signing.
fn canonicalize_body(body: Option<&str>) -> String {
    match body {
        Some(b) if !b.is_empty() => b.replace('\'', "\""),
        _ => String::new(),
    }
}

fn hmac_sign(secret: &[u8], message: &str) -> Result<String> {
    type HmacSha256 = hmac::Hmac<Sha256>;
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| ClobError::Signer(e.to_string()))?;
    mac.update(message.as_bytes());
    let sig_bytes = mac.finalize().into_bytes();
    Ok(URL_SAFE.encode(sig_bytes))
}

/// Build the Level-2 (HMAC) header set used for all authenticated calls
/// other than account-management.
pub fn create_level2_headers(
    signer: &dyn Signer,
    creds: &ApiKey,
    method: &str,
    request_path: &str,
    body: Option<&str>,
    timestamp_s: Option<u64>,
) -> Result<HashMap<String, String>> {
    let timestamp_s = timestamp_s.unwrap_or_else(now_unix_s);
    let ts = timestamp_s.to_string();
    let secret = decode_secret(&creds.secret)?;

    let mut msg = String::new();
    msg.push_str(&ts);
    msg.push_str(method);
    msg.push_str(request_path);
    msg.push_str(&canonicalize_body(body));

    let sig_b64 = hmac_sign(&secret, &msg)?;

    let mut headers = HashMap::new();
    headers.insert(POLY_ADDRESS.to_string(), signer.address_checksum());
    headers.insert(POLY_SIGNATURE.to_string(), sig_b64);
    headers.insert(POLY_TIMESTAMP.to_string(), ts);
    headers.insert(POLY_API_KEY.to_string(), creds.api_key.clone());
    headers.insert(POLY_PASSPHRASE.to_string(), creds.passphrase.clone());
    Ok(headers)
}

/// Build the `POLY_BUILDER_*` header set for builder-attributed requests.
/// Remote attribution is handled by the caller (the HTTP pipeline), which
/// POSTs `{method, path, body, timestamp}` to the remote signer and copies
/// back the four headers it returns; this function only covers the local
/// (self-signed) case.
pub fn create_local_builder_headers(
    creds: &ApiKey,
    method: &str,
    request_path: &str,
    body: Option<&str>,
    timestamp_s: Option<u64>,
) -> Result<HashMap<String, String>> {
    let timestamp_s = timestamp_s.unwrap_or_else(now_unix_s);
    let ts = timestamp_s.to_string();
    let secret = decode_secret(&creds.secret)?;

    let mut msg = String::new();
    msg.push_str(&ts);
    msg.push_str(method);
    msg.push_str(request_path);
    msg.push_str(&canonicalize_body(body));

    let sig_b64 = hmac_sign(&secret, &msg)?;

    let mut headers = HashMap::new();
    headers.insert(POLY_BUILDER_API_KEY.to_string(), creds.api_key.clone());
    headers.insert(POLY_BUILDER_PASSPHRASE.to_string(), creds.passphrase.clone());
    headers.insert(POLY_BUILDER_TIMESTAMP.to_string(), ts);
    headers.insert(POLY_BUILDER_SIGNATURE.to_string(), sig_b64);
    Ok(headers)
}

pub fn map_to_headermap(map: &HashMap<String, String>) -> Result<reqwest::header::HeaderMap> {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
    let mut out = HeaderMap::new();
    for (k, v) in map {
        let name = HeaderName::from_bytes(k.as_bytes())
            .map_err(|e| ClobError::Signer(format!("invalid header name {k}: {e}")))?;
        let val = HeaderValue::from_str(v)
            .map_err(|e| ClobError::Signer(format!("invalid header value for {k}: {e}")))?;
        out.insert(name, val);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hmac_signature_matches_known_vector() {
        // secret_raw=b"abc"; secret_b64 = urlsafe_b64encode(secret_raw) = "YWJj"
        // msg = "1700000000POST/order{}"
        let creds = ApiKey {
            api_key: "k".to_string(),
            secret: "YWJj".to_string(),
            passphrase: "p".to_string(),
        };
        let secret = decode_secret(&creds.secret).unwrap();
        let sig = hmac_sign(&secret, "1700000000POST/order{}").unwrap();
        assert_eq!(sig, "MBAD1bcrB1PsSYNZemDF5QV7g_V_e2YDSAz4lgA_bAs=");
    }

    #[test]
    fn decode_secret_accepts_multiple_variants() {
        let raw = b"hello world";
        let std_b64 = STANDARD.encode(raw);
        let url_b64 = URL_SAFE.encode(raw);
        let url_nopad = URL_SAFE_NO_PAD.encode(raw);
        assert_eq!(decode_secret(&std_b64).unwrap(), raw);
        assert_eq!(decode_secret(&url_b64).unwrap(), raw);
        assert_eq!(decode_secret(&url_nopad).unwrap(), raw);
    }

    #[test]
    fn canonicalize_body_rewrites_single_quotes() {
        assert_eq!(canonicalize_body(Some("{'a':1}")), "{\"a\":1}");
        assert_eq!(canonicalize_body(None), "");
    }

    #[test]
    fn builder_config_validity() {
        let local = BuilderConfig::Local(ApiKey {
            api_key: "k".into(),
            secret: "s".into(),
            passphrase: "p".into(),
        });
        assert!(local.is_valid());
        let remote = BuilderConfig::Remote {
            host: String::new(),
            token: None,
        };
        assert!(!remote.is_valid());
    }
}
