use thiserror::Error;

/// Stable, matchable error taxonomy for every public operation in this crate.
///
/// Variants compare by discriminant; callers that need the original wire
/// code should use [`ClobError::code`] rather than matching on `Display`
/// text.
#[derive(Error, Debug)]
pub enum ClobError {
    #[error("no signer configured for this operation")]
    MissingSigner,
    #[error("no API credentials configured for this operation")]
    MissingCreds,
    #[error("no builder config configured for builder-attributed request")]
    MissingBuilderConfig,
    #[error("signature did not recover to the expected address")]
    InvalidSignature,
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("chain {chain_id} has no configured proxy-wallet factory")]
    ProxyUnsupported { chain_id: u64 },
    #[error("chain {chain_id} has no configured multisig-wallet factory")]
    SafeUnsupported { chain_id: u64 },

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("rate limit exceeded")]
    RateLimitExceeded,
    #[error("order not found: {0}")]
    OrderNotFound(String),
    #[error("market is closed")]
    MarketClosed,
    #[error("request blocked for regulatory/geographic reasons")]
    Geoblocked,
    #[error("invalid price: {0}")]
    InvalidPrice(String),
    #[error("invalid size: {0}")]
    InvalidSize(String),
    #[error("insufficient liquidity to fill requested amount")]
    InsufficientLiquidity,

    #[error("transport error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("internal server error: {0}")]
    InternalServerError(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("circuit open, request not attempted")]
    CircuitOpen,
    #[error("too many requests")]
    TooManyRequests,

    #[error("missing request: {0}")]
    MissingRequest(String),
    #[error("missing user: {0}")]
    MissingUser(String),
    #[error("invalid market filter: {0}")]
    InvalidMarketFilter(String),
    #[error("invalid trade filter: {0}")]
    InvalidTradeFilter(String),

    #[error("invalid subscription: {0}")]
    InvalidSubscription(String),
    #[error("lagged on channel {channel}, dropped {dropped} events")]
    Lagged { channel: String, dropped: u64 },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("signer error: {0}")]
    Signer(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClobError {
    /// The stable wire code for variants classified from an HTTP error
    /// response, for callers that want to match on the original string.
    pub fn code(&self) -> &'static str {
        match self {
            ClobError::MissingSigner => "MISSING_SIGNER",
            ClobError::MissingCreds => "MISSING_CREDS",
            ClobError::MissingBuilderConfig => "MISSING_BUILDER_CONFIG",
            ClobError::InvalidSignature => "INVALID_SIGNATURE",
            ClobError::Unauthorized(_) => "UNAUTHORIZED",
            ClobError::ProxyUnsupported { .. } => "PROXY_UNSUPPORTED",
            ClobError::SafeUnsupported { .. } => "SAFE_UNSUPPORTED",
            ClobError::InsufficientFunds(_) => "INSUFFICIENT_FUNDS",
            ClobError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ClobError::OrderNotFound(_) => "ORDER_NOT_FOUND",
            ClobError::MarketClosed => "MARKET_CLOSED",
            ClobError::Geoblocked => "GEOBLOCKED",
            ClobError::InvalidPrice(_) => "INVALID_PRICE",
            ClobError::InvalidSize(_) => "INVALID_SIZE",
            ClobError::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            ClobError::Network(_) => "NETWORK",
            ClobError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
            ClobError::BadRequest(_) => "BAD_REQUEST",
            ClobError::CircuitOpen => "CIRCUIT_OPEN",
            ClobError::TooManyRequests => "TOO_MANY_REQUESTS",
            ClobError::MissingRequest(_) => "MISSING_REQUEST",
            ClobError::MissingUser(_) => "MISSING_USER",
            ClobError::InvalidMarketFilter(_) => "INVALID_MARKET_FILTER",
            ClobError::InvalidTradeFilter(_) => "INVALID_TRADE_FILTER",
            ClobError::InvalidSubscription(_) => "INVALID_SUBSCRIPTION",
            ClobError::Lagged { .. } => "LAGGED",
            ClobError::WebSocket(_) => "WEBSOCKET",
            ClobError::Json(_) => "JSON",
            ClobError::Signer(_) => "SIGNER",
            ClobError::Other(_) => "OTHER",
        }
    }

    /// Classify a decoded exchange error body against the taxonomy above.
    /// `code` is matched first (exact, case-insensitive); `status` is the
    /// fallback when the code is absent or unrecognized.
    pub fn from_response(status: u16, code: Option<&str>, message: &str) -> Self {
        if let Some(code) = code {
            if let Some(err) = Self::from_code(code, message) {
                return err;
            }
        }
        match status {
            401 | 403 => {
                if message.to_uppercase().contains("GEO") {
                    ClobError::Geoblocked
                } else {
                    ClobError::Unauthorized(message.to_string())
                }
            }
            429 => ClobError::RateLimitExceeded,
            400..=499 => ClobError::BadRequest(message.to_string()),
            500..=599 => ClobError::InternalServerError(message.to_string()),
            _ => ClobError::BadRequest(message.to_string()),
        }
    }

    fn from_code(code: &str, message: &str) -> Option<Self> {
        Some(match code.to_uppercase().as_str() {
            "INSUFFICIENT_FUNDS" => ClobError::InsufficientFunds(message.to_string()),
            "RATE_LIMIT_EXCEEDED" => ClobError::RateLimitExceeded,
            "ORDER_NOT_FOUND" => ClobError::OrderNotFound(message.to_string()),
            "MARKET_CLOSED" => ClobError::MarketClosed,
            "GEOBLOCKED" => ClobError::Geoblocked,
            "INVALID_PRICE" => ClobError::InvalidPrice(message.to_string()),
            "INVALID_SIZE" => ClobError::InvalidSize(message.to_string()),
            "INSUFFICIENT_LIQUIDITY" => ClobError::InsufficientLiquidity,
            "MISSING_REQUEST" => ClobError::MissingRequest(message.to_string()),
            "MISSING_USER" => ClobError::MissingUser(message.to_string()),
            "INVALID_MARKET_FILTER" => ClobError::InvalidMarketFilter(message.to_string()),
            "INVALID_TRADE_FILTER" => ClobError::InvalidTradeFilter(message.to_string()),
            _ => return None,
        })
    }
}

pub type Result<T> = std::result::Result<T, ClobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_is_total_over_known_codes() {
        assert!(matches!(
            ClobError::from_response(400, Some("INSUFFICIENT_FUNDS"), "nope"),
            ClobError::InsufficientFunds(_)
        ));
        assert!(matches!(
            ClobError::from_response(429, None, "slow down"),
            ClobError::RateLimitExceeded
        ));
        assert!(matches!(
            ClobError::from_response(403, None, "GEO restricted"),
            ClobError::Geoblocked
        ));
        assert!(matches!(
            ClobError::from_response(500, None, "boom"),
            ClobError::InternalServerError(_)
        ));
        assert_eq!(ClobError::RateLimitExceeded.code(), "RATE_LIMIT_EXCEEDED");
    }
}
