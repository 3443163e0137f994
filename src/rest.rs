//! Thin REST endpoint handlers over [`crate::http::Pipeline`]. Each
//! function's entire body is "serialize request shape, call, decode
//! response shape" — no independent logic.

use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::credentials::ApiKey;
use crate::error::Result;
use crate::http::Pipeline;
use crate::numeric::Amount;
use crate::order::types::PostOrderBody;
use crate::order::SignedOrder;
use crate::signer::{Side, Signer};

#[derive(Debug, Deserialize)]
pub struct TickSizeResponse {
    #[serde(rename = "minimum_tick_size")]
    pub minimum_tick_size: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct FeeRateResponse {
    #[serde(rename = "fee_rate_bps")]
    pub fee_rate_bps: u32,
}

#[derive(Debug, Serialize)]
struct OrderId<'a> {
    #[serde(rename = "orderId")]
    order_id: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderIds<'a> {
    #[serde(rename = "orderIds")]
    order_ids: &'a [String],
}

#[derive(Debug, Deserialize)]
pub struct PostOrderResponse {
    pub success: bool,
    #[serde(rename = "orderId", default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Trade {
    pub id: String,
    pub market: String,
    pub price: Decimal,
    pub size: Decimal,
    pub side: String,
}

#[derive(Debug, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub market: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct BalanceAllowance {
    pub balance: Amount,
    pub allowance: Amount,
}

impl Pipeline {
    pub async fn get_tick_size(&self, token_id: Amount) -> Result<Decimal> {
        let query = [("token_id", token_id.to_string())];
        let resp: TickSizeResponse = self
            .call(Method::GET, "/tick-size", Some(&query), None::<&()>, None, false)
            .await?;
        Ok(resp.minimum_tick_size)
    }

    pub async fn get_fee_rate_bps(&self, token_id: Amount) -> Result<u32> {
        let query = [("token_id", token_id.to_string())];
        let resp: FeeRateResponse = self
            .call(Method::GET, "/fee-rate-bps", Some(&query), None::<&()>, None, false)
            .await?;
        Ok(resp.fee_rate_bps)
    }

    pub async fn post_order(&self, signed: &SignedOrder) -> Result<PostOrderResponse> {
        let body: PostOrderBody = signed.to_post_body();
        self.call(Method::POST, "/order", None, Some(&body), None, true).await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<PostOrderResponse> {
        let body = OrderId { order_id };
        self.call(Method::DELETE, "/order", None, Some(&body), None, true).await
    }

    pub async fn cancel_orders(&self, order_ids: &[String]) -> Result<PostOrderResponse> {
        let body = OrderIds { order_ids };
        self.call(Method::DELETE, "/orders", None, Some(&body), None, true).await
    }

    pub async fn cancel_all(&self) -> Result<PostOrderResponse> {
        self.call(Method::DELETE, "/cancel-all", None, None::<&()>, None, true).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<OrderRecord> {
        let query = [("id", order_id.to_string())];
        self.call(Method::GET, "/order", Some(&query), None::<&()>, None, true).await
    }

    pub async fn get_orders(&self) -> Result<Vec<OrderRecord>> {
        self.paginate("/orders", &[], true).await
    }

    pub async fn get_trades(&self) -> Result<Vec<Trade>> {
        self.paginate("/trades", &[], true).await
    }

    pub async fn get_balance_allowance(&self, token_id: Amount) -> Result<BalanceAllowance> {
        let query = [("token_id", token_id.to_string())];
        self.call(
            Method::GET,
            "/balance-allowance",
            Some(&query),
            None::<&()>,
            None,
            true,
        )
        .await
    }

    pub async fn get_spread(&self, token_id: Amount, side: Option<Side>) -> Result<Decimal> {
        #[derive(Deserialize)]
        struct SpreadResponse {
            spread: Decimal,
        }
        let mut query = vec![("token_id", token_id.to_string())];
        if let Some(side) = side {
            query.push(("side", side.as_wire_str().to_string()));
        }
        let resp: SpreadResponse = self
            .call(Method::GET, "/spread", Some(&query), None::<&()>, None, false)
            .await?;
        Ok(resp.spread)
    }

    /// Account-management: create a fresh API key, authenticated with
    /// Level-1 (wallet-signature) headers injected as `extra_headers`.
    pub async fn create_api_key(&self, signer: &dyn Signer, nonce: u64) -> Result<ApiKey> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "apiKey")]
            api_key: String,
            secret: String,
            passphrase: String,
        }
        let l1 = crate::credentials::create_level1_headers(signer, nonce, None)?;
        let raw: Raw = self
            .call(Method::POST, "/auth/api-key", None, None::<&()>, Some(l1), false)
            .await?;
        Ok(ApiKey {
            api_key: raw.api_key,
            secret: raw.secret,
            passphrase: raw.passphrase,
        })
    }

    /// Account-management fallback: derive existing credentials for this
    /// (address, nonce) pair.
    pub async fn derive_api_key(&self, signer: &dyn Signer, nonce: u64) -> Result<ApiKey> {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(rename = "apiKey")]
            api_key: String,
            secret: String,
            passphrase: String,
        }
        let l1 = crate::credentials::create_level1_headers(signer, nonce, None)?;
        let raw: Raw = self
            .call(Method::GET, "/auth/derive-api-key", None, None::<&()>, Some(l1), false)
            .await?;
        Ok(ApiKey {
            api_key: raw.api_key,
            secret: raw.secret,
            passphrase: raw.passphrase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_id_body_uses_camel_case_key() {
        let body = OrderId { order_id: "abc" };
        assert_eq!(serde_json::to_string(&body).unwrap(), r#"{"orderId":"abc"}"#);
    }

    #[test]
    fn order_ids_body_uses_camel_case_key() {
        let ids = vec!["a".to_string(), "b".to_string()];
        let body = OrderIds { order_ids: &ids };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"orderIds":["a","b"]}"#
        );
    }
}
