//! Request-for-quote lifecycle: create/cancel/list requests and quotes,
//! fetch the best quote, and finalize a trade with a fully signed order.
//! Reuses the order builder, signer, and HTTP pipeline exactly as the REST
//! surface does; no independent validation or retry logic.

use reqwest::Method;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http::Pipeline;
use crate::order::SignedOrder;
use crate::rest::PostOrderResponse;
use crate::signer::Side;

#[derive(Debug, Clone, Serialize)]
pub struct CreateRequestBody {
    pub token_id: String,
    pub side: Side,
    pub size: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RfqRequest {
    pub id: String,
    pub token_id: String,
    pub side: Side,
    pub size: Decimal,
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateQuoteBody {
    pub request_id: String,
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RfqQuote {
    pub id: String,
    pub request_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub state: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuoteFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Ack {
    pub success: bool,
}

#[derive(Debug, Serialize)]
struct FinalizeBody {
    request_id: String,
    quote_id: String,
    order: crate::order::types::OrderJson,
    signature: String,
}

impl Pipeline {
    pub async fn rfq_create_request(&self, body: &CreateRequestBody) -> Result<RfqRequest> {
        self.call(Method::POST, "/rfq/requests", None, Some(body), None, true).await
    }

    pub async fn rfq_cancel_request(&self, request_id: &str) -> Result<Ack> {
        #[derive(Serialize)]
        struct Body<'a> {
            request_id: &'a str,
        }
        self.call(
            Method::DELETE,
            "/rfq/requests",
            None,
            Some(&Body { request_id }),
            None,
            true,
        )
        .await
    }

    pub async fn rfq_list_requests(&self) -> Result<Vec<RfqRequest>> {
        self.paginate("/rfq/requests", &[], true).await
    }

    pub async fn rfq_create_quote(&self, body: &CreateQuoteBody) -> Result<RfqQuote> {
        self.call(Method::POST, "/rfq/quotes", None, Some(body), None, true).await
    }

    pub async fn rfq_cancel_quote(&self, quote_id: &str) -> Result<Ack> {
        #[derive(Serialize)]
        struct Body<'a> {
            quote_id: &'a str,
        }
        self.call(
            Method::DELETE,
            "/rfq/quotes",
            None,
            Some(&Body { quote_id }),
            None,
            true,
        )
        .await
    }

    pub async fn rfq_list_quotes(&self, filter: &QuoteFilter) -> Result<Vec<RfqQuote>> {
        let body_json = serde_json::to_string(filter)?;
        let query = [("filter", body_json)];
        self.paginate("/rfq/quotes", &query, true).await
    }

    pub async fn rfq_best_quote(&self, request_id: &str) -> Result<RfqQuote> {
        let query = [("request_id", request_id.to_string())];
        self.call(Method::GET, "/rfq/quotes/best", Some(&query), None::<&()>, None, true)
            .await
    }

    pub async fn rfq_accept(
        &self,
        request_id: &str,
        quote_id: &str,
        signed_order: &SignedOrder,
    ) -> Result<PostOrderResponse> {
        let body = FinalizeBody {
            request_id: request_id.to_string(),
            quote_id: quote_id.to_string(),
            order: signed_order.to_order_json(),
            signature: signed_order.signature.clone(),
        };
        self.call(Method::POST, "/rfq/accept", None, Some(&body), None, true).await
    }

    pub async fn rfq_approve(
        &self,
        request_id: &str,
        quote_id: &str,
        signed_order: &SignedOrder,
    ) -> Result<PostOrderResponse> {
        let body = FinalizeBody {
            request_id: request_id.to_string(),
            quote_id: quote_id.to_string(),
            order: signed_order.to_order_json(),
            signature: signed_order.signature.clone(),
        };
        self.call(Method::POST, "/rfq/approve", None, Some(&body), None, true).await
    }
}
