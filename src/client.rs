//! Top-level client facade composing configuration, signer, credentials,
//! HTTP pipeline, order builder, and stream client into one construction
//! point. Cheaply `Clone` (internally `Arc`-shared).

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::book::OrderBook;
use crate::cache::{MarketMeta, MarketMetaCache};
use crate::config::Config;
use crate::credentials::{ApiKey, BuilderConfig};
use crate::error::Result;
use crate::http::Pipeline;
use crate::numeric::Amount;
use crate::order::types::MarketAmountKind;
use crate::order::{OrderBuilder, SignedOrder};
use crate::signer::{LocalSigner, Signer};
use crate::stream::StreamClient;

struct Inner {
    config: Config,
    signer: Arc<dyn Signer>,
    exchange_address: [u8; 20],
    pipeline: Pipeline,
    cache: Arc<MarketMetaCache>,
    creds: Option<ApiKey>,
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    pub fn new(config: Config, signer: Arc<dyn Signer>) -> Result<Self> {
        let exchange_address = crate::eth::parse_hex_20(&config.exchange_address)
            .map_err(crate::error::ClobError::Other)?;
        let pipeline = Pipeline::new(
            config.clob_base.clone(),
            &config.user_agent,
            Duration::from_millis(config.request_timeout_ms),
            Some(signer.clone()),
            None,
            None,
        )?;
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                signer,
                exchange_address,
                pipeline,
                cache: Arc::new(MarketMetaCache::new()),
                creds: None,
            }),
        })
    }

    pub fn from_private_key(config: Config, private_key_hex: &str) -> Result<Self> {
        let signer = LocalSigner::from_private_key_hex(private_key_hex, config.chain_id)?;
        Self::new(config, Arc::new(signer))
    }

    pub fn with_credentials(self, creds: ApiKey) -> Result<Self> {
        let inner = &*self.inner;
        let pipeline = Pipeline::new(
            inner.config.clob_base.clone(),
            &inner.config.user_agent,
            Duration::from_millis(inner.config.request_timeout_ms),
            Some(inner.signer.clone()),
            Some(creds.clone()),
            None,
        )?;
        Ok(Self {
            inner: Arc::new(Inner {
                config: inner.config.clone(),
                signer: inner.signer.clone(),
                exchange_address: inner.exchange_address,
                pipeline,
                cache: inner.cache.clone(),
                creds: Some(creds),
            }),
        })
    }

    pub fn with_builder_config(self, builder: BuilderConfig) -> Result<Self> {
        let inner = &*self.inner;
        let pipeline = Pipeline::new(
            inner.config.clob_base.clone(),
            &inner.config.user_agent,
            Duration::from_millis(inner.config.request_timeout_ms),
            Some(inner.signer.clone()),
            inner.creds.clone(),
            Some(builder),
        )?;
        Ok(Self {
            inner: Arc::new(Inner {
                config: inner.config.clone(),
                signer: inner.signer.clone(),
                exchange_address: inner.exchange_address,
                pipeline,
                cache: inner.cache.clone(),
                creds: inner.creds.clone(),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn signer(&self) -> &dyn Signer {
        self.inner.signer.as_ref()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    pub fn cache(&self) -> &MarketMetaCache {
        &self.inner.cache
    }

    /// Build a dual-channel stream client. When this `Client` carries
    /// level-2 credentials (via `with_credentials`), they're threaded
    /// through so the authenticated user channel can include the `auth`
    /// frame field on subscribe.
    pub fn stream(&self) -> StreamClient {
        StreamClient::new(self.inner.config.clone(), self.inner.creds.clone())
    }

    async fn market_meta(&self, token_id: Amount) -> Result<MarketMeta> {
        if let Some(meta) = self.inner.cache.get(token_id) {
            return Ok(meta);
        }
        let tick_size = self.inner.pipeline.get_tick_size(token_id).await?;
        let fee_rate_bps = self.inner.pipeline.get_fee_rate_bps(token_id).await?;
        let meta = MarketMeta {
            tick_size,
            fee_rate_bps,
            neg_risk: false,
        };
        self.inner.cache.insert(token_id, meta);
        Ok(meta)
    }

    /// Build, sign, and submit a limit order.
    pub async fn place_limit_order(&self, builder: OrderBuilder) -> Result<SignedOrder> {
        let signed = self.sign_limit_order(builder).await?;
        self.inner.pipeline.post_order(&signed).await?;
        Ok(signed)
    }

    /// Build and sign a limit order without submitting it.
    pub async fn sign_limit_order(&self, builder: OrderBuilder) -> Result<SignedOrder> {
        let token_id = builder.configured_token_id().ok_or_else(|| {
            crate::error::ClobError::InvalidPrice("token_id required to resolve market meta".into())
        })?;
        let meta = self.market_meta(token_id).await?;
        builder.build_signed_limit(
            self.inner.signer.as_ref(),
            self.inner.exchange_address,
            meta.tick_size,
            meta.fee_rate_bps,
        )
    }

    /// Build, sign, and submit a market order against a freshly fetched
    /// order book snapshot.
    pub async fn place_market_order(
        &self,
        builder: OrderBuilder,
        book: &OrderBook,
        amount: Decimal,
        kind: MarketAmountKind,
    ) -> Result<SignedOrder> {
        let token_id = builder.configured_token_id().ok_or_else(|| {
            crate::error::ClobError::InvalidPrice("token_id required to resolve market meta".into())
        })?;
        let meta = self.market_meta(token_id).await?;
        let signed = builder.build_signed_market(
            self.inner.signer.as_ref(),
            self.inner.exchange_address,
            meta.tick_size,
            meta.fee_rate_bps,
            book,
            amount,
            kind,
        )?;
        self.inner.pipeline.post_order(&signed).await?;
        Ok(signed)
    }

    pub async fn establish_credentials(&self, nonce: u64) -> Result<ApiKey> {
        match self.inner.pipeline.create_api_key(self.inner.signer.as_ref(), nonce).await {
            Ok(creds) => Ok(creds),
            Err(_) => self.inner.pipeline.derive_api_key(self.inner.signer.as_ref(), nonce).await,
        }
    }
}
