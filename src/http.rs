//! HTTP request pipeline: header composition (L1/L2/builder), JSON body
//! serialization, pagination, and error classification.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::credentials::{self, ApiKey, BuilderConfig};
use crate::error::{ClobError, Result};
use crate::signer::Signer;

pub const CURSOR_INITIAL: &str = "MA==";
pub const CURSOR_END: &str = "LTE=";

#[derive(serde::Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: String,
}

#[derive(serde::Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub next_cursor: String,
}

pub struct Pipeline {
    http: reqwest::Client,
    clob_base: String,
    signer: Option<std::sync::Arc<dyn Signer>>,
    creds: Option<ApiKey>,
    builder: Option<BuilderConfig>,
    server_time_offset_s: i64,
}

impl Pipeline {
    pub fn new(
        clob_base: impl Into<String>,
        user_agent: &str,
        request_timeout: Duration,
        signer: Option<std::sync::Arc<dyn Signer>>,
        creds: Option<ApiKey>,
        builder: Option<BuilderConfig>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(request_timeout)
            .build()
            .map_err(ClobError::Network)?;
        Ok(Self {
            http,
            clob_base: clob_base.into(),
            signer,
            creds,
            builder,
            server_time_offset_s: 0,
        })
    }

    pub fn set_server_time_offset(&mut self, offset_s: i64) {
        self.server_time_offset_s = offset_s;
    }

    fn timestamp(&self) -> u64 {
        let now = credentials::now_unix_s() as i64;
        (now + self.server_time_offset_s).max(0) as u64
    }

    /// Issue one call. `extra_headers` is merged last, letting L1-auth
    /// callers (account creation) override the default L2 headers.
    pub async fn call<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, String)]>,
        body: Option<&Req>,
        extra_headers: Option<HashMap<String, String>>,
        requires_auth: bool,
    ) -> Result<Resp> {
        let url = format!("{}{}", self.clob_base.trim_end_matches('/'), path);
        let body_json = match body {
            Some(b) => Some(serde_json::to_string(b)?),
            None => None,
        };

        let mut headers = HashMap::new();
        if requires_auth {
            let signer = self.signer.as_deref().ok_or(ClobError::MissingSigner)?;
            let creds = self.creds.as_ref().ok_or(ClobError::MissingCreds)?;
            let ts = self.timestamp();
            let l2 = credentials::create_level2_headers(
                signer,
                creds,
                method.as_str(),
                path,
                body_json.as_deref(),
                Some(ts),
            )?;
            headers.extend(l2);

            if let Some(builder_cfg) = &self.builder {
                match builder_cfg {
                    BuilderConfig::Local(builder_creds) => {
                        let b = credentials::create_local_builder_headers(
                            builder_creds,
                            method.as_str(),
                            path,
                            body_json.as_deref(),
                            Some(ts),
                        )?;
                        headers.extend(b);
                    }
                    BuilderConfig::Remote { host, token } => {
                        let b = self
                            .fetch_remote_builder_headers(host, token.as_deref(), method.as_str(), path, body_json.as_deref(), ts)
                            .await?;
                        headers.extend(b);
                    }
                }
            }
        }
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        tracing::debug!(method = %method, path, "clob http call");
        let mut req = self
            .http
            .request(method.clone(), &url)
            .headers(credentials::map_to_headermap(&headers)?);
        if let Some(q) = query {
            req = req.query(q);
        }
        if let Some(b) = &body_json {
            req = req.body(b.clone()).header("content-type", "application/json");
        }

        let resp = req.send().await.map_err(ClobError::Network)?;
        let status = resp.status();
        tracing::debug!(method = %method, path, status = status.as_u16(), "clob http response");

        if status.is_success() {
            resp.json::<Resp>().await.map_err(ClobError::Network)
        } else {
            let status_u16 = status.as_u16();
            let text = resp.text().await.unwrap_or_default();
            let parsed: Option<ErrorBody> = serde_json::from_str(&text).ok();
            let (code, message) = match parsed {
                Some(body) => (body.code, body.message),
                None => (None, text),
            };
            Err(ClobError::from_response(status_u16, code.as_deref(), &message))
        }
    }

    async fn fetch_remote_builder_headers(
        &self,
        host: &str,
        token: Option<&str>,
        method: &str,
        path: &str,
        body: Option<&str>,
        timestamp_s: u64,
    ) -> Result<HashMap<String, String>> {
        #[derive(serde::Serialize)]
        struct RemoteSignRequest<'a> {
            method: &'a str,
            path: &'a str,
            body: &'a str,
            timestamp: u64,
        }
        let mut req = self.http.post(host).json(&RemoteSignRequest {
            method,
            path,
            body: body.unwrap_or(""),
            timestamp: timestamp_s,
        });
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        let resp = req.send().await.map_err(ClobError::Network)?;
        if !resp.status().is_success() {
            return Err(ClobError::Signer(format!(
                "remote builder signer returned status {}",
                resp.status()
            )));
        }
        let headers: HashMap<String, String> = resp.json().await.map_err(ClobError::Network)?;
        // The remote signer may reply with any casing of these header names;
        // match case-insensitively and re-key to our canonical constants.
        let mut normalized = HashMap::with_capacity(4);
        for required in [
            credentials::POLY_BUILDER_API_KEY,
            credentials::POLY_BUILDER_PASSPHRASE,
            credentials::POLY_BUILDER_TIMESTAMP,
            credentials::POLY_BUILDER_SIGNATURE,
        ] {
            let value = headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(required))
                .map(|(_, v)| v.clone())
                .ok_or_else(|| {
                    ClobError::Signer(format!(
                        "remote builder signer response missing header {required}"
                    ))
                })?;
            normalized.insert(required.to_string(), value);
        }
        Ok(normalized)
    }

    /// Fetch every page of a `{data[], next_cursor}` endpoint, starting at
    /// `CURSOR_INITIAL` and stopping once the server returns `CURSOR_END`
    /// (or repeats the last cursor it was sent).
    pub async fn paginate<T: DeserializeOwned>(
        &self,
        path: &str,
        base_query: &[(&str, String)],
        requires_auth: bool,
    ) -> Result<Vec<T>> {
        let mut out = Vec::new();
        let mut cursor = CURSOR_INITIAL.to_string();
        loop {
            let mut query: Vec<(&str, String)> = base_query.to_vec();
            query.push(("next_cursor", cursor.clone()));
            let page: Page<T> = self
                .call(Method::GET, path, Some(&query), None::<&()>, None, requires_auth)
                .await?;
            let next = page.next_cursor;
            out.extend(page.data);
            if next.is_empty() || next == cursor || next == CURSOR_END {
                break;
            }
            cursor = next;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_sentinels_match_wire_contract() {
        assert_eq!(CURSOR_INITIAL, "MA==");
        assert_eq!(CURSOR_END, "LTE=");
    }

    #[tokio::test]
    async fn remote_builder_headers_match_regardless_of_casing() {
        use httpmock::prelude::*;

        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/sign");
            then.status(200).json_body(serde_json::json!({
                "poly_builder_api_key": "key-1",
                "Poly-Builder-Passphrase": "pass-1",
                "POLY_BUILDER_TIMESTAMP": "1700000000",
                "poly-builder-signature": "sig-1",
            }));
        });

        let pipeline = Pipeline::new(
            "https://example.invalid",
            "clobber-test/0.1",
            Duration::from_secs(5),
            None,
            None,
            None,
        )
        .unwrap();

        let headers = pipeline
            .fetch_remote_builder_headers(&server.url("/sign"), None, "POST", "/order", None, 1700000000)
            .await
            .unwrap();

        assert_eq!(headers[credentials::POLY_BUILDER_API_KEY], "key-1");
        assert_eq!(headers[credentials::POLY_BUILDER_PASSPHRASE], "pass-1");
        assert_eq!(headers[credentials::POLY_BUILDER_TIMESTAMP], "1700000000");
        assert_eq!(headers[credentials::POLY_BUILDER_SIGNATURE], "sig-1");
    }
}
