use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client,
    Method,
};
use serde_json::{Map, Value};

use crate::{config::CardgateConfig, CardgateApiError, Transaction};

/// An insertion-ordered map of request fields, exactly as they are sent to the gateway.
pub type FieldMap = Map<String, Value>;

/// A parsed gateway response, together with what is needed to diagnose it when it turns out to be unusable.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// A short description of the request that produced this response, e.g. `POST payment/ideal/`
    pub request: String,
    /// The response body exactly as it was received
    pub raw: String,
    pub body: Value,
}

impl GatewayResponse {
    pub fn new(request: String, raw: String) -> Result<Self, CardgateApiError> {
        let body = serde_json::from_str(&raw)
            .map_err(|e| CardgateApiError::JsonError(format!("{request} returned a non-JSON body. {e}. Body: {raw}")))?;
        Ok(Self { request, raw, body })
    }

    pub fn from_value<S: Into<String>>(request: S, body: Value) -> Self {
        Self { request: request.into(), raw: body.to_string(), body }
    }

    pub fn diagnostics(&self) -> String {
        format!("{} returned {}", self.request, self.raw)
    }
}

/// Executes requests against the gateway's REST resources.
///
/// Implementations own all transport concerns (authentication, TLS, timeouts). Callers only ever see the parsed
/// response; a well-formed HTTP exchange whose body lacks the expected fields is *not* a transport error and is left
/// to the caller to reject.
#[allow(async_fn_in_trait)]
pub trait GatewayClient {
    /// Sends `data` to `resource` (a path relative to the API root, such as `refund/T123/`) using `method`.
    async fn do_request(
        &self,
        resource: &str,
        data: Option<FieldMap>,
        method: Method,
    ) -> Result<GatewayResponse, CardgateApiError>;
}

#[derive(Clone)]
pub struct CardgateApi {
    config: CardgateConfig,
    client: Arc<Client>,
}

impl CardgateApi {
    pub fn new(config: CardgateConfig) -> Result<Self, CardgateApiError> {
        if config.api_key.is_empty() {
            return Err(CardgateApiError::Initialization("No API key has been configured".to_string()));
        }
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CardgateApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &CardgateConfig {
        &self.config
    }

    pub fn url(&self, resource: &str) -> String {
        format!("{}{resource}", self.config.api_url)
    }

    /// Creates a new, unregistered transaction for the configured site.
    pub fn new_transaction(&self, amount: i64, currency: &str) -> Result<Transaction<'_, Self>, CardgateApiError> {
        let mut tx = Transaction::new(self, self.config.site_id, amount, currency)?;
        if !self.config.site_key.is_empty() {
            tx.set_site_key(self.config.site_key.reveal())?;
        }
        Ok(tx)
    }

    /// Looks up an existing transaction on the gateway.
    pub async fn fetch_transaction(&self, id: &str) -> Result<Transaction<'_, Self>, CardgateApiError> {
        Transaction::fetch(self, id).await
    }
}

impl GatewayClient for CardgateApi {
    async fn do_request(
        &self,
        resource: &str,
        data: Option<FieldMap>,
        method: Method,
    ) -> Result<GatewayResponse, CardgateApiError> {
        let url = self.url(resource);
        let description = format!("{method} {resource}");
        trace!("Sending REST request: {method} {url}");
        let mut req = self
            .client
            .request(method.clone(), url)
            .basic_auth(self.config.merchant_id, Some(self.config.api_key.reveal()));
        if let Some(data) = data {
            if method == Method::GET {
                let params = data.iter().map(|(k, v)| (k.as_str(), query_value(v))).collect::<Vec<_>>();
                req = req.query(&params);
            } else {
                req = req.json(&data);
            }
        }
        let response = req.send().await.map_err(|e| CardgateApiError::RestRequestError(e.to_string()))?;
        let status = response.status();
        let raw = response.text().await.map_err(|e| CardgateApiError::RestResponseError(e.to_string()))?;
        if status.is_success() {
            trace!("REST request successful. {status}");
            GatewayResponse::new(description, raw)
        } else {
            debug!("{description} failed with {status}. {raw}");
            Err(CardgateApiError::QueryError { status: status.as_u16(), message: raw })
        }
    }
}

fn query_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
