//! Remote data gateway for the stock-moves API.
//!
//! Each operation is a pure request/response mapping; non-success responses
//! are normalized into typed [`ApiError`] values at this boundary and never
//! propagate untyped.

use std::future::Future;

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::types::{
  ErrorBody, ListQuery, ListResult, LoginRequest, LoginResponse, PatchRequest, StockMove,
};
use crate::config::Config;
use crate::error::ApiError;
use crate::session::SessionStore;

/// Typed operations against the stock-moves backend.
///
/// The mutation coordinator and the cached client are generic over this
/// trait so tests can substitute an in-memory double.
pub trait Gateway: Send + Sync {
  fn login(
    &self,
    username: &str,
    password: &str,
  ) -> impl Future<Output = Result<String, ApiError>> + Send;

  fn list(&self, query: &ListQuery) -> impl Future<Output = Result<ListResult, ApiError>> + Send;

  fn get(&self, id: &str) -> impl Future<Output = Result<StockMove, ApiError>> + Send;

  fn patch_reference(
    &self,
    id: &str,
    reference: &str,
  ) -> impl Future<Output = Result<StockMove, ApiError>> + Send;
}

/// Gateway backed by reqwest.
#[derive(Clone)]
pub struct HttpGateway {
  http: reqwest::Client,
  base_url: String,
  session: SessionStore,
}

impl HttpGateway {
  pub fn new(config: &Config, session: SessionStore) -> Result<Self> {
    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url: config.api.url.trim_end_matches('/').to_string(),
      session,
    })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.base_url, path)
  }

  /// Attach the session token when present. Login is the only call made
  /// without one.
  fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    match self.session.token() {
      Some(token) => request.bearer_auth(token),
      None => request,
    }
  }

  /// Decode a 2xx body, or map the failure to a typed error carrying the
  /// server message when the body parses as `{message}`.
  async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if status.is_success() {
      response
        .json::<T>()
        .await
        .map_err(|e| ApiError::network(format!("Failed to decode response: {}", e)))
    } else {
      let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .map(|body| body.message);
      Err(ApiError::from_status(status.as_u16(), message))
    }
  }
}

/// Query-string pairs for a list request; unset filters are omitted.
pub(crate) fn list_params(query: &ListQuery) -> Vec<(&'static str, String)> {
  let mut params = vec![
    ("page", query.page.to_string()),
    ("pageSize", query.page_size.to_string()),
  ];
  if let Some(product) = &query.filters.product {
    params.push(("product", product.clone()));
  }
  if let Some(warehouse) = &query.filters.warehouse {
    params.push(("warehouse", warehouse.clone()));
  }
  if let Some(kind) = query.filters.kind {
    params.push(("type", kind.to_string()));
  }
  params
}

impl Gateway for HttpGateway {
  async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
    debug!(username, "logging in");
    let response = self
      .http
      .post(self.url("/auth/login"))
      .json(&LoginRequest { username, password })
      .send()
      .await
      .map_err(|e| ApiError::network(format!("Login request failed: {}", e)))?;

    let body: LoginResponse = Self::decode(response).await?;
    Ok(body.token)
  }

  async fn list(&self, query: &ListQuery) -> Result<ListResult, ApiError> {
    let response = self
      .authorize(self.http.get(self.url("/stock-moves")))
      .query(&list_params(query))
      .send()
      .await
      .map_err(|e| ApiError::network(format!("List request failed: {}", e)))?;

    Self::decode(response).await
  }

  async fn get(&self, id: &str) -> Result<StockMove, ApiError> {
    let response = self
      .authorize(self.http.get(self.url(&format!("/stock-moves/{}", id))))
      .send()
      .await
      .map_err(|e| ApiError::network(format!("Fetch request failed: {}", e)))?;

    Self::decode(response).await
  }

  async fn patch_reference(&self, id: &str, reference: &str) -> Result<StockMove, ApiError> {
    debug!(id, "patching reference");
    let response = self
      .authorize(self.http.patch(self.url(&format!("/stock-moves/{}", id))))
      .json(&PatchRequest { reference })
      .send()
      .await
      .map_err(|e| ApiError::network(format!("Patch request failed: {}", e)))?;

    Self::decode(response).await
  }
}
