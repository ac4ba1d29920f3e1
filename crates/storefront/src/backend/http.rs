//! HTTP implementation of the backend gateways.
//!
//! JSON over REST with `reqwest`. The API key rides on every request; the
//! bearer session token is installed by a successful login and attached to
//! session-bound calls. Cloning the client shares the session.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::instrument;
use url::Url;

use sundrift_core::{Email, LineItem, OrderId, ProductRef, User};

use crate::backend::types::{
    AuthSession, CartResponse, CouponValidationRequest, CouponValidationResponse, OrderRequest,
    OrderResponse, ProfileUpdate, RegistrationRequest,
};
use crate::backend::{BackendError, CartGateway, CouponGateway, IdentityGateway, OrderGateway};
use crate::config::BackendConfig;

/// REST client for the storefront backend.
///
/// Implements all four gateway contracts against one HTTP connection pool.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base_url: Url,
    session: RwLock<Option<String>>,
}

impl HttpBackend {
    /// Create a new backend client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not a valid header value or the
    /// HTTP client fails to build.
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|e| BackendError::Parse(format!("invalid API key format: {e}")))?;
        api_key.set_sensitive(true);
        headers.insert("X-Api-Key", api_key);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url: config.base_url.clone(),
                session: RwLock::new(None),
            }),
        })
    }

    /// Drop the installed session token.
    ///
    /// Call on sign-out; session-bound calls fail with
    /// [`BackendError::Unauthenticated`] afterwards.
    pub async fn clear_session(&self) {
        *self.inner.session.write().await = None;
    }

    /// Whether a session token is installed.
    pub async fn has_session(&self) -> bool {
        self.inner.session.read().await.is_some()
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|e| BackendError::Parse(format!("invalid endpoint {path}: {e}")))
    }

    /// Endpoint for a single cart line, with the product ref as an encoded
    /// path segment.
    fn line_endpoint(&self, product: &ProductRef) -> Result<Url, BackendError> {
        let mut url = self.endpoint("cart/items")?;
        url.path_segments_mut()
            .map_err(|()| BackendError::Parse("base URL cannot carry paths".to_owned()))?
            .push(product.as_str());
        Ok(url)
    }

    async fn bearer(&self) -> Result<String, BackendError> {
        self.inner
            .session
            .read()
            .await
            .clone()
            .ok_or(BackendError::Unauthenticated)
    }

    async fn post_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BackendError> {
        let response = self
            .inner
            .client
            .post(self.endpoint(path)?)
            .json(body)
            .send()
            .await?;
        decode(response).await
    }

    async fn authed_cart_call(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Vec<LineItem>, BackendError> {
        let token = self.bearer().await?;
        let response = request.bearer_auth(token).send().await?;
        let cart: CartResponse = decode(response).await?;
        Ok(cart.into_line_items())
    }
}

/// Map error statuses, then deserialize the body.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, BackendError> {
    let response = error_for_status(response).await?;
    Ok(response.json::<T>().await?)
}

/// Map error statuses, discarding any success body.
async fn decode_unit(response: reqwest::Response) -> Result<(), BackendError> {
    error_for_status(response).await?;
    Ok(())
}

async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(1);
        return Err(BackendError::RateLimited(retry_after));
    }

    if status.is_server_error() {
        return Err(BackendError::Unavailable(status.as_u16()));
    }

    let body = response.text().await.unwrap_or_default();
    Err(BackendError::rejected(
        status.as_u16(),
        rejection_message(status, &body),
    ))
}

/// Pull a human-readable reason out of an error body.
fn rejection_message(status: StatusCode, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        message: Option<String>,
        error: Option<String>,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(message) = parsed.message.or(parsed.error)
    {
        return message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("request failed with HTTP {status}")
    } else {
        trimmed.chars().take(200).collect()
    }
}

#[async_trait]
impl IdentityGateway for HttpBackend {
    #[instrument(skip(self), fields(email = %email))]
    async fn identity_exists(&self, email: &Email) -> Result<bool, BackendError> {
        #[derive(Deserialize)]
        struct ExistsResponse {
            exists: bool,
        }

        let response: ExistsResponse = self
            .post_json(
                "auth/identity/check",
                &serde_json::json!({ "email": email }),
            )
            .await?;
        Ok(response.exists)
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn issue_otp(&self, email: &Email) -> Result<(), BackendError> {
        let response = self
            .inner
            .client
            .post(self.endpoint("auth/otp/issue")?)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        decode_unit(response).await
    }

    #[instrument(skip(self, code), fields(email = %email))]
    async fn verify_otp(&self, email: &Email, code: &str) -> Result<(), BackendError> {
        let response = self
            .inner
            .client
            .post(self.endpoint("auth/otp/verify")?)
            .json(&serde_json::json!({ "email": email, "code": code }))
            .send()
            .await?;
        decode_unit(response).await
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn register(&self, request: &RegistrationRequest) -> Result<User, BackendError> {
        self.post_json("auth/register", request).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn login(&self, email: &Email, password: &str) -> Result<AuthSession, BackendError> {
        let session: AuthSession = self
            .post_json(
                "auth/login",
                &serde_json::json!({ "email": email, "password": password }),
            )
            .await?;

        *self.inner.session.write().await = Some(session.token.clone());
        Ok(session)
    }

    #[instrument(skip(self, update))]
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<(), BackendError> {
        let token = self.bearer().await?;
        let response = self
            .inner
            .client
            .put(self.endpoint("profile")?)
            .bearer_auth(token)
            .json(update)
            .send()
            .await?;
        decode_unit(response).await
    }
}

#[async_trait]
impl CartGateway for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<Vec<LineItem>, BackendError> {
        let request = self.inner.client.get(self.endpoint("cart")?);
        self.authed_cart_call(request).await
    }

    #[instrument(skip(self), fields(product = %product))]
    async fn add_line(
        &self,
        product: &ProductRef,
        quantity: u32,
    ) -> Result<Vec<LineItem>, BackendError> {
        let request = self
            .inner
            .client
            .post(self.endpoint("cart/items")?)
            .json(&serde_json::json!({ "product": product, "quantity": quantity }));
        self.authed_cart_call(request).await
    }

    #[instrument(skip(self), fields(product = %product))]
    async fn update_line(
        &self,
        product: &ProductRef,
        quantity: u32,
    ) -> Result<Vec<LineItem>, BackendError> {
        let request = self
            .inner
            .client
            .put(self.line_endpoint(product)?)
            .json(&serde_json::json!({ "quantity": quantity }));
        self.authed_cart_call(request).await
    }

    #[instrument(skip(self), fields(product = %product))]
    async fn remove_line(&self, product: &ProductRef) -> Result<Vec<LineItem>, BackendError> {
        let request = self.inner.client.delete(self.line_endpoint(product)?);
        self.authed_cart_call(request).await
    }

    #[instrument(skip(self))]
    async fn clear_cart(&self) -> Result<(), BackendError> {
        let token = self.bearer().await?;
        let response = self
            .inner
            .client
            .delete(self.endpoint("cart")?)
            .bearer_auth(token)
            .send()
            .await?;
        decode_unit(response).await
    }
}

#[async_trait]
impl CouponGateway for HttpBackend {
    #[instrument(skip(self, request), fields(code = %request.code))]
    async fn validate_coupon(
        &self,
        request: &CouponValidationRequest,
    ) -> Result<CouponValidationResponse, BackendError> {
        self.post_json("coupons/validate", request).await
    }
}

#[async_trait]
impl OrderGateway for HttpBackend {
    #[instrument(skip(self, request))]
    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderId, BackendError> {
        let token = self.bearer().await?;
        let response = self
            .inner
            .client
            .post(self.endpoint("orders")?)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        let order: OrderResponse = decode(response).await?;
        Ok(OrderId::new(order.order_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn backend() -> HttpBackend {
        let config = BackendConfig {
            base_url: Url::parse("https://api.example.com/v1/").unwrap(),
            api_key: SecretString::from("k".repeat(32)),
        };
        HttpBackend::new(&config).unwrap()
    }

    #[test]
    fn test_endpoint_joins_relative_paths() {
        let backend = backend();
        let url = backend.endpoint("auth/login").unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/auth/login");
    }

    #[test]
    fn test_line_endpoint_encodes_product_ref() {
        let backend = backend();
        let url = backend
            .line_endpoint(&ProductRef::new("prod 1/blue"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.com/v1/cart/items/prod%201%2Fblue"
        );
    }

    #[tokio::test]
    async fn test_session_bound_call_without_session() {
        let backend = backend();
        assert!(!backend.has_session().await);
        let err = backend.bearer().await.unwrap_err();
        assert!(matches!(err, BackendError::Unauthenticated));
    }

    #[test]
    fn test_rejection_message_prefers_json_message() {
        let message = rejection_message(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"message":"coupon expired"}"#,
        );
        assert_eq!(message, "coupon expired");
    }

    #[test]
    fn test_rejection_message_falls_back_to_body_text() {
        let message = rejection_message(StatusCode::BAD_REQUEST, "plain failure");
        assert_eq!(message, "plain failure");
    }

    #[test]
    fn test_rejection_message_empty_body() {
        let message = rejection_message(StatusCode::BAD_REQUEST, "");
        assert!(message.contains("400"));
    }
}
