//! HTTP client for the remote ordering backend: retries, backoff, adaptive
//! rate limiting, and connection pooling. See `spec.md` §4.3.

use super::dto::{
    CreateOrderPayload, CreateOrderResponse, DeliveryCostRequest, DeliveryCostResponse, MenuTree,
    OrderStatusInfo,
};
use super::envelope::normalize_envelope;
use super::metrics::{MetricsSnapshot, RemoteMetrics};
use super::retry::RetryPolicy;
use crate::errors::EngineError;
use crate::pricing::Zone;
use crate::types::{Distance, IdempotencyKey, LatLng};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "X-Service-API-Key";

#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub max_concurrent_requests: usize,
    /// Tenant subdomain/branch identifiers used by endpoints that take
    /// them as path or query parameters (`spec.md` §4.3).
    pub tenant_sub_domain: String,
    pub tenant_local_id: String,
}

impl Default for RemoteClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.example-backend.invalid".to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
            max_concurrent_requests: 10,
            tenant_sub_domain: String::new(),
            tenant_local_id: String::new(),
        }
    }
}

/// Shared HTTP client for one tenant's credential set. Cheap to clone:
/// the inner `reqwest::Client`, semaphore, and metrics are all `Arc`-backed.
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    config: Arc<RemoteClientConfig>,
    semaphore: Arc<Semaphore>,
    metrics: Arc<RemoteMetrics>,
}

impl RemoteClient {
    /// Builds a client with its own connection pool. Callers should keep
    /// one `RemoteClient` per tenant (or credential set) and clone it
    /// freely rather than constructing a new one per request.
    pub fn new(config: RemoteClientConfig) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| EngineError::PermanentBackend(format!("failed to build HTTP client: {e}")))?;

        #[cfg(feature = "monitoring")]
        super::metrics::register_metrics();

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_requests)),
            metrics: Arc::new(RemoteMetrics::default()),
            config: Arc::new(config),
            http,
        })
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Executes one logical request, retrying on network errors and on
    /// HTTP 5xx/429 up to `max_retries` times, honouring `Retry-After` on
    /// 429 responses. Bounded by the shared semaphore for the whole
    /// attempt sequence.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&impl Serialize>,
    ) -> Result<serde_json::Value, EngineError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EngineError::TransientBackend("remote client semaphore closed".into()))?;

        let url = self.url(path);
        let mut attempt = 0u32;

        loop {
            self.metrics.record_attempt();
            let started = Instant::now();

            let mut req = self
                .http
                .request(method.clone(), &url)
                .header(API_KEY_HEADER, &self.config.api_key)
                .header("Accept", "application/json")
                .query(query);

            if let Some(body) = body {
                req = req.json(body);
            }

            let result = req.send().await;

            match result {
                Ok(resp) => {
                    let status = resp.status();
                    let elapsed_ms = started.elapsed().as_millis() as u64;

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        self.metrics.record_rate_limited();
                        if attempt >= self.config.retry.max_retries {
                            self.metrics.record_failure();
                            return Err(EngineError::RateLimited);
                        }
                        let retry_after = resp
                            .headers()
                            .get(reqwest::header::RETRY_AFTER)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        let delay = self
                            .config
                            .retry
                            .resolve_delay(attempt, retry_after.as_deref());
                        self.metrics.record_retry();
                        attempt += 1;
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if status.is_server_error() {
                        if attempt >= self.config.retry.max_retries {
                            self.metrics.record_failure();
                            return Err(EngineError::TransientBackend(format!(
                                "remote returned {status} after {attempt} retries"
                            )));
                        }
                        let delay = self.config.retry.resolve_delay(attempt, None);
                        self.metrics.record_retry();
                        attempt += 1;
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    if status.is_client_error() {
                        self.metrics.record_failure();
                        let text = resp.text().await.unwrap_or_default();
                        return Err(EngineError::PermanentBackend(format!(
                            "remote returned {status}: {text}"
                        )));
                    }

                    let bytes = resp
                        .bytes()
                        .await
                        .map_err(|e| EngineError::TransientBackend(e.to_string()))?;

                    match normalize_envelope(&bytes) {
                        Ok(data) => {
                            self.metrics.record_success(elapsed_ms);
                            return Ok(data);
                        }
                        Err(e) => {
                            self.metrics.record_failure();
                            return Err(e);
                        }
                    }
                }
                Err(err) => {
                    let is_timeout_or_conn = err.is_timeout() || err.is_connect();
                    if is_timeout_or_conn && attempt < self.config.retry.max_retries {
                        let delay = self.config.retry.resolve_delay(attempt, None);
                        self.metrics.record_retry();
                        attempt += 1;
                        debug!("retrying after network error: {err}");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    self.metrics.record_failure();
                    return Err(EngineError::from(err));
                }
            }
        }
    }

    /// `GET menu/bot-structure` with query params.
    pub async fn get_menu_bot_structure(
        &self,
        sub_domain: &str,
        local_id: &str,
    ) -> Result<MenuTree, EngineError> {
        let data = self
            .execute(
                Method::GET,
                "menu/bot-structure",
                &[
                    ("subDomain", sub_domain.to_string()),
                    ("localId", local_id.to_string()),
                ],
                None::<&()>,
            )
            .await?;
        serde_json::from_value(data).map_err(EngineError::from)
    }

    /// `POST menu/product-details` with path params and a body of product ids.
    pub async fn get_product_details(
        &self,
        sub_domain: &str,
        branch: &str,
        product_ids: &[String],
    ) -> Result<MenuTree, EngineError> {
        let path = format!("menu/product-details/{sub_domain}/{branch}");
        let data = self
            .execute(Method::POST, &path, &[], Some(&product_ids))
            .await?;
        serde_json::from_value(data).map_err(EngineError::from)
    }

    /// `GET delivery/zones` with path params.
    pub async fn get_delivery_zones(
        &self,
        sub_domain: &str,
        branch: &str,
    ) -> Result<Vec<Zone>, EngineError> {
        let path = format!("delivery/zones/{sub_domain}/{branch}");
        let data = self.execute(Method::GET, &path, &[], None::<&()>).await?;
        serde_json::from_value(data).map_err(EngineError::from)
    }

    /// `POST delivery/calculate-cost`. A missing zone in the response
    /// means the address is out of zone; callers interpret `None`
    /// themselves rather than this method raising `OutOfZone` so that
    /// `DeliveryPricer::validate_address` owns that translation.
    pub async fn calculate_delivery_cost(
        &self,
        restaurant: LatLng,
        destination: LatLng,
        sub_domain: &str,
        local_id: &str,
    ) -> Result<Option<(Zone, Distance)>, EngineError> {
        let body = DeliveryCostRequest {
            restaurant_location: restaurant,
            delivery_location: destination,
            sub_domain: sub_domain.to_string(),
            local_id: local_id.to_string(),
        };
        let data = self
            .execute(Method::POST, "delivery/calculate-cost", &[], Some(&body))
            .await?;
        let parsed: DeliveryCostResponse = serde_json::from_value(data)?;
        Ok(parsed
            .zone
            .map(|zone| (zone, Distance::from_km(parsed.distance_km))))
    }

    /// `POST orders` with query params and an idempotency key attached to
    /// the request. Retries of the same key within the server's window
    /// are the server's responsibility to dedupe; this client just passes
    /// it through.
    pub async fn create_order(
        &self,
        sub_domain: &str,
        local_id: &str,
        payload: &CreateOrderPayload,
        idempotency_key: IdempotencyKey,
    ) -> Result<String, EngineError> {
        let url = self.url("orders");
        let _permit = self.semaphore.acquire().await.map_err(|_| {
            EngineError::TransientBackend("remote client semaphore closed".into())
        })?;

        self.metrics.record_attempt();
        let started = Instant::now();
        let resp = self
            .http
            .post(&url)
            .header(API_KEY_HEADER, &self.config.api_key)
            .header("Idempotency-Key", idempotency_key.to_string())
            .query(&[("subDomain", sub_domain), ("localId", local_id)])
            .json(payload)
            .send()
            .await
            .map_err(EngineError::from)?;

        let status = resp.status();
        let elapsed_ms = started.elapsed().as_millis() as u64;
        if !status.is_success() {
            self.metrics.record_failure();
            let text = resp.text().await.unwrap_or_default();
            return if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                Err(EngineError::TransientBackend(text))
            } else {
                Err(EngineError::PermanentBackend(text))
            };
        }

        let bytes = resp.bytes().await.map_err(EngineError::from)?;
        let data = normalize_envelope(&bytes).inspect_err(|_| self.metrics.record_failure())?;
        self.metrics.record_success(elapsed_ms);
        let order: CreateOrderResponse = serde_json::from_value(data)?;
        Ok(order.id)
    }

    /// `GET orders/{id}`.
    pub async fn get_order(&self, order_id: &str) -> Result<OrderStatusInfo, EngineError> {
        let path = format!("orders/{order_id}");
        let data = self.execute(Method::GET, &path, &[], None::<&()>).await?;
        serde_json::from_value(data).map_err(EngineError::from)
    }

    /// `GET orders?phone=...`.
    pub async fn get_orders_by_phone(
        &self,
        phone: &str,
    ) -> Result<Vec<OrderStatusInfo>, EngineError> {
        let data = self
            .execute(Method::GET, "orders", &[("phone", phone.to_string())], None::<&()>)
            .await?;
        serde_json::from_value(data).map_err(EngineError::from)
    }

    /// Generic entry point used by `crate::store` for the conversation
    /// state endpoints, which all share the same envelope and retry
    /// semantics but differ only in path/body shape.
    pub(crate) async fn conversation_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, EngineError> {
        self.execute(method, path, &[], body).await
    }
}

/// Logs and swallows a warning — used at every `ConversationStore`
/// call site so a sync failure never blocks the user-visible reply.
pub fn log_store_failure(operation: &str, err: &EngineError) {
    warn!("conversation store {operation} failed (ignored): {err}");
}

#[async_trait::async_trait]
impl crate::pricing::ZoneResolver for RemoteClient {
    async fn calculate_delivery_cost(
        &self,
        restaurant: LatLng,
        destination: LatLng,
    ) -> Result<Option<(Zone, Distance)>, EngineError> {
        // subDomain/localId are tenant-scoped and carried in the config
        // rather than the trait signature, since `DeliveryPricer` is
        // agnostic to tenancy.
        RemoteClient::calculate_delivery_cost(
            self,
            restaurant,
            destination,
            &self.config.tenant_sub_domain,
            &self.config.tenant_local_id,
        )
        .await
    }
}
