//! HTTP surface: health, secret-gated on-demand pass, payment URI lookup

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use utoipa::{IntoParams, OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use super::openapi::ApiDoc;
use super::response::{ApiError, ApiResult, error_codes, ok};
use crate::config::{AppConfig, UrlTemplates};
use crate::ledger::LedgerError;
use crate::payment_uri::PaymentRequest;
use crate::reconcile::{PassReport, ReconcileError, ReconciliationEngine};
use crate::store::{OrderId, OrderStatus, OrderStore, PendingOrder};

/// What the payment URI endpoint needs besides the order
#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub wallet_address: String,
    pub display_name: String,
    pub expiration_secs: u64,
    pub urls: UrlTemplates,
}

impl PaymentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            wallet_address: config.wallet.address.clone(),
            display_name: config.wallet.display_name.clone(),
            expiration_secs: config.wallet.expiration_secs,
            urls: config.urls.clone(),
        }
    }

    pub fn request_for(&self, order: &PendingOrder) -> PaymentRequest {
        PaymentRequest {
            order_id: order.id,
            total: order.total,
            currency: order.currency.clone(),
            wallet_address: self.wallet_address.clone(),
            display_name: self.display_name.clone(),
            info_url: UrlTemplates::render(&self.urls.info_url, order.id),
            return_url: UrlTemplates::render(&self.urls.return_url, order.id),
            abort_url: UrlTemplates::render(&self.urls.abort_url, order.id),
            expiration_secs: self.expiration_secs,
        }
    }
}

/// Gateway shared state
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
    pub orders: Arc<dyn OrderStore>,
    /// Per-install secret for `/api/v1/reconcile`
    cron_secret: String,
    pub payment: PaymentSettings,
}

impl AppState {
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        orders: Arc<dyn OrderStore>,
        cron_secret: impl Into<String>,
        payment: PaymentSettings,
    ) -> Self {
        Self {
            engine,
            orders,
            cron_secret: cron_secret.into(),
            payment,
        }
    }

    /// Constant-time comparison against the configured secret
    pub fn secret_matches(&self, provided: &str) -> bool {
        !self.cron_secret.is_empty()
            && provided.len() == self.cron_secret.len()
            && bool::from(provided.as_bytes().ct_eq(self.cron_secret.as_bytes()))
    }
}

/// Health check response data
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Server timestamp in milliseconds
    #[schema(example = 1703494800000_u64)]
    pub timestamp_ms: u64,
    pub wallet: String,
    /// A reconciliation pass is in flight
    pub pass_running: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TriggerQuery {
    /// Cron secret
    pub secret: Option<String>,
}

/// Payment URI response data
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentUriResponse {
    pub order_id: OrderId,
    #[schema(example = "https://ripple.com//send?to=rABC&amount=12.5%2FUSD&dt=7")]
    pub uri: String,
    /// POSIX seconds
    pub expires_at: i64,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/v1/health",
    responses(
        (status = 200, description = "Service healthy", body = HealthResponse, content_type = "application/json")
    ),
    tag = "System"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<HealthResponse> {
    let timestamp_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    ok(HealthResponse {
        timestamp_ms,
        wallet: state.engine.wallet_address().to_string(),
        pass_running: state.engine.is_running(),
    })
}

/// Run one reconciliation pass now
///
/// GET so that plain cron URL fetchers can call it. Waits for an in-flight
/// pass to finish rather than running concurrently.
#[utoipa::path(
    get,
    path = "/api/v1/reconcile",
    params(TriggerQuery),
    responses(
        (status = 200, description = "Pass completed", body = PassReport, content_type = "application/json"),
        (status = 401, description = "Missing or wrong secret"),
        (status = 502, description = "Ledger node unavailable or returned an error"),
        (status = 503, description = "Order or cursor store unavailable")
    ),
    security(("cron_secret" = [])),
    tag = "Reconcile"
)]
pub async fn trigger_reconcile(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TriggerQuery>,
) -> ApiResult<PassReport> {
    let Some(secret) = query.secret.as_deref() else {
        return ApiError::unauthorized(error_codes::MISSING_AUTH, "secret required").into_err();
    };
    if !state.secret_matches(secret) {
        warn!("Rejected on-demand reconcile: bad secret");
        return ApiError::unauthorized(error_codes::AUTH_FAILED, "invalid secret").into_err();
    }

    info!("On-demand reconcile requested");
    // Detached so a dropped connection cannot cancel the pass mid-way
    let engine = state.engine.clone();
    match tokio::spawn(async move { engine.run_pass().await }).await {
        Ok(Ok(report)) => ok(report),
        Ok(Err(e)) => {
            error!("On-demand reconcile failed: {}", e);
            Err(reconcile_error_response(&e))
        }
        Err(e) => {
            error!("On-demand reconcile task aborted: {}", e);
            Err(ApiError::internal("reconcile task aborted"))
        }
    }
}

fn reconcile_error_response(err: &ReconcileError) -> ApiError {
    match err {
        ReconcileError::Ledger(LedgerError::RemoteError { .. }) => {
            ApiError::bad_gateway(error_codes::LEDGER_ERROR, err.to_string())
        }
        ReconcileError::Ledger(_) | ReconcileError::UnexpectedStatus(_) => {
            ApiError::bad_gateway(error_codes::LEDGER_UNAVAILABLE, err.to_string())
        }
        ReconcileError::Store(_) => ApiError::service_unavailable(err.to_string()),
    }
}

/// Payment request URI for a pending order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{order_id}/payment-uri",
    params(("order_id" = i64, Path, description = "Order id, also the destination tag")),
    responses(
        (status = 200, description = "Payment URI", body = PaymentUriResponse, content_type = "application/json"),
        (status = 404, description = "Unknown order"),
        (status = 409, description = "Order is not awaiting payment")
    ),
    tag = "Checkout"
)]
pub async fn get_payment_uri(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<OrderId>,
) -> ApiResult<PaymentUriResponse> {
    if order_id < 1 {
        return ApiError::bad_request("order id must be positive").into_err();
    }

    let order = state
        .orders
        .get(order_id)
        .await
        .map_err(|e| ApiError::service_unavailable(e.to_string()))?
        .ok_or_else(|| {
            ApiError::not_found(
                error_codes::ORDER_NOT_FOUND,
                format!("order {} not found", order_id),
            )
        })?;

    if order.status != OrderStatus::Pending {
        return ApiError::conflict(
            error_codes::ORDER_NOT_PENDING,
            format!("order {} is {}", order_id, order.status),
        )
        .into_err();
    }

    let request = state.payment.request_for(&order);
    let now = chrono::Utc::now();
    ok(PaymentUriResponse {
        order_id,
        uri: request.to_uri(now),
        expires_at: request.expires_at(now),
    })
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/reconcile", get(trigger_reconcile))
        .route("/api/v1/orders/{order_id}/payment-uri", get(get_payment_uri))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

/// Start the HTTP gateway
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> std::io::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await.inspect_err(|e| {
        error!("Failed to bind to {}: {}", addr, e);
    })?;

    info!("Gateway listening on http://{}", addr);
    info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, router(state)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::LedgerClient;
    use crate::reconcile::{EngineSettings, PassGuard};
    use crate::rpc::MockTransport;
    use crate::store::{MemoryCursorStore, MemoryOrderStore};
    use axum::http::StatusCode;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;

    struct Fixture {
        rpc: Arc<MockTransport>,
        orders: Arc<MemoryOrderStore>,
        state: Arc<AppState>,
    }

    fn fixture() -> Fixture {
        fixture_with_guard(Arc::new(PassGuard::new()))
    }

    fn fixture_with_guard(guard: Arc<PassGuard>) -> Fixture {
        let rpc = Arc::new(MockTransport::new());
        let orders = Arc::new(MemoryOrderStore::new());
        let engine = Arc::new(
            ReconciliationEngine::new(
                LedgerClient::new(rpc.clone()),
                orders.clone(),
                Arc::new(MemoryCursorStore::new()),
                EngineSettings::new("rWallet"),
            )
            .with_guard(guard),
        );
        let payment = PaymentSettings {
            wallet_address: "rWallet".to_string(),
            display_name: "Shop".to_string(),
            expiration_secs: 900,
            urls: UrlTemplates {
                info_url: "https://shop.example/orders/{order_id}".to_string(),
                return_url: String::new(),
                abort_url: String::new(),
            },
        };
        let state = Arc::new(AppState::new(engine, orders.clone(), "topsecret", payment));
        Fixture { rpc, orders, state }
    }

    #[test]
    fn test_secret_comparison() {
        let f = fixture();
        assert!(f.state.secret_matches("topsecret"));
        assert!(!f.state.secret_matches("topsecreT"));
        assert!(!f.state.secret_matches("topsecret2"));
        assert!(!f.state.secret_matches(""));
    }

    #[tokio::test]
    async fn test_reconcile_requires_secret() {
        let f = fixture();

        let err = trigger_reconcile(State(f.state.clone()), Query(TriggerQuery { secret: None }))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);

        let err = trigger_reconcile(
            State(f.state.clone()),
            Query(TriggerQuery {
                secret: Some("guess".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, error_codes::AUTH_FAILED);
        assert_eq!(f.rpc.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_runs_pass() {
        let f = fixture();
        f.rpc.push_result(json!({"status": "success", "ledger_index_max": 500, "transactions": []}));

        let response = trigger_reconcile(
            State(f.state.clone()),
            Query(TriggerQuery {
                secret: Some("topsecret".to_string()),
            }),
        )
        .await
        .unwrap();

        let report = response.0.data.unwrap();
        assert_eq!(report.cursor_before, -1);
        assert_eq!(report.cursor_after, 500);
    }

    #[tokio::test]
    async fn test_reconcile_pass_survives_dropped_request() {
        let guard = Arc::new(PassGuard::new());
        let f = fixture_with_guard(guard.clone());
        f.rpc.push_result(json!({"status": "success", "ledger_index_max": 500, "transactions": []}));
        // Hold the wallet lock so the pass is still queued when the client goes away
        let permit = guard.acquire("rWallet").await;

        let request = trigger_reconcile(
            State(f.state.clone()),
            Query(TriggerQuery {
                secret: Some("topsecret".to_string()),
            }),
        );
        let dropped = tokio::time::timeout(std::time::Duration::from_millis(20), request).await;
        assert!(dropped.is_err());
        drop(permit);

        let mut cursor = -1;
        for _ in 0..100 {
            cursor = f.state.engine.cursor().await.unwrap();
            if cursor == 500 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        assert_eq!(cursor, 500);
        assert_eq!(f.rpc.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_reports_unreachable_node() {
        let f = fixture();
        // No scripted response: the mock reports a transport failure

        let err = trigger_reconcile(
            State(f.state.clone()),
            Query(TriggerQuery {
                secret: Some("topsecret".to_string()),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, error_codes::LEDGER_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_payment_uri_for_pending_order() {
        let f = fixture();
        f.orders
            .insert(PendingOrder {
                id: 7,
                total: dec!(12.5),
                currency: "USD".to_string(),
                status: OrderStatus::Pending,
                created_at: Utc::now(),
            })
            .await;

        let response = get_payment_uri(State(f.state.clone()), Path(7)).await.unwrap();
        let data = response.0.data.unwrap();

        assert!(data.uri.contains("dt=7"));
        assert!(data.uri.contains("amount=12.5%2FUSD"));
        assert!(data.uri.contains("info_url=https%3A%2F%2Fshop.example%2Forders%2F7"));
        assert!(data.expires_at > Utc::now().timestamp());
    }

    #[tokio::test]
    async fn test_payment_uri_rejects_settled_and_unknown_orders() {
        let f = fixture();
        f.orders
            .insert(PendingOrder {
                id: 8,
                total: dec!(1),
                currency: "USD".to_string(),
                status: OrderStatus::Paid,
                created_at: Utc::now(),
            })
            .await;

        let err = get_payment_uri(State(f.state.clone()), Path(8)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::CONFLICT);

        let err = get_payment_uri(State(f.state.clone()), Path(9)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = get_payment_uri(State(f.state.clone()), Path(0)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_router_builds() {
        let _router = router(fixture().state);
    }
}
