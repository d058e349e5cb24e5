//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::http::{HealthResponse, PaymentUriResponse};
use crate::reconcile::{OrderFailure, PassReport, Settlement, SettlementOutcome};

/// Shared-secret query parameter guarding the on-demand pass
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "cron_secret",
                SecurityScheme::ApiKey(ApiKey::Query(ApiKeyValue::with_description(
                    "secret",
                    "Per-install secret from `trigger.cron_secret`",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ripple Checkout Reconciliation API",
        version = "1.0.0",
        description = "Settles pending shop orders against payments received on the Ripple ledger.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::trigger::http::health_check,
        crate::trigger::http::trigger_reconcile,
        crate::trigger::http::get_payment_uri,
    ),
    components(
        schemas(
            HealthResponse,
            PaymentUriResponse,
            PassReport,
            Settlement,
            SettlementOutcome,
            OrderFailure,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Reconcile", description = "On-demand reconciliation pass (secret required)"),
        (name = "Checkout", description = "Payment request URIs for pending orders"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Ripple Checkout Reconciliation API");
        assert!(spec.to_json().is_ok());
    }

    #[test]
    fn test_endpoints_registered() {
        let paths = ApiDoc::openapi().paths;
        assert!(paths.paths.contains_key("/api/v1/health"));
        assert!(paths.paths.contains_key("/api/v1/reconcile"));
        assert!(paths.paths.contains_key("/api/v1/orders/{order_id}/payment-uri"));
    }

    #[test]
    fn test_security_scheme_registered() {
        let components = ApiDoc::openapi().components.expect("should have components");
        assert!(components.security_schemes.contains_key("cron_secret"));
    }
}
