//! Ripple payment request URIs
//!
//! The shopper's wallet opens `https://ripple.com//send?...` with the
//! destination, amount, destination tag and expiry filled in. The tag equals
//! the order id, which is what the reconciliation engine matches on.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::reconcile::matching::expected_amount;
use crate::store::OrderId;

pub const RIPPLE_SEND_URL: &str = "https://ripple.com//send";

/// Everything a payment request URI embeds
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub total: Decimal,
    pub currency: String,
    pub wallet_address: String,
    pub display_name: String,
    pub info_url: String,
    pub return_url: String,
    pub abort_url: String,
    /// Seconds the shopper has to pay
    pub expiration_secs: u64,
}

impl PaymentRequest {
    /// POSIX second after which the request is void
    pub fn expires_at(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp() + self.expiration_secs as i64
    }

    /// Build the URI as of `now`
    pub fn to_uri(&self, now: DateTime<Utc>) -> String {
        let fields = [
            ("to", self.wallet_address.clone()),
            ("amount", format_amount(self.total, &self.currency)),
            ("dt", self.order_id.to_string()),
            ("invoiceid", self.order_id.to_string()),
            ("name", self.display_name.clone()),
            ("info_url", self.info_url.clone()),
            ("return_url", self.return_url.clone()),
            ("abort_url", self.abort_url.clone()),
            ("exp", self.expires_at(now).to_string()),
        ];
        format!("{}?{}", RIPPLE_SEND_URL, build_query(&fields))
    }
}

/// `12.5/USD`: total at 2 dp without trailing zeros
pub fn format_amount(total: Decimal, currency: &str) -> String {
    format!("{}/{}", expected_amount(total).normalize(), currency)
}

/// RFC 3986 query string; space becomes `%20`
fn build_query(fields: &[(&str, String)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}
