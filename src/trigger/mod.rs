//! What starts a reconciliation pass
//!
//! - [`scheduler`]: fixed-interval background loop
//! - [`http`]: secret-gated on-demand endpoint, plus health and payment URI lookup
//!
//! Both go through the engine's per-wallet guard, so passes never overlap.

pub mod http;
pub mod openapi;
pub mod response;
pub mod scheduler;

pub use http::{AppState, PaymentSettings, router, run_server};
pub use scheduler::{run_and_log, spawn_scheduler};
