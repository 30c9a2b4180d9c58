//! Credora resource server: serves `GET /premium` behind an x402 payment.
//!
//! Unpaid requests get HTTP 402 with [`PaymentRequirements`](credora::PaymentRequirements)
//! in the JSON body and, base64-encoded, in the `x-payment` header. Paid
//! requests are verified and settled through a remote facilitator before the
//! handler runs.
//!
//! # Modules
//!
//! - [`config`]: Environment loading and route pricing ([`PaymentConfigBuilder`](config::PaymentConfigBuilder))
//! - [`middleware`]: Payment gate ([`payment_gate`](middleware::payment_gate))
//! - [`facilitator`]: `/verify` and `/settle` client
//! - [`routes`]: `/premium`, `/health`, `/metrics`
//! - [`metrics`]: Prometheus counters for gated requests and payment attempts

pub mod config;
pub mod cors;
pub mod facilitator;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

use actix_web::web;

pub use config::{ConfigError, PaymentConfig, PaymentConfigBuilder, RoutePaymentConfig, ServerConfig};
pub use facilitator::FacilitatorClient;
pub use middleware::{check_payment_gate, payment_gate, payment_required_response, require_payment};
pub use state::AppState;

/// Register every route this server exposes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(routes::premium)
        .service(routes::health)
        .service(routes::metrics_endpoint);
}
