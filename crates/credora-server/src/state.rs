use crate::config::PaymentConfig;
use crate::facilitator::FacilitatorClient;

/// Immutable per-process state shared with every worker via `web::Data`.
#[derive(Debug, Clone)]
pub struct AppState {
    pub payments: PaymentConfig,
    pub facilitator: FacilitatorClient,
    pub metrics_token: Option<String>,
    pub public_metrics: bool,
}
