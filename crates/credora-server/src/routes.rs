use actix_web::{get, web, HttpRequest, HttpResponse};
use credora::security::bearer_matches;
use credora::SettleResponse;
use serde::Serialize;

use crate::state::AppState;

/// The premium plan served to paying clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PremiumPlan {
    pub plan: &'static str,
    pub features: [&'static str; 3],
    pub price: &'static str,
}

pub const PREMIUM_PLAN: PremiumPlan = PremiumPlan {
    plan: "Gold",
    features: [
        "Ad-free experience",
        "Priority support",
        "Exclusive content drops",
    ],
    price: "$9.99/mo",
};

/// Runs only after the payment gate has settled a payment for this request.
#[get("/premium")]
pub async fn premium(payment: Option<web::ReqData<SettleResponse>>) -> HttpResponse {
    match payment {
        Some(payment) => tracing::info!(
            payer = payment.payer.as_deref().unwrap_or("unknown"),
            transaction = payment.transaction.as_deref().unwrap_or("none"),
            network = %payment.network,
            "premium access granted"
        ),
        None => tracing::warn!("premium served without a payment record"),
    }

    HttpResponse::Ok().json(serde_json::json!({
        "status": "success",
        "data": PREMIUM_PLAN,
    }))
}

#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "credora-server",
    }))
}

#[get("/metrics")]
pub async fn metrics_endpoint(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    match &state.metrics_token {
        Some(expected) => {
            let authorization = req
                .headers()
                .get("authorization")
                .and_then(|v| v.to_str().ok());

            if !bearer_matches(authorization, expected) {
                return HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "unauthorized",
                    "message": "Valid Bearer token required for /metrics"
                }));
            }
        }
        None => {
            if !state.public_metrics {
                return HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "forbidden",
                    "message": "Set METRICS_TOKEN or CREDORA_PUBLIC_METRICS=true to access /metrics"
                }));
            }
        }
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(crate::metrics::metrics_output())
}
