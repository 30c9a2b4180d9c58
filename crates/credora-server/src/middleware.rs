use actix_web::body::{BoxBody, MessageBody};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::middleware::Next;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use credora::{
    header, PaymentPayload, PaymentRequiredBody, PaymentRequirements, SettleResponse,
    PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER,
};

use crate::config::PaymentConfig;
use crate::facilitator::FacilitatorClient;
use crate::metrics::{PAYMENT_ATTEMPTS, REQUESTS};
use crate::state::AppState;

/// Error reported when a priced route is called without `X-PAYMENT`.
pub const MISSING_PAYMENT_ERROR: &str = "X-PAYMENT header is required";
/// Error reported when `X-PAYMENT` is not base64 JSON of a payment payload.
pub const INVALID_PAYMENT_HEADER: &str = "invalid_payment_header";

/// Check if a request is for a payment-gated route and extract the requirements.
pub fn check_payment_gate<'a>(
    method: &str,
    path: &str,
    config: &'a PaymentConfig,
) -> Option<&'a PaymentRequirements> {
    config.get_route(method, path).map(|r| &r.requirements)
}

/// Copy `requirements` with `resource` set to the absolute URL of this request.
pub fn resource_requirements(
    req: &HttpRequest,
    requirements: &PaymentRequirements,
) -> PaymentRequirements {
    let info = req.connection_info();
    let mut requirements = requirements.clone();
    requirements.resource = format!("{}://{}{}", info.scheme(), info.host(), req.path());
    requirements
}

/// Build the 402 Payment Required response body.
pub fn payment_required_body(
    requirements: &PaymentRequirements,
    error: impl Into<String>,
) -> PaymentRequiredBody {
    PaymentRequiredBody::new(vec![requirements.clone()], Some(error.into()))
}

/// 402 response carrying the body as JSON and, base64-encoded, in the `x-payment` header.
pub fn payment_required_response(
    requirements: &PaymentRequirements,
    error: impl Into<String>,
) -> HttpResponse {
    let body = payment_required_body(requirements, error);
    let mut builder = HttpResponse::PaymentRequired();
    match header::encode_requirements(&body) {
        Ok(encoded) => {
            builder.insert_header((PAYMENT_HEADER, encoded));
        }
        Err(e) => tracing::error!(error = %e, "failed to encode payment requirements header"),
    }
    builder.json(body)
}

fn endpoint_label(req: &HttpRequest) -> String {
    format!("{} {}", req.method(), req.path())
}

fn reject(req: &HttpRequest, requirements: &PaymentRequirements, error: &str) -> HttpResponse {
    REQUESTS
        .with_label_values(&[endpoint_label(req).as_str(), "402"])
        .inc();
    payment_required_response(requirements, error)
}

fn processing_failed(req: &HttpRequest, error: &credora::CredoraError) -> HttpResponse {
    PAYMENT_ATTEMPTS.with_label_values(&["error"]).inc();
    REQUESTS
        .with_label_values(&[endpoint_label(req).as_str(), "502"])
        .inc();
    tracing::error!(error = %error, "facilitator communication error");
    HttpResponse::BadGateway().json(serde_json::json!({
        "error": "payment processing failed"
    }))
}

/// Decode the `X-PAYMENT` request header. `None` when absent or blank.
fn payment_header(req: &HttpRequest) -> Option<Result<PaymentPayload, credora::CredoraError>> {
    let value = req.headers().get(PAYMENT_HEADER)?;
    if value.as_bytes().trim_ascii().is_empty() {
        return None;
    }
    Some(header::decode_payment(value.as_bytes()))
}

/// High-level payment gate: checks the header, verifies, settles.
///
/// Returns the settlement when payment succeeded, or the response to send
/// back instead of the resource.
pub async fn require_payment(
    req: &HttpRequest,
    requirements: &PaymentRequirements,
    facilitator: &FacilitatorClient,
) -> Result<SettleResponse, HttpResponse> {
    let payload = match payment_header(req) {
        None => return Err(reject(req, requirements, MISSING_PAYMENT_ERROR)),
        Some(Ok(payload)) => payload,
        Some(Err(e)) => {
            PAYMENT_ATTEMPTS.with_label_values(&["invalid"]).inc();
            tracing::warn!(error = %e, "invalid payment header");
            return Err(reject(req, requirements, INVALID_PAYMENT_HEADER));
        }
    };

    if payload.scheme != requirements.scheme {
        PAYMENT_ATTEMPTS.with_label_values(&["invalid"]).inc();
        return Err(reject(req, requirements, "unsupported_scheme"));
    }
    if payload.network != requirements.network {
        PAYMENT_ATTEMPTS.with_label_values(&["invalid"]).inc();
        return Err(reject(req, requirements, "invalid_network"));
    }

    let payer = payload.payload.authorization.from;
    tracing::info!(
        %payer,
        value = %payload.payload.authorization.value,
        nonce = %format!("{:.8}", payload.payload.authorization.nonce),
        "payment attempt"
    );

    match facilitator.verify(&payload, requirements).await {
        Ok(v) if v.is_valid => {}
        Ok(v) => {
            PAYMENT_ATTEMPTS.with_label_values(&["rejected"]).inc();
            let reason = v.invalid_reason.as_deref().unwrap_or("invalid_payment");
            tracing::warn!(%payer, reason, "payment failed verification");
            return Err(reject(req, requirements, reason));
        }
        Err(e) => return Err(processing_failed(req, &e)),
    }

    match facilitator.settle(&payload, requirements).await {
        Ok(s) if s.success => {
            PAYMENT_ATTEMPTS.with_label_values(&["success"]).inc();
            REQUESTS
                .with_label_values(&[endpoint_label(req).as_str(), "200"])
                .inc();
            Ok(s)
        }
        Ok(s) => {
            PAYMENT_ATTEMPTS.with_label_values(&["rejected"]).inc();
            let reason = s.error_reason.as_deref().unwrap_or("settlement_failed");
            tracing::warn!(%payer, reason, "payment settlement rejected");
            Err(reject(req, requirements, reason))
        }
        Err(e) => Err(processing_failed(req, &e)),
    }
}

/// `from_fn` middleware that gates every route registered in [`AppState::payments`].
///
/// A successful settlement is inserted into the request extensions (read it
/// with `web::ReqData<SettleResponse>`) and echoed in `X-PAYMENT-RESPONSE`.
pub async fn payment_gate(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<BoxBody>, actix_web::Error> {
    let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
        tracing::error!("payment gate registered without AppState");
        return Err(actix_web::error::ErrorInternalServerError(
            "payment gate misconfigured",
        ));
    };

    let Some(gated) = check_payment_gate(req.method().as_str(), req.path(), &state.payments)
    else {
        return next.call(req).await.map(|res| res.map_into_boxed_body());
    };

    let requirements = resource_requirements(req.request(), gated);
    let settlement =
        match require_payment(req.request(), &requirements, &state.facilitator).await {
            Ok(settlement) => settlement,
            Err(response) => return Ok(req.into_response(response)),
        };

    let encoded = header::encode(&settlement);
    req.extensions_mut().insert(settlement);

    let mut res = next.call(req).await?;
    match encoded.map(|v| HeaderValue::from_str(&v)) {
        Ok(Ok(value)) => {
            res.headers_mut()
                .insert(HeaderName::from_static(PAYMENT_RESPONSE_HEADER), value);
        }
        _ => tracing::error!("failed to encode payment response header"),
    }
    Ok(res.map_into_boxed_body())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaymentConfigBuilder;
    use actix_web::test::TestRequest;
    use alloy::primitives::{Address, U256};

    fn premium_config() -> PaymentConfig {
        PaymentConfigBuilder::new(Address::repeat_byte(0x11))
            .route("GET", "/premium", "$0.001", "base-sepolia", "premium")
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_gate_matches_only_priced_routes() {
        let config = premium_config();
        assert!(check_payment_gate("GET", "/premium", &config).is_some());
        assert!(check_payment_gate("GET", "/health", &config).is_none());
        assert!(check_payment_gate("POST", "/premium", &config).is_none());
    }

    #[test]
    fn test_resource_is_absolute_url() {
        let config = premium_config();
        let gated = check_payment_gate("GET", "/premium", &config).unwrap();
        let req = TestRequest::get()
            .uri("/premium")
            .insert_header(("Host", "api.credora.example"))
            .to_http_request();
        let requirements = resource_requirements(&req, gated);
        assert_eq!(requirements.resource, "http://api.credora.example/premium");
        assert_eq!(requirements.max_amount_required, U256::from(1000u64));
    }

    #[test]
    fn test_payment_required_response_carries_header() {
        let config = premium_config();
        let gated = check_payment_gate("GET", "/premium", &config).unwrap();
        let resp = payment_required_response(gated, "insufficient_funds");
        assert_eq!(resp.status(), 402);

        let encoded = resp.headers().get(PAYMENT_HEADER).unwrap();
        let body = header::decode_requirements(encoded.as_bytes()).unwrap();
        assert_eq!(body.x402_version, 1);
        assert_eq!(body.error.as_deref(), Some("insufficient_funds"));
        assert_eq!(body.accepts, vec![gated.clone()]);
    }

    #[test]
    fn test_blank_payment_header_counts_as_missing() {
        let req = TestRequest::get()
            .insert_header((PAYMENT_HEADER, "  "))
            .to_http_request();
        assert!(payment_header(&req).is_none());

        let req = TestRequest::get().to_http_request();
        assert!(payment_header(&req).is_none());
    }

    #[test]
    fn test_garbage_payment_header_is_an_error() {
        let req = TestRequest::get()
            .insert_header(("X-PAYMENT", "not-valid-base64!!!"))
            .to_http_request();
        assert!(matches!(payment_header(&req), Some(Err(_))));
    }
}
