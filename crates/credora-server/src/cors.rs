use actix_cors::Cors;
use actix_web::http::header::{self, HeaderName};
use credora::{PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};

/// Build the CORS middleware.
///
/// With no configured origins only `http://localhost[:port]` is allowed.
/// Payment headers are allowed in and exposed out so browser clients can
/// read the 402 requirements and the settlement.
pub fn build_cors(allowed_origins: &[String]) -> Cors {
    let allowed = allowed_origins.to_vec();
    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            let origin = origin.to_str().unwrap_or("");
            if allowed.is_empty() {
                return origin == "http://localhost" || origin.starts_with("http://localhost:");
            }
            allowed.iter().any(|a| a == "*" || a == origin)
        })
        .allowed_methods(vec!["GET", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
            HeaderName::from_static(PAYMENT_HEADER),
        ])
        .expose_headers(vec![
            HeaderName::from_static(PAYMENT_HEADER),
            HeaderName::from_static(PAYMENT_RESPONSE_HEADER),
        ])
        .max_age(3600)
}
