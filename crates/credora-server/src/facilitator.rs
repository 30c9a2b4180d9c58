//! HTTP client for a remote x402 facilitator's `/verify` and `/settle` endpoints.

use credora::hmac::{compute_hmac, FACILITATOR_AUTH_HEADER};
use credora::{CredoraError, PaymentPayload, PaymentRequirements, SettleResponse, VerifyResponse};
use serde::de::DeserializeOwned;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Facilitator endpoint plus the optional shared secret used to sign request bodies.
#[derive(Clone)]
pub struct FacilitatorClient {
    http: reqwest::Client,
    url: String,
    hmac_secret: Option<Vec<u8>>,
}

impl std::fmt::Debug for FacilitatorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FacilitatorClient")
            .field("url", &self.url)
            .field(
                "hmac_secret",
                &self.hmac_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl FacilitatorClient {
    pub fn new(url: &str, hmac_secret: Option<Vec<u8>>) -> Result<Self, CredoraError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CredoraError::HttpError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(http, url, hmac_secret))
    }

    pub fn with_http_client(
        http: reqwest::Client,
        url: &str,
        hmac_secret: Option<Vec<u8>>,
    ) -> Self {
        Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            hmac_secret,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Ask the facilitator whether `payload` satisfies `requirements`.
    pub async fn verify(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, CredoraError> {
        self.post("verify", payload, requirements).await
    }

    /// Submit a verified payment for on-chain settlement.
    pub async fn settle(
        &self,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, CredoraError> {
        self.post("settle", payload, requirements).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        payload: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<T, CredoraError> {
        let url = format!("{}/{endpoint}", self.url);
        let body = serde_json::json!({
            "x402Version": payload.x402_version,
            "paymentPayload": payload,
            "paymentRequirements": requirements,
        });
        let body_bytes = serde_json::to_vec(&body)?;

        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json");

        if let Some(secret) = &self.hmac_secret {
            let signature = compute_hmac(secret, &body_bytes)?;
            request = request.header(FACILITATOR_AUTH_HEADER, signature);
        }

        let resp = request
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| CredoraError::HttpError(format!("facilitator {endpoint} failed: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(CredoraError::HttpError(
                "facilitator authentication failed".to_string(),
            ));
        }
        if status.is_server_error() {
            return Err(CredoraError::HttpError(format!(
                "facilitator {endpoint} returned {status}"
            )));
        }

        resp.json::<T>().await.map_err(|e| {
            CredoraError::HttpError(format!("facilitator {endpoint} response parse failed: {e}"))
        })
    }
}
