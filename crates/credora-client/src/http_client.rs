use credora::{
    header, CredoraError, LoanFacility, LoanReceipt, PaymentRequiredBody, SchemeClient,
    SettleResponse, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER, SCHEME_NAME,
};
use reqwest::{Method, StatusCode};

use crate::recovery::{CredoraClient, PaymentOutcome};

/// Final answer of a [`PaidClient::fetch`].
#[derive(Debug)]
pub struct PaidResponse {
    pub response: reqwest::Response,
    /// Decoded `X-PAYMENT-RESPONSE`, when the server settled a payment.
    pub settlement: Option<SettleResponse>,
    /// Loan drawn to cover a shortfall during this fetch.
    pub loan: Option<LoanReceipt>,
}

/// HTTP client that pays 402 responses and borrows when the wallet is short.
///
/// Flow: request, 402, sign and retry with `X-PAYMENT`. When that retry is
/// refused for insufficient funds, the [`CredoraClient`] draws a loan for
/// the shortfall and the payment is signed and sent once more.
pub struct PaidClient<S, L> {
    http: reqwest::Client,
    scheme: S,
    recovery: CredoraClient<L>,
    network: String,
}

impl<S: SchemeClient, L: LoanFacility> PaidClient<S, L> {
    pub fn new(
        scheme: S,
        recovery: CredoraClient<L>,
        network: impl Into<String>,
    ) -> Result<Self, CredoraError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CredoraError::HttpError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_http_client(scheme, recovery, network, http))
    }

    /// Create a client with a custom reqwest::Client.
    pub fn with_http_client(
        scheme: S,
        recovery: CredoraClient<L>,
        network: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            scheme,
            recovery,
            network: network.into(),
        }
    }

    pub fn recovery(&self) -> &CredoraClient<L> {
        &self.recovery
    }

    /// Make a request, paying for it if the server asks.
    pub async fn fetch(&self, url: &str, method: Method) -> Result<PaidResponse, CredoraError> {
        let resp = self
            .http
            .request(method.clone(), url)
            .send()
            .await
            .map_err(|e| CredoraError::HttpError(format!("request failed: {e}")))?;

        if resp.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(PaidResponse {
                response: resp,
                settlement: None,
                loan: None,
            });
        }

        let body: PaymentRequiredBody = resp
            .json()
            .await
            .map_err(|e| CredoraError::HttpError(format!("failed to parse 402 body: {e}")))?;

        let resp = self.pay(url, method.clone(), &body).await?;
        if resp.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(finish(resp, None));
        }

        match self.recovery.auto_loan_and_retry_payment(resp.headers()).await? {
            PaymentOutcome::LoanTaken { receipt, .. } => {
                let resp = self.pay(url, method, &body).await?;
                Ok(finish(resp, Some(receipt)))
            }
            outcome => {
                tracing::warn!(?outcome, "payment refused, no loan taken");
                Ok(finish(resp, None))
            }
        }
    }

    /// Sign the requirement matching our network and send the paid request.
    async fn pay(
        &self,
        url: &str,
        method: Method,
        body: &PaymentRequiredBody,
    ) -> Result<reqwest::Response, CredoraError> {
        let requirements = body
            .accepts
            .iter()
            .find(|r| r.scheme == SCHEME_NAME && r.network == self.network)
            .ok_or_else(|| {
                CredoraError::UnsupportedScheme(format!(
                    "no {SCHEME_NAME} requirement for {} in {:?}",
                    self.network,
                    body.accepts
                        .iter()
                        .map(|r| (&r.scheme, &r.network))
                        .collect::<Vec<_>>()
                ))
            })?;

        let payload = self
            .scheme
            .create_payment_payload(body.x402_version, requirements)
            .await?;
        let encoded = header::encode_payment(&payload)?;

        tracing::info!(
            amount = %requirements.max_amount_required,
            pay_to = %requirements.pay_to,
            network = %requirements.network,
            "sending payment"
        );

        self.http
            .request(method, url)
            .header(PAYMENT_HEADER, encoded)
            .send()
            .await
            .map_err(|e| CredoraError::HttpError(format!("paid request failed: {e}")))
    }
}

fn finish(response: reqwest::Response, loan: Option<LoanReceipt>) -> PaidResponse {
    let settlement = response
        .headers()
        .get(PAYMENT_RESPONSE_HEADER)
        .and_then(|v| match header::decode_settlement(v.as_bytes()) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(error = %e, "unreadable payment response header");
                None
            }
        });
    PaidResponse {
        response,
        settlement,
        loan,
    }
}
