//! Classify 402 responses and cover insufficient funds with a loan.
//!
//! [`handle_payment`] is pure: it reads the `x-payment` header and decides
//! what happened. [`CredoraClient::auto_loan_and_retry_payment`] adds the one
//! side effect, a single loan draw for the exact shortfall, and leaves the
//! retry of the original request to the caller.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;

use alloy::primitives::U256;
use credora::loan::{wallet_provider, ContractLoanFacility, WalletProvider};
use credora::{
    header, CredoraError, LoanFacility, LoanReceipt, PaymentRequiredBody, INSUFFICIENT_FUNDS,
    PAYMENT_HEADER,
};
use serde::Serialize;

use crate::config::AgentConfig;

/// Read access to a response's headers, keyed case-insensitively.
pub trait PaymentHeaders {
    /// Raw value of header `name`, if present.
    fn header_value(&self, name: &str) -> Option<&[u8]>;
}

impl PaymentHeaders for reqwest::header::HeaderMap {
    fn header_value(&self, name: &str) -> Option<&[u8]> {
        self.get(name).map(|v| v.as_bytes())
    }
}

impl<S: BuildHasher> PaymentHeaders for HashMap<String, String, S> {
    fn header_value(&self, name: &str) -> Option<&[u8]> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_bytes())
    }
}

impl PaymentHeaders for BTreeMap<String, String> {
    fn header_value(&self, name: &str) -> Option<&[u8]> {
        self.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_bytes())
    }
}

/// What the payer lacked: taken from the first entry of `accepts`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Shortfall {
    /// Atomic units of `asset`
    pub required: U256,
    pub pay_to: String,
    pub asset: String,
}

/// A payment the server refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentFailure {
    /// The payer's balance cannot cover the price.
    InsufficientFunds(Shortfall),
    /// Any other error code. No loan can fix it.
    Unclassified {
        error: String,
        payload: PaymentRequiredBody,
    },
}

/// Result of inspecting a 402 response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// The payload reported no error.
    Accepted(PaymentRequiredBody),
    /// A loan covering the shortfall has been confirmed.
    LoanTaken {
        shortfall: Shortfall,
        receipt: LoanReceipt,
    },
    /// The response carried no `x-payment` header.
    MissingHeader,
    Failed(PaymentFailure),
}

impl PaymentOutcome {
    /// Whether paying again can now succeed.
    pub fn should_retry(&self) -> bool {
        matches!(self, PaymentOutcome::LoanTaken { .. })
    }
}

/// Classify the `x-payment` header of a 402 response. Performs no I/O.
///
/// A missing or blank header is [`PaymentOutcome::MissingHeader`]. A header
/// that is present but not base64 JSON of a payment-required body, or whose
/// `accepts` list is empty, is an error, never a classification.
pub fn handle_payment<H>(headers: &H) -> Result<PaymentOutcome, CredoraError>
where
    H: PaymentHeaders + ?Sized,
{
    let Some(raw) = headers
        .header_value(PAYMENT_HEADER)
        .filter(|v| !v.trim_ascii().is_empty())
    else {
        return Ok(PaymentOutcome::MissingHeader);
    };

    let body = header::decode_requirements(raw)?;
    if body.accepts.is_empty() {
        return Err(CredoraError::InvalidPayload(
            "payment-required body has no payment requirements".to_string(),
        ));
    }

    match body.error.as_deref() {
        None => Ok(PaymentOutcome::Accepted(body)),
        Some(INSUFFICIENT_FUNDS) => {
            let first = &body.accepts[0];
            Ok(PaymentOutcome::Failed(PaymentFailure::InsufficientFunds(
                Shortfall {
                    required: first.max_amount_required,
                    pay_to: first.pay_to.clone(),
                    asset: first.asset.clone(),
                },
            )))
        }
        Some(other) => Ok(PaymentOutcome::Failed(PaymentFailure::Unclassified {
            error: other.to_string(),
            payload: body.clone(),
        })),
    }
}

/// Payment-recovery client over a [`LoanFacility`].
pub struct CredoraClient<L> {
    loan: L,
}

impl<L: LoanFacility> CredoraClient<L> {
    pub fn new(loan: L) -> Self {
        Self { loan }
    }

    pub fn loan(&self) -> &L {
        &self.loan
    }

    /// See [`handle_payment`].
    pub fn handle_payment<H>(&self, headers: &H) -> Result<PaymentOutcome, CredoraError>
    where
        H: PaymentHeaders + ?Sized,
    {
        handle_payment(headers)
    }

    /// Classify the response and, on insufficient funds, draw exactly one
    /// loan for the shortfall and wait for it to confirm.
    ///
    /// Every other outcome is returned unchanged without touching the
    /// facility. A failed loan is returned as an error.
    pub async fn auto_loan_and_retry_payment<H>(
        &self,
        headers: &H,
    ) -> Result<PaymentOutcome, CredoraError>
    where
        H: PaymentHeaders + ?Sized,
    {
        match handle_payment(headers)? {
            PaymentOutcome::Failed(PaymentFailure::InsufficientFunds(shortfall)) => {
                tracing::info!(
                    required = %shortfall.required,
                    pay_to = %shortfall.pay_to,
                    asset = %shortfall.asset,
                    "insufficient funds, requesting loan"
                );
                let receipt = self.loan.request_loan(shortfall.required).await?;
                tracing::info!(
                    tx = %receipt.transaction_hash,
                    block = ?receipt.block_number,
                    "loan confirmed"
                );
                Ok(PaymentOutcome::LoanTaken { shortfall, receipt })
            }
            outcome => Ok(outcome),
        }
    }
}

/// Recovery client backed by the deployed `CreditManager` at `config.loan_address`.
pub fn connect(
    config: &AgentConfig,
) -> Result<CredoraClient<ContractLoanFacility<WalletProvider>>, CredoraError> {
    let provider = wallet_provider(config.signer.clone(), &config.rpc_url)?;
    let facility =
        ContractLoanFacility::new(provider, config.loan_address).with_overrides(config.overrides);
    Ok(CredoraClient::new(facility))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloy::primitives::{Address, TxHash};
    use credora::{LoanState, PaymentRequirements};
    use std::sync::{Arc, Mutex};

    /// In-memory loan facility that records every call.
    #[derive(Clone, Default)]
    pub(crate) struct FakeLoans {
        pub requested: Arc<Mutex<Vec<U256>>>,
        pub repaid: Arc<Mutex<Vec<U256>>>,
        pub state: Arc<Mutex<Option<LoanState>>>,
        pub fail: bool,
    }

    impl FakeLoans {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn with_loan(principal: u64, repaid: u64) -> Self {
            let fake = Self::default();
            *fake.state.lock().unwrap() = Some(LoanState {
                principal: U256::from(principal),
                repaid: U256::from(repaid),
                due_date: 0,
                active: principal > repaid,
            });
            fake
        }

        fn receipt() -> LoanReceipt {
            LoanReceipt {
                transaction_hash: TxHash::repeat_byte(0x77),
                block_number: Some(12),
                gas_used: 51_000,
            }
        }
    }

    impl LoanFacility for FakeLoans {
        async fn request_loan(&self, amount: U256) -> Result<LoanReceipt, CredoraError> {
            self.requested.lock().unwrap().push(amount);
            if self.fail {
                return Err(CredoraError::ChainError("requestLoan reverted".to_string()));
            }
            Ok(Self::receipt())
        }

        async fn repay_loan(&self, amount: U256) -> Result<LoanReceipt, CredoraError> {
            self.repaid.lock().unwrap().push(amount);
            if self.fail {
                return Err(CredoraError::ChainError("repayLoan reverted".to_string()));
            }
            if let Some(state) = self.state.lock().unwrap().as_mut() {
                state.repaid += amount;
                state.active = state.outstanding() > U256::ZERO;
            }
            Ok(Self::receipt())
        }

        async fn get_loan(&self, _borrower: Address) -> Result<LoanState, CredoraError> {
            Ok(self.state.lock().unwrap().clone().unwrap_or(LoanState {
                principal: U256::ZERO,
                repaid: U256::ZERO,
                due_date: 0,
                active: false,
            }))
        }
    }

    fn requirements(amount: &str) -> serde_json::Value {
        serde_json::json!({
            "scheme": "exact",
            "network": "base-sepolia",
            "maxAmountRequired": amount,
            "resource": "http://localhost:3000/premium",
            "payTo": "0x4ec137a8be0466c166997bcfc56ffdafc542201b",
            "asset": "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            "maxTimeoutSeconds": 60
        })
    }

    fn headers_with(key: &str, body: serde_json::Value) -> HashMap<String, String> {
        HashMap::from([(key.to_string(), header::encode(&body).unwrap())])
    }

    fn insufficient(amount: &str) -> HashMap<String, String> {
        headers_with(
            "x-payment",
            serde_json::json!({
                "x402Version": 1,
                "error": "insufficient_funds",
                "accepts": [requirements(amount)]
            }),
        )
    }

    #[test]
    fn test_missing_header() {
        let empty: HashMap<String, String> = HashMap::new();
        assert_eq!(handle_payment(&empty).unwrap(), PaymentOutcome::MissingHeader);

        let other = HashMap::from([("content-type".to_string(), "application/json".to_string())]);
        assert_eq!(handle_payment(&other).unwrap(), PaymentOutcome::MissingHeader);

        let blank = HashMap::from([("x-payment".to_string(), "   ".to_string())]);
        assert_eq!(handle_payment(&blank).unwrap(), PaymentOutcome::MissingHeader);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let expected = handle_payment(&insufficient("500000")).unwrap();
        for key in ["x-payment", "X-Payment", "X-PAYMENT"] {
            let keyed = headers_with(
                key,
                serde_json::json!({"error": "insufficient_funds", "accepts": [requirements("500000")]}),
            );
            assert_eq!(handle_payment(&keyed).unwrap(), expected, "{key}");
        }

        let btree: BTreeMap<String, String> = insufficient("1").into_iter().collect();
        assert!(matches!(
            handle_payment(&btree).unwrap(),
            PaymentOutcome::Failed(PaymentFailure::InsufficientFunds(_))
        ));
    }

    #[test]
    fn test_reqwest_header_map() {
        let mut headers = reqwest::header::HeaderMap::new();
        let encoded = header::encode(&serde_json::json!({"accepts": [requirements("1000")]})).unwrap();
        headers.insert("X-Payment", encoded.parse().unwrap());
        assert!(matches!(
            handle_payment(&headers).unwrap(),
            PaymentOutcome::Accepted(_)
        ));
    }

    #[test]
    fn test_insufficient_funds_shortfall_is_exact() {
        let outcome = handle_payment(&insufficient("500000")).unwrap();
        assert_eq!(
            outcome,
            PaymentOutcome::Failed(PaymentFailure::InsufficientFunds(Shortfall {
                required: U256::from(500_000u64),
                pay_to: "0x4ec137a8be0466c166997bcfc56ffdafc542201b".to_string(),
                asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
            }))
        );
        assert!(!outcome.should_retry());
    }

    #[test]
    fn test_shortfall_beyond_u128() {
        let big = "1000000000000000000000000000000000000000000";
        let PaymentOutcome::Failed(PaymentFailure::InsufficientFunds(shortfall)) =
            handle_payment(&insufficient(big)).unwrap()
        else {
            panic!("expected insufficient funds");
        };
        assert_eq!(shortfall.required.to_string(), big);
    }

    #[test]
    fn test_body_without_requirements_is_invalid() {
        for body in [
            serde_json::json!({}),
            serde_json::json!({"accepts": []}),
            serde_json::json!({"error": "insufficient_funds", "accepts": []}),
            serde_json::json!({"error": "settlement_failed"}),
        ] {
            let headers = headers_with("x-payment", body.clone());
            assert!(
                matches!(handle_payment(&headers), Err(CredoraError::InvalidPayload(_))),
                "{body}"
            );
        }
    }

    #[test]
    fn test_no_error_is_accepted() {
        let body = serde_json::json!({"x402Version": 1, "accepts": [requirements("1000")]});
        let outcome = handle_payment(&headers_with("x-payment", body)).unwrap();
        let PaymentOutcome::Accepted(payload) = outcome else {
            panic!("expected Accepted");
        };
        assert_eq!(payload.accepts[0].max_amount_required, U256::from(1000u64));
    }

    #[test]
    fn test_other_error_is_unclassified() {
        let body = serde_json::json!({"error": "invalid_network", "accepts": [requirements("1000")]});
        let outcome = handle_payment(&headers_with("x-payment", body)).unwrap();
        let PaymentOutcome::Failed(PaymentFailure::Unclassified { error, payload }) = outcome else {
            panic!("expected Unclassified");
        };
        assert_eq!(error, "invalid_network");
        assert_eq!(payload.error.as_deref(), Some("invalid_network"));
    }

    #[test]
    fn test_malformed_header_is_an_error() {
        let bad_base64 = HashMap::from([("x-payment".to_string(), "%%%not base64%%%".to_string())]);
        assert!(matches!(
            handle_payment(&bad_base64),
            Err(CredoraError::InvalidHeader(_))
        ));

        let not_json = HashMap::from([(
            "x-payment".to_string(),
            header::encode(&"plain string").unwrap(),
        )]);
        assert!(matches!(
            handle_payment(&not_json),
            Err(CredoraError::SerdeError(_))
        ));

        let fractional = headers_with(
            "x-payment",
            serde_json::json!({"error": "insufficient_funds", "accepts": [requirements("0.5")]}),
        );
        assert!(matches!(
            handle_payment(&fractional),
            Err(CredoraError::SerdeError(_))
        ));
    }

    #[tokio::test]
    async fn test_auto_loan_draws_exact_shortfall_once() {
        let loans = FakeLoans::default();
        let client = CredoraClient::new(loans.clone());

        let outcome = client
            .auto_loan_and_retry_payment(&insufficient("500000"))
            .await
            .unwrap();

        assert!(outcome.should_retry());
        let PaymentOutcome::LoanTaken { shortfall, receipt } = outcome else {
            panic!("expected LoanTaken");
        };
        assert_eq!(shortfall.required, U256::from(500_000u64));
        assert_eq!(receipt.transaction_hash, TxHash::repeat_byte(0x77));
        assert_eq!(*loans.requested.lock().unwrap(), vec![U256::from(500_000u64)]);
    }

    #[tokio::test]
    async fn test_auto_loan_failure_propagates() {
        let loans = FakeLoans::failing();
        let client = CredoraClient::new(loans.clone());

        let err = client
            .auto_loan_and_retry_payment(&insufficient("500000"))
            .await
            .unwrap_err();
        assert!(matches!(err, CredoraError::ChainError(_)));
        assert_eq!(loans.requested.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_auto_loan_passes_other_outcomes_through() {
        let loans = FakeLoans::default();
        let client = CredoraClient::new(loans.clone());

        let missing: HashMap<String, String> = HashMap::new();
        assert_eq!(
            client.auto_loan_and_retry_payment(&missing).await.unwrap(),
            PaymentOutcome::MissingHeader
        );

        let accepted = headers_with("x-payment", serde_json::json!({"accepts": [requirements("1")]}));
        let outcome = client.auto_loan_and_retry_payment(&accepted).await.unwrap();
        assert_eq!(outcome, client.handle_payment(&accepted).unwrap());
        assert!(!outcome.should_retry());

        let unclassified = headers_with(
            "x-payment",
            serde_json::json!({"error": "settlement_failed", "accepts": [requirements("1")]}),
        );
        assert!(matches!(
            client.auto_loan_and_retry_payment(&unclassified).await.unwrap(),
            PaymentOutcome::Failed(PaymentFailure::Unclassified { .. })
        ));

        assert!(loans.requested.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_auto_loan_malformed_header_takes_no_loan() {
        let loans = FakeLoans::default();
        let client = CredoraClient::new(loans.clone());
        let bad = HashMap::from([("X-PAYMENT".to_string(), "not base64!".to_string())]);

        assert!(client.auto_loan_and_retry_payment(&bad).await.is_err());
        assert!(loans.requested.lock().unwrap().is_empty());
    }

    #[test]
    fn test_requirements_type_matches_wire() {
        let req: PaymentRequirements = serde_json::from_value(requirements("42")).unwrap();
        assert_eq!(req.max_amount_required, U256::from(42u64));
    }
}
