//! Loan facility boundary: the `CreditManager` contract that lends the
//! payer enough of the payment token to cover a shortfall.
//!
//! [`ContractLoanFacility`] is a thin pass-through. Every write awaits its
//! receipt before resolving and keeps no local state.

use alloy::contract::{CallBuilder, CallDecoder};
use alloy::network::{EthereumWallet, Network, ReceiptResponse};
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{
    fillers::{
        BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
    },
    Identity, PendingTransactionBuilder, Provider, ProviderBuilder, RootProvider,
};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use serde::Serialize;

use crate::CredoraError;

sol! {
    #[sol(rpc)]
    interface CreditManager {
        struct Loan {
            uint256 principal;
            uint256 repaid;
            uint256 dueDate;
            bool active;
        }

        function requestLoan(uint256 amount) external;
        function repayLoan(uint256 amount) external;
        function getLoan(address borrower) external view returns (Loan memory);
    }
}

/// Concrete provider type from `ProviderBuilder::new().wallet(...).connect_http(...)`.
pub type WalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider,
>;

/// Build a signing HTTP provider for `rpc_url`.
pub fn wallet_provider(
    signer: PrivateKeySigner,
    rpc_url: &str,
) -> Result<WalletProvider, CredoraError> {
    let url = rpc_url
        .parse()
        .map_err(|e| CredoraError::ConfigError(format!("invalid RPC URL '{rpc_url}': {e}")))?;
    Ok(ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(url))
}

/// Confirmed loan-facility transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanReceipt {
    pub transaction_hash: TxHash,
    pub block_number: Option<u64>,
    pub gas_used: u64,
}

/// A borrower's loan as reported by the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanState {
    pub principal: U256,
    pub repaid: U256,
    /// Unix timestamp after which the loan is overdue.
    pub due_date: u64,
    pub active: bool,
}

impl LoanState {
    /// Amount still owed; never negative.
    pub fn outstanding(&self) -> U256 {
        self.principal.saturating_sub(self.repaid)
    }
}

impl From<CreditManager::Loan> for LoanState {
    fn from(loan: CreditManager::Loan) -> Self {
        Self {
            principal: loan.principal,
            repaid: loan.repaid,
            due_date: loan.dueDate.saturating_to(),
            active: loan.active,
        }
    }
}

/// Remote credit facility. Each call resolves once the chain has confirmed it.
pub trait LoanFacility: Send + Sync {
    /// Draw a loan of `amount` atomic units to the caller's wallet.
    fn request_loan(
        &self,
        amount: U256,
    ) -> impl std::future::Future<Output = Result<LoanReceipt, CredoraError>> + Send;

    /// Repay `amount` atomic units of the caller's loan.
    fn repay_loan(
        &self,
        amount: U256,
    ) -> impl std::future::Future<Output = Result<LoanReceipt, CredoraError>> + Send;

    /// Read the current loan of `borrower`.
    fn get_loan(
        &self,
        borrower: Address,
    ) -> impl std::future::Future<Output = Result<LoanState, CredoraError>> + Send;
}

/// Optional fee fields applied to every loan transaction. Unset fields are
/// estimated by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxOverrides {
    pub gas_price: Option<u128>,
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: Option<u128>,
}

impl TxOverrides {
    fn apply<P, D, N>(&self, mut call: CallBuilder<P, D, N>) -> CallBuilder<P, D, N>
    where
        P: Provider<N>,
        D: CallDecoder,
        N: Network,
    {
        if let Some(price) = self.gas_price {
            call = call.gas_price(price);
        }
        if let Some(max_fee) = self.max_fee_per_gas {
            call = call.max_fee_per_gas(max_fee);
        }
        if let Some(tip) = self.max_priority_fee_per_gas {
            call = call.max_priority_fee_per_gas(tip);
        }
        call
    }
}

/// [`LoanFacility`] backed by a deployed `CreditManager` contract.
pub struct ContractLoanFacility<P> {
    provider: P,
    contract: Address,
    overrides: TxOverrides,
}

impl<P: Provider> ContractLoanFacility<P> {
    pub fn new(provider: P, contract: Address) -> Self {
        Self {
            provider,
            contract,
            overrides: TxOverrides::default(),
        }
    }

    pub fn with_overrides(mut self, overrides: TxOverrides) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

/// Await the receipt of a sent transaction and reject reverts.
async fn confirm<N: Network>(
    pending: PendingTransactionBuilder<N>,
    what: &str,
) -> Result<LoanReceipt, CredoraError> {
    let receipt = pending
        .get_receipt()
        .await
        .map_err(|e| CredoraError::ChainError(format!("{what} receipt failed: {e}")))?;

    if !receipt.status() {
        return Err(CredoraError::ChainError(format!(
            "{what} reverted in tx {}",
            receipt.transaction_hash()
        )));
    }

    Ok(LoanReceipt {
        transaction_hash: receipt.transaction_hash(),
        block_number: receipt.block_number(),
        gas_used: receipt.gas_used(),
    })
}

impl<P: Provider> LoanFacility for ContractLoanFacility<P> {
    async fn request_loan(&self, amount: U256) -> Result<LoanReceipt, CredoraError> {
        let contract = CreditManager::new(self.contract, &self.provider);
        let pending = self
            .overrides
            .apply(contract.requestLoan(amount))
            .send()
            .await
            .map_err(|e| CredoraError::ChainError(format!("requestLoan send failed: {e}")))?;

        tracing::info!(tx = %pending.tx_hash(), %amount, "loan requested, awaiting confirmation");
        confirm(pending, "requestLoan").await
    }

    async fn repay_loan(&self, amount: U256) -> Result<LoanReceipt, CredoraError> {
        let contract = CreditManager::new(self.contract, &self.provider);
        let pending = self
            .overrides
            .apply(contract.repayLoan(amount))
            .send()
            .await
            .map_err(|e| CredoraError::ChainError(format!("repayLoan send failed: {e}")))?;

        tracing::info!(tx = %pending.tx_hash(), %amount, "repayment sent, awaiting confirmation");
        confirm(pending, "repayLoan").await
    }

    async fn get_loan(&self, borrower: Address) -> Result<LoanState, CredoraError> {
        let contract = CreditManager::new(self.contract, &self.provider);
        let loan = contract
            .getLoan(borrower)
            .call()
            .await
            .map_err(|e| CredoraError::ChainError(format!("getLoan failed: {e}")))?;
        Ok(loan.into())
    }
}
