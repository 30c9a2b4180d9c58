use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::Provider;
use alloy::sol;

use crate::CredoraError;

// ERC-20 surface of the payment token (USDC).
sol! {
    #[sol(rpc)]
    interface ERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
    }
}

/// Query the token balance of `owner`.
pub async fn balance_of<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
) -> Result<U256, CredoraError> {
    let contract = ERC20::new(token, provider);
    contract
        .balanceOf(owner)
        .call()
        .await
        .map_err(|e| CredoraError::ChainError(format!("balanceOf failed: {e}")))
}

/// Query the allowance that `owner` has granted to `spender`.
pub async fn allowance<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, CredoraError> {
    let contract = ERC20::new(token, provider);
    contract
        .allowance(owner, spender)
        .call()
        .await
        .map_err(|e| CredoraError::ChainError(format!("allowance failed: {e}")))
}

/// Execute `approve(spender, amount)` and wait for confirmation.
pub async fn approve<P: Provider>(
    provider: &P,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<TxHash, CredoraError> {
    let contract = ERC20::new(token, provider);
    let pending = contract
        .approve(spender, amount)
        .send()
        .await
        .map_err(|e| CredoraError::ChainError(format!("approve send failed: {e}")))?;

    let receipt = pending
        .get_receipt()
        .await
        .map_err(|e| CredoraError::ChainError(format!("approve receipt failed: {e}")))?;

    if !receipt.status() {
        return Err(CredoraError::ChainError("approve reverted".to_string()));
    }

    Ok(receipt.transaction_hash)
}

/// The slice of a token the repay watcher needs: read a balance, grant an allowance.
pub trait TokenLedger: Send + Sync {
    fn balance_of(
        &self,
        owner: Address,
    ) -> impl std::future::Future<Output = Result<U256, CredoraError>> + Send;

    /// Make sure `spender` may pull at least `amount`; approves only when short.
    fn ensure_allowance(
        &self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> impl std::future::Future<Output = Result<(), CredoraError>> + Send;
}

/// [`TokenLedger`] for a deployed ERC-20 contract.
pub struct Erc20Token<P> {
    provider: P,
    token: Address,
}

impl<P: Provider> Erc20Token<P> {
    pub fn new(provider: P, token: Address) -> Self {
        Self { provider, token }
    }

    pub fn address(&self) -> Address {
        self.token
    }
}

impl<P: Provider> TokenLedger for Erc20Token<P> {
    async fn balance_of(&self, owner: Address) -> Result<U256, CredoraError> {
        balance_of(&self.provider, self.token, owner).await
    }

    async fn ensure_allowance(
        &self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), CredoraError> {
        let current = allowance(&self.provider, self.token, owner, spender).await?;
        if current >= amount {
            return Ok(());
        }
        let tx = approve(&self.provider, self.token, spender, amount).await?;
        tracing::info!(%tx, %spender, %amount, "allowance granted");
        Ok(())
    }
}
