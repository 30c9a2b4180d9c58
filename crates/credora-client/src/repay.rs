//! Background watcher that pays loans back out of incoming funds.

use std::time::Duration;

use alloy::primitives::{Address, U256};
use credora::erc20::TokenLedger;
use credora::{CredoraError, LoanFacility, LoanReceipt};

/// Part of a balance increase that goes to the loan.
pub fn repay_amount(gained: U256, outstanding: U256) -> U256 {
    gained.min(outstanding)
}

/// Polls the borrower's token balance and repays the loan whenever it grows.
pub struct AutoRepayer<L, T> {
    loan: L,
    token: T,
    borrower: Address,
    /// Loan contract; pulls the repayment, so it needs the allowance.
    spender: Address,
    interval: Duration,
    last_balance: Option<U256>,
}

impl<L: LoanFacility, T: TokenLedger> AutoRepayer<L, T> {
    pub fn new(loan: L, token: T, borrower: Address, spender: Address) -> Self {
        Self {
            loan,
            token,
            borrower,
            spender,
            interval: Duration::from_secs(5),
            last_balance: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// One poll. The first call only records the starting balance.
    ///
    /// Returns the repayment receipt when a repayment went through. The
    /// baseline only moves once a gain has been handled, so a failed lookup
    /// or repayment is retried on the next poll.
    pub async fn check_once(&mut self) -> Result<Option<LoanReceipt>, CredoraError> {
        let balance = self.token.balance_of(self.borrower).await?;
        let Some(previous) = self.last_balance else {
            tracing::info!(%balance, "auto-repay baseline recorded");
            self.last_balance = Some(balance);
            return Ok(None);
        };
        if balance <= previous {
            self.last_balance = Some(balance);
            return Ok(None);
        }

        let gained = balance - previous;
        let outstanding = self.loan.get_loan(self.borrower).await?.outstanding();
        tracing::info!(%gained, %outstanding, "balance increased");
        if outstanding.is_zero() {
            self.last_balance = Some(balance);
            return Ok(None);
        }

        let amount = repay_amount(gained, outstanding);
        self.token
            .ensure_allowance(self.borrower, self.spender, outstanding)
            .await?;
        let receipt = self.loan.repay_loan(amount).await?;
        self.last_balance = Some(balance);
        tracing::info!(tx = %receipt.transaction_hash, %amount, "loan repaid");
        Ok(Some(receipt))
    }

    /// Poll forever. Failures are logged and the next tick tries again.
    pub async fn run(mut self) {
        tracing::info!(
            borrower = %self.borrower,
            interval_secs = self.interval.as_secs(),
            "starting auto-repay watcher"
        );
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.check_once().await {
                tracing::warn!(error = %e, "auto-repay check failed");
            }
        }
    }
}
