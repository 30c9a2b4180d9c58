use credora::erc20::Erc20Token;
use credora::loan::{wallet_provider, ContractLoanFacility};
use credora_client::{
    AgentConfig, AutoRepayer, CredoraClient, CredoraError, ExactEvmSchemeClient, PaidClient,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "agent failed");
        std::process::exit(1);
    }
}

async fn run(config: AgentConfig) -> Result<(), CredoraError> {
    let wallet = config.signer.address();
    let provider = wallet_provider(config.signer.clone(), &config.rpc_url)?;
    let loans = ContractLoanFacility::new(provider.clone(), config.loan_address)
        .with_overrides(config.overrides);

    let client = PaidClient::new(
        ExactEvmSchemeClient::with_chain_config(config.signer.clone(), config.chain.clone()),
        CredoraClient::new(loans),
        config.chain.network.clone(),
    )?;

    let url = format!("{}/premium", config.base_url);
    tracing::info!(%wallet, %url, "calling premium API");

    let paid = client.fetch(&url, reqwest::Method::GET).await?;
    let status = paid.response.status();

    if let Some(loan) = &paid.loan {
        tracing::info!(tx = %loan.transaction_hash, "payment covered by a Credora loan");
    }
    if let Some(settlement) = &paid.settlement {
        tracing::info!(
            transaction = settlement.transaction.as_deref().unwrap_or("none"),
            explorer = %settlement
                .transaction
                .as_deref()
                .map(|tx| config.chain.tx_url(tx))
                .unwrap_or_default(),
            "payment settled"
        );
    }

    let body = paid
        .response
        .text()
        .await
        .map_err(|e| CredoraError::HttpError(format!("failed to read response body: {e}")))?;
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => tracing::info!(%status, body = %json, "premium response"),
        Err(_) => tracing::info!(%status, %body, "premium response"),
    }

    if config.auto_repay {
        let repayer = AutoRepayer::new(
            ContractLoanFacility::new(provider.clone(), config.loan_address)
                .with_overrides(config.overrides),
            Erc20Token::new(provider, config.token),
            wallet,
            config.loan_address,
        )
        .with_interval(config.repay_interval);

        tokio::select! {
            _ = repayer.run() => {}
            _ = tokio::signal::ctrl_c() => tracing::info!("auto-repay watcher stopped"),
        }
    }

    Ok(())
}
