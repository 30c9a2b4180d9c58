use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{middleware::from_fn, web, App, HttpServer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use credora_server::{cors::build_cors, payment_gate, AppState, FacilitatorClient, ServerConfig};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,actix_web=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    let payments = match config.payment_config() {
        Ok(payments) => payments,
        Err(e) => {
            tracing::error!(error = %e, "invalid payment configuration");
            std::process::exit(1);
        }
    };
    let facilitator = FacilitatorClient::new(&config.facilitator_url, config.hmac_secret.clone())
        .map_err(std::io::Error::other)?;

    let state = web::Data::new(AppState {
        payments,
        facilitator,
        metrics_token: config.metrics_token.clone(),
        public_metrics: config.public_metrics,
    });

    let governor_conf = GovernorConfigBuilder::default()
        .requests_per_minute(config.rate_limit_rpm)
        .finish()
        .ok_or_else(|| std::io::Error::other("invalid rate limit configuration"))?;

    let port = config.port;
    let cors_origins = config.allowed_origins.clone();

    tracing::info!(
        pay_to = %config.pay_to,
        facilitator = %config.facilitator_url,
        price = %config.premium_price,
        network = %config.premium_network,
        "payment gate configured"
    );
    tracing::info!("Rate limit: {} req/min per IP", config.rate_limit_rpm);
    tracing::info!("credora server listening at http://0.0.0.0:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(from_fn(payment_gate))
            .wrap(Governor::new(&governor_conf))
            .wrap(build_cors(&cors_origins))
            .app_data(state.clone())
            .configure(credora_server::configure)
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
