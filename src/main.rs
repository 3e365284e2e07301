use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use foliodesk::{AppConfig, AppState, Mailer, OpenAiCompatClient, PortfolioAgent, Result};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(provider = ?config.provider, model = %config.model, "starting");

    let model = Arc::new(OpenAiCompatClient::from_config(&config)?);
    let agent = PortfolioAgent::new(model);
    let mailer = Mailer::new(config.mail.clone());

    AppState::new(agent, mailer, config.notify_email.clone())
        .serve(config.bind_addr)
        .await
}
