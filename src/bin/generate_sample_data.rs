// Seeds demo content into the configured database

use tracing::info;
use tracing_subscriber::EnvFilter;

use cooking_blog::{
    config::Config,
    data_seeder::{seed_sample_data, DEMO_USERNAME},
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cooking_blog=info")),
        )
        .init();

    let config = Config::from_env()?;
    info!("Seeding sample data into {}", config.database.url);

    let state = AppState::new(config).await?;
    if seed_sample_data(&state).await? {
        info!("Sample data created; log in as '{}'", DEMO_USERNAME);
    }

    Ok(())
}
