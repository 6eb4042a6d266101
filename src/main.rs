use std::{net::TcpListener, sync::Arc, time::Duration};

use anyhow::Context;
use env_logger::Env;
use prospector::{
    configuration::{get_configuration, StorageBackend},
    dal::{MemoryStorage, PgStorage, Storage},
    services::{
        BrowserStrategy, DroidLauncher, ExtractionStrategy, FirecrawlStrategy,
        GoogleSearchProvider, HttpStrategy, OpenaiClient, Pipeline, PipelineOptions,
        ProcessRegistry, SearchClient, WebsiteScraper,
    },
    startup::run,
};
use sqlx::postgres::PgPoolOptions;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let configuration = get_configuration().context("Failed to read configuration.")?;
    let pipeline_settings = &configuration.pipeline;
    let api_keys = &configuration.api_keys;

    let storage: Arc<dyn Storage> = match configuration.database.storage {
        StorageBackend::Postgres => {
            let pool_options = PgPoolOptions::new()
                .max_connections(20)
                .min_connections(1)
                .acquire_timeout(Duration::from_secs(10))
                .idle_timeout(Duration::from_secs(15 * 60)) // 15 minutes
                .max_lifetime(None);
            let connection_pool = pool_options.connect_lazy_with(configuration.database.with_db());

            sqlx::migrate!()
                .run(&connection_pool)
                .await
                .context("Failed to run database migrations.")?;

            Arc::new(PgStorage::new(connection_pool))
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage, nothing will be persisted");
            Arc::new(MemoryStorage::new())
        }
    };

    let search_provider = GoogleSearchProvider::new(
        api_keys.google_search.clone(),
        api_keys.google_search_engine_id.clone(),
        pipeline_settings.http_timeout(),
    )?;
    let search_client = Arc::new(SearchClient::new(Arc::new(search_provider)));

    let strategies: Vec<Arc<dyn ExtractionStrategy>> = vec![
        Arc::new(FirecrawlStrategy::new(
            api_keys.firecrawl.clone(),
            pipeline_settings.http_timeout(),
        )?),
        Arc::new(BrowserStrategy::new(Arc::new(DroidLauncher::new(
            &configuration.webdriver.url,
            configuration.webdriver.headless,
        )))),
        Arc::new(HttpStrategy::new(pipeline_settings.http_timeout())?),
    ];
    let scraper = Arc::new(WebsiteScraper::new(strategies));

    let openai_client = Arc::new(OpenaiClient::new(
        api_keys.openai.clone(),
        &pipeline_settings.model,
        pipeline_settings.ai_timeout(),
    ));

    let pipeline = Pipeline::new(
        search_client,
        scraper,
        openai_client,
        storage,
        PipelineOptions::from_settings(pipeline_settings, &configuration.webdriver),
    );
    let registry = ProcessRegistry::new(Arc::new(pipeline));

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    log::info!("Listening on {}", address);

    run(listener, registry)?.await?;
    Ok(())
}
