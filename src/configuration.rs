use std::time::Duration;

use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;
use sqlx::postgres::{PgConnectOptions, PgSslMode};

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub database: DatabaseSettings,
    pub api_keys: ApiKeys,
    pub webdriver: WebdriverSettings,
    pub pipeline: PipelineSettings,
}

#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
}

#[derive(Deserialize, Clone, Copy, PartialEq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    Memory,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseSettings {
    pub storage: StorageBackend,
    pub username: String,
    pub password: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
    pub host: String,
    pub database_name: String,
    pub require_ssl: bool,
}

impl DatabaseSettings {
    pub fn without_db(&self) -> PgConnectOptions {
        let ssl_mode = match self.require_ssl {
            true => PgSslMode::Require,
            false => PgSslMode::Prefer,
        };
        PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .port(self.port)
            .ssl_mode(ssl_mode)
    }

    pub fn with_db(&self) -> PgConnectOptions {
        self.without_db().database(&self.database_name)
    }
}

#[derive(Deserialize, Clone, Default)]
pub struct ApiKeys {
    #[serde(default)]
    pub openai: String,
    #[serde(default)]
    pub google_search: String,
    #[serde(default)]
    pub google_search_engine_id: String,
    #[serde(default)]
    pub firecrawl: String,
}

#[derive(Deserialize, Clone)]
pub struct WebdriverSettings {
    pub url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub navigation_timeout_secs: u64,
    pub headless: bool,
}

impl WebdriverSettings {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

/// Knobs for a pipeline run. Every external call site reads its timeout and retry
/// budget from here.
#[derive(Deserialize, Clone, Debug)]
pub struct PipelineSettings {
    pub model: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub default_max_results: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub results_per_query: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub retry_attempts: u32,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub rate_limit_delay_ms: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_pages: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_search_queries_per_member: usize,
    pub skip_research_retries: bool,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub scrape_concurrency: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub research_concurrency: usize,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub ai_timeout_secs: u64,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub http_timeout_secs: u64,
}

impl PipelineSettings {
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            model: "gpt-4o-mini".to_string(),
            default_max_results: 10,
            results_per_query: 10,
            retry_attempts: 3,
            rate_limit_delay_ms: 1_000,
            max_pages: 3,
            max_search_queries_per_member: 3,
            skip_research_retries: true,
            scrape_concurrency: 3,
            research_concurrency: 4,
            ai_timeout_secs: 60,
            http_timeout_secs: 30,
        }
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir().map_err(|e| config::ConfigError::Foreign(e.into()))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename))
                .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}

#[cfg(test)]
mod tests {
    use super::{Environment, PipelineSettings};

    #[test]
    fn environment_parses_case_insensitively() {
        let env: Result<Environment, _> = "Production".to_string().try_into();
        assert!(matches!(env, Ok(Environment::Production)));

        let env: Result<Environment, _> = "staging".to_string().try_into();
        assert!(env.is_err());
    }

    #[test]
    fn default_pipeline_settings_are_bounded() {
        let settings = PipelineSettings::default();
        assert!(settings.retry_attempts > 0);
        assert!(settings.scrape_concurrency > 0);
        assert!(settings.ai_timeout().as_secs() > 0);
    }
}
