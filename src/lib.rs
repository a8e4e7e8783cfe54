pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::database::{pg_store::PgQuizStore, store::QuizStore};
use crate::error::{Error, Result};
use crate::services::{
    attempt_service::AttemptService,
    catalog_service::{Catalog, HttpCatalog},
    identity_service::{HttpIdentityProvider, IdentityProvider},
    question_service::QuestionService,
    quiz_service::QuizService,
    quiz_setting_service::QuizSettingService,
    runtime_service::RuntimeService,
};
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// Everything a request handler needs. Built once at start-up and cloned
/// into each handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub identity: Arc<dyn IdentityProvider>,
    pub question_service: QuestionService,
    pub quiz_service: QuizService,
    pub quiz_setting_service: QuizSettingService,
    pub runtime_service: RuntimeService,
    pub attempt_service: AttemptService,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn QuizStore>,
        catalog: Arc<dyn Catalog>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let quiz_setting_service = QuizSettingService::new(store.clone());

        Self {
            config: Arc::new(config),
            identity,
            question_service: QuestionService::new(store.clone(), catalog.clone()),
            quiz_service: QuizService::new(store.clone(), catalog),
            runtime_service: RuntimeService::new(store.clone(), quiz_setting_service.clone()),
            quiz_setting_service,
            attempt_service: AttemptService::new(store),
        }
    }

    /// Production wiring: Postgres store and HTTP-backed catalog and identity.
    pub fn from_pool(config: Config, pool: PgPool) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let catalog = HttpCatalog::new(http_client.clone(), &config)?;
        let identity = HttpIdentityProvider::new(http_client, &config)?;

        Ok(Self::new(
            config,
            Arc::new(PgQuizStore::new(pool)),
            Arc::new(catalog),
            Arc::new(identity),
        ))
    }
}
