use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::catalog::{CourseRecord, TopicRecord};

/// Course and topic lookups owned by other services.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn get_course(&self, course_id: i64) -> Result<CourseRecord>;
    async fn get_topic(&self, topic_id: i64) -> Result<TopicRecord>;
}

#[derive(Clone)]
pub struct HttpCatalog {
    client: Client,
    course_base: Url,
    topic_base: Url,
    service_token: Option<String>,
}

impl HttpCatalog {
    pub fn new(client: Client, config: &Config) -> Result<Self> {
        Ok(Self {
            client,
            course_base: parse_base(&config.educational_program_url)?,
            topic_base: parse_base(&config.question_bank_url)?,
            service_token: config.service_token.clone(),
        })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.service_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(Error::NotFound(format!("{} not found", what))),
            status if status.is_success() => Ok(response.json::<T>().await?),
            status => {
                tracing::warn!(%url, %status, "catalog lookup failed");
                Err(Error::Internal(format!(
                    "{} lookup returned unexpected status {}",
                    what, status
                )))
            }
        }
    }
}

/// Base URLs are joined with relative paths, so they must end in a slash.
pub(crate) fn parse_base(raw: &str) -> Result<Url> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized).map_err(|e| Error::Config(format!("Invalid URL '{}': {}", raw, e)))
}

fn join(base: &Url, path: &str) -> Result<Url> {
    base.join(path)
        .map_err(|e| Error::Internal(format!("Failed to build URL for {}: {}", path, e)))
}

#[async_trait]
impl Catalog for HttpCatalog {
    async fn get_course(&self, course_id: i64) -> Result<CourseRecord> {
        let url = join(&self.course_base, &format!("api/v1/course/{}", course_id))?;
        self.fetch(url, &format!("Course {}", course_id)).await
    }

    async fn get_topic(&self, topic_id: i64) -> Result<TopicRecord> {
        let url = join(&self.topic_base, &format!("api/v1/topic/{}", topic_id))?;
        self.fetch(url, &format!("Topic {}", topic_id)).await
    }
}
