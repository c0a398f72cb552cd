use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::coordinator::PageSource;
use crate::error::TransportFailure;
use crate::models::{ApiErrorBody, Article, NewsResponse, ResultPage, Source, SourceResponse};

/// HTTP transport for a NewsAPI-compatible service.
pub struct NewsClient {
    client: Client,
    base_url: String,
    api_key: String,
    country: String,
}

impl NewsClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("Newsdesk/1.0 (News Reader)")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            country: config.country.clone(),
        })
    }

    pub fn country(&self) -> &str {
        &self.country
    }

    pub async fn top_headlines(
        &self,
        category: &str,
        page: u32,
    ) -> Result<ResultPage<Article>, TransportFailure> {
        info!("Fetching top headlines: category={} page={}", category, page);
        let page = page.to_string();
        self.get::<NewsResponse, Article>(
            "/v2/top-headlines",
            &[
                ("country", self.country.as_str()),
                ("category", category),
                ("page", page.as_str()),
            ],
        )
        .await
    }

    pub async fn search(
        &self,
        query: &str,
        page: u32,
    ) -> Result<ResultPage<Article>, TransportFailure> {
        info!("Searching news: q={} page={}", query, page);
        let page = page.to_string();
        self.get::<NewsResponse, Article>("/v2/everything", &[("q", query), ("page", page.as_str())])
            .await
    }

    pub async fn sources(&self, country: &str) -> Result<ResultPage<Source>, TransportFailure> {
        info!("Fetching sources: country={}", country);
        self.get::<SourceResponse, Source>("/v2/sources", &[("country", country)])
            .await
    }

    async fn get<B, T>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<ResultPage<T>, TransportFailure>
    where
        B: DeserializeOwned + Into<ResultPage<T>>,
    {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(ResultPage::failure(Self::failure_message(response).await));
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            warn!("Empty response body from {}", path);
            return Ok(ResultPage::empty_body());
        }

        let body: B = serde_json::from_slice(&bytes)?;
        Ok(body.into())
    }

    async fn failure_message(response: Response) -> String {
        let status = response.status();
        let reason = status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());

        match response.bytes().await {
            Ok(bytes) => match serde_json::from_slice::<ApiErrorBody>(&bytes) {
                Ok(ApiErrorBody {
                    message: Some(message),
                    code,
                }) => {
                    debug!("API error {} ({:?}): {}", status, code, message);
                    message
                }
                _ => reason,
            },
            Err(_) => reason,
        }
    }
}

pub struct TopHeadlines(pub Arc<NewsClient>);

#[async_trait]
impl PageSource<Article> for TopHeadlines {
    async fn fetch(&self, key: &str, page: u32) -> Result<ResultPage<Article>, TransportFailure> {
        self.0.top_headlines(key, page).await
    }
}

pub struct Everything(pub Arc<NewsClient>);

#[async_trait]
impl PageSource<Article> for Everything {
    async fn fetch(&self, key: &str, page: u32) -> Result<ResultPage<Article>, TransportFailure> {
        self.0.search(key, page).await
    }
}

// Keyed by country; the endpoint is not paginated.
pub struct SourceDirectory(pub Arc<NewsClient>);

#[async_trait]
impl PageSource<Source> for SourceDirectory {
    async fn fetch(&self, key: &str, _page: u32) -> Result<ResultPage<Source>, TransportFailure> {
        self.0.sources(key).await
    }
}
