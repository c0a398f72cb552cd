use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// The API occasionally sends `null` for fields that are normally present.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ArticleSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

// Identity is the url.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub source: ArticleSource,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub url: String,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

// `/v2/top-headlines` and `/v2/everything`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsResponse {
    pub status: String,
    #[serde(default)]
    pub total_results: Option<u32>,
    #[serde(default)]
    pub articles: Option<Vec<Article>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceResponse {
    pub status: String,
    #[serde(default)]
    pub sources: Option<Vec<Source>>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// One fetch response as seen by the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultPage<T> {
    /// `None` when the response had no payload at all.
    pub items: Option<Vec<T>>,
    pub success: bool,
    pub message: Option<String>,
    pub total_results: Option<u32>,
}

impl<T> ResultPage<T> {
    pub fn success(items: Vec<T>) -> Self {
        Self {
            items: Some(items),
            success: true,
            message: None,
            total_results: None,
        }
    }

    pub fn with_total(mut self, total_results: Option<u32>) -> Self {
        self.total_results = total_results;
        self
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            items: None,
            success: false,
            message: Some(message.into()),
            total_results: None,
        }
    }

    pub fn empty_body() -> Self {
        Self {
            items: None,
            success: true,
            message: None,
            total_results: None,
        }
    }
}

impl From<NewsResponse> for ResultPage<Article> {
    fn from(body: NewsResponse) -> Self {
        if body.status != "ok" {
            return ResultPage::failure(
                body.message.unwrap_or_else(|| format!("status: {}", body.status)),
            );
        }
        ResultPage {
            items: body.articles,
            success: true,
            message: None,
            total_results: body.total_results,
        }
    }
}

impl From<SourceResponse> for ResultPage<Source> {
    fn from(body: SourceResponse) -> Self {
        if body.status != "ok" {
            return ResultPage::failure(
                body.message.unwrap_or_else(|| format!("status: {}", body.status)),
            );
        }
        let total = body.sources.as_ref().map(|s| s.len() as u32);
        ResultPage {
            items: body.sources,
            success: true,
            message: None,
            total_results: total,
        }
    }
}
