use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::coordinator::{Coordinator, StreamView};
use crate::db::{Database, SavedArticle};
use crate::models::{Article, Source};

pub struct AppState {
    pub db: Arc<Database>,
    pub headlines: Arc<Coordinator<Article>>,
    pub search: Arc<Coordinator<Article>>,
    pub sources: Arc<Coordinator<Source>>,
    pub categories: Vec<String>,
    pub country: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/categories", get(categories))
        .route("/headlines", get(headlines).post(load_headlines))
        .route("/headlines/more", post(more_headlines))
        .route(
            "/search",
            get(search).post(start_search).delete(close_search),
        )
        .route("/search/more", post(more_search))
        .route("/sources", get(sources).post(load_sources))
        .route(
            "/saved",
            get(saved_articles).post(save_article).delete(delete_saved),
        )
        .route("/saved/status", get(saved_status))
        .route("/settings/ui-mode", get(ui_mode).put(set_ui_mode))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::Conflict(message) => (StatusCode::CONFLICT, message),
            AppError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", err)),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError::Internal(err.into())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

// Fetches run on their own task so a dropped request cannot strand a stream in Loading.
async fn detached<T, F>(fut: F) -> Result<T, AppError>
where
    F: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::spawn(fut).await?)
}

fn in_flight(stream: &str) -> AppError {
    AppError::Conflict(format!("A {} fetch is already in flight", stream))
}

pub async fn health() -> impl IntoResponse {
    "OK"
}

pub async fn categories(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.categories.clone())
}

pub async fn headlines(State(state): State<Arc<AppState>>) -> Json<StreamView<Article>> {
    Json(state.headlines.view().await)
}

#[derive(Debug, Default, Deserialize)]
pub struct HeadlinesRequest {
    #[serde(default)]
    pub category: Option<String>,
}

pub async fn load_headlines(
    State(state): State<Arc<AppState>>,
    body: Result<Json<HeadlinesRequest>, JsonRejection>,
) -> Result<Json<StreamView<Article>>, AppError> {
    // A request without a JSON body loads the default category.
    let request = match body {
        Ok(Json(request)) => request,
        Err(JsonRejection::MissingJsonContentType(_)) => HeadlinesRequest::default(),
        Err(rejection) => return Err(AppError::BadRequest(rejection.body_text())),
    };
    let category = request
        .category
        .or_else(|| state.categories.first().cloned())
        .unwrap_or_default();

    if !state.categories.contains(&category) {
        return Err(AppError::BadRequest(format!(
            "Unknown category: {}",
            category
        )));
    }

    let headlines = state.headlines.clone();
    detached(async move { headlines.try_start(&category).await })
        .await?
        .ok_or_else(|| in_flight("headlines"))?;
    Ok(Json(state.headlines.view().await))
}

pub async fn more_headlines(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StreamView<Article>>, AppError> {
    let headlines = state.headlines.clone();
    detached(async move { headlines.fetch_next().await }).await?;
    Ok(Json(state.headlines.view().await))
}

pub async fn search(State(state): State<Arc<AppState>>) -> Json<StreamView<Article>> {
    Json(state.search.view().await)
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
}

pub async fn start_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<StreamView<Article>>, AppError> {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(AppError::BadRequest("Search query must not be empty".to_string()));
    }

    // Closing the new search returns to the result shown before it.
    let search = state.search.clone();
    detached(async move { search.start_transient(&query).await })
        .await?
        .ok_or_else(|| in_flight("search"))?;
    Ok(Json(state.search.view().await))
}

pub async fn more_search(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StreamView<Article>>, AppError> {
    let search = state.search.clone();
    detached(async move { search.fetch_next().await }).await?;
    Ok(Json(state.search.view().await))
}

pub async fn close_search(State(state): State<Arc<AppState>>) -> Json<StreamView<Article>> {
    if !state.search.restore_snapshot().await {
        state.search.reset().await;
    }
    Json(state.search.view().await)
}

pub async fn sources(State(state): State<Arc<AppState>>) -> Json<StreamView<Source>> {
    Json(state.sources.view().await)
}

pub async fn load_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StreamView<Source>>, AppError> {
    let sources = state.sources.clone();
    let country = state.country.clone();
    detached(async move { sources.try_start(&country).await })
        .await?
        .ok_or_else(|| in_flight("sources"))?;
    Ok(Json(state.sources.view().await))
}

pub async fn saved_articles(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SavedArticle>>, AppError> {
    Ok(Json(state.db.get_saved_articles().await?))
}

pub async fn save_article(
    State(state): State<Arc<AppState>>,
    Json(article): Json<Article>,
) -> Result<impl IntoResponse, AppError> {
    if article.url.trim().is_empty() {
        return Err(AppError::BadRequest("Article url must not be empty".to_string()));
    }
    state.db.save_article(&article).await?;
    info!("Saved article {}", article.url);
    Ok(StatusCode::CREATED)
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct SavedStatus {
    pub url: String,
    pub saved: bool,
}

pub async fn saved_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<SavedStatus>, AppError> {
    let saved = state.db.is_saved(&query.url).await?;
    Ok(Json(SavedStatus {
        url: query.url,
        saved,
    }))
}

pub async fn delete_saved(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
) -> Result<impl IntoResponse, AppError> {
    if !state.db.delete_article(&query.url).await? {
        return Err(AppError::NotFound(format!("Not saved: {}", query.url)));
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UiMode {
    pub dark_mode: bool,
}

pub async fn ui_mode(State(state): State<Arc<AppState>>) -> Result<Json<UiMode>, AppError> {
    let dark_mode = state.db.get_dark_mode().await?;
    Ok(Json(UiMode { dark_mode }))
}

pub async fn set_ui_mode(
    State(state): State<Arc<AppState>>,
    Json(mode): Json<UiMode>,
) -> Result<Json<UiMode>, AppError> {
    state.db.set_dark_mode(mode.dark_mode).await?;
    Ok(Json(mode))
}
