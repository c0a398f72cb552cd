use chrono::Utc;
use serde::Serialize;
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::models::Article;

const DARK_MODE_KEY: &str = "ui_dark_mode";

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SavedArticle {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub source_name: String,
    pub saved_at: String,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Every connection to an in-memory database gets its own empty database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_articles (
                id INTEGER PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                title TEXT NOT NULL,
                description TEXT,
                url_to_image TEXT,
                published_at TEXT,
                source_name TEXT NOT NULL,
                saved_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_article(&self, article: &Article) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        let published = article.published_at.map(|p| p.to_rfc3339());

        sqlx::query(
            r#"
            INSERT INTO saved_articles
                (url, title, description, url_to_image, published_at, source_name, saved_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                url_to_image = excluded.url_to_image,
                published_at = excluded.published_at,
                source_name = excluded.source_name
            "#,
        )
        .bind(&article.url)
        .bind(&article.title)
        .bind(&article.description)
        .bind(&article.url_to_image)
        .bind(published)
        .bind(&article.source.name)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Returns `false` if nothing was saved under `url`.
    pub async fn delete_article(&self, url: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM saved_articles WHERE url = ?")
            .bind(url)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_saved_articles(&self) -> anyhow::Result<Vec<SavedArticle>> {
        let articles = sqlx::query_as::<_, SavedArticle>(
            "SELECT * FROM saved_articles ORDER BY saved_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(articles)
    }

    pub async fn is_saved(&self, url: &str) -> anyhow::Result<bool> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM saved_articles WHERE url = ?")
            .bind(url)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    pub async fn get_dark_mode(&self) -> anyhow::Result<bool> {
        let value: Option<(String,)> = sqlx::query_as("SELECT value FROM preferences WHERE key = ?")
            .bind(DARK_MODE_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value.map(|(v,)| v == "true").unwrap_or(false))
    }

    pub async fn set_dark_mode(&self, enabled: bool) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(DARK_MODE_KEY)
        .bind(enabled.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
