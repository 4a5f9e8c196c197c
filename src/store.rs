use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqliteSynchronous};
use sqlx::{ConnectOptions, Pool, Sqlite};
use std::str::FromStr;

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};

use crate::data;
use crate::models::{Discipline, QuestionLogEntry, ReviewLogEntry, StudyData, UserSettings};

const KEY_DISCIPLINES: &str = "disciplines";
const KEY_REVIEW_HISTORY: &str = "review_history";
const KEY_QUESTION_HISTORY: &str = "question_history";
const KEY_SETTINGS: &str = "settings";

/// SQLite-backed document store: each collection is one JSON document under
/// its own key, read and written independently. There is no transaction
/// spanning collections.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    pub async fn open(path: &str) -> anyhow::Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}?mode=rwc"))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .log_statements(log::LevelFilter::Trace);

        let pool = SqlitePool::connect_with(options).await?;

        let store = Store { pool };
        store.migrate().await?;
        store.seed_if_empty().await?;

        Ok(store)
    }

    async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn seed_if_empty(&self) -> anyhow::Result<()> {
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;

        if count == 0 {
            self.save_disciplines(&data::default_disciplines(Utc::now()))
                .await?;
            self.save_review_history(&[]).await?;
            self.save_question_history(&[]).await?;
            self.save_settings(&UserSettings::default()).await?;
        }
        Ok(())
    }

    async fn read_document(&self, key: &str) -> anyhow::Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM documents WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }

    async fn write_document<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let raw = serde_json::to_string(value)?;
        sqlx::query(
            r#"
            INSERT INTO documents (key, value, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE
                SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Parse a stored document, recovering to `fallback` when the JSON is
    /// malformed. Corruption is logged, never fatal, and the stored bytes
    /// are left as-is until the next save.
    async fn load_or<T: DeserializeOwned>(
        &self,
        key: &str,
        fallback: impl FnOnce() -> T,
    ) -> anyhow::Result<T> {
        match self.read_document(key).await? {
            None => Ok(fallback()),
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(value) => Ok(value),
                Err(err) => {
                    log::warn!("stored '{key}' is unreadable, using defaults: {err}");
                    Ok(fallback())
                }
            },
        }
    }

    pub async fn load_disciplines(&self) -> anyhow::Result<Vec<Discipline>> {
        self.load_or(KEY_DISCIPLINES, || data::default_disciplines(Utc::now()))
            .await
    }

    pub async fn save_disciplines(&self, disciplines: &[Discipline]) -> anyhow::Result<()> {
        self.write_document(KEY_DISCIPLINES, &disciplines).await
    }

    pub async fn load_review_history(&self) -> anyhow::Result<Vec<ReviewLogEntry>> {
        self.load_or(KEY_REVIEW_HISTORY, Vec::new).await
    }

    pub async fn save_review_history(&self, history: &[ReviewLogEntry]) -> anyhow::Result<()> {
        self.write_document(KEY_REVIEW_HISTORY, &history).await
    }

    pub async fn load_question_history(&self) -> anyhow::Result<Vec<QuestionLogEntry>> {
        self.load_or(KEY_QUESTION_HISTORY, Vec::new).await
    }

    pub async fn save_question_history(&self, history: &[QuestionLogEntry]) -> anyhow::Result<()> {
        self.write_document(KEY_QUESTION_HISTORY, &history).await
    }

    pub async fn load_settings(&self) -> anyhow::Result<UserSettings> {
        self.load_or(KEY_SETTINGS, UserSettings::default).await
    }

    pub async fn save_settings(&self, settings: &UserSettings) -> anyhow::Result<()> {
        self.write_document(KEY_SETTINGS, settings).await
    }

    pub async fn load_all(&self) -> anyhow::Result<StudyData> {
        Ok(StudyData {
            disciplines: self.load_disciplines().await?,
            review_history: self.load_review_history().await?,
            question_history: self.load_question_history().await?,
            settings: self.load_settings().await?,
        })
    }

    /// Write a raw (non-JSON) value under a collection key. Test hook for
    /// exercising the corruption fallback.
    #[cfg(test)]
    async fn write_raw(&self, key: &str, raw: &str) -> anyhow::Result<()> {
        sqlx::query("INSERT OR REPLACE INTO documents (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(raw)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
