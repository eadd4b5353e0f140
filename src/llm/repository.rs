//! SQLite-backed LLM response cache, adapted from
//! services/llm/repository.rs's `LLMRepository`.

use sqlx::SqlitePool;

use super::models::LLMError;

pub struct LLMRepository {
    pool: SqlitePool,
}

impl LLMRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), LLMError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS llm_response_cache (
                cache_key TEXT PRIMARY KEY,
                prompt_hash TEXT NOT NULL,
                response TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )"#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LLMError::ApiError(e.to_string()))?;
        Ok(())
    }

    pub async fn get(&self, cache_key: &str) -> Result<Option<String>, LLMError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT response FROM llm_response_cache WHERE cache_key = ?")
            .bind(cache_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LLMError::ApiError(e.to_string()))?;
        Ok(row.map(|(response,)| response))
    }

    pub async fn put(&self, cache_key: &str, prompt_hash: &str, response: &str) -> Result<(), LLMError> {
        sqlx::query(
            "INSERT INTO llm_response_cache (cache_key, prompt_hash, response) VALUES (?, ?, ?) \
             ON CONFLICT(cache_key) DO UPDATE SET response = excluded.response, prompt_hash = excluded.prompt_hash",
        )
        .bind(cache_key)
        .bind(prompt_hash)
        .bind(response)
        .execute(&self.pool)
        .await
        .map_err(|e| LLMError::ApiError(e.to_string()))?;
        Ok(())
    }
}
