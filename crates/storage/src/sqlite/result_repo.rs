use async_trait::async_trait;
use quiz_core::model::{ResultId, ScoredResult, ScoredResultPayload};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, result_id_from_i64, ser, u32_from_i64};
use crate::repository::{ResultHistory, ResultSink, StorageError};

/// Rebuild a stored result through its strict boundary shape.
fn result_from_row(row: &SqliteRow) -> Result<ScoredResult, StorageError> {
    let id = result_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let details: String = row.try_get("question_results").map_err(ser)?;
    let payload = ScoredResultPayload {
        id: Some(id),
        topic: row.try_get("topic").map_err(ser)?,
        score: u32_from_i64("score", row.try_get::<i64, _>("score").map_err(ser)?)?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get::<i64, _>("total_questions").map_err(ser)?,
        )?,
        time_spent: u32_from_i64("time_spent", row.try_get::<i64, _>("time_spent").map_err(ser)?)?,
        completed_at: row.try_get("completed_at").map_err(ser)?,
        // Unknown or missing per-question fields fail here.
        question_results: serde_json::from_str(&details).map_err(ser)?,
    };
    ScoredResult::try_from(payload).map_err(ser)
}

#[async_trait]
impl ResultSink for SqliteRepository {
    async fn persist(&self, result: &ScoredResult) -> Result<ScoredResult, StorageError> {
        let details = serde_json::to_string(result.question_results()).map_err(ser)?;

        let mut tx = self.pool.begin().await.map_err(conn)?;
        let res = sqlx::query(
            r"
                INSERT INTO quiz_results (
                    topic, score, total_questions, time_spent, completed_at, question_results
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(result.topic())
        .bind(i64::from(result.score()))
        .bind(i64::from(result.total_questions()))
        .bind(i64::from(result.time_spent()))
        .bind(result.completed_at())
        .bind(details)
        .execute(&mut *tx)
        .await
        .map_err(conn)?;
        tx.commit().await.map_err(conn)?;

        let id = result_id_from_i64(res.last_insert_rowid())?;
        tracing::debug!(result_id = %id, "persisted quiz result");
        Ok(result.clone().with_id(id))
    }
}

#[async_trait]
impl ResultHistory for SqliteRepository {
    async fn get_result(&self, id: ResultId) -> Result<ScoredResult, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, topic, score, total_questions, time_spent, completed_at, question_results
                FROM quiz_results
                WHERE id = ?1
            ",
        )
        .bind(id_i64("result_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        result_from_row(&row)
    }

    async fn list_results(&self, limit: u32) -> Result<Vec<ScoredResult>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, topic, score, total_questions, time_spent, completed_at, question_results
                FROM quiz_results
                ORDER BY completed_at DESC, id DESC
                LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(result_from_row).collect()
    }
}
