use async_trait::async_trait;
use quiz_core::model::{Difficulty, Question};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, question_id_from_i64, ser, u32_from_i64};
use crate::repository::{CategorySummary, QuestionSource, StorageError};

fn question_from_row(row: &SqliteRow) -> Result<Question, StorageError> {
    let id = question_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?;
    let options_json: String = row.try_get("options").map_err(ser)?;
    let options: Vec<String> = serde_json::from_str(&options_json).map_err(ser)?;
    let difficulty: Difficulty = row
        .try_get::<String, _>("difficulty")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    Question::new(
        id,
        row.try_get::<String, _>("text").map_err(ser)?,
        options,
        row.try_get::<String, _>("correct_answer").map_err(ser)?,
        row.try_get::<String, _>("category").map_err(ser)?,
        difficulty,
    )
    .map_err(ser)
}

impl SqliteRepository {
    /// Insert or replace questions in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if any write fails; nothing is written in that case.
    pub async fn upsert_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;
        for question in questions {
            let options = serde_json::to_string(question.options()).map_err(ser)?;
            sqlx::query(
                r"
                INSERT INTO questions (id, text, options, correct_answer, category, difficulty)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO UPDATE SET
                    text = excluded.text,
                    options = excluded.options,
                    correct_answer = excluded.correct_answer,
                    category = excluded.category,
                    difficulty = excluded.difficulty
                ",
            )
            .bind(id_i64("question_id", question.id().value())?)
            .bind(question.text())
            .bind(options)
            .bind(question.correct_answer())
            .bind(question.category())
            .bind(question.difficulty().as_str())
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }
        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}

#[async_trait]
impl QuestionSource for SqliteRepository {
    async fn fetch_all(&self) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, text, options, correct_answer, category, difficulty
            FROM questions
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(question_from_row).collect()
    }

    async fn fetch_by_category(&self, label: &str) -> Result<Vec<Question>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, text, options, correct_answer, category, difficulty
            FROM questions
            WHERE category = ?1 COLLATE NOCASE
            ORDER BY id ASC
            ",
        )
        .bind(label)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(question_from_row).collect()
    }

    async fn list_categories(&self) -> Result<Vec<CategorySummary>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT category, COUNT(*) AS question_count
            FROM questions
            GROUP BY category
            ORDER BY category ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let label: String = row.try_get("category").map_err(ser)?;
            let count = u32_from_i64(
                "question_count",
                row.try_get::<i64, _>("question_count").map_err(ser)?,
            )?;
            out.push(CategorySummary::from_label(&label, count));
        }
        Ok(out)
    }
}
