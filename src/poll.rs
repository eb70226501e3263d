// src/poll.rs
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::models::{Choice, Question, QuestionDetail, QuestionFilter};

pub const LATEST_LIMIT: i64 = 5;

/// Records one vote for `choice_id`, scoped to `question_id`.
///
/// The increment happens inside the storage engine as a single statement, so
/// concurrent voters never overwrite each other's counts. Returns `false` when
/// no choice with that id belongs to the question.
pub async fn vote(pool: &SqlitePool, question_id: i64, choice_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE choices
        SET votes = votes + 1
        WHERE id = ? AND question_id = ?
        "#,
    )
    .bind(choice_id)
    .bind(question_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn latest_questions(pool: &SqlitePool, limit: i64) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(
        r#"
        SELECT id, question_text, pub_date
        FROM questions
        ORDER BY pub_date DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn find_question(pool: &SqlitePool, question_id: i64) -> Result<Option<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>("SELECT id, question_text, pub_date FROM questions WHERE id = ?")
        .bind(question_id)
        .fetch_optional(pool)
        .await
}

pub async fn choices_for(pool: &SqlitePool, question_id: i64) -> Result<Vec<Choice>, sqlx::Error> {
    sqlx::query_as::<_, Choice>(
        "SELECT id, question_id, choice_text, votes FROM choices WHERE question_id = ? ORDER BY id",
    )
    .bind(question_id)
    .fetch_all(pool)
    .await
}

pub async fn question_detail(
    pool: &SqlitePool,
    question_id: i64,
) -> Result<Option<QuestionDetail>, sqlx::Error> {
    let Some(question) = find_question(pool, question_id).await? else {
        return Ok(None);
    };
    let choices = choices_for(pool, question_id).await?;
    Ok(Some(QuestionDetail::new(question, choices)))
}

/// Inserts a question and its choices atomically. Texts must already be
/// normalized by the caller.
pub async fn create_question(
    pool: &SqlitePool,
    question_text: &str,
    pub_date: DateTime<Utc>,
    choices: &[String],
) -> Result<QuestionDetail, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let question_id = sqlx::query("INSERT INTO questions (question_text, pub_date) VALUES (?, ?)")
        .bind(question_text)
        .bind(pub_date)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    let mut created = Vec::with_capacity(choices.len());
    for choice_text in choices {
        let id = sqlx::query("INSERT INTO choices (question_id, choice_text) VALUES (?, ?)")
            .bind(question_id)
            .bind(choice_text)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();
        created.push(Choice {
            id,
            question_id,
            choice_text: choice_text.clone(),
            votes: 0,
        });
    }

    tx.commit().await?;

    let question = Question {
        id: question_id,
        question_text: question_text.to_string(),
        pub_date,
    };
    Ok(QuestionDetail::new(question, created))
}

/// Adds a choice to an existing question. `None` when the question is gone.
pub async fn add_choice(
    pool: &SqlitePool,
    question_id: i64,
    choice_text: &str,
) -> Result<Option<Choice>, sqlx::Error> {
    if find_question(pool, question_id).await?.is_none() {
        return Ok(None);
    }

    let id = sqlx::query("INSERT INTO choices (question_id, choice_text) VALUES (?, ?)")
        .bind(question_id)
        .bind(choice_text)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Some(Choice {
        id,
        question_id,
        choice_text: choice_text.to_string(),
        votes: 0,
    }))
}

/// Deletes a question; its choices go with it through the cascading key.
pub async fn delete_question(pool: &SqlitePool, question_id: i64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(question_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn search_questions(
    pool: &SqlitePool,
    filter: &QuestionFilter,
    now: DateTime<Utc>,
) -> Result<Vec<Question>, sqlx::Error> {
    let pattern = filter
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| format!("%{}%", escape_like(q)));
    let (start, end) = match filter.published.window(now) {
        Some((start, end)) => (Some(start), Some(end)),
        None => (None, None),
    };

    sqlx::query_as::<_, Question>(
        r#"
        SELECT id, question_text, pub_date
        FROM questions
        WHERE (? IS NULL OR question_text LIKE ? ESCAPE '\')
          AND (? IS NULL OR pub_date >= ?)
          AND (? IS NULL OR pub_date < ?)
        ORDER BY pub_date DESC, id DESC
        "#,
    )
    .bind(&pattern)
    .bind(&pattern)
    .bind(start)
    .bind(start)
    .bind(end)
    .bind(end)
    .fetch_all(pool)
    .await
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
