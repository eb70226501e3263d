// handlers.rs
use axum::{
    extract::{
        rejection::{FormRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use chrono::Utc;
use http::{request::Parts, StatusCode};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{Choice, NewChoice, NewQuestion, Question, QuestionDetail, QuestionFilter, VoteForm};
use crate::poll;

pub const NO_CHOICE_MESSAGE: &str = "You didn't select a choice.";

/// Question id taken from the path. Ids that are not a number, or do not fit
/// one, cannot name a question and are reported as not found.
#[derive(Debug, Clone, Copy)]
pub struct QuestionId(pub i64);

impl<S> FromRequestParts<S> for QuestionId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Path::<i64>::from_request_parts(parts, state)
            .await
            .map(|Path(id)| QuestionId(id))
            .map_err(|_| question_not_found())
    }
}

pub async fn root() -> &'static str {
    "Polls backend is running"
}

/// The latest published questions, newest first
pub async fn index(State(pool): State<SqlitePool>) -> AppResult<Json<Vec<Question>>> {
    let questions = poll::latest_questions(&pool, poll::LATEST_LIMIT).await?;
    Ok(Json(questions))
}

pub async fn detail(
    State(pool): State<SqlitePool>,
    QuestionId(question_id): QuestionId,
) -> AppResult<Json<QuestionDetail>> {
    load_detail(&pool, question_id).await.map(Json)
}

pub async fn results(
    State(pool): State<SqlitePool>,
    QuestionId(question_id): QuestionId,
) -> AppResult<Json<QuestionDetail>> {
    load_detail(&pool, question_id).await.map(Json)
}

/// Vote for a choice of a question.
///
/// A missing, malformed or foreign choice re-displays the question with an
/// error message and leaves every counter untouched. A counted vote redirects
/// to the results page so a browser refresh cannot post it twice.
pub async fn vote(
    State(pool): State<SqlitePool>,
    QuestionId(question_id): QuestionId,
    form: Result<Form<VoteForm>, FormRejection>,
) -> AppResult<Response> {
    let question = poll::find_question(&pool, question_id)
        .await?
        .ok_or_else(question_not_found)?;

    let choice_id = form.ok().and_then(|Form(form)| form.choice_id());
    let counted = match choice_id {
        Some(choice_id) => poll::vote(&pool, question.id, choice_id).await?,
        None => false,
    };

    if !counted {
        warn!(question_id, ?choice_id, "vote rejected");
        let choices = poll::choices_for(&pool, question.id).await?;
        let detail = QuestionDetail::new(question, choices).with_error(NO_CHOICE_MESSAGE);
        return Ok((StatusCode::BAD_REQUEST, Json(detail)).into_response());
    }

    info!(question_id, ?choice_id, "vote recorded");
    Ok(Redirect::to(&format!("/polls/{question_id}/results")).into_response())
}

/// List questions for administration, filtered by text and publication window
pub async fn admin_questions(
    State(pool): State<SqlitePool>,
    filter: Result<Query<QuestionFilter>, QueryRejection>,
) -> AppResult<Json<Vec<Question>>> {
    let Query(filter) = filter.map_err(|e| AppError::Validation(e.body_text()))?;
    let questions = poll::search_questions(&pool, &filter, Utc::now()).await?;
    Ok(Json(questions))
}

pub async fn create_question(
    State(pool): State<SqlitePool>,
    Json(payload): Json<NewQuestion>,
) -> AppResult<(StatusCode, Json<QuestionDetail>)> {
    let (question_text, choices) = payload.normalized()?;
    let pub_date = payload.pub_date.unwrap_or_else(Utc::now);

    let detail = poll::create_question(&pool, &question_text, pub_date, &choices).await?;
    info!(question_id = detail.question.id, choices = detail.choices.len(), "question created");

    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn add_choice(
    State(pool): State<SqlitePool>,
    QuestionId(question_id): QuestionId,
    Json(payload): Json<NewChoice>,
) -> AppResult<(StatusCode, Json<Choice>)> {
    let choice_text = payload.normalized()?;
    let choice = poll::add_choice(&pool, question_id, &choice_text)
        .await?
        .ok_or_else(question_not_found)?;

    Ok((StatusCode::CREATED, Json(choice)))
}

pub async fn delete_question(
    State(pool): State<SqlitePool>,
    QuestionId(question_id): QuestionId,
) -> AppResult<StatusCode> {
    if !poll::delete_question(&pool, question_id).await? {
        return Err(question_not_found());
    }

    info!(question_id, "question deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn load_detail(pool: &SqlitePool, question_id: i64) -> AppResult<QuestionDetail> {
    poll::question_detail(pool, question_id)
        .await?
        .ok_or_else(question_not_found)
}

fn question_not_found() -> AppError {
    AppError::NotFound("Question does not exist".to_string())
}
