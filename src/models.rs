// models.rs
use chrono::{DateTime, Datelike, Duration, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const MAX_TEXT_LEN: usize = 200;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
}

impl Question {
    pub fn was_published_recently(&self) -> bool {
        self.was_published_recently_at(Utc::now())
    }

    /// True when `now - 1 day <= pub_date <= now`. Future questions are not recent.
    pub fn was_published_recently_at(&self, now: DateTime<Utc>) -> bool {
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
    pub votes: i64,
}

#[derive(Debug, Serialize)]
pub struct QuestionDetail {
    pub question: Question,
    pub was_published_recently: bool,
    pub choices: Vec<Choice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl QuestionDetail {
    pub fn new(question: Question, choices: Vec<Choice>) -> Self {
        Self {
            was_published_recently: question.was_published_recently(),
            question,
            choices,
            error_message: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// Body of the voting form. `choice` carries the selected choice id as text.
#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

impl VoteForm {
    pub fn choice_id(&self) -> Option<i64> {
        self.choice.as_deref()?.trim().parse().ok()
    }
}

#[derive(Debug, Deserialize)]
pub struct NewQuestion {
    pub question_text: String,
    pub pub_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub choices: Vec<String>,
}

impl NewQuestion {
    /// Trims texts and drops blank choices, then checks lengths.
    pub fn normalized(&self) -> AppResult<(String, Vec<String>)> {
        let question_text = validate_text("question_text", &self.question_text)?;
        let choices = self
            .choices
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| validate_text("choice_text", c))
            .collect::<AppResult<Vec<_>>>()?;
        Ok((question_text, choices))
    }
}

#[derive(Debug, Deserialize)]
pub struct NewChoice {
    pub choice_text: String,
}

impl NewChoice {
    pub fn normalized(&self) -> AppResult<String> {
        validate_text("choice_text", &self.choice_text)
    }
}

fn validate_text(field: &str, raw: &str) -> AppResult<String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::Validation(format!(
            "{field} must be at most {MAX_TEXT_LEN} characters"
        )));
    }
    Ok(text.to_string())
}

/// Publication window used by the management listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Published {
    #[default]
    Any,
    Today,
    #[serde(rename = "past_7_days")]
    Past7Days,
    ThisMonth,
    ThisYear,
}

impl Published {
    /// Half-open `[start, end)` bounds relative to `now`, `None` for `Any`.
    pub fn window(self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let today = now.date_naive();
        let midnight = |d: chrono::NaiveDate| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN));
        let tomorrow = midnight(today) + Duration::days(1);

        let start = match self {
            Published::Any => return None,
            Published::Today => midnight(today),
            Published::Past7Days => midnight(today) - Duration::days(7),
            Published::ThisMonth => midnight(today.with_day(1)?),
            Published::ThisYear => midnight(today.with_ordinal(1)?),
        };
        Some((start, tomorrow))
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct QuestionFilter {
    pub q: Option<String>,
    #[serde(default)]
    pub published: Published,
}
