//! Database row types for the questions table. Used by sqlx for typed queries.

use crate::types::{Question, QuestionStatus};

#[derive(Debug, sqlx::FromRow)]
pub struct QuestionRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub end_date: String,
    pub end_time: String,
    pub category: String,
    pub symbol: String,
    pub photo_url: Option<String>,
    pub status: String,
    pub yes_percentage: i64,
    pub no_percentage: i64,
    pub volume: String,
    pub is_new: i64,
    pub market_id: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<QuestionRow> for Question {
    fn from(r: QuestionRow) -> Self {
        Question {
            id: r.id,
            title: r.title,
            description: r.description,
            end_date: r.end_date,
            end_time: r.end_time,
            category: r.category,
            symbol: r.symbol,
            photo_url: r.photo_url,
            // Unknown status strings can only come from manual DB edits;
            // treat them as pending so they never leak into public listings.
            status: QuestionStatus::parse(&r.status).unwrap_or(QuestionStatus::Pending),
            yes_percentage: r.yes_percentage.clamp(0, 100) as u8,
            no_percentage: r.no_percentage.clamp(0, 100) as u8,
            volume: r.volume,
            is_new: r.is_new != 0,
            market_id: r.market_id.and_then(|id| u64::try_from(id).ok()),
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}
