use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::db::models::QuestionRow;
use crate::error::{AppError, Result};
use crate::types::{Question, QuestionStatus, StatusFilter};

/// Fields accepted from the submission form. Everything else is seeded here.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub title: String,
    pub description: Option<String>,
    pub end_date: String,
    pub end_time: String,
    pub category: String,
    pub photo_url: Option<String>,
}

impl NewQuestion {
    /// Title, end date/time and category are required; everything else is
    /// optional or seeded at insert.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("title", &self.title),
            ("endDate", &self.end_date),
            ("endTime", &self.end_time),
            ("category", &self.category),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// SQLite store for submitted questions and their moderation state.
#[derive(Clone)]
pub struct QuestionStore {
    pool: Pool<Sqlite>,
}

impl QuestionStore {
    /// Open (creating if missing) the database at `db_path` and run migrations.
    pub async fn open(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))
            .map_err(AppError::Storage)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Question store ready at {db_path}");
        Ok(Self { pool })
    }

    pub fn with_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Insert a new question. Title, end date/time and category are required;
    /// `initial_status` is `Approved` only for verified admin submissions.
    pub async fn insert(
        &self,
        new: NewQuestion,
        initial_status: QuestionStatus,
    ) -> Result<Question> {
        new.validate()?;

        let id = uuid::Uuid::new_v4().to_string();
        let symbol = new.category.to_uppercase();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO questions (
                id, title, description, end_date, end_time, category, symbol,
                photo_url, status, yes_percentage, no_percentage, volume,
                is_new, market_id, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 50, 50, '$0', 1, NULL, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.end_date)
        .bind(&new.end_time)
        .bind(&new.category)
        .bind(&symbol)
        .bind(&new.photo_url)
        .bind(initial_status.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> Result<Question> {
        let row: Option<QuestionRow> =
            sqlx::query_as("SELECT * FROM questions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Question::from)
            .ok_or_else(|| AppError::NotFound(format!("question {id}")))
    }

    /// All records matching the filter, newest-first by creation time.
    pub async fn list_by_status(&self, filter: StatusFilter) -> Result<Vec<Question>> {
        let rows: Vec<QuestionRow> = match filter {
            StatusFilter::All => {
                sqlx::query_as("SELECT * FROM questions ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
            StatusFilter::Pending | StatusFilter::Approved | StatusFilter::Rejected => {
                let status = match filter {
                    StatusFilter::Pending => "pending",
                    StatusFilter::Approved => "approved",
                    _ => "rejected",
                };
                sqlx::query_as(
                    "SELECT * FROM questions WHERE status = ? ORDER BY created_at DESC",
                )
                .bind(status)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(rows.into_iter().map(Question::from).collect())
    }

    /// Set a question's moderation status, refreshing `updated_at`.
    pub async fn update_status(&self, id: &str, status: QuestionStatus) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query("UPDATE questions SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("question {id}")));
        }
        Ok(())
    }

    /// Record the on-chain market identifier once the market is deployed.
    /// The deployment itself happens outside this system.
    pub async fn set_market_id(&self, id: &str, market_id: u64) -> Result<()> {
        let now = chrono::Utc::now().to_rfc3339();
        let result =
            sqlx::query("UPDATE questions SET market_id = ?, updated_at = ? WHERE id = ?")
                .bind(market_id as i64)
                .bind(&now)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("question {id}")));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
