use tracing::info;

use crate::db::questions::NewQuestion;
use crate::db::QuestionStore;
use crate::error::{AppError, Result};
use crate::storage::ImageStore;
use crate::types::{Question, QuestionStatus};

/// One submission from the question form, photo still in memory.
#[derive(Debug)]
pub struct SubmittedQuestion {
    pub title: String,
    pub description: Option<String>,
    pub end_date: String,
    pub end_time: String,
    pub category: String,
    pub photo: Option<SubmittedPhoto>,
}

#[derive(Debug)]
pub struct SubmittedPhoto {
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

/// Question lifecycle: submit → pending → approved/rejected. Approved and
/// rejected are terminal; re-opening a decision is out of scope.
#[derive(Clone)]
pub struct Moderation {
    questions: QuestionStore,
    images: ImageStore,
}

impl Moderation {
    pub fn new(questions: QuestionStore, images: ImageStore) -> Self {
        Self { questions, images }
    }

    /// Create a question record. `verified_admin` is true only when the
    /// request carried the admin bearer token (the form's own flag is never
    /// trusted on its own) and makes the record enter at `approved`.
    pub async fn submit(
        &self,
        submission: SubmittedQuestion,
        verified_admin: bool,
    ) -> Result<Question> {
        let new = NewQuestion {
            title: submission.title,
            description: submission.description,
            end_date: submission.end_date,
            end_time: submission.end_time,
            category: submission.category,
            photo_url: None,
        };
        // Validate before touching storage so a bad form never uploads.
        new.validate()?;

        let photo_url = match submission.photo {
            Some(photo) => Some(
                self.images
                    .upload(&photo.filename, &photo.content_type, photo.bytes)
                    .await?,
            ),
            None => None,
        };

        let status = if verified_admin {
            QuestionStatus::Approved
        } else {
            QuestionStatus::Pending
        };
        let question = self
            .questions
            .insert(NewQuestion { photo_url, ..new }, status)
            .await?;
        info!(id = %question.id, status = %question.status, "Question submitted");
        Ok(question)
    }

    /// Approve or reject a pending question. Decided questions stay decided.
    pub async fn decide(&self, id: &str, decision: Decision) -> Result<Question> {
        let current = self.questions.get(id).await?;
        if current.status != QuestionStatus::Pending {
            return Err(AppError::Conflict(format!(
                "question {id} is already {}",
                current.status
            )));
        }

        let status = match decision {
            Decision::Approve => QuestionStatus::Approved,
            Decision::Reject => QuestionStatus::Rejected,
        };
        self.questions.update_status(id, status).await?;
        info!(id, status = %status, "Moderation decision applied");
        self.questions.get(id).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::StatusFilter;
    use sqlx::sqlite::SqlitePoolOptions;

    fn test_config() -> Config {
        Config {
            log_level: "info".to_string(),
            db_path: ":memory:".to_string(),
            api_port: 0,
            public_base_url: "http://localhost:3000".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: 31337,
            staker_private_key: String::new(),
            contract_address: String::new(),
            storage_url: "http://storage.local".to_string(),
            storage_key: "key".to_string(),
            storage_bucket: "question-photos".to_string(),
            admin_token: "secret".to_string(),
            confirm_timeout_secs: 120,
        }
    }

    async fn moderation() -> Moderation {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        Moderation::new(
            QuestionStore::with_pool(pool),
            ImageStore::new(&test_config()).unwrap(),
        )
    }

    fn submission(title: &str) -> SubmittedQuestion {
        SubmittedQuestion {
            title: title.to_string(),
            description: None,
            end_date: "2025-01-01".to_string(),
            end_time: "12:00".to_string(),
            category: "Weather".to_string(),
            photo: None,
        }
    }

    #[tokio::test]
    async fn public_submission_enters_pending() {
        let m = moderation().await;
        let q = m
            .submit(submission("Will it rain tomorrow?"), false)
            .await
            .unwrap();
        assert_eq!(q.status, QuestionStatus::Pending);
    }

    #[tokio::test]
    async fn verified_admin_submission_skips_moderation() {
        let m = moderation().await;
        let q = m.submit(submission("Admin question"), true).await.unwrap();
        assert_eq!(q.status, QuestionStatus::Approved);
    }

    #[tokio::test]
    async fn approve_makes_question_public() {
        let m = moderation().await;
        let q = m.submit(submission("Pending one"), false).await.unwrap();
        let decided = m.decide(&q.id, Decision::Approve).await.unwrap();
        assert_eq!(decided.status, QuestionStatus::Approved);

        let public = m
            .questions
            .list_by_status(StatusFilter::Approved)
            .await
            .unwrap();
        assert_eq!(public.len(), 1);
    }

    #[tokio::test]
    async fn decided_questions_are_terminal() {
        let m = moderation().await;
        let q = m.submit(submission("One shot"), false).await.unwrap();
        m.decide(&q.id, Decision::Reject).await.unwrap();

        let err = m.decide(&q.id, Decision::Approve).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn blank_title_is_rejected_before_any_write() {
        let m = moderation().await;
        let err = m.submit(submission("   "), false).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let all = m.questions.list_by_status(StatusFilter::All).await.unwrap();
        assert!(all.is_empty());
    }
}
