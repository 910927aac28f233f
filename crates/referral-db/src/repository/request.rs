//! # Marketer Request Repository
//!
//! Storage for marketer applications. A partial unique index on
//! `(user_id) WHERE status IN ('pending', 'approved')` keeps one active
//! application per user even under concurrent submissions; reviews are
//! conditional on the row still being `pending`.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use referral_core::{
    ExperienceLevel, InterestArea, MarketerProfile, MarketerRequest, RequestStatus,
};

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, full_name, phone_number, email, experience_level,
           current_job, interest_area, motivation, marketing_experience,
           instagram_handle, telegram_handle, status, admin_notes,
           reviewed_by, reviewed_at, created_at, updated_at
    FROM marketer_requests
"#;

#[derive(Debug, FromRow)]
struct MarketerRequestRecord {
    id: String,
    user_id: String,
    full_name: String,
    phone_number: String,
    email: String,
    experience_level: ExperienceLevel,
    current_job: Option<String>,
    interest_area: InterestArea,
    motivation: String,
    marketing_experience: Option<String>,
    instagram_handle: Option<String>,
    telegram_handle: Option<String>,
    status: RequestStatus,
    admin_notes: Option<String>,
    reviewed_by: Option<String>,
    reviewed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<MarketerRequestRecord> for MarketerRequest {
    fn from(row: MarketerRequestRecord) -> Self {
        MarketerRequest {
            id: row.id,
            user_id: row.user_id,
            profile: MarketerProfile {
                full_name: row.full_name,
                phone_number: row.phone_number,
                email: row.email,
                experience_level: row.experience_level,
                current_job: row.current_job,
                interest_area: row.interest_area,
                motivation: row.motivation,
                marketing_experience: row.marketing_experience,
                instagram_handle: row.instagram_handle,
                telegram_handle: row.telegram_handle,
            },
            status: row.status,
            admin_notes: row.admin_notes,
            reviewed_by: row.reviewed_by,
            reviewed_at: row.reviewed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Review outcome written by [`MarketerRequestRepository::review`].
#[derive(Debug, Clone)]
pub struct ReviewUpdate<'a> {
    pub to: RequestStatus,
    pub admin_notes: Option<&'a str>,
    pub reviewed_by: &'a str,
    pub reviewed_at: DateTime<Utc>,
}

/// Repository for marketer request database operations.
#[derive(Debug, Clone)]
pub struct MarketerRequestRepository {
    pool: SqlitePool,
}

impl MarketerRequestRepository {
    /// Creates a new MarketerRequestRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MarketerRequestRepository { pool }
    }

    /// Inserts a new request.
    ///
    /// ## Errors
    /// `UniqueViolation` on `marketer_requests.user_id` when the user already
    /// has a pending or approved request.
    pub async fn insert(&self, request: &MarketerRequest) -> DbResult<()> {
        debug!(id = %request.id, user_id = %request.user_id, "Inserting marketer request");
        let p = &request.profile;

        sqlx::query(
            r#"
            INSERT INTO marketer_requests (
                id, user_id, full_name, phone_number, email, experience_level,
                current_job, interest_area, motivation, marketing_experience,
                instagram_handle, telegram_handle, status, admin_notes,
                reviewed_by, reviewed_at, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18
            )
            "#,
        )
        .bind(&request.id)
        .bind(&request.user_id)
        .bind(&p.full_name)
        .bind(&p.phone_number)
        .bind(&p.email)
        .bind(p.experience_level)
        .bind(&p.current_job)
        .bind(p.interest_area)
        .bind(&p.motivation)
        .bind(&p.marketing_experience)
        .bind(&p.instagram_handle)
        .bind(&p.telegram_handle)
        .bind(request.status)
        .bind(&request.admin_notes)
        .bind(&request.reviewed_by)
        .bind(request.reviewed_at)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, request.user_id.clone()),
            other => other,
        })?;

        Ok(())
    }

    /// Gets a request by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<MarketerRequest>> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?1");
        let row = sqlx::query_as::<_, MarketerRequestRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(MarketerRequest::from))
    }

    /// Gets the user's most recent request, if any.
    pub async fn latest_for_user(&self, user_id: &str) -> DbResult<Option<MarketerRequest>> {
        let sql = format!("{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1");
        let row = sqlx::query_as::<_, MarketerRequestRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(MarketerRequest::from))
    }

    /// Gets the user's pending or approved request, if any.
    pub async fn active_for_user(&self, user_id: &str) -> DbResult<Option<MarketerRequest>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 AND status IN ('pending', 'approved') LIMIT 1"
        );
        let row = sqlx::query_as::<_, MarketerRequestRecord>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(MarketerRequest::from))
    }

    /// Lists requests, optionally by status, oldest first (review queue order).
    pub async fn list(&self, status: Option<RequestStatus>) -> DbResult<Vec<MarketerRequest>> {
        let sql = format!(
            "{SELECT_COLUMNS} WHERE (?1 IS NULL OR status = ?1) ORDER BY created_at ASC, rowid ASC"
        );
        let rows = sqlx::query_as::<_, MarketerRequestRecord>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(MarketerRequest::from).collect())
    }

    /// Records a review if the request is still pending.
    ///
    /// Returns `false` when the request is missing or was already reviewed.
    pub async fn review(&self, id: &str, update: &ReviewUpdate<'_>) -> DbResult<bool> {
        debug!(id = %id, to = %update.to, "Reviewing marketer request");

        let result = sqlx::query(
            r#"
            UPDATE marketer_requests
            SET status = ?1,
                admin_notes = ?2,
                reviewed_by = ?3,
                reviewed_at = ?4,
                updated_at = ?4
            WHERE id = ?5 AND status = 'pending'
            "#,
        )
        .bind(update.to)
        .bind(update.admin_notes)
        .bind(update.reviewed_by)
        .bind(update.reviewed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};

    fn profile() -> MarketerProfile {
        MarketerProfile {
            full_name: "Reza Karimi".to_string(),
            phone_number: "09121234567".to_string(),
            email: "reza@example.com".to_string(),
            experience_level: ExperienceLevel::Advanced,
            current_job: None,
            interest_area: InterestArea::Technology,
            motivation: "Developer community admin".to_string(),
            marketing_experience: Some("Ran two course launches".to_string()),
            instagram_handle: None,
            telegram_handle: Some("@reza_dev".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let request = MarketerRequest::submit("u-1", profile(), Utc::now());
        db.requests().insert(&request).await.unwrap();

        let loaded = db.requests().get_by_id(&request.id).await.unwrap().unwrap();
        assert_eq!(loaded, request);
        assert_eq!(
            db.requests().latest_for_user("u-1").await.unwrap().unwrap().id,
            request.id
        );
    }

    #[tokio::test]
    async fn test_second_active_request_violates_index() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.requests()
            .insert(&MarketerRequest::submit("u-1", profile(), Utc::now()))
            .await
            .unwrap();

        let err = db
            .requests()
            .insert(&MarketerRequest::submit("u-1", profile(), Utc::now()))
            .await
            .unwrap_err();
        assert!(err.is_unique_on("marketer_requests.user_id"), "{err:?}");
    }

    #[tokio::test]
    async fn test_rejected_request_allows_reapplication() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let first = MarketerRequest::submit("u-1", profile(), Utc::now());
        db.requests().insert(&first).await.unwrap();

        let update = ReviewUpdate {
            to: RequestStatus::Rejected,
            admin_notes: Some("incomplete profile"),
            reviewed_by: "admin-1",
            reviewed_at: Utc::now(),
        };
        assert!(db.requests().review(&first.id, &update).await.unwrap());
        // Second review of the same request is refused
        assert!(!db.requests().review(&first.id, &update).await.unwrap());

        let second = MarketerRequest::submit("u-1", profile(), Utc::now());
        db.requests().insert(&second).await.unwrap();
        assert_eq!(
            db.requests().active_for_user("u-1").await.unwrap().unwrap().id,
            second.id
        );

        let pending = db.requests().list(Some(RequestStatus::Pending)).await.unwrap();
        assert_eq!(pending.len(), 1);
        let all = db.requests().list(None).await.unwrap();
        assert_eq!(all.len(), 2);

        let rejected = db.requests().get_by_id(&first.id).await.unwrap().unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.admin_notes.as_deref(), Some("incomplete profile"));
        assert_eq!(rejected.reviewed_by.as_deref(), Some("admin-1"));
    }
}
