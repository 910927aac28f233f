//! # Marketer Request Workflow
//!
//! ```text
//! submit ──► pending ──► approved ──► directory.grant_marketer(user)
//!               │
//!               └──────► rejected  (user may submit again)
//! ```
//!
//! The review is committed before the role grant runs. If the directory is
//! down the request stays approved and the grant is retried with
//! [`ReferralEngine::resync_marketer_role`].

use chrono::Utc;
use tracing::{error, info};

use referral_core::validation::{validate_identifier, validate_notes, validate_profile};
use referral_core::{
    CoreError, MarketerProfile, MarketerRequest, RequestStatus, ReviewDecision, StatusMachine,
};
use referral_db::ReviewUpdate;

use crate::{EngineResult, ReferralEngine};

/// The partial unique index keeping one active request per user.
const ACTIVE_REQUEST_COLUMN: &str = "marketer_requests.user_id";

impl ReferralEngine {
    /// Files a marketer application for `user_id`.
    ///
    /// ## Errors
    /// `DuplicateApplication` while the user has a pending or approved request.
    pub async fn submit_marketer_request(
        &self,
        user_id: &str,
        profile: MarketerProfile,
    ) -> EngineResult<MarketerRequest> {
        validate_identifier("user_id", user_id)?;
        validate_profile(&profile)?;

        let duplicate = || CoreError::DuplicateApplication {
            user_id: user_id.to_string(),
        };

        if self.db.requests().active_for_user(user_id).await?.is_some() {
            return Err(duplicate().into());
        }

        let request = MarketerRequest::submit(user_id, profile, Utc::now());
        match self.db.requests().insert(&request).await {
            Ok(()) => {}
            // Lost a race with a concurrent submission
            Err(e) if e.is_unique_on(ACTIVE_REQUEST_COLUMN) => return Err(duplicate().into()),
            Err(e) => return Err(e.into()),
        }

        info!(request_id = %request.id, user_id = %user_id, "Marketer request submitted");
        Ok(request)
    }

    /// Approves or rejects a pending request.
    ///
    /// Approval grants the marketer role through the directory once the
    /// review is stored.
    pub async fn review_marketer_request(
        &self,
        request_id: &str,
        decision: ReviewDecision,
        notes: Option<&str>,
        reviewed_by: &str,
    ) -> EngineResult<MarketerRequest> {
        validate_identifier("reviewed_by", reviewed_by)?;
        if let Some(notes) = notes {
            validate_notes("admin_notes", notes)?;
        }

        let to = decision.target_status();
        let update = ReviewUpdate {
            to,
            admin_notes: notes,
            reviewed_by,
            reviewed_at: Utc::now(),
        };

        if !self.db.requests().review(request_id, &update).await? {
            let current = self.get_request(request_id).await?;
            current.status.ensure_transition(request_id, to)?;
            // Still pending means the row changed between the two statements
            return Err(CoreError::InvalidTransition {
                entity: RequestStatus::ENTITY,
                id: request_id.to_string(),
                from: current.status.to_string(),
                to: to.to_string(),
            }
            .into());
        }

        let request = self.get_request(request_id).await?;
        info!(
            request_id = %request_id,
            user_id = %request.user_id,
            status = %request.status,
            reviewed_by = %reviewed_by,
            "Marketer request reviewed"
        );

        if to == RequestStatus::Approved {
            self.grant_role(&request).await?;
        }
        Ok(request)
    }

    /// Re-runs the role grant for an approved request.
    pub async fn resync_marketer_role(&self, request_id: &str) -> EngineResult<MarketerRequest> {
        let request = self.get_request(request_id).await?;
        if request.status != RequestStatus::Approved {
            return Err(CoreError::InvalidTransition {
                entity: RequestStatus::ENTITY,
                id: request_id.to_string(),
                from: request.status.to_string(),
                to: RequestStatus::Approved.to_string(),
            }
            .into());
        }
        self.grant_role(&request).await?;
        Ok(request)
    }

    async fn grant_role(&self, request: &MarketerRequest) -> EngineResult<()> {
        if let Err(err) = self.directory.grant_marketer(&request.user_id, &request.id).await {
            error!(
                request_id = %request.id,
                user_id = %request.user_id,
                error = %err,
                "Marketer role grant failed; request stays approved until resynced"
            );
            return Err(err.into());
        }
        Ok(())
    }

    /// Gets a request by id.
    pub async fn get_request(&self, request_id: &str) -> EngineResult<MarketerRequest> {
        self.db
            .requests()
            .get_by_id(request_id)
            .await?
            .ok_or_else(|| CoreError::MarketerRequestNotFound(request_id.to_string()).into())
    }

    /// The user's most recent request, for the "request status" page.
    pub async fn latest_request_for_user(&self, user_id: &str) -> EngineResult<Option<MarketerRequest>> {
        validate_identifier("user_id", user_id)?;
        Ok(self.db.requests().latest_for_user(user_id).await?)
    }

    /// Review queue, oldest first.
    pub async fn list_requests(&self, status: Option<RequestStatus>) -> EngineResult<Vec<MarketerRequest>> {
        Ok(self.db.requests().list(status).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::test_support::{engine, profile};
    use crate::{EngineError, InMemoryMarketerDirectory};
    use referral_core::{CoreError, ErrorKind, NewReferralCode, RequestStatus, ReviewDecision};

    #[tokio::test]
    async fn test_duplicate_application_then_reapply_after_rejection() {
        let engine = engine().await;
        let first = engine.submit_marketer_request("u-1", profile()).await.unwrap();

        let err = engine.submit_marketer_request("u-1", profile()).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::DuplicateApplication { .. })
        ));

        let rejected = engine
            .review_marketer_request(&first.id, ReviewDecision::Reject, Some("thin profile"), "admin-1")
            .await
            .unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);
        assert_eq!(rejected.reviewed_by.as_deref(), Some("admin-1"));
        assert!(rejected.reviewed_at.is_some());

        let second = engine.submit_marketer_request("u-1", profile()).await.unwrap();
        assert_eq!(
            engine.latest_request_for_user("u-1").await.unwrap().unwrap().id,
            second.id
        );
        assert!(!engine.db().marketers().is_marketer("u-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_approval_unlocks_code_creation() {
        let engine = engine().await;
        let request = engine.submit_marketer_request("u-1", profile()).await.unwrap();

        let err = engine
            .create_referral_code("u-1", NewReferralCode::default())
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Core(CoreError::NotAMarketer(_))));

        engine
            .review_marketer_request(&request.id, ReviewDecision::Approve, None, "admin-1")
            .await
            .unwrap();
        engine
            .create_referral_code("u-1", NewReferralCode::default())
            .await
            .unwrap();

        // Approved users cannot apply again
        let err = engine.submit_marketer_request("u-1", profile()).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Conflict));
    }

    #[tokio::test]
    async fn test_terminal_requests_cannot_be_reviewed_again() {
        let engine = engine().await;
        let request = engine.submit_marketer_request("u-1", profile()).await.unwrap();
        engine
            .review_marketer_request(&request.id, ReviewDecision::Approve, None, "admin-1")
            .await
            .unwrap();

        for decision in [ReviewDecision::Approve, ReviewDecision::Reject] {
            let err = engine
                .review_marketer_request(&request.id, decision, None, "admin-2")
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                EngineError::Core(CoreError::InvalidTransition { .. })
            ));
        }

        let err = engine
            .review_marketer_request("missing", ReviewDecision::Approve, None, "admin-1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::MarketerRequestNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_grant_is_resynced() {
        let directory = Arc::new(InMemoryMarketerDirectory::new());
        let engine = engine().await.with_directory(directory.clone());
        let request = engine.submit_marketer_request("u-1", profile()).await.unwrap();

        directory.set_unavailable(true).await;
        let err = engine
            .review_marketer_request(&request.id, ReviewDecision::Approve, None, "admin-1")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Directory(_)));
        assert_eq!(
            engine.get_request(&request.id).await.unwrap().status,
            RequestStatus::Approved
        );

        directory.set_unavailable(false).await;
        engine.resync_marketer_role(&request.id).await.unwrap();
        engine
            .create_referral_code("u-1", NewReferralCode::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_invalid_profile_is_rejected() {
        let engine = engine().await;
        let mut bad = profile();
        bad.email = "not-an-email".into();

        let err = engine.submit_marketer_request("u-1", bad).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Validation));
        assert!(engine.list_requests(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_review_queue_filter() {
        let engine = engine().await;
        let a = engine.submit_marketer_request("u-1", profile()).await.unwrap();
        engine.submit_marketer_request("u-2", profile()).await.unwrap();
        engine
            .review_marketer_request(&a.id, ReviewDecision::Reject, None, "admin-1")
            .await
            .unwrap();

        assert_eq!(
            engine.list_requests(Some(RequestStatus::Pending)).await.unwrap().len(),
            1
        );
        assert_eq!(engine.list_requests(None).await.unwrap().len(), 2);
    }
}
