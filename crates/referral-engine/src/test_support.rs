//! Fixtures shared by the engine's unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use referral_core::codegen::CodeSource;
use referral_core::{
    ExperienceLevel, InterestArea, MarketerProfile, Money, NewPurchase, NewReferralCode,
    Percentage, PurchaseType, ReferralCode,
};
use referral_db::{Database, DbConfig};

use crate::{EngineConfig, ReferralEngine};

/// Engine over a private in-memory database.
pub(crate) async fn engine() -> ReferralEngine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    ReferralEngine::new(db, EngineConfig::default())
}

/// Engine over a file database with a real connection pool.
pub(crate) async fn file_engine(dir: &tempfile::TempDir) -> ReferralEngine {
    let db = Database::new(DbConfig::new(dir.path().join("referral.db")).max_connections(8))
        .await
        .unwrap();
    ReferralEngine::new(db, EngineConfig::default().finalize_retry_attempts(10))
}

/// Grants the marketer role directly.
pub(crate) async fn marketer(engine: &ReferralEngine, user_id: &str) {
    engine
        .db()
        .marketers()
        .grant(user_id, None, chrono::Utc::now())
        .await
        .unwrap();
}

/// Creates a code with explicit rates for `marketer_id` (granting the role).
pub(crate) async fn code_with(
    engine: &ReferralEngine,
    marketer_id: &str,
    code: &str,
    discount_bps: u32,
    commission_bps: u32,
    max_uses: Option<u32>,
) -> ReferralCode {
    marketer(engine, marketer_id).await;
    engine
        .create_referral_code(
            marketer_id,
            NewReferralCode {
                code: Some(code.to_string()),
                max_uses,
                discount_percentage: Some(Percentage::from_bps(discount_bps)),
                commission_percentage: Some(Percentage::from_bps(commission_bps)),
            },
        )
        .await
        .unwrap()
}

pub(crate) fn new_purchase(user_id: &str, amount: i64, code: Option<&str>) -> NewPurchase {
    NewPurchase {
        user_id: user_id.to_string(),
        purchase_type: PurchaseType::Course,
        target_id: "course-1".to_string(),
        original_amount: Money::from_toman(amount),
        referral_code: code.map(str::to_string),
    }
}

pub(crate) fn profile() -> MarketerProfile {
    MarketerProfile {
        full_name: "Sara Ahmadi".to_string(),
        phone_number: "+989121234567".to_string(),
        email: "sara@example.com".to_string(),
        experience_level: ExperienceLevel::Intermediate,
        current_job: Some("Instructor".to_string()),
        interest_area: InterestArea::Education,
        motivation: "I run a study group of 400 students".to_string(),
        marketing_experience: None,
        instagram_handle: Some("@sara.teaches".to_string()),
        telegram_handle: None,
    }
}

/// Code source that replays a fixed list, then repeats the last entry.
#[derive(Debug)]
pub(crate) struct ScriptedCodes {
    queue: Mutex<VecDeque<String>>,
    last: Mutex<String>,
}

impl ScriptedCodes {
    pub(crate) fn new(codes: &[&str]) -> Arc<Self> {
        Arc::new(ScriptedCodes {
            queue: Mutex::new(codes.iter().map(|c| c.to_string()).collect()),
            last: Mutex::new(codes.last().copied().unwrap_or("AAAAAAAA").to_string()),
        })
    }
}

impl CodeSource for ScriptedCodes {
    fn next_code(&self) -> String {
        match self.queue.lock().unwrap().pop_front() {
            Some(code) => {
                *self.last.lock().unwrap() = code.clone();
                code
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}
