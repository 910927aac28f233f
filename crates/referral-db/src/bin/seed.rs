//! # Seed Data Generator
//!
//! Populates a development database with marketers, referral codes and a
//! few settled purchases so dashboards have something to show.
//!
//! ## Usage
//! ```bash
//! # Seed ./referral_dev.db with 3 marketers
//! cargo run -p referral-db --bin seed
//!
//! # Custom marketer count and database path
//! cargo run -p referral-db --bin seed -- --marketers 10 --db ./data/referral.db
//! ```
//!
//! ## Generated Data
//! - Settings row with 10% / 10% defaults
//! - `marketer-{N}` users holding the marketer role
//! - Two codes per marketer: `MKT{N}A` (unlimited) and `MKT{N}B` (5 uses)
//! - Two completed purchases per marketer on the `A` code, each with a
//!   pending commission

use chrono::Utc;
use std::env;
use tracing::{info, warn};

use referral_core::calculator::quote;
use referral_core::{
    new_id, Commission, CoreError, Money, PaymentStatus, Percentage, Purchase, PurchaseType, ReferralCode,
};
use referral_db::{
    CommissionRepository, Database, DbConfig, PurchaseRepository, ReferralCodeRepository,
    SettingsDefaults,
};

/// Course prices in Toman.
const PRICES: &[i64] = &[490_000, 1_250_000, 2_990_000, 780_000];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut marketers: usize = 3;
    let mut db_path = String::from("./referral_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--marketers" | "-m" => {
                if i + 1 < args.len() {
                    marketers = args[i + 1].parse().unwrap_or(3);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Referral Engine Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -m, --marketers <N>  Number of marketers to create (default: 3)");
                println!("  -d, --db <PATH>      Database file path (default: ./referral_dev.db)");
                println!("  -h, --help           Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, marketers, "Seeding referral database");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let settings = db.settings().load_or_init(SettingsDefaults::default()).await?;

    let start = std::time::Instant::now();
    let mut seeded = 0;

    for n in 1..=marketers {
        let marketer_id = format!("marketer-{n}");
        if !db.marketers().grant(&marketer_id, None, Utc::now()).await? {
            warn!(marketer_id = %marketer_id, "Marketer already seeded, skipping");
            continue;
        }

        let unlimited = seed_code(&db, &marketer_id, format!("MKT{n}A"), None, None).await?;
        seed_code(&db, &marketer_id, format!("MKT{n}B"), Some(5), Some(Percentage::from_bps(1500))).await?;

        for (k, price) in PRICES.iter().take(2).enumerate() {
            let now = Utc::now();
            let mut purchase = Purchase::new_pending(
                &format!("buyer-{n}-{k}"),
                PurchaseType::Course,
                &format!("course-{}", k + 1),
                Money::from_toman(*price),
                now,
            );
            let q = quote(purchase.original_amount, &unlimited, &settings);
            purchase.apply_quote(&unlimited.id, &q, now)?;
            db.purchases().insert(&purchase).await?;

            let mut tx = db.begin().await?;
            let claimed = ReferralCodeRepository::try_claim_use(&mut *tx, &unlimited.id)
                .await?
                .map_err(CoreError::from)?;
            PurchaseRepository::transition(&mut *tx, &purchase.id, PaymentStatus::Pending, PaymentStatus::Completed, now)
                .await?;
            let commission = Commission::accrue(
                &purchase,
                &claimed.code,
                q.commission_percentage,
                q.commission_amount,
                now,
            );
            CommissionRepository::insert(&mut *tx, &commission).await?;
            tx.commit().await?;
        }

        seeded += 1;
    }

    let pending = db.commissions().pending_total().await?;
    info!(
        seeded,
        pending_commissions = %pending,
        elapsed = ?start.elapsed(),
        "Seed complete"
    );

    Ok(())
}

/// Inserts one code owned by `marketer_id`.
async fn seed_code(
    db: &Database,
    marketer_id: &str,
    code: String,
    max_uses: Option<u32>,
    discount: Option<Percentage>,
) -> Result<ReferralCode, Box<dyn std::error::Error>> {
    let now = Utc::now();
    let code = ReferralCode {
        id: new_id(),
        code,
        marketer_id: marketer_id.to_string(),
        discount_percentage: discount,
        commission_percentage: None,
        max_uses,
        current_uses: 0,
        is_active: true,
        created_at: now,
        updated_at: now,
    };
    db.codes().insert(&code).await?;
    Ok(code)
}
