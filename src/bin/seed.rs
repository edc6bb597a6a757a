//! Seed script for development: registers default patterns for a demo organization.
//!
//! Usage: `cargo run --bin seed`
//!
//! Requires `DATABASE_URL` (reads .env). `SEED_ORGANIZATION_ID` selects the
//! organization; a fixed demo id is used otherwise.

use anyhow::Context;
use idalloc::config::{AppConfig, StorageBackend};
use idalloc::errors::AppError;
use idalloc::models::identifier_type::IdentifierType;
use idalloc::models::pattern::AddPatternRequest;
use idalloc::AppState;
use uuid::Uuid;

const DEMO_ORGANIZATION_ID: &str = "00000000-0000-4000-8000-000000000001";

/// (type, prefix, total length) of each default pattern.
const DEFAULT_PATTERNS: [(IdentifierType, &str, i32); 4] = [
    (IdentifierType::Employee, "EMP", 6),
    (IdentifierType::Device, "DEV", 8),
    (IdentifierType::Loan, "LN", 10),
    (IdentifierType::Applicant, "APP", 15),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    if config.pattern_backend != StorageBackend::Postgres {
        anyhow::bail!("Seeding needs STORAGE_BACKEND=postgres; memory patterns are lost on exit");
    }

    let org_id: Uuid = std::env::var("SEED_ORGANIZATION_ID")
        .unwrap_or_else(|_| DEMO_ORGANIZATION_ID.to_string())
        .parse()
        .context("SEED_ORGANIZATION_ID must be a UUID")?;

    let state = AppState::from_config(config).await?;

    println!("=== Identifier Allocation Seed Script ===");
    println!("Organization: {org_id}");

    for (identifier_type, prefix, total_length) in DEFAULT_PATTERNS {
        let request = AddPatternRequest {
            prefix: prefix.to_string(),
            total_length,
            initial_sequence: 1,
            active: true,
        };
        match state
            .patterns()
            .add_pattern(org_id, identifier_type, &request)
            .await
        {
            Ok(pattern) => println!(
                "[done] {identifier_type}: {} (example {})",
                pattern.id, pattern.example_pattern
            ),
            Err(AppError::DuplicatePattern(_)) => {
                println!("[skip] {identifier_type}: {prefix}/{total_length} already registered")
            }
            Err(e) => return Err(e.into()),
        }
    }

    println!("\n=== Seed complete! ===");
    Ok(())
}
