use serde::Serialize;

use hostdesk_db::{DemoDataset, SeededCollection, VerificationResult};

use crate::commands::{with_desk, CommandResult, Failure};

#[derive(Debug, Serialize)]
struct SeedSummary {
    collection: String,
    inserted: usize,
    fixtures: usize,
}

impl From<&SeededCollection> for SeedSummary {
    fn from(seeded: &SeededCollection) -> Self {
        Self {
            collection: seeded.key.as_str().to_string(),
            inserted: seeded.inserted,
            fixtures: seeded.fixtures,
        }
    }
}

/// Loads (or with `clean`, removes) the demo dataset and verifies the result.
pub fn run(clean: bool) -> CommandResult {
    with_desk("seed", |desk| async move {
        if clean {
            let removed = DemoDataset::clean(desk.store.clone())
                .await
                .map_err(|error| Failure::new("seed_execution", error.to_string(), 6))?;
            return Ok(CommandResult::success("seed", format!("removed {removed} demo records")));
        }

        let seeded = DemoDataset::load(desk.store.clone())
            .await
            .map_err(|error| Failure::new("seed_execution", error.to_string(), 6))?;
        let verification = DemoDataset::verify(desk.store.clone())
            .await
            .map_err(|error| Failure::new("seed_verification", error.to_string(), 6))?;
        if !verification.all_present {
            return Err(Failure::new("seed_verification", verification_message(&verification), 6));
        }

        let summary: Vec<SeedSummary> = seeded.collections.iter().map(SeedSummary::from).collect();
        let inserted = seeded.inserted();
        Ok(CommandResult::success_with_data(
            "seed",
            format!("demo dataset loaded ({inserted} new records)"),
            summary,
        ))
    })
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed_checks = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}
