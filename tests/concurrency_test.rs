//! Concurrency properties of allocation and activation on the memory backends.

use std::collections::HashSet;
use std::sync::Arc;

use idalloc::models::identifier_type::IdentifierType;
use idalloc::models::pattern::AddPatternRequest;
use idalloc::AppState;
use uuid::Uuid;

const ALLOCATIONS: usize = 10_000;

fn request(prefix: &str, total_length: i32, active: bool) -> AddPatternRequest {
    AddPatternRequest {
        prefix: prefix.to_string(),
        total_length,
        initial_sequence: 1,
        active,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_allocations_are_distinct_and_contiguous() {
    let state = Arc::new(AppState::in_memory());
    let org = Uuid::new_v4();
    state
        .patterns()
        .add_pattern(org, IdentifierType::Employee, &request("EMP", 9, true))
        .await
        .unwrap();

    let handles: Vec<_> = (0..ALLOCATIONS)
        .map(|_| {
            let state = Arc::clone(&state);
            tokio::spawn(async move {
                state
                    .allocator
                    .allocate_next(org, IdentifierType::Employee)
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut sequences = Vec::with_capacity(ALLOCATIONS);
    let mut identifiers = HashSet::with_capacity(ALLOCATIONS);
    for handle in handles {
        let result = handle.await.unwrap();
        sequences.push(result.sequence);
        identifiers.insert(result.identifier);
    }

    sequences.sort_unstable();
    let expected: Vec<i64> = (1..=ALLOCATIONS as i64).collect();
    assert_eq!(sequences, expected);
    assert_eq!(identifiers.len(), ALLOCATIONS);
    assert!(identifiers.contains("EMP000001"));
    assert!(identifiers.contains("EMP010000"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn keys_do_not_share_counters_under_load() {
    let state = Arc::new(AppState::in_memory());
    let orgs: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();
    for org in &orgs {
        for (identifier_type, prefix) in [(IdentifierType::Device, "DEV"), (IdentifierType::Loan, "LN")] {
            state
                .patterns()
                .add_pattern(*org, identifier_type, &request(prefix, 10, true))
                .await
                .unwrap();
        }
    }

    let mut handles = Vec::new();
    for org in &orgs {
        for identifier_type in [IdentifierType::Device, IdentifierType::Loan] {
            for _ in 0..250 {
                let state = Arc::clone(&state);
                let org = *org;
                handles.push(tokio::spawn(async move {
                    state.allocator.allocate_next(org, identifier_type).await.unwrap();
                }));
            }
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for org in &orgs {
        for identifier_type in [IdentifierType::Device, IdentifierType::Loan] {
            let snapshot = state
                .allocator
                .current_sequence(*org, identifier_type)
                .await
                .unwrap();
            assert_eq!(snapshot.value, Some(250));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_activation_leaves_exactly_one_active() {
    let state = Arc::new(AppState::in_memory());
    let org = Uuid::new_v4();

    let mut ids = Vec::new();
    for (i, prefix) in ["DEV", "INV", "ASSET", "HW", "EQ", "TAG"].iter().enumerate() {
        let pattern = state
            .patterns()
            .add_pattern(org, IdentifierType::Device, &request(prefix, 10, i == 0))
            .await
            .unwrap();
        ids.push(pattern.id);
    }

    let mut handles = Vec::new();
    for round in 0..20 {
        for id in &ids {
            let state = Arc::clone(&state);
            let id = *id;
            handles.push(tokio::spawn(async move {
                state
                    .patterns()
                    .set_active(org, IdentifierType::Device, id)
                    .await
                    .unwrap();
            }));
        }
        // Interleave active inserts with the swaps.
        let state = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            state
                .patterns()
                .add_pattern(
                    org,
                    IdentifierType::Device,
                    &request(&format!("R{round}"), 10, true),
                )
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let patterns = state
        .patterns()
        .list_by_type(org, IdentifierType::Device)
        .await
        .unwrap();
    assert_eq!(patterns.len(), ids.len() + 20);
    assert_eq!(patterns.iter().filter(|p| p.active).count(), 1);

    let active = state
        .allocator
        .get_active_pattern(org, IdentifierType::Device)
        .await
        .unwrap();
    assert!(patterns.iter().any(|p| p.id == active.id && p.active));
}

#[tokio::test]
async fn no_pattern_is_active_before_any_activation() {
    let state = AppState::in_memory();
    let org = Uuid::new_v4();
    for prefix in ["EMP", "STAFF"] {
        state
            .patterns()
            .add_pattern(org, IdentifierType::Employee, &request(prefix, 8, false))
            .await
            .unwrap();
    }

    let patterns = state
        .patterns()
        .list_by_type(org, IdentifierType::Employee)
        .await
        .unwrap();
    assert!(patterns.iter().all(|p| !p.active));
    assert!(state
        .allocator
        .get_active_pattern(org, IdentifierType::Employee)
        .await
        .unwrap_err()
        .is_not_found());
}
