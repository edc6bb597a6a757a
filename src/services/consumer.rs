//! Consumer adapters: how business services obtain identifiers for new entities.
//!
//! A consumer allocates once per creation attempt and stores the returned
//! identifier on its own entity, under its own uniqueness index. Numbers
//! consumed by failed attempts are burned, never handed out again.

use std::future::Future;
use std::sync::Arc;

use uuid::Uuid;

use crate::errors::AppError;
use crate::models::allocation::AllocationResult;
use crate::models::identifier_type::IdentifierType;
use crate::services::allocation::AllocationService;
use crate::services::format::{DateQualified, FormatRegistry, FormatStrategy, PrefixSequence};
use crate::store::{CounterStore, PatternStore};

/// Whole-allocation attempts before a consumer gives up on a uniqueness clash.
pub const MAX_PERSIST_ATTEMPTS: usize = 3;

/// A business service that mints identifiers of one type.
pub trait IdentifierConsumer {
    const IDENTIFIER_TYPE: IdentifierType;

    fn format_strategy() -> Arc<dyn FormatStrategy> {
        Arc::new(PrefixSequence)
    }
}

/// Employee provisioning: `EMP001`.
#[derive(Debug, Clone, Copy)]
pub struct EmployeeIds;

impl IdentifierConsumer for EmployeeIds {
    const IDENTIFIER_TYPE: IdentifierType = IdentifierType::Employee;
}

/// Device and inventory intake: `DEV00042`.
#[derive(Debug, Clone, Copy)]
pub struct DeviceIds;

impl IdentifierConsumer for DeviceIds {
    const IDENTIFIER_TYPE: IdentifierType = IdentifierType::Device;
}

/// Loan submission: `LN00000017`.
#[derive(Debug, Clone, Copy)]
pub struct LoanIds;

impl IdentifierConsumer for LoanIds {
    const IDENTIFIER_TYPE: IdentifierType = IdentifierType::Loan;
}

/// Applicant intake: date-qualified, `APP202610190003`.
#[derive(Debug, Clone, Copy)]
pub struct ApplicantIds;

impl IdentifierConsumer for ApplicantIds {
    const IDENTIFIER_TYPE: IdentifierType = IdentifierType::Applicant;

    fn format_strategy() -> Arc<dyn FormatStrategy> {
        Arc::new(DateQualified)
    }
}

fn register<A: IdentifierConsumer>(registry: FormatRegistry) -> FormatRegistry {
    registry.with_strategy(A::IDENTIFIER_TYPE, A::format_strategy())
}

/// Registry carrying the strategy of every built-in consumer.
pub fn standard_formats() -> FormatRegistry {
    let registry = register::<EmployeeIds>(FormatRegistry::new());
    let registry = register::<DeviceIds>(registry);
    let registry = register::<LoanIds>(registry);
    register::<ApplicantIds>(registry)
}

/// Allocate an identifier for consumer `A`.
pub async fn allocate_for<A, P, C>(
    allocator: &AllocationService<P, C>,
    organization_id: Uuid,
) -> Result<AllocationResult, AppError>
where
    A: IdentifierConsumer,
    P: PatternStore,
    C: CounterStore,
{
    allocator.allocate_next(organization_id, A::IDENTIFIER_TYPE).await
}

/// Allocate an identifier and hand it to `persist`, the consumer's entity insert.
///
/// When `persist` reports a `Conflict` (the consumer's own uniqueness index
/// caught a duplicate identifier), the whole allocation is retried, up to
/// [`MAX_PERSIST_ATTEMPTS`]. Any other error is returned unchanged.
pub async fn create_with_identifier<P, C, T, F, Fut>(
    allocator: &AllocationService<P, C>,
    organization_id: Uuid,
    identifier_type: IdentifierType,
    mut persist: F,
) -> Result<T, AppError>
where
    P: PatternStore,
    C: CounterStore,
    F: FnMut(AllocationResult) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 1;
    loop {
        let allocation = allocator
            .allocate_next(organization_id, identifier_type)
            .await?;
        let sequence = allocation.sequence;

        match persist(allocation).await {
            Err(AppError::Conflict(msg)) if attempt < MAX_PERSIST_ATTEMPTS => {
                tracing::warn!(
                    organization_id = %organization_id,
                    identifier_type = %identifier_type,
                    sequence,
                    attempt,
                    error = %msg,
                    "Allocated identifier already taken, allocating again"
                );
                attempt += 1;
            }
            other => return other,
        }
    }
}
