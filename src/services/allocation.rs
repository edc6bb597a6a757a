//! Identifier allocation: resolve the active pattern, advance the counter, format.
//!
//! Uniqueness comes entirely from `CounterStore::atomic_increment`; this layer
//! never retries. A number consumed by a call whose result is later discarded
//! (failed entity insert, cancelled request) stays burned.

use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::allocation::{AllocationResult, CounterSnapshot};
use crate::models::identifier_type::IdentifierType;
use crate::models::pattern::Pattern;
use crate::services::pattern::PatternManager;
use crate::store::{CounterStore, PatternStore};

/// Source of "today" for date-qualified identifiers.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Clone)]
pub struct AllocationService<P, C> {
    patterns: PatternManager<P>,
    counters: C,
    clock: Clock,
}

impl<P: fmt::Debug, C: fmt::Debug> fmt::Debug for AllocationService<P, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocationService")
            .field("patterns", &self.patterns)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl<P: PatternStore, C: CounterStore> AllocationService<P, C> {
    /// Allocation service formatting through `patterns`' format registry.
    pub fn new(patterns: PatternManager<P>, counters: C) -> Self {
        Self {
            patterns,
            counters,
            clock: Arc::new(utc_today),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn patterns(&self) -> &PatternManager<P> {
        &self.patterns
    }

    pub fn counters(&self) -> &C {
        &self.counters
    }

    /// Consumer-facing read of the active pattern.
    pub async fn get_active_pattern(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Pattern, AppError> {
        self.patterns.get_active(organization_id, identifier_type).await
    }

    /// Issue the next identifier for `(organization_id, identifier_type)`.
    pub async fn allocate_next(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<AllocationResult, AppError> {
        let pattern = match self.patterns.get_active(organization_id, identifier_type).await {
            Ok(pattern) => pattern,
            Err(AppError::NotFound(_)) => {
                return Err(AppError::PatternNotConfigured(format!(
                    "No active {identifier_type} pattern for organization {organization_id}"
                )))
            }
            Err(e) => return Err(e),
        };

        // Rows stored before a strategy change can still lack room for the date.
        let strategy = self.patterns.formats().strategy(identifier_type);
        let digits_length = pattern.digits_length();
        if digits_length <= strategy.reserved_width() {
            return Err(AppError::Validation(format!(
                "Pattern {} leaves {digits_length} characters, {identifier_type} identifiers need more than {}",
                pattern.id,
                strategy.reserved_width()
            )));
        }

        let sequence = self
            .counters
            .atomic_increment(organization_id, identifier_type, pattern.initial_sequence)
            .await?;

        let identifier = strategy.format(&pattern, sequence, (self.clock)());
        let total_length = usize::try_from(pattern.total_length).unwrap_or(0);
        if identifier.len() != total_length {
            tracing::warn!(
                organization_id = %organization_id,
                identifier_type = %identifier_type,
                pattern_id = %pattern.id,
                sequence,
                "Sequence outgrew the active pattern"
            );
            return Err(AppError::SequenceOverflow(format!(
                "Sequence {sequence} does not fit the {} characters of pattern '{}'; \
                 widen total_length or activate a new pattern",
                pattern.total_length, pattern.example_pattern
            )));
        }

        tracing::info!(
            organization_id = %organization_id,
            identifier_type = %identifier_type,
            pattern_id = %pattern.id,
            sequence,
            identifier = %identifier,
            "Identifier allocated"
        );

        Ok(AllocationResult {
            identifier,
            sequence,
            organization_id,
            identifier_type,
            pattern_id: pattern.id,
        })
    }

    pub async fn current_sequence(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<CounterSnapshot, AppError> {
        let value = self.counters.current(organization_id, identifier_type).await?;
        Ok(CounterSnapshot {
            organization_id,
            identifier_type,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pattern::AddPatternRequest;
    use crate::models::pattern::NewPattern;
    use crate::store::PatternStore;
    use crate::store::{MemoryCounterStore, MemoryPatternStore};

    type Service = AllocationService<MemoryPatternStore, MemoryCounterStore>;

    fn service() -> Service {
        AllocationService::new(
            PatternManager::new(MemoryPatternStore::new()),
            MemoryCounterStore::new(),
        )
    }

    async fn configure(
        service: &Service,
        org: Uuid,
        identifier_type: IdentifierType,
        prefix: &str,
        total_length: i32,
        initial_sequence: i64,
    ) -> Pattern {
        service
            .patterns()
            .add_pattern(
                org,
                identifier_type,
                &AddPatternRequest {
                    prefix: prefix.to_string(),
                    total_length,
                    initial_sequence,
                    active: true,
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn formats_first_and_last_fitting_sequence() {
        let service = service();
        let org = Uuid::new_v4();
        configure(&service, org, IdentifierType::Employee, "EMP", 6, 1).await;

        let first = service.allocate_next(org, IdentifierType::Employee).await.unwrap();
        assert_eq!(first.identifier, "EMP001");
        assert_eq!(first.sequence, 1);

        for _ in 2..999 {
            service.allocate_next(org, IdentifierType::Employee).await.unwrap();
        }
        let last = service.allocate_next(org, IdentifierType::Employee).await.unwrap();
        assert_eq!(last.identifier, "EMP999");
        assert_eq!(last.sequence, 999);

        let err = service
            .allocate_next(org, IdentifierType::Employee)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SequenceOverflow(_)));
    }

    #[tokio::test]
    async fn overflow_burns_the_number() {
        let service = service();
        let org = Uuid::new_v4();
        configure(&service, org, IdentifierType::Employee, "EMP", 6, 999).await;

        service.allocate_next(org, IdentifierType::Employee).await.unwrap();
        service
            .allocate_next(org, IdentifierType::Employee)
            .await
            .unwrap_err();
        let snapshot = service
            .current_sequence(org, IdentifierType::Employee)
            .await
            .unwrap();
        assert_eq!(snapshot.value, Some(1000));
    }

    #[tokio::test]
    async fn missing_active_pattern_is_not_configured() {
        let service = service();
        let err = service
            .allocate_next(Uuid::new_v4(), IdentifierType::Loan)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PatternNotConfigured(_)));
    }

    #[tokio::test]
    async fn registering_a_pattern_does_not_advance_the_counter() {
        let service = service();
        let org = Uuid::new_v4();
        let pattern = configure(&service, org, IdentifierType::Employee, "EMP", 6, 3).await;
        assert_eq!(pattern.example_pattern, "EMP000");

        let snapshot = service
            .current_sequence(org, IdentifierType::Employee)
            .await
            .unwrap();
        assert_eq!(snapshot.value, None);

        let first = service.allocate_next(org, IdentifierType::Employee).await.unwrap();
        assert_eq!(first.identifier, "EMP003");
    }

    #[tokio::test]
    async fn activation_never_resets_the_counter() {
        let service = service();
        let org = Uuid::new_v4();
        let old = configure(&service, org, IdentifierType::Device, "DEV", 8, 1).await;
        for _ in 0..5 {
            service.allocate_next(org, IdentifierType::Device).await.unwrap();
        }

        let new = configure(&service, org, IdentifierType::Device, "INV", 8, 500).await;
        let next = service.allocate_next(org, IdentifierType::Device).await.unwrap();
        assert_eq!(next.identifier, "INV00006");
        assert_eq!(next.pattern_id, new.id);

        service
            .patterns()
            .set_active(org, IdentifierType::Device, old.id)
            .await
            .unwrap();
        let resumed = service.allocate_next(org, IdentifierType::Device).await.unwrap();
        assert_eq!(resumed.identifier, "DEV00007");
    }

    #[tokio::test]
    async fn burned_sequence_is_never_reissued() {
        let service = service();
        let org = Uuid::new_v4();
        configure(&service, org, IdentifierType::Loan, "LN", 10, 1).await;

        // Consumer failed to persist its entity: the allocation is discarded.
        let burned = service.allocate_next(org, IdentifierType::Loan).await.unwrap();
        let next = service.allocate_next(org, IdentifierType::Loan).await.unwrap();
        assert!(next.sequence > burned.sequence);
        assert_ne!(next.identifier, burned.identifier);
    }

    #[tokio::test]
    async fn tenants_and_types_are_isolated() {
        let service = service();
        let org_a = Uuid::new_v4();
        let org_b = Uuid::new_v4();
        configure(&service, org_a, IdentifierType::Device, "DEV", 8, 1).await;
        configure(&service, org_a, IdentifierType::Employee, "EMP", 6, 1).await;
        configure(&service, org_b, IdentifierType::Device, "DEV", 8, 1).await;

        for _ in 0..3 {
            service.allocate_next(org_a, IdentifierType::Device).await.unwrap();
        }

        let employee = service.allocate_next(org_a, IdentifierType::Employee).await.unwrap();
        let other_org = service.allocate_next(org_b, IdentifierType::Device).await.unwrap();
        assert_eq!(employee.identifier, "EMP001");
        assert_eq!(other_org.identifier, "DEV00001");
    }

    #[tokio::test]
    async fn date_qualified_types_embed_the_clock_date() {
        let service = service().with_clock(Arc::new(|| NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()));
        let org = Uuid::new_v4();
        configure(&service, org, IdentifierType::Applicant, "APP", 15, 1).await;

        let applicant = service.allocate_next(org, IdentifierType::Applicant).await.unwrap();
        assert_eq!(applicant.identifier, "APP202610190001");
    }

    #[tokio::test]
    async fn stored_date_qualified_pattern_without_room_is_rejected() {
        let service = service();
        let org = Uuid::new_v4();
        service
            .patterns()
            .store()
            .insert(NewPattern {
                organization_id: org,
                identifier_type: IdentifierType::Applicant,
                prefix: "APP".to_string(),
                total_length: 11,
                initial_sequence: 0,
                active: true,
                example_pattern: "APP00000000".to_string(),
            })
            .await
            .unwrap();

        let err = service
            .allocate_next(org, IdentifierType::Applicant)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        let snapshot = service
            .current_sequence(org, IdentifierType::Applicant)
            .await
            .unwrap();
        assert_eq!(snapshot.value, None);
    }
}
