//! In-process stores used for development, tests, and single-node deployments.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::identifier_type::IdentifierType;
use crate::models::pattern::{NewPattern, Pattern};
use crate::store::{CounterStore, PatternStore};

type Key = (Uuid, IdentifierType);

/// Compare-and-swap attempts before an increment reports contention.
const MAX_CAS_ATTEMPTS: u32 = 1024;

/// Pattern store holding each sibling set behind one async lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryPatternStore {
    patterns: Arc<RwLock<HashMap<Key, Vec<Pattern>>>>,
}

impl MemoryPatternStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatternStore for MemoryPatternStore {
    async fn get(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        id: Uuid,
    ) -> Result<Option<Pattern>, AppError> {
        let patterns = self.patterns.read().await;
        Ok(patterns
            .get(&(organization_id, identifier_type))
            .and_then(|siblings| siblings.iter().find(|p| p.id == id).cloned()))
    }

    async fn get_active(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Option<Pattern>, AppError> {
        let patterns = self.patterns.read().await;
        Ok(patterns
            .get(&(organization_id, identifier_type))
            .and_then(|siblings| siblings.iter().find(|p| p.active).cloned()))
    }

    async fn list(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Vec<Pattern>, AppError> {
        let patterns = self.patterns.read().await;
        Ok(patterns
            .get(&(organization_id, identifier_type))
            .cloned()
            .unwrap_or_default())
    }

    async fn insert(&self, new: NewPattern) -> Result<Pattern, AppError> {
        let mut patterns = self.patterns.write().await;
        let siblings = patterns
            .entry((new.organization_id, new.identifier_type))
            .or_default();

        if siblings
            .iter()
            .any(|p| p.prefix == new.prefix && p.total_length == new.total_length)
        {
            return Err(AppError::DuplicatePattern(format!(
                "Pattern with prefix '{}' and total length {} already exists for {}",
                new.prefix, new.total_length, new.identifier_type
            )));
        }

        if new.active {
            for sibling in siblings.iter_mut() {
                sibling.active = false;
            }
        }

        let pattern = Pattern {
            id: Uuid::now_v7(),
            organization_id: new.organization_id,
            identifier_type: new.identifier_type,
            prefix: new.prefix,
            total_length: new.total_length,
            initial_sequence: new.initial_sequence,
            active: new.active,
            example_pattern: new.example_pattern,
            created_at: Utc::now(),
        };
        siblings.push(pattern.clone());
        Ok(pattern)
    }

    async fn replace_all(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        replacement: &[Pattern],
    ) -> Result<Vec<Pattern>, AppError> {
        let mut patterns = self.patterns.write().await;
        let siblings = patterns
            .entry((organization_id, identifier_type))
            .or_default();

        if let Some(missing) = replacement
            .iter()
            .find(|r| !siblings.iter().any(|p| p.id == r.id))
        {
            return Err(AppError::NotFound(format!("Pattern {} not found", missing.id)));
        }

        for sibling in siblings.iter_mut() {
            sibling.active = replacement
                .iter()
                .find(|r| r.id == sibling.id)
                .is_some_and(|r| r.active);
        }

        Ok(siblings.clone())
    }

    async fn delete_inactive(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        id: Uuid,
    ) -> Result<bool, AppError> {
        let mut patterns = self.patterns.write().await;
        let Some(siblings) = patterns.get_mut(&(organization_id, identifier_type)) else {
            return Ok(false);
        };
        match siblings.iter().position(|p| p.id == id && !p.active) {
            Some(index) => {
                siblings.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Counter store with one lock-free atomic per key.
///
/// The map lock is only taken to look up or create a key; increments on an
/// existing key never block other keys.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    counters: Arc<RwLock<HashMap<Key, Arc<AtomicI64>>>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CounterStore for MemoryCounterStore {
    async fn atomic_increment(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        seed_if_absent: i64,
    ) -> Result<i64, AppError> {
        let key = (organization_id, identifier_type);
        let existing = self.counters.read().await.get(&key).cloned();

        let counter = match existing {
            Some(counter) => counter,
            None => {
                let mut counters = self.counters.write().await;
                match counters.entry(key) {
                    Entry::Occupied(entry) => Arc::clone(entry.get()),
                    Entry::Vacant(entry) => {
                        entry.insert(Arc::new(AtomicI64::new(seed_if_absent)));
                        return Ok(seed_if_absent);
                    }
                }
            }
        };

        for _ in 0..MAX_CAS_ATTEMPTS {
            let current = counter.load(Ordering::Acquire);
            let next = current.checked_add(1).ok_or_else(|| {
                AppError::SequenceOverflow(format!(
                    "Counter for {identifier_type} reached the 64-bit limit"
                ))
            })?;
            if counter
                .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return Ok(next);
            }
            std::hint::spin_loop();
        }

        Err(AppError::TransientContention(format!(
            "Counter for {identifier_type} still contended after {MAX_CAS_ATTEMPTS} attempts"
        )))
    }

    async fn current(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Option<i64>, AppError> {
        let counters = self.counters.read().await;
        Ok(counters
            .get(&(organization_id, identifier_type))
            .map(|counter| counter.load(Ordering::Acquire)))
    }
}
