//! Transient allocation results returned to consumers; never persisted by the core.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::identifier_type::IdentifierType;

/// One issued identifier and the counter value it consumed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationResult {
    pub identifier: String,
    pub sequence: i64,
    pub organization_id: Uuid,
    pub identifier_type: IdentifierType,
    pub pattern_id: Uuid,
}

/// Read-only view of a counter; `value` is `None` before the first allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub organization_id: Uuid,
    pub identifier_type: IdentifierType,
    pub value: Option<i64>,
}
