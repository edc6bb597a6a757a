//! Identifier pattern model: prefix/length template configured per organization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

use crate::models::identifier_type::IdentifierType;

/// Longest prefix an administrator may configure.
pub const MAX_PREFIX_LENGTH: usize = 32;

/// Longest identifier a pattern may describe.
pub const MAX_TOTAL_LENGTH: i32 = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Pattern {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub identifier_type: IdentifierType,
    pub prefix: String,
    pub total_length: i32,
    pub initial_sequence: i64,
    pub active: bool,
    /// Display-only preview of the identifier shape.
    pub example_pattern: String,
    pub created_at: DateTime<Utc>,
}

impl Pattern {
    /// Number of characters left for the sequence after the prefix.
    pub fn digits_length(&self) -> usize {
        usize::try_from(digits_length(&self.prefix, self.total_length)).unwrap_or(0)
    }
}

/// A validated pattern ready to be inserted; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPattern {
    pub organization_id: Uuid,
    pub identifier_type: IdentifierType,
    pub prefix: String,
    pub total_length: i32,
    pub initial_sequence: i64,
    pub active: bool,
    pub example_pattern: String,
}

/// Admin request body for registering a pattern.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AddPatternRequest {
    #[serde(default)]
    #[validate(length(max = 32, message = "prefix must be at most 32 characters"))]
    pub prefix: String,
    #[validate(range(min = 1, max = 64, message = "total_length must be between 1 and 64"))]
    pub total_length: i32,
    #[serde(default)]
    #[validate(range(min = 0, message = "initial_sequence must not be negative"))]
    pub initial_sequence: i64,
    #[serde(default)]
    pub active: bool,
}

/// Trim and upper-case a raw prefix.
pub fn normalize_prefix(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Characters allowed in a prefix.
pub fn is_prefix_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '/')
}

/// `total_length - len(prefix)`; may be zero or negative for invalid input.
pub fn digits_length(prefix: &str, total_length: i32) -> i64 {
    i64::from(total_length) - prefix.chars().count() as i64
}

/// Left-pad `value` with zeros to `width` digits. Never truncates.
pub fn zero_pad(value: i64, width: usize) -> String {
    format!("{value:0width$}")
}

/// Preview shown to administrators: the prefix followed by one zero per digit.
pub fn example_pattern(prefix: &str, digits: usize) -> String {
    format!("{prefix}{}", zero_pad(0, digits))
}

/// Largest sequence that fits in `digits` characters, if it fits in an `i64`.
pub fn max_sequence(digits: usize) -> Option<i64> {
    let digits = u32::try_from(digits).ok()?;
    10i64.checked_pow(digits).map(|limit| limit - 1)
}
