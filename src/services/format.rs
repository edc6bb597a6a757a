//! Formatting strategies turning a pattern and a sequence number into an identifier.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;

use crate::models::identifier_type::IdentifierType;
use crate::models::pattern::{example_pattern, zero_pad, Pattern};

/// Renders one identifier. Implementations never truncate: an identifier
/// whose length differs from `pattern.total_length` is rejected by the caller.
pub trait FormatStrategy: Send + Sync + fmt::Debug {
    /// Characters of the digit budget consumed by the strategy itself.
    fn reserved_width(&self) -> usize {
        0
    }

    /// Display-only preview for a prefix and digit budget.
    fn example(&self, prefix: &str, digits_length: usize) -> String {
        example_pattern(prefix, digits_length)
    }

    fn format(&self, pattern: &Pattern, sequence: i64, today: NaiveDate) -> String;
}

/// `PREFIX` + zero-padded sequence, e.g. `EMP007`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrefixSequence;

impl FormatStrategy for PrefixSequence {
    fn format(&self, pattern: &Pattern, sequence: i64, _today: NaiveDate) -> String {
        format!(
            "{}{}",
            pattern.prefix.to_uppercase(),
            zero_pad(sequence, pattern.digits_length())
        )
    }
}

/// `PREFIX` + `YYYYMMDD` + zero-padded sequence, e.g. `APP202610190042`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateQualified;

impl DateQualified {
    const DATE_WIDTH: usize = 8;
}

impl FormatStrategy for DateQualified {
    fn reserved_width(&self) -> usize {
        Self::DATE_WIDTH
    }

    fn example(&self, prefix: &str, digits_length: usize) -> String {
        let width = digits_length.saturating_sub(Self::DATE_WIDTH);
        format!("{prefix}YYYYMMDD{}", zero_pad(0, width))
    }

    fn format(&self, pattern: &Pattern, sequence: i64, today: NaiveDate) -> String {
        let width = pattern.digits_length().saturating_sub(Self::DATE_WIDTH);
        format!(
            "{}{}{}",
            pattern.prefix.to_uppercase(),
            today.format("%Y%m%d"),
            zero_pad(sequence, width)
        )
    }
}

/// Strategy per identifier type; types without an entry use [`PrefixSequence`].
#[derive(Debug, Clone, Default)]
pub struct FormatRegistry {
    strategies: HashMap<IdentifierType, Arc<dyn FormatStrategy>>,
}

impl FormatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(
        mut self,
        identifier_type: IdentifierType,
        strategy: Arc<dyn FormatStrategy>,
    ) -> Self {
        self.strategies.insert(identifier_type, strategy);
        self
    }

    pub fn strategy(&self, identifier_type: IdentifierType) -> Arc<dyn FormatStrategy> {
        self.strategies
            .get(&identifier_type)
            .cloned()
            .unwrap_or_else(|| Arc::new(PrefixSequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn pattern(prefix: &str, total_length: i32) -> Pattern {
        Pattern {
            id: Uuid::nil(),
            organization_id: Uuid::nil(),
            identifier_type: IdentifierType::Employee,
            prefix: prefix.to_string(),
            total_length,
            initial_sequence: 0,
            active: true,
            example_pattern: String::new(),
            created_at: Utc::now(),
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    #[test]
    fn prefix_sequence_pads_to_digit_budget() {
        let p = pattern("EMP", 6);
        assert_eq!(PrefixSequence.format(&p, 1, day()), "EMP001");
        assert_eq!(PrefixSequence.format(&p, 999, day()), "EMP999");
    }

    #[test]
    fn prefix_sequence_does_not_truncate() {
        let p = pattern("EMP", 6);
        assert_eq!(PrefixSequence.format(&p, 1000, day()), "EMP1000");
    }

    #[test]
    fn prefix_sequence_uppercases_legacy_prefix() {
        let p = pattern("dev", 6);
        assert_eq!(PrefixSequence.format(&p, 12, day()), "DEV012");
    }

    #[test]
    fn date_qualified_embeds_date() {
        let p = pattern("APP", 15);
        assert_eq!(DateQualified.format(&p, 42, day()), "APP202610190042");
        assert_eq!(DateQualified.reserved_width(), 8);
    }

    #[test]
    fn examples_follow_the_strategy_shape() {
        assert_eq!(PrefixSequence.example("EMP", 3), "EMP000");
        assert_eq!(DateQualified.example("APP", 12), "APPYYYYMMDD0000");
    }

    #[test]
    fn registry_falls_back_to_prefix_sequence() {
        let registry = FormatRegistry::new()
            .with_strategy(IdentifierType::Applicant, Arc::new(DateQualified));
        assert_eq!(registry.strategy(IdentifierType::Applicant).reserved_width(), 8);
        assert_eq!(registry.strategy(IdentifierType::Loan).reserved_width(), 0);
    }
}
