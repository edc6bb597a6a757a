//! Pattern management: validation, activation swaps, and deletion rules.
//!
//! Every mutation reaches the store as one atomic operation, so the
//! one-active-pattern invariant holds without cooperation from callers.

use uuid::Uuid;
use validator::Validate;

use crate::errors::AppError;
use crate::models::identifier_type::IdentifierType;
use crate::models::pattern::{
    self, AddPatternRequest, NewPattern, Pattern, MAX_PREFIX_LENGTH,
};
use crate::services::consumer::standard_formats;
use crate::services::format::{FormatRegistry, FormatStrategy};
use crate::store::PatternStore;

/// Owns the pattern rules. The format registry tells it how much of each
/// pattern's digit budget a type's strategy consumes.
#[derive(Debug, Clone)]
pub struct PatternManager<S> {
    store: S,
    formats: FormatRegistry,
}

impl<S: PatternStore> PatternManager<S> {
    /// Manager using the formats of the built-in consumers.
    pub fn new(store: S) -> Self {
        Self::with_formats(store, standard_formats())
    }

    pub fn with_formats(store: S, formats: FormatRegistry) -> Self {
        Self { store, formats }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn formats(&self) -> &FormatRegistry {
        &self.formats
    }

    /// Validate and register a pattern, activating it atomically when requested.
    ///
    /// Registering never touches the counter.
    pub async fn add_pattern(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        request: &AddPatternRequest,
    ) -> Result<Pattern, AppError> {
        let strategy = self.formats.strategy(identifier_type);
        let new = validate_new_pattern(organization_id, identifier_type, request, strategy.as_ref())?;
        let pattern = self.store.insert(new).await?;

        tracing::info!(
            organization_id = %organization_id,
            identifier_type = %identifier_type,
            pattern_id = %pattern.id,
            prefix = %pattern.prefix,
            total_length = pattern.total_length,
            active = pattern.active,
            "Pattern registered"
        );
        Ok(pattern)
    }

    /// Make `pattern_id` the only active pattern of its (org, type).
    pub async fn set_active(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        pattern_id: Uuid,
    ) -> Result<Pattern, AppError> {
        let siblings = self.store.list(organization_id, identifier_type).await?;
        let Some(target) = siblings.iter().find(|p| p.id == pattern_id) else {
            return Err(AppError::NotFound(format!(
                "Pattern {pattern_id} not found for {identifier_type}"
            )));
        };
        check_sequence_room(
            identifier_type,
            target.digits_length(),
            target.initial_sequence,
            self.formats.strategy(identifier_type).as_ref(),
        )?;

        let swapped: Vec<Pattern> = siblings
            .into_iter()
            .map(|mut p| {
                p.active = p.id == pattern_id;
                p
            })
            .collect();

        let written = self
            .store
            .replace_all(organization_id, identifier_type, &swapped)
            .await?;

        let activated = written
            .into_iter()
            .find(|p| p.id == pattern_id && p.active)
            .ok_or_else(|| {
                AppError::Internal(format!("Pattern {pattern_id} not active after swap"))
            })?;

        tracing::info!(
            organization_id = %organization_id,
            identifier_type = %identifier_type,
            pattern_id = %pattern_id,
            "Pattern activated"
        );
        Ok(activated)
    }

    /// Delete an inactive pattern. The active pattern must be replaced first.
    pub async fn delete(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
        pattern_id: Uuid,
    ) -> Result<(), AppError> {
        let pattern = self
            .store
            .get(organization_id, identifier_type, pattern_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Pattern {pattern_id} not found")))?;

        if pattern.active {
            return Err(active_delete_conflict(pattern_id));
        }

        // Re-checked in the store: the pattern may have been activated meanwhile.
        if !self
            .store
            .delete_inactive(organization_id, identifier_type, pattern_id)
            .await?
        {
            let still_there = self
                .store
                .get(organization_id, identifier_type, pattern_id)
                .await?;
            return Err(match still_there {
                Some(_) => active_delete_conflict(pattern_id),
                None => AppError::NotFound(format!("Pattern {pattern_id} not found")),
            });
        }

        tracing::info!(
            organization_id = %organization_id,
            identifier_type = %identifier_type,
            pattern_id = %pattern_id,
            "Pattern deleted"
        );
        Ok(())
    }

    pub async fn list_by_type(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Vec<Pattern>, AppError> {
        self.store.list(organization_id, identifier_type).await
    }

    /// The active pattern; `NotFound` for an organization that has not configured one.
    pub async fn get_active(
        &self,
        organization_id: Uuid,
        identifier_type: IdentifierType,
    ) -> Result<Pattern, AppError> {
        self.store
            .get_active(organization_id, identifier_type)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("No active {identifier_type} pattern configured"))
            })
    }
}

fn active_delete_conflict(pattern_id: Uuid) -> AppError {
    AppError::Conflict(format!(
        "Pattern {pattern_id} is active; activate another pattern before deleting it"
    ))
}

/// Normalize and validate an admin request into an insertable pattern.
pub fn validate_new_pattern(
    organization_id: Uuid,
    identifier_type: IdentifierType,
    request: &AddPatternRequest,
    strategy: &dyn FormatStrategy,
) -> Result<NewPattern, AppError> {
    request.validate()?;

    let prefix = pattern::normalize_prefix(&request.prefix);
    if prefix.len() > MAX_PREFIX_LENGTH {
        return Err(AppError::Validation(format!(
            "prefix must be at most {MAX_PREFIX_LENGTH} characters"
        )));
    }
    if let Some(c) = prefix.chars().find(|c| !pattern::is_prefix_char(*c)) {
        return Err(AppError::Validation(format!(
            "prefix contains unsupported character '{c}'"
        )));
    }
    if prefix.is_empty() && identifier_type.requires_prefix() {
        return Err(AppError::Validation(format!(
            "{identifier_type} patterns require a prefix"
        )));
    }

    let digits = pattern::digits_length(&prefix, request.total_length);
    if digits <= 0 {
        return Err(AppError::Validation(format!(
            "total_length {} leaves no room for digits after prefix '{prefix}'",
            request.total_length
        )));
    }
    let digits = usize::try_from(digits)
        .map_err(|_| AppError::Validation("digits length out of range".to_string()))?;

    check_sequence_room(identifier_type, digits, request.initial_sequence, strategy)?;

    Ok(NewPattern {
        organization_id,
        identifier_type,
        example_pattern: strategy.example(&prefix, digits),
        prefix,
        total_length: request.total_length,
        initial_sequence: request.initial_sequence,
        active: request.active,
    })
}

/// The sequence needs at least one character after what the strategy
/// reserves, and the seed must fit in that width.
fn check_sequence_room(
    identifier_type: IdentifierType,
    digits_length: usize,
    initial_sequence: i64,
    strategy: &dyn FormatStrategy,
) -> Result<(), AppError> {
    let reserved = strategy.reserved_width();
    if digits_length <= reserved {
        return Err(AppError::Validation(format!(
            "{identifier_type} identifiers reserve {reserved} characters; \
             {digits_length} leaves no room for the sequence"
        )));
    }

    let width = digits_length - reserved;
    if let Some(max) = pattern::max_sequence(width) {
        if initial_sequence > max {
            return Err(AppError::Validation(format!(
                "initial_sequence {initial_sequence} does not fit in {width} digits"
            )));
        }
    }
    Ok(())
}
